//! Builds the fragmentation graph of one candidate precursor formula.

use nalgebra::DMatrix;
use ordered_float::OrderedFloat;
use tracing::{debug, instrument};

use crate::algorithm::decomposition::decompose_sub_formulas;
use crate::chemistry::ionization::Ionization;
use crate::chemistry::sum_formula::SumFormula;
use crate::data::graph::{FragmentId, FragmentationGraph, IsotopeMark};
use crate::data::input::ProcessedInput;
use crate::error::GraphError;
use crate::scoring::contracts::{Decomposition, Scoring};

/// A decomposition of one peak waiting to be connected.
#[derive(Debug)]
struct Candidate {
    formula: SumFormula,
    color: usize,
    position: usize,
    mass: f64,
    node_score: f64,
}

/// Fragment already part of the graph, with what loss weights need to know about it.
#[derive(Debug)]
struct Placed {
    id: FragmentId,
    /// Peak position, `None` for a synthetic precursor
    position: Option<usize>,
    color: usize,
    formula: SumFormula,
    mass: f64,
}

pub struct GraphBuilder<'a> {
    input: &'a ProcessedInput,
    scoring: &'a Scoring,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(input: &'a ProcessedInput, scoring: &'a Scoring) -> Self {
        GraphBuilder { input, scoring }
    }

    /// Build the graph explaining the spectrum with precursor `formula`.
    ///
    /// Arguments:
    ///
    /// * `formula` - candidate precursor formula
    /// * `ionization` - ionization shared by all fragments
    ///
    /// Returns:
    ///
    /// * `FragmentationGraph` - root, precursor fragment, connected fragments and isotope chains;
    ///   only the root if the precursor cannot be scored
    #[instrument(level = "debug", skip_all, fields(formula = %formula, ionization = %ionization))]
    pub fn build(&self, formula: &SumFormula, ionization: &Ionization) -> Result<FragmentationGraph, GraphError> {
        let mut graph = FragmentationGraph::new(ionization.clone());
        let peaks = self.input.peaks();
        let profile = self.input.profile();

        let precursor_mass = formula.monoisotopic_weight();
        let precursor_mz = ionization.ion_mass(precursor_mass);
        let precursor_position = self.precursor_position(precursor_mz);
        let precursor_peak = precursor_position.map(|pos| &peaks[pos]);

        let root_weight = self.scoring.fragment_score(
            &Decomposition {
                formula,
                ionization,
                peak: precursor_peak,
            },
            self.input,
        );
        if !root_weight.is_finite() {
            debug!(root_weight, "precursor cannot be explained");
            return Ok(graph);
        }

        let precursor_color = precursor_peak
            .map(|peak| peak.index)
            .unwrap_or_else(|| self.input.synthetic_precursor_color());
        let precursor = graph.add_fragment(formula.clone(), precursor_color, None);
        graph.add_loss(FragmentationGraph::ROOT, precursor, root_weight)?;

        let peak_scores = self.scoring.peak_scores(self.input);
        let pair_scores = self.scoring.peak_pair_scores(self.input);

        let upper_mz = precursor_mz + profile.allowed_mass_deviation.absolute_for(precursor_mz);
        let mut candidates = Vec::new();
        for (position, peak) in peaks.iter().enumerate() {
            if peak.is_isotope() || Some(position) == precursor_position || peak.mz > upper_mz {
                continue;
            }
            let node_score = peak_scores[position];
            if !node_score.is_finite() {
                continue;
            }
            let dev = profile.allowed_mass_deviation.absolute_for(peak.mz);
            let (low, high) = (ionization.neutral_mass(peak.mz - dev), ionization.neutral_mass(peak.mz + dev));
            for sub in decompose_sub_formulas(formula, low, high) {
                if sub == *formula || !profile.constraints.passes(&sub) {
                    continue;
                }
                let fragment_score = self.scoring.fragment_score(
                    &Decomposition {
                        formula: &sub,
                        ionization,
                        peak: Some(peak),
                    },
                    self.input,
                );
                let node_score = node_score + fragment_score;
                if node_score.is_finite() {
                    candidates.push(Candidate {
                        mass: sub.monoisotopic_weight(),
                        formula: sub,
                        color: peak.index,
                        position,
                        node_score,
                    });
                }
            }
        }
        candidates.sort_by(|a, b| {
            OrderedFloat(b.mass)
                .cmp(&OrderedFloat(a.mass))
                .then(a.color.cmp(&b.color))
                .then_with(|| a.formula.cmp(&b.formula))
        });
        debug!(candidates = candidates.len(), "decomposed peaks");

        let mut placed = vec![Placed {
            id: precursor,
            position: precursor_position,
            color: precursor_color,
            formula: formula.clone(),
            mass: precursor_mass,
        }];
        for candidate in candidates {
            let losses = self.incoming_weights(&placed, &candidate, ionization, &pair_scores);
            if losses.is_empty() {
                continue;
            }
            let id = graph.add_fragment(candidate.formula.clone(), candidate.color, None);
            for (source, weight) in losses {
                graph.add_loss(source, id, weight)?;
            }
            placed.push(Placed {
                id,
                position: Some(candidate.position),
                color: candidate.color,
                formula: candidate.formula,
                mass: candidate.mass,
            });
        }

        let decomposed = graph.num_fragments();
        for fragment in &placed {
            if let Some(position) = fragment.position {
                self.add_isotope_chain(&mut graph, fragment, position, &peak_scores, &pair_scores)?;
            }
        }

        debug!(
            fragments = graph.num_fragments(),
            isotope_fragments = graph.num_fragments() - decomposed,
            losses = graph.num_losses(),
            colors = graph.num_colors(),
            "graph built"
        );
        Ok(graph)
    }

    /// The non-isotope peak closest to the precursor ion within the allowed deviation.
    fn precursor_position(&self, precursor_mz: f64) -> Option<usize> {
        let deviation = &self.input.profile().allowed_mass_deviation;
        self.input
            .peaks()
            .iter()
            .enumerate()
            .filter(|(_, peak)| !peak.is_isotope() && deviation.in_error_window(precursor_mz, peak.mz))
            .min_by_key(|(_, peak)| OrderedFloat((peak.mz - precursor_mz).abs()))
            .map(|(position, _)| position)
    }

    /// Finite loss weights into `candidate` from every placed fragment that can lose into it.
    fn incoming_weights(
        &self,
        placed: &[Placed],
        candidate: &Candidate,
        ionization: &Ionization,
        pair_scores: &DMatrix<f64>,
    ) -> Vec<(FragmentId, f64)> {
        let deviation = &self.input.profile().allowed_mass_deviation;
        placed
            .iter()
            .filter(|parent| parent.color != candidate.color)
            .filter(|parent| parent.mass - candidate.mass > deviation.absolute_for(ionization.ion_mass(parent.mass)))
            .filter_map(|parent| {
                if !candidate.formula.is_proper_sub_formula_of(&parent.formula) {
                    return None;
                }
                let loss = parent.formula.checked_sub(&candidate.formula)?;
                let pair = parent
                    .position
                    .map_or(0.0, |position| pair_scores[(position, candidate.position)]);
                let weight = pair + self.scoring.loss_score(&loss, ionization, self.input) + candidate.node_score;
                weight.is_finite().then_some((parent.id, weight))
            })
            .collect()
    }

    /// Chain the isotope peaks of `fragment` below it, stopping at the first unscorable one.
    fn add_isotope_chain(
        &self,
        graph: &mut FragmentationGraph,
        fragment: &Placed,
        position: usize,
        peak_scores: &[f64],
        pair_scores: &DMatrix<f64>,
    ) -> Result<(), GraphError> {
        let peaks = self.input.peaks();
        let mut parent = fragment.id;
        for (n, isotope) in self.input.isotopes_of(fragment.color).into_iter().enumerate() {
            let weight = peak_scores[isotope] + pair_scores[(position, isotope)];
            if !weight.is_finite() {
                break;
            }
            let mark = IsotopeMark {
                monoisotopic: fragment.color,
                position: n + 1,
            };
            let id = graph.add_fragment(SumFormula::empty(), peaks[isotope].index, Some(mark));
            graph.add_loss(parent, id, weight)?;
            parent = id;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::peak::ProcessedPeak;
    use crate::data::profile::MeasurementProfile;
    use crate::scoring::contracts::{DecompositionFn, ScoringSettings};

    fn glucose_input() -> (ProcessedInput, SumFormula, Ionization) {
        let formula = SumFormula::new("C6H12O6").unwrap();
        let ionization = Ionization::protonated();
        let ion = |f: &str| ionization.ion_mass(SumFormula::new(f).unwrap().monoisotopic_weight());
        let peaks = vec![
            ProcessedPeak::new(0, ion("C6H12O6"), 30.0),
            ProcessedPeak::isotope(1, ion("C6H12O6") + 1.00336, 2.0, 0),
            ProcessedPeak::new(2, ion("C6H10O5"), 100.0),
            ProcessedPeak::new(3, ion("C6H8O4"), 60.0),
            ProcessedPeak::new(4, ion("C5H8O4"), 15.0),
            ProcessedPeak::new(5, ion("C4H6O3"), 40.0),
            ProcessedPeak::new(6, 400.0, 50.0),
        ];
        let input = ProcessedInput::new(peaks, MeasurementProfile::default()).unwrap();
        (input, formula, ionization)
    }

    #[test]
    fn graph_invariants_hold() {
        let (input, formula, ionization) = glucose_input();
        let scoring = Scoring::from_settings(&ScoringSettings::default()).unwrap();
        let graph = GraphBuilder::new(&input, &scoring).build(&formula, &ionization).unwrap();

        let deviation = input.profile().allowed_mass_deviation;
        for loss in graph.losses() {
            assert!(loss.source < loss.target);
            assert!(loss.weight.is_finite());
            if loss.source == FragmentationGraph::ROOT {
                continue;
            }
            let (u, v) = (graph.fragment(loss.source).unwrap(), graph.fragment(loss.target).unwrap());
            if v.isotope.is_some() {
                continue;
            }
            assert!(v.formula.is_proper_sub_formula_of(&u.formula));
            let (mu, mv) = (u.formula.monoisotopic_weight(), v.formula.monoisotopic_weight());
            assert!(mu - mv > deviation.absolute_for(ionization.ion_mass(mu)));
            assert_eq!(loss.formula, u.formula.checked_sub(&v.formula).unwrap());
        }
        for fragment in graph.fragments().iter().skip(1) {
            assert!(!fragment.incoming().is_empty());
            assert_eq!(fragment.ionization, ionization);
        }
    }

    #[test]
    fn precursor_and_isotopes() {
        let (input, formula, ionization) = glucose_input();
        let scoring = Scoring::from_settings(&ScoringSettings::default()).unwrap();
        let graph = GraphBuilder::new(&input, &scoring).build(&formula, &ionization).unwrap();

        let precursor = graph.fragment(1).unwrap();
        assert_eq!(precursor.formula, formula);
        assert_eq!(precursor.color, Some(0));
        assert_eq!(graph.outgoing_losses(FragmentationGraph::ROOT).count(), 1);

        // the isotope peak hangs off the precursor
        let isotopes = graph.fragments_with_color(1);
        assert_eq!(isotopes.len(), 1);
        let isotope = graph.fragment(isotopes[0]).unwrap();
        assert_eq!(isotope.isotope, Some(IsotopeMark { monoisotopic: 0, position: 1 }));
        assert_eq!(graph.incoming_losses(isotope.id).next().unwrap().source, precursor.id);

        // a peak above the precursor is never explained
        assert!(graph.fragments_with_color(6).is_empty());
        assert!(!graph.fragments_with_color(2).is_empty());
    }

    #[test]
    fn missing_precursor_gets_synthetic_color() {
        let (input, formula, ionization) = glucose_input();
        let peaks: Vec<ProcessedPeak> = input.peaks().iter().filter(|p| p.index > 1).cloned().collect();
        let input = ProcessedInput::new(peaks, MeasurementProfile::default()).unwrap();
        let scoring = Scoring::from_settings(&ScoringSettings::default()).unwrap();
        let graph = GraphBuilder::new(&input, &scoring).build(&formula, &ionization).unwrap();
        assert_eq!(graph.fragment(1).unwrap().color, Some(7));
        assert!(graph.num_fragments() > 2);
    }

    fn has_fragment(graph: &FragmentationGraph, formula: &str) -> bool {
        let formula = SumFormula::new(formula).unwrap();
        graph.fragments().iter().any(|f| f.formula == formula)
    }

    #[test]
    fn unscorable_losses_and_fragments_are_left_out() {
        let (input, formula, ionization) = glucose_input();
        let water = SumFormula::new("H2O").unwrap();
        let rejected = SumFormula::new("C5H8O4").unwrap();

        let baseline = Scoring::builder()
            .loss_scorer(DecompositionFn::new("flat", |_, _| 0.5), 1.0)
            .build()
            .unwrap();
        let graph = GraphBuilder::new(&input, &baseline).build(&formula, &ionization).unwrap();
        assert!(graph.losses().iter().any(|l| l.formula == water));
        assert!(has_fragment(&graph, "C5H8O4"));

        let no_water = water.clone();
        let scoring = Scoring::builder()
            .loss_scorer(
                DecompositionFn::new("no-water", move |d: &Decomposition<'_>, _: &ProcessedInput| {
                    if *d.formula == no_water { f64::NEG_INFINITY } else { 0.5 }
                }),
                1.0,
            )
            .fragment_scorer(
                DecompositionFn::new("no-c5", move |d: &Decomposition<'_>, _: &ProcessedInput| if *d.formula == rejected { f64::NAN } else { 0.0 }),
                1.0,
            )
            .build()
            .unwrap();
        let graph = GraphBuilder::new(&input, &scoring).build(&formula, &ionization).unwrap();

        assert!(graph.losses().iter().all(|l| l.weight.is_finite()));
        assert!(graph.losses().iter().all(|l| l.formula != water));
        // only reachable through a water loss
        assert!(!has_fragment(&graph, "C6H10O5"));
        assert!(!has_fragment(&graph, "C5H8O4"));
        assert!(has_fragment(&graph, "C6H8O4"));
        assert!(has_fragment(&graph, "C4H6O3"));
        assert_eq!(graph.fragment(1).unwrap().formula, formula);
    }

    #[test]
    fn unscorable_precursor_gives_root_only_graph() {
        let (input, formula, ionization) = glucose_input();
        let scoring = Scoring::builder()
            .fragment_scorer(DecompositionFn::new("never", |_, _| f64::NEG_INFINITY), 1.0)
            .build()
            .unwrap();
        let graph = GraphBuilder::new(&input, &scoring).build(&formula, &ionization).unwrap();
        assert!(graph.is_empty());
    }
}
