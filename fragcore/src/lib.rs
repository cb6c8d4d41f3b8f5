// chemistry module
pub mod chemistry {
    pub mod constants;
    pub mod elements;
    pub mod sum_formula;
    pub mod ionization;
}

// data module
pub mod data {
    pub mod peak;
    pub mod profile;
    pub mod input;
    pub mod graph;
    pub mod tree;
}

// scoring module
pub mod scoring {
    pub mod contracts;
    pub mod peak;
    pub mod decomposition;
}

// algorithm module
pub mod algorithm {
    pub mod decomposition;
    pub mod graph_builder;
    pub mod critical_path;
    pub mod isotope;
}

pub mod error;

use crate::algorithm::critical_path::CriticalPathSolver;
use crate::algorithm::graph_builder::GraphBuilder;
use crate::chemistry::ionization::Ionization;
use crate::chemistry::sum_formula::SumFormula;
use crate::data::input::ProcessedInput;
use crate::data::tree::FragmentationTree;
use crate::scoring::contracts::Scoring;

/// build the fragmentation graph of one candidate formula and solve it
///
/// Arguments:
///
/// * `input` - processed peaks of the spectrum
/// * `scoring` - scorers used for the graph weights
/// * `formula` - candidate precursor formula
/// * `ionization` - precursor ionization
///
/// Returns:
///
/// * `FragmentationTree` - heuristic colorful tree, possibly empty
///
/// # Examples
///
/// ```
/// use fragcore::chemistry::ionization::Ionization;
/// use fragcore::chemistry::sum_formula::SumFormula;
/// use fragcore::compute_tree;
/// use fragcore::data::input::ProcessedInput;
/// use fragcore::data::peak::ProcessedPeak;
/// use fragcore::data::profile::MeasurementProfile;
/// use fragcore::scoring::contracts::{Scoring, ScoringSettings};
///
/// let ionization = Ionization::protonated();
/// let glucose = SumFormula::new("C6H12O6").unwrap();
/// let dehydrated = SumFormula::new("C6H10O5").unwrap();
/// let peaks = vec![
///     ProcessedPeak::new(0, ionization.ion_mass(glucose.monoisotopic_weight()), 40.0),
///     ProcessedPeak::new(1, ionization.ion_mass(dehydrated.monoisotopic_weight()), 100.0),
/// ];
/// let input = ProcessedInput::new(peaks, MeasurementProfile::default()).unwrap();
/// let scoring = Scoring::from_settings(&ScoringSettings::default()).unwrap();
///
/// let tree = compute_tree(&input, &scoring, &glucose, &ionization).unwrap();
/// assert_eq!(tree.root_formula(), &glucose);
/// assert_eq!(tree.len(), 2);
/// assert!(tree.is_colorful());
/// ```
pub fn compute_tree(
    input: &ProcessedInput,
    scoring: &Scoring,
    formula: &SumFormula,
    ionization: &Ionization,
) -> error::Result<FragmentationTree> {
    let graph = GraphBuilder::new(input, scoring).build(formula, ionization)?;
    let tree = CriticalPathSolver::new(&graph).solve()?;
    if tree.is_empty() {
        return Ok(FragmentationTree::empty(formula.clone(), ionization.clone()));
    }
    Ok(tree)
}
