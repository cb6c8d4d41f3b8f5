//! Scoring surface of the graph builder.
//!
//! Scores are log-probabilities and compose by weighted summation. Scorers
//! are pure: they are called concurrently from many independent graph builds
//! and must not keep mutable state.

use std::collections::HashSet;
use std::fmt;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::chemistry::ionization::Ionization;
use crate::chemistry::sum_formula::SumFormula;
use crate::data::input::ProcessedInput;
use crate::data::peak::ProcessedPeak;
use crate::error::ConfigError;
use crate::scoring::decomposition::{CommonLossScorer, LossSizeScorer, MassDeviationScorer};
use crate::scoring::peak::{PeakIntensityScorer, RelativeLossSizeScorer};

/// A formula explaining either a peak (fragment) or a mass difference (loss).
#[derive(Clone, Copy, Debug)]
pub struct Decomposition<'a> {
    pub formula: &'a SumFormula,
    pub ionization: &'a Ionization,
    /// The explained peak; `None` for losses
    pub peak: Option<&'a ProcessedPeak>,
}

/// Per-peak node score.
pub trait PeakScorer: Send + Sync {
    fn name(&self) -> &str;

    /// Write one score per peak position of `input.peaks()` into the zeroed `scores`.
    fn score(&self, input: &ProcessedInput, scores: &mut [f64]);
}

/// Compatibility of two peaks being connected by a loss.
pub trait PeakPairScorer: Send + Sync {
    fn name(&self) -> &str;

    /// Fill the zeroed, symmetric `scores` indexed by peak position.
    fn score(&self, input: &ProcessedInput, scores: &mut DMatrix<f64>);
}

/// Chemical prior of a formula, independent of where its peak sits.
pub trait DecompositionScorer: Send + Sync {
    fn name(&self) -> &str;

    fn score(&self, decomposition: &Decomposition<'_>, input: &ProcessedInput) -> f64;
}

/// Adapter turning a closure into a [`DecompositionScorer`].
pub struct DecompositionFn<F> {
    name: String,
    f: F,
}

impl<F> DecompositionFn<F>
where
    F: Fn(&Decomposition<'_>, &ProcessedInput) -> f64 + Send + Sync,
{
    pub fn new(name: &str, f: F) -> Self {
        DecompositionFn {
            name: name.to_string(),
            f,
        }
    }
}

impl<F> DecompositionScorer for DecompositionFn<F>
where
    F: Fn(&Decomposition<'_>, &ProcessedInput) -> f64 + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, decomposition: &Decomposition<'_>, input: &ProcessedInput) -> f64 {
        (self.f)(decomposition, input)
    }
}

struct Weighted<S: ?Sized> {
    multiplier: f64,
    scorer: Box<S>,
}

/// Weighted composition of all scorers used to build one graph.
#[derive(Default)]
pub struct Scoring {
    peak: Vec<Weighted<dyn PeakScorer>>,
    pair: Vec<Weighted<dyn PeakPairScorer>>,
    loss: Vec<Weighted<dyn DecompositionScorer>>,
    fragment: Vec<Weighted<dyn DecompositionScorer>>,
}

macro_rules! labels {
    ($list:expr) => {
        $list
            .iter()
            .map(|w| format!("{}*{}", w.scorer.name(), w.multiplier))
            .collect::<Vec<_>>()
    };
}

impl fmt::Debug for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoring")
            .field("peak", &labels!(self.peak))
            .field("pair", &labels!(self.pair))
            .field("loss", &labels!(self.loss))
            .field("fragment", &labels!(self.fragment))
            .finish()
    }
}

impl Scoring {
    pub fn builder() -> ScoringBuilder {
        ScoringBuilder::default()
    }

    /// The built-in scorers with the multipliers of `settings`; zero drops a scorer.
    ///
    /// # Example
    ///
    /// ```
    /// use fragcore::scoring::contracts::{Scoring, ScoringSettings};
    ///
    /// let scoring = Scoring::from_settings(&ScoringSettings::default()).unwrap();
    /// assert_eq!(scoring.len(), 5);
    ///
    /// let broken = ScoringSettings { mass_deviation: f64::NAN, ..Default::default() };
    /// assert!(Scoring::from_settings(&broken).is_err());
    /// ```
    pub fn from_settings(settings: &ScoringSettings) -> Result<Self, ConfigError> {
        if !settings.loss_size_reference.is_finite() || settings.loss_size_reference <= 0.0 {
            return Err(ConfigError::InvalidSetting(format!(
                "loss size reference mass must be positive, got {}",
                settings.loss_size_reference
            )));
        }

        let mut builder = Scoring::builder();
        if settings.peak_intensity != 0.0 {
            builder = builder.peak_scorer(PeakIntensityScorer, settings.peak_intensity);
        }
        if settings.relative_loss_size != 0.0 {
            builder = builder.pair_scorer(RelativeLossSizeScorer, settings.relative_loss_size);
        }
        if settings.common_losses != 0.0 {
            builder = builder.loss_scorer(CommonLossScorer::new()?, settings.common_losses);
        }
        if settings.loss_size != 0.0 {
            builder = builder.loss_scorer(LossSizeScorer::new(settings.loss_size_reference), settings.loss_size);
        }
        if settings.mass_deviation != 0.0 {
            builder = builder.fragment_scorer(MassDeviationScorer, settings.mass_deviation);
        }
        builder.build()
    }

    /// Number of registered scorers.
    pub fn len(&self) -> usize {
        self.peak.len() + self.pair.len() + self.loss.len() + self.fragment.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summed node score per peak position.
    pub fn peak_scores(&self, input: &ProcessedInput) -> Vec<f64> {
        let n = input.peaks().len();
        let mut total = vec![0.0; n];
        let mut buffer = vec![0.0; n];
        for weighted in &self.peak {
            buffer.iter_mut().for_each(|s| *s = 0.0);
            weighted.scorer.score(input, &mut buffer);
            for (t, s) in total.iter_mut().zip(&buffer) {
                *t += weighted.multiplier * s;
            }
        }
        total
    }

    /// Summed peak pair matrix indexed by peak position.
    pub fn peak_pair_scores(&self, input: &ProcessedInput) -> DMatrix<f64> {
        let n = input.peaks().len();
        let mut total = DMatrix::zeros(n, n);
        let mut buffer = DMatrix::zeros(n, n);
        for weighted in &self.pair {
            buffer.fill(0.0);
            weighted.scorer.score(input, &mut buffer);
            total += &buffer * weighted.multiplier;
        }
        total
    }

    /// Summed score of a neutral loss formula.
    pub fn loss_score(&self, loss: &SumFormula, ionization: &Ionization, input: &ProcessedInput) -> f64 {
        let decomposition = Decomposition {
            formula: loss,
            ionization,
            peak: None,
        };
        sum_decomposition(&self.loss, &decomposition, input)
    }

    /// Summed score of a fragment formula explaining a peak.
    pub fn fragment_score(&self, decomposition: &Decomposition<'_>, input: &ProcessedInput) -> f64 {
        sum_decomposition(&self.fragment, decomposition, input)
    }
}

fn sum_decomposition(
    scorers: &[Weighted<dyn DecompositionScorer>],
    decomposition: &Decomposition<'_>,
    input: &ProcessedInput,
) -> f64 {
    scorers
        .iter()
        .map(|w| w.multiplier * w.scorer.score(decomposition, input))
        .sum()
}

/// Collects scorers; configuration problems surface in [`ScoringBuilder::build`].
#[derive(Default)]
pub struct ScoringBuilder {
    scoring: Scoring,
}

impl ScoringBuilder {
    pub fn peak_scorer<S: PeakScorer + 'static>(mut self, scorer: S, multiplier: f64) -> Self {
        self.scoring.peak.push(Weighted {
            multiplier,
            scorer: Box::new(scorer),
        });
        self
    }

    pub fn pair_scorer<S: PeakPairScorer + 'static>(mut self, scorer: S, multiplier: f64) -> Self {
        self.scoring.pair.push(Weighted {
            multiplier,
            scorer: Box::new(scorer),
        });
        self
    }

    /// Scorer applied to the formula of every loss.
    pub fn loss_scorer<S: DecompositionScorer + 'static>(mut self, scorer: S, multiplier: f64) -> Self {
        self.scoring.loss.push(Weighted {
            multiplier,
            scorer: Box::new(scorer),
        });
        self
    }

    /// Scorer applied to every fragment formula together with its peak.
    pub fn fragment_scorer<S: DecompositionScorer + 'static>(mut self, scorer: S, multiplier: f64) -> Self {
        self.scoring.fragment.push(Weighted {
            multiplier,
            scorer: Box::new(scorer),
        });
        self
    }

    /// Reject non-finite multipliers and scorers registered twice for the same role.
    pub fn build(self) -> Result<Scoring, ConfigError> {
        let scoring = self.scoring;
        check(scoring.peak.iter().map(|w| (w.scorer.name(), w.multiplier)))?;
        check(scoring.pair.iter().map(|w| (w.scorer.name(), w.multiplier)))?;
        check(scoring.loss.iter().map(|w| (w.scorer.name(), w.multiplier)))?;
        check(scoring.fragment.iter().map(|w| (w.scorer.name(), w.multiplier)))?;
        tracing::debug!(scorers = scoring.len(), "scoring configured");
        Ok(scoring)
    }
}

fn check<'a>(scorers: impl Iterator<Item = (&'a str, f64)>) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for (name, multiplier) in scorers {
        if !multiplier.is_finite() {
            return Err(ConfigError::NonFiniteMultiplier {
                scorer: name.to_string(),
                multiplier,
            });
        }
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateScorer(name.to_string()));
        }
    }
    Ok(())
}

/// Multipliers of the built-in scorers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    pub peak_intensity: f64,
    pub relative_loss_size: f64,
    pub common_losses: f64,
    pub loss_size: f64,
    pub mass_deviation: f64,
    /// Mass (Da) at which the loss size penalty reaches ln 2
    pub loss_size_reference: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            peak_intensity: 1.0,
            relative_loss_size: 1.0,
            common_losses: 1.0,
            loss_size: 1.0,
            mass_deviation: 1.0,
            loss_size_reference: 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::profile::MeasurementProfile;

    struct Constant(&'static str, f64);

    impl PeakScorer for Constant {
        fn name(&self) -> &str {
            self.0
        }

        fn score(&self, _input: &ProcessedInput, scores: &mut [f64]) {
            scores.iter_mut().for_each(|s| *s = self.1);
        }
    }

    impl PeakPairScorer for Constant {
        fn name(&self) -> &str {
            self.0
        }

        fn score(&self, _input: &ProcessedInput, scores: &mut DMatrix<f64>) {
            scores.fill(self.1);
        }
    }

    fn input() -> ProcessedInput {
        let peaks = vec![ProcessedPeak::new(0, 100.0, 10.0), ProcessedPeak::new(1, 150.0, 20.0)];
        ProcessedInput::new(peaks, MeasurementProfile::default()).unwrap()
    }

    #[test]
    fn weighted_summation() {
        let scoring = Scoring::builder()
            .peak_scorer(Constant("a", 1.5), 2.0)
            .peak_scorer(Constant("b", -0.5), 1.0)
            .pair_scorer(Constant("p", 0.25), 4.0)
            .loss_scorer(DecompositionFn::new("l", |_, _| 0.75), 2.0)
            .build()
            .unwrap();
        let input = input();
        assert_eq!(scoring.peak_scores(&input), vec![2.5, 2.5]);
        let pairs = scoring.peak_pair_scores(&input);
        assert_eq!(pairs[(0, 1)], 1.0);
        assert_eq!(pairs[(1, 0)], 1.0);
        let water = SumFormula::new("H2O").unwrap();
        assert_eq!(scoring.loss_score(&water, &Ionization::protonated(), &input), 1.5);
    }

    #[test]
    fn rejects_non_finite_multiplier() {
        let err = Scoring::builder()
            .peak_scorer(Constant("a", 1.0), f64::INFINITY)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::NonFiniteMultiplier { .. }));
    }

    #[test]
    fn rejects_duplicate_scorers() {
        let err = Scoring::builder()
            .peak_scorer(Constant("a", 1.0), 1.0)
            .peak_scorer(Constant("a", 2.0), 1.0)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateScorer("a".to_string()));

        // same name in different roles is fine
        assert!(Scoring::builder()
            .peak_scorer(Constant("a", 1.0), 1.0)
            .pair_scorer(Constant("a", 1.0), 1.0)
            .build()
            .is_ok());
    }

    #[test]
    fn settings_select_scorers() {
        let settings = ScoringSettings {
            common_losses: 0.0,
            loss_size: 0.0,
            ..Default::default()
        };
        assert_eq!(Scoring::from_settings(&settings).unwrap().len(), 3);

        let bad = ScoringSettings {
            loss_size_reference: 0.0,
            ..Default::default()
        };
        assert!(matches!(Scoring::from_settings(&bad), Err(ConfigError::InvalidSetting(_))));
    }

    #[test]
    fn empty_scoring_is_zero() {
        let scoring = Scoring::default();
        let input = input();
        assert!(scoring.is_empty());
        assert_eq!(scoring.peak_scores(&input), vec![0.0, 0.0]);
        assert_eq!(scoring.peak_pair_scores(&input).sum(), 0.0);
    }
}
