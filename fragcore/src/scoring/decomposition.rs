use std::collections::HashMap;

use statrs::function::erf::erfc;

use crate::chemistry::sum_formula::SumFormula;
use crate::data::input::ProcessedInput;
use crate::error::FormulaError;
use crate::scoring::contracts::{Decomposition, DecompositionScorer};

/// Frequently observed neutral losses and their log-odds bonus.
const COMMON_LOSSES: [(&str, f64); 12] = [
    ("H2O", 1.5),
    ("CO", 1.0),
    ("CO2", 1.0),
    ("NH3", 1.0),
    ("HCN", 0.8),
    ("CH2O2", 0.8),
    ("CH2O", 0.6),
    ("CH4O", 0.6),
    ("C2H4", 0.6),
    ("C2H2", 0.5),
    ("H2S", 0.5),
    ("HCl", 0.5),
];

/// Bonus for losses from a fixed table, zero for anything else.
#[derive(Clone, Debug)]
pub struct CommonLossScorer {
    losses: HashMap<SumFormula, f64>,
}

impl CommonLossScorer {
    pub fn new() -> Result<Self, FormulaError> {
        CommonLossScorer::with_losses(COMMON_LOSSES)
    }

    /// Arguments:
    ///
    /// * `losses` - loss formula and its bonus
    ///
    /// Returns:
    ///
    /// * scorer or the first formula that fails to parse
    ///
    /// # Example
    ///
    /// ```
    /// use fragcore::scoring::decomposition::CommonLossScorer;
    ///
    /// let scorer = CommonLossScorer::with_losses([("C2H4O2", 0.9)]).unwrap();
    /// assert_eq!(scorer.len(), 1);
    /// assert!(CommonLossScorer::with_losses([("Xx", 1.0)]).is_err());
    /// ```
    pub fn with_losses<'a, I>(losses: I) -> Result<Self, FormulaError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let losses = losses
            .into_iter()
            .map(|(formula, bonus)| Ok((SumFormula::new(formula)?, bonus)))
            .collect::<Result<HashMap<_, _>, FormulaError>>()?;
        Ok(CommonLossScorer { losses })
    }

    pub fn len(&self) -> usize {
        self.losses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.losses.is_empty()
    }
}

impl DecompositionScorer for CommonLossScorer {
    fn name(&self) -> &str {
        "common-losses"
    }

    fn score(&self, decomposition: &Decomposition<'_>, _input: &ProcessedInput) -> f64 {
        self.losses.get(decomposition.formula).copied().unwrap_or(0.0)
    }
}

/// Mild prior against large losses: `-ln(1 + mass / reference_mass)`.
#[derive(Clone, Copy, Debug)]
pub struct LossSizeScorer {
    reference_mass: f64,
}

impl LossSizeScorer {
    pub fn new(reference_mass: f64) -> Self {
        LossSizeScorer { reference_mass }
    }
}

impl Default for LossSizeScorer {
    fn default() -> Self {
        LossSizeScorer::new(100.0)
    }
}

impl DecompositionScorer for LossSizeScorer {
    fn name(&self) -> &str {
        "loss-size"
    }

    fn score(&self, decomposition: &Decomposition<'_>, _input: &ProcessedInput) -> f64 {
        -(1.0 + decomposition.formula.monoisotopic_weight() / self.reference_mass).ln()
    }
}

/// Gaussian tail probability of the mass error of a fragment.
///
/// With `d` the difference between peak m/z and the ion mass of the formula
/// and `s` the standard mass deviation at the peak, scores `ln erfc(|d| / (√2 s))`.
/// Decompositions without a peak score zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct MassDeviationScorer;

impl DecompositionScorer for MassDeviationScorer {
    fn name(&self) -> &str {
        "mass-deviation"
    }

    fn score(&self, decomposition: &Decomposition<'_>, input: &ProcessedInput) -> f64 {
        let peak = match decomposition.peak {
            Some(peak) => peak,
            None => return 0.0,
        };
        let sd = input.profile().standard_mass_deviation.absolute_for(peak.mz);
        if sd <= 0.0 {
            return 0.0;
        }
        let theoretical = decomposition
            .ionization
            .ion_mass(decomposition.formula.monoisotopic_weight());
        let deviation = (peak.mz - theoretical).abs();
        erfc(deviation / (std::f64::consts::SQRT_2 * sd)).ln()
    }
}
