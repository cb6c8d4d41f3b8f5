//! Measurement profile: mass accuracy and formula constraints of an instrument.
//!
//! Mirrors the way instrument settings are usually configured: a `Default`
//! plus a few named presets, all serde (de)serializable.

use serde::{Deserialize, Serialize};

use crate::chemistry::sum_formula::SumFormula;
use crate::error::ConfigError;

/// Mass deviation given relative (ppm) and absolute (Da); the larger one wins.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deviation {
    pub ppm: f64,
    pub absolute: f64,
}

impl Deviation {
    pub fn new(ppm: f64, absolute: f64) -> Self {
        Deviation { ppm, absolute }
    }

    /// Allowed deviation in Da around `mass`.
    ///
    /// # Example
    ///
    /// ```
    /// use fragcore::data::profile::Deviation;
    ///
    /// let dev = Deviation::new(10.0, 0.002);
    /// assert_eq!(dev.absolute_for(100.0), 0.002);
    /// assert!((dev.absolute_for(1000.0) - 0.01).abs() < 1e-12);
    /// ```
    #[inline]
    pub fn absolute_for(&self, mass: f64) -> f64 {
        (mass * self.ppm * 1e-6).max(self.absolute)
    }

    #[inline]
    pub fn in_error_window(&self, center: f64, mass: f64) -> bool {
        (center - mass).abs() <= self.absolute_for(center)
    }

    fn validate(&self, what: &str) -> Result<(), ConfigError> {
        if !(self.ppm.is_finite() && self.absolute.is_finite()) || self.ppm < 0.0 || self.absolute < 0.0 {
            return Err(ConfigError::InvalidProfile(format!(
                "{what} must be finite and non-negative ({} ppm, {} Da)",
                self.ppm, self.absolute
            )));
        }
        Ok(())
    }
}

/// Chemical constraints applied to every decomposed fragment formula.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormulaConstraints {
    /// Lower bound for ring and double bond equivalents (None disables)
    pub min_rdbe: Option<f64>,
    /// Upper bound for ring and double bond equivalents (None disables)
    pub max_rdbe: Option<f64>,
}

impl Default for FormulaConstraints {
    fn default() -> Self {
        Self {
            // ions may carry one radical / protonation site
            min_rdbe: Some(-0.5),
            max_rdbe: None,
        }
    }
}

impl FormulaConstraints {
    /// No constraints at all.
    pub fn unconstrained() -> Self {
        Self {
            min_rdbe: None,
            max_rdbe: None,
        }
    }

    #[inline]
    pub fn passes(&self, formula: &SumFormula) -> bool {
        let rdbe = formula.rdbe();
        self.min_rdbe.map_or(true, |min| rdbe >= min) && self.max_rdbe.map_or(true, |max| rdbe <= max)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementProfile {
    /// Window in which a formula may explain a peak
    pub allowed_mass_deviation: Deviation,
    /// Standard deviation of the mass error, used by mass deviation scoring
    pub standard_mass_deviation: Deviation,
    /// Median noise level, relative to the base peak
    pub median_noise_intensity: f64,
    pub constraints: FormulaConstraints,
}

impl Default for MeasurementProfile {
    fn default() -> Self {
        Self::qtof()
    }
}

impl MeasurementProfile {
    pub fn qtof() -> Self {
        Self {
            allowed_mass_deviation: Deviation::new(10.0, 0.002),
            standard_mass_deviation: Deviation::new(10.0 / 3.0, 0.002 / 3.0),
            median_noise_intensity: 0.02,
            constraints: FormulaConstraints::default(),
        }
    }

    pub fn orbitrap() -> Self {
        Self {
            allowed_mass_deviation: Deviation::new(5.0, 0.001),
            standard_mass_deviation: Deviation::new(5.0 / 3.0, 0.001 / 3.0),
            median_noise_intensity: 0.01,
            constraints: FormulaConstraints::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.allowed_mass_deviation.validate("allowed mass deviation")?;
        self.standard_mass_deviation.validate("standard mass deviation")?;
        if self.standard_mass_deviation.absolute_for(100.0) <= 0.0 {
            return Err(ConfigError::InvalidProfile(
                "standard mass deviation must be positive".to_string(),
            ));
        }
        if !self.median_noise_intensity.is_finite() || self.median_noise_intensity <= 0.0 {
            return Err(ConfigError::InvalidProfile(format!(
                "median noise intensity must be positive, got {}",
                self.median_noise_intensity
            )));
        }
        for bound in [self.constraints.min_rdbe, self.constraints.max_rdbe].into_iter().flatten() {
            if !bound.is_finite() {
                return Err(ConfigError::InvalidProfile(format!("non-finite RDBE bound {bound}")));
            }
        }
        Ok(())
    }
}
