use std::fmt::{self, Display, Formatter};
use std::sync::LazyLock;

use bincode::{Decode, Encode};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::chemistry::constants::{MASS_ELECTRON, MASS_PROTON};
use crate::chemistry::sum_formula::SumFormula;
use crate::error::FormulaError;

static NOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[M((?:[+-]\d*[A-Z][A-Za-z0-9]*)*)\](\d*)([+-])$").expect("valid adduct notation pattern")
});

static ADDUCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([+-])(\d*)([A-Z][A-Za-z0-9]*)").expect("valid adduct pattern"));

/// Adduct or ionization mode turning a neutral molecule into the measured ion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Ionization {
    pub name: String,
    /// Mass added to the neutral molecule, electrons included.
    pub mass_shift: f64,
    pub charge: i32,
}

impl Ionization {
    pub fn new(name: &str, mass_shift: f64, charge: i32) -> Self {
        Ionization {
            name: name.to_string(),
            mass_shift,
            charge,
        }
    }

    pub fn protonated() -> Self {
        Ionization::new("[M+H]+", MASS_PROTON, 1)
    }

    pub fn deprotonated() -> Self {
        Ionization::new("[M-H]-", -MASS_PROTON, -1)
    }

    pub fn sodiated() -> Self {
        Ionization::new("[M+Na]+", 22.9897692820 - MASS_ELECTRON, 1)
    }

    pub fn presets() -> [Ionization; 3] {
        [Ionization::protonated(), Ionization::deprotonated(), Ionization::sodiated()]
    }

    /// Parse adduct notation like `[M+H]+`, `[M+NH4]+`, `[M+H-H2O]+` or `[M-H]-`.
    ///
    /// The names of [`Ionization::presets`] resolve to the preset itself.
    ///
    /// # Example
    ///
    /// ```
    /// use fragcore::chemistry::ionization::Ionization;
    ///
    /// let ion = Ionization::parse("[M+H]+").unwrap();
    /// assert_eq!(ion.charge, 1);
    /// assert!((ion.mass_shift - 1.007276466621).abs() < 1e-6);
    /// ```
    pub fn parse(name: &str) -> Result<Self, FormulaError> {
        let invalid = || FormulaError::InvalidIonization(name.to_string());
        let compact: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        if let Some(preset) = Ionization::presets().into_iter().find(|p| p.name == compact) {
            return Ok(preset);
        }
        let captures = NOTATION.captures(&compact).ok_or_else(invalid)?;

        let magnitude = match captures.get(2).map(|m| m.as_str()) {
            None | Some("") => 1,
            Some(digits) => digits.parse::<i32>().map_err(|_| invalid())?,
        };
        if magnitude == 0 {
            return Err(invalid());
        }
        let charge = if &captures[3] == "-" { -magnitude } else { magnitude };

        let mut shift = 0.0;
        for part in ADDUCT.captures_iter(&captures[1]) {
            let multiplier = match &part[2] {
                "" => 1.0,
                digits => digits.parse::<u32>().map_err(|_| invalid())? as f64,
            };
            let mass = multiplier * SumFormula::new(&part[3])?.monoisotopic_weight();
            if &part[1] == "-" {
                shift -= mass;
            } else {
                shift += mass;
            }
        }

        Ok(Ionization {
            name: compact,
            mass_shift: shift - charge as f64 * MASS_ELECTRON,
            charge,
        })
    }

    /// calculate the m/z of an ion
    ///
    /// Arguments:
    ///
    /// * `neutral_mass` - monoisotopic mass of the neutral molecule
    ///
    /// Returns:
    ///
    /// * `mz` - mass-over-charge of the ion
    ///
    /// # Examples
    ///
    /// ```
    /// use fragcore::chemistry::ionization::Ionization;
    ///
    /// let mz = Ionization::protonated().ion_mass(1000.0);
    /// assert!((mz - 1001.007276466621).abs() < 1e-9);
    /// ```
    pub fn ion_mass(&self, neutral_mass: f64) -> f64 {
        (neutral_mass + self.mass_shift) / self.charge.unsigned_abs().max(1) as f64
    }

    /// Inverse of [`Ionization::ion_mass`].
    pub fn neutral_mass(&self, mz: f64) -> f64 {
        mz * self.charge.unsigned_abs().max(1) as f64 - self.mass_shift
    }
}

impl Default for Ionization {
    fn default() -> Self {
        Ionization::protonated()
    }
}

impl Display for Ionization {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("[M+H]+", MASS_PROTON, 1)]
    #[case("[M-H]-", -MASS_PROTON, -1)]
    #[case("[M+Na]+", 22.9897692820 - MASS_ELECTRON, 1)]
    #[case("[M+NH4]+", 18.033825567, 1)]
    #[case("[M+2H]2+", 2.0 * MASS_PROTON, 2)]
    fn parses_adduct_notation(#[case] name: &str, #[case] shift: f64, #[case] charge: i32) {
        let ion = Ionization::parse(name).unwrap();
        assert_eq!(ion.charge, charge);
        assert!((ion.mass_shift - shift).abs() < 1e-6, "{} vs {}", ion.mass_shift, shift);
    }

    #[rstest]
    #[case("M+H")]
    #[case("[M+H]")]
    #[case("[M+Xx]+")]
    #[case("[M+H]0+")]
    fn rejects_bad_notation(#[case] name: &str) {
        assert!(Ionization::parse(name).is_err());
    }

    #[test]
    fn preset_names_resolve_to_presets() {
        assert_eq!(Ionization::parse("[M+H]+").unwrap(), Ionization::protonated());
        assert_eq!(Ionization::parse("[M-H]-").unwrap(), Ionization::deprotonated());
        assert_eq!(Ionization::parse("[M + Na]+").unwrap(), Ionization::sodiated());
    }

    #[test]
    fn repeated_parsing_is_stable() {
        let first = Ionization::parse("[M+NH4]+").unwrap();
        for _ in 0..3 {
            assert_eq!(Ionization::parse("[M+NH4]+").unwrap(), first);
        }
    }

    #[test]
    fn water_loss_adduct() {
        let ion = Ionization::parse("[M+H-H2O]+").unwrap();
        let expected = MASS_PROTON - SumFormula::new("H2O").unwrap().monoisotopic_weight();
        assert!((ion.mass_shift - expected).abs() < 1e-6);
    }

    #[test]
    fn neutral_and_ion_mass_are_inverse() {
        for ion in [Ionization::protonated(), Ionization::deprotonated(), Ionization::parse("[M+2H]2+").unwrap()] {
            let neutral = 180.06338810;
            let mz = ion.ion_mass(neutral);
            assert!((ion.neutral_mass(mz) - neutral).abs() < 1e-9);
        }
    }
}
