use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::chemistry::elements::{monoisotopic_mass, valence};
use crate::error::FormulaError;

/// A molecular (sum) formula, element symbol to positive atom count.
///
/// Elements are kept in a sorted map so that equality, hashing, ordering and
/// serialization are deterministic. The empty formula is valid and is used
/// for the synthetic root and for isotope fragments.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Encode, Decode)]
#[serde(try_from = "String", into = "String")]
pub struct SumFormula {
    elements: BTreeMap<String, i32>,
}

impl SumFormula {
    /// Parse a formula such as `C6H12O6`.
    ///
    /// # Example
    ///
    /// ```
    /// use fragcore::chemistry::sum_formula::SumFormula;
    ///
    /// let glucose = SumFormula::new("C6H12O6").unwrap();
    /// assert_eq!(glucose.count("C"), 6);
    /// assert_eq!(glucose.count("N"), 0);
    /// ```
    pub fn new(formula: &str) -> Result<Self, FormulaError> {
        Ok(SumFormula {
            elements: parse_formula(formula)?,
        })
    }

    /// Build a formula from `(symbol, count)` pairs, repeated symbols are summed.
    pub fn from_counts<I, S>(counts: I) -> Result<Self, FormulaError>
    where
        I: IntoIterator<Item = (S, i32)>,
        S: AsRef<str>,
    {
        let mut elements = BTreeMap::new();
        for (symbol, count) in counts {
            let symbol = symbol.as_ref();
            if monoisotopic_mass(symbol).is_none() {
                return Err(FormulaError::UnknownElement(symbol.to_string()));
            }
            add_count(&mut elements, symbol.to_string(), count)?;
        }
        check_counts(&mut elements)?;
        Ok(SumFormula { elements })
    }

    pub fn empty() -> Self {
        SumFormula::default()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn count(&self, symbol: &str) -> i32 {
        self.elements.get(symbol).copied().unwrap_or(0)
    }

    /// Elements with their counts in alphabetical symbol order.
    pub fn elements(&self) -> impl Iterator<Item = (&str, i32)> + '_ {
        self.elements.iter().map(|(symbol, count)| (symbol.as_str(), *count))
    }

    /// Total number of atoms, bounded by `i32::MAX` when the formula is built.
    pub fn atom_count(&self) -> i32 {
        self.elements.values().fold(0, |acc, &count| acc.saturating_add(count))
    }

    /// Calculate the monoisotopic weight of the chemical formula.
    ///
    /// # Example
    ///
    /// ```
    /// use fragcore::chemistry::sum_formula::SumFormula;
    ///
    /// let water = SumFormula::new("H2O").unwrap();
    /// assert!((water.monoisotopic_weight() - 18.01056468403).abs() < 1e-9);
    /// ```
    pub fn monoisotopic_weight(&self) -> f64 {
        self.elements.iter().fold(0.0, |acc, (element, count)| {
            acc + monoisotopic_mass(element).unwrap_or_default() * *count as f64
        })
    }

    /// Ring and double bond equivalents, `1 + sum(n * (valence - 2)) / 2`.
    ///
    /// # Example
    ///
    /// ```
    /// use fragcore::chemistry::sum_formula::SumFormula;
    ///
    /// let benzene = SumFormula::new("C6H6").unwrap();
    /// assert_eq!(benzene.rdbe(), 4.0);
    /// ```
    pub fn rdbe(&self) -> f64 {
        let sum: i64 = self
            .elements
            .iter()
            .map(|(element, &count)| i64::from(count) * i64::from(valence(element).unwrap_or(2) - 2))
            .sum();
        1.0 + sum as f64 / 2.0
    }

    /// `true` if no element of `self` occurs more often than in `other`.
    pub fn is_sub_formula_of(&self, other: &SumFormula) -> bool {
        self.elements
            .iter()
            .all(|(element, count)| *count <= other.count(element))
    }

    /// Sub-formula that differs from `other` in at least one atom.
    pub fn is_proper_sub_formula_of(&self, other: &SumFormula) -> bool {
        self.atom_count() < other.atom_count() && self.is_sub_formula_of(other)
    }

    /// `self - other`, or `None` if any count would become negative.
    ///
    /// # Example
    ///
    /// ```
    /// use fragcore::chemistry::sum_formula::SumFormula;
    ///
    /// let parent = SumFormula::new("C6H12O6").unwrap();
    /// let child = SumFormula::new("C6H10O5").unwrap();
    /// assert_eq!(parent.checked_sub(&child), Some(SumFormula::new("H2O").unwrap()));
    /// assert_eq!(child.checked_sub(&parent), None);
    /// ```
    pub fn checked_sub(&self, other: &SumFormula) -> Option<SumFormula> {
        if !other.is_sub_formula_of(self) {
            return None;
        }
        let elements = self
            .elements
            .iter()
            .filter_map(|(element, count)| {
                let remaining = count - other.count(element);
                (remaining > 0).then(|| (element.clone(), remaining))
            })
            .collect();
        Some(SumFormula { elements })
    }
}

impl Display for SumFormula {
    /// Hill notation: carbon, hydrogen, then the remaining symbols alphabetically.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let write_element = |f: &mut Formatter<'_>, element: &str, count: i32| {
            if count == 1 {
                write!(f, "{}", element)
            } else {
                write!(f, "{}{}", element, count)
            }
        };

        let has_carbon = self.elements.contains_key("C");
        if has_carbon {
            write_element(f, "C", self.count("C"))?;
            if let Some(&h) = self.elements.get("H") {
                write_element(f, "H", h)?;
            }
        }
        for (element, &count) in &self.elements {
            if has_carbon && (element == "C" || element == "H") {
                continue;
            }
            write_element(f, element, count)?;
        }
        Ok(())
    }
}

impl FromStr for SumFormula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SumFormula::new(s)
    }
}

impl TryFrom<String> for SumFormula {
    type Error = FormulaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SumFormula::new(&value)
    }
}

impl From<SumFormula> for String {
    fn from(formula: SumFormula) -> Self {
        formula.to_string()
    }
}

fn add_count(elements: &mut BTreeMap<String, i32>, element: String, count: i32) -> Result<(), FormulaError> {
    let entry = elements.entry(element).or_insert(0);
    let current = *entry;
    *entry = current
        .checked_add(count)
        .ok_or_else(|| FormulaError::InvalidCount(format!("{} + {}", current, count)))?;
    Ok(())
}

fn check_counts(elements: &mut BTreeMap<String, i32>) -> Result<(), FormulaError> {
    if let Some((element, &count)) = elements.iter().find(|(_, &count)| count < 0) {
        return Err(FormulaError::NegativeCount {
            element: element.clone(),
            count,
        });
    }
    elements.retain(|_, count| *count != 0);
    // the total atom count must fit an i32 so that sums over a formula cannot overflow
    let total: i64 = elements.values().map(|&count| i64::from(count)).sum();
    if total > i64::from(i32::MAX) {
        return Err(FormulaError::InvalidCount(format!("{} atoms in total", total)));
    }
    Ok(())
}

/// Parse a chemical formula into a map of elements and their counts.
///
/// Arguments:
///
/// * `formula` - The chemical formula to parse.
///
/// Returns:
///
/// * `Result<BTreeMap<String, i32>, FormulaError>` - A map of elements and their counts.
///
/// # Example
///
/// ```
/// use fragcore::chemistry::sum_formula::parse_formula;
///
/// let formula = "H2O";
/// let elements = parse_formula(formula).unwrap();
/// assert_eq!(elements.get("H"), Some(&2));
/// assert_eq!(elements.get("O"), Some(&1));
/// ```
pub fn parse_formula(formula: &str) -> Result<BTreeMap<String, i32>, FormulaError> {
    let mut element_counts = BTreeMap::new();
    let mut chars = formula.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        if !c.is_ascii_uppercase() {
            return Err(FormulaError::UnexpectedCharacter(c));
        }

        let mut current_element = c.to_string();
        while let Some(&next) = chars.peek() {
            if !next.is_ascii_lowercase() {
                break;
            }
            current_element.push(next);
            chars.next();
        }

        let mut current_count = String::new();
        while let Some(&next) = chars.peek() {
            if !next.is_ascii_digit() {
                break;
            }
            current_count.push(next);
            chars.next();
        }

        if monoisotopic_mass(&current_element).is_none() {
            return Err(FormulaError::UnknownElement(current_element));
        }
        let count = if current_count.is_empty() {
            1
        } else {
            current_count
                .parse::<i32>()
                .map_err(|_| FormulaError::InvalidCount(current_count.clone()))?
        };
        add_count(&mut element_counts, current_element, count)?;
    }

    check_counts(&mut element_counts)?;
    Ok(element_counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("C6H12O6", "C6H12O6")]
    #[case("H2O", "H2O")]
    #[case("OH2", "H2O")]
    #[case("ClC2H3", "C2H3Cl")]
    #[case("C6 H5", "C6H5")]
    #[case("NaCl", "ClNa")]
    #[case("C0H4", "H4")]
    fn parses_and_prints_hill_order(#[case] input: &str, #[case] expected: &str) {
        let formula = SumFormula::new(input).unwrap();
        assert_eq!(formula.to_string(), expected);
    }

    #[rstest]
    #[case("Xy2", FormulaError::UnknownElement("Xy".to_string()))]
    #[case("c6", FormulaError::UnexpectedCharacter('c'))]
    #[case("C6-H", FormulaError::UnexpectedCharacter('-'))]
    #[case("C99999999999", FormulaError::InvalidCount("99999999999".to_string()))]
    fn rejects_malformed_formulas(#[case] input: &str, #[case] expected: FormulaError) {
        assert_eq!(SumFormula::new(input).unwrap_err(), expected);
    }

    #[rstest]
    #[case("C2000000000C2000000000")]
    #[case("O2000000000H2000000000")]
    #[case("C2147483647H")]
    fn rejects_counts_that_overflow(#[case] input: &str) {
        assert!(matches!(SumFormula::new(input), Err(FormulaError::InvalidCount(_))));
    }

    #[test]
    fn large_counts_stay_within_range() {
        let big = SumFormula::new("C1000000000H1000000000").unwrap();
        assert_eq!(big.atom_count(), 2_000_000_000);
        assert!(SumFormula::new("CH").unwrap().is_proper_sub_formula_of(&big));
        assert_eq!(SumFormula::new("C2000000000").unwrap().rdbe(), 2_000_000_001.0);
        assert!(matches!(
            SumFormula::from_counts([("C", i32::MAX), ("C", 1)]),
            Err(FormulaError::InvalidCount(_))
        ));
        assert!(matches!(
            SumFormula::from_counts([("C", 2_000_000_000), ("H", 2_000_000_000)]),
            Err(FormulaError::InvalidCount(_))
        ));
    }

    #[test]
    fn empty_formula_has_no_mass() {
        let empty = SumFormula::new("").unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty, SumFormula::empty());
        assert_eq!(empty.monoisotopic_weight(), 0.0);
        assert_eq!(empty.to_string(), "");
    }

    #[test]
    fn from_counts_validates() {
        let formula = SumFormula::from_counts([("C", 2), ("H", 4), ("C", 1)]).unwrap();
        assert_eq!(formula.to_string(), "C3H4");
        assert!(matches!(
            SumFormula::from_counts([("H", -1)]),
            Err(FormulaError::NegativeCount { .. })
        ));
        assert!(matches!(
            SumFormula::from_counts([("Q", 1)]),
            Err(FormulaError::UnknownElement(_))
        ));
    }

    #[test]
    fn sub_formula_relations() {
        let parent = SumFormula::new("C6H12O6").unwrap();
        let child = SumFormula::new("C6H10O5").unwrap();
        let other = SumFormula::new("C6H10N").unwrap();

        assert!(child.is_sub_formula_of(&parent));
        assert!(child.is_proper_sub_formula_of(&parent));
        assert!(parent.is_sub_formula_of(&parent));
        assert!(!parent.is_proper_sub_formula_of(&parent));
        assert!(!other.is_sub_formula_of(&parent));
        assert!(SumFormula::empty().is_proper_sub_formula_of(&parent));
    }

    #[test]
    fn loss_mass_is_mass_difference() {
        let parent = SumFormula::new("C8H10N4O2").unwrap();
        let child = SumFormula::new("C6H7N3O").unwrap();
        let loss = parent.checked_sub(&child).unwrap();
        assert_eq!(loss.to_string(), "C2H3NO");
        let diff = parent.monoisotopic_weight() - child.monoisotopic_weight();
        assert!((loss.monoisotopic_weight() - diff).abs() < 1e-9);
    }

    #[test]
    fn rdbe_of_known_compounds() {
        assert_eq!(SumFormula::new("C6H5").unwrap().rdbe(), 4.5);
        assert_eq!(SumFormula::new("CH4").unwrap().rdbe(), 0.0);
        assert_eq!(SumFormula::new("C8H10N4O2").unwrap().rdbe(), 6.0);
    }

    #[test]
    fn serde_uses_formula_text() {
        let formula = SumFormula::new("C2H6O").unwrap();
        let json = serde_json::to_string(&formula).unwrap();
        assert_eq!(json, "\"C2H6O\"");
        let back: SumFormula = serde_json::from_str(&json).unwrap();
        assert_eq!(back, formula);
        assert!(serde_json::from_str::<SumFormula>("\"C2Zz\"").is_err());
    }
}
