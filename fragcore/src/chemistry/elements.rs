/// monoisotopic mass of the most abundant isotope of an element
///
/// Arguments:
///
/// * `symbol` - element symbol, e.g. "C" or "Cl"
///
/// Returns:
///
/// * `Option<f64>` - mass in unified atomic mass units, `None` for unknown symbols
///
/// # Examples
///
/// ```
/// use fragcore::chemistry::elements::monoisotopic_mass;
///
/// assert_eq!(monoisotopic_mass("C"), Some(12.0));
/// assert_eq!(monoisotopic_mass("Xx"), None);
/// ```
pub fn monoisotopic_mass(symbol: &str) -> Option<f64> {
    let mass = match symbol {
        "H" => 1.00782503223,
        "B" => 11.00930536,
        "C" => 12.0000000,
        "N" => 14.00307400443,
        "O" => 15.99491461957,
        "F" => 18.99840316273,
        "Na" => 22.9897692820,
        "Si" => 27.97692653465,
        "P" => 30.97376199842,
        "S" => 31.9720711744,
        "Cl" => 34.968852682,
        "K" => 38.963706679,
        "Se" => 79.9165218,
        "Br" => 78.9183376,
        "I" => 126.9044719,
        _ => return None,
    };
    Some(mass)
}

/// Standard valence used for ring and double bond equivalents.
pub fn valence(symbol: &str) -> Option<i32> {
    let valence = match symbol {
        "H" | "F" | "Na" | "Cl" | "K" | "Br" | "I" => 1,
        "O" | "S" | "Se" => 2,
        "B" | "N" | "P" => 3,
        "C" | "Si" => 4,
        _ => return None,
    };
    Some(valence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_element_has_mass_and_valence() {
        let symbols = ["H", "B", "C", "N", "O", "F", "Na", "Si", "P", "S", "Cl", "K", "Se", "Br", "I"];
        for symbol in symbols {
            assert!(monoisotopic_mass(symbol).is_some(), "{symbol}");
            assert!(valence(symbol).is_some(), "{symbol}");
        }
        assert_eq!(monoisotopic_mass("Xx"), None);
        assert_eq!(valence("Xx"), None);
    }
}
