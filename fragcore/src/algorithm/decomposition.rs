use crate::chemistry::elements::monoisotopic_mass;
use crate::chemistry::sum_formula::SumFormula;

/// enumerate all non-empty sub-formulas of `parent` with a monoisotopic mass in `[min_mass, max_mass]`
///
/// Arguments:
///
/// * `parent` - formula whose element counts bound the enumeration
/// * `min_mass` - lower neutral mass bound in Da (inclusive)
/// * `max_mass` - upper neutral mass bound in Da (inclusive)
///
/// Returns:
///
/// * `Vec<SumFormula>` - matching sub-formulas sorted by formula
///
/// # Examples
///
/// ```
/// use fragcore::algorithm::decomposition::decompose_sub_formulas;
/// use fragcore::chemistry::sum_formula::SumFormula;
///
/// let glucose = SumFormula::new("C6H12O6").unwrap();
/// let water = decompose_sub_formulas(&glucose, 18.0, 18.02);
/// assert_eq!(water, vec![SumFormula::new("H2O").unwrap()]);
/// ```
pub fn decompose_sub_formulas(parent: &SumFormula, min_mass: f64, max_mass: f64) -> Vec<SumFormula> {
    if min_mass.is_nan() || max_mass.is_nan() || min_mass > max_mass || max_mass <= 0.0 {
        return Vec::new();
    }

    // heavy elements first, their branches leave the window soonest
    let mut alphabet: Vec<(&str, i32, f64)> = parent
        .elements()
        .filter_map(|(symbol, count)| monoisotopic_mass(symbol).map(|mass| (symbol, count, mass)))
        .collect();
    alphabet.sort_by(|a, b| b.2.total_cmp(&a.2).then_with(|| a.0.cmp(b.0)));

    // mass still reachable from element i onwards
    let mut reachable = vec![0.0; alphabet.len() + 1];
    for i in (0..alphabet.len()).rev() {
        reachable[i] = reachable[i + 1] + alphabet[i].1 as f64 * alphabet[i].2;
    }

    let mut counts = vec![0; alphabet.len()];
    let mut result = Vec::new();
    let mut search = Search {
        alphabet: &alphabet,
        reachable: &reachable,
        min_mass,
        max_mass,
        counts: &mut counts,
        result: &mut result,
    };
    search.descend(0, 0.0);

    result.sort();
    result
}

struct Search<'a> {
    alphabet: &'a [(&'a str, i32, f64)],
    reachable: &'a [f64],
    min_mass: f64,
    max_mass: f64,
    counts: &'a mut Vec<i32>,
    result: &'a mut Vec<SumFormula>,
}

impl Search<'_> {
    fn descend(&mut self, depth: usize, mass: f64) {
        if mass + self.reachable[depth] < self.min_mass {
            return;
        }
        if depth == self.alphabet.len() {
            if mass >= self.min_mass && mass <= self.max_mass && self.counts.iter().any(|&c| c > 0) {
                let formula = self
                    .alphabet
                    .iter()
                    .zip(self.counts.iter())
                    .filter(|&(_, &count)| count > 0)
                    .map(|(&(symbol, _, _), &count)| (symbol, count));
                if let Ok(formula) = SumFormula::from_counts(formula) {
                    self.result.push(formula);
                }
            }
            return;
        }

        let (_, max_count, element_mass) = self.alphabet[depth];
        for count in 0..=max_count {
            let next = mass + count as f64 * element_mass;
            if next > self.max_mass {
                break;
            }
            self.counts[depth] = count;
            self.descend(depth + 1, next);
        }
        self.counts[depth] = 0;
    }
}
