use serde::{Deserialize, Serialize};

/// A centroided MS/MS peak as delivered by spectrum preprocessing.
///
/// `index` is the peak's unique identifier and doubles as its color in the
/// fragmentation graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessedPeak {
    pub index: usize,
    pub mz: f64,
    pub intensity: f64,
    /// Index of the monoisotopic peak if this peak is one of its isotopes
    #[serde(default)]
    pub isotope_of: Option<usize>,
}

impl ProcessedPeak {
    pub fn new(index: usize, mz: f64, intensity: f64) -> Self {
        ProcessedPeak {
            index,
            mz,
            intensity,
            isotope_of: None,
        }
    }

    pub fn isotope(index: usize, mz: f64, intensity: f64, monoisotopic: usize) -> Self {
        ProcessedPeak {
            index,
            mz,
            intensity,
            isotope_of: Some(monoisotopic),
        }
    }

    #[inline]
    pub fn is_isotope(&self) -> bool {
        self.isotope_of.is_some()
    }
}
