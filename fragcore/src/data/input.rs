use std::collections::HashMap;

use ordered_float::OrderedFloat;

use crate::data::peak::ProcessedPeak;
use crate::data::profile::MeasurementProfile;
use crate::error::InputError;

/// The read-only analysis context of one spectrum: its peaks and the
/// measurement profile they were recorded with.
///
/// Scorers receive this context; a single instance is shared by every
/// candidate formula of the spectrum.
#[derive(Clone, Debug)]
pub struct ProcessedInput {
    peaks: Vec<ProcessedPeak>,
    profile: MeasurementProfile,
    positions: HashMap<usize, usize>,
    max_intensity: f64,
}

impl ProcessedInput {
    /// Validate the profile and the peak list; peaks are sorted by m/z.
    ///
    /// # Example
    ///
    /// ```
    /// use fragcore::data::input::ProcessedInput;
    /// use fragcore::data::peak::ProcessedPeak;
    /// use fragcore::data::profile::MeasurementProfile;
    ///
    /// let peaks = vec![ProcessedPeak::new(1, 181.07, 100.0), ProcessedPeak::new(0, 163.06, 40.0)];
    /// let input = ProcessedInput::new(peaks, MeasurementProfile::default()).unwrap();
    /// assert_eq!(input.peaks()[0].index, 0);
    /// assert_eq!(input.relative_intensity(0), 0.4);
    /// ```
    pub fn new(mut peaks: Vec<ProcessedPeak>, profile: MeasurementProfile) -> Result<Self, InputError> {
        profile.validate()?;

        for peak in &peaks {
            if peak.index == usize::MAX {
                return Err(InputError::InvalidPeak {
                    index: peak.index,
                    reason: "index is reserved for the synthetic precursor".to_string(),
                });
            }
            if !peak.mz.is_finite() || peak.mz <= 0.0 {
                return Err(InputError::InvalidPeak {
                    index: peak.index,
                    reason: format!("m/z must be finite and positive, got {}", peak.mz),
                });
            }
            if !peak.intensity.is_finite() || peak.intensity < 0.0 {
                return Err(InputError::InvalidPeak {
                    index: peak.index,
                    reason: format!("intensity must be finite and non-negative, got {}", peak.intensity),
                });
            }
        }

        peaks.sort_by_key(|p| (OrderedFloat(p.mz), p.index));

        let mut positions = HashMap::with_capacity(peaks.len());
        for (position, peak) in peaks.iter().enumerate() {
            if positions.insert(peak.index, position).is_some() {
                return Err(InputError::DuplicatePeak(peak.index));
            }
        }

        for peak in &peaks {
            if let Some(parent) = peak.isotope_of {
                let valid = parent != peak.index
                    && positions
                        .get(&parent)
                        .map_or(false, |&pos| !peaks[pos].is_isotope());
                if !valid {
                    return Err(InputError::UnknownIsotopeParent { peak: peak.index, parent });
                }
            }
        }

        let max_intensity = peaks.iter().map(|p| p.intensity).fold(0.0, f64::max);

        Ok(ProcessedInput {
            peaks,
            profile,
            positions,
            max_intensity,
        })
    }

    /// Peaks sorted by ascending m/z.
    pub fn peaks(&self) -> &[ProcessedPeak] {
        &self.peaks
    }

    pub fn profile(&self) -> &MeasurementProfile {
        &self.profile
    }

    /// Position in [`ProcessedInput::peaks`] of the peak with the given color.
    pub fn position_of(&self, color: usize) -> Option<usize> {
        self.positions.get(&color).copied()
    }

    /// Intensity of the peak at `position` relative to the base peak.
    pub fn relative_intensity(&self, position: usize) -> f64 {
        if self.max_intensity > 0.0 {
            self.peaks[position].intensity / self.max_intensity
        } else {
            0.0
        }
    }

    /// Positions of the isotope peaks of `color`, ascending in m/z.
    pub fn isotopes_of(&self, color: usize) -> Vec<usize> {
        self.peaks
            .iter()
            .enumerate()
            .filter(|(_, p)| p.isotope_of == Some(color))
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Color reserved for a precursor peak that is missing from the spectrum.
    pub fn synthetic_precursor_color(&self) -> usize {
        self.peaks.iter().map(|p| p.index.saturating_add(1)).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peaks() -> Vec<ProcessedPeak> {
        vec![
            ProcessedPeak::new(2, 181.0707, 50.0),
            ProcessedPeak::new(0, 85.0284, 100.0),
            ProcessedPeak::isotope(3, 182.0741, 5.0, 2),
            ProcessedPeak::isotope(4, 183.0771, 1.0, 2),
            ProcessedPeak::new(1, 163.0601, 20.0),
        ]
    }

    #[test]
    fn sorts_and_indexes_peaks() {
        let input = ProcessedInput::new(peaks(), MeasurementProfile::default()).unwrap();
        let order: Vec<usize> = input.peaks().iter().map(|p| p.index).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        assert_eq!(input.position_of(2), Some(2));
        assert_eq!(input.peaks()[input.position_of(4).unwrap()].intensity, 1.0);
        assert_eq!(input.relative_intensity(2), 0.5);
        assert_eq!(input.isotopes_of(2), vec![3, 4]);
        assert!(input.isotopes_of(0).is_empty());
        assert_eq!(input.synthetic_precursor_color(), 5);
    }

    #[test]
    fn rejects_duplicate_indices() {
        let mut list = peaks();
        list.push(ProcessedPeak::new(1, 99.0, 3.0));
        assert_eq!(
            ProcessedInput::new(list, MeasurementProfile::default()).unwrap_err(),
            InputError::DuplicatePeak(1)
        );
    }

    #[test]
    fn rejects_invalid_peaks() {
        let list = vec![ProcessedPeak::new(0, f64::NAN, 1.0)];
        assert!(matches!(
            ProcessedInput::new(list, MeasurementProfile::default()),
            Err(InputError::InvalidPeak { index: 0, .. })
        ));
        let list = vec![ProcessedPeak::new(0, 100.0, -1.0)];
        assert!(ProcessedInput::new(list, MeasurementProfile::default()).is_err());
    }

    #[test]
    fn largest_peak_index_is_reserved() {
        let list = vec![ProcessedPeak::new(usize::MAX, 100.0, 1.0)];
        assert!(matches!(
            ProcessedInput::new(list, MeasurementProfile::default()),
            Err(InputError::InvalidPeak { index: usize::MAX, .. })
        ));

        let list = vec![ProcessedPeak::new(usize::MAX - 1, 100.0, 1.0)];
        let input = ProcessedInput::new(list, MeasurementProfile::default()).unwrap();
        assert_eq!(input.synthetic_precursor_color(), usize::MAX);
    }

    #[test]
    fn rejects_dangling_isotope_parents() {
        let list = vec![ProcessedPeak::new(0, 100.0, 1.0), ProcessedPeak::isotope(1, 101.0, 1.0, 7)];
        assert_eq!(
            ProcessedInput::new(list, MeasurementProfile::default()).unwrap_err(),
            InputError::UnknownIsotopeParent { peak: 1, parent: 7 }
        );

        let chained = vec![
            ProcessedPeak::new(0, 100.0, 1.0),
            ProcessedPeak::isotope(1, 101.0, 1.0, 0),
            ProcessedPeak::isotope(2, 102.0, 1.0, 1),
        ];
        assert!(ProcessedInput::new(chained, MeasurementProfile::default()).is_err());
    }

    #[test]
    fn empty_spectrum_is_fine() {
        let input = ProcessedInput::new(Vec::new(), MeasurementProfile::default()).unwrap();
        assert!(input.peaks().is_empty());
        assert_eq!(input.synthetic_precursor_color(), 0);
    }
}
