use nalgebra::DMatrix;

use crate::data::input::ProcessedInput;
use crate::scoring::contracts::{PeakPairScorer, PeakScorer};

/// Log-odds of a peak being a signal rather than noise.
///
/// Scores `ln(relative_intensity / median_noise_intensity)`; a peak without
/// intensity scores `-inf` and can never be explained.
#[derive(Clone, Copy, Debug, Default)]
pub struct PeakIntensityScorer;

impl PeakScorer for PeakIntensityScorer {
    fn name(&self) -> &str {
        "peak-intensity"
    }

    fn score(&self, input: &ProcessedInput, scores: &mut [f64]) {
        let noise = input.profile().median_noise_intensity;
        for (position, score) in scores.iter_mut().enumerate() {
            *score = (input.relative_intensity(position) / noise).ln();
        }
    }
}

/// Penalizes loss edges between peaks that are far apart in m/z.
///
/// Scores `ln(1 - |mz_i - mz_j| / max(mz_i, mz_j))`. The diagonal stays zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct RelativeLossSizeScorer;

impl PeakPairScorer for RelativeLossSizeScorer {
    fn name(&self) -> &str {
        "relative-loss-size"
    }

    fn score(&self, input: &ProcessedInput, scores: &mut DMatrix<f64>) {
        let peaks = input.peaks();
        for i in 0..peaks.len() {
            for j in (i + 1)..peaks.len() {
                let (a, b) = (peaks[i].mz, peaks[j].mz);
                let score = (1.0 - (a - b).abs() / a.max(b)).ln();
                scores[(i, j)] = score;
                scores[(j, i)] = score;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::peak::ProcessedPeak;
    use crate::data::profile::MeasurementProfile;

    fn input() -> ProcessedInput {
        let peaks = vec![
            ProcessedPeak::new(0, 50.0, 0.0),
            ProcessedPeak::new(1, 100.0, 2.0),
            ProcessedPeak::new(2, 200.0, 100.0),
        ];
        ProcessedInput::new(peaks, MeasurementProfile::default()).unwrap()
    }

    #[test]
    fn intensity_relative_to_noise() {
        let input = input();
        let mut scores = vec![0.0; 3];
        PeakIntensityScorer.score(&input, &mut scores);
        assert_eq!(scores[0], f64::NEG_INFINITY);
        // 0.02 relative intensity equals the default noise level
        assert!(scores[1].abs() < 1e-12);
        assert!((scores[2] - (1.0f64 / 0.02).ln()).abs() < 1e-12);
    }

    #[test]
    fn loss_size_matrix_is_symmetric() {
        let input = input();
        let mut scores = DMatrix::zeros(3, 3);
        RelativeLossSizeScorer.score(&input, &mut scores);
        assert_eq!(scores, scores.transpose());
        assert_eq!(scores[(1, 1)], 0.0);
        assert!((scores[(1, 2)] - 0.5f64.ln()).abs() < 1e-12);
        assert!((scores[(0, 2)] - 0.25f64.ln()).abs() < 1e-12);
    }
}
