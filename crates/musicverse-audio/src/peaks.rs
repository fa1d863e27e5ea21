//! Waveform peak extraction for audio visualization.
//!
//! Reduces a mono PCM buffer to a fixed number of max-envelope values
//! normalized to `[0, 1]`. Max (not RMS) keeps transients visible.

use musicverse_core::{Result, StudioError};

/// Normalized peak envelope, one value per display bucket.
pub type PeakArray = Vec<f32>;

/// Compute `target_count` normalized peaks from mono `samples`.
///
/// The buffer is split into windows of `ceil(len / target_count)` samples
/// (the last one may be shorter). Buckets past the end of a short buffer
/// stay at zero. Silent input returns all zeros.
pub fn compute_peaks(samples: &[f32], target_count: usize) -> Result<PeakArray> {
    if target_count == 0 {
        return Err(StudioError::InvalidArgument(
            "target peak count must be greater than zero".into(),
        ));
    }
    ensure_finite(samples)?;

    let mut peaks = vec![0.0f32; target_count];
    if samples.is_empty() {
        return Ok(peaks);
    }

    let window_size = samples.len().div_ceil(target_count);
    for (peak, window) in peaks.iter_mut().zip(samples.chunks(window_size)) {
        *peak = window.iter().fold(0.0f32, |max, &s| max.max(s.abs()));
    }

    let global_max = peaks.iter().copied().fold(0.0f32, f32::max);
    if global_max == 0.0 {
        return Ok(peaks);
    }
    for peak in peaks.iter_mut() {
        *peak /= global_max;
    }
    Ok(peaks)
}

/// Reject buffers containing NaN or infinite samples.
pub fn ensure_finite(samples: &[f32]) -> Result<()> {
    match samples.iter().position(|s| !s.is_finite()) {
        Some(index) => Err(StudioError::InvalidArgument(format!(
            "sample {} is not a finite value",
            index
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use musicverse_core::ErrorKind;
    use proptest::prelude::*;

    #[test]
    fn test_alternating_scenario() {
        let pattern = [1.0f32, -1.0, 0.5, -0.5];
        let samples: Vec<f32> = (0..1000).map(|i| pattern[i % 4]).collect();
        let peaks = compute_peaks(&samples, 10).unwrap();
        assert_eq!(peaks.len(), 10);
        let max = peaks.iter().copied().fold(0.0f32, f32::max);
        assert_eq!(max, 1.0);
        assert!(peaks.iter().all(|&p| p >= 0.0));
    }

    #[test]
    fn test_envelope_shape() {
        // 4 windows of 25: quiet, loud, medium, silent
        let mut samples = vec![0.1f32; 25];
        samples.extend(vec![-0.8f32; 25]);
        samples.extend(vec![0.4f32; 25]);
        samples.extend(vec![0.0f32; 25]);
        let peaks = compute_peaks(&samples, 4).unwrap();
        assert!((peaks[0] - 0.125).abs() < 1e-6);
        assert_eq!(peaks[1], 1.0);
        assert!((peaks[2] - 0.5).abs() < 1e-6);
        assert_eq!(peaks[3], 0.0);
    }

    #[test]
    fn test_uneven_final_window() {
        // ceil(10 / 4) = 3 → windows [0..3], [3..6], [6..9], [9..10]
        let samples = [0.0, 0.0, 0.2, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -0.4];
        let peaks = compute_peaks(&samples, 4).unwrap();
        assert_eq!(peaks, vec![0.5, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_more_buckets_than_samples() {
        let peaks = compute_peaks(&[0.5, -0.25], 5).unwrap();
        assert_eq!(peaks, vec![1.0, 0.5, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(compute_peaks(&[], 8).unwrap(), vec![0.0; 8]);
    }

    #[test]
    fn test_silence() {
        let peaks = compute_peaks(&vec![0.0f32; 4096], 16).unwrap();
        assert_eq!(peaks, vec![0.0; 16]);
        assert!(peaks.iter().all(|p| !p.is_nan()));
    }

    #[test]
    fn test_zero_target_rejected() {
        let err = compute_peaks(&[0.5], 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = compute_peaks(&[0.5, f32::NAN], 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    proptest! {
        #[test]
        fn prop_length_and_range(
            samples in prop::collection::vec(-1.0f32..=1.0, 0..2000),
            target in 1usize..300,
        ) {
            let peaks = compute_peaks(&samples, target).unwrap();
            prop_assert_eq!(peaks.len(), target);
            prop_assert!(peaks.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }

        #[test]
        fn prop_normalized_when_not_silent(
            samples in prop::collection::vec(-1.0f32..=1.0, 1..2000),
            target in 1usize..300,
        ) {
            prop_assume!(samples.iter().any(|&s| s != 0.0));
            let peaks = compute_peaks(&samples, target).unwrap();
            let max = peaks.iter().copied().fold(0.0f32, f32::max);
            prop_assert!((max as f64 - 1.0).abs() < 1e-9);
        }

        #[test]
        fn prop_deterministic(
            samples in prop::collection::vec(-1.0f32..=1.0, 0..1000),
            target in 1usize..100,
        ) {
            prop_assert_eq!(
                compute_peaks(&samples, target).unwrap(),
                compute_peaks(&samples, target).unwrap()
            );
        }
    }
}
