//! FFT Utilities for Spectral Estimation
//!
//! Shared FFT/inverse-FFT, center-shift, and normalization primitives used
//! by every spectral objective in this library.
//!
//! ## Why the odd length matters
//!
//! A length-M waveform is zero-padded to 2M−1 samples before transforming,
//! so that the FFT-domain comparison against a length-2M−1 template sees
//! the full aperiodic (linear, not circular) spectral content. Because the
//! working length is odd, `fft_shift` and `ifft_shift` are *not* the same
//! operation — the gradient chain applies them in a fixed order and mixing
//! them up silently corrupts the descent direction.
//!
//! ```text
//!  bin:      0  1  2  3  4  5  6        (L = 7)
//!  shift:    4  5  6 |0| 1  2  3        zero bin lands at the midpoint
//!  unshift:  3  4  5  6 |0| 1  2  →  restores the original order
//! ```
//!
//! ## Example
//!
//! ```rust
//! use pcfm_core::fft_utils::{SpectralProcessor, fft_shift, ifft_shift};
//! use num_complex::Complex64;
//!
//! let mut proc = SpectralProcessor::new(15);
//! let signal = vec![Complex64::new(1.0, 0.0); 8];
//! let spectrum = proc.fft(&signal); // zero-padded to 15 internally
//! let shifted = fft_shift(&spectrum);
//! assert_eq!(ifft_shift(&shifted), spectrum);
//! ```

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

use crate::types::{DesignError, DesignResult, IQSample};

/// FFT processor with cached forward/inverse plans and a scratch buffer.
pub struct SpectralProcessor {
    /// Transform length
    size: usize,
    /// Forward FFT instance
    fft_forward: Arc<dyn Fft<f64>>,
    /// Inverse FFT instance
    fft_inverse: Arc<dyn Fft<f64>>,
    /// Scratch buffer for in-place transforms
    scratch: Vec<Complex64>,
}

impl fmt::Debug for SpectralProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralProcessor")
            .field("size", &self.size)
            .finish()
    }
}

impl SpectralProcessor {
    /// Create a new processor for the given transform length.
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft_forward = planner.plan_fft_forward(size);
        let fft_inverse = planner.plan_fft_inverse(size);
        let scratch_len = fft_forward
            .get_inplace_scratch_len()
            .max(fft_inverse.get_inplace_scratch_len());
        let scratch = vec![Complex64::new(0.0, 0.0); scratch_len];

        Self {
            size,
            fft_forward,
            fft_inverse,
            scratch,
        }
    }

    /// Get the transform length.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Compute the forward FFT in-place.
    pub fn fft_inplace(&mut self, buffer: &mut [Complex64]) {
        assert_eq!(buffer.len(), self.size);
        self.fft_forward
            .process_with_scratch(buffer, &mut self.scratch);
    }

    /// Compute the forward FFT, zero-padding the input to the transform length.
    pub fn fft(&mut self, input: &[IQSample]) -> Vec<Complex64> {
        let mut buffer: Vec<Complex64> = input.to_vec();
        buffer.resize(self.size, Complex64::new(0.0, 0.0));
        self.fft_inplace(&mut buffer);
        buffer
    }

    /// Compute the inverse FFT in-place, including the 1/N normalization.
    pub fn ifft_inplace(&mut self, buffer: &mut [Complex64]) {
        assert_eq!(buffer.len(), self.size);
        self.fft_inverse
            .process_with_scratch(buffer, &mut self.scratch);

        let scale = 1.0 / self.size as f64;
        for sample in buffer.iter_mut() {
            *sample *= scale;
        }
    }

    /// Compute the inverse FFT, returning a new buffer.
    pub fn ifft(&mut self, input: &[Complex64]) -> Vec<Complex64> {
        let mut buffer = input.to_vec();
        buffer.resize(self.size, Complex64::new(0.0, 0.0));
        self.ifft_inplace(&mut buffer);
        buffer
    }
}

/// FFT shift — move the zero-frequency bin to the array midpoint.
///
/// For odd lengths the split point is ⌈n/2⌉, so bin 0 lands exactly at
/// index (n−1)/2. Inverse operation: [`ifft_shift`].
pub fn fft_shift<T: Clone>(spectrum: &[T]) -> Vec<T> {
    let n = spectrum.len();
    let split = (n + 1) / 2;
    let mut shifted = Vec::with_capacity(n);
    shifted.extend_from_slice(&spectrum[split..]);
    shifted.extend_from_slice(&spectrum[..split]);
    shifted
}

/// Inverse FFT shift — undo [`fft_shift`], restoring natural bin order.
pub fn ifft_shift<T: Clone>(spectrum: &[T]) -> Vec<T> {
    let n = spectrum.len();
    let split = n / 2;
    let mut shifted = Vec::with_capacity(n);
    shifted.extend_from_slice(&spectrum[split..]);
    shifted.extend_from_slice(&spectrum[..split]);
    shifted
}

/// Normalize a spectrum by its own peak magnitude, in place.
///
/// Returns the peak magnitude that was divided out. An all-zero spectrum
/// cannot be normalized and is reported as [`DesignError::ZeroSpectralPeak`]
/// rather than silently producing NaN.
pub fn normalize_peak(spectrum: &mut [Complex64]) -> DesignResult<f64> {
    let peak = spectrum.iter().map(|c| c.norm()).fold(0.0f64, f64::max);
    if peak <= 0.0 {
        return Err(DesignError::ZeroSpectralPeak);
    }
    let inv = 1.0 / peak;
    for sample in spectrum.iter_mut() {
        *sample *= inv;
    }
    Ok(peak)
}

/// Convert normalized power values to dB, clipped to a floor.
///
/// Inputs at or below zero clip to the floor instead of producing -inf.
pub fn power_db(power: &[f64], floor_db: f64) -> Vec<f64> {
    power
        .iter()
        .map(|&p| {
            if p > 0.0 {
                (10.0 * p.log10()).max(floor_db)
            } else {
                floor_db
            }
        })
        .collect()
}

/// Convert normalized magnitude values to dB (20·log10), clipped to a floor.
pub fn magnitude_db(magnitude: &[f64], floor_db: f64) -> Vec<f64> {
    magnitude
        .iter()
        .map(|&m| {
            if m > 0.0 {
                (20.0 * m.log10()).max(floor_db)
            } else {
                floor_db
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fft_ifft_roundtrip() {
        let mut proc = SpectralProcessor::new(15);
        let signal: Vec<Complex64> = (0..15)
            .map(|i| Complex64::new((i as f64 * 0.7).cos(), (i as f64 * 0.3).sin()))
            .collect();
        let spectrum = proc.fft(&signal);
        let restored = proc.ifft(&spectrum);
        for (a, b) in signal.iter().zip(restored.iter()) {
            assert!((a - b).norm() < 1e-12, "roundtrip mismatch: {} vs {}", a, b);
        }
    }

    #[test]
    fn test_fft_pads_input() {
        let mut proc = SpectralProcessor::new(15);
        let signal = vec![Complex64::new(1.0, 0.0); 8];
        let spectrum = proc.fft(&signal);
        assert_eq!(spectrum.len(), 15);
        // DC bin equals the coherent sum of the 8 unit samples
        assert!((spectrum[0].norm() - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_fft_shift_odd_midpoint() {
        let x: Vec<i32> = (0..7).collect();
        let shifted = fft_shift(&x);
        assert_eq!(shifted, vec![4, 5, 6, 0, 1, 2, 3]);
        // zero bin at the midpoint
        assert_eq!(shifted[3], 0);
    }

    #[test]
    fn test_ifft_shift_inverts_fft_shift() {
        for n in [3usize, 7, 8, 15] {
            let x: Vec<usize> = (0..n).collect();
            assert_eq!(ifft_shift(&fft_shift(&x)), x, "length {}", n);
        }
    }

    #[test]
    fn test_normalize_peak_invariant() {
        let mut spectrum: Vec<Complex64> = (1..=10)
            .map(|i| Complex64::new(i as f64, -(i as f64) * 0.5))
            .collect();
        let peak = normalize_peak(&mut spectrum).unwrap();
        assert!(peak > 0.0);
        let max_mag = spectrum.iter().map(|c| c.norm()).fold(0.0f64, f64::max);
        assert!((max_mag - 1.0).abs() < 1e-12, "peak after normalize: {}", max_mag);
    }

    #[test]
    fn test_normalize_peak_zero_spectrum() {
        let mut spectrum = vec![Complex64::new(0.0, 0.0); 5];
        assert!(matches!(
            normalize_peak(&mut spectrum),
            Err(DesignError::ZeroSpectralPeak)
        ));
    }

    #[test]
    fn test_power_db_floor() {
        let db = power_db(&[1.0, 1e-10, 0.0], -50.0);
        assert!((db[0] - 0.0).abs() < 1e-12);
        assert_eq!(db[1], -50.0);
        assert_eq!(db[2], -50.0);
    }
}
