//! Spectral Template — target PSD shape for waveform design
//!
//! A spectral template is the caller-supplied target that the optimizer
//! shapes a waveform's power spectral density against. Templates are
//! real-valued, nonnegative, center-shifted (zero frequency at the array
//! midpoint), and of odd length 2M−1 where M is the waveform length.
//!
//! The optimizer normalizes its own PSD estimate to unit peak before
//! comparison, so templates should be supplied on a comparable scale
//! (peak near 1) for the error values to be meaningful.
//!
//! ## Example
//!
//! ```rust
//! use pcfm_core::template::SpectralTemplate;
//!
//! let flat = SpectralTemplate::flat(8);
//! assert_eq!(flat.len(), 15);
//! assert_eq!(flat.oversampled_len(), 8);
//!
//! let lobe = SpectralTemplate::gaussian(8, 0.25);
//! // peak of the Gaussian lobe sits at the zero-frequency midpoint
//! assert_eq!(lobe.values()[7], 1.0);
//! ```

use crate::types::{DesignError, DesignResult};

/// Target power spectral density shape, length 2M−1, zero frequency at
/// the midpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralTemplate {
    values: Vec<f64>,
}

impl SpectralTemplate {
    /// Build a template from raw values.
    ///
    /// Fails fast on even or too-short lengths and on negative or
    /// non-finite entries.
    pub fn from_values(values: Vec<f64>) -> DesignResult<Self> {
        if values.len() < 3 || values.len() % 2 == 0 {
            return Err(DesignError::InvalidTemplateLength(values.len()));
        }
        for (index, &value) in values.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(DesignError::InvalidTemplateValue { index, value });
            }
        }
        Ok(Self { values })
    }

    /// Flat (all-ones) template for a length-M waveform.
    pub fn flat(oversampled_len: usize) -> Self {
        let m = oversampled_len.max(2);
        Self {
            values: vec![1.0; 2 * m - 1],
        }
    }

    /// Gaussian lobe centered at zero frequency.
    ///
    /// `fractional_bandwidth` is the -3 dB half-width as a fraction of the
    /// full (shifted) frequency axis; values around 0.1–0.4 are typical.
    pub fn gaussian(oversampled_len: usize, fractional_bandwidth: f64) -> Self {
        let m = oversampled_len.max(2);
        let len = 2 * m - 1;
        let mid = (len - 1) as f64 / 2.0;
        let sigma = (fractional_bandwidth.max(1e-3) * len as f64) / 2.0;
        let values = (0..len)
            .map(|i| {
                let d = (i as f64 - mid) / sigma;
                (-0.5 * d * d).exp()
            })
            .collect();
        Self { values }
    }

    /// Two-level band mask: unity over a centered passband, a fixed
    /// stopband level elsewhere.
    ///
    /// `passband_fraction` is the fraction of bins inside the passband;
    /// `stopband_level` is the out-of-band target (linear power, >= 0).
    pub fn band_mask(oversampled_len: usize, passband_fraction: f64, stopband_level: f64) -> Self {
        let m = oversampled_len.max(2);
        let len = 2 * m - 1;
        let mid = (len - 1) / 2;
        let half_width = ((passband_fraction.clamp(0.0, 1.0) * len as f64) / 2.0).round() as usize;
        let level = stopband_level.max(0.0);
        let values = (0..len)
            .map(|i| {
                let dist = i.abs_diff(mid);
                if dist <= half_width {
                    1.0
                } else {
                    level
                }
            })
            .collect();
        Self { values }
    }

    /// Template length (2M−1).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the template holds no bins (never constructible).
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Waveform length M implied by the template length.
    pub fn oversampled_len(&self) -> usize {
        (self.values.len() + 1) / 2
    }

    /// Template bin values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Check the strict-positivity precondition of the log-error objective.
    pub fn require_positive(&self) -> DesignResult<()> {
        for (index, &value) in self.values.iter().enumerate() {
            if value <= 0.0 {
                return Err(DesignError::NonPositiveLogTarget { index, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_template() {
        let t = SpectralTemplate::flat(8);
        assert_eq!(t.len(), 15);
        assert_eq!(t.oversampled_len(), 8);
        assert!(t.values().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_from_values_rejects_even_length() {
        assert!(matches!(
            SpectralTemplate::from_values(vec![1.0; 4]),
            Err(DesignError::InvalidTemplateLength(4))
        ));
    }

    #[test]
    fn test_from_values_rejects_short() {
        assert!(SpectralTemplate::from_values(vec![1.0]).is_err());
    }

    #[test]
    fn test_from_values_rejects_negative() {
        let result = SpectralTemplate::from_values(vec![1.0, -0.5, 1.0]);
        assert!(matches!(
            result,
            Err(DesignError::InvalidTemplateValue { index: 1, .. })
        ));
    }

    #[test]
    fn test_from_values_rejects_nan() {
        assert!(SpectralTemplate::from_values(vec![1.0, f64::NAN, 1.0]).is_err());
    }

    #[test]
    fn test_gaussian_peaks_at_center() {
        let t = SpectralTemplate::gaussian(8, 0.25);
        let mid = (t.len() - 1) / 2;
        assert_eq!(t.values()[mid], 1.0);
        // symmetric and decaying
        assert!((t.values()[mid - 3] - t.values()[mid + 3]).abs() < 1e-12);
        assert!(t.values()[0] < t.values()[mid]);
    }

    #[test]
    fn test_band_mask_levels() {
        let t = SpectralTemplate::band_mask(8, 0.3, 0.01);
        let mid = (t.len() - 1) / 2;
        assert_eq!(t.values()[mid], 1.0);
        assert_eq!(t.values()[0], 0.01);
    }

    #[test]
    fn test_require_positive() {
        assert!(SpectralTemplate::flat(4).require_positive().is_ok());
        let t = SpectralTemplate::band_mask(4, 0.3, 0.0);
        assert!(matches!(
            t.require_positive(),
            Err(DesignError::NonPositiveLogTarget { .. })
        ));
    }
}
