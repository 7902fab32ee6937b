//! Core types for spectral-template waveform design
//!
//! This module defines the fundamental types shared across the library:
//! complex sample aliases and the common error type returned by every
//! fallible operation.
//!
//! ## Sample Representation
//!
//! Waveforms are constant-envelope: every sample lies on the unit circle
//! and only the instantaneous phase carries information. Samples are
//! represented as `Complex64` I/Q pairs so they plug directly into the
//! FFT machinery.
//!
//! ```text
//!            Q (Imaginary)
//!            ^
//!            |     * s = exp(j·φ)
//!            |    /
//!            |   /  |s| = 1 always
//!            |  /   φ = B·x  (basis-controlled)
//!            | /
//!   ---------+---------> I (Real)
//! ```

use num_complex::Complex64;

/// Type alias for complex numbers using f64 precision
pub type Complex = Complex64;

/// A single I/Q sample point
pub type IQSample = Complex64;

/// A floating point sample (for real-valued signals)
pub type Sample = f64;

/// Result type for design operations
pub type DesignResult<T> = Result<T, DesignError>;

/// Errors that can occur during waveform design
#[derive(Debug, Clone, thiserror::Error)]
pub enum DesignError {
    #[error("invalid template length {0}: must be odd (2M-1) and at least 3")]
    InvalidTemplateLength(usize),

    #[error("invalid template value {value} at bin {index}: must be finite and non-negative")]
    InvalidTemplateValue { index: usize, value: f64 },

    #[error("template value {value} at bin {index}: log-error objective requires strictly positive targets")]
    NonPositiveLogTarget { index: usize, value: f64 },

    #[error("invalid tolerance {0}: must be positive and finite")]
    InvalidTolerance(f64),

    #[error("invalid iteration budget {0}: must be at least 1")]
    InvalidIterationBudget(usize),

    #[error("invalid step size {0}: must be positive and finite")]
    InvalidStepSize(f64),

    #[error("invalid momentum factor {0}: must be finite and non-negative")]
    InvalidMomentum(f64),

    #[error("invalid log base {0}: must be positive, finite, and not 1")]
    InvalidLogBase(f64),

    #[error("invalid norm order {0}: must be at least 1")]
    InvalidNormOrder(u32),

    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("basis generator failed: {0}")]
    GeneratorFailure(String),

    #[error("spectral peak is zero: cannot normalize an all-zero spectrum")]
    ZeroSpectralPeak,

    #[error("template error is exactly zero: gradient scale factor is singular")]
    ZeroCost,
}
