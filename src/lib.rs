//! # PCFM Spectral-Template Design Library
//!
//! This crate designs phase-coded frequency-modulated (PCFM) waveforms
//! whose power spectral density approximates a caller-supplied target
//! template. Waveforms are constant-envelope: a real basis matrix maps a
//! small phase-control vector to per-sample instantaneous phase, and the
//! optimizer shapes the spectrum by adjusting only that control vector.
//!
//! ## Overview
//!
//! The core is a frequency-domain optimization engine:
//!
//! - **Objective**: spectral mismatch between the waveform's normalized
//!   PSD and the template, in linear or logarithmic magnitude, with an
//!   analytic gradient computed through an adjoint FFT chain
//! - **Driver**: heavy-ball (momentum) gradient descent with an explicit
//!   `Init → Iterating → {Converged, Exhausted, Cancelled}` state machine
//!   and batch (multi-waveform) support
//! - **Seeder**: alternating-projection phase retrieval, usable standalone
//!   as a cheap template-matched waveform designer
//! - **Diagnostics**: per-iteration PSD, autocorrelation, and sidelobe
//!   snapshots emitted to a decoupled sink
//!
//! ## Signal Flow
//!
//! ```text
//! generator ──(seed x, basis B)──▶ driver
//!                                    │ per iteration
//!                                    ▼
//!                  s = exp(j·B·x) ──FFT──▶ |S|² vs template ──▶ (J, ∇)
//!                                    │
//!                        x ← x − μ·(∇ + β·previous step)
//!                                    │
//!                                    ▼
//!                   Converged / Exhausted / Cancelled ──▶ final x, s
//! ```
//!
//! ## Example
//!
//! ```rust
//! use pcfm_core::prelude::*;
//!
//! // Target: flat power spectrum for an 8-sample waveform.
//! let template = SpectralTemplate::flat(8);
//! let generator = IdentityBasisGenerator::new(42);
//!
//! let config = RunConfig { max_iterations: 200, ..RunConfig::default() };
//! let optimizer = TemplateOptimizer::new(config).unwrap();
//! let result = optimizer.run(&template, &generator).unwrap();
//!
//! assert!(matches!(result.outcome, Outcome::Converged | Outcome::Exhausted));
//! assert_eq!(result.error_trace.len(), result.iterations);
//! ```

pub mod basis;
pub mod config;
pub mod diagnostics;
pub mod fft_utils;
pub mod objective;
pub mod observe;
pub mod optimizer;
pub mod phase_retrieval;
pub mod template;
pub mod types;

// Parallel batch fan-out (requires `parallel` feature)
#[cfg(feature = "parallel")]
pub mod parallel;

// Re-export main types
pub use basis::{BasisGenerator, BasisSet, IdentityBasisGenerator, PhaseBasis, PhaseMatrix};
pub use config::{ConfigError, DiagnosticsConfig, RunConfig};
pub use diagnostics::{ChannelSink, DiagnosticSink, IterationSnapshot, MemorySink, SinkError};
pub use objective::{ErrorModel, Evaluation, TemplateObjective};
pub use observe::{init_logging, LogConfig, LogFormat, LogLevel};
pub use optimizer::{synthesize, CancelToken, Outcome, RunResult, TemplateOptimizer};
pub use phase_retrieval::AlternatingProjection;
pub use template::SpectralTemplate;
pub use types::{Complex, DesignError, DesignResult, IQSample, Sample};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::basis::{BasisGenerator, IdentityBasisGenerator, PhaseBasis, PhaseMatrix};
    pub use crate::config::RunConfig;
    pub use crate::objective::{ErrorModel, TemplateObjective};
    pub use crate::optimizer::{CancelToken, Outcome, RunResult, TemplateOptimizer};
    pub use crate::phase_retrieval::AlternatingProjection;
    pub use crate::template::SpectralTemplate;
    pub use crate::types::{Complex, DesignError, DesignResult, IQSample};
}
