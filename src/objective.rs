//! Frequency Template Error — spectral mismatch objective and gradient
//!
//! Measures how far a phase-coded waveform's power spectral density is
//! from a target template, and computes the analytic gradient of that
//! error with respect to the phase-control vector. Two error models are
//! provided: linear (`|S|² − u`) and logarithmic (`log|S|² − log u`),
//! the latter weighting stopband mismatch far more heavily.
//!
//! ## Forward / adjoint chain
//!
//! ```text
//!  x ──B──▶ φ ──exp(jφ)──▶ s ──pad──▶ sb ──FFT──▶ ──shift──▶ ──/peak──▶ sbf
//!                                                                        │
//!  ∇ ◀──2/J·Bᵗ── Im(·conj(sb)) ◀──IFFT── ◀──unshift── residual·sbf ◀─────┘
//! ```
//!
//! The backward pass is the adjoint of the forward FFT chain; the order of
//! unshift, inverse transform, and conjugate placement is load-bearing and
//! must not be rearranged. The peak normalizer is held constant in the
//! backward pass: the returned gradient is the gradient of the
//! frozen-normalizer error (up to a positive per-column scale absorbed by
//! the step size), which tracks the full objective closely and descends
//! it reliably.
//!
//! ## Example
//!
//! ```rust
//! use pcfm_core::basis::{PhaseBasis, PhaseMatrix};
//! use pcfm_core::objective::{ErrorModel, TemplateObjective};
//! use pcfm_core::template::SpectralTemplate;
//!
//! let template = SpectralTemplate::flat(8);
//! let basis = PhaseBasis::identity(8);
//! let mut objective =
//!     TemplateObjective::new(&template, ErrorModel::default()).unwrap();
//! let x = PhaseMatrix::zeros(8, 1);
//! let eval = objective.evaluate(&basis, &x).unwrap();
//! assert!(eval.costs[0] > 0.0);
//! assert_eq!(eval.gradient.rows(), 8);
//! ```

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::basis::{PhaseBasis, PhaseMatrix};
use crate::fft_utils::{fft_shift, ifft_shift, normalize_peak, SpectralProcessor};
use crate::template::SpectralTemplate;
use crate::types::{DesignError, DesignResult, IQSample};

/// Floor applied to spectral power before a logarithm, guarding against
/// -inf from magnitude underflow.
const LOG_POWER_FLOOR: f64 = 1e-300;

/// Error model for the spectral mismatch objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ErrorModel {
    /// Linear template error: ‖|S|² − u‖_l.
    Linear {
        /// Norm order l (2 = Euclidean).
        norm_order: u32,
    },
    /// Logarithmic template error: ‖log_a|S|² − log_a u‖_l with l = 2.
    Log {
        /// Logarithm base a (10 = decade scale).
        base: f64,
    },
}

impl Default for ErrorModel {
    fn default() -> Self {
        ErrorModel::Linear { norm_order: 2 }
    }
}

impl ErrorModel {
    /// Log model with the conventional base 10.
    pub fn log10() -> Self {
        ErrorModel::Log { base: 10.0 }
    }

    /// Validate model parameters.
    pub fn validate(&self) -> DesignResult<()> {
        match *self {
            ErrorModel::Linear { norm_order } => {
                if norm_order == 0 {
                    return Err(DesignError::InvalidNormOrder(norm_order));
                }
            }
            ErrorModel::Log { base } => {
                if !base.is_finite() || base <= 0.0 || (base - 1.0).abs() < f64::EPSILON {
                    return Err(DesignError::InvalidLogBase(base));
                }
            }
        }
        Ok(())
    }
}

/// One objective evaluation: per-column cost, gradient, and the
/// intermediate products the diagnostics channel wants.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Template error J, one value per batch column.
    pub costs: Vec<f64>,
    /// Descent gradient ∇J, same shape as the phase-control matrix.
    pub gradient: PhaseMatrix,
    /// Peak-normalized PSD estimate |sbf|², one vector of length 2M−1 per
    /// column. Invariant: the maximum of each vector is exactly 1.
    pub spectra: Vec<Vec<f64>>,
    /// Synthesized unit-modulus waveform, one length-M vector per column.
    pub waveforms: Vec<Vec<IQSample>>,
}

/// Precomputed per-model state: the linear model keeps only the norm
/// order, the log model caches the log-domain targets.
#[derive(Debug, Clone)]
enum PreparedModel {
    Linear {
        norm_order: u32,
    },
    Log {
        ln_base: f64,
        log_target: Vec<f64>,
    },
}

/// Spectral mismatch objective bound to one template and error model.
///
/// Owns the FFT plans for the padded length, so repeated evaluations reuse
/// them across iterations.
#[derive(Debug)]
pub struct TemplateObjective {
    target: Vec<f64>,
    prepared: PreparedModel,
    model: ErrorModel,
    fft: SpectralProcessor,
}

impl TemplateObjective {
    /// Bind an objective to a template and error model.
    ///
    /// The log model requires a strictly positive template; that
    /// precondition is checked here, before any iteration runs.
    pub fn new(template: &SpectralTemplate, model: ErrorModel) -> DesignResult<Self> {
        model.validate()?;
        let prepared = match model {
            ErrorModel::Log { base } => {
                template.require_positive()?;
                let ln_base = base.ln();
                PreparedModel::Log {
                    ln_base,
                    log_target: template
                        .values()
                        .iter()
                        .map(|&u| u.ln() / ln_base)
                        .collect(),
                }
            }
            ErrorModel::Linear { norm_order } => PreparedModel::Linear { norm_order },
        };
        Ok(Self {
            target: template.values().to_vec(),
            prepared,
            model,
            fft: SpectralProcessor::new(template.len()),
        })
    }

    /// Padded transform length 2M−1.
    pub fn padded_len(&self) -> usize {
        self.target.len()
    }

    /// The error model this objective evaluates.
    pub fn model(&self) -> ErrorModel {
        self.model
    }

    /// Evaluate cost and gradient for the phase-control matrix `x`.
    ///
    /// Columns are independent: every reduction (peak normalization, norm)
    /// is taken per column, so a K-column evaluation equals K separate
    /// single-column evaluations.
    pub fn evaluate(&mut self, basis: &PhaseBasis, x: &PhaseMatrix) -> DesignResult<Evaluation> {
        let m = (self.target.len() + 1) / 2;
        if basis.rows() != m {
            return Err(DesignError::ShapeMismatch {
                context: "basis rows vs template length",
                expected: m,
                actual: basis.rows(),
            });
        }
        let phases = basis.apply(x)?;

        let batch = x.cols();
        let mut costs = Vec::with_capacity(batch);
        let mut spectra = Vec::with_capacity(batch);
        let mut waveforms = Vec::with_capacity(batch);
        let mut gradient = PhaseMatrix::zeros(x.rows(), batch);

        for k in 0..batch {
            let col = self.evaluate_column(basis, phases.column(k))?;
            costs.push(col.cost);
            spectra.push(col.psd);
            waveforms.push(col.waveform);
            gradient.column_mut(k).copy_from_slice(col.gradient.column(0));
        }

        Ok(Evaluation {
            costs,
            gradient,
            spectra,
            waveforms,
        })
    }

    fn evaluate_column(&mut self, basis: &PhaseBasis, phases: &[f64]) -> DesignResult<ColumnEval> {
        let len = self.target.len();
        let m = (len + 1) / 2;

        // Unit-modulus waveform; phase wrapping is implicit in the
        // complex exponential.
        let s: Vec<IQSample> = phases
            .iter()
            .map(|&p| Complex64::new(p.cos(), p.sin()))
            .collect();

        // Zero-pad to 2M-1, transform, center-shift, peak-normalize.
        let spectrum = self.fft.fft(&s);
        let mut sbf = fft_shift(&spectrum);
        normalize_peak(&mut sbf)?;

        let psd: Vec<f64> = sbf.iter().map(|c| c.norm_sqr()).collect();

        // Residual and cost under the selected model.
        let (residual, cost, grad_scale) = match &self.prepared {
            PreparedModel::Linear { norm_order } => {
                let residual: Vec<f64> = psd
                    .iter()
                    .zip(self.target.iter())
                    .map(|(&p, &u)| p - u)
                    .collect();
                let cost = l_norm(&residual, *norm_order);
                if cost == 0.0 {
                    return Err(DesignError::ZeroCost);
                }
                (residual, cost, 2.0 / cost)
            }
            PreparedModel::Log { ln_base, log_target } => {
                let residual: Vec<f64> = psd
                    .iter()
                    .zip(log_target.iter())
                    .map(|(&p, &lu)| p.max(LOG_POWER_FLOOR).ln() / ln_base - lu)
                    .collect();
                let cost = l_norm(&residual, 2);
                if cost == 0.0 {
                    return Err(DesignError::ZeroCost);
                }
                (residual, cost, 2.0 / (ln_base * cost))
            }
        };

        // Adjoint chain: residual·sbf → unshift → IFFT → ×conj(sb) →
        // imaginary part → Bᵗ → scale. Keep this order.
        let weighted: Vec<Complex64> = residual
            .iter()
            .zip(sbf.iter())
            .map(|(&r, &c)| c * r)
            .collect();
        let back = self.fft.ifft(&ifft_shift(&weighted));
        // The padded tail of the waveform is zero and the padded basis rows
        // are zero, so the transpose projection only sees the first M entries.
        let w: Vec<f64> = back[..m]
            .iter()
            .zip(s.iter())
            .map(|(y, smp)| (y * smp.conj()).im)
            .collect();
        let mut gradient = basis.apply_transposed(&PhaseMatrix::from_column(w))?;
        for g in gradient.column_mut(0) {
            *g *= grad_scale;
        }

        Ok(ColumnEval {
            cost,
            gradient,
            psd,
            waveform: s,
        })
    }
}

struct ColumnEval {
    cost: f64,
    gradient: PhaseMatrix,
    psd: Vec<f64>,
    waveform: Vec<IQSample>,
}

/// l-norm of a real vector: (Σ|v|^l)^(1/l).
fn l_norm(values: &[f64], order: u32) -> f64 {
    debug_assert!(order >= 1);
    match order {
        1 => values.iter().map(|v| v.abs()).sum(),
        2 => values.iter().map(|v| v * v).sum::<f64>().sqrt(),
        _ => {
            let p = order as f64;
            values
                .iter()
                .map(|v| v.abs().powf(p))
                .sum::<f64>()
                .powf(1.0 / p)
        }
    }
}
