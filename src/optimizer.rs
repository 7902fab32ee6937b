//! Template Optimizer — momentum gradient descent over phase codes
//!
//! Drives the spectral-template objective with heavy-ball gradient
//! descent: the update direction blends the current gradient with a
//! decayed copy of the previous step, trading monotonic descent for
//! faster practical convergence on this non-convex, highly oscillatory
//! error surface. Non-monotone cost along the way is expected and
//! tolerated.
//!
//! ## State machine
//!
//! ```text
//!  Init ──▶ Iterating ──▶ Converged     (step settled below tolerance)
//!                   ├───▶ Exhausted     (iteration budget spent)
//!                   └───▶ Cancelled     (external token raised)
//! ```
//!
//! Exhausted is a reported outcome, not an error: the best-effort phase
//! vector and the full error trace are returned for the caller to judge.
//! The stopping test compares successive *step* vectors (gradient plus
//! momentum) against the tolerance — not the raw gradient, the phase
//! vector, or the cost. Depending on μ and β that can fire early or late;
//! it is the specified policy and is preserved as such.
//!
//! ## Example
//!
//! ```rust
//! use pcfm_core::basis::IdentityBasisGenerator;
//! use pcfm_core::config::RunConfig;
//! use pcfm_core::optimizer::{Outcome, TemplateOptimizer};
//! use pcfm_core::template::SpectralTemplate;
//!
//! let template = SpectralTemplate::flat(8);
//! let generator = IdentityBasisGenerator::new(42);
//! let config = RunConfig { max_iterations: 100, ..RunConfig::default() };
//! let optimizer = TemplateOptimizer::new(config).unwrap();
//! let result = optimizer.run(&template, &generator).unwrap();
//!
//! assert!(matches!(result.outcome, Outcome::Converged | Outcome::Exhausted));
//! assert_eq!(result.error_trace.len(), result.iterations);
//! assert_eq!(result.waveforms[0].len(), 8);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use num_complex::Complex64;
use tracing::{debug, info, warn};

use crate::basis::{BasisGenerator, PhaseMatrix};
use crate::config::RunConfig;
use crate::diagnostics::{DiagnosticSink, IterationSnapshot};
use crate::objective::TemplateObjective;
use crate::template::SpectralTemplate;
use crate::types::{DesignError, DesignResult, IQSample};

/// Terminal outcome of an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Step difference fell below tolerance in every component.
    Converged,
    /// Iteration budget spent without meeting tolerance. Not an error;
    /// the returned state is best-effort.
    Exhausted,
    /// External cancellation token raised between iterations.
    Cancelled,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Converged => write!(f, "converged"),
            Outcome::Exhausted => write!(f, "exhausted"),
            Outcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Cooperative cancellation signal, checked between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The run stops before its next iteration.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Result of an optimization run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Final phase-control matrix, one column per waveform.
    pub phases: PhaseMatrix,
    /// Synthesized waveforms s = exp(j·B·x), one per column.
    pub waveforms: Vec<Vec<IQSample>>,
    /// Per-iteration template error, one entry per executed iteration,
    /// each holding one value per batch column.
    pub error_trace: Vec<Vec<f64>>,
    /// How the run ended.
    pub outcome: Outcome,
    /// Number of iterations executed.
    pub iterations: usize,
}

impl RunResult {
    /// Final cost of one batch column, if any iteration ran.
    pub fn final_cost(&self, column: usize) -> Option<f64> {
        self.error_trace.last().map(|costs| costs[column])
    }
}

/// Heavy-ball gradient-descent driver for spectral-template design.
#[derive(Debug, Clone)]
pub struct TemplateOptimizer {
    config: RunConfig,
    cancel: Option<CancelToken>,
}

impl TemplateOptimizer {
    /// Create a driver from a validated configuration.
    pub fn new(config: RunConfig) -> DesignResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: None,
        })
    }

    /// Attach a cancellation token checked between iterations.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The driver's configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run with no diagnostics sink.
    pub fn run(
        &self,
        template: &SpectralTemplate,
        generator: &dyn BasisGenerator,
    ) -> DesignResult<RunResult> {
        self.run_inner(template, generator, None)
    }

    /// Run, emitting a snapshot to `sink` after every iteration.
    ///
    /// Sink failures are logged and isolated; they never abort the run or
    /// perturb the numeric trajectory.
    pub fn run_with_sink(
        &self,
        template: &SpectralTemplate,
        generator: &dyn BasisGenerator,
        sink: &mut dyn DiagnosticSink,
    ) -> DesignResult<RunResult> {
        self.run_inner(template, generator, Some(sink))
    }

    fn run_inner(
        &self,
        template: &SpectralTemplate,
        generator: &dyn BasisGenerator,
        mut sink: Option<&mut dyn DiagnosticSink>,
    ) -> DesignResult<RunResult> {
        let m = template.oversampled_len();
        let batch = self.config.batch_size;

        // Init: generator failure surfaces before any iteration.
        let set = generator.generate(m, self.config.structural, batch)?;
        if set.seed.cols() != batch {
            return Err(DesignError::ShapeMismatch {
                context: "generator seed columns vs batch size",
                expected: batch,
                actual: set.seed.cols(),
            });
        }
        if set.basis.rows() != m {
            return Err(DesignError::ShapeMismatch {
                context: "generator basis rows vs template length",
                expected: m,
                actual: set.basis.rows(),
            });
        }
        if set.seed.rows() != set.basis.cols() {
            return Err(DesignError::ShapeMismatch {
                context: "generator seed rows vs basis columns",
                expected: set.basis.cols(),
                actual: set.seed.rows(),
            });
        }

        let mut objective = TemplateObjective::new(template, self.config.error_model)?;
        let mut x = set.seed;
        // Momentum carries the previous effective step; it has no value
        // until the first iteration completes, so the first step is the
        // bare gradient rather than a zero-sentinel blend.
        let mut prev_step: Option<PhaseMatrix> = None;
        let mut error_trace: Vec<Vec<f64>> = Vec::new();
        let mut outcome = Outcome::Exhausted;

        debug!(
            m,
            batch,
            max_iterations = self.config.max_iterations,
            "starting optimization"
        );

        for iteration in 1..=self.config.max_iterations {
            if let Some(token) = &self.cancel {
                if token.is_cancelled() {
                    info!(iteration, "cancellation requested");
                    outcome = Outcome::Cancelled;
                    break;
                }
            }

            let eval = objective.evaluate(&set.basis, &x)?;
            error_trace.push(eval.costs.clone());
            debug!(iteration, cost = eval.costs[0], "iteration complete");

            // Heavy-ball step: gradient plus decayed previous step.
            let mut step = eval.gradient.clone();
            if let Some(prev) = &prev_step {
                step.add_scaled(prev, self.config.momentum);
            }
            x.add_scaled(&step, -self.config.step_size);

            if self.config.diagnostics.enabled {
                if let Some(sink) = sink.as_mut() {
                    let snapshot = IterationSnapshot::capture(
                        iteration,
                        &eval.costs,
                        &error_trace,
                        &eval.spectra,
                        &eval.waveforms,
                    );
                    if let Err(e) = sink.on_iteration(snapshot) {
                        warn!(iteration, error = %e, "diagnostic sink failure ignored");
                    }
                }
            }

            // Stopping test on successive steps; convergence exits before
            // the previous step is overwritten.
            if let Some(prev) = &prev_step {
                if step.max_abs_diff(prev) < self.config.tolerance {
                    outcome = Outcome::Converged;
                    break;
                }
            }
            prev_step = Some(step);
        }

        let iterations = error_trace.len();
        let waveforms = synthesize(&set.basis, &x)?;
        info!(%outcome, iterations, "optimization finished");

        Ok(RunResult {
            phases: x,
            waveforms,
            error_trace,
            outcome,
            iterations,
        })
    }
}

/// Synthesize unit-modulus waveforms s = exp(j·B·x), one per column.
pub fn synthesize(
    basis: &crate::basis::PhaseBasis,
    x: &PhaseMatrix,
) -> DesignResult<Vec<Vec<IQSample>>> {
    let phases = basis.apply(x)?;
    Ok((0..phases.cols())
        .map(|k| {
            phases
                .column(k)
                .iter()
                .map(|&p| Complex64::new(p.cos(), p.sin()))
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{BasisSet, IdentityBasisGenerator, PhaseBasis};
    use crate::diagnostics::MemorySink;
    use crate::objective::ErrorModel;

    fn flat_run_config(max_iterations: usize) -> RunConfig {
        RunConfig {
            max_iterations,
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_end_to_end_flat_template() {
        // Flat spectral target, M = 8, K = 1: the run must terminate and
        // land within a bounded distance of the template.
        let template = SpectralTemplate::flat(8);
        let generator = IdentityBasisGenerator::new(42);
        let optimizer = TemplateOptimizer::new(flat_run_config(1000)).unwrap();
        let result = optimizer.run(&template, &generator).unwrap();

        assert!(matches!(
            result.outcome,
            Outcome::Converged | Outcome::Exhausted
        ));
        assert_eq!(result.error_trace.len(), result.iterations);
        assert!(result.iterations >= 1);

        let final_cost = result.final_cost(0).unwrap();
        let initial_cost = result.error_trace[0][0];
        assert!(final_cost.is_finite());
        assert!(
            final_cost <= initial_cost,
            "no progress: {} -> {}",
            initial_cost,
            final_cost
        );
        // 15 bins of unit template bound the error by sqrt(15) ~ 3.87; a
        // converged run lands well inside that.
        assert!(final_cost < 2.0, "final l2 template error: {}", final_cost);
    }

    #[test]
    fn test_single_iteration_budget() {
        let template = SpectralTemplate::flat(8);
        let generator = IdentityBasisGenerator::new(7);
        let optimizer = TemplateOptimizer::new(flat_run_config(1)).unwrap();
        let result = optimizer.run(&template, &generator).unwrap();
        assert_eq!(result.outcome, Outcome::Exhausted);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.error_trace.len(), 1);
    }

    #[test]
    fn test_batch_matches_separate_runs() {
        // A K-column batch must reproduce K single-column runs started
        // from the same per-column seeds.
        struct FixedGenerator {
            set: BasisSet,
        }
        impl BasisGenerator for FixedGenerator {
            fn generate(&self, _m: usize, _s: usize, _b: usize) -> DesignResult<BasisSet> {
                Ok(self.set.clone())
            }
        }

        let template = SpectralTemplate::flat(6);
        let base = IdentityBasisGenerator::new(11).generate(6, 1, 3).unwrap();

        let batch_config = RunConfig {
            batch_size: 3,
            max_iterations: 40,
            ..RunConfig::default()
        };
        let batched = TemplateOptimizer::new(batch_config)
            .unwrap()
            .run(
                &template,
                &FixedGenerator { set: base.clone() },
            )
            .unwrap();

        for k in 0..3 {
            let single_set = BasisSet {
                seed: base.seed.column_matrix(k),
                basis: base.basis.clone(),
            };
            let single = TemplateOptimizer::new(flat_run_config(40))
                .unwrap()
                .run(&template, &FixedGenerator { set: single_set })
                .unwrap();
            // Batched convergence is joint, so compare the common prefix
            // of the iteration histories.
            let common = batched.iterations.min(single.iterations);
            for i in 0..common {
                assert_eq!(
                    batched.error_trace[i][k], single.error_trace[i][0],
                    "column {} diverged from its solo run at iteration {}",
                    k, i
                );
            }
        }
        // Distinct seeds lead to distinct optimized columns.
        assert_ne!(batched.phases.column(0), batched.phases.column(1));
    }

    #[test]
    fn test_sink_receives_snapshots() {
        let template = SpectralTemplate::flat(6);
        let generator = IdentityBasisGenerator::new(3);
        let config = RunConfig {
            max_iterations: 5,
            diagnostics: crate::config::DiagnosticsConfig {
                enabled: true,
                export_path: None,
            },
            ..RunConfig::default()
        };
        let optimizer = TemplateOptimizer::new(config).unwrap();
        let mut sink = MemorySink::new();
        let result = optimizer
            .run_with_sink(&template, &generator, &mut sink)
            .unwrap();
        assert_eq!(sink.snapshots().len(), result.iterations);
        assert_eq!(sink.snapshots()[0].iteration, 1);
    }

    #[test]
    fn test_sink_failure_does_not_abort() {
        struct FailingSink;
        impl DiagnosticSink for FailingSink {
            fn on_iteration(
                &mut self,
                _snapshot: IterationSnapshot,
            ) -> Result<(), crate::diagnostics::SinkError> {
                Err(crate::diagnostics::SinkError::Rejected("test".into()))
            }
        }

        let template = SpectralTemplate::flat(6);
        let generator = IdentityBasisGenerator::new(3);
        let config = RunConfig {
            max_iterations: 3,
            diagnostics: crate::config::DiagnosticsConfig {
                enabled: true,
                export_path: None,
            },
            ..RunConfig::default()
        };
        let optimizer = TemplateOptimizer::new(config).unwrap();
        let mut sink = FailingSink;
        let result = optimizer
            .run_with_sink(&template, &generator, &mut sink)
            .unwrap();
        assert_eq!(result.iterations, 3);
    }

    #[test]
    fn test_sink_silent_when_diagnostics_disabled() {
        let template = SpectralTemplate::flat(6);
        let generator = IdentityBasisGenerator::new(3);
        let optimizer = TemplateOptimizer::new(flat_run_config(3)).unwrap();
        let mut sink = MemorySink::new();
        optimizer
            .run_with_sink(&template, &generator, &mut sink)
            .unwrap();
        assert!(sink.snapshots().is_empty());
    }

    #[test]
    fn test_cancellation_before_first_iteration() {
        let template = SpectralTemplate::flat(8);
        let generator = IdentityBasisGenerator::new(5);
        let token = CancelToken::new();
        token.cancel();
        let optimizer = TemplateOptimizer::new(flat_run_config(100))
            .unwrap()
            .with_cancel(token);
        let result = optimizer.run(&template, &generator).unwrap();
        assert_eq!(result.outcome, Outcome::Cancelled);
        assert_eq!(result.iterations, 0);
        // Best-effort state is still synthesized from the seed.
        assert_eq!(result.waveforms.len(), 1);
        assert_eq!(result.waveforms[0].len(), 8);
    }

    #[test]
    fn test_generator_failure_surfaces_immediately() {
        struct BrokenGenerator;
        impl BasisGenerator for BrokenGenerator {
            fn generate(&self, _m: usize, _s: usize, _b: usize) -> DesignResult<BasisSet> {
                Err(DesignError::GeneratorFailure("no basis".into()))
            }
        }
        let template = SpectralTemplate::flat(8);
        let optimizer = TemplateOptimizer::new(flat_run_config(100)).unwrap();
        assert!(matches!(
            optimizer.run(&template, &BrokenGenerator),
            Err(DesignError::GeneratorFailure(_))
        ));
    }

    #[test]
    fn test_generator_batch_mismatch_rejected() {
        struct WrongBatchGenerator;
        impl BasisGenerator for WrongBatchGenerator {
            fn generate(&self, m: usize, _s: usize, _b: usize) -> DesignResult<BasisSet> {
                Ok(BasisSet {
                    seed: PhaseMatrix::zeros(m, 2),
                    basis: PhaseBasis::identity(m),
                })
            }
        }
        let template = SpectralTemplate::flat(8);
        let optimizer = TemplateOptimizer::new(flat_run_config(100)).unwrap();
        assert!(matches!(
            optimizer.run(&template, &WrongBatchGenerator),
            Err(DesignError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_log_model_run_terminates() {
        let template = SpectralTemplate::gaussian(8, 0.3);
        let generator = IdentityBasisGenerator::new(9);
        let config = RunConfig {
            error_model: ErrorModel::log10(),
            max_iterations: 200,
            step_size: 0.05,
            ..RunConfig::default()
        };
        let optimizer = TemplateOptimizer::new(config).unwrap();
        let result = optimizer.run(&template, &generator).unwrap();
        assert!(result.final_cost(0).unwrap().is_finite());
        assert_eq!(result.error_trace.len(), result.iterations);
    }

    #[test]
    fn test_waveforms_unit_modulus() {
        let template = SpectralTemplate::flat(8);
        let generator = IdentityBasisGenerator::new(21);
        let optimizer = TemplateOptimizer::new(flat_run_config(50)).unwrap();
        let result = optimizer.run(&template, &generator).unwrap();
        for s in &result.waveforms[0] {
            assert!((s.norm() - 1.0).abs() < 1e-12);
        }
    }
}
