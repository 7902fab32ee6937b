//! Parallel Batch Optimization
//!
//! Rayon-backed fan-out of a batch run into independent per-column runs.
//! Enable with the `parallel` feature flag.
//!
//! ```toml
//! [dependencies]
//! pcfm-core = { version = "0.1", features = ["parallel"] }
//! ```
//!
//! Batch columns never interact — every reduction in the objective is
//! per-column — so a K-column run can be split across threads without
//! changing any result. The basis set is generated once for the full
//! batch (preserving the per-column seeds), then each column runs its own
//! driver. Parallelization pays off for large K or long templates; for a
//! handful of small columns the sequential driver is usually faster.

use rayon::prelude::*;

use crate::basis::{BasisGenerator, BasisSet};
use crate::config::RunConfig;
use crate::optimizer::{RunResult, TemplateOptimizer};
use crate::template::SpectralTemplate;
use crate::types::DesignResult;

/// Hands a pre-generated basis set to a driver, one column at a time.
struct FixedColumn {
    set: BasisSet,
}

impl BasisGenerator for FixedColumn {
    fn generate(&self, _m: usize, _structural: usize, _batch: usize) -> DesignResult<BasisSet> {
        Ok(self.set.clone())
    }
}

/// Run a batch configuration as independent single-column optimizations,
/// one rayon task per column. Returns one [`RunResult`] per column, in
/// column order; each equals the matching column of a sequential batch
/// run with the same seeds (up to its own convergence point).
pub fn run_columns_parallel(
    config: &RunConfig,
    template: &SpectralTemplate,
    generator: &(dyn BasisGenerator + Sync),
) -> DesignResult<Vec<RunResult>> {
    config.validate()?;
    let m = template.oversampled_len();
    let set = generator.generate(m, config.structural, config.batch_size)?;

    (0..config.batch_size)
        .into_par_iter()
        .map(|k| {
            let column_config = RunConfig {
                batch_size: 1,
                ..config.clone()
            };
            let column_set = BasisSet {
                seed: set.seed.column_matrix(k),
                basis: set.basis.clone(),
            };
            TemplateOptimizer::new(column_config)?
                .run(template, &FixedColumn { set: column_set })
        })
        .collect()
}
