//! Phase Basis — basis matrices and phase-control vectors
//!
//! A phase-coded FM waveform is synthesized as `s = exp(j·B·x)` where `B`
//! is a real M×N basis matrix and `x` is the N-length phase-control vector
//! being optimized (N×K for a batch of K waveforms). The basis is owned by
//! an external generator and is read-only here; the optimizer only needs
//! matrix-multiply compatibility, exposed as [`PhaseBasis::apply`] and its
//! real transpose [`PhaseBasis::apply_transposed`].
//!
//! [`BasisGenerator`] is the contract an external generator fulfils. A
//! simple deterministic implementation ([`IdentityBasisGenerator`]) ships
//! with the crate for tests and demos; production basis construction is a
//! collaborator concern, not specified here.
//!
//! ## Example
//!
//! ```rust
//! use pcfm_core::basis::{BasisGenerator, IdentityBasisGenerator};
//!
//! let generator = IdentityBasisGenerator::new(42);
//! let set = generator.generate(8, 3, 2).unwrap();
//! assert_eq!(set.basis.rows(), 8);
//! assert_eq!(set.seed.rows(), 8);
//! assert_eq!(set.seed.cols(), 2);
//! ```

use crate::types::{DesignError, DesignResult};

/// Real M×K matrix of phase-control vectors, one waveform per column.
///
/// Stored column-major so that a single waveform's parameters are
/// contiguous; K=1 is the common case.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseMatrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl PhaseMatrix {
    /// All-zero matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Single-column matrix from a vector.
    pub fn from_column(column: Vec<f64>) -> Self {
        let rows = column.len();
        Self {
            data: column,
            rows,
            cols: 1,
        }
    }

    /// Build from column-major data.
    pub fn from_data(rows: usize, cols: usize, data: Vec<f64>) -> DesignResult<Self> {
        if data.len() != rows * cols {
            return Err(DesignError::ShapeMismatch {
                context: "phase matrix data length",
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self { data, rows, cols })
    }

    /// Number of rows (parameters per waveform).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (waveforms in the batch).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// One waveform's parameter vector.
    pub fn column(&self, k: usize) -> &[f64] {
        &self.data[k * self.rows..(k + 1) * self.rows]
    }

    /// Mutable access to one waveform's parameter vector.
    pub fn column_mut(&mut self, k: usize) -> &mut [f64] {
        &mut self.data[k * self.rows..(k + 1) * self.rows]
    }

    /// Extract a single column as a new 1-column matrix.
    pub fn column_matrix(&self, k: usize) -> Self {
        Self::from_column(self.column(k).to_vec())
    }

    /// In-place `self += scale * other`. Shapes must match.
    pub fn add_scaled(&mut self, other: &PhaseMatrix, scale: f64) {
        debug_assert_eq!(self.rows, other.rows);
        debug_assert_eq!(self.cols, other.cols);
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += scale * b;
        }
    }

    /// Largest absolute elementwise difference to another matrix.
    pub fn max_abs_diff(&self, other: &PhaseMatrix) -> f64 {
        debug_assert_eq!(self.rows, other.rows);
        debug_assert_eq!(self.cols, other.cols);
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f64, f64::max)
    }

    /// Flat view of the underlying column-major data.
    pub fn data(&self) -> &[f64] {
        &self.data
    }
}

/// Real M×N basis matrix mapping phase-control vectors to per-sample
/// instantaneous phase. Row-major storage.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseBasis {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl PhaseBasis {
    /// Build from flat row-major data.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> DesignResult<Self> {
        if data.len() != rows * cols {
            return Err(DesignError::ShapeMismatch {
                context: "basis matrix data length",
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self { data, rows, cols })
    }

    /// Identity basis: the control vector is the per-sample phase directly.
    pub fn identity(n: usize) -> Self {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self {
            data,
            rows: n,
            cols: n,
        }
    }

    /// Build from a slice of rows.
    pub fn from_rows(matrix: &[Vec<f64>]) -> DesignResult<Self> {
        let rows = matrix.len();
        let cols = matrix.first().map_or(0, |r| r.len());
        let mut data = Vec::with_capacity(rows * cols);
        for row in matrix {
            if row.len() != cols {
                return Err(DesignError::ShapeMismatch {
                    context: "basis row length",
                    expected: cols,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self { data, rows, cols })
    }

    /// Number of rows (waveform samples M).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (control parameters N).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Instantaneous phase φ = B·x for every batch column: M×K output.
    pub fn apply(&self, x: &PhaseMatrix) -> DesignResult<PhaseMatrix> {
        if x.rows() != self.cols {
            return Err(DesignError::ShapeMismatch {
                context: "phase vector rows vs basis columns",
                expected: self.cols,
                actual: x.rows(),
            });
        }
        let mut out = PhaseMatrix::zeros(self.rows, x.cols());
        for k in 0..x.cols() {
            let xk = x.column(k);
            let ok = out.column_mut(k);
            for (r, o) in ok.iter_mut().enumerate() {
                let row = &self.data[r * self.cols..(r + 1) * self.cols];
                *o = row.iter().zip(xk.iter()).map(|(b, v)| b * v).sum();
            }
        }
        Ok(out)
    }

    /// Transpose projection Bᵗ·y for every batch column: N×K output.
    ///
    /// Plain transpose, not conjugate transpose — the basis and control
    /// vectors are real.
    pub fn apply_transposed(&self, y: &PhaseMatrix) -> DesignResult<PhaseMatrix> {
        if y.rows() != self.rows {
            return Err(DesignError::ShapeMismatch {
                context: "projection rows vs basis rows",
                expected: self.rows,
                actual: y.rows(),
            });
        }
        let mut out = PhaseMatrix::zeros(self.cols, y.cols());
        for k in 0..y.cols() {
            let yk = y.column(k);
            let ok = out.column_mut(k);
            for (r, &v) in yk.iter().enumerate() {
                let row = &self.data[r * self.cols..(r + 1) * self.cols];
                for (c, b) in row.iter().enumerate() {
                    ok[c] += b * v;
                }
            }
        }
        Ok(out)
    }
}

/// A generated (seed, basis) pair for one optimization run.
#[derive(Debug, Clone)]
pub struct BasisSet {
    /// Initial phase-control matrix, M-row (or N-row) by K columns.
    pub seed: PhaseMatrix,
    /// Basis matrix, M×N.
    pub basis: PhaseBasis,
}

/// Contract for the external basis generator.
///
/// Given the oversampled waveform length M, an opaque structural parameter,
/// and the batch size K, produce a seed phase matrix and a basis matrix.
/// Failure surfaces immediately; the optimizer performs no iterations on a
/// generator error.
pub trait BasisGenerator {
    fn generate(
        &self,
        oversampled_len: usize,
        structural: usize,
        batch: usize,
    ) -> DesignResult<BasisSet>;
}

/// Linear congruential step shared by the in-crate generators and tests.
/// Deterministic and portable; not cryptographic.
pub(crate) fn lcg_uniform(state: &mut u64) -> f64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    (*state >> 33) as f64 / (1u64 << 31) as f64
}

/// Identity-basis generator with deterministic pseudo-random seed phases.
///
/// The basis is the M×M identity, so the control vector is the per-sample
/// phase itself. Seed phases are uniform in (−π, π], derived from the
/// generator seed and the structural parameter, independent per batch
/// column. Intended for tests and demos; production generators implement
/// [`BasisGenerator`] themselves.
#[derive(Debug, Clone)]
pub struct IdentityBasisGenerator {
    seed: u64,
}

impl IdentityBasisGenerator {
    /// Create a generator with the given random seed.
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl BasisGenerator for IdentityBasisGenerator {
    fn generate(
        &self,
        oversampled_len: usize,
        structural: usize,
        batch: usize,
    ) -> DesignResult<BasisSet> {
        if oversampled_len < 2 {
            return Err(DesignError::GeneratorFailure(format!(
                "oversampled length {} too short for a basis",
                oversampled_len
            )));
        }
        if batch == 0 {
            return Err(DesignError::GeneratorFailure(
                "batch size must be at least 1".to_string(),
            ));
        }

        let mut state = self
            .seed
            .wrapping_add((structural as u64).wrapping_mul(0x9E3779B97F4A7C15));
        let mut seed = PhaseMatrix::zeros(oversampled_len, batch);
        for k in 0..batch {
            for v in seed.column_mut(k) {
                *v = (2.0 * lcg_uniform(&mut state) - 1.0) * std::f64::consts::PI;
            }
        }

        Ok(BasisSet {
            seed,
            basis: PhaseBasis::identity(oversampled_len),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_apply_passthrough() {
        let basis = PhaseBasis::identity(4);
        let x = PhaseMatrix::from_column(vec![0.1, -0.2, 0.3, -0.4]);
        let phases = basis.apply(&x).unwrap();
        assert_eq!(phases.column(0), x.column(0));
    }

    #[test]
    fn test_apply_transposed_is_transpose() {
        // B = [[1, 2], [3, 4], [5, 6]]  (3x2)
        let basis =
            PhaseBasis::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        let y = PhaseMatrix::from_column(vec![1.0, 1.0, 1.0]);
        let out = basis.apply_transposed(&y).unwrap();
        assert_eq!(out.column(0), &[9.0, 12.0]);
    }

    #[test]
    fn test_apply_shape_mismatch() {
        let basis = PhaseBasis::identity(4);
        let x = PhaseMatrix::from_column(vec![0.0; 3]);
        assert!(matches!(
            basis.apply(&x),
            Err(DesignError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_phase_matrix_add_scaled() {
        let mut a = PhaseMatrix::from_column(vec![1.0, 2.0]);
        let b = PhaseMatrix::from_column(vec![0.5, -1.0]);
        a.add_scaled(&b, 2.0);
        assert_eq!(a.column(0), &[2.0, 0.0]);
    }

    #[test]
    fn test_phase_matrix_max_abs_diff() {
        let a = PhaseMatrix::from_column(vec![1.0, 2.0, 3.0]);
        let b = PhaseMatrix::from_column(vec![1.5, 2.0, 2.0]);
        assert!((a.max_abs_diff(&b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_generator_deterministic() {
        let generator = IdentityBasisGenerator::new(7);
        let a = generator.generate(8, 3, 2).unwrap();
        let b = generator.generate(8, 3, 2).unwrap();
        assert_eq!(a.seed, b.seed);
        assert_eq!(a.basis, b.basis);
    }

    #[test]
    fn test_generator_columns_distinct() {
        let generator = IdentityBasisGenerator::new(7);
        let set = generator.generate(8, 1, 2).unwrap();
        assert_ne!(set.seed.column(0), set.seed.column(1));
    }

    #[test]
    fn test_generator_structural_changes_seed() {
        let generator = IdentityBasisGenerator::new(7);
        let a = generator.generate(8, 1, 1).unwrap();
        let b = generator.generate(8, 2, 1).unwrap();
        assert_ne!(a.seed, b.seed);
    }

    #[test]
    fn test_generator_rejects_zero_batch() {
        let generator = IdentityBasisGenerator::new(7);
        assert!(matches!(
            generator.generate(8, 1, 0),
            Err(DesignError::GeneratorFailure(_))
        ));
    }
}
