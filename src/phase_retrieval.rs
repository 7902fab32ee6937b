//! Phase Retrieval — alternating-projection waveform seeding
//!
//! Gerchberg–Saxton style fixed-point iteration that finds a unit-modulus
//! complex sequence whose spectral magnitude approximates a target
//! template. Each pass alternates between two projections:
//!
//! ```text
//!  spectral domain: keep own phase, impose |u| as magnitude
//!  sample domain:   keep own phase, impose unit modulus
//! ```
//!
//! No gradient is involved and nothing here touches the basis machinery,
//! so this runs standalone as a cheap initializer or fallback designer.
//! Convergence is not monotonic and there is no early stop: the loop
//! always runs the full iteration count, and the result is fully
//! deterministic for a given template and count.
//!
//! ## Example
//!
//! ```rust
//! use pcfm_core::phase_retrieval::AlternatingProjection;
//! use pcfm_core::template::SpectralTemplate;
//!
//! let template = SpectralTemplate::gaussian(8, 0.3);
//! let designer = AlternatingProjection::new(50);
//! let waveform = designer.design(&template);
//! assert_eq!(waveform.len(), 15);
//! for s in &waveform {
//!     assert!((s.norm() - 1.0).abs() < 1e-12);
//! }
//! ```

use num_complex::Complex64;

use crate::fft_utils::SpectralProcessor;
use crate::template::SpectralTemplate;
use crate::types::IQSample;

/// Alternating-projection phase retriever.
#[derive(Debug, Clone)]
pub struct AlternatingProjection {
    iterations: usize,
}

impl AlternatingProjection {
    /// Create a designer that runs exactly `iterations` projection passes.
    pub fn new(iterations: usize) -> Self {
        Self { iterations }
    }

    /// Configured iteration count.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Design a unit-modulus sequence whose spectral magnitude tracks the
    /// template values, used as supplied (magnitude spectrum).
    ///
    /// With an iteration count of 0 this returns the unit-phase inverse
    /// transform of the template exactly.
    pub fn design(&self, template: &SpectralTemplate) -> Vec<IQSample> {
        let magnitudes: Vec<Complex64> = template
            .values()
            .iter()
            .map(|&u| Complex64::new(u, 0.0))
            .collect();
        self.design_from_magnitude(&magnitudes)
    }

    /// Design from an arbitrary complex spectrum; only magnitudes are
    /// enforced, the supplied phases merely shape the initialization.
    pub fn design_from_magnitude(&self, spectrum: &[Complex64]) -> Vec<IQSample> {
        let len = spectrum.len();
        let mut fft = SpectralProcessor::new(len);
        let target: Vec<f64> = spectrum.iter().map(|c| c.norm()).collect();

        // Seed: inverse-transform the template, discard magnitude.
        let time = fft.ifft(spectrum);
        let mut pk: Vec<IQSample> = time.iter().map(unit_phase).collect();

        for _ in 0..self.iterations {
            // Magnitude projection in the spectral domain.
            let mut freq = fft.fft(&pk);
            for (f, &mag) in freq.iter_mut().zip(target.iter()) {
                *f = unit_phase(f) * mag;
            }
            // Unit-modulus projection in the sample domain.
            let time = fft.ifft(&freq);
            for (p, t) in pk.iter_mut().zip(time.iter()) {
                *p = unit_phase(t);
            }
        }

        pk
    }
}

/// exp(j·angle(z)); maps exact zero to 1 + 0j (angle 0).
fn unit_phase(z: &Complex64) -> Complex64 {
    let angle = z.arg();
    Complex64::new(angle.cos(), angle.sin())
}
