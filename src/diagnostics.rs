//! Diagnostics — per-iteration snapshots for an external visualization sink
//!
//! The optimization loop can emit a snapshot after every iteration:
//! normalized PSD estimate in dB, normalized autocorrelation magnitude in
//! dB, autocorrelation sidelobe metrics, and the running error trace.
//! Emission is a decoupled side channel — sink failures are reported and
//! isolated, never allowed to perturb or abort the numeric trajectory,
//! and the optimizer is fully functional with no sink attached.
//!
//! Rendering (plots, animation, GIF export) is a consumer concern; the
//! snapshot carries only the data a renderer needs.
//!
//! ## Example
//!
//! ```rust
//! use pcfm_core::diagnostics::{autocorrelation_db, peak_sidelobe_db};
//! use num_complex::Complex64;
//!
//! let waveform: Vec<Complex64> = (0..16)
//!     .map(|i| {
//!         let phase = 0.1 * (i * i) as f64;
//!         Complex64::new(phase.cos(), phase.sin())
//!     })
//!     .collect();
//! let acf_db = autocorrelation_db(&waveform);
//! assert_eq!(acf_db.len(), 31);
//! // zero lag sits at the center, normalized to 0 dB
//! assert!((acf_db[15] - 0.0).abs() < 1e-9);
//! assert!(peak_sidelobe_db(&waveform) < 0.0);
//! ```

use num_complex::Complex64;
use std::sync::mpsc;

use crate::fft_utils::{magnitude_db, power_db, SpectralProcessor};
use crate::types::IQSample;

/// Clip floor for PSD display values.
pub const PSD_FLOOR_DB: f64 = -50.0;
/// Clip floor for autocorrelation display values.
pub const ACF_FLOOR_DB: f64 = -30.0;

/// Linear (aperiodic) autocorrelation via FFT, zero lag at the center.
///
/// Returns 2N−1 lags for an N-sample input.
pub fn autocorrelation(signal: &[IQSample]) -> Vec<Complex64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }
    let padded = (2 * n - 1).next_power_of_two();
    let mut fft = SpectralProcessor::new(padded);

    let mut spectrum = fft.fft(signal);
    for c in spectrum.iter_mut() {
        *c = Complex64::new(c.norm_sqr(), 0.0);
    }
    let circular = fft.ifft(&spectrum);

    // Reassemble centered lags: negative lags live at the tail of the
    // circular result.
    let mut acf = Vec::with_capacity(2 * n - 1);
    acf.extend_from_slice(&circular[padded - (n - 1)..]);
    acf.extend_from_slice(&circular[..n]);
    acf
}

/// Autocorrelation magnitude normalized to the zero lag, in dB, clipped
/// to [`ACF_FLOOR_DB`].
pub fn autocorrelation_db(signal: &[IQSample]) -> Vec<f64> {
    let acf = autocorrelation(signal);
    if acf.is_empty() {
        return Vec::new();
    }
    let zero_lag = acf[(acf.len() - 1) / 2].norm();
    if zero_lag <= 0.0 {
        return vec![ACF_FLOOR_DB; acf.len()];
    }
    let normalized: Vec<f64> = acf.iter().map(|c| c.norm() / zero_lag).collect();
    magnitude_db(&normalized, ACF_FLOOR_DB)
}

/// Peak sidelobe level of the autocorrelation, in dB relative to the
/// zero lag. More negative is better.
pub fn peak_sidelobe_db(signal: &[IQSample]) -> f64 {
    let acf = autocorrelation(signal);
    let mid = (acf.len() - 1) / 2;
    let zero_lag = acf[mid].norm();
    if zero_lag <= 0.0 {
        return 0.0;
    }
    let peak = acf
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != mid)
        .map(|(_, c)| c.norm())
        .fold(0.0f64, f64::max);
    if peak > 0.0 {
        20.0 * (peak / zero_lag).log10()
    } else {
        f64::NEG_INFINITY
    }
}

/// Integrated sidelobe level: total sidelobe energy over mainlobe energy,
/// in dB.
pub fn integrated_sidelobe_db(signal: &[IQSample]) -> f64 {
    let acf = autocorrelation(signal);
    let mid = (acf.len() - 1) / 2;
    let main = acf[mid].norm_sqr();
    if main <= 0.0 {
        return 0.0;
    }
    let side: f64 = acf
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != mid)
        .map(|(_, c)| c.norm_sqr())
        .sum();
    if side > 0.0 {
        10.0 * (side / main).log10()
    } else {
        f64::NEG_INFINITY
    }
}

/// Everything a renderer needs about one optimizer iteration.
#[derive(Debug, Clone)]
pub struct IterationSnapshot {
    /// 1-based iteration index.
    pub iteration: usize,
    /// Current template error, one value per batch column.
    pub costs: Vec<f64>,
    /// Cumulative error trace, one entry per completed iteration.
    pub error_trace: Vec<Vec<f64>>,
    /// Normalized PSD estimate in dB (floor [`PSD_FLOOR_DB`]), per column.
    pub psd_db: Vec<Vec<f64>>,
    /// Normalized autocorrelation magnitude in dB (floor
    /// [`ACF_FLOOR_DB`]), per column.
    pub autocorr_db: Vec<Vec<f64>>,
    /// Peak sidelobe level per column, dB.
    pub psl_db: Vec<f64>,
    /// Integrated sidelobe level per column, dB.
    pub isl_db: Vec<f64>,
}

impl IterationSnapshot {
    /// Package an iteration's products for the sink.
    pub fn capture(
        iteration: usize,
        costs: &[f64],
        error_trace: &[Vec<f64>],
        spectra: &[Vec<f64>],
        waveforms: &[Vec<IQSample>],
    ) -> Self {
        Self {
            iteration,
            costs: costs.to_vec(),
            error_trace: error_trace.to_vec(),
            psd_db: spectra.iter().map(|p| power_db(p, PSD_FLOOR_DB)).collect(),
            autocorr_db: waveforms.iter().map(|w| autocorrelation_db(w)).collect(),
            psl_db: waveforms.iter().map(|w| peak_sidelobe_db(w)).collect(),
            isl_db: waveforms.iter().map(|w| integrated_sidelobe_db(w)).collect(),
        }
    }
}

/// Errors a sink may report. They are logged by the driver and never
/// abort the optimization.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    #[error("sink disconnected: {0}")]
    Disconnected(String),
    #[error("sink rejected snapshot: {0}")]
    Rejected(String),
}

/// Consumer of per-iteration snapshots.
///
/// Implementations must not block the optimization loop; buffer or drop
/// snapshots instead.
pub trait DiagnosticSink {
    fn on_iteration(&mut self, snapshot: IterationSnapshot) -> Result<(), SinkError>;
}

/// Sink that collects every snapshot in memory. Useful in tests and for
/// post-hoc analysis of short runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    snapshots: Vec<IterationSnapshot>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots received so far.
    pub fn snapshots(&self) -> &[IterationSnapshot] {
        &self.snapshots
    }

    /// Consume the sink, returning its snapshots.
    pub fn into_snapshots(self) -> Vec<IterationSnapshot> {
        self.snapshots
    }
}

impl DiagnosticSink for MemorySink {
    fn on_iteration(&mut self, snapshot: IterationSnapshot) -> Result<(), SinkError> {
        self.snapshots.push(snapshot);
        Ok(())
    }
}

/// Sink that forwards snapshots over an unbounded channel to a consumer
/// thread. The producer side never blocks; a hung or dead consumer shows
/// up as a [`SinkError::Disconnected`] that the driver logs and ignores.
#[derive(Debug)]
pub struct ChannelSink {
    sender: mpsc::Sender<IterationSnapshot>,
}

impl ChannelSink {
    /// Create a sink and the receiving end for the consumer.
    pub fn new() -> (Self, mpsc::Receiver<IterationSnapshot>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl DiagnosticSink for ChannelSink {
    fn on_iteration(&mut self, snapshot: IterationSnapshot) -> Result<(), SinkError> {
        self.sender
            .send(snapshot)
            .map_err(|e| SinkError::Disconnected(e.to_string()))
    }
}
