//! bp-dsp: Numeric kernels for the biopipe pipeline
//!
//! Per-channel streaming kernels with explicit state, shared by the pipeline
//! stage adapters in `bp-pipeline`:
//!
//! - `iir` - Direct-Form-I recursive filter with power-of-two state rings
//! - `design` - Classical IIR design (Butterworth, Chebyshev I, EQ cookbook)
//! - `filter_bank` - Psychoacoustic/mathematical band-splitting design
//! - `window_stats` - Running-window mean/RMS/variance/z-score/MAV
//! - `counters` - Waveform length, slope-sign change, Willison amplitude
//! - `multirate` - Polyphase interpolation, decimation, rational resampling
//! - `regression` - Running-window least squares
//! - `adaptive` - LMS and RLS adaptive filters
//! - `convolution` - Direct and FFT overlap-save kernels
//! - `wavelet` - Single-level discrete wavelet transform
//! - `windows` - Analysis window functions

pub mod adaptive;
pub mod convolution;
pub mod counters;
pub mod design;
pub mod filter_bank;
pub mod iir;
pub mod multirate;
pub mod regression;
pub mod wavelet;
pub mod window_stats;
pub mod windows;

pub use adaptive::{LmsFilter, RlsFilter};
pub use design::FilterCoeffs;
pub use iir::DirectForm1;
pub use window_stats::{RunningStat, StatKind};
