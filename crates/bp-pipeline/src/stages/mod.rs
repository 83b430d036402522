//! Pipeline stage adapters
//!
//! Thin stage wrappers binding the `bp-dsp`/`bp-fft` kernels to the stage
//! contract: interleaved buffer handling, per-channel kernel instances,
//! TOON state round-trips.

pub mod adaptive;
pub mod channels;
pub mod convolution;
pub mod counters;
pub mod filter;
pub mod filter_bank;
pub mod leaves;
pub mod multirate;
pub mod regression;
pub mod spectral;
pub mod stats;
pub mod time_align;
pub mod wavelet;

pub use adaptive::{LmsStage, RlsStage};
pub use channels::{ChannelMergeStage, ChannelSelectStage, GscPreprocessorStage, MatrixTransformStage};
pub use convolution::ConvolutionStage;
pub use counters::{SscStage, WampStage, WaveformLengthStage};
pub use filter::FilterStage;
pub use filter_bank::FilterBankStage;
pub use leaves::{
    ClipDetectionStage, DifferentiatorStage, IntegratorStage, PeakDetectionStage, RectifyStage,
    SquareStage,
};
pub use multirate::{DecimatorStage, InterpolatorStage, ResamplerStage};
pub use regression::RegressionStage;
pub use spectral::{FftStage, HilbertEnvelopeStage, MelSpectrogramStage, StftStage};
pub use stats::{StatMode, WindowStatStage};
pub use time_align::{TimeAlignmentStage, TimeAlignmentStats};
pub use wavelet::WaveletTransformStage;
