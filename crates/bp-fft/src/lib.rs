//! bp-fft: Fourier transforms for biopipe
//!
//! - `engine` - Radix-2 Cooley-Tukey FFT plus direct DFT, with real-input
//!   transforms routed through the mixed-radix real FFT
//! - `fftpack` - Mixed-radix real FFT (factors 4/2/3/5) for arbitrary sizes
//! - `batch` - Worker-pool batch processor with per-worker engines
//! - `cache` - LRU cache for forward real-FFT results

pub mod batch;
pub mod cache;
pub mod engine;
pub mod fftpack;

pub use batch::{BatchHandle, BatchJob, BatchOutput, FftBatchProcessor};
pub use cache::{CacheStats, FftCache};
pub use engine::{FftEngine, spectrum_magnitude, spectrum_phase, spectrum_power};
