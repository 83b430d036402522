//! bp-core: Shared types, buffers, and byte-level utilities for biopipe
//!
//! This crate provides the foundation used across all biopipe crates:
//! - `error` - Typed error enum for every fallible pipeline path
//! - `circular` - Ring buffer with optional time-based eviction
//! - `toon` - TOON tagged-byte serialization for state snapshots
//! - `simd` - Runtime SIMD dispatch (AVX2/NEON detection, scalar fallbacks)

mod error;
mod sample;

pub mod circular;
pub mod simd;
pub mod toon;

pub use circular::CircularBuffer;
pub use error::*;
pub use sample::*;
