//! bp-pipeline: Streaming DSP pipeline executor for biopipe
//!
//! A pipeline is an ordered chain of stages processing interleaved
//! multi-channel float blocks. In-place stages mutate the buffer; resizing
//! stages produce a new one and the executor reinterpolates timestamps
//! across the boundary. Stage state snapshots round-trip through the TOON
//! codec so a pipeline can be persisted and resumed bit-identically.
//!
//! ```no_run
//! use bp_pipeline::{Pipeline, ProcessOptions, StageParams};
//!
//! let mut pipeline = Pipeline::new();
//! pipeline
//!     .add_stage("rectify", &StageParams::new().with("mode", "full"))
//!     .unwrap();
//! let out = pipeline
//!     .process(&[1.0, -2.0, 3.0], None, &ProcessOptions::mono())
//!     .unwrap();
//! assert_eq!(out, vec![1.0, 2.0, 3.0]);
//! ```

mod params;
mod pipeline;
mod registry;
mod stage;
pub mod stages;

pub use params::{ParamValue, StageParams};
pub use pipeline::{Pipeline, ProcessOptions, StageSummary, StateSummary};
pub use registry::StageRegistry;
pub use stage::Stage;
