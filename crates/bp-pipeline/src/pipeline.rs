//! Pipeline executor
//!
//! Owns the ordered stage list and drives each block through it. In-place
//! stages mutate the working buffer; resizing stages swap in a fresh one,
//! after which the timestamp lane is rebuilt by linear interpolation in
//! the stage's input-time domain. At most one intermediate buffer is alive
//! at a time.
//!
//! A `process` call is single-threaded and runs to completion or error;
//! callers must not re-enter the same pipeline concurrently.

use crate::params::StageParams;
use crate::registry::StageRegistry;
use crate::stage::Stage;
use crate::stages::FilterStage;
use bp_core::{DspError, DspResult, Sample, toon};
use log::debug;
use serde::Serialize;

/// Per-call processing options.
#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    pub channels: usize,
    pub sample_rate: Option<f32>,
}

impl ProcessOptions {
    pub fn mono() -> Self {
        Self {
            channels: 1,
            sample_rate: None,
        }
    }

    pub fn with_channels(channels: usize) -> Self {
        Self {
            channels,
            sample_rate: None,
        }
    }
}

/// Read-only pipeline overview for hosts.
#[derive(Debug, Clone, Serialize)]
pub struct StateSummary {
    pub stage_count: usize,
    pub stages: Vec<StageSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub index: usize,
    pub type_name: String,
    pub resizing: bool,
}

pub struct Pipeline {
    registry: StageRegistry,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            registry: StageRegistry::with_builtin_stages(),
            stages: Vec::new(),
        }
    }

    pub fn with_registry(registry: StageRegistry) -> Self {
        Self {
            registry,
            stages: Vec::new(),
        }
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Construct a stage from the registry and append it. On any error
    /// the pipeline is unchanged.
    pub fn add_stage(&mut self, name: &str, params: &StageParams) -> DspResult<()> {
        let stage = self.registry.create(name, params)?;
        debug!("pipeline: added stage '{}' at index {}", name, self.stages.len());
        self.stages.push(stage);
        Ok(())
    }

    /// Append a generic coefficient filter. Coefficients arrive as raw
    /// f64 arrays, so this bypasses the parameter map.
    pub fn add_filter_stage(&mut self, b_coeffs: &[f64], a_coeffs: &[f64]) -> DspResult<()> {
        let stage = FilterStage::new(b_coeffs, a_coeffs)?;
        debug!(
            "pipeline: added '{}' at index {}",
            stage.type_name(),
            self.stages.len()
        );
        self.stages.push(Box::new(stage));
        Ok(())
    }

    /// Run one block through every stage, in order. Returns the final
    /// buffer; on error nothing is returned and stage state is whatever
    /// the failing stage left behind.
    pub fn process(
        &mut self,
        buffer: &[Sample],
        timestamps: Option<&[Sample]>,
        opts: &ProcessOptions,
    ) -> DspResult<Vec<Sample>> {
        if opts.channels == 0 {
            return Err(DspError::ShapeMismatch("channel count must be > 0".into()));
        }
        if buffer.len() % opts.channels != 0 {
            return Err(DspError::ShapeMismatch(format!(
                "buffer length {} is not divisible by {} channels",
                buffer.len(),
                opts.channels
            )));
        }
        if let Some(ts) = timestamps {
            if ts.len() != buffer.len() {
                return Err(DspError::ShapeMismatch(format!(
                    "timestamp length {} does not match sample length {}",
                    ts.len(),
                    buffer.len()
                )));
            }
        }

        let mut current = buffer.to_vec();
        let mut current_ts: Option<Vec<Sample>> = timestamps.map(|t| t.to_vec());
        let mut channels = opts.channels;

        for stage in self.stages.iter_mut() {
            if stage.is_resizing() {
                let mut out = Vec::with_capacity(stage.calc_output_size(current.len()));
                stage.process_resizing(&current, &mut out, channels, current_ts.as_deref())?;

                let out_channels = stage.output_channels().unwrap_or(channels);
                if let Some(ts) = &current_ts {
                    let out_frames = if out_channels > 0 {
                        out.len() / out_channels
                    } else {
                        0
                    };
                    current_ts = Some(reinterpolate_timestamps(
                        ts,
                        channels,
                        out_frames,
                        out_channels,
                        stage.time_scale_factor(),
                    ));
                }

                channels = out_channels;
                current = out;
            } else {
                stage.process_in_place(&mut current, channels, current_ts.as_deref())?;
            }
        }

        Ok(current)
    }

    // ---------- State management ----------

    /// Snapshot every stage's running state into one TOON blob.
    /// `timestamp` is host-supplied (the core takes no wall-clock
    /// dependency).
    pub fn save_state(&self, timestamp: f64) -> Vec<u8> {
        let mut s = toon::Serializer::with_capacity(4096);
        s.start_object();
        s.field_f64("timestamp", timestamp);
        s.field_i32("stageCount", self.stages.len() as i32);

        s.write_str("stages");
        s.start_array();
        for (index, stage) in self.stages.iter().enumerate() {
            s.start_object();
            s.field_i32("index", index as i32);
            s.field_str("type", stage.type_name());
            s.write_str("state");
            s.start_object();
            stage.serialize_state(&mut s);
            s.end_object();
            s.end_object();
        }
        s.end_array();
        s.end_object();
        s.into_bytes()
    }

    /// Restore a snapshot produced by `save_state`. The stage topology
    /// (count and per-position type names) must match exactly.
    pub fn load_state(&mut self, blob: &[u8]) -> DspResult<()> {
        let mut d = toon::Deserializer::new(blob);

        expect_key(&mut d, toon::Tag::ObjectStart)?;
        require_key(&mut d, "timestamp")?;
        let _timestamp = d.read_f64();
        require_key(&mut d, "stageCount")?;
        let stage_count = d.read_i32();
        d.require_ok()?;

        if stage_count as usize != self.stages.len() {
            return Err(DspError::StateShapeMismatch(format!(
                "snapshot has {stage_count} stages, pipeline has {}",
                self.stages.len()
            )));
        }

        require_key(&mut d, "stages")?;
        expect_tag(&mut d, toon::Tag::ArrayStart)?;

        for (index, stage) in self.stages.iter_mut().enumerate() {
            expect_tag(&mut d, toon::Tag::ObjectStart)?;
            require_key(&mut d, "index")?;
            let saved_index = d.read_i32();
            require_key(&mut d, "type")?;
            let type_name = d.read_string();
            d.require_ok()?;

            if saved_index as usize != index {
                return Err(DspError::StateShapeMismatch(format!(
                    "snapshot stage order mismatch at index {index}"
                )));
            }
            if type_name != stage.type_name() {
                return Err(DspError::StateShapeMismatch(format!(
                    "stage {index} is '{}' but snapshot holds '{type_name}'",
                    stage.type_name()
                )));
            }

            require_key(&mut d, "state")?;
            expect_tag(&mut d, toon::Tag::ObjectStart)?;
            stage.deserialize_state(&mut d)?;
            expect_tag(&mut d, toon::Tag::ObjectEnd)?;
            expect_tag(&mut d, toon::Tag::ObjectEnd)?;
        }

        expect_tag(&mut d, toon::Tag::ArrayEnd)?;
        expect_tag(&mut d, toon::Tag::ObjectEnd)?;
        debug!("pipeline: restored state for {} stages", self.stages.len());
        Ok(())
    }

    /// Reset every stage's running state, keeping coefficients.
    pub fn clear_state(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
        debug!("pipeline: state cleared ({} stages reset)", self.stages.len());
    }

    /// Statistics from the last run of the time-alignment stage at
    /// `index`, if that stage publishes any.
    pub fn alignment_stats(
        &self,
        index: usize,
    ) -> Option<crate::stages::time_align::TimeAlignmentStats> {
        self.stages.get(index).and_then(|s| s.alignment_stats())
    }

    /// Summary view for monitoring without decoding a full snapshot.
    pub fn list_state(&self) -> StateSummary {
        StateSummary {
            stage_count: self.stages.len(),
            stages: self
                .stages
                .iter()
                .enumerate()
                .map(|(index, stage)| StageSummary {
                    index,
                    type_name: stage.type_name().to_owned(),
                    resizing: stage.is_resizing(),
                })
                .collect(),
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_tag(d: &mut toon::Deserializer<'_>, tag: toon::Tag) -> DspResult<()> {
    if !d.consume(tag) {
        return Err(DspError::StateCorrupt(format!(
            "snapshot: expected {tag:?} token"
        )));
    }
    Ok(())
}

fn expect_key(d: &mut toon::Deserializer<'_>, tag: toon::Tag) -> DspResult<()> {
    expect_tag(d, tag)
}

fn require_key(d: &mut toon::Deserializer<'_>, key: &str) -> DspResult<()> {
    let got = d.read_str();
    if got != key {
        return Err(DspError::StateCorrupt(format!(
            "snapshot: expected field '{key}', found '{got}'"
        )));
    }
    Ok(())
}

/// Rebuild the interleaved timestamp lane after a resizing stage.
///
/// Output frame `i` maps to input time `i * scale`; between input frames
/// the timestamp is linearly interpolated, past the end it extrapolates
/// at `scale` per frame. Each frame time is replicated across channels.
fn reinterpolate_timestamps(
    input_ts: &[Sample],
    in_channels: usize,
    out_frames: usize,
    out_channels: usize,
    scale: f64,
) -> Vec<Sample> {
    let in_frames = input_ts.len() / in_channels;
    let mut out = vec![0.0; out_frames * out_channels];
    if in_frames == 0 {
        return out;
    }

    for i in 0..out_frames {
        let src = i as f64 * scale;
        let k = src.floor() as usize;
        let frac = (src - k as f64) as Sample;

        let t = if k >= in_frames - 1 {
            let last = input_ts[(in_frames - 1) * in_channels];
            last + ((src - (in_frames - 1) as f64) * scale) as Sample
        } else {
            let t0 = input_ts[k * in_channels];
            let t1 = input_ts[(k + 1) * in_channels];
            t0 + frac * (t1 - t0)
        };

        for ch in 0..out_channels {
            out[i * out_channels + ch] = t;
        }
    }
    out
}
