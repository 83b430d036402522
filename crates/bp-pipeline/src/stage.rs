//! Stage contract
//!
//! Every pipeline stage implements this trait. Non-resizing stages mutate
//! the interleaved buffer in place; resizing stages write a fresh output
//! buffer whose actual length is authoritative (`calc_output_size` is only
//! an allocation hint for the executor).

use bp_core::{DspError, DspResult, Sample, toon};

pub trait Stage: Send {
    /// Stable identifier used in snapshots and the registry.
    fn type_name(&self) -> &str;

    /// True when block size or channel count changes.
    fn is_resizing(&self) -> bool {
        false
    }

    /// New channel count after this stage (resizing stages only).
    fn output_channels(&self) -> Option<usize> {
        None
    }

    /// Ratio input-duration / output-duration: > 1 compresses time
    /// (decimation), < 1 stretches it (interpolation).
    fn time_scale_factor(&self) -> f64 {
        1.0
    }

    /// Output element count for a given input element count. For stages
    /// whose exact output depends on runtime state this is an upper bound;
    /// the length reported by `process_resizing` is what counts.
    fn calc_output_size(&self, input_len: usize) -> usize {
        input_len
    }

    /// In-place processing for non-resizing stages. `timestamps`, when
    /// present, has one entry per interleaved element with the frame time
    /// replicated across channels.
    fn process_in_place(
        &mut self,
        _buffer: &mut [Sample],
        _channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        Err(DspError::ShapeMismatch(format!(
            "{} is a resizing stage and cannot process in place",
            self.type_name()
        )))
    }

    /// Resizing processing: fill `output` (comes in empty with reserved
    /// capacity) and leave its length at the actual output size.
    fn process_resizing(
        &mut self,
        input: &[Sample],
        output: &mut Vec<Sample>,
        _channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        output.extend_from_slice(input);
        Ok(())
    }

    /// Post-process resampling statistics, for stages that publish them.
    fn alignment_stats(&self) -> Option<crate::stages::time_align::TimeAlignmentStats> {
        None
    }

    /// Append this stage's running state to a TOON stream.
    fn serialize_state(&self, s: &mut toon::Serializer);

    /// Restore running state from a TOON stream. Either succeeds entirely
    /// or leaves the stage untouched.
    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()>;

    /// Clear running state; coefficients and configuration survive.
    fn reset(&mut self);
}
