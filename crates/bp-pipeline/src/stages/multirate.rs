//! Rate-conversion stages
//!
//! interpolate, decimate, and resample wrap the polyphase kernels. All
//! three are resizing stages; the executor reinterpolates timestamps by
//! the reported time-scale factor.

use crate::stage::Stage;
use bp_core::{DspError, DspResult, Sample, toon};
use bp_dsp::multirate::{Decimator, Interpolator, RationalResampler};

// ---------- Interpolator ----------

pub struct InterpolatorStage {
    kernel: Interpolator,
    sample_rate: f64,
}

impl InterpolatorStage {
    pub fn new(factor: usize, order: usize, sample_rate: f64) -> DspResult<Self> {
        Ok(Self {
            kernel: Interpolator::new(factor, order)?,
            sample_rate,
        })
    }
}

impl Stage for InterpolatorStage {
    fn type_name(&self) -> &str {
        "interpolate"
    }

    fn is_resizing(&self) -> bool {
        true
    }

    fn time_scale_factor(&self) -> f64 {
        // More output samples: timestamps compress toward the input span
        1.0 / self.kernel.factor() as f64
    }

    fn calc_output_size(&self, input_len: usize) -> usize {
        input_len * self.kernel.factor()
    }

    fn process_resizing(
        &mut self,
        input: &[Sample],
        output: &mut Vec<Sample>,
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        self.kernel.ensure_channels(channels);
        output.resize(input.len() * self.kernel.factor(), 0.0);
        for ch in 0..channels {
            self.kernel.process_channel(input, output, ch, channels);
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.kernel.factor() as i32);
        s.write_i32(self.kernel.order() as i32);
        s.write_f64(self.sample_rate);
        let states = self.kernel.channel_states();
        s.write_i32(states.len() as i32);
        for (history, index) in &states {
            s.write_f32_array(history);
            s.write_i32(*index as i32);
        }
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let factor = d.read_i32() as usize;
        let order = d.read_i32() as usize;
        let _sample_rate = d.read_f64();
        let channels = d.read_i32();
        d.require_ok()?;

        if factor != self.kernel.factor() || order != self.kernel.order() {
            return Err(DspError::StateShapeMismatch(
                "interpolator parameter mismatch".into(),
            ));
        }

        let mut states = Vec::new();
        for _ in 0..channels.max(0) {
            let history = d.read_f32_array();
            let index = d.read_i32();
            d.require_ok()?;
            if history.len() != order {
                return Err(DspError::StateCorrupt(
                    "interpolator history length mismatch".into(),
                ));
            }
            states.push((history, index.max(0) as usize));
        }
        self.kernel.set_channel_states(&states);
        Ok(())
    }

    fn reset(&mut self) {
        self.kernel.reset();
    }
}

// ---------- Decimator ----------

pub struct DecimatorStage {
    kernel: Decimator,
    sample_rate: f64,
}

impl DecimatorStage {
    pub fn new(factor: usize, order: usize, sample_rate: f64) -> DspResult<Self> {
        Ok(Self {
            kernel: Decimator::new(factor, order)?,
            sample_rate,
        })
    }
}

impl Stage for DecimatorStage {
    fn type_name(&self) -> &str {
        "decimate"
    }

    fn is_resizing(&self) -> bool {
        true
    }

    fn time_scale_factor(&self) -> f64 {
        self.kernel.factor() as f64
    }

    fn calc_output_size(&self, input_len: usize) -> usize {
        // Allocation hint; the phase counter can shift the split by one
        // frame, so leave slack. The processed length is authoritative.
        input_len / self.kernel.factor() + self.kernel.factor()
    }

    fn process_resizing(
        &mut self,
        input: &[Sample],
        output: &mut Vec<Sample>,
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        self.kernel.ensure_channels(channels);
        self.kernel.process(input, output, channels);
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.kernel.factor() as i32);
        s.write_i32(self.kernel.order() as i32);
        s.write_f64(self.sample_rate);
        s.write_i32(self.kernel.phase() as i32);
        let states = self.kernel.channel_states();
        s.write_i32(states.len() as i32);
        for (history, index) in &states {
            s.write_f32_array(history);
            s.write_i32(*index as i32);
        }
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let factor = d.read_i32() as usize;
        let order = d.read_i32() as usize;
        let _sample_rate = d.read_f64();
        let phase = d.read_i32();
        let channels = d.read_i32();
        d.require_ok()?;

        if factor != self.kernel.factor() || order != self.kernel.order() {
            return Err(DspError::StateShapeMismatch(
                "decimator parameter mismatch".into(),
            ));
        }

        let mut states = Vec::new();
        for _ in 0..channels.max(0) {
            let history = d.read_f32_array();
            let index = d.read_i32();
            d.require_ok()?;
            if history.len() != order {
                return Err(DspError::StateCorrupt(
                    "decimator history length mismatch".into(),
                ));
            }
            states.push((history, index.max(0) as usize));
        }
        self.kernel.set_channel_states(&states);
        self.kernel.set_phase(phase.max(0) as usize);
        Ok(())
    }

    fn reset(&mut self) {
        self.kernel.reset();
    }
}

// ---------- Rational resampler ----------

pub struct ResamplerStage {
    kernel: RationalResampler,
    sample_rate: f64,
}

impl ResamplerStage {
    pub fn new(up: usize, down: usize, order: usize, sample_rate: f64) -> DspResult<Self> {
        Ok(Self {
            kernel: RationalResampler::new(up, down, order)?,
            sample_rate,
        })
    }
}

impl Stage for ResamplerStage {
    fn type_name(&self) -> &str {
        "resample"
    }

    fn is_resizing(&self) -> bool {
        true
    }

    fn time_scale_factor(&self) -> f64 {
        self.kernel.down() as f64 / self.kernel.up() as f64
    }

    fn calc_output_size(&self, input_len: usize) -> usize {
        (input_len * self.kernel.up()) / self.kernel.down() + self.kernel.up()
    }

    fn process_resizing(
        &mut self,
        input: &[Sample],
        output: &mut Vec<Sample>,
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        self.kernel.ensure_channels(channels);

        let frames = input.len() / channels;
        let max_frames = (frames * self.kernel.up()).div_ceil(self.kernel.down()) + 1;
        output.resize(max_frames * channels, 0.0);

        let mut produced = 0;
        for ch in 0..channels {
            produced = self.kernel.process_channel(input, output, ch, channels);
        }
        output.truncate(produced * channels);
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.kernel.up() as i32);
        s.write_i32(self.kernel.down() as i32);
        s.write_i32(self.kernel.order() as i32);
        s.write_f64(self.sample_rate);
        let states = self.kernel.channel_states();
        s.write_i32(states.len() as i32);
        for (history, index, phase_acc) in &states {
            s.write_f32_array(history);
            s.write_i32(*index as i32);
            s.write_i32(*phase_acc as i32);
        }
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let up = d.read_i32() as usize;
        let down = d.read_i32() as usize;
        let order = d.read_i32() as usize;
        let _sample_rate = d.read_f64();
        let channels = d.read_i32();
        d.require_ok()?;

        if up != self.kernel.up() || down != self.kernel.down() || order != self.kernel.order() {
            return Err(DspError::StateShapeMismatch(
                "resampler parameter mismatch".into(),
            ));
        }

        let mut states = Vec::new();
        for _ in 0..channels.max(0) {
            let history = d.read_f32_array();
            let index = d.read_i32();
            let phase_acc = d.read_i32();
            d.require_ok()?;
            if history.len() != order {
                return Err(DspError::StateCorrupt(
                    "resampler history length mismatch".into(),
                ));
            }
            states.push((history, index.max(0) as usize, phase_acc.max(0) as usize));
        }
        self.kernel.set_channel_states(&states);
        Ok(())
    }

    fn reset(&mut self) {
        self.kernel.reset();
    }
}
