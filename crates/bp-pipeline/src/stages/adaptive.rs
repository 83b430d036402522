//! Adaptive filter stages
//!
//! lmsFilter and rlsFilter require exactly 2 channels: primary x[n] on
//! channel 0, desired d[n] on channel 1. The error e[n] = d[n] - y[n] is
//! written to both output channels.

use crate::stage::Stage;
use bp_core::{DspError, DspResult, Sample, simd, toon};
use bp_dsp::adaptive::{LmsFilter, RlsFilter};

fn check_two_channels(name: &str, channels: usize) -> DspResult<()> {
    if channels != 2 {
        return Err(DspError::ShapeMismatch(format!(
            "{name} requires exactly 2 channels: channel 0 = primary x[n], channel 1 = desired d[n]"
        )));
    }
    Ok(())
}

// ---------- LMS ----------

pub struct LmsStage {
    filter: LmsFilter,
    scratch_x: Vec<Sample>,
    scratch_d: Vec<Sample>,
}

impl LmsStage {
    pub fn new(
        num_taps: usize,
        learning_rate: Sample,
        normalized: bool,
        leak: Sample,
    ) -> DspResult<Self> {
        Ok(Self {
            filter: LmsFilter::new(num_taps, learning_rate, normalized, leak)?,
            scratch_x: Vec::new(),
            scratch_d: Vec::new(),
        })
    }
}

impl Stage for LmsStage {
    fn type_name(&self) -> &str {
        "lmsFilter"
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        check_two_channels("lmsFilter", channels)?;

        let frames = buffer.len() / 2;
        self.scratch_x.resize(frames, 0.0);
        self.scratch_d.resize(frames, 0.0);
        simd::deinterleave2(buffer, &mut self.scratch_x, &mut self.scratch_d);

        for i in 0..frames {
            let error = self.filter.process_sample(self.scratch_x[i], self.scratch_d[i]);
            self.scratch_x[i] = error;
            self.scratch_d[i] = error;
        }

        simd::interleave2(&self.scratch_x, &self.scratch_d, buffer);
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        let (weights, history) = self.filter.state();
        s.write_i32(self.filter.num_taps() as i32);
        s.write_f32_array(&weights);
        s.write_f32_array(&history);
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let num_taps = d.read_i32() as usize;
        let weights = d.read_f32_array();
        let history = d.read_f32_array();
        d.require_ok()?;
        if num_taps != self.filter.num_taps() {
            return Err(DspError::StateShapeMismatch(
                "lmsFilter tap count mismatch on restore".into(),
            ));
        }
        self.filter.set_state(&weights, &history)
    }

    fn reset(&mut self) {
        self.filter.reset();
    }
}

// ---------- RLS ----------

pub struct RlsStage {
    filter: RlsFilter,
    scratch_x: Vec<Sample>,
    scratch_d: Vec<Sample>,
}

impl RlsStage {
    pub fn new(num_taps: usize, lambda: Sample, delta: Sample) -> DspResult<Self> {
        Ok(Self {
            filter: RlsFilter::new(num_taps, lambda, delta)?,
            scratch_x: Vec::new(),
            scratch_d: Vec::new(),
        })
    }
}

impl Stage for RlsStage {
    fn type_name(&self) -> &str {
        "rlsFilter"
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        check_two_channels("rlsFilter", channels)?;

        let frames = buffer.len() / 2;
        self.scratch_x.resize(frames, 0.0);
        self.scratch_d.resize(frames, 0.0);
        simd::deinterleave2(buffer, &mut self.scratch_x, &mut self.scratch_d);

        for i in 0..frames {
            let error = self.filter.process_sample(self.scratch_x[i], self.scratch_d[i]);
            self.scratch_x[i] = error;
            self.scratch_d[i] = error;
        }

        simd::interleave2(&self.scratch_x, &self.scratch_d, buffer);
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        let (weights, inverse_cov, history) = self.filter.state();
        s.write_i32(self.filter.num_taps() as i32);
        s.write_f32(self.filter.lambda());
        s.write_f32(self.filter.delta());
        s.write_f32_array(&weights);
        s.write_f32_array(&inverse_cov);
        s.write_f32_array(&history);
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let num_taps = d.read_i32() as usize;
        let lambda = d.read_f32();
        let _delta = d.read_f32();
        let weights = d.read_f32_array();
        let inverse_cov = d.read_f32_array();
        let history = d.read_f32_array();
        d.require_ok()?;
        if num_taps != self.filter.num_taps() || lambda != self.filter.lambda() {
            return Err(DspError::StateShapeMismatch(
                "rlsFilter parameter mismatch on restore".into(),
            ));
        }
        self.filter.set_state(&weights, &inverse_cov, &history)
    }

    fn reset(&mut self) {
        self.filter.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_two_channels() {
        let mut lms = LmsStage::new(4, 0.01, false, 0.0).unwrap();
        let mut mono = vec![0.0f32; 8];
        assert!(lms.process_in_place(&mut mono, 1, None).is_err());

        let mut rls = RlsStage::new(4, 0.99, 0.01).unwrap();
        let mut quad = vec![0.0f32; 8];
        assert!(rls.process_in_place(&mut quad, 4, None).is_err());
    }

    #[test]
    fn test_error_written_to_both_channels() {
        let mut stage = RlsStage::new(2, 0.99, 0.01).unwrap();
        let mut buffer = vec![1.0f32, 2.5, 0.5, 1.0];
        stage.process_in_place(&mut buffer, 2, None).unwrap();
        assert_eq!(buffer[0], buffer[1]);
        assert_eq!(buffer[2], buffer[3]);
        // First error equals the desired sample (zero initial weights)
        assert!((buffer[0] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_lms_error_decreases_on_correlated_input() {
        let mut stage = LmsStage::new(4, 0.5, true, 0.0).unwrap();
        // d = x delayed mix, long enough to adapt
        let frames = 800;
        let mut buffer = Vec::with_capacity(frames * 2);
        let mut prev = 0.0f32;
        for i in 0..frames {
            let x = ((i * 37 % 97) as f32 / 48.5) - 1.0;
            let d = 0.6 * x + 0.3 * prev;
            buffer.push(x);
            buffer.push(d);
            prev = x;
        }
        stage.process_in_place(&mut buffer, 2, None).unwrap();

        let early: f32 = buffer[..100].iter().map(|e| e * e).sum::<f32>() / 100.0;
        let late: f32 =
            buffer[buffer.len() - 100..].iter().map(|e| e * e).sum::<f32>() / 100.0;
        assert!(late < early * 0.1, "early={early}, late={late}");
    }

    #[test]
    fn test_rls_state_round_trip() {
        let mut a = RlsStage::new(3, 0.98, 0.5).unwrap();
        let mut warm: Vec<f32> = (0..40).map(|i| (i as f32 * 0.37).sin()).collect();
        a.process_in_place(&mut warm, 2, None).unwrap();

        let mut s = toon::Serializer::new();
        a.serialize_state(&mut s);
        let bytes = s.into_bytes();

        let mut b = RlsStage::new(3, 0.98, 0.5).unwrap();
        let mut d = toon::Deserializer::new(&bytes);
        b.deserialize_state(&mut d).unwrap();

        let mut buf_a: Vec<f32> = (0..20).map(|i| (i as f32 * 0.81).cos()).collect();
        let mut buf_b = buf_a.clone();
        a.process_in_place(&mut buf_a, 2, None).unwrap();
        b.process_in_place(&mut buf_b, 2, None).unwrap();
        assert_eq!(buf_a, buf_b);
    }
}
