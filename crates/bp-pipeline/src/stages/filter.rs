//! Generic coefficient filter stage
//!
//! `filter` runs one Direct-Form-I kernel per channel. `a == [1.0]`
//! selects the FIR fast path; otherwise the leading a[0] is normalised
//! out and the remainder drives the feedback taps.

use crate::stage::Stage;
use bp_core::{DspError, DspResult, Sample, toon};
use bp_dsp::iir::DirectForm1;

pub struct FilterStage {
    b: Vec<f64>,
    /// Feedback a[1..] with a[0] normalised out
    a: Vec<f64>,
    is_fir: bool,
    type_name: String,
    kernels: Vec<DirectForm1>,
    scratch_in: Vec<Sample>,
    scratch_out: Vec<Sample>,
}

impl FilterStage {
    /// `a_coeffs` includes the leading a[0]; `[1.0]` means FIR.
    pub fn new(b_coeffs: &[f64], a_coeffs: &[f64]) -> DspResult<Self> {
        if b_coeffs.is_empty() || a_coeffs.is_empty() {
            return Err(DspError::ShapeMismatch(
                "filter coefficients cannot be empty".into(),
            ));
        }

        let a0 = a_coeffs[0];
        if a0.abs() < 1e-12 {
            return Err(DspError::InvalidParams(
                "filter a[0] must be non-zero".into(),
            ));
        }

        let is_fir = a_coeffs.len() == 1 && (a0 - 1.0).abs() < 1e-10;
        let b: Vec<f64> = b_coeffs.iter().map(|v| v / a0).collect();
        let a: Vec<f64> = a_coeffs[1..].iter().map(|v| v / a0).collect();

        if !DirectForm1::new(&b, &a)?.is_stable() {
            log::warn!("filter stage built with unstable feedback coefficients");
        }

        let type_name = if is_fir { "filter:fir" } else { "filter:iir" }.to_owned();

        Ok(Self {
            b,
            a,
            is_fir,
            type_name,
            kernels: Vec::new(),
            scratch_in: Vec::new(),
            scratch_out: Vec::new(),
        })
    }

    pub fn from_coeffs(coeffs: &bp_dsp::design::FilterCoeffs) -> DspResult<Self> {
        let mut a_full = vec![1.0];
        a_full.extend_from_slice(&coeffs.a);
        Self::new(&coeffs.b, &a_full)
    }

    pub fn is_fir(&self) -> bool {
        self.is_fir
    }

    /// Advisory stability marker for the configured coefficients.
    pub fn is_stable(&self) -> DspResult<bool> {
        Ok(DirectForm1::new(&self.b, &self.a)?.is_stable())
    }

    /// Opt-in hard check: fail with `NumericInstability` when the
    /// feedback polynomial has a pole on or outside the unit circle.
    pub fn require_stable(&self) -> DspResult<()> {
        if self.is_stable()? {
            Ok(())
        } else {
            Err(DspError::NumericInstability(
                "filter poles on or outside the unit circle".into(),
            ))
        }
    }

    fn ensure_kernels(&mut self, channels: usize) -> DspResult<()> {
        if self.kernels.is_empty() {
            for _ in 0..channels {
                self.kernels.push(DirectForm1::new(&self.b, &self.a)?);
            }
        } else if self.kernels.len() != channels {
            return Err(DspError::ShapeMismatch(format!(
                "filter configured for {} channels, got {channels}",
                self.kernels.len()
            )));
        }
        Ok(())
    }
}

impl Stage for FilterStage {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        self.ensure_kernels(channels)?;

        let frames = buffer.len() / channels;
        self.scratch_in.resize(frames, 0.0);
        self.scratch_out.resize(frames, 0.0);

        for ch in 0..channels {
            for i in 0..frames {
                self.scratch_in[i] = buffer[i * channels + ch];
            }
            self.kernels[ch].process_block(&self.scratch_in, &mut self.scratch_out);
            for i in 0..frames {
                buffer[i * channels + ch] = self.scratch_out[i];
            }
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_str(if self.is_fir { "fir" } else { "iir" });

        s.write_i32(self.b.len() as i32);
        for &v in &self.b {
            s.write_f64(v);
        }
        s.write_i32(self.a.len() as i32);
        for &v in &self.a {
            s.write_f64(v);
        }

        s.write_i32(self.kernels.len() as i32);
        for kernel in &self.kernels {
            let (x_state, y_state, x_index, y_index) = kernel.state();
            s.write_f32_array(x_state);
            s.write_f32_array(y_state);
            s.write_i32(x_index as i32);
            s.write_i32(y_index as i32);
        }
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let kind = d.read_string();
        d.require_ok()?;
        let expected = if self.is_fir { "fir" } else { "iir" };
        if kind != expected {
            return Err(DspError::StateShapeMismatch(format!(
                "filter kind '{kind}' does not match '{expected}'"
            )));
        }

        let b_len = d.read_i32();
        let mut b = Vec::new();
        for _ in 0..b_len.max(0) {
            b.push(d.read_f64());
        }
        let a_len = d.read_i32();
        let mut a = Vec::new();
        for _ in 0..a_len.max(0) {
            a.push(d.read_f64());
        }
        d.require_ok()?;

        if b != self.b || a != self.a {
            return Err(DspError::StateShapeMismatch(
                "filter coefficients do not match snapshot".into(),
            ));
        }

        let channels = d.read_i32();
        d.require_ok()?;
        let mut kernels = Vec::new();
        for _ in 0..channels.max(0) {
            let x_state = d.read_f32_array();
            let y_state = d.read_f32_array();
            let x_index = d.read_i32();
            let y_index = d.read_i32();
            d.require_ok()?;
            if x_index < 0 || y_index < 0 {
                return Err(DspError::StateCorrupt("negative ring index".into()));
            }

            let mut kernel = DirectForm1::new(&self.b, &self.a)?;
            kernel.set_state(&x_state, &y_state, x_index as usize, y_index as usize)?;
            kernels.push(kernel);
        }
        self.kernels = kernels;
        Ok(())
    }

    fn reset(&mut self) {
        for kernel in &mut self.kernels {
            kernel.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bp_dsp::design;

    #[test]
    fn test_fir_detection() {
        let fir = FilterStage::new(&[0.25, 0.5, 0.25], &[1.0]).unwrap();
        assert!(fir.is_fir());
        assert_eq!(fir.type_name(), "filter:fir");

        let iir = FilterStage::new(&[1.0], &[1.0, -0.5]).unwrap();
        assert!(!iir.is_fir());
        assert_eq!(iir.type_name(), "filter:iir");
    }

    #[test]
    fn test_a0_normalisation() {
        // b/a scaled by 2 gives the same filter
        let mut f1 = FilterStage::new(&[1.0], &[1.0, -0.5]).unwrap();
        let mut f2 = FilterStage::new(&[2.0], &[2.0, -1.0]).unwrap();
        let mut buf1 = vec![1.0f32, 0.0, 0.0, 0.0];
        let mut buf2 = buf1.clone();
        f1.process_in_place(&mut buf1, 1, None).unwrap();
        f2.process_in_place(&mut buf2, 1, None).unwrap();
        for (a, b) in buf1.iter().zip(&buf2) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_empty_coefficients_rejected() {
        assert!(FilterStage::new(&[], &[1.0]).is_err());
        assert!(FilterStage::new(&[1.0], &[]).is_err());
    }

    #[test]
    fn test_channel_count_change_rejected() {
        let mut stage = FilterStage::new(&[1.0], &[1.0]).unwrap();
        let mut mono = vec![0.0f32; 4];
        stage.process_in_place(&mut mono, 1, None).unwrap();
        let mut stereo = vec![0.0f32; 4];
        assert!(stage.process_in_place(&mut stereo, 2, None).is_err());
    }

    #[test]
    fn test_butterworth_state_round_trip() {
        let coeffs = design::butterworth_high_pass(0.2, 2).unwrap();
        let mut a = FilterStage::from_coeffs(&coeffs).unwrap();

        let mut warm: Vec<f32> = (0..100).map(|i| (i as f32 * 0.31).sin()).collect();
        a.process_in_place(&mut warm, 1, None).unwrap();

        let mut s = toon::Serializer::new();
        a.serialize_state(&mut s);
        let bytes = s.into_bytes();

        let coeffs2 = design::butterworth_high_pass(0.2, 2).unwrap();
        let mut b = FilterStage::from_coeffs(&coeffs2).unwrap();
        let mut d = toon::Deserializer::new(&bytes);
        b.deserialize_state(&mut d).unwrap();

        let mut buf_a: Vec<f32> = (0..100).map(|i| (i as f32 * 0.17).cos()).collect();
        let mut buf_b = buf_a.clone();
        a.process_in_place(&mut buf_a, 1, None).unwrap();
        b.process_in_place(&mut buf_b, 1, None).unwrap();
        assert_eq!(buf_a, buf_b);
    }

    #[test]
    fn test_stability_marker() {
        let coeffs = design::butterworth_low_pass(0.1, 2).unwrap();
        let stage = FilterStage::from_coeffs(&coeffs).unwrap();
        assert!(stage.is_stable().unwrap());
        assert!(stage.require_stable().is_ok());

        let unstable = FilterStage::new(&[1.0], &[1.0, -1.5]).unwrap();
        assert!(matches!(
            unstable.require_stable(),
            Err(DspError::NumericInstability(_))
        ));
    }
}
