//! Wavelet transform stage
//!
//! Single-level DWT per channel over the incoming block, emitted as
//! `[approximation | detail]` in place. An odd trailing sample is left
//! untouched.

use crate::stage::Stage;
use bp_core::{DspError, DspResult, Sample, toon};
use bp_dsp::wavelet::{WaveletFilter, WaveletKind, dwt_single_level};

pub struct WaveletTransformStage {
    kind: WaveletKind,
    filter: WaveletFilter,
    scratch: Vec<Sample>,
    approx: Vec<Sample>,
    detail: Vec<Sample>,
}

impl WaveletTransformStage {
    pub fn new(kind: WaveletKind) -> Self {
        Self {
            kind,
            filter: WaveletFilter::new(kind),
            scratch: Vec::new(),
            approx: Vec::new(),
            detail: Vec::new(),
        }
    }
}

impl Stage for WaveletTransformStage {
    fn type_name(&self) -> &str {
        "waveletTransform"
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        let frames = buffer.len() / channels;
        let half = frames / 2;
        if half == 0 {
            return Ok(());
        }

        self.scratch.resize(frames, 0.0);
        self.approx.resize(half, 0.0);
        self.detail.resize(half, 0.0);

        for ch in 0..channels {
            for i in 0..frames {
                self.scratch[i] = buffer[i * channels + ch];
            }
            dwt_single_level(&self.scratch, &self.filter, &mut self.approx, &mut self.detail);
            for i in 0..half {
                buffer[i * channels + ch] = self.approx[i];
                buffer[(half + i) * channels + ch] = self.detail[i];
            }
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_str(self.kind.name());
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let name = d.read_string();
        d.require_ok()?;
        if name != self.kind.name() {
            return Err(DspError::StateShapeMismatch(format!(
                "waveletTransform '{name}' does not match configured '{}'",
                self.kind.name()
            )));
        }
        Ok(())
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haar_block_layout() {
        let mut stage = WaveletTransformStage::new(WaveletKind::Haar);
        let mut buffer = vec![1.0f32, 3.0, 2.0, 4.0];
        stage.process_in_place(&mut buffer, 1, None).unwrap();

        let s = std::f32::consts::FRAC_1_SQRT_2;
        // [a0, a1, d0, d1]
        assert!((buffer[0] - 4.0 * s).abs() < 1e-5);
        assert!((buffer[1] - 6.0 * s).abs() < 1e-5);
        assert!((buffer[2] + 2.0 * s).abs() < 1e-5);
        assert!((buffer[3] + 2.0 * s).abs() < 1e-5);
    }

    #[test]
    fn test_length_preserved() {
        let mut stage = WaveletTransformStage::new(WaveletKind::Db4);
        let mut buffer: Vec<f32> = (0..64).map(|i| (i as f32 * 0.2).sin()).collect();
        let before = buffer.len();
        stage.process_in_place(&mut buffer, 2, None).unwrap();
        assert_eq!(buffer.len(), before);
    }

    #[test]
    fn test_restore_checks_wavelet_name() {
        let a = WaveletTransformStage::new(WaveletKind::Db2);
        let mut s = toon::Serializer::new();
        a.serialize_state(&mut s);
        let bytes = s.into_bytes();

        let mut b = WaveletTransformStage::new(WaveletKind::Haar);
        let mut d = toon::Deserializer::new(&bytes);
        assert!(b.deserialize_state(&mut d).is_err());
    }
}
