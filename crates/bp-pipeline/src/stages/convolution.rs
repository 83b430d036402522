//! Convolution stage
//!
//! A fixed kernel against the stream, one convolver per channel. Moving
//! mode carries the block tail across calls; batch mode treats every block
//! in isolation. Auto method selection flips to FFT overlap-save once the
//! kernel/block sizes reach the threshold.

use crate::stage::Stage;
use bp_core::{DspError, DspResult, Sample, toon};
use bp_dsp::convolution::{ConvMethod, StreamingConvolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvMode {
    Moving,
    Batch,
}

impl ConvMode {
    pub fn parse(name: &str) -> Self {
        if name == "batch" { ConvMode::Batch } else { ConvMode::Moving }
    }
}

pub struct ConvolutionStage {
    kernel: Vec<Sample>,
    mode: ConvMode,
    method: ConvMethod,
    auto_threshold: usize,
    convolvers: Vec<StreamingConvolver>,
    scratch_in: Vec<Sample>,
    scratch_out: Vec<Sample>,
}

impl ConvolutionStage {
    pub fn new(
        kernel: Vec<Sample>,
        mode: ConvMode,
        method: ConvMethod,
        auto_threshold: usize,
    ) -> DspResult<Self> {
        if kernel.is_empty() {
            return Err(DspError::ShapeMismatch(
                "convolution: kernel cannot be empty".into(),
            ));
        }
        Ok(Self {
            kernel,
            mode,
            method,
            auto_threshold,
            convolvers: Vec::new(),
            scratch_in: Vec::new(),
            scratch_out: Vec::new(),
        })
    }

    fn ensure_convolvers(&mut self, channels: usize) -> DspResult<()> {
        if self.convolvers.len() != channels {
            let mut convolvers = Vec::with_capacity(channels);
            for _ in 0..channels {
                convolvers.push(StreamingConvolver::new(
                    self.kernel.clone(),
                    self.method,
                    self.auto_threshold,
                )?);
            }
            self.convolvers = convolvers;
        }
        Ok(())
    }
}

impl Stage for ConvolutionStage {
    fn type_name(&self) -> &str {
        "convolution"
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        self.ensure_convolvers(channels)?;

        let frames = buffer.len() / channels;
        self.scratch_in.resize(frames, 0.0);
        self.scratch_out.resize(frames, 0.0);

        for ch in 0..channels {
            for i in 0..frames {
                self.scratch_in[i] = buffer[i * channels + ch];
            }

            if self.mode == ConvMode::Batch {
                self.convolvers[ch].clear_history();
            }
            self.convolvers[ch].process(&self.scratch_in, &mut self.scratch_out)?;

            for i in 0..frames {
                buffer[i * channels + ch] = self.scratch_out[i];
            }
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.kernel.len() as i32);
        s.write_i32(self.convolvers.len() as i32);
        for conv in &self.convolvers {
            s.write_f32_array(conv.history());
        }
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let kernel_len = d.read_i32() as usize;
        let channels = d.read_i32();
        d.require_ok()?;
        if kernel_len != self.kernel.len() {
            return Err(DspError::StateShapeMismatch(
                "convolution kernel length mismatch on restore".into(),
            ));
        }

        let mut convolvers = Vec::new();
        for _ in 0..channels.max(0) {
            let history = d.read_f32_array();
            d.require_ok()?;
            let mut conv =
                StreamingConvolver::new(self.kernel.clone(), self.method, self.auto_threshold)?;
            conv.set_history(&history)?;
            convolvers.push(conv);
        }
        self.convolvers = convolvers;
        Ok(())
    }

    fn reset(&mut self) {
        for conv in &mut self.convolvers {
            conv.clear_history();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_kernel() {
        let mut stage =
            ConvolutionStage::new(vec![1.0], ConvMode::Moving, ConvMethod::Auto, 64).unwrap();
        let mut buffer = vec![1.0f32, -2.0, 3.0];
        stage.process_in_place(&mut buffer, 1, None).unwrap();
        assert_eq!(buffer, vec![1.0, -2.0, 3.0]);
    }

    #[test]
    fn test_moving_carries_history() {
        let kernel = vec![0.5f32, 0.5];
        let mut stage =
            ConvolutionStage::new(kernel, ConvMode::Moving, ConvMethod::Direct, 64).unwrap();

        let mut first = vec![2.0f32, 2.0];
        stage.process_in_place(&mut first, 1, None).unwrap();
        assert_eq!(first, vec![1.0, 2.0]);

        // Next block sees the carried tail
        let mut second = vec![0.0f32];
        stage.process_in_place(&mut second, 1, None).unwrap();
        assert_eq!(second, vec![1.0]);
    }

    #[test]
    fn test_batch_mode_forgets_history() {
        let kernel = vec![0.5f32, 0.5];
        let mut stage =
            ConvolutionStage::new(kernel, ConvMode::Batch, ConvMethod::Direct, 64).unwrap();

        let mut first = vec![2.0f32, 2.0];
        stage.process_in_place(&mut first, 1, None).unwrap();

        let mut second = vec![0.0f32];
        stage.process_in_place(&mut second, 1, None).unwrap();
        assert_eq!(second, vec![0.0]);
    }

    #[test]
    fn test_channels_independent() {
        let kernel = vec![1.0f32, 1.0];
        let mut stage =
            ConvolutionStage::new(kernel, ConvMode::Moving, ConvMethod::Direct, 64).unwrap();
        let mut buffer = vec![1.0f32, 10.0, 1.0, 10.0];
        stage.process_in_place(&mut buffer, 2, None).unwrap();
        assert_eq!(buffer, vec![1.0, 10.0, 2.0, 20.0]);
    }

    #[test]
    fn test_state_round_trip() {
        let kernel = vec![0.25f32, 0.5, 0.25];
        let mut a =
            ConvolutionStage::new(kernel.clone(), ConvMode::Moving, ConvMethod::Direct, 64).unwrap();
        let mut warm = vec![1.0f32, 2.0, 3.0, 4.0];
        a.process_in_place(&mut warm, 1, None).unwrap();

        let mut s = toon::Serializer::new();
        a.serialize_state(&mut s);
        let bytes = s.into_bytes();

        let mut b =
            ConvolutionStage::new(kernel, ConvMode::Moving, ConvMethod::Direct, 64).unwrap();
        let mut d = toon::Deserializer::new(&bytes);
        b.deserialize_state(&mut d).unwrap();

        let mut buf_a = vec![5.0f32, 6.0];
        let mut buf_b = buf_a.clone();
        a.process_in_place(&mut buf_a, 1, None).unwrap();
        b.process_in_place(&mut buf_b, 1, None).unwrap();
        assert_eq!(buf_a, buf_b);
    }

    #[test]
    fn test_empty_kernel_rejected() {
        assert!(ConvolutionStage::new(vec![], ConvMode::Moving, ConvMethod::Auto, 64).is_err());
    }
}
