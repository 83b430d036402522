//! Channel routing and linear-transform stages
//!
//! channelSelect and channelMerge re-route interleaved lanes (resizing the
//! channel count); matrixTransform applies a pre-trained linear map per
//! frame; gscPreprocessor folds an N-channel array into the 2-channel
//! primary/desired layout the adaptive filters consume.

use crate::stage::Stage;
use bp_core::{DspError, DspResult, Sample, toon};

// ---------- Channel select ----------

/// Pick, reorder, or duplicate channels by index.
pub struct ChannelSelectStage {
    channels: Vec<usize>,
    num_input_channels: usize,
}

impl ChannelSelectStage {
    pub fn new(channels: Vec<usize>, num_input_channels: usize) -> DspResult<Self> {
        if channels.is_empty() {
            return Err(DspError::InvalidParams(
                "channelSelect: channels array cannot be empty".into(),
            ));
        }
        if num_input_channels == 0 {
            return Err(DspError::InvalidParams(
                "channelSelect: numInputChannels must be > 0".into(),
            ));
        }
        for &ch in &channels {
            if ch >= num_input_channels {
                return Err(DspError::InvalidParams(format!(
                    "channelSelect: channel index {ch} out of range [0, {}]",
                    num_input_channels - 1
                )));
            }
        }
        Ok(Self {
            channels,
            num_input_channels,
        })
    }
}

impl Stage for ChannelSelectStage {
    fn type_name(&self) -> &str {
        "channelSelect"
    }

    fn is_resizing(&self) -> bool {
        true
    }

    fn output_channels(&self) -> Option<usize> {
        Some(self.channels.len())
    }

    fn calc_output_size(&self, input_len: usize) -> usize {
        (input_len / self.num_input_channels) * self.channels.len()
    }

    fn process_resizing(
        &mut self,
        input: &[Sample],
        output: &mut Vec<Sample>,
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        if channels != self.num_input_channels {
            return Err(DspError::ShapeMismatch(format!(
                "channelSelect configured for {} input channels, got {channels}",
                self.num_input_channels
            )));
        }

        let frames = input.len() / channels;
        let out_channels = self.channels.len();
        output.resize(frames * out_channels, 0.0);
        for i in 0..frames {
            for (out_ch, &in_ch) in self.channels.iter().enumerate() {
                output[i * out_channels + out_ch] = input[i * channels + in_ch];
            }
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.num_input_channels as i32);
        s.write_i32(self.channels.len() as i32);
        for &ch in &self.channels {
            s.write_i32(ch as i32);
        }
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let input_channels = d.read_i32() as usize;
        let count = d.read_i32();
        let mut selected = Vec::new();
        for _ in 0..count.max(0) {
            selected.push(d.read_i32().max(0) as usize);
        }
        d.require_ok()?;
        if input_channels != self.num_input_channels || selected != self.channels {
            return Err(DspError::StateShapeMismatch(
                "channelSelect configuration mismatch on restore".into(),
            ));
        }
        Ok(())
    }

    fn reset(&mut self) {}
}

// ---------- Channel merge ----------

/// Output channel `j` copies input channel `mapping[j]`.
pub struct ChannelMergeStage {
    mapping: Vec<usize>,
    num_input_channels: usize,
}

impl ChannelMergeStage {
    pub fn new(mapping: Vec<usize>, num_input_channels: usize) -> DspResult<Self> {
        if mapping.is_empty() {
            return Err(DspError::InvalidParams(
                "channelMerge: mapping array cannot be empty".into(),
            ));
        }
        if num_input_channels == 0 {
            return Err(DspError::InvalidParams(
                "channelMerge: numInputChannels must be > 0".into(),
            ));
        }
        for &ch in &mapping {
            if ch >= num_input_channels {
                return Err(DspError::InvalidParams(format!(
                    "channelMerge: mapping index {ch} out of range [0, {}]",
                    num_input_channels - 1
                )));
            }
        }
        Ok(Self {
            mapping,
            num_input_channels,
        })
    }
}

impl Stage for ChannelMergeStage {
    fn type_name(&self) -> &str {
        "channelMerge"
    }

    fn is_resizing(&self) -> bool {
        true
    }

    fn output_channels(&self) -> Option<usize> {
        Some(self.mapping.len())
    }

    fn calc_output_size(&self, input_len: usize) -> usize {
        (input_len / self.num_input_channels) * self.mapping.len()
    }

    fn process_resizing(
        &mut self,
        input: &[Sample],
        output: &mut Vec<Sample>,
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        if channels != self.num_input_channels {
            return Err(DspError::ShapeMismatch(format!(
                "channelMerge configured for {} input channels, got {channels}",
                self.num_input_channels
            )));
        }

        let frames = input.len() / channels;
        let out_channels = self.mapping.len();
        output.resize(frames * out_channels, 0.0);
        for i in 0..frames {
            for (out_ch, &in_ch) in self.mapping.iter().enumerate() {
                output[i * out_channels + out_ch] = input[i * channels + in_ch];
            }
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.num_input_channels as i32);
        s.write_i32(self.mapping.len() as i32);
        for &ch in &self.mapping {
            s.write_i32(ch as i32);
        }
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let input_channels = d.read_i32() as usize;
        let count = d.read_i32();
        let mut mapping = Vec::new();
        for _ in 0..count.max(0) {
            mapping.push(d.read_i32().max(0) as usize);
        }
        d.require_ok()?;
        if input_channels != self.num_input_channels || mapping != self.mapping {
            return Err(DspError::StateShapeMismatch(
                "channelMerge configuration mismatch on restore".into(),
            ));
        }
        Ok(())
    }

    fn reset(&mut self) {}
}

// ---------- Matrix transform ----------

/// Pre-trained linear map (PCA/ICA/whitening): per frame
/// y = W^T (x - mean). Components beyond `num_components` are zeroed so
/// the interleaved layout is preserved.
pub struct MatrixTransformStage {
    /// Column-major numChannels x numComponents
    matrix: Vec<Sample>,
    mean: Vec<Sample>,
    num_channels: usize,
    num_components: usize,
}

impl MatrixTransformStage {
    pub fn new(
        matrix: Vec<Sample>,
        mean: Vec<Sample>,
        num_channels: usize,
        num_components: usize,
    ) -> DspResult<Self> {
        if num_channels == 0 {
            return Err(DspError::InvalidParams(
                "matrixTransform: numChannels must be positive".into(),
            ));
        }
        if num_components == 0 || num_components > num_channels {
            return Err(DspError::InvalidParams(
                "matrixTransform: numComponents must be in [1, numChannels]".into(),
            ));
        }
        if mean.len() != num_channels {
            return Err(DspError::ShapeMismatch(format!(
                "matrixTransform: mean vector size {} != numChannels {num_channels}",
                mean.len()
            )));
        }
        if matrix.len() != num_channels * num_components {
            return Err(DspError::ShapeMismatch(format!(
                "matrixTransform: matrix size {} != numChannels x numComponents = {}",
                matrix.len(),
                num_channels * num_components
            )));
        }
        Ok(Self {
            matrix,
            mean,
            num_channels,
            num_components,
        })
    }

    /// W[ch][comp] in the column-major layout.
    #[inline]
    fn weight(&self, ch: usize, comp: usize) -> Sample {
        self.matrix[comp * self.num_channels + ch]
    }
}

impl Stage for MatrixTransformStage {
    fn type_name(&self) -> &str {
        "matrixTransform"
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        if channels != self.num_channels {
            return Err(DspError::ShapeMismatch(format!(
                "matrixTransform configured for {} channels, got {channels}",
                self.num_channels
            )));
        }

        let frames = buffer.len() / channels;
        let mut centered = vec![0.0f32; channels];
        for i in 0..frames {
            let frame = &mut buffer[i * channels..(i + 1) * channels];
            for (c, v) in centered.iter_mut().enumerate() {
                *v = frame[c] - self.mean[c];
            }
            for comp in 0..self.num_components {
                let mut acc = 0.0f32;
                for (c, &v) in centered.iter().enumerate() {
                    acc += self.weight(c, comp) * v;
                }
                frame[comp] = acc;
            }
            for v in frame[self.num_components..].iter_mut() {
                *v = 0.0;
            }
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.num_channels as i32);
        s.write_i32(self.num_components as i32);
        s.write_f32_array(&self.matrix);
        s.write_f32_array(&self.mean);
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let num_channels = d.read_i32() as usize;
        let num_components = d.read_i32() as usize;
        let matrix = d.read_f32_array();
        let mean = d.read_f32_array();
        d.require_ok()?;
        if num_channels != self.num_channels || num_components != self.num_components {
            return Err(DspError::StateShapeMismatch(
                "matrixTransform shape mismatch on restore".into(),
            ));
        }
        if matrix.len() != self.matrix.len() || mean.len() != self.mean.len() {
            return Err(DspError::StateCorrupt(
                "matrixTransform payload length mismatch".into(),
            ));
        }
        self.matrix = matrix;
        self.mean = mean;
        Ok(())
    }

    fn reset(&mut self) {}
}

// ---------- GSC preprocessor ----------

/// Generalized sidelobe canceler front end: channel 0 becomes the summed
/// blocking-matrix output (noise reference), channel 1 the steered beam
/// (desired signal), remaining channels are zeroed. Feed the result into
/// lmsFilter or rlsFilter.
pub struct GscPreprocessorStage {
    steering: Vec<Sample>,
    /// Column-major numChannels x (numChannels - 1)
    blocking: Vec<Sample>,
    num_channels: usize,
}

impl GscPreprocessorStage {
    pub fn new(
        steering: Vec<Sample>,
        blocking: Vec<Sample>,
        num_channels: usize,
    ) -> DspResult<Self> {
        if num_channels < 2 {
            return Err(DspError::InvalidParams(
                "gscPreprocessor: at least 2 channels required".into(),
            ));
        }
        if steering.len() != num_channels {
            return Err(DspError::ShapeMismatch(format!(
                "gscPreprocessor: steering weights size {} != numChannels {num_channels}",
                steering.len()
            )));
        }
        if blocking.len() != num_channels * (num_channels - 1) {
            return Err(DspError::ShapeMismatch(format!(
                "gscPreprocessor: blocking matrix size {} != numChannels x (numChannels - 1) = {}",
                blocking.len(),
                num_channels * (num_channels - 1)
            )));
        }
        Ok(Self {
            steering,
            blocking,
            num_channels,
        })
    }
}

impl Stage for GscPreprocessorStage {
    fn type_name(&self) -> &str {
        "gscPreprocessor"
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        if channels != self.num_channels {
            return Err(DspError::ShapeMismatch(format!(
                "gscPreprocessor configured for {} channels, got {channels}",
                self.num_channels
            )));
        }

        let frames = buffer.len() / channels;
        let refs = channels - 1;
        let mut x = vec![0.0f32; channels];

        for i in 0..frames {
            let frame = &mut buffer[i * channels..(i + 1) * channels];
            x.copy_from_slice(frame);

            // Upper branch: steered beam
            let desired: f32 = self.steering.iter().zip(&x).map(|(w, v)| w * v).sum();

            // Lower branch: blocking matrix cancels the target, the
            // references collapse into one noise channel
            let mut noise = 0.0f32;
            for r in 0..refs {
                let col = &self.blocking[r * channels..(r + 1) * channels];
                noise += col.iter().zip(&x).map(|(w, v)| w * v).sum::<f32>();
            }

            frame[0] = noise;
            frame[1] = desired;
            for v in frame[2..].iter_mut() {
                *v = 0.0;
            }
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.num_channels as i32);
        s.write_f32_array(&self.steering);
        s.write_f32_array(&self.blocking);
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let num_channels = d.read_i32() as usize;
        let steering = d.read_f32_array();
        let blocking = d.read_f32_array();
        d.require_ok()?;
        if num_channels != self.num_channels
            || steering.len() != self.steering.len()
            || blocking.len() != self.blocking.len()
        {
            return Err(DspError::StateShapeMismatch(
                "gscPreprocessor shape mismatch on restore".into(),
            ));
        }
        self.steering = steering;
        self.blocking = blocking;
        Ok(())
    }

    fn reset(&mut self) {}
}
