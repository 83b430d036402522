//! Simple per-sample stages
//!
//! Rectification, squaring, differentiation, leaky integration, peak and
//! clip detection. State, where any exists, is a sample or two per channel.

use crate::stage::Stage;
use bp_core::{DspError, DspResult, Sample, toon};

// ---------- Rectify ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectifyMode {
    FullWave,
    HalfWave,
}

pub struct RectifyStage {
    mode: RectifyMode,
}

impl RectifyStage {
    pub fn new(mode: RectifyMode) -> Self {
        Self { mode }
    }
}

impl Stage for RectifyStage {
    fn type_name(&self) -> &str {
        "rectify"
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        _channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        match self.mode {
            RectifyMode::FullWave => {
                for v in buffer.iter_mut() {
                    *v = v.abs();
                }
            }
            RectifyMode::HalfWave => {
                for v in buffer.iter_mut() {
                    *v = v.max(0.0);
                }
            }
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_str(match self.mode {
            RectifyMode::FullWave => "full",
            RectifyMode::HalfWave => "half",
        });
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let mode = d.read_string();
        d.require_ok()?;
        let expected = match self.mode {
            RectifyMode::FullWave => "full",
            RectifyMode::HalfWave => "half",
        };
        if mode != expected {
            return Err(DspError::StateShapeMismatch(
                "rectify mode mismatch on restore".into(),
            ));
        }
        Ok(())
    }

    fn reset(&mut self) {}
}

// ---------- Square ----------

pub struct SquareStage;

impl Stage for SquareStage {
    fn type_name(&self) -> &str {
        "square"
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        _channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        for v in buffer.iter_mut() {
            *v *= *v;
        }
        Ok(())
    }

    fn serialize_state(&self, _s: &mut toon::Serializer) {}

    fn deserialize_state(&mut self, _d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        Ok(())
    }

    fn reset(&mut self) {}
}

// ---------- Differentiator ----------

/// First difference per channel: y[n] = x[n] - x[n-1], with the previous
/// sample carried across blocks.
pub struct DifferentiatorStage {
    prev: Vec<Sample>,
}

impl DifferentiatorStage {
    pub fn new() -> Self {
        Self { prev: Vec::new() }
    }
}

impl Default for DifferentiatorStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for DifferentiatorStage {
    fn type_name(&self) -> &str {
        "differentiator"
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        if self.prev.len() != channels {
            self.prev = vec![0.0; channels];
        }

        let frames = buffer.len() / channels;
        for ch in 0..channels {
            let mut prev = self.prev[ch];
            for i in 0..frames {
                let idx = i * channels + ch;
                let current = buffer[idx];
                buffer[idx] = current - prev;
                prev = current;
            }
            self.prev[ch] = prev;
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.prev.len() as i32);
        s.write_f32_array(&self.prev);
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let channels = d.read_i32();
        let prev = d.read_f32_array();
        d.require_ok()?;
        if channels < 0 || prev.len() != channels as usize {
            return Err(DspError::StateCorrupt(
                "differentiator state length mismatch".into(),
            ));
        }
        self.prev = prev;
        Ok(())
    }

    fn reset(&mut self) {
        self.prev.fill(0.0);
    }
}

// ---------- Integrator ----------

/// Leaky integrator per channel: y[n] = x[n] + alpha * y[n-1].
pub struct IntegratorStage {
    alpha: Sample,
    prev_output: Vec<Sample>,
}

impl IntegratorStage {
    pub fn new(alpha: Sample) -> DspResult<Self> {
        if alpha <= 0.0 || alpha > 1.0 {
            return Err(DspError::InvalidParams(
                "integrator alpha must be in range (0, 1]".into(),
            ));
        }
        Ok(Self {
            alpha,
            prev_output: Vec::new(),
        })
    }
}

impl Stage for IntegratorStage {
    fn type_name(&self) -> &str {
        "integrator"
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        if self.prev_output.len() != channels {
            self.prev_output = vec![0.0; channels];
        }

        let frames = buffer.len() / channels;
        for ch in 0..channels {
            let mut prev = self.prev_output[ch];
            for i in 0..frames {
                let idx = i * channels + ch;
                let out = buffer[idx] + self.alpha * prev;
                buffer[idx] = out;
                prev = out;
            }
            self.prev_output[ch] = prev;
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_f32(self.alpha);
        s.write_i32(self.prev_output.len() as i32);
        s.write_f32_array(&self.prev_output);
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let alpha = d.read_f32();
        let channels = d.read_i32();
        let prev = d.read_f32_array();
        d.require_ok()?;
        if channels < 0 || prev.len() != channels as usize {
            return Err(DspError::StateCorrupt(
                "integrator state length mismatch".into(),
            ));
        }
        self.alpha = alpha;
        self.prev_output = prev;
        Ok(())
    }

    fn reset(&mut self) {
        self.prev_output.fill(0.0);
    }
}

// ---------- Peak detection ----------

/// Three-point local-maximum detector. A sample is confirmed as a peak
/// once its successor arrives, so the marker lands one frame behind and
/// the final frame of each block reads 0.
pub struct PeakDetectionStage {
    threshold: Sample,
    prev: Vec<Sample>,
    prev_prev: Vec<Sample>,
}

impl PeakDetectionStage {
    pub fn new(threshold: Sample) -> DspResult<Self> {
        if threshold < 0.0 {
            return Err(DspError::InvalidParams(
                "peak detection threshold must be >= 0".into(),
            ));
        }
        Ok(Self {
            threshold,
            prev: Vec::new(),
            prev_prev: Vec::new(),
        })
    }
}

impl Stage for PeakDetectionStage {
    fn type_name(&self) -> &str {
        "peakDetection"
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        if self.prev.len() != channels {
            self.prev = vec![0.0; channels];
            self.prev_prev = vec![0.0; channels];
        }

        let frames = buffer.len() / channels;
        for ch in 0..channels {
            let mut prev_prev = self.prev_prev[ch];
            let mut prev = self.prev[ch];

            for i in 0..frames {
                let idx = i * channels + ch;
                let current = buffer[idx];
                let prev_is_peak =
                    prev > prev_prev && prev > current && prev >= self.threshold;

                if i > 0 {
                    buffer[idx - channels] = if prev_is_peak { 1.0 } else { 0.0 };
                } else {
                    buffer[idx] = if prev_is_peak { 1.0 } else { 0.0 };
                }

                prev_prev = prev;
                prev = current;
            }

            // The newest sample cannot be confirmed until the next block
            if frames > 1 {
                buffer[(frames - 1) * channels + ch] = 0.0;
            }

            self.prev_prev[ch] = prev_prev;
            self.prev[ch] = prev;
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_f32(self.threshold);
        s.write_i32(self.prev.len() as i32);
        s.write_f32_array(&self.prev);
        s.write_f32_array(&self.prev_prev);
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let threshold = d.read_f32();
        let channels = d.read_i32();
        let prev = d.read_f32_array();
        let prev_prev = d.read_f32_array();
        d.require_ok()?;
        if channels < 0
            || prev.len() != channels as usize
            || prev_prev.len() != channels as usize
        {
            return Err(DspError::StateCorrupt(
                "peak detection state length mismatch".into(),
            ));
        }
        self.threshold = threshold;
        self.prev = prev;
        self.prev_prev = prev_prev;
        Ok(())
    }

    fn reset(&mut self) {
        self.prev.fill(0.0);
        self.prev_prev.fill(0.0);
    }
}

// ---------- Clip detection ----------

/// Emits 1.0 where |x| reaches the threshold, 0.0 elsewhere. Stateless.
pub struct ClipDetectionStage {
    threshold: Sample,
}

impl ClipDetectionStage {
    pub fn new(threshold: Sample) -> DspResult<Self> {
        if threshold <= 0.0 {
            return Err(DspError::InvalidParams(
                "clip detection threshold must be > 0".into(),
            ));
        }
        Ok(Self { threshold })
    }
}

impl Stage for ClipDetectionStage {
    fn type_name(&self) -> &str {
        "clipDetection"
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        _channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        for v in buffer.iter_mut() {
            *v = if v.abs() >= self.threshold { 1.0 } else { 0.0 };
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_f32(self.threshold);
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let threshold = d.read_f32();
        d.require_ok()?;
        self.threshold = threshold;
        Ok(())
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_wave_rectify() {
        let mut stage = RectifyStage::new(RectifyMode::FullWave);
        let mut buffer = vec![1.0f32, -2.0, 3.0, -4.0];
        stage.process_in_place(&mut buffer, 1, None).unwrap();
        assert_eq!(buffer, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_half_wave_rectify() {
        let mut stage = RectifyStage::new(RectifyMode::HalfWave);
        let mut buffer = vec![1.0f32, -2.0, 3.0, -4.0];
        stage.process_in_place(&mut buffer, 1, None).unwrap();
        assert_eq!(buffer, vec![1.0, 0.0, 3.0, 0.0]);
    }

    #[test]
    fn test_square() {
        let mut stage = SquareStage;
        let mut buffer = vec![-3.0f32, 2.0];
        stage.process_in_place(&mut buffer, 1, None).unwrap();
        assert_eq!(buffer, vec![9.0, 4.0]);
    }

    #[test]
    fn test_differentiator_across_blocks() {
        let mut stage = DifferentiatorStage::new();
        let mut a = vec![1.0f32, 3.0, 6.0];
        stage.process_in_place(&mut a, 1, None).unwrap();
        assert_eq!(a, vec![1.0, 2.0, 3.0]);

        let mut b = vec![10.0f32];
        stage.process_in_place(&mut b, 1, None).unwrap();
        assert_eq!(b, vec![4.0]);
    }

    #[test]
    fn test_integrator_accumulates() {
        let mut stage = IntegratorStage::new(1.0).unwrap();
        let mut buffer = vec![1.0f32, 1.0, 1.0];
        stage.process_in_place(&mut buffer, 1, None).unwrap();
        assert_eq!(buffer, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_integrator_leak() {
        let mut stage = IntegratorStage::new(0.5).unwrap();
        let mut buffer = vec![1.0f32, 0.0, 0.0];
        stage.process_in_place(&mut buffer, 1, None).unwrap();
        assert_eq!(buffer, vec![1.0, 0.5, 0.25]);
    }

    #[test]
    fn test_integrator_rejects_bad_alpha() {
        assert!(IntegratorStage::new(0.0).is_err());
        assert!(IntegratorStage::new(1.5).is_err());
    }

    #[test]
    fn test_peak_detection_marks_local_maximum() {
        let mut stage = PeakDetectionStage::new(0.5).unwrap();
        let mut buffer = vec![0.0f32, 1.0, 0.0, 0.0, 2.0, 0.5, 0.0];
        stage.process_in_place(&mut buffer, 1, None).unwrap();
        // Peaks at original indices 1 and 4 are confirmed at the sample
        // after them, written back one position
        assert_eq!(buffer[1], 1.0);
        assert_eq!(buffer[4], 1.0);
        assert_eq!(buffer[0], 0.0);
        assert_eq!(buffer[6], 0.0);
    }

    #[test]
    fn test_clip_detection() {
        let mut stage = ClipDetectionStage::new(1.0).unwrap();
        let mut buffer = vec![0.5f32, -1.5, 1.0, 0.99];
        stage.process_in_place(&mut buffer, 1, None).unwrap();
        assert_eq!(buffer, vec![0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_differentiator_round_trip() {
        let mut a = DifferentiatorStage::new();
        let mut block = vec![5.0f32, 7.0];
        a.process_in_place(&mut block, 2, None).unwrap();

        let mut s = toon::Serializer::new();
        a.serialize_state(&mut s);
        let bytes = s.into_bytes();

        let mut b = DifferentiatorStage::new();
        let mut d = toon::Deserializer::new(&bytes);
        b.deserialize_state(&mut d).unwrap();

        let mut block_a = vec![8.0f32, 9.0];
        let mut block_b = block_a.clone();
        a.process_in_place(&mut block_a, 2, None).unwrap();
        b.process_in_place(&mut block_b, 2, None).unwrap();
        assert_eq!(block_a, block_b);
    }
}
