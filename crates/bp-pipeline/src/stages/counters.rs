//! Counter-policy window stages
//!
//! waveformLength, slopeSignChange, and willisonAmplitude wrap the
//! per-channel counter kernels; each sample is replaced by the feature
//! value for the window ending at it.

use crate::stage::Stage;
use bp_core::{DspError, DspResult, Sample, toon};
use bp_dsp::counters::{SscWindow, WampWindow, WaveformLengthWindow};

fn write_bool_ring(s: &mut toon::Serializer, ring: &[bool]) {
    s.write_i32(ring.len() as i32);
    for &b in ring {
        s.write_bool(b);
    }
}

fn read_bool_ring(d: &mut toon::Deserializer<'_>) -> DspResult<Vec<bool>> {
    let len = d.read_i32();
    d.require_ok()?;
    if len < 0 {
        return Err(DspError::StateCorrupt("negative ring length".into()));
    }
    let mut ring = Vec::with_capacity(len as usize);
    for _ in 0..len {
        ring.push(d.read_bool());
    }
    d.require_ok()?;
    Ok(ring)
}

// ---------- Waveform length ----------

pub struct WaveformLengthStage {
    window_size: usize,
    filters: Vec<WaveformLengthWindow>,
}

impl WaveformLengthStage {
    pub fn new(window_size: usize) -> DspResult<Self> {
        if window_size == 0 {
            return Err(DspError::InvalidParams(
                "waveformLength: window size must be greater than 0".into(),
            ));
        }
        Ok(Self {
            window_size,
            filters: Vec::new(),
        })
    }
}

impl Stage for WaveformLengthStage {
    fn type_name(&self) -> &str {
        "waveformLength"
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        if self.filters.len() != channels {
            self.filters = (0..channels)
                .map(|_| WaveformLengthWindow::new(self.window_size))
                .collect();
        }
        for (i, v) in buffer.iter_mut().enumerate() {
            *v = self.filters[i % channels].push(*v);
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.window_size as i32);
        s.write_i32(self.filters.len() as i32);
        for filter in &self.filters {
            let (ring, sum, prev, primed) = filter.state();
            s.write_f32_array(&ring);
            s.write_f64(sum);
            s.write_f32(prev);
            s.write_bool(primed);
        }
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let window_size = d.read_i32() as usize;
        let channels = d.read_i32();
        d.require_ok()?;
        if window_size != self.window_size {
            return Err(DspError::StateShapeMismatch(
                "waveformLength window size mismatch".into(),
            ));
        }

        let mut filters = Vec::new();
        for _ in 0..channels.max(0) {
            let ring = d.read_f32_array();
            let sum = d.read_f64();
            let prev = d.read_f32();
            let primed = d.read_bool();
            d.require_ok()?;

            let mut filter = WaveformLengthWindow::new(self.window_size);
            filter.set_state(&ring, sum, prev, primed)?;
            filters.push(filter);
        }
        self.filters = filters;
        Ok(())
    }

    fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.clear();
        }
    }
}

// ---------- Slope-sign change ----------

pub struct SscStage {
    window_size: usize,
    threshold: Sample,
    filters: Vec<SscWindow>,
}

impl SscStage {
    pub fn new(window_size: usize, threshold: Sample) -> DspResult<Self> {
        if window_size == 0 {
            return Err(DspError::InvalidParams(
                "slopeSignChange: window size must be greater than 0".into(),
            ));
        }
        Ok(Self {
            window_size,
            threshold,
            filters: Vec::new(),
        })
    }
}

impl Stage for SscStage {
    fn type_name(&self) -> &str {
        "slopeSignChange"
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        if self.filters.len() != channels {
            self.filters = (0..channels)
                .map(|_| SscWindow::new(self.window_size, self.threshold))
                .collect();
        }
        for (i, v) in buffer.iter_mut().enumerate() {
            *v = self.filters[i % channels].push(*v);
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.window_size as i32);
        s.write_f32(self.threshold);
        s.write_i32(self.filters.len() as i32);
        for filter in &self.filters {
            let (ring, count, s1, s2, init_count) = filter.state();
            write_bool_ring(s, &ring);
            s.write_i32(count as i32);
            s.write_f32(s1);
            s.write_f32(s2);
            s.write_i32(init_count as i32);
        }
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let window_size = d.read_i32() as usize;
        let threshold = d.read_f32();
        let channels = d.read_i32();
        d.require_ok()?;
        if window_size != self.window_size || threshold != self.threshold {
            return Err(DspError::StateShapeMismatch(
                "slopeSignChange parameter mismatch".into(),
            ));
        }

        let mut filters = Vec::new();
        for _ in 0..channels.max(0) {
            let ring = read_bool_ring(d)?;
            let count = d.read_i32();
            let s1 = d.read_f32();
            let s2 = d.read_f32();
            let init_count = d.read_i32();
            d.require_ok()?;
            if count < 0 || init_count < 0 {
                return Err(DspError::StateCorrupt("negative counter".into()));
            }

            let mut filter = SscWindow::new(self.window_size, self.threshold);
            filter.set_state(&ring, count as usize, s1, s2, init_count as u8)?;
            filters.push(filter);
        }
        self.filters = filters;
        Ok(())
    }

    fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.clear();
        }
    }
}

// ---------- Willison amplitude ----------

pub struct WampStage {
    window_size: usize,
    threshold: Sample,
    filters: Vec<WampWindow>,
}

impl WampStage {
    pub fn new(window_size: usize, threshold: Sample) -> DspResult<Self> {
        if window_size == 0 {
            return Err(DspError::InvalidParams(
                "willisonAmplitude: window size must be greater than 0".into(),
            ));
        }
        Ok(Self {
            window_size,
            threshold,
            filters: Vec::new(),
        })
    }
}

impl Stage for WampStage {
    fn type_name(&self) -> &str {
        "willisonAmplitude"
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        if self.filters.len() != channels {
            self.filters = (0..channels)
                .map(|_| WampWindow::new(self.window_size, self.threshold))
                .collect();
        }
        for (i, v) in buffer.iter_mut().enumerate() {
            *v = self.filters[i % channels].push(*v);
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.window_size as i32);
        s.write_f32(self.threshold);
        s.write_i32(self.filters.len() as i32);
        for filter in &self.filters {
            let (ring, count, prev, primed) = filter.state();
            write_bool_ring(s, &ring);
            s.write_i32(count as i32);
            s.write_f32(prev);
            s.write_bool(primed);
        }
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let window_size = d.read_i32() as usize;
        let threshold = d.read_f32();
        let channels = d.read_i32();
        d.require_ok()?;
        if window_size != self.window_size || threshold != self.threshold {
            return Err(DspError::StateShapeMismatch(
                "willisonAmplitude parameter mismatch".into(),
            ));
        }

        let mut filters = Vec::new();
        for _ in 0..channels.max(0) {
            let ring = read_bool_ring(d)?;
            let count = d.read_i32();
            let prev = d.read_f32();
            let primed = d.read_bool();
            d.require_ok()?;
            if count < 0 {
                return Err(DspError::StateCorrupt("negative counter".into()));
            }

            let mut filter = WampWindow::new(self.window_size, self.threshold);
            filter.set_state(&ring, count as usize, prev, primed)?;
            filters.push(filter);
        }
        self.filters = filters;
        Ok(())
    }

    fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wamp_stage_counts() {
        let mut stage = WampStage::new(8, 1.0).unwrap();
        let mut buffer = vec![0.0f32, 5.0, 5.2, 0.0];
        stage.process_in_place(&mut buffer, 1, None).unwrap();
        assert_eq!(buffer, vec![0.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn test_ssc_stage_round_trip() {
        let mut a = SscStage::new(6, 0.0).unwrap();
        let mut warm: Vec<f32> = (0..24).map(|i| ((i * 5 % 7) as f32) - 3.0).collect();
        a.process_in_place(&mut warm, 2, None).unwrap();

        let mut s = toon::Serializer::new();
        a.serialize_state(&mut s);
        let bytes = s.into_bytes();

        let mut b = SscStage::new(6, 0.0).unwrap();
        let mut d = toon::Deserializer::new(&bytes);
        b.deserialize_state(&mut d).unwrap();

        let mut buf_a: Vec<f32> = (0..24).map(|i| ((i * 3 % 5) as f32) - 2.0).collect();
        let mut buf_b = buf_a.clone();
        a.process_in_place(&mut buf_a, 2, None).unwrap();
        b.process_in_place(&mut buf_b, 2, None).unwrap();
        assert_eq!(buf_a, buf_b);
    }

    #[test]
    fn test_restore_parameter_mismatch() {
        let a = WampStage::new(8, 1.0).unwrap();
        let mut s = toon::Serializer::new();
        a.serialize_state(&mut s);
        let bytes = s.into_bytes();

        let mut b = WampStage::new(4, 1.0).unwrap();
        let mut d = toon::Deserializer::new(&bytes);
        assert!(b.deserialize_state(&mut d).is_err());
    }

    #[test]
    fn test_waveform_length_stage() {
        let mut stage = WaveformLengthStage::new(4).unwrap();
        let mut buffer = vec![0.0f32, 1.0, -1.0, 0.0];
        stage.process_in_place(&mut buffer, 1, None).unwrap();
        assert_eq!(buffer, vec![0.0, 1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(WaveformLengthStage::new(0).is_err());
        assert!(SscStage::new(0, 0.0).is_err());
        assert!(WampStage::new(0, 0.0).is_err());
    }
}
