//! Windowed statistic stages
//!
//! One stage type backs movingAverage, rms, variance, zScoreNormalize, and
//! meanAbsoluteValue. Batch mode computes the statistic over the whole
//! incoming block per channel; moving mode streams through per-channel
//! running windows. A window can be given in samples or as a duration, in
//! which case the size is derived from the first block's timestamps.

use crate::stage::Stage;
use bp_core::{DspError, DspResult, Sample, frame_time, toon};
use bp_dsp::window_stats::{RunningStat, StatKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatMode {
    Batch,
    Moving,
}

impl StatMode {
    pub fn parse(name: &str) -> Self {
        if name == "moving" {
            StatMode::Moving
        } else {
            StatMode::Batch
        }
    }

    fn name(self) -> &'static str {
        match self {
            StatMode::Batch => "batch",
            StatMode::Moving => "moving",
        }
    }
}

pub struct WindowStatStage {
    kind: StatKind,
    type_name: &'static str,
    mode: StatMode,
    window_size: usize,
    window_duration_ms: f64,
    epsilon: Sample,
    initialized: bool,
    filters: Vec<RunningStat>,
}

impl WindowStatStage {
    pub fn new(
        kind: StatKind,
        type_name: &'static str,
        mode: StatMode,
        window_size: usize,
        window_duration_ms: f64,
        epsilon: Sample,
    ) -> DspResult<Self> {
        if mode == StatMode::Moving && window_size == 0 && window_duration_ms == 0.0 {
            return Err(DspError::InvalidParams(format!(
                "{type_name}: either 'windowSize' or 'windowDuration' is required for 'moving' mode"
            )));
        }

        Ok(Self {
            kind,
            type_name,
            mode,
            window_size,
            window_duration_ms,
            epsilon,
            initialized: window_size > 0,
            filters: Vec::new(),
        })
    }

    fn process_batch(&self, buffer: &mut [Sample], channels: usize) {
        let frames = buffer.len() / channels;
        if frames == 0 {
            return;
        }

        for ch in 0..channels {
            let mut sum = 0.0f64;
            let mut sum_sq = 0.0f64;
            let mut sum_abs = 0.0f64;
            let mut i = ch;
            while i < buffer.len() {
                let v = buffer[i] as f64;
                sum += v;
                sum_sq += v * v;
                sum_abs += v.abs();
                i += channels;
            }

            let n = frames as f64;
            let mean = sum / n;
            let variance = (sum_sq / n - mean * mean).max(0.0);

            match self.kind {
                StatKind::ZScore => {
                    // Normalise in place rather than broadcasting a scalar
                    let stddev = variance.sqrt() as Sample;
                    let mut i = ch;
                    if stddev < self.epsilon {
                        while i < buffer.len() {
                            buffer[i] = 0.0;
                            i += channels;
                        }
                    } else {
                        let mean = mean as Sample;
                        while i < buffer.len() {
                            buffer[i] = (buffer[i] - mean) / stddev;
                            i += channels;
                        }
                    }
                }
                _ => {
                    let value = match self.kind {
                        StatKind::Mean => mean,
                        StatKind::Rms => (sum_sq / n).sqrt(),
                        StatKind::Variance => variance,
                        StatKind::Mav => sum_abs / n,
                        StatKind::ZScore => unreachable!(),
                    } as Sample;
                    let mut i = ch;
                    while i < buffer.len() {
                        buffer[i] = value;
                        i += channels;
                    }
                }
            }
        }
    }

    fn resolve_window(
        &mut self,
        frames: usize,
        channels: usize,
        timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        if self.initialized || self.window_duration_ms <= 0.0 {
            return Ok(());
        }

        let Some(ts) = timestamps else {
            return Err(DspError::InvalidParams(format!(
                "{}: windowDuration was set but timestamps are not available to derive a sample rate",
                self.type_name
            )));
        };
        if frames < 2 {
            return Err(DspError::ShapeMismatch(format!(
                "{}: need at least 2 frames to estimate the sample rate",
                self.type_name
            )));
        }

        // Estimate the rate from the first few frame intervals and size
        // the window at 3x to absorb jitter
        let check = frames.min(10);
        let total_ms = (frame_time(ts, check - 1, channels) - frame_time(ts, 0, channels)) as f64;
        let avg_period_ms = total_ms / (check - 1) as f64;
        let rate = 1000.0 / avg_period_ms;
        let estimated = ((self.window_duration_ms / 1000.0) * rate) as usize;
        self.window_size = (estimated * 3).max(1);
        self.initialized = true;
        Ok(())
    }

    fn make_filter(&self, time_aware: bool) -> RunningStat {
        if time_aware {
            RunningStat::with_window_duration(
                self.kind,
                self.window_size,
                self.window_duration_ms,
                self.epsilon,
            )
        } else {
            RunningStat::new(self.kind, self.window_size, self.epsilon)
        }
    }

    fn process_moving(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        self.resolve_window(buffer.len() / channels, channels, timestamps)?;

        let time_aware = self.window_duration_ms > 0.0 && timestamps.is_some();
        if self.filters.len() != channels {
            self.filters = (0..channels).map(|_| self.make_filter(time_aware)).collect();
        }

        for i in 0..buffer.len() {
            let channel = i % channels;
            let frame = i / channels;
            buffer[i] = if time_aware {
                let t = frame_time(timestamps.unwrap(), frame, channels) as f64;
                self.filters[channel].push_with_timestamp(buffer[i], t)
            } else {
                self.filters[channel].push(buffer[i])
            };
        }
        Ok(())
    }
}

impl Stage for WindowStatStage {
    fn type_name(&self) -> &str {
        self.type_name
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        match self.mode {
            StatMode::Batch => {
                self.process_batch(buffer, channels);
                Ok(())
            }
            StatMode::Moving => self.process_moving(buffer, channels, timestamps),
        }
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_str(self.mode.name());
        if self.mode == StatMode::Moving {
            s.write_i32(self.window_size as i32);
            s.write_f64(self.window_duration_ms);
            s.write_bool(self.initialized);
            s.write_f32(self.epsilon);
            s.write_i32(self.filters.len() as i32);
            for filter in &self.filters {
                let (buffer, sum, sum_sq) = filter.state();
                s.write_f32_array(&buffer);
                s.write_f64(sum);
                s.write_f64(sum_sq);
            }
        }
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let mode = StatMode::parse(d.read_str());
        if mode != self.mode {
            return Err(DspError::StateShapeMismatch(format!(
                "{}: mode mismatch on restore",
                self.type_name
            )));
        }
        if self.mode != StatMode::Moving {
            return d.require_ok();
        }

        let window_size = d.read_i32() as usize;
        let duration = d.read_f64();
        let initialized = d.read_bool();
        let epsilon = d.read_f32();
        let num_channels = d.read_i32();
        d.require_ok()?;

        if self.initialized && window_size != self.window_size {
            return Err(DspError::StateShapeMismatch(format!(
                "{}: window size {} does not match configured {}",
                self.type_name, window_size, self.window_size
            )));
        }
        if num_channels < 0 {
            return Err(DspError::StateCorrupt("negative channel count".into()));
        }

        // Build the restored filters fully before committing
        let time_aware = duration > 0.0;
        let mut filters = Vec::with_capacity(num_channels as usize);
        for _ in 0..num_channels {
            let buffer = d.read_f32_array();
            let sum = d.read_f64();
            let sum_sq = d.read_f64();
            d.require_ok()?;

            let mut filter = if time_aware {
                RunningStat::with_window_duration(self.kind, window_size, duration, epsilon)
            } else {
                RunningStat::new(self.kind, window_size, epsilon)
            };
            filter.set_state(&buffer, sum, sum_sq)?;
            filters.push(filter);
        }

        self.window_size = window_size;
        self.window_duration_ms = duration;
        self.initialized = initialized;
        self.epsilon = epsilon;
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

    fn moving_stage(kind: StatKind, window: usize) -> WindowStatStage {
        WindowStatStage::new(kind, "test", StatMode::Moving, window, 0.0, 1e-6).unwrap()
    }

    #[test]
    fn test_moving_average_reference_sequence() {
        let mut stage = moving_stage(StatKind::Mean, 3);
        let mut buffer = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        stage.process_in_place(&mut buffer, 1, None).unwrap();
        assert_eq!(buffer, vec![1.0, 1.5, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_batch_mean_broadcast() {
        let mut stage =
            WindowStatStage::new(StatKind::Mean, "test", StatMode::Batch, 0, 0.0, 1e-6).unwrap();
        let mut buffer = vec![1.0f32, 10.0, 2.0, 20.0, 3.0, 30.0];
        stage.process_in_place(&mut buffer, 2, None).unwrap();
        assert_eq!(buffer, vec![2.0, 20.0, 2.0, 20.0, 2.0, 20.0]);
    }

    #[test]
    fn test_batch_zscore_normalizes() {
        let mut stage =
            WindowStatStage::new(StatKind::ZScore, "test", StatMode::Batch, 0, 0.0, 1e-6).unwrap();
        let mut buffer = vec![1.0f32, 2.0, 3.0, 4.0];
        stage.process_in_place(&mut buffer, 1, None).unwrap();
        let mean: f32 = buffer.iter().sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-6);
        assert!(buffer[0] < 0.0 && buffer[3] > 0.0);
    }

    #[test]
    fn test_channels_kept_separate() {
        let mut stage = moving_stage(StatKind::Mean, 2);
        let mut buffer = vec![1.0f32, 100.0, 3.0, 300.0];
        stage.process_in_place(&mut buffer, 2, None).unwrap();
        assert_eq!(buffer, vec![1.0, 100.0, 2.0, 200.0]);
    }

    #[test]
    fn test_duration_window_requires_timestamps() {
        let mut stage =
            WindowStatStage::new(StatKind::Mean, "test", StatMode::Moving, 0, 50.0, 1e-6).unwrap();
        let mut buffer = vec![0.0f32; 8];
        assert!(stage.process_in_place(&mut buffer, 1, None).is_err());
    }

    #[test]
    fn test_duration_window_resolved_from_timestamps() {
        let mut stage =
            WindowStatStage::new(StatKind::Mean, "test", StatMode::Moving, 0, 50.0, 1e-6).unwrap();
        // 10ms cadence -> 100 Hz -> base window 5, tripled to 15
        let buffer_len = 20;
        let mut buffer = vec![1.0f32; buffer_len];
        let ts: Vec<f32> = (0..buffer_len).map(|i| i as f32 * 10.0).collect();
        stage.process_in_place(&mut buffer, 1, Some(&ts)).unwrap();
        assert!(stage.initialized);
        assert_eq!(stage.window_size, 15);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut a = moving_stage(StatKind::Rms, 4);
        let mut buffer: Vec<f32> = (0..16).map(|i| (i as f32 * 0.4).sin()).collect();
        a.process_in_place(&mut buffer, 2, None).unwrap();

        let mut s = toon::Serializer::new();
        a.serialize_state(&mut s);
        let bytes = s.into_bytes();

        let mut b = moving_stage(StatKind::Rms, 4);
        let mut d = toon::Deserializer::new(&bytes);
        b.deserialize_state(&mut d).unwrap();

        let mut buf_a: Vec<f32> = (0..16).map(|i| (i as f32 * 0.9).cos()).collect();
        let mut buf_b = buf_a.clone();
        a.process_in_place(&mut buf_a, 2, None).unwrap();
        b.process_in_place(&mut buf_b, 2, None).unwrap();
        assert_eq!(buf_a, buf_b);
    }

    #[test]
    fn test_restore_rejects_mode_mismatch() {
        let a = WindowStatStage::new(StatKind::Mean, "test", StatMode::Batch, 0, 0.0, 1e-6).unwrap();
        let mut s = toon::Serializer::new();
        a.serialize_state(&mut s);
        let bytes = s.into_bytes();

        let mut b = moving_stage(StatKind::Mean, 4);
        let mut d = toon::Deserializer::new(&bytes);
        assert!(b.deserialize_state(&mut d).is_err());
    }

    #[test]
    fn test_invalid_construction() {
        assert!(WindowStatStage::new(StatKind::Mean, "test", StatMode::Moving, 0, 0.0, 1e-6).is_err());
    }
}
