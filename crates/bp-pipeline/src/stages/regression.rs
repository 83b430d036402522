//! Running-window regression stages
//!
//! One stage type covers the four outputs: slope, intercept, residual,
//! and prediction, selected at construction.

use crate::stage::Stage;
use bp_core::{DspError, DspResult, Sample, toon};
use bp_dsp::regression::{RegressionOutput, RegressionWindow};

pub struct RegressionStage {
    output: RegressionOutput,
    window_size: usize,
    channels: Vec<RegressionWindow>,
}

impl RegressionStage {
    pub fn new(output: RegressionOutput, window_size: usize) -> DspResult<Self> {
        // Kernel construction validates the window size
        RegressionWindow::new(window_size)?;
        Ok(Self {
            output,
            window_size,
            channels: Vec::new(),
        })
    }
}

impl Stage for RegressionStage {
    fn type_name(&self) -> &str {
        self.output.type_name()
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        if self.channels.len() != channels {
            self.channels = (0..channels)
                .map(|_| RegressionWindow::new(self.window_size).expect("validated size"))
                .collect();
        }

        for (i, v) in buffer.iter_mut().enumerate() {
            let y = *v;
            let fit = self.channels[i % channels].push(y);
            *v = match fit {
                None => 0.0,
                Some(fit) => match self.output {
                    RegressionOutput::Slope => fit.slope,
                    RegressionOutput::Intercept => fit.intercept,
                    RegressionOutput::Residuals => y - (fit.slope * fit.x_last + fit.intercept),
                    RegressionOutput::Predictions => fit.slope * fit.x_last + fit.intercept,
                },
            };
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.window_size as i32);
        s.write_i32(self.channels.len() as i32);
        for window in &self.channels {
            let (buffer, write_index, count) = window.state();
            s.write_f32_array(&buffer);
            s.write_i32(write_index as i32);
            s.write_i32(count as i32);
        }
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let window_size = d.read_i32() as usize;
        let channels = d.read_i32();
        d.require_ok()?;
        if window_size != self.window_size {
            return Err(DspError::StateShapeMismatch(format!(
                "{}: window size mismatch on restore",
                self.type_name()
            )));
        }

        let mut restored = Vec::new();
        for _ in 0..channels.max(0) {
            let buffer = d.read_f32_array();
            let write_index = d.read_i32();
            let count = d.read_i32();
            d.require_ok()?;

            let mut window = RegressionWindow::new(self.window_size)?;
            window.set_state(&buffer, write_index.max(0) as usize, count.max(0) as usize)?;
            restored.push(window);
        }
        self.channels = restored;
        Ok(())
    }

    fn reset(&mut self) {
        for window in &mut self.channels {
            window.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slope_of_perfect_ramp() {
        let mut stage = RegressionStage::new(RegressionOutput::Slope, 4).unwrap();
        let mut buffer: Vec<f32> = (0..8).map(|i| 2.0 * i as f32).collect();
        stage.process_in_place(&mut buffer, 1, None).unwrap();
        assert_eq!(buffer[0], 0.0); // warm-up
        for &v in &buffer[3..] {
            assert!((v - 2.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_residuals_vanish_on_line() {
        let mut stage = RegressionStage::new(RegressionOutput::Residuals, 5).unwrap();
        let mut buffer: Vec<f32> = (0..10).map(|i| 3.0 * i as f32 + 1.0).collect();
        stage.process_in_place(&mut buffer, 1, None).unwrap();
        for &v in &buffer[4..] {
            assert!(v.abs() < 1e-3);
        }
    }

    #[test]
    fn test_prediction_tracks_line() {
        let mut stage = RegressionStage::new(RegressionOutput::Predictions, 4).unwrap();
        let mut buffer: Vec<f32> = (0..8).map(|i| i as f32).collect();
        stage.process_in_place(&mut buffer, 1, None).unwrap();
        for (i, &v) in buffer.iter().enumerate().skip(3) {
            assert!((v - i as f32).abs() < 1e-3, "index {i}: {v}");
        }
    }

    #[test]
    fn test_type_names() {
        assert_eq!(
            RegressionStage::new(RegressionOutput::Slope, 4).unwrap().type_name(),
            "linearRegressionSlope"
        );
        assert_eq!(
            RegressionStage::new(RegressionOutput::Intercept, 4).unwrap().type_name(),
            "linearRegressionIntercept"
        );
    }

    #[test]
    fn test_state_round_trip() {
        let mut a = RegressionStage::new(RegressionOutput::Slope, 6).unwrap();
        let mut warm: Vec<f32> = (0..20).map(|i| (i as f32 * 0.5).sin()).collect();
        a.process_in_place(&mut warm, 2, None).unwrap();

        let mut s = toon::Serializer::new();
        a.serialize_state(&mut s);
        let bytes = s.into_bytes();

        let mut b = RegressionStage::new(RegressionOutput::Slope, 6).unwrap();
        let mut d = toon::Deserializer::new(&bytes);
        b.deserialize_state(&mut d).unwrap();

        let mut buf_a: Vec<f32> = (0..12).map(|i| (i as f32 * 0.8).cos()).collect();
        let mut buf_b = buf_a.clone();
        a.process_in_place(&mut buf_a, 2, None).unwrap();
        b.process_in_place(&mut buf_b, 2, None).unwrap();
        assert_eq!(buf_a, buf_b);
    }

    #[test]
    fn test_invalid_window() {
        assert!(RegressionStage::new(RegressionOutput::Slope, 1).is_err());
    }
}
