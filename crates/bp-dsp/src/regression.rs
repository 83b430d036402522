//! Running-window linear regression
//!
//! Least-squares line fit over the most recent `window` samples, refit on
//! every push. Sample index is the regressor, so the x statistics for a
//! full window are fixed and precomputed.

use bp_core::{DspError, DspResult, Sample, simd};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegressionOutput {
    Slope,
    Intercept,
    Residuals,
    Predictions,
}

impl RegressionOutput {
    pub fn type_name(self) -> &'static str {
        match self {
            RegressionOutput::Slope => "linearRegressionSlope",
            RegressionOutput::Intercept => "linearRegressionIntercept",
            RegressionOutput::Residuals => "linearRegressionResiduals",
            RegressionOutput::Predictions => "linearRegressionPredictions",
        }
    }
}

/// Per-channel regression window.
#[derive(Debug, Clone)]
pub struct RegressionWindow {
    window_size: usize,
    buffer: Vec<Sample>,
    write_index: usize,
    count: usize,
    full_sum_xx: f64,
}

/// Fit of the current window.
#[derive(Debug, Clone, Copy)]
pub struct LineFit {
    pub slope: Sample,
    pub intercept: Sample,
    /// x position of the newest sample
    pub x_last: Sample,
}

impl RegressionWindow {
    pub fn new(window_size: usize) -> DspResult<Self> {
        if window_size < 2 {
            return Err(DspError::InvalidParams(
                "linear regression window size must be at least 2".into(),
            ));
        }

        // sum((x - x̄)^2) over a full window of 0..W-1
        let mean_x = (window_size - 1) as f64 / 2.0;
        let full_sum_xx = (0..window_size)
            .map(|i| {
                let c = i as f64 - mean_x;
                c * c
            })
            .sum();

        Ok(Self {
            window_size,
            buffer: vec![0.0; window_size],
            write_index: 0,
            count: 0,
            full_sum_xx,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Push a sample; `None` until two samples have arrived.
    pub fn push(&mut self, y: Sample) -> Option<LineFit> {
        self.buffer[self.write_index] = y;
        self.write_index = (self.write_index + 1) % self.window_size;
        if self.count < self.window_size {
            self.count += 1;
        }

        if self.count < 2 {
            return None;
        }

        let n = self.count;
        let mean_x = (n - 1) as f64 / 2.0;

        let sum_y = if n == self.window_size {
            simd::sum(&self.buffer) as f64
        } else {
            self.buffer[..n].iter().map(|&v| v as f64).sum()
        };
        let mean_y = sum_y / n as f64;

        let mut sum_xy = 0.0f64;
        let sum_xx;

        if n == self.window_size {
            // Full ring: oldest sample sits at the write index
            sum_xx = self.full_sum_xx;
            for i in 0..n {
                let idx = (self.write_index + i) % self.window_size;
                let xc = i as f64 - mean_x;
                sum_xy += xc * (self.buffer[idx] as f64 - mean_y);
            }
        } else {
            let mut acc_xx = 0.0f64;
            for i in 0..n {
                let xc = i as f64 - mean_x;
                sum_xy += xc * (self.buffer[i] as f64 - mean_y);
                acc_xx += xc * xc;
            }
            sum_xx = acc_xx;
        }

        let slope = if sum_xx.abs() < 1e-10 {
            0.0
        } else {
            sum_xy / sum_xx
        };
        let intercept = mean_y - slope * mean_x;

        Some(LineFit {
            slope: slope as Sample,
            intercept: intercept as Sample,
            x_last: (n - 1) as Sample,
        })
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_index = 0;
        self.count = 0;
    }

    pub fn state(&self) -> (Vec<Sample>, usize, usize) {
        (self.buffer.clone(), self.write_index, self.count)
    }

    pub fn set_state(&mut self, buffer: &[Sample], write_index: usize, count: usize) -> DspResult<()> {
        if buffer.len() != self.window_size {
            return Err(DspError::StateShapeMismatch(format!(
                "regression buffer length {} does not match window {}",
                buffer.len(),
                self.window_size
            )));
        }
        self.buffer.copy_from_slice(buffer);
        self.write_index = write_index % self.window_size;
        self.count = count.min(self.window_size);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_line_recovered() {
        let mut reg = RegressionWindow::new(8).unwrap();
        let mut fit = None;
        for i in 0..8 {
            fit = reg.push(3.0 * i as f32 + 2.0);
        }
        let fit = fit.unwrap();
        assert!((fit.slope - 3.0).abs() < 1e-4);
        assert!((fit.intercept - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_slope_tracks_sliding_window() {
        let mut reg = RegressionWindow::new(4).unwrap();
        // Rising then flat: the slope must decay to zero once the window
        // only sees flat samples
        for i in 0..4 {
            reg.push(i as f32);
        }
        let mut fit = None;
        for _ in 0..8 {
            fit = reg.push(3.0);
        }
        assert!(fit.unwrap().slope.abs() < 1e-5);
    }

    #[test]
    fn test_warm_up_returns_none() {
        let mut reg = RegressionWindow::new(5).unwrap();
        assert!(reg.push(1.0).is_none());
        assert!(reg.push(2.0).is_some());
    }

    #[test]
    fn test_flat_signal_zero_slope() {
        let mut reg = RegressionWindow::new(6).unwrap();
        let mut fit = None;
        for _ in 0..10 {
            fit = reg.push(7.0);
        }
        let fit = fit.unwrap();
        assert!(fit.slope.abs() < 1e-6);
        assert!((fit.intercept - 7.0).abs() < 1e-4);
    }

    #[test]
    fn test_window_too_small() {
        assert!(RegressionWindow::new(1).is_err());
    }

    #[test]
    fn test_prediction_and_residual_consistency() {
        let mut reg = RegressionWindow::new(8).unwrap();
        let mut fit = None;
        let mut last_y = 0.0;
        for i in 0..12 {
            last_y = 2.0 * i as f32 - 1.0 + if i % 2 == 0 { 0.1 } else { -0.1 };
            fit = reg.push(last_y);
        }
        let fit = fit.unwrap();
        let prediction = fit.slope * fit.x_last + fit.intercept;
        let residual = last_y - prediction;
        assert!((prediction + residual - last_y).abs() < 1e-6);
        assert!(residual.abs() < 0.25);
    }

    #[test]
    fn test_state_round_trip() {
        let mut a = RegressionWindow::new(5).unwrap();
        for i in 0..13 {
            a.push((i as f32).sin());
        }
        let (buf, wi, count) = a.state();
        let mut b = RegressionWindow::new(5).unwrap();
        b.set_state(&buf, wi, count).unwrap();

        for i in 0..10 {
            let x = (i as f32 * 0.9).cos();
            let fa = a.push(x).unwrap();
            let fb = b.push(x).unwrap();
            assert_eq!(fa.slope, fb.slope);
            assert_eq!(fa.intercept, fb.intercept);
        }
    }
}
