//! Direct-Form-I recursive filter kernel
//!
//! y[n] = b[0]x[n] + b[1]x[n-1] + ... + b[M]x[n-M]
//!      - a[1]y[n-1] - ... - a[N]y[n-N]
//!
//! a[0] = 1 is normalised out: the feedback vector holds a[1..N] only.
//! Both history rings are power-of-two sized so the wrap is a mask.

use bp_core::{DspError, DspResult, Sample, next_pow2};

#[derive(Debug, Clone)]
pub struct DirectForm1 {
    b: Vec<f64>,
    a: Vec<f64>,
    x_state: Vec<Sample>,
    y_state: Vec<Sample>,
    x_index: usize,
    y_index: usize,
    x_mask: usize,
    y_mask: usize,
}

impl DirectForm1 {
    /// `b` are feedforward coefficients `b[0..=M]`, `a` the feedback
    /// coefficients `a[1..=N]` (without the implicit unity a[0]).
    pub fn new(b: &[f64], a: &[f64]) -> DspResult<Self> {
        if b.is_empty() {
            return Err(DspError::ShapeMismatch(
                "filter requires at least one feedforward coefficient".into(),
            ));
        }

        let x_len = next_pow2(if b.len() > 1 { b.len() - 1 } else { 1 });
        let y_len = next_pow2(a.len().max(1));

        Ok(Self {
            b: b.to_vec(),
            a: a.to_vec(),
            x_state: vec![0.0; x_len],
            y_state: vec![0.0; y_len],
            x_index: 0,
            y_index: 0,
            x_mask: x_len - 1,
            y_mask: y_len - 1,
        })
    }

    /// True when there is no feedback path (pure FIR).
    #[inline]
    pub fn is_fir(&self) -> bool {
        self.a.is_empty()
    }

    pub fn feedforward(&self) -> &[f64] {
        &self.b
    }

    pub fn feedback(&self) -> &[f64] {
        &self.a
    }

    /// Advisory stability check.
    ///
    /// The coefficient-sum bound sum(|a[k]|) < 1 is a sufficient shortcut;
    /// when it fails the Schur-Cohn recursion decides without solving for
    /// poles: the filter is stable iff every reflection coefficient has
    /// magnitude below one.
    pub fn is_stable(&self) -> bool {
        if self.a.is_empty() {
            return true;
        }
        if self.a.iter().map(|a| a.abs()).sum::<f64>() < 1.0 {
            return true;
        }

        let mut coeffs: Vec<f64> = std::iter::once(1.0).chain(self.a.iter().copied()).collect();
        let mut m = coeffs.len() - 1;
        while m >= 1 {
            let k = coeffs[m] / coeffs[0];
            if k.abs() >= 1.0 {
                return false;
            }
            let denom = 1.0 - k * k;
            let prev = coeffs.clone();
            for i in 0..m {
                coeffs[i] = (prev[i] - k * prev[m - i]) / denom;
            }
            m -= 1;
        }
        true
    }

    #[inline]
    pub fn process_sample(&mut self, input: Sample) -> Sample {
        let mut y = self.b[0] * input as f64;

        // x_state holds x[n-1], x[n-2], ...; read backwards from the
        // write index, adding the ring size before subtracting so the
        // index arithmetic never underflows.
        for i in 1..self.b.len() {
            let idx = (self.x_index + self.x_mask + 1 - (i - 1)) & self.x_mask;
            y += self.b[i] * self.x_state[idx] as f64;
        }

        for (i, &a) in self.a.iter().enumerate() {
            let idx = (self.y_index + self.y_mask + 1 - i) & self.y_mask;
            y -= a * self.y_state[idx] as f64;
        }

        let y = y as Sample;
        self.x_index = (self.x_index + 1) & self.x_mask;
        self.x_state[self.x_index] = input;
        self.y_index = (self.y_index + 1) & self.y_mask;
        self.y_state[self.y_index] = y;
        y
    }

    /// Filter a block. FIR filters take the convolution path (no feedback
    /// reads); IIR loops per sample since feedback precludes batching.
    pub fn process_block(&mut self, input: &[Sample], output: &mut [Sample]) {
        debug_assert_eq!(input.len(), output.len());

        if self.is_fir() {
            self.process_block_fir(input, output);
            return;
        }

        for (x, y) in input.iter().zip(output.iter_mut()) {
            *y = self.process_sample(*x);
        }
    }

    fn process_block_fir(&mut self, input: &[Sample], output: &mut [Sample]) {
        let taps = self.b.len();
        for (n, (&x, out)) in input.iter().zip(output.iter_mut()).enumerate() {
            let mut y = self.b[0] * x as f64;
            for k in 1..taps {
                // Prefer samples from the current block; fall back to the
                // persisted history ring across the block boundary.
                let v = if n >= k {
                    input[n - k]
                } else {
                    let back = k - n; // 1-based into history
                    let idx = (self.x_index + self.x_mask + 1 - (back - 1)) & self.x_mask;
                    self.x_state[idx]
                };
                y += self.b[k] * v as f64;
            }
            *out = y as Sample;
        }

        // Persist the tail of the block as the next call's history
        for &x in input {
            self.x_index = (self.x_index + 1) & self.x_mask;
            self.x_state[self.x_index] = x;
        }
    }

    pub fn reset(&mut self) {
        self.x_state.fill(0.0);
        self.y_state.fill(0.0);
        self.x_index = 0;
        self.y_index = 0;
    }

    /// Full state rings plus write indices, for serialization.
    pub fn state(&self) -> (&[Sample], &[Sample], usize, usize) {
        (&self.x_state, &self.y_state, self.x_index, self.y_index)
    }

    pub fn set_state(
        &mut self,
        x_state: &[Sample],
        y_state: &[Sample],
        x_index: usize,
        y_index: usize,
    ) -> DspResult<()> {
        if x_state.len() != self.x_state.len() || y_state.len() != self.y_state.len() {
            return Err(DspError::StateShapeMismatch(format!(
                "filter state sizes {}/{} do not match rings {}/{}",
                x_state.len(),
                y_state.len(),
                self.x_state.len(),
                self.y_state.len()
            )));
        }
        self.x_state.copy_from_slice(x_state);
        self.y_state.copy_from_slice(y_state);
        self.x_index = x_index & self.x_mask;
        self.y_index = y_index & self.y_mask;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_filter() {
        let mut f = DirectForm1::new(&[1.0], &[]).unwrap();
        for i in 0..10 {
            let x = i as f32 * 0.5;
            assert_eq!(f.process_sample(x), x);
        }
    }

    #[test]
    fn test_fir_moving_average() {
        let mut f = DirectForm1::new(&[0.5, 0.5], &[]).unwrap();
        let input = [2.0f32, 4.0, 6.0, 8.0];
        let mut out = [0.0f32; 4];
        f.process_block(&input, &mut out);
        assert_eq!(out, [1.0, 3.0, 5.0, 7.0]);
    }

    #[test]
    fn test_fir_block_matches_per_sample() {
        let b = [0.2f64, 0.3, 0.1, -0.4, 0.25];
        let input: Vec<f32> = (0..64).map(|i| ((i * 13 % 17) as f32 - 8.0) * 0.1).collect();

        let mut block = DirectForm1::new(&b, &[]).unwrap();
        let mut per_sample = DirectForm1::new(&b, &[]).unwrap();

        // Split across two blocks to exercise history carry-over
        let mut out_block = vec![0.0f32; 64];
        block.process_block(&input[..20], &mut out_block[..20]);
        block.process_block(&input[20..], &mut out_block[20..]);

        let expected: Vec<f32> = input.iter().map(|&x| per_sample.process_sample(x)).collect();

        for (a, b) in out_block.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_iir_leaky_integrator() {
        // y[n] = x[n] + 0.5 y[n-1]
        let mut f = DirectForm1::new(&[1.0], &[-0.5]).unwrap();
        assert_eq!(f.process_sample(1.0), 1.0);
        assert_eq!(f.process_sample(0.0), 0.5);
        assert_eq!(f.process_sample(0.0), 0.25);
    }

    #[test]
    fn test_stability_advisory() {
        let stable = DirectForm1::new(&[1.0], &[-0.5, 0.2]).unwrap();
        assert!(stable.is_stable());
        // Typical narrow biquad: sum(|a|) > 1 yet both poles inside the circle
        let narrow = DirectForm1::new(&[1.0], &[-1.143, 0.413]).unwrap();
        assert!(narrow.is_stable());
        let unstable = DirectForm1::new(&[1.0], &[-1.1]).unwrap();
        assert!(!unstable.is_stable());
        let unstable2 = DirectForm1::new(&[1.0], &[-2.05, 1.05]).unwrap();
        assert!(!unstable2.is_stable());
    }

    #[test]
    fn test_empty_b_rejected() {
        assert!(DirectForm1::new(&[], &[]).is_err());
    }

    #[test]
    fn test_state_round_trip_bit_identical() {
        let b = [0.3f64, 0.4, 0.2];
        let a = [-0.3f64, 0.1];
        let mut f1 = DirectForm1::new(&b, &a).unwrap();

        let warmup: Vec<f32> = (0..37).map(|i| (i as f32 * 0.21).sin()).collect();
        for &x in &warmup {
            f1.process_sample(x);
        }

        let (xs, ys, xi, yi) = {
            let (xs, ys, xi, yi) = f1.state();
            (xs.to_vec(), ys.to_vec(), xi, yi)
        };

        let mut f2 = DirectForm1::new(&b, &a).unwrap();
        f2.set_state(&xs, &ys, xi, yi).unwrap();

        for i in 0..50 {
            let x = (i as f32 * 0.37).cos();
            assert_eq!(f1.process_sample(x), f2.process_sample(x));
        }
    }

    #[test]
    fn test_state_size_mismatch_rejected() {
        let mut f = DirectForm1::new(&[1.0, 0.5], &[-0.2]).unwrap();
        assert!(f.set_state(&[0.0; 7], &[0.0; 1], 0, 0).is_err());
    }
}
