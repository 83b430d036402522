//! Adaptive filter kernels
//!
//! LMS (optionally normalised, optionally leaky) and RLS. Both consume a
//! primary/desired sample pair per step and return the error
//! e[n] = d[n] - y[n]. The RLS covariance update is the O(N^2) rank-one
//! form; no periodic symmetrisation is applied.

use bp_core::{CircularBuffer, DspError, DspResult, Sample, simd};

const NLMS_EPS: Sample = 1e-10;

// ---------- LMS ----------

#[derive(Debug, Clone)]
pub struct LmsFilter {
    num_taps: usize,
    mu: Sample,
    normalized: bool,
    leak: Sample,
    weights: Vec<Sample>,
    history: CircularBuffer<Sample>,
    x_vec: Vec<Sample>,
}

impl LmsFilter {
    pub fn new(num_taps: usize, mu: Sample, normalized: bool, leak: Sample) -> DspResult<Self> {
        if num_taps == 0 {
            return Err(DspError::InvalidParams("LMS numTaps must be > 0".into()));
        }
        if mu <= 0.0 {
            return Err(DspError::InvalidParams("LMS learning rate must be > 0".into()));
        }
        if !(0.0..1.0).contains(&leak) {
            return Err(DspError::InvalidParams("LMS lambda must be in [0, 1)".into()));
        }

        Ok(Self {
            num_taps,
            mu,
            normalized,
            leak,
            weights: vec![0.0; num_taps],
            history: CircularBuffer::new(num_taps),
            x_vec: vec![0.0; num_taps],
        })
    }

    pub fn num_taps(&self) -> usize {
        self.num_taps
    }

    pub fn weights(&self) -> &[Sample] {
        &self.weights
    }

    /// One adaptation step; returns e[n] = d[n] - w·x.
    pub fn process_sample(&mut self, input: Sample, desired: Sample) -> Sample {
        self.history.push_overwrite(input);

        self.x_vec.fill(0.0);
        for (i, v) in self.history.to_vec().into_iter().enumerate() {
            self.x_vec[i] = v;
        }

        let y = simd::dot(&self.weights, &self.x_vec);
        let error = desired - y;

        let mu_eff = if self.normalized {
            let energy = simd::dot(&self.x_vec, &self.x_vec);
            self.mu / (energy + NLMS_EPS)
        } else {
            self.mu
        };

        let retain = 1.0 - self.leak;
        for (w, &x) in self.weights.iter_mut().zip(&self.x_vec) {
            *w = retain * *w + mu_eff * error * x;
        }

        error
    }

    pub fn reset(&mut self) {
        self.weights.fill(0.0);
        self.history.clear();
    }

    pub fn state(&self) -> (Vec<Sample>, Vec<Sample>) {
        (self.weights.clone(), self.history.to_vec())
    }

    pub fn set_state(&mut self, weights: &[Sample], history: &[Sample]) -> DspResult<()> {
        if weights.len() != self.num_taps {
            return Err(DspError::StateShapeMismatch(format!(
                "LMS weights length {} does not match {} taps",
                weights.len(),
                self.num_taps
            )));
        }
        if history.len() > self.num_taps {
            return Err(DspError::StateShapeMismatch(
                "LMS history longer than tap count".into(),
            ));
        }
        self.weights.copy_from_slice(weights);
        self.history.from_slice(history);
        Ok(())
    }
}

// ---------- RLS ----------

#[derive(Debug, Clone)]
pub struct RlsFilter {
    num_taps: usize,
    lambda: Sample,
    delta: Sample,
    weights: Vec<Sample>,
    /// Inverse covariance P, row-major N x N
    inverse_cov: Vec<Sample>,
    history: CircularBuffer<Sample>,
    x_vec: Vec<Sample>,
    px: Vec<Sample>,
}

impl RlsFilter {
    pub fn new(num_taps: usize, lambda: Sample, delta: Sample) -> DspResult<Self> {
        if num_taps == 0 {
            return Err(DspError::InvalidParams("RLS numTaps must be > 0".into()));
        }
        if lambda <= 0.0 || lambda > 1.0 {
            return Err(DspError::InvalidParams("RLS lambda must be in (0, 1]".into()));
        }
        if delta <= 0.0 {
            return Err(DspError::InvalidParams("RLS delta must be > 0".into()));
        }

        let mut inverse_cov = vec![0.0; num_taps * num_taps];
        for i in 0..num_taps {
            inverse_cov[i * num_taps + i] = delta;
        }

        Ok(Self {
            num_taps,
            lambda,
            delta,
            weights: vec![0.0; num_taps],
            inverse_cov,
            history: CircularBuffer::new(num_taps),
            x_vec: vec![0.0; num_taps],
            px: vec![0.0; num_taps],
        })
    }

    pub fn num_taps(&self) -> usize {
        self.num_taps
    }

    pub fn lambda(&self) -> Sample {
        self.lambda
    }

    pub fn delta(&self) -> Sample {
        self.delta
    }

    pub fn weights(&self) -> &[Sample] {
        &self.weights
    }

    pub fn inverse_cov(&self) -> &[Sample] {
        &self.inverse_cov
    }

    /// One RLS step:
    /// k = P·x / (λ + xᵀP·x), e = d − wᵀx, w += k·e,
    /// P = (P − k·(P·x)ᵀ) / λ.
    pub fn process_sample(&mut self, input: Sample, desired: Sample) -> Sample {
        let n = self.num_taps;
        self.history.push_overwrite(input);

        self.x_vec.fill(0.0);
        for (i, v) in self.history.to_vec().into_iter().enumerate() {
            self.x_vec[i] = v;
        }

        // P·x
        for i in 0..n {
            self.px[i] = simd::dot(&self.inverse_cov[i * n..(i + 1) * n], &self.x_vec);
        }

        let xt_px = simd::dot(&self.x_vec, &self.px);
        let gain_denom = self.lambda + xt_px;

        let y = simd::dot(&self.weights, &self.x_vec);
        let error = desired - y;

        let inv_lambda = 1.0 / self.lambda;
        for i in 0..n {
            let k_i = self.px[i] / gain_denom;
            self.weights[i] += k_i * error;
            for j in 0..n {
                self.inverse_cov[i * n + j] =
                    inv_lambda * (self.inverse_cov[i * n + j] - k_i * self.px[j]);
            }
        }

        error
    }

    pub fn reset(&mut self) {
        self.weights.fill(0.0);
        self.history.clear();
        self.inverse_cov.fill(0.0);
        for i in 0..self.num_taps {
            self.inverse_cov[i * self.num_taps + i] = self.delta;
        }
    }

    pub fn state(&self) -> (Vec<Sample>, Vec<Sample>, Vec<Sample>) {
        (
            self.weights.clone(),
            self.inverse_cov.clone(),
            self.history.to_vec(),
        )
    }

    pub fn set_state(
        &mut self,
        weights: &[Sample],
        inverse_cov: &[Sample],
        history: &[Sample],
    ) -> DspResult<()> {
        if weights.len() != self.num_taps {
            return Err(DspError::StateShapeMismatch(format!(
                "RLS weights length {} does not match {} taps",
                weights.len(),
                self.num_taps
            )));
        }
        if inverse_cov.len() != self.num_taps * self.num_taps {
            return Err(DspError::StateShapeMismatch(format!(
                "RLS P matrix length {} does not match {}x{}",
                inverse_cov.len(),
                self.num_taps,
                self.num_taps
            )));
        }
        if history.len() > self.num_taps {
            return Err(DspError::StateShapeMismatch(
                "RLS history longer than tap count".into(),
            ));
        }
        self.weights.copy_from_slice(weights);
        self.inverse_cov.copy_from_slice(inverse_cov);
        self.history.from_slice(history);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// White-ish deterministic excitation.
    fn noise(i: usize) -> f32 {
        let mut state = (i as u64).wrapping_mul(0x9E3779B97F4A7C15) | 1;
        state ^= state >> 30;
        state = state.wrapping_mul(0xBF58476D1CE4E5B9);
        state ^= state >> 27;
        ((state >> 11) as f64 / (1u64 << 53) as f64) as f32 - 0.5
    }

    /// Unknown system: d[n] = h · x[n..]
    fn run_identification(
        mut step: impl FnMut(f32, f32) -> f32,
        h: &[f32],
        samples: usize,
    ) -> Vec<f32> {
        let mut x_hist = vec![0.0f32; h.len()];
        let mut errors = Vec::with_capacity(samples);
        for i in 0..samples {
            let x = noise(i);
            x_hist.rotate_right(1);
            x_hist[0] = x;
            let d: f32 = h.iter().zip(&x_hist).map(|(a, b)| a * b).sum();
            errors.push(step(x, d));
        }
        errors
    }

    fn tail_mse(errors: &[f32], tail: usize) -> f32 {
        let tail = &errors[errors.len() - tail..];
        tail.iter().map(|e| e * e).sum::<f32>() / tail.len() as f32
    }

    #[test]
    fn test_lms_converges_on_fir_system() {
        let h = [0.5f32, -0.3, 0.2, 0.1];
        let mut lms = LmsFilter::new(4, 0.5, true, 0.0).unwrap();
        let errors = run_identification(|x, d| lms.process_sample(x, d), &h, 4000);
        assert!(tail_mse(&errors, 500) < 1e-3);

        // History is stored oldest-first, so the converged weights read as
        // the reversed impulse response
        for (w, expect) in lms.weights().iter().rev().zip(&h) {
            assert!((w - expect).abs() < 0.05, "weight {w} vs {expect}");
        }
    }

    #[test]
    fn test_rls_converges_faster_than_lms() {
        let h = [0.5f32, -0.3, 0.2, 0.1];

        let mut lms = LmsFilter::new(4, 0.1, true, 0.0).unwrap();
        let lms_errors = run_identification(|x, d| lms.process_sample(x, d), &h, 600);

        let mut rls = RlsFilter::new(4, 0.99, 100.0).unwrap();
        let rls_errors = run_identification(|x, d| rls.process_sample(x, d), &h, 600);

        let lms_mse = tail_mse(&lms_errors[..300], 100);
        let rls_mse = tail_mse(&rls_errors[..300], 100);
        assert!(
            rls_mse < lms_mse,
            "RLS should outpace LMS early: rls={rls_mse}, lms={lms_mse}"
        );
        assert!(tail_mse(&rls_errors, 100) < 1e-4);
    }

    #[test]
    fn test_leaky_lms_decays_weights() {
        let mut lms = LmsFilter::new(2, 0.1, false, 0.5).unwrap();
        lms.process_sample(1.0, 1.0);
        let peak = lms.weights()[0];
        // With zero input the leak pulls weights toward zero
        for _ in 0..20 {
            lms.process_sample(0.0, 0.0);
        }
        assert!(lms.weights()[0].abs() < peak.abs() * 0.01);
    }

    #[test]
    fn test_rls_error_is_desired_initially(){
        let mut rls = RlsFilter::new(3, 0.98, 0.01).unwrap();
        // Zero weights: the first error equals the desired signal
        let e = rls.process_sample(1.0, 2.5);
        assert!((e - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_params() {
        assert!(LmsFilter::new(0, 0.1, false, 0.0).is_err());
        assert!(LmsFilter::new(4, 0.0, false, 0.0).is_err());
        assert!(LmsFilter::new(4, 0.1, false, 1.0).is_err());
        assert!(RlsFilter::new(4, 0.0, 0.01).is_err());
        assert!(RlsFilter::new(4, 1.5, 0.01).is_err());
        assert!(RlsFilter::new(4, 0.99, 0.0).is_err());
    }

    #[test]
    fn test_rls_state_round_trip() {
        let h = [0.4f32, -0.2];
        let mut a = RlsFilter::new(2, 0.99, 1.0).unwrap();
        run_identification(|x, d| a.process_sample(x, d), &h, 100);

        let (w, p, hist) = a.state();
        let mut b = RlsFilter::new(2, 0.99, 1.0).unwrap();
        b.set_state(&w, &p, &hist).unwrap();

        for i in 0..50 {
            let x = noise(i + 1000);
            let d = noise(i + 2000);
            assert_eq!(a.process_sample(x, d), b.process_sample(x, d));
        }
    }

    #[test]
    fn test_state_shape_mismatch() {
        let mut rls = RlsFilter::new(3, 0.99, 0.1).unwrap();
        assert!(rls.set_state(&[0.0; 2], &[0.0; 9], &[]).is_err());
        assert!(rls.set_state(&[0.0; 3], &[0.0; 4], &[]).is_err());
    }
}
