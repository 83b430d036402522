//! FFT/DFT engine
//!
//! One engine instance per transform size. Power-of-two sizes get the
//! radix-2 Cooley-Tukey path with cached twiddles and a bit-reversal table;
//! real transforms of any size go through the mixed-radix real FFT; the
//! direct O(N^2) DFT covers complex transforms of non-power-of-two sizes.

use crate::fftpack::Fftpack;
use bp_core::{Complex32, DspError, DspResult, Sample, simd};
use std::f64::consts::PI;

pub struct FftEngine {
    size: usize,
    is_pow2: bool,
    twiddles: Vec<Complex32>,
    bit_rev: Vec<usize>,
    fftpack: Fftpack,
}

impl FftEngine {
    pub fn new(size: usize) -> DspResult<Self> {
        if size == 0 {
            return Err(DspError::InvalidParams("FFT size must be > 0".into()));
        }

        let is_pow2 = size.is_power_of_two();
        let mut engine = Self {
            size,
            is_pow2,
            twiddles: Vec::new(),
            bit_rev: Vec::new(),
            fftpack: Fftpack::new(size),
        };

        if is_pow2 {
            engine.init_twiddles();
            engine.init_bit_reversal();
        }

        Ok(engine)
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Half-spectrum size for real transforms (`N/2 + 1`).
    #[inline]
    pub fn half_size(&self) -> usize {
        self.size / 2 + 1
    }

    #[inline]
    pub fn is_power_of_two(&self) -> bool {
        self.is_pow2
    }

    // ========== Complex transforms ==========

    /// Forward FFT. Requires a power-of-two size; use `dft` otherwise.
    pub fn fft(&self, input: &[Complex32], output: &mut [Complex32]) -> DspResult<()> {
        if !self.is_pow2 {
            return Err(DspError::InvalidParams(
                "FFT requires power-of-2 size; use DFT for arbitrary sizes".into(),
            ));
        }
        output[..self.size].copy_from_slice(&input[..self.size]);
        self.cooley_tukey(output, false);
        Ok(())
    }

    /// Inverse FFT with 1/N scaling.
    pub fn ifft(&self, input: &[Complex32], output: &mut [Complex32]) -> DspResult<()> {
        if !self.is_pow2 {
            return Err(DspError::InvalidParams(
                "IFFT requires power-of-2 size; use IDFT for arbitrary sizes".into(),
            ));
        }
        output[..self.size].copy_from_slice(&input[..self.size]);
        self.cooley_tukey(output, true);

        let scale = 1.0 / self.size as Sample;
        for v in output[..self.size].iter_mut() {
            *v *= scale;
        }
        Ok(())
    }

    /// Direct DFT, any size.
    pub fn dft(&self, input: &[Complex32], output: &mut [Complex32]) {
        let n = self.size;
        for k in 0..n {
            let mut sum = Complex32::new(0.0, 0.0);
            for (i, &x) in input[..n].iter().enumerate() {
                let angle = -2.0 * PI * (k * i % n) as f64 / n as f64;
                sum += x * Complex32::new(angle.cos() as Sample, angle.sin() as Sample);
            }
            output[k] = sum;
        }
    }

    /// Inverse direct DFT with 1/N scaling.
    pub fn idft(&self, input: &[Complex32], output: &mut [Complex32]) {
        let n = self.size;
        let scale = 1.0 / n as Sample;
        for k in 0..n {
            let mut sum = Complex32::new(0.0, 0.0);
            for (i, &x) in input[..n].iter().enumerate() {
                let angle = 2.0 * PI * (k * i % n) as f64 / n as f64;
                sum += x * Complex32::new(angle.cos() as Sample, angle.sin() as Sample);
            }
            output[k] = sum * scale;
        }
    }

    // ========== Real transforms ==========

    /// Forward real FFT into the standard `N/2+1` half spectrum.
    pub fn rfft(&mut self, input: &[Sample], output: &mut [Complex32]) {
        self.fftpack.rfft(input, output);
    }

    /// Inverse real FFT from the half spectrum, including 1/N scaling.
    pub fn irfft(&mut self, input: &[Complex32], output: &mut [Sample]) {
        self.fftpack.irfft(input, output);
        let scale = 1.0 / self.size as Sample;
        for v in output[..self.size].iter_mut() {
            *v *= scale;
        }
    }

    /// Direct real DFT (half spectrum), any size.
    pub fn rdft(&self, input: &[Sample], output: &mut [Complex32]) {
        let n = self.size;
        for k in 0..self.half_size() {
            let mut re = 0.0f64;
            let mut im = 0.0f64;
            for (i, &x) in input[..n].iter().enumerate() {
                let angle = -2.0 * PI * (k * i % n) as f64 / n as f64;
                re += x as f64 * angle.cos();
                im += x as f64 * angle.sin();
            }
            output[k] = Complex32::new(re as Sample, im as Sample);
        }
    }

    /// Inverse direct real DFT with 1/N scaling.
    pub fn irdft(&self, input: &[Complex32], output: &mut [Sample]) {
        let n = self.size;
        let half = self.half_size();
        let scale = 1.0 / n as Sample;

        for (i, out) in output[..n].iter_mut().enumerate() {
            let mut sum = input[0].re as f64;

            // Positive-frequency bins contribute X[k]e^{jθ} + X*[k]e^{-jθ}
            // = 2(Re·cosθ - Im·sinθ)
            for k in 1..half.saturating_sub(1) {
                let angle = 2.0 * PI * (k * i % n) as f64 / n as f64;
                sum += 2.0 * (input[k].re as f64 * angle.cos() - input[k].im as f64 * angle.sin());
            }

            if n % 2 == 0 && half > 1 {
                let angle = 2.0 * PI * ((half - 1) * i % n) as f64 / n as f64;
                sum += input[half - 1].re as f64 * angle.cos();
            }

            *out = sum as Sample * scale;
        }
    }

    // ========== Private ==========

    fn init_twiddles(&mut self) {
        let n = self.size;
        self.twiddles = (0..n / 2)
            .map(|k| {
                let angle = -2.0 * PI * k as f64 / n as f64;
                Complex32::new(angle.cos() as Sample, angle.sin() as Sample)
            })
            .collect();
    }

    fn init_bit_reversal(&mut self) {
        let n = self.size;
        let bits = n.trailing_zeros() as usize;
        self.bit_rev = (0..n)
            .map(|i| {
                let mut x = i;
                let mut r = 0usize;
                for _ in 0..bits {
                    r = (r << 1) | (x & 1);
                    x >>= 1;
                }
                r
            })
            .collect();
    }

    /// Decimation-in-time, in place. Forward twiddles are reused for the
    /// inverse by conjugation; the inverse caller applies the 1/N scale.
    fn cooley_tukey(&self, data: &mut [Complex32], inverse: bool) {
        let n = self.size;

        for i in 0..n {
            let j = self.bit_rev[i];
            if i < j {
                data.swap(i, j);
            }
        }

        let mut len = 2;
        while len <= n {
            let half_len = len / 2;
            let twiddle_step = n / len;

            for block in (0..n).step_by(len) {
                let mut k = 0;
                for j in 0..half_len {
                    let mut tw = self.twiddles[k];
                    if inverse {
                        tw = tw.conj();
                    }
                    let a = data[block + j];
                    let b = data[block + j + half_len] * tw;
                    data[block + j] = a + b;
                    data[block + j + half_len] = a - b;
                    k += twiddle_step;
                }
            }

            len <<= 1;
        }
    }
}

// ========== Derived spectra ==========

/// `|X[k]|` for each bin, SIMD-accelerated.
pub fn spectrum_magnitude(spectrum: &[Complex32], out: &mut [Sample]) {
    let (re, im) = split_complex(spectrum);
    simd::complex_magnitude(&re, &im, out);
}

/// `|X[k]|^2` for each bin, SIMD-accelerated.
pub fn spectrum_power(spectrum: &[Complex32], out: &mut [Sample]) {
    let (re, im) = split_complex(spectrum);
    simd::complex_power(&re, &im, out);
}

/// `atan2(Im, Re)` for each bin.
pub fn spectrum_phase(spectrum: &[Complex32], out: &mut [Sample]) {
    let (re, im) = split_complex(spectrum);
    simd::complex_phase(&re, &im, out);
}

fn split_complex(spectrum: &[Complex32]) -> (Vec<Sample>, Vec<Sample>) {
    let re = spectrum.iter().map(|c| c.re).collect();
    let im = spectrum.iter().map(|c| c.im).collect();
    (re, im)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_signal(n: usize, seed: u64) -> Vec<Complex32> {
        // xorshift; deterministic across runs
        let mut state = seed | 1;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state as f64 / u64::MAX as f64) as f32 - 0.5
        };
        (0..n).map(|_| Complex32::new(next(), next())).collect()
    }

    #[test]
    fn test_fft_ifft_inversion() {
        for &n in &[8usize, 16, 64, 256, 1024, 4096] {
            let engine = FftEngine::new(n).unwrap();
            let signal = random_signal(n, 0x5eed + n as u64);
            let mut spectrum = vec![Complex32::new(0.0, 0.0); n];
            let mut restored = vec![Complex32::new(0.0, 0.0); n];

            engine.fft(&signal, &mut spectrum).unwrap();
            engine.ifft(&spectrum, &mut restored).unwrap();

            for (got, want) in restored.iter().zip(&signal) {
                assert!((got - want).norm() < 1e-5 * (n as f32).sqrt());
            }
        }
    }

    #[test]
    fn test_fft_matches_dft() {
        let n = 64;
        let engine = FftEngine::new(n).unwrap();
        let signal = random_signal(n, 0xfeed);
        let mut fast = vec![Complex32::new(0.0, 0.0); n];
        let mut slow = vec![Complex32::new(0.0, 0.0); n];
        engine.fft(&signal, &mut fast).unwrap();
        engine.dft(&signal, &mut slow);
        for (a, b) in fast.iter().zip(&slow) {
            assert!((a - b).norm() < 1e-3);
        }
    }

    #[test]
    fn test_rfft_agrees_with_complex_fft() {
        for &n in &[8usize, 12, 16, 30, 64, 100, 128, 1000, 4096] {
            let mut engine = FftEngine::new(n).unwrap();
            let real: Vec<f32> = (0..n).map(|i| ((i * 7 % 23) as f32 * 0.13).sin()).collect();

            let mut half = vec![Complex32::new(0.0, 0.0); engine.half_size()];
            engine.rfft(&real, &mut half);

            let complex_in: Vec<Complex32> =
                real.iter().map(|&x| Complex32::new(x, 0.0)).collect();
            let mut full = vec![Complex32::new(0.0, 0.0); n];
            if engine.is_power_of_two() {
                engine.fft(&complex_in, &mut full).unwrap();
            } else {
                engine.dft(&complex_in, &mut full);
            }

            for k in 0..engine.half_size() {
                assert!(
                    (half[k] - full[k]).norm() < 1e-4 * n as f32,
                    "n={n} bin={k}: {} vs {}",
                    half[k],
                    full[k]
                );
            }
        }
    }

    #[test]
    fn test_parseval() {
        let n = 512;
        let engine = FftEngine::new(n).unwrap();
        let signal = random_signal(n, 0xabcd);
        let mut spectrum = vec![Complex32::new(0.0, 0.0); n];
        engine.fft(&signal, &mut spectrum).unwrap();

        let time_energy: f64 = signal.iter().map(|c| c.norm_sqr() as f64).sum();
        let freq_energy: f64 =
            spectrum.iter().map(|c| c.norm_sqr() as f64).sum::<f64>() / n as f64;
        assert!((time_energy - freq_energy).abs() / time_energy < 1e-4);
    }

    #[test]
    fn test_irdft_inverts_rdft() {
        let n = 15;
        let engine = FftEngine::new(n).unwrap();
        let signal: Vec<f32> = (0..n).map(|i| (i as f32 * 0.7).cos()).collect();
        let mut spectrum = vec![Complex32::new(0.0, 0.0); engine.half_size()];
        engine.rdft(&signal, &mut spectrum);
        let mut restored = vec![0.0f32; n];
        engine.irdft(&spectrum, &mut restored);
        for (got, want) in restored.iter().zip(&signal) {
            assert!((got - want).abs() < 1e-4);
        }
    }

    #[test]
    fn test_fft_rejects_non_pow2() {
        let engine = FftEngine::new(12).unwrap();
        let buf = vec![Complex32::new(0.0, 0.0); 12];
        let mut out = vec![Complex32::new(0.0, 0.0); 12];
        assert!(engine.fft(&buf, &mut out).is_err());
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(FftEngine::new(0).is_err());
    }

    #[test]
    fn test_derived_spectra() {
        let spectrum = vec![Complex32::new(3.0, 4.0), Complex32::new(0.0, -2.0)];
        let mut mag = vec![0.0; 2];
        let mut pow = vec![0.0; 2];
        let mut ph = vec![0.0; 2];
        spectrum_magnitude(&spectrum, &mut mag);
        spectrum_power(&spectrum, &mut pow);
        spectrum_phase(&spectrum, &mut ph);
        assert!((mag[0] - 5.0).abs() < 1e-6);
        assert!((pow[0] - 25.0).abs() < 1e-5);
        assert!((ph[1] + std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }
}
