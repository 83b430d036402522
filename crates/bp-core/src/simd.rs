//! Runtime SIMD dispatch for the hot loops
//!
//! Detection happens once; each entry point checks the cached level and
//! falls back to scalar code. The accelerated loops cover the paths that
//! dominate profiles: spectrum magnitude/power conversion, dot products,
//! and block sums.

use crate::Sample;
use std::sync::OnceLock;

/// Detected SIMD capability level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SimdLevel {
    /// No SIMD, scalar fallback
    Scalar = 0,
    /// AVX2 + FMA (256-bit, 8 f32s)
    Avx2 = 1,
    /// ARM NEON (128-bit, 4 f32s)
    Neon = 2,
}

impl SimdLevel {
    /// SIMD width in f32 elements
    pub const fn width(self) -> usize {
        match self {
            SimdLevel::Scalar => 1,
            SimdLevel::Avx2 => 8,
            SimdLevel::Neon => 4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SimdLevel::Scalar => "Scalar",
            SimdLevel::Avx2 => "AVX2",
            SimdLevel::Neon => "NEON",
        }
    }
}

static DETECTED_SIMD_LEVEL: OnceLock<SimdLevel> = OnceLock::new();

/// Detect the best available SIMD level (computed once)
pub fn detect_simd_level() -> SimdLevel {
    *DETECTED_SIMD_LEVEL.get_or_init(|| {
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
                return SimdLevel::Avx2;
            }
            SimdLevel::Scalar
        }

        #[cfg(target_arch = "aarch64")]
        {
            // NEON is always available on aarch64
            SimdLevel::Neon
        }

        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            SimdLevel::Scalar
        }
    })
}

#[inline]
pub fn simd_level() -> SimdLevel {
    detect_simd_level()
}

// ============ Spectrum conversion ============

/// `out[i] = sqrt(re[i]^2 + im[i]^2)`
pub fn complex_magnitude(re: &[Sample], im: &[Sample], out: &mut [Sample]) {
    debug_assert_eq!(re.len(), im.len());
    debug_assert_eq!(re.len(), out.len());

    #[cfg(target_arch = "x86_64")]
    if simd_level() == SimdLevel::Avx2 {
        unsafe { magnitude_avx2(re, im, out) };
        return;
    }

    for i in 0..re.len() {
        out[i] = (re[i] * re[i] + im[i] * im[i]).sqrt();
    }
}

/// `out[i] = re[i]^2 + im[i]^2`
pub fn complex_power(re: &[Sample], im: &[Sample], out: &mut [Sample]) {
    debug_assert_eq!(re.len(), im.len());
    debug_assert_eq!(re.len(), out.len());

    #[cfg(target_arch = "x86_64")]
    if simd_level() == SimdLevel::Avx2 {
        unsafe { power_avx2(re, im, out) };
        return;
    }

    for i in 0..re.len() {
        out[i] = re[i] * re[i] + im[i] * im[i];
    }
}

/// `out[i] = atan2(im[i], re[i])`. atan2 stays scalar on every target.
pub fn complex_phase(re: &[Sample], im: &[Sample], out: &mut [Sample]) {
    debug_assert_eq!(re.len(), im.len());
    debug_assert_eq!(re.len(), out.len());
    for i in 0..re.len() {
        out[i] = im[i].atan2(re[i]);
    }
}

// ============ Reductions ============

/// Dot product `sum(a[i] * b[i])`
pub fn dot(a: &[Sample], b: &[Sample]) -> Sample {
    debug_assert_eq!(a.len(), b.len());

    #[cfg(target_arch = "x86_64")]
    if simd_level() == SimdLevel::Avx2 && a.len() >= 16 {
        return unsafe { dot_avx2(a, b) };
    }

    let mut acc = 0.0;
    for i in 0..a.len() {
        acc += a[i] * b[i];
    }
    acc
}

/// Block sum
pub fn sum(a: &[Sample]) -> Sample {
    #[cfg(target_arch = "x86_64")]
    if simd_level() == SimdLevel::Avx2 && a.len() >= 16 {
        return unsafe { sum_avx2(a) };
    }

    a.iter().copied().sum()
}

// ============ Channel layout ============

/// Split a 2-channel interleaved buffer into planar lanes.
pub fn deinterleave2(src: &[Sample], ch0: &mut [Sample], ch1: &mut [Sample]) {
    debug_assert_eq!(src.len(), ch0.len() + ch1.len());
    for (i, frame) in src.chunks_exact(2).enumerate() {
        ch0[i] = frame[0];
        ch1[i] = frame[1];
    }
}

/// Interleave two planar lanes into a 2-channel buffer.
pub fn interleave2(ch0: &[Sample], ch1: &[Sample], dst: &mut [Sample]) {
    debug_assert_eq!(dst.len(), ch0.len() + ch1.len());
    for (i, frame) in dst.chunks_exact_mut(2).enumerate() {
        frame[0] = ch0[i];
        frame[1] = ch1[i];
    }
}

// ============ AVX2 kernels ============

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn magnitude_avx2(re: &[Sample], im: &[Sample], out: &mut [Sample]) {
    use std::arch::x86_64::*;

    let n = re.len();
    let mut i = 0;
    unsafe {
        while i + 8 <= n {
            let r = _mm256_loadu_ps(re.as_ptr().add(i));
            let m = _mm256_loadu_ps(im.as_ptr().add(i));
            let sq = _mm256_fmadd_ps(m, m, _mm256_mul_ps(r, r));
            _mm256_storeu_ps(out.as_mut_ptr().add(i), _mm256_sqrt_ps(sq));
            i += 8;
        }
    }
    while i < n {
        out[i] = (re[i] * re[i] + im[i] * im[i]).sqrt();
        i += 1;
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn power_avx2(re: &[Sample], im: &[Sample], out: &mut [Sample]) {
    use std::arch::x86_64::*;

    let n = re.len();
    let mut i = 0;
    unsafe {
        while i + 8 <= n {
            let r = _mm256_loadu_ps(re.as_ptr().add(i));
            let m = _mm256_loadu_ps(im.as_ptr().add(i));
            let sq = _mm256_fmadd_ps(m, m, _mm256_mul_ps(r, r));
            _mm256_storeu_ps(out.as_mut_ptr().add(i), sq);
            i += 8;
        }
    }
    while i < n {
        out[i] = re[i] * re[i] + im[i] * im[i];
        i += 1;
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn dot_avx2(a: &[Sample], b: &[Sample]) -> Sample {
    use std::arch::x86_64::*;

    let n = a.len();
    let mut i = 0;
    let mut acc;
    unsafe {
        let mut vacc = _mm256_setzero_ps();
        while i + 8 <= n {
            let va = _mm256_loadu_ps(a.as_ptr().add(i));
            let vb = _mm256_loadu_ps(b.as_ptr().add(i));
            vacc = _mm256_fmadd_ps(va, vb, vacc);
            i += 8;
        }
        acc = hsum_avx2(vacc);
    }
    while i < n {
        acc += a[i] * b[i];
        i += 1;
    }
    acc
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn sum_avx2(a: &[Sample]) -> Sample {
    use std::arch::x86_64::*;

    let n = a.len();
    let mut i = 0;
    let mut acc;
    unsafe {
        let mut vacc = _mm256_setzero_ps();
        while i + 8 <= n {
            vacc = _mm256_add_ps(vacc, _mm256_loadu_ps(a.as_ptr().add(i)));
            i += 8;
        }
        acc = hsum_avx2(vacc);
    }
    while i < n {
        acc += a[i];
        i += 1;
    }
    acc
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn hsum_avx2(v: std::arch::x86_64::__m256) -> Sample {
    use std::arch::x86_64::*;
    unsafe {
        let lo = _mm256_castps256_ps128(v);
        let hi = _mm256_extractf128_ps(v, 1);
        let s = _mm_add_ps(lo, hi);
        let s = _mm_hadd_ps(s, s);
        let s = _mm_hadd_ps(s, s);
        _mm_cvtss_f32(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_magnitude(re: &[f32], im: &[f32]) -> Vec<f32> {
        re.iter()
            .zip(im)
            .map(|(r, i)| (r * r + i * i).sqrt())
            .collect()
    }

    #[test]
    fn test_magnitude_matches_scalar() {
        let re: Vec<f32> = (0..67).map(|i| (i as f32 * 0.37).sin()).collect();
        let im: Vec<f32> = (0..67).map(|i| (i as f32 * 0.59).cos()).collect();
        let mut out = vec![0.0; re.len()];
        complex_magnitude(&re, &im, &mut out);
        let expected = scalar_magnitude(&re, &im);
        for (a, b) in out.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_power_matches_scalar() {
        let re: Vec<f32> = (0..33).map(|i| i as f32 * 0.1).collect();
        let im: Vec<f32> = (0..33).map(|i| 3.0 - i as f32 * 0.2).collect();
        let mut out = vec![0.0; re.len()];
        complex_power(&re, &im, &mut out);
        for i in 0..re.len() {
            assert!((out[i] - (re[i] * re[i] + im[i] * im[i])).abs() < 1e-5);
        }
    }

    #[test]
    fn test_dot_and_sum() {
        let a: Vec<f32> = (0..100).map(|i| i as f32 * 0.01).collect();
        let b: Vec<f32> = (0..100).map(|i| 1.0 - i as f32 * 0.005).collect();
        let expect_dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        let expect_sum: f32 = a.iter().sum();
        assert!((dot(&a, &b) - expect_dot).abs() < 1e-3);
        assert!((sum(&a) - expect_sum).abs() < 1e-3);
    }

    #[test]
    fn test_interleave_round_trip() {
        let src: Vec<f32> = (0..20).map(|i| i as f32).collect();
        let mut ch0 = vec![0.0; 10];
        let mut ch1 = vec![0.0; 10];
        deinterleave2(&src, &mut ch0, &mut ch1);
        assert_eq!(ch0[0], 0.0);
        assert_eq!(ch1[0], 1.0);
        let mut dst = vec![0.0; 20];
        interleave2(&ch0, &ch1, &mut dst);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_level_reporting() {
        let level = detect_simd_level();
        assert!(!level.name().is_empty());
        assert!(level.width() >= 1);
    }
}
