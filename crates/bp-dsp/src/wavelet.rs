//! Discrete wavelet transform (single level)
//!
//! Orthonormal Daubechies filters applied with periodic extension. One
//! decomposition level splits a block into approximation and detail
//! halves of equal length.

use bp_core::{DspError, DspResult, Sample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveletKind {
    Haar,
    Db2,
    Db4,
}

impl WaveletKind {
    pub fn parse(name: &str) -> DspResult<Self> {
        Ok(match name {
            "haar" | "db1" => WaveletKind::Haar,
            "db2" => WaveletKind::Db2,
            "db4" => WaveletKind::Db4,
            other => {
                return Err(DspError::InvalidParams(format!(
                    "unknown wavelet '{other}' (supported: haar, db2, db4)"
                )));
            }
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            WaveletKind::Haar => "haar",
            WaveletKind::Db2 => "db2",
            WaveletKind::Db4 => "db4",
        }
    }
}

/// Decomposition filter pair for one wavelet family.
#[derive(Debug, Clone)]
pub struct WaveletFilter {
    pub lo_d: Vec<Sample>,
    pub hi_d: Vec<Sample>,
}

impl WaveletFilter {
    pub fn new(kind: WaveletKind) -> Self {
        let lo_d: Vec<Sample> = match kind {
            WaveletKind::Haar => vec![0.707_106_78, 0.707_106_78],
            WaveletKind::Db2 => vec![
                0.482_962_91,
                0.836_516_30,
                0.224_143_87,
                -0.129_409_52,
            ],
            WaveletKind::Db4 => vec![
                0.230_377_81,
                0.714_846_57,
                0.630_880_77,
                -0.027_983_77,
                -0.187_034_81,
                0.030_841_38,
                0.032_883_01,
                -0.010_597_40,
            ],
        };

        // Quadrature mirror: hi[k] = (-1)^k lo[L-1-k]
        let len = lo_d.len();
        let hi_d = (0..len)
            .map(|k| {
                let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
                sign * lo_d[len - 1 - k]
            })
            .collect();

        Self { lo_d, hi_d }
    }

    pub fn len(&self) -> usize {
        self.lo_d.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lo_d.is_empty()
    }
}

/// One decomposition level with periodic extension.
///
/// `approx` and `detail` each receive `input.len() / 2` coefficients;
/// an odd trailing sample is ignored by the caller's layout.
pub fn dwt_single_level(
    input: &[Sample],
    filter: &WaveletFilter,
    approx: &mut [Sample],
    detail: &mut [Sample],
) {
    let n = input.len();
    let half = n / 2;
    debug_assert!(approx.len() >= half && detail.len() >= half);
    if n < 2 {
        return;
    }

    let even = half * 2;
    for i in 0..half {
        let mut a = 0.0f32;
        let mut d = 0.0f32;
        for (k, (&lo, &hi)) in filter.lo_d.iter().zip(&filter.hi_d).enumerate() {
            let x = input[(2 * i + k) % even];
            a += lo * x;
            d += hi * x;
        }
        approx[i] = a;
        detail[i] = d;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haar_known_values() {
        let filter = WaveletFilter::new(WaveletKind::Haar);
        let input = [1.0f32, 3.0, 2.0, 4.0];
        let mut approx = [0.0f32; 2];
        let mut detail = [0.0f32; 2];
        dwt_single_level(&input, &filter, &mut approx, &mut detail);

        let s = std::f32::consts::FRAC_1_SQRT_2;
        assert!((approx[0] - (1.0 + 3.0) * s).abs() < 1e-5);
        assert!((approx[1] - (2.0 + 4.0) * s).abs() < 1e-5);
        assert!((detail[0] - (1.0 - 3.0) * s).abs() < 1e-5);
        assert!((detail[1] - (2.0 - 4.0) * s).abs() < 1e-5);
    }

    #[test]
    fn test_energy_preserved() {
        // Orthonormal filters preserve total energy
        for kind in [WaveletKind::Haar, WaveletKind::Db2, WaveletKind::Db4] {
            let filter = WaveletFilter::new(kind);
            let input: Vec<f32> = (0..64).map(|i| (i as f32 * 0.33).sin()).collect();
            let mut approx = vec![0.0f32; 32];
            let mut detail = vec![0.0f32; 32];
            dwt_single_level(&input, &filter, &mut approx, &mut detail);

            let in_energy: f32 = input.iter().map(|x| x * x).sum();
            let out_energy: f32 = approx.iter().chain(&detail).map(|x| x * x).sum();
            assert!(
                (in_energy - out_energy).abs() / in_energy < 1e-4,
                "{kind:?}: {in_energy} vs {out_energy}"
            );
        }
    }

    #[test]
    fn test_smooth_signal_energy_in_approx() {
        let filter = WaveletFilter::new(WaveletKind::Db4);
        let input: Vec<f32> = (0..128).map(|i| (i as f32 * 0.05).sin()).collect();
        let mut approx = vec![0.0f32; 64];
        let mut detail = vec![0.0f32; 64];
        dwt_single_level(&input, &filter, &mut approx, &mut detail);

        let a_energy: f32 = approx.iter().map(|x| x * x).sum();
        let d_energy: f32 = detail.iter().map(|x| x * x).sum();
        assert!(a_energy > d_energy * 50.0);
    }

    #[test]
    fn test_qmf_relation() {
        let filter = WaveletFilter::new(WaveletKind::Db2);
        assert!((filter.hi_d[0] - filter.lo_d[3]).abs() < 1e-7);
        assert!((filter.hi_d[1] + filter.lo_d[2]).abs() < 1e-7);
    }

    #[test]
    fn test_parse() {
        assert_eq!(WaveletKind::parse("haar").unwrap(), WaveletKind::Haar);
        assert_eq!(WaveletKind::parse("db1").unwrap(), WaveletKind::Haar);
        assert!(WaveletKind::parse("sym4").is_err());
    }
}
