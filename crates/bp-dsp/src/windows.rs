//! Analysis window functions

use bp_core::{DspError, DspResult, Sample};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    None,
    Hann,
    Hamming,
    Blackman,
    Bartlett,
}

impl WindowKind {
    pub fn parse(name: &str) -> DspResult<Self> {
        Ok(match name {
            "none" => WindowKind::None,
            "hann" => WindowKind::Hann,
            "hamming" => WindowKind::Hamming,
            "blackman" => WindowKind::Blackman,
            "bartlett" => WindowKind::Bartlett,
            other => {
                return Err(DspError::InvalidParams(format!(
                    "unknown window type '{other}'"
                )));
            }
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            WindowKind::None => "none",
            WindowKind::Hann => "hann",
            WindowKind::Hamming => "hamming",
            WindowKind::Blackman => "blackman",
            WindowKind::Bartlett => "bartlett",
        }
    }
}

/// Window coefficient table of length `size`.
pub fn window_table(kind: WindowKind, size: usize) -> Vec<Sample> {
    if size == 0 {
        return Vec::new();
    }
    if size == 1 {
        return vec![1.0];
    }

    let m = (size - 1) as f64;
    (0..size)
        .map(|n| {
            let x = n as f64;
            let w = match kind {
                WindowKind::None => 1.0,
                WindowKind::Hann => 0.5 * (1.0 - (2.0 * PI * x / m).cos()),
                WindowKind::Hamming => 0.54 - 0.46 * (2.0 * PI * x / m).cos(),
                WindowKind::Blackman => {
                    0.42 - 0.5 * (2.0 * PI * x / m).cos() + 0.08 * (4.0 * PI * x / m).cos()
                }
                WindowKind::Bartlett => 1.0 - (2.0 * x / m - 1.0).abs(),
            };
            w as Sample
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_endpoints_and_symmetry() {
        let w = window_table(WindowKind::Hann, 16);
        assert!(w[0].abs() < 1e-7);
        assert!(w[15].abs() < 1e-7);
        for i in 0..8 {
            assert!((w[i] - w[15 - i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_hamming_floor() {
        let w = window_table(WindowKind::Hamming, 32);
        assert!((w[0] - 0.08).abs() < 1e-6);
        assert!(w.iter().all(|&v| v >= 0.079));
    }

    #[test]
    fn test_rectangular() {
        let w = window_table(WindowKind::None, 8);
        assert!(w.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_parse() {
        assert_eq!(WindowKind::parse("blackman").unwrap(), WindowKind::Blackman);
        assert!(WindowKind::parse("kaiser").is_err());
    }
}
