//! Filter bank design
//!
//! Generates sets of bandpass filters covering a frequency range according
//! to psychoacoustic (Mel, Bark) or mathematical (Linear, Log) scales.
//! Stateless: frequency warping plus per-band bandpass design.

use crate::design::{self, FilterCoeffs};
use bp_core::{DspError, DspResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    /// Linear spacing in Hz
    Linear,
    /// Logarithmic spacing
    Log,
    /// Mel scale (mimics human hearing)
    Mel,
    /// Bark scale (critical band rate)
    Bark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankType {
    /// Maximally flat passband
    Butterworth,
    /// Equiripple passband
    Chebyshev1,
}

#[derive(Debug, Clone)]
pub struct BankDesign {
    pub scale: Scale,
    pub bank_type: BankType,
    pub count: usize,
    pub sample_rate: f64,
    pub min_freq: f64,
    pub max_freq: f64,
    pub order: u32,
    pub ripple_db: f64,
}

impl BankDesign {
    /// Design the bank: one bandpass `(b, a)` pair per band.
    pub fn design(&self) -> DspResult<Vec<FilterCoeffs>> {
        self.validate()?;

        let boundaries = self.boundaries()?;
        let mut bank = Vec::with_capacity(self.count);

        for i in 0..self.count {
            let mut f_low = boundaries[i];
            let f_high = boundaries[i + 1];

            // Bandpass filters cannot start at DC
            if f_low == 0.0 {
                log::debug!("filter bank: raising band {i} lower edge from DC to 1 Hz");
                f_low = 1.0;
            }

            let n_low = (f_low / self.sample_rate).clamp(0.0001, 0.4999);
            let mut n_high = (f_high / self.sample_rate).clamp(0.0001, 0.4999);
            if n_low >= n_high {
                n_high = n_low + 0.0001;
            }

            let coeffs = match self.bank_type {
                BankType::Chebyshev1 => {
                    design::chebyshev_band_pass(n_low, n_high, self.order, self.ripple_db)?
                }
                BankType::Butterworth => {
                    design::butterworth_band_pass(n_low, n_high, self.order)?
                }
            };
            bank.push(coeffs);
        }

        Ok(bank)
    }

    /// Band edges in Hz (count + 1 values).
    pub fn boundaries(&self) -> DspResult<Vec<f64>> {
        if self.count == 0 {
            return Err(DspError::InvalidParams("band count must be positive".into()));
        }

        let min_val = to_scale(self.min_freq, self.scale);
        let max_val = to_scale(self.max_freq, self.scale);
        let step = (max_val - min_val) / self.count as f64;

        Ok((0..=self.count)
            .map(|i| from_scale(min_val + i as f64 * step, self.scale))
            .collect())
    }

    fn validate(&self) -> DspResult<()> {
        if self.count == 0 {
            return Err(DspError::InvalidParams("band count must be positive".into()));
        }
        if self.min_freq < 0.0 {
            return Err(DspError::InvalidParams(
                "minimum frequency cannot be negative".into(),
            ));
        }
        if self.min_freq >= self.max_freq {
            return Err(DspError::InvalidParams(
                "invalid frequency range: minFreq must be < maxFreq".into(),
            ));
        }
        if self.sample_rate <= 0.0 {
            return Err(DspError::InvalidParams("sample rate must be positive".into()));
        }
        if self.max_freq > self.sample_rate / 2.0 {
            return Err(DspError::InvalidParams(
                "maximum frequency must be <= Nyquist frequency".into(),
            ));
        }
        if self.order == 0 {
            return Err(DspError::InvalidParams("filter order must be positive".into()));
        }
        Ok(())
    }
}

fn to_scale(hz: f64, scale: Scale) -> f64 {
    match scale {
        Scale::Linear => hz,
        Scale::Log => hz.log10(),
        // f_mel = 2595 log10(1 + f/700)
        Scale::Mel => 2595.0 * (1.0 + hz / 700.0).log10(),
        // Traunmueller 1990: z = 26.81 f / (1960 + f) - 0.53
        Scale::Bark => 26.81 * hz / (1960.0 + hz) - 0.53,
    }
}

fn from_scale(val: f64, scale: Scale) -> f64 {
    match scale {
        Scale::Linear => val,
        Scale::Log => 10f64.powf(val),
        Scale::Mel => 700.0 * (10f64.powf(val / 2595.0) - 1.0),
        Scale::Bark => {
            let adjusted = val + 0.53;
            1960.0 * adjusted / (26.81 - adjusted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_design() -> BankDesign {
        BankDesign {
            scale: Scale::Mel,
            bank_type: BankType::Butterworth,
            count: 8,
            sample_rate: 16000.0,
            min_freq: 100.0,
            max_freq: 8000.0,
            order: 2,
            ripple_db: 0.5,
        }
    }

    #[test]
    fn test_mel_round_trip() {
        for hz in [100.0, 440.0, 1000.0, 4000.0] {
            let back = from_scale(to_scale(hz, Scale::Mel), Scale::Mel);
            assert!((back - hz).abs() < 1e-6);
        }
    }

    #[test]
    fn test_bark_round_trip() {
        for hz in [100.0, 440.0, 1000.0, 4000.0] {
            let back = from_scale(to_scale(hz, Scale::Bark), Scale::Bark);
            assert!((back - hz).abs() < 1e-6);
        }
    }

    #[test]
    fn test_boundaries_monotonic() {
        for scale in [Scale::Linear, Scale::Log, Scale::Mel, Scale::Bark] {
            let mut d = base_design();
            d.scale = scale;
            let bounds = d.boundaries().unwrap();
            assert_eq!(bounds.len(), 9);
            for pair in bounds.windows(2) {
                assert!(pair[0] < pair[1], "{scale:?} boundaries not increasing");
            }
            assert!((bounds[0] - 100.0).abs() < 1e-6);
            assert!((bounds[8] - 8000.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_design_produces_count_filters() {
        let bank = base_design().design().unwrap();
        assert_eq!(bank.len(), 8);
        for coeffs in &bank {
            assert_eq!(coeffs.b.len(), 5);
            assert_eq!(coeffs.a.len(), 4);
        }
    }

    #[test]
    fn test_mel_bands_widen_with_frequency() {
        let d = base_design();
        let bounds = d.boundaries().unwrap();
        let first_width = bounds[1] - bounds[0];
        let last_width = bounds[8] - bounds[7];
        assert!(last_width > first_width * 2.0);
    }

    #[test]
    fn test_validation() {
        let mut d = base_design();
        d.count = 0;
        assert!(d.design().is_err());

        let mut d = base_design();
        d.min_freq = 9000.0;
        assert!(d.design().is_err());

        let mut d = base_design();
        d.max_freq = 9000.0; // above Nyquist
        assert!(d.design().is_err());

        let mut d = base_design();
        d.order = 0;
        assert!(d.design().is_err());
    }
}
