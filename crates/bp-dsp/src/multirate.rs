//! Polyphase multirate kernels
//!
//! Integer-factor interpolation and decimation plus rational L/M
//! resampling, all sharing the windowed-sinc prototype design. Each kernel
//! keeps a per-channel circular history the length of the filter, so
//! blocks stream seamlessly across `process` calls.

use bp_core::{DspError, DspResult, Sample};
use std::f64::consts::PI;

fn check_factor(factor: usize, what: &str) -> DspResult<()> {
    if factor < 2 {
        return Err(DspError::InvalidParams(format!("{what} factor must be >= 2")));
    }
    Ok(())
}

fn check_order(order: usize) -> DspResult<()> {
    if order < 3 || order % 2 == 0 {
        return Err(DspError::InvalidParams(
            "filter order must be odd and >= 3".into(),
        ));
    }
    Ok(())
}

/// Windowed-sinc low-pass prototype: cutoff `fc` as a fraction of the
/// design rate, Hamming taper, scaled by `gain`.
fn windowed_sinc(order: usize, fc: f64, gain: f64) -> Vec<Sample> {
    let m = (order / 2) as isize;
    (0..order)
        .map(|n| {
            let t = n as isize - m;
            let sinc = if t == 0 {
                2.0 * fc
            } else {
                let x = 2.0 * PI * fc * t as f64;
                x.sin() / (PI * t as f64)
            };
            let window = 0.54 - 0.46 * (2.0 * PI * n as f64 / (order - 1) as f64).cos();
            (sinc * window * gain) as Sample
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
struct ChannelState {
    history: Vec<Sample>,
    index: usize,
}

impl ChannelState {
    fn new(order: usize) -> Self {
        Self {
            history: vec![0.0; order],
            index: 0,
        }
    }
}

// ---------- Interpolator ----------

/// Upsampler by integer factor L with polyphase anti-imaging filter.
#[derive(Debug, Clone)]
pub struct Interpolator {
    factor: usize,
    order: usize,
    coeffs: Vec<Sample>,
    channels: Vec<ChannelState>,
}

impl Interpolator {
    pub fn new(factor: usize, order: usize) -> DspResult<Self> {
        check_factor(factor, "interpolation")?;
        check_order(order)?;

        // Anti-imaging cutoff sits at the input Nyquist, i.e. 1/(2L) of
        // the output rate; gain L restores amplitude after zero stuffing.
        let fc = 1.0 / (2.0 * factor as f64);
        Ok(Self {
            factor,
            order,
            coeffs: windowed_sinc(order, fc, factor as f64),
            channels: Vec::new(),
        })
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn ensure_channels(&mut self, count: usize) {
        if self.channels.len() != count {
            self.channels = (0..count).map(|_| ChannelState::new(self.order)).collect();
        }
    }

    /// Emit `factor` output samples per input sample for one channel of an
    /// interleaved buffer.
    pub fn process_channel(
        &mut self,
        input: &[Sample],
        output: &mut [Sample],
        channel: usize,
        channels: usize,
    ) {
        let frames = input.len() / channels;
        let state = &mut self.channels[channel];
        let mut out_frame = 0;

        for i in 0..frames {
            state.history[state.index] = input[i * channels + channel];
            state.index = (state.index + 1) % self.order;

            for phase in 0..self.factor {
                let mut acc = 0.0f32;
                let mut k = phase;
                while k < self.order {
                    let pos = (state.index + self.order - 1 - k / self.factor) % self.order;
                    acc += self.coeffs[k] * state.history[pos];
                    k += self.factor;
                }
                output[out_frame * channels + channel] = acc;
                out_frame += 1;
            }
        }
    }

    pub fn reset(&mut self) {
        for ch in &mut self.channels {
            ch.history.fill(0.0);
            ch.index = 0;
        }
    }

    pub fn channel_states(&self) -> Vec<(Vec<Sample>, usize)> {
        self.channels
            .iter()
            .map(|c| (c.history.clone(), c.index))
            .collect()
    }

    pub fn set_channel_states(&mut self, states: &[(Vec<Sample>, usize)]) {
        self.channels = states
            .iter()
            .map(|(h, i)| {
                let mut ch = ChannelState::new(self.order);
                let n = h.len().min(self.order);
                ch.history[..n].copy_from_slice(&h[..n]);
                ch.index = i % self.order;
                ch
            })
            .collect();
    }
}

// ---------- Decimator ----------

/// Downsampler by integer factor M with anti-aliasing filter. Emits one
/// output frame whenever the shared phase counter reaches M.
#[derive(Debug, Clone)]
pub struct Decimator {
    factor: usize,
    order: usize,
    coeffs: Vec<Sample>,
    channels: Vec<ChannelState>,
    phase: usize,
}

impl Decimator {
    pub fn new(factor: usize, order: usize) -> DspResult<Self> {
        check_factor(factor, "decimation")?;
        check_order(order)?;

        // Cutoff at the output Nyquist, normalised to the input rate;
        // unity DC gain via coefficient-sum normalisation.
        let fc = 1.0 / (2.0 * factor as f64);
        let mut coeffs = windowed_sinc(order, fc, 1.0);
        let sum: f32 = coeffs.iter().sum();
        for c in coeffs.iter_mut() {
            *c /= sum;
        }

        Ok(Self {
            factor,
            order,
            coeffs,
            channels: Vec::new(),
            phase: 0,
        })
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn phase(&self) -> usize {
        self.phase
    }

    pub fn set_phase(&mut self, phase: usize) {
        self.phase = phase;
    }

    pub fn ensure_channels(&mut self, count: usize) {
        if self.channels.len() != count {
            self.channels = (0..count).map(|_| ChannelState::new(self.order)).collect();
        }
    }

    /// Process a whole interleaved block; returns output frames written.
    pub fn process(&mut self, input: &[Sample], output: &mut Vec<Sample>, channels: usize) -> usize {
        let frames = input.len() / channels;
        let mut out_frames = 0;

        for i in 0..frames {
            self.phase += 1;

            for ch in 0..channels {
                let state = &mut self.channels[ch];
                state.history[state.index] = input[i * channels + ch];
                state.index = (state.index + 1) % self.order;
            }

            if self.phase >= self.factor {
                self.phase = 0;
                for ch in 0..channels {
                    let state = &self.channels[ch];
                    let mut acc = 0.0f32;
                    for (tap, &c) in self.coeffs.iter().enumerate() {
                        let pos = (state.index + self.order - 1 - tap) % self.order;
                        acc += c * state.history[pos];
                    }
                    output.push(acc);
                }
                out_frames += 1;
            }
        }

        out_frames
    }

    pub fn reset(&mut self) {
        for ch in &mut self.channels {
            ch.history.fill(0.0);
            ch.index = 0;
        }
        self.phase = 0;
    }

    pub fn channel_states(&self) -> Vec<(Vec<Sample>, usize)> {
        self.channels
            .iter()
            .map(|c| (c.history.clone(), c.index))
            .collect()
    }

    pub fn set_channel_states(&mut self, states: &[(Vec<Sample>, usize)]) {
        self.channels = states
            .iter()
            .map(|(h, i)| {
                let mut ch = ChannelState::new(self.order);
                let n = h.len().min(self.order);
                ch.history[..n].copy_from_slice(&h[..n]);
                ch.index = i % self.order;
                ch
            })
            .collect();
    }
}

// ---------- Rational resampler ----------

/// Rate converter by L/M (reduced by their GCD): polyphase interpolation
/// with the decimation folded into the phase walk, so skipped outputs are
/// never computed.
#[derive(Debug, Clone)]
pub struct RationalResampler {
    up: usize,
    down: usize,
    order: usize,
    coeffs: Vec<Sample>,
    channels: Vec<ResamplerChannel>,
}

#[derive(Debug, Clone)]
struct ResamplerChannel {
    history: Vec<Sample>,
    index: usize,
    phase_acc: usize,
}

impl RationalResampler {
    pub fn new(up: usize, down: usize, order: usize) -> DspResult<Self> {
        if up < 1 {
            return Err(DspError::InvalidParams(
                "interpolation factor L must be >= 1".into(),
            ));
        }
        if down < 1 {
            return Err(DspError::InvalidParams(
                "decimation factor M must be >= 1".into(),
            ));
        }
        check_order(order)?;

        let gcd = gcd(up, down);
        let up = up / gcd;
        let down = down / gcd;

        // Single filter covers both anti-imaging and anti-aliasing:
        // cutoff min(L, M) / (2 L M) of the intermediate rate, gain L.
        let fc = up.min(down) as f64 / (2.0 * up as f64 * down as f64);
        Ok(Self {
            up,
            down,
            order,
            coeffs: windowed_sinc(order, fc, up as f64),
            channels: Vec::new(),
        })
    }

    pub fn up(&self) -> usize {
        self.up
    }

    pub fn down(&self) -> usize {
        self.down
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn ensure_channels(&mut self, count: usize) {
        if self.channels.len() != count {
            self.channels = (0..count)
                .map(|_| ResamplerChannel {
                    history: vec![0.0; self.order],
                    index: 0,
                    phase_acc: 0,
                })
                .collect();
        }
    }

    /// Process one channel; returns output frames produced for it.
    pub fn process_channel(
        &mut self,
        input: &[Sample],
        output: &mut [Sample],
        channel: usize,
        channels: usize,
    ) -> usize {
        let frames = input.len() / channels;
        let order = self.order;
        let state = &mut self.channels[channel];
        let mut out_frame = 0;

        for i in 0..frames {
            state.history[state.index] = input[i * channels + channel];
            state.index = (state.index + 1) % order;

            for phase in 0..self.up {
                if state.phase_acc % self.down == 0 {
                    let mut acc = 0.0f32;
                    let mut k = phase;
                    while k < order {
                        let pos = (state.index + order - 1 - k / self.up) % order;
                        acc += self.coeffs[k] * state.history[pos];
                        k += self.up;
                    }
                    output[out_frame * channels + channel] = acc;
                    out_frame += 1;
                }
                state.phase_acc += 1;
            }
        }

        state.phase_acc %= self.down;
        out_frame
    }

    pub fn reset(&mut self) {
        for ch in &mut self.channels {
            ch.history.fill(0.0);
            ch.index = 0;
            ch.phase_acc = 0;
        }
    }

    pub fn channel_states(&self) -> Vec<(Vec<Sample>, usize, usize)> {
        self.channels
            .iter()
            .map(|c| (c.history.clone(), c.index, c.phase_acc))
            .collect()
    }

    pub fn set_channel_states(&mut self, states: &[(Vec<Sample>, usize, usize)]) {
        self.channels = states
            .iter()
            .map(|(h, i, p)| {
                let mut history = vec![0.0; self.order];
                let n = h.len().min(self.order);
                history[..n].copy_from_slice(&h[..n]);
                ResamplerChannel {
                    history,
                    index: i % self.order,
                    phase_acc: *p,
                }
            })
            .collect();
    }
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 { a } else { gcd(b, a % b) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolator_length_law() {
        let mut interp = Interpolator::new(3, 51).unwrap();
        interp.ensure_channels(1);
        let input = vec![1.0f32; 100];
        let mut output = vec![0.0f32; 300];
        interp.process_channel(&input, &mut output, 0, 1);
        assert_eq!(output.len(), input.len() * 3);
    }

    #[test]
    fn test_interpolator_preserves_dc() {
        let mut interp = Interpolator::new(4, 51).unwrap();
        interp.ensure_channels(1);
        let input = vec![1.0f32; 200];
        let mut output = vec![0.0f32; 800];
        interp.process_channel(&input, &mut output, 0, 1);
        // After the filter warms up the DC level must be preserved
        for &v in &output[400..] {
            assert!((v - 1.0).abs() < 0.05, "dc drifted: {v}");
        }
    }

    #[test]
    fn test_decimator_length_law() {
        let mut dec = Decimator::new(2, 51).unwrap();
        dec.ensure_channels(1);
        let input = vec![0.0f32; 1024];
        let mut output = Vec::new();
        let frames = dec.process(&input, &mut output, 1);
        assert_eq!(frames, 512);
        assert_eq!(output.len(), 512);
    }

    #[test]
    fn test_decimator_preserves_dc() {
        let mut dec = Decimator::new(4, 51).unwrap();
        dec.ensure_channels(1);
        let input = vec![2.0f32; 400];
        let mut output = Vec::new();
        dec.process(&input, &mut output, 1);
        for &v in &output[30..] {
            assert!((v - 2.0).abs() < 0.05, "dc drifted: {v}");
        }
    }

    #[test]
    fn test_decimator_phase_persists_across_blocks() {
        let mut dec = Decimator::new(3, 11).unwrap();
        dec.ensure_channels(1);
        let mut out_a = Vec::new();
        // 4 frames then 5 frames: 9 total, 3 outputs regardless of split
        dec.process(&vec![0.0f32; 4], &mut out_a, 1);
        dec.process(&vec![0.0f32; 5], &mut out_a, 1);
        assert_eq!(out_a.len(), 3);
    }

    #[test]
    fn test_resampler_length_law() {
        let mut rs = RationalResampler::new(3, 2, 51).unwrap();
        rs.ensure_channels(1);
        let input = vec![1.0f32; 200];
        let mut output = vec![0.0f32; 400];
        let frames = rs.process_channel(&input, &mut output, 0, 1);
        let expected = (input.len() * 3) / 2;
        assert!((frames as isize - expected as isize).abs() <= 1);
    }

    #[test]
    fn test_resampler_reduces_by_gcd() {
        let rs = RationalResampler::new(4, 2, 51).unwrap();
        assert_eq!(rs.up(), 2);
        assert_eq!(rs.down(), 1);
    }

    #[test]
    fn test_resampler_preserves_dc() {
        let mut rs = RationalResampler::new(2, 3, 51).unwrap();
        rs.ensure_channels(1);
        let input = vec![1.0f32; 300];
        let mut output = vec![0.0f32; 220];
        let frames = rs.process_channel(&input, &mut output, 0, 1);
        assert!(frames > 150);
        for &v in &output[80..frames] {
            assert!((v - 1.0).abs() < 0.05, "dc drifted: {v}");
        }
    }

    #[test]
    fn test_multichannel_independence() {
        let mut dec = Decimator::new(2, 11).unwrap();
        dec.ensure_channels(2);
        // ch0 = 1.0, ch1 = -1.0 interleaved
        let input: Vec<f32> = (0..200).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let mut output = Vec::new();
        dec.process(&input, &mut output, 2);
        let tail = &output[output.len() - 20..];
        for frame in tail.chunks(2) {
            assert!((frame[0] - 1.0).abs() < 0.05);
            assert!((frame[1] + 1.0).abs() < 0.05);
        }
    }

    #[test]
    fn test_invalid_params() {
        assert!(Interpolator::new(1, 51).is_err());
        assert!(Interpolator::new(2, 50).is_err());
        assert!(Decimator::new(0, 51).is_err());
        assert!(RationalResampler::new(0, 2, 51).is_err());
        assert!(RationalResampler::new(2, 3, 2).is_err());
    }
}
