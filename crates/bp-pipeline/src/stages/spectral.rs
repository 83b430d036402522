//! Sliding-window spectral stages
//!
//! stft and hilbertEnvelope share the scaffold: a circular buffer per
//! channel plus a samples-since-output counter; when the window is full
//! and the counter reaches the hop, a transform fires. fft is a stateless
//! block transform over stacked frames, melSpectrogram a filterbank
//! matrix product over stacked power spectra.

use crate::stage::Stage;
use bp_core::{CircularBuffer, Complex32, DspError, DspResult, Sample, toon};
use bp_dsp::windows::{WindowKind, window_table};
use bp_fft::{FftEngine, spectrum_magnitude, spectrum_phase, spectrum_power};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectralOutput {
    Complex,
    Magnitude,
    Power,
    Phase,
}

impl SpectralOutput {
    pub fn parse(name: &str) -> DspResult<Self> {
        Ok(match name {
            "complex" => SpectralOutput::Complex,
            "magnitude" => SpectralOutput::Magnitude,
            "power" => SpectralOutput::Power,
            "phase" => SpectralOutput::Phase,
            other => {
                return Err(DspError::InvalidParams(format!(
                    "output must be 'complex', 'magnitude', 'power', or 'phase', got '{other}'"
                )));
            }
        })
    }

    /// Output elements per spectrum of `bins` complex bins.
    fn elements(self, bins: usize) -> usize {
        match self {
            SpectralOutput::Complex => bins * 2,
            _ => bins,
        }
    }

    fn emit(self, spectrum: &[Complex32], out: &mut Vec<Sample>) {
        match self {
            SpectralOutput::Complex => {
                for c in spectrum {
                    out.push(c.re);
                    out.push(c.im);
                }
            }
            SpectralOutput::Magnitude => {
                let mut scratch = vec![0.0; spectrum.len()];
                spectrum_magnitude(spectrum, &mut scratch);
                out.extend_from_slice(&scratch);
            }
            SpectralOutput::Power => {
                let mut scratch = vec![0.0; spectrum.len()];
                spectrum_power(spectrum, &mut scratch);
                out.extend_from_slice(&scratch);
            }
            SpectralOutput::Phase => {
                let mut scratch = vec![0.0; spectrum.len()];
                spectrum_phase(spectrum, &mut scratch);
                out.extend_from_slice(&scratch);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMethod {
    Fft,
    Dft,
}

impl TransformMethod {
    pub fn parse(name: &str) -> DspResult<Self> {
        Ok(match name {
            "fft" => TransformMethod::Fft,
            "dft" => TransformMethod::Dft,
            other => {
                return Err(DspError::InvalidParams(format!(
                    "method must be 'fft' or 'dft', got '{other}'"
                )));
            }
        })
    }
}

// ---------- STFT ----------

pub struct StftStage {
    window_size: usize,
    hop_size: usize,
    method: TransformMethod,
    real_input: bool,
    forward: bool,
    output: SpectralOutput,
    window_kind: WindowKind,

    engine: FftEngine,
    window_fn: Vec<Sample>,
    output_bins: usize,

    channel_buffers: Vec<CircularBuffer<Sample>>,
    samples_since_output: Vec<usize>,
}

impl StftStage {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        window_size: usize,
        hop_size: usize,
        method: TransformMethod,
        real_input: bool,
        forward: bool,
        output: SpectralOutput,
        window_kind: WindowKind,
    ) -> DspResult<Self> {
        if window_size == 0 {
            return Err(DspError::InvalidParams(
                "stft: window size must be greater than 0".into(),
            ));
        }
        let hop_size = if hop_size == 0 { window_size / 2 } else { hop_size };
        if hop_size == 0 || hop_size > window_size {
            return Err(DspError::InvalidParams(
                "stft: hop size must be between 1 and windowSize".into(),
            ));
        }

        let engine = FftEngine::new(window_size)?;
        if method == TransformMethod::Fft && !engine.is_power_of_two() {
            return Err(DspError::InvalidParams(
                "stft: FFT requires a power-of-2 window size; use DFT or adjust the window".into(),
            ));
        }

        let output_bins = if real_input && forward {
            engine.half_size()
        } else {
            window_size
        };

        Ok(Self {
            window_size,
            hop_size,
            method,
            real_input,
            forward,
            output,
            window_kind,
            window_fn: window_table(window_kind, window_size),
            engine,
            output_bins,
            channel_buffers: Vec::new(),
            samples_since_output: Vec::new(),
        })
    }

    fn compute_frame(&mut self, channel: usize, out: &mut Vec<Sample>) -> DspResult<()> {
        let mut windowed = self.channel_buffers[channel].to_padded_vec(self.window_size);
        for (v, w) in windowed.iter_mut().zip(&self.window_fn) {
            *v *= w;
        }

        let mut spectrum = vec![Complex32::new(0.0, 0.0); self.window_size.max(self.output_bins)];

        if self.real_input && self.forward {
            match self.method {
                TransformMethod::Fft => self.engine.rfft(&windowed, &mut spectrum),
                TransformMethod::Dft => self.engine.rdft(&windowed, &mut spectrum),
            }
            spectrum.truncate(self.output_bins);
        } else {
            let complex_in: Vec<Complex32> =
                windowed.iter().map(|&x| Complex32::new(x, 0.0)).collect();
            match (self.method, self.forward) {
                (TransformMethod::Fft, true) => self.engine.fft(&complex_in, &mut spectrum)?,
                (TransformMethod::Fft, false) => self.engine.ifft(&complex_in, &mut spectrum)?,
                (TransformMethod::Dft, true) => self.engine.dft(&complex_in, &mut spectrum),
                (TransformMethod::Dft, false) => self.engine.idft(&complex_in, &mut spectrum),
            }
            spectrum.truncate(self.output_bins);
        }

        self.output.emit(&spectrum, out);
        Ok(())
    }
}

impl Stage for StftStage {
    fn type_name(&self) -> &str {
        "stft"
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        if self.channel_buffers.len() != channels {
            self.channel_buffers = (0..channels)
                .map(|_| CircularBuffer::new(self.window_size))
                .collect();
            self.samples_since_output = vec![0; channels];
        }

        let mut emitted: Vec<Sample> = Vec::new();
        for i in 0..buffer.len() {
            let channel = i % channels;
            self.channel_buffers[channel].push_overwrite(buffer[i]);
            self.samples_since_output[channel] += 1;

            if self.channel_buffers[channel].len() >= self.window_size
                && self.samples_since_output[channel] >= self.hop_size
            {
                self.compute_frame(channel, &mut emitted)?;
                self.samples_since_output[channel] = 0;
            }
        }

        // Frames stream back into the block; the remainder is zero-padded
        let n = emitted.len().min(buffer.len());
        buffer[..n].copy_from_slice(&emitted[..n]);
        for v in buffer[n..].iter_mut() {
            *v = 0.0;
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.window_size as i32);
        s.write_i32(self.hop_size as i32);
        s.write_str(self.window_kind.name());
        s.write_i32(self.channel_buffers.len() as i32);
        for (buffer, &counter) in self.channel_buffers.iter().zip(&self.samples_since_output) {
            s.write_f32_array(&buffer.to_vec());
            s.write_i32(counter as i32);
        }
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let window_size = d.read_i32() as usize;
        let hop_size = d.read_i32() as usize;
        let window_name = d.read_string();
        let channels = d.read_i32();
        d.require_ok()?;
        if window_size != self.window_size || hop_size != self.hop_size {
            return Err(DspError::StateShapeMismatch(
                "stft window/hop mismatch on restore".into(),
            ));
        }
        if window_name != self.window_kind.name() {
            return Err(DspError::StateShapeMismatch(format!(
                "stft window function '{window_name}' does not match '{}'",
                self.window_kind.name()
            )));
        }

        let mut buffers = Vec::new();
        let mut counters = Vec::new();
        for _ in 0..channels.max(0) {
            let data = d.read_f32_array();
            let counter = d.read_i32();
            d.require_ok()?;
            if data.len() > window_size {
                return Err(DspError::StateCorrupt("stft buffer too long".into()));
            }
            let mut ring = CircularBuffer::new(window_size);
            ring.from_slice(&data);
            buffers.push(ring);
            counters.push(counter.max(0) as usize);
        }
        self.channel_buffers = buffers;
        self.samples_since_output = counters;
        Ok(())
    }

    fn reset(&mut self) {
        for buffer in &mut self.channel_buffers {
            buffer.clear();
        }
        self.samples_since_output.fill(0);
    }
}

// ---------- Block FFT ----------

/// Stateless block transform: the incoming block is treated as stacked
/// frames per channel and each frame is transformed independently.
pub struct FftStage {
    size: usize,
    real_input: bool,
    forward: bool,
    output: SpectralOutput,
    engine: FftEngine,
}

impl FftStage {
    pub fn new(
        size: usize,
        real_input: bool,
        forward: bool,
        output: SpectralOutput,
    ) -> DspResult<Self> {
        if size == 0 {
            return Err(DspError::InvalidParams("fft: size must be > 0".into()));
        }
        Ok(Self {
            size,
            real_input,
            forward,
            output,
            engine: FftEngine::new(size)?,
        })
    }

    /// Elements per frame on the input side.
    fn input_frame_len(&self) -> usize {
        if self.real_input {
            if self.forward {
                self.size
            } else {
                // Inverse real input is a packed half spectrum
                self.engine.half_size() * 2
            }
        } else {
            self.size * 2
        }
    }

    /// Elements per frame on the output side.
    fn output_frame_len(&self) -> usize {
        if self.real_input {
            if self.forward {
                self.output.elements(self.engine.half_size())
            } else {
                self.size
            }
        } else {
            self.output.elements(self.size)
        }
    }

    fn transform_frame(&mut self, frame: &[Sample], out: &mut Vec<Sample>) -> DspResult<()> {
        if self.real_input && self.forward {
            let mut spectrum = vec![Complex32::new(0.0, 0.0); self.engine.half_size()];
            if self.engine.is_power_of_two() {
                self.engine.rfft(frame, &mut spectrum);
            } else {
                self.engine.rdft(frame, &mut spectrum);
            }
            self.output.emit(&spectrum, out);
        } else if self.real_input {
            // Inverse real: interleaved half-spectrum in, samples out
            let spectrum: Vec<Complex32> = frame
                .chunks_exact(2)
                .map(|c| Complex32::new(c[0], c[1]))
                .collect();
            let mut time = vec![0.0; self.size];
            if self.engine.is_power_of_two() {
                self.engine.irfft(&spectrum, &mut time);
            } else {
                self.engine.irdft(&spectrum, &mut time);
            }
            out.extend_from_slice(&time);
        } else {
            let input: Vec<Complex32> = frame
                .chunks_exact(2)
                .map(|c| Complex32::new(c[0], c[1]))
                .collect();
            let mut spectrum = vec![Complex32::new(0.0, 0.0); self.size];
            match (self.engine.is_power_of_two(), self.forward) {
                (true, true) => self.engine.fft(&input, &mut spectrum)?,
                (true, false) => self.engine.ifft(&input, &mut spectrum)?,
                (false, true) => self.engine.dft(&input, &mut spectrum),
                (false, false) => self.engine.idft(&input, &mut spectrum),
            }
            self.output.emit(&spectrum, out);
        }
        Ok(())
    }
}

impl Stage for FftStage {
    fn type_name(&self) -> &str {
        "fft"
    }

    fn is_resizing(&self) -> bool {
        true
    }

    fn calc_output_size(&self, input_len: usize) -> usize {
        (input_len / self.input_frame_len()) * self.output_frame_len()
    }

    fn process_resizing(
        &mut self,
        input: &[Sample],
        output: &mut Vec<Sample>,
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        let in_frame = self.input_frame_len();
        let frames_per_channel = input.len() / (in_frame * channels);

        // Per channel, de-interleave each stacked frame, transform, and
        // re-interleave the result
        let out_frame = self.output_frame_len();
        let mut deinterleaved = vec![0.0; in_frame];
        let mut transformed: Vec<Vec<Sample>> = vec![Vec::new(); channels];

        for ch in 0..channels {
            transformed[ch].clear();
            for f in 0..frames_per_channel {
                for i in 0..in_frame {
                    deinterleaved[i] = input[(f * in_frame + i) * channels + ch];
                }
                self.transform_frame(&deinterleaved, &mut transformed[ch])?;
            }
        }

        output.resize(frames_per_channel * out_frame * channels, 0.0);
        for ch in 0..channels {
            for (i, &v) in transformed[ch].iter().enumerate() {
                output[i * channels + ch] = v;
            }
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.size as i32);
        s.write_bool(self.real_input);
        s.write_bool(self.forward);
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let size = d.read_i32() as usize;
        let real_input = d.read_bool();
        let forward = d.read_bool();
        d.require_ok()?;
        if size != self.size || real_input != self.real_input || forward != self.forward {
            return Err(DspError::StateShapeMismatch(
                "fft configuration mismatch on restore".into(),
            ));
        }
        Ok(())
    }

    fn reset(&mut self) {}
}

// ---------- Hilbert envelope ----------

/// Instantaneous amplitude via the analytic signal. One envelope sample
/// is emitted per hop (the final window position); other samples pass
/// through while the window warms up.
pub struct HilbertEnvelopeStage {
    window_size: usize,
    hop_size: usize,
    engine: FftEngine,
    channel_buffers: Vec<CircularBuffer<Sample>>,
    samples_since_output: Vec<usize>,
}

impl HilbertEnvelopeStage {
    pub fn new(window_size: usize, hop_size: usize) -> DspResult<Self> {
        if window_size == 0 {
            return Err(DspError::InvalidParams(
                "hilbertEnvelope: window size must be greater than 0".into(),
            ));
        }
        if !window_size.is_power_of_two() {
            return Err(DspError::InvalidParams(
                "hilbertEnvelope: window size must be a power of 2".into(),
            ));
        }
        let hop_size = if hop_size == 0 { window_size / 2 } else { hop_size };
        if hop_size == 0 || hop_size > window_size {
            return Err(DspError::InvalidParams(
                "hilbertEnvelope: hop size must be between 1 and windowSize".into(),
            ));
        }

        Ok(Self {
            window_size,
            hop_size,
            engine: FftEngine::new(window_size)?,
            channel_buffers: Vec::new(),
            samples_since_output: Vec::new(),
        })
    }

    fn compute_envelope(&mut self, channel: usize) -> DspResult<Sample> {
        let window = self.channel_buffers[channel].to_padded_vec(self.window_size);
        let n = self.window_size;

        let input: Vec<Complex32> = window.iter().map(|&x| Complex32::new(x, 0.0)).collect();
        let mut spectrum = vec![Complex32::new(0.0, 0.0); n];
        self.engine.fft(&input, &mut spectrum)?;

        // Analytic signal: keep DC and Nyquist, double positives, zero
        // negatives
        for bin in spectrum[1..(n / 2).max(1)].iter_mut() {
            *bin *= 2.0;
        }
        for bin in spectrum[(n / 2 + 1).min(n)..].iter_mut() {
            *bin = Complex32::new(0.0, 0.0);
        }

        let mut analytic = vec![Complex32::new(0.0, 0.0); n];
        self.engine.ifft(&spectrum, &mut analytic)?;

        let last = analytic[n - 1];
        Ok((last.re * last.re + last.im * last.im).sqrt())
    }
}

impl Stage for HilbertEnvelopeStage {
    fn type_name(&self) -> &str {
        "hilbertEnvelope"
    }

    fn process_in_place(
        &mut self,
        buffer: &mut [Sample],
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        if self.channel_buffers.len() != channels {
            self.channel_buffers = (0..channels)
                .map(|_| CircularBuffer::new(self.window_size))
                .collect();
            self.samples_since_output = vec![0; channels];
        }

        for i in 0..buffer.len() {
            let channel = i % channels;
            self.channel_buffers[channel].push_overwrite(buffer[i]);
            self.samples_since_output[channel] += 1;

            if self.channel_buffers[channel].len() >= self.window_size
                && self.samples_since_output[channel] >= self.hop_size
            {
                buffer[i] = self.compute_envelope(channel)?;
                self.samples_since_output[channel] = 0;
            }
            // Otherwise the input sample passes through unchanged
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.window_size as i32);
        s.write_i32(self.hop_size as i32);
        s.write_i32(self.channel_buffers.len() as i32);
        for (buffer, &counter) in self.channel_buffers.iter().zip(&self.samples_since_output) {
            s.write_f32_array(&buffer.to_vec());
            s.write_i32(counter as i32);
        }
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let window_size = d.read_i32() as usize;
        let hop_size = d.read_i32() as usize;
        let channels = d.read_i32();
        d.require_ok()?;
        if window_size != self.window_size || hop_size != self.hop_size {
            return Err(DspError::StateShapeMismatch(
                "hilbertEnvelope window/hop mismatch on restore".into(),
            ));
        }

        let mut buffers = Vec::new();
        let mut counters = Vec::new();
        for _ in 0..channels.max(0) {
            let data = d.read_f32_array();
            let counter = d.read_i32();
            d.require_ok()?;
            let mut ring = CircularBuffer::new(window_size);
            ring.from_slice(&data);
            buffers.push(ring);
            counters.push(counter.max(0) as usize);
        }
        self.channel_buffers = buffers;
        self.samples_since_output = counters;
        Ok(())
    }

    fn reset(&mut self) {
        for buffer in &mut self.channel_buffers {
            buffer.clear();
        }
        self.samples_since_output.fill(0);
    }
}

// ---------- Mel spectrogram ----------

/// Filterbank projection of stacked power-spectrum frames:
/// mel = filterbank (M x K) x spectrum (K). Stateless.
pub struct MelSpectrogramStage {
    /// Row-major numMelBands x numBins
    filterbank: Vec<Sample>,
    num_bins: usize,
    num_mel_bands: usize,
}

impl MelSpectrogramStage {
    pub fn new(filterbank: Vec<Sample>, num_bins: usize, num_mel_bands: usize) -> DspResult<Self> {
        if num_bins == 0 {
            return Err(DspError::InvalidParams(
                "melSpectrogram: numBins must be greater than 0".into(),
            ));
        }
        if num_mel_bands == 0 {
            return Err(DspError::InvalidParams(
                "melSpectrogram: numMelBands must be greater than 0".into(),
            ));
        }
        if filterbank.len() != num_bins * num_mel_bands {
            return Err(DspError::ShapeMismatch(format!(
                "melSpectrogram: filterbank size {} must equal numMelBands x numBins = {}",
                filterbank.len(),
                num_bins * num_mel_bands
            )));
        }
        Ok(Self {
            filterbank,
            num_bins,
            num_mel_bands,
        })
    }
}

impl Stage for MelSpectrogramStage {
    fn type_name(&self) -> &str {
        "melSpectrogram"
    }

    fn is_resizing(&self) -> bool {
        true
    }

    fn calc_output_size(&self, input_len: usize) -> usize {
        (input_len / self.num_bins) * self.num_mel_bands
    }

    fn process_resizing(
        &mut self,
        input: &[Sample],
        output: &mut Vec<Sample>,
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        let frames = (input.len() / channels) / self.num_bins;
        if frames == 0 {
            return Err(DspError::ShapeMismatch(format!(
                "melSpectrogram: block of {} samples per channel is smaller than numBins {}",
                input.len() / channels,
                self.num_bins
            )));
        }

        output.resize(frames * self.num_mel_bands * channels, 0.0);
        for ch in 0..channels {
            for f in 0..frames {
                for band in 0..self.num_mel_bands {
                    let row = &self.filterbank[band * self.num_bins..(band + 1) * self.num_bins];
                    let mut acc = 0.0f32;
                    for (k, &w) in row.iter().enumerate() {
                        acc += w * input[(f * self.num_bins + k) * channels + ch];
                    }
                    output[(f * self.num_mel_bands + band) * channels + ch] = acc;
                }
            }
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.num_bins as i32);
        s.write_i32(self.num_mel_bands as i32);
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let bins = d.read_i32() as usize;
        let bands = d.read_i32() as usize;
        d.require_ok()?;
        if bins != self.num_bins || bands != self.num_mel_bands {
            return Err(DspError::StateShapeMismatch(
                "melSpectrogram shape mismatch on restore".into(),
            ));
        }
        Ok(())
    }

    fn reset(&mut self) {}
}
