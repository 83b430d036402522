//! Band-splitting filter bank stage
//!
//! N input channels fan out into N x M output channels, one bandpass per
//! band, channel-major: `[ch0_band0, ch0_band1, ..., ch1_band0, ...]`.

use crate::stage::Stage;
use bp_core::{DspError, DspResult, Sample, toon};
use bp_dsp::iir::DirectForm1;

pub struct FilterBankStage {
    /// (b, a-with-leading-a0) per band
    definitions: Vec<(Vec<f64>, Vec<f64>)>,
    num_input_channels: usize,
    /// filters[channel][band]
    filters: Vec<Vec<DirectForm1>>,
}

impl FilterBankStage {
    pub fn new(
        definitions: Vec<(Vec<f64>, Vec<f64>)>,
        num_input_channels: usize,
    ) -> DspResult<Self> {
        if definitions.is_empty() {
            return Err(DspError::InvalidParams(
                "filterBank: definitions cannot be empty".into(),
            ));
        }
        if num_input_channels == 0 {
            return Err(DspError::InvalidParams(
                "filterBank: numInputChannels must be > 0".into(),
            ));
        }
        for (b, a) in &definitions {
            if b.is_empty() || a.is_empty() {
                return Err(DspError::ShapeMismatch(
                    "filterBank: band coefficients cannot be empty".into(),
                ));
            }
        }

        let mut stage = Self {
            definitions,
            num_input_channels,
            filters: Vec::new(),
        };
        stage.build_filters()?;
        Ok(stage)
    }

    fn build_filters(&mut self) -> DspResult<()> {
        let mut filters = Vec::with_capacity(self.num_input_channels);
        for _ in 0..self.num_input_channels {
            let mut row = Vec::with_capacity(self.definitions.len());
            for (b, a) in &self.definitions {
                let a0 = a[0];
                let b_norm: Vec<f64> = b.iter().map(|v| v / a0).collect();
                let a_norm: Vec<f64> = a[1..].iter().map(|v| v / a0).collect();
                row.push(DirectForm1::new(&b_norm, &a_norm)?);
            }
            filters.push(row);
        }
        self.filters = filters;
        Ok(())
    }

    pub fn num_bands(&self) -> usize {
        self.definitions.len()
    }
}

impl Stage for FilterBankStage {
    fn type_name(&self) -> &str {
        "filterBank"
    }

    fn is_resizing(&self) -> bool {
        true
    }

    fn output_channels(&self) -> Option<usize> {
        Some(self.num_input_channels * self.definitions.len())
    }

    fn calc_output_size(&self, input_len: usize) -> usize {
        (input_len / self.num_input_channels)
            * self.num_input_channels
            * self.definitions.len()
    }

    fn process_resizing(
        &mut self,
        input: &[Sample],
        output: &mut Vec<Sample>,
        channels: usize,
        _timestamps: Option<&[Sample]>,
    ) -> DspResult<()> {
        if channels != self.num_input_channels {
            return Err(DspError::ShapeMismatch(format!(
                "filterBank configured for {} input channels, got {channels}",
                self.num_input_channels
            )));
        }

        let frames = input.len() / channels;
        let bands = self.definitions.len();

        output.resize(frames * channels * bands, 0.0);
        for i in 0..frames {
            for ch in 0..channels {
                let x = input[i * channels + ch];
                for (band, filter) in self.filters[ch].iter_mut().enumerate() {
                    output[i * channels * bands + ch * bands + band] = filter.process_sample(x);
                }
            }
        }
        Ok(())
    }

    fn serialize_state(&self, s: &mut toon::Serializer) {
        s.write_i32(self.definitions.len() as i32);
        s.write_i32(self.num_input_channels as i32);
        for row in &self.filters {
            for filter in row {
                let (x_state, y_state, x_index, y_index) = filter.state();
                s.write_f32_array(x_state);
                s.write_f32_array(y_state);
                s.write_i32(x_index as i32);
                s.write_i32(y_index as i32);
            }
        }
    }

    fn deserialize_state(&mut self, d: &mut toon::Deserializer<'_>) -> DspResult<()> {
        let bands = d.read_i32() as usize;
        let channels = d.read_i32() as usize;
        d.require_ok()?;
        if bands != self.definitions.len() || channels != self.num_input_channels {
            return Err(DspError::StateShapeMismatch(format!(
                "filterBank shape {channels}x{bands} does not match {}x{}",
                self.num_input_channels,
                self.definitions.len()
            )));
        }

        let mut fresh = Self::new(self.definitions.clone(), self.num_input_channels)?;
        for row in fresh.filters.iter_mut() {
            for filter in row.iter_mut() {
                let x_state = d.read_f32_array();
                let y_state = d.read_f32_array();
                let x_index = d.read_i32();
                let y_index = d.read_i32();
                d.require_ok()?;
                filter.set_state(
                    &x_state,
                    &y_state,
                    x_index.max(0) as usize,
                    y_index.max(0) as usize,
                )?;
            }
        }
        self.filters = fresh.filters;
        Ok(())
    }

    fn reset(&mut self) {
        for row in &mut self.filters {
            for filter in row {
                filter.reset();
            }
        }
    }
}
