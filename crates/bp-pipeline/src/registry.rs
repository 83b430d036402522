//! Stage registry
//!
//! Name -> factory mapping for every recognised stage. Factories validate
//! their parameters and return a constructed stage or `InvalidParams`;
//! unknown names surface as `UnknownStage`.

use crate::params::StageParams;
use crate::stage::Stage;
use crate::stages::*;
use bp_core::{DspError, DspResult, Sample};
use bp_dsp::convolution::ConvMethod;
use bp_dsp::regression::RegressionOutput;
use bp_dsp::wavelet::WaveletKind;
use bp_dsp::window_stats::StatKind;
use bp_dsp::windows::WindowKind;
use std::collections::HashMap;

pub type StageFactory = Box<dyn Fn(&StageParams) -> DspResult<Box<dyn Stage>> + Send + Sync>;

pub struct StageRegistry {
    factories: HashMap<&'static str, StageFactory>,
}

impl StageRegistry {
    /// Registry with every built-in stage.
    pub fn with_builtin_stages() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.install_builtins();
        registry
    }

    pub fn register(&mut self, name: &'static str, factory: StageFactory) {
        self.factories.insert(name, factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn create(&self, name: &str, params: &StageParams) -> DspResult<Box<dyn Stage>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| DspError::UnknownStage(name.to_owned()))?;
        factory(params)
    }

    fn install_builtins(&mut self) {
        self.register_window_stat("movingAverage", StatKind::Mean);
        self.register_window_stat("rms", StatKind::Rms);
        self.register_window_stat("variance", StatKind::Variance);
        self.register_window_stat("zScoreNormalize", StatKind::ZScore);
        self.register_window_stat("meanAbsoluteValue", StatKind::Mav);

        self.register("rectify", Box::new(|params| {
            let mode = match params.str_or("mode", "full")?.as_str() {
                "half" => leaves::RectifyMode::HalfWave,
                _ => leaves::RectifyMode::FullWave,
            };
            Ok(Box::new(RectifyStage::new(mode)) as Box<dyn Stage>)
        }));

        self.register("square", Box::new(|_params| {
            Ok(Box::new(SquareStage) as Box<dyn Stage>)
        }));

        self.register("differentiator", Box::new(|_params| {
            Ok(Box::new(DifferentiatorStage::new()) as Box<dyn Stage>)
        }));

        self.register("integrator", Box::new(|params| {
            let alpha = params.f32_or("alpha", 0.99)?;
            Ok(Box::new(IntegratorStage::new(alpha)?) as Box<dyn Stage>)
        }));

        self.register("peakDetection", Box::new(|params| {
            let threshold = params.f32_or("threshold", 0.0)?;
            Ok(Box::new(PeakDetectionStage::new(threshold)?) as Box<dyn Stage>)
        }));

        self.register("clipDetection", Box::new(|params| {
            let threshold = params.f32_or("threshold", 1.0)?;
            Ok(Box::new(ClipDetectionStage::new(threshold)?) as Box<dyn Stage>)
        }));

        self.register("waveformLength", Box::new(|params| {
            let window_size = params.require_usize("windowSize")?;
            Ok(Box::new(WaveformLengthStage::new(window_size)?) as Box<dyn Stage>)
        }));

        self.register("slopeSignChange", Box::new(|params| {
            let window_size = params.require_usize("windowSize")?;
            let threshold = params.f32_or("threshold", 0.0)?;
            Ok(Box::new(SscStage::new(window_size, threshold)?) as Box<dyn Stage>)
        }));

        self.register("willisonAmplitude", Box::new(|params| {
            let window_size = params.require_usize("windowSize")?;
            let threshold = params.f32_or("threshold", 0.0)?;
            Ok(Box::new(WampStage::new(window_size, threshold)?) as Box<dyn Stage>)
        }));

        self.register("filter", Box::new(|params| {
            let b: Vec<f64> = params
                .require_f32_array("bCoeffs")?
                .iter()
                .map(|&v| v as f64)
                .collect();
            let a: Vec<f64> = params
                .require_f32_array("aCoeffs")?
                .iter()
                .map(|&v| v as f64)
                .collect();
            Ok(Box::new(FilterStage::new(&b, &a)?) as Box<dyn Stage>)
        }));

        self.register("filterBank", Box::new(|params| {
            let definitions = params.require_coeff_pairs("definitions")?.to_vec();
            let num_input_channels = params.require_usize("numInputChannels")?;
            Ok(Box::new(FilterBankStage::new(definitions, num_input_channels)?) as Box<dyn Stage>)
        }));

        self.register("interpolate", Box::new(|params| {
            let factor = params.require_usize("factor")?;
            let sample_rate = params.require_f64("sampleRate")?;
            let order = params.usize_or("order", 51)?;
            Ok(Box::new(InterpolatorStage::new(factor, order, sample_rate)?) as Box<dyn Stage>)
        }));

        self.register("decimate", Box::new(|params| {
            let factor = params.require_usize("factor")?;
            let sample_rate = params.require_f64("sampleRate")?;
            let order = params.usize_or("order", 51)?;
            Ok(Box::new(DecimatorStage::new(factor, order, sample_rate)?) as Box<dyn Stage>)
        }));

        self.register("resample", Box::new(|params| {
            let up = params.require_usize("upFactor")?;
            let down = params.require_usize("downFactor")?;
            let sample_rate = params.require_f64("sampleRate")?;
            let order = params.usize_or("order", 51)?;
            Ok(Box::new(ResamplerStage::new(up, down, order, sample_rate)?) as Box<dyn Stage>)
        }));

        self.register("timeAlignment", Box::new(|params| {
            let target_rate = params.require_f32("targetSampleRate")?;
            let interp =
                time_align::InterpMethod::parse(&params.str_or("interpMethod", "linear")?)?;
            let gap_policy =
                time_align::GapPolicy::parse(&params.str_or("gapPolicy", "interpolate")?)?;
            let gap_threshold = params.f32_or("gapThreshold", 2.0)?;
            let drift =
                time_align::DriftCompensation::parse(&params.str_or("driftComp", "none")?)?;
            Ok(Box::new(TimeAlignmentStage::new(
                target_rate,
                interp,
                gap_policy,
                gap_threshold,
                drift,
            )?) as Box<dyn Stage>)
        }));

        self.register("convolution", Box::new(|params| {
            let kernel: Vec<Sample> = params.require_f32_array("kernel")?.to_vec();
            let mode = convolution::ConvMode::parse(&params.str_or("mode", "moving")?);
            let method = ConvMethod::parse(&params.str_or("method", "auto")?)?;
            let auto_threshold = params.usize_or("autoThreshold", 64)?;
            Ok(Box::new(ConvolutionStage::new(kernel, mode, method, auto_threshold)?)
                as Box<dyn Stage>)
        }));

        self.register_regression("linearRegressionSlope", RegressionOutput::Slope);
        self.register_regression("linearRegressionIntercept", RegressionOutput::Intercept);
        self.register_regression("linearRegressionResiduals", RegressionOutput::Residuals);
        self.register_regression("linearRegressionPredictions", RegressionOutput::Predictions);

        self.register("lmsFilter", Box::new(|params| {
            let num_taps = params.require_usize("numTaps")?;
            // Both spellings are accepted
            let learning_rate = match params.opt_f64("learningRate")? {
                Some(v) => v as Sample,
                None => params.f32_or("mu", 0.01)?,
            };
            let normalized = params.bool_or("normalized", false)?;
            let leak = params.f32_or("lambda", 0.0)?;
            Ok(Box::new(LmsStage::new(num_taps, learning_rate, normalized, leak)?)
                as Box<dyn Stage>)
        }));

        self.register("rlsFilter", Box::new(|params| {
            let num_taps = params.require_usize("numTaps")?;
            let lambda = params.require_f32("lambda")?;
            let delta = params.f32_or("delta", 0.01)?;
            Ok(Box::new(RlsStage::new(num_taps, lambda, delta)?) as Box<dyn Stage>)
        }));

        self.register("waveletTransform", Box::new(|params| {
            let kind = WaveletKind::parse(params.require_str("wavelet")?)?;
            Ok(Box::new(WaveletTransformStage::new(kind)) as Box<dyn Stage>)
        }));

        self.register("hilbertEnvelope", Box::new(|params| {
            let window_size = params.require_usize("windowSize")?;
            let hop_size = params.usize_or("hopSize", 0)?;
            Ok(Box::new(HilbertEnvelopeStage::new(window_size, hop_size)?) as Box<dyn Stage>)
        }));

        self.register("stft", Box::new(|params| {
            let window_size = params.require_usize("windowSize")?;
            let hop_size = params.usize_or("hopSize", 0)?;
            let method = spectral::TransformMethod::parse(&params.str_or("method", "fft")?)?;
            let real_input = match params.str_or("type", "real")?.as_str() {
                "real" => true,
                "complex" => false,
                other => {
                    return Err(DspError::InvalidParams(format!(
                        "stft: type must be 'real' or 'complex', got '{other}'"
                    )));
                }
            };
            let forward = params.bool_or("forward", true)?;
            let output = spectral::SpectralOutput::parse(&params.str_or("output", "complex")?)?;
            let window = WindowKind::parse(&params.str_or("window", "hann")?)?;
            Ok(Box::new(StftStage::new(
                window_size,
                hop_size,
                method,
                real_input,
                forward,
                output,
                window,
            )?) as Box<dyn Stage>)
        }));

        self.register("fft", Box::new(|params| {
            let size = params.require_usize("size")?;
            let real_input = match params.str_or("type", "real")?.as_str() {
                "real" => true,
                "complex" => false,
                other => {
                    return Err(DspError::InvalidParams(format!(
                        "fft: type must be 'real' or 'complex', got '{other}'"
                    )));
                }
            };
            let forward = params.bool_or("forward", true)?;
            let output = spectral::SpectralOutput::parse(&params.str_or("output", "complex")?)?;
            Ok(Box::new(FftStage::new(size, real_input, forward, output)?) as Box<dyn Stage>)
        }));

        self.register("melSpectrogram", Box::new(|params| {
            let filterbank: Vec<Sample> = params.require_f32_array("filterbank")?.to_vec();
            let num_bins = params.require_usize("numBins")?;
            let num_mel_bands = params.require_usize("numMelBands")?;
            Ok(Box::new(MelSpectrogramStage::new(filterbank, num_bins, num_mel_bands)?)
                as Box<dyn Stage>)
        }));

        self.register("channelSelect", Box::new(|params| {
            let channels: Vec<usize> = params
                .require_int_array("channels")?
                .iter()
                .map(|&v| {
                    if v < 0 {
                        Err(DspError::InvalidParams(
                            "channelSelect: channel indices must be non-negative".into(),
                        ))
                    } else {
                        Ok(v as usize)
                    }
                })
                .collect::<DspResult<_>>()?;
            let num_input_channels = params.require_usize("numInputChannels")?;
            Ok(Box::new(ChannelSelectStage::new(channels, num_input_channels)?) as Box<dyn Stage>)
        }));

        self.register("channelMerge", Box::new(|params| {
            let mapping: Vec<usize> = params
                .require_int_array("mapping")?
                .iter()
                .map(|&v| {
                    if v < 0 {
                        Err(DspError::InvalidParams(
                            "channelMerge: mapping indices must be non-negative".into(),
                        ))
                    } else {
                        Ok(v as usize)
                    }
                })
                .collect::<DspResult<_>>()?;
            let num_input_channels = params.require_usize("numInputChannels")?;
            Ok(Box::new(ChannelMergeStage::new(mapping, num_input_channels)?) as Box<dyn Stage>)
        }));

        self.register("matrixTransform", Box::new(|params| {
            let matrix: Vec<Sample> = params.require_f32_array("matrix")?.to_vec();
            let mean: Vec<Sample> = params.require_f32_array("mean")?.to_vec();
            let num_channels = params.require_usize("numChannels")?;
            let num_components = params.require_usize("numComponents")?;
            Ok(Box::new(MatrixTransformStage::new(
                matrix,
                mean,
                num_channels,
                num_components,
            )?) as Box<dyn Stage>)
        }));

        self.register("gscPreprocessor", Box::new(|params| {
            let steering: Vec<Sample> = params.require_f32_array("steeringWeights")?.to_vec();
            let blocking: Vec<Sample> = params.require_f32_array("blockingMatrix")?.to_vec();
            let num_channels = params.require_usize("numChannels")?;
            Ok(Box::new(GscPreprocessorStage::new(steering, blocking, num_channels)?)
                as Box<dyn Stage>)
        }));
    }

    fn register_window_stat(&mut self, name: &'static str, kind: StatKind) {
        self.register(name, Box::new(move |params| {
            let mode = StatMode::parse(&params.str_or("mode", "batch")?);

            let mut window_size = 0usize;
            let mut window_duration = 0.0f64;
            if mode == StatMode::Moving {
                if params.has("windowSize") {
                    window_size = params.require_usize("windowSize")?;
                } else if params.has("windowDuration") {
                    window_duration = params.require_f64("windowDuration")?;
                } else {
                    return Err(DspError::InvalidParams(format!(
                        "{name}: either 'windowSize' or 'windowDuration' is required for 'moving' mode"
                    )));
                }
            }

            let epsilon = params.f32_or("epsilon", 1e-6)?;
            Ok(Box::new(WindowStatStage::new(
                kind,
                name,
                mode,
                window_size,
                window_duration,
                epsilon,
            )?) as Box<dyn Stage>)
        }));
    }

    fn register_regression(&mut self, name: &'static str, output: RegressionOutput) {
        self.register(name, Box::new(move |params| {
            let window_size = params.require_usize("windowSize")?;
            Ok(Box::new(RegressionStage::new(output, window_size)?) as Box<dyn Stage>)
        }));
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::with_builtin_stages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_stage() {
        let registry = StageRegistry::with_builtin_stages();
        let err = registry.create("notAStage", &StageParams::new());
        assert!(matches!(err, Err(DspError::UnknownStage(_))));
    }

    #[test]
    fn test_all_documented_names_present() {
        let registry = StageRegistry::with_builtin_stages();
        for name in [
            "movingAverage",
            "rms",
            "variance",
            "zScoreNormalize",
            "meanAbsoluteValue",
            "rectify",
            "square",
            "differentiator",
            "integrator",
            "peakDetection",
            "clipDetection",
            "waveformLength",
            "slopeSignChange",
            "willisonAmplitude",
            "filter",
            "filterBank",
            "interpolate",
            "decimate",
            "resample",
            "timeAlignment",
            "convolution",
            "linearRegressionSlope",
            "linearRegressionIntercept",
            "linearRegressionResiduals",
            "linearRegressionPredictions",
            "lmsFilter",
            "rlsFilter",
            "waveletTransform",
            "hilbertEnvelope",
            "stft",
            "fft",
            "melSpectrogram",
            "channelSelect",
            "channelMerge",
            "matrixTransform",
            "gscPreprocessor",
        ] {
            assert!(registry.contains(name), "missing stage {name}");
        }
    }

    #[test]
    fn test_validation_error_surfaces_as_invalid_params() {
        let registry = StageRegistry::with_builtin_stages();
        // Missing required windowSize
        let err = registry.create("waveformLength", &StageParams::new());
        assert!(matches!(err, Err(DspError::InvalidParams(_))));

        // Bad factor value
        let params = StageParams::new()
            .with("factor", 1usize)
            .with("sampleRate", 1000.0f64);
        let err = registry.create("decimate", &params);
        assert!(matches!(err, Err(DspError::InvalidParams(_))));
    }

    #[test]
    fn test_moving_average_construction() {
        let registry = StageRegistry::with_builtin_stages();
        let params = StageParams::new().with("mode", "moving").with("windowSize", 5usize);
        let stage = registry.create("movingAverage", &params).unwrap();
        assert_eq!(stage.type_name(), "movingAverage");
    }

    #[test]
    fn test_lms_accepts_mu_spelling() {
        let registry = StageRegistry::with_builtin_stages();
        let params = StageParams::new().with("numTaps", 4usize).with("mu", 0.05f64);
        assert!(registry.create("lmsFilter", &params).is_ok());
    }
}
