use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_yaml::Value;

use crate::error::EvalError;
use crate::model::decoder::DecoderConfig;
use crate::model::encoder::EncoderConfig;
use crate::model::feature_transform::FeatureTransformConfig;
use crate::model::filter::FilterConfig;
use crate::model::oscillator::OscillatorConfig;

/// A `{class_path, init_args}` component declaration. Only the last
/// `.`-separated segment of `class_path` selects the implementation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComponentSpec {
    pub class_path: String,
    #[serde(default)]
    pub init_args: Value,
}

impl ComponentSpec {
    pub fn kind(&self) -> &str {
        self.class_path
            .rsplit('.')
            .next()
            .unwrap_or(self.class_path.as_str())
    }

    /// Sets `key` in `init_args`, replacing any value already there.
    pub fn inject(&mut self, key: &str, value: impl Into<Value>) -> Result<(), EvalError> {
        if self.init_args.is_null() {
            self.init_args = Value::Mapping(Default::default());
        }
        let Value::Mapping(args) = &mut self.init_args else {
            return Err(EvalError::configuration(format!(
                "init_args of '{}' must be a mapping",
                self.class_path
            )));
        };
        args.insert(Value::from(key), value.into());
        Ok(())
    }
}

type Constructor<T> = fn(&Value) -> Result<T, EvalError>;

/// Maps component kinds to typed constructors for one component category.
pub struct Registry<T> {
    category: &'static str,
    constructors: BTreeMap<&'static str, Constructor<T>>,
}

impl<T> Registry<T> {
    pub fn new(category: &'static str) -> Self {
        Self {
            category,
            constructors: BTreeMap::new(),
        }
    }

    pub fn register(mut self, kind: &'static str, constructor: Constructor<T>) -> Self {
        self.constructors.insert(kind, constructor);
        self
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }

    pub fn resolve(&self, spec: &ComponentSpec) -> Result<T, EvalError> {
        let kind = spec.kind();
        let constructor = self.constructors.get(kind).ok_or_else(|| {
            EvalError::configuration(format!(
                "unknown {} '{}', expected one of: {}",
                self.category,
                spec.class_path,
                self.kinds().collect::<Vec<_>>().join(", ")
            ))
        })?;
        constructor(&spec.init_args).map_err(|err| match err {
            EvalError::Configuration { message } => EvalError::configuration(format!(
                "{} '{}': {message}",
                self.category, spec.class_path
            )),
            other => other,
        })
    }
}

fn parse_args<A: DeserializeOwned>(args: &Value) -> Result<A, EvalError> {
    let args = if args.is_null() {
        Value::Mapping(Default::default())
    } else {
        args.clone()
    };
    serde_yaml::from_value(args).map_err(|e| EvalError::configuration(e.to_string()))
}

pub fn feature_transform_registry() -> Registry<FeatureTransformConfig> {
    Registry::new("feature transform")
        .register("LogMelSpectrogram", |args| {
            Ok(FeatureTransformConfig::LogMel(parse_args(args)?))
        })
        .register("MelSpectrogram", |args| {
            Ok(FeatureTransformConfig::LogMel(parse_args(args)?))
        })
        .register("LogSpectrogram", |args| {
            Ok(FeatureTransformConfig::LogSpectrogram(parse_args(args)?))
        })
}

pub fn encoder_registry() -> Registry<EncoderConfig> {
    Registry::new("encoder").register("MlpEncoder", |args| {
        Ok(EncoderConfig::Mlp(parse_args(args)?))
    })
}

pub fn oscillator_registry() -> Registry<OscillatorConfig> {
    Registry::new("oscillator")
        .register("HarmonicOscillator", |args| {
            Ok(OscillatorConfig::Harmonic(parse_args(args)?))
        })
        .register("SawtoothOscillator", |args| {
            Ok(OscillatorConfig::Sawtooth(parse_args(args)?))
        })
        .register("WhiteNoiseGenerator", |args| {
            Ok(OscillatorConfig::WhiteNoise(parse_args(args)?))
        })
}

pub fn filter_registry() -> Registry<FilterConfig> {
    Registry::new("filter")
        .register("LowpassFilter", |args| {
            Ok(FilterConfig::Lowpass(parse_args(args)?))
        })
        .register("DcBlocker", |args| {
            Ok(FilterConfig::DcBlocker(parse_args(args)?))
        })
        .register("GainFilter", |args| Ok(FilterConfig::Gain(parse_args(args)?)))
}

#[derive(Debug, Deserialize)]
struct DecoderArgs {
    harm_oscillator: ComponentSpec,
    noise_generator: ComponentSpec,
    #[serde(default)]
    harm_filter: Option<ComponentSpec>,
    #[serde(default)]
    noise_filter: Option<ComponentSpec>,
    #[serde(default)]
    end_filter: Option<ComponentSpec>,
}

pub fn decoder_registry() -> Registry<DecoderConfig> {
    Registry::new("decoder").register("HarmonicNoiseDecoder", build_decoder_config)
}

fn build_decoder_config(args: &Value) -> Result<DecoderConfig, EvalError> {
    let args: DecoderArgs = parse_args(args)?;
    let oscillators = oscillator_registry();
    let filters = filter_registry();
    let resolve_filter = |spec: &Option<ComponentSpec>| {
        spec.as_ref().map(|spec| filters.resolve(spec)).transpose()
    };
    Ok(DecoderConfig {
        harm_oscillator: oscillators.resolve(&args.harm_oscillator)?,
        noise_generator: oscillators.resolve(&args.noise_generator)?,
        harm_filter: resolve_filter(&args.harm_filter)?,
        noise_filter: resolve_filter(&args.noise_filter)?,
        end_filter: resolve_filter(&args.end_filter)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::oscillator::HarmonicArgs;

    fn spec(yaml: &str) -> ComponentSpec {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn kind_is_last_class_path_segment() {
        let s = spec("class_path: vocoder.synth.HarmonicOscillator");
        assert_eq!(s.kind(), "HarmonicOscillator");
        assert_eq!(spec("class_path: GainFilter").kind(), "GainFilter");
    }

    #[test]
    fn resolves_with_defaults_when_args_missing() {
        let cfg = oscillator_registry()
            .resolve(&spec("class_path: model.HarmonicOscillator"))
            .unwrap();
        assert_eq!(cfg, OscillatorConfig::Harmonic(HarmonicArgs { num_harmonics: 64 }));
    }

    #[test]
    fn unknown_kind_lists_known_ones() {
        let err = filter_registry()
            .resolve(&spec("class_path: x.CombFilter"))
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("CombFilter"));
        assert!(message.contains("LowpassFilter"));
    }

    #[test]
    fn bad_args_are_configuration_errors() {
        let err = filter_registry()
            .resolve(&spec("class_path: LowpassFilter\ninit_args:\n  cutoff_hz: fast\n"))
            .unwrap_err();
        assert!(matches!(err, EvalError::Configuration { .. }));
    }

    #[test]
    fn inject_overrides_existing_args() {
        let mut s = spec("class_path: LogMelSpectrogram\ninit_args:\n  n_mels: 64\n  hop_length: 1\n");
        s.inject("hop_length", 256u64).unwrap();
        s.inject("sample_rate", 16_000u64).unwrap();
        let cfg = feature_transform_registry().resolve(&s).unwrap();
        let FeatureTransformConfig::LogMel(mel) = cfg else {
            panic!("expected mel config");
        };
        assert_eq!(mel.hop_length, 256);
        assert_eq!(mel.sample_rate, 16_000);
        assert_eq!(mel.n_mels, 64);
    }

    #[test]
    fn decoder_resolves_nested_components() {
        let yaml = r#"
class_path: ddsp.HarmonicNoiseDecoder
init_args:
  harm_oscillator:
    class_path: ddsp.SawtoothOscillator
    init_args:
      num_harmonics: 16
  noise_generator:
    class_path: ddsp.WhiteNoiseGenerator
  end_filter:
    class_path: ddsp.DcBlocker
"#;
        let cfg = decoder_registry().resolve(&spec(yaml)).unwrap();
        assert_eq!(
            cfg.harm_oscillator,
            OscillatorConfig::Sawtooth(HarmonicArgs { num_harmonics: 16 })
        );
        assert!(cfg.harm_filter.is_none());
        assert!(matches!(cfg.end_filter, Some(FilterConfig::DcBlocker(_))));
    }
}
