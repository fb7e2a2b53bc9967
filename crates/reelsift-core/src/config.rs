//! Detection configuration types.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const WEIGHT_EPSILON: f64 = 1e-6;

/// Relative weight of each similarity dimension in the overall score.
///
/// Always sums to one; the only way to obtain a value is through a
/// validating constructor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWeights")]
pub struct SimilarityWeights {
    duration: f64,
    resolution: f64,
    file_size: f64,
    visual: f64,
}

#[derive(Deserialize)]
struct RawWeights {
    duration: f64,
    resolution: f64,
    file_size: f64,
    visual: f64,
}

impl TryFrom<RawWeights> for SimilarityWeights {
    type Error = ConfigError;

    fn try_from(raw: RawWeights) -> Result<Self, Self::Error> {
        Self::new(raw.duration, raw.resolution, raw.file_size, raw.visual)
    }
}

impl SimilarityWeights {
    /// Weights used unless configured otherwise.
    pub const DEFAULT: SimilarityWeights = SimilarityWeights {
        duration: 0.2,
        resolution: 0.15,
        file_size: 0.15,
        visual: 0.5,
    };

    /// Create validated weights.
    pub fn new(
        duration: f64,
        resolution: f64,
        file_size: f64,
        visual: f64,
    ) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("duration", duration),
            ("resolution", resolution),
            ("file_size", file_size),
            ("visual", visual),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }

        let sum = duration + resolution + file_size + visual;
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(ConfigError::WeightsSum { sum });
        }

        Ok(Self {
            duration,
            resolution,
            file_size,
            visual,
        })
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn file_size(&self) -> f64 {
        self.file_size
    }

    pub fn visual(&self) -> f64 {
        self.visual
    }

    /// Drop the dimensions switched off in `options` and rescale the rest so
    /// they still sum to one.
    pub fn restricted_to(&self, options: &SimilarityOptions) -> Result<Self, ConfigError> {
        let pick = |enabled: bool, weight: f64| if enabled { weight } else { 0.0 };

        let duration = pick(options.check_duration, self.duration);
        let resolution = pick(options.check_resolution, self.resolution);
        let file_size = pick(options.check_file_size, self.file_size);
        let visual = pick(options.check_visual, self.visual);

        let sum = duration + resolution + file_size + visual;
        if sum <= WEIGHT_EPSILON {
            return Err(ConfigError::NoDimensions);
        }

        Self::new(duration / sum, resolution / sum, file_size / sum, visual / sum)
    }
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Caller-supplied options for one similarity run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityOptions {
    /// Minimum overall score (inclusive) for a pair to be reported.
    pub threshold: f64,

    /// Compare durations.
    #[serde(default = "default_true")]
    pub check_duration: bool,

    /// Compare pixel counts.
    #[serde(default = "default_true")]
    pub check_resolution: bool,

    /// Compare file sizes.
    #[serde(default = "default_true")]
    pub check_file_size: bool,

    /// Compare perceptual fingerprints.
    #[serde(default = "default_true")]
    pub check_visual: bool,
}

fn default_true() -> bool {
    true
}

impl SimilarityOptions {
    /// Options with every dimension enabled.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            check_duration: true,
            check_resolution: true,
            check_file_size: true,
            check_visual: true,
        }
    }

    /// Validate the threshold and dimension toggles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::Threshold {
                value: self.threshold,
            });
        }
        let any_enabled = self.check_duration
            || self.check_resolution
            || self.check_file_size
            || self.check_visual;
        if !any_enabled {
            return Err(ConfigError::NoDimensions);
        }
        Ok(())
    }
}

impl Default for SimilarityOptions {
    fn default() -> Self {
        Self::new(0.8)
    }
}

/// Size of the frames requested from the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl Default for FrameSize {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
        }
    }
}

/// Tunables for the detection engine.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct DetectionConfig {
    /// Bytes per head/middle/tail window of the fast digest.
    #[builder(default = "64 * 1024")]
    pub chunk_size: usize,

    /// Frames sampled per video.
    #[builder(default = "5")]
    pub frame_count: usize,

    /// Raster the decoder scales frames to.
    #[builder(default)]
    pub frame_size: FrameSize,

    /// Maximum concurrent fingerprint extractions.
    #[builder(default = "2")]
    pub fingerprint_concurrency: usize,

    /// Fraction of the user threshold every metadata dimension must reach
    /// before a pair is fingerprinted.
    #[builder(default = "0.6")]
    pub prefilter_factor: f64,

    /// Relative duration difference still scored as identical.
    #[builder(default = "0.05")]
    pub duration_tolerance: f64,

    /// Relative size difference still scored as identical.
    #[builder(default = "0.10")]
    pub file_size_tolerance: f64,

    /// Dimension weights of the overall score.
    #[builder(default)]
    pub weights: SimilarityWeights,

    /// Maximum concurrent media probes during a library scan.
    #[builder(default = "4")]
    pub probe_concurrency: usize,
}

impl DetectionConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.chunk_size == Some(0) {
            return Err("chunk_size must be greater than zero".to_string());
        }
        if self.frame_count == Some(0) {
            return Err("frame_count must be greater than zero".to_string());
        }
        if self.fingerprint_concurrency == Some(0) {
            return Err("fingerprint_concurrency must be greater than zero".to_string());
        }
        if self.probe_concurrency == Some(0) {
            return Err("probe_concurrency must be greater than zero".to_string());
        }
        if let Some(factor) = self.prefilter_factor {
            if !(0.0..=1.0).contains(&factor) {
                return Err(format!("prefilter_factor must be within [0, 1] (got {factor})"));
            }
        }
        for (name, tolerance) in [
            ("duration_tolerance", self.duration_tolerance),
            ("file_size_tolerance", self.file_size_tolerance),
        ] {
            if let Some(t) = tolerance {
                if !(0.0..1.0).contains(&t) {
                    return Err(format!("{name} must be within [0, 1) (got {t})"));
                }
            }
        }
        Ok(())
    }
}

impl DetectionConfig {
    /// Create a new config builder.
    pub fn builder() -> DetectionConfigBuilder {
        DetectionConfigBuilder::default()
    }

    /// Re-run builder validation on a config obtained some other way, such
    /// as deserialization.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let mut builder = DetectionConfigBuilder::default();
        builder
            .chunk_size(self.chunk_size)
            .frame_count(self.frame_count)
            .frame_size(self.frame_size)
            .fingerprint_concurrency(self.fingerprint_concurrency)
            .prefilter_factor(self.prefilter_factor)
            .duration_tolerance(self.duration_tolerance)
            .file_size_tolerance(self.file_size_tolerance)
            .weights(self.weights)
            .probe_concurrency(self.probe_concurrency);
        builder
            .build()
            .map_err(|e| ConfigError::Invalid { message: e.to_string() })
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
            frame_count: 5,
            frame_size: FrameSize::default(),
            fingerprint_concurrency: 2,
            prefilter_factor: 0.6,
            duration_tolerance: 0.05,
            file_size_tolerance: 0.10,
            weights: SimilarityWeights::DEFAULT,
            probe_concurrency: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_are_valid() {
        let w = SimilarityWeights::DEFAULT;
        let rebuilt =
            SimilarityWeights::new(w.duration(), w.resolution(), w.file_size(), w.visual());
        assert_eq!(rebuilt, Ok(w));
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let err = SimilarityWeights::new(0.5, 0.5, 0.5, 0.5).unwrap_err();
        assert!(matches!(err, ConfigError::WeightsSum { .. }));

        let err = SimilarityWeights::new(-0.5, 0.5, 0.5, 0.5).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWeight { name: "duration", .. }));
    }

    #[test]
    fn test_restricted_weights_renormalize() {
        let mut options = SimilarityOptions::new(0.8);
        options.check_visual = false;

        let w = SimilarityWeights::DEFAULT.restricted_to(&options).unwrap();
        assert_eq!(w.visual(), 0.0);
        assert!((w.duration() - 0.4).abs() < 1e-9);
        assert!((w.resolution() - 0.3).abs() < 1e-9);
        assert!((w.file_size() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_restricted_all_enabled_is_identity() {
        let w = SimilarityWeights::DEFAULT
            .restricted_to(&SimilarityOptions::new(0.5))
            .unwrap();
        assert!((w.visual() - 0.5).abs() < 1e-12);
        assert!((w.duration() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_options_validation() {
        assert!(SimilarityOptions::new(0.8).validate().is_ok());
        assert!(SimilarityOptions::new(1.2).validate().is_err());

        let options = SimilarityOptions {
            threshold: 0.8,
            check_duration: false,
            check_resolution: false,
            check_file_size: false,
            check_visual: false,
        };
        assert_eq!(options.validate(), Err(ConfigError::NoDimensions));
    }

    #[test]
    fn test_config_builder() {
        let config = DetectionConfig::builder()
            .chunk_size(4096usize)
            .fingerprint_concurrency(4usize)
            .build()
            .unwrap();

        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.fingerprint_concurrency, 4);
        assert_eq!(config.frame_count, 5);
        assert_eq!(config.weights, SimilarityWeights::DEFAULT);
    }

    #[test]
    fn test_config_builder_rejects_zero_concurrency() {
        let result = DetectionConfig::builder()
            .fingerprint_concurrency(0usize)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_weights_deserialize_validates() {
        let ok: Result<SimilarityWeights, _> = serde_json::from_str(
            r#"{"duration":0.25,"resolution":0.25,"file_size":0.25,"visual":0.25}"#,
        );
        assert!(ok.is_ok());

        let bad: Result<SimilarityWeights, _> = serde_json::from_str(
            r#"{"duration":1.0,"resolution":1.0,"file_size":0.0,"visual":0.0}"#,
        );
        assert!(bad.is_err());
    }
}
