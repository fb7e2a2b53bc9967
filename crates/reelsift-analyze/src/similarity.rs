//! Multi-dimensional similarity scoring.
//!
//! Four dimensions are compared, each yielding a value in [0, 1]:
//! duration, resolution (pixel count), file size and visual (fingerprint
//! Hamming distance). The overall score is their weighted sum. A metadata-only
//! prefilter rejects clearly different pairs before any frame is decoded.

use reelsift_core::{
    ConfigError, DetectionConfig, FileDescriptor, Fingerprint, PerceptualHash, SimilarityOptions,
    SimilarityScore, SimilarityWeights,
};

/// Default relative duration difference scored as identical.
pub const DEFAULT_DURATION_TOLERANCE: f64 = 0.05;

/// Default relative size difference scored as identical.
pub const DEFAULT_FILE_SIZE_TOLERANCE: f64 = 0.10;

/// Similarity of two durations in seconds.
///
/// Unknown or non-positive durations score 0.
pub fn duration_similarity(d1: Option<f64>, d2: Option<f64>, tolerance: f64) -> f64 {
    match (d1, d2) {
        (Some(a), Some(b)) if a > 0.0 && b > 0.0 => relative_similarity(a, b, tolerance),
        _ => 0.0,
    }
}

/// Similarity of two frame sizes as the ratio of their pixel counts.
///
/// Unknown or zero dimensions score 0.
pub fn resolution_similarity(
    w1: Option<u32>,
    h1: Option<u32>,
    w2: Option<u32>,
    h2: Option<u32>,
) -> f64 {
    let pixels = |w: Option<u32>, h: Option<u32>| match (w, h) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Some(w as u64 * h as u64),
        _ => None,
    };

    match (pixels(w1, h1), pixels(w2, h2)) {
        (Some(p1), Some(p2)) => p1.min(p2) as f64 / p1.max(p2) as f64,
        _ => 0.0,
    }
}

/// Similarity of two file sizes in bytes.
pub fn file_size_similarity(s1: u64, s2: u64, tolerance: f64) -> f64 {
    if s1 == s2 {
        return 1.0;
    }
    relative_similarity(s1 as f64, s2 as f64, tolerance)
}

/// Visual similarity of two fingerprints.
///
/// Compares frames position by position over the shorter fingerprint and
/// inverts the mean normalized Hamming distance. An unusable fingerprint on
/// either side scores 0.
pub fn visual_similarity(fp1: &Fingerprint, fp2: &Fingerprint) -> f64 {
    let compared = fp1.len().min(fp2.len());
    if compared == 0 {
        return 0.0;
    }

    let total_distance: u64 = fp1
        .frames()
        .iter()
        .zip(fp2.frames())
        .map(|(a, b)| a.distance(b) as u64)
        .sum();
    let max_distance = compared as u64 * PerceptualHash::BITS as u64;

    (1.0 - total_distance as f64 / max_distance as f64).clamp(0.0, 1.0)
}

/// 1 within `tolerance` of each other, then `1 - |a-b|/mean`, 0 once the
/// difference reaches the mean.
fn relative_similarity(a: f64, b: f64, tolerance: f64) -> f64 {
    let mean = (a + b) / 2.0;
    if mean <= 0.0 {
        return 0.0;
    }

    let ratio = (a - b).abs() / mean;
    if ratio <= tolerance {
        1.0
    } else if ratio >= 1.0 {
        0.0
    } else {
        1.0 - ratio
    }
}

/// Scores file pairs with fixed weights and tolerances.
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    weights: SimilarityWeights,
    duration_tolerance: f64,
    file_size_tolerance: f64,
    check_duration: bool,
    check_resolution: bool,
    check_file_size: bool,
    check_visual: bool,
}

impl SimilarityScorer {
    /// Create a scorer with default tolerances and every dimension enabled.
    pub fn new(weights: SimilarityWeights) -> Self {
        Self {
            weights,
            duration_tolerance: DEFAULT_DURATION_TOLERANCE,
            file_size_tolerance: DEFAULT_FILE_SIZE_TOLERANCE,
            check_duration: true,
            check_resolution: true,
            check_file_size: true,
            check_visual: true,
        }
    }

    /// Build a scorer for one run: tolerances from `config`, dimensions and
    /// renormalized weights from `options`.
    pub fn for_run(
        config: &DetectionConfig,
        options: &SimilarityOptions,
    ) -> Result<Self, ConfigError> {
        options.validate()?;
        let weights = config.weights.restricted_to(options)?;

        Ok(Self {
            weights,
            duration_tolerance: config.duration_tolerance,
            file_size_tolerance: config.file_size_tolerance,
            check_duration: options.check_duration,
            check_resolution: options.check_resolution,
            check_file_size: options.check_file_size,
            check_visual: options.check_visual,
        })
    }

    /// Weights in effect.
    pub fn weights(&self) -> &SimilarityWeights {
        &self.weights
    }

    /// Whether the visual dimension takes part, i.e. whether fingerprints
    /// are needed at all.
    pub fn uses_visual(&self) -> bool {
        self.check_visual
    }

    fn dimensions(&self, a: &FileDescriptor, b: &FileDescriptor) -> (f64, f64, f64) {
        (
            duration_similarity(a.duration_secs, b.duration_secs, self.duration_tolerance),
            resolution_similarity(a.width, a.height, b.width, b.height),
            file_size_similarity(a.size, b.size, self.file_size_tolerance),
        )
    }

    /// Full score of a pair given its visual similarity.
    pub fn overall(&self, a: &FileDescriptor, b: &FileDescriptor, visual: f64) -> SimilarityScore {
        let (duration, resolution, file_size) = self.dimensions(a, b);
        SimilarityScore::weighted(duration, resolution, file_size, visual, &self.weights)
    }

    /// Cheap metadata-only screen: every enabled metadata dimension must
    /// reach `min_threshold`.
    pub fn prefilter(&self, a: &FileDescriptor, b: &FileDescriptor, min_threshold: f64) -> bool {
        let (duration, resolution, file_size) = self.dimensions(a, b);

        (!self.check_duration || duration >= min_threshold)
            && (!self.check_resolution || resolution >= min_threshold)
            && (!self.check_file_size || file_size >= min_threshold)
    }
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new(SimilarityWeights::DEFAULT)
    }
}
