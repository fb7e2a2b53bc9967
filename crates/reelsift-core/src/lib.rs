//! Core types for reelsift.
//!
//! This crate provides the data structures shared by every stage of the
//! detection engine: media file descriptors, content digests, perceptual
//! fingerprints, detection reports, progress snapshots and configuration.

mod config;
mod digest;
mod error;
mod media;
mod progress;
mod report;

pub use config::{
    DetectionConfig, DetectionConfigBuilder, FrameSize, SimilarityOptions, SimilarityWeights,
};
pub use digest::{FastDigest, Fingerprint, FullDigest, PerceptualHash};
pub use error::{ConfigError, MediaError};
pub use media::{FileDescriptor, ResolutionLabel, VIDEO_EXTENSIONS};
pub use progress::{DetectionPhase, DetectionProgress, ProgressCallback};
pub use report::{
    DuplicateGroup, DuplicateReport, SimilarGroup, SimilarPair, SimilarityReport, SimilarityScore,
};
