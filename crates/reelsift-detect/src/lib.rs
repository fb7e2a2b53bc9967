//! Detection orchestrator for reelsift.
//!
//! [`DetectionEngine`] runs one of two pipelines over a list of
//! [`FileDescriptor`]s:
//!
//! - **Duplicates** - two-phase content hashing on a blocking worker, then
//!   grouping by full digest
//! - **Similarity** - metadata prefilter over all pairs, bounded-concurrency
//!   fingerprint extraction, weighted scoring and union-find grouping
//!
//! At most one run per [`DetectionMode`] is active at a time. Each run is
//! tied to a [`RunHandle`] carrying a cancellation token; cancellation is
//! cooperative and checked before every unit of work.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reelsift_core::{DetectionConfig, DetectionProgress, ProgressCallback, SimilarityOptions};
//! use reelsift_detect::DetectionEngine;
//!
//! # use reelsift_core::FileDescriptor;
//! # use reelsift_detect::DetectError;
//! # async fn run(files: Vec<FileDescriptor>) -> Result<(), DetectError> {
//! let engine = DetectionEngine::with_ffmpeg(DetectionConfig::default())?;
//!
//! let on_progress: ProgressCallback = Arc::new(|p: &DetectionProgress| {
//!     println!("{} {}%", p.message, p.percentage)
//! });
//! let report = engine
//!     .detect_similar(files, SimilarityOptions::new(0.85), Some(on_progress))
//!     .await?;
//!
//! for group in &report.groups {
//!     println!("{} similar files ({:.2})", group.count(), group.average_similarity);
//! }
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod run;

pub use engine::DetectionEngine;
pub use error::DetectError;
pub use run::{DetectionMode, RunHandle, RunState};

// Re-export core types for convenience
pub use reelsift_core::{
    DetectionConfig, DetectionProgress, DuplicateReport, FileDescriptor, ProgressCallback,
    SimilarityOptions, SimilarityReport,
};
