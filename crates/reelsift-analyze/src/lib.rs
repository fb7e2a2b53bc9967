//! Detection algorithms for reelsift.
//!
//! - **Content hashing** - two-phase exact duplicate detection
//! - **Fingerprinting** - perceptual hashes of sampled video frames
//! - **Similarity scoring** - weighted metadata + visual comparison with a
//!   cheap metadata prefilter
//! - **Grouping** - duplicate buckets and union-find clustering of similar pairs
//!
//! # Duplicate Detection
//!
//! Uses a two-phase algorithm so most files are never read in full:
//!
//! 1. Fast digest of the head, middle and tail windows plus the file size
//! 2. Full digest only for files whose fast digest collided
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use reelsift_analyze::ContentHasher;
//! use tokio_util::sync::CancellationToken;
//!
//! let paths = vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")];
//! let outcome = ContentHasher::new().two_phase_group(&paths, &CancellationToken::new(), |_| {});
//!
//! for (digest, members) in &outcome.groups {
//!     println!("{digest}: {} copies", members.len());
//! }
//! ```

mod fingerprint;
mod grouping;
mod hasher;
mod similarity;

pub use fingerprint::{ExtractedFrames, FingerprintExtractor};
pub use grouping::{DisjointSet, SimilarGroupBuilder, build_duplicate_groups};
pub use hasher::{ContentHasher, HashProgress, TwoPhaseOutcome};
pub use similarity::{
    SimilarityScorer, duration_similarity, file_size_similarity, resolution_similarity,
    visual_similarity,
};

// Re-export core types
pub use reelsift_core::{
    DuplicateGroup, FastDigest, FileDescriptor, Fingerprint, FullDigest, PerceptualHash,
    SimilarGroup, SimilarPair, SimilarityScore,
};
