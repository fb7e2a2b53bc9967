//! Detection results.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SimilarityWeights;
use crate::digest::FullDigest;
use crate::media::FileDescriptor;

/// Per-dimension similarity of two files and their weighted overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarityScore {
    duration: f64,
    resolution: f64,
    file_size: f64,
    visual: f64,
    overall: f64,
}

impl SimilarityScore {
    /// Combine dimension scores with `weights`.
    ///
    /// Each dimension is clamped to [0, 1], so the overall score is too.
    pub fn weighted(
        duration: f64,
        resolution: f64,
        file_size: f64,
        visual: f64,
        weights: &SimilarityWeights,
    ) -> Self {
        let duration = unit(duration);
        let resolution = unit(resolution);
        let file_size = unit(file_size);
        let visual = unit(visual);

        let overall = duration * weights.duration()
            + resolution * weights.resolution()
            + file_size * weights.file_size()
            + visual * weights.visual();

        Self {
            duration,
            resolution,
            file_size,
            visual,
            overall: unit(overall),
        }
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

    /// The weighted overall score.
    pub fn overall(&self) -> f64 {
        self.overall
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Files with byte-identical content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Unique group id for this run.
    pub id: Uuid,

    /// Full digest shared by every member.
    pub digest: FullDigest,

    /// Member files, in encounter order.
    pub files: Vec<FileDescriptor>,

    /// Sum of member sizes.
    pub total_size: u64,

    /// Space reclaimable by keeping only the representative.
    pub waste_size: u64,

    /// The member to keep: the earliest modified.
    pub representative: FileDescriptor,
}

impl DuplicateGroup {
    /// Get the number of duplicate files.
    pub fn count(&self) -> usize {
        self.files.len()
    }

    /// If keeping the representative, how many files could be deleted.
    pub fn deletable_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }
}

/// Results from a duplicate detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Groups sorted by waste size descending.
    pub groups: Vec<DuplicateGroup>,

    /// Number of files that belong to some group.
    pub total_duplicates: usize,

    /// Total reclaimable bytes.
    pub total_waste_size: u64,

    /// Wall-clock duration of the run in milliseconds.
    pub scan_time_ms: u64,

    /// Whether the run stopped early on request.
    pub cancelled: bool,
}

impl DuplicateReport {
    /// Check if any duplicates were found.
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Number of groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// Two files judged similar, with their score.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarPair {
    pub first: FileDescriptor,
    pub second: FileDescriptor,
    pub score: SimilarityScore,
}

/// A connected component of similar files.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarGroup {
    /// Unique group id for this run.
    pub id: Uuid,

    /// Distinct member files.
    pub files: Vec<FileDescriptor>,

    /// Mean overall score of the pairs below.
    pub average_similarity: f64,

    /// Every accepted pair that linked members of this group.
    pub pairs: Vec<SimilarPair>,
}

impl SimilarGroup {
    /// Get the number of member files.
    pub fn count(&self) -> usize {
        self.files.len()
    }
}

/// Results from a similarity detection run.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityReport {
    /// Groups sorted by average similarity descending.
    pub groups: Vec<SimilarGroup>,

    /// Distinct files across all groups.
    pub total_similar_files: usize,

    /// Wall-clock duration of the run in milliseconds.
    pub scan_time_ms: u64,

    /// Threshold the run used.
    pub threshold: f64,

    /// Whether the run stopped early on request.
    pub cancelled: bool,
}

impl SimilarityReport {
    /// Check if any similar files were found.
    pub fn has_similar(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Number of groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}
