//! Detection progress reporting.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stage of a detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum DetectionPhase {
    /// Partial-content digests of every file.
    #[strum(to_string = "Quick scan")]
    FastDigest,
    /// Whole-file digests of suspicious files.
    #[strum(to_string = "Verifying")]
    FullDigest,
    /// Metadata-only pair screening.
    #[strum(to_string = "Prefiltering")]
    Prefilter,
    /// Perceptual fingerprint extraction.
    #[strum(to_string = "Extracting fingerprints")]
    Fingerprint,
    /// Full similarity scoring of candidate pairs.
    #[strum(to_string = "Scoring")]
    Scoring,
}

/// A point-in-time snapshot of a running detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionProgress {
    /// Stage the run is in.
    pub phase: DetectionPhase,
    /// Units processed so far.
    pub current: usize,
    /// Units expected in total.
    pub total: usize,
    /// Whole-number percentage, `floor(current / total * 100)`.
    pub percentage: u8,
    /// Human-readable status line.
    pub message: String,
    /// File name or "a vs b" pair label being worked on.
    pub current_item: Option<String>,
}

impl DetectionProgress {
    /// Create a snapshot; the percentage is derived from `current / total`.
    pub fn new(
        phase: DetectionPhase,
        current: usize,
        total: usize,
        message: impl Into<String>,
        current_item: Option<String>,
    ) -> Self {
        Self {
            phase,
            current,
            total,
            percentage: percentage(current, total),
            message: message.into(),
            current_item,
        }
    }
}

fn percentage(current: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((current.min(total) as u128 * 100) / total as u128) as u8
}

/// Callback invoked with each progress snapshot.
pub type ProgressCallback = Arc<dyn Fn(&DetectionProgress) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_floors() {
        let p = DetectionProgress::new(DetectionPhase::FastDigest, 1, 3, "x", None);
        assert_eq!(p.percentage, 33);

        let p = DetectionProgress::new(DetectionPhase::Scoring, 3, 3, "x", None);
        assert_eq!(p.percentage, 100);
    }

    #[test]
    fn test_percentage_zero_total() {
        let p = DetectionProgress::new(DetectionPhase::Prefilter, 0, 0, "x", None);
        assert_eq!(p.percentage, 0);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(DetectionPhase::FullDigest.to_string(), "Verifying");
    }
}
