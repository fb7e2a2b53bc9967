//! Media file descriptors.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File extensions (lower-case, without the dot) treated as video files.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v"];

/// Pixels of slack allowed when classifying a resolution.
const RESOLUTION_TOLERANCE: u32 = 16;

/// Immutable description of a media file as seen at scan time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Absolute path to the file.
    pub path: PathBuf,

    /// Size in bytes.
    pub size: u64,

    /// Last modification time.
    pub modified: DateTime<Utc>,

    /// Frame width in pixels, if known.
    pub width: Option<u32>,

    /// Frame height in pixels, if known.
    pub height: Option<u32>,

    /// Duration in seconds, if known.
    pub duration_secs: Option<f64>,

    /// Lower-cased extension without the leading dot.
    pub extension: String,
}

impl FileDescriptor {
    /// Create a descriptor with unknown media metadata.
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: DateTime<Utc>) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        Self {
            path,
            size,
            modified,
            width: None,
            height: None,
            duration_secs: None,
            extension,
        }
    }

    /// Set the frame dimensions.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Set the duration in seconds.
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_secs = Some(seconds);
        self
    }

    /// The file name, lossily converted for display.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Borrow the path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total pixel count, when both dimensions are known and non-zero.
    pub fn pixel_count(&self) -> Option<u64> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(w as u64 * h as u64),
            _ => None,
        }
    }

    /// The shorter side of the frame, which is what "1080p" refers to for
    /// both landscape and portrait video.
    pub fn effective_vertical_resolution(&self) -> Option<u32> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(w.min(h)),
            _ => None,
        }
    }

    /// Classify the resolution into a coarse label.
    pub fn resolution_label(&self) -> Option<ResolutionLabel> {
        let effective = self.effective_vertical_resolution()?;

        if effective < 720 - RESOLUTION_TOLERANCE {
            Some(ResolutionLabel::Below720p)
        } else if effective.abs_diff(720) <= RESOLUTION_TOLERANCE {
            Some(ResolutionLabel::Hd720)
        } else if effective.abs_diff(1080) <= RESOLUTION_TOLERANCE {
            Some(ResolutionLabel::Hd1080)
        } else if effective > 1080 + RESOLUTION_TOLERANCE {
            Some(ResolutionLabel::Above1080p)
        } else {
            None
        }
    }

    /// Check whether the extension is a known video extension.
    pub fn is_video(&self) -> bool {
        VIDEO_EXTENSIONS.contains(&self.extension.as_str())
    }
}

/// Coarse resolution class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum ResolutionLabel {
    #[strum(to_string = "<720p")]
    Below720p,
    #[strum(to_string = "720p")]
    Hd720,
    #[strum(to_string = "1080p")]
    Hd1080,
    #[strum(to_string = ">1080p")]
    Above1080p,
}
