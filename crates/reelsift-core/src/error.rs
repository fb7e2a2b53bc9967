//! Error types shared across the detection engine.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid engine configuration.
///
/// These are programmer or caller mistakes and are reported when a config
/// value is constructed, never in the middle of a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Similarity weights do not sum to one.
    #[error("Similarity weights must sum to 1.0 (got {sum})")]
    WeightsSum { sum: f64 },

    /// A similarity weight is negative or not a number.
    #[error("Similarity weight `{name}` is invalid: {value}")]
    InvalidWeight { name: &'static str, value: f64 },

    /// Threshold outside [0, 1].
    #[error("Similarity threshold must be within [0, 1] (got {value})")]
    Threshold { value: f64 },

    /// Every similarity dimension was switched off.
    #[error("At least one similarity dimension must be enabled")]
    NoDimensions,

    /// Any other invalid field.
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Errors raised by media collaborators: probing, frame decoding and
/// frame hashing.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The external tool could not be started.
    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The external tool ran but reported failure.
    #[error("{tool} failed for {path}: {message}")]
    ToolFailed {
        tool: String,
        path: PathBuf,
        message: String,
    },

    /// The tool output could not be understood.
    #[error("Unexpected output for {path}: {message}")]
    InvalidOutput { path: PathBuf, message: String },

    /// The media file or a frame could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A frame image could not be decoded.
    #[error("Failed to decode frame {path}: {message}")]
    Image { path: PathBuf, message: String },

    /// The decoder produced no frames.
    #[error("No frames extracted from {path}")]
    NoFrames { path: PathBuf },
}

impl MediaError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::WeightsSum { sum: 0.9 };
        assert!(err.to_string().contains("0.9"));
    }

    #[test]
    fn test_media_error_io() {
        let err = MediaError::io(
            "/videos/a.mp4",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(matches!(err, MediaError::Io { .. }));
        assert!(err.to_string().contains("/videos/a.mp4"));
    }
}
