//! Error types for detection runs.

use reelsift_core::ConfigError;
use thiserror::Error;

use crate::run::DetectionMode;

/// Errors that prevent a detection run from starting or finishing.
///
/// Per-file failures never surface here; they are logged and the file is
/// left out. Cancellation is reported through the `cancelled` flag of the
/// report, not as an error.
#[derive(Debug, Error)]
pub enum DetectError {
    /// A run of the same mode is still active.
    #[error("A {mode} run is already in progress")]
    AlreadyRunning { mode: DetectionMode },

    /// A run handle was passed to the runner of the other mode.
    #[error("Run handle is for {actual}, expected {expected}")]
    ModeMismatch {
        expected: DetectionMode,
        actual: DetectionMode,
    },

    /// Invalid configuration or options.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A background worker panicked or was aborted.
    #[error("Detection worker failed: {0}")]
    Worker(String),
}
