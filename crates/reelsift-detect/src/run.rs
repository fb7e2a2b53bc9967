//! Run lifecycle: at most one active run per detection mode.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::DetectError;

/// The two kinds of detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum DetectionMode {
    /// Byte-identical files.
    Duplicates,
    /// Visually or metadata-similar files.
    Similarity,
}

/// Lifecycle state of a mode's most recent run.
///
/// `Idle -> Running -> {Completed | Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

#[derive(Debug)]
struct Slot {
    state: RunState,
    cancel: Option<CancellationToken>,
}

/// Shared table of per-mode run slots.
#[derive(Debug, Default)]
pub(crate) struct RunRegistry {
    slots: Mutex<HashMap<DetectionMode, Slot>>,
}

impl RunRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<DetectionMode, Slot>> {
        // A panic while holding the lock leaves the table consistent.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim `mode`, failing if it already has a running run.
    pub(crate) fn begin(self: &Arc<Self>, mode: DetectionMode) -> Result<RunHandle, DetectError> {
        let mut slots = self.lock();
        if let Some(slot) = slots.get(&mode) {
            if slot.state == RunState::Running {
                return Err(DetectError::AlreadyRunning { mode });
            }
        }

        let cancel = CancellationToken::new();
        slots.insert(
            mode,
            Slot {
                state: RunState::Running,
                cancel: Some(cancel.clone()),
            },
        );
        debug!(%mode, "run started");

        Ok(RunHandle {
            mode,
            cancel,
            finished: false,
            registry: Arc::clone(self),
        })
    }

    /// Signal the active run of `mode`, if any. Returns whether one was signalled.
    pub(crate) fn cancel(&self, mode: DetectionMode) -> bool {
        let slots = self.lock();
        match slots.get(&mode).and_then(|slot| slot.cancel.as_ref()) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn state(&self, mode: DetectionMode) -> RunState {
        self.lock()
            .get(&mode)
            .map(|slot| slot.state)
            .unwrap_or(RunState::Idle)
    }

    fn release(&self, mode: DetectionMode, state: RunState) {
        let mut slots = self.lock();
        slots.insert(mode, Slot { state, cancel: None });
        debug!(%mode, %state, "run released");
    }
}

/// Exclusive claim on one detection mode for the duration of a run.
///
/// Dropping the handle frees the mode. A handle dropped before its run
/// finished (for instance because the run future was dropped) leaves the
/// mode in [`RunState::Cancelled`].
#[derive(Debug)]
pub struct RunHandle {
    mode: DetectionMode,
    cancel: CancellationToken,
    finished: bool,
    registry: Arc<RunRegistry>,
}

impl RunHandle {
    /// Mode this handle claims.
    pub fn mode(&self) -> DetectionMode {
        self.mode
    }

    /// Token observed by the run. Clone it to cancel from elsewhere.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request cooperative cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Record the outcome and release the mode.
    pub(crate) fn finish(mut self, cancelled: bool) -> RunState {
        let state = if cancelled {
            RunState::Cancelled
        } else {
            RunState::Completed
        };
        self.finished = true;
        self.registry.release(self.mode, state);
        state
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        if !self.finished {
            self.registry.release(self.mode, RunState::Cancelled);
        }
    }
}
