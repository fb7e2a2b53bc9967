//! Scan progress reporting.

use std::path::PathBuf;
use std::time::Duration;

/// Progress information during a library scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Video files found by the traversal.
    pub files_found: usize,
    /// Files probed so far.
    pub files_probed: usize,
    /// Probes that failed so far.
    pub probe_failures: usize,
    /// Most recently probed path.
    pub current_path: PathBuf,
    /// Time elapsed since the scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            files_found: 0,
            files_probed: 0,
            probe_failures: 0,
            current_path: PathBuf::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate probe rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_probed as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Whether every found file has been probed.
    pub fn is_complete(&self) -> bool {
        self.files_probed >= self.files_found
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate() {
        let mut progress = ScanProgress::new();
        assert_eq!(progress.files_per_second(), 0.0);

        progress.files_probed = 10;
        progress.elapsed = Duration::from_secs(2);
        assert_eq!(progress.files_per_second(), 5.0);
    }
}
