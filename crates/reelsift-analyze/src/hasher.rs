//! Exact duplicate detection using content hashing.
//!
//! Uses a two-phase algorithm for efficiency:
//! 1. Fast digest of at most three fixed-size windows plus the file size
//! 2. Full BLAKE3 digest only for files whose fast digests collided
//!
//! Only the second phase is authoritative. A fast-digest collision between
//! files of different content is always split apart by the full digest.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use blake3::Hasher;
use indexmap::IndexMap;
use reelsift_core::{DetectionPhase, FastDigest, FullDigest};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default size of each fast-digest window.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// Progress information during two-phase hashing.
#[derive(Debug, Clone)]
pub struct HashProgress {
    /// [`DetectionPhase::FastDigest`] or [`DetectionPhase::FullDigest`].
    pub phase: DetectionPhase,
    /// Zero-based position of the file about to be hashed.
    pub current: usize,
    /// Total units known at this point.
    pub total: usize,
    /// File about to be hashed.
    pub path: PathBuf,
}

/// Result of [`ContentHasher::two_phase_group`].
#[derive(Debug, Clone, Default)]
pub struct TwoPhaseOutcome {
    /// Confirmed duplicate buckets (two or more paths each), in the order
    /// their first member was encountered.
    pub groups: IndexMap<FullDigest, Vec<PathBuf>>,

    /// Files dropped because they could not be read.
    pub failed: Vec<PathBuf>,

    /// Whether hashing stopped early because of cancellation.
    pub cancelled: bool,
}

/// Computes fast and full content digests.
#[derive(Debug, Clone)]
pub struct ContentHasher {
    chunk_size: usize,
}

impl ContentHasher {
    /// Create a hasher with 64 KiB windows.
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Create a hasher with a custom window size.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Window size in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Compute the fast digest of `path`.
    ///
    /// Reads the head window, a window centered on the midpoint when the file
    /// is larger than three windows, and the tail window when it is larger
    /// than two, then mixes in the decimal file size. Never reads more than
    /// three windows.
    pub fn fast_digest(&self, path: &Path) -> io::Result<FastDigest> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let chunk = self.chunk_size as u64;

        let mut hasher = Hasher::new();
        let mut buffer = vec![0u8; self.chunk_size];

        // Head
        let head_len = chunk.min(file_size) as usize;
        file.read_exact(&mut buffer[..head_len])?;
        hasher.update(&buffer[..head_len]);

        // Middle
        if file_size > chunk * 3 {
            let offset = file_size / 2 - chunk / 2;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buffer)?;
            hasher.update(&buffer);
        }

        // Tail
        if file_size > chunk * 2 {
            file.seek(SeekFrom::Start(file_size - chunk))?;
            file.read_exact(&mut buffer)?;
            hasher.update(&buffer);
        }

        // Include file size so equal windows of different-sized files never collide
        hasher.update(file_size.to_string().as_bytes());

        Ok(FastDigest::new(finalize_128(&hasher)))
    }

    /// Compute the digest of the complete contents of `path`.
    pub fn full_digest(&self, path: &Path) -> io::Result<FullDigest> {
        let mut file = File::open(path)?;
        let mut hasher = Hasher::new();
        let mut buffer = vec![0u8; STREAM_BUFFER_SIZE];

        loop {
            let bytes_read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(FullDigest::new(finalize_128(&hasher)))
    }

    /// Group `paths` by content using the two-phase strategy.
    ///
    /// Unreadable files are logged and skipped. `cancel` is checked before
    /// every file; once it fires no further file is opened and the outcome
    /// holds only the buckets confirmed by full digests computed so far.
    pub fn two_phase_group<F>(
        &self,
        paths: &[PathBuf],
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> TwoPhaseOutcome
    where
        F: FnMut(HashProgress),
    {
        let mut outcome = TwoPhaseOutcome::default();
        let total = paths.len();

        // Phase 1: fast digests
        let mut fast_buckets: IndexMap<FastDigest, Vec<&PathBuf>> = IndexMap::new();
        for (i, path) in paths.iter().enumerate() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                return outcome;
            }

            on_progress(HashProgress {
                phase: DetectionPhase::FastDigest,
                current: i,
                total,
                path: path.clone(),
            });

            match self.fast_digest(path) {
                Ok(digest) => fast_buckets.entry(digest).or_default().push(path),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "fast digest failed, skipping file");
                    outcome.failed.push(path.clone());
                }
            }
        }

        // Phase 2: full digests for suspicious files only
        let suspicious: Vec<&PathBuf> = fast_buckets
            .into_values()
            .filter(|bucket| bucket.len() > 1)
            .flatten()
            .collect();
        let phase_total = total + suspicious.len();
        debug!(files = total, suspicious = suspicious.len(), "fast digest phase complete");

        let mut full_buckets: IndexMap<FullDigest, Vec<PathBuf>> = IndexMap::new();
        for (j, path) in suspicious.into_iter().enumerate() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            on_progress(HashProgress {
                phase: DetectionPhase::FullDigest,
                current: total + j,
                total: phase_total,
                path: path.clone(),
            });

            match self.full_digest(path) {
                Ok(digest) => full_buckets.entry(digest).or_default().push(path.clone()),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "full digest failed, skipping file");
                    outcome.failed.push(path.clone());
                }
            }
        }

        full_buckets.retain(|_, members| members.len() > 1);
        outcome.groups = full_buckets;
        outcome
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Take the first 128 bits of the BLAKE3 output stream.
fn finalize_128(hasher: &Hasher) -> [u8; 16] {
    let mut out = [0u8; 16];
    hasher.finalize_xof().fill(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_fast_digest_identical_content() {
        let temp = TempDir::new().unwrap();
        let a = write(&temp, "a.mp4", b"duplicate content here");
        let b = write(&temp, "b.mp4", b"duplicate content here");
        let c = write(&temp, "c.mp4", b"unique content");

        let hasher = ContentHasher::new();
        assert_eq!(hasher.fast_digest(&a).unwrap(), hasher.fast_digest(&b).unwrap());
        assert_ne!(hasher.fast_digest(&a).unwrap(), hasher.fast_digest(&c).unwrap());
    }

    #[test]
    fn test_fast_digest_ignores_unsampled_bytes() {
        // 4 windows of 8 bytes: head 0..8, middle 12..20, tail 24..32.
        // Byte 9 is never read, so changing it must not change the digest.
        let temp = TempDir::new().unwrap();
        let mut content = vec![0u8; 32];
        let a = write(&temp, "a.bin", &content);
        content[9] = 0xff;
        let b = write(&temp, "b.bin", &content);

        let hasher = ContentHasher::with_chunk_size(8);
        assert_eq!(hasher.fast_digest(&a).unwrap(), hasher.fast_digest(&b).unwrap());
        assert_ne!(hasher.full_digest(&a).unwrap(), hasher.full_digest(&b).unwrap());
    }

    #[test]
    fn test_fast_digest_reads_middle_window() {
        let temp = TempDir::new().unwrap();
        let mut content = vec![0u8; 32];
        let a = write(&temp, "a.bin", &content);
        content[14] = 0xff;
        let b = write(&temp, "b.bin", &content);

        let hasher = ContentHasher::with_chunk_size(8);
        assert_ne!(hasher.fast_digest(&a).unwrap(), hasher.fast_digest(&b).unwrap());
    }

    #[test]
    fn test_fast_digest_includes_size() {
        // Same head window, different lengths, no middle or tail read.
        let temp = TempDir::new().unwrap();
        let a = write(&temp, "a.bin", &[7u8; 10]);
        let b = write(&temp, "b.bin", &[7u8; 12]);

        let hasher = ContentHasher::with_chunk_size(8);
        assert_ne!(hasher.fast_digest(&a).unwrap(), hasher.fast_digest(&b).unwrap());
    }

    #[test]
    fn test_empty_file_digests() {
        let temp = TempDir::new().unwrap();
        let a = write(&temp, "empty.bin", b"");

        let hasher = ContentHasher::new();
        assert!(hasher.fast_digest(&a).is_ok());
        assert!(hasher.full_digest(&a).is_ok());
    }

    #[test]
    fn test_missing_file_is_error() {
        let hasher = ContentHasher::new();
        assert!(hasher.fast_digest(Path::new("/nonexistent/file.mp4")).is_err());
    }

    #[test]
    fn test_two_phase_progress_ranges() {
        let temp = TempDir::new().unwrap();
        let paths = vec![
            write(&temp, "a.mp4", b"same"),
            write(&temp, "b.mp4", b"same"),
            write(&temp, "c.mp4", b"other"),
        ];

        let mut events = Vec::new();
        let outcome = ContentHasher::new().two_phase_group(&paths, &CancellationToken::new(), |p| {
            events.push(p)
        });

        assert_eq!(outcome.groups.len(), 1);
        assert!(!outcome.cancelled);

        let phase1: Vec<_> = events
            .iter()
            .filter(|p| p.phase == DetectionPhase::FastDigest)
            .map(|p| (p.current, p.total))
            .collect();
        assert_eq!(phase1, vec![(0, 3), (1, 3), (2, 3)]);

        let phase2: Vec<_> = events
            .iter()
            .filter(|p| p.phase == DetectionPhase::FullDigest)
            .map(|p| (p.current, p.total))
            .collect();
        assert_eq!(phase2, vec![(3, 5), (4, 5)]);
    }

    #[test]
    fn test_two_phase_precancelled() {
        let temp = TempDir::new().unwrap();
        let paths = vec![write(&temp, "a.mp4", b"same"), write(&temp, "b.mp4", b"same")];

        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut calls = 0;
        let outcome = ContentHasher::new().two_phase_group(&paths, &cancel, |_| calls += 1);
        assert!(outcome.cancelled);
        assert!(outcome.groups.is_empty());
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_cancel_during_full_digest_opens_no_further_files() {
        let temp = TempDir::new().unwrap();
        let paths: Vec<_> = ["a.mp4", "b.mp4", "c.mp4", "d.mp4"]
            .iter()
            .map(|name| write(&temp, name, b"identical content"))
            .collect();

        let cancel = CancellationToken::new();
        let mut full_events = 0;
        let outcome = ContentHasher::new().two_phase_group(&paths, &cancel, |p| {
            if p.phase == DetectionPhase::FullDigest {
                full_events += 1;
                cancel.cancel();
                // Any later open of these would be recorded as a failure.
                for path in &paths[1..] {
                    let _ = fs::remove_file(path);
                }
            }
        });

        assert!(outcome.cancelled);
        assert_eq!(full_events, 1);
        assert!(outcome.failed.is_empty());
        assert!(outcome.groups.is_empty());
    }
}
