//! JWalk-based media library scanner.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use globset::GlobSet;
use jwalk::WalkDir;
use reelsift_core::{FileDescriptor, VIDEO_EXTENSIONS};
use reelsift_media::MediaProbe;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::progress::ScanProgress;

/// Non-fatal problem with a single file.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub message: String,
}

impl ScanWarning {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of a library scan.
#[derive(Debug, Clone)]
pub struct LibraryScan {
    /// Canonical root that was scanned.
    pub root: PathBuf,
    /// Video files, sorted by path. Files whose probe failed keep unknown
    /// dimensions and duration.
    pub files: Vec<FileDescriptor>,
    /// Unreadable entries and failed probes.
    pub warnings: Vec<ScanWarning>,
    pub scan_duration: Duration,
}

impl LibraryScan {
    /// Sum of all file sizes.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Files with a known duration.
    pub fn probed_count(&self) -> usize {
        self.files.iter().filter(|f| f.duration_secs.is_some()).count()
    }
}

/// File found by the traversal, before probing.
struct FoundFile {
    path: PathBuf,
    size: u64,
    modified: DateTime<Utc>,
}

/// Scanner that walks a directory and probes every video in it.
pub struct LibraryScanner {
    probe: Arc<dyn MediaProbe>,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl LibraryScanner {
    /// Create a new scanner using `probe` for media metadata.
    pub fn new(probe: Arc<dyn MediaProbe>) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self { probe, progress_tx }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Scan the configured root.
    pub async fn scan(&self, config: &ScanConfig) -> Result<LibraryScan, ScanError> {
        let start = Instant::now();
        let root = config
            .root
            .canonicalize()
            .map_err(|e| ScanError::io(&config.root, e))?;

        if !root.is_dir() {
            return Err(ScanError::NotADirectory { path: root });
        }

        let ignore = config.ignore_set()?;
        let walk_config = config.clone();
        let walk_root = root.clone();
        let (found, mut warnings) = tokio::task::spawn_blocking(move || {
            collect_videos(&walk_config, &walk_root, &ignore)
        })
        .await
        .map_err(|e| ScanError::Worker {
            message: e.to_string(),
        })?;

        debug!(root = %root.display(), videos = found.len(), "traversal complete");

        let (files, probe_warnings) = self
            .probe_all(found, config.probe_concurrency, start)
            .await;
        warnings.extend(probe_warnings);

        Ok(LibraryScan {
            root,
            files,
            warnings,
            scan_duration: start.elapsed(),
        })
    }

    /// Probe every file with at most `concurrency` probes in flight.
    async fn probe_all(
        &self,
        found: Vec<FoundFile>,
        concurrency: usize,
        start: Instant,
    ) -> (Vec<FileDescriptor>, Vec<ScanWarning>) {
        let total = found.len();
        let permits = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, file) in found.into_iter().enumerate() {
            let probe = Arc::clone(&self.probe);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let result = probe.probe(&file.path).await;
                (index, file, result)
            });
        }

        let mut slots: Vec<Option<FileDescriptor>> = vec![None; total];
        let mut warnings = Vec::new();
        let mut progress = ScanProgress {
            files_found: total,
            ..ScanProgress::new()
        };

        while let Some(joined) = tasks.join_next().await {
            let (index, file, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!(error = %e, "probe task failed");
                    continue;
                }
            };

            let mut descriptor = FileDescriptor::new(&file.path, file.size, file.modified);
            match result {
                Ok(info) => {
                    descriptor.width = info.width;
                    descriptor.height = info.height;
                    descriptor.duration_secs = info.duration_secs;
                }
                Err(e) => {
                    warn!(
                        path = %file.path.display(),
                        error = %e,
                        "probe failed, metadata unknown"
                    );
                    progress.probe_failures += 1;
                    warnings.push(ScanWarning::new(&file.path, e.to_string()));
                }
            }

            progress.files_probed += 1;
            progress.current_path = file.path;
            progress.elapsed = start.elapsed();
            let _ = self.progress_tx.send(progress.clone());

            slots[index] = Some(descriptor);
        }

        (slots.into_iter().flatten().collect(), warnings)
    }
}

/// Walk `root` and collect files with a video extension, sorted by path.
fn collect_videos(
    config: &ScanConfig,
    root: &Path,
    ignore: &GlobSet,
) -> (Vec<FoundFile>, Vec<ScanWarning>) {
    let walker = WalkDir::new(root)
        .skip_hidden(!config.include_hidden)
        .follow_links(config.follow_symlinks)
        .min_depth(1)
        .max_depth(if config.recursive { usize::MAX } else { 1 });

    let mut found = Vec::new();
    let mut warnings = Vec::new();

    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
                warnings.push(ScanWarning::new(path, err.to_string()));
                continue;
            }
        };

        if !entry.file_type().is_file() && !(config.follow_symlinks && entry.path().is_file()) {
            continue;
        }

        let path = entry.path();
        if is_ignored(ignore, root, &path) || !has_video_extension(&path) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                warnings.push(ScanWarning::new(&path, err.to_string()));
                continue;
            }
        };

        let modified = metadata
            .modified()
            .unwrap_or(std::time::UNIX_EPOCH);

        found.push(FoundFile {
            path,
            size: metadata.len(),
            modified: DateTime::<Utc>::from(modified),
        });
    }

    found.sort_by(|a, b| a.path.cmp(&b.path));
    (found, warnings)
}

/// A path is ignored when any component below `root`, or the relative path
/// as a whole, matches an ignore pattern.
fn is_ignored(ignore: &GlobSet, root: &Path, path: &Path) -> bool {
    if ignore.is_empty() {
        return false;
    }
    let relative = path.strip_prefix(root).unwrap_or(path);
    ignore.is_match(relative)
        || relative
            .components()
            .any(|c| ignore.is_match(c.as_os_str()))
}

fn has_video_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_library() -> TempDir {
        // Not `TempDir::new()`: its `.tmp` prefix would make the root hidden.
        let temp = tempfile::Builder::new().prefix("library").tempdir().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("season1")).unwrap();
        fs::create_dir(root.join("trash")).unwrap();

        fs::write(root.join("movie.mp4"), "a").unwrap();
        fs::write(root.join("CLIP.MOV"), "bb").unwrap();
        fs::write(root.join("notes.txt"), "ccc").unwrap();
        fs::write(root.join("season1/ep1.mkv"), "dddd").unwrap();
        fs::write(root.join("trash/old.avi"), "eeeee").unwrap();

        temp
    }

    fn names(found: &[FoundFile]) -> Vec<String> {
        found
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_non_recursive_collects_top_level_videos() {
        let temp = create_library();
        let root = temp.path().canonicalize().unwrap();
        let config = ScanConfig::new(&root);

        let (found, warnings) = collect_videos(&config, &root, &config.ignore_set().unwrap());
        assert_eq!(names(&found), vec!["CLIP.MOV", "movie.mp4"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_recursive_with_ignore() {
        let temp = create_library();
        let root = temp.path().canonicalize().unwrap();
        let config = ScanConfig::builder()
            .root(&root)
            .recursive(true)
            .ignore_patterns(vec!["trash".to_string()])
            .build()
            .unwrap();

        let (found, _) = collect_videos(&config, &root, &config.ignore_set().unwrap());
        let mut found_names = names(&found);
        found_names.sort();
        assert_eq!(found_names, vec!["CLIP.MOV", "ep1.mkv", "movie.mp4"]);
    }

    #[test]
    fn test_has_video_extension() {
        assert!(has_video_extension(Path::new("/a/b.WEBM")));
        assert!(has_video_extension(Path::new("/a/b.m4v")));
        assert!(!has_video_extension(Path::new("/a/b.mp3")));
        assert!(!has_video_extension(Path::new("/a/mp4")));
    }
}
