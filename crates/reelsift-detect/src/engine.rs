//! The detection engine: sequences hashing, prefiltering, fingerprinting,
//! scoring and grouping for one run at a time per mode.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use rayon::prelude::*;
use reelsift_analyze::{
    ContentHasher, FingerprintExtractor, SimilarGroupBuilder, SimilarityScorer,
    build_duplicate_groups, visual_similarity,
};
use reelsift_core::{
    DetectionConfig, DetectionPhase, DetectionProgress, DuplicateReport, FileDescriptor,
    Fingerprint, ProgressCallback, SimilarityOptions, SimilarityReport, SimilarityScore,
};
use reelsift_media::{FfmpegFrameDecoder, FrameDecoder};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::DetectError;
use crate::run::{DetectionMode, RunHandle, RunRegistry, RunState};

/// Forwards snapshots to an optional caller callback.
#[derive(Clone)]
struct Reporter(Option<ProgressCallback>);

impl Reporter {
    fn emit(
        &self,
        phase: DetectionPhase,
        current: usize,
        total: usize,
        message: impl Into<String>,
        item: Option<String>,
    ) {
        if let Some(callback) = &self.0 {
            callback(&DetectionProgress::new(phase, current, total, message, item));
        }
    }
}

/// Runs duplicate and similarity detection over caller-supplied files.
pub struct DetectionEngine {
    config: DetectionConfig,
    hasher: ContentHasher,
    extractor: FingerprintExtractor,
    runs: Arc<RunRegistry>,
}

impl DetectionEngine {
    /// Create an engine that decodes frames with `decoder`.
    pub fn new(
        config: DetectionConfig,
        decoder: Arc<dyn FrameDecoder>,
    ) -> Result<Self, DetectError> {
        let config = config.validated()?;
        let hasher = ContentHasher::with_chunk_size(config.chunk_size);
        let extractor = FingerprintExtractor::new(decoder).with_frame_size(config.frame_size);

        Ok(Self {
            config,
            hasher,
            extractor,
            runs: Arc::new(RunRegistry::default()),
        })
    }

    /// Create an engine backed by the `ffmpeg` and `ffprobe` binaries on `PATH`.
    pub fn with_ffmpeg(config: DetectionConfig) -> Result<Self, DetectError> {
        Self::new(config, Arc::new(FfmpegFrameDecoder::new()))
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Claim `mode` for a new run.
    ///
    /// Fails with [`DetectError::AlreadyRunning`] while another run of the
    /// same mode holds its handle.
    pub fn begin(&self, mode: DetectionMode) -> Result<RunHandle, DetectError> {
        self.runs.begin(mode)
    }

    /// Request cancellation of the active run of `mode`.
    ///
    /// Idempotent; returns whether a run was signalled.
    pub fn cancel(&self, mode: DetectionMode) -> bool {
        let signalled = self.runs.cancel(mode);
        if signalled {
            info!(%mode, "cancellation requested");
        }
        signalled
    }

    /// State of the most recent run of `mode`.
    pub fn state(&self, mode: DetectionMode) -> RunState {
        self.runs.state(mode)
    }

    /// Find groups of byte-identical files.
    pub async fn detect_duplicates(
        &self,
        files: Vec<FileDescriptor>,
        on_progress: Option<ProgressCallback>,
    ) -> Result<DuplicateReport, DetectError> {
        let handle = self.begin(DetectionMode::Duplicates)?;
        self.run_duplicates(handle, files, on_progress).await
    }

    /// Run duplicate detection under an already claimed handle.
    pub async fn run_duplicates(
        &self,
        handle: RunHandle,
        files: Vec<FileDescriptor>,
        on_progress: Option<ProgressCallback>,
    ) -> Result<DuplicateReport, DetectError> {
        expect_mode(&handle, DetectionMode::Duplicates)?;
        let start = Instant::now();
        let reporter = Reporter(on_progress);

        // Empty files are trivially equal and never worth reporting.
        let by_path: IndexMap<_, _> = unique_by_path(files)
            .into_iter()
            .filter(|(_, f)| f.size > 0)
            .collect();
        let paths: Vec<_> = by_path.keys().cloned().collect();
        debug!(files = paths.len(), "duplicate detection started");

        let hasher = self.hasher.clone();
        let cancel = handle.cancel_token();
        let hash_reporter = reporter.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            hasher.two_phase_group(&paths, &cancel, |p| {
                hash_reporter.emit(
                    p.phase,
                    p.current,
                    p.total,
                    p.phase.to_string(),
                    Some(display_name(&p.path)),
                );
            })
        })
        .await
        .map_err(|e| DetectError::Worker(e.to_string()))?;

        let groups = build_duplicate_groups(outcome.groups.into_iter().map(|(digest, members)| {
            let files = members
                .iter()
                .filter_map(|path| by_path.get(path).cloned())
                .collect();
            (digest, files)
        }));

        let report = DuplicateReport {
            total_duplicates: groups.iter().map(|g| g.count()).sum(),
            total_waste_size: groups.iter().map(|g| g.waste_size).sum(),
            groups,
            scan_time_ms: start.elapsed().as_millis() as u64,
            cancelled: outcome.cancelled,
        };

        info!(
            groups = report.group_count(),
            waste = report.total_waste_size,
            unreadable = outcome.failed.len(),
            cancelled = report.cancelled,
            "duplicate detection finished"
        );
        handle.finish(report.cancelled);
        Ok(report)
    }

    /// Find groups of similar files.
    pub async fn detect_similar(
        &self,
        files: Vec<FileDescriptor>,
        options: SimilarityOptions,
        on_progress: Option<ProgressCallback>,
    ) -> Result<SimilarityReport, DetectError> {
        // Reject bad options before claiming the mode.
        SimilarityScorer::for_run(&self.config, &options)?;
        let handle = self.begin(DetectionMode::Similarity)?;
        self.run_similar(handle, files, options, on_progress).await
    }

    /// Run similarity detection under an already claimed handle.
    pub async fn run_similar(
        &self,
        handle: RunHandle,
        files: Vec<FileDescriptor>,
        options: SimilarityOptions,
        on_progress: Option<ProgressCallback>,
    ) -> Result<SimilarityReport, DetectError> {
        expect_mode(&handle, DetectionMode::Similarity)?;
        let scorer = Arc::new(SimilarityScorer::for_run(&self.config, &options)?);
        let start = Instant::now();
        let reporter = Reporter(on_progress);
        let cancel = handle.cancel_token();

        let files: Arc<Vec<FileDescriptor>> =
            Arc::new(unique_by_path(files).into_values().collect());
        debug!(files = files.len(), threshold = options.threshold, "similarity detection started");

        let finish = |handle: RunHandle, groups: Vec<_>, cancelled: bool| {
            let report = similarity_report(groups, options.threshold, start, cancelled);
            info!(
                groups = report.group_count(),
                files = report.total_similar_files,
                cancelled,
                "similarity detection finished"
            );
            handle.finish(cancelled);
            report
        };

        // Prefilter
        let min_threshold = options.threshold * self.config.prefilter_factor;
        reporter.emit(DetectionPhase::Prefilter, 0, files.len(), "Prefiltering", None);
        let candidates = {
            let files = Arc::clone(&files);
            let scorer = Arc::clone(&scorer);
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || {
                prefilter_pairs(&files, &scorer, min_threshold, &cancel)
            })
            .await
            .map_err(|e| DetectError::Worker(e.to_string()))?
        };
        reporter.emit(DetectionPhase::Prefilter, files.len(), files.len(), "Prefiltering", None);
        debug!(candidates = candidates.len(), "prefilter complete");

        if cancel.is_cancelled() {
            return Ok(finish(handle, Vec::new(), true));
        }

        // Fingerprints
        let fingerprints = if scorer.uses_visual() {
            self.fingerprint_candidates(&files, &candidates, &cancel, &reporter)
                .await
        } else {
            Vec::new()
        };

        if cancel.is_cancelled() {
            return Ok(finish(handle, Vec::new(), true));
        }

        // Scoring
        let total = candidates.len();
        let mut builder = SimilarGroupBuilder::new(files.len());
        let mut cancelled = false;

        for (k, &(i, j)) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let (a, b) = (&files[i], &files[j]);
            if let Some(score) = score_pair(&scorer, a, b, i, j, &fingerprints) {
                if score.overall() >= options.threshold {
                    builder.add_pair(i, j, score);
                }
            }

            reporter.emit(
                DetectionPhase::Scoring,
                k + 1,
                total,
                "Scoring",
                Some(format!("{} vs {}", a.name(), b.name())),
            );
        }

        debug!(accepted = builder.pair_count(), "scoring complete");
        let groups = builder.finish(&files);
        Ok(finish(handle, groups, cancelled))
    }

    /// Fingerprint every file that appears in a candidate pair, at most
    /// `fingerprint_concurrency` at a time.
    ///
    /// Returns one slot per file; files never fingerprinted stay `None`.
    async fn fingerprint_candidates(
        &self,
        files: &[FileDescriptor],
        candidates: &[(usize, usize)],
        cancel: &CancellationToken,
        reporter: &Reporter,
    ) -> Vec<Option<Fingerprint>> {
        let mut needed = vec![false; files.len()];
        for &(i, j) in candidates {
            needed[i] = true;
            needed[j] = true;
        }
        let targets: Vec<usize> = (0..files.len()).filter(|&i| needed[i]).collect();
        let total = targets.len();

        let permits = Arc::new(Semaphore::new(self.config.fingerprint_concurrency));
        let frame_count = self.config.frame_count;
        let mut tasks = JoinSet::new();

        for index in targets {
            let extractor = self.extractor.clone();
            let path = files[index].path.clone();
            let permits = Arc::clone(&permits);
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (index, None);
                };
                if cancel.is_cancelled() {
                    return (index, None);
                }
                let fingerprint = extractor.fingerprint(&path, frame_count).await;
                (index, Some(fingerprint))
            });
        }

        let mut fingerprints = vec![None; files.len()];
        let mut done = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Some(fingerprint))) => {
                    done += 1;
                    fingerprints[index] = Some(fingerprint);
                    reporter.emit(
                        DetectionPhase::Fingerprint,
                        done,
                        total,
                        "Extracting fingerprints",
                        Some(files[index].name()),
                    );
                }
                Ok((_, None)) => {}
                Err(e) => warn!(error = %e, "fingerprint task failed"),
            }
        }

        fingerprints
    }
}

impl std::fmt::Debug for DetectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn expect_mode(handle: &RunHandle, expected: DetectionMode) -> Result<(), DetectError> {
    if handle.mode() == expected {
        Ok(())
    } else {
        Err(DetectError::ModeMismatch {
            expected,
            actual: handle.mode(),
        })
    }
}

/// Drop repeated paths, keeping the first descriptor of each.
fn unique_by_path(files: Vec<FileDescriptor>) -> IndexMap<std::path::PathBuf, FileDescriptor> {
    let mut unique = IndexMap::with_capacity(files.len());
    for file in files {
        unique.entry(file.path.clone()).or_insert(file);
    }
    unique
}

/// All unordered pairs `(i, j)`, `i < j`, passing the metadata prefilter, in
/// row-major order. Cancellation is checked once per row.
fn prefilter_pairs(
    files: &[FileDescriptor],
    scorer: &SimilarityScorer,
    min_threshold: f64,
    cancel: &CancellationToken,
) -> Vec<(usize, usize)> {
    (0..files.len())
        .into_par_iter()
        .flat_map_iter(|i| {
            let row: Vec<(usize, usize)> = if cancel.is_cancelled() {
                Vec::new()
            } else {
                ((i + 1)..files.len())
                    .filter(|&j| scorer.prefilter(&files[i], &files[j], min_threshold))
                    .map(|j| (i, j))
                    .collect()
            };
            row
        })
        .collect()
}

/// Score one candidate pair. `None` when visual comparison is on and either
/// side has no usable fingerprint.
fn score_pair(
    scorer: &SimilarityScorer,
    a: &FileDescriptor,
    b: &FileDescriptor,
    i: usize,
    j: usize,
    fingerprints: &[Option<Fingerprint>],
) -> Option<SimilarityScore> {
    if !scorer.uses_visual() {
        return Some(scorer.overall(a, b, 0.0));
    }

    let fa = fingerprints.get(i)?.as_ref().filter(|f| f.is_usable())?;
    let fb = fingerprints.get(j)?.as_ref().filter(|f| f.is_usable())?;
    Some(scorer.overall(a, b, visual_similarity(fa, fb)))
}

fn similarity_report(
    groups: Vec<reelsift_core::SimilarGroup>,
    threshold: f64,
    start: Instant,
    cancelled: bool,
) -> SimilarityReport {
    SimilarityReport {
        total_similar_files: groups.iter().map(|g| g.count()).sum(),
        groups,
        scan_time_ms: start.elapsed().as_millis() as u64,
        threshold,
        cancelled,
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
