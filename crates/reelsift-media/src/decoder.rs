//! Still-frame extraction.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

use crate::probe::{FfprobeProbe, MediaProbe};
use crate::{BoxFuture, FrameSize, MediaError};

/// Something that can write evenly spaced still frames of a video to disk.
///
/// Implementations write `count` images named with [`frame_file_name`] into
/// `out_dir`, scaled to `size`. The directory already exists and is owned by
/// the caller.
pub trait FrameDecoder: Send + Sync {
    fn decode_frames<'a>(
        &'a self,
        video: &'a Path,
        count: usize,
        size: FrameSize,
        out_dir: &'a Path,
    ) -> BoxFuture<'a, Result<(), MediaError>>;
}

/// File name of the `index`-th frame (1-based).
pub fn frame_file_name(index: usize) -> String {
    format!("frame-{index}.jpg")
}

/// Parse the frame index back out of a path written by a decoder.
pub fn frame_index(path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix("frame-")?
        .strip_suffix(".jpg")?
        .parse()
        .ok()
}

/// [`FrameDecoder`] backed by the `ffmpeg` executable.
///
/// Frames are taken at `duration * (i + 1) / (count + 1)`, so the first and
/// last frames never sit on black lead-in or credits.
#[derive(Debug, Clone)]
pub struct FfmpegFrameDecoder {
    ffmpeg_path: PathBuf,
    probe: FfprobeProbe,
}

impl FfmpegFrameDecoder {
    /// Use `ffmpeg` and `ffprobe` from `PATH`.
    pub fn new() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            probe: FfprobeProbe::new(),
        }
    }

    /// Use specific binaries.
    pub fn with_paths(ffmpeg_path: impl Into<PathBuf>, ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            probe: FfprobeProbe::with_path(ffprobe_path),
        }
    }

    async fn run(
        &self,
        video: &Path,
        count: usize,
        size: FrameSize,
        out_dir: &Path,
    ) -> Result<(), MediaError> {
        let info = self.probe.probe(video).await?;
        let duration = info.duration_secs.ok_or_else(|| MediaError::InvalidOutput {
            path: video.to_path_buf(),
            message: "unknown duration".to_string(),
        })?;

        for (i, offset) in sample_offsets(duration, count).into_iter().enumerate() {
            let target = out_dir.join(frame_file_name(i + 1));
            debug!(video = %video.display(), offset, "extracting frame");

            let output = Command::new(&self.ffmpeg_path)
                .args(["-v", "error", "-ss"])
                .arg(format!("{offset:.3}"))
                .arg("-i")
                .arg(video)
                .args(["-frames:v", "1", "-vf"])
                .arg(format!("scale={}:{}", size.width, size.height))
                .arg("-y")
                .arg(&target)
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|source| MediaError::Spawn {
                    tool: self.ffmpeg_path.display().to_string(),
                    source,
                })?;

            if !output.status.success() {
                return Err(MediaError::ToolFailed {
                    tool: "ffmpeg".to_string(),
                    path: video.to_path_buf(),
                    message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
        }

        Ok(())
    }
}

impl Default for FfmpegFrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for FfmpegFrameDecoder {
    fn decode_frames<'a>(
        &'a self,
        video: &'a Path,
        count: usize,
        size: FrameSize,
        out_dir: &'a Path,
    ) -> BoxFuture<'a, Result<(), MediaError>> {
        Box::pin(self.run(video, count, size, out_dir))
    }
}

/// Evenly spaced timestamps strictly inside `(0, duration)`.
fn sample_offsets(duration: f64, count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| duration * (i + 1) as f64 / (count + 1) as f64)
        .collect()
}
