//! Stream metadata probing.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::process::Command;

use crate::{BoxFuture, MediaError};

/// Stream metadata of a media file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    /// Codec of the first video stream.
    pub codec: Option<String>,
    /// Container format name(s), as reported by the probe.
    pub container: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_secs: Option<f64>,
    /// Overall bit rate in bits per second.
    pub bit_rate: Option<u64>,
}

/// Something that can read stream metadata from a media file.
pub trait MediaProbe: Send + Sync {
    /// Probe `path`.
    fn probe<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<MediaInfo, MediaError>>;
}

/// [`MediaProbe`] backed by the `ffprobe` executable.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    ffprobe_path: PathBuf,
}

impl FfprobeProbe {
    /// Use `ffprobe` from `PATH`.
    pub fn new() -> Self {
        Self {
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }

    /// Use a specific `ffprobe` binary.
    pub fn with_path(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    async fn run(&self, path: &Path) -> Result<MediaInfo, MediaError> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                tool: self.ffprobe_path.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(MediaError::ToolFailed {
                tool: "ffprobe".to_string(),
                path: path.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let json = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(path, &json)
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaProbe for FfprobeProbe {
    fn probe<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<MediaInfo, MediaError>> {
        Box::pin(self.run(path))
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

/// Parse `ffprobe -print_format json` output.
pub(crate) fn parse_probe_output(path: &Path, json: &str) -> Result<MediaInfo, MediaError> {
    let parsed: ProbeOutput = serde_json::from_str(json).map_err(|e| MediaError::InvalidOutput {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    // Container duration is authoritative; some containers only carry it per stream.
    let duration_secs = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or_else(|| video.and_then(|v| v.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    Ok(MediaInfo {
        codec: video.and_then(|v| v.codec_name.clone()),
        container: parsed.format.as_ref().and_then(|f| f.format_name.clone()),
        width: video.and_then(|v| v.width).filter(|w| *w > 0),
        height: video.and_then(|v| v.height).filter(|h| *h > 0),
        duration_secs,
        bit_rate: parsed
            .format
            .as_ref()
            .and_then(|f| f.bit_rate.as_deref())
            .and_then(|b| b.parse().ok()),
    })
}
