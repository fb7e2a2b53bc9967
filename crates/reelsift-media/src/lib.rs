//! External media collaborators for reelsift.
//!
//! The detection engine never talks to ffmpeg directly. It goes through two
//! narrow capabilities:
//!
//! - [`MediaProbe`] - stream metadata for a file (dimensions, duration, codec)
//! - [`FrameDecoder`] - evenly spaced, downscaled still frames from a video
//!
//! [`FfprobeProbe`] and [`FfmpegFrameDecoder`] implement them by running the
//! ffmpeg command-line tools. Tests substitute deterministic fakes.

use std::future::Future;
use std::pin::Pin;

mod decoder;
mod probe;

pub use decoder::{FfmpegFrameDecoder, FrameDecoder, frame_file_name, frame_index};
pub use probe::{FfprobeProbe, MediaInfo, MediaProbe};

pub use reelsift_core::{FrameSize, MediaError};

/// Type alias for boxed futures returned by collaborator methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
