//! Perceptual video fingerprints.
//!
//! A fingerprint is the sequence of 64-bit blockhashes of a few frames
//! sampled evenly across a video. Frames are decoded into a private
//! temporary directory that is removed as soon as the frames are hashed, on
//! every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig, ImageHash};
use reelsift_core::{Fingerprint, FrameSize, MediaError, PerceptualHash};
use reelsift_media::{FrameDecoder, frame_index};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Blocks per side of the hash grid (8 x 8 blocks -> 64 bits).
const HASH_SIDE: u32 = 8;

/// Frames written by a decoder into a directory owned by this value.
///
/// Dropping it deletes the directory and everything in it.
#[derive(Debug)]
pub struct ExtractedFrames {
    dir: TempDir,
    frames: Vec<PathBuf>,
}

impl ExtractedFrames {
    /// Frame image paths in extraction order.
    pub fn frames(&self) -> &[PathBuf] {
        &self.frames
    }

    /// The temporary directory holding the frames.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Samples frames from videos and reduces them to fingerprints.
#[derive(Clone)]
pub struct FingerprintExtractor {
    decoder: Arc<dyn FrameDecoder>,
    hasher: Arc<Hasher>,
    frame_size: FrameSize,
}

impl FingerprintExtractor {
    /// Create an extractor using `decoder` at the default 320x240 frame size.
    pub fn new(decoder: Arc<dyn FrameDecoder>) -> Self {
        let hasher = HasherConfig::new()
            .hash_alg(HashAlg::Blockhash)
            .hash_size(HASH_SIDE, HASH_SIDE)
            .to_hasher();

        Self {
            decoder,
            hasher: Arc::new(hasher),
            frame_size: FrameSize::default(),
        }
    }

    /// Set the frame size requested from the decoder.
    pub fn with_frame_size(mut self, frame_size: FrameSize) -> Self {
        self.frame_size = frame_size;
        self
    }

    /// Decode `count` evenly spaced frames of `path` into a fresh temporary
    /// directory.
    pub async fn extract_key_frames(
        &self,
        path: &Path,
        count: usize,
    ) -> Result<ExtractedFrames, MediaError> {
        let dir = tempfile::Builder::new()
            .prefix("reelsift-frames-")
            .tempdir()
            .map_err(|e| MediaError::io(std::env::temp_dir(), e))?;

        self.decoder
            .decode_frames(path, count, self.frame_size, dir.path())
            .await?;

        let mut indexed: Vec<(usize, PathBuf)> = std::fs::read_dir(dir.path())
            .map_err(|e| MediaError::io(dir.path(), e))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter_map(|p| frame_index(&p).map(|i| (i, p)))
            .collect();

        if indexed.is_empty() {
            return Err(MediaError::NoFrames {
                path: path.to_path_buf(),
            });
        }

        // Numeric order: frame-10 comes after frame-9.
        indexed.sort_by_key(|(i, _)| *i);

        Ok(ExtractedFrames {
            dir,
            frames: indexed.into_iter().map(|(_, p)| p).collect(),
        })
    }

    /// Fingerprint `path` from `frame_count` sampled frames.
    ///
    /// Any failure yields [`Fingerprint::unusable`]; the error is logged.
    pub async fn fingerprint(&self, path: &Path, frame_count: usize) -> Fingerprint {
        match self.try_fingerprint(path, frame_count).await {
            Ok(fingerprint) => {
                debug!(path = %path.display(), frames = fingerprint.len(), "fingerprinted");
                fingerprint
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "fingerprint extraction failed");
                Fingerprint::unusable()
            }
        }
    }

    /// Perceptual hash of one frame image file.
    pub fn perceptual_hash(&self, frame_path: &Path) -> Result<PerceptualHash, MediaError> {
        hash_frame(&self.hasher, frame_path)
    }

    /// Perceptual hash of an already decoded frame.
    pub fn hash_image(&self, image: &DynamicImage) -> PerceptualHash {
        pack_hash(&self.hasher.hash_image(image))
    }

    async fn try_fingerprint(
        &self,
        path: &Path,
        frame_count: usize,
    ) -> Result<Fingerprint, MediaError> {
        let extracted = self.extract_key_frames(path, frame_count).await?;
        let frames = extracted.frames.clone();
        let hasher = Arc::clone(&self.hasher);

        let hashes = tokio::task::spawn_blocking(move || {
            frames
                .iter()
                .map(|frame| hash_frame(&hasher, frame))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| MediaError::Image {
            path: path.to_path_buf(),
            message: format!("hashing task failed: {e}"),
        })??;

        // The frames are no longer needed; remove them now rather than at scope end.
        drop(extracted);

        Ok(Fingerprint::new(hashes))
    }
}

impl std::fmt::Debug for FingerprintExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintExtractor")
            .field("frame_size", &self.frame_size)
            .finish_non_exhaustive()
    }
}

/// Decode one frame image and blockhash it.
fn hash_frame(hasher: &Hasher, frame_path: &Path) -> Result<PerceptualHash, MediaError> {
    let img = image::open(frame_path).map_err(|e| MediaError::Image {
        path: frame_path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(pack_hash(&hasher.hash_image(&img)))
}

/// The 8 hash bytes as a big-endian `u64`.
fn pack_hash(hash: &ImageHash) -> PerceptualHash {
    let mut bytes = [0u8; 8];
    for (dst, src) in bytes.iter_mut().zip(hash.as_bytes()) {
        *dst = *src;
    }
    PerceptualHash(u64::from_be_bytes(bytes))
}
