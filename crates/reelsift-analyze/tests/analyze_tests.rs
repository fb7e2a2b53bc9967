use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use image::{Rgb, RgbImage};
use reelsift_analyze::{
    ContentHasher, FileDescriptor, Fingerprint, FingerprintExtractor, PerceptualHash,
    SimilarGroupBuilder, SimilarityScorer, build_duplicate_groups, visual_similarity,
};
use reelsift_core::{DetectionConfig, FrameSize, MediaError, SimilarityOptions};
use reelsift_media::{BoxFuture, FrameDecoder, frame_file_name};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Writes `count` synthetic JPEG frames: left half `left`, right half `right`.
struct PatternDecoder {
    left: u8,
    right: u8,
    fail: bool,
    calls: AtomicUsize,
    last_dir: Mutex<Option<PathBuf>>,
}

impl PatternDecoder {
    fn new(left: u8, right: u8) -> Self {
        Self {
            left,
            right,
            fail: false,
            calls: AtomicUsize::new(0),
            last_dir: Mutex::new(None),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(0, 0)
        }
    }
}

impl FrameDecoder for PatternDecoder {
    fn decode_frames<'a>(
        &'a self,
        video: &'a Path,
        count: usize,
        size: FrameSize,
        out_dir: &'a Path,
    ) -> BoxFuture<'a, Result<(), MediaError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_dir.lock().unwrap() = Some(out_dir.to_path_buf());

            if self.fail {
                return Err(MediaError::ToolFailed {
                    tool: "fake".to_string(),
                    path: video.to_path_buf(),
                    message: "corrupt stream".to_string(),
                });
            }

            // Written back to front so directory order never matches frame order.
            for i in (1..=count).rev() {
                let img = RgbImage::from_fn(size.width, size.height, |x, _| {
                    let v = if x < size.width / 2 {
                        self.left
                    } else {
                        self.right
                    };
                    Rgb([v, v, v])
                });
                img.save(out_dir.join(frame_file_name(i)))
                    .map_err(|e| MediaError::Image {
                        path: out_dir.to_path_buf(),
                        message: e.to_string(),
                    })?;
            }
            Ok(())
        })
    }
}

fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn video(name: &str, size: u64, w: u32, h: u32, secs: f64) -> FileDescriptor {
    FileDescriptor::new(format!("/library/{name}"), size, Utc::now())
        .with_dimensions(w, h)
        .with_duration(secs)
}

#[test]
fn test_identical_files_share_both_digests() {
    let temp = TempDir::new().unwrap();
    let content = vec![42u8; 300 * 1024];
    let a = write(&temp, "a.mp4", &content);
    let b = write(&temp, "b.mp4", &content);

    let hasher = ContentHasher::new();
    assert_eq!(hasher.fast_digest(&a).unwrap(), hasher.fast_digest(&b).unwrap());
    assert_eq!(hasher.full_digest(&a).unwrap(), hasher.full_digest(&b).unwrap());

    let outcome = hasher.two_phase_group(&[a, b], &CancellationToken::new(), |_| {});
    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.groups[0].len(), 2);
}

#[test]
fn test_fast_collision_split_by_full_digest() {
    // Same size, same sampled windows, different unsampled byte.
    let temp = TempDir::new().unwrap();
    let mut content = vec![0u8; 64];
    let a = write(&temp, "a.mp4", &content);
    content[10] = 1;
    let b = write(&temp, "b.mp4", &content);

    let hasher = ContentHasher::with_chunk_size(8);
    assert_eq!(hasher.fast_digest(&a).unwrap(), hasher.fast_digest(&b).unwrap());

    let mut verified = 0;
    let outcome = hasher.two_phase_group(&[a, b], &CancellationToken::new(), |p| {
        if p.phase == reelsift_core::DetectionPhase::FullDigest {
            verified += 1;
        }
    });
    assert_eq!(verified, 2);
    assert!(outcome.groups.is_empty());
}

#[test]
fn test_three_file_duplicate_scenario() {
    let temp = TempDir::new().unwrap();
    let same = vec![7u8; 1024];
    let paths = vec![
        write(&temp, "one.mp4", &same),
        write(&temp, "two.mp4", &same),
        write(&temp, "three.mp4", &[9u8; 1024]),
    ];

    let outcome = ContentHasher::new().two_phase_group(&paths, &CancellationToken::new(), |_| {});
    let groups = build_duplicate_groups(outcome.groups.into_iter().map(|(digest, members)| {
        let files = members
            .iter()
            .map(|p| FileDescriptor::new(p, fs::metadata(p).unwrap().len(), Utc::now()))
            .collect();
        (digest, files)
    }));

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].count(), 2);
    assert_eq!(groups[0].total_size, 2048);
    assert_eq!(groups[0].waste_size, 1024);
}

#[test]
fn test_unreadable_file_is_skipped() {
    let temp = TempDir::new().unwrap();
    let a = write(&temp, "a.mp4", b"same bytes");
    let b = write(&temp, "b.mp4", b"same bytes");
    let missing = temp.path().join("missing.mp4");

    let outcome = ContentHasher::new().two_phase_group(
        &[a, missing.clone(), b],
        &CancellationToken::new(),
        |_| {},
    );
    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.failed, vec![missing]);
}

#[test]
fn test_similarity_scenario_accepted() {
    let a = video("a.mp4", 100_000_000, 1920, 1080, 100.0);
    let b = video("b.mp4", 102_000_000, 1920, 1078, 101.0);

    // Five frames, three differing bits each (< 5%).
    let fp_a = Fingerprint::new(vec![PerceptualHash(0x0F0F_0F0F_0F0F_0F0F); 5]);
    let fp_b = Fingerprint::new(vec![PerceptualHash(0x0F0F_0F0F_0F0F_0F08); 5]);
    let visual = visual_similarity(&fp_a, &fp_b);
    assert!(visual > 0.95);

    let scorer = SimilarityScorer::default();
    assert!(scorer.prefilter(&a, &b, 0.8 * 0.6));

    let score = scorer.overall(&a, &b, visual);
    assert!(score.overall() >= 0.8, "overall {}", score.overall());
    assert!((score.overall() - 0.976).abs() < 0.01);
}

#[test]
fn test_overall_symmetric_and_bounded() {
    let scorer = SimilarityScorer::default();
    let files = [
        video("a.mp4", 1, 1, 1, 0.5),
        video("b.mp4", 10_000, 3840, 2160, 7200.0),
        video("c.mp4", 0, 640, 480, 30.0),
        FileDescriptor::new("/library/d.mp4", 500, Utc::now()),
    ];

    for a in &files {
        for b in &files {
            for visual in [0.0, 0.5, 1.0] {
                let ab = scorer.overall(a, b, visual).overall();
                let ba = scorer.overall(b, a, visual).overall();
                assert_eq!(ab, ba);
                assert!((0.0..=1.0).contains(&ab));
            }
        }
    }
}

#[test]
fn test_metadata_only_match_scores_metadata_weight() {
    // Metadata identical, visual 0: overall is exactly the metadata weight.
    let a = video("a.mp4", 1000, 1280, 720, 60.0);
    let scorer = SimilarityScorer::default();
    let score = scorer.overall(&a, &a, 0.0);
    assert!((score.overall() - 0.5).abs() < 1e-12);
    assert_eq!(score.visual(), 0.0);
}

#[test]
fn test_disabled_visual_renormalizes() {
    let options = SimilarityOptions {
        check_visual: false,
        ..SimilarityOptions::new(0.8)
    };
    let scorer = SimilarityScorer::for_run(&DetectionConfig::default(), &options).unwrap();
    assert!(!scorer.uses_visual());

    let a = video("a.mp4", 1000, 1280, 720, 60.0);
    let score = scorer.overall(&a, &a, 0.0);
    assert!((score.overall() - 1.0).abs() < 1e-9);
}

#[test]
fn test_similar_groups_transitive() {
    let files = vec![
        video("a.mp4", 1, 1, 1, 1.0),
        video("b.mp4", 1, 1, 1, 1.0),
        video("c.mp4", 1, 1, 1, 1.0),
    ];
    let scorer = SimilarityScorer::default();

    let mut builder = SimilarGroupBuilder::new(files.len());
    builder.add_pair(0, 1, scorer.overall(&files[0], &files[1], 1.0));
    builder.add_pair(1, 2, scorer.overall(&files[1], &files[2], 1.0));

    let groups = builder.finish(&files);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].count(), 3);
}

#[tokio::test]
async fn test_extract_key_frames_in_numeric_order() {
    let decoder = Arc::new(PatternDecoder::new(200, 20));
    let extractor = FingerprintExtractor::new(decoder.clone()).with_frame_size(FrameSize {
        width: 32,
        height: 24,
    });

    let frames = extractor
        .extract_key_frames(Path::new("/library/a.mp4"), 12)
        .await
        .unwrap();

    let names: Vec<_> = frames
        .frames()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 12);
    assert_eq!(names[0], "frame-1.jpg");
    assert_eq!(names[1], "frame-2.jpg");
    assert_eq!(names[9], "frame-10.jpg");

    let dir = frames.dir().to_path_buf();
    assert!(dir.exists());
    drop(frames);
    assert!(!dir.exists());
}

#[tokio::test]
async fn test_fingerprint_same_content_is_identical() {
    let size = FrameSize {
        width: 64,
        height: 48,
    };
    let extractor = |left, right| {
        FingerprintExtractor::new(Arc::new(PatternDecoder::new(left, right)))
            .with_frame_size(size)
    };
    let a = extractor(220, 30);
    let b = extractor(220, 30);
    let inverted = extractor(30, 220);

    let fp_a = a.fingerprint(Path::new("/library/a.mp4"), 5).await;
    let fp_b = b.fingerprint(Path::new("/library/b.mp4"), 5).await;
    let fp_c = inverted.fingerprint(Path::new("/library/c.mp4"), 5).await;

    assert_eq!(fp_a.len(), 5);
    assert_eq!(visual_similarity(&fp_a, &fp_b), 1.0);
    assert!(visual_similarity(&fp_a, &fp_c) < 0.5);
}

#[tokio::test]
async fn test_fingerprint_failure_is_unusable_and_cleans_up() {
    let decoder = Arc::new(PatternDecoder::failing());
    let extractor = FingerprintExtractor::new(decoder.clone());

    let fp = extractor.fingerprint(Path::new("/library/broken.mp4"), 5).await;
    assert!(!fp.is_usable());
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);

    let dir = decoder.last_dir.lock().unwrap().clone().unwrap();
    assert!(!dir.exists());
}

#[test]
fn test_perceptual_hash_of_image_file() {
    let temp = TempDir::new().unwrap();
    let bright_left = temp.path().join("frame-1.png");
    let bright_right = temp.path().join("frame-2.png");
    let white = Rgb([255, 255, 255]);
    let black = Rgb([0, 0, 0]);
    RgbImage::from_fn(320, 240, |x, _| if x < 160 { white } else { black })
        .save(&bright_left)
        .unwrap();
    RgbImage::from_fn(320, 240, |x, _| if x < 160 { black } else { white })
        .save(&bright_right)
        .unwrap();

    let extractor = FingerprintExtractor::new(Arc::new(PatternDecoder::new(0, 0)));
    let a = extractor.perceptual_hash(&bright_left).unwrap();
    let b = extractor.perceptual_hash(&bright_right).unwrap();
    assert_eq!(a.0.count_ones(), 32);
    assert_eq!(a.distance(&b), PerceptualHash::BITS);

    assert!(extractor.perceptual_hash(&temp.path().join("missing.png")).is_err());
}
