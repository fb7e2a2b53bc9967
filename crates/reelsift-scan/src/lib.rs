//! Media library scanning for reelsift.
//!
//! This crate turns a directory into the [`FileDescriptor`]s the detection
//! engine works on:
//!
//! - **Traversal** via jwalk, optionally recursive
//! - **Filtering** by video extension and glob ignore patterns
//! - **Probing** each file for dimensions and duration under a concurrency limit
//! - **Progress updates** via broadcast channels
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reelsift_scan::{LibraryScanner, ScanConfig};
//! use reelsift_media::FfprobeProbe;
//!
//! # async fn run() -> Result<(), reelsift_scan::ScanError> {
//! let scanner = LibraryScanner::new(Arc::new(FfprobeProbe::new()));
//! let scan = scanner.scan(&ScanConfig::new("/media/videos")).await?;
//!
//! println!("Found {} videos", scan.files.len());
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod progress;
mod scanner;

pub use config::{ScanConfig, ScanConfigBuilder};
pub use error::ScanError;
pub use progress::ScanProgress;
pub use scanner::{LibraryScan, LibraryScanner, ScanWarning};

// Re-export core types for convenience
pub use reelsift_core::{FileDescriptor, VIDEO_EXTENSIONS};
