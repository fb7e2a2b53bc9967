//! Content digests and perceptual fingerprints.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! content_digest {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub [u8; 16]);

        impl $name {
            /// Create a digest from raw bytes.
            pub fn new(bytes: [u8; 16]) -> Self {
                Self(bytes)
            }

            /// Get the digest as a lower-case hex string.
            pub fn to_hex(&self) -> String {
                self.0.iter().map(|b| format!("{b:02x}")).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }
    };
}

content_digest!(
    /// 128-bit digest of the head, middle and tail of a file plus its size.
    ///
    /// Equal fast digests only make two files *suspicious*; they are never
    /// proof of duplication on their own.
    FastDigest
);

content_digest!(
    /// 128-bit digest of a file's complete byte stream.
    FullDigest
);

/// A 64-bit perceptual hash of a single video frame.
///
/// Visually similar frames produce codes with a small Hamming distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerceptualHash(pub u64);

impl PerceptualHash {
    /// Number of bits in a hash code.
    pub const BITS: u32 = u64::BITS;

    /// Count of differing bit positions.
    pub fn distance(&self, other: &PerceptualHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Ordered perceptual hashes of the frames sampled from one video.
///
/// An empty fingerprint marks a file whose frames could not be extracted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint(Vec<PerceptualHash>);

impl Fingerprint {
    /// Create a fingerprint from frame hashes in frame order.
    pub fn new(hashes: Vec<PerceptualHash>) -> Self {
        Self(hashes)
    }

    /// The sentinel for a failed extraction.
    pub fn unusable() -> Self {
        Self(Vec::new())
    }

    /// Whether this fingerprint can take part in visual comparison.
    pub fn is_usable(&self) -> bool {
        !self.0.is_empty()
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no frames.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Frame hashes in order.
    pub fn frames(&self) -> &[PerceptualHash] {
        &self.0
    }
}

impl FromIterator<PerceptualHash> for Fingerprint {
    fn from_iter<I: IntoIterator<Item = PerceptualHash>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
