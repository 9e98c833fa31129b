//! Embedded file descriptors.
//!
//! Every `<package>` element in a manifest carries the descriptor of its
//! package description file (name, size, timestamp, MD5 digest), and
//! optionally an `<import>` child with the same shape. The digest algorithm
//! is part of the wire format shared with companion implementations and is
//! not configurable.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Newtype for an MD5 digest string (32 hex characters).
///
/// Provides compile-time distinction from other strings and optional runtime
/// validation. MD5 is retained here as a wire-format contract, not as a
/// security boundary: directory hashing and manifest change detection must
/// agree byte-for-byte across implementations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Md5Hash(String);

impl Md5Hash {
    /// Create a new `Md5Hash` without validation (for deserialized data).
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Create a validated `Md5Hash` (32 hex characters, lowercased).
    ///
    /// # Errors
    ///
    /// Returns an error string if `s` is not exactly 32 ASCII hex characters.
    pub fn validated(s: &str) -> Result<Self, String> {
        if s.len() == 32 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(s.to_lowercase()))
        } else {
            Err(format!("Invalid MD5 hash: expected 32 hex chars, got '{s}'"))
        }
    }

    /// Compute the MD5 digest of a byte slice.
    pub fn compute(data: &[u8]) -> Self {
        use md5::{Digest, Md5};
        let mut hasher = Md5::new();
        hasher.update(data);
        Self(hex::encode(hasher.finalize()))
    }

    /// Compute the MD5 digest of a file by reading it entirely into memory.
    ///
    /// Manifests and descriptor files are small; streaming is not worth it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read.
    pub fn compute_file(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::compute(&data))
    }

    /// Return the inner hex string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Md5Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Md5Hash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Descriptor of a single downloadable file: name, size, and digest.
///
/// Parsed from the attributes of a `<package>` or `<import>` manifest
/// element. Any field other than `size` may be absent in older manifests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    /// Path of the file relative to the host directory.
    pub filename: Option<String>,
    /// Expected size in bytes.
    pub size: u64,
    /// Unix timestamp recorded when the file was published.
    pub timestamp: Option<u64>,
    /// Expected MD5 digest of the file contents.
    pub hash: Option<Md5Hash>,
}

impl FileSpec {
    /// Quick check: does the file exist with the expected size?
    ///
    /// This is the cheap probe used to decide whether a download can be
    /// skipped; it does not read the file contents.
    pub fn check_file(&self, path: &Path) -> bool {
        match std::fs::metadata(path) {
            Ok(meta) => meta.is_file() && meta.len() == self.size,
            Err(_) => false,
        }
    }

    /// Full verification: size plus MD5 digest comparison.
    ///
    /// Returns `true` when the file matches this descriptor. A descriptor
    /// without a recorded hash verifies on size alone.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be read.
    pub fn full_verify(&self, path: &Path) -> std::io::Result<bool> {
        if !self.check_file(path) {
            return Ok(false);
        }
        match &self.hash {
            Some(expected) => Ok(Md5Hash::compute_file(path)? == *expected),
            None => Ok(true),
        }
    }
}
