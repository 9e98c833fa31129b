//! Error types for host resolution.

use crate::transport::TransportError;
use pakhost_schema::ManifestError;
use thiserror::Error;

/// Errors surfaced by [`crate::host::HostResolver`] operations.
///
/// A package or variant that simply is not present is a normal negative
/// result (`Ok(None)`, or membership in the returned not-found list), never
/// an error.
#[derive(Error, Debug)]
pub enum HostError {
    /// The resolver was constructed or used with an unusable configuration.
    #[error("invalid host options: {0}")]
    Options(&'static str),

    /// A network fetch was requested but no host URL is known yet.
    #[error("host URL is not known")]
    UrlNotKnown,

    /// Every download attempt failed; the last failure is attached.
    #[error("unable to fetch {url} after {attempts} attempt(s): {source}")]
    Transport {
        /// The URL that was being fetched.
        url: String,
        /// How many attempts were made before giving up.
        attempts: u32,
        /// The error from the final attempt.
        source: TransportError,
    },

    /// The downloaded or on-disk contents file could not be parsed.
    /// Host state is left untouched.
    #[error("contents file is malformed: {0}")]
    Parse(#[from] ManifestError),

    /// A package query was issued before a contents file was ever loaded.
    #[error("contents file has not been loaded")]
    NotReady,

    /// Filesystem access failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
