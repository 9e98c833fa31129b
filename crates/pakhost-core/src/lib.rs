//! Core host-resolution library for pakhost.
//!
//! A [`host::HostResolver`] owns one remote package host: it downloads and
//! parses the host's `contents.xml` manifest, resolves package lookups by
//! name/version/platform, tracks mirrors and alternate hosts, and derives
//! the deterministic local directory the host's content lives in.

pub mod error;
pub mod host;
pub mod package;
pub mod paths;
pub mod transport;

pub use error::HostError;
pub use host::{ContentsChange, DEFAULT_FETCH_ATTEMPTS, HostOptions, HostResolver};
pub use package::{
    FsRemover, NullRemover, PackageId, PackageRecord, PackageRemover, PlatformFilter,
};
pub use paths::determine_host_dir;
pub use transport::{HttpTransport, Transport, TransportError};

/// User Agent string for host requests
pub const USER_AGENT: &str = concat!("pakhost/", env!("CARGO_PKG_VERSION"));
