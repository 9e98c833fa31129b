//! Shared types and wire format for pakhost.
//!
//! A download host publishes a single `contents.xml` manifest describing
//! itself (mirrors, alternate hosts, display name) and every package it
//! serves. This crate owns the typed document model for that manifest, the
//! parser that populates it, and the small value types (names, versions,
//! platforms, digests, file descriptors) shared between the core library and
//! the CLI.

pub mod filespec;
pub mod manifest;
pub mod types;

// Re-exports
pub use filespec::{FileSpec, Md5Hash};
pub use manifest::{ContentsDoc, HostEntry, ManifestError, PackageEntry, parse_contents};
pub use types::{PackageName, Platform, Version};

/// Basename of the manifest file every host serves at its URL prefix.
pub const CONTENTS_FILENAME: &str = "contents.xml";
