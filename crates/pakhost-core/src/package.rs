//! Package records, identities, and the removal seam.

use pakhost_schema::{FileSpec, PackageEntry, PackageName, Platform, Version};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// Key of a (name, version) group in the package table.
///
/// Solo packages may be versionless, so the version half is optional; an
/// empty version attribute in the manifest normalizes to absent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PackageKey {
    /// Package name.
    pub name: PackageName,
    /// Package version, if the group is versioned.
    pub version: Option<Version>,
}

impl PackageKey {
    /// Create a new group key.
    pub fn new(name: PackageName, version: Option<Version>) -> Self {
        Self { name, version }
    }
}

/// Full identity of a single package variant: (name, version, platform).
///
/// Identities are immutable once a record is created; a record is superseded
/// only by deletion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PackageId {
    /// Package name.
    pub name: PackageName,
    /// Package version, if versioned.
    pub version: Option<Version>,
    /// Platform variant; absent means "no particular platform".
    pub platform: Option<Platform>,
}

impl std::fmt::Display for PackageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(version) = &self.version {
            write!(f, "/{version}")?;
        }
        if let Some(platform) = &self.platform {
            write!(f, " ({platform})")?;
        }
        Ok(())
    }
}

/// One package variant served by a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageRecord {
    /// Package name.
    pub name: PackageName,
    /// Package version, if versioned.
    pub version: Option<Version>,
    /// Platform variant; absent means "no particular platform".
    pub platform: Option<Platform>,
    /// Whether the package is a standalone single-file download.
    pub solo: bool,
    /// Descriptor of the package description file.
    pub desc_file: FileSpec,
    /// Descriptor of the import description file, if published.
    pub import_desc_file: Option<FileSpec>,
}

impl PackageRecord {
    /// Build a record from a parsed manifest entry.
    pub fn from_entry(entry: &PackageEntry) -> Self {
        Self {
            name: entry.name.clone(),
            version: entry.version.clone(),
            platform: entry.platform.clone(),
            solo: entry.solo,
            desc_file: entry.desc_file.clone(),
            import_desc_file: entry.import_desc_file.clone(),
        }
    }

    /// The record's group key.
    pub fn key(&self) -> PackageKey {
        PackageKey::new(self.name.clone(), self.version.clone())
    }

    /// The record's full identity.
    pub fn id(&self) -> PackageId {
        PackageId {
            name: self.name.clone(),
            version: self.version.clone(),
            platform: self.platform.clone(),
        }
    }
}

/// How a lookup selects among a group's platform variants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlatformFilter {
    /// The resolver's runtime platform variant if present, else the
    /// platform-agnostic variant. Never an unrelated platform.
    #[default]
    Preferred,
    /// Exactly this platform's variant.
    Exact(Platform),
    /// Exactly the platform-agnostic variant.
    Agnostic,
}

/// External deletion side effect invoked for each package actually removed
/// from the table.
pub trait PackageRemover {
    /// Called once per removed record. `dir` is the package's install
    /// directory when the host directory is known.
    fn remove_package(&mut self, record: &PackageRecord, dir: Option<&Path>);
}

/// [`PackageRemover`] that deletes the package's install tree from disk.
#[derive(Debug, Default)]
pub struct FsRemover;

impl PackageRemover for FsRemover {
    fn remove_package(&mut self, record: &PackageRecord, dir: Option<&Path>) {
        let Some(dir) = dir else { return };
        info!(package = %record.name, dir = %dir.display(), "deleting package files");
        if let Err(err) = std::fs::remove_dir_all(dir) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("could not remove {}: {err}", dir.display());
            }
        }
    }
}

/// [`PackageRemover`] that does nothing.
///
/// Useful when the caller only wants the table updated, or in tests.
#[derive(Debug, Default)]
pub struct NullRemover;

impl PackageRemover for NullRemover {
    fn remove_package(&mut self, _record: &PackageRecord, _dir: Option<&Path>) {}
}
