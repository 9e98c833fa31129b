//! One remote package host: manifest fetching, parsing, and package lookup.
//!
//! A [`HostResolver`] becomes usable only after its `contents.xml` has been
//! fetched (or read from disk) and parsed; every package query before that
//! is answered with [`HostError::NotReady`]. Parsing never partially
//! applies: a malformed manifest leaves the resolver exactly as it was.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use pakhost_schema::{
    CONTENTS_FILENAME, ContentsDoc, HostEntry, Md5Hash, PackageName, Platform, Version,
    manifest::parse_contents_bytes,
};
use tracing::{info, warn};

use crate::error::HostError;
use crate::package::{PackageId, PackageKey, PackageRecord, PackageRemover, PlatformFilter};
use crate::paths::determine_host_dir;
use crate::transport::Transport;

/// Default number of tries for the manifest download.
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;

/// Construction-time configuration for a [`HostResolver`].
///
/// At least one of `root_dir` / `host_dir` must be provided: with only a
/// URL there is nowhere to anchor the host's install tree.
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// URL of the host, if already known. Absent means "determine later"
    /// from an on-disk manifest (see [`HostResolver::read_contents_file`]).
    pub host_url: Option<String>,
    /// Root directory under which `hosts/...` trees are created.
    pub root_dir: Option<PathBuf>,
    /// Explicit host directory, when initializing from one found on disk.
    pub host_dir: Option<PathBuf>,
    /// Populate a mirror folder: keep archives compressed, default to
    /// per-platform layout.
    pub as_mirror: bool,
    /// Unpack into platform-specific subdirectories. Defaults to the value
    /// of `as_mirror`.
    pub per_platform: Option<bool>,
    /// Optional super-mirror URL tried before the host itself.
    pub super_mirror: Option<String>,
    /// The runtime platform this resolver resolves for.
    pub platform: Platform,
    /// Manifest download attempts before giving up.
    pub attempts: u32,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            host_url: None,
            root_dir: None,
            host_dir: None,
            as_mirror: false,
            per_platform: None,
            super_mirror: None,
            platform: Platform::current(),
            attempts: DEFAULT_FETCH_ATTEMPTS,
        }
    }
}

/// Result of a forced manifest re-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentsChange {
    /// The redownloaded manifest hashes differently from the stored one.
    Changed,
    /// The redownloaded manifest is byte-identical to the stored one.
    Unchanged,
}

/// A particular download host serving versioned packages.
///
/// Not safe for concurrent use; callers needing concurrent host management
/// serialize access externally.
#[derive(Debug)]
pub struct HostResolver {
    host_url: Option<String>,
    host_url_prefix: Option<String>,
    download_url_prefix: Option<String>,
    root_dir: Option<PathBuf>,
    host_dir: Option<PathBuf>,
    as_mirror: bool,
    per_platform: bool,
    super_mirror: Option<String>,
    platform: Platform,
    attempts: u32,

    has_contents: bool,
    descriptive_name: Option<String>,
    mirrors: Vec<String>,
    alt_hosts: BTreeMap<String, String>,
    packages: BTreeMap<PackageKey, BTreeMap<Option<Platform>, PackageRecord>>,
}

impl HostResolver {
    /// Create a resolver for one host.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Options`] if neither `root_dir` nor `host_dir`
    /// is provided.
    pub fn new(options: HostOptions) -> Result<Self, HostError> {
        if options.root_dir.is_none() && options.host_dir.is_none() {
            return Err(HostError::Options(
                "either root_dir or host_dir must be provided",
            ));
        }

        let mut resolver = Self {
            host_url: None,
            host_url_prefix: None,
            download_url_prefix: None,
            root_dir: options.root_dir,
            host_dir: options.host_dir,
            as_mirror: options.as_mirror,
            per_platform: options.per_platform.unwrap_or(options.as_mirror),
            super_mirror: options.super_mirror,
            platform: options.platform,
            attempts: options.attempts.max(1),
            has_contents: false,
            descriptive_name: None,
            mirrors: Vec::new(),
            alt_hosts: BTreeMap::new(),
            packages: BTreeMap::new(),
        };
        resolver.set_host_url(options.host_url);
        Ok(resolver)
    }

    /// Whether a contents file has been successfully loaded.
    pub fn has_contents(&self) -> bool {
        self.has_contents
    }

    /// The host URL, if known.
    pub fn host_url(&self) -> Option<&str> {
        self.host_url.as_deref()
    }

    /// The host URL normalized to end with a slash.
    pub fn host_url_prefix(&self) -> Option<&str> {
        self.host_url_prefix.as_deref()
    }

    /// URL prefix for everything other than the contents file itself.
    ///
    /// Differs from [`host_url_prefix`](Self::host_url_prefix) when the
    /// manifest redirects downloads, e.g. from a TLS host to a cleartext
    /// channel.
    pub fn download_url_prefix(&self) -> Option<&str> {
        self.download_url_prefix.as_deref()
    }

    /// Human-readable host name from the manifest.
    pub fn descriptive_name(&self) -> Option<&str> {
        self.descriptive_name.as_deref()
    }

    /// The host's local directory, once known.
    pub fn host_dir(&self) -> Option<&Path> {
        self.host_dir.as_deref()
    }

    /// Known mirrors, deduplicated, each guaranteed to end with a slash.
    pub fn mirrors(&self) -> &[String] {
        &self.mirrors
    }

    /// Look up an alternate-host URL by keyword.
    pub fn alt_host(&self, keyword: &str) -> Option<&str> {
        self.alt_hosts.get(keyword).map(String::as_str)
    }

    /// All alternate hosts as (keyword, URL) pairs.
    pub fn alt_hosts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.alt_hosts
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The runtime platform this resolver resolves for.
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Whether this resolver populates a mirror folder.
    pub fn as_mirror(&self) -> bool {
        self.as_mirror
    }

    /// Whether packages unpack into platform-specific subdirectories.
    pub fn per_platform(&self) -> bool {
        self.per_platform
    }

    /// Download the host's contents file and parse it.
    ///
    /// No-op when a contents file is already loaded. Tries the super mirror
    /// first (unless `force_redownload`), then the host URL with a
    /// cache-busting query string and a no-cache request, up to the
    /// configured attempt count. The downloaded bytes are staged to a
    /// temporary file and only promoted to `<host_dir>/contents.xml` after
    /// parsing succeeds.
    ///
    /// # Errors
    ///
    /// [`HostError::Transport`] when every attempt fails,
    /// [`HostError::Parse`] when the manifest is malformed (host state is
    /// left untouched), [`HostError::UrlNotKnown`] when no URL is
    /// configured and the super mirror did not help.
    pub fn fetch_contents(
        &mut self,
        transport: &dyn Transport,
        force_redownload: bool,
    ) -> Result<(), HostError> {
        if self.has_contents {
            return Ok(());
        }

        let mut bytes = None;
        if !force_redownload {
            if let Some(super_mirror) = &self.super_mirror {
                let url = format!("{}{CONTENTS_FILENAME}", ensure_trailing_slash(super_mirror));
                info!(%url, "downloading contents file from super mirror");
                match transport.fetch(&url, false) {
                    Ok(data) => bytes = Some(data),
                    Err(err) => warn!(%url, "super mirror failed: {err}"),
                }
            }
        }

        let bytes = match bytes {
            Some(bytes) => bytes,
            None => self.download_with_retries(transport)?,
        };

        self.ingest_contents(&bytes)
    }

    /// Read a contents file already on disk and parse it.
    ///
    /// This is the disk-first initialization path: with no URL configured,
    /// the host's own manifest entry is found by recomputing each
    /// candidate's directory hash and matching it against `host_dir`, and
    /// the URL is adopted from the matching entry. With `path` given, that
    /// file is read and, after a successful parse, copied into the
    /// canonical location; otherwise `<host_dir>/contents.xml` itself is
    /// read.
    ///
    /// # Errors
    ///
    /// [`HostError::Io`] if the file cannot be read, [`HostError::Parse`]
    /// if it is malformed, [`HostError::Options`] when neither a path nor a
    /// host directory is available.
    pub fn read_contents_file(&mut self, path: Option<&Path>) -> Result<(), HostError> {
        if self.has_contents {
            return Ok(());
        }

        let resolved = match path {
            Some(path) => path.to_path_buf(),
            None => self
                .host_dir
                .as_ref()
                .ok_or(HostError::Options(
                    "reading an on-disk contents file requires a path or a host_dir",
                ))?
                .join(CONTENTS_FILENAME),
        };

        let bytes = std::fs::read(&resolved)?;
        let doc = parse_contents_bytes(&bytes)?;
        self.apply_contents(&doc);
        self.has_contents = true;

        // Copy into the canonical location if it was read from elsewhere.
        if let Some(host_dir) = self.host_dir.clone() {
            let canonical = host_dir.join(CONTENTS_FILENAME);
            if resolved != canonical {
                std::fs::create_dir_all(&host_dir)?;
                std::fs::copy(&resolved, &canonical)?;
            }
        }
        Ok(())
    }

    /// Redownload the contents file and report whether it changed.
    ///
    /// This is the only supported change-detection mechanism: a full
    /// redownload and an MD5 comparison against the stored file. The
    /// manifest is small; correctness matters more than bandwidth.
    ///
    /// # Errors
    ///
    /// [`HostError::NotReady`] when no contents file was ever loaded;
    /// otherwise the same transport/parse errors as
    /// [`fetch_contents`](Self::fetch_contents). On error the previously
    /// loaded snapshot, in memory and on disk, remains in effect.
    pub fn check_contents_change(
        &mut self,
        transport: &dyn Transport,
    ) -> Result<ContentsChange, HostError> {
        self.require_contents()?;
        let canonical = self
            .host_dir
            .as_ref()
            .ok_or(HostError::NotReady)?
            .join(CONTENTS_FILENAME);

        info!(
            url = self.host_url.as_deref().unwrap_or("<unknown>"),
            "re-checking contents file"
        );
        let before = Md5Hash::compute_file(&canonical)?;

        self.has_contents = false;
        if let Err(err) = self.fetch_contents(transport, true) {
            // The old snapshot is still good; stay usable.
            self.has_contents = true;
            return Err(err);
        }

        let after = Md5Hash::compute_file(&canonical)?;
        if before == after {
            info!("contents file has not changed");
            Ok(ContentsChange::Unchanged)
        } else {
            info!("contents file has changed");
            Ok(ContentsChange::Changed)
        }
    }

    /// Look up one package by name and version.
    ///
    /// See [`PlatformFilter`] for variant selection. `Ok(None)` is the
    /// normal "not found" result.
    ///
    /// # Errors
    ///
    /// [`HostError::NotReady`] when no contents file has been loaded.
    pub fn get_package(
        &self,
        name: &str,
        version: Option<&str>,
        filter: &PlatformFilter,
    ) -> Result<Option<&PackageRecord>, HostError> {
        self.require_contents()?;
        let key = PackageKey::new(PackageName::new(name), normalize_version(version));
        Ok(self
            .packages
            .get(&key)
            .and_then(|platforms| self.pick_variant(platforms, filter)))
    }

    /// List packages, optionally restricted to one name.
    ///
    /// With [`PlatformFilter::Preferred`] each (name, version) group
    /// contributes at most one record, resolved the same way as
    /// [`get_package`](Self::get_package).
    ///
    /// # Errors
    ///
    /// [`HostError::NotReady`] when no contents file has been loaded.
    pub fn get_packages(
        &self,
        name: Option<&str>,
        filter: &PlatformFilter,
    ) -> Result<Vec<&PackageRecord>, HostError> {
        self.require_contents()?;
        let mut result = Vec::new();
        for (key, platforms) in &self.packages {
            if let Some(name) = name {
                if key.name != *name {
                    continue;
                }
            }
            if let Some(record) = self.pick_variant(platforms, filter) {
                result.push(record);
            }
        }
        Ok(result)
    }

    /// List every package this host provides, in stable sorted order.
    ///
    /// On a per-platform host every variant of every group is returned
    /// (platform-agnostic first). Otherwise each group contributes the
    /// single-platform client's view: the runtime-platform variant if
    /// present, else the agnostic one.
    ///
    /// # Errors
    ///
    /// [`HostError::NotReady`] when no contents file has been loaded.
    pub fn get_all_packages(&self) -> Result<Vec<&PackageRecord>, HostError> {
        self.require_contents()?;
        let mut result = Vec::new();
        for platforms in self.packages.values() {
            if self.per_platform {
                result.extend(platforms.values());
            } else if let Some(record) = self.pick_variant(platforms, &PlatformFilter::Preferred) {
                result.push(record);
            }
        }
        Ok(result)
    }

    /// The install directory of a package record.
    ///
    /// `<host_dir>[/<platform>]/<name>[/<version>]`, with the platform
    /// component present only in per-platform mode.
    ///
    /// # Errors
    ///
    /// [`HostError::NotReady`] when the host directory is not known yet.
    pub fn package_dir(&self, record: &PackageRecord) -> Result<PathBuf, HostError> {
        self.package_dir_of(record).ok_or(HostError::NotReady)
    }

    /// Remove the given package variants from the table.
    ///
    /// For each variant actually found, the record is removed and `remover`
    /// is invoked with it (and its install directory, when known). A group
    /// whose last variant is removed disappears entirely. Returns the
    /// subset of `picks` that were not present, so callers can distinguish
    /// "already gone" from "removed now".
    ///
    /// # Errors
    ///
    /// [`HostError::NotReady`] when no contents file has been loaded.
    pub fn delete_packages<R: PackageRemover>(
        &mut self,
        picks: &[PackageId],
        remover: &mut R,
    ) -> Result<Vec<PackageId>, HostError> {
        self.require_contents()?;
        let mut missing: Vec<PackageId> = picks.to_vec();

        for pick in picks {
            let key = PackageKey::new(pick.name.clone(), pick.version.clone());
            let Some(platforms) = self.packages.get_mut(&key) else {
                continue;
            };
            let Some(record) = platforms.remove(&pick.platform) else {
                continue;
            };
            let now_empty = platforms.is_empty();

            let dir = self.package_dir_of(&record);
            remover.remove_package(&record, dir.as_deref());
            missing.retain(|m| m != pick);

            if now_empty {
                // No empty groups persist.
                self.packages.remove(&key);
            }
        }
        Ok(missing)
    }

    fn require_contents(&self) -> Result<(), HostError> {
        if self.has_contents {
            Ok(())
        } else {
            Err(HostError::NotReady)
        }
    }

    fn set_host_url(&mut self, url: Option<String>) {
        match url {
            None => {
                // A special case: the URL will be set later.
                self.host_url = None;
                self.host_url_prefix = None;
                self.download_url_prefix = None;
            }
            Some(url) => {
                let prefix = ensure_trailing_slash(&url);
                self.host_url = Some(url);
                self.download_url_prefix = Some(prefix.clone());
                self.host_url_prefix = Some(prefix);
            }
        }
    }

    fn download_with_retries(&self, transport: &dyn Transport) -> Result<Vec<u8>, HostError> {
        let prefix = self.host_url_prefix.as_ref().ok_or(HostError::UrlNotKnown)?;
        // The uniquifying query string forces the download through any
        // caches; seconds resolution is unique enough.
        let url = format!("{prefix}{CONTENTS_FILENAME}?{}", unix_now());

        info!(%url, "downloading contents file");
        let mut result = transport.fetch(&url, true);
        for attempt in 1..self.attempts {
            if result.is_ok() {
                break;
            }
            if let Err(err) = &result {
                warn!(%url, "could not contact download server: {err}");
            }
            info!("retrying ({attempt})...");
            result = transport.fetch(&url, true);
        }

        result.map_err(|source| {
            warn!("unable to download {url}: {source}");
            HostError::Transport {
                url,
                attempts: self.attempts,
                source,
            }
        })
    }

    fn ingest_contents(&mut self, bytes: &[u8]) -> Result<(), HostError> {
        // Stage to a temp file first; the canonical file is replaced only
        // once parsing has succeeded. Dropping the handle on the error path
        // cleans the staging copy up.
        let mut staged = tempfile::NamedTempFile::new()?;
        staged.write_all(bytes)?;
        staged.flush()?;

        let doc = parse_contents_bytes(bytes)?;
        self.apply_contents(&doc);
        self.has_contents = true;

        if let Some(host_dir) = self.host_dir.clone() {
            std::fs::create_dir_all(&host_dir)?;
            std::fs::copy(staged.path(), host_dir.join(CONTENTS_FILENAME))?;
        }
        Ok(())
    }

    /// Apply a successfully parsed document. Infallible on purpose: all
    /// rejection happens before any field is touched.
    fn apply_contents(&mut self, doc: &ContentsDoc) {
        // Find our own entry in the hosts table. With a known URL we match
        // it directly; knowing only a directory, we recompute each
        // candidate's directory hash and match against ours.
        let entry = match (&self.host_url, &self.host_dir) {
            (Some(url), _) => find_entry_by_url(doc, url).cloned(),
            (None, Some(host_dir)) => self
                .root_dir
                .as_ref()
                .and_then(|root| find_entry_by_dir(doc, root, host_dir))
                .cloned(),
            (None, None) => None,
        };

        if let Some(entry) = entry {
            if self.host_url.is_none() {
                self.set_host_url(entry.url.clone());
            }
            self.apply_host_entry(&entry);
        }

        if self.host_dir.is_none() {
            if let (Some(root), Some(url)) = (&self.root_dir, &self.host_url) {
                self.host_dir = Some(determine_host_dir(root, None, url));
            }
        }

        self.rebuild_packages(doc);
    }

    fn apply_host_entry(&mut self, entry: &HostEntry) {
        // First write wins; later entries never override an existing name.
        if self.descriptive_name.is_none() {
            if let Some(name) = nonempty(entry.descriptive_name.as_deref()) {
                self.descriptive_name = Some(name.to_string());
            }
        }

        if self.host_dir.is_none() {
            if let Some(root) = &self.root_dir {
                match (&entry.host_dir, &self.host_url) {
                    (Some(basename), _) => {
                        self.host_dir = Some(determine_host_dir(
                            root,
                            Some(basename),
                            self.host_url.as_deref().unwrap_or(""),
                        ));
                    }
                    (None, Some(url)) => {
                        self.host_dir = Some(determine_host_dir(root, None, url));
                    }
                    (None, None) => {}
                }
            }
        }

        // The download prefix falls back to the host prefix when unset.
        self.download_url_prefix = nonempty(entry.download_url.as_deref())
            .map(ensure_trailing_slash)
            .or_else(|| self.host_url_prefix.clone());

        for mirror in &entry.mirrors {
            let mirror = ensure_trailing_slash(mirror);
            if !self.mirrors.contains(&mirror) {
                self.mirrors.push(mirror);
            }
        }

        // Last write wins per keyword.
        for alt in &entry.alt_hosts {
            if let (Some(keyword), Some(url)) = (
                nonempty(alt.keyword.as_deref()),
                nonempty(alt.url.as_deref()),
            ) {
                self.alt_hosts.insert(keyword.to_string(), url.to_string());
            }
        }
    }

    /// Wholesale replacement of the package table from a new snapshot.
    /// Entries surviving from the previous snapshot keep their identity;
    /// stale entries are dropped.
    fn rebuild_packages(&mut self, doc: &ContentsDoc) {
        let mut packages: BTreeMap<PackageKey, BTreeMap<Option<Platform>, PackageRecord>> =
            BTreeMap::new();
        for entry in &doc.packages {
            let key = PackageKey::new(entry.name.clone(), entry.version.clone());
            packages
                .entry(key)
                .or_default()
                .insert(entry.platform.clone(), PackageRecord::from_entry(entry));
        }
        self.packages = packages;
    }

    fn pick_variant<'a>(
        &self,
        platforms: &'a BTreeMap<Option<Platform>, PackageRecord>,
        filter: &PlatformFilter,
    ) -> Option<&'a PackageRecord> {
        match filter {
            PlatformFilter::Exact(platform) => platforms.get(&Some(platform.clone())),
            PlatformFilter::Agnostic => platforms.get(&None),
            PlatformFilter::Preferred => platforms
                .get(&Some(self.platform.clone()))
                .or_else(|| platforms.get(&None)),
        }
    }

    fn package_dir_of(&self, record: &PackageRecord) -> Option<PathBuf> {
        let mut dir = self.host_dir.clone()?;
        if self.per_platform {
            if let Some(platform) = &record.platform {
                dir.push(platform.as_str());
            }
        }
        dir.push(record.name.as_str());
        if let Some(version) = &record.version {
            dir.push(version.as_str());
        }
        Some(dir)
    }
}

fn find_entry_by_url<'d>(doc: &'d ContentsDoc, url: &str) -> Option<&'d HostEntry> {
    for host in &doc.hosts {
        if host.url.as_deref() == Some(url) {
            return Some(host);
        }
        for alt in &host.alt_hosts {
            if alt.url.as_deref() == Some(url) {
                return Some(alt);
            }
        }
    }
    None
}

fn find_entry_by_dir<'d>(
    doc: &'d ContentsDoc,
    root_dir: &Path,
    host_dir: &Path,
) -> Option<&'d HostEntry> {
    let matches = |entry: &HostEntry| candidate_dir(root_dir, entry).is_some_and(|d| d == host_dir);
    for host in &doc.hosts {
        if matches(host) {
            return Some(host);
        }
        for alt in &host.alt_hosts {
            if matches(alt) {
                return Some(alt);
            }
        }
    }
    None
}

fn candidate_dir(root_dir: &Path, entry: &HostEntry) -> Option<PathBuf> {
    match (&entry.host_dir, &entry.url) {
        (Some(basename), url) => Some(determine_host_dir(
            root_dir,
            Some(basename),
            url.as_deref().unwrap_or(""),
        )),
        (None, Some(url)) => Some(determine_host_dir(root_dir, None, url)),
        (None, None) => None,
    }
}

fn nonempty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

fn ensure_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

fn normalize_version(version: Option<&str>) -> Option<Version> {
    version.filter(|v| !v.is_empty()).map(Version::new)
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::NullRemover;
    use crate::transport::TransportError;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Transport serving canned bodies keyed by URL (query string ignored).
    struct StubTransport {
        bodies: HashMap<String, Vec<u8>>,
        hits: RefCell<u32>,
    }

    impl StubTransport {
        fn new() -> Self {
            Self {
                bodies: HashMap::new(),
                hits: RefCell::new(0),
            }
        }

        fn with(mut self, url: &str, body: &str) -> Self {
            self.bodies.insert(url.to_string(), body.as_bytes().to_vec());
            self
        }

        fn hits(&self) -> u32 {
            *self.hits.borrow()
        }
    }

    impl Transport for StubTransport {
        fn fetch(&self, url: &str, _no_cache: bool) -> Result<Vec<u8>, TransportError> {
            *self.hits.borrow_mut() += 1;
            let base = url.split('?').next().unwrap_or(url);
            self.bodies
                .get(base)
                .cloned()
                .ok_or_else(|| TransportError::Status {
                    status: 404,
                    url: url.to_string(),
                })
        }
    }

    /// Transport returning one body for the first request, another after.
    struct SwitchTransport {
        first: Vec<u8>,
        later: Vec<u8>,
        calls: RefCell<u32>,
    }

    impl Transport for SwitchTransport {
        fn fetch(&self, _url: &str, _no_cache: bool) -> Result<Vec<u8>, TransportError> {
            let mut calls = self.calls.borrow_mut();
            *calls += 1;
            if *calls == 1 {
                Ok(self.first.clone())
            } else {
                Ok(self.later.clone())
            }
        }
    }

    /// Remover recording which packages it was handed.
    #[derive(Default)]
    struct RecordingRemover {
        removed: Vec<PackageId>,
    }

    impl PackageRemover for RecordingRemover {
        fn remove_package(&mut self, record: &PackageRecord, _dir: Option<&Path>) {
            self.removed.push(record.id());
        }
    }

    const HOST_URL: &str = "https://runtime.example.com/stable";

    fn sample_manifest(url: &str) -> String {
        format!(
            r#"<contents>
  <host url="{url}" descriptive_name="Test Host">
    <mirror url="https://mirror-a.example.net/stable"/>
    <mirror url="https://mirror-a.example.net/stable/"/>
    <alt_host keyword="test" url="{url}-test"/>
  </host>
  <package name="engine-core" version="1.2"
           filename="engine-core/1.2/desc.xml" size="100"
           hash="5eb63bbbe01eeed093cb22bb8f5acdc3"/>
  <package name="engine-core" platform="linux_x64" version="1.2"
           filename="engine-core/linux_x64/1.2/desc.xml" size="120"/>
  <package name="tools" platform="win_x64" version="0.9"
           filename="tools/win_x64/0.9/desc.xml" size="50"/>
</contents>
"#
        )
    }

    fn resolver(root: &Path) -> HostResolver {
        HostResolver::new(HostOptions {
            host_url: Some(HOST_URL.to_string()),
            root_dir: Some(root.to_path_buf()),
            platform: Platform::new("linux_x64"),
            ..HostOptions::default()
        })
        .unwrap()
    }

    fn loaded_resolver(root: &Path) -> HostResolver {
        let transport =
            StubTransport::new().with(&format!("{HOST_URL}/contents.xml"), &sample_manifest(HOST_URL));
        let mut host = resolver(root);
        host.fetch_contents(&transport, false).unwrap();
        host
    }

    #[test]
    fn construction_requires_a_directory() {
        let result = HostResolver::new(HostOptions {
            host_url: Some(HOST_URL.to_string()),
            ..HostOptions::default()
        });
        assert!(matches!(result, Err(HostError::Options(_))));
    }

    #[test]
    fn queries_before_load_are_not_ready() {
        let tmp = tempfile::tempdir().unwrap();
        let host = resolver(tmp.path());
        assert!(matches!(
            host.get_package("engine-core", Some("1.2"), &PlatformFilter::Preferred),
            Err(HostError::NotReady)
        ));
        assert!(matches!(host.get_all_packages(), Err(HostError::NotReady)));
    }

    #[test]
    fn fetch_parses_and_persists_the_canonical_file() {
        let tmp = tempfile::tempdir().unwrap();
        let host = loaded_resolver(tmp.path());

        assert!(host.has_contents());
        assert_eq!(host.descriptive_name(), Some("Test Host"));
        assert_eq!(host.host_url_prefix(), Some("https://runtime.example.com/stable/"));
        // No explicit download_url in the manifest: falls back to the host prefix.
        assert_eq!(host.download_url_prefix(), host.host_url_prefix());
        // The two mirror spellings normalize to one entry.
        assert_eq!(host.mirrors(), ["https://mirror-a.example.net/stable/"]);
        assert_eq!(
            host.alt_host("test"),
            Some("https://runtime.example.com/stable-test")
        );

        let expected_dir = determine_host_dir(tmp.path(), None, HOST_URL);
        assert_eq!(host.host_dir(), Some(expected_dir.as_path()));
        assert!(expected_dir.join(CONTENTS_FILENAME).is_file());
    }

    #[test]
    fn fetch_is_a_noop_once_loaded() {
        let tmp = tempfile::tempdir().unwrap();
        let transport =
            StubTransport::new().with(&format!("{HOST_URL}/contents.xml"), &sample_manifest(HOST_URL));
        let mut host = resolver(tmp.path());
        host.fetch_contents(&transport, false).unwrap();
        let hits = transport.hits();
        host.fetch_contents(&transport, false).unwrap();
        assert_eq!(transport.hits(), hits);
    }

    #[test]
    fn parse_failure_leaves_state_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let transport =
            StubTransport::new().with(&format!("{HOST_URL}/contents.xml"), "<contents><oops");
        let mut host = resolver(tmp.path());

        let result = host.fetch_contents(&transport, false);
        assert!(matches!(result, Err(HostError::Parse(_))));
        assert!(!host.has_contents());
        let canonical = determine_host_dir(tmp.path(), None, HOST_URL).join(CONTENTS_FILENAME);
        assert!(!canonical.exists());
    }

    #[test]
    fn transport_failure_exhausts_the_attempt_budget() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = StubTransport::new();
        let mut host = resolver(tmp.path());

        let result = host.fetch_contents(&transport, false);
        assert!(matches!(
            result,
            Err(HostError::Transport { attempts: 3, .. })
        ));
        assert_eq!(transport.hits(), 3);
        assert!(!host.has_contents());
    }

    #[test]
    fn super_mirror_is_tried_first_and_skipped_when_forcing() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = StubTransport::new()
            .with("https://super.example.org/contents.xml", &sample_manifest(HOST_URL));
        let mut host = HostResolver::new(HostOptions {
            host_url: Some(HOST_URL.to_string()),
            root_dir: Some(tmp.path().to_path_buf()),
            super_mirror: Some("https://super.example.org".to_string()),
            platform: Platform::new("linux_x64"),
            ..HostOptions::default()
        })
        .unwrap();

        host.fetch_contents(&transport, false).unwrap();
        assert!(host.has_contents());
        assert_eq!(transport.hits(), 1);

        // Forcing bypasses the super mirror and hits the (absent) primary.
        let mut forced = HostResolver::new(HostOptions {
            host_url: Some(HOST_URL.to_string()),
            root_dir: Some(tmp.path().to_path_buf()),
            super_mirror: Some("https://super.example.org".to_string()),
            platform: Platform::new("linux_x64"),
            ..HostOptions::default()
        })
        .unwrap();
        assert!(matches!(
            forced.fetch_contents(&transport, true),
            Err(HostError::Transport { .. })
        ));
    }

    #[test]
    fn platform_preference_follows_the_runtime_platform() {
        let tmp = tempfile::tempdir().unwrap();
        let host = loaded_resolver(tmp.path());

        // Both variants exist: the runtime platform wins.
        let pkg = host
            .get_package("engine-core", Some("1.2"), &PlatformFilter::Preferred)
            .unwrap()
            .unwrap();
        assert_eq!(pkg.platform.as_deref_platform(), Some("linux_x64"));

        // Explicit wildcard selects the agnostic variant only.
        let agnostic = host
            .get_package("engine-core", Some("1.2"), &PlatformFilter::Agnostic)
            .unwrap()
            .unwrap();
        assert_eq!(agnostic.platform, None);

        // Exact lookup never falls back to an unrelated platform.
        assert!(host
            .get_package("tools", Some("0.9"), &PlatformFilter::Preferred)
            .unwrap()
            .is_none());
        let tools = host
            .get_package("tools", Some("0.9"), &PlatformFilter::Exact(Platform::new("win_x64")))
            .unwrap()
            .unwrap();
        assert_eq!(tools.name, "tools");

        assert!(host
            .get_package("engine-core", Some("9.9"), &PlatformFilter::Preferred)
            .unwrap()
            .is_none());
    }

    #[test]
    fn agnostic_variant_is_the_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = StubTransport::new().with(
            &format!("{HOST_URL}/contents.xml"),
            r#"<contents>
                 <package name="engine-core" version="1.2" size="1"/>
               </contents>"#,
        );
        let mut host = resolver(tmp.path());
        host.fetch_contents(&transport, false).unwrap();

        let pkg = host
            .get_package("engine-core", Some("1.2"), &PlatformFilter::Preferred)
            .unwrap()
            .unwrap();
        assert_eq!(pkg.platform, None);
    }

    #[test]
    fn listing_resolves_one_variant_per_group() {
        let tmp = tempfile::tempdir().unwrap();
        let host = loaded_resolver(tmp.path());

        let all = host.get_all_packages().unwrap();
        // engine-core resolves to the linux variant; tools has no variant
        // for this platform and no agnostic fallback.
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "engine-core");
        assert_eq!(all[0].platform.as_deref_platform(), Some("linux_x64"));

        let filtered = host
            .get_packages(Some("engine-core"), &PlatformFilter::Preferred)
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn per_platform_hosts_list_every_variant() {
        let tmp = tempfile::tempdir().unwrap();
        let transport =
            StubTransport::new().with(&format!("{HOST_URL}/contents.xml"), &sample_manifest(HOST_URL));
        let mut host = HostResolver::new(HostOptions {
            host_url: Some(HOST_URL.to_string()),
            root_dir: Some(tmp.path().to_path_buf()),
            as_mirror: true,
            platform: Platform::new("linux_x64"),
            ..HostOptions::default()
        })
        .unwrap();
        // as_mirror implies per_platform by default
        assert!(host.per_platform());

        host.fetch_contents(&transport, false).unwrap();
        let all = host.get_all_packages().unwrap();
        assert_eq!(all.len(), 3);
        // Stable order: groups sorted, agnostic variant first within a group.
        assert_eq!(all[0].platform, None);
        assert_eq!(all[1].platform.as_deref_platform(), Some("linux_x64"));
        assert_eq!(all[2].name, "tools");
    }

    #[test]
    fn deleting_the_last_variant_drops_the_group() {
        let tmp = tempfile::tempdir().unwrap();
        let mut host = loaded_resolver(tmp.path());

        let picks: Vec<PackageId> = host
            .get_packages(Some("engine-core"), &PlatformFilter::Preferred)
            .unwrap()
            .iter()
            .map(|record| record.id())
            .collect();
        let agnostic = host
            .get_package("engine-core", Some("1.2"), &PlatformFilter::Agnostic)
            .unwrap()
            .unwrap()
            .id();

        let mut remover = RecordingRemover::default();
        let mut all_picks = picks;
        all_picks.push(agnostic);
        let missing = host.delete_packages(&all_picks, &mut remover).unwrap();
        assert!(missing.is_empty());
        assert_eq!(remover.removed.len(), 2);

        // Group key is gone entirely.
        assert!(host
            .get_package("engine-core", Some("1.2"), &PlatformFilter::Agnostic)
            .unwrap()
            .is_none());
        assert_eq!(host.get_packages(Some("engine-core"), &PlatformFilter::Preferred).unwrap().len(), 0);
    }

    #[test]
    fn delete_reports_the_not_found_subset() {
        let tmp = tempfile::tempdir().unwrap();
        let mut host = loaded_resolver(tmp.path());

        let ghost = PackageId {
            name: PackageName::new("no-such"),
            version: Some(Version::new("1.0")),
            platform: None,
        };
        let real = host
            .get_package("tools", Some("0.9"), &PlatformFilter::Exact(Platform::new("win_x64")))
            .unwrap()
            .unwrap()
            .id();

        let missing = host
            .delete_packages(&[ghost.clone(), real], &mut NullRemover)
            .unwrap();
        assert_eq!(missing, vec![ghost]);
    }

    #[test]
    fn reparse_is_observably_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let body = sample_manifest(HOST_URL);
        let transport = SwitchTransport {
            first: body.as_bytes().to_vec(),
            later: body.as_bytes().to_vec(),
            calls: RefCell::new(0),
        };
        let mut host = resolver(tmp.path());
        host.fetch_contents(&transport, false).unwrap();
        let before: Vec<PackageId> =
            host.get_all_packages().unwrap().iter().map(|r| r.id()).collect();

        let change = host.check_contents_change(&transport).unwrap();
        assert_eq!(change, ContentsChange::Unchanged);
        let after: Vec<PackageId> =
            host.get_all_packages().unwrap().iter().map(|r| r.id()).collect();
        assert_eq!(before, after);
        assert_eq!(host.mirrors().len(), 1);
    }

    #[test]
    fn change_detection_sees_new_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let changed = sample_manifest(HOST_URL).replace("0.9", "1.0");
        let transport = SwitchTransport {
            first: sample_manifest(HOST_URL).into_bytes(),
            later: changed.into_bytes(),
            calls: RefCell::new(0),
        };
        let mut host = resolver(tmp.path());
        host.fetch_contents(&transport, false).unwrap();

        let change = host.check_contents_change(&transport).unwrap();
        assert_eq!(change, ContentsChange::Changed);
        // The new snapshot replaced the old one wholesale.
        assert!(host
            .get_package("tools", Some("1.0"), &PlatformFilter::Exact(Platform::new("win_x64")))
            .unwrap()
            .is_some());
        assert!(host
            .get_package("tools", Some("0.9"), &PlatformFilter::Exact(Platform::new("win_x64")))
            .unwrap()
            .is_none());
    }

    #[test]
    fn failed_change_probe_keeps_the_old_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let mut host = loaded_resolver(tmp.path());

        // Empty transport: the forced redownload fails.
        let dead = StubTransport::new();
        let result = host.check_contents_change(&dead);
        assert!(matches!(result, Err(HostError::Transport { .. })));
        assert!(host.has_contents());
        assert!(host
            .get_package("engine-core", Some("1.2"), &PlatformFilter::Preferred)
            .unwrap()
            .is_some());
    }

    #[test]
    fn disk_first_initialization_adopts_the_url() {
        let tmp = tempfile::tempdir().unwrap();
        // A networked resolver writes the canonical file...
        let first = loaded_resolver(tmp.path());
        let host_dir = first.host_dir().unwrap().to_path_buf();

        // ...and a second resolver finds it on disk, knowing only the dir.
        let mut found = HostResolver::new(HostOptions {
            root_dir: Some(tmp.path().to_path_buf()),
            host_dir: Some(host_dir),
            platform: Platform::new("linux_x64"),
            ..HostOptions::default()
        })
        .unwrap();
        found.read_contents_file(None).unwrap();

        assert!(found.has_contents());
        assert_eq!(found.host_url(), Some(HOST_URL));
        assert_eq!(found.descriptive_name(), Some("Test Host"));
        assert!(found
            .get_package("engine-core", Some("1.2"), &PlatformFilter::Preferred)
            .unwrap()
            .is_some());
    }

    #[test]
    fn package_dir_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let host = loaded_resolver(tmp.path());
        let record = host
            .get_package("engine-core", Some("1.2"), &PlatformFilter::Preferred)
            .unwrap()
            .unwrap();
        let dir = host.package_dir(record).unwrap();
        assert_eq!(
            dir,
            host.host_dir().unwrap().join("engine-core").join("1.2")
        );
    }

    /// Test-only convenience for comparing optional platforms to strings.
    trait PlatformStr {
        fn as_deref_platform(&self) -> Option<&str>;
    }

    impl PlatformStr for Option<Platform> {
        fn as_deref_platform(&self) -> Option<&str> {
            self.as_ref().map(Platform::as_str)
        }
    }
}
