//! pakhost - package host manifest client
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
//!
//! Command-line front end over `pakhost-core`: fetch a host's
//! `contents.xml`, list and inspect the packages it serves, remove installed
//! packages, and print the derived host directory.
//!
//! Commands that need a manifest prefer the copy already on disk and only go
//! to the network when none is there; `fetch` always downloads.

pub mod cmd;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pakhost_core::{
    HostOptions, HostResolver, HttpTransport, PlatformFilter, determine_host_dir,
};
use pakhost_schema::{CONTENTS_FILENAME, Platform};

#[derive(Debug, Parser)]
#[command(name = "pakhost")]
#[command(author, version, about = "pakhost - package host manifest client")]
pub struct Cli {
    /// Storage root for host directories
    #[arg(long, global = true, env = "PAKHOST_ROOT")]
    pub root: Option<PathBuf>,

    /// Resolve for this platform instead of the current one
    #[arg(long, global = true)]
    pub platform: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download and parse a host's contents file
    Fetch {
        /// Host URL
        url: String,
        /// Redownload even when a manifest was already loaded
        #[arg(long)]
        force: bool,
    },
    /// List packages provided by a host
    List {
        /// Host URL
        url: String,
        /// Only packages with this name
        #[arg(long)]
        name: Option<String>,
        /// Only this platform's variants
        #[arg(long = "for", value_name = "PLATFORM")]
        for_platform: Option<String>,
        /// Only platform-agnostic variants
        #[arg(long, conflicts_with = "for_platform")]
        agnostic: bool,
        /// Every variant of every package
        #[arg(long, conflicts_with_all = ["name", "for_platform", "agnostic"])]
        all: bool,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one package's descriptor details
    Info {
        /// Host URL
        url: String,
        /// Package name
        name: String,
        /// Package version
        #[arg(long)]
        version: Option<String>,
        /// Platform variant (defaults to the preferred one)
        #[arg(long = "for", value_name = "PLATFORM")]
        for_platform: Option<String>,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Remove a package from the host's table and disk
    Remove {
        /// Host URL
        url: String,
        /// Package name
        name: String,
        /// Package version
        #[arg(long)]
        version: Option<String>,
        /// Platform variant (defaults to the preferred one)
        #[arg(long = "for", value_name = "PLATFORM")]
        for_platform: Option<String>,
    },
    /// Print the derived host directory for a URL (no network)
    Hostdir {
        /// Host URL
        url: String,
    },
}

/// Resolved global options shared by every command.
#[derive(Debug, Clone)]
pub struct Globals {
    pub root: PathBuf,
    pub platform: Platform,
}

impl Globals {
    pub fn resolve(root: Option<PathBuf>, platform: Option<String>) -> Self {
        Self {
            root: root.unwrap_or_else(pakhost_core::paths::default_root),
            platform: platform.map_or_else(Platform::current, |p| Platform::new(&p)),
        }
    }
}

/// Build a resolver for `url` under the configured root.
pub fn make_host(globals: &Globals, url: &str) -> Result<HostResolver> {
    HostResolver::new(HostOptions {
        host_url: Some(url.to_string()),
        root_dir: Some(globals.root.clone()),
        platform: globals.platform.clone(),
        ..HostOptions::default()
    })
    .context("could not configure the host")
}

/// Build a resolver and load its manifest: the on-disk copy when one exists,
/// the network otherwise.
pub fn open_host(globals: &Globals, url: &str) -> Result<HostResolver> {
    let mut host = make_host(globals, url)?;

    let canonical = determine_host_dir(&globals.root, None, url).join(CONTENTS_FILENAME);
    if canonical.is_file() {
        host.read_contents_file(Some(&canonical))
            .with_context(|| format!("failed to read {}", canonical.display()))?;
    } else {
        let transport = HttpTransport::new().context("could not build the HTTP client")?;
        host.fetch_contents(&transport, false)
            .context("failed to download the contents file")?;
    }
    Ok(host)
}

/// Translate the common `--for` / `--agnostic` flags into a filter.
pub fn platform_filter(for_platform: Option<String>, agnostic: bool) -> PlatformFilter {
    if agnostic {
        PlatformFilter::Agnostic
    } else {
        match for_platform {
            Some(platform) => PlatformFilter::Exact(Platform::new(&platform)),
            None => PlatformFilter::Preferred,
        }
    }
}
