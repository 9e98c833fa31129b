//! Fetch command

use crate::Globals;
use anyhow::{Context, Result};
use pakhost_core::{HttpTransport, PlatformFilter};

/// Download a host's contents file and print a summary.
pub fn fetch(globals: &Globals, url: &str, force: bool) -> Result<()> {
    let mut host = crate::make_host(globals, url)?;
    let transport = HttpTransport::new().context("could not build the HTTP client")?;
    host.fetch_contents(&transport, force)
        .context("failed to download the contents file")?;

    println!("{}", host.descriptive_name().unwrap_or("(unnamed host)"));
    println!("  url:       {}", host.host_url_prefix().unwrap_or("-"));
    if host.download_url_prefix() != host.host_url_prefix() {
        println!("  downloads: {}", host.download_url_prefix().unwrap_or("-"));
    }
    if let Some(dir) = host.host_dir() {
        println!("  directory: {}", dir.display());
    }
    for mirror in host.mirrors() {
        println!("  mirror:    {mirror}");
    }
    for (keyword, alt) in host.alt_hosts() {
        println!("  alt host:  {keyword} -> {alt}");
    }

    let packages = host.get_packages(None, &PlatformFilter::Preferred)?;
    println!("  packages:  {}", packages.len());
    Ok(())
}
