//! Hostdir command

use crate::Globals;
use anyhow::Result;

/// Print the derived host directory for a URL without touching the network.
pub fn hostdir(globals: &Globals, url: &str) -> Result<()> {
    let dir = pakhost_core::determine_host_dir(&globals.root, None, url);
    println!("{}", dir.display());
    Ok(())
}
