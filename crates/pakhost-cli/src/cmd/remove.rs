//! Remove command

use crate::Globals;
use anyhow::Result;
use pakhost_core::FsRemover;

/// Remove one package variant from the host's table and disk.
pub fn remove(
    globals: &Globals,
    url: &str,
    name: &str,
    version: Option<&str>,
    for_platform: Option<String>,
) -> Result<()> {
    let mut host = crate::open_host(globals, url)?;
    let filter = crate::platform_filter(for_platform, false);

    let Some(record) = host.get_package(name, version, &filter)? else {
        anyhow::bail!("package '{name}' not found on this host");
    };
    let pick = record.id();

    let missing = host.delete_packages(&[pick.clone()], &mut FsRemover)?;
    if missing.is_empty() {
        println!("Removed {pick}");
    } else {
        println!("{pick} was already gone");
    }
    Ok(())
}
