//! List command

use crate::Globals;
use anyhow::Result;
use pakhost_core::PackageRecord;

/// List the packages a host provides.
#[allow(clippy::fn_params_excessive_bools)]
pub fn list(
    globals: &Globals,
    url: &str,
    name: Option<&str>,
    for_platform: Option<String>,
    agnostic: bool,
    all: bool,
    json: bool,
) -> Result<()> {
    let host = crate::open_host(globals, url)?;

    let records: Vec<&PackageRecord> = if all {
        host.get_all_packages()?
    } else {
        host.get_packages(name, &crate::platform_filter(for_platform, agnostic))?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No matching packages.");
        return Ok(());
    }

    for record in records {
        let version = record.version.as_ref().map_or("-", |v| v.as_str());
        let platform = record.platform.as_ref().map_or("any", |p| p.as_str());
        let solo = if record.solo { "  solo" } else { "" };
        println!(
            "{:<24} {:<12} {:<12} {:>10}{solo}",
            record.name, version, platform, record.desc_file.size
        );
    }
    Ok(())
}
