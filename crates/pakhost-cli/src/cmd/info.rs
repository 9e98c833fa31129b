//! Info command

use crate::Globals;
use anyhow::Result;
use pakhost_schema::FileSpec;

/// Show one package's descriptor details.
pub fn info(
    globals: &Globals,
    url: &str,
    name: &str,
    version: Option<&str>,
    for_platform: Option<String>,
    json: bool,
) -> Result<()> {
    let host = crate::open_host(globals, url)?;
    let filter = crate::platform_filter(for_platform, false);

    let Some(record) = host.get_package(name, version, &filter)? else {
        anyhow::bail!("package '{name}' not found on this host");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }

    println!("{}", record.name);
    println!(
        "  version:   {}",
        record.version.as_ref().map_or("-", |v| v.as_str())
    );
    println!(
        "  platform:  {}",
        record.platform.as_ref().map_or("any", |p| p.as_str())
    );
    if record.solo {
        println!("  solo:      yes");
    }
    print_spec("descriptor", &record.desc_file);
    if let Some(import) = &record.import_desc_file {
        print_spec("import", import);
    }
    println!("  directory: {}", host.package_dir(record)?.display());
    Ok(())
}

fn print_spec(label: &str, spec: &FileSpec) {
    println!(
        "  {label}: {} ({} bytes{})",
        spec.filename.as_deref().unwrap_or("-"),
        spec.size,
        spec.hash
            .as_ref()
            .map(|h| format!(", md5 {h}"))
            .unwrap_or_default()
    );
}
