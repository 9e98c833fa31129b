//! Host-directory derivation and default storage roots.

use dirs::home_dir;
use pakhost_schema::Md5Hash;
use std::path::{Path, PathBuf};

/// Digest width, in bytes, of the directory-name hash.
const HASH_SIZE: usize = 16;

/// Returns the primary storage root, or None if the user's home cannot be resolved.
pub fn try_default_root() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("PAKHOST_ROOT") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".pakhost"))
}

/// Returns the canonical storage root (`~/.pakhost`).
///
/// # Panics
///
/// Panics if neither `PAKHOST_ROOT` is set nor the user's home directory can
/// be resolved.
pub fn default_root() -> PathBuf {
    try_default_root().expect("Could not determine home directory. Set PAKHOST_ROOT to override.")
}

/// Derive the local directory for a host's install tree.
///
/// Pure function of `(root_dir, host_dir_basename, host_url)`. When the
/// manifest supplies an explicit `host_dir` basename, its components are
/// sanitized (a leading `.` is neutralized, so `..` and hidden names cannot
/// escape the root) and joined under `<root_dir>/hosts`. Otherwise the
/// directory is `hosts/<hostname>_<hash>` where `<hash>` is the MD5 of the
/// full URL string, truncated to half length when a hostname could be
/// extracted -- the truncation is purely for readability.
///
/// The algorithm, including the hand-rolled hostname extraction below, is a
/// fixed contract: companion implementations must derive the identical path
/// from the identical URL without coordination. Distinct URLs may collide on
/// a directory; colliding hosts share it and contend for the toplevel
/// contents file, which is tolerated.
pub fn determine_host_dir(
    root_dir: &Path,
    host_dir_basename: Option<&str>,
    host_url: &str,
) -> PathBuf {
    if let Some(basename) = host_dir_basename {
        let mut dir = root_dir.join("hosts");
        for component in basename.split('/') {
            if component.is_empty() {
                continue;
            }
            if component.starts_with('.') {
                // Forbid ".foo" or "..".
                dir.push(format!("x{component}"));
            } else {
                dir.push(component);
            }
        }
        return dir;
    }

    let hostname = extract_hostname(host_url);
    let digest = Md5Hash::compute(host_url.as_bytes());

    let mut keep = HASH_SIZE;
    let mut name = String::new();
    if let Some(hostname) = hostname {
        name.push_str(hostname);
        name.push('_');
        // With a hostname in the name, half the hash is plenty.
        keep /= 2;
    }
    name.push_str(&digest.as_str()[..keep * 2]);

    root_dir.join("hosts").join(name)
}

/// Pull the server name out of a URL without a URL library.
///
/// Strips the scheme, an optional `user@`, and an optional `:port` plus
/// path. Done by hand so the digest input stays identical across
/// implementations of the directory contract.
fn extract_hostname(url: &str) -> Option<&str> {
    let scheme = url.find("://")?;
    let mut start = scheme + 3;
    let mut end = url[start..].find('/').map_or(url.len(), |i| start + i);

    if let Some(at) = url[start..end].find('@') {
        start += at + 1;
    }
    if let Some(colon) = url[start..end].find(':') {
        end = start + colon;
    }

    let hostname = &url[start..end];
    if hostname.is_empty() { None } else { Some(hostname) }
}
