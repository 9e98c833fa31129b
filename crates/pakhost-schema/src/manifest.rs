//! Typed model and parser for the `contents.xml` manifest.
//!
//! The manifest is the single document a host publishes: a `<contents>` root
//! holding `<host>` entries (each with nested `<mirror>` and `<alt_host>`
//! children) followed by `<package>` entries in document order. Parsing
//! produces a [`ContentsDoc`] and never mutates caller state, so a malformed
//! document can be rejected without partial application.

use crate::filespec::{FileSpec, Md5Hash};
use crate::types::{PackageName, Platform, Version};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur when parsing a manifest document.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The document is not well-formed XML.
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An attribute could not be read or decoded.
    #[error("bad attribute: {0}")]
    Attr(String),

    /// The top-level `<contents>` element is missing.
    #[error("missing toplevel <contents> element")]
    MissingRoot,

    /// The document ended before the root element was closed.
    #[error("unexpected end of document")]
    UnexpectedEof,

    /// The manifest bytes are not valid UTF-8.
    #[error("manifest is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

/// A parsed `<host>` or `<alt_host>` entry.
///
/// The two elements share a shape; `keyword` is set only on `<alt_host>`
/// entries, where it names the alternate contents channel.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HostEntry {
    /// Alt-host keyword (absent on plain `<host>` entries).
    pub keyword: Option<String>,
    /// Host URL this entry describes.
    pub url: Option<String>,
    /// Human-readable name of the host.
    pub descriptive_name: Option<String>,
    /// Explicit host-directory basename, overriding the URL hash.
    pub host_dir: Option<String>,
    /// URL prefix for everything other than the manifest itself.
    pub download_url: Option<String>,
    /// Mirror URLs, in document order, unnormalized.
    pub mirrors: Vec<String>,
    /// Nested alternate-host entries.
    pub alt_hosts: Vec<HostEntry>,
}

/// A parsed `<package>` entry.
#[derive(Debug, Clone, Serialize)]
pub struct PackageEntry {
    /// Package name.
    pub name: PackageName,
    /// Platform variant; absent means "no particular platform".
    pub platform: Option<Platform>,
    /// Package version; solo packages may be versionless.
    pub version: Option<Version>,
    /// Whether the package is a standalone single-file download.
    pub solo: bool,
    /// Descriptor of the package description file.
    pub desc_file: FileSpec,
    /// Descriptor of the import description file, if published.
    pub import_desc_file: Option<FileSpec>,
}

/// The parsed contents of a manifest document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentsDoc {
    /// All `<host>` entries, in document order.
    pub hosts: Vec<HostEntry>,
    /// All `<package>` entries, in document order.
    pub packages: Vec<PackageEntry>,
}

/// Parse a manifest from raw bytes (must be UTF-8).
pub fn parse_contents_bytes(bytes: &[u8]) -> Result<ContentsDoc, ManifestError> {
    parse_contents(std::str::from_utf8(bytes)?)
}

/// Parse a manifest document.
///
/// Unknown elements and attributes are skipped. A document whose root
/// element is anything other than `<contents>` is rejected as
/// [`ManifestError::MissingRoot`].
pub fn parse_contents(xml: &str) -> Result<ContentsDoc, ManifestError> {
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                return if e.name().as_ref() == b"contents" {
                    parse_body(&mut reader)
                } else {
                    Err(ManifestError::MissingRoot)
                };
            }
            Event::Empty(e) => {
                return if e.name().as_ref() == b"contents" {
                    Ok(ContentsDoc::default())
                } else {
                    Err(ManifestError::MissingRoot)
                };
            }
            Event::Eof => return Err(ManifestError::MissingRoot),
            // XML declaration, comments, doctype, stray whitespace
            _ => {}
        }
    }
}

fn parse_body(reader: &mut Reader<&[u8]>) -> Result<ContentsDoc, ManifestError> {
    let mut doc = ContentsDoc::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"host" => doc.hosts.push(parse_host(reader, &e, false)?),
                b"package" => {
                    if let Some(package) = parse_package(reader, &e, false)? {
                        doc.packages.push(package);
                    }
                }
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"host" => doc.hosts.push(parse_host(reader, &e, true)?),
                b"package" => {
                    if let Some(package) = parse_package(reader, &e, true)? {
                        doc.packages.push(package);
                    }
                }
                _ => {}
            },
            // only </contents> can close at this depth
            Event::End(_) => return Ok(doc),
            Event::Eof => return Err(ManifestError::UnexpectedEof),
            _ => {}
        }
    }
}

fn parse_host(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart<'_>,
    is_empty: bool,
) -> Result<HostEntry, ManifestError> {
    let mut entry = HostEntry {
        keyword: attr(start, "keyword")?,
        url: attr(start, "url")?,
        descriptive_name: attr(start, "descriptive_name")?,
        host_dir: attr(start, "host_dir")?,
        download_url: attr(start, "download_url")?,
        mirrors: Vec::new(),
        alt_hosts: Vec::new(),
    };
    if is_empty {
        return Ok(entry);
    }

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"alt_host" => entry.alt_hosts.push(parse_host(reader, &e, false)?),
                b"mirror" => {
                    if let Some(url) = attr_nonempty(&e, "url") {
                        entry.mirrors.push(url);
                    }
                    reader.read_to_end(e.name())?;
                }
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"alt_host" => entry.alt_hosts.push(parse_host(reader, &e, true)?),
                b"mirror" => {
                    if let Some(url) = attr_nonempty(&e, "url") {
                        entry.mirrors.push(url);
                    }
                }
                _ => {}
            },
            Event::End(_) => return Ok(entry),
            Event::Eof => return Err(ManifestError::UnexpectedEof),
            _ => {}
        }
    }
}

fn parse_package(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart<'_>,
    is_empty: bool,
) -> Result<Option<PackageEntry>, ManifestError> {
    let name = attr(start, "name")?.filter(|s| !s.is_empty());
    let mut entry = name.map(|name| PackageEntry {
        name: PackageName::from(name),
        platform: attr_nonempty(start, "platform").map(Platform::from),
        version: attr_nonempty(start, "version").map(Version::from),
        solo: attr_flag(start, "solo"),
        desc_file: parse_filespec(start),
        import_desc_file: None,
    });

    if is_empty {
        return Ok(entry);
    }

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if e.name().as_ref() == b"import" {
                    if let Some(entry) = entry.as_mut() {
                        entry.import_desc_file = Some(parse_filespec(&e));
                    }
                }
                reader.read_to_end(e.name())?;
            }
            Event::Empty(e) => {
                if e.name().as_ref() == b"import" {
                    if let Some(entry) = entry.as_mut() {
                        entry.import_desc_file = Some(parse_filespec(&e));
                    }
                }
            }
            Event::End(_) => return Ok(entry),
            Event::Eof => return Err(ManifestError::UnexpectedEof),
            _ => {}
        }
    }
}

fn parse_filespec(element: &BytesStart<'_>) -> FileSpec {
    FileSpec {
        filename: attr_nonempty(element, "filename"),
        size: attr_nonempty(element, "size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
        timestamp: attr_nonempty(element, "timestamp").and_then(|s| s.parse().ok()),
        hash: attr_nonempty(element, "hash").and_then(|s| Md5Hash::validated(&s).ok()),
    }
}

/// Read one attribute by name, unescaping entities.
fn attr(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, ManifestError> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| ManifestError::Attr(e.to_string()))?;
        if attribute.key.as_ref() == name.as_bytes() {
            let value = attribute
                .unescape_value()
                .map_err(|e| ManifestError::Attr(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Like [`attr`], but treating empty and undecodable values as absent.
fn attr_nonempty(element: &BytesStart<'_>, name: &str) -> Option<String> {
    attr(element, name).ok().flatten().filter(|s| !s.is_empty())
}

/// Integer attribute interpreted as a flag; unparseable values are false.
fn attr_flag(element: &BytesStart<'_>, name: &str) -> bool {
    attr_nonempty(element, name)
        .and_then(|s| s.parse::<i64>().ok())
        .is_some_and(|v| v != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE_CONTENTS: &str = r#"<?xml version="1.0" ?>
<contents>
  <host url="https://runtime.example.com/stable"
        descriptive_name="Example Runtime"
        download_url="http://dl.example.com/stable">
    <mirror url="https://mirror-a.example.net/stable/"/>
    <mirror url="https://mirror-b.example.net/stable"/>
    <alt_host keyword="test" url="https://runtime.example.com/test"/>
  </host>
  <package name="engine-core" version="1.2"
           filename="engine-core/1.2/engine-core.1.2.xml"
           size="1493" timestamp="1716400000"
           hash="5eb63bbbe01eeed093cb22bb8f5acdc3"/>
  <package name="engine-core" platform="linux_x64" version="1.2"
           filename="engine-core/linux_x64/1.2/engine-core.1.2.xml"
           size="1502" hash="900150983cd24fb0d6963f7d28e17f72">
    <import filename="engine-core/linux_x64/1.2/engine-core.1.2.import.xml"
            size="310" hash="95df3bee713e8110116aa9bd11e41bbd"/>
  </package>
  <package name="launcher-images" solo="1"
           filename="launcher-images/launcher-images.xml" size="88213"/>
</contents>
"#;

    #[test]
    fn parses_hosts_and_packages() {
        let doc = parse_contents(EXAMPLE_CONTENTS).unwrap();

        assert_eq!(doc.hosts.len(), 1);
        let host = &doc.hosts[0];
        assert_eq!(host.url.as_deref(), Some("https://runtime.example.com/stable"));
        assert_eq!(host.descriptive_name.as_deref(), Some("Example Runtime"));
        assert_eq!(host.download_url.as_deref(), Some("http://dl.example.com/stable"));
        assert_eq!(host.mirrors.len(), 2);
        assert_eq!(host.alt_hosts.len(), 1);
        assert_eq!(host.alt_hosts[0].keyword.as_deref(), Some("test"));

        assert_eq!(doc.packages.len(), 3);
        let agnostic = &doc.packages[0];
        assert_eq!(agnostic.name, "engine-core");
        assert_eq!(agnostic.platform, None);
        assert_eq!(agnostic.version.as_ref().unwrap().as_str(), "1.2");
        assert!(!agnostic.solo);
        assert_eq!(agnostic.desc_file.size, 1493);
        assert_eq!(agnostic.desc_file.timestamp, Some(1_716_400_000));
        assert!(agnostic.import_desc_file.is_none());

        let linux = &doc.packages[1];
        assert_eq!(linux.platform.as_ref().unwrap().as_str(), "linux_x64");
        let import = linux.import_desc_file.as_ref().unwrap();
        assert_eq!(import.size, 310);

        let solo = &doc.packages[2];
        assert!(solo.solo);
        assert_eq!(solo.version, None);
    }

    #[test]
    fn empty_platform_normalizes_to_absent() {
        let doc = parse_contents(
            r#"<contents><package name="a" platform="" version="1" size="1"/></contents>"#,
        )
        .unwrap();
        assert_eq!(doc.packages[0].platform, None);
    }

    #[test]
    fn solo_attribute_is_an_integer_flag() {
        let doc = parse_contents(
            r#"<contents>
                 <package name="a" solo="1" size="1"/>
                 <package name="b" solo="0" size="1"/>
                 <package name="c" solo="yes" size="1"/>
               </contents>"#,
        )
        .unwrap();
        assert!(doc.packages[0].solo);
        assert!(!doc.packages[1].solo);
        assert!(!doc.packages[2].solo);
    }

    #[test]
    fn unescapes_entities_in_urls() {
        let doc = parse_contents(
            r#"<contents><host url="https://example.com/a?b=1&amp;c=2"/></contents>"#,
        )
        .unwrap();
        assert_eq!(doc.hosts[0].url.as_deref(), Some("https://example.com/a?b=1&c=2"));
    }

    #[test]
    fn skips_unknown_elements() {
        let doc = parse_contents(
            r#"<contents>
                 <certificate fingerprint="aa:bb"><data>x</data></certificate>
                 <package name="a" version="1" size="1"/>
               </contents>"#,
        )
        .unwrap();
        assert_eq!(doc.packages.len(), 1);
    }

    #[test]
    fn rejects_malformed_xml() {
        let result = parse_contents("<contents><host url=");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_wrong_root_element() {
        let result = parse_contents("<manifest><package name=\"a\"/></manifest>");
        assert!(matches!(result, Err(ManifestError::MissingRoot)));
    }

    #[test]
    fn rejects_empty_document() {
        assert!(matches!(parse_contents(""), Err(ManifestError::MissingRoot)));
    }

    #[test]
    fn accepts_self_closing_root() {
        let doc = parse_contents("<contents/>").unwrap();
        assert!(doc.hosts.is_empty());
        assert!(doc.packages.is_empty());
    }

    #[test]
    fn rejects_truncated_document() {
        let result = parse_contents(r#"<contents><package name="a" size="1"/>"#);
        assert!(matches!(result, Err(ManifestError::UnexpectedEof)));
    }
}
