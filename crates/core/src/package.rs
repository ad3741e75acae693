//! Package archive inspection.
//!
//! A package is a tar archive (optionally zstd, xz or gzip compressed) whose
//! `.PKGINFO` member carries `key = value` metadata lines. Only the prefix of
//! the decompressed stream up to [`MAX_PKGINFO_SCAN`] bytes is examined, since
//! packaging tools place the metadata members first.

use crate::error::{Error, Result};
use async_compression::tokio::bufread::{GzipDecoder, XzDecoder, ZstdDecoder};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};
use tokio::io::AsyncReadExt;

/// Name of the metadata member inside a package archive.
pub const PKGINFO_MEMBER: &str = ".PKGINFO";

/// Maximum number of decompressed bytes scanned for `.PKGINFO` (8 MiB).
pub const MAX_PKGINFO_SCAN: u64 = 8 * 1024 * 1024;

/// Suffix used for detached signature files.
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// Package metadata parsed from `.PKGINFO`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkgInfo {
    pub name: String,
    pub base: Option<String>,
    pub version: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub build_date: Option<i64>,
    pub packager: Option<String>,
    pub installed_size: Option<u64>,
    pub architecture: String,
    #[serde(default)]
    pub licenses: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub optdepends: Vec<String>,
    #[serde(default)]
    pub makedepends: Vec<String>,
    #[serde(default)]
    pub checkdepends: Vec<String>,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub replaces: Vec<String>,
}

impl PkgInfo {
    /// Parse the text of a `.PKGINFO` member.
    pub fn parse(text: &str) -> Result<Self> {
        let mut info = PkgInfo::default();

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                Error::PkgInfoParse(format!("line {}: expected 'key = value'", lineno + 1))
            })?;
            let key = key.trim();
            let value = value.trim().to_string();

            match key {
                "pkgname" => info.name = value,
                "pkgbase" => info.base = Some(value),
                "pkgver" => info.version = value,
                "pkgdesc" => info.description = Some(value),
                "url" => info.url = Some(value),
                "builddate" => {
                    info.build_date = Some(value.parse().map_err(|_| {
                        Error::PkgInfoParse(format!("invalid builddate: {value}"))
                    })?)
                }
                "packager" => info.packager = Some(value),
                "size" => {
                    info.installed_size = Some(
                        value
                            .parse()
                            .map_err(|_| Error::PkgInfoParse(format!("invalid size: {value}")))?,
                    )
                }
                "arch" => info.architecture = value,
                "license" => info.licenses.push(value),
                "group" => info.groups.push(value),
                "depend" => info.depends.push(value),
                "optdepend" => info.optdepends.push(value),
                "makedepend" => info.makedepends.push(value),
                "checkdepend" => info.checkdepends.push(value),
                "provides" => info.provides.push(value),
                "conflict" => info.conflicts.push(value),
                "replaces" => info.replaces.push(value),
                // backup, xdata and friends do not appear in the sync database
                _ => {}
            }
        }

        for (field, value) in [
            ("pkgname", &info.name),
            ("pkgver", &info.version),
            ("arch", &info.architecture),
        ] {
            if value.is_empty() {
                return Err(Error::PkgInfoParse(format!("missing {field}")));
            }
        }

        if !is_valid_name(&info.name) {
            return Err(Error::PkgInfoParse(format!("invalid pkgname: {}", info.name)));
        }
        if !is_valid_version(&info.version) {
            return Err(Error::PkgInfoParse(format!(
                "invalid pkgver: {}",
                info.version
            )));
        }
        if !is_safe_component(&info.architecture) {
            return Err(Error::PkgInfoParse(format!(
                "invalid arch: {}",
                info.architecture
            )));
        }

        Ok(info)
    }

    /// Directory name used for this package inside the index (`name-version`).
    pub fn index_dir(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

/// Compression wrapping a package's tar stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    Gzip,
    Xz,
    Zstd,
}

impl ArchiveFormat {
    /// Detect the format from leading magic bytes.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Some(Self::Zstd)
        } else if data.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Some(Self::Xz)
        } else if data.starts_with(&[0x1f, 0x8b]) {
            Some(Self::Gzip)
        } else if data.len() > 262 && &data[257..262] == b"ustar" {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// Read the package metadata from an archive held in memory.
pub async fn read_pkginfo(archive: &[u8]) -> Result<PkgInfo> {
    let format = ArchiveFormat::detect(archive).ok_or_else(|| {
        Error::UnsupportedArchive("expected a tar archive (plain, gzip, xz or zstd)".to_string())
    })?;

    let tar = decompress_prefix(format, archive).await?;
    let text = find_member(&tar, PKGINFO_MEMBER)?;
    PkgInfo::parse(&text)
}

async fn decompress_prefix(format: ArchiveFormat, archive: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let read = match format {
        ArchiveFormat::Tar => {
            let end = archive.len().min(MAX_PKGINFO_SCAN as usize);
            return Ok(archive[..end].to_vec());
        }
        ArchiveFormat::Gzip => {
            GzipDecoder::new(archive)
                .take(MAX_PKGINFO_SCAN)
                .read_to_end(&mut out)
                .await
        }
        ArchiveFormat::Xz => {
            XzDecoder::new(archive)
                .take(MAX_PKGINFO_SCAN)
                .read_to_end(&mut out)
                .await
        }
        ArchiveFormat::Zstd => {
            ZstdDecoder::new(archive)
                .take(MAX_PKGINFO_SCAN)
                .read_to_end(&mut out)
                .await
        }
    };
    read.map_err(|e| Error::Archive(format!("{format:?} decompression failed: {e}")))?;
    Ok(out)
}

fn find_member(tar_bytes: &[u8], member: &str) -> Result<String> {
    let mut archive = tar::Archive::new(Cursor::new(tar_bytes));
    let entries = archive
        .entries()
        .map_err(|e| Error::Archive(format!("failed to read tar entries: {e}")))?;

    for entry in entries {
        // A truncated scan window ends the walk the same way a missing member does.
        let Ok(mut entry) = entry else { break };
        let is_member = match entry.path() {
            Ok(path) => path.to_string_lossy().trim_start_matches("./") == member,
            Err(_) => false,
        };
        if !is_member {
            continue;
        }

        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .map_err(|e| Error::Archive(format!("failed to read {member}: {e}")))?;
        return Ok(text);
    }

    Err(Error::Archive(format!("{member} not found in archive")))
}

/// Validate a client-supplied package file name.
///
/// The name becomes a storage key component, so it must be a single plain
/// path component, and it must not collide with detached signature names.
pub fn validate_file_name(name: &str) -> Result<()> {
    validate_path_component(name)?;
    if name.ends_with(SIGNATURE_SUFFIX) {
        return Err(Error::InvalidFileName(format!(
            "package file name cannot end in {SIGNATURE_SUFFIX}: {name}"
        )));
    }
    Ok(())
}

/// Check that `name` is a single plain path component.
pub fn validate_path_component(name: &str) -> Result<()> {
    if !is_safe_component(name) {
        return Err(Error::InvalidFileName(format!(
            "not a plain file name: {name:?}"
        )));
    }
    Ok(())
}

/// Detached signature file name for a package or index file.
pub fn signature_file_name(name: &str) -> String {
    format!("{name}{SIGNATURE_SUFFIX}")
}

/// Package names use ASCII alphanumerics and `@._+-`, and may not start
/// with `-` or `.`.
fn is_valid_name(name: &str) -> bool {
    !name.starts_with(['-', '.'])
        && name.len() <= 255
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '+' | '-'))
}

/// `[epoch:]pkgver-pkgrel`, where only the pkgrel separator may be a `-`.
fn is_valid_version(version: &str) -> bool {
    let Some((pkgver, pkgrel)) = version.rsplit_once('-') else {
        return false;
    };
    let upstream = pkgver.split_once(':').map_or(pkgver, |(_, rest)| rest);
    !upstream.is_empty()
        && !pkgrel.is_empty()
        && !pkgver.starts_with('.')
        && version.len() <= 255
        && [pkgver, pkgrel].iter().all(|part| {
            part.chars()
                .all(|c| c.is_ascii_graphic() && !matches!(c, '/' | '\\' | '-'))
        })
}

fn is_safe_component(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 255
        && !s.starts_with('.')
        && !s.contains(['/', '\\', '\0'])
        && !s.contains("..")
        && !s.chars().any(char::is_control)
}
