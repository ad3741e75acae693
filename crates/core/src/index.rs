//! Repository index (sync database) generation.
//!
//! The index for one repository/architecture is a pure function of the
//! package records stored for it: entries are filtered by architecture,
//! reduced to the newest version of each package name, sorted by name and
//! written as a gzip-compressed tar of `name-version/desc` members with all
//! timestamps zeroed, so identical inputs always produce identical bytes.

use crate::error::{Error, Result};
use crate::hash::ContentHash;
use crate::package::PkgInfo;
use crate::version::vercmp;
use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Database file name for a repository (`<repo>.db.tar.gz`).
pub fn database_file_name(repo: &str) -> String {
    format!("{repo}.db.tar.gz")
}

/// Short database name pacman clients fetch (`<repo>.db`).
pub fn database_alias_name(repo: &str) -> String {
    format!("{repo}.db")
}

/// One package as it appears in the index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub file_name: String,
    pub checksum: ContentHash,
    pub compressed_size: u64,
    /// Base64 detached signature of the archive, if one was uploaded.
    pub pgp_signature: Option<String>,
    pub info: PkgInfo,
}

/// The index of one repository/architecture pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryIndex {
    repo: String,
    architecture: String,
    entries: Vec<IndexEntry>,
}

impl RepositoryIndex {
    /// Project a set of package entries into the index for `architecture`.
    ///
    /// Entries for other architectures are ignored. When several files carry
    /// the same package name, the highest version wins; equal versions fall
    /// back to the greatest file name.
    pub fn project(
        repo: impl Into<String>,
        architecture: impl Into<String>,
        entries: impl IntoIterator<Item = IndexEntry>,
    ) -> Self {
        let architecture = architecture.into();
        let mut latest: BTreeMap<String, IndexEntry> = BTreeMap::new();

        for entry in entries {
            if entry.info.architecture != architecture {
                continue;
            }
            match latest.get(&entry.info.name) {
                Some(current) if !supersedes(&entry, current) => {}
                _ => {
                    latest.insert(entry.info.name.clone(), entry);
                }
            }
        }

        Self {
            repo: repo.into(),
            architecture,
            entries: latest.into_values().collect(),
        }
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    /// Entries in index order (sorted by package name).
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode the index as a gzip-compressed tar database.
    pub fn to_database(&self) -> Result<Bytes> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for entry in &self.entries {
            let dir = entry.info.index_dir();

            let mut header = tar::Header::new_ustar();
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            header.set_mtime(0);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("{dir}/"), std::io::empty())
                .map_err(|e| Error::IndexBuild(format!("failed to append {dir}/: {e}")))?;

            let desc = render_desc(entry);
            let mut header = tar::Header::new_ustar();
            header.set_size(desc.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(0);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("{dir}/desc"), desc.as_bytes())
                .map_err(|e| Error::IndexBuild(format!("failed to append {dir}/desc: {e}")))?;
        }

        let encoder = builder
            .into_inner()
            .map_err(|e| Error::IndexBuild(format!("failed to finish tar: {e}")))?;
        let data = encoder
            .finish()
            .map_err(|e| Error::IndexBuild(format!("failed to finish gzip: {e}")))?;

        Ok(Bytes::from(data))
    }
}

fn supersedes(candidate: &IndexEntry, current: &IndexEntry) -> bool {
    match vercmp(&candidate.info.version, &current.info.version) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.file_name > current.file_name,
    }
}

/// Render the `desc` member for one entry.
pub fn render_desc(entry: &IndexEntry) -> String {
    let info = &entry.info;
    let mut out = String::new();

    field(&mut out, "FILENAME", [entry.file_name.as_str()]);
    field(&mut out, "NAME", [info.name.as_str()]);
    field(&mut out, "BASE", info.base.as_deref());
    field(&mut out, "VERSION", [info.version.as_str()]);
    field(&mut out, "DESC", info.description.as_deref());
    list(&mut out, "GROUPS", &info.groups);
    field(&mut out, "CSIZE", [entry.compressed_size.to_string().as_str()]);
    field(
        &mut out,
        "ISIZE",
        info.installed_size.map(|s| s.to_string()).as_deref(),
    );
    field(&mut out, "SHA256SUM", [entry.checksum.to_hex().as_str()]);
    field(&mut out, "PGPSIG", entry.pgp_signature.as_deref());
    field(&mut out, "URL", info.url.as_deref());
    list(&mut out, "LICENSE", &info.licenses);
    field(&mut out, "ARCH", [info.architecture.as_str()]);
    field(
        &mut out,
        "BUILDDATE",
        info.build_date.map(|d| d.to_string()).as_deref(),
    );
    field(&mut out, "PACKAGER", info.packager.as_deref());
    list(&mut out, "REPLACES", &info.replaces);
    list(&mut out, "CONFLICTS", &info.conflicts);
    list(&mut out, "PROVIDES", &info.provides);
    list(&mut out, "DEPENDS", &info.depends);
    list(&mut out, "OPTDEPENDS", &info.optdepends);
    list(&mut out, "MAKEDEPENDS", &info.makedepends);
    list(&mut out, "CHECKDEPENDS", &info.checkdepends);

    out
}

fn field<'a>(out: &mut String, key: &str, values: impl IntoIterator<Item = &'a str>) {
    let mut values = values.into_iter().filter(|v| !v.is_empty()).peekable();
    if values.peek().is_none() {
        return;
    }
    let _ = writeln!(out, "%{key}%");
    for value in values {
        let _ = writeln!(out, "{value}");
    }
    out.push('\n');
}

fn list(out: &mut String, key: &str, values: &[String]) {
    field(out, key, values.iter().map(String::as_str));
}
