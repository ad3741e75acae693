//! Package archive fixtures.

use async_compression::tokio::bufread::ZstdEncoder;
use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::{Read, Write};
use tokio::io::AsyncReadExt;

/// Minimal package description used to build test archives.
#[derive(Clone, Debug)]
pub struct TestPackage {
    pub name: String,
    pub version: String,
    pub arch: String,
    pub depends: Vec<String>,
}

#[allow(dead_code)]
impl TestPackage {
    pub fn new(name: &str, version: &str, arch: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            arch: arch.to_string(),
            depends: Vec::new(),
        }
    }

    pub fn depends(mut self, dep: &str) -> Self {
        self.depends.push(dep.to_string());
        self
    }

    /// Conventional `name-version-arch.pkg.tar.zst` file name.
    pub fn file_name(&self) -> String {
        format!("{}-{}-{}.pkg.tar.zst", self.name, self.version, self.arch)
    }

    pub fn pkginfo(&self) -> String {
        let mut text = format!(
            "# Generated by makepkg\n\
             pkgname = {name}\n\
             pkgbase = {name}\n\
             pkgver = {version}\n\
             pkgdesc = Test package {name}\n\
             url = https://example.invalid/{name}\n\
             builddate = 1700000000\n\
             packager = Test Packager <test@example.invalid>\n\
             size = 4096\n\
             arch = {arch}\n\
             license = MIT\n",
            name = self.name,
            version = self.version,
            arch = self.arch,
        );
        for dep in &self.depends {
            text.push_str(&format!("depend = {dep}\n"));
        }
        text
    }

    /// Uncompressed tar with `.PKGINFO` and one payload file.
    pub fn tar(&self) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        append_file(&mut builder, ".PKGINFO", self.pkginfo().as_bytes());
        append_file(
            &mut builder,
            "usr/share/doc/depot-test/README",
            format!("payload for {}\n", self.name).as_bytes(),
        );
        builder.into_inner().unwrap()
    }

    /// zstd-compressed archive, as produced by current makepkg.
    pub async fn archive(&self) -> Bytes {
        let tar = self.tar();
        let mut encoder = ZstdEncoder::new(tar.as_slice());
        let mut out = Vec::new();
        encoder.read_to_end(&mut out).await.unwrap();
        Bytes::from(out)
    }

    /// gzip-compressed archive.
    pub fn gzip_archive(&self) -> Bytes {
        gzip(&self.tar())
    }
}

fn append_file(builder: &mut tar::Builder<Vec<u8>>, path: &str, data: &[u8]) {
    let mut header = tar::Header::new_ustar();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_entry_type(tar::EntryType::Regular);
    builder.append_data(&mut header, path, data).unwrap();
}

/// gzip-compress arbitrary bytes.
#[allow(dead_code)]
pub fn gzip(data: &[u8]) -> Bytes {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    Bytes::from(encoder.finish().unwrap())
}

/// A valid tar archive with no `.PKGINFO` member.
#[allow(dead_code)]
pub fn archive_without_pkginfo() -> Bytes {
    let mut builder = tar::Builder::new(Vec::new());
    append_file(&mut builder, "usr/bin/tool", b"#!/bin/sh\n");
    gzip(&builder.into_inner().unwrap())
}

/// Decoded contents of a published index: `(member path, text)` pairs.
#[allow(dead_code)]
pub fn read_index(database: &[u8]) -> Vec<(String, String)> {
    let decoder = flate2::read::GzDecoder::new(database);
    let mut archive = tar::Archive::new(decoder);
    let mut members = Vec::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        if entry.header().entry_type().is_dir() {
            continue;
        }
        let path = entry.path().unwrap().to_string_lossy().into_owned();
        let mut text = String::new();
        entry.read_to_string(&mut text).unwrap();
        members.push((path, text));
    }
    members
}

/// `name-version` directories listed in a published index.
#[allow(dead_code)]
pub fn index_packages(database: &[u8]) -> Vec<String> {
    read_index(database)
        .into_iter()
        .filter_map(|(path, _)| path.strip_suffix("/desc").map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_archive_parses() {
        let pkg = TestPackage::new("hello", "1.0-1", "x86_64").depends("glibc");
        let info = depot_core::read_pkginfo(&pkg.archive().await).await.unwrap();
        assert_eq!(info.name, "hello");
        assert_eq!(info.version, "1.0-1");
        assert_eq!(info.architecture, "x86_64");
        assert_eq!(info.depends, vec!["glibc"]);
    }
}
