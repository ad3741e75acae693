//! Core domain types and shared logic for the depot package repository server.
//!
//! This crate defines the data model used across all other crates:
//! - Package archive inspection (`.PKGINFO`)
//! - pacman version ordering
//! - Repository index (sync database) generation
//! - Content hashes and configuration

pub mod config;
pub mod error;
pub mod hash;
pub mod index;
pub mod package;
pub mod version;

pub use error::{Error, Result};
pub use hash::ContentHash;
pub use index::{IndexEntry, RepositoryIndex, database_alias_name, database_file_name};
pub use package::{
    ArchiveFormat, PkgInfo, read_pkginfo, signature_file_name, validate_file_name,
    validate_path_component,
};
pub use version::vercmp;
