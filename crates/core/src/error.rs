//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("invalid repository name: {0}")]
    InvalidRepoName(String),

    #[error("unsupported archive format: {0}")]
    UnsupportedArchive(String),

    #[error("archive read error: {0}")]
    Archive(String),

    #[error("pkginfo parse error: {0}")]
    PkgInfoParse(String),

    #[error("index build error: {0}")]
    IndexBuild(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),
}

impl Error {
    /// Whether this error describes a package the client sent that cannot be indexed.
    pub fn is_malformed_package(&self) -> bool {
        matches!(
            self,
            Self::InvalidFileName(_)
                | Self::UnsupportedArchive(_)
                | Self::Archive(_)
                | Self::PkgInfoParse(_)
        )
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
