//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Optional port that overrides the port in `bind`.
    #[serde(default)]
    pub port: Option<u16>,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    /// Maximum accepted upload request size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_max_upload_bytes() -> usize {
    512 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: None,
            metrics_enabled: default_metrics_enabled(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ServerConfig {
    /// Resolve the socket address to listen on.
    pub fn listen_addr(&self) -> Result<SocketAddr, String> {
        let mut addr: SocketAddr = self
            .bind
            .parse()
            .map_err(|e| format!("server.bind '{}' is not a socket address: {e}", self.bind))?;
        if let Some(port) = self.port {
            addr.set_port(port);
        }
        Ok(addr)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.listen_addr()?;
        if self.max_upload_bytes == 0 {
            return Err("server.max_upload_bytes cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Repository configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepositoriesConfig {
    /// Colon-separated list of repository root directories. The base name of
    /// each directory is the repository name.
    #[serde(default)]
    pub paths: String,
    /// Reject packages uploaded without a valid detached signature.
    #[serde(default)]
    pub require_signed_packages: bool,
    /// Architecture directories created in every repository at startup.
    #[serde(default = "default_architectures")]
    pub architectures: Vec<String>,
}

fn default_architectures() -> Vec<String> {
    vec!["x86_64".to_string()]
}

impl Default for RepositoriesConfig {
    fn default() -> Self {
        Self {
            paths: String::new(),
            require_signed_packages: false,
            architectures: default_architectures(),
        }
    }
}

impl RepositoriesConfig {
    /// Repository roots in configuration order. Empty segments are skipped.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.paths
            .split(':')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    /// Repository name for a root directory: its final path component.
    pub fn repo_name(path: &Path) -> Option<String> {
        path.file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
            .map(str::to_string)
    }

    pub fn validate(&self) -> Result<(), String> {
        let paths = self.search_paths();
        if paths.is_empty() {
            return Err("repositories.paths must name at least one directory".to_string());
        }

        let mut seen = HashSet::new();
        for path in &paths {
            let name = Self::repo_name(path).ok_or_else(|| {
                format!(
                    "repository path '{}' has no usable base name",
                    path.display()
                )
            })?;
            if !seen.insert(name.clone()) {
                return Err(format!(
                    "repository name '{name}' is configured more than once (path '{}')",
                    path.display()
                ));
            }
        }

        for arch in &self.architectures {
            if arch.is_empty() || arch.contains('/') || arch.starts_with('.') {
                return Err(format!("invalid architecture directory '{arch}'"));
            }
        }

        Ok(())
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// SQLite database file path.
    #[serde(default = "default_metadata_path")]
    pub path: PathBuf,
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from("./data/kv-db")
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            path: default_metadata_path(),
        }
    }
}

impl MetadataConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.path.as_os_str().is_empty() {
            return Err("metadata.path cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Index signing configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Credential home base directory. Wiped at startup and shutdown.
    #[serde(default = "default_gpg_dir")]
    pub gpg_dir: PathBuf,
    /// Armored secret key used to sign repository indexes.
    /// When absent, indexes are published unsigned.
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    /// Public keys trusted to sign uploaded packages.
    #[serde(default)]
    pub trusted_keys: Vec<PathBuf>,
    /// Upper bound on a single signing invocation.
    #[serde(default = "default_signing_timeout_secs")]
    pub timeout_secs: u64,
    /// gpg executable name or path.
    #[serde(default = "default_gpg_binary")]
    pub gpg_binary: String,
}

fn default_gpg_dir() -> PathBuf {
    PathBuf::from("./data/gnupg")
}

fn default_signing_timeout_secs() -> u64 {
    5
}

fn default_gpg_binary() -> String {
    "gpg".to_string()
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            gpg_dir: default_gpg_dir(),
            key_file: None,
            trusted_keys: Vec::new(),
            timeout_secs: default_signing_timeout_secs(),
            gpg_binary: default_gpg_binary(),
        }
    }
}

impl SigningConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("signing.timeout_secs cannot be 0".to_string());
        }
        if self.gpg_binary.trim().is_empty() {
            return Err("signing.gpg_binary cannot be empty".to_string());
        }
        if self.gpg_dir.as_os_str().is_empty() || self.gpg_dir == Path::new("/") {
            return Err("signing.gpg_dir must be a dedicated directory".to_string());
        }
        Ok(())
    }
}

/// Credentials for the mutation API (HTTP Basic).
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ApiConfig {
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            username: "admin".to_string(),
            password: "secret".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.username.is_empty() {
            return Err("api.username cannot be empty".to_string());
        }
        if self.password.is_empty() {
            return Err("api.password cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub repositories: RepositoriesConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    /// API credentials (required).
    pub api: ApiConfig,
}

impl AppConfig {
    /// Create a test configuration rooted in `dir`.
    ///
    /// **For testing only.** Creates no directories; `repos` are the
    /// repository names, each placed under `dir/repos/<name>`.
    pub fn for_testing(dir: &Path, repos: &[&str]) -> Self {
        let paths = repos
            .iter()
            .map(|name| dir.join("repos").join(name).display().to_string())
            .collect::<Vec<_>>()
            .join(":");

        Self {
            server: ServerConfig::default(),
            repositories: RepositoriesConfig {
                paths,
                ..Default::default()
            },
            metadata: MetadataConfig {
                path: dir.join("kv-db"),
            },
            signing: SigningConfig {
                gpg_dir: dir.join("gnupg"),
                ..Default::default()
            },
            api: ApiConfig::for_testing(),
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.repositories.validate()?;
        self.metadata.validate()?;
        self.signing.validate()?;
        self.api.validate()?;
        Ok(())
    }
}
