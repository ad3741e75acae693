//! `gpg`-backed signing identity.

use crate::error::{SignerError, SignerResult};
use crate::signer::{IdentityState, IndexSigner};
use async_trait::async_trait;
use depot_core::config::SigningConfig;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Mutex;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Credential home holding the imported secret key.
const SIGN_HOME: &str = "sign";
/// Credential home holding trusted public keys for package verification.
const VERIFY_HOME: &str = "verify";

/// Signing identity backed by an isolated `gpg` home directory.
pub struct GpgIdentity {
    gpg_binary: String,
    gpg_dir: PathBuf,
    timeout: Duration,
    verify_home: Option<PathBuf>,
    state: Mutex<IdentityState>,
}

impl GpgIdentity {
    /// Set up the identity from configuration.
    ///
    /// Any credential home left over from a previous run is removed first.
    /// A missing key file only logs a warning and leaves the identity
    /// uninitialized; a key that exists but cannot be imported is an error.
    pub async fn initialize(config: &SigningConfig) -> SignerResult<Self> {
        remove_dir_if_exists(&config.gpg_dir).await?;

        let mut identity = Self {
            gpg_binary: config.gpg_binary.clone(),
            gpg_dir: config.gpg_dir.clone(),
            timeout: config.timeout(),
            verify_home: None,
            state: Mutex::new(IdentityState::Uninitialized),
        };

        if !config.trusted_keys.is_empty() {
            let home = config.gpg_dir.join(VERIFY_HOME);
            create_private_dir(&home).await?;
            for key in &config.trusted_keys {
                identity.import(&home, key, false).await?;
            }
            tracing::info!(
                count = config.trusted_keys.len(),
                "imported trusted package signing keys"
            );
            identity.verify_home = Some(home);
        }

        match &config.key_file {
            None => {
                tracing::info!("no signing key configured; repository indexes will be unsigned");
            }
            Some(key_file) if !fs::try_exists(key_file).await.unwrap_or(false) => {
                tracing::warn!(
                    key_file = %key_file.display(),
                    "signing key file not found; repository indexes will be unsigned"
                );
            }
            Some(key_file) => {
                let home = identity.sign_home();
                create_private_dir(&home).await?;
                identity.import(&home, key_file, true).await?;
                identity.set_state(IdentityState::Active);
                tracing::info!(key_file = %key_file.display(), "signing identity active");
            }
        }

        Ok(identity)
    }

    fn sign_home(&self) -> PathBuf {
        self.gpg_dir.join(SIGN_HOME)
    }

    fn set_state(&self, state: IdentityState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    async fn import(&self, home: &Path, key: &Path, secret: bool) -> SignerResult<()> {
        let mut args: Vec<OsString> = vec!["--batch".into()];
        if secret {
            args.push("--allow-secret-key-import".into());
        }
        args.push("--import".into());
        args.push(key.as_os_str().to_owned());

        let output = self
            .run(home, &args, None, "key import")
            .await
            .map_err(|e| SignerError::Import(format!("{}: {e}", key.display())))?;

        if !output.status.success() {
            return Err(SignerError::Import(format!(
                "{}: {}",
                key.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    /// Run gpg against `home` with a bounded runtime. The child is killed
    /// if the timeout elapses.
    async fn run(
        &self,
        home: &Path,
        args: &[OsString],
        stdin: Option<&[u8]>,
        operation: &'static str,
    ) -> SignerResult<Output> {
        let mut cmd = Command::new(&self.gpg_binary);
        cmd.env("GNUPGHOME", home)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| SignerError::Spawn {
            binary: self.gpg_binary.clone(),
            source,
        })?;

        let writer = match (stdin, child.stdin.take()) {
            (Some(data), Some(mut pipe)) => {
                let data = data.to_vec();
                Some(tokio::spawn(async move {
                    // A child that exits early closes the pipe; its exit
                    // status reports the failure.
                    let _ = pipe.write_all(&data).await;
                    let _ = pipe.shutdown().await;
                }))
            }
            _ => None,
        };

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| SignerError::Timeout {
                operation,
                timeout: self.timeout,
            })??;

        if let Some(writer) = writer {
            let _ = writer.await;
        }

        Ok(output)
    }
}

#[async_trait]
impl IndexSigner for GpgIdentity {
    fn state(&self) -> IdentityState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn sign(&self, data: &[u8]) -> SignerResult<Vec<u8>> {
        if !self.is_active() {
            return Err(SignerError::NotActive);
        }

        let args: Vec<OsString> = ["--batch", "--yes", "--detach-sign", "--output", "-"]
            .into_iter()
            .map(OsString::from)
            .collect();
        let output = self
            .run(&self.sign_home(), &args, Some(data), "index signing")
            .await?;

        if !output.status.success() {
            return Err(SignerError::Signing(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        if output.stdout.is_empty() {
            return Err(SignerError::Signing("empty signature".to_string()));
        }

        Ok(output.stdout)
    }

    async fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        let Some(home) = &self.verify_home else {
            tracing::debug!("no trusted keys configured; rejecting package signature");
            return false;
        };

        let sig_file = match tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".sig")
            .tempfile_in(home)
        {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(error = %e, "failed to stage signature for verification");
                return false;
            }
        };
        if let Err(e) = fs::write(sig_file.path(), signature).await {
            tracing::warn!(error = %e, "failed to stage signature for verification");
            return false;
        }

        let args: Vec<OsString> = vec![
            "--batch".into(),
            "--trust-model".into(),
            "always".into(),
            "--verify".into(),
            sig_file.path().as_os_str().to_owned(),
            "-".into(),
        ];

        match self
            .run(home, &args, Some(data), "signature verification")
            .await
        {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                tracing::debug!(
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "package signature rejected"
                );
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "package signature verification failed to run");
                false
            }
        }
    }

    async fn tear_down(&self) {
        self.set_state(IdentityState::TornDown);
        match remove_dir_if_exists(&self.gpg_dir).await {
            Ok(()) => tracing::info!(gpg_dir = %self.gpg_dir.display(), "removed credential home"),
            Err(e) => tracing::error!(
                gpg_dir = %self.gpg_dir.display(),
                error = %e,
                "failed to remove credential home"
            ),
        }
    }
}

async fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

async fn create_private_dir(path: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(path).await
}
