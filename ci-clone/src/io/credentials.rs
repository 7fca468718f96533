//! Credential material for authenticated remote operations.
//!
//! Written before any network operation of an attempt; a no-op when the
//! pipeline supplies nothing.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::CloneError;

/// Machine/login/password triple written to `~/.netrc`.
#[derive(Clone, PartialEq, Eq)]
pub struct Netrc {
    pub machine: String,
    pub login: String,
    pub password: String,
}

impl std::fmt::Debug for Netrc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Netrc")
            .field("machine", &self.machine)
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Netrc {
    pub fn render(&self) -> String {
        format!(
            "machine {}\nlogin {}\npassword {}\n",
            self.machine, self.login, self.password
        )
    }
}

/// Everything the credential provisioner may write.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Home directory that receives `.netrc` and `.ssh/`.
    pub home: PathBuf,
    pub netrc: Option<Netrc>,
    /// Private key material written to `.ssh/id_rsa`.
    pub ssh_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("home", &self.home)
            .field("netrc", &self.netrc)
            .field("ssh_key", &self.ssh_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Credentials that write nothing.
    pub fn none(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            netrc: None,
            ssh_key: None,
        }
    }

    pub fn netrc_path(&self) -> PathBuf {
        self.home.join(".netrc")
    }

    pub fn ssh_key_path(&self) -> PathBuf {
        self.home.join(".ssh").join("id_rsa")
    }

    /// Write the configured credential files.
    pub fn provision(&self) -> Result<(), CloneError> {
        match &self.netrc {
            Some(netrc) if !netrc.machine.is_empty() => {
                let path = self.netrc_path();
                write_private(&path, netrc.render().as_bytes())?;
                info!(machine = %netrc.machine, path = %path.display(), "wrote netrc");
            }
            _ => debug!("no netrc machine supplied"),
        }

        if let Some(key) = self.ssh_key.as_deref().filter(|key| !key.trim().is_empty()) {
            let path = self.ssh_key_path();
            if let Some(dir) = path.parent() {
                create_private_dir(dir)?;
            }
            let mut material = key.to_string();
            if !material.ends_with('\n') {
                material.push('\n');
            }
            write_private(&path, material.as_bytes())?;
            info!(path = %path.display(), "wrote ssh key");
        }

        Ok(())
    }
}

/// Resolve the current user's home directory, falling back to `/root`.
///
/// `HOME` wins when set; otherwise the user database is consulted.
pub fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"))
}

fn credential_error(path: &Path) -> impl FnOnce(std::io::Error) -> CloneError + '_ {
    move |source| CloneError::Credential {
        path: path.to_path_buf(),
        source,
    }
}

fn create_private_dir(dir: &Path) -> Result<(), CloneError> {
    fs::create_dir_all(dir).map_err(credential_error(dir))?;
    set_mode(dir, 0o700)
}

fn write_private(path: &Path, contents: &[u8]) -> Result<(), CloneError> {
    fs::write(path, contents).map_err(credential_error(path))?;
    set_mode(path, 0o600)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), CloneError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(credential_error(path))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), CloneError> {
    Ok(())
}
