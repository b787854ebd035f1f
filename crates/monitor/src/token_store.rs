use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use infaq_api_client::AuthSession;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Bearer token persisted between runs.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved token, if any. Unreadable or blank files count as logged out.
    pub fn load(&self) -> Option<String> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let token = content.trim();
        (!token.is_empty()).then(|| token.to_string())
    }

    /// Session initialized from the saved token.
    pub fn session(&self) -> AuthSession {
        AuthSession::new(self.load())
    }

    pub fn save(&self, token: &str) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut file = open_private(&self.path)?;
        file.write_all(token.as_bytes())?;
        debug!("Token saved to {}", self.path.display());
        Ok(())
    }

    /// Remove the saved token. Missing files are fine.
    pub fn delete(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Token removed from {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Mirror `session` to disk until it is dropped: a new token is written,
    /// a cleared one (logout, 401) deletes the file.
    pub fn follow(&self, session: &AuthSession) -> JoinHandle<()> {
        let store = self.clone();
        let mut rx = session.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let token = rx.borrow_and_update().clone();
                let result = match token {
                    Some(token) => store.save(&token),
                    None => store.delete(),
                };
                if let Err(e) = result {
                    warn!("Could not update {}: {e}", store.path.display());
                }
            }
        })
    }
}

/// Open for writing with mode 0600 from the moment the file exists. A file
/// left behind with a looser mode is tightened before anything is written.
#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
