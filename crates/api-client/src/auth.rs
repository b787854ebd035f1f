use std::sync::Arc;

use tokio::sync::watch;

/// Process-wide bearer token holder.
///
/// Cloning yields another handle to the same session. The token is set on
/// login, and cleared on logout or when an authenticated request comes back
/// 401. Observers (e.g. the on-disk token store) follow changes through
/// [`AuthSession::subscribe`].
#[derive(Debug, Clone)]
pub struct AuthSession {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AuthSession {
    pub fn new(token: Option<String>) -> Self {
        let token = token.filter(|t| !t.trim().is_empty());
        let (tx, _rx) = watch::channel(token);
        Self { tx: Arc::new(tx) }
    }

    pub fn token(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn set(&self, token: String) {
        self.tx.send_replace(Some(token));
    }

    /// Drop the held token. Returns true when one was held.
    pub fn clear(&self) -> bool {
        self.tx.send_replace(None).is_some()
    }

    /// Clear only if `token` is still the one held, so a 401 for a request
    /// sent with an old token cannot wipe a fresh login.
    pub fn invalidate(&self, token: &str) -> bool {
        self.tx.send_if_modified(|held| {
            if held.as_deref() == Some(token) {
                *held = None;
                true
            } else {
                false
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}
