use std::time::Duration;

use anyhow::{Context, Result, bail};
use infaq_api_client::ApiClient;
use infaq_monitor::{MonitorHandle, MonitorOptions, SessionController, TokenStore, spawn_monitor};
use infaq_runtime_config::MonitorConfig;
use tokio::task::JoinHandle;

use crate::config::{load_config, token_path};

/// Config, client and token file shared by every command.
pub struct AppContext {
    pub config: MonitorConfig,
    pub api: ApiClient,
    pub tokens: TokenStore,
    _token_sync: JoinHandle<()>,
}

impl AppContext {
    pub fn load() -> Result<Self> {
        let config = load_config()?;
        let tokens = TokenStore::new(token_path()?);
        let session = tokens.session();

        let timeout = Duration::from_secs(config.server.request_timeout_secs);
        let mut api = ApiClient::new(config.auth_base(), timeout)
            .context("Failed to create HTTP client")?
            .with_session(session.clone());
        if config.capabilities.dual_base {
            api = api.with_edge(config.edge_base(), config.edge_key());
        } else if let Some(key) = config.edge_key() {
            api = api.with_edge(config.auth_base(), Some(key));
        }

        let token_sync = tokens.follow(&session);
        Ok(Self {
            config,
            api,
            tokens,
            _token_sync: token_sync,
        })
    }

    /// Bring the token file in line with the session before the process exits.
    pub fn sync_token(&self) {
        let result = match self.api.session().token() {
            Some(token) if self.tokens.load().as_deref() != Some(token.as_str()) => {
                self.tokens.save(&token)
            }
            Some(_) => Ok(()),
            None => self.tokens.delete(),
        };
        if let Err(e) = result {
            tracing::warn!("Could not update {}: {e}", self.tokens.path().display());
        }
    }

    /// Fail early for commands that need a login when the deployment requires one.
    pub fn require_login(&self) -> Result<()> {
        if self.config.capabilities.auth_required && !self.api.session().is_authenticated() {
            bail!("Not logged in. Run `infaq login` first.");
        }
        Ok(())
    }

    pub fn spawn_monitor(&self, poll_interval: Option<Duration>) -> (MonitorHandle, JoinHandle<()>) {
        let mut options = MonitorOptions::from_settings(&self.config.monitor);
        if let Some(interval) = poll_interval {
            options.poll_interval = interval;
        }
        spawn_monitor(self.api.clone(), options)
    }

    pub fn controller(&self, monitor: MonitorHandle) -> SessionController {
        SessionController::new(self.api.clone(), monitor, self.config.capabilities.clone())
            .with_token_store(self.tokens.clone())
    }
}
