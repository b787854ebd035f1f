use std::time::Duration;

use infaq_api::CameraStartResponse;
use infaq_api_client::{ApiClient, AuthSession};
use infaq_core::{SourceDescriptor, SourceError, SourceMode};
use infaq_runtime_config::Capabilities;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::MonitorError;
use crate::reconciler::MonitorHandle;
use crate::token_store::TokenStore;

/// Upper bound on the stop request sent during logout.
pub const LOGOUT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Operator start/stop commands.
///
/// Nothing here sets `running` locally. A successful start asks the monitor
/// for an immediate poll and the UI follows whatever the server reports.
#[derive(Debug, Clone)]
pub struct SessionController {
    api: ApiClient,
    monitor: MonitorHandle,
    capabilities: Capabilities,
    tokens: Option<TokenStore>,
}

impl SessionController {
    pub fn new(api: ApiClient, monitor: MonitorHandle, capabilities: Capabilities) -> Self {
        Self {
            api,
            monitor,
            capabilities,
            tokens: None,
        }
    }

    /// Delete this token file on logout.
    pub fn with_token_store(mut self, tokens: TokenStore) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn monitor(&self) -> &MonitorHandle {
        &self.monitor
    }

    fn ensure_logged_in(&self) -> Result<(), MonitorError> {
        if self.api.session().is_authenticated() {
            Ok(())
        } else {
            Err(MonitorError::Auth("not logged in".into()))
        }
    }

    /// Start capture from an operator-chosen source.
    pub async fn start(
        &self,
        mode: SourceMode,
        source_ref: &str,
        looped: bool,
    ) -> Result<CameraStartResponse, MonitorError> {
        if !self.capabilities.allows(mode) {
            return Err(SourceError::ModeDisabled(mode).into());
        }
        let source = SourceDescriptor::from_input(mode, source_ref, looped)?;
        if self.capabilities.auth_required {
            self.ensure_logged_in()?;
        }

        let resp = self
            .api
            .camera_start(&source, self.capabilities.start_requires_auth)
            .await?;
        if resp.already_running() {
            info!("Camera already running");
        } else {
            info!("Camera start requested ({} {})", mode, source.source_ref());
        }
        self.monitor.set_source(mode, source.source_ref());
        self.monitor.poll_now();
        Ok(resp)
    }

    /// Start from the source stored server-side for this account.
    pub async fn start_from_default(&self) -> Result<CameraStartResponse, MonitorError> {
        self.ensure_logged_in()?;
        let resp = self.api.camera_start_default().await?;
        info!("Camera start requested (default source)");
        self.monitor.poll_now();
        Ok(resp)
    }

    /// Stop capture. Local alert and stream state are cleared before the
    /// request goes out, so a slow or failing server never holds the view.
    pub async fn stop(&self) -> Result<(), MonitorError> {
        self.monitor.local_stop();
        self.api.camera_stop().await?;
        info!("Camera stop requested");
        Ok(())
    }

    /// Tear down locally, then send a best-effort stop bounded by
    /// [`LOGOUT_STOP_TIMEOUT`]. The stop carries the token held at logout.
    pub async fn logout(&self) {
        let detached = self
            .api
            .clone()
            .with_session(AuthSession::new(self.api.session().token()));

        self.monitor.local_stop();
        self.api.session().clear();
        if let Some(tokens) = &self.tokens {
            if let Err(e) = tokens.delete() {
                warn!("Could not remove {}: {e}", tokens.path().display());
            }
        }
        self.monitor.shutdown();
        info!("Logged out");

        match timeout(LOGOUT_STOP_TIMEOUT, detached.camera_stop()).await {
            Ok(Ok(())) => debug!("Camera stopped on logout"),
            Ok(Err(e)) => debug!("Stop during logout failed: {e}"),
            Err(_) => debug!("Stop during logout timed out"),
        }
    }
}
