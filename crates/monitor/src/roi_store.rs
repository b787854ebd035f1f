use infaq_api_client::ApiClient;
use infaq_core::NormalizedRect;
use tracing::{debug, info, warn};

use crate::error::MonitorError;

/// Holds the committed ROI and the operator's not-yet-saved candidate.
///
/// The committed rectangle is only ever replaced whole: by a load, by a
/// successful save, or by a clear. Saves and clears are never retried.
#[derive(Debug, Clone)]
pub struct RoiStore {
    api: ApiClient,
    committed: Option<NormalizedRect>,
    candidate: Option<NormalizedRect>,
}

impl RoiStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            committed: None,
            candidate: None,
        }
    }

    pub fn committed(&self) -> Option<NormalizedRect> {
        self.committed
    }

    pub fn candidate(&self) -> Option<NormalizedRect> {
        self.candidate
    }

    /// Stage a rectangle from a finished drag. `None` (a rejected drag) keeps
    /// the previous candidate.
    pub fn propose(&mut self, rect: Option<NormalizedRect>) {
        if rect.is_some() {
            self.candidate = rect;
        }
    }

    pub fn discard_candidate(&mut self) {
        self.candidate = None;
    }

    /// Fetch the stored ROI. Any failure reads as "not configured".
    pub async fn load(&mut self) -> Option<NormalizedRect> {
        self.committed = match self.api.get_roi().await {
            Ok(resp) => resp.roi,
            Err(e) => {
                if e.is_auth() {
                    warn!("ROI load rejected: {e}");
                } else {
                    debug!("ROI load failed, treating as unset: {e}");
                }
                None
            }
        };
        self.committed
    }

    /// Persist `rect`, replacing the stored ROI.
    pub async fn save(&mut self, rect: Option<NormalizedRect>) -> Result<NormalizedRect, MonitorError> {
        let rect = rect.ok_or_else(|| MonitorError::Validation("no ROI drawn".into()))?;
        if !rect.meets_min_extent() {
            return Err(MonitorError::Validation(format!(
                "ROI {rect} is too small to save"
            )));
        }
        let resp = self.api.save_roi(&rect).await?;
        let stored = resp.roi.unwrap_or_else(|| rect.rounded());
        info!("ROI saved: {stored}");
        self.committed = Some(stored);
        self.candidate = None;
        Ok(stored)
    }

    /// Save the staged candidate.
    pub async fn save_candidate(&mut self) -> Result<NormalizedRect, MonitorError> {
        self.save(self.candidate).await
    }

    /// Remove the stored ROI. Succeeds for any 2xx, also when nothing was set.
    pub async fn clear(&mut self) -> Result<(), MonitorError> {
        self.api.clear_roi().await?;
        info!("ROI cleared");
        self.committed = None;
        self.candidate = None;
        Ok(())
    }
}
