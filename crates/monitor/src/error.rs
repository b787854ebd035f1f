use infaq_api_client::ApiError;
use infaq_core::{GeometryError, SourceError};

/// Operator-facing failure classes.
///
/// `Validation` and `Transport` are shown inline. `Auth` means the session is
/// gone and the operator must log in again. `DegradedStream` is informational:
/// the viewer already switched to snapshots on its own.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("{0}")]
    Validation(String),
    #[error("authentication required: {0}")]
    Auth(String),
    #[error("{0}")]
    Transport(String),
    #[error("live stream unavailable, showing snapshots: {0}")]
    DegradedStream(String),
}

impl MonitorError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl From<ApiError> for MonitorError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Validation(e) => Self::Validation(e.to_string()),
            e if e.is_auth() => Self::Auth(e.detail()),
            e => Self::Transport(e.detail()),
        }
    }
}

impl From<SourceError> for MonitorError {
    fn from(err: SourceError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<GeometryError> for MonitorError {
    fn from(err: GeometryError) -> Self {
        Self::Validation(err.to_string())
    }
}
