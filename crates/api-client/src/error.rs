use infaq_api::RequestValidationError;
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Payload rejected locally; nothing was sent.
    #[error(transparent)]
    Validation(#[from] RequestValidationError),
    /// The call needs a bearer token and none is held.
    #[error("not logged in")]
    NotAuthenticated,
    /// HTTP 401.
    #[error("unauthorized: {detail}")]
    Unauthorized { detail: String },
    /// Any other non-2xx answer, with the server's detail text verbatim.
    #[error("{status}: {detail}")]
    Status { status: StatusCode, detail: String },
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// True for errors that mean the caller must re-authenticate.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::NotAuthenticated)
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            Self::Status { status, .. } => Some(*status),
            Self::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Text to show the operator inline.
    pub fn detail(&self) -> String {
        match self {
            Self::Unauthorized { detail } | Self::Status { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}
