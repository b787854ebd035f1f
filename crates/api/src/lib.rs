//! Request/response types for the two services the monitor talks to:
//! the edge camera service (`/roi`, `/camera/*`) and the account service
//! (`/auth/*`). Payload validation that must happen before any network call
//! lives next to the request types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use infaq_core::{AlertStatus, NormalizedRect, PolledStatus, SourceMode};

// ─── Routes ──────────────────────────────────────────────────────────────────

pub mod routes {
    pub const ROI: &str = "/roi";
    pub const CAMERA_STATUS: &str = "/camera/status";
    pub const CAMERA_START: &str = "/camera/start";
    pub const CAMERA_START_DEFAULT: &str = "/camera/start-default";
    pub const CAMERA_STOP: &str = "/camera/stop";
    pub const CAMERA_STREAM: &str = "/camera/stream";
    pub const CAMERA_SNAPSHOT: &str = "/camera/snapshot";
    pub const AUTH_LOGIN: &str = "/auth/login";
    pub const AUTH_REGISTER_MASJID: &str = "/auth/register-masjid";
}

// ─── Validation ──────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RequestValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },
    #[error("{field} must be between {min} and {max} characters")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
    },
    #[error("password is too long (max 72 bytes)")]
    PasswordTooLong,
    #[error("camera_url must start with http://, https:// or rtsp://")]
    CameraUrlScheme,
}

fn check_len(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), RequestValidationError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(RequestValidationError::Length { field, min, max });
    }
    Ok(())
}

// ─── Generic ─────────────────────────────────────────────────────────────────

/// Simple acknowledgement returned by stop/clear style endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct OkResponse {
    #[serde(default)]
    pub ok: bool,
}

/// Error body shape used by the services: `{"detail": ...}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Operator-facing detail text for an error response body.
///
/// String details are returned verbatim; structured details (validation
/// lists) are re-serialized; anything else falls back to the raw body.
pub fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorBody { detail }) if !detail.is_null() => detail.to_string(),
        _ => body.trim().to_string(),
    }
}

// ─── ROI ─────────────────────────────────────────────────────────────────────

/// `GET /roi` and `POST /roi` response. `roi: null` means not configured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoiResponse {
    #[serde(default)]
    pub roi: Option<NormalizedRect>,
}

// ─── Camera ──────────────────────────────────────────────────────────────────

/// `GET /camera/status`. Only `running` and `alert_status` are reconciled;
/// the rest is diagnostics shown to the operator when present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CameraStatusResponse {
    pub running: bool,
    #[serde(default)]
    pub alert_status: Option<AlertStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_ready: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_frame_ts: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_cap_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub looped: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masjid_id: Option<i64>,
}

impl CameraStatusResponse {
    pub fn polled(&self) -> PolledStatus {
        PolledStatus {
            running: self.running,
            alert_status: self.alert_status,
        }
    }
}

/// `POST /camera/start` and `POST /camera/start-default`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CameraStartResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub masjid_id: Option<i64>,
    #[serde(default)]
    pub source: Option<String>,
}

impl CameraStartResponse {
    pub fn already_running(&self) -> bool {
        self.msg.as_deref() == Some("already running")
    }
}

// ─── Auth ────────────────────────────────────────────────────────────────────

/// OAuth2 password-form login (`application/x-www-form-urlencoded`).
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), RequestValidationError> {
        if self.username.trim().is_empty() {
            return Err(RequestValidationError::Missing { field: "username" });
        }
        if self.password.is_empty() {
            return Err(RequestValidationError::Missing { field: "password" });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

pub const DEFAULT_CAMERA_NAME: &str = "Kamera Utama";

/// Tenant + admin + camera registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterMasjidRequest {
    pub nama_masjid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alamat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tg_chat_id: Option<String>,
    #[serde(default = "default_camera_name")]
    pub camera_nama: String,
    pub camera_url: String,
    pub username: String,
    pub password: String,
}

fn default_camera_name() -> String {
    DEFAULT_CAMERA_NAME.to_string()
}

impl RegisterMasjidRequest {
    /// Mirror of the server-side constraints so obvious mistakes never leave
    /// the machine.
    pub fn validate(&self) -> Result<(), RequestValidationError> {
        check_len("nama_masjid", &self.nama_masjid, 3, 150)?;
        check_len("camera_url", &self.camera_url, 5, usize::MAX)?;
        if !["http://", "https://", "rtsp://"]
            .iter()
            .any(|scheme| self.camera_url.starts_with(scheme))
        {
            return Err(RequestValidationError::CameraUrlScheme);
        }
        check_len("username", &self.username, 3, 100)?;
        check_len("password", &self.password, 6, 60)?;
        if self.password.len() > 72 {
            return Err(RequestValidationError::PasswordTooLong);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterMasjidResponse {
    #[serde(default)]
    pub ok: bool,
    pub masjid_id: i64,
    pub admin_username: String,
    #[serde(default)]
    pub camera_id: Option<i64>,
    #[serde(default)]
    pub camera_source_type: Option<String>,
    #[serde(default)]
    pub camera_source_path: Option<String>,
}
