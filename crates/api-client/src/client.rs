use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use infaq_api::*;
use infaq_core::SourceDescriptor;

use crate::auth::AuthSession;
use crate::error::ApiError;

/// Header carrying the shared edge secret.
pub const EDGE_KEY_HEADER: &str = "X-Edge-Key";

/// Which deployment a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Account/auth service (`/auth/*`).
    Auth,
    /// Edge camera service (`/roi`, `/camera/*`).
    Edge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bearer {
    /// Attach the token when one is held.
    Optional,
    /// Fail with [`ApiError::NotAuthenticated`] when no token is held.
    Required,
    Never,
}

/// Typed HTTP client for the edge camera service and the account service.
///
/// With a single deployment both bases are the same URL. Every call routes to
/// the right base, attaches the bearer token from the shared [`AuthSession`]
/// and, for edge calls, the shared-secret header.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    auth_base: String,
    edge_base: String,
    edge_key: Option<String>,
    session: AuthSession,
}

impl ApiClient {
    /// Create a client for a single deployment with the given timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            client,
            auth_base: base.clone(),
            edge_base: base,
            edge_key: None,
            session: AuthSession::default(),
        }
    }

    /// Route camera/ROI calls to a separate edge deployment.
    pub fn with_edge(mut self, edge_base: &str, edge_key: Option<&str>) -> Self {
        self.edge_base = edge_base.trim_end_matches('/').to_string();
        self.edge_key = edge_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from);
        self
    }

    pub fn with_session(mut self, session: AuthSession) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn edge_base(&self) -> &str {
        &self.edge_base
    }

    pub fn auth_base(&self) -> &str {
        &self.auth_base
    }

    pub fn edge_key(&self) -> Option<&str> {
        self.edge_key.as_deref()
    }

    fn url(&self, service: Service, path: &str) -> String {
        let base = match service {
            Service::Auth => &self.auth_base,
            Service::Edge => &self.edge_base,
        };
        format!("{base}{path}")
    }

    /// Build a request and report which token (if any) was attached.
    fn request(
        &self,
        method: Method,
        service: Service,
        path: &str,
        bearer: Bearer,
    ) -> Result<(RequestBuilder, Option<String>), ApiError> {
        let mut req = self.client.request(method, self.url(service, path));
        if service == Service::Edge {
            if let Some(key) = &self.edge_key {
                req = req.header(EDGE_KEY_HEADER, key);
            }
        }
        let token = match bearer {
            Bearer::Never => None,
            Bearer::Optional => self.session.token(),
            Bearer::Required => Some(self.session.token().ok_or(ApiError::NotAuthenticated)?),
        };
        if let Some(token) = &token {
            req = req.bearer_auth(token);
        }
        Ok((req, token))
    }

    /// Send and turn non-2xx answers into typed errors. A 401 for a request
    /// that carried a token invalidates that token process-wide.
    async fn send(
        &self,
        req: RequestBuilder,
        token: Option<String>,
    ) -> Result<reqwest::Response, ApiError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let detail = error_detail(&body);
        if status == StatusCode::UNAUTHORIZED {
            if let Some(token) = token {
                if self.session.invalidate(&token) {
                    debug!("bearer token rejected, session cleared");
                }
            }
            return Err(ApiError::Unauthorized { detail });
        }
        Err(ApiError::Status { status, detail })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        token: Option<String>,
    ) -> Result<T, ApiError> {
        let resp = self.send(req, token).await?;
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    // ── ROI ───────────────────────────────────────────────────────────────

    pub async fn get_roi(&self) -> Result<RoiResponse, ApiError> {
        let (req, token) = self.request(Method::GET, Service::Edge, routes::ROI, Bearer::Optional)?;
        self.send_json(req, token).await
    }

    /// Replace the stored ROI. Coordinates are rounded to 6 decimals.
    pub async fn save_roi(&self, rect: &NormalizedRect) -> Result<RoiResponse, ApiError> {
        let (req, token) =
            self.request(Method::POST, Service::Edge, routes::ROI, Bearer::Optional)?;
        self.send_json(req.json(&rect.rounded()), token).await
    }

    /// Clear the stored ROI. Any 2xx is success whatever the body says.
    pub async fn clear_roi(&self) -> Result<(), ApiError> {
        let (req, token) =
            self.request(Method::DELETE, Service::Edge, routes::ROI, Bearer::Optional)?;
        self.send(req, token).await?;
        Ok(())
    }

    // ── Camera ────────────────────────────────────────────────────────────

    pub async fn camera_status(&self) -> Result<CameraStatusResponse, ApiError> {
        let (req, token) = self.request(
            Method::GET,
            Service::Edge,
            routes::CAMERA_STATUS,
            Bearer::Optional,
        )?;
        self.send_json(req, token).await
    }

    pub async fn camera_start(
        &self,
        source: &SourceDescriptor,
        require_auth: bool,
    ) -> Result<CameraStartResponse, ApiError> {
        let bearer = if require_auth {
            Bearer::Required
        } else {
            Bearer::Optional
        };
        let (req, token) =
            self.request(Method::POST, Service::Edge, routes::CAMERA_START, bearer)?;
        self.send_json(req.query(&source.query_pairs()), token)
            .await
    }

    pub async fn camera_start_default(&self) -> Result<CameraStartResponse, ApiError> {
        let (req, token) = self.request(
            Method::POST,
            Service::Edge,
            routes::CAMERA_START_DEFAULT,
            Bearer::Required,
        )?;
        self.send_json(req, token).await
    }

    pub async fn camera_stop(&self) -> Result<(), ApiError> {
        let (req, token) = self.request(
            Method::POST,
            Service::Edge,
            routes::CAMERA_STOP,
            Bearer::Optional,
        )?;
        self.send(req, token).await?;
        Ok(())
    }

    /// Fetch one JPEG frame from an already-built snapshot URL.
    /// `Ok(None)` means the camera has not produced a frame yet (204).
    pub async fn fetch_snapshot(&self, url: &str) -> Result<Option<Vec<u8>>, ApiError> {
        let resp = self.send(self.client.get(url), None).await?;
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(Some(resp.bytes().await?.to_vec()))
    }

    /// Open the primary MJPEG stream and check that it answers with a
    /// multipart body. The connection is dropped right after the headers.
    pub async fn probe_stream(&self, url: &str) -> Result<(), ApiError> {
        let resp = self.send(self.client.get(url), None).await?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !content_type.starts_with("multipart/") {
            return Err(ApiError::Decode(format!(
                "expected a multipart stream, got {content_type:?}"
            )));
        }
        Ok(())
    }

    // ── Auth ──────────────────────────────────────────────────────────────

    /// Exchange credentials for a bearer token and hold it in the session.
    pub async fn login(&self, req: &LoginRequest) -> Result<TokenResponse, ApiError> {
        req.validate()?;
        let (http, _) =
            self.request(Method::POST, Service::Auth, routes::AUTH_LOGIN, Bearer::Never)?;
        let token: TokenResponse = self.send_json(http.form(req), None).await?;
        self.session.set(token.access_token.clone());
        Ok(token)
    }

    pub async fn register_masjid(
        &self,
        req: &RegisterMasjidRequest,
    ) -> Result<RegisterMasjidResponse, ApiError> {
        req.validate()?;
        let (http, _) = self.request(
            Method::POST,
            Service::Auth,
            routes::AUTH_REGISTER_MASJID,
            Bearer::Never,
        )?;
        self.send_json(http.json(req), None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::with_client(reqwest::Client::new(), "http://akun.local/")
            .with_edge("http://edge.local:8000/", Some(" k "))
    }

    #[test]
    fn requests_route_to_their_service() {
        let api = client();
        assert_eq!(api.url(Service::Auth, "/auth/login"), "http://akun.local/auth/login");
        assert_eq!(api.url(Service::Edge, "/roi"), "http://edge.local:8000/roi");
        assert_eq!(api.edge_key(), Some("k"));
    }

    #[test]
    fn single_base_serves_both_services() {
        let api = ApiClient::with_client(reqwest::Client::new(), "http://box.local");
        assert_eq!(api.url(Service::Auth, "/x"), api.url(Service::Edge, "/x"));
        assert_eq!(api.edge_key(), None);
    }

    #[test]
    fn edge_requests_carry_key_and_optional_token() {
        let api = client();
        api.session().set("tok".into());
        let (req, token) = api
            .request(Method::GET, Service::Edge, routes::ROI, Bearer::Optional)
            .unwrap();
        let built = req.build().unwrap();
        assert_eq!(token.as_deref(), Some("tok"));
        assert_eq!(built.headers()[EDGE_KEY_HEADER], "k");
        assert_eq!(built.headers()[reqwest::header::AUTHORIZATION], "Bearer tok");
    }

    #[test]
    fn auth_requests_never_carry_edge_key() {
        let api = client();
        let (req, token) = api
            .request(Method::POST, Service::Auth, routes::AUTH_LOGIN, Bearer::Never)
            .unwrap();
        let built = req.build().unwrap();
        assert!(token.is_none());
        assert!(built.headers().get(EDGE_KEY_HEADER).is_none());
        assert!(built.headers().get(reqwest::header::AUTHORIZATION).is_none());
    }

    #[test]
    fn required_bearer_fails_without_token() {
        let api = client();
        let err = api
            .request(
                Method::POST,
                Service::Edge,
                routes::CAMERA_START_DEFAULT,
                Bearer::Required,
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::NotAuthenticated));
    }

    #[tokio::test]
    async fn invalid_payloads_fail_before_any_request() {
        // Nothing listens on this port; a validation error proves no call was made.
        let api = ApiClient::with_client(reqwest::Client::new(), "http://127.0.0.1:9");
        let err = api
            .login(&LoginRequest {
                username: String::new(),
                password: "x".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
