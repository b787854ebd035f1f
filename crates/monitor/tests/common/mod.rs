//! In-process fake of the detector edge service and the account service.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::{Form, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

#[derive(Debug, Default)]
pub struct FakeState {
    /// Required `Authorization: Bearer` value for every edge route.
    pub require_token: Option<String>,
    /// Required `X-Edge-Key` value for every edge route.
    pub edge_key: Option<String>,
    pub roi: Option<Value>,
    pub roi_reject: Option<String>,
    /// Scripted `/camera/status` bodies; the live state answers once drained.
    pub statuses: VecDeque<Value>,
    pub status_delay: Duration,
    pub running: bool,
    pub alert_status: Option<String>,
    pub stop_fails: bool,
    /// Time `/camera/stop` takes before it answers.
    pub stop_delay: Duration,
    pub stream_ok: bool,
    pub snapshot: Option<Vec<u8>>,
    pub start_calls: Vec<HashMap<String, String>>,
    pub start_default_calls: usize,
    pub stop_calls: usize,
    pub status_calls: usize,
    pub roi_calls: usize,
    pub logins: Vec<HashMap<String, String>>,
    pub registrations: Vec<Value>,
    pub seen_edge_keys: Vec<Option<String>>,
    pub seen_tokens: Vec<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct Fake {
    state: Arc<Mutex<FakeState>>,
}

impl Fake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Serve on an ephemeral port and return the base URL.
    pub async fn serve(&self) -> String {
        let app = Router::new()
            .route("/roi", get(get_roi).post(post_roi).delete(delete_roi))
            .route("/camera/status", get(status))
            .route("/camera/start", post(start))
            .route("/camera/start-default", post(start_default))
            .route("/camera/stop", post(stop))
            .route("/camera/stream", get(stream))
            .route("/camera/snapshot", get(snapshot))
            .route("/auth/login", post(login))
            .route("/auth/register-masjid", post(register))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn detail(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "detail": text }))).into_response()
}

/// Record credentials and reject requests the configured guards refuse.
fn guard(fake: &Fake, headers: &HeaderMap) -> Option<Response> {
    let mut state = fake.state();
    let key = headers
        .get("x-edge-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let token = bearer(headers);
    state.seen_edge_keys.push(key.clone());
    state.seen_tokens.push(token.clone());

    if let Some(expected) = &state.edge_key {
        if key.as_ref() != Some(expected) {
            return Some(detail(StatusCode::FORBIDDEN, "Edge key tidak valid"));
        }
    }
    if let Some(expected) = &state.require_token {
        if token.as_ref() != Some(expected) {
            return Some(detail(StatusCode::UNAUTHORIZED, "Token tidak valid"));
        }
    }
    None
}

async fn get_roi(State(fake): State<Fake>, headers: HeaderMap) -> Response {
    if let Some(resp) = guard(&fake, &headers) {
        return resp;
    }
    let mut state = fake.state();
    state.roi_calls += 1;
    Json(json!({ "roi": state.roi.clone() })).into_response()
}

async fn post_roi(State(fake): State<Fake>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Some(resp) = guard(&fake, &headers) {
        return resp;
    }
    let mut state = fake.state();
    state.roi_calls += 1;
    if let Some(reason) = state.roi_reject.clone() {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, &reason);
    }
    state.roi = Some(body.clone());
    Json(json!({ "roi": body })).into_response()
}

async fn delete_roi(State(fake): State<Fake>, headers: HeaderMap) -> Response {
    if let Some(resp) = guard(&fake, &headers) {
        return resp;
    }
    let mut state = fake.state();
    state.roi_calls += 1;
    state.roi = None;
    Json(json!({ "ok": true })).into_response()
}

async fn status(State(fake): State<Fake>, headers: HeaderMap) -> Response {
    let delay = {
        let mut state = fake.state();
        state.status_calls += 1;
        state.status_delay
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if let Some(resp) = guard(&fake, &headers) {
        return resp;
    }
    let mut state = fake.state();
    let body = match state.statuses.pop_front() {
        Some(body) => body,
        None => json!({
            "running": state.running,
            "stream_ready": state.running,
            "alert_status": state.alert_status.clone(),
        }),
    };
    Json(body).into_response()
}

async fn start(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if bearer(&headers).is_none() {
        return detail(StatusCode::UNAUTHORIZED, "Not authenticated");
    }
    if let Some(resp) = guard(&fake, &headers) {
        return resp;
    }
    let mut state = fake.state();
    state.start_calls.push(params.clone());
    if state.running {
        return Json(json!({ "ok": true, "msg": "already running" })).into_response();
    }
    state.running = true;
    Json(json!({ "ok": true, "source": params.get("source") })).into_response()
}

async fn start_default(State(fake): State<Fake>, headers: HeaderMap) -> Response {
    if bearer(&headers).is_none() {
        return detail(StatusCode::UNAUTHORIZED, "Not authenticated");
    }
    if let Some(resp) = guard(&fake, &headers) {
        return resp;
    }
    let mut state = fake.state();
    state.start_default_calls += 1;
    state.running = true;
    Json(json!({ "ok": true, "masjid_id": 1, "source": "ipcam" })).into_response()
}

async fn stop(State(fake): State<Fake>, headers: HeaderMap) -> Response {
    if let Some(resp) = guard(&fake, &headers) {
        return resp;
    }
    let delay = fake.state().stop_delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let mut state = fake.state();
    state.stop_calls += 1;
    if state.stop_fails {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "camera busy");
    }
    state.running = false;
    state.alert_status = None;
    Json(json!({ "ok": true })).into_response()
}

async fn stream(State(fake): State<Fake>) -> Response {
    if !fake.state().stream_ok {
        return detail(StatusCode::SERVICE_UNAVAILABLE, "stream not ready");
    }
    (
        [(header::CONTENT_TYPE, MJPEG_CONTENT_TYPE)],
        "--frame\r\nContent-Type: image/jpeg\r\n\r\n\r\n",
    )
        .into_response()
}

async fn snapshot(State(fake): State<Fake>) -> Response {
    match fake.state().snapshot.clone() {
        Some(bytes) => ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn login(State(fake): State<Fake>, Form(form): Form<HashMap<String, String>>) -> Response {
    let ok = form.get("password").map(String::as_str) == Some("rahasia123");
    fake.state().logins.push(form);
    if !ok {
        return detail(StatusCode::UNAUTHORIZED, "Username atau password salah");
    }
    Json(json!({ "access_token": "good", "token_type": "bearer" })).into_response()
}

async fn register(State(fake): State<Fake>, Json(body): Json<Value>) -> Response {
    fake.state().registrations.push(body.clone());
    Json(json!({
        "ok": true,
        "masjid_id": 7,
        "admin_username": body["username"],
        "camera_id": 11,
        "camera_source_type": "ipcam",
        "camera_source_path": body["camera_url"],
    }))
    .into_response()
}

/// Wait until `check` holds for a published monitor snapshot.
pub async fn wait_for<T>(
    rx: &mut tokio::sync::watch::Receiver<T>,
    check: impl FnMut(&T) -> bool,
) -> T
where
    T: Clone,
{
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(check))
        .await
        .expect("condition reached in time")
        .expect("monitor still publishing")
        .clone()
}
