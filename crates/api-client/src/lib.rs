pub mod auth;
pub mod client;
pub mod error;

pub use auth::AuthSession;
pub use client::{ApiClient, EDGE_KEY_HEADER, Service};
pub use error::ApiError;
pub use infaq_api;
pub use reqwest::StatusCode;
