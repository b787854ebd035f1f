//! Async runtime layer of the donation-box monitor: ROI persistence, the
//! camera status reconciliation task, operator start/stop commands, live
//! stream probing with snapshot fallback, and the persisted bearer token.

pub mod cancel;
pub mod controller;
pub mod error;
pub mod reconciler;
pub mod roi_store;
pub mod stream_watch;
pub mod token_store;

pub use cancel::{CancelSource, CancelToken};
pub use controller::{LOGOUT_STOP_TIMEOUT, SessionController};
pub use error::MonitorError;
pub use reconciler::{
    LinkState, MonitorHandle, MonitorOptions, MonitorSnapshot, ServerDiagnostics, spawn_monitor,
};
pub use roi_store::RoiStore;
pub use stream_watch::{Frame, PRIMARY_REPROBE_INTERVAL, run_stream_watch};
pub use token_store::TokenStore;
