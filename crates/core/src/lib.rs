//! Domain logic for the donation-box monitor: ROI geometry, camera session
//! mirrors, alert history, stream URL lifecycle, and status reconciliation.
//!
//! Nothing in this crate performs I/O. Clocks are passed in by callers.

pub mod geometry;
pub mod reconcile;
pub mod session;
pub mod stream;

pub use geometry::{
    DragState, GeometryEngine, GeometryError, MIN_ROI_EXTENT, NormalizedRect, Point, RoiEditor,
    Viewport,
};
pub use reconcile::{PolledStatus, ReconcileOutcome, ReconcilePhase, Reconciler};
pub use session::{
    AlertEvent, AlertHistory, AlertStatus, CameraSession, HISTORY_CAPACITY, SourceDescriptor,
    SourceError, SourceMode,
};
pub use stream::{StreamEndpoints, StreamHandle, StreamLifecycle, StreamMode};
