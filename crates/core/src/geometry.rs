//! Pointer-gesture to ROI geometry.
//!
//! Raw pointer positions arrive in device pixels relative to the page. They are
//! mapped into the unit square of the rendered video frame, clamped (the pointer
//! may leave the frame mid-drag), and folded into a [`NormalizedRect`] with a
//! direction-independent min/abs formulation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum normalized width/height for a committed ROI.
pub const MIN_ROI_EXTENT: f64 = 0.002;

/// Decimal places kept when a rectangle goes over the wire.
pub const WIRE_DECIMALS: i32 = 6;

const EDGE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum GeometryError {
    #[error("viewport must have a positive, finite size (got {width}x{height})")]
    InvalidViewport { width: f64, height: f64 },
    #[error("{field} must be within [0, 1] (got {value})")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("rectangle leaves the frame: {axis} + extent = {sum}")]
    OutsideFrame { axis: &'static str, sum: f64 },
}

/// A 2D point. Device pixels before normalization, unit coordinates after.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rendered bounding box of the video frame in device pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl Viewport {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Result<Self, GeometryError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(width) || !valid(height) || !left.is_finite() || !top.is_finite() {
            return Err(GeometryError::InvalidViewport { width, height });
        }
        Ok(Self {
            left,
            top,
            width,
            height,
        })
    }

    /// Viewport anchored at the origin.
    pub fn sized(width: f64, height: f64) -> Result<Self, GeometryError> {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Map a device point into the unit square, clamping anything outside.
    pub fn normalize(&self, device: Point) -> Point {
        Point {
            x: clamp_unit((device.x - self.left) / self.width),
            y: clamp_unit((device.y - self.top) / self.height),
        }
    }
}

/// Clamp to `[0, 1]`. NaN collapses to 0.
pub fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Rectangle relative to the rendered frame. Every field lies in `[0, 1]` and
/// the rectangle never leaves the frame. Replaced as a whole, never patched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRect", into = "RawRect")]
pub struct NormalizedRect {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawRect {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl TryFrom<RawRect> for NormalizedRect {
    type Error = GeometryError;

    fn try_from(raw: RawRect) -> Result<Self, Self::Error> {
        NormalizedRect::new(raw.x, raw.y, raw.w, raw.h)
    }
}

impl From<NormalizedRect> for RawRect {
    fn from(rect: NormalizedRect) -> Self {
        RawRect {
            x: rect.x,
            y: rect.y,
            w: rect.w,
            h: rect.h,
        }
    }
}

impl NormalizedRect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Result<Self, GeometryError> {
        for (field, value) in [("x", x), ("y", y), ("w", w), ("h", h)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GeometryError::OutOfRange { field, value });
            }
        }
        if x + w > 1.0 + EDGE_TOLERANCE {
            return Err(GeometryError::OutsideFrame {
                axis: "x",
                sum: x + w,
            });
        }
        if y + h > 1.0 + EDGE_TOLERANCE {
            return Err(GeometryError::OutsideFrame {
                axis: "y",
                sum: y + h,
            });
        }
        Ok(Self {
            x,
            y,
            w: w.min(1.0 - x),
            h: h.min(1.0 - y),
        })
    }

    /// Rectangle spanned by two unit-square corners, in either order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let (ax, ay) = (clamp_unit(a.x), clamp_unit(a.y));
        let (bx, by) = (clamp_unit(b.x), clamp_unit(b.y));
        let x = ax.min(bx);
        let y = ay.min(by);
        Self {
            x,
            y,
            w: (bx - ax).abs().min(1.0 - x),
            h: (by - ay).abs().min(1.0 - y),
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn w(&self) -> f64 {
        self.w
    }

    pub fn h(&self) -> f64 {
        self.h
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    /// Whether this rectangle is large enough to be committed as an ROI.
    pub fn meets_min_extent(&self) -> bool {
        self.w > MIN_ROI_EXTENT && self.h > MIN_ROI_EXTENT
    }

    /// Round every field to [`WIRE_DECIMALS`] places. Extents are pulled back
    /// in when rounding would push the far edge past 1.
    pub fn rounded(&self) -> Self {
        let x = round_to(self.x, WIRE_DECIMALS);
        let y = round_to(self.y, WIRE_DECIMALS);
        let w = fit_extent(x, round_to(self.w, WIRE_DECIMALS));
        let h = fit_extent(y, round_to(self.h, WIRE_DECIMALS));
        Self { x, y, w, h }
    }

    /// Pixel bounds `(x1, y1, x2, y2)` inside a frame of the given size, or
    /// `None` when the box collapses below 4 pixels on either axis.
    pub fn pixel_bounds(&self, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
        if frame_width == 0 || frame_height == 0 {
            return None;
        }
        let fw = f64::from(frame_width);
        let fh = f64::from(frame_height);
        let x1 = ((self.x * fw) as u32).min(frame_width - 1);
        let y1 = ((self.y * fh) as u32).min(frame_height - 1);
        let x2 = ((self.right() * fw) as u32).clamp(1, frame_width);
        let y2 = ((self.bottom() * fh) as u32).clamp(1, frame_height);
        if x2.saturating_sub(x1) < 4 || y2.saturating_sub(y1) < 4 {
            return None;
        }
        Some((x1, y1, x2, y2))
    }
}

impl std::fmt::Display for NormalizedRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "x={:.6} y={:.6} w={:.6} h={:.6}",
            self.x, self.y, self.w, self.h
        )
    }
}

fn round_to(v: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (v * scale).round() / scale
}

/// Shrink a rounded extent one wire step at a time until `origin + extent <= 1`.
fn fit_extent(origin: f64, extent: f64) -> f64 {
    let step = 10f64.powi(-WIRE_DECIMALS);
    let mut extent = extent;
    while origin + extent > 1.0 && extent > 0.0 {
        extent = round_to((extent - step).max(0.0), WIRE_DECIMALS);
    }
    extent
}

/// In-progress drag. Lives only between pointer-down and pointer-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    anchor: Point,
    candidate: NormalizedRect,
}

impl DragState {
    pub fn anchor(&self) -> Point {
        self.anchor
    }

    pub fn candidate(&self) -> NormalizedRect {
        self.candidate
    }
}

/// Converts pointer gestures over a viewport into normalized rectangles.
#[derive(Debug, Clone, Copy)]
pub struct GeometryEngine {
    viewport: Viewport,
}

impl GeometryEngine {
    pub fn new(viewport: Viewport) -> Self {
        Self { viewport }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Start a drag: a zero-size rectangle at the clamped pointer position.
    pub fn begin(&self, device: Point) -> DragState {
        let anchor = self.viewport.normalize(device);
        DragState {
            anchor,
            candidate: NormalizedRect::from_corners(anchor, anchor),
        }
    }

    pub fn update(&self, state: &DragState, device: Point) -> DragState {
        let p = self.viewport.normalize(device);
        DragState {
            anchor: state.anchor,
            candidate: NormalizedRect::from_corners(state.anchor, p),
        }
    }

    /// End the drag. Sub-threshold rectangles are treated as a no-op.
    pub fn commit(state: DragState) -> Option<NormalizedRect> {
        state
            .candidate
            .meets_min_extent()
            .then_some(state.candidate)
    }
}

/// Pointer-event front end over [`GeometryEngine`], holding at most one drag.
#[derive(Debug, Clone)]
pub struct RoiEditor {
    engine: GeometryEngine,
    drag: Option<DragState>,
}

impl RoiEditor {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            engine: GeometryEngine::new(viewport),
            drag: None,
        }
    }

    /// The frame was re-laid out. An in-progress drag keeps its anchor.
    pub fn resize(&mut self, viewport: Viewport) {
        self.engine = GeometryEngine::new(viewport);
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Rectangle currently being drawn, for overlay rendering.
    pub fn preview(&self) -> Option<NormalizedRect> {
        self.drag.map(|d| d.candidate)
    }

    pub fn pointer_down(&mut self, device: Point) {
        self.drag = Some(self.engine.begin(device));
    }

    pub fn pointer_move(&mut self, device: Point) {
        if let Some(state) = self.drag.as_ref() {
            self.drag = Some(self.engine.update(state, device));
        }
    }

    pub fn pointer_up(&mut self, device: Point) -> Option<NormalizedRect> {
        self.pointer_move(device);
        self.drag.take().and_then(GeometryEngine::commit)
    }

    pub fn cancel(&mut self) {
        self.drag = None;
    }
}
