// Map viewport: uniform zoom plus pixel offset, applied to world coordinates
// at draw time. Drag state lives here so ending a drag is always safe.

pub const MIN_SCALE: f64 = 0.5;
pub const MAX_SCALE: f64 = 3.0;

const ZOOM_IN_STEP: f64 = 1.1;
const ZOOM_OUT_STEP: f64 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    scale: f64,
    offset_x: f64,
    offset_y: f64,
    drag_start: Option<(f64, f64)>,
}

impl Default for Viewport {
    fn default() -> Viewport {
        Viewport {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            drag_start: None,
        }
    }
}

impl Viewport {
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn zoom_percent(&self) -> u16 {
        (self.scale * 100.0).round() as u16
    }

    pub fn zoom_in(&mut self) {
        self.rescale(ZOOM_IN_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.rescale(ZOOM_OUT_STEP);
    }

    fn rescale(&mut self, factor: f64) {
        self.scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
    }

    /// Nudge the offset directly, for keyboard panning.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    /// Start dragging from a pointer position, keeping the current offset.
    pub fn begin_drag(&mut self, x: f64, y: f64) {
        self.drag_start = Some((x - self.offset_x, y - self.offset_y));
    }

    /// Follow the pointer; does nothing unless a drag is active.
    pub fn drag_to(&mut self, x: f64, y: f64) {
        if let Some((start_x, start_y)) = self.drag_start {
            self.offset_x = x - start_x;
            self.offset_y = y - start_y;
        }
    }

    pub fn end_drag(&mut self) {
        self.drag_start = None;
    }

    pub fn dragging(&self) -> bool {
        self.drag_start.is_some()
    }

    /// Back to scale 1.0 at the origin, drag cancelled.
    pub fn reset(&mut self) {
        *self = Viewport::default();
    }

    /// World coordinates to view coordinates.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale + self.offset_x, y * self.scale + self.offset_y)
    }
}
