use crate::graph_utils::graph::Point;

// Zoom can never reach zero; conversions divide by it.
pub const ZOOM_FLOOR: f64 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomBounds {
    min: f64,
    max: f64,
    step: f64,
}

impl Default for ZoomBounds {
    fn default() -> Self { Self { min: 0.3, max: 2.5, step: 0.1 } }
}

impl ZoomBounds {
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        let min = if min.is_finite() { min.max(ZOOM_FLOOR) } else { ZOOM_FLOOR };
        let max = if max.is_finite() { max.max(min) } else { min };
        let step = if step.is_finite() && step > 0.0 { step } else { 0.1 };
        Self { min, max, step }
    }

    pub fn min(&self) -> f64 { self.min }
    pub fn max(&self) -> f64 { self.max }
    pub fn step(&self) -> f64 { self.step }
    pub fn clamp(&self, zoom: f64) -> f64 {
        if zoom.is_finite() { zoom.clamp(self.min, self.max) } else { 1.0_f64.clamp(self.min, self.max) }
    }
}

/// Zoom and scroll over the square canvas.
///
/// The visible surface is a `view_size` window placed at `view_origin` on
/// screen; `scroll` is how far the scaled canvas is shifted under it, in
/// screen pixels. A zoom change asks for the window to be recentred on the
/// canvas midpoint on the following frame.
#[derive(Clone, Debug)]
pub struct Viewport {
    zoom: f64,
    bounds: ZoomBounds,
    canvas_size: f64,
    scroll: Point,
    view_origin: Point,
    view_size: Option<Point>,
    pending_recenter: bool,
}

impl Viewport {
    pub fn new(canvas_size: f64, bounds: ZoomBounds) -> Self {
        Self {
            zoom: bounds.clamp(1.0),
            bounds,
            canvas_size,
            scroll: Point::default(),
            view_origin: Point::default(),
            view_size: None,
            pending_recenter: true,
        }
    }

    pub fn zoom(&self) -> f64 { self.zoom }
    pub fn scroll(&self) -> Point { self.scroll }
    pub fn bounds(&self) -> ZoomBounds { self.bounds }
    pub fn view_size(&self) -> Option<Point> { self.view_size }
    pub fn recenter_pending(&self) -> bool { self.pending_recenter }

    pub fn zoom_in(&mut self) { self.set_zoom(self.zoom + self.bounds.step()); }
    pub fn zoom_out(&mut self) { self.set_zoom(self.zoom - self.bounds.step()); }

    pub fn set_zoom(&mut self, zoom: f64) {
        let z = self.bounds.clamp(zoom);
        if (z - self.zoom).abs() > f64::EPSILON {
            self.zoom = z;
            self.schedule_recenter();
        }
    }

    /// Record where the surface sits this frame. A size change asks for a recenter.
    pub fn set_surface(&mut self, origin: Point, size: Point) {
        self.view_origin = origin;
        if self.view_size != Some(size) {
            self.view_size = Some(size);
            self.schedule_recenter();
        }
    }

    pub fn schedule_recenter(&mut self) { self.pending_recenter = true; }
    pub fn cancel_recenter(&mut self) { self.pending_recenter = false; }

    /// Run the deferred recenter, if one is due. Returns whether it ran.
    pub fn on_frame(&mut self) -> bool {
        if !self.pending_recenter { return false; }
        let Some(size) = self.view_size else { return false };
        self.pending_recenter = false;
        let center = self.canvas_size / 2.0;
        let extent = self.canvas_size * self.zoom;
        self.scroll = Point::new(
            (center * self.zoom - size.x / 2.0).clamp(0.0, extent),
            (center * self.zoom - size.y / 2.0).clamp(0.0, extent),
        );
        true
    }

    /// Move the visible window opposite to the pointer delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let size = self.view_size.unwrap_or_default();
        let extent = self.canvas_size * self.zoom;
        let max_x = (extent - size.x).max(0.0);
        let max_y = (extent - size.y).max(0.0);
        self.scroll = Point::new(
            (self.scroll.x - dx).clamp(0.0, max_x),
            (self.scroll.y - dy).clamp(0.0, max_y),
        );
    }

    pub fn surface_origin(&self) -> Point {
        Point::new(self.view_origin.x - self.scroll.x, self.view_origin.y - self.scroll.y)
    }

    pub fn screen_to_model(&self, p: Point) -> Point {
        let o = self.surface_origin();
        Point::new((p.x - o.x) / self.zoom, (p.y - o.y) / self.zoom)
    }

    pub fn model_to_screen(&self, p: Point) -> Point {
        let o = self.surface_origin();
        Point::new(p.x * self.zoom + o.x, p.y * self.zoom + o.y)
    }

    /// Model-space midpoint of what is currently on screen.
    pub fn visible_center(&self) -> Option<Point> {
        let size = self.view_size?;
        Some(Point::new(
            (self.scroll.x + size.x / 2.0) / self.zoom,
            (self.scroll.y + size.y / 2.0) / self.zoom,
        ))
    }
}
