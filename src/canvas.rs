use image::RgbaImage;

/// Default cap on the working raster's width (larger images are downscaled on load).
pub const MAX_CANVAS_WIDTH: u32 = 800;
/// Default cap on the working raster's height.
pub const MAX_CANVAS_HEIGHT: u32 = 600;

// ============================================================================
// POINTS & DISPLAY BOX
// ============================================================================

/// A position in raster-pixel space (or display space, depending on context).
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The on-screen bounding box of the displayed (possibly scaled) canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

// ============================================================================
// COORDINATE MAPPING
// ============================================================================

/// Map a pointer position in display space to raster space.
///
/// `raster = (client - box.origin) * (native / box.size)`. When no canvas is
/// mounted (no box, or a zero-sized one) this returns the origin instead of
/// failing; that only happens during transient unmount windows.
pub fn screen_to_canvas(screen: Point, display: Option<DisplayRect>, native_w: u32, native_h: u32) -> Point {
    let Some(rect) = display else { return Point::ORIGIN };
    if rect.is_degenerate() {
        return Point::ORIGIN;
    }
    let scale_x = native_w as f32 / rect.width;
    let scale_y = native_h as f32 / rect.height;
    Point {
        x: (screen.x - rect.left) * scale_x,
        y: (screen.y - rect.top) * scale_y,
    }
}

/// Inverse of [`screen_to_canvas`]: raster space back to display space.
pub fn canvas_to_screen(canvas: Point, display: Option<DisplayRect>, native_w: u32, native_h: u32) -> Point {
    let Some(rect) = display else { return Point::ORIGIN };
    if native_w == 0 || native_h == 0 {
        return Point::new(rect.left, rect.top);
    }
    let scale_x = rect.width / native_w as f32;
    let scale_y = rect.height / native_h as f32;
    Point {
        x: rect.left + canvas.x * scale_x,
        y: rect.top + canvas.y * scale_y,
    }
}

/// Proportionally shrink `(w, h)` so it fits within `max_w × max_h`.
/// Width is constrained first, then height, and fractional results are
/// truncated the same way a canvas element truncates its pixel size.
pub fn fit_within(w: u32, h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let mut width = w as f64;
    let mut height = h as f64;
    if width > max_w as f64 {
        height = height * max_w as f64 / width;
        width = max_w as f64;
    }
    if height > max_h as f64 {
        width = width * max_h as f64 / height;
        height = max_h as f64;
    }
    ((width as u32).max(1), (height as u32).max(1))
}

// ============================================================================
// HIT TESTING
// ============================================================================

/// Ray-casting point-in-polygon test. The polygon is closed implicitly
/// (last vertex joins the first).
///
/// An edge counts as a crossing when `(yi > y) != (yj > y)` and the edge's
/// x-intercept at `y` lies strictly to the right of `x`. Boundary pixels are
/// classified by exactly this rule, which keeps fills reproducible.
pub fn point_in_polygon(x: f32, y: f32, polygon: &[Point]) -> bool {
    let n = polygon.len();
    if n == 0 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (polygon[i].x, polygon[i].y);
        let (xj, yj) = (polygon[j].x, polygon[j].y);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Squared distance from `(px, py)` to the segment from `a` to `b`.
fn segment_distance_sq(px: f32, py: f32, a: Point, b: Point) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((px - a.x) * dx + (py - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = a.x + t * dx - px;
    let cy = a.y + t * dy - py;
    cx * cx + cy * cy
}

// ============================================================================
// SELECTION SHAPES
// ============================================================================

/// A finished selection awaiting fill.
#[derive(Clone, Debug, PartialEq)]
pub enum SelectionShape {
    /// Freehand closed polygon.
    Lasso(Vec<Point>),
    /// Round-capped brush polyline; pixels within `radius` of it are selected.
    Stroke { points: Vec<Point>, radius: f32 },
    /// Eraser polyline; pixels within `radius` of it are removed from every
    /// other shape in the same fill.
    Erase { points: Vec<Point>, radius: f32 },
}

impl SelectionShape {
    pub fn points(&self) -> &[Point] {
        match self {
            SelectionShape::Lasso(points) => points,
            SelectionShape::Stroke { points, .. } | SelectionShape::Erase { points, .. } => points,
        }
    }

    pub fn is_erase(&self) -> bool {
        matches!(self, SelectionShape::Erase { .. })
    }

    /// Whether this shape can enclose any pixel at all.
    pub fn is_fillable(&self) -> bool {
        match self {
            SelectionShape::Lasso(points) => points.len() > 2,
            SelectionShape::Stroke { points, radius } | SelectionShape::Erase { points, radius } => {
                !points.is_empty() && *radius > 0.0
            }
        }
    }

    /// Inside test at integer pixel coordinates.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        let (px, py) = (x as f32, y as f32);
        match self {
            SelectionShape::Lasso(points) => points.len() > 2 && point_in_polygon(px, py, points),
            SelectionShape::Stroke { points, radius } | SelectionShape::Erase { points, radius } => {
                let r_sq = radius * radius;
                match points.as_slice() {
                    [] => false,
                    [only] => segment_distance_sq(px, py, *only, *only) <= r_sq,
                    _ => points
                        .windows(2)
                        .any(|w| segment_distance_sq(px, py, w[0], w[1]) <= r_sq),
                }
            }
        }
    }

    /// Inclusive pixel bounding box clamped to the canvas, or `None` when the
    /// shape lies entirely off-canvas. Pixels outside it can never be inside.
    pub fn bounds(&self, canvas_w: u32, canvas_h: u32) -> Option<(u32, u32, u32, u32)> {
        let points = self.points();
        if points.is_empty() || canvas_w == 0 || canvas_h == 0 {
            return None;
        }
        let pad = match self {
            SelectionShape::Lasso(_) => 0.0,
            SelectionShape::Stroke { radius, .. } | SelectionShape::Erase { radius, .. } => *radius,
        };
        let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
        let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let (min_x, min_y) = ((min_x - pad).floor(), (min_y - pad).floor());
        let (max_x, max_y) = ((max_x + pad).ceil(), (max_y + pad).ceil());
        if max_x < 0.0 || max_y < 0.0 || min_x >= canvas_w as f32 || min_y >= canvas_h as f32 {
            return None;
        }
        Some((
            min_x.max(0.0) as u32,
            min_y.max(0.0) as u32,
            (max_x as u32).min(canvas_w - 1),
            (max_y as u32).min(canvas_h - 1),
        ))
    }

    /// Arithmetic mean of the vertex coordinates.
    pub fn centroid(&self) -> Point {
        let points = self.points();
        if points.is_empty() {
            return Point::ORIGIN;
        }
        let (sx, sy) = points
            .iter()
            .fold((0.0_f32, 0.0_f32), |(sx, sy), p| (sx + p.x, sy + p.y));
        let n = points.len() as f32;
        Point::new(sx / n, sy / n)
    }
}

// ============================================================================
// CANVAS STATE
// ============================================================================

/// The working raster plus where (if anywhere) it is currently displayed.
#[derive(Clone)]
pub struct CanvasState {
    pub width: u32,
    pub height: u32,
    /// Current visible image state.
    pub raster: RgbaImage,
    /// On-screen box of the mounted canvas; `None` when nothing is displayed.
    pub display: Option<DisplayRect>,
}

impl CanvasState {
    pub fn new(raster: RgbaImage) -> Self {
        let (width, height) = raster.dimensions();
        Self {
            width,
            height,
            raster,
            display: None,
        }
    }

    /// Replace the visible raster (e.g. after a fill preview or navigation).
    pub fn set_raster(&mut self, raster: RgbaImage) {
        let (w, h) = raster.dimensions();
        self.width = w;
        self.height = h;
        self.raster = raster;
    }

    pub fn screen_to_canvas(&self, screen: Point) -> Point {
        screen_to_canvas(screen, self.display, self.width, self.height)
    }

    pub fn canvas_to_screen(&self, canvas: Point) -> Point {
        canvas_to_screen(canvas, self.display, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    #[test]
    fn mapping_scales_by_native_over_displayed() {
        let rect = DisplayRect::new(10.0, 20.0, 400.0, 300.0);
        let p = screen_to_canvas(Point::new(210.0, 170.0), Some(rect), 800, 600);
        assert_eq!(p, Point::new(400.0, 300.0));
    }

    #[test]
    fn mapping_without_canvas_returns_origin() {
        assert_eq!(screen_to_canvas(Point::new(5.0, 5.0), None, 100, 100), Point::ORIGIN);
        let zero = DisplayRect::new(0.0, 0.0, 0.0, 10.0);
        assert_eq!(screen_to_canvas(Point::new(5.0, 5.0), Some(zero), 100, 100), Point::ORIGIN);
    }

    #[test]
    fn mapping_round_trips_for_various_scales() {
        for (w, h) in [(800.0, 600.0), (123.4, 987.6), (1.5, 2.5), (1600.0, 1200.0)] {
            let rect = Some(DisplayRect::new(-7.0, 33.0, w, h));
            for screen in [Point::new(0.0, 0.0), Point::new(50.5, 12.25), Point::new(-3.0, 700.0)] {
                let raster = screen_to_canvas(screen, rect, 640, 480);
                let back = canvas_to_screen(raster, rect, 640, 480);
                assert!((back.x - screen.x).abs() < 1e-3, "x drifted: {back:?} vs {screen:?}");
                assert!((back.y - screen.y).abs() < 1e-3, "y drifted: {back:?} vs {screen:?}");
            }
        }
    }

    #[test]
    fn fit_within_caps_width_then_height() {
        assert_eq!(fit_within(1600, 1200, 800, 600), (800, 600));
        assert_eq!(fit_within(1000, 1000, 800, 600), (600, 600));
        assert_eq!(fit_within(400, 300, 800, 600), (400, 300));
        assert_eq!(fit_within(1200, 400, 800, 600), (800, 266));
    }

    #[test]
    fn ray_cast_square_interior_and_edges() {
        let poly = square(10.0, 10.0, 20.0, 20.0);
        assert!(point_in_polygon(15.0, 15.0, &poly));
        assert!(!point_in_polygon(25.0, 15.0, &poly));
        // Top and left edges are inside, bottom and right are outside.
        assert!(point_in_polygon(10.0, 10.0, &poly));
        assert!(!point_in_polygon(20.0, 15.0, &poly));
        assert!(!point_in_polygon(15.0, 20.0, &poly));
    }

    #[test]
    fn ray_cast_is_deterministic_on_vertices() {
        let poly = vec![Point::new(10.0, 10.0), Point::new(90.0, 10.0), Point::new(50.0, 90.0)];
        for v in &poly {
            let first = point_in_polygon(v.x, v.y, &poly);
            for _ in 0..10 {
                assert_eq!(point_in_polygon(v.x, v.y, &poly), first);
            }
        }
    }

    #[test]
    fn degenerate_lasso_contains_nothing() {
        let shape = SelectionShape::Lasso(vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)]);
        assert!(!shape.is_fillable());
        assert!(!shape.contains(5, 5));
    }

    #[test]
    fn stroke_selects_capsule() {
        let shape = SelectionShape::Stroke {
            points: vec![Point::new(10.0, 10.0), Point::new(30.0, 10.0)],
            radius: 3.0,
        };
        assert!(shape.contains(20, 12));
        assert!(shape.contains(8, 10));
        assert!(!shape.contains(20, 14));
        assert!(!shape.contains(35, 10));

        let dot = SelectionShape::Stroke { points: vec![Point::new(5.0, 5.0)], radius: 2.0 };
        assert!(dot.contains(5, 7));
        assert!(!dot.contains(8, 5));
    }

    #[test]
    fn erase_uses_the_stroke_footprint() {
        let erase = SelectionShape::Erase { points: vec![Point::new(10.0, 10.0)], radius: 2.0 };
        assert!(erase.is_erase());
        assert!(erase.is_fillable());
        assert!(erase.contains(10, 12));
        assert!(!erase.contains(13, 10));
        assert_eq!(erase.bounds(100, 100), Some((8, 8, 12, 12)));
    }

    #[test]
    fn bounds_clamp_to_canvas() {
        let shape = SelectionShape::Lasso(square(-10.0, 5.0, 50.0, 500.0));
        assert_eq!(shape.bounds(40, 100), Some((0, 5, 39, 99)));
        let off = SelectionShape::Lasso(square(200.0, 200.0, 300.0, 300.0));
        assert_eq!(off.bounds(100, 100), None);
    }

    #[test]
    fn centroid_is_vertex_mean() {
        let tri = SelectionShape::Lasso(vec![Point::new(10.0, 10.0), Point::new(90.0, 10.0), Point::new(50.0, 90.0)]);
        let c = tri.centroid();
        assert!((c.x - 50.0).abs() < 1e-4);
        assert!((c.y - 36.666_668).abs() < 1e-3);
    }
}
