use crate::canvas::{Point, SelectionShape};

/// Default brush width in raster pixels.
pub const DEFAULT_BRUSH_SIZE: f32 = 20.0;
/// Brush width slider range.
pub const BRUSH_SIZE_RANGE: std::ops::RangeInclusive<f32> = 1.0..=50.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    /// Pointer input is ignored by the canvas.
    Select,
    /// Freehand closed-path selection.
    #[default]
    Lasso,
    /// Round brush painted into the selection.
    Brush,
    /// Round brush that removes pixels from the other selections.
    Eraser,
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Select => "Select",
            Tool::Lasso => "Lasso Tool",
            Tool::Brush => "Brush",
            Tool::Eraser => "Eraser",
        }
    }

    pub fn all() -> &'static [Tool] {
        &[Tool::Select, Tool::Lasso, Tool::Brush, Tool::Eraser]
    }

    /// Whether pointer drags on the canvas capture a selection path.
    pub fn captures_paths(&self) -> bool {
        !matches!(self, Tool::Select)
    }

    /// Tools drawn as round strokes of the brush width.
    pub fn uses_brush(&self) -> bool {
        matches!(self, Tool::Brush | Tool::Eraser)
    }
}

/// How a finished drag ended.
#[derive(Clone, Debug, PartialEq)]
pub enum StrokeEnd {
    /// The path was long enough and became a selection shape.
    Completed(SelectionShape),
    /// Too short to enclose anything; dropped silently.
    Discarded,
    /// There was no drag in progress.
    NotDrawing,
}

/// Pointer-drag accumulator for the lasso and brush tools.
///
/// `Idle` while `points` is empty and `dragging` is false; `Drawing` between
/// pointer-down and pointer-up. Every pointer-move appends exactly one point,
/// so sample density equals event density.
#[derive(Clone, Debug, Default)]
pub struct PathCapture {
    /// Accumulated points in **raster** pixel coordinates.
    pub points: Vec<Point>,
    /// True while dragging to collect points.
    pub dragging: bool,
    /// Tool locked at drag start.
    drag_tool: Tool,
}

impl PathCapture {
    pub fn is_drawing(&self) -> bool {
        self.dragging
    }

    /// Pointer-down: start a fresh path with one point.
    pub fn begin(&mut self, tool: Tool, pos: Point) {
        self.dragging = true;
        self.drag_tool = tool;
        self.points.clear();
        self.points.push(pos);
    }

    /// Pointer-move while drawing.
    pub fn extend(&mut self, pos: Point) {
        if self.dragging {
            self.points.push(pos);
        }
    }

    /// Pointer-up / pointer-leave / window-level release.
    ///
    /// Lasso paths need more than two points. Brush and eraser strokes keep any
    /// non-empty path so a single click stamps a dot. The in-progress path is
    /// cleared regardless.
    pub fn finish(&mut self, brush_radius: f32) -> StrokeEnd {
        if !self.dragging {
            return StrokeEnd::NotDrawing;
        }
        self.dragging = false;
        let points = std::mem::take(&mut self.points);
        match self.drag_tool {
            Tool::Lasso if points.len() > 2 => StrokeEnd::Completed(SelectionShape::Lasso(points)),
            Tool::Brush if !points.is_empty() && brush_radius > 0.0 => {
                StrokeEnd::Completed(SelectionShape::Stroke { points, radius: brush_radius })
            }
            Tool::Eraser if !points.is_empty() && brush_radius > 0.0 => {
                StrokeEnd::Completed(SelectionShape::Erase { points, radius: brush_radius })
            }
            _ => StrokeEnd::Discarded,
        }
    }

    /// Drop any in-progress path without producing a shape.
    pub fn cancel(&mut self) {
        self.dragging = false;
        self.points.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_point_lasso_completes() {
        let mut capture = PathCapture::default();
        capture.begin(Tool::Lasso, Point::new(1.0, 1.0));
        capture.extend(Point::new(5.0, 1.0));
        capture.extend(Point::new(3.0, 4.0));
        match capture.finish(10.0) {
            StrokeEnd::Completed(SelectionShape::Lasso(points)) => assert_eq!(points.len(), 3),
            other => panic!("expected lasso, got {other:?}"),
        }
        assert!(capture.points.is_empty());
        assert!(!capture.is_drawing());
    }

    #[test]
    fn two_point_lasso_is_discarded() {
        let mut capture = PathCapture::default();
        capture.begin(Tool::Lasso, Point::new(1.0, 1.0));
        capture.extend(Point::new(1.5, 1.0));
        assert_eq!(capture.finish(10.0), StrokeEnd::Discarded);
        assert!(capture.points.is_empty());
    }

    #[test]
    fn moves_without_drag_are_ignored() {
        let mut capture = PathCapture::default();
        capture.extend(Point::new(1.0, 1.0));
        assert!(capture.points.is_empty());
        assert_eq!(capture.finish(10.0), StrokeEnd::NotDrawing);
    }

    #[test]
    fn brush_click_stamps_a_dot() {
        let mut capture = PathCapture::default();
        capture.begin(Tool::Brush, Point::new(7.0, 7.0));
        assert_eq!(
            capture.finish(4.0),
            StrokeEnd::Completed(SelectionShape::Stroke { points: vec![Point::new(7.0, 7.0)], radius: 4.0 })
        );
    }

    #[test]
    fn eraser_drag_yields_erase_shape() {
        let mut capture = PathCapture::default();
        capture.begin(Tool::Eraser, Point::new(2.0, 2.0));
        capture.extend(Point::new(6.0, 2.0));
        assert_eq!(
            capture.finish(3.0),
            StrokeEnd::Completed(SelectionShape::Erase {
                points: vec![Point::new(2.0, 2.0), Point::new(6.0, 2.0)],
                radius: 3.0
            })
        );
    }
}
