use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Segment label stored per pixel. `UNASSIGNED` marks a pixel that belongs to
/// no segment.
pub type SegmentId = i64;

pub const UNASSIGNED: SegmentId = -1;

/// Pixel position. Ordered row-major (`y` first, then `x`) so that sets of
/// positions iterate the same way on every replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Saturates at the `i32` range. A saturated position is still off any
    /// canvas, so it is clipped like every other off-canvas pixel.
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

impl Ord for Pos {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Pos {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<(i32, i32)> for Pos {
    fn from(value: (i32, i32)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl From<Pos> for (i32, i32) {
    fn from(value: Pos) -> Self {
        (value.x, value.y)
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Von Neumann neighbourhood.
pub const ADJACENT_4: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

/// Moore neighbourhood, used when walking boundary runs.
pub const ADJACENT_8: [(i32, i32); 8] = [
    (0, 1),
    (0, -1),
    (1, 0),
    (-1, 0),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Brush,
    Eraser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrushShape {
    #[default]
    Circle,
    Square,
}

/// Closed set of drawing tools. Shape only affects rasterization; the kind
/// decides whether the stroke paints the active segment or clears pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tool {
    pub kind: ToolKind,
    pub shape: BrushShape,
}

/// One frame of a brush stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawEvent {
    pub from: Pos,
    pub to: Pos,
    pub size: u32,
    #[serde(default)]
    pub tool: ToolKind,
    #[serde(default)]
    pub shape: BrushShape,
}

impl DrawEvent {
    pub fn brush(from: (i32, i32), to: (i32, i32), size: u32) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            size,
            tool: ToolKind::Brush,
            shape: BrushShape::Circle,
        }
    }

    pub fn eraser(from: (i32, i32), to: (i32, i32), size: u32) -> Self {
        Self {
            tool: ToolKind::Eraser,
            ..Self::brush(from, to, size)
        }
    }

    pub fn tool(&self) -> Tool {
        Tool {
            kind: self.tool,
            shape: self.shape,
        }
    }

    pub fn is_eraser(&self) -> bool {
        self.tool == ToolKind::Eraser
    }

    pub fn with_shape(mut self, shape: BrushShape) -> Self {
        self.shape = shape;
        self
    }
}

/// Re-labels the region containing `points` to `segment`. Every point lies in
/// the same region, so any of them can seed the fill.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FloodFillEvent {
    pub segment: SegmentId,
    pub points: BTreeSet<Pos>,
}

/// A pixel produced by the brush rasterizer. `boundary` is set when the pixel
/// sits on the outline of the stroke or on the canvas edge.
///
/// The flag is presentation data: it feeds [`StrokeOutcome::outline`] and a
/// debug check in the engine. Neighbour counts never read it; the boundary
/// maintainer derives them from the buffer on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrokePixel {
    pub pos: Pos,
    pub boundary: bool,
}

/// A split resolved by the engine: the broadcastable fill plus every pixel it
/// re-labelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedFill {
    pub event: FloodFillEvent,
    pub relabeled: Vec<Pos>,
}

/// Result of running one draw event through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StrokeOutcome {
    pub active_segment: SegmentId,
    pub painted: Vec<StrokePixel>,
    /// Stroke pixels whose segment actually changed, row-major.
    pub changed: Vec<Pos>,
    pub fills: Vec<AppliedFill>,
}

impl StrokeOutcome {
    pub fn fill_events(&self) -> Vec<FloodFillEvent> {
        self.fills.iter().map(|fill| fill.event.clone()).collect()
    }

    /// Stroke outline, for presentation layers that only redraw borders.
    pub fn outline(&self) -> impl Iterator<Item = Pos> + '_ {
        self.painted.iter().filter(|p| p.boundary).map(|p| p.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_order_row_major() {
        let mut set = BTreeSet::new();
        set.insert(Pos::new(3, 0));
        set.insert(Pos::new(0, 1));
        set.insert(Pos::new(1, 0));
        let ordered: Vec<_> = set.into_iter().collect();
        assert_eq!(
            ordered,
            vec![Pos::new(1, 0), Pos::new(3, 0), Pos::new(0, 1)]
        );
    }

    #[test]
    fn draw_event_defaults_to_circle_brush() {
        let event: DrawEvent =
            serde_json::from_str(r#"{"from":[1,2],"to":[3,4],"size":5}"#).unwrap();
        assert_eq!(event, DrawEvent::brush((1, 2), (3, 4), 5));
    }

    #[test]
    fn eraser_round_trips_through_json() {
        let event = DrawEvent::eraser((0, 0), (2, 0), 3).with_shape(BrushShape::Square);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""tool":"eraser""#));
        assert!(json.contains(r#""from":[0,0]"#));
        let back: DrawEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
