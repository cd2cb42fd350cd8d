pub mod boundary;
pub mod brush;
pub mod buffer;
pub mod engine;
pub mod fill;
pub mod log;
pub mod model;
pub mod palette;
pub mod scoring;
pub mod short_log;
pub mod split;
pub mod stats;

pub use engine::SegmentEngine;
pub use log::{HistoryEntry, RawLog};
pub use model::{
    BrushShape, DrawEvent, FloodFillEvent, Pos, SegmentId, StrokeOutcome, Tool, ToolKind,
    UNASSIGNED,
};
pub use short_log::{ShortLog, ShortLogSnapshot};
