use crate::segment::boundary::BoundaryMaintainer;
use crate::segment::brush::rasterize;
use crate::segment::buffer::SegmentBuffer;
use crate::segment::fill::apply_fill;
use crate::segment::model::{
    AppliedFill, DrawEvent, FloodFillEvent, Pos, SegmentId, StrokeOutcome, StrokePixel,
    UNASSIGNED,
};
use crate::segment::short_log::ShortLogSnapshot;
use crate::segment::split::resolve_splits;
use crate::segment::stats::SegmentStats;

/// Stroke-scoped state threaded through one pass of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StrokeContext {
    active_segment: SegmentId,
}

/// Segmentation state of one image: buffer, bookkeeping and the id counter.
///
/// Local strokes go through [`SegmentEngine::draw`], which decides the active
/// segment and resolves splits itself. Strokes that another engine already
/// resolved go through [`SegmentEngine::apply_remote`], which takes those
/// decisions as given so both sides converge on the same labels.
#[derive(Debug, Clone)]
pub struct SegmentEngine {
    maintainer: BoundaryMaintainer,
    next_segment_index: SegmentId,
}

impl SegmentEngine {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            maintainer: BoundaryMaintainer::new(width, height),
            next_segment_index: 0,
        }
    }

    /// Rebuilds state by running `events` through the full pipeline from an
    /// empty buffer.
    pub fn from_raw<'a>(
        width: u32,
        height: u32,
        events: impl IntoIterator<Item = &'a DrawEvent>,
    ) -> Self {
        let mut engine = Self::new(width, height);
        engine.replay_raw(events);
        engine
    }

    /// Rebuilds state from a compacted log. Each entry writes its segment into
    /// the cells it still owns: no rasterizing, no segment allocation and no
    /// split detection.
    pub fn from_short_log(snapshot: &ShortLogSnapshot) -> Self {
        let mut engine = Self::new(snapshot.width, snapshot.height);
        for entry in &snapshot.entries {
            let segment = entry.kind.segment();
            for &pos in &entry.cells {
                engine.maintainer.set_segment(pos, segment);
            }
        }
        engine.maintainer.tracker_mut().clear();
        engine.next_segment_index = snapshot.next_segment_index;
        tracing::debug!(
            entries = snapshot.entries.len(),
            next_segment_index = engine.next_segment_index,
            "rebuilt from short log"
        );
        engine
    }

    pub fn width(&self) -> u32 {
        self.maintainer.buffer().width()
    }

    pub fn height(&self) -> u32 {
        self.maintainer.buffer().height()
    }

    pub fn buffer(&self) -> &SegmentBuffer {
        self.maintainer.buffer()
    }

    pub fn stats(&self) -> &SegmentStats {
        self.maintainer.stats()
    }

    pub fn segment(&self, pos: Pos) -> SegmentId {
        self.maintainer.segment(pos)
    }

    pub fn next_segment_index(&self) -> SegmentId {
        self.next_segment_index
    }

    /// Clears the buffer back to unassigned, keeping the resolution.
    pub fn reset(&mut self) {
        *self = Self::new(self.width(), self.height());
    }

    /// Runs one local stroke through rasterize, relabel and split detection.
    pub fn draw(&mut self, event: &DrawEvent) -> StrokeOutcome {
        let ctx = self.begin_stroke(event);
        let painted = self.rasterize(event);
        let changed = self.paint(&painted, ctx.active_segment);
        let fills = resolve_splits(&mut self.maintainer, &mut self.next_segment_index);
        tracing::debug!(
            active_segment = ctx.active_segment,
            painted = painted.len(),
            changed = changed.len(),
            fills = fills.len(),
            "stroke applied"
        );
        StrokeOutcome {
            active_segment: ctx.active_segment,
            painted,
            changed,
            fills,
        }
    }

    /// Applies a stroke whose active segment and resulting fills were decided
    /// by another engine.
    pub fn apply_remote(
        &mut self,
        event: &DrawEvent,
        segment: SegmentId,
        fills: &[FloodFillEvent],
    ) -> StrokeOutcome {
        let segment = if event.is_eraser() { UNASSIGNED } else { segment };
        let painted = self.rasterize(event);
        let changed = self.paint(&painted, segment);
        // Splits arrive as explicit fills; the locally tracked points are moot.
        self.maintainer.tracker_mut().clear();

        let mut applied = Vec::with_capacity(fills.len());
        for fill in fills {
            let relabeled = apply_fill(&mut self.maintainer, fill);
            self.observe_segment(fill.segment);
            applied.push(AppliedFill {
                event: fill.clone(),
                relabeled,
            });
        }
        self.maintainer.tracker_mut().clear();
        self.observe_segment(segment);

        StrokeOutcome {
            active_segment: segment,
            painted,
            changed,
            fills: applied,
        }
    }

    /// Runs `events` through the full pipeline on top of the current state.
    pub fn replay_raw<'a>(&mut self, events: impl IntoIterator<Item = &'a DrawEvent>) {
        for event in events {
            self.draw(event);
        }
    }

    fn begin_stroke(&mut self, event: &DrawEvent) -> StrokeContext {
        let active_segment = if event.is_eraser() {
            UNASSIGNED
        } else {
            match self.segment(event.from) {
                UNASSIGNED => {
                    let id = self.next_segment_index;
                    self.next_segment_index += 1;
                    id
                }
                existing => existing,
            }
        };
        StrokeContext { active_segment }
    }

    fn rasterize(&self, event: &DrawEvent) -> Vec<StrokePixel> {
        rasterize(
            event.tool(),
            event.from,
            event.to,
            event.size,
            self.width(),
            self.height(),
        )
    }

    fn paint(&mut self, pixels: &[StrokePixel], segment: SegmentId) -> Vec<Pos> {
        let changed: Vec<Pos> = pixels
            .iter()
            .filter(|pixel| self.maintainer.set_segment(pixel.pos, segment))
            .map(|pixel| pixel.pos)
            .collect();
        debug_assert!(
            segment == UNASSIGNED
                || pixels
                    .iter()
                    .filter(|pixel| !pixel.boundary)
                    .all(|pixel| !self.maintainer.buffer().is_boundary(pixel.pos)),
            "interior stroke pixel left on a segment boundary"
        );
        changed
    }

    fn observe_segment(&mut self, segment: SegmentId) {
        if segment >= self.next_segment_index {
            self.next_segment_index = segment.saturating_add(1);
        }
    }
}
