use crate::segment::buffer::SegmentBuffer;
use crate::segment::model::{Pos, SegmentId, UNASSIGNED};
use crate::segment::stats::SegmentStats;
use std::collections::{BTreeMap, BTreeSet};

/// Newly created boundary points per segment, accumulated over one stroke.
///
/// A point is recorded whenever a neighbour of the same segment goes away, which
/// covers the 4 -> 3 transition as well as thin runs that were already on the
/// boundary. It is forgotten again if the point itself leaves the segment later
/// in the stroke, so every recorded point still belongs to the segment it is
/// filed under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryTracker {
    points: BTreeMap<SegmentId, BTreeSet<Pos>>,
}

impl BoundaryTracker {
    fn record(&mut self, segment: SegmentId, pos: Pos) {
        self.points.entry(segment).or_default().insert(pos);
    }

    fn forget(&mut self, segment: SegmentId, pos: Pos) {
        if let Some(points) = self.points.get_mut(&segment) {
            points.remove(&pos);
            if points.is_empty() {
                self.points.remove(&segment);
            }
        }
    }

    pub fn get(&self, segment: SegmentId) -> Option<&BTreeSet<Pos>> {
        self.points.get(&segment)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Hands the accumulated points to the split detector, ordered by segment.
    pub fn take(&mut self) -> BTreeMap<SegmentId, BTreeSet<Pos>> {
        std::mem::take(&mut self.points)
    }
}

/// Owns the segment buffer together with everything that must change in lock
/// step with it. `set_segment` is the only way to relabel a pixel.
#[derive(Debug, Clone)]
pub struct BoundaryMaintainer {
    buffer: SegmentBuffer,
    stats: SegmentStats,
    tracker: BoundaryTracker,
}

impl BoundaryMaintainer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buffer: SegmentBuffer::new(width, height),
            stats: SegmentStats::default(),
            tracker: BoundaryTracker::default(),
        }
    }

    pub fn buffer(&self) -> &SegmentBuffer {
        &self.buffer
    }

    pub fn stats(&self) -> &SegmentStats {
        &self.stats
    }

    pub fn tracker(&self) -> &BoundaryTracker {
        &self.tracker
    }

    pub(crate) fn tracker_mut(&mut self) -> &mut BoundaryTracker {
        &mut self.tracker
    }

    pub fn segment(&self, pos: Pos) -> SegmentId {
        self.buffer.segment(pos)
    }

    /// Relabels `pos` and keeps the neighbour counts of it and its
    /// 4-neighbours exact. Returns whether anything changed; off-canvas
    /// positions are ignored.
    pub fn set_segment(&mut self, pos: Pos, segment: SegmentId) -> bool {
        let Some(idx) = self.buffer.index(pos) else {
            return false;
        };
        let old = self.buffer.cells()[idx].segment;
        if old == segment {
            return false;
        }
        self.buffer.cell_mut(idx).segment = segment;

        let neighbors = self.buffer.neighbor_indices(pos);
        if old != UNASSIGNED {
            for &n in neighbors.iter() {
                let cell = self.buffer.cell_mut(n);
                if cell.segment != old {
                    continue;
                }
                cell.in_segment_neighbors -= 1;
                let npos = self.buffer.pos_of(n);
                self.tracker.record(old, npos);
            }
            self.stats.remove(old, pos);
            self.tracker.forget(old, pos);
        }

        let mut count = 0;
        if segment != UNASSIGNED {
            for &n in neighbors.iter() {
                let cell = self.buffer.cell_mut(n);
                if cell.segment == segment {
                    cell.in_segment_neighbors += 1;
                    count += 1;
                }
            }
            self.stats.add(segment, pos);
        }
        self.buffer.cell_mut(idx).in_segment_neighbors = count;
        true
    }
}
