use crate::segment::model::{Pos, SegmentId, UNASSIGNED};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentInfo {
    pub pixels: usize,
    sum_x: i64,
    sum_y: i64,
}

impl SegmentInfo {
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.pixels == 0 {
            return None;
        }
        let n = self.pixels as f64;
        Some((self.sum_x as f64 / n, self.sum_y as f64 / n))
    }
}

/// Live pixel bookkeeping per segment. A segment disappears from the table
/// once its last pixel is re-labelled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentStats {
    segments: HashMap<SegmentId, SegmentInfo>,
    total: usize,
}

impl SegmentStats {
    pub(crate) fn add(&mut self, segment: SegmentId, pos: Pos) {
        if segment == UNASSIGNED {
            return;
        }
        let info = self.segments.entry(segment).or_default();
        info.pixels += 1;
        info.sum_x += pos.x as i64;
        info.sum_y += pos.y as i64;
        self.total += 1;
    }

    /// Panics when `segment` has no entry: the buffer and the bookkeeping have
    /// diverged and nothing downstream can be trusted.
    pub(crate) fn remove(&mut self, segment: SegmentId, pos: Pos) {
        if segment == UNASSIGNED {
            return;
        }
        let Some(info) = self.segments.get_mut(&segment) else {
            panic!("segment {segment} lost pixel {pos} but has no bookkeeping entry");
        };
        info.pixels -= 1;
        info.sum_x -= pos.x as i64;
        info.sum_y -= pos.y as i64;
        if info.pixels == 0 {
            self.segments.remove(&segment);
        }
        self.total -= 1;
    }

    pub fn get(&self, segment: SegmentId) -> Option<&SegmentInfo> {
        self.segments.get(&segment)
    }

    pub fn pixel_count(&self, segment: SegmentId) -> usize {
        self.segments.get(&segment).map_or(0, |info| info.pixels)
    }

    pub fn centroid(&self, segment: SegmentId) -> Option<(f64, f64)> {
        self.segments.get(&segment).and_then(SegmentInfo::centroid)
    }

    /// Live segment ids, ascending.
    pub fn segments(&self) -> Vec<SegmentId> {
        let mut ids: Vec<_> = self.segments.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn total_assigned(&self) -> usize {
        self.total
    }
}
