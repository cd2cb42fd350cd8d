use crate::segment::boundary::BoundaryMaintainer;
use crate::segment::model::{FloodFillEvent, Pos, ADJACENT_4};
use std::collections::VecDeque;

/// Applies a fill decided elsewhere. Each point seeds a 4-connected relabel of
/// the region it currently sits in; points already carrying the target id are
/// skipped, so re-applying the same event changes nothing.
///
/// Returns the relabelled pixels in the order they were visited.
pub fn apply_fill(maintainer: &mut BoundaryMaintainer, event: &FloodFillEvent) -> Vec<Pos> {
    let mut relabeled = Vec::new();
    for &seed in &event.points {
        if !maintainer.buffer().in_bounds(seed) {
            continue;
        }
        let source = maintainer.segment(seed);
        if source == event.segment {
            continue;
        }

        maintainer.set_segment(seed, event.segment);
        relabeled.push(seed);
        let mut queue = VecDeque::from([seed]);
        while let Some(pos) = queue.pop_front() {
            for (dx, dy) in ADJACENT_4 {
                let next = pos.offset(dx, dy);
                // Relabel on discovery so a pixel can never be queued twice.
                if maintainer.segment(next) == source && maintainer.set_segment(next, event.segment)
                {
                    relabeled.push(next);
                    queue.push_back(next);
                }
            }
        }
    }
    relabeled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::model::{SegmentId, UNASSIGNED};
    use std::collections::BTreeSet;

    fn event(segment: SegmentId, points: &[(i32, i32)]) -> FloodFillEvent {
        FloodFillEvent {
            segment,
            points: points.iter().map(|&p| Pos::from(p)).collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn relabels_only_the_connected_region() {
        let mut m = BoundaryMaintainer::new(5, 1);
        for x in [0, 1, 3, 4] {
            m.set_segment(Pos::new(x, 0), 0);
        }
        let relabeled = apply_fill(&mut m, &event(7, &[(4, 0)]));
        assert_eq!(relabeled.len(), 2);
        assert_eq!(m.segment(Pos::new(0, 0)), 0);
        assert_eq!(m.segment(Pos::new(2, 0)), UNASSIGNED);
        assert_eq!(m.segment(Pos::new(3, 0)), 7);
        assert_eq!(m.buffer().find_neighbor_count_mismatch(), None);
    }

    #[test]
    fn applying_twice_is_a_no_op() {
        let mut m = BoundaryMaintainer::new(3, 3);
        m.set_segment(Pos::new(1, 1), 0);
        let fill = event(2, &[(1, 1)]);
        assert_eq!(apply_fill(&mut m, &fill), vec![Pos::new(1, 1)]);
        assert!(apply_fill(&mut m, &fill).is_empty());
        assert_eq!(m.stats().pixel_count(2), 1);
        assert_eq!(m.stats().pixel_count(0), 0);
    }

    #[test]
    fn off_canvas_seeds_are_ignored() {
        let mut m = BoundaryMaintainer::new(2, 2);
        assert!(apply_fill(&mut m, &event(1, &[(-1, 0), (5, 5)])).is_empty());
        assert_eq!(m.buffer().assigned_count(), 0);
    }
}
