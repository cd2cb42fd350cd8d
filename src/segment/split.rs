use crate::segment::boundary::BoundaryMaintainer;
use crate::segment::model::{
    AppliedFill, FloodFillEvent, Pos, SegmentId, ADJACENT_4, ADJACENT_8,
};
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Resolves every disconnection left behind by the stroke that filled the
/// maintainer's boundary tracker. Pieces that broke away are relabelled to
/// fresh ids taken from `next_segment_index`.
///
/// Deterministic tie-break: segments are visited in ascending id order and,
/// within one segment, the search always seeds from the largest remaining
/// boundary point in row-major order. The piece reached from that seed gets
/// the new id, so the piece holding the smallest new boundary point keeps the
/// original id.
pub fn resolve_splits(
    maintainer: &mut BoundaryMaintainer,
    next_segment_index: &mut SegmentId,
) -> Vec<AppliedFill> {
    let mut fills = Vec::new();
    loop {
        let pending = maintainer.tracker_mut().take();
        if pending.is_empty() {
            break;
        }
        for (segment, boundary) in pending {
            split_segment(maintainer, segment, boundary, next_segment_index, &mut fills);
        }
    }
    fills
}

fn split_segment(
    maintainer: &mut BoundaryMaintainer,
    segment: SegmentId,
    mut boundary: BTreeSet<Pos>,
    next_segment_index: &mut SegmentId,
    fills: &mut Vec<AppliedFill>,
) {
    // Points relabelled by an earlier split in this pass no longer belong here.
    boundary.retain(|&pos| maintainer.segment(pos) == segment);
    let original = boundary.clone();

    while let Some(&seed) = boundary.last() {
        boundary.remove(&seed);
        walk_boundary_run(maintainer, segment, seed, &mut boundary);
        if boundary.is_empty() {
            break;
        }

        let Some(piece) = detached_piece(maintainer, segment, seed, &boundary) else {
            continue;
        };

        let new_segment = *next_segment_index;
        *next_segment_index += 1;
        let mut points = BTreeSet::new();
        for &pos in &piece {
            maintainer.set_segment(pos, new_segment);
            boundary.remove(&pos);
            if original.contains(&pos) {
                points.insert(pos);
            }
        }
        tracing::debug!(
            segment,
            new_segment,
            pixels = piece.len(),
            "segment split"
        );
        fills.push(AppliedFill {
            event: FloodFillEvent {
                segment: new_segment,
                points,
            },
            relabeled: piece,
        });
    }
}

/// Removes from `boundary` every point 8-connected to `seed` through it.
///
/// A diagonal step is only taken when one of the two cells it cuts across
/// still belongs to `segment`. Otherwise the two points may sit on opposite
/// sides of a diagonal cut, and every point reached is 4-connected to `seed`
/// inside the segment.
fn walk_boundary_run(
    maintainer: &BoundaryMaintainer,
    segment: SegmentId,
    seed: Pos,
    boundary: &mut BTreeSet<Pos>,
) {
    let mut queue = VecDeque::from([seed]);
    while let Some(pos) = queue.pop_front() {
        for (dx, dy) in ADJACENT_8 {
            let next = pos.offset(dx, dy);
            if !boundary.contains(&next) {
                continue;
            }
            let bridged = dx == 0
                || dy == 0
                || maintainer.segment(pos.offset(dx, 0)) == segment
                || maintainer.segment(pos.offset(0, dy)) == segment;
            if bridged {
                boundary.remove(&next);
                queue.push_back(next);
            }
        }
    }
}

/// 4-connected search of `segment` from `seed`. Stops as soon as every
/// remaining boundary point has been reached; otherwise the whole region is
/// cut off from them and is returned, row-major.
fn detached_piece(
    maintainer: &BoundaryMaintainer,
    segment: SegmentId,
    seed: Pos,
    boundary: &BTreeSet<Pos>,
) -> Option<Vec<Pos>> {
    let mut unreached = boundary.len();
    let mut visited = HashSet::from([seed]);
    let mut queue = VecDeque::from([seed]);
    let mut piece = Vec::new();
    while let Some(pos) = queue.pop_front() {
        piece.push(pos);
        if boundary.contains(&pos) {
            unreached -= 1;
            if unreached == 0 {
                return None;
            }
        }
        for (dx, dy) in ADJACENT_4 {
            let next = pos.offset(dx, dy);
            if maintainer.segment(next) == segment && visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
    piece.sort_unstable();
    Some(piece)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::model::UNASSIGNED;

    fn square(size: u32, segment: SegmentId) -> BoundaryMaintainer {
        let mut m = BoundaryMaintainer::new(size, size);
        for y in 0..size as i32 {
            for x in 0..size as i32 {
                m.set_segment(Pos::new(x, y), segment);
            }
        }
        m.tracker_mut().clear();
        m
    }

    #[test]
    fn erasing_a_middle_row_splits_off_the_bottom() {
        let mut m = square(5, 0);
        for x in 0..5 {
            m.set_segment(Pos::new(x, 2), UNASSIGNED);
        }
        let mut next = 1;
        let fills = resolve_splits(&mut m, &mut next);

        assert_eq!(next, 2);
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].event.segment, 1);
        assert_eq!(fills[0].relabeled.len(), 10);
        for x in 0..5 {
            assert_eq!(m.segment(Pos::new(x, 0)), 0);
            assert_eq!(m.segment(Pos::new(x, 1)), 0);
            assert_eq!(m.segment(Pos::new(x, 3)), 1);
            assert_eq!(m.segment(Pos::new(x, 4)), 1);
        }
        let points: Vec<_> = fills[0].event.points.iter().copied().collect();
        assert_eq!(points, (0..5).map(|x| Pos::new(x, 3)).collect::<Vec<_>>());
        assert_eq!(m.buffer().find_neighbor_count_mismatch(), None);
        assert!(m.tracker().is_empty());
    }

    #[test]
    fn notch_does_not_split() {
        let mut m = square(5, 0);
        m.set_segment(Pos::new(2, 2), UNASSIGNED);
        let mut next = 1;
        let fills = resolve_splits(&mut m, &mut next);
        assert!(fills.is_empty());
        assert_eq!(next, 1);
        assert_eq!(m.stats().pixel_count(0), 24);
    }

    #[test]
    fn cross_cut_yields_four_pieces() {
        let mut m = square(7, 0);
        for i in 0..7 {
            m.set_segment(Pos::new(i, 3), UNASSIGNED);
            m.set_segment(Pos::new(3, i), UNASSIGNED);
        }
        let mut next = 10;
        let fills = resolve_splits(&mut m, &mut next);
        assert_eq!(fills.len(), 3);
        assert_eq!(next, 13);
        // The top-left quadrant holds the smallest boundary point.
        assert_eq!(m.segment(Pos::new(0, 0)), 0);
        let ids: BTreeSet<_> = [(6, 0), (0, 6), (6, 6)]
            .iter()
            .map(|&(x, y)| m.segment(Pos::new(x, y)))
            .collect();
        assert_eq!(ids, BTreeSet::from([10, 11, 12]));
        for id in [0, 10, 11, 12] {
            assert_eq!(m.stats().pixel_count(id), 9);
        }
        assert_eq!(m.buffer().find_neighbor_count_mismatch(), None);
    }

    #[test]
    fn cutting_a_one_pixel_line_splits_it() {
        let mut m = BoundaryMaintainer::new(7, 1);
        for x in 0..7 {
            m.set_segment(Pos::new(x, 0), 0);
        }
        m.tracker_mut().clear();
        m.set_segment(Pos::new(3, 0), UNASSIGNED);
        let mut next = 1;
        let fills = resolve_splits(&mut m, &mut next);
        assert_eq!(fills.len(), 1);
        assert_eq!(m.segment(Pos::new(0, 0)), 0);
        assert_eq!(m.segment(Pos::new(6, 0)), 1);
        assert_eq!(fills[0].event.points, BTreeSet::from([Pos::new(4, 0)]));
    }

    #[test]
    fn diagonal_cut_splits_on_its_last_pixel() {
        let mut m = square(5, 0);
        let mut next = 1;
        for (x, y) in [(0, 4), (1, 3), (2, 2), (3, 1)] {
            m.set_segment(Pos::new(x, y), UNASSIGNED);
            assert!(resolve_splits(&mut m, &mut next).is_empty(), "split at ({x},{y})");
        }
        m.set_segment(Pos::new(4, 0), UNASSIGNED);
        let fills = resolve_splits(&mut m, &mut next);

        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].relabeled.len(), 10);
        assert_eq!(m.segment(Pos::new(0, 0)), 0);
        assert_eq!(m.segment(Pos::new(4, 4)), 1);
        assert_eq!(m.stats().pixel_count(0), 10);
        assert_eq!(m.buffer().find_neighbor_count_mismatch(), None);
    }

    #[test]
    fn diagonal_step_through_a_kept_corner_is_no_split() {
        let mut m = square(3, 0);
        m.set_segment(Pos::new(1, 1), UNASSIGNED);
        m.set_segment(Pos::new(2, 2), UNASSIGNED);
        let mut next = 1;
        assert!(resolve_splits(&mut m, &mut next).is_empty());
        assert_eq!(m.stats().pixel_count(0), 7);
    }

    #[test]
    fn painting_over_another_segment_can_split_it() {
        let mut m = square(6, 0);
        for y in 0..6 {
            m.set_segment(Pos::new(2, y), 5);
        }
        let mut next = 6;
        let fills = resolve_splits(&mut m, &mut next);
        assert_eq!(fills.len(), 1);
        assert_eq!(m.segment(Pos::new(0, 0)), 0);
        assert_eq!(m.segment(Pos::new(5, 5)), 6);
        assert_eq!(m.stats().pixel_count(5), 6);
    }
}
