use crate::segment::buffer::SegmentBuffer;
use crate::segment::model::{SegmentId, UNASSIGNED};
use anyhow::{bail, Result};
use std::collections::BTreeMap;

/// How well a drawn segmentation reproduces a reference one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Score {
    /// Pixels whose drawn segment is matched to their reference segment.
    pub correct: usize,
    /// Reference pixels plus pixels drawn where the reference has nothing.
    pub considered: usize,
    /// `(reference, drawn)` pairs of the optimal matching, by reference id.
    pub matches: Vec<(SegmentId, SegmentId)>,
}

impl Score {
    /// Fraction of considered pixels that are correct. Two empty buffers
    /// agree perfectly.
    pub fn ratio(&self) -> f64 {
        if self.considered == 0 {
            return 1.0;
        }
        self.correct as f64 / self.considered as f64
    }
}

/// Scores `drawn` against `reference`.
///
/// Every reference segment is matched to at most one drawn segment and vice
/// versa, choosing the matching that maximises the number of overlapping
/// pixels. Unmatched drawn segments and paint outside the reference only add
/// to `considered`.
pub fn score(reference: &SegmentBuffer, drawn: &SegmentBuffer) -> Result<Score> {
    if reference.width() != drawn.width() || reference.height() != drawn.height() {
        bail!(
            "cannot score a {}x{} drawing against a {}x{} reference",
            drawn.width(),
            drawn.height(),
            reference.width(),
            reference.height()
        );
    }

    let mut considered = 0;
    let mut overlaps: BTreeMap<(SegmentId, SegmentId), usize> = BTreeMap::new();
    for (want, got) in reference.cells().iter().zip(drawn.cells()) {
        match (want.segment, got.segment) {
            (UNASSIGNED, UNASSIGNED) => {}
            (UNASSIGNED, _) | (_, UNASSIGNED) => considered += 1,
            (want, got) => {
                considered += 1;
                *overlaps.entry((want, got)).or_default() += 1;
            }
        }
    }

    let mut reference_ids: Vec<SegmentId> = overlaps.keys().map(|&(want, _)| want).collect();
    reference_ids.dedup();
    let mut drawn_ids: Vec<SegmentId> = overlaps.keys().map(|&(_, got)| got).collect();
    drawn_ids.sort_unstable();
    drawn_ids.dedup();

    let overlap =
        |want: SegmentId, got: SegmentId| overlaps.get(&(want, got)).copied().unwrap_or(0);
    let mut matches = Vec::new();
    if reference_ids.len() <= drawn_ids.len() {
        let cost = cost_matrix(&reference_ids, &drawn_ids, |&want, &got| overlap(want, got));
        for (row, col) in assign(&cost).into_iter().enumerate() {
            matches.push((reference_ids[row], drawn_ids[col]));
        }
    } else {
        let cost = cost_matrix(&drawn_ids, &reference_ids, |&got, &want| overlap(want, got));
        for (row, col) in assign(&cost).into_iter().enumerate() {
            matches.push((reference_ids[col], drawn_ids[row]));
        }
    }
    matches.retain(|&(want, got)| overlap(want, got) > 0);
    matches.sort_unstable();
    let correct = matches.iter().map(|&(want, got)| overlap(want, got)).sum();

    tracing::debug!(
        correct,
        considered,
        matched = matches.len(),
        "scored segmentation"
    );
    Ok(Score {
        correct,
        considered,
        matches,
    })
}

/// Share of pixels that carry any segment.
pub fn coverage(buffer: &SegmentBuffer) -> f64 {
    if buffer.is_empty() {
        return 0.0;
    }
    buffer.assigned_count() as f64 / buffer.len() as f64
}

fn cost_matrix<R, C>(rows: &[R], cols: &[C], gain: impl Fn(&R, &C) -> usize) -> Vec<Vec<i64>> {
    rows.iter()
        .map(|row| cols.iter().map(|col| -(gain(row, col) as i64)).collect())
        .collect()
}

/// Minimum-cost assignment (Hungarian method, O(n²m)). `cost` has at most as
/// many rows as columns; returns the column assigned to each row.
fn assign(cost: &[Vec<i64>]) -> Vec<usize> {
    let rows = cost.len();
    let cols = cost.first().map_or(0, Vec::len);
    debug_assert!(rows <= cols);

    // Potentials and the matching are 1-based; index 0 is the virtual column.
    let mut u = vec![0i64; rows + 1];
    let mut v = vec![0i64; cols + 1];
    let mut matched_row = vec![0usize; cols + 1];
    let mut way = vec![0usize; cols + 1];

    for row in 1..=rows {
        matched_row[0] = row;
        let mut col0 = 0;
        let mut min_slack = vec![i64::MAX; cols + 1];
        let mut used = vec![false; cols + 1];
        loop {
            used[col0] = true;
            let row0 = matched_row[col0];
            let mut delta = i64::MAX;
            let mut col1 = 0;
            for col in 1..=cols {
                if used[col] {
                    continue;
                }
                let slack = cost[row0 - 1][col - 1] - u[row0] - v[col];
                if slack < min_slack[col] {
                    min_slack[col] = slack;
                    way[col] = col0;
                }
                if min_slack[col] < delta {
                    delta = min_slack[col];
                    col1 = col;
                }
            }
            for col in 0..=cols {
                if used[col] {
                    u[matched_row[col]] += delta;
                    v[col] -= delta;
                } else {
                    min_slack[col] -= delta;
                }
            }
            col0 = col1;
            if matched_row[col0] == 0 {
                break;
            }
        }
        while col0 != 0 {
            let col1 = way[col0];
            matched_row[col0] = matched_row[col1];
            col0 = col1;
        }
    }

    let mut assignment = vec![0; rows];
    for col in 1..=cols {
        if matched_row[col] != 0 {
            assignment[matched_row[col] - 1] = col - 1;
        }
    }
    assignment
}
