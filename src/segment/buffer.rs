use crate::segment::model::{Pos, SegmentId, ADJACENT_4, UNASSIGNED};

/// Per-pixel state. `in_segment_neighbors` counts the in-bounds 4-neighbours
/// holding the same segment; unassigned cells keep it at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub segment: SegmentId,
    pub in_segment_neighbors: u8,
}

impl Cell {
    pub const EMPTY: Self = Self {
        segment: UNASSIGNED,
        in_segment_neighbors: 0,
    };

    pub fn is_boundary(self) -> bool {
        self.segment != UNASSIGNED && self.in_segment_neighbors < 4
    }
}

/// Up to four neighbour indices, copied out so callers can mutate the buffer
/// while walking them.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Neighbors {
    idx: [usize; 4],
    len: usize,
}

impl Neighbors {
    pub(crate) fn iter(&self) -> std::slice::Iter<'_, usize> {
        self.idx[..self.len].iter()
    }
}

/// Dense row-major segment buffer for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentBuffer {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl SegmentBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::EMPTY; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    pub fn index(&self, pos: Pos) -> Option<usize> {
        if self.in_bounds(pos) {
            Some(pos.y as usize * self.width as usize + pos.x as usize)
        } else {
            None
        }
    }

    pub fn pos_of(&self, index: usize) -> Pos {
        let w = self.width as usize;
        Pos::new((index % w) as i32, (index / w) as i32)
    }

    pub fn cell(&self, pos: Pos) -> Option<Cell> {
        self.index(pos).map(|idx| self.cells[idx])
    }

    /// Segment at `pos`; off-canvas reads as unassigned.
    pub fn segment(&self, pos: Pos) -> SegmentId {
        self.cell(pos).map_or(UNASSIGNED, |cell| cell.segment)
    }

    pub fn is_boundary(&self, pos: Pos) -> bool {
        self.cell(pos).is_some_and(Cell::is_boundary)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub(crate) fn cell_mut(&mut self, index: usize) -> &mut Cell {
        &mut self.cells[index]
    }

    /// In-bounds 4-neighbours of `pos` as buffer indices.
    pub(crate) fn neighbor_indices(&self, pos: Pos) -> Neighbors {
        let mut neighbors = Neighbors::default();
        for (dx, dy) in ADJACENT_4 {
            if let Some(idx) = self.index(pos.offset(dx, dy)) {
                neighbors.idx[neighbors.len] = idx;
                neighbors.len += 1;
            }
        }
        neighbors
    }

    pub fn assigned_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.segment != UNASSIGNED)
            .count()
    }

    /// Recounts every neighbour from scratch and returns the first position
    /// whose stored count disagrees. Only meant for tests and debugging.
    pub fn find_neighbor_count_mismatch(&self) -> Option<Pos> {
        (0..self.cells.len()).find_map(|idx| {
            let cell = self.cells[idx];
            let pos = self.pos_of(idx);
            let expected = if cell.segment == UNASSIGNED {
                0
            } else {
                self.neighbor_indices(pos)
                    .iter()
                    .filter(|&&n| self.cells[n].segment == cell.segment)
                    .count() as u8
            };
            (expected != cell.in_segment_neighbors).then_some(pos)
        })
    }
}
