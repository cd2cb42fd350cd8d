use crate::segment::model::{DrawEvent, Pos, SegmentId, UNASSIGNED};
use serde::{Deserialize, Serialize};
use slab::Slab;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(usize);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// A brush stroke that painted `segment`.
    Draw { event: DrawEvent, segment: SegmentId },
    /// Pixels a split moved to `segment`.
    Fill { segment: SegmentId },
}

impl NodeKind {
    pub fn segment(&self) -> SegmentId {
        match self {
            NodeKind::Draw { segment, .. } | NodeKind::Fill { segment } => *segment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLogEntry {
    pub history_index: usize,
    pub num_pixels: usize,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// A live node together with the cells it owns when the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub history_index: usize,
    #[serde(flatten)]
    pub kind: NodeKind,
    pub cells: Vec<Pos>,
}

/// Everything a joining client needs to rebuild the current state without the
/// full history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLogSnapshot {
    pub width: u32,
    pub height: u32,
    pub next_segment_index: SegmentId,
    /// RawLog length at snapshot time; live events continue from here.
    pub raw_len: usize,
    pub entries: Vec<SnapshotEntry>,
}

#[derive(Debug)]
struct Node {
    entry: ShortLogEntry,
    prev: Option<NodeHandle>,
    next: Option<NodeHandle>,
}

/// Compacted history. Every assigned cell is owned by the node that last
/// painted it; erasing a cell releases it. A node that no longer owns any
/// cell is unlinked in O(1), so the live nodes always account for exactly the
/// assigned cells of the buffer this log shadows.
#[derive(Debug)]
pub struct ShortLog {
    width: u32,
    height: u32,
    nodes: Slab<Node>,
    head: Option<NodeHandle>,
    tail: Option<NodeHandle>,
    owners: Vec<Option<NodeHandle>>,
}

impl ShortLog {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            nodes: Slab::new(),
            head: None,
            tail: None,
            owners: vec![None; width as usize * height as usize],
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Records a stroke given the cells it changed. Eraser strokes only release
    /// ownership and never leave a node behind; otherwise returns the new node,
    /// or `None` when the stroke changed nothing.
    pub fn record_draw(
        &mut self,
        history_index: usize,
        event: DrawEvent,
        segment: SegmentId,
        changed: &[Pos],
    ) -> Option<NodeHandle> {
        if segment == UNASSIGNED {
            for &pos in changed {
                if let Some(idx) = self.index(pos) {
                    self.release(idx);
                }
            }
            return None;
        }
        self.record(history_index, NodeKind::Draw { event, segment }, changed)
    }

    pub fn record_fill(
        &mut self,
        history_index: usize,
        segment: SegmentId,
        relabeled: &[Pos],
    ) -> Option<NodeHandle> {
        self.record(history_index, NodeKind::Fill { segment }, relabeled)
    }

    fn record(&mut self, history_index: usize, kind: NodeKind, cells: &[Pos]) -> Option<NodeHandle> {
        let handle = self.push_back(ShortLogEntry {
            history_index,
            num_pixels: 0,
            kind,
        });
        for &pos in cells {
            if let Some(idx) = self.index(pos) {
                self.claim(handle, idx);
            }
        }
        if self.nodes[handle.0].entry.num_pixels == 0 {
            self.unlink(handle);
            return None;
        }
        Some(handle)
    }

    fn index(&self, pos: Pos) -> Option<usize> {
        (pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height)
            .then(|| pos.y as usize * self.width as usize + pos.x as usize)
    }

    fn push_back(&mut self, entry: ShortLogEntry) -> NodeHandle {
        let handle = NodeHandle(self.nodes.insert(Node {
            entry,
            prev: self.tail,
            next: None,
        }));
        match self.tail {
            Some(tail) => self.nodes[tail.0].next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        handle
    }

    fn claim(&mut self, handle: NodeHandle, idx: usize) {
        if self.owners[idx] == Some(handle) {
            return;
        }
        self.release(idx);
        self.owners[idx] = Some(handle);
        self.nodes[handle.0].entry.num_pixels += 1;
    }

    fn release(&mut self, idx: usize) {
        let Some(previous) = self.owners[idx].take() else {
            return;
        };
        let Some(node) = self.nodes.get_mut(previous.0) else {
            panic!("cell {idx} is owned by freed short log node {}", previous.0);
        };
        node.entry.num_pixels -= 1;
        if node.entry.num_pixels == 0 {
            self.unlink(previous);
        }
    }

    fn unlink(&mut self, handle: NodeHandle) {
        let node = self.nodes.remove(handle.0);
        match node.prev {
            Some(prev) => self.nodes[prev.0].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.nodes[next.0].prev = node.prev,
            None => self.tail = node.prev,
        }
    }

    pub fn owner(&self, pos: Pos) -> Option<NodeHandle> {
        self.index(pos).and_then(|idx| self.owners[idx])
    }

    pub fn entry(&self, handle: NodeHandle) -> Option<&ShortLogEntry> {
        self.nodes.get(handle.0).map(|node| &node.entry)
    }

    /// Live entries from oldest to newest.
    pub fn entries(&self) -> impl Iterator<Item = &ShortLogEntry> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let node = &self.nodes[cursor?.0];
            cursor = node.next;
            Some(&node.entry)
        })
    }

    /// Sum of `num_pixels` over all live nodes.
    pub fn live_pixels(&self) -> usize {
        self.entries().map(|entry| entry.num_pixels).sum()
    }

    pub fn snapshot(&self, next_segment_index: SegmentId, raw_len: usize) -> ShortLogSnapshot {
        let width = self.width.max(1) as usize;
        let mut cells: HashMap<usize, Vec<Pos>> = HashMap::with_capacity(self.nodes.len());
        for (idx, owner) in self.owners.iter().enumerate() {
            if let Some(handle) = owner {
                let pos = Pos::new((idx % width) as i32, (idx / width) as i32);
                cells.entry(handle.0).or_default().push(pos);
            }
        }

        let mut entries = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.head;
        while let Some(handle) = cursor {
            let node = &self.nodes[handle.0];
            entries.push(SnapshotEntry {
                history_index: node.entry.history_index,
                kind: node.entry.kind.clone(),
                cells: cells.remove(&handle.0).unwrap_or_default(),
            });
            cursor = node.next;
        }
        ShortLogSnapshot {
            width: self.width,
            height: self.height,
            next_segment_index,
            raw_len,
            entries,
        }
    }
}
