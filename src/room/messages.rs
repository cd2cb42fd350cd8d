use crate::segment::log::HistoryEntry;
use crate::segment::model::{DrawEvent, FloodFillEvent, SegmentId};
use crate::segment::short_log::ShortLogSnapshot;
use crate::segment::stats::SegmentStats;
use std::sync::mpsc::Sender;

pub type ClientId = u64;

/// Messages a room pushes to its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Sent to the client whose stroke was just applied.
    Accepted {
        history_index: usize,
        segment: SegmentId,
        fills: Vec<FloodFillEvent>,
    },
    /// Sent to every other member.
    Draw {
        history_index: usize,
        draw: DrawEvent,
        segment: SegmentId,
        fills: Vec<FloodFillEvent>,
    },
    Rejected {
        reason: String,
    },
    /// The background image changed; history restarts at index 0.
    Reset {
        width: u32,
        height: u32,
    },
}

/// What the room decided for one stroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawReceipt {
    pub history_index: usize,
    pub segment: SegmentId,
    pub fills: Vec<FloodFillEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomSummary {
    pub key: String,
    pub width: u32,
    pub height: u32,
    pub members: usize,
    pub history_len: usize,
    pub short_log_len: Option<usize>,
    pub next_segment_index: SegmentId,
    pub stats: SegmentStats,
}

pub(crate) type Reply<T> = Sender<anyhow::Result<T>>;

/// Work items for a room worker.
#[derive(Debug)]
pub(crate) enum RoomCommand {
    Join {
        client_id: ClientId,
        sender: Sender<ServerMessage>,
    },
    Leave {
        client_id: ClientId,
    },
    Draw {
        client_id: ClientId,
        event: DrawEvent,
        reply: Option<Reply<DrawReceipt>>,
    },
    /// Undecoded client frame; decoding happens on the room worker so a
    /// rejection reaches the sender in order with its other messages.
    DrawJson {
        client_id: ClientId,
        json: String,
    },
    ReplayAfter {
        history_index: i64,
        reply: Reply<Vec<HistoryEntry>>,
    },
    ShortLog {
        reply: Reply<Option<ShortLogSnapshot>>,
    },
    Summary {
        reply: Reply<RoomSummary>,
    },
    Reset {
        width: u32,
        height: u32,
    },
    Shutdown,
}
