use crate::room::messages::ServerMessage;
use crate::room::wire::ReplayRequest;
use crate::segment::engine::SegmentEngine;
use crate::segment::log::HistoryEntry;
use crate::segment::model::{DrawEvent, StrokeOutcome};
use crate::segment::short_log::ShortLogSnapshot;
use anyhow::{bail, Result};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaPhase {
    /// Local input is refused until a replay brings the replica up to date.
    AwaitingReplay,
    Reconciled,
}

/// What the replica needs from the collaborator layer after a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaAction {
    None,
    /// Fetch the raw log after this index and hand it to `apply_replay`.
    RequestReplay { after: i64 },
}

/// Client-side copy of one room. Local strokes are applied optimistically and
/// kept in `pending` until the room acknowledges them.
#[derive(Debug, Clone)]
pub struct ClientReplica {
    image_index: String,
    engine: SegmentEngine,
    base: Option<ShortLogSnapshot>,
    confirmed: Vec<DrawEvent>,
    pending: VecDeque<DrawEvent>,
    phase: ReplicaPhase,
}

impl ClientReplica {
    pub fn new(image_index: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            image_index: image_index.into(),
            engine: SegmentEngine::new(width, height),
            base: None,
            confirmed: Vec::new(),
            pending: VecDeque::new(),
            phase: ReplicaPhase::AwaitingReplay,
        }
    }

    pub fn engine(&self) -> &SegmentEngine {
        &self.engine
    }

    pub fn phase(&self) -> ReplicaPhase {
        self.phase
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Index of the last event confirmed by the room, `-1` when none.
    pub fn last_history_index(&self) -> i64 {
        let base = self.base.as_ref().map_or(0, |snapshot| snapshot.raw_len);
        (base + self.confirmed.len()) as i64 - 1
    }

    pub fn replay_request(&self) -> ReplayRequest {
        ReplayRequest {
            image_index: self.image_index.clone(),
            history_index: self.last_history_index(),
        }
    }

    /// Applies a raw log suffix. Entries must continue directly after
    /// `last_history_index`; entries the replica already has are skipped.
    pub fn apply_replay(&mut self, entries: &[HistoryEntry]) -> Result<()> {
        for entry in entries {
            let expected = (self.last_history_index() + 1) as usize;
            if entry.history_index < expected {
                continue;
            }
            if entry.history_index > expected {
                bail!(
                    "replay for image {} skips from {} to {}",
                    self.image_index,
                    expected,
                    entry.history_index
                );
            }
            self.confirmed.push(entry.event);
        }
        self.pending.clear();
        self.rebuild();
        self.phase = ReplicaPhase::Reconciled;
        tracing::debug!(
            image = %self.image_index,
            last_history_index = self.last_history_index(),
            "replica reconciled"
        );
        Ok(())
    }

    /// Starts over from a compacted log. A raw suffix may still be needed for
    /// strokes the room applied after the snapshot was taken.
    pub fn apply_short_log(&mut self, snapshot: ShortLogSnapshot) -> Result<()> {
        if (snapshot.width, snapshot.height) != (self.engine.width(), self.engine.height()) {
            bail!(
                "short log is {}x{} but image {} is {}x{}",
                snapshot.width,
                snapshot.height,
                self.image_index,
                self.engine.width(),
                self.engine.height()
            );
        }
        self.base = Some(snapshot);
        self.confirmed.clear();
        self.pending.clear();
        self.rebuild();
        self.phase = ReplicaPhase::Reconciled;
        Ok(())
    }

    /// Applies a local stroke optimistically.
    pub fn draw_local(&mut self, event: DrawEvent) -> Result<StrokeOutcome> {
        if self.phase != ReplicaPhase::Reconciled {
            bail!("image {} is not reconciled yet", self.image_index);
        }
        self.pending.push_back(event);
        Ok(self.engine.draw(&event))
    }

    /// The connection dropped: optimistic strokes are lost and input stays
    /// disabled until the next replay.
    pub fn disconnect(&mut self) -> ReplicaAction {
        self.phase = ReplicaPhase::AwaitingReplay;
        if !self.pending.is_empty() {
            self.pending.clear();
            self.rebuild();
        }
        ReplicaAction::RequestReplay {
            after: self.last_history_index(),
        }
    }

    pub fn on_message(&mut self, message: &ServerMessage) -> ReplicaAction {
        if let ServerMessage::Reset { width, height } = message {
            self.engine = SegmentEngine::new(*width, *height);
            self.base = None;
            self.confirmed.clear();
            self.pending.clear();
            return ReplicaAction::None;
        }
        if self.phase != ReplicaPhase::Reconciled {
            // The coming replay covers this message.
            return ReplicaAction::None;
        }
        match message {
            ServerMessage::Accepted { history_index, .. } => {
                if !self.is_next(*history_index) {
                    return self.fall_behind();
                }
                match self.pending.pop_front() {
                    Some(event) => {
                        self.confirmed.push(event);
                        ReplicaAction::None
                    }
                    None => self.fall_behind(),
                }
            }
            ServerMessage::Draw {
                history_index,
                draw,
                segment,
                fills,
            } => {
                if !self.is_next(*history_index) {
                    return self.fall_behind();
                }
                self.confirmed.push(*draw);
                if self.pending.is_empty() {
                    self.engine.apply_remote(draw, *segment, fills);
                } else {
                    // Our optimistic strokes were applied on top of a state the
                    // room never had; redo them after the remote stroke.
                    self.rebuild();
                }
                ReplicaAction::None
            }
            ServerMessage::Rejected { reason } => {
                tracing::warn!(image = %self.image_index, %reason, "stroke rejected by room");
                if self.pending.pop_front().is_some() {
                    self.rebuild();
                }
                ReplicaAction::None
            }
            ServerMessage::Reset { .. } => ReplicaAction::None,
        }
    }

    fn is_next(&self, history_index: usize) -> bool {
        history_index as i64 == self.last_history_index() + 1
    }

    fn fall_behind(&mut self) -> ReplicaAction {
        tracing::debug!(image = %self.image_index, "replica out of sync, requesting replay");
        self.phase = ReplicaPhase::AwaitingReplay;
        self.pending.clear();
        ReplicaAction::RequestReplay {
            after: self.last_history_index(),
        }
    }

    /// Discards the local buffer and replays base, confirmed and pending
    /// strokes from empty.
    fn rebuild(&mut self) {
        let mut engine = match &self.base {
            Some(snapshot) => SegmentEngine::from_short_log(snapshot),
            None => SegmentEngine::new(self.engine.width(), self.engine.height()),
        };
        engine.replay_raw(self.confirmed.iter().chain(self.pending.iter()));
        self.engine = engine;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::model::Pos;

    fn reconciled(width: u32, height: u32) -> ClientReplica {
        let mut replica = ClientReplica::new("0", width, height);
        replica.apply_replay(&[]).unwrap();
        replica
    }

    #[test]
    fn local_input_waits_for_replay() {
        let mut replica = ClientReplica::new("0", 5, 5);
        assert!(replica
            .draw_local(DrawEvent::brush((0, 0), (0, 0), 1))
            .is_err());
        replica.apply_replay(&[]).unwrap();
        assert!(replica
            .draw_local(DrawEvent::brush((0, 0), (0, 0), 1))
            .is_ok());
    }

    #[test]
    fn accepted_moves_pending_to_confirmed() {
        let mut replica = reconciled(5, 5);
        replica
            .draw_local(DrawEvent::brush((1, 1), (1, 1), 1))
            .unwrap();
        let action = replica.on_message(&ServerMessage::Accepted {
            history_index: 0,
            segment: 0,
            fills: vec![],
        });
        assert_eq!(action, ReplicaAction::None);
        assert_eq!(replica.pending(), 0);
        assert_eq!(replica.last_history_index(), 0);
    }

    #[test]
    fn gap_in_history_requests_replay() {
        let mut replica = reconciled(5, 5);
        let action = replica.on_message(&ServerMessage::Draw {
            history_index: 3,
            draw: DrawEvent::brush((1, 1), (1, 1), 1),
            segment: 0,
            fills: vec![],
        });
        assert_eq!(action, ReplicaAction::RequestReplay { after: -1 });
        assert_eq!(replica.phase(), ReplicaPhase::AwaitingReplay);
    }

    #[test]
    fn remote_stroke_before_ack_is_reordered() {
        let mut replica = reconciled(6, 1);
        let mine = DrawEvent::brush((0, 0), (0, 0), 1);
        replica.draw_local(mine).unwrap();
        assert_eq!(replica.engine().segment(Pos::new(0, 0)), 0);

        // The room applied somebody else's stroke first.
        let theirs = DrawEvent::brush((5, 0), (5, 0), 1);
        replica.on_message(&ServerMessage::Draw {
            history_index: 0,
            draw: theirs,
            segment: 0,
            fills: vec![],
        });
        assert_eq!(replica.engine().segment(Pos::new(5, 0)), 0);
        assert_eq!(replica.engine().segment(Pos::new(0, 0)), 1);

        replica.on_message(&ServerMessage::Accepted {
            history_index: 1,
            segment: 1,
            fills: vec![],
        });
        let server = SegmentEngine::from_raw(6, 1, &[theirs, mine]);
        assert_eq!(replica.engine().buffer(), server.buffer());
    }

    #[test]
    fn disconnect_discards_optimistic_strokes() {
        let mut replica = reconciled(4, 4);
        replica
            .draw_local(DrawEvent::brush((0, 0), (3, 3), 1))
            .unwrap();
        let action = replica.disconnect();
        assert_eq!(action, ReplicaAction::RequestReplay { after: -1 });
        assert_eq!(replica.engine().buffer().assigned_count(), 0);
        assert!(replica
            .draw_local(DrawEvent::brush((0, 0), (0, 0), 1))
            .is_err());
    }

    #[test]
    fn short_log_must_match_the_image() {
        let mut replica = ClientReplica::new("0", 4, 4);
        let snapshot = ShortLogSnapshot {
            width: 8,
            height: 8,
            next_segment_index: 0,
            raw_len: 0,
            entries: vec![],
        };
        assert!(replica.apply_short_log(snapshot).is_err());
    }
}
