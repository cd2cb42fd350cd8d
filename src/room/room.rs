use crate::room::messages::{ClientId, DrawReceipt, RoomSummary, ServerMessage};
use crate::room::state::{can_transition, RoomLifecycle};
use crate::segment::engine::SegmentEngine;
use crate::segment::log::{HistoryEntry, RawLog};
use crate::segment::model::DrawEvent;
use crate::segment::short_log::{ShortLog, ShortLogSnapshot};
use anyhow::{bail, Result};
use hashlink::LinkedHashMap;
use std::sync::mpsc::Sender;

/// One image being segmented. Everything here runs on a single thread; the
/// room is the only writer of its engine and logs.
pub struct Room {
    key: String,
    engine: SegmentEngine,
    raw_log: RawLog,
    short_log: Option<ShortLog>,
    members: LinkedHashMap<ClientId, Sender<ServerMessage>>,
    lifecycle: RoomLifecycle,
}

impl Room {
    pub fn new(key: impl Into<String>, width: u32, height: u32, track_short_log: bool) -> Self {
        Self {
            key: key.into(),
            engine: SegmentEngine::new(width, height),
            raw_log: RawLog::new(),
            short_log: track_short_log.then(|| ShortLog::new(width, height)),
            members: LinkedHashMap::new(),
            lifecycle: RoomLifecycle::Idle,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn engine(&self) -> &SegmentEngine {
        &self.engine
    }

    pub fn raw_log(&self) -> &RawLog {
        &self.raw_log
    }

    pub fn short_log(&self) -> Option<&ShortLog> {
        self.short_log.as_ref()
    }

    pub fn lifecycle(&self) -> RoomLifecycle {
        self.lifecycle
    }

    pub fn is_member(&self, client_id: ClientId) -> bool {
        self.members.contains_key(&client_id)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Re-joining replaces the previous sender, e.g. after a reconnect.
    pub fn join(&mut self, client_id: ClientId, sender: Sender<ServerMessage>) {
        if self.members.replace(client_id, sender).is_some() {
            tracing::debug!(room = %self.key, client_id, "client rejoined");
        } else {
            tracing::info!(room = %self.key, client_id, "client joined");
        }
    }

    pub fn leave(&mut self, client_id: ClientId) -> bool {
        let removed = self.members.remove(&client_id).is_some();
        if removed {
            tracing::info!(room = %self.key, client_id, "client left");
        }
        removed
    }

    fn transition(&mut self, to: RoomLifecycle) -> Result<()> {
        if !can_transition(self.lifecycle, to) {
            bail!(
                "room {} cannot move from {:?} to {:?}",
                self.key,
                self.lifecycle,
                to
            );
        }
        self.lifecycle = to;
        Ok(())
    }

    /// Serializes one stroke: log it, run the pipeline, compact, broadcast.
    pub fn draw(&mut self, client_id: ClientId, event: DrawEvent) -> Result<DrawReceipt> {
        if !self.is_member(client_id) {
            tracing::warn!(room = %self.key, client_id, "draw from a client that has not joined");
            bail!("client {client_id} has not joined room {}", self.key);
        }

        self.transition(RoomLifecycle::Receiving)?;
        let history_index = self.raw_log.append(event);
        self.transition(RoomLifecycle::Applying)?;
        let outcome = self.engine.draw(&event);
        if let Some(short_log) = self.short_log.as_mut() {
            short_log.record_draw(history_index, event, outcome.active_segment, &outcome.changed);
            for fill in &outcome.fills {
                short_log.record_fill(history_index, fill.event.segment, &fill.relabeled);
            }
        }
        self.transition(RoomLifecycle::Idle)?;

        let receipt = DrawReceipt {
            history_index,
            segment: outcome.active_segment,
            fills: outcome.fill_events(),
        };
        self.send_to(
            client_id,
            ServerMessage::Accepted {
                history_index,
                segment: receipt.segment,
                fills: receipt.fills.clone(),
            },
        );
        self.broadcast_except(
            Some(client_id),
            ServerMessage::Draw {
                history_index,
                draw: event,
                segment: receipt.segment,
                fills: receipt.fills.clone(),
            },
        );
        Ok(receipt)
    }

    /// Entries with an index strictly greater than `history_index`.
    pub fn replay_after(&self, history_index: i64) -> Vec<HistoryEntry> {
        self.raw_log.suffix_after(history_index)
    }

    pub fn short_log_snapshot(&self) -> Option<ShortLogSnapshot> {
        self.short_log
            .as_ref()
            .map(|log| log.snapshot(self.engine.next_segment_index(), self.raw_log.len()))
    }

    /// New background image: history, buffer and compacted log start over.
    /// Members stay joined and are told the new resolution.
    pub fn reset(&mut self, width: u32, height: u32) {
        tracing::info!(room = %self.key, width, height, "room reset");
        self.engine = SegmentEngine::new(width, height);
        self.raw_log = RawLog::new();
        if self.short_log.is_some() {
            self.short_log = Some(ShortLog::new(width, height));
        }
        self.lifecycle = RoomLifecycle::Idle;
        self.broadcast_except(None, ServerMessage::Reset { width, height });
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            key: self.key.clone(),
            width: self.engine.width(),
            height: self.engine.height(),
            members: self.members.len(),
            history_len: self.raw_log.len(),
            short_log_len: self.short_log.as_ref().map(ShortLog::len),
            next_segment_index: self.engine.next_segment_index(),
            stats: self.engine.stats().clone(),
        }
    }

    pub(crate) fn reject(&mut self, client_id: ClientId, reason: String) {
        self.send_to(client_id, ServerMessage::Rejected { reason });
    }

    fn send_to(&mut self, client_id: ClientId, message: ServerMessage) {
        let delivered = match self.members.get(&client_id) {
            Some(sender) => sender.send(message).is_ok(),
            None => return,
        };
        if !delivered {
            self.drop_member(client_id);
        }
    }

    /// Fire-and-forget; members whose receiver is gone are dropped.
    fn broadcast_except(&mut self, except: Option<ClientId>, message: ServerMessage) {
        let gone: Vec<ClientId> = self
            .members
            .iter()
            .filter(|(id, _)| Some(**id) != except)
            .filter(|(_, sender)| sender.send(message.clone()).is_err())
            .map(|(id, _)| *id)
            .collect();
        for client_id in gone {
            self.drop_member(client_id);
        }
    }

    fn drop_member(&mut self, client_id: ClientId) {
        if self.members.remove(&client_id).is_some() {
            tracing::debug!(room = %self.key, client_id, "dropping disconnected client");
        }
    }
}
