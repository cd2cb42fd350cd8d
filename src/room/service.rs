use crate::room::messages::{
    ClientId, DrawReceipt, Reply, RoomCommand, RoomSummary, ServerMessage,
};
use crate::room::room::Room;
use crate::room::wire::{self, ReplayRequest, ReplayResponse};
use crate::segment::log::HistoryEntry;
use crate::segment::model::DrawEvent;
use crate::segment::short_log::ShortLogSnapshot;
use crate::settings::{EngineSettings, ImageSize};
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomConfig {
    pub size: ImageSize,
    pub track_short_log: bool,
    pub channel_capacity: usize,
    pub max_brush_size: u32,
}

#[derive(Debug)]
struct WorkerHandle {
    command_tx: SyncSender<RoomCommand>,
    join: JoinHandle<()>,
}

/// Handle to a room running on its own worker thread. Commands are processed
/// strictly in arrival order, which makes the worker the room's serializer.
#[derive(Debug)]
pub struct RoomService {
    key: String,
    worker: Option<WorkerHandle>,
}

impl RoomService {
    pub fn spawn(key: impl Into<String>, config: RoomConfig) -> Result<Self> {
        let key = key.into();
        let (command_tx, command_rx) = mpsc::sync_channel(config.channel_capacity.max(1));
        let room = Room::new(
            key.clone(),
            config.size.width,
            config.size.height,
            config.track_short_log,
        );
        let join = thread::Builder::new()
            .name(format!("room-{key}"))
            .spawn(move || worker_loop(room, command_rx, config.max_brush_size))
            .with_context(|| format!("failed to spawn worker for room {key}"))?;
        tracing::info!(room = %key, width = config.size.width, height = config.size.height, "room started");
        Ok(Self {
            key,
            worker: Some(WorkerHandle { command_tx, join }),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    fn send(&self, command: RoomCommand) -> Result<()> {
        let worker = self
            .worker
            .as_ref()
            .ok_or_else(|| anyhow!("room {} is shut down", self.key))?;
        worker
            .command_tx
            .send(command)
            .map_err(|_| anyhow!("room {} worker has stopped", self.key))
    }

    fn request<T>(&self, build: impl FnOnce(Reply<T>) -> RoomCommand) -> Result<T> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send(build(reply_tx))?;
        reply_rx
            .recv()
            .map_err(|_| anyhow!("room {} dropped the request", self.key))?
    }

    pub fn join(&self, client_id: ClientId, sender: Sender<ServerMessage>) -> Result<()> {
        self.send(RoomCommand::Join { client_id, sender })
    }

    pub fn leave(&self, client_id: ClientId) -> Result<()> {
        self.send(RoomCommand::Leave { client_id })
    }

    /// Applies a stroke and waits for the room's decision.
    pub fn draw(&self, client_id: ClientId, event: DrawEvent) -> Result<DrawReceipt> {
        self.request(|reply| RoomCommand::Draw {
            client_id,
            event,
            reply: Some(reply),
        })
    }

    /// Queues a stroke without waiting; the outcome reaches the client as
    /// `Accepted` on its member channel.
    pub fn submit(&self, client_id: ClientId, event: DrawEvent) -> Result<()> {
        self.send(RoomCommand::Draw {
            client_id,
            event,
            reply: None,
        })
    }

    /// Queues a raw wire frame. Frames that fail to decode are answered with
    /// `Rejected` and never touch the room state.
    pub fn submit_json(&self, client_id: ClientId, json: impl Into<String>) -> Result<()> {
        self.send(RoomCommand::DrawJson {
            client_id,
            json: json.into(),
        })
    }

    pub fn replay_after(&self, history_index: i64) -> Result<Vec<HistoryEntry>> {
        self.request(|reply| RoomCommand::ReplayAfter {
            history_index,
            reply,
        })
    }

    pub fn short_log(&self) -> Result<Option<ShortLogSnapshot>> {
        self.request(|reply| RoomCommand::ShortLog { reply })
    }

    pub fn summary(&self) -> Result<RoomSummary> {
        self.request(|reply| RoomCommand::Summary { reply })
    }

    pub fn reset(&self, size: ImageSize) -> Result<()> {
        self.send(RoomCommand::Reset {
            width: size.width,
            height: size.height,
        })
    }

    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.command_tx.send(RoomCommand::Shutdown);
            if worker.join.join().is_err() {
                tracing::error!(room = %self.key, "room worker panicked");
            }
            tracing::info!(room = %self.key, "room stopped");
        }
    }
}

impl Drop for RoomService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(mut room: Room, command_rx: Receiver<RoomCommand>, max_brush_size: u32) {
    while let Ok(command) = command_rx.recv() {
        match command {
            RoomCommand::Join { client_id, sender } => room.join(client_id, sender),
            RoomCommand::Leave { client_id } => {
                room.leave(client_id);
            }
            RoomCommand::Draw {
                client_id,
                event,
                reply,
            } => {
                let result = apply_draw(&mut room, client_id, event);
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            RoomCommand::DrawJson { client_id, json } => {
                match wire::decode_draw(&json, max_brush_size) {
                    Ok(event) => {
                        let _ = apply_draw(&mut room, client_id, event);
                    }
                    Err(err) => {
                        tracing::warn!(room = %room.key(), client_id, ?err, "rejected malformed draw");
                        room.reject(client_id, format!("{err:#}"));
                    }
                }
            }
            RoomCommand::ReplayAfter {
                history_index,
                reply,
            } => {
                let _ = reply.send(Ok(room.replay_after(history_index)));
            }
            RoomCommand::ShortLog { reply } => {
                let _ = reply.send(Ok(room.short_log_snapshot()));
            }
            RoomCommand::Summary { reply } => {
                let _ = reply.send(Ok(room.summary()));
            }
            RoomCommand::Reset { width, height } => room.reset(width, height),
            RoomCommand::Shutdown => break,
        }
    }
}

/// Runs one stroke. A panic inside the pipeline means the buffer and its
/// bookkeeping disagree; the worker stops rather than serve corrupt state.
fn apply_draw(room: &mut Room, client_id: ClientId, event: DrawEvent) -> Result<DrawReceipt> {
    match panic::catch_unwind(AssertUnwindSafe(|| room.draw(client_id, event))) {
        Ok(result) => result,
        Err(payload) => {
            tracing::error!(room = %room.key(), client_id, "segmentation state corrupted, stopping room");
            panic::resume_unwind(payload)
        }
    }
}

/// All rooms of a process, keyed by image index.
#[derive(Debug, Default)]
pub struct RoomHub {
    rooms: BTreeMap<String, RoomService>,
    max_brush_size: u32,
}

impl RoomHub {
    pub fn from_settings(settings: &EngineSettings) -> Result<Self> {
        let mut rooms = BTreeMap::new();
        for (key, size) in settings.rooms() {
            let config = RoomConfig {
                size,
                track_short_log: settings.track_short_log,
                channel_capacity: settings.room_channel_capacity,
                max_brush_size: settings.max_brush_size,
            };
            let service = RoomService::spawn(key.clone(), config)?;
            rooms.insert(key, service);
        }
        Ok(Self {
            rooms,
            max_brush_size: settings.max_brush_size,
        })
    }

    pub fn max_brush_size(&self) -> u32 {
        self.max_brush_size
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.rooms.keys().map(String::as_str)
    }

    pub fn room(&self, key: &str) -> Result<&RoomService> {
        self.rooms
            .get(key)
            .ok_or_else(|| anyhow!("no room for image index {key}"))
    }

    /// Serves the replay endpoint.
    pub fn replay(&self, request: &ReplayRequest) -> Result<ReplayResponse> {
        let entries = self
            .room(&request.image_index)?
            .replay_after(request.history_index)?;
        Ok(ReplayResponse::from_entries(&entries))
    }

    pub fn shutdown(&mut self) {
        for service in self.rooms.values_mut() {
            service.shutdown();
        }
    }
}
