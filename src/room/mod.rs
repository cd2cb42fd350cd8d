pub mod client;
pub mod messages;
#[allow(clippy::module_inception)]
pub mod room;
pub mod service;
pub mod state;
pub mod wire;

pub use client::{ClientReplica, ReplicaAction, ReplicaPhase};
pub use messages::{ClientId, DrawReceipt, RoomSummary, ServerMessage};
pub use room::Room;
pub use service::{RoomConfig, RoomHub, RoomService};
