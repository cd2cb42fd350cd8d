//! JSON shapes exchanged with clients. Everything that enters a room passes
//! through here first, so malformed input never reaches the pipeline.

use crate::room::messages::ServerMessage;
use crate::segment::log::HistoryEntry;
use crate::segment::model::{
    BrushShape, DrawEvent, FloodFillEvent, Pos, SegmentId, ToolKind, UNASSIGNED,
};
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Coordinates further out than this cannot be real cursor positions.
pub const MAX_COORDINATE: i32 = 1 << 24;

/// Largest segment id a JSON peer can represent exactly.
pub const MAX_SEGMENT_ID: SegmentId = (1 << 53) - 1;

/// Stroke segments may be `-1` (eraser); anything below is malformed.
fn check_stroke_segment(segment: SegmentId) -> Result<SegmentId> {
    if !(UNASSIGNED..=MAX_SEGMENT_ID).contains(&segment) {
        bail!("segment id {segment} is out of range");
    }
    Ok(segment)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDraw {
    pub from: [i32; 2],
    pub to: [i32; 2],
    pub size: u32,
    #[serde(default, skip_serializing_if = "is_default")]
    pub tool: ToolKind,
    #[serde(default, skip_serializing_if = "is_default")]
    pub shape: BrushShape,
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

impl From<DrawEvent> for WireDraw {
    fn from(event: DrawEvent) -> Self {
        Self {
            from: [event.from.x, event.from.y],
            to: [event.to.x, event.to.y],
            size: event.size,
            tool: event.tool,
            shape: event.shape,
        }
    }
}

impl WireDraw {
    pub fn validate(self, max_brush_size: u32) -> Result<DrawEvent> {
        if self.size > max_brush_size {
            bail!(
                "brush size {} exceeds the limit of {max_brush_size}",
                self.size
            );
        }
        for coordinate in self.from.iter().chain(self.to.iter()) {
            if coordinate.unsigned_abs() > MAX_COORDINATE as u32 {
                bail!("coordinate {coordinate} is out of range");
            }
        }
        Ok(DrawEvent {
            from: Pos::new(self.from[0], self.from[1]),
            to: Pos::new(self.to[0], self.to[1]),
            size: self.size,
            tool: self.tool,
            shape: self.shape,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFill {
    pub segment: SegmentId,
    pub points: Vec<String>,
}

impl From<&FloodFillEvent> for WireFill {
    fn from(fill: &FloodFillEvent) -> Self {
        Self {
            segment: fill.segment,
            points: fill.points.iter().map(Pos::to_string).collect(),
        }
    }
}

impl WireFill {
    /// Fills always move pixels into a real segment, never to `-1`.
    pub fn parse(&self) -> Result<FloodFillEvent> {
        if !(0..=MAX_SEGMENT_ID).contains(&self.segment) {
            bail!("fill segment id {} is out of range", self.segment);
        }
        let points = self
            .points
            .iter()
            .map(|point| parse_point(point))
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(FloodFillEvent {
            segment: self.segment,
            points,
        })
    }
}

/// Parses a `"x,y"` point key.
pub fn parse_point(text: &str) -> Result<Pos> {
    let (x, y) = text
        .split_once(',')
        .ok_or_else(|| anyhow!("point {text:?} is not of the form \"x,y\""))?;
    let x = x
        .trim()
        .parse()
        .with_context(|| format!("bad x coordinate in point {text:?}"))?;
    let y = y
        .trim()
        .parse()
        .with_context(|| format!("bad y coordinate in point {text:?}"))?;
    Ok(Pos::new(x, y))
}

/// Server to client frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WireServerMessage {
    #[serde(rename_all = "camelCase")]
    Accepted {
        history_index: usize,
        segment: SegmentId,
        fills: Vec<WireFill>,
    },
    #[serde(rename_all = "camelCase")]
    Draw {
        history_index: usize,
        draw: WireDraw,
        segment: SegmentId,
        fills: Vec<WireFill>,
    },
    Rejected {
        reason: String,
    },
    Reset {
        width: u32,
        height: u32,
    },
}

impl From<&ServerMessage> for WireServerMessage {
    fn from(message: &ServerMessage) -> Self {
        let fills = |fills: &[FloodFillEvent]| -> Vec<WireFill> {
            fills.iter().map(WireFill::from).collect()
        };
        match message {
            ServerMessage::Accepted {
                history_index,
                segment,
                fills: applied,
            } => Self::Accepted {
                history_index: *history_index,
                segment: *segment,
                fills: fills(applied),
            },
            ServerMessage::Draw {
                history_index,
                draw,
                segment,
                fills: applied,
            } => Self::Draw {
                history_index: *history_index,
                draw: WireDraw::from(*draw),
                segment: *segment,
                fills: fills(applied),
            },
            ServerMessage::Rejected { reason } => Self::Rejected {
                reason: reason.clone(),
            },
            ServerMessage::Reset { width, height } => Self::Reset {
                width: *width,
                height: *height,
            },
        }
    }
}

impl WireServerMessage {
    /// Converts back into a room message. Broadcast draws are trusted up to
    /// `max_brush_size` like any other input.
    pub fn into_message(self, max_brush_size: u32) -> Result<ServerMessage> {
        let parse_fills = |fills: Vec<WireFill>| {
            fills
                .iter()
                .map(WireFill::parse)
                .collect::<Result<Vec<_>>>()
        };
        Ok(match self {
            Self::Accepted {
                history_index,
                segment,
                fills,
            } => ServerMessage::Accepted {
                history_index,
                segment: check_stroke_segment(segment)?,
                fills: parse_fills(fills)?,
            },
            Self::Draw {
                history_index,
                draw,
                segment,
                fills,
            } => ServerMessage::Draw {
                history_index,
                draw: draw.validate(max_brush_size)?,
                segment: check_stroke_segment(segment)?,
                fills: parse_fills(fills)?,
            },
            Self::Rejected { reason } => ServerMessage::Rejected { reason },
            Self::Reset { width, height } => ServerMessage::Reset { width, height },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayRequest {
    pub image_index: String,
    /// Last index the client already has; negative asks for everything.
    pub history_index: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireHistoryEntry {
    #[serde(flatten)]
    pub draw: WireDraw,
    pub history_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayResponse {
    pub initial_state: Vec<WireHistoryEntry>,
}

impl ReplayResponse {
    pub fn from_entries(entries: &[HistoryEntry]) -> Self {
        Self {
            initial_state: entries
                .iter()
                .map(|entry| WireHistoryEntry {
                    draw: WireDraw::from(entry.event),
                    history_index: entry.history_index,
                })
                .collect(),
        }
    }

    pub fn into_entries(self, max_brush_size: u32) -> Result<Vec<HistoryEntry>> {
        self.initial_state
            .into_iter()
            .map(|entry| {
                Ok(HistoryEntry {
                    history_index: entry.history_index,
                    event: entry.draw.validate(max_brush_size)?,
                })
            })
            .collect()
    }
}

/// Decodes a client draw frame, rejecting anything incomplete or oversized.
pub fn decode_draw(json: &str, max_brush_size: u32) -> Result<DrawEvent> {
    let draw: WireDraw = serde_json::from_str(json).context("malformed draw event")?;
    draw.validate(max_brush_size)
}

pub fn encode_draw(event: DrawEvent) -> Result<String> {
    Ok(serde_json::to_string(&WireDraw::from(event))?)
}

pub fn encode_server_message(message: &ServerMessage) -> Result<String> {
    Ok(serde_json::to_string(&WireServerMessage::from(message))?)
}

pub fn decode_server_message(json: &str, max_brush_size: u32) -> Result<ServerMessage> {
    let frame: WireServerMessage =
        serde_json::from_str(json).context("malformed server message")?;
    frame.into_message(max_brush_size)
}
