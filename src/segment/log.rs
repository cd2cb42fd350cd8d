use crate::segment::model::DrawEvent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub history_index: usize,
    #[serde(flatten)]
    pub event: DrawEvent,
}

/// Append-only stroke history. Replaying it from an empty buffer reproduces
/// the current state exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawLog {
    events: Vec<DrawEvent>,
}

impl RawLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `event` and returns its history index.
    pub fn append(&mut self, event: DrawEvent) -> usize {
        self.events.push(event);
        self.events.len() - 1
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, history_index: usize) -> Option<&DrawEvent> {
        self.events.get(history_index)
    }

    pub fn events(&self) -> &[DrawEvent] {
        &self.events
    }

    /// Every entry strictly after `history_index`; a negative index asks for
    /// the whole log.
    pub fn suffix_after(&self, history_index: i64) -> Vec<HistoryEntry> {
        let start = if history_index < 0 {
            0
        } else {
            (history_index as usize).saturating_add(1)
        };
        self.events
            .iter()
            .enumerate()
            .skip(start)
            .map(|(history_index, &event)| HistoryEntry {
                history_index,
                event,
            })
            .collect()
    }
}
