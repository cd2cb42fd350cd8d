use crate::segment::brush::MAX_BRUSH_SIZE;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn is_drawable(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EngineSettings {
    /// When enabled logging is initialised at debug level.
    #[serde(default)]
    pub debug_logging: bool,
    /// Write logs to this file instead of stderr.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// One room per image; the room key is the image's index in this list.
    #[serde(default = "default_images")]
    pub images: Vec<ImageSize>,
    /// Largest brush accepted from the wire.
    #[serde(default = "default_max_brush_size")]
    pub max_brush_size: u32,
    /// Keep a short log next to the raw log so late joiners can catch up
    /// without replaying every stroke.
    #[serde(default = "default_track_short_log")]
    pub track_short_log: bool,
    /// Pending commands a room worker buffers before senders block.
    #[serde(default = "default_room_channel_capacity")]
    pub room_channel_capacity: usize,
    #[serde(default = "default_color_seed")]
    pub color_seed: u64,
}

fn default_images() -> Vec<ImageSize> {
    vec![ImageSize {
        width: 512,
        height: 512,
    }]
}

fn default_max_brush_size() -> u32 {
    256
}

fn default_track_short_log() -> bool {
    true
}

fn default_room_channel_capacity() -> usize {
    1024
}

fn default_color_seed() -> u64 {
    0x5eed
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debug_logging: false,
            log_file: None,
            images: default_images(),
            max_brush_size: default_max_brush_size(),
            track_short_log: default_track_short_log(),
            room_channel_capacity: default_room_channel_capacity(),
            color_seed: default_color_seed(),
        }
    }
}

impl EngineSettings {
    /// Missing or empty files yield the defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse settings file {path}"))?;
        Ok(settings.sanitize())
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("failed to write settings to {path}"))?;
        Ok(())
    }

    /// Clamps values nothing can run with. Zero-sized images stay in the list
    /// so every other image keeps its index; [`EngineSettings::rooms`] skips
    /// them.
    pub fn sanitize(mut self) -> Self {
        let empty = self.images.iter().filter(|image| !image.is_drawable()).count();
        if empty > 0 {
            tracing::warn!(empty, "ignoring zero-sized images in settings");
        }
        self.max_brush_size = self.max_brush_size.clamp(1, MAX_BRUSH_SIZE);
        self.room_channel_capacity = self.room_channel_capacity.max(1);
        self
    }

    /// Room key and size of every drawable image. The key is the image's
    /// position in `images`, zero-sized entries included.
    pub fn rooms(&self) -> impl Iterator<Item = (String, ImageSize)> + '_ {
        self.images
            .iter()
            .enumerate()
            .filter(|(_, size)| size.is_drawable())
            .map(|(index, size)| (index.to_string(), *size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_skips_empty_images_and_clamps() {
        let settings = EngineSettings {
            images: vec![
                ImageSize {
                    width: 0,
                    height: 10,
                },
                ImageSize {
                    width: 4,
                    height: 4,
                },
            ],
            max_brush_size: 0,
            room_channel_capacity: 0,
            ..EngineSettings::default()
        }
        .sanitize();
        assert_eq!(settings.images.len(), 2);
        assert_eq!(settings.max_brush_size, 1);
        assert_eq!(settings.room_channel_capacity, 1);
        let keys: Vec<_> = settings.rooms().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["1"]);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let settings: EngineSettings = serde_json::from_str(r#"{"debug_logging":true}"#).unwrap();
        assert!(settings.debug_logging);
        assert_eq!(settings.max_brush_size, 256);
        assert!(settings.track_short_log);
        assert_eq!(settings.images.len(), 1);
    }
}
