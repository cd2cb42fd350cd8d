use crate::segment::model::SegmentId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const TRANSPARENT_KEY: Rgb = Rgb(0, 0, 0);
}

/// Colour per segment id. Each colour comes from a generator seeded with the
/// palette seed mixed with the id, so lookups cost O(1) memory and never
/// depend on which ids were asked for before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPalette {
    seed: u64,
}

impl SegmentPalette {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Unassigned pixels map to the transparent key colour.
    pub fn color(&self, segment: SegmentId) -> Rgb {
        if segment < 0 {
            return Rgb::TRANSPARENT_KEY;
        }
        let mixed = (segment as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let mut rng = StdRng::seed_from_u64(self.seed ^ mixed);
        // Keep channels away from black so no segment looks unassigned.
        Rgb(
            rng.gen_range(32..=255),
            rng.gen_range(32..=255),
            rng.gen_range(32..=255),
        )
    }
}
