use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

/// Backend-supplied packing hint for one item within a fetched row.
///
/// The backend groups items into rows and assigns each a width fraction so
/// that every item in the row scales to a common height without a second
/// round trip.
#[derive(Debug, Clone, Deserialize)]
pub struct TileHint {
    /// Fraction of the row's working width this item should occupy.
    #[serde(rename = "percentWidth")]
    pub percent_width: f32,
    /// Width / height of the source media.
    #[serde(rename = "aspectRatio")]
    pub aspect_ratio: f32,
    /// Opaque payload owned by the data layer.
    pub sample: Value,
}

impl TileHint {
    /// Aspect ratio guarded against junk metadata.
    pub fn safe_aspect_ratio(&self) -> f32 {
        if self.aspect_ratio > 0.0 {
            self.aspect_ratio
        } else {
            1.0
        }
    }
}

/// One mounted, renderable unit with resolved pixel geometry.
///
/// `top` is relative to the owning segment until the engine offsets it by the
/// segment's position in the full list.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Stable logical position in the dataset's canonical order.
    pub index: usize,
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
    /// Opaque payload forwarded to the presentation layer.
    pub sample: Arc<Value>,
}

impl Tile {
    /// Copy of this tile translated by a vertical offset.
    pub fn offset_by(&self, top_offset: f32) -> Self {
        Self {
            top: self.top + top_offset,
            sample: Arc::clone(&self.sample),
            ..self.clone()
        }
    }
}
