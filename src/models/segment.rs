use serde::Deserialize;

use super::item::{Tile, TileHint};

/// Wire payload for one fetched segment: pre-grouped rows of packing hints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmentPayload {
    pub rows: Vec<Vec<TileHint>>,
}

/// One packed row inside a segment. Tile tops are segment-relative.
#[derive(Debug, Clone)]
pub struct SegmentRow {
    pub height: f32,
    pub items: Vec<Tile>,
}

/// A contiguous run of items fetched and laid out as one unit.
#[derive(Debug, Clone)]
pub struct Segment {
    pub index: usize,
    pub rows: Vec<SegmentRow>,
    /// Total pixel height, including the leading margin of every row.
    pub height: f32,
    pub item_count: usize,
}

impl Segment {
    /// Tiles in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.rows.iter().flat_map(|row| row.items.iter())
    }
}

/// Lifecycle of a segment in the cache.
///
/// Transitions `Unrequested -> Pending -> Loaded` exactly once; a failed
/// fetch reverts to `Unrequested`, and invalidation clears every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStatus {
    Unrequested,
    Pending,
    Loaded,
}
