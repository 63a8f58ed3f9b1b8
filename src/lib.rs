//! Virtualized-grid engine for large, variable-aspect-ratio media
//! collections.
//!
//! Given a dataset of tens of thousands of items, the engine renders only the
//! visible window plus a buffer, tiles items into aspect-ratio-packed rows,
//! paginates backing data in fixed-size segments, and keeps content visually
//! stable across scrolls, resizes, and scrubber jumps.
//!
//! The crate is UI-agnostic. A presentation layer is expected to provide:
//! - resize observations of the scroll container (width/height)
//! - raw scroll offsets
//! - normalized scrubber pointer positions
//!
//! and to consume the per-tile pixel geometry in [`engine::VisibleSet`].
//! Fetching goes through the [`cache::SegmentFetcher`] contract; segment
//! requests coalesce, and results that arrive after a resize or dataset
//! reset are discarded by generation check rather than applied.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod layout;
pub mod models;
pub mod scrubber;
pub mod viewport;
pub mod visible;

pub use cache::{CacheEvent, PackParams, PageParams, SegmentCache, SegmentFetcher};
pub use config::GridConfig;
pub use engine::{GridEngine, SegmentView, VisibleSet};
pub use error::FetchError;
pub use models::{Segment, SegmentPayload, SegmentRow, SegmentStatus, Tile, TileHint};
pub use scrubber::ScrubberMapper;
pub use viewport::ViewportTracker;
