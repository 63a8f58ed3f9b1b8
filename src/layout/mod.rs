//! Layout math for the virtualized grid.
//!
//! This module provides:
//! - `grid` - Base square-tile geometry derived from the viewport width
//! - `segments` - Item/segment index math and the memoized top-offset ledger
//! - `tiler` - Aspect-ratio packing of backend-hinted rows into pixels

pub mod grid;
pub mod segments;
pub mod tiler;

pub use grid::BaseGrid;
pub use segments::SegmentLedger;
