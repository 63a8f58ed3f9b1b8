//! Engine wiring the root viewport state to the derived layout graph.
//!
//! Derivations are recomputed on demand with memoization keyed by input
//! identity: base geometry per width epoch, segment tops in the ledger's
//! monotone prefix, and packed rows in the segment cache. Synchronous reads
//! never block; asynchronous fetch results enter through epoch-gated cache
//! commits and are folded in on the next `visible` pass.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::cache::{CacheEvent, PackParams, SegmentCache, SegmentFetcher};
use crate::config::GridConfig;
use crate::layout::grid::BaseGrid;
use crate::layout::segments::{self, SegmentLedger};
use crate::models::{SegmentStatus, Tile};
use crate::scrubber::{self, ScrubberMapper};
use crate::viewport::ViewportTracker;
use crate::visible::{self, RowAnchor};

/// Per-segment entry of a [`VisibleSet`], for loading chrome.
#[derive(Debug, Clone, Copy)]
pub struct SegmentView {
    pub index: usize,
    pub status: SegmentStatus,
    /// Pixel top within the full list.
    pub top: f32,
    pub height: f32,
}

/// Everything the presentation layer needs for one frame.
#[derive(Debug, Clone, Default)]
pub struct VisibleSet {
    /// Mounted tiles with absolute pixel geometry, in index order.
    pub tiles: Vec<Tile>,
    pub segments: Vec<SegmentView>,
    pub is_resizing: bool,
    pub scroll_percentage: f32,
}

/// Virtualized-grid engine over a paginated media collection.
pub struct GridEngine {
    config: GridConfig,
    tracker: ViewportTracker,
    cache: SegmentCache,
    ledger: SegmentLedger,
    prev_layout: Vec<RowAnchor>,
    item_count: usize,
    base: Option<(u64, BaseGrid)>,
}

impl GridEngine {
    pub fn new(fetcher: Arc<dyn SegmentFetcher>) -> Self {
        Self::with_config(fetcher, GridConfig::default())
    }

    pub fn with_config(fetcher: Arc<dyn SegmentFetcher>, config: GridConfig) -> Self {
        let tracker = ViewportTracker::new(config.resize_debounce);
        let cache = SegmentCache::new(fetcher, config.items_per_request);
        Self {
            config,
            tracker,
            cache,
            ledger: SegmentLedger::new(),
            prev_layout: Vec::new(),
            item_count: 0,
            base: None,
        }
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Installs a new dataset size. Any change is a dataset reset: all
    /// cached geometry is dropped and the scroll position rewinds.
    pub fn set_item_count(&mut self, count: usize) {
        if count == self.item_count {
            return;
        }
        debug!(count, "dataset reset");
        self.item_count = count;
        self.cache.invalidate_all();
        self.ledger.clear();
        self.prev_layout.clear();
        self.tracker.set_live_top(0.0);
        self.tracker.set_current_index(0);
    }

    /// Applies a resize observation from the scroll container.
    ///
    /// A width change invalidates all segment geometry (the column count may
    /// change) and recenters `live_top` so the anchor item stays put.
    pub fn on_resize(&mut self, width: f32, height: f32) {
        // Capture the anchor under the old geometry before anything moves.
        let old_grid = self.grid_now();
        let anchor = visible::resolve_current_index(
            &self.prev_layout,
            self.tracker.live_top(),
            old_grid.margin,
            &old_grid,
        );

        if !self.tracker.set_main_size(width, height) {
            return;
        }
        debug!(width, height, anchor, "viewport width changed");

        self.cache.invalidate_all();
        self.ledger.clear();
        self.prev_layout.clear();
        self.base = None;
        self.tracker.set_current_index(anchor);

        let grid = self.grid_now();
        let row = if grid.cols == 0 { 0 } else { anchor / grid.cols };
        let max_top = (grid.list_height(self.item_count) - height).max(0.0);
        self.tracker.set_live_top(grid.row_top(row).clamp(0.0, max_top));
    }

    /// Applies a raw scroll offset. Last write wins.
    pub fn on_scroll(&mut self, top: f32) {
        self.tracker.set_live_top(top);
    }

    /// Jumps the viewport via the scrubber, writing through to `live_top`
    /// and the denormalized index anchor.
    pub fn scrub_to(&mut self, percentage: f32) {
        let top = self.mapper().live_top(percentage);
        self.tracker.set_live_top(top);
        let index = self.grid_now().index_from_top(top);
        self.tracker.set_current_index(index.min(self.item_count.saturating_sub(1)));
        trace!(percentage, top, index, "scrubbed");
    }

    /// Resolves the visible window: which segments stay rendered, which
    /// items mount, and which fetches to (re-)issue.
    pub fn visible(&mut self) -> VisibleSet {
        self.drain_cache_events();

        let grid = self.base_grid();
        let (viewport_width, viewport_height) = self.tracker.main_size();
        let live_top = self.tracker.live_top();
        let ipr = self.config.items_per_request;
        let row_height = grid.row_height();

        let anchor = visible::resolve_current_index(&self.prev_layout, live_top, grid.margin, &grid)
            .min(self.item_count.saturating_sub(1));
        self.tracker.set_current_index(anchor);

        let num_segments = segments::num_segments(self.item_count, ipr);
        let anchor_segment = segments::segment_of(anchor, ipr);

        let cache = &self.cache;
        let item_count = self.item_count;
        let cols = grid.cols;
        let height_of = |segment: usize| match cache.loaded(segment) {
            Some(loaded) => loaded.height,
            None => segments::base_row_span(segment, ipr, cols, item_count) as f32 * row_height,
        };

        let ledger = &mut self.ledger;
        let to_render = visible::segments_to_render(
            anchor_segment,
            live_top,
            viewport_height,
            self.config.over_render,
            num_segments,
            |segment| ledger.top(segment, height_of),
        );

        let pack = PackParams {
            viewport_width,
            margin: grid.margin,
            tiling_threshold: cols,
        };

        let mut tiles = Vec::new();
        let mut segment_views = Vec::with_capacity(to_render.len());
        let mut anchors = Vec::new();

        for segment_index in to_render {
            let top = self.ledger.top(segment_index, height_of);
            let height = self.ledger.height(segment_index, height_of);
            drop(self.cache.request(segment_index, pack));
            let status = self.cache.status(segment_index);
            segment_views.push(SegmentView {
                index: segment_index,
                status,
                top,
                height,
            });

            let Some(loaded) = self.cache.loaded(segment_index) else {
                continue;
            };
            let range = visible::item_range_in_segment(
                segment_index,
                top - live_top,
                viewport_height,
                self.config.mount_band,
                ipr,
                cols,
                self.item_count,
                row_height,
            );
            for row in &loaded.rows {
                let mounted: Vec<&Tile> = row
                    .items
                    .iter()
                    .filter(|tile| range.contains(&tile.index))
                    .collect();
                if mounted.is_empty() {
                    continue;
                }
                anchors.push(RowAnchor {
                    top: top + mounted[0].top,
                    height: row.height,
                    index: mounted[0].index,
                });
                tiles.extend(mounted.into_iter().map(|tile| tile.offset_by(top)));
            }
        }

        self.prev_layout = anchors;

        VisibleSet {
            tiles,
            segments: segment_views,
            is_resizing: self.tracker.is_resizing(),
            scroll_percentage: self.scroll_percentage(),
        }
    }

    /// Normalized scroll position for the scrubber indicator.
    pub fn scroll_percentage(&self) -> f32 {
        self.mapper().percentage(self.tracker.live_top())
    }

    pub fn is_resizing(&self) -> bool {
        self.tracker.is_resizing()
    }

    pub fn current_index(&self) -> usize {
        self.tracker.current_index()
    }

    pub fn live_top(&self) -> f32 {
        self.tracker.live_top()
    }

    /// Indicator pixel position for a normalized track percentage.
    pub fn indicator_top(&self, percentage: f32) -> f32 {
        self.mapper().indicator_top(percentage)
    }

    /// Item index under a hover position on the scrubber track.
    pub fn indicator_index(&self, normalized: f32) -> usize {
        scrubber::indicator_index(normalized, self.item_count)
    }

    /// Index labels for the scrubber track.
    pub fn ticks(&self) -> Vec<usize> {
        scrubber::ticks(self.item_count)
    }

    /// Full pixel height of the list under current geometry.
    pub fn list_height(&self) -> f32 {
        self.grid_now().list_height(self.item_count)
    }

    pub fn cache(&self) -> &SegmentCache {
        &self.cache
    }

    fn mapper(&self) -> ScrubberMapper {
        let grid = self.grid_now();
        ScrubberMapper::new(
            grid.num_rows(self.item_count),
            grid.row_height(),
            self.tracker.main_size().1,
        )
    }

    fn grid_now(&self) -> BaseGrid {
        BaseGrid::new(self.tracker.main_size().0, self.config.margin)
    }

    /// Base geometry memoized per width epoch.
    fn base_grid(&mut self) -> BaseGrid {
        let epoch = self.tracker.width_epoch();
        match self.base {
            Some((cached_epoch, grid)) if cached_epoch == epoch => grid,
            _ => {
                let grid = self.grid_now();
                self.base = Some((epoch, grid));
                grid
            }
        }
    }

    fn drain_cache_events(&mut self) {
        for event in self.cache.poll_events() {
            match event {
                CacheEvent::Loaded { segment } => {
                    // Real height replaces the estimate: reprice the suffix.
                    self.ledger.truncate_from(segment);
                }
                CacheEvent::Failed { segment, error } => {
                    trace!(segment, %error, "segment fetch failed; will retry on demand");
                }
                CacheEvent::Invalidated { .. } => {
                    self.ledger.clear();
                }
            }
        }
    }
}
