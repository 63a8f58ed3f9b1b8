//! Scrubber (minimap) mapping between track position and scroll offset.

/// Bidirectional percentage <-> scroll-offset mapping for a drag-to-scroll
/// scrubber. Forward and inverse are exact inverses over the scroll range;
/// every division site guards the degenerate short-content case.
#[derive(Debug, Clone, Copy)]
pub struct ScrubberMapper {
    num_rows: usize,
    row_height: f32,
    viewport_height: f32,
}

impl ScrubberMapper {
    pub fn new(num_rows: usize, row_height: f32, viewport_height: f32) -> Self {
        Self {
            num_rows,
            row_height,
            viewport_height,
        }
    }

    fn scroll_range(&self) -> f32 {
        self.num_rows as f32 * self.row_height - self.viewport_height
    }

    /// Scroll offset for a normalized track position.
    pub fn live_top(&self, percentage: f32) -> f32 {
        let range = self.scroll_range();
        if range <= 0.0 {
            return 0.0;
        }
        (percentage.clamp(0.0, 1.0) * range).clamp(0.0, range)
    }

    /// Normalized track position for a scroll offset; 0 when content is
    /// shorter than the viewport.
    pub fn percentage(&self, live_top: f32) -> f32 {
        let range = self.scroll_range();
        if range <= 0.0 {
            return 0.0;
        }
        (live_top / range).clamp(0.0, 1.0)
    }

    /// Pixel position of the scrubber indicator for a percentage.
    ///
    /// A cosmetic clamp to `[32, viewport_height - 3]`, distinct from the
    /// scroll-range clamp: the indicator never covers the track's end caps.
    pub fn indicator_top(&self, percentage: f32) -> f32 {
        let vh = self.viewport_height;
        let raw = percentage * (vh - 35.0) + 32.0;
        raw.clamp(32.0, (vh - 3.0).max(32.0))
    }
}

/// Item index under a hover position on the scrubber track.
///
/// `normalized` is the pointer's vertical position within the track,
/// pre-clamped to `[0, 1]` by the input layer.
pub fn indicator_index(normalized: f32, item_count: usize) -> usize {
    if item_count == 0 {
        return 0;
    }
    let last = item_count - 1;
    ((normalized.clamp(0.0, 1.0) * last as f32) as usize).min(last)
}

/// Index labels for the scrubber track: one tick per power-of-ten bucket
/// sized to the collection.
pub fn ticks(item_count: usize) -> Vec<usize> {
    let mut num_ticks = 0usize;
    let mut tick_size = 1usize;
    for i in 0..6u32 {
        let breakpoint = 10usize.pow(i + 2);
        tick_size = 10usize.pow(i + 1);
        num_ticks = item_count.div_ceil(tick_size);
        if item_count < breakpoint {
            break;
        }
    }
    (0..num_ticks).map(|i| i * tick_size).collect()
}
