//! Segment index math.
//!
//! Segments are a fetch-granularity concept layered on top of a continuous
//! row packing: row assignment never resets at a segment boundary, so a
//! segment's leading items may complete a row that started in the previous
//! segment. Rows are attributed to the segment in which they begin.

/// Segment owning item `item_index`.
pub fn segment_of(item_index: usize, items_per_request: usize) -> usize {
    item_index / items_per_request
}

/// Offset of item `item_index` within its segment.
pub fn key_within(item_index: usize, items_per_request: usize) -> usize {
    item_index % items_per_request
}

/// Total number of segments for a dataset of `item_count` items.
pub fn num_segments(item_count: usize, items_per_request: usize) -> usize {
    item_count.div_ceil(items_per_request)
}

/// First base row attributed to `segment`: the carried partial row, if any,
/// belongs to the previous segment.
pub fn leading_row(segment: usize, items_per_request: usize, cols: usize) -> usize {
    if cols == 0 {
        return 0;
    }
    (segment * items_per_request).div_ceil(cols)
}

/// Signed base row of `item_index` relative to its segment's leading row.
///
/// Items carried into the previous segment's trailing row land at row -1.
pub fn row_within_segment(item_index: usize, items_per_request: usize, cols: usize) -> i64 {
    if cols == 0 {
        return 0;
    }
    let segment = segment_of(item_index, items_per_request);
    (item_index / cols) as i64 - leading_row(segment, items_per_request, cols) as i64
}

/// Number of base rows attributed to `segment`, bounded by the dataset size.
pub fn base_row_span(
    segment: usize,
    items_per_request: usize,
    cols: usize,
    item_count: usize,
) -> usize {
    if cols == 0 {
        return 0;
    }
    let start = segment * items_per_request;
    let end = (start + items_per_request).min(item_count);
    if end <= start {
        return 0;
    }
    end.div_ceil(cols) - start.div_ceil(cols)
}

/// Memoized prefix sum of segment tops.
///
/// Extends monotonically as segments are visited; a lookup never recomputes
/// heights below the last known prefix. When a segment's real height commits
/// (or its geometry is invalidated) the memo is truncated from that segment
/// so later tops re-derive against the new height.
#[derive(Debug, Default)]
pub struct SegmentLedger {
    tops: Vec<f32>,
    heights: Vec<f32>,
}

impl SegmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pixel top of `segment`, extending the prefix with `height_of` as needed.
    pub fn top(&mut self, segment: usize, mut height_of: impl FnMut(usize) -> f32) -> f32 {
        while self.heights.len() < segment {
            let next = self.heights.len();
            let h = height_of(next);
            self.push(h);
        }
        if segment == 0 {
            return 0.0;
        }
        self.tops[segment - 1] + self.heights[segment - 1]
    }

    /// Pixel height of `segment`, memoizing it into the prefix.
    pub fn height(&mut self, segment: usize, mut height_of: impl FnMut(usize) -> f32) -> f32 {
        while self.heights.len() <= segment {
            let next = self.heights.len();
            let h = height_of(next);
            self.push(h);
        }
        self.heights[segment]
    }

    fn push(&mut self, height: f32) {
        let top = match self.tops.last() {
            Some(last_top) => *last_top + self.heights[self.tops.len() - 1],
            None => 0.0,
        };
        self.tops.push(top);
        self.heights.push(height);
    }

    /// Drop memoized geometry at and beyond `segment` after its height changed.
    pub fn truncate_from(&mut self, segment: usize) {
        self.tops.truncate(segment);
        self.heights.truncate(segment);
    }

    /// Forget everything; used on width change and dataset reset.
    pub fn clear(&mut self) {
        self.tops.clear();
        self.heights.clear();
    }

    pub fn known_len(&self) -> usize {
        self.heights.len()
    }
}
