use std::sync::Arc;

use crate::models::{Segment, SegmentPayload, SegmentRow, Tile};

/// Computes pixel geometry for one fetched segment.
///
/// # Algorithm
/// 1. Each backend row gets a working width of `viewport_width` minus one
///    margin per item plus one trailing margin.
/// 2. Item width follows the backend's width fraction; height follows the
///    item's own aspect ratio, so a well-formed row shares one height.
/// 3. Rows stack vertically, one margin above each row; the row's governing
///    height is the tallest item in it.
///
/// Tile tops are segment-relative; the caller offsets them by the segment's
/// position in the full list. `first_index` is the global index of the
/// segment's first item.
pub fn pack_segment(
    segment_index: usize,
    first_index: usize,
    payload: &SegmentPayload,
    viewport_width: f32,
    margin: f32,
) -> Segment {
    let mut rows = Vec::with_capacity(payload.rows.len());
    let mut top = 0.0f32;
    let mut index = first_index;

    for hints in &payload.rows {
        if hints.is_empty() {
            continue;
        }
        top += margin;
        let working = (viewport_width - (hints.len() as f32 + 1.0) * margin).max(0.0);
        let mut left = 0.0f32;
        let mut row_height = 0.0f32;
        let mut items = Vec::with_capacity(hints.len());

        for hint in hints {
            left += margin;
            let width = (working * hint.percent_width.max(0.0)).max(0.0);
            let height = width / hint.safe_aspect_ratio();
            items.push(Tile {
                index,
                top,
                left,
                width,
                height,
                sample: Arc::new(hint.sample.clone()),
            });
            left += width;
            row_height = row_height.max(height);
            index += 1;
        }

        top += row_height;
        rows.push(SegmentRow {
            height: row_height,
            items,
        });
    }

    Segment {
        index: segment_index,
        rows,
        height: top,
        item_count: index - first_index,
    }
}
