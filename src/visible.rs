//! Two-level visibility windowing.
//!
//! Fetching is coarse (whole segments, amortizing request overhead) while
//! mounting is fine (an item band around the viewport, bounding paint cost).

use std::ops::Range;

use crate::layout::grid::BaseGrid;
use crate::layout::segments::row_within_segment;

/// One row of the last computed layout, used to anchor the current index.
#[derive(Debug, Clone, Copy)]
pub struct RowAnchor {
    pub top: f32,
    pub height: f32,
    /// Global index of the row's first item.
    pub index: usize,
}

/// Resolves the anchor item index for a scroll offset.
///
/// Scans the previous layout for the row bracketing `live_top`; whenever the
/// known rows do not bracket it (fast scroll, scrubber jump) or the scan
/// falls through a gap, the direct base-geometry computation answers instead.
/// Total over all inputs.
pub fn resolve_current_index(
    prev_layout: &[RowAnchor],
    live_top: f32,
    margin: f32,
    grid: &BaseGrid,
) -> usize {
    if let (Some(first), Some(last)) = (prev_layout.first(), prev_layout.last()) {
        let within = first.top <= live_top && live_top <= last.top + last.height + margin;
        if within {
            for row in prev_layout {
                let start = row.top;
                let stop = row.top + row.height + margin;
                if start <= live_top && live_top <= stop {
                    return row.index;
                }
            }
        }
    }
    grid.index_from_top(live_top)
}

/// Collects the ordered segments to keep rendered for a scroll position.
///
/// Walks forward from the anchor segment while each segment's top is still
/// within `over_render` viewport heights of the scroll offset.
pub fn segments_to_render(
    anchor_segment: usize,
    live_top: f32,
    viewport_height: f32,
    over_render: f32,
    num_segments: usize,
    mut top_of: impl FnMut(usize) -> f32,
) -> Vec<usize> {
    let budget = viewport_height * over_render;
    let mut out = Vec::new();
    let mut segment = anchor_segment;
    while segment < num_segments {
        if top_of(segment) - live_top >= budget {
            break;
        }
        out.push(segment);
        segment += 1;
    }
    out
}

/// Narrows a fetched segment to the item subrange worth mounting.
///
/// `rel_top` is the segment's top relative to the viewport
/// (`segment_top - live_top`). Items whose base row offset leaves the
/// `mount_band` viewport-height band are dropped even though their segment
/// is fetched. Returns a global index range.
pub fn item_range_in_segment(
    segment: usize,
    rel_top: f32,
    viewport_height: f32,
    mount_band: f32,
    items_per_request: usize,
    cols: usize,
    item_count: usize,
    row_height: f32,
) -> Range<usize> {
    let seg_start = segment * items_per_request;
    let seg_len = items_per_request.min(item_count.saturating_sub(seg_start));
    let band = mount_band * viewport_height;

    let mut start = 0usize;
    let mut end = seg_len;
    for k in 0..seg_len {
        let row = row_within_segment(seg_start + k, items_per_request, cols);
        let offset = rel_top + row as f32 * row_height;
        if offset < -band {
            start = k + 1;
        } else if offset > band {
            end = k;
            break;
        }
    }

    seg_start + start..seg_start + end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> BaseGrid {
        // 1000px viewport, 5px margin: 5 columns of 194px, 199px row stride.
        BaseGrid::new(1000.0, 5.0)
    }

    #[test]
    fn test_resolve_without_layout_falls_back() {
        let g = grid();
        let rh = g.row_height();
        assert_eq!(resolve_current_index(&[], 0.0, 5.0, &g), 0);
        assert_eq!(resolve_current_index(&[], rh * 4.0 + 1.0, 5.0, &g), 20);
    }

    #[test]
    fn test_resolve_scans_known_rows() {
        let g = grid();
        let prev = vec![
            RowAnchor { top: 0.0, height: 194.0, index: 0 },
            RowAnchor { top: 199.0, height: 194.0, index: 5 },
            RowAnchor { top: 398.0, height: 194.0, index: 10 },
        ];
        assert_eq!(resolve_current_index(&prev, 100.0, 5.0, &g), 0);
        assert_eq!(resolve_current_index(&prev, 250.0, 5.0, &g), 5);
        assert_eq!(resolve_current_index(&prev, 400.0, 5.0, &g), 10);
    }

    #[test]
    fn test_resolve_jump_outside_layout() {
        let g = grid();
        let rh = g.row_height();
        let prev = vec![RowAnchor { top: 0.0, height: 194.0, index: 0 }];
        // Scrubber jump far past the known rows: direct computation answers.
        let jump = rh * 100.0 + 10.0;
        assert_eq!(resolve_current_index(&prev, jump, 5.0, &g), 500);
    }

    #[test]
    fn test_segments_walk_covers_over_render_budget() {
        // Base heights of 796px against a 1.3 x 800 = 1040px budget.
        let tops = [0.0f32, 796.0, 1592.0, 2388.0];
        let picked = segments_to_render(0, 0.0, 800.0, 1.3, 4, |s| tops[s]);
        assert_eq!(picked, vec![0, 1]);
    }

    #[test]
    fn test_segments_walk_from_scrolled_anchor() {
        let tops = [0.0f32, 796.0, 1592.0, 2388.0, 3184.0];
        let picked = segments_to_render(1, 900.0, 800.0, 1.3, 5, |s| tops[s]);
        assert_eq!(picked, vec![1, 2]);
    }

    #[test]
    fn test_segments_walk_degenerate_viewport() {
        let picked = segments_to_render(0, 0.0, 0.0, 1.3, 3, |_| 0.0);
        assert!(picked.is_empty());
    }

    #[test]
    fn test_item_band_keeps_leading_segment_whole() {
        // Segment 0 at the top of the list: every row is inside the band.
        let range = item_range_in_segment(0, 0.0, 800.0, 1.5, 20, 5, 100, 199.0);
        assert_eq!(range, 0..20);
    }

    #[test]
    fn test_item_band_trims_far_rows() {
        // Segment 1 sits 796px down; its row 3 (796 + 597 = 1393px) leaves
        // the 1200px band, dropping items 35..39 from the mount set.
        let range = item_range_in_segment(1, 796.0, 800.0, 1.5, 20, 5, 100, 199.0);
        assert_eq!(range, 20..35);
    }

    #[test]
    fn test_item_band_trims_rows_above() {
        // A segment scrolled far above the viewport keeps only its tail.
        let range = item_range_in_segment(0, -1500.0, 800.0, 1.5, 20, 5, 100, 199.0);
        // Rows 0 (-1500) and 1 (-1301) are below -1200; rows 2 and 3 stay.
        assert_eq!(range, 10..20);
    }

    #[test]
    fn test_item_band_short_final_segment() {
        let range = item_range_in_segment(2, 0.0, 800.0, 1.5, 20, 5, 47, 199.0);
        assert_eq!(range, 40..47);
    }
}
