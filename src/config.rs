use std::time::Duration;

/// Tuning knobs for the grid engine.
///
/// The defaults match the production layout: 20-item fetch segments, a 5px
/// grid margin, and a one second resize debounce window.
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Number of items fetched from the backend per segment request.
    pub items_per_request: usize,
    /// Gap between tiles and around the grid edges, in pixels.
    pub margin: f32,
    /// How long after the last width change the viewport counts as resizing.
    pub resize_debounce: Duration,
    /// Fraction of the viewport height rendered beyond the anchor segment.
    pub over_render: f32,
    /// Half-width of the item mount band, in viewport heights.
    pub mount_band: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            items_per_request: 20,
            margin: 5.0,
            resize_debounce: Duration::from_millis(1000),
            over_render: 1.3,
            mount_band: 1.5,
        }
    }
}
