//! Lazily-populated segment cache.
//!
//! - Segments are fetched at most once per key; concurrent requests share
//!   the in-flight future instead of issuing a duplicate fetch
//! - Results are packed with the geometry captured at request time and
//!   committed only if the cache epoch still matches
//! - Failed fetches revert to unrequested so the next visibility pass retries
//! - Completions are announced over a flume channel drained by the engine

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::error::FetchError;
use crate::layout::tiler;
use crate::models::{Segment, SegmentPayload, SegmentStatus};

/// Page parameters forwarded to the data backend with every segment request.
#[derive(Debug, Clone, Copy)]
pub struct PageParams {
    pub items_per_request: usize,
    /// Current base column count; the backend groups rows against it.
    pub tiling_threshold: usize,
}

/// Geometry captured when a request starts, used to pack the reply.
#[derive(Debug, Clone, Copy)]
pub struct PackParams {
    pub viewport_width: f32,
    pub margin: f32,
    pub tiling_threshold: usize,
}

/// Asynchronous data backend for segment pages.
pub trait SegmentFetcher: Send + Sync + 'static {
    fn fetch_segment(
        &self,
        segment_index: usize,
        params: PageParams,
    ) -> BoxFuture<'static, Result<SegmentPayload, FetchError>>;
}

/// Shared handle to an in-flight or completed segment load.
pub type SegmentFuture = Shared<BoxFuture<'static, Result<Arc<Segment>, FetchError>>>;

/// Notifications emitted as fetches settle.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    Loaded { segment: usize },
    Failed { segment: usize, error: FetchError },
    Invalidated { epoch: u64 },
}

enum SegmentEntry {
    Pending { future: SegmentFuture, epoch: u64 },
    Loaded { segment: Arc<Segment>, epoch: u64 },
}

struct CacheInner {
    entries: HashMap<usize, SegmentEntry>,
    epoch: u64,
}

/// Append-only (between invalidations) store of fetched segment layouts.
pub struct SegmentCache {
    inner: Arc<RwLock<CacheInner>>,
    fetcher: Arc<dyn SegmentFetcher>,
    items_per_request: usize,
    events_tx: flume::Sender<CacheEvent>,
    events_rx: flume::Receiver<CacheEvent>,
}

impl SegmentCache {
    pub fn new(fetcher: Arc<dyn SegmentFetcher>, items_per_request: usize) -> Self {
        let (events_tx, events_rx) = flume::unbounded();
        Self {
            inner: Arc::new(RwLock::new(CacheInner {
                entries: HashMap::new(),
                epoch: 0,
            })),
            fetcher,
            items_per_request,
            events_tx,
            events_rx,
        }
    }

    /// Requests a segment, coalescing with any in-flight fetch for the key.
    ///
    /// Returns a shared future that resolves to the packed segment. A driver
    /// task is spawned on creation, so the fetch proceeds whether or not the
    /// caller awaits. Must be called within a tokio runtime.
    pub fn request(&self, segment_index: usize, pack: PackParams) -> SegmentFuture {
        let mut inner = self.inner.write();
        match inner.entries.get(&segment_index) {
            Some(SegmentEntry::Loaded { segment, .. }) => {
                let segment = Arc::clone(segment);
                return futures::future::ready(Ok(segment)).boxed().shared();
            }
            Some(SegmentEntry::Pending { future, .. }) => {
                trace!(segment_index, "joining in-flight segment fetch");
                return future.clone();
            }
            None => {}
        }

        let epoch = inner.epoch;
        let fetch = self.fetcher.fetch_segment(
            segment_index,
            PageParams {
                items_per_request: self.items_per_request,
                tiling_threshold: pack.tiling_threshold,
            },
        );
        let shared_inner = Arc::clone(&self.inner);
        let events = self.events_tx.clone();
        let first_index = segment_index * self.items_per_request;

        let future: SegmentFuture = async move {
            match fetch.await {
                Ok(payload) => {
                    let packed = Arc::new(tiler::pack_segment(
                        segment_index,
                        first_index,
                        &payload,
                        pack.viewport_width,
                        pack.margin,
                    ));
                    let mut inner = shared_inner.write();
                    if inner.epoch != epoch {
                        let current = inner.epoch;
                        drop(inner);
                        debug!(segment_index, epoch, current, "discarding stale segment");
                        return Err(FetchError::Stale {
                            segment: segment_index,
                            epoch: current,
                        });
                    }
                    inner.entries.insert(
                        segment_index,
                        SegmentEntry::Loaded {
                            segment: Arc::clone(&packed),
                            epoch,
                        },
                    );
                    drop(inner);
                    trace!(segment_index, "segment loaded");
                    let _ = events.send(CacheEvent::Loaded {
                        segment: segment_index,
                    });
                    Ok(packed)
                }
                Err(error) => {
                    let mut inner = shared_inner.write();
                    if inner.epoch == epoch {
                        // Revert to unrequested so a later pass can retry.
                        if matches!(
                            inner.entries.get(&segment_index),
                            Some(SegmentEntry::Pending { epoch: e, .. }) if *e == epoch
                        ) {
                            inner.entries.remove(&segment_index);
                        }
                    }
                    drop(inner);
                    warn!(segment_index, %error, "segment fetch failed");
                    let _ = events.send(CacheEvent::Failed {
                        segment: segment_index,
                        error: error.clone(),
                    });
                    Err(error)
                }
            }
        }
        .boxed()
        .shared();

        inner.entries.insert(
            segment_index,
            SegmentEntry::Pending {
                future: future.clone(),
                epoch,
            },
        );
        drop(inner);

        // Drive the fetch even when the caller drops the handle.
        tokio::spawn(future.clone());
        future
    }

    /// Clears every entry and bumps the epoch; in-flight results are
    /// discarded when they try to commit.
    pub fn invalidate_all(&self) {
        let epoch = {
            let mut inner = self.inner.write();
            inner.epoch += 1;
            inner.entries.clear();
            inner.epoch
        };
        debug!(epoch, "segment cache invalidated");
        let _ = self.events_tx.send(CacheEvent::Invalidated { epoch });
    }

    pub fn status(&self, segment_index: usize) -> SegmentStatus {
        match self.inner.read().entries.get(&segment_index) {
            None => SegmentStatus::Unrequested,
            Some(SegmentEntry::Pending { .. }) => SegmentStatus::Pending,
            Some(SegmentEntry::Loaded { .. }) => SegmentStatus::Loaded,
        }
    }

    /// The packed segment, if loaded.
    pub fn loaded(&self, segment_index: usize) -> Option<Arc<Segment>> {
        match self.inner.read().entries.get(&segment_index) {
            Some(SegmentEntry::Loaded { segment, .. }) => Some(Arc::clone(segment)),
            _ => None,
        }
    }

    /// An item is loaded when its owning segment is.
    pub fn item_is_loaded(&self, item_index: usize) -> bool {
        let segment = crate::layout::segments::segment_of(item_index, self.items_per_request);
        self.status(segment) == SegmentStatus::Loaded
    }

    /// Drains pending notifications without blocking.
    pub fn poll_events(&self) -> Vec<CacheEvent> {
        self.events_rx.try_iter().collect()
    }

    pub fn epoch(&self) -> u64 {
        self.inner.read().epoch
    }

    pub fn loaded_count(&self) -> usize {
        self.inner
            .read()
            .entries
            .values()
            .filter(|e| matches!(e, SegmentEntry::Loaded { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TileHint;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fetcher producing uniform square rows, counting every backend call.
    struct CountingFetcher {
        calls: AtomicUsize,
        fail_first: AtomicUsize,
        delay: Duration,
    }

    impl CountingFetcher {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        fn failing_first(count: usize) -> Self {
            Self {
                fail_first: AtomicUsize::new(count),
                ..Self::new()
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn uniform_payload(items: usize, per_row: usize) -> SegmentPayload {
        let hints: Vec<TileHint> = (0..items)
            .map(|_| TileHint {
                percent_width: 1.0 / per_row as f32,
                aspect_ratio: 1.0,
                sample: json!({}),
            })
            .collect();
        SegmentPayload {
            rows: hints.chunks(per_row).map(|c| c.to_vec()).collect(),
        }
    }

    impl SegmentFetcher for CountingFetcher {
        fn fetch_segment(
            &self,
            segment_index: usize,
            params: PageParams,
        ) -> BoxFuture<'static, Result<SegmentPayload, FetchError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            let delay = self.delay;
            let payload = uniform_payload(params.items_per_request, params.tiling_threshold);
            async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if fail {
                    Err(FetchError::Backend {
                        segment: segment_index,
                        message: "backend unavailable".into(),
                    })
                } else {
                    Ok(payload)
                }
            }
            .boxed()
        }
    }

    fn pack() -> PackParams {
        PackParams {
            viewport_width: 1000.0,
            margin: 5.0,
            tiling_threshold: 5,
        }
    }

    #[tokio::test]
    async fn test_concurrent_requests_coalesce() {
        let fetcher = Arc::new(CountingFetcher::slow(Duration::from_millis(5)));
        let cache = SegmentCache::new(Arc::clone(&fetcher) as Arc<dyn SegmentFetcher>, 20);

        let a = cache.request(0, pack());
        let b = cache.request(0, pack());
        assert_eq!(cache.status(0), SegmentStatus::Pending);

        let (ra, rb) = tokio::join!(a, b);
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(ra.unwrap().item_count, 20);
        assert_eq!(rb.unwrap().item_count, 20);
        assert_eq!(cache.status(0), SegmentStatus::Loaded);
    }

    #[tokio::test]
    async fn test_loaded_request_returns_ready() {
        let fetcher = Arc::new(CountingFetcher::new());
        let cache = SegmentCache::new(Arc::clone(&fetcher) as Arc<dyn SegmentFetcher>, 20);

        cache.request(3, pack()).await.unwrap();
        let again = cache.request(3, pack()).await.unwrap();
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(again.index, 3);
        assert!(cache.item_is_loaded(65));
        assert!(!cache.item_is_loaded(85));
    }

    #[tokio::test]
    async fn test_failure_reverts_then_retries() {
        let fetcher = Arc::new(CountingFetcher::failing_first(1));
        let cache = SegmentCache::new(Arc::clone(&fetcher) as Arc<dyn SegmentFetcher>, 20);

        let err = cache.request(0, pack()).await.unwrap_err();
        assert!(matches!(err, FetchError::Backend { segment: 0, .. }));
        // Failure is not cached as success: the slot reopens.
        assert_eq!(cache.status(0), SegmentStatus::Unrequested);

        let segment = cache.request(0, pack()).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(segment.item_count, 20);

        let events = cache.poll_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, CacheEvent::Failed { segment: 0, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, CacheEvent::Loaded { segment: 0 })));
    }

    #[tokio::test]
    async fn test_invalidation_discards_inflight_result() {
        let fetcher = Arc::new(CountingFetcher::slow(Duration::from_millis(20)));
        let cache = SegmentCache::new(Arc::clone(&fetcher) as Arc<dyn SegmentFetcher>, 20);

        let inflight = cache.request(0, pack());
        cache.invalidate_all();

        let err = inflight.await.unwrap_err();
        assert!(matches!(err, FetchError::Stale { segment: 0, .. }));
        assert_eq!(cache.status(0), SegmentStatus::Unrequested);
        assert_eq!(cache.loaded_count(), 0);
        assert_eq!(cache.epoch(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_clears_loaded_entries() {
        let fetcher = Arc::new(CountingFetcher::new());
        let cache = SegmentCache::new(Arc::clone(&fetcher) as Arc<dyn SegmentFetcher>, 20);

        cache.request(0, pack()).await.unwrap();
        cache.request(1, pack()).await.unwrap();
        assert_eq!(cache.loaded_count(), 2);

        cache.invalidate_all();
        assert_eq!(cache.loaded_count(), 0);
        assert_eq!(cache.status(0), SegmentStatus::Unrequested);

        // A fresh request fetches again under the new epoch.
        cache.request(0, pack()).await.unwrap();
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_packed_geometry_uses_request_width() {
        let fetcher = Arc::new(CountingFetcher::new());
        let cache = SegmentCache::new(Arc::clone(&fetcher) as Arc<dyn SegmentFetcher>, 20);

        let segment = cache.request(0, pack()).await.unwrap();
        // 5 columns, margin 5: four rows of 194px squares, 199px stride.
        assert_eq!(segment.rows.len(), 4);
        let tile = &segment.rows[0].items[0];
        assert!((tile.width - 194.0).abs() < 0.01);
        assert!((segment.height - 4.0 * 199.0).abs() < 0.01);
    }
}
