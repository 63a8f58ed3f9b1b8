use thiserror::Error;

/// Failure modes of an asynchronous segment fetch.
///
/// The error is `Clone` because a coalesced in-flight fetch may have any
/// number of waiters, all of which observe the same outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The data backend rejected the page request.
    ///
    /// The cache entry reverts to unrequested; the next visibility pass
    /// issues a fresh fetch.
    #[error("segment {segment} fetch failed: {message}")]
    Backend { segment: usize, message: String },

    /// The fetch completed after a viewport-width change or dataset reset
    /// invalidated its geometry. The result was discarded, not applied.
    #[error("segment {segment} result discarded by epoch {epoch}")]
    Stale { segment: usize, epoch: u64 },
}

impl FetchError {
    /// Segment index the failed request was for.
    pub fn segment(&self) -> usize {
        match self {
            Self::Backend { segment, .. } | Self::Stale { segment, .. } => *segment,
        }
    }
}
