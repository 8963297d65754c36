//! A single queued unit of work and its priority-band FIFO ordering.

use std::cmp::Ordering;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use super::error::RequestError;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, RequestError>> + Send>>;

/// The operation a [`super::RequestQueue`] entry runs. Re-invoked on every
/// retry attempt, so it must be safe to call more than once.
pub type Execute<T> = Arc<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// One submitted (and possibly re-enqueued) unit of work.
///
/// Lower `priority` runs first; ties break FIFO by `sequence`. Fresh
/// submissions get increasing non-negative sequence numbers; a retry is
/// re-enqueued at the front of its priority band by assigning it a
/// sequence far below zero, so it always beats fresh submissions at the
/// same priority while still FIFO-ordering among other retries.
pub struct RequestRecord<T> {
    pub id: u64,
    pub sequence: i64,
    pub label: Option<String>,
    pub priority: i32,
    pub created_at: Instant,
    pub attempt: u32,
    pub execute: Execute<T>,
}

impl<T> PartialEq for RequestRecord<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}
impl<T> Eq for RequestRecord<T> {}

impl<T> PartialOrd for RequestRecord<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for RequestRecord<T> {
    /// `BinaryHeap` is a max-heap, but we want the *lowest* priority number
    /// and the *earliest* sequence to come out first, so this ordering is
    /// inverted relative to the natural `(priority, sequence)` comparison.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}
