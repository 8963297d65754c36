//! Outbound request mediation: priority queue, concurrency cap, rate-limit
//! spacing, retry/backoff, a circuit breaker, and label-based dedup.

mod breaker;
mod error;
mod queue;
mod record;

pub use error::RequestError;
pub use queue::{QueueStats, RequestQueue, SubmitRequest};
pub use record::{BoxFuture, Execute};
