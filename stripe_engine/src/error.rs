//! The unified error type returned by [`crate::engine::Engine`]'s public
//! methods. Per-component errors (see `request_queue::RequestError`,
//! `lru_cache::CacheError`) are narrower and get wrapped here at the
//! boundary the caller actually interacts with.

use snafu::{Backtrace, Snafu};

use crate::lru_cache::CacheError;
use crate::request_queue::RequestError;

/// The unified error type for the `stripe_engine` crate.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EngineError {
    /// An error surfaced from the request queue (timeout, circuit open,
    /// permanent upstream failure, or cancellation).
    #[snafu(display("request error: {source}"))]
    Request { source: RequestError },

    /// An error surfaced from a cache (currently only invalid arguments to
    /// `set`).
    #[snafu(display("cache error: {source}"))]
    Cache { source: CacheError },

    /// The requested facility has no units in the given year's payload.
    #[snafu(display("no data for facility {facility_id} in year {year}"))]
    NotFound { facility_id: String, year: i32 },

    /// A serialised payload in the year cache failed to decode.
    #[snafu(display("failed to deserialise cached year payload: {message}"))]
    Deserialize { message: String, backtrace: Backtrace },

    /// A freshly fetched payload's units disagree on year or data length.
    #[snafu(display("year {year} payload is internally inconsistent (mismatched year or series length across units)"))]
    InconsistentPayload { year: i32 },
}

impl From<RequestError> for EngineError {
    fn from(source: RequestError) -> Self {
        EngineError::Request { source }
    }
}

impl From<CacheError> for EngineError {
    fn from(source: CacheError) -> Self {
        EngineError::Cache { source }
    }
}
