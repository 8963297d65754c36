//! Owner of the year-keyed payload cache; the only component that talks to
//! the request queue.

mod aggregation;

pub use aggregation::{facility_mean, facility_mean_across, mean_from_parts, region_mean};

use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::Mutex as AsyncMutex;

use crate::error::{DeserializeSnafu, EngineError, InconsistentPayloadSnafu};
use crate::lru_cache::LruCache;
use crate::models::YearPayload;
use crate::request_queue::{BoxFuture, RequestQueue, SubmitRequest};

/// Priority bands for year fetches. Lower value dispatches first.
pub const PRIORITY_VISIBLE: i32 = 0;
pub const PRIORITY_NEIGHBOUR: i32 = 1;
pub const PRIORITY_BACKGROUND: i32 = 2;

/// Classifies a requested year's priority relative to the year currently on
/// screen: the visible year itself is highest priority, its immediate
/// neighbours are next, everything else is background.
pub fn priority_for_year(year: i32, visible_year: i32) -> i32 {
    match (year - visible_year).abs() {
        0 => PRIORITY_VISIBLE,
        1 => PRIORITY_NEIGHBOUR,
        _ => PRIORITY_BACKGROUND,
    }
}

/// The upstream collaborator contract: a single call returning a complete
/// annual payload. Out of scope here is how it's transported; this engine
/// assumes nothing beyond the signature.
pub trait YearSource: Send + Sync + 'static {
    fn fetch_year(&self, year: i32) -> BoxFuture<YearPayload>;
}

/// Owns `LruCache<serialised YearPayload>`; serialises and deserialises on
/// the cache boundary so the byte-size accounting reflects what's actually
/// resident.
pub struct YearVendor {
    cache: AsyncMutex<LruCache<i32, Vec<u8>>>,
    queue: Arc<RequestQueue<YearPayload>>,
    source: Arc<dyn YearSource>,
}

impl YearVendor {
    pub fn new(capacity_years: usize, queue: Arc<RequestQueue<YearPayload>>, source: Arc<dyn YearSource>) -> Self {
        Self {
            cache: AsyncMutex::new(LruCache::new(capacity_years)),
            queue,
            source,
        }
    }

    /// Returns the payload for `year`, fetching through the queue on a
    /// cache miss. `priority` should come from [`priority_for_year`].
    pub async fn request_year(&self, year: i32, priority: i32) -> Result<Arc<YearPayload>, EngineError> {
        {
            let mut cache = self.cache.lock().await;
            if let Some(bytes) = cache.get(&year) {
                let (payload, _) = bincode::serde::decode_from_slice::<YearPayload, _>(
                    bytes,
                    bincode::config::standard(),
                )
                .map_err(|e| e.to_string())
                .or_else(|message| DeserializeSnafu { message }.fail())?;
                return Ok(Arc::new(payload));
            }
        }

        let source = self.source.clone();
        let payload = self
            .queue
            .submit(SubmitRequest {
                priority,
                label: Some(format!("year:{year}")),
                execute: Arc::new(move || source.fetch_year(year)),
            })
            .await?;

        if !payload.is_internally_consistent() {
            return InconsistentPayloadSnafu { year }.fail();
        }

        let bytes = bincode::serde::encode_to_vec(&payload, bincode::config::standard())
            .map_err(|e| e.to_string())
            .or_else(|message| DeserializeSnafu { message }.fail())?;
        let size_bytes = bytes.len() as i64;
        {
            let mut cache = self.cache.lock().await;
            cache
                .set(year, bytes, size_bytes, Some(format!("year:{year}")), None)
                .map_err(EngineError::from)?;
        }

        Ok(Arc::new(payload))
    }

    pub async fn stats(&self) -> crate::lru_cache::CacheStats {
        self.cache.lock().await.stats()
    }
}

/// `created_at` stamp for freshly assembled payloads. Kept as a thin
/// wrapper so tests can substitute a fixed instant without threading a
/// clock through every collaborator call.
pub fn now() -> SystemTime {
    SystemTime::now()
}
