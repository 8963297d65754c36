//! `LruCache<RenderedTile>` keyed by `(facility, year)`, rendering on miss.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{broadcast, Mutex as AsyncMutex};

use crate::config::RenderingConfig;
use crate::error::{EngineError, NotFoundSnafu};
use crate::lru_cache::LruCache;
use crate::year_vendor::YearVendor;

use super::{facility_year_tile, RenderedTile, TileKey};

type TileOutcome = Result<Arc<RenderedTile>, Arc<EngineError>>;

struct State {
    cache: LruCache<TileKey, Arc<RenderedTile>>,
    in_flight: HashMap<String, broadcast::Sender<TileOutcome>>,
}

/// Owns the rendered-tile cache. Rendering for distinct keys may overlap;
/// rendering for the same key is deduplicated by label. Errors are
/// `Arc`-wrapped because a render outcome fans out to every caller waiting
/// on the same key, not just the one that triggered it.
pub struct TileCache {
    state: AsyncMutex<State>,
    vendor: Arc<YearVendor>,
    rendering: RenderingConfig,
    short_labels: bool,
}

impl TileCache {
    pub fn new(capacity: usize, vendor: Arc<YearVendor>, rendering: RenderingConfig, short_labels: bool) -> Self {
        Self {
            state: AsyncMutex::new(State {
                cache: LruCache::new(capacity),
                in_flight: HashMap::new(),
            }),
            vendor,
            rendering,
            short_labels,
        }
    }

    pub async fn get_tile(&self, key: TileKey, year_priority: i32) -> TileOutcome {
        let label = format!("tile:{}:{}", key.facility_id, key.year);

        enum Lead {
            Owner,
            Follower(broadcast::Receiver<TileOutcome>),
        }

        let lead = {
            let mut state = self.state.lock().await;
            if let Some(tile) = state.cache.get(&key) {
                return Ok(tile.clone());
            }
            if let Some(tx) = state.in_flight.get(&label) {
                Lead::Follower(tx.subscribe())
            } else {
                let (tx, _rx) = broadcast::channel(1);
                state.in_flight.insert(label.clone(), tx);
                Lead::Owner
            }
        };

        match lead {
            Lead::Owner => self.render_and_cache(key, label, year_priority).await,
            Lead::Follower(mut rx) => match rx.recv().await {
                Ok(outcome) => outcome,
                Err(_) => Err(Arc::new(EngineError::from(crate::request_queue::RequestError::Cancelled))),
            },
        }
    }

    async fn render_and_cache(&self, key: TileKey, label: String, year_priority: i32) -> TileOutcome {
        let outcome: TileOutcome = self.render_one(&key, year_priority).await.map_err(Arc::new);

        let mut state = self.state.lock().await;
        if let Some(tx) = state.in_flight.remove(&label) {
            let _ = tx.send(outcome.clone());
        }
        if let Ok(tile) = &outcome {
            let size_bytes = tile.size_bytes() as i64;
            // Byte accounting is infallible here: size_bytes is always
            // non-negative, so the only error `set` can return never fires.
            let _ = state.cache.set(key, tile.clone(), size_bytes, Some(label), None);
        }
        outcome
    }

    async fn render_one(&self, key: &TileKey, year_priority: i32) -> Result<Arc<RenderedTile>, EngineError> {
        let payload = self.vendor.request_year(key.year, year_priority).await?;
        let units: Vec<_> = payload.units_for_facility(&key.facility_id).cloned().collect();
        if units.is_empty() {
            return NotFoundSnafu {
                facility_id: key.facility_id.clone(),
                year: key.year,
            }
            .fail();
        }
        let tile = facility_year_tile::render(
            &key.facility_id,
            key.year,
            &units,
            &self.rendering,
            self.short_labels,
            SystemTime::now(),
        );
        Ok(Arc::new(tile))
    }

    pub async fn stats(&self) -> crate::lru_cache::CacheStats {
        self.state.lock().await.cache.stats()
    }
}
