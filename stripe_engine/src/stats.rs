//! Aggregated, point-in-time view over every component's internal state,
//! exposed to hosts that want to render a debug overlay or export metrics.

use crate::lru_cache::CacheStats;
use crate::navigator::NavigatorStats;
use crate::request_queue::QueueStats;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineStats {
    pub year_queue: QueueStats,
    pub year_cache: CacheStats,
    pub tile_cache: CacheStats,
    pub navigator: NavigatorStats,
}
