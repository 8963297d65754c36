//! The public facade: wires the request queue, year vendor, tile cache,
//! compositor, and navigator into one object a host can drive frame by
//! frame.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use crate::config::Config;
use crate::datekit::CalendarDay;
use crate::error::EngineError;
use crate::models::YearPayload;
use crate::navigator::{KeyCommand, Navigator};
use crate::request_queue::RequestQueue;
use crate::stats::EngineStats;
use crate::tile::{RenderedTile, TileCache, TileKey};
use crate::viewport::{Compositor, Epoch, Frame, Viewport};
use crate::year_vendor::{priority_for_year, YearSource, YearVendor};

/// Wires every collaborator together and owns the one piece of mutable UI
/// state the host doesn't: [`Navigator`]'s offset.
pub struct Engine {
    config: Config,
    epoch: Epoch,
    queue: Arc<RequestQueue<YearPayload>>,
    vendor: Arc<YearVendor>,
    tiles: Arc<TileCache>,
    navigator: StdMutex<Navigator>,
}

impl Engine {
    /// `epoch_year` anchors `offset_days = 0` to 1 January of that year.
    /// `min_offset`/`max_offset` bound panning, in days from that epoch;
    /// typically `0` and the offset of "today" clamped to the latest day
    /// with data (see [`Self::advance_today`]).
    pub fn new(
        config: Config,
        epoch_year: i32,
        min_offset: i64,
        max_offset: i64,
        initial_offset: i64,
        pixels_per_day: f64,
        source: Arc<dyn YearSource>,
    ) -> Self {
        let queue = Arc::new(RequestQueue::new(config.request_queue));
        let vendor = Arc::new(YearVendor::new(config.max_cached_years, queue.clone(), source));
        let tiles = Arc::new(TileCache::new(config.max_cached_tiles, vendor.clone(), config.rendering, false));
        let navigator = StdMutex::new(Navigator::new(
            config.navigator,
            min_offset,
            max_offset,
            initial_offset,
            pixels_per_day,
        ));

        Self {
            config,
            epoch: Epoch { year: epoch_year },
            queue,
            vendor,
            tiles,
            navigator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetches (or serves from cache) the full annual payload for `year`.
    /// Hosts rarely need this directly; [`Self::composite`] drives it.
    pub async fn request_year(&self, year: i32, priority: i32) -> Result<Arc<YearPayload>, EngineError> {
        self.vendor.request_year(year, priority).await
    }

    pub async fn get_tile(&self, key: TileKey, priority: i32) -> Result<Arc<RenderedTile>, Arc<EngineError>> {
        self.tiles.get_tile(key, priority).await
    }

    fn viewport(&self) -> Viewport {
        let offset = self.navigator.lock().expect("navigator mutex poisoned").offset_days();
        Viewport::new(self.epoch, offset)
    }

    /// Renders the current frame: fetches every tile the visible window
    /// needs (awaiting network/render work as necessary), then composites
    /// them. Also kicks off (but doesn't await) preloading the years just
    /// outside the window.
    pub async fn composite(&self, facilities: &[(String, u32)], container_width_px: u32) -> Frame {
        let viewport = self.viewport();
        let years = viewport.overlapping_years();
        let visible_year = years[0];

        let mut resolved: HashMap<(String, i32), Arc<RenderedTile>> = HashMap::new();
        for (facility_id, _row_height) in facilities {
            for &year in &years {
                let priority = priority_for_year(year, visible_year);
                let key = TileKey {
                    facility_id: facility_id.clone(),
                    year,
                };
                if let Ok(tile) = self.tiles.get_tile(key, priority).await {
                    resolved.insert((facility_id.clone(), year), tile);
                }
            }
        }

        for (facility_id, _) in facilities {
            let tiles = self.tiles.clone();
            let viewport = viewport;
            let facility_id = facility_id.clone();
            tokio::spawn(async move {
                crate::viewport::preload(&tiles, &viewport, &facility_id, crate::year_vendor::PRIORITY_BACKGROUND).await;
            });
        }

        Compositor::composite(&viewport, facilities, container_width_px, |facility_id, year| {
            resolved.get(&(facility_id.to_string(), year)).cloned()
        })
    }

    /// Recomputes `max_offset` from the live clock: panning can never go
    /// past the last day with (possibly still-fetching) data.
    pub fn advance_today(&self, now_utc: chrono::DateTime<chrono::Utc>) {
        let today = crate::datekit::today_in_fixed_tz(now_utc);
        let max_offset = self.epoch.day().days_until(&today);
        let mut nav = self.navigator.lock().expect("navigator mutex poisoned");
        nav.set_bounds(0, max_offset);
    }

    pub fn set_pixels_per_day(&self, pixels_per_day: f64) {
        self.navigator.lock().expect("navigator mutex poisoned").set_pixels_per_day(pixels_per_day);
    }

    pub fn on_pointer_down(&self, x_px: f64, t_ms: i64) {
        self.navigator.lock().expect("navigator mutex poisoned").on_pointer_down(x_px, t_ms);
    }

    pub fn on_pointer_move(&self, x_px: f64, t_ms: i64) {
        self.navigator.lock().expect("navigator mutex poisoned").on_pointer_move(x_px, t_ms);
    }

    pub fn on_pointer_up(&self, t_ms: i64) {
        self.navigator.lock().expect("navigator mutex poisoned").on_pointer_up(t_ms);
    }

    pub fn on_pointer_cancel(&self, t_ms: i64) {
        self.navigator.lock().expect("navigator mutex poisoned").on_pointer_cancel(t_ms);
    }

    pub fn on_touch_down(&self, x_px: f64, t_ms: i64) {
        self.navigator.lock().expect("navigator mutex poisoned").on_touch_down(x_px, t_ms);
    }

    pub fn on_touch_move(&self, x_px: f64, y_delta_px: f64, t_ms: i64) {
        self.navigator.lock().expect("navigator mutex poisoned").on_touch_move(x_px, y_delta_px, t_ms);
    }

    pub fn on_wheel(&self, dx_px: f64, dy_px: f64, t_ms: i64) {
        self.navigator.lock().expect("navigator mutex poisoned").on_wheel(dx_px, dy_px, t_ms);
    }

    pub fn on_key(&self, cmd: KeyCommand, t_ms: i64) {
        let epoch_day = self.epoch.day();
        self.navigator.lock().expect("navigator mutex poisoned").on_key(cmd, epoch_day, t_ms);
    }

    pub fn cancel_navigation(&self) {
        self.navigator.lock().expect("navigator mutex poisoned").cancel();
    }

    /// Advances any in-flight spring/easing animation. Hosts should call
    /// this once per animation frame even when idle; it's a no-op then.
    pub fn tick(&self, t_ms: i64, dt_ms: i64) {
        self.navigator.lock().expect("navigator mutex poisoned").tick(t_ms, dt_ms);
    }

    pub fn offset_days(&self) -> i64 {
        self.navigator.lock().expect("navigator mutex poisoned").offset_days()
    }

    pub async fn stats(&self) -> EngineStats {
        EngineStats {
            year_queue: self.queue.stats().await,
            year_cache: self.vendor.stats().await,
            tile_cache: self.tiles.stats().await,
            navigator: self.navigator.lock().expect("navigator mutex poisoned").stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataPoint, UnitSeries};
    use crate::request_queue::BoxFuture;
    use std::time::SystemTime;

    struct FixedSource;

    impl YearSource for FixedSource {
        fn fetch_year(&self, year: i32) -> BoxFuture<YearPayload> {
            Box::pin(async move {
                Ok(YearPayload::new(
                    year,
                    SystemTime::UNIX_EPOCH,
                    vec![UnitSeries {
                        unit_id: "U1".into(),
                        facility_id: "F1".into(),
                        facility_name: "F1".into(),
                        region: "NSW1".into(),
                        network: "NEM".into(),
                        capacity_mw: 100.0,
                        year,
                        data: vec![DataPoint::Percent(42.0); CalendarDay::days_in_year(year) as usize],
                    }],
                ))
            })
        }
    }

    #[tokio::test]
    async fn composite_resolves_tiles_from_fresh_fetches() {
        let engine = Engine::new(
            Config::default(),
            2020,
            0,
            10_000,
            0,
            1.0,
            Arc::new(FixedSource),
        );
        let frame = engine.composite(&[("F1".to_string(), 10)], 365).await;
        assert_eq!(frame.rows.len(), 1);
        assert!(frame.rows[0].pixels.iter().any(|&b| b != 0));
    }

    #[tokio::test]
    async fn keyboard_navigation_moves_offset_after_ticking() {
        let engine = Engine::new(Config::default(), 2020, 0, 10_000, 100, 1.0, Arc::new(FixedSource));
        engine.on_key(
            KeyCommand {
                key: crate::navigator::Key::Home,
                shift: false,
                cmd_or_ctrl: false,
            },
            0,
        );
        engine.tick(10_000, 10_000);
        assert_eq!(engine.offset_days(), 10_000);
    }
}
