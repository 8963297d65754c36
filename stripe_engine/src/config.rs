//! Configuration keys enumerated end to end, grouped by owning component.
//!
//! One value loaded once at [`crate::engine::Engine::new`] and never
//! diffed or re-applied. Every field has a [`Default`] so callers only
//! need to override what they care about.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_cached_years: usize,
    pub max_cached_tiles: usize,
    pub request_queue: RequestQueueConfig,
    pub navigator: NavigatorConfig,
    pub rendering: RenderingConfig,
    /// Fixed timezone offset in minutes used for all calendar-day
    /// arithmetic (UTC+10 by default; never the system timezone).
    pub time_zone_offset_minutes: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_cached_years: 8,
            max_cached_tiles: 24,
            request_queue: RequestQueueConfig::default(),
            navigator: NavigatorConfig::default(),
            rendering: RenderingConfig::default(),
            time_zone_offset_minutes: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestQueueConfig {
    pub max_concurrent: usize,
    pub min_interval_ms: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    pub request_timeout_ms: u64,
    pub breaker_threshold: u32,
    pub breaker_reset_ms: u64,
}

impl Default for RequestQueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            min_interval_ms: 150,
            max_retries: 3,
            retry_base_ms: 500,
            retry_max_ms: 8_000,
            request_timeout_ms: 15_000,
            breaker_threshold: 5,
            breaker_reset_ms: 30_000,
        }
    }
}

impl RequestQueueConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_max(&self) -> Duration {
        Duration::from_millis(self.retry_max_ms)
    }

    pub fn breaker_reset(&self) -> Duration {
        Duration::from_millis(self.breaker_reset_ms)
    }

    /// `min(retry_base_ms * 2^(attempt-1), retry_max_ms)` for `attempt >= 1`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        debug_assert!(attempt >= 1);
        let exp = attempt.saturating_sub(1).min(20);
        let scaled = self.retry_base_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(scaled.min(self.retry_max_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringConfig {
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
    pub min_distance: f64,
    pub min_velocity: f64,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            stiffness: 220.0,
            damping: 28.0,
            mass: 1.0,
            min_distance: 0.5,
            min_velocity: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Day/s speed beyond which a drag release is treated as a flick.
    pub velocity_threshold: f64,
    pub momentum_scale: f64,
    pub wheel_sensitivity: f64,
    pub spring: SpringConfig,
    pub elastic_limit_days: i64,
    pub keyboard_anim_ms: u64,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            velocity_threshold: 80.0,
            momentum_scale: 0.35,
            wheel_sensitivity: 1.0,
            spring: SpringConfig::default(),
            elastic_limit_days: 60,
            keyboard_anim_ms: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingConfig {
    pub min_row_short: u32,
    pub min_row_long: u32,
    pub max_row: u32,
    pub capacity_per_px: f64,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            min_row_short: 2,
            min_row_long: 6,
            max_row: 40,
            capacity_per_px: 30.0,
        }
    }
}

impl RenderingConfig {
    /// `clamp(round(capacity_mw / capacity_per_px), min_row, max_row)`.
    pub fn row_height(&self, capacity_mw: f64, short_labels: bool) -> u32 {
        let min_row = if short_labels {
            self.min_row_short
        } else {
            self.min_row_long
        };
        let raw = (capacity_mw / self.capacity_per_px).round();
        if raw.is_nan() {
            return min_row;
        }
        let clamped = raw.clamp(min_row as f64, self.max_row as f64);
        clamped as u32
    }
}
