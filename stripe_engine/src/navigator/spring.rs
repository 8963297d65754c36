//! Fixed-timestep semi-implicit Euler spring integrator.
//!
//! Kept as an internal function driven by explicit frame ticks rather than
//! wrapping a declarative spring library with its own mutation model — the
//! navigator calls `step` once per tick and owns the resulting `(position,
//! velocity)` pair itself.

use std::time::Duration;

use crate::config::SpringConfig;

/// Largest single sub-step, per the animator's fixed-timestep contract.
const MAX_DT: f64 = 1.0 / 30.0;

/// Advances `(pos, vel)` toward `target` over `dt`, internally chopped into
/// sub-steps no larger than 1/30s so a long tick (e.g. after a stall)
/// doesn't destabilise the integration.
pub fn step(pos: f64, vel: f64, target: f64, cfg: &SpringConfig, dt: Duration) -> (f64, f64) {
    let mut pos = pos;
    let mut vel = vel;
    let mut remaining = dt.as_secs_f64();

    while remaining > 0.0 {
        let h = remaining.min(MAX_DT);
        let accel = (cfg.stiffness * (target - pos) - cfg.damping * vel) / cfg.mass;
        vel += accel * h;
        pos += vel * h;
        remaining -= h;
    }

    (pos, vel)
}

/// Whether the spring has settled close enough to `target` to be considered
/// at rest.
pub fn settled(pos: f64, vel: f64, target: f64, cfg: &SpringConfig) -> bool {
    (target - pos).abs() < cfg.min_distance && vel.abs() < cfg.min_velocity
}
