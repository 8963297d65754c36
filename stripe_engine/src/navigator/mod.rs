//! Single source of truth for the current offset: a state machine over
//! Idle/Dragging/Animating driven by pointer, wheel, and keyboard input.
//!
//! Every public method takes its timestamp as an explicit `t_ms` rather
//! than reading a clock, so the whole state machine is driven purely by
//! its inputs and reproducible in tests without any time-mocking harness.

mod keyboard;
mod spring;
mod velocity;

pub use keyboard::{Key, KeyCommand};

use std::time::Duration;

use crate::config::NavigatorConfig;

use velocity::VelocityEstimator;

/// Trailing window for pointer-velocity sampling, per the animator's fixed
/// ≤100ms sampling contract.
const VELOCITY_WINDOW_MS: i64 = 100;
/// How long a wheel gesture must be quiescent before the ease-out/settle
/// animation takes over.
const WHEEL_QUIESCENCE_MS: i64 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerInputKind {
    Mouse,
    TwoFingerTouch,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationKind {
    Snapback,
    Momentum,
    Keyboard,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NavigatorState {
    Idle,
    Dragging {
        anchor_offset: f64,
        anchor_pixel: f64,
        input: PointerInputKind,
        /// `None` until a two-finger touch gesture has accumulated enough
        /// movement to decide whether it's a horizontal pan (`Some(true)`)
        /// or a vertical scroll the host should handle (`Some(false)`).
        /// Always `Some(true)` immediately for mouse input.
        axis_locked_horizontal: Option<bool>,
    },
    Animating {
        from: f64,
        to: f64,
        kind: AnimationKind,
        started_at_ms: i64,
    },
}

fn cubic_ease_in_out(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigatorStats {
    pub offset_days: i64,
    pub velocity: f64,
    pub is_idle: bool,
}

/// Owns `offset_days` and everything needed to animate it.
pub struct Navigator {
    state: NavigatorState,
    offset: f64,
    velocity: f64,
    min_offset: i64,
    max_offset: i64,
    config: NavigatorConfig,
    pixels_per_day: f64,
    velocity_estimator: VelocityEstimator,
    last_wheel_at_ms: Option<i64>,
}

impl Navigator {
    pub fn new(config: NavigatorConfig, min_offset: i64, max_offset: i64, initial_offset: i64, pixels_per_day: f64) -> Self {
        Self {
            state: NavigatorState::Idle,
            offset: initial_offset as f64,
            velocity: 0.0,
            min_offset,
            max_offset,
            config,
            pixels_per_day,
            velocity_estimator: VelocityEstimator::new(VELOCITY_WINDOW_MS),
            last_wheel_at_ms: None,
        }
    }

    pub fn offset_days(&self) -> i64 {
        self.offset.round() as i64
    }

    pub fn state(&self) -> &NavigatorState {
        &self.state
    }

    pub fn stats(&self) -> NavigatorStats {
        NavigatorStats {
            offset_days: self.offset_days(),
            velocity: self.velocity,
            is_idle: matches!(self.state, NavigatorState::Idle),
        }
    }

    pub fn set_bounds(&mut self, min_offset: i64, max_offset: i64) {
        self.min_offset = min_offset;
        self.max_offset = max_offset;
    }

    pub fn set_pixels_per_day(&mut self, pixels_per_day: f64) {
        self.pixels_per_day = pixels_per_day;
    }

    fn elastic_bounds(&self) -> (f64, f64) {
        let e = self.config.elastic_limit_days as f64;
        (self.min_offset as f64 - e, self.max_offset as f64 + e)
    }

    fn strict_bounds(&self) -> (f64, f64) {
        (self.min_offset as f64, self.max_offset as f64)
    }

    fn clamp_elastic(&self, v: f64) -> f64 {
        let (lo, hi) = self.elastic_bounds();
        v.clamp(lo, hi)
    }

    /// `Idle` at the current offset, clamped into the strict bounds.
    /// Cancels any active animation. Matches the explicit `cancel()`
    /// transition available from any state.
    pub fn cancel(&mut self) {
        let (lo, hi) = self.strict_bounds();
        self.offset = self.offset.clamp(lo, hi);
        self.velocity = 0.0;
        self.state = NavigatorState::Idle;
        self.velocity_estimator.clear();
    }

    fn start_drag(&mut self, anchor_pixel: f64, input: PointerInputKind, t_ms: i64) {
        self.velocity_estimator.clear();
        self.velocity_estimator.push(t_ms, self.offset);
        self.state = NavigatorState::Dragging {
            anchor_offset: self.offset,
            anchor_pixel,
            input,
            axis_locked_horizontal: match input {
                PointerInputKind::Mouse => Some(true),
                PointerInputKind::TwoFingerTouch => None,
            },
        };
    }

    pub fn on_pointer_down(&mut self, x_px: f64, t_ms: i64) {
        self.start_drag(x_px, PointerInputKind::Mouse, t_ms);
    }

    pub fn on_touch_down(&mut self, x_px: f64, t_ms: i64) {
        self.start_drag(x_px, PointerInputKind::TwoFingerTouch, t_ms);
    }

    pub fn on_pointer_move(&mut self, x_px: f64, t_ms: i64) {
        self.apply_move(x_px, 0.0, t_ms);
    }

    /// `min_ratio` gates whether a two-finger gesture is accepted as a
    /// horizontal pan: accepted only if `|dx| > min_ratio * |dy|`.
    pub fn on_touch_move(&mut self, x_px: f64, y_delta_px: f64, t_ms: i64) {
        self.apply_move(x_px, y_delta_px, t_ms);
    }

    fn apply_move(&mut self, x_px: f64, y_delta_px: f64, t_ms: i64) {
        let NavigatorState::Dragging {
            anchor_offset,
            anchor_pixel,
            input,
            axis_locked_horizontal,
        } = self.state
        else {
            return;
        };

        let dx = x_px - anchor_pixel;

        if input == PointerInputKind::TwoFingerTouch && axis_locked_horizontal.is_none() {
            const MIN_RATIO: f64 = 1.2;
            if dx.abs() < f64::EPSILON && y_delta_px.abs() < f64::EPSILON {
                return;
            }
            let horizontal = dx.abs() > MIN_RATIO * y_delta_px.abs();
            if let NavigatorState::Dragging {
                axis_locked_horizontal,
                ..
            } = &mut self.state
            {
                *axis_locked_horizontal = Some(horizontal);
            }
            if !horizontal {
                return;
            }
        } else if input == PointerInputKind::TwoFingerTouch && axis_locked_horizontal == Some(false) {
            return;
        }

        self.offset = self.clamp_elastic(anchor_offset - dx / self.pixels_per_day);
        self.velocity_estimator.push(t_ms, self.offset);
    }

    pub fn on_pointer_up(&mut self, t_ms: i64) {
        let NavigatorState::Dragging { input, .. } = self.state else {
            return;
        };
        let momentum_allowed = input == PointerInputKind::TwoFingerTouch;
        self.release(t_ms, momentum_allowed);
    }

    pub fn on_pointer_cancel(&mut self, t_ms: i64) {
        if matches!(self.state, NavigatorState::Dragging { .. }) {
            self.release(t_ms, false);
        }
    }

    fn release(&mut self, t_ms: i64, momentum_allowed: bool) {
        let v = self.velocity_estimator.estimate();
        let (lo, hi) = self.strict_bounds();

        if self.offset < lo || self.offset > hi {
            let target = if self.offset < lo { lo } else { hi };
            self.start_animation(target, AnimationKind::Snapback, t_ms, v);
        } else if momentum_allowed && v.abs() > self.config.velocity_threshold {
            let target = (self.offset - v * self.config.momentum_scale).clamp(lo, hi);
            self.start_animation(target, AnimationKind::Momentum, t_ms, v);
        } else {
            self.offset = self.offset.clamp(lo, hi);
            self.velocity = 0.0;
            self.state = NavigatorState::Idle;
        }
    }

    /// Horizontal wheel/trackpad delta. Advances `offset` directly during
    /// the gesture; quiescence (detected in [`Self::tick`]) triggers an
    /// ease-out settle.
    pub fn on_wheel(&mut self, dx_px: f64, _dy_px: f64, t_ms: i64) {
        if !matches!(self.state, NavigatorState::Dragging { input: PointerInputKind::Mouse, .. }) {
            self.state = NavigatorState::Dragging {
                anchor_offset: self.offset,
                anchor_pixel: 0.0,
                input: PointerInputKind::Mouse,
                axis_locked_horizontal: Some(true),
            };
            self.velocity_estimator.clear();
        }

        let delta_days = dx_px * self.config.wheel_sensitivity / self.pixels_per_day;
        self.offset = self.clamp_elastic(self.offset + delta_days);
        self.velocity_estimator.push(t_ms, self.offset);
        self.last_wheel_at_ms = Some(t_ms);
    }

    pub fn on_key(&mut self, cmd: KeyCommand, epoch: crate::datekit::CalendarDay, t_ms: i64) {
        let target = keyboard::target_offset(cmd, epoch, self.offset_days(), self.min_offset, self.max_offset);
        self.start_animation(target as f64, AnimationKind::Keyboard, t_ms, 0.0);
    }

    fn start_animation(&mut self, target: f64, kind: AnimationKind, t_ms: i64, v: f64) {
        self.state = NavigatorState::Animating {
            from: self.offset,
            to: target,
            kind,
            started_at_ms: t_ms,
        };
        self.velocity = v;
    }

    /// Advances any active animation by `dt_ms` (the elapsed time since the
    /// previous tick), settling into `Idle` once converged. A no-op in
    /// `Idle`. In `Dragging`, only checks for wheel-gesture quiescence.
    pub fn tick(&mut self, t_ms: i64, dt_ms: i64) {
        match self.state {
            NavigatorState::Idle => {}
            NavigatorState::Dragging { input, .. } => {
                if input == PointerInputKind::Mouse {
                    if let Some(last) = self.last_wheel_at_ms {
                        if t_ms - last >= WHEEL_QUIESCENCE_MS {
                            self.release(t_ms, true);
                        }
                    }
                }
            }
            NavigatorState::Animating { from, to, kind, started_at_ms } => match kind {
                AnimationKind::Momentum | AnimationKind::Snapback => {
                    let (pos, vel) = spring::step(self.offset, self.velocity, to, &self.config.spring, Duration::from_millis(dt_ms.max(0) as u64));
                    self.offset = pos;
                    self.velocity = vel;
                    if spring::settled(pos, vel, to, &self.config.spring) {
                        self.offset = to;
                        self.velocity = 0.0;
                        self.state = NavigatorState::Idle;
                    }
                }
                AnimationKind::Keyboard => {
                    let elapsed = (t_ms - started_at_ms).max(0) as f64;
                    let duration = self.config.keyboard_anim_ms as f64;
                    let t = (elapsed / duration.max(1.0)).clamp(0.0, 1.0);
                    self.offset = from + (to - from) * cubic_ease_in_out(t);
                    if t >= 1.0 {
                        self.offset = to;
                        self.velocity = 0.0;
                        self.state = NavigatorState::Idle;
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NavigatorConfig;

    fn nav() -> Navigator {
        Navigator::new(NavigatorConfig::default(), 0, 1000, 500, 1.0)
    }

    #[test]
    fn pointer_down_then_move_updates_offset() {
        let mut n = nav();
        n.on_pointer_down(0.0, 0);
        n.on_pointer_move(-100.0, 16);
        assert_eq!(n.offset_days(), 600);
    }

    #[test]
    fn mouse_release_has_no_momentum() {
        let mut n = nav();
        n.on_pointer_down(0.0, 0);
        n.on_pointer_move(-500.0, 16);
        n.on_pointer_up(32);
        assert!(matches!(n.state(), NavigatorState::Idle));
    }

    #[test]
    fn momentum_release_within_bounds_converges_to_target() {
        let mut n = nav();
        n.on_touch_down(0.0, 0);
        // Fast drag to build up velocity recognisable as a flick.
        n.on_touch_move(0.0, 0.0, 0);
        n.on_touch_move(-200.0, 0.0, 10);
        n.on_pointer_up(10);
        assert!(matches!(n.state(), NavigatorState::Animating { kind: AnimationKind::Momentum, .. }));
        for i in 0..2000 {
            n.tick(10 + i * 16, 16);
        }
        assert!(matches!(n.state(), NavigatorState::Idle));
        assert!(n.offset_days() >= 0 && n.offset_days() <= 1000);
    }

    #[test]
    fn snapback_from_elastic_overshoot_settles_at_bound() {
        let mut n = nav();
        n.on_pointer_down(0.0, 0);
        // Drag far past max (elastic band absorbs it).
        n.on_pointer_move(-10_000.0, 16);
        n.on_pointer_up(16);
        assert!(matches!(n.state(), NavigatorState::Animating { kind: AnimationKind::Snapback, .. }));
        for i in 0..2000 {
            n.tick(16 + i * 16, 16);
        }
        assert!(matches!(n.state(), NavigatorState::Idle));
        assert_eq!(n.offset_days(), 1000);
    }

    #[test]
    fn new_pointer_down_cancels_animation() {
        let mut n = nav();
        n.on_key(
            KeyCommand { key: Key::Home, shift: false, cmd_or_ctrl: false },
            crate::datekit::CalendarDay::jan1(2015),
            0,
        );
        assert!(matches!(n.state(), NavigatorState::Animating { .. }));
        n.on_pointer_down(0.0, 1);
        assert!(matches!(n.state(), NavigatorState::Dragging { .. }));
    }

    #[test]
    fn offset_never_exceeds_elastic_band() {
        let mut n = nav();
        n.on_pointer_down(0.0, 0);
        n.on_pointer_move(-1_000_000.0, 16);
        let (lo, hi) = n.elastic_bounds();
        assert!(n.offset >= lo && n.offset <= hi);
    }

    #[test]
    fn two_finger_touch_rejects_vertical_gesture() {
        let mut n = nav();
        n.on_touch_down(0.0, 0);
        n.on_touch_move(5.0, 50.0, 16); // mostly vertical -> rejected
        assert_eq!(n.offset_days(), 500);
    }

    #[test]
    fn keyboard_animation_eases_to_target_over_configured_duration() {
        let mut n = nav();
        n.on_key(
            KeyCommand { key: Key::Home, shift: false, cmd_or_ctrl: false },
            crate::datekit::CalendarDay::jan1(2015),
            0,
        );
        let dur = n.config.keyboard_anim_ms as i64;
        n.tick(dur, dur);
        assert!(matches!(n.state(), NavigatorState::Idle));
        assert_eq!(n.offset_days(), 1000);
    }
}
