//! Keyboard command → target offset mapping.

use chrono::{Datelike, Months};

use crate::datekit::CalendarDay;
use crate::viewport::WINDOW_DAYS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Home,
    T,
    S,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCommand {
    pub key: Key,
    pub shift: bool,
    pub cmd_or_ctrl: bool,
}

fn shift_months(date: CalendarDay, months: i64) -> CalendarDay {
    let naive = date.as_naive_date();
    let shifted = if months >= 0 {
        naive.checked_add_months(Months::new(months as u32))
    } else {
        naive.checked_sub_months(Months::new((-months) as u32))
    };
    shifted
        .and_then(|d| CalendarDay::from_ymd(d.year(), d.month(), d.day()))
        .unwrap_or(date)
}

/// Resolves a keyboard command into an absolute target `offset_days`,
/// clamped into `[min_offset, max_offset]`. `epoch` and `current_offset`
/// locate the window the command is relative to.
pub fn target_offset(
    cmd: KeyCommand,
    epoch: CalendarDay,
    current_offset: i64,
    min_offset: i64,
    max_offset: i64,
) -> i64 {
    let raw = match cmd.key {
        Key::Home | Key::T => max_offset,
        Key::S => min_offset,
        Key::ArrowLeft | Key::ArrowRight => {
            let dir: i64 = if cmd.key == Key::ArrowLeft { -1 } else { 1 };
            if cmd.cmd_or_ctrl {
                let window_start = epoch.add_days(current_offset);
                let window_end = window_start.add_days(WINDOW_DAYS - 1);
                let reference = if dir < 0 { window_start } else { window_end };
                let jan1_this_year = CalendarDay::jan1(reference.year());
                let target_date = if reference == jan1_this_year {
                    CalendarDay::jan1(reference.year() + dir as i32)
                } else if dir < 0 {
                    jan1_this_year
                } else {
                    CalendarDay::jan1(reference.year() + 1)
                };
                epoch.days_until(&target_date)
            } else {
                let months = if cmd.shift { 6 } else { 1 };
                let window_start = epoch.add_days(current_offset);
                let shifted = shift_months(window_start, dir * months);
                epoch.days_until(&shifted)
            }
        }
    };
    raw.clamp(min_offset, max_offset)
}
