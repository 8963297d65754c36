//! One generating unit's annual series of daily capacity factors.

use serde::{Deserialize, Serialize};

use crate::datekit::CalendarDay;

/// A single day's capacity factor, or the explicit "no data yet" sentinel.
///
/// Kept as a sum type rather than a nullable `f32` so rendering and
/// aggregation have to discriminate explicitly instead of silently treating
/// a missing day as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DataPoint {
    /// A percentage; may exceed 100 or be slightly negative in source data.
    Percent(f32),
    Missing,
}

impl DataPoint {
    pub fn as_percent(&self) -> Option<f64> {
        match self {
            DataPoint::Percent(v) => Some(*v as f64),
            DataPoint::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, DataPoint::Missing)
    }
}

/// One generating unit's full-year series. Index 0 is 1 January of `year`;
/// `data.len()` is 365 or 366 depending on leap year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSeries {
    pub unit_id: String,
    pub facility_id: String,
    pub facility_name: String,
    pub region: String,
    pub network: String,
    pub capacity_mw: f64,
    pub year: i32,
    pub data: Vec<DataPoint>,
}

impl UnitSeries {
    /// Whether `data`'s length matches the year and every day that is
    /// `today` or later (in the fixed timezone) is `Missing`.
    pub fn is_valid_for(&self, today: CalendarDay) -> bool {
        if self.data.len() as u32 != CalendarDay::days_in_year(self.year) {
            return false;
        }

        if today.year() < self.year {
            return self.data.iter().all(DataPoint::is_missing);
        }

        if today.year() > self.year {
            return true;
        }

        let cutoff = today.day_index() as usize;
        self.data[cutoff.min(self.data.len())..]
            .iter()
            .all(DataPoint::is_missing)
    }
}
