//! Region/facility capacity-factor aggregation for label tooltips.
//!
//! The primitive is `sum_and_count`: a present-value total and a present-day
//! count over a `[start, end]` window clamped to one payload's year. Higher
//! layers (a tooltip spanning a year boundary) combine two payloads' parts
//! with [`mean_from_parts`] rather than concatenating data arrays.

use crate::datekit::CalendarDay;
use crate::models::YearPayload;

/// Sums present values and counts them over `[start, end]` (inclusive) for
/// every unit in `payload` matching `selector`. Days outside `payload`'s
/// year contribute nothing; `start`/`end` are clamped into range.
fn sum_and_count(
    payload: &YearPayload,
    start: CalendarDay,
    end: CalendarDay,
    selector: impl Fn(&crate::models::UnitSeries) -> bool,
) -> (f64, usize) {
    if end.year() < payload.year || start.year() > payload.year {
        return (0.0, 0);
    }

    let jan1 = CalendarDay::jan1(payload.year);
    let dec31 = CalendarDay::dec31(payload.year);
    let clamped_start = start.max(jan1);
    let clamped_end = end.min(dec31);
    if clamped_start > clamped_end {
        return (0.0, 0);
    }

    let lo = clamped_start.day_index() as usize;
    let hi = clamped_end.day_index() as usize;

    let mut sum = 0.0;
    let mut count = 0usize;
    for unit in payload.units.iter().filter(|u| selector(u)) {
        for point in &unit.data[lo..=hi.min(unit.data.len().saturating_sub(1))] {
            if let Some(v) = point.as_percent() {
                sum += v;
                count += 1;
            }
        }
    }
    (sum, count)
}

/// Arithmetic mean of present values across the given `(sum, count)` parts,
/// or `None` if none were present anywhere.
pub fn mean_from_parts(parts: impl IntoIterator<Item = (f64, usize)>) -> Option<f64> {
    let (sum, count) = parts
        .into_iter()
        .fold((0.0, 0usize), |(s, c), (ps, pc)| (s + ps, c + pc));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

pub fn facility_mean(
    payload: &YearPayload,
    facility_id: &str,
    start: CalendarDay,
    end: CalendarDay,
) -> Option<f64> {
    mean_from_parts([sum_and_count(payload, start, end, |u| {
        u.facility_id == facility_id
    })])
}

pub fn region_mean(
    payload: &YearPayload,
    region: &str,
    start: CalendarDay,
    end: CalendarDay,
) -> Option<f64> {
    mean_from_parts([sum_and_count(payload, start, end, |u| u.region == region)])
}

/// `facility_mean` combined over two payloads (a window that spans a year
/// boundary).
pub fn facility_mean_across(
    payloads: &[&YearPayload],
    facility_id: &str,
    start: CalendarDay,
    end: CalendarDay,
) -> Option<f64> {
    mean_from_parts(
        payloads
            .iter()
            .map(|p| sum_and_count(p, start, end, |u| u.facility_id == facility_id)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DataPoint;
    use std::time::SystemTime;

    fn payload_with(values: Vec<f32>) -> YearPayload {
        let data = values.into_iter().map(DataPoint::Percent).collect::<Vec<_>>();
        let len = data.len();
        assert_eq!(len, 365, "test fixture assumes a non-leap year");
        YearPayload::new(
            2023,
            SystemTime::UNIX_EPOCH,
            vec![crate::models::UnitSeries {
                unit_id: "U1".into(),
                facility_id: "F1".into(),
                facility_name: "F1".into(),
                region: "NSW1".into(),
                network: "NEM".into(),
                capacity_mw: 100.0,
                year: 2023,
                data,
            }],
        )
    }

    #[test]
    fn mean_ignores_missing_days() {
        let mut data = vec![50.0f32; 365];
        let payload = {
            let mut p = payload_with(data.drain(..).collect());
            p.units[0].data[0] = DataPoint::Missing;
            p.units[0].data[1] = DataPoint::Missing;
            p
        };
        let start = CalendarDay::from_ymd(2023, 1, 1).unwrap();
        let end = CalendarDay::from_ymd(2023, 1, 3).unwrap();
        // Day 0 and 1 missing, day 2 present at 50.0 -> mean 50.0.
        assert_eq!(facility_mean(&payload, "F1", start, end), Some(50.0));
    }

    #[test]
    fn mean_is_none_when_all_missing() {
        let payload = payload_with(vec![0.0f32; 365].into_iter().map(|_| 0.0).collect());
        let mut payload = payload;
        for d in &mut payload.units[0].data {
            *d = DataPoint::Missing;
        }
        let start = CalendarDay::jan1(2023);
        let end = CalendarDay::dec31(2023);
        assert_eq!(facility_mean(&payload, "F1", start, end), None);
    }

    #[test]
    fn window_outside_payload_year_contributes_nothing() {
        let payload = payload_with(vec![50.0f32; 365]);
        let start = CalendarDay::jan1(2020);
        let end = CalendarDay::dec31(2020);
        assert_eq!(facility_mean(&payload, "F1", start, end), None);
    }
}
