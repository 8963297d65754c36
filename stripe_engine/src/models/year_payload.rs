//! The complete annual payload for every unit, as handed over by the
//! upstream collaborator and cached by `YearVendor`.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use super::unit_series::UnitSeries;

/// All units' series for a single year, ordered `(network, region,
/// facility_name, unit_id)`. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearPayload {
    pub year: i32,
    pub created_at: SystemTime,
    pub units: Vec<UnitSeries>,
}

impl YearPayload {
    /// Sorts `units` into canonical order in place.
    pub fn new(year: i32, created_at: SystemTime, mut units: Vec<UnitSeries>) -> Self {
        units.sort_by(|a, b| {
            (&a.network, &a.region, &a.facility_name, &a.unit_id).cmp(&(
                &b.network,
                &b.region,
                &b.facility_name,
                &b.unit_id,
            ))
        });
        Self {
            year,
            created_at,
            units,
        }
    }

    /// All units in the payload that belong to `facility_id`, in canonical
    /// order.
    pub fn units_for_facility<'a>(
        &'a self,
        facility_id: &'a str,
    ) -> impl Iterator<Item = &'a UnitSeries> {
        self.units.iter().filter(move |u| u.facility_id == facility_id)
    }

    /// Whether every unit shares this payload's `year` and data length —
    /// the invariant `YearVendor` checks before caching a freshly fetched
    /// payload.
    pub fn is_internally_consistent(&self) -> bool {
        let Some(first) = self.units.first() else {
            return true;
        };
        let expected_len = first.data.len();
        self.units
            .iter()
            .all(|u| u.year == self.year && u.data.len() == expected_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DataPoint;

    fn unit(network: &str, region: &str, facility: &str, unit_id: &str, year: i32) -> UnitSeries {
        UnitSeries {
            unit_id: unit_id.into(),
            facility_id: facility.into(),
            facility_name: facility.into(),
            region: region.into(),
            network: network.into(),
            capacity_mw: 100.0,
            year,
            data: vec![DataPoint::Missing; 365],
        }
    }

    #[test]
    fn new_sorts_into_canonical_order() {
        let payload = YearPayload::new(
            2023,
            SystemTime::UNIX_EPOCH,
            vec![
                unit("NEM", "NSW1", "Zeta", "U2", 2023),
                unit("NEM", "NSW1", "Alpha", "U1", 2023),
            ],
        );
        assert_eq!(payload.units[0].facility_name, "Alpha");
        assert_eq!(payload.units[1].facility_name, "Zeta");
    }

    #[test]
    fn units_for_facility_filters() {
        let payload = YearPayload::new(
            2023,
            SystemTime::UNIX_EPOCH,
            vec![unit("NEM", "NSW1", "Alpha", "U1", 2023), unit("NEM", "NSW1", "Beta", "U2", 2023)],
        );
        let filtered: Vec<_> = payload.units_for_facility("Alpha").collect();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].unit_id, "U1");
    }

    #[test]
    fn detects_inconsistent_year() {
        let mut payload = YearPayload::new(
            2023,
            SystemTime::UNIX_EPOCH,
            vec![unit("NEM", "NSW1", "Alpha", "U1", 2023)],
        );
        assert!(payload.is_internally_consistent());
        payload.units.push(unit("NEM", "NSW1", "Beta", "U2", 2024));
        assert!(!payload.is_internally_consistent());
    }
}
