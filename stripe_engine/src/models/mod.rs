//! The payload shapes that flow from the upstream collaborator through the
//! cache and into rendering.

mod unit_series;
mod year_payload;

pub use unit_series::{DataPoint, UnitSeries};
pub use year_payload::YearPayload;
