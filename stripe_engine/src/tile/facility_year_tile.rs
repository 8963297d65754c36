//! Pure render: one facility's unit series for one year → a pixel buffer.

use std::time::SystemTime;

use crate::colormap;
use crate::config::RenderingConfig;
use crate::models::UnitSeries;

use super::{RenderedTile, TileKey};

/// Renders `units` (already filtered to one facility, already in canonical
/// order) into a `RenderedTile`. `units` must be non-empty and share a
/// common `data.len()`; the caller (`TileCache`) guarantees this because it
/// filters a single `YearPayload`.
pub fn render(
    facility_id: &str,
    year: i32,
    units: &[UnitSeries],
    config: &RenderingConfig,
    short_labels: bool,
    rendered_at: SystemTime,
) -> RenderedTile {
    let width = units.first().map(|u| u.data.len()).unwrap_or(0) as u32;

    let row_heights: Vec<u32> = units
        .iter()
        .map(|u| config.row_height(u.capacity_mw, short_labels))
        .collect();
    let mut unit_row_offsets = Vec::with_capacity(row_heights.len());
    let mut y = 0u32;
    for h in &row_heights {
        unit_row_offsets.push(y);
        y += h;
    }
    let height = y;

    let mut pixels = vec![0u8; (width as usize) * (height as usize) * 4];
    let stride = width as usize * 4;

    for (unit, (&y0, &h)) in units.iter().zip(unit_row_offsets.iter().zip(row_heights.iter())) {
        for (day, point) in unit.data.iter().enumerate() {
            let rgba = colormap::rgba_for_percent(point.as_percent());
            for row in y0..y0 + h {
                let offset = row as usize * stride + day * 4;
                pixels[offset..offset + 4].copy_from_slice(&rgba);
            }
        }
    }

    RenderedTile {
        key: TileKey {
            facility_id: facility_id.to_string(),
            year,
        },
        width,
        height,
        pixels,
        unit_row_offsets,
        rendered_at,
    }
}
