//! Maps an absolute day offset to a 365-day window and composites the
//! overlapping tiles into a per-facility frame.

mod pixel_surface;

pub use pixel_surface::{InMemorySurface, PixelSurface, Rect};

use std::sync::Arc;

use crate::datekit::CalendarDay;
use crate::tile::{RenderedTile, TileCache, TileKey};

/// Number of days in a display window.
pub const WINDOW_DAYS: i64 = 365;

/// 1 January of the earliest supported year — the reference point for
/// `offset_days`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch {
    pub year: i32,
}

impl Epoch {
    pub fn day(&self) -> CalendarDay {
        CalendarDay::jan1(self.year)
    }
}

/// The 365-day window currently on screen, expressed as an offset from
/// [`Epoch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub epoch: Epoch,
    pub offset_days: i64,
}

impl Viewport {
    pub fn new(epoch: Epoch, offset_days: i64) -> Self {
        Self { epoch, offset_days }
    }

    pub fn window_start(&self) -> CalendarDay {
        self.epoch.day().add_days(self.offset_days)
    }

    pub fn window_end(&self) -> CalendarDay {
        self.window_start().add_days(WINDOW_DAYS - 1)
    }

    /// The ≤2 years whose tiles overlap this window.
    pub fn overlapping_years(&self) -> Vec<i32> {
        let y0 = self.window_start().year();
        let y1 = self.window_end().year();
        if y0 == y1 {
            vec![y0]
        } else {
            vec![y0, y1]
        }
    }

    /// Years to speculatively preload after compositing: one before and one
    /// after the overlapping years.
    pub fn preload_years(&self) -> Vec<i32> {
        let years = self.overlapping_years();
        let y0 = *years.first().expect("overlapping_years is never empty");
        let y1 = *years.last().expect("overlapping_years is never empty");
        vec![y0 - 1, y1 + 1]
    }
}

/// One day-range slice of a source tile mapped into destination pixel
/// columns within the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub source_x_start: u32,
    pub source_x_end: u32,
    pub dest_x_start: u32,
    pub dest_x_end: u32,
}

/// Computes the source/destination day-column ranges for one tile's year
/// within the current viewport window, mapped across `container_width_px`
/// at `pixels_per_day = container_width_px / 365`.
pub fn slice_for_year(viewport: &Viewport, year: i32, container_width_px: u32) -> Slice {
    let jan1 = CalendarDay::jan1(year);
    let dec31 = CalendarDay::dec31(year);
    let d0 = viewport.window_start();
    let d1 = viewport.window_end();

    let clip_start = d0.max(jan1);
    let clip_end = d1.min(dec31);

    let pixels_per_day = container_width_px as f64 / WINDOW_DAYS as f64;
    let dest_start = (d0.days_until(&clip_start) as f64 * pixels_per_day).round() as u32;
    let dest_end = ((d0.days_until(&clip_end) + 1) as f64 * pixels_per_day).round() as u32;

    Slice {
        source_x_start: clip_start.day_index(),
        source_x_end: clip_end.day_index() + 1,
        dest_x_start: dest_start,
        dest_x_end: dest_end,
    }
}

/// One facility row's composited pixel buffer for the current frame.
pub struct CompositedRow {
    pub facility_id: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// A full frame: one composited row per requested facility.
pub struct Frame {
    pub offset_days: i64,
    pub rows: Vec<CompositedRow>,
}

/// Pure compositor: given already-rendered tiles (or `None` for "not ready
/// yet"), blits their slices into per-facility row buffers at the
/// container's display height. Never errors — a missing tile just leaves
/// its slice as background.
pub struct Compositor;

impl Compositor {
    /// Composites one frame. `tile_for` is called once per `(facility,
    /// year)` pair the window overlaps and should return `None` when the
    /// tile isn't cached yet (the caller is expected to have kicked off a
    /// fetch already; this function never blocks).
    pub fn composite(
        viewport: &Viewport,
        facilities: &[(String, u32)],
        container_width_px: u32,
        tile_for: impl Fn(&str, i32) -> Option<Arc<RenderedTile>>,
    ) -> Frame {
        let years = viewport.overlapping_years();
        let rows = facilities
            .iter()
            .map(|(facility_id, row_height_px)| {
                Self::composite_row(
                    viewport,
                    facility_id,
                    *row_height_px,
                    container_width_px,
                    &years,
                    &tile_for,
                )
            })
            .collect();

        Frame {
            offset_days: viewport.offset_days,
            rows,
        }
    }

    fn composite_row(
        viewport: &Viewport,
        facility_id: &str,
        row_height_px: u32,
        container_width_px: u32,
        years: &[i32],
        tile_for: &impl Fn(&str, i32) -> Option<Arc<RenderedTile>>,
    ) -> CompositedRow {
        let mut pixels = vec![0u8; container_width_px as usize * row_height_px as usize * 4];
        let stride = container_width_px as usize * 4;

        for &year in years {
            let Some(tile) = tile_for(facility_id, year) else {
                continue;
            };
            let slice = slice_for_year(viewport, year, container_width_px);
            blit_scaled(&tile, &slice, row_height_px, &mut pixels, stride);
        }

        CompositedRow {
            facility_id: facility_id.to_string(),
            width: container_width_px,
            height: row_height_px,
            pixels,
        }
    }
}

/// Blits `tile`'s `slice` columns into `dest`, vertically rescaling the
/// tile's own height to `dest_height_px` (nearest-neighbour).
fn blit_scaled(tile: &RenderedTile, slice: &Slice, dest_height_px: u32, dest: &mut [u8], dest_stride: usize) {
    if tile.height == 0 || tile.width == 0 {
        return;
    }
    let src_stride = tile.width as usize * 4;

    for dest_row in 0..dest_height_px {
        let src_row = if dest_height_px <= 1 {
            0
        } else {
            (dest_row as u64 * (tile.height as u64 - 1) / (dest_height_px as u64 - 1)) as u32
        };

        for (src_col, dest_col) in (slice.source_x_start..slice.source_x_end)
            .zip(slice.dest_x_start..slice.dest_x_end)
        {
            let src_offset = src_row as usize * src_stride + src_col as usize * 4;
            let dest_offset = dest_row as usize * dest_stride + dest_col as usize * 4;
            if src_offset + 4 <= tile.pixels.len() && dest_offset + 4 <= dest.len() {
                dest[dest_offset..dest_offset + 4].copy_from_slice(&tile.pixels[src_offset..src_offset + 4]);
            }
        }
    }
}

/// Fetches (or kicks off fetching) the tiles a viewport needs and
/// speculatively preloads the years just outside the visible window.
pub async fn preload(tiles: &TileCache, viewport: &Viewport, facility_id: &str, visible_year_priority: i32) {
    for year in viewport.preload_years() {
        let _ = tiles
            .get_tile(
                TileKey {
                    facility_id: facility_id.to_string(),
                    year,
                },
                visible_year_priority,
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vp(offset: i64) -> Viewport {
        Viewport::new(Epoch { year: 2020 }, offset)
    }

    #[test]
    fn single_year_window_has_one_overlapping_year() {
        let v = vp(0);
        assert_eq!(v.overlapping_years(), vec![2020]);
    }

    #[test]
    fn window_crossing_boundary_has_two_years() {
        // 2023-11-15 is day_index 318 (0-based) in a non-leap year.
        let d0 = CalendarDay::from_ymd(2023, 11, 15).unwrap();
        let epoch = CalendarDay::jan1(2020);
        let offset = epoch.days_until(&d0);
        let v = Viewport::new(Epoch { year: 2020 }, offset);
        assert_eq!(v.window_start(), d0);
        assert_eq!(v.window_end(), CalendarDay::from_ymd(2024, 11, 13).unwrap());
        assert_eq!(v.overlapping_years(), vec![2023, 2024]);
    }

    #[test]
    fn composite_is_deterministic_for_same_offset() {
        let v = vp(0);
        let facilities = vec![("F1".to_string(), 10)];
        let frame_a = Compositor::composite(&v, &facilities, 365, |_, _| None);
        let frame_b = Compositor::composite(&v, &facilities, 365, |_, _| None);
        assert_eq!(frame_a.rows[0].pixels, frame_b.rows[0].pixels);
    }

    #[test]
    fn missing_tile_leaves_background() {
        let v = vp(0);
        let facilities = vec![("F1".to_string(), 10)];
        let frame = Compositor::composite(&v, &facilities, 100, |_, _| None);
        assert!(frame.rows[0].pixels.iter().all(|&b| b == 0));
    }

    #[test]
    fn preload_years_are_outside_overlap() {
        let v = vp(0);
        assert_eq!(v.preload_years(), vec![2019, 2021]);
    }
}
