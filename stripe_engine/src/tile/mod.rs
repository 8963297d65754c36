//! Pre-rendered per-facility, per-year pixel buffers and their cache.

mod facility_year_tile;
mod tile_cache;

pub use facility_year_tile::render;
pub use tile_cache::TileCache;

use std::time::SystemTime;

/// Identifies one rendered tile: one facility, one year.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub facility_id: String,
    pub year: i32,
}

/// A pre-rendered pixel buffer: one column per day, one horizontal band per
/// unit. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTile {
    pub key: TileKey,
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
    /// `y0` of each unit's band, in the payload's canonical unit order.
    pub unit_row_offsets: Vec<u32>,
    pub rendered_at: SystemTime,
}

impl RenderedTile {
    pub fn size_bytes(&self) -> u64 {
        (self.width as u64) * (self.height as u64) * 4
    }
}
