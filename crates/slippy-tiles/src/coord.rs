//! Tile coordinates in the standard XYZ web-map scheme

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Deepest zoom level the coordinate math supports (`2^24` tiles per axis fits in `u32`)
pub const MAX_SUPPORTED_ZOOM: u8 = 24;

/// Identifies one raster tile: at `zoom` the world is `2^zoom × 2^zoom` tiles.
///
/// `x` grows eastward and wraps around the antimeridian, `y` grows southward and
/// covers only the Mercator-valid latitude band, so it never wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileCoord {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub const fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// Build a coordinate from an unbounded grid position.
    ///
    /// The column is wrapped around the antimeridian; rows past either pole have no
    /// tile and yield `None`.
    pub fn from_grid(zoom: u8, column: i64, row: i64) -> Option<Self> {
        let n = i64::from(tiles_per_axis(zoom));
        if row < 0 || row >= n {
            return None;
        }
        Some(Self {
            zoom,
            x: wrap_x(column, zoom),
            y: row as u32,
        })
    }

    /// Whether both indices fall inside the `2^zoom` grid
    pub fn is_valid(&self) -> bool {
        self.zoom <= MAX_SUPPORTED_ZOOM && {
            let n = tiles_per_axis(self.zoom);
            self.x < n && self.y < n
        }
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Number of tiles along one axis at `zoom`
#[inline(always)]
pub fn tiles_per_axis(zoom: u8) -> u32 {
    1u32 << zoom.min(MAX_SUPPORTED_ZOOM)
}

/// Wrap a horizontal tile index into `[0, 2^zoom - 1]`, handling negative input
#[inline(always)]
pub fn wrap_x(x: i64, zoom: u8) -> u32 {
    let n = i64::from(tiles_per_axis(zoom));
    (((x % n) + n) % n) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_x_examples() {
        assert_eq!(wrap_x(-1, 3), 7);
        assert_eq!(wrap_x(8, 3), 0);
        assert_eq!(wrap_x(3, 3), 3);
        assert_eq!(wrap_x(-17, 3), 7);
        assert_eq!(wrap_x(-1, 0), 0);
    }

    #[test]
    fn test_wrap_x_is_idempotent_and_in_range() {
        for zoom in 0..=6u8 {
            let n = tiles_per_axis(zoom);
            for x in -100i64..100 {
                let once = wrap_x(x, zoom);
                assert!(once < n);
                assert_eq!(wrap_x(i64::from(once), zoom), once);
            }
        }
    }

    #[test]
    fn test_from_grid_drops_rows_past_poles() {
        assert_eq!(TileCoord::from_grid(2, 1, -1), None);
        assert_eq!(TileCoord::from_grid(2, 1, 4), None);
        assert_eq!(TileCoord::from_grid(2, -1, 3), Some(TileCoord::new(2, 3, 3)));
    }

    #[test]
    fn test_value_equality_and_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(TileCoord::new(5, 3, 3));
        assert!(set.contains(&TileCoord::new(5, 3, 3)));
        assert!(!set.contains(&TileCoord::new(5, 3, 4)));
        assert_eq!(TileCoord::new(5, 3, 3).to_string(), "5/3/3");
    }

    #[test]
    fn test_is_valid() {
        assert!(TileCoord::new(0, 0, 0).is_valid());
        assert!(!TileCoord::new(0, 1, 0).is_valid());
        assert!(TileCoord::new(3, 7, 7).is_valid());
        assert!(!TileCoord::new(3, 7, 8).is_valid());
    }
}
