//! Spherical Web-Mercator math between geographic, tile and screen coordinates
//!
//! Geographic positions are `geo::Point<f64>` with `x = longitude` and `y = latitude`.
//! Screen positions are pixels measured from the viewport's top-left corner, with the
//! viewport center at `(width / 2, height / 2)`.

use geo::Point;
use std::f64::consts::PI;

/// Maximum latitude handled by the projection (Mercator-valid band)
pub const MAX_LATITUDE: f64 = 85.0511;

/// Edge length of a standard raster tile in pixels
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Forward projection: (lat, lon) in degrees to fractional tile coordinates.
///
/// Only defined for `|lat| < 85.0511`; the result diverges towards the poles, so
/// callers clamp the latitude first.
#[inline(always)]
pub fn geo_to_tile_frac(lat: f64, lon: f64, zoom: u8) -> (f64, f64) {
    let n = zoom_scale(zoom);
    let x = (lon + 180.0) / 360.0 * n;
    let lat_rad = lat.to_radians();
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;
    (x, y)
}

/// Inverse projection: fractional tile coordinates to (lat, lon) in degrees
#[inline(always)]
pub fn tile_frac_to_geo(x: f64, y: f64, zoom: u8) -> (f64, f64) {
    let n = zoom_scale(zoom);
    let lon = x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
    (lat, lon)
}

/// `2^zoom` as a float
#[inline(always)]
pub fn zoom_scale(zoom: u8) -> f64 {
    2f64.powi(i32::from(zoom))
}

/// Fractional tile position of a geographic point, with the latitude clamped first
#[inline(always)]
pub fn point_to_tile_frac(position: Point<f64>, zoom: u8) -> (f64, f64) {
    let lat = position.y().clamp(-MAX_LATITUDE, MAX_LATITUDE);
    geo_to_tile_frac(lat, position.x(), zoom)
}

/// Screen position of a fractional tile position given the fractional viewport center.
///
/// Tiles and markers both go through this function so they share the same sub-pixel
/// center and never drift against each other.
#[inline(always)]
pub fn frac_to_screen(
    frac: (f64, f64),
    center_frac: (f64, f64),
    viewport_size: (f64, f64),
    tile_size: f64,
) -> (f64, f64) {
    (
        viewport_size.0 / 2.0 + (frac.0 - center_frac.0) * tile_size,
        viewport_size.1 / 2.0 + (frac.1 - center_frac.1) * tile_size,
    )
}

/// Top-left screen pixel of the tile at an (unwrapped) grid column/row.
///
/// The column is taken as-is so tiles east of the antimeridian keep their place next
/// to the viewport center instead of jumping a world width away.
pub fn tile_screen_position(
    column: i64,
    row: i64,
    zoom: u8,
    center: Point<f64>,
    viewport_size: (f64, f64),
    tile_size: f64,
) -> (f64, f64) {
    let center_frac = point_to_tile_frac(center, zoom);
    frac_to_screen(
        (column as f64, row as f64),
        center_frac,
        viewport_size,
        tile_size,
    )
}

/// Screen pixel of a geographic marker, using the world copy nearest to the center
pub fn geo_screen_position(
    position: Point<f64>,
    zoom: u8,
    center: Point<f64>,
    viewport_size: (f64, f64),
    tile_size: f64,
) -> (f64, f64) {
    let n = zoom_scale(zoom);
    let center_frac = point_to_tile_frac(center, zoom);
    let (mut x, y) = point_to_tile_frac(position, zoom);
    let dx = x - center_frac.0;
    x -= n * (dx / n).round();
    frac_to_screen((x, y), center_frac, viewport_size, tile_size)
}

/// Geographic position under a screen pixel (inverse of [`geo_screen_position`]).
///
/// The longitude is not normalized; the latitude is clamped to the Mercator band.
pub fn screen_to_geo(
    screen: (f64, f64),
    zoom: u8,
    center: Point<f64>,
    viewport_size: (f64, f64),
    tile_size: f64,
) -> Point<f64> {
    let center_frac = point_to_tile_frac(center, zoom);
    let x = center_frac.0 + (screen.0 - viewport_size.0 / 2.0) / tile_size;
    let y = center_frac.1 + (screen.1 - viewport_size.1 / 2.0) / tile_size;
    let (lat, lon) = tile_frac_to_geo(x, y, zoom);
    Point::new(lon, lat.clamp(-MAX_LATITUDE, MAX_LATITUDE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_is_world_center() {
        let (x, y) = geo_to_tile_frac(0.0, 0.0, 1);
        assert!((x - 1.0).abs() < 1e-12);
        assert!((y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_known_tile() {
        // Ho Chi Minh City at zoom 12
        let (x, y) = geo_to_tile_frac(10.7769, 106.7009, 12);
        assert_eq!(x.floor() as u32, 3262);
        assert_eq!(y.floor() as u32, 1924);
    }

    #[test]
    fn test_roundtrip_over_zoom_range() {
        let lats = [-85.05, -60.0, -10.5, 0.0, 10.7769, 51.5074, 85.05];
        let lons = [-180.0, -122.4, -0.1278, 0.0, 106.7009, 179.999];
        for zoom in 0..=crate::MAX_SUPPORTED_ZOOM {
            for &lat in &lats {
                for &lon in &lons {
                    let (x, y) = geo_to_tile_frac(lat, lon, zoom);
                    let (lat2, lon2) = tile_frac_to_geo(x, y, zoom);
                    assert!((lat - lat2).abs() < 1e-9, "lat {lat} at z{zoom}: {lat2}");
                    assert!((lon - lon2).abs() < 1e-9, "lon {lon} at z{zoom}: {lon2}");
                }
            }
        }
    }

    #[test]
    fn test_max_latitude_stays_inside_grid() {
        let (_, top) = geo_to_tile_frac(MAX_LATITUDE, 0.0, 4);
        let (_, bottom) = geo_to_tile_frac(-MAX_LATITUDE, 0.0, 4);
        assert!(top >= 0.0 && top < 1e-3);
        assert!(bottom <= 16.0 && bottom > 16.0 - 1e-3);
    }

    #[test]
    fn test_center_tile_projects_to_viewport_center() {
        let center = Point::new(106.7009, 10.7769);
        let (cx, cy) = point_to_tile_frac(center, 12);
        let (sx, sy) = frac_to_screen((cx, cy), (cx, cy), (900.0, 700.0), 256.0);
        assert_eq!((sx, sy), (450.0, 350.0));

        let (marker_x, marker_y) = geo_screen_position(center, 12, center, (900.0, 700.0), 256.0);
        assert!((marker_x - 450.0).abs() < 1e-6);
        assert!((marker_y - 350.0).abs() < 1e-6);
    }

    #[test]
    fn test_tile_and_marker_share_subpixel_center() {
        let center = Point::new(2.3522, 48.8566);
        let zoom = 10;
        let (fx, fy) = point_to_tile_frac(center, zoom);
        let (col, row) = (fx.floor() as i64, fy.floor() as i64);

        // A marker at the tile's top-left corner lands exactly on the tile's screen corner
        let (lat, lon) = tile_frac_to_geo(col as f64, row as f64, zoom);
        let tile = tile_screen_position(col, row, zoom, center, (800.0, 600.0), 256.0);
        let marker = geo_screen_position(Point::new(lon, lat), zoom, center, (800.0, 600.0), 256.0);
        assert!((tile.0 - marker.0).abs() < 1e-6);
        assert!((tile.1 - marker.1).abs() < 1e-6);
    }

    #[test]
    fn test_marker_uses_nearest_world_copy() {
        let center = Point::new(179.5, 0.0);
        let marker = Point::new(-179.5, 0.0);
        let (x, _) = geo_screen_position(marker, 2, center, (512.0, 512.0), 256.0);
        // One degree east of the center, not a world width away
        let expected = 256.0 + 1.0 / 360.0 * 4.0 * 256.0;
        assert!((x - expected).abs() < 1e-6);
    }

    #[test]
    fn test_screen_to_geo_inverts_marker_projection() {
        let center = Point::new(-0.1278, 51.5074);
        let marker = Point::new(-0.1, 51.52);
        let screen = geo_screen_position(marker, 14, center, (1280.0, 720.0), 256.0);
        let back = screen_to_geo(screen, 14, center, (1280.0, 720.0), 256.0);
        assert!((back.x() - marker.x()).abs() < 1e-9);
        assert!((back.y() - marker.y()).abs() < 1e-9);
    }
}
