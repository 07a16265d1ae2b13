//! Viewport state: center, zoom and screen size, mutated by user interaction

use crate::coord::MAX_SUPPORTED_ZOOM;
use crate::projection::{self, DEFAULT_TILE_SIZE, MAX_LATITUDE};
use geo::{Point, Rect};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What the map is looking at.
///
/// Every mutation ends with [`Viewport::clamp`], so the invariants hold between calls:
/// latitude within ±85.0511°, longitude in `[-180, 180)`, zoom within the configured
/// bounds and a finite, non-negative pixel size.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Viewport {
    /// Center in degrees (`x` = longitude, `y` = latitude)
    center: Point<f64>,
    zoom: u8,
    width_px: f64,
    height_px: f64,
    min_zoom: u8,
    max_zoom: u8,
    tile_size: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0, 2, 1024.0, 768.0)
    }
}

impl Viewport {
    /// Create a viewport with the default zoom bounds (0-19) and 256 px tiles
    pub fn new(center_lat: f64, center_lon: f64, zoom: u8, width_px: f64, height_px: f64) -> Self {
        let mut viewport = Self {
            center: Point::new(center_lon, center_lat),
            zoom,
            width_px,
            height_px,
            min_zoom: 0,
            max_zoom: 19,
            tile_size: DEFAULT_TILE_SIZE,
        };
        viewport.clamp();
        viewport
    }

    /// Restrict the zoom range; bounds are sorted and capped at the supported maximum
    pub fn with_zoom_bounds(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.set_zoom_bounds(min_zoom, max_zoom);
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size.max(1);
        self
    }

    pub fn set_zoom_bounds(&mut self, min_zoom: u8, max_zoom: u8) {
        let (lo, hi) = if min_zoom <= max_zoom {
            (min_zoom, max_zoom)
        } else {
            (max_zoom, min_zoom)
        };
        self.min_zoom = lo.min(MAX_SUPPORTED_ZOOM);
        self.max_zoom = hi.min(MAX_SUPPORTED_ZOOM);
        self.clamp();
    }

    pub fn center(&self) -> Point<f64> {
        self.center
    }

    pub fn center_lat(&self) -> f64 {
        self.center.y()
    }

    pub fn center_lon(&self) -> f64 {
        self.center.x()
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn width_px(&self) -> f64 {
        self.width_px
    }

    pub fn height_px(&self) -> f64 {
        self.height_px
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width_px, self.height_px)
    }

    /// Fractional tile position of the center at the current zoom
    pub fn center_tile_frac(&self) -> (f64, f64) {
        projection::point_to_tile_frac(self.center, self.zoom)
    }

    /// Move the map by a pixel delta (positive `dx` drags the content to the right).
    ///
    /// The delta is applied in tile space rather than in degrees, so motion stays
    /// visually linear regardless of Mercator stretching.
    pub fn pan(&mut self, dx_px: f64, dy_px: f64) {
        if !dx_px.is_finite() || !dy_px.is_finite() {
            return;
        }
        let tile_size = f64::from(self.tile_size);
        let (x, y) = self.center_tile_frac();
        let (lat, lon) =
            projection::tile_frac_to_geo(x - dx_px / tile_size, y - dy_px / tile_size, self.zoom);
        self.center = Point::new(lon, lat);
        self.clamp();
    }

    /// Zoom one level in (`direction > 0`) or out (`direction < 0`).
    ///
    /// Returns whether the zoom changed; at the bounds this is a no-op.
    pub fn zoom_by(&mut self, direction: i32) -> bool {
        let target = i32::from(self.zoom) + direction.signum();
        let target = target.clamp(i32::from(self.min_zoom), i32::from(self.max_zoom)) as u8;
        if target == self.zoom {
            return false;
        }
        self.zoom = target;
        self.clamp();
        true
    }

    /// Zoom one level while keeping the point under `anchor` (pixels from the viewport
    /// center) fixed on screen.
    pub fn zoom_around(&mut self, direction: i32, anchor_dx: f64, anchor_dy: f64) -> bool {
        let size = self.size();
        let tile_size = f64::from(self.tile_size);
        let anchor_screen = (size.0 / 2.0 + anchor_dx, size.1 / 2.0 + anchor_dy);
        let anchor = projection::screen_to_geo(anchor_screen, self.zoom, self.center, size, tile_size);

        if !self.zoom_by(direction) {
            return false;
        }

        let (ax, ay) = projection::point_to_tile_frac(anchor, self.zoom);
        let (lat, lon) = projection::tile_frac_to_geo(
            ax - anchor_dx / tile_size,
            ay - anchor_dy / tile_size,
            self.zoom,
        );
        self.center = Point::new(lon, lat);
        self.clamp();
        true
    }

    pub fn set_center(&mut self, lat: f64, lon: f64) {
        if lat.is_finite() && lon.is_finite() {
            self.center = Point::new(lon, lat);
        }
        self.clamp();
    }

    pub fn set_zoom(&mut self, zoom: u8) {
        self.zoom = zoom;
        self.clamp();
    }

    /// Update the pixel size; the visible tile set follows on the next redraw
    pub fn resize(&mut self, width_px: f64, height_px: f64) {
        self.width_px = width_px;
        self.height_px = height_px;
        self.clamp();
    }

    /// Center on a lat/lon box (`x` = longitude, `y` = latitude) and pick the deepest
    /// zoom at which the whole box still fits on screen.
    pub fn fit_bounds(&mut self, bounds: Rect<f64>) {
        let min = bounds.min();
        let max = bounds.max();
        let center_lat = (min.y + max.y) / 2.0;
        let center_lon = (min.x + max.x) / 2.0;
        self.set_center(center_lat, center_lon);

        let tile_size = f64::from(self.tile_size);
        let mut zoom = self.min_zoom;
        for candidate in self.min_zoom..=self.max_zoom {
            let (x0, y0) = projection::point_to_tile_frac(Point::new(min.x, max.y), candidate);
            let (x1, y1) = projection::point_to_tile_frac(Point::new(max.x, min.y), candidate);
            let span_w = (x1 - x0).abs() * tile_size;
            let span_h = (y1 - y0).abs() * tile_size;
            if span_w > self.width_px || span_h > self.height_px {
                break;
            }
            zoom = candidate;
        }
        self.set_zoom(zoom);

        tracing::trace!(
            "Fit to bounds: ({:.4}, {:.4}) - ({:.4}, {:.4}), zoom: {}",
            min.y,
            min.x,
            max.y,
            max.x,
            zoom
        );
    }

    /// Enforce the viewport invariants
    pub fn clamp(&mut self) {
        let lat = if self.center.y().is_finite() {
            self.center.y().clamp(-MAX_LATITUDE, MAX_LATITUDE)
        } else {
            0.0
        };
        let lon = if self.center.x().is_finite() {
            normalize_lon(self.center.x())
        } else {
            0.0
        };
        self.center = Point::new(lon, lat);

        self.zoom = self.zoom.clamp(self.min_zoom, self.max_zoom);

        self.width_px = sanitize_extent(self.width_px);
        self.height_px = sanitize_extent(self.height_px);
    }
}

/// Wrap a longitude into `[-180, 180)`
pub(crate) fn normalize_lon(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

fn sanitize_extent(px: f64) -> f64 {
    if px.is_finite() { px.max(0.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariants(viewport: &Viewport) {
        assert!(viewport.center_lat().abs() <= MAX_LATITUDE);
        assert!(viewport.center_lon() >= -180.0 && viewport.center_lon() < 180.0);
        assert!(viewport.zoom() >= viewport.min_zoom() && viewport.zoom() <= viewport.max_zoom());
    }

    #[test]
    fn test_normalize_lon() {
        assert_eq!(normalize_lon(0.0), 0.0);
        assert_eq!(normalize_lon(180.0), -180.0);
        assert_eq!(normalize_lon(-180.0), -180.0);
        assert!((normalize_lon(180.5) - (-179.5)).abs() < 1e-9);
        assert!((normalize_lon(-540.25) - 179.75).abs() < 1e-9);
        let tiny = normalize_lon(-1e-17);
        assert!((-180.0..180.0).contains(&tiny));
    }

    #[test]
    fn test_new_clamps_inputs() {
        let viewport = Viewport::new(89.0, 200.0, 30, -5.0, f64::NAN);
        assert_eq!(viewport.center_lat(), MAX_LATITUDE);
        assert!((viewport.center_lon() - (-160.0)).abs() < 1e-9);
        assert_eq!(viewport.zoom(), 19);
        assert_eq!(viewport.size(), (0.0, 0.0));
    }

    #[test]
    fn test_pan_across_antimeridian() {
        let mut viewport = Viewport::new(0.0, 179.999, 3, 800.0, 600.0);
        // Dragging the content left moves the center east; half a tile at z3 is 22.5°
        viewport.pan(-128.0, 0.0);
        assert_invariants(&viewport);
        assert!((viewport.center_lon() - (-157.501)).abs() < 1e-6);
        assert!(viewport.center_lat().abs() < 1e-9);
    }

    #[test]
    fn test_pan_is_linear_in_tile_space() {
        let mut viewport = Viewport::new(45.0, 10.0, 8, 800.0, 600.0);
        let (x0, y0) = viewport.center_tile_frac();
        viewport.pan(64.0, -32.0);
        let (x1, y1) = viewport.center_tile_frac();
        assert!(((x0 - x1) - 0.25).abs() < 1e-9);
        assert!(((y1 - y0) - 0.125).abs() < 1e-9);
    }

    #[test]
    fn test_pan_clamps_at_poles() {
        let mut viewport = Viewport::new(80.0, 0.0, 2, 800.0, 600.0);
        viewport.pan(0.0, 10_000.0);
        assert_eq!(viewport.center_lat(), MAX_LATITUDE);
        viewport.pan(0.0, -100_000.0);
        assert_eq!(viewport.center_lat(), -MAX_LATITUDE);
    }

    #[test]
    fn test_zoom_by_stops_at_bounds() {
        let mut viewport = Viewport::new(0.0, 0.0, 3, 800.0, 600.0).with_zoom_bounds(2, 4);
        assert!(viewport.zoom_by(1));
        assert_eq!(viewport.zoom(), 4);
        assert!(!viewport.zoom_by(1));
        assert_eq!(viewport.zoom(), 4);
        // Only the sign of the direction matters
        assert!(viewport.zoom_by(-5));
        assert_eq!(viewport.zoom(), 3);
        assert!(viewport.zoom_by(-1));
        assert!(!viewport.zoom_by(-1));
        assert_eq!(viewport.zoom(), 2);
        assert!(!viewport.zoom_by(0));
    }

    #[test]
    fn test_zoom_around_keeps_anchor_fixed() {
        let mut viewport = Viewport::new(48.8566, 2.3522, 10, 1000.0, 800.0);
        let size = viewport.size();
        let anchor_screen = (700.0, 250.0);
        let before = projection::screen_to_geo(
            anchor_screen,
            viewport.zoom(),
            viewport.center(),
            size,
            256.0,
        );

        assert!(viewport.zoom_around(1, 200.0, -150.0));
        assert_eq!(viewport.zoom(), 11);

        let after = projection::geo_screen_position(
            before,
            viewport.zoom(),
            viewport.center(),
            size,
            256.0,
        );
        assert!((after.0 - anchor_screen.0).abs() < 1e-6);
        assert!((after.1 - anchor_screen.1).abs() < 1e-6);
    }

    #[test]
    fn test_resize_sanitizes() {
        let mut viewport = Viewport::default();
        viewport.resize(900.0, 700.0);
        assert_eq!(viewport.size(), (900.0, 700.0));
        viewport.resize(f64::INFINITY, -1.0);
        assert_eq!(viewport.size(), (0.0, 0.0));
    }

    #[test]
    fn test_fit_bounds_picks_fitting_zoom() {
        let mut viewport = Viewport::new(0.0, 0.0, 0, 1024.0, 768.0);
        let bounds = Rect::new(
            geo::Coord { x: 2.2, y: 48.8 },
            geo::Coord { x: 2.5, y: 48.9 },
        );
        viewport.fit_bounds(bounds);
        assert!((viewport.center_lat() - 48.85).abs() < 1e-9);
        assert!((viewport.center_lon() - 2.35).abs() < 1e-9);
        // 0.3° of longitude spans ~873 px at z12 and ~1747 px at z13
        assert_eq!(viewport.zoom(), 12);
    }
}
