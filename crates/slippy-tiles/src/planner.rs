//! Visible-tile planning: which tiles cover the viewport plus a prefetch margin

use crate::coord::{TileCoord, tiles_per_axis};
use crate::viewport::Viewport;
use std::collections::HashSet;

/// Smallest margin (in tiles) added to the screen span, so edges are prefetched
pub const MIN_PREFETCH_MARGIN: u32 = 2;

/// One cell of the planned grid.
///
/// `column`/`row` are the unwrapped grid indices used for screen placement; `coord`
/// is the wrapped coordinate used to fetch and cache the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedTile {
    pub coord: TileCoord,
    pub column: i64,
    pub row: i64,
}

/// Upper bound on the capacity reserved up front for a plan
const MAX_PREALLOCATED_TILES: usize = 1 << 16;

/// Grid dimensions `(columns, rows)` needed to cover the viewport plus `margin`.
///
/// Rows are capped at two world heights plus the margin: any centered grid that
/// tall already spans every row of the world.
pub fn grid_span(viewport: &Viewport, margin: u32) -> (u32, u32) {
    let tile_size = f64::from(viewport.tile_size());
    let margin = margin.max(MIN_PREFETCH_MARGIN);
    let columns = ((viewport.width_px() / tile_size).ceil() as u32).saturating_add(margin);
    let rows = ((viewport.height_px() / tile_size).ceil() as u32).saturating_add(margin);
    let max_rows = tiles_per_axis(viewport.zoom())
        .saturating_mul(2)
        .saturating_add(margin);
    (columns, rows.min(max_rows))
}

/// Plan the grid of tiles around the viewport center, in row-major order.
///
/// Rows beyond either pole are dropped; columns are wrapped around the antimeridian,
/// so at low zooms the same tile can appear in several columns.
pub fn plan_visible_tiles(viewport: &Viewport, margin: u32) -> Vec<PlannedTile> {
    #[cfg(feature = "profiling")]
    profiling::scope!("plan_visible_tiles");

    let zoom = viewport.zoom();
    let (center_x, center_y) = viewport.center_tile_frac();
    let (columns, rows) = grid_span(viewport, margin);

    // Rounding splits the margin evenly between opposite edges
    let first_column = (center_x - f64::from(columns) / 2.0).round() as i64;
    let first_row = (center_y - f64::from(rows) / 2.0).round() as i64;

    let capacity = (columns as usize).saturating_mul(rows as usize);
    let mut planned = Vec::with_capacity(capacity.min(MAX_PREALLOCATED_TILES));
    for row in first_row..first_row + i64::from(rows) {
        for column in first_column..first_column + i64::from(columns) {
            if let Some(coord) = TileCoord::from_grid(zoom, column, row) {
                planned.push(PlannedTile { coord, column, row });
            }
        }
    }
    planned
}

/// The distinct set of tile coordinates needed for the viewport
pub fn compute_visible_tiles(viewport: &Viewport, margin: u32) -> HashSet<TileCoord> {
    plan_visible_tiles(viewport, margin)
        .into_iter()
        .map(|tile| tile.coord)
        .collect()
}
