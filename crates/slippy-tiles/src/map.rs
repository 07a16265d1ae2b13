//! Host-facing facade tying viewport, planner, cache and fetch pipeline together

use crate::cache::{TileCache, TileImage, TileState, lock_cache};
use crate::config::Config;
use crate::coord::TileCoord;
use crate::fetch::{FetchPipeline, FetchResult};
use crate::planner::{PlannedTile, plan_visible_tiles};
use crate::projection;
use crate::source::{HttpFetcher, TileFetcher};
use crate::viewport::Viewport;
use crate::{Result, TileError};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// Notifications from the tile map to its host.
///
/// `result_ready` is called from fetch tasks (any thread) right after a result is
/// queued, `tiles_changed` from the drainer after the cache changed. Both are meant
/// to schedule a redraw, never to do work inline.
pub trait TileEvents: Send + Sync + 'static {
    fn result_ready(&self, coord: TileCoord);

    fn tiles_changed(&self) {}
}

/// Any `Fn()` works as a repaint hook, e.g. `move || ctx.request_repaint()`
impl<F> TileEvents for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn result_ready(&self, _coord: TileCoord) {
        self()
    }

    fn tiles_changed(&self) {
        self()
    }
}

/// Host that polls instead of listening
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl TileEvents for NoopEvents {
    fn result_ready(&self, _coord: TileCoord) {}
}

/// A cached tile placed on screen
#[derive(Debug, Clone)]
pub struct RenderableTile {
    pub coord: TileCoord,
    pub image: Arc<TileImage>,
    /// Top-left corner relative to the viewport's top-left, in pixels
    pub screen_x: f64,
    pub screen_y: f64,
}

/// What one call to [`TileMap::drain_results`] applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub loaded: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl DrainSummary {
    pub fn total(&self) -> usize {
        self.loaded + self.not_found + self.failed
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Lifetime counters of a [`TileMap`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Fetch tasks spawned
    pub launched: u64,
    /// Tiles inserted into the cache
    pub loaded: u64,
    /// 404 responses
    pub not_found: u64,
    /// Every other failed fetch, corrupt images included
    pub failed: u64,
    /// Results dropped because delivery timed out, the channel closed or shutdown hit
    pub abandoned: u64,
    /// Tiles pushed out of the cache by capacity
    pub evicted: u64,
    /// Decoded images with a zero dimension
    pub corrupt: u64,
}

/// Raster tile map state owned by the render thread.
///
/// Call [`TileMap::renderable_tiles`] once per frame: it applies finished fetches,
/// requests whatever the viewport is missing and returns the cached tiles with their
/// screen positions. Fetches run on the given tokio runtime and never touch the cache
/// except to release a coordinate they could not deliver.
pub struct TileMap<F: TileFetcher = HttpFetcher> {
    config: Config,
    viewport: Viewport,
    cache: Arc<Mutex<TileCache>>,
    pipeline: FetchPipeline<F>,
    results: mpsc::Receiver<FetchResult>,
    events: Arc<dyn TileEvents>,
    stats: PipelineStats,
}

impl TileMap<HttpFetcher> {
    /// Tile map backed by an HTTP fetcher for `config.source`
    pub fn with_http(
        config: Config,
        viewport: Viewport,
        runtime: Handle,
        events: impl TileEvents,
    ) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.source.clone(), config.fetch_timeout)?;
        Self::new(config, viewport, fetcher, runtime, events)
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<F: TileFetcher> TileMap<F> {
    /// Validate `config` and set up the cache and pipeline.
    ///
    /// The viewport adopts the configured tile size and zoom bounds.
    pub fn new(
        config: Config,
        viewport: Viewport,
        fetcher: F,
        runtime: Handle,
        events: impl TileEvents,
    ) -> Result<Self> {
        config.validate()?;

        let viewport = viewport
            .with_tile_size(config.tile_size)
            .with_zoom_bounds(config.min_zoom, config.max_zoom);
        let cache = Arc::new(Mutex::new(TileCache::new(config.cache_capacity()?)));
        let events: Arc<dyn TileEvents> = Arc::new(events);
        let (pipeline, results) = FetchPipeline::new(
            &config,
            Arc::new(fetcher),
            runtime,
            cache.clone(),
            events.clone(),
        );

        tracing::debug!(
            "Tile map ready: cache {} tiles, channel {}, margin {}",
            config.cache_capacity,
            config.result_channel_capacity,
            config.prefetch_margin
        );

        Ok(Self {
            config,
            viewport,
            cache,
            pipeline,
            results,
            events,
            stats: PipelineStats::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Mutable access for pan/zoom/resize; the next frame plans from the new state
    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    /// Replace center, zoom and size at once (values are clamped)
    pub fn set_viewport(&mut self, lat: f64, lon: f64, zoom: u8, width_px: f64, height_px: f64) {
        self.viewport.set_center(lat, lon);
        self.viewport.set_zoom(zoom);
        self.viewport.resize(width_px, height_px);
    }

    /// Apply every result currently queued, without blocking.
    ///
    /// Each result releases its in-flight marker. Images go into the cache; failures
    /// leave the tile absent so a later frame retries it.
    pub fn drain_results(&mut self) -> DrainSummary {
        #[cfg(feature = "profiling")]
        profiling::scope!("drain_results");

        let mut drained = Vec::new();
        while let Ok(result) = self.results.try_recv() {
            drained.push(result);
        }
        if drained.is_empty() {
            return DrainSummary::default();
        }

        let mut summary = DrainSummary::default();
        let mut evicted = 0u64;
        let mut corrupt = 0u64;
        {
            let mut cache = lock_cache(&self.cache);
            for FetchResult { coord, outcome } in drained {
                cache.finish_fetch(&coord);
                match outcome {
                    Ok(image) if image.is_empty() => {
                        cache.remove(&coord);
                        corrupt += 1;
                        summary.failed += 1;
                        tracing::warn!("Discarding zero-sized image for tile {}", coord);
                    }
                    Ok(image) => {
                        if let Some(old) = cache.insert(coord, image) {
                            evicted += 1;
                            tracing::trace!("Evicted tile {}", old);
                        }
                        summary.loaded += 1;
                    }
                    Err(TileError::NotFound) => {
                        summary.not_found += 1;
                        tracing::debug!("Tile {} not found on server", coord);
                    }
                    Err(err @ TileError::InternalFault(_)) => {
                        summary.failed += 1;
                        tracing::error!("Tile {} failed with internal fault: {}", coord, err);
                    }
                    Err(err) => {
                        summary.failed += 1;
                        tracing::warn!("Failed to fetch tile {}: {}", coord, err);
                    }
                }
            }
        }

        self.stats.loaded += summary.loaded as u64;
        self.stats.not_found += summary.not_found as u64;
        self.stats.failed += summary.failed as u64;
        self.stats.evicted += evicted;
        self.stats.corrupt += corrupt;

        tracing::trace!(
            "Drained {} results ({} loaded, {} not found, {} failed)",
            summary.total(),
            summary.loaded,
            summary.not_found,
            summary.failed
        );
        self.events.tiles_changed();
        summary
    }

    /// Launch a fetch for every planned tile that is neither cached nor in flight.
    ///
    /// Returns the number of fetches launched. Does nothing after shutdown.
    pub fn request_visible_tiles(&mut self) -> usize {
        let planned = plan_visible_tiles(&self.viewport, self.config.prefetch_margin);
        self.request_planned(&planned)
    }

    fn request_planned(&mut self, planned: &[PlannedTile]) -> usize {
        #[cfg(feature = "profiling")]
        profiling::scope!("request_planned");

        if self.pipeline.is_shut_down() {
            return 0;
        }

        // Center tiles first, so a concurrency cap serves what the user looks at
        let (center_x, center_y) = self.viewport.center_tile_frac();
        let mut ordered: Vec<&PlannedTile> = planned.iter().collect();
        ordered.sort_by(|a, b| {
            let distance = |tile: &PlannedTile| {
                let dx = tile.column as f64 + 0.5 - center_x;
                let dy = tile.row as f64 + 0.5 - center_y;
                dx * dx + dy * dy
            };
            distance(a).total_cmp(&distance(b))
        });

        let to_launch: Vec<TileCoord> = {
            let mut cache = lock_cache(&self.cache);
            ordered
                .into_iter()
                .filter(|tile| cache.begin_fetch(tile.coord))
                .map(|tile| tile.coord)
                .collect()
        };

        for coord in &to_launch {
            self.pipeline.launch(*coord);
        }
        if !to_launch.is_empty() {
            tracing::debug!(
                "Requested {} tiles at zoom {}",
                to_launch.len(),
                self.viewport.zoom()
            );
        }
        self.stats.launched += to_launch.len() as u64;
        to_launch.len()
    }

    /// Drain, plan, request, and return the cached tiles to draw this frame.
    ///
    /// Tiles still loading are simply missing from the list. At low zooms the same
    /// image can appear once per visible world copy.
    pub fn renderable_tiles(&mut self) -> Vec<RenderableTile> {
        #[cfg(feature = "profiling")]
        profiling::scope!("renderable_tiles");

        self.drain_results();
        let planned = plan_visible_tiles(&self.viewport, self.config.prefetch_margin);
        self.request_planned(&planned);

        let zoom = self.viewport.zoom();
        let center = self.viewport.center();
        let size = self.viewport.size();
        let tile_size = f64::from(self.viewport.tile_size());

        let mut cache = lock_cache(&self.cache);
        planned
            .into_iter()
            .filter_map(|tile| {
                let image = cache.get(&tile.coord)?;
                let (screen_x, screen_y) = projection::tile_screen_position(
                    tile.column,
                    tile.row,
                    zoom,
                    center,
                    size,
                    tile_size,
                );
                Some(RenderableTile {
                    coord: tile.coord,
                    image,
                    screen_x,
                    screen_y,
                })
            })
            .collect()
    }

    /// Screen pixel of a geographic point in the current viewport
    pub fn geo_to_screen(&self, lat: f64, lon: f64) -> (f64, f64) {
        projection::geo_screen_position(
            geo::Point::new(lon, lat),
            self.viewport.zoom(),
            self.viewport.center(),
            self.viewport.size(),
            f64::from(self.viewport.tile_size()),
        )
    }

    pub fn tile_state(&self, coord: &TileCoord) -> TileState {
        lock_cache(&self.cache).state(coord)
    }

    pub fn cached_len(&self) -> usize {
        lock_cache(&self.cache).len()
    }

    pub fn in_flight_len(&self) -> usize {
        lock_cache(&self.cache).in_flight_len()
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            abandoned: self.pipeline.abandoned(),
            ..self.stats
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.pipeline.is_shut_down()
    }

    /// Stop all fetch tasks and refuse new requests. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if self.pipeline.shutdown() {
            tracing::info!(
                "Tile map shut down with {} fetches in flight",
                self.in_flight_len()
            );
        }
    }
}

impl<F: TileFetcher> Drop for TileMap<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
