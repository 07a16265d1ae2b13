//! Slippy Tiles - Tile Cache and Fetch Pipeline for Web-Mercator Raster Maps
//!
//! This library decides which 256×256 raster tiles a viewport needs, fetches the
//! missing ones concurrently without ever blocking the render loop, and hands the
//! decoded images back to a single-threaded consumer through a bounded channel.
//!
//! # Architecture
//!
//! - **[`projection`]**: Pure Web-Mercator math between lat/lon, fractional tiles and screen pixels
//! - **[`Viewport`]**: Center, zoom and screen size, mutated by pan/zoom/resize
//! - **[`planner`]**: Visible tile set (screen + prefetch margin) with antimeridian wrap
//! - **[`TileCache`]**: Bounded LRU of decoded tiles plus the in-flight markers
//! - **[`FetchPipeline`]**: One task per missing tile, timeouts, panic guard, backpressure
//! - **[`TileMap`]**: Host facade that drains results, plans, requests and renders
//!
//! # Concurrency
//!
//! Fetch tasks never mutate the cache. They send immutable [`FetchResult`]s over a
//! bounded channel, and the redraw path drains them before planning. The only state
//! shared with tasks is the `{cache, in-flight}` pair behind a single mutex, which a
//! task touches only to clear its own marker when it gives up on delivery.

mod cache;
mod config;
mod coord;
mod fetch;
mod map;
pub mod planner;
pub mod projection;
mod source;
mod viewport;

// Public API exports
pub use cache::{TileCache, TileImage, TileState};
pub use config::{Config, TileSourceConfig};
pub use coord::{MAX_SUPPORTED_ZOOM, TileCoord, tiles_per_axis, wrap_x};
pub use fetch::{FetchPipeline, FetchResult, ShutdownSignal};
pub use map::{DrainSummary, NoopEvents, PipelineStats, RenderableTile, TileEvents, TileMap};
pub use planner::PlannedTile;
pub use source::{HttpFetcher, TileFetcher, classify_status, tile_url};
pub use viewport::Viewport;

/// How a transport-level failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The request (or the whole fetch) exceeded its time budget
    Timeout,
    /// The fetch was interrupted by shutdown
    Cancelled,
    /// Connection could not be established
    Connect,
    /// Anything else reported by the HTTP client
    Other,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Connect => "connect",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Error types for the tile pipeline
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TileError {
    /// Expected absence (HTTP 404). Not a failure worth logging.
    #[error("tile not found")]
    NotFound,

    #[error("transport error ({kind}): {message}")]
    Transport { kind: TransportKind, message: String },

    #[error("tile server responded with HTTP {status}")]
    ServerError { status: u16 },

    #[error("tile decode error: {0}")]
    Decode(String),

    #[error("internal fault in fetch task: {0}")]
    InternalFault(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl TileError {
    /// Soft errors are expected conditions (missing coverage) and are not logged as failures
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub(crate) fn timeout(message: impl Into<String>) -> Self {
        Self::Transport {
            kind: TransportKind::Timeout,
            message: message.into(),
        }
    }

    pub(crate) fn cancelled(message: impl Into<String>) -> Self {
        Self::Transport {
            kind: TransportKind::Cancelled,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TileError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportKind::Timeout
        } else if err.is_connect() {
            TransportKind::Connect
        } else {
            TransportKind::Other
        };
        Self::Transport {
            kind,
            message: err.to_string(),
        }
    }
}

impl From<image::ImageError> for TileError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that the main entry points are accessible
        let _: fn() -> Config = Config::default;
        let _: fn(u8, u32, u32) -> TileCoord = TileCoord::new;
    }

    #[test]
    fn test_only_not_found_is_soft() {
        assert!(TileError::NotFound.is_soft());
        assert!(!TileError::ServerError { status: 500 }.is_soft());
        assert!(!TileError::timeout("slow").is_soft());
        assert!(!TileError::Decode("bad".into()).is_soft());
        assert!(!TileError::InternalFault("boom".into()).is_soft());
    }

    #[test]
    fn test_transport_display_names_kind() {
        let err = TileError::cancelled("shutdown");
        assert_eq!(err.to_string(), "transport error (cancelled): shutdown");
    }
}
