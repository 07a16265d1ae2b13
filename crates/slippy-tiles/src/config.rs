//! Configuration for the tile map and its tile source

use crate::coord::MAX_SUPPORTED_ZOOM;
use crate::planner::MIN_PREFETCH_MARGIN;
use crate::projection::DEFAULT_TILE_SIZE;
use crate::viewport::Viewport;
use crate::{Result, TileError};
use std::num::NonZeroUsize;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Where tiles come from and how requests identify themselves
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileSourceConfig {
    /// URL template with `{z}`, `{x}`, `{y}` and optionally `{s}` (subdomain) and
    /// `{token}` (access token) placeholders
    pub url_template: String,
    /// Subdomains substituted for `{s}`, chosen by `(x + y) mod len`
    pub subdomains: Vec<String>,
    /// Sent as the `User-Agent` header
    pub user_agent: String,
    /// Substituted for `{token}`
    pub access_token: Option<String>,
}

impl Default for TileSourceConfig {
    fn default() -> Self {
        Self {
            url_template: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            subdomains: Vec::new(),
            user_agent: format!(
                "{}/{} (slippy map tile client)",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ),
            access_token: None,
        }
    }
}

/// Configuration for a [`crate::TileMap`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Tile edge in pixels (default 256)
    pub tile_size: u32,
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Budget for one network fetch including decode (default 15 s)
    pub fetch_timeout: Duration,
    /// How long a finished fetch waits for room in the result channel before it
    /// gives up and drops the tile (default 5 s)
    pub delivery_timeout: Duration,
    /// Capacity of the bounded result channel (default 64)
    pub result_channel_capacity: usize,
    /// Extra tiles planned around the screen, at least 2 (default 2)
    pub prefetch_margin: u32,
    /// Maximum number of decoded tiles kept in memory (default 512)
    pub cache_capacity: usize,
    /// Cap on simultaneous fetches; `None` launches every missing tile at once
    pub max_concurrent_fetches: Option<usize>,
    pub source: TileSourceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            min_zoom: 0,
            max_zoom: 19,
            fetch_timeout: Duration::from_secs(15),
            delivery_timeout: Duration::from_secs(5),
            result_channel_capacity: 64,
            prefetch_margin: MIN_PREFETCH_MARGIN,
            cache_capacity: 512,
            max_concurrent_fetches: None,
            source: TileSourceConfig::default(),
        }
    }
}

impl Config {
    /// Check every option, reporting the first problem found
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(TileError::InvalidConfig(msg));

        if self.tile_size == 0 {
            return invalid("tile_size must be positive".into());
        }
        if self.min_zoom > self.max_zoom {
            return invalid(format!(
                "min_zoom ({}) is greater than max_zoom ({})",
                self.min_zoom, self.max_zoom
            ));
        }
        if self.max_zoom > MAX_SUPPORTED_ZOOM {
            return invalid(format!(
                "max_zoom ({}) exceeds the supported maximum ({MAX_SUPPORTED_ZOOM})",
                self.max_zoom
            ));
        }
        if self.fetch_timeout.is_zero() || self.delivery_timeout.is_zero() {
            return invalid("timeouts must be non-zero".into());
        }
        if self.result_channel_capacity == 0 {
            return invalid("result_channel_capacity must be positive".into());
        }
        if self.prefetch_margin < MIN_PREFETCH_MARGIN {
            return invalid(format!(
                "prefetch_margin must be at least {MIN_PREFETCH_MARGIN}"
            ));
        }
        if self.cache_capacity == 0 {
            return invalid("cache_capacity must be positive".into());
        }
        if self.max_concurrent_fetches == Some(0) {
            return invalid("max_concurrent_fetches must be positive when set".into());
        }

        let template = &self.source.url_template;
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !template.contains(placeholder) {
                return invalid(format!("url_template is missing {placeholder}"));
            }
        }
        if template.contains("{s}") && self.source.subdomains.is_empty() {
            return invalid("url_template uses {s} but no subdomains are configured".into());
        }
        if template.contains("{token}") && self.source.access_token.is_none() {
            return invalid("url_template uses {token} but no access_token is configured".into());
        }
        Ok(())
    }

    pub(crate) fn cache_capacity(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.cache_capacity)
            .ok_or_else(|| TileError::InvalidConfig("cache_capacity must be positive".into()))
    }

    /// Build a viewport that honours this configuration's zoom bounds and tile size
    pub fn viewport(
        &self,
        center_lat: f64,
        center_lon: f64,
        zoom: u8,
        width_px: f64,
        height_px: f64,
    ) -> Viewport {
        let mut viewport = Viewport::new(center_lat, center_lon, zoom, width_px, height_px)
            .with_tile_size(self.tile_size)
            .with_zoom_bounds(self.min_zoom, self.max_zoom);
        viewport.set_zoom(zoom);
        viewport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let cases: Vec<Box<dyn Fn(&mut Config)>> = vec![
            Box::new(|c| c.tile_size = 0),
            Box::new(|c| c.min_zoom = 10),
            Box::new(|c| c.max_zoom = 30),
            Box::new(|c| c.fetch_timeout = Duration::ZERO),
            Box::new(|c| c.delivery_timeout = Duration::ZERO),
            Box::new(|c| c.result_channel_capacity = 0),
            Box::new(|c| c.prefetch_margin = 1),
            Box::new(|c| c.cache_capacity = 0),
            Box::new(|c| c.max_concurrent_fetches = Some(0)),
            Box::new(|c| c.source.url_template = "https://example.com/{z}/{x}.png".into()),
            Box::new(|c| c.source.url_template = "https://{s}.example.com/{z}/{x}/{y}.png".into()),
            Box::new(|c| {
                c.source.url_template = "https://example.com/{z}/{x}/{y}.png?key={token}".into()
            }),
        ];

        for (i, mutate) in cases.iter().enumerate() {
            let mut config = Config {
                max_zoom: 9,
                ..Config::default()
            };
            mutate(&mut config);
            assert!(
                matches!(config.validate(), Err(TileError::InvalidConfig(_))),
                "case {i} should be rejected"
            );
        }
    }

    #[test]
    fn test_viewport_uses_zoom_bounds() {
        let config = Config {
            min_zoom: 3,
            max_zoom: 12,
            tile_size: 512,
            ..Config::default()
        };
        let viewport = config.viewport(0.0, 0.0, 18, 800.0, 600.0);
        assert_eq!(viewport.zoom(), 12);
        assert_eq!(viewport.tile_size(), 512);
        assert_eq!(config.viewport(0.0, 0.0, 1, 800.0, 600.0).zoom(), 3);
    }
}
