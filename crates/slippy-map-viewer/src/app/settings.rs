use crate::app::state::TilesProvider;
use crate::entrypoints::parse_args;
use clap::Parser;
use slippy_tiles::{Config, TileSourceConfig};
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Slippy Map Viewer - A desktop viewer for web-mercator raster tile maps
pub struct Settings {
    /// Tile provider to start with
    #[clap(long, value_enum, default_value = "open-street-map")]
    pub provider: TilesProvider,

    /// Custom URL template with {z}/{x}/{y} (and optionally {s}, {token}); overrides --provider
    #[clap(long, value_name = "TEMPLATE")]
    pub tile_url: Option<String>,

    /// Comma-separated subdomains substituted for {s} in a custom template
    #[clap(long, value_delimiter = ',')]
    pub subdomains: Vec<String>,

    /// User-Agent sent with every tile request
    #[clap(long)]
    pub user_agent: Option<String>,

    /// Access token substituted for {token} (also read from SLIPPY_ACCESS_TOKEN)
    #[clap(long)]
    pub access_token: Option<String>,

    /// Initial center latitude (defaults to the persisted view, then Ho Chi Minh City)
    #[clap(long, allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Initial center longitude
    #[clap(long, allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Initial zoom level
    #[clap(long)]
    pub zoom: Option<u8>,

    /// Minimum zoom level
    #[clap(long, default_value = "0")]
    pub min_zoom: u8,

    /// Maximum zoom level (further capped by the provider)
    #[clap(long, default_value = "19")]
    pub max_zoom: u8,

    /// Time budget for fetching and decoding one tile, in seconds
    #[clap(long, default_value = "15")]
    pub fetch_timeout_secs: u64,

    /// How long a finished fetch waits for room in the result queue, in seconds
    #[clap(long, default_value = "5")]
    pub delivery_timeout_secs: u64,

    /// Capacity of the result queue between fetch tasks and the UI
    #[clap(long, default_value = "64")]
    pub channel_capacity: usize,

    /// Extra tiles fetched around the visible area (at least 2)
    #[clap(long, default_value = "2")]
    pub margin: u32,

    /// Maximum number of decoded tiles kept in memory
    #[clap(long, default_value = "512")]
    pub cache_capacity: usize,

    /// Cap on simultaneous tile downloads (unlimited when omitted)
    #[clap(long)]
    pub max_concurrent: Option<usize>,

    /// Ignore previously persisted state and start fresh
    #[clap(long, default_value = "false")]
    pub ignore_persisted: bool,
}

impl Settings {
    /// Parse the command line, exiting with clap's message on error
    pub fn from_cli() -> Self {
        match parse_args::<Settings>() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Tile source for `provider`, or for the custom template when one was given
    pub fn source_for(&self, provider: TilesProvider) -> TileSourceConfig {
        let (url_template, subdomains) = match &self.tile_url {
            Some(url) => (url.clone(), self.subdomains.clone()),
            None => (
                provider.url().to_string(),
                provider.subdomains().iter().map(|s| s.to_string()).collect(),
            ),
        };

        TileSourceConfig {
            url_template,
            subdomains,
            user_agent: self.user_agent.clone().unwrap_or_else(|| {
                format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
            }),
            access_token: self
                .access_token
                .clone()
                .or_else(|| crate::entrypoints::get_env("SLIPPY_ACCESS_TOKEN")),
        }
    }

    /// Pipeline configuration for `provider`
    pub fn to_config(&self, provider: TilesProvider) -> Config {
        let max_zoom = match self.tile_url {
            Some(_) => self.max_zoom,
            None => self.max_zoom.min(provider.max_zoom()),
        };

        Config {
            min_zoom: self.min_zoom.min(max_zoom),
            max_zoom,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            delivery_timeout: Duration::from_secs(self.delivery_timeout_secs),
            result_channel_capacity: self.channel_capacity,
            prefetch_margin: self.margin,
            cache_capacity: self.cache_capacity,
            max_concurrent_fetches: self.max_concurrent,
            source: self.source_for(provider),
            ..Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Settings {
        Settings::try_parse_from(std::iter::once("slippy-map-viewer").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults_produce_valid_config() {
        let settings = parse(&[]);
        assert_eq!(settings.provider, TilesProvider::OpenStreetMap);
        let config = settings.to_config(settings.provider);
        assert!(config.validate().is_ok());
        assert_eq!(config.max_zoom, 19);
        assert_eq!(config.prefetch_margin, 2);
    }

    #[test]
    fn test_provider_caps_max_zoom() {
        let settings = parse(&["--provider", "open-topo-map"]);
        let config = settings.to_config(settings.provider);
        assert_eq!(config.max_zoom, TilesProvider::OpenTopoMap.max_zoom());
        assert!(config.source.url_template.contains("opentopomap"));
    }

    #[test]
    fn test_custom_template_with_subdomains() {
        let settings = parse(&[
            "--tile-url",
            "https://{s}.tiles.example.org/{z}/{x}/{y}.png",
            "--subdomains",
            "a,b",
            "--lat",
            "-33.86",
            "--lon",
            "151.2",
            "--max-concurrent",
            "8",
        ]);
        let config = settings.to_config(TilesProvider::OpenStreetMap);
        assert_eq!(config.source.subdomains, vec!["a", "b"]);
        assert_eq!(config.max_concurrent_fetches, Some(8));
        assert_eq!(settings.lat, Some(-33.86));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_margin_is_caught_by_validation() {
        let settings = parse(&["--margin", "1"]);
        assert!(settings.to_config(settings.provider).validate().is_err());
    }
}
