//! Tile sources: the fetcher seam and the HTTP implementation

use crate::config::TileSourceConfig;
use crate::coord::TileCoord;
use crate::{Result, TileError};
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::time::Duration;

/// Downloads the encoded bytes of a tile.
///
/// The pipeline owns timeouts, decoding and delivery; implementations only
/// perform the transfer and classify what came back. Tests plug in scripted
/// fetchers through this trait.
pub trait TileFetcher: Send + Sync + 'static {
    fn fetch(&self, coord: TileCoord) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// reqwest-backed fetcher for `{z}/{x}/{y}` style tile servers
pub struct HttpFetcher {
    client: Client,
    source: TileSourceConfig,
}

impl HttpFetcher {
    /// Create a fetcher with its own connection pool.
    ///
    /// `request_timeout` bounds each HTTP request; the pipeline applies its own
    /// fetch timeout on top.
    pub fn new(source: TileSourceConfig, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(source.user_agent.clone())
            .timeout(request_timeout)
            .build()
            .map_err(|e| TileError::Client(e.to_string()))?;

        Ok(Self { client, source })
    }

    pub fn source(&self) -> &TileSourceConfig {
        &self.source
    }

    pub fn tile_url(&self, coord: TileCoord) -> String {
        tile_url(&self.source, coord)
    }
}

impl TileFetcher for HttpFetcher {
    async fn fetch(&self, coord: TileCoord) -> Result<Vec<u8>> {
        let url = self.tile_url(coord);
        tracing::trace!("GET {}", url);

        let resp = self.client.get(&url).send().await?;
        classify_status(resp.status())?;

        let bytes = resp.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Expand the URL template for one tile.
///
/// `{s}` rotates through the subdomains by `(x + y) mod len` so neighbouring tiles
/// spread across CDN edges.
pub fn tile_url(source: &TileSourceConfig, coord: TileCoord) -> String {
    let mut url = source
        .url_template
        .replace("{z}", &coord.zoom.to_string())
        .replace("{x}", &coord.x.to_string())
        .replace("{y}", &coord.y.to_string());

    if !source.subdomains.is_empty() {
        let index = (u64::from(coord.x) + u64::from(coord.y)) % source.subdomains.len() as u64;
        url = url.replace("{s}", &source.subdomains[index as usize]);
    }
    if let Some(token) = &source.access_token {
        url = url.replace("{token}", token);
    }
    url
}

/// Map an HTTP status onto the error taxonomy: 404 is a soft miss, any other
/// non-success status is a server error.
pub fn classify_status(status: StatusCode) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::NOT_FOUND {
        Err(TileError::NotFound)
    } else {
        Err(TileError::ServerError {
            status: status.as_u16(),
        })
    }
}
