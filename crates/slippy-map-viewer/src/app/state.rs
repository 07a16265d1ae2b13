//! Application state management
//!
//! UI settings, the available tile providers and per-frame statistics. The tile
//! pipeline itself lives in [`slippy_tiles::TileMap`], owned by the app.

use crate::app::settings::Settings;

/// Default map center: Ho Chi Minh City
pub const HOME_LAT: f64 = 10.7769;
pub const HOME_LON: f64 = 106.7009;
pub const HOME_ZOOM: u8 = 12;

/// Greater Ho Chi Minh City, used by "Fit Home Region"
pub fn home_region() -> geo::Rect<f64> {
    geo::Rect::new(
        geo::coord! { x: 106.35, y: 10.35 },
        geo::coord! { x: 107.05, y: 11.15 },
    )
}

/// Main application state
pub struct AppState {
    /// Current UI settings
    pub ui_settings: UiSettings,

    /// Statistics shown in the sidebar
    pub stats: Stats,

    /// Accumulated wheel delta not yet turned into a zoom step
    pub scroll_accumulator: f32,

    /// Recenter on the home location on the next frame
    pub pending_go_home: bool,

    /// Fit the home region on the next frame
    pub pending_fit_home: bool,

    /// Rebuild the tile map (provider changed)
    pub pending_provider_switch: bool,

    /// Last error from building the tile map, shown on the map
    pub map_error: Option<String>,
}

/// UI-specific settings that can be adjusted at runtime
#[derive(Clone)]
pub struct UiSettings {
    /// Map tiles provider
    pub tiles_provider: TilesProvider,

    /// Whether sidebar is open
    pub sidebar_open: bool,

    /// Current active tab in sidebar
    pub active_tab: SidebarTab,

    /// Outline every tile and label it with its coordinate
    pub show_tile_grid: bool,

    /// Draw the home marker
    pub show_home_marker: bool,
}

/// Sidebar tabs
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SidebarTab {
    Map,
    Settings,
}

/// Available map tile providers
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum TilesProvider {
    #[value(alias = "osm")]
    OpenStreetMap,
    #[value(alias = "topo")]
    OpenTopoMap,
    #[value(name = "cyclosm")]
    CyclOSM,
}

impl TilesProvider {
    pub fn url(&self) -> &'static str {
        match self {
            Self::OpenStreetMap => "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
            Self::OpenTopoMap => "https://{s}.tile.opentopomap.org/{z}/{x}/{y}.png",
            Self::CyclOSM => "https://{s}.tile-cyclosm.openstreetmap.fr/cyclosm/{z}/{x}/{y}.png",
        }
    }

    pub fn subdomains(&self) -> &'static [&'static str] {
        match self {
            Self::OpenStreetMap => &[],
            Self::OpenTopoMap | Self::CyclOSM => &["a", "b", "c"],
        }
    }

    pub fn max_zoom(&self) -> u8 {
        match self {
            Self::OpenStreetMap => 19,
            Self::OpenTopoMap => 17,
            Self::CyclOSM => 20,
        }
    }

    pub fn attribution(&self) -> &'static str {
        match self {
            Self::OpenStreetMap => "© OpenStreetMap contributors",
            Self::OpenTopoMap => "© OpenTopoMap (CC-BY-SA)",
            Self::CyclOSM => "© CyclOSM & OpenStreetMap contributors",
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::OpenStreetMap, Self::OpenTopoMap, Self::CyclOSM]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenStreetMap => "OpenStreetMap",
            Self::OpenTopoMap => "OpenTopoMap",
            Self::CyclOSM => "CyclOSM",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|p| p.name() == name)
    }
}

/// Statistics about the last frame
#[derive(Default)]
pub struct Stats {
    /// Time spent draining, planning and collecting tiles, in milliseconds
    pub last_frame_tiles_ms: f64,

    /// Tiles drawn in the last frame
    pub tiles_drawn: usize,

    /// Tiles uploaded to the GPU in the last frame
    pub textures_uploaded: usize,
}

impl AppState {
    /// Create new application state from CLI settings
    pub fn new(settings: &Settings) -> Self {
        let ui_settings = UiSettings {
            tiles_provider: settings.provider,
            sidebar_open: true,
            active_tab: SidebarTab::Map,
            show_tile_grid: false,
            show_home_marker: true,
        };

        Self {
            ui_settings,
            stats: Stats::default(),
            scroll_accumulator: 0.0,
            pending_go_home: false,
            pending_fit_home: false,
            pending_provider_switch: false,
            map_error: None,
        }
    }

    /// Select a provider; the tile map is rebuilt on the next frame
    pub fn select_provider(&mut self, provider: TilesProvider) {
        if self.ui_settings.tiles_provider != provider {
            tracing::info!("Switching tiles provider to {}", provider.name());
            self.ui_settings.tiles_provider = provider;
            self.pending_provider_switch = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names_roundtrip() {
        for provider in TilesProvider::all() {
            assert_eq!(TilesProvider::from_name(provider.name()), Some(*provider));
        }
        assert_eq!(TilesProvider::from_name("Unknown"), None);
    }

    #[test]
    fn test_subdomain_templates_have_subdomains() {
        for provider in TilesProvider::all() {
            assert_eq!(
                provider.url().contains("{s}"),
                !provider.subdomains().is_empty(),
                "{}",
                provider.name()
            );
        }
    }

    #[test]
    fn test_select_provider_flags_rebuild_once() {
        let settings = <Settings as clap::Parser>::parse_from(["slippy-map-viewer"]);
        let mut state = AppState::new(&settings);
        state.select_provider(TilesProvider::OpenStreetMap);
        assert!(!state.pending_provider_switch);
        state.select_provider(TilesProvider::CyclOSM);
        assert!(state.pending_provider_switch);
        assert_eq!(state.ui_settings.tiles_provider, TilesProvider::CyclOSM);
    }
}
