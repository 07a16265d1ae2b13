//! Application module
//!
//! This module provides the main application structure:
//! - Full-screen map view drawn from the tile pipeline
//! - Toggleable sidebar with tabs (Map and Settings)
//! - Mouse and keyboard navigation
//! - Responsive layout (sidebar from bottom on portrait displays)

mod map_view;
pub(crate) mod settings;
mod state;
mod ui_panels;

use crate::app::map_view::TextureCache;
use crate::app::settings::Settings;
use crate::app::state::{AppState, HOME_LAT, HOME_LON, HOME_ZOOM, SidebarTab, TilesProvider};
use eframe::egui;
use slippy_tiles::TileMap;
use std::num::NonZeroUsize;
use tokio::runtime::Handle;

/// Window size assumed until the first frame reports the real one
const INITIAL_VIEW_SIZE: (f64, f64) = (1280.0, 720.0);

/// Persisted settings (lightweight, no tile data)
#[derive(serde::Serialize, serde::Deserialize)]
struct PersistedSettings {
    tiles_provider: String,
    sidebar_open: bool,
    active_tab: String,
    show_tile_grid: bool,
    show_home_marker: bool,
    center_lat: f64,
    center_lon: f64,
    zoom: u8,
}

/// Main application structure
pub struct SlippyMapApp {
    /// Application state (UI settings, stats, pending actions)
    state: AppState,

    /// Command-line settings, reused whenever the tile map is rebuilt
    settings: Settings,

    /// Tile pipeline for the active provider (`None` if it could not be built)
    map: Option<TileMap>,

    /// GPU textures of the tiles currently in use
    textures: TextureCache,

    /// Runtime that fetch tasks are spawned on
    runtime: Handle,

    /// Used by the repaint hook of each tile map
    egui_ctx: egui::Context,

    /// Show help overlay
    show_help: bool,
}

impl SlippyMapApp {
    pub fn new(cc: &eframe::CreationContext<'_>, runtime: Handle) -> Self {
        let settings = Settings::from_cli();
        let mut state = AppState::new(&settings);
        let mut view = (HOME_LAT, HOME_LON, HOME_ZOOM);

        if settings.ignore_persisted {
            tracing::info!("Ignoring persisted state (--ignore-persisted flag)");
        } else if let Some(persisted) = cc.storage.and_then(Self::load_persisted_settings) {
            view = Self::apply_persisted_settings(&mut state, &persisted);
        }

        // Explicit CLI values win over persisted ones
        view.0 = settings.lat.unwrap_or(view.0);
        view.1 = settings.lon.unwrap_or(view.1);
        view.2 = settings.zoom.unwrap_or(view.2);
        if settings.tile_url.is_some() {
            tracing::info!("Using custom tile URL template; provider selection is ignored");
        }

        let textures = TextureCache::new(
            NonZeroUsize::new(settings.cache_capacity).unwrap_or(NonZeroUsize::MIN),
        );

        let mut app = Self {
            state,
            settings,
            map: None,
            textures,
            runtime,
            egui_ctx: cc.egui_ctx.clone(),
            show_help: false,
        };
        app.rebuild_map(view);
        app
    }

    /// Load persisted settings from storage
    fn load_persisted_settings(storage: &dyn eframe::Storage) -> Option<PersistedSettings> {
        let json = storage.get_string("persisted_settings")?;
        match serde_json::from_str::<PersistedSettings>(&json) {
            Ok(settings) => {
                tracing::info!("Restored settings from previous session");
                Some(settings)
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable persisted settings: {}", e);
                None
            }
        }
    }

    /// Copy persisted UI settings into `state` and return the persisted view
    fn apply_persisted_settings(state: &mut AppState, settings: &PersistedSettings) -> (f64, f64, u8) {
        let ui = &mut state.ui_settings;
        ui.tiles_provider =
            TilesProvider::from_name(&settings.tiles_provider).unwrap_or(ui.tiles_provider);
        ui.sidebar_open = settings.sidebar_open;
        ui.active_tab = match settings.active_tab.as_str() {
            "Settings" => SidebarTab::Settings,
            _ => SidebarTab::Map,
        };
        ui.show_tile_grid = settings.show_tile_grid;
        ui.show_home_marker = settings.show_home_marker;
        (settings.center_lat, settings.center_lon, settings.zoom)
    }

    /// Current center and zoom, falling back to home when there is no map
    fn current_view(&self) -> (f64, f64, u8) {
        match &self.map {
            Some(map) => {
                let viewport = map.viewport();
                (viewport.center_lat(), viewport.center_lon(), viewport.zoom())
            }
            None => (HOME_LAT, HOME_LON, HOME_ZOOM),
        }
    }

    /// (Re)create the tile map for the selected provider at `view`
    fn rebuild_map(&mut self, (lat, lon, zoom): (f64, f64, u8)) {
        let provider = self.state.ui_settings.tiles_provider;
        let config = self.settings.to_config(provider);
        let (width, height) = self
            .map
            .as_ref()
            .map(|map| map.viewport().size())
            .unwrap_or(INITIAL_VIEW_SIZE);
        let viewport = config.viewport(lat, lon, zoom, width, height);

        // Dropping the old map stops its fetch tasks
        self.map = None;
        self.textures.clear();

        let ctx = self.egui_ctx.clone();
        match TileMap::with_http(config, viewport, self.runtime.clone(), move || {
            ctx.request_repaint()
        }) {
            Ok(map) => {
                tracing::info!(
                    "Tile map ready for {} at ({:.4}, {:.4}) zoom {}",
                    provider.name(),
                    lat,
                    lon,
                    map.viewport().zoom()
                );
                self.state.map_error = None;
                self.map = Some(map);
            }
            Err(e) => {
                tracing::error!("Failed to create tile map: {}", e);
                self.state.map_error = Some(e.to_string());
            }
        }
    }

    /// Apply actions requested from the UI during the previous frame
    fn process_pending_actions(&mut self) {
        if self.state.pending_provider_switch {
            self.state.pending_provider_switch = false;
            let view = self.current_view();
            self.rebuild_map(view);
        }

        let Some(map) = self.map.as_mut() else {
            return;
        };
        if self.state.pending_go_home {
            self.state.pending_go_home = false;
            map.viewport_mut().set_center(HOME_LAT, HOME_LON);
            map.viewport_mut().set_zoom(HOME_ZOOM);
        }
        if self.state.pending_fit_home {
            self.state.pending_fit_home = false;
            map.viewport_mut().fit_bounds(state::home_region());
        }
    }
}

#[profiling::all_functions]
impl eframe::App for SlippyMapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Handle keyboard shortcuts
        ctx.input(|i| {
            if i.key_pressed(egui::Key::F1) {
                self.show_help = !self.show_help;
            }
            if i.key_pressed(egui::Key::H) && i.modifiers.ctrl {
                self.show_help = !self.show_help;
            }
        });

        self.process_pending_actions();

        // Show help overlay if enabled
        if self.show_help {
            ui_panels::help_overlay(ctx, &mut self.show_help);
        }

        // Render the main sidebar (responsive: side or bottom based on orientation)
        ui_panels::render_sidebar(ctx, &mut self.state, self.map.as_ref(), self.textures.len());

        let attribution_text = match self.settings.tile_url {
            Some(_) => "Custom tiles",
            None => self.state.ui_settings.tiles_provider.attribution(),
        };

        // Central panel: Map view (full screen)
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                profiling::scope!("map_panel");

                match self.map.as_mut() {
                    Some(map) => map_view::show(ui, map, &mut self.textures, &mut self.state),
                    None => {
                        let message = self
                            .state
                            .map_error
                            .as_deref()
                            .unwrap_or("Tile map unavailable");
                        ui.centered_and_justified(|ui| {
                            ui.colored_label(ui.visuals().error_fg_color, message);
                        });
                    }
                }

                ui_panels::sidebar_toggle_button(ui, &mut self.state);

                let painter = ui.painter();
                let screen_rect = ui.max_rect();
                painter.text(
                    screen_rect.center_bottom() + egui::vec2(0.0, -5.0),
                    egui::Align2::CENTER_BOTTOM,
                    attribution_text,
                    egui::FontId::proportional(10.0),
                    egui::Color32::from_black_alpha(180),
                );
            });
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let (center_lat, center_lon, zoom) = self.current_view();
        let ui = &self.state.ui_settings;
        let settings = PersistedSettings {
            tiles_provider: ui.tiles_provider.name().to_string(),
            sidebar_open: ui.sidebar_open,
            active_tab: format!("{:?}", ui.active_tab),
            show_tile_grid: ui.show_tile_grid,
            show_home_marker: ui.show_home_marker,
            center_lat,
            center_lon,
            zoom,
        };

        if let Ok(json) = serde_json::to_string(&settings) {
            storage.set_string("persisted_settings", json);
            tracing::debug!("Saved settings on exit");
        }
    }
}
