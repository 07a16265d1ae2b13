//! UI panels for the application
//!
//! Sidebar with tabs, the toggle button overlaid on the map and the help window.

use crate::app::state::{AppState, SidebarTab, TilesProvider};
use egui::{Color32, RichText, Ui};
use slippy_tiles::TileMap;

/// Render the sidebar toggle button (overlaid on top-right of map)
pub fn sidebar_toggle_button(ui: &mut Ui, state: &mut AppState) {
    let button_size = egui::vec2(40.0, 40.0);
    let margin = 10.0;

    let rect = ui.max_rect();
    let button_pos = rect.right_top() + egui::vec2(-button_size.x - margin, margin);
    let button_rect = egui::Rect::from_min_size(button_pos, button_size);

    let response = ui.allocate_rect(button_rect, egui::Sense::click());

    if response.clicked() {
        state.ui_settings.sidebar_open = !state.ui_settings.sidebar_open;
    }

    let bg_color = if response.hovered() {
        ui.visuals().widgets.hovered.bg_fill
    } else {
        ui.visuals().widgets.inactive.bg_fill
    };

    ui.painter().rect_filled(button_rect, 5.0, bg_color);

    let icon = if state.ui_settings.sidebar_open {
        "✕"
    } else {
        "☰"
    };

    ui.painter().text(
        button_rect.center(),
        egui::Align2::CENTER_CENTER,
        icon,
        egui::FontId::proportional(20.0),
        ui.visuals().text_color(),
    );
}

/// Render the main sidebar (responsive: side on landscape, bottom on portrait)
pub fn render_sidebar(
    ctx: &egui::Context,
    state: &mut AppState,
    map: Option<&TileMap>,
    textures: usize,
) {
    if !state.ui_settings.sidebar_open {
        return;
    }

    let screen_size = ctx.viewport_rect().size();
    if screen_size.y > screen_size.x {
        egui::TopBottomPanel::bottom("main_sidebar")
            .default_height(280.0)
            .min_height(180.0)
            .max_height(ctx.viewport_rect().height() * 0.6)
            .resizable(true)
            .show(ctx, |ui| render_sidebar_content(ui, state, map, textures));
    } else {
        egui::SidePanel::right("main_sidebar")
            .default_width(300.0)
            .min_width(260.0)
            .max_width(450.0)
            .resizable(true)
            .show(ctx, |ui| render_sidebar_content(ui, state, map, textures));
    }
}

/// Render the sidebar content (shared between portrait and landscape)
fn render_sidebar_content(ui: &mut Ui, state: &mut AppState, map: Option<&TileMap>, textures: usize) {
    ui.horizontal(|ui| {
        ui.selectable_value(&mut state.ui_settings.active_tab, SidebarTab::Map, "🗺 Map");
        ui.selectable_value(
            &mut state.ui_settings.active_tab,
            SidebarTab::Settings,
            "⚙ Settings",
        );
    });

    ui.separator();

    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui| match state.ui_settings.active_tab {
            SidebarTab::Map => render_map_tab(ui, state, map, textures),
            SidebarTab::Settings => render_settings_tab(ui, state),
        });
}

/// Render the Map tab
fn render_map_tab(ui: &mut Ui, state: &mut AppState, map: Option<&TileMap>, textures: usize) {
    ui.horizontal(|ui| {
        if ui.button("🏠 Home").clicked() {
            state.pending_go_home = true;
        }
        if ui.button("🎯 Fit Home Region").clicked() {
            state.pending_fit_home = true;
        }
    });

    ui.add_space(8.0);
    ui.separator();

    let Some(map) = map else {
        ui.label(RichText::new("⚠ No tile map").strong().color(Color32::RED));
        if let Some(error) = &state.map_error {
            ui.label(RichText::new(error).small());
        }
        return;
    };

    let viewport = map.viewport();
    ui.label(RichText::new("📍 View").strong());
    ui.add_space(4.0);
    egui::Grid::new("view_grid")
        .num_columns(2)
        .spacing([12.0, 4.0])
        .show(ui, |ui| {
            ui.label("Center:");
            ui.label(
                RichText::new(format!(
                    "{:.5}, {:.5}",
                    viewport.center_lat(),
                    viewport.center_lon()
                ))
                .strong(),
            );
            ui.end_row();

            ui.label("Zoom:");
            ui.label(
                RichText::new(format!(
                    "{} ({}-{})",
                    viewport.zoom(),
                    viewport.min_zoom(),
                    viewport.max_zoom()
                ))
                .strong(),
            );
            ui.end_row();

            ui.label("Size:");
            ui.label(format!(
                "{:.0} × {:.0} px",
                viewport.width_px(),
                viewport.height_px()
            ));
            ui.end_row();
        });

    ui.add_space(8.0);
    ui.separator();

    render_stats_section(ui, state, map, textures);
}

fn render_stats_section(ui: &mut Ui, state: &AppState, map: &TileMap, textures: usize) {
    let stats = map.stats();

    ui.label(RichText::new("📊 Tiles").strong());
    ui.add_space(4.0);

    egui::Grid::new("stats_grid")
        .num_columns(2)
        .spacing([12.0, 4.0])
        .show(ui, |ui| {
            ui.label("Cached:");
            ui.label(
                RichText::new(format!(
                    "{} / {}",
                    map.cached_len(),
                    map.config().cache_capacity
                ))
                .strong(),
            );
            ui.end_row();

            ui.label("In flight:");
            ui.label(RichText::new(map.in_flight_len().to_string()).strong());
            ui.end_row();

            ui.label("Drawn:");
            ui.label(state.stats.tiles_drawn.to_string());
            ui.end_row();

            ui.label("Textures:");
            ui.label(format!(
                "{} (+{} this frame)",
                textures, state.stats.textures_uploaded
            ));
            ui.end_row();

            ui.separator();
            ui.separator();
            ui.end_row();

            for (label, value) in [
                ("Launched:", stats.launched),
                ("Loaded:", stats.loaded),
                ("Not found:", stats.not_found),
                ("Failed:", stats.failed),
                ("Abandoned:", stats.abandoned),
                ("Evicted:", stats.evicted),
            ] {
                ui.label(label);
                let text = RichText::new(value.to_string());
                let text = if (label == "Failed:" || label == "Abandoned:") && value > 0 {
                    text.color(ui.visuals().warn_fg_color)
                } else {
                    text
                };
                ui.label(text);
                ui.end_row();
            }

            ui.separator();
            ui.separator();
            ui.end_row();

            ui.label("Tile pass:");
            let time_color = if state.stats.last_frame_tiles_ms < 2.0 {
                Color32::GREEN
            } else if state.stats.last_frame_tiles_ms < 8.0 {
                Color32::YELLOW
            } else {
                Color32::RED
            };
            ui.label(
                RichText::new(format!("{:.2} ms", state.stats.last_frame_tiles_ms))
                    .color(time_color),
            );
            ui.end_row();
        });
}

/// Render the Settings tab
fn render_settings_tab(ui: &mut Ui, state: &mut AppState) {
    ui.label(RichText::new("🗺 Map Tiles").strong());
    ui.add_space(6.0);

    for provider in TilesProvider::all() {
        let selected = state.ui_settings.tiles_provider == *provider;
        if ui.selectable_label(selected, provider.name()).clicked() {
            state.select_provider(*provider);
        }
    }

    ui.add_space(4.0);
    ui.label(
        RichText::new(state.ui_settings.tiles_provider.attribution())
            .small()
            .italics()
            .weak(),
    );

    ui.add_space(12.0);
    ui.separator();
    ui.add_space(8.0);

    ui.label(RichText::new("🎨 Overlay").strong());
    ui.add_space(6.0);
    ui.checkbox(&mut state.ui_settings.show_home_marker, "Home marker");
    ui.checkbox(
        &mut state.ui_settings.show_tile_grid,
        "Tile grid with coordinates",
    );

    ui.add_space(12.0);
    ui.separator();
    ui.add_space(8.0);

    // About section
    ui.label(RichText::new("ℹ About").strong());
    ui.add_space(4.0);
    ui.label(RichText::new(crate::entrypoints::short_version_info()).small());
    ui.label(
        RichText::new("Raster tiles fetched in the background, never blocking a frame")
            .small()
            .weak(),
    );
    ui.add_space(4.0);
    ui.label(RichText::new("Keyboard shortcuts:").small());
    ui.label(RichText::new("  F1 / Ctrl+H - Toggle help").small().weak());
    ui.label(RichText::new("  + / - - Zoom, arrows - Pan").small().weak());
}

/// Show the help overlay
pub fn help_overlay(ctx: &egui::Context, show_help: &mut bool) {
    egui::Window::new("Help")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.heading("Slippy Map Viewer");
            ui.add_space(8.0);

            ui.label("A raster map viewer that loads tiles in the background.");
            ui.add_space(12.0);

            ui.label(RichText::new("Navigation").strong());
            ui.label("• Click and drag to pan");
            ui.label("• Scroll wheel or double click to zoom");
            ui.label("• Arrow keys to pan, + / - to zoom");
            ui.label("• 'Home' returns to Ho Chi Minh City");
            ui.add_space(8.0);

            ui.label(RichText::new("Keyboard Shortcuts").strong());
            ui.label("• F1 or Ctrl+H - Toggle this help");
            ui.add_space(12.0);

            if ui.button("Close").clicked() {
                *show_help = false;
            }
        });
}
