//! Map drawing and navigation on top of [`TileMap`]

use crate::app::state::{AppState, HOME_LAT, HOME_LON};
use eframe::egui;
use egui::{Color32, Rect, Sense, Stroke, Vec2, pos2, vec2};
use lru::LruCache;
use slippy_tiles::{TileCoord, TileImage, TileMap};
use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use std::time::Instant;

/// Wheel delta that makes one zoom step
const SCROLL_STEP: f32 = 50.0;
/// Pixels moved per arrow key press
const KEY_PAN_PX: f64 = 64.0;
const BACKGROUND: Color32 = Color32::from_rgb(221, 221, 221);

/// GPU textures keyed by tile, re-uploaded when the tile image changes
pub struct TextureCache {
    /// The `Weak` only identifies which image was uploaded; it does not keep pixels alive
    textures: LruCache<TileCoord, (Weak<TileImage>, egui::TextureHandle)>,
}

impl TextureCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            textures: LruCache::new(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn clear(&mut self) {
        self.textures.clear();
    }

    /// Texture for `image`, uploading it if this exact image is not on the GPU yet.
    ///
    /// Returns the texture id and whether an upload happened.
    fn texture_for(
        &mut self,
        ctx: &egui::Context,
        coord: TileCoord,
        image: &Arc<TileImage>,
    ) -> (egui::TextureId, bool) {
        let cached = self
            .textures
            .get(&coord)
            .filter(|(uploaded, _)| uploaded.ptr_eq(&Arc::downgrade(image)))
            .map(|(_, texture)| texture.id());
        if let Some(id) = cached {
            return (id, false);
        }

        let pixels = egui::ColorImage::from_rgba_unmultiplied(
            [image.width() as usize, image.height() as usize],
            image.pixels(),
        );
        let texture = ctx.load_texture(
            format!("tile-{coord}"),
            pixels,
            egui::TextureOptions::LINEAR,
        );
        let id = texture.id();
        self.textures.put(coord, (Arc::downgrade(image), texture));
        (id, true)
    }
}

/// Allocate the remaining space, apply navigation input and draw the tiles
pub fn show(ui: &mut egui::Ui, map: &mut TileMap, textures: &mut TextureCache, state: &mut AppState) {
    let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
    handle_input(ui, &response, rect, map, state);

    let started = Instant::now();
    let tiles = map.renderable_tiles();
    state.stats.last_frame_tiles_ms = started.elapsed().as_secs_f64() * 1000.0;

    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 0.0, BACKGROUND);

    let tile_size = map.viewport().tile_size() as f32;
    let full_uv = Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0));
    let mut uploaded = 0;
    for tile in &tiles {
        let (texture, fresh) = textures.texture_for(ui.ctx(), tile.coord, &tile.image);
        if fresh {
            uploaded += 1;
        }

        let min = rect.min + vec2(tile.screen_x as f32, tile.screen_y as f32);
        let tile_rect = Rect::from_min_size(min, Vec2::splat(tile_size));
        painter.image(texture, tile_rect, full_uv, Color32::WHITE);

        if state.ui_settings.show_tile_grid {
            painter.rect_stroke(
                tile_rect,
                0.0,
                Stroke::new(1.0, Color32::from_black_alpha(120)),
                egui::StrokeKind::Inside,
            );
            painter.text(
                tile_rect.left_top() + vec2(4.0, 4.0),
                egui::Align2::LEFT_TOP,
                tile.coord.to_string(),
                egui::FontId::monospace(11.0),
                Color32::BLACK,
            );
        }
    }
    state.stats.tiles_drawn = tiles.len();
    state.stats.textures_uploaded = uploaded;

    if state.ui_settings.show_home_marker {
        let (x, y) = map.geo_to_screen(HOME_LAT, HOME_LON);
        let position = rect.min + vec2(x as f32, y as f32);
        if rect.expand(8.0).contains(position) {
            painter.circle(
                position,
                6.0,
                Color32::from_rgb(220, 40, 40),
                Stroke::new(2.0, Color32::WHITE),
            );
        }
    }
}

fn handle_input(
    ui: &egui::Ui,
    response: &egui::Response,
    rect: Rect,
    map: &mut TileMap,
    state: &mut AppState,
) {
    let size = (f64::from(rect.width()), f64::from(rect.height()));
    if map.viewport().size() != size {
        map.viewport_mut().resize(size.0, size.1);
    }

    if response.dragged() {
        let delta = response.drag_delta();
        map.viewport_mut()
            .pan(f64::from(delta.x), f64::from(delta.y));
    }

    if response.double_clicked()
        && let Some(pointer) = response.interact_pointer_pos()
    {
        let anchor = pointer - rect.center();
        map.viewport_mut()
            .zoom_around(1, f64::from(anchor.x), f64::from(anchor.y));
    }

    if response.hovered() {
        let (scroll, pointer) = ui.input(|i| (i.raw_scroll_delta.y, i.pointer.hover_pos()));
        state.scroll_accumulator += scroll;
        if state.scroll_accumulator.abs() >= SCROLL_STEP {
            let direction = state.scroll_accumulator.signum() as i32;
            state.scroll_accumulator = 0.0;
            let anchor = pointer.map(|p| p - rect.center()).unwrap_or(Vec2::ZERO);
            map.viewport_mut()
                .zoom_around(direction, f64::from(anchor.x), f64::from(anchor.y));
        }
    }

    if ui.ctx().wants_keyboard_input() {
        return;
    }
    let (zoom_in, zoom_out, pan) = ui.input(|i| {
        let mut pan = (0.0, 0.0);
        if i.key_pressed(egui::Key::ArrowLeft) {
            pan.0 += KEY_PAN_PX;
        }
        if i.key_pressed(egui::Key::ArrowRight) {
            pan.0 -= KEY_PAN_PX;
        }
        if i.key_pressed(egui::Key::ArrowUp) {
            pan.1 += KEY_PAN_PX;
        }
        if i.key_pressed(egui::Key::ArrowDown) {
            pan.1 -= KEY_PAN_PX;
        }
        (
            i.key_pressed(egui::Key::Plus) || i.key_pressed(egui::Key::Equals),
            i.key_pressed(egui::Key::Minus),
            pan,
        )
    });
    if zoom_in {
        map.viewport_mut().zoom_by(1);
    }
    if zoom_out {
        map.viewport_mut().zoom_by(-1);
    }
    if pan != (0.0, 0.0) {
        map.viewport_mut().pan(pan.0, pan.1);
    }
}
