// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Pannable, zoomable map view.

use egui::{Align2, Color32, FontId, Pos2, Sense};
use radar_client::{GeoBounds, OverlaySnapshot};

use super::overlay::RadarOverlayLayer;
use super::tiles::{TileManager, WebMercator, TILE_SIZE};

const MIN_ZOOM: f32 = 2.0;
const MAX_ZOOM: f32 = 10.0;

pub struct MapView {
    center_lat: f64,
    center_lon: f64,
    zoom: f32,
    tile_status: Option<String>,
}

impl MapView {
    /// Map centered on `bounds`
    pub fn new(bounds: GeoBounds, zoom: f32) -> Self {
        let center = bounds.center();
        Self {
            center_lat: center.lat,
            center_lon: center.lon,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            tile_status: None,
        }
    }

    pub fn recenter(&mut self, bounds: GeoBounds) {
        let center = bounds.center();
        self.center_lat = center.lat;
        self.center_lon = center.lon;
    }

    fn tile_zoom(&self) -> u8 {
        self.zoom.round() as u8
    }

    /// On-screen tile edge in pixels; tiles fetched at the rounded zoom are
    /// stretched by the fractional remainder so zooming is continuous.
    fn tile_pixels(&self) -> f32 {
        TILE_SIZE * 2_f32.powf(self.zoom - f32::from(self.tile_zoom()))
    }

    /// Screen position of a coordinate, relative to the view center
    fn project(&self, screen_center: Pos2, lat: f64, lon: f64) -> Pos2 {
        let zoom = self.tile_zoom();
        let tile_pixels = f64::from(self.tile_pixels());
        let dx = WebMercator::lon_to_x(lon, zoom) - WebMercator::lon_to_x(self.center_lon, zoom);
        let dy = WebMercator::lat_to_y(lat, zoom) - WebMercator::lat_to_y(self.center_lat, zoom);
        egui::pos2(
            screen_center.x + (dx * tile_pixels) as f32,
            screen_center.y + (dy * tile_pixels) as f32,
        )
    }

    pub fn draw(
        &mut self,
        ui: &mut egui::Ui,
        tiles: &TileManager,
        overlay: &RadarOverlayLayer,
        snapshot: &OverlaySnapshot,
    ) {
        let (response, painter) = ui.allocate_painter(
            egui::vec2(ui.available_width(), ui.available_height()),
            Sense::click_and_drag(),
        );
        let rect = response.rect;

        painter.rect_filled(rect, 0.0, Color32::from_rgb(170, 211, 223));

        if response.hovered() {
            let (pinch, scroll) = ui.input(|i| (i.zoom_delta(), i.smooth_scroll_delta.y));
            if (pinch - 1.0).abs() > 0.001 {
                self.zoom += pinch.log2();
            }
            if scroll.abs() > 0.0 {
                self.zoom += scroll / 200.0;
            }
            self.zoom = self.zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }

        if response.dragged() {
            let delta = response.drag_delta();
            let zoom = self.tile_zoom();
            let tile_pixels = self.tile_pixels();
            let x = WebMercator::lon_to_x(self.center_lon, zoom) - f64::from(delta.x / tile_pixels);
            let y = WebMercator::lat_to_y(self.center_lat, zoom) - f64::from(delta.y / tile_pixels);
            self.center_lon = WebMercator::x_to_lon(x, zoom);
            self.center_lat = WebMercator::y_to_lat(y, zoom).clamp(-85.0, 85.0);
        }

        if response.double_clicked() {
            self.recenter(snapshot.bounds);
        }

        let center = rect.center();
        let painter = painter.with_clip_rect(rect);
        let tile_pixels = self.tile_pixels();
        let scale = tile_pixels / TILE_SIZE;

        // Grid is computed in unscaled tile pixels, then stretched
        let visible = TileManager::get_visible_tiles(
            self.center_lat,
            self.center_lon,
            self.tile_zoom(),
            rect.width() / scale,
            rect.height() / scale,
        );
        let mut rendered = 0;
        for (coord, offset_x, offset_y) in visible {
            if let Some(texture) = tiles.get_tile(coord, ui.ctx()) {
                let tile_rect = egui::Rect::from_min_size(
                    egui::pos2(center.x + offset_x * scale, center.y + offset_y * scale),
                    egui::vec2(tile_pixels, tile_pixels),
                );
                painter.image(
                    texture.id(),
                    tile_rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    Color32::WHITE,
                );
                rendered += 1;
            }
        }

        let errors = tiles.get_error_count();
        if errors > 0 {
            self.tile_status = Some(format!("Failed to load {errors} map tiles"));
        } else if tiles.has_loading_tiles() {
            self.tile_status = Some("Loading map tiles...".to_string());
        } else if rendered > 0 {
            self.tile_status = None;
        }

        overlay.paint(&painter, snapshot.bounds, snapshot.opacity, |lat, lon| {
            self.project(center, lat, lon)
        });

        if let Some(badge) = snapshot.bounds_badge {
            draw_badge(&painter, rect.left_bottom() + egui::vec2(10.0, -10.0), badge);
        }

        if let Some(status) = &self.tile_status {
            painter.text(
                rect.right_bottom() + egui::vec2(-10.0, -10.0),
                Align2::RIGHT_BOTTOM,
                status,
                FontId::proportional(12.0),
                Color32::from_gray(60),
            );
        }
    }
}

/// Non-blocking pill in the corner of the map
fn draw_badge(painter: &egui::Painter, anchor: Pos2, text: &str) {
    let galley = painter.layout_no_wrap(
        text.to_string(),
        FontId::proportional(13.0),
        Color32::from_rgb(90, 60, 0),
    );
    let size = galley.size() + egui::vec2(16.0, 8.0);
    let rect = egui::Rect::from_min_size(anchor - egui::vec2(0.0, size.y), size);
    painter.rect_filled(rect, 6.0, Color32::from_rgba_unmultiplied(255, 214, 102, 230));
    painter.galley(rect.min + egui::vec2(8.0, 4.0), galley, Color32::from_rgb(90, 60, 0));
}
