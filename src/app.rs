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

//! Main application window.

use std::time::Duration;

use chrono::Local;
use eframe::egui;
use log::{info, warn};
use radar_client::{format_timestamp, Client, ClientConfig, ClientError, LoadState, OverlaySnapshot};
use tokio::runtime::Runtime;

use crate::config::AppConfig;
use crate::map::{MapView, RadarOverlayLayer, TileManager};

const ATTRIBUTION_URL: &str = "https://mrms.ncep.noaa.gov/";

pub struct RadarApp {
    client: Client,
    map: MapView,
    overlay: RadarOverlayLayer,
    tiles: TileManager,
    config: AppConfig,
    opacity_input: f32,
    // Owns the worker threads the client and overlay spawn onto
    _runtime: Runtime,
}

impl RadarApp {
    pub fn new(config: AppConfig, client_config: ClientConfig, runtime: Runtime) -> Result<Self, ClientError> {
        let timeout = client_config.request_timeout;
        let mut client = Client::with_handle(client_config, runtime.handle().clone())?;
        client.set_opacity(config.radar_opacity);

        let snapshot = client.snapshot();
        info!("Radar viewer ready, opacity {}", snapshot.opacity);

        Ok(Self {
            map: MapView::new(snapshot.bounds, config.default_zoom),
            overlay: RadarOverlayLayer::new(runtime.handle().clone(), timeout),
            tiles: TileManager::new(),
            opacity_input: snapshot.opacity.value(),
            client,
            config,
            _runtime: runtime,
        })
    }

    fn draw_header(&mut self, ui: &mut egui::Ui, snapshot: &OverlaySnapshot) {
        ui.horizontal(|ui| {
            ui.heading("Weather Radar");

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if snapshot.can_refresh {
                    if ui.button("⟳ Refresh").clicked() {
                        self.client.refresh();
                        self.tiles.retry_failed();
                    }
                } else {
                    ui.add_enabled(false, egui::Button::new("Please wait"));
                    ui.spinner();
                }

                if let Some(updated) = snapshot.last_updated {
                    ui.label(
                        egui::RichText::new(format!(
                            "🕓 Last updated: {}",
                            format_timestamp(&updated.with_timezone(&Local))
                        ))
                        .weak(),
                    );
                }

                ui.separator();
                self.draw_opacity(ui, snapshot);
            });
        });
    }

    fn draw_opacity(&mut self, ui: &mut egui::Ui, snapshot: &OverlaySnapshot) {
        ui.label(snapshot.opacity.to_string());
        let response = ui.add(
            egui::Slider::new(&mut self.opacity_input, 0.0..=1.0)
                .show_value(false)
                .text("Opacity"),
        );
        if response.changed() {
            self.client.set_opacity(self.opacity_input);
        }
        if response.drag_stopped() {
            self.config.radar_opacity = self.client.opacity().value();
            if let Err(e) = self.config.save() {
                warn!("Failed to save opacity: {}", e);
            }
        }
    }

    fn draw_footer(&self, ui: &mut egui::Ui, snapshot: &OverlaySnapshot) {
        ui.horizontal(|ui| {
            if self.config.show_attribution {
                ui.label("Powered by");
                ui.hyperlink_to("MRMS NOAA", ATTRIBUTION_URL);
                ui.label("· © OpenStreetMap contributors");
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let status = match &snapshot.state {
                    LoadState::Idle => "Idle".to_string(),
                    LoadState::Loading => "Loading radar...".to_string(),
                    LoadState::Loaded => "Radar loaded".to_string(),
                    LoadState::Failed(reason) => reason.to_string(),
                };
                ui.label(egui::RichText::new(status).small().weak());
            });
        });
    }

    fn draw_advisory(&mut self, ctx: &egui::Context, snapshot: &OverlaySnapshot) {
        let (Some(advisory), LoadState::Failed(reason)) = (snapshot.advisory, &snapshot.state) else {
            return;
        };
        egui::Area::new(egui::Id::new("radar_advisory"))
            .anchor(egui::Align2::CENTER_TOP, egui::vec2(0.0, 70.0))
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.vertical(|ui| {
                            ui.strong(reason.title());
                            ui.label(advisory);
                        });
                        if ui.button("Dismiss").clicked() {
                            self.client.dismiss_advisory();
                        }
                    });
                });
            });
    }
}

impl eframe::App for RadarApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.client.poll_events();
        let snapshot = self.client.snapshot();

        self.overlay.sync(snapshot.token, snapshot.image_url.as_deref(), ctx);
        self.overlay.upload(ctx);

        let repaint = if snapshot.state.is_loading() {
            Duration::from_millis(100)
        } else {
            Duration::from_millis(500)
        };
        ctx.request_repaint_after(repaint);

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(4.0);
            self.draw_header(ui, &snapshot);
            ui.add_space(4.0);
        });

        egui::TopBottomPanel::bottom("footer").show(ctx, |ui| {
            self.draw_footer(ui, &snapshot);
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.map.draw(ui, &self.tiles, &self.overlay, &snapshot);
            });

        self.draw_advisory(ctx, &snapshot);
    }
}
