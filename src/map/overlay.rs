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

//! Radar image overlay layer.
//!
//! The layer downloads the radar image for the current refresh token on its
//! own, independent of the load monitor in `radar-client`, and keeps exactly
//! one texture. Finished downloads are kept per token, so a slow download
//! for an older token can never displace the current one; only the image for
//! the token last requested is ever uploaded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use egui::{Color32, ColorImage, Painter, Rect, TextureHandle};
use log::{debug, warn};
use radar_client::{GeoBounds, Opacity, RefreshToken};
use tokio::runtime::Handle;

type PendingImages = Arc<Mutex<HashMap<RefreshToken, Result<ColorImage, String>>>>;

/// Fetches and draws the radar image stretched over its bounds.
pub struct RadarOverlayLayer {
    runtime: Handle,
    http: reqwest::Client,
    requested: Option<RefreshToken>,
    pending: PendingImages,
    texture: Option<(RefreshToken, TextureHandle)>,
}

impl RadarOverlayLayer {
    pub fn new(runtime: Handle, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client for overlay: {}", e);
                reqwest::Client::new()
            });
        Self {
            runtime,
            http,
            requested: None,
            pending: Arc::new(Mutex::new(HashMap::new())),
            texture: None,
        }
    }

    /// Start fetching `url` if `token` has not been requested yet.
    pub fn sync(&mut self, token: Option<RefreshToken>, url: Option<&str>, ctx: &egui::Context) {
        let (Some(token), Some(url)) = (token, url) else {
            return;
        };
        if self.requested == Some(token) {
            return;
        }
        self.requested = Some(token);

        let http = self.http.clone();
        let url = url.to_string();
        let pending = Arc::clone(&self.pending);
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let result = fetch_image(&http, &url).await;
            pending.lock().unwrap().insert(token, result);
            ctx.request_repaint();
        });
    }

    /// Upload a finished download to the GPU, if it is still current.
    pub fn upload(&mut self, ctx: &egui::Context) {
        let Some(token) = self.requested else {
            return;
        };
        let result = {
            let mut pending = self.pending.lock().unwrap();
            let result = pending.remove(&token);
            for stale in pending.keys() {
                debug!("Dropping overlay image for superseded token {}", stale);
            }
            pending.clear();
            result
        };
        let Some(result) = result else {
            return;
        };
        match result {
            Ok(image) => {
                let texture = ctx.load_texture(
                    format!("radar_{token}"),
                    image,
                    egui::TextureOptions::LINEAR,
                );
                self.texture = Some((token, texture));
            }
            Err(e) => {
                debug!("Overlay image unavailable for {}: {}", token, e);
                self.texture = None;
            }
        }
    }

    /// Draw the overlay into the rectangle `to_screen` projects `bounds` to.
    pub fn paint(
        &self,
        painter: &Painter,
        bounds: GeoBounds,
        opacity: Opacity,
        to_screen: impl Fn(f64, f64) -> egui::Pos2,
    ) {
        let Some((_, texture)) = &self.texture else {
            return;
        };
        let sw = bounds.south_west();
        let ne = bounds.north_east();
        let rect = Rect::from_min_max(to_screen(ne.lat, sw.lon), to_screen(sw.lat, ne.lon));

        painter.image(
            texture.id(),
            rect,
            Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            Color32::from_white_alpha(opacity.alpha()),
        );
    }
}

async fn fetch_image(http: &reqwest::Client, url: &str) -> Result<ColorImage, String> {
    let response = http.get(url).send().await.map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }
    let bytes = response.bytes().await.map_err(|e| e.to_string())?;
    let rgba = image::load_from_memory(&bytes)
        .map_err(|e| e.to_string())?
        .to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()))
}
