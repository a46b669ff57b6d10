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

//! Base map tiles and Web Mercator projection.
//!
//! OpenStreetMap tiles are downloaded on background threads, cached on disk
//! under SHA256-derived names and expired after a week.

use egui::{ColorImage, TextureHandle};
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

pub const TILE_SIZE: f32 = 256.0;
const CACHE_DURATION_DAYS: u64 = 7;
const USER_AGENT: &str = concat!("radar-viewer/", env!("CARGO_PKG_VERSION"));

/// Web Mercator projection utilities
pub struct WebMercator;

impl WebMercator {
    /// Latitude to tile-space Y at `zoom`
    pub fn lat_to_y(lat: f64, zoom: u8) -> f64 {
        let lat = lat.clamp(-85.051_128, 85.051_128);
        let lat_rad = lat.to_radians();
        let n = 2_f64.powi(i32::from(zoom));
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0;
        y * n
    }

    /// Longitude to tile-space X at `zoom`
    pub fn lon_to_x(lon: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(i32::from(zoom));
        ((lon + 180.0) / 360.0) * n
    }

    /// Tile-space Y back to latitude
    pub fn y_to_lat(y: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(i32::from(zoom));
        let lat_rad = (std::f64::consts::PI * (1.0 - 2.0 * y / n)).sinh().atan();
        lat_rad.to_degrees()
    }

    /// Tile-space X back to longitude
    pub fn x_to_lon(x: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(i32::from(zoom));
        x / n * 360.0 - 180.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// OpenStreetMap tile URL, spread across the a-c subdomains
    pub fn url(&self) -> String {
        let subdomain = ['a', 'b', 'c'][((self.x + self.y) % 3) as usize];
        format!(
            "https://{}.tile.openstreetmap.org/{}/{}/{}.png",
            subdomain, self.zoom, self.x, self.y
        )
    }

    fn cache_filename(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("osm/{}/{}/{}", self.zoom, self.x, self.y).as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

pub enum TileState {
    Loading,
    Loaded(TextureHandle),
    Failed,
}

pub struct TileManager {
    cache_dir: PathBuf,
    tiles: Arc<Mutex<HashMap<TileCoord, TileState>>>,
}

impl Default for TileManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TileManager {
    pub fn new() -> Self {
        let cache_dir = Self::get_cache_dir();

        if let Err(e) = fs::create_dir_all(&cache_dir) {
            warn!("Failed to create tile cache directory: {}", e);
        }

        Self::cleanup_old_tiles(&cache_dir);

        Self {
            cache_dir,
            tiles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn get_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("radar-viewer")
            .join("tiles")
    }

    fn cleanup_old_tiles(cache_dir: &Path) {
        let now = SystemTime::now();
        let max_age = Duration::from_secs(CACHE_DURATION_DAYS * 24 * 60 * 60);

        let Ok(entries) = fs::read_dir(cache_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let expired = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > max_age);
            if expired && fs::remove_file(entry.path()).is_ok() {
                debug!("Removed old tile cache: {:?}", entry.path());
            }
        }
    }

    /// Get tile from memory or disk cache, or queue it for download
    pub fn get_tile(&self, coord: TileCoord, ctx: &egui::Context) -> Option<TextureHandle> {
        let mut tiles = self.tiles.lock().unwrap();

        match tiles.get(&coord) {
            Some(TileState::Loaded(texture)) => Some(texture.clone()),
            Some(TileState::Loading | TileState::Failed) => None,
            None => {
                let cache_path = self.cache_dir.join(format!("{}.png", coord.cache_filename()));

                if cache_path.exists() {
                    match fs::read(&cache_path)
                        .map_err(|e| e.to_string())
                        .and_then(|bytes| decode_tile(&bytes, coord, ctx))
                    {
                        Ok(texture) => {
                            tiles.insert(coord, TileState::Loaded(texture.clone()));
                            return Some(texture);
                        }
                        Err(e) => warn!("Failed to load cached tile: {}", e),
                    }
                }

                tiles.insert(coord, TileState::Loading);
                self.queue_download(coord, ctx.clone());
                None
            }
        }
    }

    fn queue_download(&self, coord: TileCoord, ctx: egui::Context) {
        let tiles = self.tiles.clone();
        let cache_dir = self.cache_dir.clone();

        std::thread::spawn(move || {
            let state = match Self::download_tile(coord, &cache_dir, &ctx) {
                Ok(texture) => TileState::Loaded(texture),
                Err(e) => {
                    warn!("Failed to fetch tile {}: {}", coord.url(), e);
                    TileState::Failed
                }
            };
            tiles.lock().unwrap().insert(coord, state);
            ctx.request_repaint();
        });
    }

    fn download_tile(
        coord: TileCoord,
        cache_dir: &Path,
        ctx: &egui::Context,
    ) -> Result<TextureHandle, String> {
        let url = coord.url();
        debug!("Downloading tile: {}", url);

        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| e.to_string())?;
        let response = client.get(&url).send().map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }
        let bytes = response.bytes().map_err(|e| e.to_string())?;

        let cache_path = cache_dir.join(format!("{}.png", coord.cache_filename()));
        if let Err(e) = fs::write(&cache_path, &bytes) {
            warn!("Failed to save tile to cache: {}", e);
        }

        decode_tile(&bytes, coord, ctx)
    }

    /// Tiles covering a viewport, with pixel offsets from the viewport center
    pub fn get_visible_tiles(
        center_lat: f64,
        center_lon: f64,
        zoom: u8,
        viewport_width: f32,
        viewport_height: f32,
    ) -> Vec<(TileCoord, f32, f32)> {
        let mut tiles = Vec::new();

        let center_tile_x = WebMercator::lon_to_x(center_lon, zoom);
        let center_tile_y = WebMercator::lat_to_y(center_lat, zoom);

        let tiles_wide = (viewport_width / TILE_SIZE).ceil() as i32 + 2;
        let tiles_high = (viewport_height / TILE_SIZE).ceil() as i32 + 2;

        let start_x = center_tile_x.floor() as i32 - tiles_wide / 2;
        let start_y = center_tile_y.floor() as i32 - tiles_high / 2;

        let max_tile = 2_i32.pow(u32::from(zoom));

        for dy in 0..tiles_high {
            for dx in 0..tiles_wide {
                let tile_x = start_x + dx;
                let tile_y = start_y + dy;

                // Longitude wraps, latitude does not
                let wrapped_x = ((tile_x % max_tile) + max_tile) % max_tile;

                if tile_y >= 0 && tile_y < max_tile {
                    let coord = TileCoord::new(wrapped_x as u32, tile_y as u32, zoom);

                    let offset_x = (f64::from(tile_x) - center_tile_x) * f64::from(TILE_SIZE);
                    let offset_y = (f64::from(tile_y) - center_tile_y) * f64::from(TILE_SIZE);

                    tiles.push((coord, offset_x as f32, offset_y as f32));
                }
            }
        }

        tiles
    }

    pub fn has_loading_tiles(&self) -> bool {
        let tiles = self.tiles.lock().unwrap();
        tiles.values().any(|state| matches!(state, TileState::Loading))
    }

    pub fn get_error_count(&self) -> usize {
        let tiles = self.tiles.lock().unwrap();
        tiles.values().filter(|state| matches!(state, TileState::Failed)).count()
    }

    /// Forget failed tiles so they are retried on the next frame
    pub fn retry_failed(&self) {
        let mut tiles = self.tiles.lock().unwrap();
        tiles.retain(|_, state| !matches!(state, TileState::Failed));
        info!("Retrying failed map tiles");
    }
}

fn decode_tile(bytes: &[u8], coord: TileCoord, ctx: &egui::Context) -> Result<TextureHandle, String> {
    let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
    let rgba = img.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let color_image = ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());

    Ok(ctx.load_texture(
        format!("tile_{}_{}/{}", coord.zoom, coord.x, coord.y),
        color_image,
        egui::TextureOptions::LINEAR,
    ))
}
