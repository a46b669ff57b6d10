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

mod app;
mod config;
mod map;

use clap::Parser;
use eframe::egui;
use log::{info, warn};

use app::RadarApp;
use config::AppConfig;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Weather radar overlay viewer
#[derive(Parser, Debug)]
#[command(name = "radar-viewer", version, about)]
struct Args {
    /// Radar service base URL (overrides the config file; RADAR_API_URL overrides this)
    #[arg(long)]
    api_url: Option<String>,

    /// Initial overlay opacity, 0.0 - 1.0
    #[arg(long)]
    opacity: Option<f32>,

    /// Initial map zoom level
    #[arg(long)]
    zoom: Option<f32>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    info!("Starting Radar Viewer...");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load configuration, using defaults: {}", e);
        AppConfig::default()
    });
    if let Ok(path) = AppConfig::get_config_path() {
        info!("Configuration: {}", path.display());
    }
    config.apply_overrides(args.api_url, args.opacity, args.zoom);
    let client_config = config.client_config();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("radar-fetch")
        .enable_all()
        .build()?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("Weather Radar"),
        ..Default::default()
    };

    eframe::run_native(
        "Weather Radar",
        options,
        Box::new(move |_cc| Ok(Box::new(RadarApp::new(config, client_config, runtime)?))),
    )?;

    Ok(())
}
