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

//! Application configuration management.
//!
//! Settings are stored in TOML through `confy`. Command-line flags override
//! them for a single run, and the `RADAR_API_URL` environment variable
//! overrides the API base above both.

use radar_client::{resolve_api_base, ClientConfig, DEFAULT_OPACITY};
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "radar-viewer";
const CONFIG_NAME: &str = "config";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Radar service base URL (env var takes precedence)
    #[serde(default)]
    pub api_base: Option<String>,

    /// Radar overlay opacity (0.0 - 1.0)
    #[serde(default = "default_radar_opacity")]
    pub radar_opacity: f32,

    /// Initial map zoom level (2.0 - 10.0)
    #[serde(default = "default_zoom")]
    pub default_zoom: f32,

    /// Show data attribution in the footer
    #[serde(default = "default_true")]
    pub show_attribution: bool,

    /// HTTP timeout for radar requests, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_config_version() -> u32 {
    1
}

fn default_radar_opacity() -> f32 {
    DEFAULT_OPACITY
}

fn default_zoom() -> f32 {
    4.0
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            api_base: None,
            radar_opacity: default_radar_opacity(),
            default_zoom: default_zoom(),
            show_attribution: true,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    /// Apply command-line overrides for this run
    pub fn apply_overrides(&mut self, api_url: Option<String>, opacity: Option<f32>, zoom: Option<f32>) {
        if let Some(url) = api_url {
            self.api_base = Some(url);
        }
        if let Some(opacity) = opacity {
            self.radar_opacity = opacity.clamp(0.0, 1.0);
        }
        if let Some(zoom) = zoom {
            self.default_zoom = zoom;
        }
    }

    /// Build the radar client configuration, resolving the API base once
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(&resolve_api_base(self.api_base.as_deref()));
        config.request_timeout = std::time::Duration::from_secs(self.request_timeout_secs.max(1));
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"api_base":"http://radar.local"}"#).unwrap();
        assert_eq!(config.api_base.as_deref(), Some("http://radar.local"));
        assert_eq!(config.radar_opacity, DEFAULT_OPACITY);
        assert_eq!(config.default_zoom, 4.0);
        assert!(config.show_attribution);
    }

    #[test]
    fn test_overrides() {
        let mut config = AppConfig::default();
        config.apply_overrides(Some("http://cli".to_string()), Some(1.7), None);
        assert_eq!(config.api_base.as_deref(), Some("http://cli"));
        assert_eq!(config.radar_opacity, 1.0);
        assert_eq!(config.default_zoom, 4.0);
    }

    #[test]
    fn test_client_config_timeout() {
        let config = AppConfig {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.client_config().request_timeout, std::time::Duration::from_secs(1));
    }
}
