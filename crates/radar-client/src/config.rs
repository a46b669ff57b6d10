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

//! Client configuration and endpoint construction.

use std::time::Duration;

use crate::controller::RefreshToken;

/// Environment variable that overrides the configured API base URL.
pub const API_BASE_ENV: &str = "RADAR_API_URL";

/// API base used when nothing else is configured.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

const RADAR_PATH: &str = "/api/v1/radar/radar.png";
const BOUNDS_PATH: &str = "/api/v1/radar/bounds";

/// Configuration shared by the bounds resolver and the load monitor.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the radar service, without a trailing slash.
    pub api_base: String,
    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
    /// Channel buffer size for fetch results.
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(15),
            event_buffer: 16,
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given API base.
    #[must_use]
    pub fn new(api_base: &str) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Cache-busted radar image URL for one refresh cycle.
    #[must_use]
    pub fn radar_url(&self, token: RefreshToken) -> String {
        format!("{}{}?ts={}", self.base(), RADAR_PATH, token)
    }

    /// Bounds endpoint URL.
    #[must_use]
    pub fn bounds_url(&self) -> String {
        format!("{}{}", self.base(), BOUNDS_PATH)
    }

    fn base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }
}

/// Resolve the API base from the environment or a configured value.
///
/// The `RADAR_API_URL` environment variable takes precedence, then the
/// configured value, then [`DEFAULT_API_BASE`]. Empty values are skipped.
#[must_use]
pub fn resolve_api_base(configured: Option<&str>) -> String {
    let from_env = std::env::var(API_BASE_ENV).ok();
    pick_api_base(from_env.as_deref(), configured)
}

fn pick_api_base(from_env: Option<&str>, configured: Option<&str>) -> String {
    from_env
        .filter(|s| !s.trim().is_empty())
        .or_else(|| configured.filter(|s| !s.trim().is_empty()))
        .unwrap_or(DEFAULT_API_BASE)
        .trim()
        .trim_end_matches('/')
        .to_string()
}
