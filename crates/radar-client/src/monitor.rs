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

//! Out-of-band load detection for the radar overlay.
//!
//! The overlay renderer gives no reliable completion signal, so the monitor
//! loads the same URL on its own and decodes it. When that probe fails, a
//! second plain GET recovers the HTTP status and error detail so the failure
//! can be classified.

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::controller::RefreshToken;
use crate::transport::{HttpResponse, RadarTransport};

/// HTTP status reserved for rate limiting.
pub const RATE_LIMITED_STATUS: u16 = 429;

/// Message used when an error body carries no usable `detail`.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

const RATE_LIMITED_ADVISORY: &str = "Too many requests. Please wait a minute before trying again.";
const GENERIC_ADVISORY: &str = "Failed to load radar image. Please try again.";

/// Why the radar image could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The service answered 429.
    RateLimited,
    /// Any other non-success status, with the server's `detail` message.
    ServerError { status: u16, message: String },
    /// The diagnostic request itself could not complete.
    NetworkError,
}

impl FailureReason {
    /// User-facing advisory text.
    #[must_use]
    pub fn advisory(&self) -> &'static str {
        match self {
            FailureReason::RateLimited => RATE_LIMITED_ADVISORY,
            FailureReason::ServerError { .. } | FailureReason::NetworkError => GENERIC_ADVISORY,
        }
    }

    /// Short heading for the advisory banner.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            FailureReason::RateLimited => "Rate limited",
            FailureReason::ServerError { .. } => "Radar unavailable",
            FailureReason::NetworkError => "Network error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::RateLimited => write!(f, "rate limited (HTTP {RATE_LIMITED_STATUS})"),
            FailureReason::ServerError { status, message } => {
                write!(f, "server error (HTTP {status}): {message}")
            }
            FailureReason::NetworkError => write!(f, "network error"),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Extract the `detail` message from an error body.
#[must_use]
pub fn error_detail(body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .map(|b| b.detail)
        .unwrap_or_else(|_| UNKNOWN_ERROR_MESSAGE.to_string())
}

/// Classify a diagnostic response after a failed probe.
///
/// A success status here still means the image was unusable, so it is
/// reported as a server error.
#[must_use]
pub fn classify(response: &HttpResponse) -> FailureReason {
    if response.status == RATE_LIMITED_STATUS {
        return FailureReason::RateLimited;
    }
    let message = if response.is_success() {
        UNKNOWN_ERROR_MESSAGE.to_string()
    } else {
        error_detail(&response.body)
    };
    FailureReason::ServerError {
        status: response.status,
        message,
    }
}

/// Outcome of monitoring one refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub token: RefreshToken,
    pub result: Result<(), FailureReason>,
}

/// Detects load success or failure of the radar image for a refresh token.
#[derive(Clone)]
pub struct OverlayLoadMonitor {
    config: ClientConfig,
    transport: Arc<dyn RadarTransport>,
}

impl fmt::Debug for OverlayLoadMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayLoadMonitor")
            .field("api_base", &self.config.api_base)
            .finish_non_exhaustive()
    }
}

impl OverlayLoadMonitor {
    #[must_use]
    pub fn new(config: ClientConfig, transport: Arc<dyn RadarTransport>) -> Self {
        Self { config, transport }
    }

    /// Probe the image for `token`, then diagnose if the probe failed.
    pub async fn monitor(&self, token: RefreshToken) -> ProbeOutcome {
        let url = self.config.radar_url(token);

        if self.probe(&url).await {
            info!("Radar image loaded successfully ({})", token);
            return ProbeOutcome {
                token,
                result: Ok(()),
            };
        }

        let reason = self.diagnose(&url).await;
        warn!("Failed to load radar image ({}): {}", token, reason);
        ProbeOutcome {
            token,
            result: Err(reason),
        }
    }

    async fn probe(&self, url: &str) -> bool {
        match self.transport.get(url).await {
            Ok(response) if response.is_success() => match image::load_from_memory(&response.body) {
                Ok(img) => {
                    debug!("Decoded radar image {}x{}", img.width(), img.height());
                    true
                }
                Err(e) => {
                    debug!("Radar image did not decode: {}", e);
                    false
                }
            },
            Ok(response) => {
                debug!("Probe got HTTP {}", response.status);
                false
            }
            Err(e) => {
                debug!("Probe failed: {}", e);
                false
            }
        }
    }

    async fn diagnose(&self, url: &str) -> FailureReason {
        match self.transport.get(url).await {
            Ok(response) => classify(&response),
            Err(e) => {
                debug!("Diagnostic request failed: {}", e);
                FailureReason::NetworkError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_429_is_rate_limited() {
        let response = HttpResponse::new(429, br#"{"detail":"slow down"}"#.to_vec());
        assert_eq!(classify(&response), FailureReason::RateLimited);
    }

    #[test]
    fn test_server_error_detail() {
        let response = HttpResponse::new(503, br#"{"detail":"upstream down"}"#.to_vec());
        assert_eq!(
            classify(&response),
            FailureReason::ServerError {
                status: 503,
                message: "upstream down".to_string(),
            }
        );
    }

    #[test]
    fn test_unparseable_detail_defaults() {
        let html = HttpResponse::new(502, b"<html>Bad Gateway</html>".to_vec());
        assert_eq!(
            classify(&html),
            FailureReason::ServerError {
                status: 502,
                message: UNKNOWN_ERROR_MESSAGE.to_string(),
            }
        );

        // FastAPI validation errors put a list in `detail`
        let list = HttpResponse::new(422, br#"{"detail":[{"msg":"bad ts"}]}"#.to_vec());
        assert_eq!(
            classify(&list),
            FailureReason::ServerError {
                status: 422,
                message: UNKNOWN_ERROR_MESSAGE.to_string(),
            }
        );
    }

    #[test]
    fn test_advisories_differ() {
        let rate = FailureReason::RateLimited.advisory();
        assert_eq!(rate, "Too many requests. Please wait a minute before trying again.");
        let server = FailureReason::ServerError {
            status: 503,
            message: "upstream down".to_string(),
        };
        assert_ne!(rate, server.advisory());
        assert_ne!(rate, FailureReason::NetworkError.advisory());
        assert_eq!(server.advisory(), FailureReason::NetworkError.advisory());
    }
}
