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

//! Geographic bounds for the radar overlay.
//!
//! The bounds service reports the rectangle the radar image covers. When the
//! service is unreachable or answers with something unusable, the resolver
//! falls back to a fixed CONUS rectangle and flags the result as degraded so
//! the map can show a badge.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::config::ClientConfig;
use crate::controller::RefreshToken;
use crate::transport::RadarTransport;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Rectangle an overlay image is stretched over.
///
/// Always satisfies `south_west.lat < north_east.lat` and
/// `south_west.lon < north_east.lon`; construct through [`GeoBounds::new`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    south_west: LatLon,
    north_east: LatLon,
}

/// Continental US, used whenever the bounds service cannot be used.
pub const FALLBACK_BOUNDS: GeoBounds = GeoBounds {
    south_west: LatLon::new(24.396_308, -124.848_974),
    north_east: LatLon::new(49.384_358, -66.885_444),
};

/// Why a bounds fetch did not produce usable bounds.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundsError {
    #[error("bounds service unreachable: {0}")]
    Unavailable(String),
    #[error("bounds service returned HTTP {0}")]
    Status(u16),
    #[error("malformed bounds response: {0}")]
    Malformed(String),
    #[error("bounds corners are inverted or empty")]
    Inverted,
    #[error("bounds contain non-finite coordinates")]
    NonFinite,
}

impl GeoBounds {
    /// Validate and build bounds from two corners.
    pub fn new(south_west: LatLon, north_east: LatLon) -> Result<Self, BoundsError> {
        let coords = [south_west.lat, south_west.lon, north_east.lat, north_east.lon];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(BoundsError::NonFinite);
        }
        if south_west.lat >= north_east.lat || south_west.lon >= north_east.lon {
            return Err(BoundsError::Inverted);
        }
        Ok(Self {
            south_west,
            north_east,
        })
    }

    #[must_use]
    pub fn south_west(&self) -> LatLon {
        self.south_west
    }

    #[must_use]
    pub fn north_east(&self) -> LatLon {
        self.north_east
    }

    /// Center of the rectangle in degrees.
    #[must_use]
    pub fn center(&self) -> LatLon {
        LatLon::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lon + self.north_east.lon) / 2.0,
        )
    }

    /// Latitude and longitude extent in degrees.
    #[must_use]
    pub fn span(&self) -> (f64, f64) {
        (
            self.north_east.lat - self.south_west.lat,
            self.north_east.lon - self.south_west.lon,
        )
    }

    #[must_use]
    pub fn contains(&self, point: LatLon) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lon >= self.south_west.lon
            && point.lon <= self.north_east.lon
    }
}

impl Default for GeoBounds {
    fn default() -> Self {
        FALLBACK_BOUNDS
    }
}

impl fmt::Display for GeoBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[({:.4}, {:.4}), ({:.4}, {:.4})]",
            self.south_west.lat, self.south_west.lon, self.north_east.lat, self.north_east.lon
        )
    }
}

/// Bounds as the service sends them.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WireBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl TryFrom<WireBounds> for GeoBounds {
    type Error = BoundsError;

    fn try_from(wire: WireBounds) -> Result<Self, Self::Error> {
        GeoBounds::new(
            LatLon::new(wire.min_lat, wire.min_lon),
            LatLon::new(wire.max_lat, wire.max_lon),
        )
    }
}

/// Parse a bounds response body.
pub fn parse_bounds(body: &[u8]) -> Result<GeoBounds, BoundsError> {
    let wire: WireBounds =
        serde_json::from_slice(body).map_err(|e| BoundsError::Malformed(e.to_string()))?;
    GeoBounds::try_from(wire)
}

/// Result of one bounds resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundsResolution {
    /// Refresh cycle this resolution belongs to.
    pub token: RefreshToken,
    pub bounds: GeoBounds,
    /// True when `bounds` is the fallback rectangle.
    pub degraded: bool,
    /// Why the fallback was used.
    pub reason: Option<BoundsError>,
}

impl BoundsResolution {
    fn resolved(token: RefreshToken, bounds: GeoBounds) -> Self {
        Self {
            token,
            bounds,
            degraded: false,
            reason: None,
        }
    }

    fn fallback(token: RefreshToken, reason: BoundsError) -> Self {
        Self {
            token,
            bounds: FALLBACK_BOUNDS,
            degraded: true,
            reason: Some(reason),
        }
    }
}

/// Fetches overlay bounds, falling back to [`FALLBACK_BOUNDS`].
#[derive(Clone)]
pub struct BoundsResolver {
    url: String,
    transport: Arc<dyn RadarTransport>,
}

impl fmt::Debug for BoundsResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundsResolver")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl BoundsResolver {
    #[must_use]
    pub fn new(config: &ClientConfig, transport: Arc<dyn RadarTransport>) -> Self {
        Self {
            url: config.bounds_url(),
            transport,
        }
    }

    /// Fetch bounds for one refresh cycle. Never fails; failures degrade.
    pub async fn resolve(&self, token: RefreshToken) -> BoundsResolution {
        match self.fetch().await {
            Ok(bounds) => {
                debug!("Resolved bounds {} for token {}", bounds, token);
                BoundsResolution::resolved(token, bounds)
            }
            Err(e) => {
                warn!("Using fallback bounds for token {}: {}", token, e);
                BoundsResolution::fallback(token, e)
            }
        }
    }

    async fn fetch(&self) -> Result<GeoBounds, BoundsError> {
        let response = self
            .transport
            .get(&self.url)
            .await
            .map_err(|e| BoundsError::Unavailable(e.to_string()))?;

        if !response.is_success() {
            return Err(BoundsError::Status(response.status));
        }

        parse_bounds(&response.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_bounds_transposed() {
        let body = br#"{"min_lat":24.0,"max_lat":49.0,"min_lon":-125.0,"max_lon":-67.0}"#;
        let bounds = parse_bounds(body).unwrap();
        assert_eq!(bounds.south_west(), LatLon::new(24.0, -125.0));
        assert_eq!(bounds.north_east(), LatLon::new(49.0, -67.0));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let body = br#"{"min_lat":49.0,"max_lat":24.0,"min_lon":-125.0,"max_lon":-67.0}"#;
        assert_eq!(parse_bounds(body), Err(BoundsError::Inverted));

        let degenerate = GeoBounds::new(LatLon::new(30.0, -100.0), LatLon::new(30.0, -90.0));
        assert_eq!(degenerate, Err(BoundsError::Inverted));
    }

    #[test]
    fn test_non_finite_rejected() {
        let result = GeoBounds::new(LatLon::new(f64::NAN, -100.0), LatLon::new(40.0, -90.0));
        assert_eq!(result, Err(BoundsError::NonFinite));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let body = br#"{"min_lat":24.0,"max_lat":49.0,"min_lon":-125.0}"#;
        assert!(matches!(parse_bounds(body), Err(BoundsError::Malformed(_))));
    }

    #[test]
    fn test_fallback_satisfies_invariant() {
        let sw = FALLBACK_BOUNDS.south_west();
        let ne = FALLBACK_BOUNDS.north_east();
        assert!(GeoBounds::new(sw, ne).is_ok());
        assert!(FALLBACK_BOUNDS.contains(LatLon::new(39.0, -98.0)));
        assert!(!FALLBACK_BOUNDS.contains(LatLon::new(51.5, -0.1)));
    }

    #[test]
    fn test_center_and_span() {
        let bounds = GeoBounds::new(LatLon::new(20.0, -120.0), LatLon::new(50.0, -60.0)).unwrap();
        assert_eq!(bounds.center(), LatLon::new(35.0, -90.0));
        assert_eq!(bounds.span(), (30.0, 60.0));
    }
}
