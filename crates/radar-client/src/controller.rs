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

//! Refresh cycle state.
//!
//! [`OverlayController`] is the only owner of the overlay state. Every fetch
//! result carries the [`RefreshToken`] it was issued for and is applied
//! through the controller, which drops anything not stamped with the current
//! token. Requests are never aborted; superseded results are just ignored.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info};

use crate::bounds::{BoundsError, BoundsResolution, GeoBounds, FALLBACK_BOUNDS};
use crate::config::ClientConfig;
use crate::monitor::{FailureReason, ProbeOutcome};

/// Badge text shown while the fallback bounds are in use.
pub const FALLBACK_BADGE: &str = "Using fallback bounds";

/// Identifies one fetch cycle; also the image URL cache-buster.
///
/// Milliseconds since the Unix epoch, forced strictly above the previous
/// token when the clock has not moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefreshToken(u64);

impl RefreshToken {
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Next token for `now`, strictly greater than `previous`.
    #[must_use]
    pub fn next(previous: Option<RefreshToken>, now: DateTime<Utc>) -> Self {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        match previous {
            Some(RefreshToken(prev)) if millis <= prev => Self(prev + 1),
            _ => Self(millis),
        }
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Load state of the radar image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed(FailureReason),
}

impl LoadState {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }
}

/// Format a timestamp the way the header shows it, e.g. `3:04:05 PM`.
#[must_use]
pub fn format_timestamp<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    time.format("%-I:%M:%S %p").to_string()
}

/// Reducer owning token, load state, bounds and last-updated time.
#[derive(Debug, Clone)]
pub struct OverlayController {
    config: ClientConfig,
    token: Option<RefreshToken>,
    state: LoadState,
    bounds: GeoBounds,
    degraded: bool,
    bounds_reason: Option<BoundsError>,
    last_updated: Option<DateTime<Utc>>,
    advisory_dismissed: bool,
}

impl OverlayController {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            token: None,
            state: LoadState::Idle,
            bounds: FALLBACK_BOUNDS,
            degraded: false,
            bounds_reason: None,
            last_updated: None,
            advisory_dismissed: false,
        }
    }

    /// User-triggered refresh. Ignored while a cycle is loading.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> Option<RefreshToken> {
        if !self.can_refresh() {
            debug!("Refresh ignored while loading");
            return None;
        }
        Some(self.force_refresh(now))
    }

    /// Start a new cycle unconditionally, superseding any in-flight one.
    pub fn force_refresh(&mut self, now: DateTime<Utc>) -> RefreshToken {
        let token = RefreshToken::next(self.token, now);
        if let Some(previous) = self.token {
            if self.state.is_loading() {
                debug!("Token {} supersedes in-flight {}", token, previous);
            }
        }
        self.token = Some(token);
        self.state = LoadState::Loading;
        self.advisory_dismissed = false;
        info!("Refreshing radar overlay ({})", token);
        token
    }

    /// Apply a bounds resolution. Returns false if it was stale.
    pub fn apply_bounds(&mut self, resolution: BoundsResolution) -> bool {
        if !self.is_current(resolution.token) {
            debug!("Discarding stale bounds for {}", resolution.token);
            return false;
        }
        self.bounds = resolution.bounds;
        self.degraded = resolution.degraded;
        self.bounds_reason = resolution.reason;
        true
    }

    /// Apply a probe outcome. Returns false if it was stale or the current
    /// cycle already completed.
    pub fn apply_probe(&mut self, outcome: ProbeOutcome, now: DateTime<Utc>) -> bool {
        if !self.is_current(outcome.token) {
            debug!("Discarding stale probe result for {}", outcome.token);
            return false;
        }
        if !self.state.is_loading() {
            debug!("Cycle {} already completed", outcome.token);
            return false;
        }
        match outcome.result {
            Ok(()) => {
                self.state = LoadState::Loaded;
                self.last_updated = Some(now);
            }
            Err(reason) => {
                self.state = LoadState::Failed(reason);
            }
        }
        true
    }

    fn is_current(&self, token: RefreshToken) -> bool {
        self.token == Some(token)
    }

    #[must_use]
    pub fn state(&self) -> &LoadState {
        &self.state
    }

    #[must_use]
    pub fn bounds(&self) -> GeoBounds {
        self.bounds
    }

    /// True while the fallback bounds are in use.
    #[must_use]
    pub fn degraded(&self) -> bool {
        self.degraded
    }

    #[must_use]
    pub fn bounds_reason(&self) -> Option<&BoundsError> {
        self.bounds_reason.as_ref()
    }

    #[must_use]
    pub fn bounds_badge(&self) -> Option<&'static str> {
        self.degraded.then_some(FALLBACK_BADGE)
    }

    /// Time of the last successful load, kept across failures.
    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Last-updated time for display; hidden while loading.
    #[must_use]
    pub fn visible_last_updated(&self) -> Option<DateTime<Utc>> {
        if self.state.is_loading() {
            None
        } else {
            self.last_updated
        }
    }

    #[must_use]
    pub fn current_token(&self) -> Option<RefreshToken> {
        self.token
    }

    /// Overlay URL for the current cycle.
    #[must_use]
    pub fn image_url(&self) -> Option<String> {
        self.token.map(|t| self.config.radar_url(t))
    }

    #[must_use]
    pub fn can_refresh(&self) -> bool {
        !self.state.is_loading()
    }

    /// Advisory for the current failure, unless dismissed.
    #[must_use]
    pub fn advisory(&self) -> Option<&'static str> {
        match &self.state {
            LoadState::Failed(reason) if !self.advisory_dismissed => Some(reason.advisory()),
            _ => None,
        }
    }

    pub fn dismiss_advisory(&mut self) {
        self.advisory_dismissed = true;
    }
}
