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

//! Client library for keeping a weather radar map overlay in sync.
//!
//! A refresh cycle is identified by a [`RefreshToken`]. Each cycle fetches the
//! overlay bounds and probes the radar image concurrently; both results come
//! back stamped with the token they were issued for and go through a single
//! reducer, [`OverlayController`], which drops anything from an older cycle.
//!
//! - **Bounds**: [`BoundsResolver`] fetches the geographic rectangle and falls
//!   back to the CONUS rectangle when the service cannot be used
//! - **Load monitoring**: [`OverlayLoadMonitor`] decodes the image out of band
//!   and classifies failures (rate limited, server error, network)
//! - **Refresh**: [`OverlayController`] owns token, load state, bounds and the
//!   last-updated time
//! - **Opacity**: [`Opacity`] is presentation only and never refetches
//!
//! # Quick Start
//!
//! ```no_run
//! use radar_client::{Client, ClientConfig, LoadState};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut client = Client::spawn(ClientConfig::new("http://localhost:8000"))
//!         .expect("client");
//!
//!     while client.snapshot().state.is_loading() {
//!         client.process_next().await;
//!     }
//!
//!     let snapshot = client.snapshot();
//!     println!("{:?} over {}", snapshot.state, snapshot.bounds);
//!     if let LoadState::Failed(reason) = &snapshot.state {
//!         println!("{}", reason.advisory());
//!     }
//! }
//! ```

pub mod bounds;
pub mod config;
pub mod controller;
pub mod monitor;
pub mod opacity;
pub mod transport;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use bounds::{BoundsError, BoundsResolution, BoundsResolver, GeoBounds, LatLon, FALLBACK_BOUNDS};
pub use config::{resolve_api_base, ClientConfig, API_BASE_ENV, DEFAULT_API_BASE};
pub use controller::{format_timestamp, LoadState, OverlayController, RefreshToken, FALLBACK_BADGE};
pub use monitor::{FailureReason, OverlayLoadMonitor, ProbeOutcome};
pub use opacity::{Opacity, DEFAULT_OPACITY};
pub use transport::{HttpResponse, HttpTransport, RadarTransport, TransportError};

/// Errors raised while building a [`Client`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build HTTP transport: {0}")]
    Transport(#[from] TransportError),
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// A fetch result, stamped with the token it was issued for.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Bounds(BoundsResolution),
    Probe(ProbeOutcome),
}

impl ClientEvent {
    #[must_use]
    pub fn token(&self) -> RefreshToken {
        match self {
            ClientEvent::Bounds(r) => r.token,
            ClientEvent::Probe(p) => p.token,
        }
    }
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySnapshot {
    pub token: Option<RefreshToken>,
    pub image_url: Option<String>,
    pub state: LoadState,
    pub bounds: GeoBounds,
    pub degraded: bool,
    pub bounds_badge: Option<&'static str>,
    pub last_updated: Option<DateTime<Utc>>,
    pub advisory: Option<&'static str>,
    pub can_refresh: bool,
    pub opacity: Opacity,
}

/// Full-stack client wiring resolver, monitor and controller together.
///
/// Fetches run as tasks on a tokio runtime; their results are applied when
/// the owner calls [`Client::process_next`] or [`Client::poll_events`], so
/// state is only ever mutated from the owning thread.
pub struct Client {
    controller: OverlayController,
    opacity: Opacity,
    resolver: BoundsResolver,
    monitor: OverlayLoadMonitor,
    event_tx: mpsc::Sender<ClientEvent>,
    event_rx: mpsc::Receiver<ClientEvent>,
    cancel_token: CancellationToken,
    runtime: Handle,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("controller", &self.controller)
            .field("opacity", &self.opacity)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Spawn a client on the current runtime with the HTTP transport and
    /// start the first refresh cycle.
    pub fn spawn(config: ClientConfig) -> Result<Self, ClientError> {
        let runtime = Handle::try_current()?;
        Self::with_handle(config, runtime)
    }

    /// Spawn a client whose fetches run on `runtime`.
    pub fn with_handle(config: ClientConfig, runtime: Handle) -> Result<Self, ClientError> {
        let transport = Arc::new(HttpTransport::new(config.request_timeout)?);
        Ok(Self::with_transport(config, transport, runtime))
    }

    /// Spawn a client with a custom transport.
    #[must_use]
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn RadarTransport>,
        runtime: Handle,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(2));
        info!("Radar client using {}", config.api_base);

        let mut client = Self {
            resolver: BoundsResolver::new(&config, Arc::clone(&transport)),
            monitor: OverlayLoadMonitor::new(config.clone(), transport),
            controller: OverlayController::new(config),
            opacity: Opacity::default(),
            event_tx,
            event_rx,
            cancel_token: CancellationToken::new(),
            runtime,
        };

        let token = client.controller.force_refresh(Utc::now());
        client.start_cycle(token);
        client
    }

    /// User-triggered refresh. Returns `None` while a cycle is loading.
    pub fn refresh(&mut self) -> Option<RefreshToken> {
        let token = self.controller.refresh(Utc::now())?;
        self.start_cycle(token);
        Some(token)
    }

    /// Start a new cycle even if one is in flight; the old one is ignored.
    pub fn force_refresh(&mut self) -> RefreshToken {
        let token = self.controller.force_refresh(Utc::now());
        self.start_cycle(token);
        token
    }

    fn start_cycle(&self, token: RefreshToken) {
        let resolver = self.resolver.clone();
        let tx = self.event_tx.clone();
        let cancel = self.cancel_token.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                resolution = resolver.resolve(token) => {
                    let _ = tx.send(ClientEvent::Bounds(resolution)).await;
                }
                () = cancel.cancelled() => {}
            }
        });

        let monitor = self.monitor.clone();
        let tx = self.event_tx.clone();
        let cancel = self.cancel_token.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                outcome = monitor.monitor(token) => {
                    let _ = tx.send(ClientEvent::Probe(outcome)).await;
                }
                () = cancel.cancelled() => {}
            }
        });
    }

    /// Wait for the next fetch result and apply it.
    ///
    /// Returns false once the client has been shut down.
    pub async fn process_next(&mut self) -> bool {
        let event = tokio::select! {
            event = self.event_rx.recv() => event,
            () = self.cancel_token.cancelled() => None,
        };
        match event {
            Some(event) => {
                self.apply(event);
                true
            }
            None => false,
        }
    }

    /// Apply every result that has already arrived without waiting.
    ///
    /// Returns the number of results that changed state.
    pub fn poll_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            if self.apply(event) {
                applied += 1;
            }
        }
        applied
    }

    /// Apply a single result through the controller.
    pub fn apply(&mut self, event: ClientEvent) -> bool {
        let token = event.token();
        let applied = match event {
            ClientEvent::Bounds(resolution) => self.controller.apply_bounds(resolution),
            ClientEvent::Probe(outcome) => self.controller.apply_probe(outcome, Utc::now()),
        };
        if !applied {
            debug!("Result for {} not applied", token);
        }
        applied
    }

    #[must_use]
    pub fn snapshot(&self) -> OverlaySnapshot {
        let c = &self.controller;
        OverlaySnapshot {
            token: c.current_token(),
            image_url: c.image_url(),
            state: c.state().clone(),
            bounds: c.bounds(),
            degraded: c.degraded(),
            bounds_badge: c.bounds_badge(),
            last_updated: c.visible_last_updated(),
            advisory: c.advisory(),
            can_refresh: c.can_refresh(),
            opacity: self.opacity,
        }
    }

    #[must_use]
    pub fn controller(&self) -> &OverlayController {
        &self.controller
    }

    /// Change overlay opacity. Never triggers a fetch.
    pub fn set_opacity(&mut self, value: f32) {
        self.opacity = Opacity::new(value);
    }

    #[must_use]
    pub fn opacity(&self) -> Opacity {
        self.opacity
    }

    pub fn dismiss_advisory(&mut self) {
        self.controller.dismiss_advisory();
    }

    /// Stop outstanding fetches from reporting back.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
