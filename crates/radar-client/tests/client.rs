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

//! End-to-end refresh cycles against a scripted transport.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbaImage};
use radar_client::{
    Client, ClientConfig, FailureReason, HttpResponse, LatLon, LoadState, RadarTransport,
    TransportError, FALLBACK_BOUNDS,
};
use tokio::runtime::Handle;

/// One scripted reply. `None` simulates a transport failure.
#[derive(Clone)]
struct Reply {
    delay: Duration,
    response: Option<HttpResponse>,
}

impl Reply {
    fn ok(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            delay: Duration::ZERO,
            response: Some(HttpResponse::new(status, body)),
        }
    }

    fn network_error() -> Self {
        Self {
            delay: Duration::ZERO,
            response: None,
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Default)]
struct ScriptedTransport {
    bounds: Mutex<VecDeque<Reply>>,
    radar: Mutex<VecDeque<Reply>>,
    bounds_calls: AtomicUsize,
    radar_calls: AtomicUsize,
}

impl ScriptedTransport {
    fn bounds(self, replies: Vec<Reply>) -> Self {
        *self.bounds.lock().unwrap() = replies.into();
        self
    }

    fn radar(self, replies: Vec<Reply>) -> Self {
        *self.radar.lock().unwrap() = replies.into();
        self
    }
}

#[async_trait]
impl RadarTransport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let reply = if url.ends_with("/api/v1/radar/bounds") {
            self.bounds_calls.fetch_add(1, Ordering::SeqCst);
            self.bounds.lock().unwrap().pop_front()
        } else {
            assert!(url.contains("/api/v1/radar/radar.png?ts="), "unexpected url {url}");
            self.radar_calls.fetch_add(1, Ordering::SeqCst);
            self.radar.lock().unwrap().pop_front()
        };
        let reply = reply.unwrap_or_else(Reply::network_error);

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.response.ok_or_else(|| TransportError::Timeout {
            url: url.to_string(),
        })
    }
}

fn png() -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(RgbaImage::new(4, 4))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

const CONUS_JSON: &str = r#"{"min_lat":24.0,"max_lat":49.0,"min_lon":-125.0,"max_lon":-67.0}"#;

fn client(transport: Arc<ScriptedTransport>) -> Client {
    Client::with_transport(
        ClientConfig::new("http://radar.test"),
        transport,
        Handle::current(),
    )
}

async fn process(client: &mut Client, events: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        for _ in 0..events {
            assert!(client.process_next().await);
        }
    })
    .await
    .expect("events did not arrive in time");
}

#[tokio::test]
async fn test_successful_cycle() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .bounds(vec![Reply::ok(200, CONUS_JSON)])
            .radar(vec![Reply::ok(200, png())]),
    );
    let mut client = client(Arc::clone(&transport));
    assert_eq!(client.snapshot().state, LoadState::Loading);
    assert_eq!(client.snapshot().last_updated, None);

    process(&mut client, 2).await;

    let snapshot = client.snapshot();
    assert_eq!(snapshot.state, LoadState::Loaded);
    assert!(!snapshot.degraded);
    assert_eq!(snapshot.bounds.south_west(), LatLon::new(24.0, -125.0));
    assert_eq!(snapshot.bounds.north_east(), LatLon::new(49.0, -67.0));
    assert!(snapshot.last_updated.is_some());
    assert!(snapshot.can_refresh);
    assert_eq!(snapshot.advisory, None);
    // No diagnostic request after a good probe
    assert_eq!(transport.radar_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bounds_timeout_falls_back() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .bounds(vec![Reply::network_error()])
            .radar(vec![Reply::ok(200, png())]),
    );
    let mut client = client(transport);
    process(&mut client, 2).await;

    let snapshot = client.snapshot();
    assert_eq!(snapshot.bounds, FALLBACK_BOUNDS);
    assert!(snapshot.degraded);
    assert_eq!(snapshot.bounds_badge, Some("Using fallback bounds"));
    assert_eq!(snapshot.state, LoadState::Loaded);
}

#[tokio::test]
async fn test_inverted_bounds_fall_back() {
    let inverted = r#"{"min_lat":49.0,"max_lat":24.0,"min_lon":-67.0,"max_lon":-125.0}"#;
    let transport = Arc::new(
        ScriptedTransport::default()
            .bounds(vec![Reply::ok(200, inverted)])
            .radar(vec![Reply::ok(200, png())]),
    );
    let mut client = client(transport);
    process(&mut client, 2).await;

    assert_eq!(client.snapshot().bounds, FALLBACK_BOUNDS);
    assert!(client.snapshot().degraded);
    assert_eq!(
        client.controller().bounds_reason(),
        Some(&radar_client::BoundsError::Inverted)
    );
}

#[tokio::test]
async fn test_bounds_server_error_falls_back() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .bounds(vec![Reply::ok(503, r#"{"detail":"bounds offline"}"#)])
            .radar(vec![Reply::ok(200, png())]),
    );
    let mut client = client(transport);
    process(&mut client, 2).await;

    let snapshot = client.snapshot();
    assert_eq!(snapshot.bounds, FALLBACK_BOUNDS);
    assert!(snapshot.degraded);
    assert_eq!(snapshot.bounds_badge, Some("Using fallback bounds"));
    assert_eq!(
        client.controller().bounds_reason(),
        Some(&radar_client::BoundsError::Status(503))
    );
    assert_eq!(snapshot.state, LoadState::Loaded);
}

#[tokio::test]
async fn test_malformed_bounds_json_falls_back() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .bounds(vec![Reply::ok(200, r#"{"min_lat":"south","max_lat":49.0}"#)])
            .radar(vec![Reply::ok(200, png())]),
    );
    let mut client = client(transport);
    process(&mut client, 2).await;

    assert_eq!(client.snapshot().bounds, FALLBACK_BOUNDS);
    assert!(client.snapshot().degraded);
    assert!(matches!(
        client.controller().bounds_reason(),
        Some(radar_client::BoundsError::Malformed(_))
    ));
}

#[tokio::test]
async fn test_rate_limited() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .bounds(vec![Reply::ok(200, CONUS_JSON)])
            .radar(vec![
                Reply::ok(429, r#"{"detail":"Rate limit exceeded"}"#),
                Reply::ok(429, r#"{"detail":"Rate limit exceeded"}"#),
            ]),
    );
    let mut client = client(Arc::clone(&transport));
    process(&mut client, 2).await;

    let snapshot = client.snapshot();
    assert_eq!(snapshot.state, LoadState::Failed(FailureReason::RateLimited));
    assert_eq!(
        snapshot.advisory,
        Some("Too many requests. Please wait a minute before trying again.")
    );
    assert_eq!(snapshot.last_updated, None);
    assert!(snapshot.can_refresh);
    assert_eq!(transport.radar_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_server_error_detail() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .bounds(vec![Reply::ok(200, CONUS_JSON)])
            .radar(vec![
                Reply::ok(503, r#"{"detail":"upstream down"}"#),
                Reply::ok(503, r#"{"detail":"upstream down"}"#),
            ]),
    );
    let mut client = client(transport);
    process(&mut client, 2).await;

    let snapshot = client.snapshot();
    assert_eq!(
        snapshot.state,
        LoadState::Failed(FailureReason::ServerError {
            status: 503,
            message: "upstream down".to_string(),
        })
    );
    assert_eq!(
        snapshot.advisory,
        Some("Failed to load radar image. Please try again.")
    );
}

#[tokio::test]
async fn test_undecodable_image_then_network_error() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .bounds(vec![Reply::ok(200, CONUS_JSON)])
            .radar(vec![Reply::ok(200, "not a png"), Reply::network_error()]),
    );
    let mut client = client(transport);
    process(&mut client, 2).await;

    assert_eq!(
        client.snapshot().state,
        LoadState::Failed(FailureReason::NetworkError)
    );
}

#[tokio::test]
async fn test_stale_cycle_discarded() {
    // First cycle: slow degraded bounds and a slow good image.
    // Second cycle: fast good bounds and a rate-limited image.
    let transport = Arc::new(
        ScriptedTransport::default()
            .bounds(vec![
                Reply::ok(500, "").delayed(Duration::from_millis(200)),
                Reply::ok(200, CONUS_JSON),
            ])
            .radar(vec![
                Reply::ok(200, png()).delayed(Duration::from_millis(200)),
                Reply::ok(429, ""),
                Reply::ok(429, ""),
            ]),
    );
    let mut client = client(Arc::clone(&transport));

    // Let the first cycle's requests go out before superseding it
    while transport.bounds_calls.load(Ordering::SeqCst) < 1
        || transport.radar_calls.load(Ordering::SeqCst) < 1
    {
        tokio::task::yield_now().await;
    }
    let second = client.force_refresh();

    process(&mut client, 4).await;

    let snapshot = client.snapshot();
    assert_eq!(snapshot.token, Some(second));
    assert_eq!(snapshot.state, LoadState::Failed(FailureReason::RateLimited));
    assert!(!snapshot.degraded);
    assert_eq!(snapshot.bounds.south_west(), LatLon::new(24.0, -125.0));
    assert_eq!(snapshot.last_updated, None);
}

#[tokio::test]
async fn test_refresh_ignored_while_loading() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .bounds(vec![Reply::ok(200, CONUS_JSON), Reply::ok(200, CONUS_JSON)])
            .radar(vec![Reply::ok(200, png()), Reply::ok(200, png())]),
    );
    let mut client = client(Arc::clone(&transport));
    assert_eq!(client.refresh(), None);

    process(&mut client, 2).await;
    let first = client.snapshot().token.unwrap();

    let second = client.refresh().expect("refresh allowed after load");
    assert!(second > first);
    assert_eq!(client.snapshot().state, LoadState::Loading);
    assert_eq!(client.snapshot().last_updated, None);

    process(&mut client, 2).await;
    assert_eq!(client.snapshot().state, LoadState::Loaded);
    assert_eq!(transport.bounds_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_opacity_does_not_fetch() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .bounds(vec![Reply::ok(200, CONUS_JSON)])
            .radar(vec![Reply::ok(200, png())]),
    );
    let mut client = client(Arc::clone(&transport));
    process(&mut client, 2).await;
    let token = client.snapshot().token;

    client.set_opacity(0.35);
    client.set_opacity(1.4);

    assert_eq!(client.opacity().value(), 1.0);
    assert_eq!(client.snapshot().token, token);
    assert_eq!(client.poll_events(), 0);
    assert_eq!(transport.bounds_calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.radar_calls.load(Ordering::SeqCst), 1);
}
