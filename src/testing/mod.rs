//! Test doubles shared by unit tests

use crate::client::VenueApi;
use crate::config::VenueConfig;
use crate::error::{ApiError, DeliveryError};
use crate::notify::DeliverySink;
use crate::types::{EndpointKind, RawEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scripted venue: each kind answers from a queue, repeating the last answer
/// once the queue is drained.
#[derive(Default)]
pub struct FakeVenue {
    responses: Mutex<HashMap<EndpointKind, VecDeque<FakeResponse>>>,
    pub calls: AtomicUsize,
    pub call_times: Mutex<Vec<tokio::time::Instant>>,
    /// Artificial latency applied to every fetch
    pub delay: Option<Duration>,
}

#[derive(Clone)]
pub enum FakeResponse {
    Events(Vec<Value>),
    HttpError(u16),
}

impl FakeVenue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn push(&self, kind: EndpointKind, response: FakeResponse) {
        self.responses.lock().entry(kind).or_default().push_back(response);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VenueApi for FakeVenue {
    async fn fetch(&self, kind: EndpointKind) -> Result<Vec<RawEvent>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().push(tokio::time::Instant::now());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = {
            let mut responses = self.responses.lock();
            let queue = responses.entry(kind).or_default();
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        };

        match response {
            Some(FakeResponse::Events(items)) => Ok(items
                .into_iter()
                .map(|payload| RawEvent::new(kind, payload))
                .collect()),
            Some(FakeResponse::HttpError(status)) => Err(ApiError::Http {
                status,
                body: "fake failure".to_string(),
            }),
            None => Ok(Vec::new()),
        }
    }
}

/// Sink that records every message instead of sending it
pub struct RecordingSink {
    pub sent: Mutex<Vec<(String, String)>>,
    pub available: Mutex<bool>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            available: Mutex::new(true),
        })
    }

    pub fn set_available(&self, available: bool) {
        *self.available.lock() = available;
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, text)| text.clone()).collect()
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn resolve_channel(&self, channel_id: &str) -> Result<(), DeliveryError> {
        if *self.available.lock() {
            Ok(())
        } else {
            Err(DeliveryError::SinkUnavailable(channel_id.to_string()))
        }
    }

    async fn send(&self, channel_id: &str, text: &str) -> Result<(), DeliveryError> {
        self.sent.lock().push((channel_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// Venue settings pointing at `base_url` with throwaway credentials
pub fn venue_config(base_url: &str) -> VenueConfig {
    let open_orders = "openApi/swap/v2/trade/openOrders".to_string();
    VenueConfig {
        api_key: "test-key".to_string(),
        secret_key: "secret".to_string(),
        base_url: base_url.to_string(),
        symbol: "BTC-USDT".to_string(),
        request_timeout_secs: 5,
        orders_path: open_orders.clone(),
        positions_path: "openApi/swap/v2/user/positions".to_string(),
        tpsl_path: open_orders,
    }
}
