//! BingX REST API client
//!
//! Read-only access to open orders, positions and TP/SL orders. Every request
//! carries a fresh timestamp and an HMAC signature over its parameters.

use super::auth::{Credentials, RequestParams, SIGN_PARAM, TIMESTAMP_PARAM};
use super::VenueApi;
use crate::config::VenueConfig;
use crate::error::ApiError;
use crate::types::{EndpointKind, RawEvent};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Keys under which the venue wraps event lists inside `data`
const LIST_KEYS: &[&str] = &["orderList", "orders", "positions"];

/// Order types that belong to the TP/SL feed
const TPSL_TYPE_PREFIXES: &[&str] = &["TAKE_PROFIT", "STOP"];

/// BingX API client sharing one HTTP session across all requests
#[derive(Clone)]
pub struct BingxClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
    config: VenueConfig,
}

impl BingxClient {
    /// Create a new client from venue settings
    pub fn new(config: &VenueConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: Credentials::new(&config.api_key, &config.secret_key),
            config: config.clone(),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    /// Issue a signed GET to `base_url/endpoint` and parse the JSON body
    pub async fn request(&self, endpoint: &str, params: RequestParams) -> Result<Value, ApiError> {
        let params = signed_params(&self.credentials, params, chrono::Utc::now().timestamp_millis())
            .ok_or_else(|| ApiError::Signature {
                endpoint: endpoint.to_string(),
            })?;

        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        debug!(endpoint, "GET {}", url);

        let resp = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.credentials.api_key)
            .query(&params)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if status != StatusCode::OK {
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|_| ApiError::Malformed { raw: body })
    }

    /// Fetch the current events of one kind for the configured symbol
    pub async fn fetch_events(&self, kind: EndpointKind) -> Result<Vec<RawEvent>, ApiError> {
        let mut params = RequestParams::new();
        params.insert("symbol".to_string(), self.config.symbol.clone());

        let body = self.request(self.config.path_for(kind), params).await?;
        let events = extract_events(kind, body)?;

        // Open orders and TP/SL orders may come from the same listing
        let shared = self.config.orders_path == self.config.tpsl_path;
        Ok(events
            .into_iter()
            .filter(|event| !shared || belongs_to(kind, &event.payload))
            .collect())
    }
}

#[async_trait]
impl VenueApi for BingxClient {
    async fn fetch(&self, kind: EndpointKind) -> Result<Vec<RawEvent>, ApiError> {
        self.fetch_events(kind).await
    }
}

/// Add `timestamp` and `sign` to `params`.
///
/// Returns `None` when no signature could be produced.
pub fn signed_params(
    credentials: &Credentials,
    mut params: RequestParams,
    timestamp_millis: i64,
) -> Option<RequestParams> {
    params.remove(SIGN_PARAM);
    params.insert(TIMESTAMP_PARAM.to_string(), timestamp_millis.to_string());

    let signature = credentials.sign(&params);
    if signature.is_empty() {
        return None;
    }

    params.insert(SIGN_PARAM.to_string(), signature);
    Some(params)
}

/// Unwrap the `{code, msg, data}` envelope into tagged raw events
pub fn extract_events(kind: EndpointKind, body: Value) -> Result<Vec<RawEvent>, ApiError> {
    if let Some(code) = body.get("code").and_then(Value::as_i64) {
        if code != 0 {
            return Err(ApiError::Venue {
                code,
                msg: body["msg"].as_str().unwrap_or_default().to_string(),
            });
        }
    }

    let data = match body.get("data") {
        Some(data) => data,
        None => {
            return Err(ApiError::Malformed {
                raw: body.to_string(),
            })
        }
    };

    let items = match data {
        Value::Array(items) => items.clone(),
        Value::Object(map) => LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .or_else(|| map.values().find_map(Value::as_array))
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .map(|payload| RawEvent::new(kind, payload))
        .collect())
}

fn is_tpsl_order(payload: &Value) -> bool {
    payload["type"]
        .as_str()
        .map(|t| TPSL_TYPE_PREFIXES.iter().any(|prefix| t.starts_with(prefix)))
        .unwrap_or(false)
}

fn belongs_to(kind: EndpointKind, payload: &Value) -> bool {
    match kind {
        EndpointKind::Order => !is_tpsl_order(payload),
        EndpointKind::TpSl => is_tpsl_order(payload),
        EndpointKind::Position => true,
    }
}
