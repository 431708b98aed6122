//! Core types shared across the relay

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Placeholder rendered for any field the venue did not provide
pub const NOT_AVAILABLE: &str = "N/A";

/// Venue endpoint family an event was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Order,
    Position,
    TpSl,
}

impl EndpointKind {
    pub const ALL: [EndpointKind; 3] = [EndpointKind::Order, EndpointKind::Position, EndpointKind::TpSl];

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Order => "order",
            EndpointKind::Position => "position",
            EndpointKind::TpSl => "tpsl",
        }
    }

    /// Human-readable label used in chat messages
    pub fn label(&self) -> &'static str {
        match self {
            EndpointKind::Order => "open order",
            EndpointKind::Position => "open position",
            EndpointKind::TpSl => "TP/SL order",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EndpointKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "order" | "orders" => Ok(EndpointKind::Order),
            "position" | "positions" => Ok(EndpointKind::Position),
            "tpsl" | "tp-sl" => Ok(EndpointKind::TpSl),
            other => Err(format!("unknown endpoint kind: {}", other)),
        }
    }
}

/// Direction of an order or position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => f.write_str("Long"),
            Side::Short => f.write_str("Short"),
        }
    }
}

/// Untyped venue payload tagged with the endpoint it came from
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub kind: EndpointKind,
    pub payload: Value,
}

impl RawEvent {
    pub fn new(kind: EndpointKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    /// Identity of this event within its kind, if the venue supplied one
    pub fn identity(&self) -> Option<String> {
        let keys: &[&str] = match self.kind {
            EndpointKind::Order | EndpointKind::TpSl => &["orderId", "id"],
            EndpointKind::Position => &["positionId", "id"],
        };

        keys.iter().find_map(|key| match self.payload.get(*key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    /// Dedup key, namespaced by kind so ids of different kinds never collide
    pub fn dedup_key(&self) -> Option<String> {
        self.identity().map(|id| format!("{}:{}", self.kind, id))
    }
}

/// Display-ready event derived from a [`RawEvent`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedEvent {
    pub kind: EndpointKind,
    pub id: String,
    pub symbol: String,
    pub price: String,
    pub quantity: String,
    pub side: Side,
    pub status: String,
    pub timestamp_millis: i64,
}

impl NormalizedEvent {
    /// Timestamp in whole seconds, as used by chat timestamp tokens
    pub fn timestamp_secs(&self) -> i64 {
        self.timestamp_millis.div_euclid(1000)
    }
}
