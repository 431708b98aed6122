//! Event normalization and message formatting
//!
//! Venue payloads have no guaranteed schema. Each field is looked up under an
//! ordered list of candidate keys and falls back to [`NOT_AVAILABLE`]; a
//! missing timestamp falls back to the time of normalization.


use crate::types::{EndpointKind, NormalizedEvent, RawEvent, Side, NOT_AVAILABLE};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

/// Side tokens that map to [`Side::Long`]; matched case-sensitively
pub const LONG_TOKENS: &[&str] = &["BUY", "LONG"];

/// Candidate keys for each normalized field of one endpoint kind
struct FieldMap {
    symbol: &'static [&'static str],
    price: &'static [&'static str],
    quantity: &'static [&'static str],
    side: &'static [&'static str],
    status: &'static [&'static str],
    time: &'static [&'static str],
}

const ORDER_FIELDS: FieldMap = FieldMap {
    symbol: &["symbol"],
    price: &["price", "avgPrice"],
    quantity: &["quantity", "origQty"],
    side: &["side"],
    status: &["status"],
    time: &["time", "updateTime"],
};

const TPSL_FIELDS: FieldMap = FieldMap {
    symbol: &["symbol"],
    price: &["stopPrice", "price"],
    quantity: &["quantity", "origQty"],
    side: &["side"],
    status: &["status"],
    time: &["time", "updateTime"],
};

const POSITION_FIELDS: FieldMap = FieldMap {
    symbol: &["symbol"],
    price: &["avgPrice", "entryPrice", "price"],
    quantity: &["positionAmt", "quantity"],
    side: &["positionSide", "side"],
    status: &["status"],
    time: &["updateTime", "time"],
};

fn fields_for(kind: EndpointKind) -> &'static FieldMap {
    match kind {
        EndpointKind::Order => &ORDER_FIELDS,
        EndpointKind::TpSl => &TPSL_FIELDS,
        EndpointKind::Position => &POSITION_FIELDS,
    }
}

/// Normalize using the current wall clock for missing timestamps
pub fn normalize(raw: &RawEvent) -> NormalizedEvent {
    normalize_at(raw, Utc::now())
}

/// Normalize with an explicit "now" used when the payload carries no time
pub fn normalize_at(raw: &RawEvent, now: DateTime<Utc>) -> NormalizedEvent {
    let fields = fields_for(raw.kind);
    let payload = &raw.payload;

    let side = match lookup(payload, fields.side).and_then(Value::as_str) {
        Some(token) if LONG_TOKENS.contains(&token) => Side::Long,
        _ => Side::Short,
    };

    let timestamp_millis = lookup(payload, fields.time)
        .and_then(parse_millis)
        .unwrap_or_else(|| now.timestamp() * 1000);

    NormalizedEvent {
        kind: raw.kind,
        id: raw.identity().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        symbol: text_field(payload, fields.symbol),
        price: numeric_field(payload, fields.price),
        quantity: numeric_field(payload, fields.quantity),
        side,
        status: text_field(payload, fields.status),
        timestamp_millis,
    }
}

/// Render one chat message for an event
pub fn format_message(event: &NormalizedEvent) -> String {
    let icon = match event.kind {
        EndpointKind::Order => "🛒",
        EndpointKind::Position => "📊",
        EndpointKind::TpSl => "🎯",
    };

    format!(
        "{} **New {} detected:**\n\
         - **ID:** {}\n\
         - **Symbol:** {}\n\
         - **Price:** {}\n\
         - **Quantity:** {}\n\
         - **Direction:** {}\n\
         - **Status:** {}\n\
         - **Time:** {}\n",
        icon,
        event.kind.label(),
        event.id,
        event.symbol,
        event.price,
        event.quantity,
        event.side,
        event.status,
        timestamp_token(event.timestamp_secs()),
    )
}

/// Discord timestamp token, rendered in each reader's locale
pub fn timestamp_token(secs: i64) -> String {
    format!("<t:{}:F>", secs)
}

fn lookup<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| payload.get(*key))
        .find(|value| match value {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
}

fn text_field(payload: &Value, keys: &[&str]) -> String {
    match lookup(payload, keys) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Numeric strings lose trailing zeros (`"0.0100"` → `"0.01"`); others pass through
fn numeric_field(payload: &Value, keys: &[&str]) -> String {
    let raw = text_field(payload, keys);
    match raw.parse::<Decimal>() {
        Ok(d) => d.normalize().to_string(),
        Err(_) => raw,
    }
}

fn parse_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
