//! Request signing for the BingX REST API
//!
//! BingX authenticates requests with an HMAC-SHA256 signature over the
//! query parameters sorted by key, sent as the `sign` parameter.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

/// Name of the signature parameter; never part of its own input
pub const SIGN_PARAM: &str = "sign";
pub const TIMESTAMP_PARAM: &str = "timestamp";

/// Query parameters, kept sorted by key
pub type RequestParams = BTreeMap<String, String>;

/// API credentials for the venue
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Sign `params` with this secret
    pub fn sign(&self, params: &RequestParams) -> String {
        sign(&self.secret_key, params)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Canonical `k1=v1&k2=v2` form over every parameter except `sign`
pub fn canonical_query(params: &RequestParams) -> String {
    params
        .iter()
        .filter(|(key, _)| key.as_str() != SIGN_PARAM)
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Lowercase hex HMAC-SHA256 of the canonical query.
///
/// Returns an empty string if the MAC cannot be keyed; callers must abort the
/// request rather than send it unsigned.
pub fn sign(secret: &str, params: &RequestParams) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(e) => {
            tracing::error!("HMAC initialisation failed: {}", e);
            return String::new();
        }
    };

    mac.update(canonical_query(params).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
