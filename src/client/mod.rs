//! Venue API clients

pub mod auth;
pub mod bingx;


pub use auth::{Credentials, RequestParams};
pub use bingx::BingxClient;

use crate::error::ApiError;
use crate::types::{EndpointKind, RawEvent};
use async_trait::async_trait;

/// Read-only source of venue events, one call per endpoint kind
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VenueApi: Send + Sync {
    async fn fetch(&self, kind: EndpointKind) -> Result<Vec<RawEvent>, ApiError>;
}
