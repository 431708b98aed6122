//! Delivery of messages to the chat channel

pub mod discord;

pub use discord::DiscordSink;

use crate::error::DeliveryError;
use async_trait::async_trait;

/// Where formatted messages go. One call per message; never batched.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Check the channel exists and is reachable before a cycle delivers to it
    async fn resolve_channel(&self, channel_id: &str) -> Result<(), DeliveryError>;

    async fn send(&self, channel_id: &str, text: &str) -> Result<(), DeliveryError>;
}

/// A chat message received from the command channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: String,
    pub author_id: String,
    pub text: String,
}

/// Source of inbound chat messages, polled by the command listener
#[async_trait]
pub trait CommandSource: Send + Sync {
    /// Messages received since the previous call, oldest first
    async fn next_messages(&self) -> Result<Vec<InboundMessage>, DeliveryError>;
}
