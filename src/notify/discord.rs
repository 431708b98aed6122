//! Discord REST transport
//!
//! Sends channel messages and polls the same channel for commands. Only the
//! plain REST API is used; no gateway connection is held.

use super::{CommandSource, DeliverySink, InboundMessage};
use crate::config::DiscordConfig;
use crate::error::DeliveryError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Discord rejects message content longer than this many characters
pub const MAX_MESSAGE_CHARS: usize = 2000;

pub struct DiscordSink {
    http: Client,
    api_url: String,
    bot_token: String,
    channel_id: String,
    /// Newest message id seen by the command poller; `None` until the first poll
    last_message_id: RwLock<Option<String>>,
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct DiscordMessage {
    id: String,
    #[serde(default)]
    content: String,
    author: DiscordUser,
}

#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    #[serde(default)]
    bot: bool,
}

impl DiscordSink {
    pub fn new(config: &DiscordConfig) -> Result<Self, DeliveryError> {
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            channel_id: config.channel_id.clone(),
            last_message_id: RwLock::new(None),
        })
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    async fn fetch_messages(&self, after: Option<&str>) -> Result<Vec<DiscordMessage>, DeliveryError> {
        let url = format!("{}/channels/{}/messages", self.api_url, self.channel_id);
        let mut request = self.http.get(&url).header("Authorization", self.auth_header());
        request = match after {
            Some(after) => request.query(&[("after", after), ("limit", "50")]),
            None => request.query(&[("limit", "1")]),
        };

        let resp = request.send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(DeliveryError::Send {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl DeliverySink for DiscordSink {
    async fn resolve_channel(&self, channel_id: &str) -> Result<(), DeliveryError> {
        let url = format!("{}/channels/{}", self.api_url, channel_id);
        let resp = self
            .http
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| {
                debug!("channel lookup failed: {}", e);
                DeliveryError::SinkUnavailable(channel_id.to_string())
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            debug!(status = resp.status().as_u16(), "channel lookup rejected");
            Err(DeliveryError::SinkUnavailable(channel_id.to_string()))
        }
    }

    async fn send(&self, channel_id: &str, text: &str) -> Result<(), DeliveryError> {
        let url = format!("{}/channels/{}/messages", self.api_url, channel_id);
        let content = truncate_message(text);

        let resp = self
            .http
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&CreateMessageRequest { content: &content })
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Send {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl CommandSource for DiscordSink {
    async fn next_messages(&self) -> Result<Vec<InboundMessage>, DeliveryError> {
        let cursor = self.last_message_id.read().await.clone();
        let mut messages = self.fetch_messages(cursor.as_deref()).await?;
        messages.sort_by_key(|m| m.id.parse::<u64>().unwrap_or(0));

        if let Some(newest) = messages.last() {
            *self.last_message_id.write().await = Some(newest.id.clone());
        } else if cursor.is_none() {
            // Empty channel: start from the beginning next time
            *self.last_message_id.write().await = Some("0".to_string());
        }

        // The first poll only establishes the cursor; history is not replayed
        if cursor.is_none() {
            return Ok(Vec::new());
        }

        Ok(messages
            .into_iter()
            .filter(|m| !m.author.bot)
            .map(|m| InboundMessage {
                id: m.id,
                author_id: m.author.id,
                text: m.content,
            })
            .collect())
    }
}

/// Cut `text` to Discord's length limit on a character boundary
pub fn truncate_message(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_MESSAGE_CHARS - 1).collect();
    truncated.push('…');
    truncated
}
