//! Chat commands
//!
//! Supports `!ping`, `!positions` and `!tpsl`. Commands only read the venue and
//! the seen set; they never record identities.


use crate::normalize::{normalize, timestamp_token};
use crate::notify::{CommandSource, InboundMessage};
use crate::poller::PollContext;
use crate::types::{EndpointKind, NormalizedEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Commands recognised in the relay channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    /// Liveness check
    Ping,
    /// List open positions
    Positions,
    /// List active take-profit / stop-loss orders
    TpSl,
}

impl ChatCommand {
    /// Parse the first word of a message; anything else is not a command
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        match word.to_ascii_lowercase().as_str() {
            "!ping" => Some(ChatCommand::Ping),
            "!positions" | "!pos" => Some(ChatCommand::Positions),
            "!tpsl" => Some(ChatCommand::TpSl),
            _ => None,
        }
    }
}

pub struct CommandHandler {
    ctx: PollContext,
}

impl CommandHandler {
    pub fn new(ctx: PollContext) -> Self {
        Self { ctx }
    }

    /// Handle one inbound message; returns the command if it was one
    pub async fn handle(&self, msg: &InboundMessage) -> Option<ChatCommand> {
        let cmd = ChatCommand::parse(&msg.text)?;
        info!(author = %msg.author_id, ?cmd, "Received command");

        match cmd {
            ChatCommand::Ping => {
                let venue_status = match self.ctx.venue.fetch(EndpointKind::Position).await {
                    Ok(_) => "BingX reachable".to_string(),
                    Err(e) => {
                        warn!("Ping venue check failed: {}", e);
                        format!("BingX unreachable: {}", e)
                    }
                };
                let text = format!(
                    "🏓 Pong! Relay is running, {} events tracked. {}.",
                    self.ctx.seen.len(),
                    venue_status
                );
                self.reply(&text).await;
            }
            ChatCommand::Positions => self.send_listing(EndpointKind::Position).await,
            ChatCommand::TpSl => self.send_listing(EndpointKind::TpSl).await,
        }

        Some(cmd)
    }

    async fn send_listing(&self, kind: EndpointKind) {
        match self.ctx.venue.fetch(kind).await {
            Ok(events) if events.is_empty() => {
                self.reply(&format!("📭 No {}s right now.", kind.label())).await;
            }
            Ok(events) => {
                for event in &events {
                    self.reply(&format_summary(&normalize(event))).await;
                }
            }
            Err(e) => {
                warn!(endpoint = %kind, "Command fetch failed: {}", e);
                self.reply(&format!(
                    "⚠️ Could not fetch {}s right now, please try again later.",
                    kind.label()
                ))
                .await;
            }
        }
    }

    async fn reply(&self, text: &str) {
        if let Err(e) = self.ctx.sink.send(&self.ctx.channel_id, text).await {
            warn!("Failed to send command reply: {}", e);
        }
    }

    /// Poll `source` for commands until `shutdown` flips or its sender is dropped
    pub async fn run(
        &self,
        source: Arc<dyn CommandSource>,
        poll_every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Starting command listener...");
        let mut interval = tokio::time::interval(poll_every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match source.next_messages().await {
                        Ok(messages) => {
                            for msg in &messages {
                                self.handle(msg).await;
                            }
                        }
                        Err(e) => warn!("Failed to poll commands: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Command listener stopped");
    }
}

/// One-line summary used for command listings
pub fn format_summary(event: &NormalizedEvent) -> String {
    format!(
        "**{}** {} | Qty: {} @ {} | Status: {} | {}",
        event.symbol,
        event.side,
        event.quantity,
        event.price,
        event.status,
        timestamp_token(event.timestamp_secs()),
    )
}
