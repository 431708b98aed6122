//! BingX Relay Bot
//!
//! Polls the BingX REST API for open orders, positions and TP/SL orders and
//! relays each newly observed event to a Discord channel exactly once.
//!
//! ## Architecture
//!
//! ```text
//! Poller → BingxClient (signed GET) → Normalizer → Dedup filter → DeliverySink
//!                                                    ↑
//!                          CommandHandler (!ping, !positions, !tpsl, read-only)
//! ```

pub mod client;
pub mod commands;
pub mod config;
pub mod dedup;
pub mod error;
pub mod normalize;
pub mod notify;
pub mod poller;
pub mod types;

#[cfg(test)]
pub mod testing;
