//! Fixed-interval polling loop
//!
//! One cycle resolves the channel, fetches every tracked endpoint
//! concurrently, filters out already-delivered events and sends one message
//! per new event. Cycles never overlap: a tick that fires while a cycle is in
//! flight is dropped, which keeps the poller the only writer of the seen set.

#[cfg(test)]
mod tests;

use crate::client::VenueApi;
use crate::config::PollerConfig;
use crate::dedup::SharedSeenSet;
use crate::normalize::{format_message, normalize};
use crate::notify::DeliverySink;
use crate::types::{EndpointKind, NormalizedEvent};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Process-scoped collaborators shared by the poller and the command handler
#[derive(Clone)]
pub struct PollContext {
    pub venue: Arc<dyn VenueApi>,
    pub sink: Arc<dyn DeliverySink>,
    pub seen: SharedSeenSet,
    pub channel_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    /// Loop active, waiting for the next tick
    Running,
    Fetching,
    Filtering,
    Delivering,
    Stopped,
}

/// Outcome of a single cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub delivered: usize,
    pub duplicates: usize,
    /// Events dropped because the venue gave them no identity
    pub unidentified: usize,
    pub send_failures: usize,
    pub failed_endpoints: Vec<EndpointKind>,
    /// The channel could not be resolved and the cycle did nothing
    pub skipped: bool,
}

/// Totals over the lifetime of [`Poller::run`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollerStats {
    pub cycles: u64,
    pub skipped_cycles: u64,
    pub delivered: u64,
    /// Ticks that fired while a cycle was still running
    pub dropped_ticks: u64,
}

pub struct Poller {
    ctx: PollContext,
    config: PollerConfig,
    state: watch::Sender<PollerState>,
}

impl Poller {
    pub fn new(ctx: PollContext, config: PollerConfig) -> Self {
        let (state, _) = watch::channel(PollerState::Idle);
        Self { ctx, config, state }
    }

    pub fn state(&self) -> PollerState {
        *self.state.borrow()
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<PollerState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: PollerState) {
        self.state.send_replace(next);
    }

    /// Run cycles until `shutdown` flips to true or its sender is dropped.
    ///
    /// Ticks sit on a fixed grid of `interval` from the start. Any tick whose
    /// deadline passes while a cycle is running is dropped, not queued.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> PollerStats {
        let mut stats = PollerStats::default();
        let period = self.config.interval();
        let mut deadline = Instant::now();

        self.set_state(PollerState::Running);
        info!(
            interval_secs = self.config.interval_secs,
            kinds = ?self.config.kinds,
            "Poller started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    let report = self.run_cycle().await;
                    stats.cycles += 1;
                    stats.delivered += report.delivered as u64;
                    if report.skipped {
                        stats.skipped_cycles += 1;
                    }

                    let (next, dropped) = advance_deadline(deadline, period, Instant::now());
                    if dropped > 0 {
                        debug!(dropped, "Cycle overran the interval, dropping ticks");
                        stats.dropped_ticks += dropped;
                    }
                    deadline = next;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.set_state(PollerState::Stopped);
        info!(cycles = stats.cycles, delivered = stats.delivered, "Poller stopped");
        stats
    }

    /// Execute one fetch → filter → deliver cycle
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();
        let resting = self.state();
        let channel_id = self.ctx.channel_id.as_str();

        if let Err(e) = self.ctx.sink.resolve_channel(channel_id).await {
            warn!(channel_id, "Skipping cycle, delivery channel unavailable: {}", e);
            report.skipped = true;
            return report;
        }

        self.set_state(PollerState::Fetching);
        let venue = &self.ctx.venue;
        let results = join_all(
            self.config
                .kinds
                .iter()
                .map(|&kind| async move { (kind, venue.fetch(kind).await) }),
        )
        .await;

        self.set_state(PollerState::Filtering);
        let mut fresh: Vec<NormalizedEvent> = Vec::new();

        for (kind, result) in results {
            let events = match result {
                Ok(events) => events,
                Err(e) => {
                    warn!(
                        endpoint = %kind,
                        retryable = e.is_retryable(),
                        "Fetch failed, retrying next cycle: {}",
                        e
                    );
                    report.failed_endpoints.push(kind);
                    continue;
                }
            };

            for event in events {
                let Some(key) = event.dedup_key() else {
                    debug!(endpoint = %kind, "Event without identity skipped");
                    report.unidentified += 1;
                    continue;
                };

                if self.ctx.seen.check_and_record(&key) {
                    fresh.push(normalize(&event));
                } else {
                    report.duplicates += 1;
                }
            }
        }

        self.set_state(PollerState::Delivering);
        for event in &fresh {
            match self.ctx.sink.send(channel_id, &format_message(event)).await {
                Ok(()) => {
                    debug!(kind = %event.kind, id = %event.id, "Event delivered");
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!(kind = %event.kind, id = %event.id, "Delivery failed: {}", e);
                    report.send_failures += 1;
                }
            }
        }

        self.set_state(resting);
        if report.delivered > 0 || !report.failed_endpoints.is_empty() {
            info!(
                delivered = report.delivered,
                duplicates = report.duplicates,
                failed = report.failed_endpoints.len(),
                cached = self.ctx.seen.len(),
                "Cycle complete"
            );
        }
        report
    }
}

/// Next grid deadline strictly after `now`, and how many grid ticks were
/// passed over while the cycle ran
fn advance_deadline(deadline: Instant, period: Duration, now: Instant) -> (Instant, u64) {
    let mut next = deadline + period;
    let mut dropped = 0;
    while next <= now {
        next += period;
        dropped += 1;
    }
    (next, dropped)
}
