//! Unit tests for the poll cycle and loop timing

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::error::DeliveryError;
    use crate::notify::MockDeliverySink;
    use crate::testing::{FakeResponse, FakeVenue, RecordingSink};
    use serde_json::json;
    use std::time::Duration;

    fn sample_order() -> serde_json::Value {
        json!({
            "orderId": "1",
            "symbol": "BTC-USDT",
            "price": "50000",
            "quantity": "0.01",
            "side": "BUY",
            "time": "1700000000000"
        })
    }

    fn context(venue: Arc<FakeVenue>, sink: Arc<dyn DeliverySink>) -> PollContext {
        PollContext {
            venue,
            sink,
            seen: SharedSeenSet::new(1000),
            channel_id: "42".to_string(),
        }
    }

    fn config(kinds: &[EndpointKind]) -> PollerConfig {
        PollerConfig {
            kinds: kinds.to_vec(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_same_response_twice_delivers_once() {
        let venue = Arc::new(FakeVenue::new());
        venue.push(EndpointKind::Order, FakeResponse::Events(vec![sample_order()]));
        let sink = RecordingSink::new();
        let poller = Poller::new(context(venue, sink.clone()), config(&[EndpointKind::Order]));

        let first = poller.run_cycle().await;
        let second = poller.run_cycle().await;

        assert_eq!(first.delivered, 1);
        assert_eq!(second.delivered, 0);
        assert_eq!(second.duplicates, 1);

        let sent = sink.sent.lock().clone();
        assert_eq!(sent.len(), 1);
        let (channel, text) = &sent[0];
        assert_eq!(channel, "42");
        assert!(text.contains("Long"));
        assert!(text.contains("BTC-USDT"));
        assert!(text.contains("50000"));
        assert!(text.contains("0.01"));
        assert!(text.contains("<t:1700000000:F>"));
    }

    #[tokio::test]
    async fn test_failed_endpoint_does_not_block_others() {
        let venue = Arc::new(FakeVenue::new());
        venue.push(EndpointKind::Order, FakeResponse::HttpError(500));
        venue.push(
            EndpointKind::Position,
            FakeResponse::Events(vec![json!({"positionId": "p1", "positionSide": "LONG"})]),
        );
        venue.push(
            EndpointKind::TpSl,
            FakeResponse::Events(vec![json!({"orderId": "t1", "type": "STOP_MARKET"})]),
        );
        let sink = RecordingSink::new();
        let poller = Poller::new(context(venue, sink.clone()), config(&EndpointKind::ALL));

        let report = poller.run_cycle().await;

        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed_endpoints, vec![EndpointKind::Order]);
        assert!(!report.skipped);
        assert_eq!(sink.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_endpoint_recovers_next_cycle() {
        let venue = Arc::new(FakeVenue::new());
        venue.push(EndpointKind::Order, FakeResponse::HttpError(503));
        venue.push(EndpointKind::Order, FakeResponse::Events(vec![sample_order()]));
        let sink = RecordingSink::new();
        let poller = Poller::new(context(venue, sink.clone()), config(&[EndpointKind::Order]));

        assert_eq!(poller.run_cycle().await.delivered, 0);
        assert_eq!(poller.run_cycle().await.delivered, 1);
    }

    #[tokio::test]
    async fn test_unavailable_sink_skips_whole_cycle() {
        let venue = Arc::new(FakeVenue::new());
        venue.push(EndpointKind::Order, FakeResponse::Events(vec![sample_order()]));
        let sink = RecordingSink::new();
        sink.set_available(false);
        let ctx = context(venue.clone(), sink.clone());
        let seen = ctx.seen.clone();
        let poller = Poller::new(ctx, config(&[EndpointKind::Order]));

        let report = poller.run_cycle().await;

        assert!(report.skipped);
        assert_eq!(venue.call_count(), 0);
        assert!(seen.is_empty());
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_events_without_identity_are_dropped() {
        let venue = Arc::new(FakeVenue::new());
        venue.push(
            EndpointKind::Order,
            FakeResponse::Events(vec![json!({"symbol": "BTC-USDT"}), sample_order()]),
        );
        let sink = RecordingSink::new();
        let poller = Poller::new(context(venue, sink.clone()), config(&[EndpointKind::Order]));

        let report = poller.run_cycle().await;
        assert_eq!(report.unidentified, 1);
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test]
    async fn test_delivery_preserves_api_order() {
        let venue = Arc::new(FakeVenue::new());
        let orders = ["c", "a", "b"]
            .iter()
            .map(|id| json!({"orderId": id, "symbol": format!("SYM-{}", id)}))
            .collect();
        venue.push(EndpointKind::Order, FakeResponse::Events(orders));
        let sink = RecordingSink::new();
        let poller = Poller::new(context(venue, sink.clone()), config(&[EndpointKind::Order]));

        poller.run_cycle().await;

        let messages = sink.messages();
        assert!(messages[0].contains("SYM-c"));
        assert!(messages[1].contains("SYM-a"));
        assert!(messages[2].contains("SYM-b"));
    }

    #[tokio::test]
    async fn test_same_id_in_different_kinds_both_delivered() {
        let venue = Arc::new(FakeVenue::new());
        venue.push(EndpointKind::Order, FakeResponse::Events(vec![json!({"orderId": "7"})]));
        venue.push(EndpointKind::TpSl, FakeResponse::Events(vec![json!({"orderId": "7"})]));
        let sink = RecordingSink::new();
        let poller = Poller::new(
            context(venue, sink.clone()),
            config(&[EndpointKind::Order, EndpointKind::TpSl]),
        );

        assert_eq!(poller.run_cycle().await.delivered, 2);
    }

    #[tokio::test]
    async fn test_failed_send_is_not_redelivered() {
        let venue = Arc::new(FakeVenue::new());
        venue.push(EndpointKind::Order, FakeResponse::Events(vec![sample_order()]));

        let mut sink = MockDeliverySink::new();
        sink.expect_resolve_channel().times(2).returning(|_| Ok(()));
        sink.expect_send().times(1).returning(|_, _| {
            Err(DeliveryError::Send {
                status: 500,
                body: "boom".to_string(),
            })
        });

        let poller = Poller::new(context(venue, Arc::new(sink)), config(&[EndpointKind::Order]));

        let first = poller.run_cycle().await;
        assert_eq!(first.send_failures, 1);
        assert_eq!(first.delivered, 0);

        let second = poller.run_cycle().await;
        assert_eq!(second.duplicates, 1);
        assert_eq!(poller.state(), PollerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycle_skips_next_tick() {
        // Each fetch takes 45s against a 30s interval
        let venue = Arc::new(FakeVenue::with_delay(Duration::from_secs(45)));
        let sink = RecordingSink::new();
        let poller = Arc::new(Poller::new(
            context(venue.clone(), sink),
            config(&[EndpointKind::Order]),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let start = tokio::time::Instant::now();
        let runner = poller.clone();
        let handle = tokio::spawn(async move { runner.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_secs(100)).await;
        shutdown_tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        // Cycle 1 runs 0s..45s; the 30s tick is dropped and cycle 2 starts at 60s
        let starts: Vec<u64> = venue
            .call_times
            .lock()
            .iter()
            .map(|t| t.duration_since(start).as_secs())
            .collect();
        assert_eq!(starts, vec![0, 60]);
        assert_eq!(stats.cycles, 2);
        // Ticks at 30s and 90s fired mid-cycle
        assert_eq!(stats.dropped_ticks, 2);
        assert_eq!(poller.state(), PollerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_cycles_follow_interval() {
        let venue = Arc::new(FakeVenue::new());
        let sink = RecordingSink::new();
        let poller = Poller::new(context(venue.clone(), sink), config(&[EndpointKind::Order]));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { poller.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_secs(95)).await;
        drop(shutdown_tx);
        let stats = handle.await.unwrap();

        // Ticks at 0, 30, 60 and 90 seconds
        assert_eq!(stats.cycles, 4);
        assert_eq!(stats.dropped_ticks, 0);
        assert_eq!(venue.call_count(), 4);
    }

    #[test]
    fn test_advance_deadline() {
        let start = Instant::now();
        let period = Duration::from_secs(30);
        let at = |secs| start + Duration::from_secs(secs);

        assert_eq!(advance_deadline(start, period, start), (at(30), 0));
        assert_eq!(advance_deadline(start, period, at(29)), (at(30), 0));
        assert_eq!(advance_deadline(start, period, at(45)), (at(60), 1));
        assert_eq!(advance_deadline(start, period, at(60)), (at(90), 2));
        assert_eq!(advance_deadline(at(60), period, at(105)), (at(120), 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_is_running_between_cycles() {
        let venue = Arc::new(FakeVenue::new());
        let sink = RecordingSink::new();
        let poller = Arc::new(Poller::new(context(venue, sink), config(&[EndpointKind::Order])));
        assert_eq!(poller.state(), PollerState::Idle);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = poller.clone();
        let handle = tokio::spawn(async move { runner.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(poller.state(), PollerState::Running);

        shutdown_tx.send(true).unwrap();
        let stats = handle.await.unwrap();
        assert_eq!(stats.cycles, 1);
        assert_eq!(poller.state(), PollerState::Stopped);
    }

    #[tokio::test]
    async fn test_fetches_run_concurrently() {
        let venue = Arc::new(FakeVenue::with_delay(Duration::from_millis(200)));
        let sink = RecordingSink::new();
        let poller = Poller::new(context(venue.clone(), sink), config(&EndpointKind::ALL));

        let started = std::time::Instant::now();
        poller.run_cycle().await;

        assert_eq!(venue.call_count(), 3);
        assert!(started.elapsed() < Duration::from_millis(550));
    }
}
