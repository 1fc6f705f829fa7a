//! Push-channel behaviour as seen by subscribers that join mid-session.

use chrono::Utc;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use spreadnet::config::SynthesizerConfig;
use spreadnet::console::ConsoleReporter;
use spreadnet::engine::monitor::{Monitor, MonitorSettings};
use spreadnet::engine::publisher::{handshake_events, MonitorEvent, Publisher};
use spreadnet::engine::synthesizer::{MultiplierProvider, Synthesizer};

use crate::mock_upstream::{sol_usdc, MockChain, MockQuoteSource};

fn monitor(ttl_secs: u64) -> Monitor {
    let quotes = Arc::new(MockQuoteSource::new());
    quotes.set_ratio("SOL/USDC", 150);
    Monitor::new(
        MonitorSettings {
            pairs: vec![sol_usdc()],
            notional_amount: 1_000_000_000,
            poll_interval: Duration::from_millis(10),
            error_backoff: Duration::from_millis(10),
            window_size: 50,
            push_enabled: true,
        },
        quotes,
        Arc::new(MockChain::new(77)),
        Arc::new(MultiplierProvider::from_config(&SynthesizerConfig::default())),
        Synthesizer::new("Jupiter", dec!(0.005), ttl_secs),
        Arc::new(Publisher::new(256)),
    )
}

fn opportunities_update(events: &[MonitorEvent]) -> &[spreadnet::types::Opportunity] {
    match events.last() {
        Some(MonitorEvent::OpportunitiesUpdate(opps)) => opps,
        other => panic!("expected opportunities_update last, got {other:?}"),
    }
}

#[tokio::test]
async fn test_late_subscriber_gets_live_opportunities() {
    let mut monitor = monitor(30);
    let publisher = monitor.publisher();
    monitor.run_cycle().await.unwrap();

    let (snapshot, _rx) = publisher.subscribe().await;
    let events = handshake_events(&snapshot, Utc::now());
    assert!(matches!(events[0], MonitorEvent::ConnectionStatus(ref s) if s.last_slot == 77));
    assert!(matches!(events[1], MonitorEvent::SystemStats(ref s) if s.total_opportunities == 2));
    assert_eq!(opportunities_update(&events).len(), 2);
}

#[tokio::test]
async fn test_late_subscriber_gets_empty_list_when_all_expired() {
    // Zero TTL: every opportunity is expired the instant it is created
    let mut monitor = monitor(0);
    let publisher = monitor.publisher();
    monitor.run_cycle().await.unwrap();

    let (snapshot, _rx) = publisher.subscribe().await;
    assert_eq!(snapshot.opportunities.len(), 2);
    let events = handshake_events(&snapshot, Utc::now());
    assert!(opportunities_update(&events).is_empty());
}

#[tokio::test]
async fn test_subscriber_receives_cycle_events_as_json() {
    let mut monitor = monitor(30);
    let publisher = monitor.publisher();
    let (_, mut rx) = publisher.subscribe().await;

    monitor.run_cycle().await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert!(json["data"].is_object());
        kinds.push(json["type"].as_str().unwrap().to_string());
    }
    assert_eq!(
        kinds,
        vec!["new_opportunity", "new_opportunity", "connection_status", "system_stats"]
    );
}

#[tokio::test]
async fn test_console_summary_after_twentieth_opportunity() {
    let mut monitor = monitor(30);
    let publisher = monitor.publisher();
    let (_, mut rx) = publisher.subscribe().await;
    let mut reporter = ConsoleReporter::new(20);

    let mut summaries = Vec::new();
    for _ in 0..10 {
        monitor.run_cycle().await.unwrap();
        while let Ok(event) = rx.try_recv() {
            for line in reporter.handle(&event) {
                if line.contains("Stats:") {
                    summaries.push(line.to_string());
                }
            }
        }
    }

    assert_eq!(reporter.printed(), 20);
    assert_eq!(summaries.len(), 1);
    assert!(summaries[0].contains("20 opportunities"));
}
