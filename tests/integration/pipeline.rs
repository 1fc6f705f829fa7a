//! Full poll → synthesize → aggregate → publish cycles.

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use spreadnet::config::{SynthesizerConfig, UpstreamConfig};
use spreadnet::engine::monitor::{LoopState, Monitor, MonitorSettings};
use spreadnet::engine::publisher::Publisher;
use spreadnet::engine::synthesizer::{MultiplierProvider, Synthesizer};
use spreadnet::sources::jupiter::JupiterClient;
use spreadnet::sources::raydium::VenuePriceProvider;
use spreadnet::sources::solana_rpc::SolanaRpcClient;
use spreadnet::sources::HttpGate;

use crate::mock_upstream::{ray_usdc, sol_usdc, MockChain, MockQuoteSource, SOL_MINT, USDC_MINT};

fn settings(window_size: usize) -> MonitorSettings {
    MonitorSettings {
        pairs: vec![sol_usdc(), ray_usdc()],
        notional_amount: 1_000_000_000,
        poll_interval: Duration::from_millis(10),
        error_backoff: Duration::from_millis(10),
        window_size,
        push_enabled: true,
    }
}

fn multipliers() -> Arc<MultiplierProvider> {
    Arc::new(MultiplierProvider::from_config(&SynthesizerConfig::default()))
}

fn monitor(
    quotes: Arc<MockQuoteSource>,
    chain: Arc<MockChain>,
    threshold_bps: i64,
    window_size: usize,
) -> Monitor {
    Monitor::new(
        settings(window_size),
        quotes,
        chain,
        multipliers(),
        Synthesizer::new("Jupiter", rust_decimal::Decimal::new(threshold_bps, 4), 30),
        Arc::new(Publisher::new(256)),
    )
}

#[tokio::test]
async fn test_reference_150_at_half_percent_threshold() {
    let quotes = Arc::new(MockQuoteSource::new());
    quotes.set_ratio("SOL/USDC", 150);
    let mut monitor = monitor(quotes.clone(), Arc::new(MockChain::new(1)), 50, 50);

    let report = monitor.run_cycle().await.unwrap();
    assert_eq!(quotes.calls(), 2);

    // 1.005 and 0.995 deviate by exactly 0.5% and are not strictly above it
    let opps = &report.opportunities;
    assert_eq!(opps.len(), 2);
    assert_eq!((opps[0].buy_venue.as_str(), opps[0].sell_venue.as_str()), ("Jupiter", "Serum"));
    assert_eq!(opps[0].buy_price, dec!(150));
    assert_eq!(opps[0].sell_price, dec!(151.8));
    assert_eq!((opps[1].buy_venue.as_str(), opps[1].sell_venue.as_str()), ("Aldrin", "Jupiter"));
    assert_eq!(opps[1].buy_price, dec!(148.8));
    assert_eq!(opps[1].profit_amount, 1_200_000_000);
}

#[tokio::test]
async fn test_reference_150_below_half_percent_threshold() {
    let quotes = Arc::new(MockQuoteSource::new());
    quotes.set_ratio("SOL/USDC", 150);
    let mut monitor = monitor(quotes, Arc::new(MockChain::new(1)), 49, 50);

    let report = monitor.run_cycle().await.unwrap();
    let sells: Vec<&str> = report.opportunities.iter().map(|o| o.sell_venue.as_str()).collect();
    assert_eq!(sells, vec!["Jupiter", "Orca", "Serum", "Jupiter"]);
    let buys: Vec<&str> = report.opportunities.iter().map(|o| o.buy_venue.as_str()).collect();
    assert_eq!(buys, vec!["Raydium", "Jupiter", "Jupiter", "Aldrin"]);
}

#[tokio::test]
async fn test_pair_order_then_multiplier_order() {
    let quotes = Arc::new(MockQuoteSource::new());
    quotes.set_ratio("SOL/USDC", 150);
    quotes.set_ratio("RAY/USDC", 2);
    let mut monitor = monitor(quotes, Arc::new(MockChain::new(1)), 50, 50);

    let report = monitor.run_cycle().await.unwrap();
    let pairs: Vec<&str> = report.opportunities.iter().map(|o| o.pair.as_str()).collect();
    assert_eq!(pairs, vec!["SOL/USDC", "SOL/USDC", "RAY/USDC", "RAY/USDC"]);
    assert_eq!(report.pairs_quoted, 2);
}

#[tokio::test]
async fn test_window_and_stats_over_many_cycles() {
    let quotes = Arc::new(MockQuoteSource::new());
    quotes.set_ratio("SOL/USDC", 150);
    let mut monitor = monitor(quotes.clone(), Arc::new(MockChain::new(1)), 50, 5);
    let publisher = monitor.publisher();

    let mut best = 0.0;
    for cycle in 1..=6u64 {
        monitor.run_cycle().await.unwrap();
        let snap = publisher.snapshot().await;
        assert!(snap.opportunities.len() <= 5);
        assert_eq!(snap.stats.total_opportunities, cycle * 2);
        assert!(snap.stats.best_profit >= best);
        best = snap.stats.best_profit;
    }

    // A quiet cycle leaves counters where they were
    quotes.fail("SOL/USDC");
    let report = monitor.run_cycle().await.unwrap();
    assert!(report.opportunities.is_empty());
    assert!(!report.status.quote_api);
    assert_eq!(report.stats.total_opportunities, 12);
    assert_eq!(report.stats.window_len, 5);
    assert!((report.stats.best_profit - 1.2).abs() < 1e-12);
}

#[tokio::test]
async fn test_chain_status_tracking() {
    let quotes = Arc::new(MockQuoteSource::new());
    let chain = Arc::new(MockChain::new(500));
    let mut monitor = monitor(quotes, chain.clone(), 50, 50);

    let first = monitor.run_cycle().await.unwrap();
    assert!(first.status.rpc_health);
    assert_eq!(first.status.last_slot, 500);

    chain.set_healthy(false);
    chain.fail_slot(true);
    chain.set_slot(900);
    let second = monitor.run_cycle().await.unwrap();
    assert!(!second.status.rpc_health);
    assert_eq!(second.status.last_slot, 500);

    chain.fail_slot(false);
    let third = monitor.run_cycle().await.unwrap();
    assert_eq!(third.status.last_slot, 900);
}

#[tokio::test]
async fn test_pull_reads_never_mix_cycles() {
    let quotes = Arc::new(MockQuoteSource::new());
    quotes.set_ratio("SOL/USDC", 150);
    let chain = Arc::new(MockChain::new(1));
    let monitor = monitor(quotes, chain, 50, 1_000);
    let publisher = monitor.publisher();
    let handle = monitor.spawn();

    let reader = {
        let publisher = publisher.clone();
        tokio::spawn(async move {
            let mut last_cycle = 0;
            while last_cycle < 5 {
                let snap = publisher.snapshot().await;
                // Every cycle adds exactly two opportunities
                assert_eq!(snap.stats.total_opportunities, snap.cycle * 2);
                assert_eq!(snap.opportunities.len() as u64, snap.cycle * 2);
                assert_eq!(snap.status.last_update.is_some(), snap.cycle > 0);
                assert!(snap.cycle >= last_cycle);
                last_cycle = snap.cycle;
                tokio::task::yield_now().await;
            }
        })
    };

    tokio::time::timeout(Duration::from_secs(10), reader)
        .await
        .expect("reader timed out")
        .unwrap();
    assert_eq!(handle.state(), LoopState::Running);
    handle.stop().await.unwrap();
}

// ---------------------------------------------------------------------------
// Real clients against a mock HTTP server
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cycle_over_http_clients() {
    let mut server = mockito::Server::new_async().await;
    let _quote = server
        .mock("GET", "/quote")
        .match_query(mockito::Matcher::UrlEncoded("inputMint".into(), SOL_MINT.into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(
            r#"{{"inputMint":"{SOL_MINT}","outputMint":"{USDC_MINT}","inAmount":"1000000000","outAmount":"150000000","priceImpactPct":"0"}}"#
        ))
        .create_async()
        .await;
    let _prices = server
        .mock("GET", "/v2/main/price")
        .with_status(200)
        .with_body(format!(r#"{{"{SOL_MINT}": 153.0, "{USDC_MINT}": 1.0}}"#))
        .create_async()
        .await;
    let _rpc = server
        .mock("POST", "/rpc")
        .with_status(200)
        .with_body(r#"{"jsonrpc":"2.0","result":"ok","id":1}"#)
        .create_async()
        .await;

    let gate = HttpGate::new(&UpstreamConfig::default()).unwrap();
    let base = server.url();
    let mut monitor = Monitor::new(
        MonitorSettings {
            pairs: vec![sol_usdc()],
            ..settings(50)
        },
        Arc::new(JupiterClient::new(gate.clone(), &base, 50)),
        Arc::new(SolanaRpcClient::new(gate.clone(), &format!("{base}/rpc"))),
        Arc::new(VenuePriceProvider::new(gate.clone(), &format!("{base}/v2/main/price"))),
        Synthesizer::new("Jupiter", dec!(0.005), 30),
        Arc::new(Publisher::new(16)),
    );

    let report = monitor.run_cycle().await.unwrap();
    assert!(report.status.quote_api);
    assert!(report.status.rpc_health);
    // getSlot receives "ok" instead of a number, so the slot stays unknown
    assert_eq!(report.status.last_slot, 0);

    // Jupiter says 150, Raydium says 153: a 2% spread
    assert_eq!(report.opportunities.len(), 1);
    let opp = &report.opportunities[0];
    assert_eq!(opp.buy_venue, "Jupiter");
    assert_eq!(opp.sell_venue, "Raydium");
    assert_eq!(opp.profit_bps, 200);
    assert_eq!(gate.in_flight(), 0);
}
