//! In-memory upstreams for integration testing.
//!
//! Deterministic `QuoteSource` and `ChainProbe` implementations whose
//! prices, health and failures are fully controllable from test code.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use spreadnet::sources::{ChainProbe, QuoteSource};
use spreadnet::types::{Quote, SpreadNetError, TradingPair};

pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const RAY_MINT: &str = "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

pub fn sol_usdc() -> TradingPair {
    TradingPair::new("SOL/USDC", SOL_MINT, USDC_MINT)
}

pub fn ray_usdc() -> TradingPair {
    TradingPair::new("RAY/USDC", RAY_MINT, USDC_MINT)
}

/// Quotes `amount * ratio` for every pair with a configured ratio and
/// times out for the rest.
pub struct MockQuoteSource {
    ratios: Mutex<HashMap<String, u64>>,
    calls: AtomicUsize,
}

impl MockQuoteSource {
    pub fn new() -> Self {
        Self {
            ratios: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Set (or replace) the raw output-per-input ratio quoted for `pair`.
    pub fn set_ratio(&self, pair: &str, ratio: u64) {
        self.ratios.lock().unwrap().insert(pair.to_string(), ratio);
    }

    /// Make `pair` unreachable from now on.
    pub fn fail(&self, pair: &str) {
        self.ratios.lock().unwrap().remove(pair);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSource for MockQuoteSource {
    async fn fetch_quote(&self, pair: &TradingPair, amount: u64) -> Result<Quote, SpreadNetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ratio = self.ratios.lock().unwrap().get(&pair.name).copied();
        match ratio {
            Some(r) => Ok(Quote::new(pair, amount, amount * r, Utc::now())),
            None => Err(SpreadNetError::Timeout {
                endpoint: "mock-quotes".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock-quotes"
    }
}

/// Chain probe with a settable health flag and slot.
pub struct MockChain {
    healthy: AtomicBool,
    slot: AtomicU64,
    slot_fails: AtomicBool,
}

impl MockChain {
    pub fn new(slot: u64) -> Self {
        Self {
            healthy: AtomicBool::new(true),
            slot: AtomicU64::new(slot),
            slot_fails: AtomicBool::new(false),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_slot(&self, slot: u64) {
        self.slot.store(slot, Ordering::SeqCst);
    }

    pub fn fail_slot(&self, fails: bool) {
        self.slot_fails.store(fails, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainProbe for MockChain {
    async fn health(&self) -> Result<bool, SpreadNetError> {
        Ok(self.healthy.load(Ordering::SeqCst))
    }

    async fn slot(&self) -> Result<u64, SpreadNetError> {
        if self.slot_fails.load(Ordering::SeqCst) {
            return Err(SpreadNetError::Network {
                endpoint: "mock-chain".to_string(),
                message: "connection reset".to_string(),
            });
        }
        Ok(self.slot.load(Ordering::SeqCst))
    }
}
