//! Shared types for SpreadNet.
//!
//! These types form the data model used across all modules: quotes coming
//! in from upstream, opportunities derived from them, and the status and
//! statistics records handed to the dashboard and console.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Trading pair
// ---------------------------------------------------------------------------

/// A token pair to monitor, identified by its SPL mint addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingPair {
    /// Display name, e.g. "SOL/USDC".
    pub name: String,
    pub input_mint: String,
    pub output_mint: String,
    /// Decimals of the input token (9 for SOL).
    #[serde(default = "default_input_decimals")]
    pub input_decimals: u32,
    /// Decimals of the output token (6 for USDC).
    #[serde(default = "default_output_decimals")]
    pub output_decimals: u32,
}

fn default_input_decimals() -> u32 {
    9
}

fn default_output_decimals() -> u32 {
    6
}

impl TradingPair {
    pub fn new(name: &str, input_mint: &str, output_mint: &str) -> Self {
        Self {
            name: name.to_string(),
            input_mint: input_mint.to_string(),
            output_mint: output_mint.to_string(),
            input_decimals: default_input_decimals(),
            output_decimals: default_output_decimals(),
        }
    }

    /// Helper to build the SOL/USDC pair used throughout the tests.
    #[cfg(test)]
    pub fn sample() -> Self {
        TradingPair::new(
            "SOL/USDC",
            "So11111111111111111111111111111111111111112",
            "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
        )
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ---------------------------------------------------------------------------
// Quote
// ---------------------------------------------------------------------------

/// A single price observation for a pair from the reference aggregator.
///
/// Amounts are raw integer token units. The derived price is the raw
/// `out_amount / in_amount` ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub pair: String,
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: u64,
    pub out_amount: u64,
    pub input_decimals: u32,
    pub output_decimals: u32,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Build a quote for `pair` from raw amounts.
    pub fn new(pair: &TradingPair, in_amount: u64, out_amount: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            pair: pair.name.clone(),
            input_mint: pair.input_mint.clone(),
            output_mint: pair.output_mint.clone(),
            in_amount,
            out_amount,
            input_decimals: pair.input_decimals,
            output_decimals: pair.output_decimals,
            timestamp,
        }
    }

    /// Raw price ratio (output units per input unit). `None` for a zero input.
    pub fn price(&self) -> Option<Decimal> {
        if self.in_amount == 0 {
            return None;
        }
        Decimal::from(self.out_amount).checked_div(Decimal::from(self.in_amount))
    }

    /// Human price, adjusted for token decimals (e.g. USDC per SOL).
    pub fn ui_price(&self) -> Option<Decimal> {
        let raw = self.price()?;
        let scale = decimal_pow10(self.input_decimals)?
            .checked_div(decimal_pow10(self.output_decimals)?)?;
        raw.checked_mul(scale)
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] in={} out={} price={}",
            self.pair,
            self.in_amount,
            self.out_amount,
            self.price().map(|p| p.round_dp(6).to_string()).unwrap_or_else(|| "n/a".into()),
        )
    }
}

/// `10^exp` as a decimal, `None` past the representable range.
pub fn decimal_pow10(exp: u32) -> Option<Decimal> {
    (0..exp).try_fold(Decimal::ONE, |acc, _| acc.checked_mul(Decimal::TEN))
}

// ---------------------------------------------------------------------------
// Venue price
// ---------------------------------------------------------------------------

/// A comparison price for a pair from one (real or synthetic) venue,
/// expressed in the same raw units as [`Quote::price`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenuePrice {
    pub venue: String,
    pub price: Decimal,
}

impl VenuePrice {
    pub fn new(venue: &str, price: Decimal) -> Self {
        Self {
            venue: venue.to_string(),
            price,
        }
    }
}

// ---------------------------------------------------------------------------
// Opportunity
// ---------------------------------------------------------------------------

/// A synthesized price discrepancy between the reference venue and one
/// comparison venue. Read-only once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub pair: String,
    pub input_mint: String,
    pub output_mint: String,
    /// Notional input amount (raw units) the profit is scaled by.
    pub amount: u64,
    pub buy_venue: String,
    pub sell_venue: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    /// Relative deviation in whole basis points (truncated).
    pub profit_bps: u32,
    /// Relative deviation in percent.
    pub profit_percentage: Decimal,
    /// Signed deviation of the comparison venue from the reference, in
    /// percent. Positive when the comparison venue quotes higher.
    pub spread_percentage: Decimal,
    /// `profit_percentage` net of the configured round-trip fee.
    pub estimated_profit_percentage: Decimal,
    /// `(sell - buy) * amount` in raw output units (truncated).
    pub profit_amount: u64,
    pub timestamp: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl Opportunity {
    /// An opportunity is valid while `now - timestamp < ttl`.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now - self.timestamp < self.ttl()
    }

    /// Time to live, saturating at [`Duration::MAX`] for values chrono
    /// cannot represent.
    pub fn ttl(&self) -> Duration {
        i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.timestamp
            .checked_add_signed(self.ttl())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Helper to build a test opportunity with sensible defaults.
    #[cfg(test)]
    pub fn sample(pair: &str, profit_percentage: Decimal, timestamp: DateTime<Utc>) -> Self {
        use rust_decimal::prelude::ToPrimitive;
        Opportunity {
            id: format!("{pair}_Raydium_Jupiter_{}_0", timestamp.timestamp()),
            pair: pair.to_string(),
            input_mint: "So11111111111111111111111111111111111111112".to_string(),
            output_mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            amount: 1_000_000_000,
            buy_venue: "Raydium".to_string(),
            sell_venue: "Jupiter".to_string(),
            buy_price: Decimal::ONE_HUNDRED,
            sell_price: Decimal::ONE_HUNDRED,
            profit_bps: (profit_percentage * Decimal::ONE_HUNDRED).trunc().to_u32().unwrap_or(0),
            profit_percentage,
            spread_percentage: -profit_percentage,
            estimated_profit_percentage: profit_percentage,
            profit_amount: 0,
            timestamp,
            ttl_seconds: 30,
        }
    }
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] buy {}@{} sell {}@{} | {}% ({}bps)",
            self.pair,
            self.buy_venue,
            self.buy_price.round_dp(6),
            self.sell_venue,
            self.sell_price.round_dp(6),
            self.profit_percentage.round_dp(4),
            self.profit_bps,
        )
    }
}

// ---------------------------------------------------------------------------
// Connection status
// ---------------------------------------------------------------------------

/// Liveness of each upstream dependency. Replaced wholesale every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Solana JSON-RPC `getHealth` returned "ok".
    pub rpc_health: bool,
    /// At least one pair quote succeeded this cycle.
    pub quote_api: bool,
    /// The push channel is open for subscribers.
    pub websocket: bool,
    /// Push clients connected when the cycle finished.
    pub subscribers: usize,
    /// Last slot seen from the RPC node.
    pub last_slot: u64,
    pub last_update: Option<DateTime<Utc>>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            rpc_health: false,
            quote_api: false,
            websocket: false,
            subscribers: 0,
            last_slot: 0,
            last_update: None,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |ok: bool| if ok { "up" } else { "down" };
        write!(
            f,
            "rpc={} quotes={} ws={} (clients={}) slot={}",
            flag(self.rpc_health),
            flag(self.quote_api),
            flag(self.websocket),
            self.subscribers,
            self.last_slot,
        )
    }
}

// ---------------------------------------------------------------------------
// System stats
// ---------------------------------------------------------------------------

/// Aggregate statistics derived from the rolling history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    /// Every opportunity ever recorded, including those evicted from history.
    pub total_opportunities: u64,
    /// Average profit (%) over the current history window.
    pub avg_profit_percentage: f64,
    /// Average profit (%) over every opportunity ever recorded.
    pub all_time_avg_profit_percentage: f64,
    /// `total_opportunities / (uptime_seconds / 60)`.
    pub opportunities_per_minute: f64,
    pub uptime_seconds: f64,
    pub last_opportunity_time: Option<DateTime<Utc>>,
    /// Pair of the best opportunity seen so far.
    pub top_pair: String,
    /// High-water mark of profit (%), never decreases.
    pub best_profit: f64,
    /// Opportunities currently held in the history window.
    pub window_len: usize,
}

impl Default for SystemStats {
    fn default() -> Self {
        Self {
            total_opportunities: 0,
            avg_profit_percentage: 0.0,
            all_time_avg_profit_percentage: 0.0,
            opportunities_per_minute: 0.0,
            uptime_seconds: 0.0,
            last_opportunity_time: None,
            top_pair: String::new(),
            best_profit: 0.0,
            window_len: 0,
        }
    }
}

impl fmt::Display for SystemStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} opportunities | avg {:.2}% (all-time {:.2}%) | best {:.2}% | {:.2}/min",
            self.total_opportunities,
            self.avg_profit_percentage,
            self.all_time_avg_profit_percentage,
            self.best_profit,
            self.opportunities_per_minute,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for SpreadNet.
///
/// `Network`, `Timeout`, `Status` and `Malformed` are transient upstream
/// failures: the monitor logs them and treats the pair as "no quote this
/// cycle".
#[derive(Debug, thiserror::Error)]
pub enum SpreadNetError {
    #[error("Request to {endpoint} failed: {message}")]
    Network { endpoint: String, message: String },

    #[error("Request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Malformed payload from {endpoint}: {message}")]
    Malformed { endpoint: String, message: String },

    #[error("Arithmetic overflow while computing {0}")]
    Arithmetic(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SpreadNetError {
    /// Whether this error is a soft upstream failure (retry next cycle).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SpreadNetError::Network { .. }
                | SpreadNetError::Timeout { .. }
                | SpreadNetError::Status { .. }
                | SpreadNetError::Malformed { .. }
        )
    }

    pub fn malformed(endpoint: &str, message: impl Into<String>) -> Self {
        SpreadNetError::Malformed {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
