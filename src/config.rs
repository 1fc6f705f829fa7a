//! Configuration loading from TOML.
//!
//! Reads `config.toml` (or the path in `SPREADNET_CONFIG`) and deserializes
//! it into strongly-typed structs. Every field has a default, so a partial
//! file (or no file at all) yields a runnable configuration.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::types::{SpreadNetError, TradingPair};

/// Default config file path.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Environment variable overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "SPREADNET_CONFIG";

/// Longest accepted opportunity lifetime (one day).
pub const MAX_TTL_SECS: u64 = 86_400;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub pairs: PairsConfig,
    pub upstream: UpstreamConfig,
    pub synthesizer: SynthesizerConfig,
    pub history: HistoryConfig,
    pub dashboard: DashboardConfig,
    pub console: ConsoleConfig,
}

/// Loop timing and the notional amount quoted for every pair.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sleep between successful cycles (default 8s).
    pub poll_interval_secs: u64,
    /// Sleep after a cycle that failed unexpectedly (default 5s).
    pub error_backoff_secs: u64,
    /// Raw input amount requested per quote (default 1 SOL in lamports).
    pub notional_amount: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 8,
            error_backoff_secs: 5,
            notional_amount: 1_000_000_000,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

/// Ordered list of pairs. Iteration order is the order opportunities are
/// produced in.
#[derive(Debug, Deserialize, Clone)]
#[serde(transparent)]
pub struct PairsConfig(pub Vec<TradingPair>);

impl Default for PairsConfig {
    fn default() -> Self {
        Self(vec![
            TradingPair::new(
                "SOL/USDC",
                "So11111111111111111111111111111111111111112",
                "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            ),
            TradingPair {
                input_decimals: 6,
                ..TradingPair::new(
                    "RAY/USDC",
                    "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R",
                    "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                )
            },
        ])
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Jupiter quote API base URL (`/quote` is appended).
    pub quote_api_url: String,
    /// Solana JSON-RPC endpoint.
    pub rpc_url: String,
    /// Mint → USD price map used by the venue comparison provider.
    pub venue_price_url: String,
    /// Total timeout per request.
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Ceiling on concurrent upstream requests.
    pub max_connections: usize,
    pub slippage_bps: u32,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            quote_api_url: "https://quote-api.jup.ag/v6".to_string(),
            rpc_url: "https://api.devnet.solana.com".to_string(),
            venue_price_url: "https://api.raydium.io/v2/main/price".to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            max_connections: 10,
            slippage_bps: 50,
            user_agent: "SpreadNet/0.1.0".to_string(),
        }
    }
}

/// Which comparison-price provider feeds the synthesizer.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Reference price times fixed multipliers.
    Multiplier,
    /// Prices fetched from a second aggregator.
    Venue,
}

/// One simulated venue: `multiplier = 1 + offset_bps / 10_000`.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct VariationConfig {
    pub venue: String,
    pub offset_bps: i64,
}

impl VariationConfig {
    pub fn new(venue: &str, offset_bps: i64) -> Self {
        Self {
            venue: venue.to_string(),
            offset_bps,
        }
    }

    /// Exact decimal multiplier for this variation.
    pub fn multiplier(&self) -> Decimal {
        Decimal::ONE + Decimal::new(self.offset_bps, 4)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SynthesizerConfig {
    pub provider: ProviderKind,
    /// Label of the venue the live quote comes from.
    pub reference_venue: String,
    /// Minimum relative deviation, in basis points, that must be exceeded.
    pub min_profit_bps: u32,
    /// Round-trip trading fee, in basis points, deducted from the deviation
    /// before the threshold is applied (0 = gross deviation).
    pub fee_bps: u32,
    /// Opportunity lifetime, at most [`MAX_TTL_SECS`].
    pub ttl_secs: u64,
    pub variations: Vec<VariationConfig>,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Multiplier,
            reference_venue: "Jupiter".to_string(),
            min_profit_bps: 50,
            fee_bps: 0,
            ttl_secs: 30,
            variations: vec![
                VariationConfig::new("Raydium", -50),
                VariationConfig::new("Orca", 50),
                VariationConfig::new("Phoenix", -20),
                VariationConfig::new("Serum", 120),
                VariationConfig::new("Aldrin", -80),
            ],
        }
    }
}

impl SynthesizerConfig {
    /// Relative threshold as an exact decimal (50 bps → 0.005).
    pub fn threshold(&self) -> Decimal {
        Decimal::new(self.min_profit_bps as i64, 4)
    }

    /// Round-trip fee as an exact decimal (60 bps → 0.006).
    pub fn fee(&self) -> Decimal {
        Decimal::new(self.fee_bps as i64, 4)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    /// Most-recent opportunities kept for windowed stats.
    pub window_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { window_size: 50 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
    /// Capacity of the push channel; slower clients skip older events.
    pub event_buffer: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
            event_buffer: 256,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Print an inline stats summary after every Nth opportunity.
    pub summary_every: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            summary_every: 20,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            info!(path, "No config file found, using defaults");
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config path from the environment.
    pub fn path_from_env() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Reject values the monitor cannot run with.
    pub fn validate(&self) -> Result<(), SpreadNetError> {
        let fail = |msg: &str| -> Result<(), SpreadNetError> {
            Err(SpreadNetError::Config(msg.to_string()))
        };

        if self.monitor.poll_interval_secs == 0 {
            return fail("monitor.poll_interval_secs must be > 0");
        }
        if self.monitor.error_backoff_secs == 0 {
            return fail("monitor.error_backoff_secs must be > 0");
        }
        if self.monitor.notional_amount == 0 {
            return fail("monitor.notional_amount must be > 0");
        }
        if self.pairs.0.is_empty() {
            return fail("at least one [[pairs]] entry is required");
        }
        if self.upstream.max_connections == 0 {
            return fail("upstream.max_connections must be > 0");
        }
        if self.upstream.request_timeout_secs == 0 {
            return fail("upstream.request_timeout_secs must be > 0");
        }
        if self.history.window_size == 0 {
            return fail("history.window_size must be > 0");
        }
        if self.dashboard.event_buffer == 0 {
            return fail("dashboard.event_buffer must be > 0");
        }
        if self.synthesizer.reference_venue.trim().is_empty()
            || self.synthesizer.variations.iter().any(|v| v.venue.trim().is_empty())
        {
            return fail("venue labels must not be empty");
        }
        if self.synthesizer.ttl_secs > MAX_TTL_SECS {
            return fail("synthesizer.ttl_secs must be at most 86400");
        }
        if self.synthesizer.fee_bps >= 10_000 {
            return fail("synthesizer.fee_bps must be below 10000");
        }
        if self.synthesizer.variations.iter().any(|v| v.offset_bps <= -10_000) {
            return fail("variation offset_bps must be above -10000");
        }
        Ok(())
    }
}
