//! Opportunity synthesizer.
//!
//! Compares the reference quote for a pair against a list of venue prices
//! and emits an [`Opportunity`] for every venue whose price deviates from the
//! reference, net of the round-trip fee, by strictly more than the configured
//! threshold. All arithmetic is exact decimal, so a deviation sitting exactly
//! on the threshold never emits.
//!
//! Also home to [`MultiplierProvider`], the synthetic comparison source that
//! derives venue prices by multiplying the reference by fixed factors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::SynthesizerConfig;
use crate::sources::ComparisonPriceProvider;
use crate::types::{Opportunity, Quote, SpreadNetError, TradingPair, VenuePrice};

const BPS_PER_UNIT: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

// ---------------------------------------------------------------------------
// Synthetic comparison prices
// ---------------------------------------------------------------------------

/// Simulated venues: `price = reference * multiplier`, in list order.
pub struct MultiplierProvider {
    variations: Vec<(String, Decimal)>,
}

impl MultiplierProvider {
    pub fn new(variations: Vec<(String, Decimal)>) -> Self {
        Self { variations }
    }

    pub fn from_config(cfg: &SynthesizerConfig) -> Self {
        Self::new(
            cfg.variations
                .iter()
                .map(|v| (v.venue.clone(), v.multiplier()))
                .collect(),
        )
    }

    /// Venue prices for a given reference price.
    pub fn prices_for(&self, reference: Decimal) -> Result<Vec<VenuePrice>, SpreadNetError> {
        self.variations
            .iter()
            .map(|(venue, multiplier)| {
                reference
                    .checked_mul(*multiplier)
                    .map(|price| VenuePrice::new(venue, price))
                    .ok_or_else(|| SpreadNetError::Arithmetic(format!("{venue} synthetic price")))
            })
            .collect()
    }
}

#[async_trait]
impl ComparisonPriceProvider for MultiplierProvider {
    async fn comparison_prices(
        &self,
        _pair: &TradingPair,
        quote: &Quote,
    ) -> Result<Vec<VenuePrice>, SpreadNetError> {
        let reference = quote
            .price()
            .ok_or_else(|| SpreadNetError::malformed(&quote.pair, "quote has zero input amount"))?;
        self.prices_for(reference)
    }

    fn name(&self) -> &str {
        "multiplier"
    }
}

// ---------------------------------------------------------------------------
// Synthesizer
// ---------------------------------------------------------------------------

pub struct Synthesizer {
    reference_venue: String,
    threshold: Decimal,
    /// Round-trip fee as a fraction, deducted before the threshold check.
    fee: Decimal,
    ttl_secs: u64,
    /// Disambiguates identifiers created within the same second.
    sequence: AtomicU64,
}

impl Synthesizer {
    pub fn new(reference_venue: &str, threshold: Decimal, ttl_secs: u64) -> Self {
        Self {
            reference_venue: reference_venue.to_string(),
            threshold,
            fee: Decimal::ZERO,
            ttl_secs,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self
    }

    pub fn from_config(cfg: &SynthesizerConfig) -> Self {
        Self::new(&cfg.reference_venue, cfg.threshold(), cfg.ttl_secs).with_fee(cfg.fee())
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    /// `|candidate - reference| / reference`, `None` for a zero reference.
    pub fn relative_deviation(reference: Decimal, candidate: Decimal) -> Option<Decimal> {
        if reference.is_zero() {
            return None;
        }
        (candidate - reference).abs().checked_div(reference)
    }

    /// Emit opportunities for `quote` against `comparisons`, preserving the
    /// comparison order.
    pub fn synthesize(
        &self,
        quote: &Quote,
        comparisons: &[VenuePrice],
        now: DateTime<Utc>,
    ) -> Result<Vec<Opportunity>, SpreadNetError> {
        let reference = match quote.price() {
            Some(p) if !p.is_zero() => p,
            _ => return Ok(Vec::new()),
        };

        let mut opportunities = Vec::new();
        for candidate in comparisons {
            let Some(deviation) = Self::relative_deviation(reference, candidate.price) else {
                continue;
            };
            let net = deviation - self.fee;
            if net <= self.threshold {
                continue;
            }
            let spread = (candidate.price - reference)
                .checked_div(reference)
                .ok_or_else(|| SpreadNetError::Arithmetic(format!("{} spread", quote.pair)))?;

            let (buy_venue, buy_price, sell_venue, sell_price) = if candidate.price > reference {
                (self.reference_venue.as_str(), reference, candidate.venue.as_str(), candidate.price)
            } else {
                (candidate.venue.as_str(), candidate.price, self.reference_venue.as_str(), reference)
            };

            let profit_amount = (sell_price - buy_price)
                .checked_mul(Decimal::from(quote.in_amount))
                .and_then(|amount| amount.trunc().to_u64())
                .ok_or_else(|| SpreadNetError::Arithmetic(format!("{} profit amount", quote.pair)))?;
            let profit_bps = (deviation * BPS_PER_UNIT).trunc().to_u32().unwrap_or(u32::MAX);

            let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
            opportunities.push(Opportunity {
                id: format!(
                    "{}_{}_{}_{}_{}",
                    quote.pair,
                    buy_venue,
                    sell_venue,
                    now.timestamp(),
                    seq
                ),
                pair: quote.pair.clone(),
                input_mint: quote.input_mint.clone(),
                output_mint: quote.output_mint.clone(),
                amount: quote.in_amount,
                buy_venue: buy_venue.to_string(),
                sell_venue: sell_venue.to_string(),
                buy_price,
                sell_price,
                profit_bps,
                profit_percentage: deviation * Decimal::ONE_HUNDRED,
                spread_percentage: spread * Decimal::ONE_HUNDRED,
                estimated_profit_percentage: net * Decimal::ONE_HUNDRED,
                profit_amount,
                timestamp: now,
                ttl_seconds: self.ttl_secs,
            });
        }

        Ok(opportunities)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
