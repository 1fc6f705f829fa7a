//! Raydium price map, the real comparison venue.
//!
//! Raydium publishes a flat `{ mint: usd_price }` map. For a pair we divide
//! the two USD prices and rescale by token decimals so the result is in the
//! same raw units as a Jupiter quote.
//!
//! API: `GET https://api.raydium.io/v2/main/price`
//! Auth: None required.

use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use super::{ComparisonPriceProvider, HttpGate};
use crate::types::{decimal_pow10, Quote, SpreadNetError, TradingPair, VenuePrice};

const ENDPOINT: &str = "raydium";
const VENUE_NAME: &str = "Raydium";

pub struct VenuePriceProvider {
    gate: HttpGate,
    url: String,
}

impl VenuePriceProvider {
    pub fn new(gate: HttpGate, url: &str) -> Self {
        Self {
            gate,
            url: url.to_string(),
        }
    }

    /// Raw `output per input` price for `pair` from a USD price map.
    fn pair_price(prices: &HashMap<String, f64>, pair: &TradingPair) -> Result<Decimal, SpreadNetError> {
        let lookup = |mint: &str| -> Result<Decimal, SpreadNetError> {
            let usd = prices
                .get(mint)
                .ok_or_else(|| SpreadNetError::malformed(ENDPOINT, format!("no price for mint {mint}")))?;
            Decimal::from_f64(*usd)
                .filter(|p| p.is_sign_positive() && !p.is_zero())
                .ok_or_else(|| SpreadNetError::malformed(ENDPOINT, format!("unusable price {usd} for mint {mint}")))
        };

        let input_usd = lookup(&pair.input_mint)?;
        let output_usd = lookup(&pair.output_mint)?;

        let overflow = || SpreadNetError::Arithmetic(format!("{} venue price", pair.name));
        let ui_price = input_usd.checked_div(output_usd).ok_or_else(overflow)?;
        let scale_up = decimal_pow10(pair.output_decimals).ok_or_else(overflow)?;
        let scale_down = decimal_pow10(pair.input_decimals).ok_or_else(overflow)?;

        ui_price
            .checked_mul(scale_up)
            .and_then(|p| p.checked_div(scale_down))
            .ok_or_else(overflow)
    }
}

#[async_trait]
impl ComparisonPriceProvider for VenuePriceProvider {
    async fn comparison_prices(
        &self,
        pair: &TradingPair,
        _quote: &Quote,
    ) -> Result<Vec<VenuePrice>, SpreadNetError> {
        let prices: HashMap<String, f64> = self.gate.get_json(ENDPOINT, &self.url).await?;
        debug!(mints = prices.len(), "Fetched Raydium price map");

        let price = Self::pair_price(&prices, pair)?;
        Ok(vec![VenuePrice::new(VENUE_NAME, price)])
    }

    fn name(&self) -> &str {
        ENDPOINT
    }
}
