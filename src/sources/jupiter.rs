//! Jupiter aggregator quote client.
//!
//! The reference price for every pair comes from Jupiter's swap quote
//! endpoint: we ask how many output units `amount` input units buy.
//!
//! API: `GET {base}/quote?inputMint=..&outputMint=..&amount=..&slippageBps=..`
//! Auth: None required.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{HttpGate, QuoteSource};
use crate::types::{Quote, SpreadNetError, TradingPair};

const SOURCE_NAME: &str = "jupiter";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// Subset of the Jupiter v6 quote response. Amounts arrive as strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JupiterQuoteResponse {
    in_amount: String,
    out_amount: String,
    #[serde(default)]
    input_mint: Option<String>,
    #[serde(default)]
    output_mint: Option<String>,
    #[serde(default)]
    price_impact_pct: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct JupiterClient {
    gate: HttpGate,
    base_url: String,
    slippage_bps: u32,
}

impl JupiterClient {
    pub fn new(gate: HttpGate, base_url: &str, slippage_bps: u32) -> Self {
        Self {
            gate,
            base_url: base_url.trim_end_matches('/').to_string(),
            slippage_bps,
        }
    }

    fn quote_url(&self, pair: &TradingPair, amount: u64) -> String {
        format!(
            "{}/quote?inputMint={}&outputMint={}&amount={}&slippageBps={}",
            self.base_url,
            urlencoding::encode(&pair.input_mint),
            urlencoding::encode(&pair.output_mint),
            amount,
            self.slippage_bps,
        )
    }

    /// Validate the payload and turn it into a [`Quote`].
    fn to_quote(
        pair: &TradingPair,
        resp: JupiterQuoteResponse,
        now: DateTime<Utc>,
    ) -> Result<Quote, SpreadNetError> {
        let parse = |field: &str, raw: &str| {
            raw.parse::<u64>().map_err(|e| {
                SpreadNetError::malformed(SOURCE_NAME, format!("{field} {raw:?} is not an integer: {e}"))
            })
        };

        let in_amount = parse("inAmount", &resp.in_amount)?;
        let out_amount = parse("outAmount", &resp.out_amount)?;

        if in_amount == 0 {
            return Err(SpreadNetError::malformed(SOURCE_NAME, "inAmount is zero"));
        }

        if let Some(mint) = resp.input_mint.as_deref() {
            if mint != pair.input_mint {
                return Err(SpreadNetError::malformed(
                    SOURCE_NAME,
                    format!("quote is for input mint {mint}, expected {}", pair.input_mint),
                ));
            }
        }
        if let Some(mint) = resp.output_mint.as_deref() {
            if mint != pair.output_mint {
                return Err(SpreadNetError::malformed(
                    SOURCE_NAME,
                    format!("quote is for output mint {mint}, expected {}", pair.output_mint),
                ));
            }
        }

        Ok(Quote::new(pair, in_amount, out_amount, now))
    }
}

#[async_trait]
impl QuoteSource for JupiterClient {
    async fn fetch_quote(&self, pair: &TradingPair, amount: u64) -> Result<Quote, SpreadNetError> {
        let url = self.quote_url(pair, amount);
        debug!(pair = %pair.name, url = %url, "Fetching Jupiter quote");

        let resp: JupiterQuoteResponse = self.gate.get_json(SOURCE_NAME, &url).await?;
        if let Some(impact) = resp.price_impact_pct.as_deref() {
            debug!(pair = %pair.name, price_impact_pct = impact, "Quote price impact");
        }

        Self::to_quote(pair, resp, Utc::now())
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
