//! Live BTC spot-price lookup.
//!
//! The lookup is an explicit, caller-triggered I/O step kept outside the
//! valuation engine: scenario views ask for a quote, then feed the price
//! into a settings override like any other number. Failures never propagate
//! — the quote falls back to a fixed price and flags its provenance so the
//! caller can show a staleness indicator.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use crate::valuation::DEFAULT_BTC_PRICE;

const COINGECKO_SIMPLE_PRICE_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin&vs_currencies=usd";

/// Where a quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// Fetched from the upstream API just now.
    Live,
    /// The fixed default, used when the fetch failed.
    Fallback,
}

/// A BTC price with its provenance.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BtcPriceQuote {
    pub price: f64,
    pub source: PriceSource,
}

#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    bitcoin: CurrencyQuote,
}

#[derive(Debug, Deserialize)]
struct CurrencyQuote {
    usd: f64,
}

/// HTTP client for the spot-price endpoint.
pub struct BtcPriceClient {
    client: reqwest::Client,
    url: String,
}

impl BtcPriceClient {
    /// Build a client against the given endpoint (or the CoinGecko default).
    pub fn new(url: Option<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: url.unwrap_or_else(|| COINGECKO_SIMPLE_PRICE_URL.to_string()),
        }
    }

    /// Fetch the current spot price. Never errors: any failure produces the
    /// fallback quote with `source: Fallback`.
    pub async fn fetch(&self) -> BtcPriceQuote {
        match self.try_fetch().await {
            Ok(price) => {
                debug!(price, "Fetched live BTC spot price");
                BtcPriceQuote {
                    price,
                    source: PriceSource::Live,
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    fallback = DEFAULT_BTC_PRICE,
                    "BTC spot price fetch failed, using fallback"
                );
                BtcPriceQuote {
                    price: DEFAULT_BTC_PRICE,
                    source: PriceSource::Fallback,
                }
            }
        }
    }

    async fn try_fetch(&self) -> Result<f64> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("spot price request failed")?
            .error_for_status()
            .context("spot price endpoint returned an error status")?;

        let parsed: SimplePriceResponse = response
            .json()
            .await
            .context("spot price response did not decode")?;

        Ok(parsed.bitcoin.usd)
    }
}
