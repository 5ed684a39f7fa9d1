//! Binance REST client for 1-minute klines and spot prices

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;

use crate::config::ReferenceConfig;
use crate::net::{self, ApiError};

use super::{log_return_volatility, PriceWindow, ReferenceFeed};

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

/// Reference feed backed by the Binance public REST API
pub struct BinanceClient {
    client: Client,
    base_url: String,
    symbol_map: HashMap<String, String>,
}

impl BinanceClient {
    pub fn new(cfg: &ReferenceConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: net::build_client(net::DEFAULT_TIMEOUT)?,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            symbol_map: cfg.symbol_map.clone(),
        })
    }

    fn pair_symbol(&self, asset: &str) -> Option<&str> {
        self.symbol_map.get(asset).map(String::as_str)
    }

    /// Fetch 1m kline close prices (plus the first open) for `[start, end]`.
    async fn klines(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<(Decimal, Vec<Decimal>)>, ApiError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let query = [
            ("symbol", symbol.to_string()),
            ("interval", "1m".to_string()),
            ("startTime", start.timestamp_millis().to_string()),
            ("endTime", end.timestamp_millis().to_string()),
            ("limit", "1000".to_string()),
        ];
        // Each kline row is a mixed-type array; index 1 is the open and
        // index 4 the close, both as strings.
        let rows: Option<Vec<Vec<serde_json::Value>>> =
            net::get_json(&self.client, &url, &query, net::DEFAULT_RETRIES).await?;
        let rows = match rows {
            Some(rows) if !rows.is_empty() => rows,
            _ => return Ok(None),
        };

        let open = decimal_field(&rows[0], 1)?;
        let mut closes = Vec::with_capacity(rows.len());
        for row in &rows {
            closes.push(decimal_field(row, 4)?);
        }
        Ok(Some((open, closes)))
    }
}

fn decimal_field(row: &[serde_json::Value], idx: usize) -> Result<Decimal, ApiError> {
    let value = row
        .get(idx)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ApiError::Decode(format!("kline field {idx} missing or not a string")))?;
    Decimal::from_str(value).map_err(|e| ApiError::Decode(format!("kline field {idx}: {e}")))
}

#[async_trait]
impl ReferenceFeed for BinanceClient {
    async fn realized_window(
        &self,
        asset: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<PriceWindow>, ApiError> {
        let symbol = match self.pair_symbol(asset) {
            Some(s) => s.to_string(),
            None => return Ok(None),
        };
        let (open, closes) = match self.klines(&symbol, start, end).await? {
            Some(v) => v,
            None => return Ok(None),
        };
        let close = match closes.last() {
            Some(c) => *c,
            None => return Ok(None),
        };
        if open <= Decimal::ZERO {
            return Ok(None);
        }
        let change_pct = (close - open) / open;
        let volatility = log_return_volatility(&closes);
        Ok(Some(PriceWindow {
            open,
            close,
            change_pct,
            volatility,
            closes,
        }))
    }

    async fn spot_price(&self, symbol: &str) -> Result<Option<Decimal>, ApiError> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);
        let query = [("symbol", symbol.to_string())];
        let ticker: Option<TickerPrice> =
            net::get_json(&self.client, &url, &query, net::DEFAULT_RETRIES).await?;
        match ticker {
            Some(t) => Decimal::from_str(&t.price)
                .map(Some)
                .map_err(|e| ApiError::Decode(format!("ticker price: {e}"))),
            None => Ok(None),
        }
    }

    fn has_symbol(&self, asset: &str) -> bool {
        self.symbol_map.contains_key(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_decimal_field_parses_strings() {
        let row = vec![json!(1700000000000u64), json!("42850.12"), json!("0")];
        assert_eq!(decimal_field(&row, 1).unwrap(), dec!(42850.12));
    }

    #[test]
    fn test_decimal_field_rejects_numbers() {
        let row = vec![json!(42850.12)];
        assert!(decimal_field(&row, 0).is_err());
    }

    #[test]
    fn test_symbol_map_lookup() {
        let client = BinanceClient::new(&ReferenceConfig::default()).unwrap();
        assert!(client.has_symbol("BTC"));
        assert!(client.has_symbol("SOL"));
        assert!(!client.has_symbol("DOGE"));
        assert_eq!(client.pair_symbol("ETH"), Some("ETHUSDT"));
    }
}
