//! CLOB top-of-book price lookup

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::config::PolymarketConfig;
use crate::net::{self, ApiError};

use super::BestAskSource;

#[derive(Debug, Deserialize)]
struct PriceDoc {
    price: Option<String>,
}

/// Read-only CLOB client (price endpoint only; order placement is signed and
/// lives behind the execution engine seam)
pub struct ClobClient {
    client: Client,
    base_url: String,
}

impl ClobClient {
    pub fn new(cfg: &PolymarketConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: net::build_client(net::DEFAULT_TIMEOUT)?,
            base_url: cfg.clob_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Best ask for buying `token_id`, or `None` when the book is empty.
    pub async fn get_best_ask(&self, token_id: &str) -> Result<Option<Decimal>, ApiError> {
        let url = format!("{}/price", self.base_url);
        let query = [
            ("token_id", token_id.to_string()),
            ("side", "buy".to_string()),
        ];
        let doc: Option<PriceDoc> =
            net::get_json(&self.client, &url, &query, net::DEFAULT_RETRIES).await?;
        match doc.and_then(|d| d.price) {
            Some(price) => Decimal::from_str(&price)
                .map(Some)
                .map_err(|e| ApiError::Decode(format!("best ask: {e}"))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BestAskSource for ClobClient {
    async fn best_ask(&self, token_id: &str) -> Result<Option<Decimal>, ApiError> {
        self.get_best_ask(token_id).await
    }
}
