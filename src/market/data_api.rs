//! Data API client: positions, account value, and account activity
//!
//! Payload field names vary across API revisions, so each concept is declared
//! once with the alternate spellings as serde aliases, and accessors resolve
//! an explicit ordered candidate list.

use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::config::PolymarketConfig;
use crate::net::{self, ApiError};

/// One position row from `/positions`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPosition {
    /// Primary token id field on current payloads
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(
        default,
        alias = "tokenId",
        alias = "clobTokenId",
        alias = "clob_token_id"
    )]
    pub token_id: Option<String>,
    #[serde(default, alias = "positionSize", alias = "position_size")]
    pub size: Option<Decimal>,
    #[serde(
        default,
        alias = "currentValue",
        alias = "usdValue",
        alias = "usd_value",
        alias = "positionValue",
        alias = "position_value"
    )]
    pub current_value: Option<Decimal>,
    #[serde(
        default,
        alias = "avgPrice",
        alias = "averagePrice",
        alias = "average_price",
        alias = "costBasis",
        alias = "cost_basis"
    )]
    pub avg_price: Option<Decimal>,
}

impl RawPosition {
    /// Token id, preferring the `asset` field over the explicit id fields.
    pub fn token(&self) -> Option<&str> {
        self.asset
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.token_id.as_deref().filter(|s| !s.is_empty()))
    }

    pub fn size(&self) -> Decimal {
        self.size.unwrap_or(Decimal::ZERO)
    }

    /// USD value: the reported value when present, otherwise size times
    /// average price when the latter is known.
    pub fn value_usd(&self) -> Option<Decimal> {
        self.current_value
            .or_else(|| self.avg_price.map(|avg| self.size().abs() * avg))
            .map(|v| v.max(Decimal::ZERO))
    }
}

/// Account value document from `/value`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountValue {
    #[serde(
        default,
        alias = "cashUsd",
        alias = "cash_usd",
        alias = "cashBalance",
        alias = "cashBalanceUsd",
        alias = "usdc",
        alias = "usdcBalance",
        alias = "usdc_balance",
        alias = "buyingPower",
        alias = "buyingPowerUsd"
    )]
    pub cash: Option<Decimal>,
    #[serde(
        default,
        alias = "totalValue",
        alias = "total_value",
        alias = "accountValue",
        alias = "account_value",
        alias = "portfolioValue",
        alias = "portfolio_value",
        alias = "netWorth",
        alias = "net_worth",
        alias = "equity"
    )]
    pub value: Option<Decimal>,
    #[serde(
        default,
        alias = "positionsValue",
        alias = "positions_value",
        alias = "positionValue",
        alias = "position_value",
        alias = "holdingsValue",
        alias = "holdings_value"
    )]
    pub positions_value: Option<Decimal>,
}

impl AccountValue {
    pub fn cash_usd(&self) -> Option<Decimal> {
        self.cash
    }

    pub fn total_value_usd(&self) -> Option<Decimal> {
        self.value
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ValueDoc {
    Many(Vec<AccountValue>),
    One(AccountValue),
}

/// One account activity event, kept raw for the audit ledger with a derived
/// dedupe key.
#[derive(Debug, Clone)]
pub struct ActivityEvent {
    pub raw: Value,
}

impl ActivityEvent {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    fn first_str(&self, candidates: &[&str]) -> Option<String> {
        for key in candidates {
            match self.raw.get(key) {
                Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
                Some(Value::Number(n)) => return Some(n.to_string()),
                _ => continue,
            }
        }
        None
    }

    /// Stable dedupe key: an explicit id or hash when present, otherwise a
    /// timestamp|type|market composite.
    pub fn dedupe_key(&self) -> String {
        if let Some(id) = self.first_str(&[
            "id", "txHash", "tx_hash", "hash", "orderID", "orderId", "order_id",
        ]) {
            return id;
        }
        let ts = self
            .first_str(&["timestamp", "ts", "createdAt", "created_at"])
            .unwrap_or_default();
        let kind = self.first_str(&["type", "event"]).unwrap_or_default();
        let market = self
            .first_str(&["market", "market_slug", "conditionId"])
            .unwrap_or_default();
        format!("{ts}|{kind}|{market}")
    }
}

/// Read-only account data client
pub struct DataApiClient {
    client: Client,
    base_url: String,
}

impl DataApiClient {
    pub fn new(cfg: &PolymarketConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: net::build_client(net::DEFAULT_TIMEOUT)?,
            base_url: cfg.data_api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn get_positions(
        &self,
        wallet: &str,
        limit: u32,
    ) -> Result<Vec<RawPosition>, ApiError> {
        let url = format!("{}/positions", self.base_url);
        let query = [
            ("user", wallet.to_string()),
            ("sizeThreshold", "0".to_string()),
            ("limit", limit.to_string()),
            ("offset", "0".to_string()),
        ];
        let rows: Option<Vec<RawPosition>> =
            net::get_json(&self.client, &url, &query, net::DEFAULT_RETRIES).await?;
        Ok(rows.unwrap_or_default())
    }

    pub async fn get_value(&self, wallet: &str) -> Result<Option<AccountValue>, ApiError> {
        let url = format!("{}/value", self.base_url);
        let query = [("user", wallet.to_string())];
        let doc: Option<ValueDoc> =
            net::get_json(&self.client, &url, &query, net::DEFAULT_RETRIES).await?;
        Ok(doc.map(|d| match d {
            ValueDoc::Many(v) => v.into_iter().next().unwrap_or_default(),
            ValueDoc::One(v) => v,
        }))
    }

    pub async fn get_activity(
        &self,
        wallet: &str,
        limit: u32,
    ) -> Result<Vec<ActivityEvent>, ApiError> {
        let url = format!("{}/activity", self.base_url);
        let query = [
            ("user", wallet.to_string()),
            ("limit", limit.to_string()),
            ("offset", "0".to_string()),
        ];
        let rows: Option<Vec<Value>> =
            net::get_json(&self.client, &url, &query, net::DEFAULT_RETRIES).await?;
        Ok(rows
            .unwrap_or_default()
            .into_iter()
            .map(ActivityEvent::new)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_position_token_prefers_asset() {
        let p: RawPosition =
            serde_json::from_value(json!({"asset": "111", "tokenId": "222"})).unwrap();
        assert_eq!(p.token(), Some("111"));

        let p: RawPosition = serde_json::from_value(json!({"tokenId": "222"})).unwrap();
        assert_eq!(p.token(), Some("222"));

        let p: RawPosition = serde_json::from_value(json!({})).unwrap();
        assert_eq!(p.token(), None);
    }

    #[test]
    fn test_position_value_falls_back_to_avg_price() {
        let p: RawPosition =
            serde_json::from_value(json!({"size": 10, "avgPrice": 0.5})).unwrap();
        assert_eq!(p.value_usd(), Some(dec!(5.0)));

        let p: RawPosition =
            serde_json::from_value(json!({"size": 10, "currentValue": 7.5})).unwrap();
        assert_eq!(p.value_usd(), Some(dec!(7.5)));

        let p: RawPosition = serde_json::from_value(json!({"size": 10})).unwrap();
        assert_eq!(p.value_usd(), None);
    }

    #[test]
    fn test_account_value_aliases() {
        let v: AccountValue =
            serde_json::from_value(json!({"usdcBalance": 12.5, "portfolioValue": 40})).unwrap();
        assert_eq!(v.cash_usd(), Some(dec!(12.5)));
        assert_eq!(v.total_value_usd(), Some(dec!(40)));
    }

    #[test]
    fn test_activity_dedupe_key() {
        let ev = ActivityEvent::new(json!({"txHash": "0xdead"}));
        assert_eq!(ev.dedupe_key(), "0xdead");

        let ev = ActivityEvent::new(json!({
            "timestamp": 1787943600u64,
            "type": "TRADE",
            "conditionId": "0xcond"
        }));
        assert_eq!(ev.dedupe_key(), "1787943600|TRADE|0xcond");
    }
}
