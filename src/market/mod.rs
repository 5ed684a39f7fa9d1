//! Polymarket market discovery and read-only market data

pub mod clob;
pub mod data_api;
pub mod gamma;

pub use clob::ClobClient;
pub use data_api::{AccountValue, ActivityEvent, DataApiClient, RawPosition};
pub use gamma::GammaClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::net::ApiError;

/// Binary market outcome side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Up,
    Down,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Up => "up",
            Outcome::Down => "down",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered binary up/down market, ready for evaluation
#[derive(Debug, Clone)]
pub struct UpDownMarket {
    pub asset_symbol: String,
    pub event_slug: String,
    pub market_id: String,
    pub market_slug: String,
    pub question: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Outcome labels, index-aligned with `outcome_token_ids`
    pub outcomes: Vec<String>,
    pub outcome_token_ids: Vec<String>,
    pub neg_risk: bool,
}

impl UpDownMarket {
    /// Token id for the given side, matched against the outcome labels.
    pub fn token_id_for(&self, outcome: Outcome) -> Option<&str> {
        self.outcomes
            .iter()
            .position(|label| label.eq_ignore_ascii_case(outcome.as_str()))
            .and_then(|idx| self.outcome_token_ids.get(idx))
            .map(String::as_str)
    }

    /// Minutes from `now` to market expiry (negative when already expired).
    pub fn minutes_to_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.end_time - now).num_minutes()
    }
}

/// Source of discovered markets
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn discover(&self, asset: &str, now: DateTime<Utc>) -> Result<Vec<UpDownMarket>, ApiError>;
}

/// Source of top-of-book ask prices
#[async_trait]
pub trait BestAskSource: Send + Sync {
    async fn best_ask(&self, token_id: &str) -> Result<Option<Decimal>, ApiError>;
}
