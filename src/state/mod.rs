//! Durable order-lifecycle state

pub mod store;

pub use store::JsonStateStore;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::market::Outcome;

/// Lifecycle status of a persisted order record.
///
/// `planned → submitted → {filled | expired | error} → settled`; `error` is
/// recoverable and a later attempt may move the record forward again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Planned,
    Submitted,
    Filled,
    Expired,
    Error,
    Settled,
}

impl OrderStatus {
    /// Statuses under which a new intent for the same key must be skipped.
    pub fn blocks_resubmission(&self) -> bool {
        matches!(
            self,
            OrderStatus::Submitted | OrderStatus::Filled | OrderStatus::Settled
        )
    }
}

/// One persisted order, keyed by `market_slug|outcome|expiry` in the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub market_slug: String,
    pub outcome: Outcome,
    pub token_id: String,
    pub asset_symbol: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: OrderStatus,
    /// Engine order ids from successful child submissions
    #[serde(default)]
    pub order_ids: Vec<String>,
    /// Cumulative notional across successful children
    #[serde(default)]
    pub total_notional: Decimal,
    /// Cumulative share size across successful children
    #[serde(default)]
    pub total_size: Decimal,
    #[serde(default)]
    pub fee_paid: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// "win" or "lose" once settled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<Decimal>,
}

impl OrderRecord {
    /// Logical order key: `market_slug|outcome|expiryRFC3339`.
    pub fn key(&self) -> String {
        order_key(&self.market_slug, self.outcome, self.end_time)
    }
}

/// Logical order key shared by records and intents.
pub fn order_key(market_slug: &str, outcome: Outcome, end_time: DateTime<Utc>) -> String {
    format!(
        "{}|{}|{}",
        market_slug,
        outcome.as_str(),
        end_time.to_rfc3339()
    )
}

/// Rolling paper-account statistics, persisted alongside the orders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperStats {
    pub cash: Decimal,
    pub realized_pnl: Decimal,
    pub fees_paid: Decimal,
    pub trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub started_at: DateTime<Utc>,
}

impl PaperStats {
    pub fn new(initial_cash: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            cash: initial_cash,
            realized_pnl: Decimal::ZERO,
            fees_paid: Decimal::ZERO,
            trades: 0,
            wins: 0,
            losses: 0,
            started_at: now,
        }
    }
}

const STATE_VERSION: u32 = 1;

fn default_version() -> u32 {
    STATE_VERSION
}

/// Whole persisted state document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub orders: BTreeMap<String, OrderRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper: Option<PaperStats>,
    /// Dedupe keys of live activity events already recorded
    #[serde(default)]
    pub live_activity_seen: Vec<String>,
}

impl Default for BotState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            orders: BTreeMap::new(),
            paper: None,
            live_activity_seen: Vec::new(),
        }
    }
}
