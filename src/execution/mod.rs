//! Order intents and the execution transport seam

pub mod paper;

pub use paper::PaperEngine;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::Outcome;
use crate::state::order_key;

/// Order time-in-force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OrderType {
    #[default]
    #[serde(rename = "FOK")]
    Fok,
    #[serde(rename = "GTC")]
    Gtc,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Fok => "FOK",
            OrderType::Gtc => "GTC",
        }
    }
}

/// A priced buy intent; both the parent intent and its child orders use this
/// shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub market_slug: String,
    pub asset_symbol: String,
    pub outcome: Outcome,
    pub token_id: String,
    pub price: Decimal,
    pub size: Decimal,
    pub notional: Decimal,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub order_type: OrderType,
}

impl OrderRequest {
    /// Logical order key shared with the state store.
    pub fn key(&self) -> String {
        order_key(&self.market_slug, self.outcome, self.end_time)
    }

    /// Same intent at a different notional, with size recomputed from the
    /// price.
    pub fn with_notional(&self, notional: Decimal) -> OrderRequest {
        let mut child = self.clone();
        child.notional = notional;
        child.size = if self.price > Decimal::ZERO {
            notional / self.price
        } else {
            Decimal::ZERO
        };
        child
    }
}

/// Result of one submission attempt. Failures are data, not errors: the
/// coordinator records them and keeps going.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub success: bool,
    pub message: String,
    pub order_id: Option<String>,
}

impl SubmitOutcome {
    pub fn ok(order_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message: "submitted".to_string(),
            order_id: Some(order_id.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            order_id: None,
        }
    }
}

/// Transport seam for order submission. The live signed transport is
/// injected behind this trait; it is never constructed here.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn submit(&self, order: &OrderRequest) -> SubmitOutcome;

    fn mode_name(&self) -> &'static str;
}
