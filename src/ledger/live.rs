//! Live-mode audit ledger
//!
//! Records what the account actually did (order submissions we made plus
//! activity events reported by the data API). Audit-only: nothing here feeds
//! back into sizing or settlement.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use crate::config::LedgerConfig;
use crate::market::ActivityEvent;

use super::{cap_records, load_json, save_json_atomic};

/// Submission details captured at order time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSubmission {
    pub order_key: String,
    pub market_slug: String,
    pub asset_symbol: String,
    pub outcome: String,
    pub price: Decimal,
    pub size: Decimal,
    pub notional: Decimal,
    pub fee_estimated: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

/// One entry in the live event list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    OrderSubmit {
        ts: DateTime<Utc>,
        data: OrderSubmission,
    },
    Activity {
        ts: DateTime<Utc>,
        raw: Value,
    },
}

/// Rolling live ledger stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveLedgerStats {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub events: u64,
    pub trade_events: u64,
    pub fee_paid: Decimal,
    pub fee_estimated: Decimal,
    pub notional: Decimal,
    pub pnl_reported: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_value_snapshot: Option<ValueSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueSnapshot {
    pub ts: DateTime<Utc>,
    pub cash_usd: Option<Decimal>,
    pub raw: Value,
}

impl LiveLedgerStats {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            events: 0,
            trade_events: 0,
            fee_paid: Decimal::ZERO,
            fee_estimated: Decimal::ZERO,
            notional: Decimal::ZERO,
            pnl_reported: Decimal::ZERO,
            last_value_snapshot: None,
        }
    }
}

fn first_decimal(raw: &Value, candidates: &[&str]) -> Option<Decimal> {
    for key in candidates {
        let value = match raw.get(key) {
            Some(v) => v,
            None => continue,
        };
        let parsed = match value {
            Value::String(s) => s.parse().ok(),
            Value::Number(_) => serde_json::from_value(value.clone()).ok(),
            _ => None,
        };
        if parsed.is_some() {
            return parsed;
        }
    }
    None
}

pub struct LiveLedger {
    trades_path: PathBuf,
    stats_path: PathBuf,
    max_records: usize,
}

impl LiveLedger {
    pub fn new(cfg: &LedgerConfig) -> anyhow::Result<Self> {
        let ledger = Self {
            trades_path: cfg.live_trades_path.clone(),
            stats_path: cfg.live_stats_path.clone(),
            max_records: cfg.max_records,
        };
        if !ledger.trades_path.exists() {
            save_json_atomic(&ledger.trades_path, &Vec::<LiveEvent>::new())?;
        }
        if load_json::<LiveLedgerStats>(&ledger.stats_path)?.is_none() {
            save_json_atomic(&ledger.stats_path, &LiveLedgerStats::new())?;
        }
        Ok(ledger)
    }

    fn append_event(&self, event: LiveEvent) -> anyhow::Result<()> {
        let mut events: Vec<LiveEvent> = load_json(&self.trades_path)?.unwrap_or_default();
        events.push(event);
        cap_records(&mut events, self.max_records);
        save_json_atomic(&self.trades_path, &events)
    }

    fn update_stats(&self, patch: impl FnOnce(&mut LiveLedgerStats)) -> anyhow::Result<()> {
        let mut stats =
            load_json::<LiveLedgerStats>(&self.stats_path)?.unwrap_or_else(LiveLedgerStats::new);
        patch(&mut stats);
        stats.updated_at = Utc::now();
        save_json_atomic(&self.stats_path, &stats)
    }

    pub fn append_order_submission(&self, data: OrderSubmission) -> anyhow::Result<()> {
        let notional = data.notional;
        let fee_estimated = data.fee_estimated;
        self.append_event(LiveEvent::OrderSubmit {
            ts: Utc::now(),
            data,
        })?;
        self.update_stats(|st| {
            st.events += 1;
            st.trade_events += 1;
            st.notional += notional;
            st.fee_estimated += fee_estimated;
        })
    }

    pub fn append_activity(&self, event: &ActivityEvent) -> anyhow::Result<()> {
        let raw = event.raw.clone();
        let fee = first_decimal(&raw, &["fee", "fees", "feePaid", "fee_paid"]);
        let notional = first_decimal(&raw, &["notional", "amount", "usdAmount", "usdcAmount", "value"]);
        let pnl = first_decimal(&raw, &["pnl", "cash_pnl", "cashPnl", "realizedPnl", "realized_pnl"]);

        self.append_event(LiveEvent::Activity {
            ts: Utc::now(),
            raw,
        })?;
        self.update_stats(|st| {
            st.events += 1;
            if let Some(fee) = fee {
                st.fee_paid += fee;
            }
            if let Some(notional) = notional {
                st.notional += notional;
            }
            if let Some(pnl) = pnl {
                st.pnl_reported += pnl;
            }
        })
    }

    pub fn save_value_snapshot(&self, raw: Value, cash_usd: Option<Decimal>) -> anyhow::Result<()> {
        self.update_stats(|st| {
            st.last_value_snapshot = Some(ValueSnapshot {
                ts: Utc::now(),
                cash_usd,
                raw,
            });
        })
    }

    #[cfg(test)]
    pub fn events(&self) -> anyhow::Result<Vec<LiveEvent>> {
        Ok(load_json(&self.trades_path)?.unwrap_or_default())
    }

    #[cfg(test)]
    pub fn stats(&self) -> anyhow::Result<LiveLedgerStats> {
        Ok(load_json(&self.stats_path)?.unwrap_or_else(LiveLedgerStats::new))
    }
}
