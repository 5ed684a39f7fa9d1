//! Paper-mode trade ledger

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::LedgerConfig;
use crate::market::Outcome;

use super::{cap_records, guess_kind, load_json, save_json_atomic};

/// One entry in the paper trade list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum PaperTrade {
    Buy {
        ts: DateTime<Utc>,
        kind: String,
        order_key: String,
        market_slug: String,
        asset_symbol: String,
        outcome: Outcome,
        token_id: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        price: Decimal,
        size: Decimal,
        notional: Decimal,
        fee_paid: Decimal,
        cash_before: Decimal,
        cash_after: Decimal,
        order_type: String,
    },
    Settle {
        ts: DateTime<Utc>,
        kind: String,
        order_key: String,
        market_slug: String,
        asset_symbol: String,
        predicted_outcome: Outcome,
        actual_outcome: Outcome,
        token_id: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        open_price: Decimal,
        close_price: Decimal,
        change_pct: Decimal,
        total_notional: Decimal,
        total_size: Decimal,
        fee_paid: Decimal,
        payout: Decimal,
        pnl: Decimal,
        win: bool,
        cash_after: Decimal,
    },
}

/// Rolling paper ledger stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperLedgerStats {
    pub initial_cash: Decimal,
    pub cash: Decimal,
    pub realized_pnl: Decimal,
    pub fees_paid: Decimal,
    pub buy_count: u64,
    pub settle_count: u64,
    pub win_count: u64,
    pub loss_count: u64,
    pub total_buy_notional: Decimal,
    pub total_payout: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaperLedgerStats {
    fn new(initial_cash: Decimal) -> Self {
        let now = Utc::now();
        Self {
            initial_cash,
            cash: initial_cash,
            realized_pnl: Decimal::ZERO,
            fees_paid: Decimal::ZERO,
            buy_count: 0,
            settle_count: 0,
            win_count: 0,
            loss_count: 0,
            total_buy_notional: Decimal::ZERO,
            total_payout: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Context for one settlement ledger entry
pub struct SettlementEntry {
    pub order_key: String,
    pub market_slug: String,
    pub asset_symbol: String,
    pub predicted_outcome: Outcome,
    pub actual_outcome: Outcome,
    pub token_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub open_price: Decimal,
    pub close_price: Decimal,
    pub change_pct: Decimal,
    pub total_notional: Decimal,
    pub total_size: Decimal,
    pub fee_paid: Decimal,
    pub payout: Decimal,
    pub pnl: Decimal,
    pub cash_after: Decimal,
}

/// Context for one buy ledger entry
pub struct BuyEntry {
    pub order_key: String,
    pub market_slug: String,
    pub asset_symbol: String,
    pub outcome: Outcome,
    pub token_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price: Decimal,
    pub size: Decimal,
    pub notional: Decimal,
    pub fee_paid: Decimal,
    pub cash_before: Decimal,
    pub cash_after: Decimal,
    pub order_type: String,
}

pub struct PaperLedger {
    trades_path: PathBuf,
    stats_path: PathBuf,
    max_records: usize,
    initial_cash: Decimal,
}

impl PaperLedger {
    pub fn new(cfg: &LedgerConfig, initial_cash: Decimal) -> anyhow::Result<Self> {
        let ledger = Self {
            trades_path: cfg.paper_trades_path.clone(),
            stats_path: cfg.paper_stats_path.clone(),
            max_records: cfg.max_records,
            initial_cash,
        };
        ledger.ensure_files()?;
        Ok(ledger)
    }

    fn ensure_files(&self) -> anyhow::Result<()> {
        if !self.trades_path.exists() {
            save_json_atomic(&self.trades_path, &Vec::<PaperTrade>::new())?;
        }
        if load_json::<PaperLedgerStats>(&self.stats_path)?.is_none() {
            save_json_atomic(&self.stats_path, &PaperLedgerStats::new(self.initial_cash))?;
        }
        Ok(())
    }

    fn append_trade(&self, trade: PaperTrade) -> anyhow::Result<()> {
        let mut trades: Vec<PaperTrade> = load_json(&self.trades_path)?.unwrap_or_default();
        trades.push(trade);
        cap_records(&mut trades, self.max_records);
        save_json_atomic(&self.trades_path, &trades)
    }

    fn update_stats(&self, patch: impl FnOnce(&mut PaperLedgerStats)) -> anyhow::Result<()> {
        let mut stats = load_json::<PaperLedgerStats>(&self.stats_path)?
            .unwrap_or_else(|| PaperLedgerStats::new(self.initial_cash));
        patch(&mut stats);
        stats.updated_at = Utc::now();
        save_json_atomic(&self.stats_path, &stats)
    }

    pub fn record_buy(&self, entry: BuyEntry) -> anyhow::Result<()> {
        self.append_trade(PaperTrade::Buy {
            ts: Utc::now(),
            kind: guess_kind(&entry.market_slug).to_string(),
            order_key: entry.order_key.clone(),
            market_slug: entry.market_slug.clone(),
            asset_symbol: entry.asset_symbol.clone(),
            outcome: entry.outcome,
            token_id: entry.token_id.clone(),
            start_time: entry.start_time,
            end_time: entry.end_time,
            price: entry.price,
            size: entry.size,
            notional: entry.notional,
            fee_paid: entry.fee_paid,
            cash_before: entry.cash_before,
            cash_after: entry.cash_after,
            order_type: entry.order_type.clone(),
        })?;
        self.update_stats(|st| {
            st.cash = entry.cash_after;
            st.fees_paid += entry.fee_paid;
            st.buy_count += 1;
            st.total_buy_notional += entry.notional;
        })
    }

    pub fn record_settlement(&self, entry: SettlementEntry) -> anyhow::Result<()> {
        let win = entry.pnl >= Decimal::ZERO && entry.payout > Decimal::ZERO;
        self.append_trade(PaperTrade::Settle {
            ts: Utc::now(),
            kind: guess_kind(&entry.market_slug).to_string(),
            order_key: entry.order_key.clone(),
            market_slug: entry.market_slug.clone(),
            asset_symbol: entry.asset_symbol.clone(),
            predicted_outcome: entry.predicted_outcome,
            actual_outcome: entry.actual_outcome,
            token_id: entry.token_id.clone(),
            start_time: entry.start_time,
            end_time: entry.end_time,
            open_price: entry.open_price,
            close_price: entry.close_price,
            change_pct: entry.change_pct,
            total_notional: entry.total_notional,
            total_size: entry.total_size,
            fee_paid: entry.fee_paid,
            payout: entry.payout,
            pnl: entry.pnl,
            win,
            cash_after: entry.cash_after,
        })?;
        self.update_stats(|st| {
            st.cash = entry.cash_after;
            st.realized_pnl += entry.pnl;
            st.settle_count += 1;
            if win {
                st.win_count += 1;
            } else {
                st.loss_count += 1;
            }
            st.total_payout += entry.payout;
        })
    }

    #[cfg(test)]
    pub fn trades(&self) -> anyhow::Result<Vec<PaperTrade>> {
        Ok(load_json(&self.trades_path)?.unwrap_or_default())
    }

    #[cfg(test)]
    pub fn stats(&self) -> anyhow::Result<PaperLedgerStats> {
        Ok(load_json(&self.stats_path)?.unwrap_or_else(|| PaperLedgerStats::new(self.initial_cash)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ledger(dir: &tempfile::TempDir) -> PaperLedger {
        let cfg = LedgerConfig {
            paper_trades_path: dir.path().join("trades.json"),
            paper_stats_path: dir.path().join("stats.json"),
            live_trades_path: dir.path().join("live_trades.json"),
            live_stats_path: dir.path().join("live_stats.json"),
            max_records: 3,
        };
        PaperLedger::new(&cfg, dec!(10)).unwrap()
    }

    fn buy_entry(slug: &str, notional: Decimal) -> BuyEntry {
        BuyEntry {
            order_key: format!("{slug}|up|2026-08-28T20:00:00+00:00"),
            market_slug: slug.to_string(),
            asset_symbol: "BTC".to_string(),
            outcome: Outcome::Up,
            token_id: "111".to_string(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            price: dec!(0.6),
            size: notional / dec!(0.6),
            notional,
            fee_paid: Decimal::ZERO,
            cash_before: dec!(10),
            cash_after: dec!(10) - notional,
            order_type: "FOK".to_string(),
        }
    }

    #[test]
    fn test_buy_updates_stats() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir);
        ledger.record_buy(buy_entry("btc-updown-15m-1", dec!(2))).unwrap();

        let stats = ledger.stats().unwrap();
        assert_eq!(stats.cash, dec!(8));
        assert_eq!(stats.buy_count, 1);
        assert_eq!(stats.total_buy_notional, dec!(2));

        let trades = ledger.trades().unwrap();
        assert_eq!(trades.len(), 1);
        match &trades[0] {
            PaperTrade::Buy { kind, .. } => assert_eq!(kind, "15m"),
            other => panic!("unexpected trade {other:?}"),
        }
    }

    #[test]
    fn test_settlement_win_loss_counters() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir);
        let entry = SettlementEntry {
            order_key: "k".to_string(),
            market_slug: "btc-hourly".to_string(),
            asset_symbol: "BTC".to_string(),
            predicted_outcome: Outcome::Up,
            actual_outcome: Outcome::Up,
            token_id: "111".to_string(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            open_price: dec!(100),
            close_price: dec!(101),
            change_pct: dec!(0.01),
            total_notional: dec!(6),
            total_size: dec!(10),
            fee_paid: dec!(0.1),
            payout: dec!(10),
            pnl: dec!(3.9),
            cash_after: dec!(13.9),
        };
        ledger.record_settlement(entry).unwrap();

        let stats = ledger.stats().unwrap();
        assert_eq!(stats.settle_count, 1);
        assert_eq!(stats.win_count, 1);
        assert_eq!(stats.loss_count, 0);
        assert_eq!(stats.realized_pnl, dec!(3.9));
        assert_eq!(stats.total_payout, dec!(10));
    }

    #[test]
    fn test_trade_list_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir);
        for i in 0..5 {
            ledger
                .record_buy(buy_entry(&format!("slug-{i}"), dec!(1)))
                .unwrap();
        }
        let trades = ledger.trades().unwrap();
        assert_eq!(trades.len(), 3);
        match &trades[0] {
            PaperTrade::Buy { market_slug, .. } => assert_eq!(market_slug, "slug-2"),
            other => panic!("unexpected trade {other:?}"),
        }
    }
}
