//! Execution coordinator and settlement reconciler
//!
//! `OrderManager` owns the durable order records and serializes all sizing,
//! submission, ledger, and settlement mutation within a cycle.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::{Config, Mode};
use crate::execution::{ExecutionEngine, OrderRequest, SubmitOutcome};
use crate::feed::ReferenceFeed;
use crate::fees::FeeService;
use crate::ledger::live::OrderSubmission;
use crate::ledger::paper::{BuyEntry, SettlementEntry};
use crate::ledger::{LiveLedger, PaperLedger};
use crate::market::{DataApiClient, Outcome, RawPosition};
use crate::notify::Notifier;
use crate::risk::{
    self, clamp_child, live_open_orders_notional, open_orders_notional, spendable_cash,
    split_children, tiered_cap, ClampContext, PerformanceTracker,
};
use crate::state::{JsonStateStore, OrderRecord, OrderStatus, PaperStats};

const ACTIVITY_SEEN_CAP: usize = 500;
const POSITIONS_FETCH_LIMIT: u32 = 500;
const ACTIVITY_FETCH_LIMIT: u32 = 100;

/// Point-in-time view of held positions, refreshed on a cadence.
///
/// Fill detection via this snapshot is a heuristic: a nonzero held size means
/// "probably filled", not proof.
#[derive(Debug, Default)]
pub struct PositionSnapshot {
    pub token_sizes: HashMap<String, Decimal>,
    pub token_values_usd: HashMap<String, Decimal>,
    pub total_value_usd: Decimal,
    pub updated_at: Option<Instant>,
}

impl PositionSnapshot {
    pub fn from_raw(raw: &[RawPosition]) -> Self {
        let mut token_sizes: HashMap<String, Decimal> = HashMap::new();
        let mut token_values_usd: HashMap<String, Decimal> = HashMap::new();
        let mut total_value_usd = Decimal::ZERO;
        for position in raw {
            let token = match position.token() {
                Some(t) => t.to_string(),
                None => continue,
            };
            let size = position.size();
            if size != Decimal::ZERO {
                *token_sizes.entry(token.clone()).or_default() += size;
            }
            if let Some(value) = position.value_usd() {
                *token_values_usd.entry(token).or_default() += value;
                total_value_usd += value;
            }
        }
        Self {
            token_sizes,
            token_values_usd,
            total_value_usd,
            updated_at: Some(Instant::now()),
        }
    }

    pub fn held_size(&self, token_id: &str) -> Decimal {
        self.token_sizes
            .get(token_id)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

pub struct OrderManager {
    cfg: Config,
    engine: Arc<dyn ExecutionEngine>,
    data_api: DataApiClient,
    feed: Arc<dyn ReferenceFeed>,
    store: JsonStateStore,
    paper_ledger: Option<PaperLedger>,
    live_ledger: Option<LiveLedger>,
    notifier: Arc<dyn Notifier>,
    performance: Arc<RwLock<PerformanceTracker>>,
    fees: Option<FeeService>,
    positions: PositionSnapshot,
    live_cash_usd: Decimal,
    live_total_value_usd: Option<Decimal>,
    live_positions_value_usd: Option<Decimal>,
    /// After a live submission, the locally decremented cash wins over the
    /// data API until this deadline
    live_cash_hold_until: Option<Instant>,
    live_cash_refreshed: Option<Instant>,
    activity_seen: HashSet<String>,
    last_status_poll: Option<Instant>,
}

impl OrderManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: Config,
        engine: Arc<dyn ExecutionEngine>,
        data_api: DataApiClient,
        feed: Arc<dyn ReferenceFeed>,
        store: JsonStateStore,
        paper_ledger: Option<PaperLedger>,
        live_ledger: Option<LiveLedger>,
        notifier: Arc<dyn Notifier>,
        performance: Arc<RwLock<PerformanceTracker>>,
        fees: Option<FeeService>,
    ) -> Self {
        let live_cash_usd = cfg.live.cash_usd;
        Self {
            cfg,
            engine,
            data_api,
            feed,
            store,
            paper_ledger,
            live_ledger,
            notifier,
            performance,
            fees,
            positions: PositionSnapshot::default(),
            live_cash_usd,
            live_total_value_usd: None,
            live_positions_value_usd: None,
            live_cash_hold_until: None,
            live_cash_refreshed: None,
            activity_seen: HashSet::new(),
            last_status_poll: None,
        }
    }

    /// Load durable state, prune stale records, and seed the paper account
    /// on first run.
    pub fn load(&mut self) -> anyhow::Result<()> {
        self.store.load()?;
        self.store.cleanup();
        self.activity_seen = self
            .store
            .state
            .live_activity_seen
            .iter()
            .cloned()
            .collect();
        if self.cfg.mode == Mode::Paper && self.store.state.paper.is_none() {
            self.store.state.paper =
                Some(PaperStats::new(self.cfg.paper.initial_cash, Utc::now()));
        }
        self.store.save()
    }

    async fn notify(&self, text: &str) {
        self.notifier.send_text(text).await;
    }

    async fn refresh_positions_if_needed(&mut self) {
        let wallet = self.cfg.wallet_address.trim();
        if wallet.is_empty() {
            return;
        }
        if let Some(updated) = self.positions.updated_at {
            if updated.elapsed().as_secs() < self.cfg.strategy.positions_refresh_secs {
                return;
            }
        }
        match self.data_api.get_positions(wallet, POSITIONS_FETCH_LIMIT).await {
            Ok(raw) => self.positions = PositionSnapshot::from_raw(&raw),
            Err(err) => {
                tracing::warn!(error = %err, "position refresh failed");
            }
        }
    }

    async fn refresh_live_cash_if_needed(&mut self) {
        if self.cfg.mode != Mode::Live || !self.cfg.live.enable_auto_balance {
            return;
        }
        let wallet = self.cfg.wallet_address.trim().to_string();
        if wallet.is_empty() {
            return;
        }
        if let Some(last) = self.live_cash_refreshed {
            if last.elapsed().as_secs() < self.cfg.live.balance_refresh_secs {
                return;
            }
        }
        let value = match self.data_api.get_value(&wallet).await {
            Ok(Some(v)) => v,
            Ok(None) => return,
            Err(err) => {
                self.notify(&format!("Balance refresh failed: {err}")).await;
                return;
            }
        };
        self.live_cash_refreshed = Some(Instant::now());
        let held_locally = self
            .live_cash_hold_until
            .is_some_and(|until| Instant::now() < until);
        if let Some(cash) = value.cash_usd() {
            if !held_locally {
                self.live_cash_usd = cash.max(Decimal::ZERO);
            }
        }
        self.live_total_value_usd = value.total_value_usd();
        self.live_positions_value_usd = value.positions_value;
        if let Some(ledger) = &self.live_ledger {
            let raw = serde_json::json!({
                "cash": value.cash_usd(),
                "value": value.total_value_usd(),
                "positions_value": value.positions_value,
            });
            if let Err(err) = ledger.save_value_snapshot(raw, value.cash_usd()) {
                tracing::warn!(error = %err, "value snapshot write failed");
            }
        }
    }

    fn paper_cash(&self) -> Decimal {
        self.store
            .state
            .paper
            .as_ref()
            .map(|p| p.cash)
            .unwrap_or(Decimal::ZERO)
    }

    fn paper_open_orders_count(&self) -> usize {
        self.store
            .state
            .orders
            .values()
            .filter(|r| r.status == OrderStatus::Submitted)
            .count()
    }

    fn live_positions_value(&self) -> Decimal {
        self.live_positions_value_usd
            .unwrap_or(self.positions.total_value_usd)
    }

    /// Portfolio-wide exposure cap in USD. Paper mode caps at a fraction of
    /// equity; live mode additionally tiers on the rollover threshold.
    fn max_total_exposure_usd(&self) -> Decimal {
        let fraction = self.cfg.exposure.max_total_fraction;
        match self.cfg.mode {
            Mode::Paper => {
                let equity = self.paper_cash()
                    + open_orders_notional(
                        &self.store.state.orders,
                        &[OrderStatus::Submitted, OrderStatus::Filled],
                    );
                tiered_cap(equity, Decimal::ZERO, Decimal::ZERO, fraction)
            }
            Mode::Live => {
                let equity = match self.live_total_value_usd {
                    Some(total) => total,
                    None => {
                        self.live_cash_usd
                            + self.live_positions_value()
                            + live_open_orders_notional(
                                &self.store.state.orders,
                                &self.positions.token_sizes,
                            )
                    }
                };
                tiered_cap(
                    equity,
                    self.cfg.live.roll_threshold_usd,
                    self.cfg.live.max_notional_below_threshold,
                    fraction,
                )
            }
        }
    }

    fn current_total_exposure_usd(&self) -> Decimal {
        match self.cfg.mode {
            Mode::Paper => open_orders_notional(
                &self.store.state.orders,
                &[OrderStatus::Submitted, OrderStatus::Filled],
            ),
            Mode::Live => {
                self.live_positions_value()
                    + live_open_orders_notional(
                        &self.store.state.orders,
                        &self.positions.token_sizes,
                    )
            }
        }
        .max(Decimal::ZERO)
    }

    fn remaining_total_exposure_usd(&self) -> Decimal {
        (self.max_total_exposure_usd() - self.current_total_exposure_usd()).max(Decimal::ZERO)
    }

    fn trade_fee_rate(&self) -> Decimal {
        self.fees
            .as_ref()
            .map(|f| f.trade_fee_rate())
            .unwrap_or(self.cfg.strategy.fee_estimate)
    }

    /// Debit the paper account for a buy; returns the fee charged.
    fn paper_apply_buy(&mut self, notional: Decimal) -> Decimal {
        let fee = self.trade_fee_rate() * notional;
        if let Some(paper) = self.store.state.paper.as_mut() {
            paper.cash -= notional + fee;
            paper.fees_paid += fee;
            paper.trades += 1;
        }
        fee
    }

    fn paper_apply_settlement(
        &mut self,
        pnl: Decimal,
        payout: Decimal,
        win: bool,
        settlement_fee: Decimal,
    ) {
        if let Some(paper) = self.store.state.paper.as_mut() {
            paper.cash += payout - settlement_fee;
            paper.realized_pnl += pnl;
            paper.fees_paid += settlement_fee;
            if win {
                paper.wins += 1;
            } else {
                paper.losses += 1;
            }
        }
    }

    /// Whether a new intent under this key must be skipped.
    fn should_skip(&self, order: &OrderRequest) -> bool {
        self.store
            .get_order(&order.key())
            .is_some_and(|record| record.status.blocks_resubmission())
    }

    /// Size, split, and submit an intent through the engine, persisting the
    /// durable record after every child.
    pub async fn submit_with_risk(
        &mut self,
        order: &OrderRequest,
    ) -> anyhow::Result<Vec<SubmitOutcome>> {
        self.refresh_live_cash_if_needed().await;
        self.refresh_positions_if_needed().await;
        self.store.cleanup();

        if self.should_skip(order) {
            tracing::debug!(key = %order.key(), "intent already in flight, skipping");
            return Ok(Vec::new());
        }
        if self.positions.held_size(&order.token_id) > Decimal::ZERO {
            tracing::debug!(token_id = %order.token_id, "position already held, skipping");
            return Ok(Vec::new());
        }

        let key = order.key();
        if self.store.get_order(&key).is_none() {
            let now = Utc::now();
            self.store.insert_order(OrderRecord {
                market_slug: order.market_slug.clone(),
                outcome: order.outcome,
                token_id: order.token_id.clone(),
                asset_symbol: order.asset_symbol.clone(),
                start_time: order.start_time,
                end_time: order.end_time,
                status: OrderStatus::Planned,
                order_ids: Vec::new(),
                total_notional: Decimal::ZERO,
                total_size: Decimal::ZERO,
                fee_paid: Decimal::ZERO,
                created_at: now,
                updated_at: now,
                last_error: None,
                result: None,
                settled_at: None,
                pnl: None,
            });
            self.store.save()?;
            self.notify(&format!(
                "Opportunity planned\nmode: {}\nasset: {}\nside: {}\nprice: {}\nnotional: {}\nmarket: {}\nexpiry: {}",
                self.cfg.mode.as_str(),
                order.asset_symbol,
                order.outcome,
                order.price,
                order.notional,
                order.market_slug,
                order.end_time.to_rfc3339(),
            ))
            .await;
        }

        let mut results = Vec::new();
        for planned in split_children(order, self.cfg.strategy.max_child_notional) {
            if Utc::now() >= planned.end_time {
                continue;
            }
            let headroom = self.remaining_total_exposure_usd();
            if headroom <= Decimal::ZERO {
                tracing::info!(key, "exposure cap reached, stopping submission");
                break;
            }
            let child = match self.clamp_for_mode(&planned, headroom) {
                Some(child) => child,
                None => break,
            };

            let outcome = self.engine.submit(&child).await;
            results.push(outcome.clone());
            if outcome.success {
                self.apply_success(&key, &child, &outcome).await?;
            } else {
                self.apply_failure(&key, &child, &outcome).await?;
            }
            self.store.save()?;
            tokio::time::sleep(Duration::from_millis(self.cfg.strategy.child_order_spacing_ms))
                .await;
        }
        Ok(results)
    }

    /// Mode-specific capital clamp for one child; `None` means the child (and
    /// all later ones) cannot be funded.
    fn clamp_for_mode(&self, child: &OrderRequest, headroom: Decimal) -> Option<OrderRequest> {
        match self.cfg.mode {
            Mode::Paper => {
                if self.paper_open_orders_count() >= self.cfg.paper.max_open_orders {
                    return None;
                }
                let cash = self.paper_cash();
                if cash <= Decimal::ZERO {
                    return None;
                }
                let spendable = spendable_cash(cash, self.trade_fee_rate());
                clamp_child(
                    child,
                    &ClampContext {
                        spendable,
                        per_trade_cap: spendable * self.cfg.paper.max_fraction_per_trade,
                        exposure_headroom: headroom,
                        min_notional: self.cfg.paper.min_notional,
                    },
                )
            }
            Mode::Live => {
                let spendable = spendable_cash(self.live_cash_usd, self.trade_fee_rate());
                clamp_child(
                    child,
                    &ClampContext {
                        spendable,
                        per_trade_cap: risk::sizing::live_per_trade_cap(
                            self.live_cash_usd,
                            self.cfg.live.roll_threshold_usd,
                            self.cfg.live.max_notional_below_threshold,
                            self.cfg.live.max_fraction_above_threshold,
                        ),
                        exposure_headroom: headroom,
                        min_notional: self.cfg.live.min_notional,
                    },
                )
            }
        }
    }

    async fn apply_success(
        &mut self,
        key: &str,
        child: &OrderRequest,
        outcome: &SubmitOutcome,
    ) -> anyhow::Result<()> {
        self.notify(&format!(
            "Order submitted\nmode: {}\nasset: {}\nside: {}\nprice: {}\nsize: {}\nnotional: {}\nmarket: {}\norder id: {}",
            self.cfg.mode.as_str(),
            child.asset_symbol,
            child.outcome,
            child.price,
            child.size,
            child.notional,
            child.market_slug,
            outcome.order_id.as_deref().unwrap_or("-"),
        ))
        .await;

        let mut added_fee = Decimal::ZERO;
        match self.cfg.mode {
            Mode::Paper => {
                let cash_before = self.paper_cash();
                added_fee = self.paper_apply_buy(child.notional);
                let cash_after = self.paper_cash();
                if let Some(ledger) = &self.paper_ledger {
                    if let Err(err) = ledger.record_buy(BuyEntry {
                        order_key: key.to_string(),
                        market_slug: child.market_slug.clone(),
                        asset_symbol: child.asset_symbol.clone(),
                        outcome: child.outcome,
                        token_id: child.token_id.clone(),
                        start_time: child.start_time,
                        end_time: child.end_time,
                        price: child.price,
                        size: child.size,
                        notional: child.notional,
                        fee_paid: added_fee,
                        cash_before,
                        cash_after,
                        order_type: child.order_type.as_str().to_string(),
                    }) {
                        tracing::warn!(error = %err, "paper ledger write failed");
                    }
                }
            }
            Mode::Live => {
                let fee_estimated = self.trade_fee_rate() * child.notional;
                self.live_cash_usd =
                    (self.live_cash_usd - child.notional - fee_estimated).max(Decimal::ZERO);
                self.live_cash_hold_until = Some(
                    Instant::now()
                        + Duration::from_secs(self.cfg.live.balance_refresh_secs * 2),
                );
                if let Some(ledger) = &self.live_ledger {
                    if let Err(err) = ledger.append_order_submission(OrderSubmission {
                        order_key: key.to_string(),
                        market_slug: child.market_slug.clone(),
                        asset_symbol: child.asset_symbol.clone(),
                        outcome: child.outcome.as_str().to_string(),
                        price: child.price,
                        size: child.size,
                        notional: child.notional,
                        fee_estimated,
                        order_id: outcome.order_id.clone(),
                    }) {
                        tracing::warn!(error = %err, "live ledger write failed");
                    }
                }
            }
        }

        let order_id = outcome.order_id.clone();
        let (notional, size) = (child.notional, child.size);
        self.store.update_order(key, |record| {
            record.status = OrderStatus::Submitted;
            if let Some(id) = order_id {
                record.order_ids.push(id);
            }
            record.total_notional += notional;
            record.total_size += size;
            record.fee_paid += added_fee;
            record.last_error = None;
        });
        Ok(())
    }

    async fn apply_failure(
        &mut self,
        key: &str,
        child: &OrderRequest,
        outcome: &SubmitOutcome,
    ) -> anyhow::Result<()> {
        self.notify(&format!(
            "Order submission failed\nmode: {}\nasset: {}\nside: {}\nnotional: {}\nmarket: {}\nerror: {}",
            self.cfg.mode.as_str(),
            child.asset_symbol,
            child.outcome,
            child.notional,
            child.market_slug,
            outcome.message,
        ))
        .await;
        // Accrued totals from earlier successful children stay untouched
        let message = outcome.message.clone();
        self.store.update_order(key, |record| {
            record.status = OrderStatus::Error;
            record.last_error = Some(message);
        });
        Ok(())
    }

    async fn ingest_live_activity(&mut self) -> anyhow::Result<()> {
        let wallet = self.cfg.wallet_address.trim().to_string();
        if wallet.is_empty() {
            return Ok(());
        }
        let ledger = match &self.live_ledger {
            Some(l) => l,
            None => return Ok(()),
        };
        let events = match self.data_api.get_activity(&wallet, ACTIVITY_FETCH_LIMIT).await {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!(error = %err, "activity fetch failed");
                return Ok(());
            }
        };
        let mut changed = false;
        for event in events {
            let dedupe = event.dedupe_key();
            if dedupe.is_empty() || self.activity_seen.contains(&dedupe) {
                continue;
            }
            self.activity_seen.insert(dedupe);
            changed = true;
            if let Err(err) = ledger.append_activity(&event) {
                tracing::warn!(error = %err, "activity ledger write failed");
            }
        }
        if changed {
            let mut seen: Vec<String> = self.activity_seen.iter().cloned().collect();
            seen.sort();
            if seen.len() > ACTIVITY_SEEN_CAP {
                seen = seen.split_off(seen.len() - ACTIVITY_SEEN_CAP);
            }
            self.store.state.live_activity_seen = seen;
            self.store.save()?;
        }
        Ok(())
    }

    /// Reconcile submitted records: detect fills via positions, settle (or
    /// expire) records past expiry.
    pub async fn poll_status(&mut self) -> anyhow::Result<()> {
        if let Some(last) = self.last_status_poll {
            if last.elapsed().as_secs() < self.cfg.strategy.poll_order_status_secs {
                return Ok(());
            }
        }
        self.last_status_poll = Some(Instant::now());
        self.refresh_live_cash_if_needed().await;
        self.refresh_positions_if_needed().await;
        if self.cfg.mode == Mode::Live {
            self.ingest_live_activity().await?;
        }

        let now = Utc::now();
        let submitted: Vec<(String, OrderRecord)> = self
            .store
            .state
            .orders
            .iter()
            .filter(|(_, r)| r.status == OrderStatus::Submitted)
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect();

        for (key, record) in submitted {
            if !record.token_id.is_empty()
                && self.positions.held_size(&record.token_id) > Decimal::ZERO
            {
                self.store
                    .update_order(&key, |r| r.status = OrderStatus::Filled);
                self.notify(&format!(
                    "Position detected, marking filled\nmode: {}\nside: {}\nmarket: {}\nnotional: {}",
                    self.cfg.mode.as_str(),
                    record.outcome,
                    record.market_slug,
                    record.total_notional,
                ))
                .await;
                continue;
            }
            if now <= record.end_time {
                continue;
            }

            let window = match self
                .feed
                .realized_window(&record.asset_symbol, record.start_time, record.end_time)
                .await
            {
                Ok(Some(w)) => w,
                // No verdict yet: leave the record submitted and retry on a
                // later poll
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(key, error = %err, "settlement outcome unavailable, will retry");
                    continue;
                }
            };
            let actual = if window.change_pct > Decimal::ZERO {
                Outcome::Up
            } else {
                Outcome::Down
            };
            let win = actual == record.outcome;
            self.performance
                .write()
                .await
                .record_result(&record.asset_symbol, win);

            match self.cfg.mode {
                Mode::Paper => {
                    self.settle_paper(&key, &record, &window, actual, win).await?;
                }
                Mode::Live => {
                    // Live settlement happens on chain; the record just stops
                    // counting as open
                    self.store
                        .update_order(&key, |r| r.status = OrderStatus::Expired);
                    self.notify(&format!(
                        "Order expired without detected fill\nmode: live\nside: {}\nmarket: {}\nnotional: {}",
                        record.outcome, record.market_slug, record.total_notional,
                    ))
                    .await;
                }
            }
        }
        self.store.save()
    }

    async fn settle_paper(
        &mut self,
        key: &str,
        record: &OrderRecord,
        window: &crate::feed::PriceWindow,
        actual: Outcome,
        win: bool,
    ) -> anyhow::Result<()> {
        let payout = if win { record.total_size } else { Decimal::ZERO };
        let settlement_fee = match self.fees.as_mut() {
            Some(fees) => fees.settlement_fee_usd().await,
            None => Decimal::ZERO,
        };
        let pnl = payout - record.total_notional - record.fee_paid - settlement_fee;
        self.paper_apply_settlement(pnl, payout, win, settlement_fee);
        let cash_after = self.paper_cash();
        if let Some(ledger) = &self.paper_ledger {
            if let Err(err) = ledger.record_settlement(SettlementEntry {
                order_key: key.to_string(),
                market_slug: record.market_slug.clone(),
                asset_symbol: record.asset_symbol.clone(),
                predicted_outcome: record.outcome,
                actual_outcome: actual,
                token_id: record.token_id.clone(),
                start_time: record.start_time,
                end_time: record.end_time,
                open_price: window.open,
                close_price: window.close,
                change_pct: window.change_pct,
                total_notional: record.total_notional,
                total_size: record.total_size,
                fee_paid: record.fee_paid,
                payout,
                pnl,
                cash_after,
            }) {
                tracing::warn!(error = %err, "settlement ledger write failed");
            }
        }
        let settled_at = Utc::now();
        self.store.update_order(key, |r| {
            r.status = OrderStatus::Settled;
            r.result = Some(if win { "win" } else { "lose" }.to_string());
            r.settled_at = Some(settled_at);
            r.pnl = Some(pnl);
        });
        self.notify(&format!(
            "Paper settlement\nasset: {}\npredicted: {}\nactual: {}\nchange: {}\nnotional: {}\npayout: {}\npnl: {}\ncash: {}",
            record.asset_symbol,
            record.outcome,
            actual,
            window.change_pct,
            record.total_notional,
            payout,
            pnl,
            cash_after,
        ))
        .await;
        Ok(())
    }
}
