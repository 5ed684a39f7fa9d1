//! Opportunity evaluator: lagged reference-price moves on open up/down
//! markets

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::StrategyConfig;
use crate::execution::{OrderRequest, OrderType};
use crate::feed::ReferenceFeed;
use crate::market::{BestAskSource, Outcome, UpDownMarket};
use crate::risk::PerformanceTracker;

const PRICE_HISTORY_CAP: usize = 20;
const TREND_WINDOW: usize = 5;
const TREND_TOLERANCE: Decimal = dec!(0.02);
const MEDIUM_VOL_FLOOR: Decimal = dec!(0.8);

pub struct LagStrategy {
    cfg: StrategyConfig,
    feed: Arc<dyn ReferenceFeed>,
    book: Arc<dyn BestAskSource>,
    performance: Arc<RwLock<PerformanceTracker>>,
    /// Evaluated-and-emitted keys (`market_slug|asset`), in-memory only
    traded_keys: HashMap<String, DateTime<Utc>>,
    last_trade_by_asset: HashMap<String, DateTime<Utc>>,
    price_history: HashMap<String, VecDeque<Decimal>>,
}

impl LagStrategy {
    pub fn new(
        cfg: StrategyConfig,
        feed: Arc<dyn ReferenceFeed>,
        book: Arc<dyn BestAskSource>,
        performance: Arc<RwLock<PerformanceTracker>>,
    ) -> Self {
        Self {
            cfg,
            feed,
            book,
            performance,
            traded_keys: HashMap::new(),
            last_trade_by_asset: HashMap::new(),
            price_history: HashMap::new(),
        }
    }

    /// Evaluate `markets` and emit sized intents, bounded by the per-pass
    /// notional budget. Emitting an intent marks its key as traded and arms
    /// the per-asset cooldown.
    pub async fn generate_orders(
        &mut self,
        markets: &[UpDownMarket],
        now: DateTime<Utc>,
    ) -> Vec<OrderRequest> {
        // Keys for markets past expiry can never recur
        self.traded_keys.retain(|_, end_time| *end_time > now);

        let mut orders = Vec::new();
        let mut total_notional = Decimal::ZERO;

        for market in markets {
            let key = format!("{}|{}", market.market_slug, market.asset_symbol);
            if self.traded_keys.contains_key(&key) {
                continue;
            }
            if let Some(last) = self.last_trade_by_asset.get(&market.asset_symbol) {
                let elapsed = (now - *last).num_seconds();
                if elapsed < self.cfg.trade_cooldown_secs as i64 {
                    continue;
                }
            }
            let minutes_left = market.minutes_to_expiry(now);
            if minutes_left < self.cfg.min_time_to_end_minutes
                || minutes_left > self.cfg.max_time_to_end_minutes
            {
                continue;
            }
            if !self.feed.has_symbol(&market.asset_symbol) {
                continue;
            }
            if now <= market.start_time {
                continue;
            }

            let window = match self
                .feed
                .realized_window(&market.asset_symbol, market.start_time, now)
                .await
            {
                Ok(Some(w)) => w,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(asset = %market.asset_symbol, error = %err, "reference window unavailable");
                    continue;
                }
            };

            let change = window.change_pct;
            let magnitude = change.abs();
            let mut dynamic_threshold = self.cfg.min_abs_return;
            if self.cfg.volatility_mult > Decimal::ZERO {
                dynamic_threshold =
                    dynamic_threshold.max(self.cfg.volatility_mult * window.volatility);
            }
            let desired = if change > Decimal::ZERO {
                Outcome::Up
            } else {
                Outcome::Down
            };

            let threshold_break = magnitude >= dynamic_threshold;
            let medium_confidence = magnitude >= self.cfg.medium_min_return
                && magnitude < dynamic_threshold
                && magnitude > MEDIUM_VOL_FLOOR * window.volatility;
            let trend = magnitude >= self.cfg.trend_min_return
                && self.trend_continues(&market.asset_symbol, change > Decimal::ZERO);
            if !(threshold_break || medium_confidence || trend) {
                continue;
            }
            if self.performance.read().await.is_halted(&market.asset_symbol) {
                tracing::info!(asset = %market.asset_symbol, "entries halted by loss streak");
                continue;
            }

            let token_id = match market.token_id_for(desired) {
                Some(id) => id.to_string(),
                None => continue,
            };
            let best_ask = match self.book.best_ask(&token_id).await {
                Ok(Some(ask)) => ask,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(token_id, error = %err, "best ask unavailable");
                    continue;
                }
            };
            if best_ask > self.cfg.max_entry_price || best_ask <= Decimal::ZERO {
                continue;
            }
            let edge = Decimal::ONE - best_ask - self.cfg.fee_estimate;
            if edge < self.cfg.min_edge {
                continue;
            }

            let remaining = self.cfg.max_total_notional - total_notional;
            if remaining <= Decimal::ZERO {
                break;
            }
            let notional = remaining
                .min(self.cfg.max_notional_per_market)
                .min(self.cfg.max_notional_per_trade);
            let order = OrderRequest {
                market_slug: market.market_slug.clone(),
                asset_symbol: market.asset_symbol.clone(),
                outcome: desired,
                token_id,
                price: best_ask,
                size: notional / best_ask,
                notional,
                start_time: market.start_time,
                end_time: market.end_time,
                order_type: OrderType::Fok,
            };
            tracing::info!(
                market = %order.market_slug,
                outcome = %order.outcome,
                change = %change,
                threshold = %dynamic_threshold,
                ask = %best_ask,
                notional = %notional,
                "opportunity admitted"
            );
            orders.push(order);
            total_notional += notional;
            self.traded_keys.insert(key, market.end_time);
            self.last_trade_by_asset
                .insert(market.asset_symbol.clone(), now);
            let history = self
                .price_history
                .entry(market.asset_symbol.clone())
                .or_default();
            history.push_back(window.close);
            while history.len() > PRICE_HISTORY_CAP {
                history.pop_front();
            }
        }
        orders
    }

    /// Last `TREND_WINDOW` observed closes move monotonically in the signal
    /// direction, within a 2% counter-move tolerance per step.
    fn trend_continues(&self, asset: &str, up: bool) -> bool {
        let history = match self.price_history.get(asset) {
            Some(h) if h.len() >= TREND_WINDOW => h,
            _ => return false,
        };
        let recent: Vec<Decimal> = history.iter().rev().take(TREND_WINDOW).rev().copied().collect();
        recent.windows(2).all(|pair| {
            if up {
                pair[1] >= pair[0] * (Decimal::ONE - TREND_TOLERANCE)
            } else {
                pair[1] <= pair[0] * (Decimal::ONE + TREND_TOLERANCE)
            }
        })
    }

    #[cfg(test)]
    fn seed_history(&mut self, asset: &str, closes: &[Decimal]) {
        self.price_history
            .insert(asset.to_string(), closes.iter().copied().collect());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::PriceWindow;
    use crate::net::ApiError;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    struct StubFeed {
        change: Decimal,
        volatility: Decimal,
    }

    #[async_trait]
    impl ReferenceFeed for StubFeed {
        async fn realized_window(
            &self,
            _asset: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Option<PriceWindow>, ApiError> {
            let open = dec!(100);
            let close = open * (Decimal::ONE + self.change);
            Ok(Some(PriceWindow {
                open,
                close,
                change_pct: self.change,
                volatility: self.volatility,
                closes: vec![open, close],
            }))
        }

        async fn spot_price(&self, _symbol: &str) -> Result<Option<Decimal>, ApiError> {
            Ok(None)
        }

        fn has_symbol(&self, asset: &str) -> bool {
            asset == "BTC" || asset == "ETH"
        }
    }

    struct StubBook {
        ask: Option<Decimal>,
    }

    #[async_trait]
    impl BestAskSource for StubBook {
        async fn best_ask(&self, _token_id: &str) -> Result<Option<Decimal>, ApiError> {
            Ok(self.ask)
        }
    }

    fn market(slug: &str, now: DateTime<Utc>) -> UpDownMarket {
        UpDownMarket {
            asset_symbol: "BTC".to_string(),
            event_slug: slug.to_string(),
            market_id: "1".to_string(),
            market_slug: slug.to_string(),
            question: String::new(),
            start_time: now - Duration::minutes(10),
            end_time: now + Duration::minutes(30),
            outcomes: vec!["Up".to_string(), "Down".to_string()],
            outcome_token_ids: vec!["111".to_string(), "222".to_string()],
            neg_risk: false,
        }
    }

    fn make_strategy(change: Decimal, vol: Decimal, ask: Decimal) -> LagStrategy {
        LagStrategy::new(
            StrategyConfig::default(),
            Arc::new(StubFeed {
                change,
                volatility: vol,
            }),
            Arc::new(StubBook { ask: Some(ask) }),
            Arc::new(RwLock::new(PerformanceTracker::new(3))),
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 28, 19, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_strong_move_emits_directional_order() {
        let mut strategy = make_strategy(dec!(0.002), dec!(0.0001), dec!(0.55));
        let orders = strategy.generate_orders(&[market("m1", now())], now()).await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].outcome, Outcome::Up);
        assert_eq!(orders[0].token_id, "111");
        assert_eq!(orders[0].price, dec!(0.55));

        let mut down = make_strategy(dec!(-0.002), dec!(0.0001), dec!(0.55));
        let orders = down.generate_orders(&[market("m2", now())], now()).await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].outcome, Outcome::Down);
        assert_eq!(orders[0].token_id, "222");
    }

    #[tokio::test]
    async fn test_weak_move_below_dynamic_threshold_is_rejected() {
        // vol_mult * vol = 2 * 0.01 = 0.02, well above the 0.004 move; the
        // medium band also fails (0.004 < 0.8 * 0.01)
        let mut strategy = make_strategy(dec!(0.004), dec!(0.01), dec!(0.55));
        let orders = strategy.generate_orders(&[market("m1", now())], now()).await;
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn test_medium_confidence_band_admits() {
        // 0.006 move: below the dynamic threshold (2 * 0.005 = 0.01) but
        // above medium_min_return and above 0.8 * vol
        let mut strategy = make_strategy(dec!(0.006), dec!(0.005), dec!(0.55));
        let orders = strategy.generate_orders(&[market("m1", now())], now()).await;
        assert_eq!(orders.len(), 1);
    }

    #[tokio::test]
    async fn test_trend_continuation_admits_small_move() {
        // 0.004 move fails both threshold rules under high volatility, but
        // the seeded rising history admits it via trend continuation
        let mut strategy = make_strategy(dec!(0.004), dec!(0.01), dec!(0.55));
        strategy.seed_history(
            "BTC",
            &[dec!(100), dec!(101), dec!(102), dec!(103), dec!(104)],
        );
        let orders = strategy.generate_orders(&[market("m1", now())], now()).await;
        assert_eq!(orders.len(), 1);
    }

    #[tokio::test]
    async fn test_loss_streak_halts_asset() {
        let mut strategy = make_strategy(dec!(0.002), dec!(0.0001), dec!(0.55));
        {
            let mut perf = strategy.performance.write().await;
            for _ in 0..3 {
                perf.record_result("BTC", false);
            }
        }
        let orders = strategy.generate_orders(&[market("m1", now())], now()).await;
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn test_emitted_key_not_reemitted() {
        let mut strategy = make_strategy(dec!(0.002), dec!(0.0001), dec!(0.55));
        let markets = [market("m1", now())];
        let first = strategy.generate_orders(&markets, now()).await;
        assert_eq!(first.len(), 1);
        // Second pass much later (cooldown elapsed): the key is still marked
        let later = now() + Duration::minutes(10);
        let second = strategy.generate_orders(&markets, later).await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_expired_keys_are_evicted() {
        let mut strategy = make_strategy(dec!(0.002), dec!(0.0001), dec!(0.55));
        let first = strategy.generate_orders(&[market("m1", now())], now()).await;
        assert_eq!(first.len(), 1);
        assert_eq!(strategy.traded_keys.len(), 1);

        // Before expiry the key is retained even across idle passes
        let mid = now() + Duration::minutes(20);
        strategy.generate_orders(&[], mid).await;
        assert_eq!(strategy.traded_keys.len(), 1);

        // Once the market has expired the key is dropped
        let after = now() + Duration::minutes(40);
        strategy.generate_orders(&[], after).await;
        assert!(strategy.traded_keys.is_empty());
    }

    #[tokio::test]
    async fn test_cooldown_blocks_same_asset() {
        let mut strategy = make_strategy(dec!(0.002), dec!(0.0001), dec!(0.55));
        let first = strategy.generate_orders(&[market("m1", now())], now()).await;
        assert_eq!(first.len(), 1);
        // Different market, same asset, 10 seconds later: inside cooldown
        let soon = now() + Duration::seconds(10);
        let second = strategy.generate_orders(&[market("m2", soon)], soon).await;
        assert!(second.is_empty());
        // After the cooldown the asset trades again
        let later = now() + Duration::seconds(120);
        let third = strategy.generate_orders(&[market("m3", later)], later).await;
        assert_eq!(third.len(), 1);
    }

    #[tokio::test]
    async fn test_expensive_ask_and_thin_edge_rejected() {
        // Ask above the entry ceiling
        let mut strategy = make_strategy(dec!(0.002), dec!(0.0001), dec!(0.95));
        let orders = strategy.generate_orders(&[market("m1", now())], now()).await;
        assert!(orders.is_empty());

        // Ask below the ceiling but edge under min_edge:
        // 1 - 0.91 - 0.01 = 0.08 < 0.1
        let mut strategy = make_strategy(dec!(0.002), dec!(0.0001), dec!(0.91));
        strategy.cfg.min_edge = dec!(0.1);
        let orders = strategy.generate_orders(&[market("m1", now())], now()).await;
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn test_total_budget_caps_a_pass() {
        let mut strategy = make_strategy(dec!(0.002), dec!(0.0001), dec!(0.55));
        strategy.cfg.max_total_notional = dec!(500);
        strategy.cfg.max_notional_per_trade = dec!(500);
        strategy.cfg.max_notional_per_market = dec!(500);
        strategy.cfg.trade_cooldown_secs = 0;
        let markets = [market("m1", now()), market("m2", now()), market("m3", now())];
        let orders = strategy.generate_orders(&markets, now()).await;
        assert_eq!(orders.len(), 1);
        let total: Decimal = orders.iter().map(|o| o.notional).sum();
        assert!(total <= dec!(500));
    }

    #[tokio::test]
    async fn test_expiry_window_filters() {
        let mut strategy = make_strategy(dec!(0.002), dec!(0.0001), dec!(0.55));
        let mut expiring = market("m1", now());
        expiring.end_time = now() + Duration::minutes(1);
        let mut distant = market("m2", now());
        distant.end_time = now() + Duration::minutes(300);
        let orders = strategy.generate_orders(&[expiring, distant], now()).await;
        assert!(orders.is_empty());
    }
}
