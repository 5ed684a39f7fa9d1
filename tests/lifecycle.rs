//! End-to-end order lifecycle: plan, submit, settle, and the idempotent
//! resubmission guard, all against the paper engine.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use poly_updown::config::{Config, LedgerConfig, StateConfig};
use poly_updown::execution::{OrderRequest, OrderType, PaperEngine};
use poly_updown::feed::{PriceWindow, ReferenceFeed};
use poly_updown::ledger::PaperLedger;
use poly_updown::manager::OrderManager;
use poly_updown::market::{DataApiClient, Outcome};
use poly_updown::net::ApiError;
use poly_updown::notify::NullNotifier;
use poly_updown::risk::PerformanceTracker;
use poly_updown::state::JsonStateStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::RwLock;

struct UpFeed;

#[async_trait]
impl ReferenceFeed for UpFeed {
    async fn realized_window(
        &self,
        _asset: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Option<PriceWindow>, ApiError> {
        Ok(Some(PriceWindow {
            open: dec!(100),
            close: dec!(101),
            change_pct: dec!(0.01),
            volatility: Decimal::ZERO,
            closes: vec![dec!(100), dec!(101)],
        }))
    }

    async fn spot_price(&self, _symbol: &str) -> Result<Option<Decimal>, ApiError> {
        Ok(None)
    }

    fn has_symbol(&self, _asset: &str) -> bool {
        true
    }
}

fn test_config(dir: &tempfile::TempDir) -> Config {
    let mut cfg: Config = toml::from_str("mode = \"paper\"").unwrap();
    cfg.state = StateConfig {
        path: dir.path().join("state.json"),
        max_age_hours: 48,
    };
    cfg.ledger = LedgerConfig {
        paper_trades_path: dir.path().join("paper_trades.json"),
        paper_stats_path: dir.path().join("paper_stats.json"),
        live_trades_path: dir.path().join("live_trades.json"),
        live_stats_path: dir.path().join("live_stats.json"),
        max_records: 100,
    };
    cfg.strategy.child_order_spacing_ms = 0;
    cfg.strategy.poll_order_status_secs = 0;
    cfg.exposure.max_total_fraction = dec!(1);
    cfg
}

fn build_manager(cfg: Config, engine: Arc<PaperEngine>) -> OrderManager {
    let data_api = DataApiClient::new(&cfg.polymarket).unwrap();
    let store = JsonStateStore::new(&cfg.state);
    let paper_ledger = PaperLedger::new(&cfg.ledger, cfg.paper.initial_cash).unwrap();
    let performance = Arc::new(RwLock::new(PerformanceTracker::new(
        cfg.strategy.max_consecutive_losses,
    )));
    OrderManager::new(
        cfg,
        engine,
        data_api,
        Arc::new(UpFeed),
        store,
        Some(paper_ledger),
        None,
        Arc::new(NullNotifier),
        performance,
        None,
    )
}

fn up_intent(end_time: DateTime<Utc>) -> OrderRequest {
    let notional = dec!(3);
    let price = dec!(0.5);
    OrderRequest {
        market_slug: "btc-updown-15m-1787500800".to_string(),
        asset_symbol: "BTC".to_string(),
        outcome: Outcome::Up,
        token_id: "111".to_string(),
        price,
        size: notional / price,
        notional,
        start_time: Utc::now() - Duration::minutes(5),
        end_time,
        order_type: OrderType::Fok,
    }
}

#[tokio::test]
async fn test_full_lifecycle_submit_then_settle() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(PaperEngine::new());
    let mut manager = build_manager(test_config(&dir), engine.clone());
    manager.load().unwrap();

    // Expires one second from now so the settlement pass can run for real
    let order = up_intent(Utc::now() + Duration::seconds(1));
    let results = manager.submit_with_risk(&order).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].success);
    assert_eq!(engine.submitted().await.len(), 1);

    // The guard holds while the order is in flight
    assert!(manager.submit_with_risk(&order).await.unwrap().is_empty());
    assert_eq!(engine.submitted().await.len(), 1);

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;
    manager.poll_status().await.unwrap();

    // The reference window moved up and the bet was Up: payout = size 6,
    // pnl = 6 - 3 - fee 0.03 = 2.97, cash = 10 - 3.03 + 6
    let state_path = dir.path().join("state.json");
    let state: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
    let record = state["orders"].as_object().unwrap().values().next().unwrap();
    assert_eq!(record["status"], "settled");
    assert_eq!(record["result"], "win");
    let paper = &state["paper"];
    assert_eq!(paper["cash"], serde_json::json!("12.97"));
    assert_eq!(paper["wins"], serde_json::json!(1));

    // A settled key still blocks resubmission
    assert!(manager.submit_with_risk(&order).await.unwrap().is_empty());
    assert_eq!(engine.submitted().await.len(), 1);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(PaperEngine::new());
    let cfg = test_config(&dir);
    let order = up_intent(Utc::now() + Duration::minutes(30));

    {
        let mut manager = build_manager(cfg.clone(), engine.clone());
        manager.load().unwrap();
        assert_eq!(manager.submit_with_risk(&order).await.unwrap().len(), 1);
    }

    // A fresh manager over the same state file still honors the guard
    let mut restarted = build_manager(cfg, engine.clone());
    restarted.load().unwrap();
    assert!(restarted.submit_with_risk(&order).await.unwrap().is_empty());
    assert_eq!(engine.submitted().await.len(), 1);
}
