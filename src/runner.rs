//! Top-level trading loop: discover, evaluate, submit, reconcile

use anyhow::Context;
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;

use crate::config::{Config, Mode};
use crate::execution::{ExecutionEngine, PaperEngine};
use crate::feed::{BinanceClient, ReferenceFeed};
use crate::fees::FeeService;
use crate::ledger::{LiveLedger, PaperLedger};
use crate::manager::OrderManager;
use crate::market::{BestAskSource, ClobClient, DataApiClient, GammaClient, MarketSource, UpDownMarket};
use crate::notify::{self, Notifier};
use crate::risk::PerformanceTracker;
use crate::state::JsonStateStore;
use crate::strategy::LagStrategy;

const CYCLE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Run the loop with the mode's default engine. Live mode has no built-in
/// transport; it must come through [`run_with_engine`].
pub async fn run(cfg: Config, once: bool) -> anyhow::Result<()> {
    match cfg.mode {
        Mode::Paper => run_with_engine(cfg, Arc::new(PaperEngine::new()), once).await,
        Mode::Live => anyhow::bail!(
            "live mode needs an injected signed execution engine; none is built in"
        ),
    }
}

/// Run the loop against the given execution transport.
pub async fn run_with_engine(
    cfg: Config,
    engine: Arc<dyn ExecutionEngine>,
    once: bool,
) -> anyhow::Result<()> {
    let feed: Arc<dyn ReferenceFeed> =
        Arc::new(BinanceClient::new(&cfg.reference).context("building reference feed")?);
    let gamma = Arc::new(GammaClient::new(&cfg.polymarket).context("building gamma client")?);
    let book: Arc<dyn BestAskSource> =
        Arc::new(ClobClient::new(&cfg.polymarket).context("building clob client")?);
    let data_api = DataApiClient::new(&cfg.polymarket).context("building data api client")?;
    let notifier: Arc<dyn Notifier> = Arc::from(notify::from_config(&cfg.notify)?);

    let performance = Arc::new(RwLock::new(PerformanceTracker::new(
        cfg.strategy.max_consecutive_losses,
    )));
    let mut strategy = LagStrategy::new(
        cfg.strategy.clone(),
        feed.clone(),
        book,
        performance.clone(),
    );

    let store = JsonStateStore::new(&cfg.state);
    let (paper_ledger, live_ledger) = match cfg.mode {
        Mode::Paper => (
            Some(PaperLedger::new(&cfg.ledger, cfg.paper.initial_cash)?),
            None,
        ),
        Mode::Live => (None, Some(LiveLedger::new(&cfg.ledger)?)),
    };
    let fees = FeeService::new(&cfg.fees, feed.clone())?;
    let mut manager = OrderManager::new(
        cfg.clone(),
        engine.clone(),
        data_api,
        feed,
        store,
        paper_ledger,
        live_ledger,
        notifier.clone(),
        performance,
        Some(fees),
    );
    manager.load()?;

    tracing::info!(mode = cfg.mode.as_str(), engine = engine.mode_name(), "starting");
    notifier
        .send_text(&format!(
            "Bot started\nmode: {}\nengine: {}",
            cfg.mode.as_str(),
            engine.mode_name()
        ))
        .await;

    loop {
        if let Err(err) = run_cycle(&cfg, gamma.clone(), &mut strategy, &mut manager).await {
            if once {
                return Err(err);
            }
            tracing::error!(error = %err, "cycle failed");
            notifier.send_text(&format!("Cycle error: {err}")).await;
            tokio::time::sleep(CYCLE_ERROR_BACKOFF).await;
        }
        if once {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(cfg.poll_interval_secs)).await;
    }
}

async fn run_cycle(
    cfg: &Config,
    gamma: Arc<GammaClient>,
    strategy: &mut LagStrategy,
    manager: &mut OrderManager,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let markets = discover_markets(cfg, gamma).await;
    tracing::debug!(markets = markets.len(), "discovery finished");

    let orders = strategy.generate_orders(&markets, now).await;
    for order in &orders {
        manager.submit_with_risk(order).await?;
    }
    manager.poll_status().await?;
    Ok(())
}

/// Fan discovery out per asset on bounded concurrent tasks, each under a hard
/// wall-clock timeout. An asset that times out or errors simply contributes
/// nothing to this pass.
async fn discover_markets(cfg: &Config, gamma: Arc<GammaClient>) -> Vec<UpDownMarket> {
    let assets: BTreeSet<String> = cfg
        .polymarket
        .hourly_series
        .keys()
        .chain(cfg.polymarket.m15_prefixes.keys())
        .cloned()
        .collect();
    let deadline = Duration::from_secs(cfg.polymarket.discovery_timeout_secs);
    let now = Utc::now();

    let results: Vec<Vec<UpDownMarket>> = stream::iter(assets)
        .map(|asset| {
            let gamma = gamma.clone();
            async move {
                match timeout(deadline, gamma.discover(&asset, now)).await {
                    Ok(Ok(markets)) => markets,
                    Ok(Err(err)) => {
                        tracing::warn!(asset, error = %err, "discovery failed");
                        Vec::new()
                    }
                    Err(_) => {
                        tracing::warn!(asset, "discovery timed out");
                        Vec::new()
                    }
                }
            }
        })
        .buffer_unordered(cfg.polymarket.discovery_concurrency.max(1))
        .collect()
        .await;
    results.into_iter().flatten().collect()
}
