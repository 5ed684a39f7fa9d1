//! Reference price feed abstraction
//!
//! The strategy and settlement reconciler both consume realized price windows
//! over a market's lifetime from an external reference exchange.

pub mod binance;

pub use binance::BinanceClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::net::ApiError;

/// Realized open/close window over a time range, with volatility of the
/// intra-window closes.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceWindow {
    pub open: Decimal,
    pub close: Decimal,
    /// Fractional change: (close - open) / open
    pub change_pct: Decimal,
    /// Sample stdev of consecutive 1-minute log-returns
    pub volatility: Decimal,
    /// Closes of each kline in the window, oldest first
    pub closes: Vec<Decimal>,
}

/// Source of realized reference prices
#[async_trait]
pub trait ReferenceFeed: Send + Sync {
    /// Realized window over `[start, end]`, or `None` when the exchange has
    /// no klines for the range.
    async fn realized_window(
        &self,
        asset: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<PriceWindow>, ApiError>;

    /// Latest spot price for a raw exchange pair symbol.
    async fn spot_price(&self, symbol: &str) -> Result<Option<Decimal>, ApiError>;

    /// Whether this feed can serve the given asset symbol.
    fn has_symbol(&self, asset: &str) -> bool;
}

/// Sample standard deviation of consecutive log-returns over `closes`.
///
/// Returns zero when fewer than 3 closes are available or fewer than 2
/// log-returns are computable (non-positive prices are skipped). Uses the
/// n-1 (Bessel-corrected) estimator.
pub fn log_return_volatility(closes: &[Decimal]) -> Decimal {
    if closes.len() < 3 {
        return Decimal::ZERO;
    }
    let mut returns: Vec<f64> = Vec::with_capacity(closes.len() - 1);
    for pair in closes.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if prev <= Decimal::ZERO || next <= Decimal::ZERO {
            continue;
        }
        match (prev.to_f64(), next.to_f64()) {
            (Some(p), Some(n)) if p > 0.0 && n > 0.0 => returns.push((n / p).ln()),
            _ => continue,
        }
    }
    if returns.len() < 2 {
        return Decimal::ZERO;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Decimal::from_f64_retain(variance.sqrt()).unwrap_or(Decimal::ZERO)
}
