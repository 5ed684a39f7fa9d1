//! Fee estimation: trade fee rate plus an on-chain settlement cost estimate
//!
//! Gas price and native-token price are cached and refreshed on a cadence;
//! refresh failures keep the previous (or default) values.

use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

use crate::config::FeesConfig;
use crate::feed::ReferenceFeed;
use crate::net;

const DEFAULT_GAS_PRICE_GWEI: Decimal = dec!(50);
const DEFAULT_NATIVE_PRICE: Decimal = dec!(0.5);
const GWEI_PER_NATIVE: Decimal = dec!(1000000000);

/// Gas station fast-tier fee, in either the v2 object form or a bare number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FastTier {
    V2 {
        #[serde(rename = "maxFee")]
        max_fee: f64,
    },
    Flat(f64),
}

impl FastTier {
    fn gwei(&self) -> Option<Decimal> {
        let raw = match self {
            FastTier::V2 { max_fee } => *max_fee,
            FastTier::Flat(v) => *v,
        };
        Decimal::from_f64(raw).filter(|d| *d > Decimal::ZERO)
    }
}

#[derive(Debug, Deserialize)]
struct GasStationDoc {
    fast: Option<FastTier>,
}

pub struct FeeService {
    client: Client,
    cfg: FeesConfig,
    feed: Arc<dyn ReferenceFeed>,
    gas_price_gwei: Decimal,
    native_price: Decimal,
    last_refresh: Option<Instant>,
}

impl FeeService {
    pub fn new(cfg: &FeesConfig, feed: Arc<dyn ReferenceFeed>) -> anyhow::Result<Self> {
        Ok(Self {
            client: net::build_client(net::DEFAULT_TIMEOUT)?,
            cfg: cfg.clone(),
            feed,
            gas_price_gwei: DEFAULT_GAS_PRICE_GWEI,
            native_price: DEFAULT_NATIVE_PRICE,
            last_refresh: None,
        })
    }

    async fn refresh_if_stale(&mut self) {
        if let Some(last) = self.last_refresh {
            if last.elapsed().as_secs() < self.cfg.refresh_secs {
                return;
            }
        }
        match net::get_json::<GasStationDoc>(&self.client, &self.cfg.gas_station_url, &[], 0).await
        {
            Ok(Some(doc)) => {
                if let Some(gwei) = doc.fast.and_then(|f| f.gwei()) {
                    self.gas_price_gwei = gwei;
                }
            }
            Ok(None) => {}
            Err(err) => {
                tracing::debug!(error = %err, "gas price refresh failed, keeping cached value");
            }
        }
        match self.feed.spot_price(&self.cfg.native_symbol).await {
            Ok(Some(price)) if price > Decimal::ZERO => self.native_price = price,
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(error = %err, "native price refresh failed, keeping cached value");
            }
        }
        self.last_refresh = Some(Instant::now());
    }

    /// Fee rate on order notional (zero on the current CLOB).
    pub fn trade_fee_rate(&self) -> Decimal {
        self.cfg.trade_fee_rate
    }

    /// Estimated USD cost of the settlement redeem transaction.
    pub async fn settlement_fee_usd(&mut self) -> Decimal {
        self.refresh_if_stale().await;
        let gas_limit = Decimal::from(self.cfg.settlement_gas_limit);
        let fee_native = gas_limit * self.gas_price_gwei / GWEI_PER_NATIVE;
        fee_native * self.native_price
    }
}
