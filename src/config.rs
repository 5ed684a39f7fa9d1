//! Configuration types for poly-updown

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Trading mode: paper or live
    pub mode: Mode,
    /// Wallet address used for position/value queries (may be empty)
    #[serde(default)]
    pub wallet_address: String,
    /// Main loop poll interval in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub exposure: ExposureConfig,
    #[serde(default)]
    pub reference: ReferenceConfig,
    #[serde(default)]
    pub polymarket: PolymarketConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub fees: FeesConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_poll_interval_secs() -> u64 {
    5
}

/// Trading mode: simulated ledger or real account
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Paper,
    Live,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Paper => "paper",
            Mode::Live => "live",
        }
    }
}

/// Opportunity evaluation and order pacing configuration
///
/// All return/volatility thresholds are fractions (0.0008 = 0.08%).
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Static minimum absolute realized return to admit an opportunity
    #[serde(default = "default_min_abs_return")]
    pub min_abs_return: Decimal,
    /// Multiplier applied to realized volatility for the dynamic threshold
    #[serde(default = "default_volatility_mult")]
    pub volatility_mult: Decimal,
    /// Lower bound of the medium-confidence admission band
    #[serde(default = "default_medium_min_return")]
    pub medium_min_return: Decimal,
    /// Minimum return for the trend-continuation admission rule
    #[serde(default = "default_trend_min_return")]
    pub trend_min_return: Decimal,
    /// Reject entries priced above this best ask
    #[serde(default = "default_max_entry_price")]
    pub max_entry_price: Decimal,
    /// Estimated trade fee rate used in edge and spendable-cash math
    #[serde(default = "default_fee_estimate")]
    pub fee_estimate: Decimal,
    /// Minimum edge (1 - price - fee) to admit an opportunity
    #[serde(default = "default_min_edge")]
    pub min_edge: Decimal,
    /// Minimum minutes remaining to expiry
    #[serde(default = "default_min_time_to_end_minutes")]
    pub min_time_to_end_minutes: i64,
    /// Maximum minutes remaining to expiry
    #[serde(default = "default_max_time_to_end_minutes")]
    pub max_time_to_end_minutes: i64,
    /// Per-asset cooldown between trades, in seconds
    #[serde(default = "default_trade_cooldown_secs")]
    pub trade_cooldown_secs: u64,
    /// Maximum notional for a single intent
    #[serde(default = "default_max_notional_per_trade")]
    pub max_notional_per_trade: Decimal,
    /// Maximum notional per market
    #[serde(default = "default_max_notional_per_market")]
    pub max_notional_per_market: Decimal,
    /// Total notional budget across one evaluation pass
    #[serde(default = "default_max_total_notional")]
    pub max_total_notional: Decimal,
    /// Maximum notional per child order submission
    #[serde(default = "default_max_child_notional")]
    pub max_child_notional: Decimal,
    /// Pause between child order submissions, in milliseconds
    #[serde(default = "default_child_order_spacing_ms")]
    pub child_order_spacing_ms: u64,
    /// Minimum interval between settlement polls, in seconds
    #[serde(default = "default_poll_order_status_secs")]
    pub poll_order_status_secs: u64,
    /// Minimum interval between position snapshot refreshes, in seconds
    #[serde(default = "default_positions_refresh_secs")]
    pub positions_refresh_secs: u64,
    /// Consecutive settled losses per asset before new entries are halted
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u32,
}

fn default_min_abs_return() -> Decimal {
    dec!(0.0008)
}
fn default_volatility_mult() -> Decimal {
    dec!(2.0)
}
fn default_medium_min_return() -> Decimal {
    dec!(0.005)
}
fn default_trend_min_return() -> Decimal {
    dec!(0.003)
}
fn default_max_entry_price() -> Decimal {
    dec!(0.92)
}
fn default_fee_estimate() -> Decimal {
    dec!(0.01)
}
fn default_min_edge() -> Decimal {
    dec!(0.003)
}
fn default_min_time_to_end_minutes() -> i64 {
    2
}
fn default_max_time_to_end_minutes() -> i64 {
    90
}
fn default_trade_cooldown_secs() -> u64 {
    90
}
fn default_max_notional_per_trade() -> Decimal {
    dec!(500)
}
fn default_max_notional_per_market() -> Decimal {
    dec!(2000)
}
fn default_max_total_notional() -> Decimal {
    dec!(5000)
}
fn default_max_child_notional() -> Decimal {
    dec!(150)
}
fn default_child_order_spacing_ms() -> u64 {
    350
}
fn default_poll_order_status_secs() -> u64 {
    2
}
fn default_positions_refresh_secs() -> u64 {
    15
}
fn default_max_consecutive_losses() -> u32 {
    3
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            min_abs_return: default_min_abs_return(),
            volatility_mult: default_volatility_mult(),
            medium_min_return: default_medium_min_return(),
            trend_min_return: default_trend_min_return(),
            max_entry_price: default_max_entry_price(),
            fee_estimate: default_fee_estimate(),
            min_edge: default_min_edge(),
            min_time_to_end_minutes: default_min_time_to_end_minutes(),
            max_time_to_end_minutes: default_max_time_to_end_minutes(),
            trade_cooldown_secs: default_trade_cooldown_secs(),
            max_notional_per_trade: default_max_notional_per_trade(),
            max_notional_per_market: default_max_notional_per_market(),
            max_total_notional: default_max_total_notional(),
            max_child_notional: default_max_child_notional(),
            child_order_spacing_ms: default_child_order_spacing_ms(),
            poll_order_status_secs: default_poll_order_status_secs(),
            positions_refresh_secs: default_positions_refresh_secs(),
            max_consecutive_losses: default_max_consecutive_losses(),
        }
    }
}

/// Paper-mode capital rules
#[derive(Debug, Clone, Deserialize)]
pub struct PaperConfig {
    #[serde(default = "default_paper_initial_cash")]
    pub initial_cash: Decimal,
    /// Maximum fraction of spendable cash per trade
    #[serde(default = "default_paper_max_fraction_per_trade")]
    pub max_fraction_per_trade: Decimal,
    /// Maximum concurrently submitted orders
    #[serde(default = "default_paper_max_open_orders")]
    pub max_open_orders: usize,
    /// Children below this notional are dropped, not submitted
    #[serde(default = "default_min_notional")]
    pub min_notional: Decimal,
}

fn default_paper_initial_cash() -> Decimal {
    dec!(10)
}
fn default_paper_max_fraction_per_trade() -> Decimal {
    dec!(0.5)
}
fn default_paper_max_open_orders() -> usize {
    3
}
fn default_min_notional() -> Decimal {
    dec!(1)
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_cash: default_paper_initial_cash(),
            max_fraction_per_trade: default_paper_max_fraction_per_trade(),
            max_open_orders: default_paper_max_open_orders(),
            min_notional: default_min_notional(),
        }
    }
}

/// Live-mode capital rules (tiered on the rollover threshold)
#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    /// Cash seed used until the first balance refresh
    #[serde(default)]
    pub cash_usd: Decimal,
    /// Equity threshold separating the two sizing tiers
    #[serde(default = "default_roll_threshold_usd")]
    pub roll_threshold_usd: Decimal,
    /// Fixed per-trade cap while below the threshold
    #[serde(default = "default_max_notional_below_threshold")]
    pub max_notional_below_threshold: Decimal,
    /// Fraction-of-cash per-trade cap above the threshold
    #[serde(default = "default_max_fraction_above_threshold")]
    pub max_fraction_above_threshold: Decimal,
    #[serde(default = "default_min_notional")]
    pub min_notional: Decimal,
    /// Minimum interval between balance refreshes, in seconds
    #[serde(default = "default_balance_refresh_secs")]
    pub balance_refresh_secs: u64,
    /// Whether to refresh cash/value from the data API
    #[serde(default = "default_true")]
    pub enable_auto_balance: bool,
}

fn default_roll_threshold_usd() -> Decimal {
    dec!(10)
}
fn default_max_notional_below_threshold() -> Decimal {
    dec!(1)
}
fn default_max_fraction_above_threshold() -> Decimal {
    dec!(0.1)
}
fn default_balance_refresh_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            cash_usd: Decimal::ZERO,
            roll_threshold_usd: default_roll_threshold_usd(),
            max_notional_below_threshold: default_max_notional_below_threshold(),
            max_fraction_above_threshold: default_max_fraction_above_threshold(),
            min_notional: default_min_notional(),
            balance_refresh_secs: default_balance_refresh_secs(),
            enable_auto_balance: true,
        }
    }
}

/// Portfolio-level exposure cap
#[derive(Debug, Clone, Deserialize)]
pub struct ExposureConfig {
    /// Maximum total open notional as a fraction of estimated equity
    #[serde(default = "default_max_total_fraction")]
    pub max_total_fraction: Decimal,
}

fn default_max_total_fraction() -> Decimal {
    dec!(0.1)
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            max_total_fraction: default_max_total_fraction(),
        }
    }
}

/// Reference price feed (Binance REST)
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceConfig {
    #[serde(default = "default_reference_base_url")]
    pub base_url: String,
    /// Asset symbol -> exchange pair symbol
    #[serde(default = "default_symbol_map")]
    pub symbol_map: HashMap<String, String>,
}

fn default_reference_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_symbol_map() -> HashMap<String, String> {
    [
        ("BTC", "BTCUSDT"),
        ("ETH", "ETHUSDT"),
        ("XRP", "XRPUSDT"),
        ("SOL", "SOLUSDT"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_reference_base_url(),
            symbol_map: default_symbol_map(),
        }
    }
}

/// Polymarket API endpoints and market discovery settings
#[derive(Debug, Clone, Deserialize)]
pub struct PolymarketConfig {
    #[serde(default = "default_gamma_base_url")]
    pub gamma_base_url: String,
    #[serde(default = "default_data_api_base_url")]
    pub data_api_base_url: String,
    #[serde(default = "default_clob_base_url")]
    pub clob_base_url: String,
    /// Asset symbol -> hourly series slug
    #[serde(default = "default_hourly_series")]
    pub hourly_series: HashMap<String, String>,
    /// Asset symbol -> 15-minute market slug prefix
    #[serde(default = "default_m15_prefixes")]
    pub m15_prefixes: HashMap<String, String>,
    #[serde(default = "default_true")]
    pub enable_hourly: bool,
    #[serde(default = "default_true")]
    pub enable_15m: bool,
    /// Discovery horizon for hourly markets, in minutes
    #[serde(default = "default_hourly_horizon_minutes")]
    pub hourly_horizon_minutes: i64,
    /// Discovery horizon for 15-minute markets, in minutes
    #[serde(default = "default_m15_horizon_minutes")]
    pub m15_horizon_minutes: i64,
    /// Wall-clock deadline for one asset's discovery pass, in seconds
    #[serde(default = "default_discovery_timeout_secs")]
    pub discovery_timeout_secs: u64,
    /// Concurrent discovery tasks
    #[serde(default = "default_discovery_concurrency")]
    pub discovery_concurrency: usize,
}

fn default_gamma_base_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}
fn default_data_api_base_url() -> String {
    "https://data-api.polymarket.com".to_string()
}
fn default_clob_base_url() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_hourly_series() -> HashMap<String, String> {
    [
        ("BTC", "btc-up-or-down-hourly"),
        ("ETH", "eth-up-or-down-hourly"),
        ("XRP", "xrp-up-or-down-hourly"),
        ("SOL", "sol-up-or-down-hourly"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_m15_prefixes() -> HashMap<String, String> {
    [
        ("BTC", "btc-updown-15m"),
        ("ETH", "eth-updown-15m"),
        ("XRP", "xrp-updown-15m"),
        ("SOL", "sol-updown-15m"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_hourly_horizon_minutes() -> i64 {
    120
}
fn default_m15_horizon_minutes() -> i64 {
    45
}
fn default_discovery_timeout_secs() -> u64 {
    10
}
fn default_discovery_concurrency() -> usize {
    4
}

impl Default for PolymarketConfig {
    fn default() -> Self {
        Self {
            gamma_base_url: default_gamma_base_url(),
            data_api_base_url: default_data_api_base_url(),
            clob_base_url: default_clob_base_url(),
            hourly_series: default_hourly_series(),
            m15_prefixes: default_m15_prefixes(),
            enable_hourly: true,
            enable_15m: true,
            hourly_horizon_minutes: default_hourly_horizon_minutes(),
            m15_horizon_minutes: default_m15_horizon_minutes(),
            discovery_timeout_secs: default_discovery_timeout_secs(),
            discovery_concurrency: default_discovery_concurrency(),
        }
    }
}

/// Durable order-state file
#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
    /// Records untouched for longer than this are pruned
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: i64,
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".bot_state.json")
}
fn default_max_age_hours() -> i64 {
    48
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
            max_age_hours: default_max_age_hours(),
        }
    }
}

/// Ledger file locations and caps
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_paper_trades_path")]
    pub paper_trades_path: PathBuf,
    #[serde(default = "default_paper_stats_path")]
    pub paper_stats_path: PathBuf,
    #[serde(default = "default_live_trades_path")]
    pub live_trades_path: PathBuf,
    #[serde(default = "default_live_stats_path")]
    pub live_stats_path: PathBuf,
    /// Oldest trade entries are dropped beyond this count
    #[serde(default = "default_ledger_max_records")]
    pub max_records: usize,
}

fn default_paper_trades_path() -> PathBuf {
    PathBuf::from(".paper_trades.json")
}
fn default_paper_stats_path() -> PathBuf {
    PathBuf::from(".paper_stats.json")
}
fn default_live_trades_path() -> PathBuf {
    PathBuf::from(".live_trades.json")
}
fn default_live_stats_path() -> PathBuf {
    PathBuf::from(".live_stats.json")
}
fn default_ledger_max_records() -> usize {
    5000
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            paper_trades_path: default_paper_trades_path(),
            paper_stats_path: default_paper_stats_path(),
            live_trades_path: default_live_trades_path(),
            live_stats_path: default_live_stats_path(),
            max_records: default_ledger_max_records(),
        }
    }
}

/// Settlement fee estimation
#[derive(Debug, Clone, Deserialize)]
pub struct FeesConfig {
    /// Trade fee rate (Polymarket CLOB is currently zero)
    #[serde(default)]
    pub trade_fee_rate: Decimal,
    #[serde(default = "default_gas_station_url")]
    pub gas_station_url: String,
    /// Gas limit assumed for a settlement redeem transaction
    #[serde(default = "default_settlement_gas_limit")]
    pub settlement_gas_limit: u64,
    /// Exchange pair used to price the chain's native token
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
    /// Minimum interval between fee cache refreshes, in seconds
    #[serde(default = "default_fee_refresh_secs")]
    pub refresh_secs: u64,
}

fn default_gas_station_url() -> String {
    "https://gasstation.polygon.technology/v2".to_string()
}
fn default_settlement_gas_limit() -> u64 {
    200_000
}
fn default_native_symbol() -> String {
    "MATICUSDT".to_string()
}
fn default_fee_refresh_secs() -> u64 {
    60
}

impl Default for FeesConfig {
    fn default() -> Self {
        Self {
            trade_fee_rate: Decimal::ZERO,
            gas_station_url: default_gas_station_url(),
            settlement_gas_limit: default_settlement_gas_limit(),
            native_symbol: default_native_symbol(),
            refresh_secs: default_fee_refresh_secs(),
        }
    }
}

/// Webhook notification sink
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotifyConfig {
    /// Empty disables notifications
    #[serde(default)]
    pub webhook_url: String,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
