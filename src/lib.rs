//! Risk-managed order lifecycle engine for binary up/down prediction markets
//!
//! Detects short-horizon directional opportunities from lagged reference-asset
//! price moves, sizes them under capital and exposure limits, submits them
//! through a pluggable execution engine, and reconciles settlement against
//! realized reference prices. Order state is durable and idempotent across
//! crashes and restarts.

pub mod cli;
pub mod config;
pub mod execution;
pub mod feed;
pub mod fees;
pub mod ledger;
pub mod manager;
pub mod market;
pub mod net;
pub mod notify;
pub mod risk;
pub mod runner;
pub mod state;
pub mod strategy;
pub mod telemetry;
