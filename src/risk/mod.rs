//! Risk controls: child splitting, capital clamps, exposure caps, and the
//! per-asset loss circuit breaker

pub mod exposure;
pub mod sizing;

pub use exposure::{live_open_orders_notional, open_orders_notional, tiered_cap};
pub use sizing::{clamp_child, spendable_cash, split_children, ClampContext};

use std::collections::HashMap;

/// Per-asset settled-trade performance, feeding the circuit breaker.
///
/// In-memory only: a restart clears the streaks.
#[derive(Debug, Default)]
pub struct PerformanceTracker {
    consecutive_losses: HashMap<String, u32>,
    wins: HashMap<String, u64>,
    losses: HashMap<String, u64>,
    max_consecutive_losses: u32,
}

impl PerformanceTracker {
    pub fn new(max_consecutive_losses: u32) -> Self {
        Self {
            max_consecutive_losses,
            ..Default::default()
        }
    }

    pub fn record_result(&mut self, asset: &str, win: bool) {
        if win {
            *self.wins.entry(asset.to_string()).or_default() += 1;
            self.consecutive_losses.insert(asset.to_string(), 0);
        } else {
            *self.losses.entry(asset.to_string()).or_default() += 1;
            *self
                .consecutive_losses
                .entry(asset.to_string())
                .or_default() += 1;
        }
    }

    /// Whether new entries for `asset` are halted by the loss streak.
    pub fn is_halted(&self, asset: &str) -> bool {
        self.max_consecutive_losses > 0
            && self
                .consecutive_losses
                .get(asset)
                .is_some_and(|n| *n >= self.max_consecutive_losses)
    }

    pub fn consecutive_losses(&self, asset: &str) -> u32 {
        self.consecutive_losses.get(asset).copied().unwrap_or(0)
    }
}
