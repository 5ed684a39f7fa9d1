//! JSON-backed state store with atomic writes
//!
//! Every save goes to a sibling temp file first and is renamed into place, so
//! a crash mid-write leaves the previous state intact.

use anyhow::Context;
use chrono::{Duration, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::StateConfig;

use super::{BotState, OrderRecord};

pub struct JsonStateStore {
    path: PathBuf,
    max_age: Duration,
    pub state: BotState,
}

impl JsonStateStore {
    pub fn new(cfg: &StateConfig) -> Self {
        Self {
            path: cfg.path.clone(),
            max_age: Duration::hours(cfg.max_age_hours),
            state: BotState::default(),
        }
    }

    #[cfg(test)]
    pub fn at(path: impl Into<PathBuf>, max_age_hours: i64) -> Self {
        Self {
            path: path.into(),
            max_age: Duration::hours(max_age_hours),
            state: BotState::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load state from disk; a missing file yields the default empty state.
    pub fn load(&mut self) -> anyhow::Result<()> {
        if !self.path.exists() {
            self.state = BotState::default();
            return Ok(());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading state file {}", self.path.display()))?;
        self.state = serde_json::from_str(&content)
            .with_context(|| format!("parsing state file {}", self.path.display()))?;
        Ok(())
    }

    /// Persist state atomically: write a temp file, then rename over the
    /// target.
    pub fn save(&self) -> anyhow::Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&self.state)?;
        fs::write(&tmp, content)
            .with_context(|| format!("writing temp state file {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming temp state file into {}", self.path.display()))?;
        Ok(())
    }

    /// Drop records whose `updated_at` is older than the configured max age.
    pub fn cleanup(&mut self) {
        let cutoff = Utc::now() - self.max_age;
        self.state.orders.retain(|_, record| record.updated_at >= cutoff);
    }

    pub fn get_order(&self, key: &str) -> Option<&OrderRecord> {
        self.state.orders.get(key)
    }

    pub fn insert_order(&mut self, record: OrderRecord) {
        self.state.orders.insert(record.key(), record);
    }

    /// Apply `patch` to the record under `key`, stamping `updated_at`.
    /// Returns false when the key is absent.
    pub fn update_order(&mut self, key: &str, patch: impl FnOnce(&mut OrderRecord)) -> bool {
        match self.state.orders.get_mut(key) {
            Some(record) => {
                patch(record);
                record.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Outcome;
    use crate::state::OrderStatus;
    use chrono::{DateTime, TimeZone};
    use rust_decimal_macros::dec;

    fn sample_record(slug: &str, updated_at: DateTime<chrono::Utc>) -> OrderRecord {
        OrderRecord {
            market_slug: slug.to_string(),
            outcome: Outcome::Up,
            token_id: "111".to_string(),
            asset_symbol: "BTC".to_string(),
            start_time: Utc.with_ymd_and_hms(2026, 8, 28, 19, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2026, 8, 28, 20, 0, 0).unwrap(),
            status: OrderStatus::Planned,
            order_ids: Vec::new(),
            total_notional: dec!(0),
            total_size: dec!(0),
            fee_paid: dec!(0),
            created_at: updated_at,
            updated_at,
            last_error: None,
            result: None,
            settled_at: None,
            pnl: None,
        }
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut store = JsonStateStore::at(&path, 48);
        store.insert_order(sample_record("btc-test", Utc::now()));
        store.save().unwrap();

        let mut reloaded = JsonStateStore::at(&path, 48);
        reloaded.load().unwrap();
        assert_eq!(reloaded.state.orders.len(), 1);
        let record = reloaded.state.orders.values().next().unwrap();
        assert_eq!(record.market_slug, "btc-test");
        assert_eq!(record.status, OrderStatus::Planned);
    }

    #[test]
    fn test_load_missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStateStore::at(dir.path().join("absent.json"), 48);
        store.load().unwrap();
        assert!(store.state.orders.is_empty());
    }

    #[test]
    fn test_crash_during_write_preserves_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut store = JsonStateStore::at(&path, 48);
        store.insert_order(sample_record("survivor", Utc::now()));
        store.save().unwrap();

        // Simulate a crash that left garbage in the temp file; the renamed
        // target must still hold the previous state.
        fs::write(path.with_extension("json.tmp"), b"{garbage").unwrap();
        let mut reloaded = JsonStateStore::at(&path, 48);
        reloaded.load().unwrap();
        assert!(reloaded.state.orders.values().any(|r| r.market_slug == "survivor"));
    }

    #[test]
    fn test_cleanup_drops_stale_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStateStore::at(dir.path().join("state.json"), 48);
        store.insert_order(sample_record("fresh", Utc::now()));
        store.insert_order(sample_record("stale", Utc::now() - Duration::hours(72)));
        store.cleanup();
        assert_eq!(store.state.orders.len(), 1);
        assert!(store.state.orders.values().any(|r| r.market_slug == "fresh"));
    }

    #[test]
    fn test_update_order_stamps_updated_at() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStateStore::at(dir.path().join("state.json"), 48);
        let record = sample_record("btc-test", Utc::now() - Duration::minutes(10));
        let key = record.key();
        store.insert_order(record);

        let before = store.get_order(&key).unwrap().updated_at;
        assert!(store.update_order(&key, |r| r.status = OrderStatus::Submitted));
        let after = store.get_order(&key).unwrap();
        assert_eq!(after.status, OrderStatus::Submitted);
        assert!(after.updated_at > before);

        assert!(!store.update_order("missing-key", |_| {}));
    }
}
