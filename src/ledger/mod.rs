//! Append-only trade ledgers with rolling stats
//!
//! Each ledger keeps two JSON files: a size-capped trade list and a rolling
//! stats document, both rewritten atomically.

pub mod live;
pub mod paper;

pub use live::LiveLedger;
pub use paper::PaperLedger;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Market cadence guessed from the slug, recorded on every paper trade.
pub(crate) fn guess_kind(market_slug: &str) -> &'static str {
    let s = market_slug.to_lowercase();
    if s.contains("15m") {
        "15m"
    } else if s.contains("hour") {
        "hourly"
    } else {
        "other"
    }
}

pub(crate) fn load_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(value))
}

/// Temp-write-then-rename, same crash-safety scheme as the state store.
pub(crate) fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let content = serde_json::to_string_pretty(value)?;
    fs::write(&tmp, content).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

/// Drop the oldest entries so at most `max` remain.
pub(crate) fn cap_records<T>(records: &mut Vec<T>, max: usize) {
    if records.len() > max {
        let drop = records.len() - max;
        records.drain(..drop);
    }
}
