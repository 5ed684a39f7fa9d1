//! Gamma API market discovery
//!
//! Hourly markets come from a per-asset series listing; 15-minute markets are
//! addressed directly by slug, one per 900-second epoch boundary inside the
//! discovery horizon.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::config::PolymarketConfig;
use crate::net::{self, ApiError};

use super::{MarketSource, UpDownMarket};

const M15_EPOCH_SECS: i64 = 15 * 60;

/// Gamma responses sometimes wrap a single document in a one-element array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::Many(v) => v.into_iter().next(),
            OneOrMany::One(v) => Some(v),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SeriesDoc {
    #[serde(default)]
    events: Vec<SeriesEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeriesEvent {
    slug: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventDetail {
    #[serde(default)]
    markets: Vec<GammaMarket>,
    title: Option<String>,
    neg_risk: Option<bool>,
    start_time: Option<String>,
    start_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    id: Option<serde_json::Value>,
    slug: Option<String>,
    question: Option<String>,
    title: Option<String>,
    end_date: Option<String>,
    event_slug: Option<String>,
    /// JSON-encoded array of outcome labels
    outcomes: Option<String>,
    /// JSON-encoded array of token ids, index-aligned with `outcomes`
    clob_token_ids: Option<String>,
    neg_risk: Option<bool>,
    event_start_time: Option<String>,
    start_time: Option<String>,
    start_date: Option<String>,
}

impl GammaMarket {
    fn id_string(&self) -> String {
        match &self.id {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(v) => v.to_string(),
            None => String::new(),
        }
    }

    /// Decode the string-encoded outcome/token-id arrays; `None` when either
    /// is absent, empty, or misaligned.
    fn decode_outcomes(&self) -> Option<(Vec<String>, Vec<String>)> {
        let outcomes: Vec<String> = serde_json::from_str(self.outcomes.as_deref()?).ok()?;
        let token_ids: Vec<String> = serde_json::from_str(self.clob_token_ids.as_deref()?).ok()?;
        if outcomes.is_empty() || outcomes.len() != token_ids.len() {
            return None;
        }
        Some((outcomes, token_ids))
    }
}

fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// First parseable timestamp from an ordered candidate list.
fn first_timestamp(candidates: &[&Option<String>]) -> Option<DateTime<Utc>> {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .find_map(parse_rfc3339)
}

/// Start time for a slug-addressed market: a trailing epoch number in the
/// slug wins, then the market's own start fields, then the expiry.
fn start_time_from_slug(slug: &str, market: &GammaMarket, end_time: DateTime<Utc>) -> DateTime<Utc> {
    if let Some(epoch) = slug.rsplit('-').next().and_then(|s| s.parse::<i64>().ok()) {
        if let Some(ts) = Utc.timestamp_opt(epoch, 0).single() {
            return ts;
        }
    }
    first_timestamp(&[
        &market.event_start_time,
        &market.start_time,
        &market.start_date,
    ])
    .unwrap_or(end_time)
}

fn start_time_from_event(
    market: &GammaMarket,
    event: &EventDetail,
    end_time: DateTime<Utc>,
) -> DateTime<Utc> {
    first_timestamp(&[&market.event_start_time, &market.start_time])
        .or_else(|| first_timestamp(&[&event.start_time, &event.start_date]))
        .unwrap_or(end_time)
}

/// Market discovery client for the Gamma REST API
pub struct GammaClient {
    client: Client,
    cfg: PolymarketConfig,
}

impl GammaClient {
    pub fn new(cfg: &PolymarketConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: net::build_client(net::DEFAULT_TIMEOUT)?,
            cfg: cfg.clone(),
        })
    }

    async fn get_event_by_slug(&self, slug: &str) -> Result<Option<EventDetail>, ApiError> {
        let url = format!("{}/events/slug/{}", self.cfg.gamma_base_url, slug);
        let doc: Option<OneOrMany<EventDetail>> =
            net::get_json(&self.client, &url, &[], net::DEFAULT_RETRIES).await?;
        Ok(doc.and_then(OneOrMany::into_first))
    }

    async fn get_market_by_slug(
        &self,
        slug: &str,
        asset: &str,
    ) -> Result<Option<UpDownMarket>, ApiError> {
        let url = format!("{}/markets", self.cfg.gamma_base_url);
        let query = [("slug", slug.to_string())];
        let doc: Option<OneOrMany<GammaMarket>> =
            net::get_json(&self.client, &url, &query, net::DEFAULT_RETRIES).await?;
        let market = match doc.and_then(OneOrMany::into_first) {
            Some(m) => m,
            None => return Ok(None),
        };
        let end_time = match market.end_date.as_deref().and_then(parse_rfc3339) {
            Some(t) => t,
            None => return Ok(None),
        };
        let (outcomes, token_ids) = match market.decode_outcomes() {
            Some(v) => v,
            None => return Ok(None),
        };
        let question = market
            .question
            .clone()
            .or_else(|| market.title.clone())
            .unwrap_or_else(|| slug.to_string());
        Ok(Some(UpDownMarket {
            asset_symbol: asset.to_string(),
            event_slug: market
                .event_slug
                .clone()
                .unwrap_or_else(|| slug.to_string()),
            market_id: market.id_string(),
            market_slug: market.slug.clone().unwrap_or_else(|| slug.to_string()),
            question,
            start_time: start_time_from_slug(slug, &market, end_time),
            end_time,
            outcomes,
            outcome_token_ids: token_ids,
            neg_risk: market.neg_risk.unwrap_or(false),
        }))
    }

    /// Hourly markets for `asset` whose expiry falls within the configured
    /// horizon, resolved through the per-asset series listing.
    pub async fn discover_hourly(
        &self,
        asset: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<UpDownMarket>, ApiError> {
        let series_slug = match self.cfg.hourly_series.get(asset) {
            Some(s) => s,
            None => return Ok(Vec::new()),
        };
        let url = format!("{}/series", self.cfg.gamma_base_url);
        let query = [("slug", series_slug.clone()), ("limit", "1".to_string())];
        let doc: Option<OneOrMany<SeriesDoc>> =
            net::get_json(&self.client, &url, &query, net::DEFAULT_RETRIES).await?;
        let series = match doc.and_then(OneOrMany::into_first) {
            Some(s) => s,
            None => return Ok(Vec::new()),
        };

        let mut result = Vec::new();
        for event in &series.events {
            let (slug, end_time) = match (
                event.slug.as_deref(),
                event.end_date.as_deref().and_then(parse_rfc3339),
            ) {
                (Some(slug), Some(end)) => (slug, end),
                _ => continue,
            };
            let minutes_left = (end_time - now).num_minutes();
            if minutes_left < 0 || minutes_left > self.cfg.hourly_horizon_minutes {
                continue;
            }
            let detail = match self.get_event_by_slug(slug).await? {
                Some(d) => d,
                None => continue,
            };
            for market in &detail.markets {
                let (outcomes, token_ids) = match market.decode_outcomes() {
                    Some(v) => v,
                    None => continue,
                };
                let question = market
                    .question
                    .clone()
                    .or_else(|| detail.title.clone())
                    .unwrap_or_default();
                result.push(UpDownMarket {
                    asset_symbol: asset.to_string(),
                    event_slug: slug.to_string(),
                    market_id: market.id_string(),
                    market_slug: market.slug.clone().unwrap_or_else(|| slug.to_string()),
                    question,
                    start_time: start_time_from_event(market, &detail, end_time),
                    end_time,
                    outcomes,
                    outcome_token_ids: token_ids,
                    neg_risk: market.neg_risk.or(detail.neg_risk).unwrap_or(false),
                });
            }
        }
        Ok(result)
    }

    /// 15-minute markets for `asset`: one slug per 900-second epoch boundary
    /// from the current epoch through the horizon; absent slugs are skipped.
    pub async fn discover_15m(
        &self,
        asset: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<UpDownMarket>, ApiError> {
        let prefix = match self.cfg.m15_prefixes.get(asset) {
            Some(p) => p,
            None => return Ok(Vec::new()),
        };
        let horizon_end = now.timestamp() + self.cfg.m15_horizon_minutes * 60;
        let mut epoch = (now.timestamp() / M15_EPOCH_SECS) * M15_EPOCH_SECS;
        let mut result = Vec::new();
        while epoch <= horizon_end {
            let slug = format!("{prefix}-{epoch}");
            if let Some(market) = self.get_market_by_slug(&slug, asset).await? {
                result.push(market);
            }
            epoch += M15_EPOCH_SECS;
        }
        Ok(result)
    }
}

#[async_trait]
impl MarketSource for GammaClient {
    async fn discover(&self, asset: &str, now: DateTime<Utc>) -> Result<Vec<UpDownMarket>, ApiError> {
        let mut markets = Vec::new();
        if self.cfg.enable_hourly {
            markets.extend(self.discover_hourly(asset, now).await?);
        }
        if self.cfg.enable_15m {
            markets.extend(self.discover_15m(asset, now).await?);
        }
        Ok(markets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_or_many_first() {
        let many: OneOrMany<i32> = serde_json::from_str("[7, 8]").unwrap();
        assert_eq!(many.into_first(), Some(7));
        let one: OneOrMany<i32> = serde_json::from_str("9").unwrap();
        assert_eq!(one.into_first(), Some(9));
        let empty: OneOrMany<i32> = serde_json::from_str("[]").unwrap();
        assert_eq!(empty.into_first(), None);
    }

    #[test]
    fn test_decode_outcomes_requires_alignment() {
        let market: GammaMarket = serde_json::from_str(
            r#"{
                "id": 123,
                "outcomes": "[\"Up\", \"Down\"]",
                "clobTokenIds": "[\"111\", \"222\"]"
            }"#,
        )
        .unwrap();
        let (outcomes, tokens) = market.decode_outcomes().unwrap();
        assert_eq!(outcomes, vec!["Up", "Down"]);
        assert_eq!(tokens, vec!["111", "222"]);
        assert_eq!(market.id_string(), "123");

        let misaligned: GammaMarket = serde_json::from_str(
            r#"{"outcomes": "[\"Up\", \"Down\"]", "clobTokenIds": "[\"111\"]"}"#,
        )
        .unwrap();
        assert!(misaligned.decode_outcomes().is_none());
    }

    #[test]
    fn test_start_time_prefers_slug_epoch() {
        let market: GammaMarket =
            serde_json::from_str(r#"{"startTime": "2026-08-28T18:00:00Z"}"#).unwrap();
        let end = parse_rfc3339("2026-08-28T19:00:00Z").unwrap();
        let start = start_time_from_slug("btc-updown-15m-1787500800", &market, end);
        assert_eq!(start.timestamp(), 1787500800);
    }

    #[test]
    fn test_start_time_falls_back_to_fields_then_end() {
        let market: GammaMarket =
            serde_json::from_str(r#"{"startTime": "2026-08-28T18:00:00Z"}"#).unwrap();
        let end = parse_rfc3339("2026-08-28T19:00:00Z").unwrap();
        let start = start_time_from_slug("btc-up-or-down-3pm-et", &market, end);
        assert_eq!(start, parse_rfc3339("2026-08-28T18:00:00Z").unwrap());

        let bare: GammaMarket = serde_json::from_str("{}").unwrap();
        assert_eq!(start_time_from_slug("no-epoch-here", &bare, end), end);
    }

    #[test]
    fn test_parse_rfc3339_handles_zulu() {
        let parsed = parse_rfc3339("2026-08-28T19:00:00Z").unwrap();
        assert_eq!(parsed.timestamp(), 1787943600);
        assert!(parse_rfc3339("not a date").is_none());
    }
}
