//! Fire-and-forget operator notifications
//!
//! Notification failures are logged and swallowed; they never affect the
//! trading loop.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::config::NotifyConfig;
use crate::net;

const SEND_ATTEMPTS: u32 = 2;

/// Text notification sink
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, text: &str);
}

/// No-op sink used when no webhook is configured
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send_text(&self, _text: &str) {}
}

/// Webhook sink posting Feishu-style text payloads
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(cfg: &NotifyConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: net::build_client(net::DEFAULT_TIMEOUT)?,
            url: cfg.webhook_url.clone(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_text(&self, text: &str) {
        let payload = json!({
            "msg_type": "text",
            "content": { "text": text },
        });
        for attempt in 0..SEND_ATTEMPTS {
            match self.client.post(&self.url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => return,
                Ok(resp) => {
                    tracing::warn!(status = %resp.status(), attempt, "notification rejected");
                }
                Err(err) => {
                    tracing::warn!(error = %err, attempt, "notification send failed");
                }
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }
}

/// Build the configured sink: a webhook when a URL is set, otherwise a no-op.
pub fn from_config(cfg: &NotifyConfig) -> anyhow::Result<Box<dyn Notifier>> {
    if cfg.webhook_url.trim().is_empty() {
        Ok(Box::new(NullNotifier))
    } else {
        Ok(Box::new(WebhookNotifier::new(cfg)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_notifier_is_silent() {
        NullNotifier.send_text("ignored").await;
    }

    #[test]
    fn test_from_config_picks_sink() {
        let empty = NotifyConfig::default();
        assert!(from_config(&empty).is_ok());

        let configured = NotifyConfig {
            webhook_url: "https://example.com/hook".to_string(),
        };
        assert!(from_config(&configured).is_ok());
    }
}
