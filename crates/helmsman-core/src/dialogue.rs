//! Thin client for the dialogue service's REST channel.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{HelmsmanError, Result};

const STATUS_TIMEOUT: Duration = Duration::from_secs(4);
const MESSAGE_TIMEOUT: Duration = Duration::from_secs(15);
const EVENT_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_DELAY: Duration = Duration::from_millis(600);
const MESSAGE_ATTEMPTS: u32 = 2;

/// One bot utterance as returned by the REST webhook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BotReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Human-readable line: text, then image, then custom payload, then raw JSON.
    pub fn render(&self) -> String {
        match (&self.text, &self.image, &self.custom) {
            (Some(t), _, _) if !t.is_empty() => t.clone(),
            (_, Some(img), _) => format!("[image] {img}"),
            (_, _, Some(custom)) => format!("[custom] {custom}"),
            _ => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

/// Fresh sender id so a new session starts with an empty tracker.
pub fn default_sender_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("helmsman-{}", &id[..8])
}

#[derive(Debug, Clone)]
pub struct DialogueClient {
    base_url: String,
    client: reqwest::Client,
}

impl DialogueClient {
    /// `base_url` is scheme, host and port, e.g. `http://localhost:5006`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn webhook_url(&self) -> String {
        format!("{}/webhooks/rest/webhook", self.base_url)
    }

    pub async fn status(&self) -> Result<Value> {
        let resp = self
            .client
            .get(format!("{}/status", self.base_url))
            .timeout(STATUS_TIMEOUT)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(HelmsmanError::Status(resp.status().as_u16()));
        }
        Ok(resp.json().await?)
    }

    /// Post `text` as `sender`. Retried once after a short pause.
    pub async fn send_message(&self, sender: &str, text: &str) -> Result<Vec<BotReply>> {
        let payload = json!({ "sender": sender, "message": text });
        let mut attempt = 1;
        loop {
            match self.post_message(&payload).await {
                Ok(replies) => return Ok(replies),
                Err(e) if attempt < MESSAGE_ATTEMPTS => {
                    warn!(attempt, "dialogue request failed, retrying: {e}");
                    attempt += 1;
                    sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_message(&self, payload: &Value) -> Result<Vec<BotReply>> {
        let resp = self
            .client
            .post(self.webhook_url())
            .json(payload)
            .timeout(MESSAGE_TIMEOUT)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(HelmsmanError::Status(resp.status().as_u16()));
        }
        let body: Value = resp.json().await?;
        debug!(?body, "webhook reply");
        Ok(match body {
            Value::Array(items) => items
                .into_iter()
                .map(|item| {
                    serde_json::from_value(item.clone())
                        .unwrap_or_else(|_| BotReply::text(item.to_string()))
                })
                .collect(),
            other => vec![BotReply::text(other.to_string())],
        })
    }

    /// `/conversations/{sender}/events`, with `sender` escaped as one segment.
    fn events_url(&self, sender: &str) -> Result<reqwest::Url> {
        let invalid =
            || HelmsmanError::Config(format!("invalid dialogue url '{}'", self.base_url));
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["conversations", sender, "events"]);
        Ok(url)
    }

    /// Reset the tracker for `sender`. True on 2xx.
    pub async fn restart_conversation(&self, sender: &str) -> Result<bool> {
        let resp = self
            .client
            .post(self.events_url(sender)?)
            .json(&json!({ "event": "restart" }))
            .timeout(EVENT_TIMEOUT)
            .send()
            .await?;
        Ok(resp.status().is_success())
    }
}
