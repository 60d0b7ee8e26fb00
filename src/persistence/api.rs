use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::{SaveRequest, ScriptStore, ServerScript};
use crate::config::Config;
use crate::constants::api::TIMEOUT_SECS;
use crate::error::{Error, Result};
use crate::script::ScriptElement;
use crate::types::ScriptId;

/// Client for the script persistence service
///
/// Exposes the two endpoints an edit session needs: loading a script and
/// saving one batch of edits.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    token: String,
    client: Client,
}

/// The save endpoint returns either a bare list or a wrapped one.
#[derive(Deserialize)]
#[serde(untagged)]
enum SavedElements {
    Bare(Vec<ScriptElement>),
    Wrapped { elements: Vec<ScriptElement> },
}

impl ApiClient {
    /// Create a new client from config
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.api_url.clone(),
            token: config.api_token.clone(),
            client: Client::builder()
                .timeout(Duration::from_secs(TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Check if credentials are configured
    fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.token.is_empty()
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(Error::config(
                "Persistence service not configured",
                "Set SHOWFLOW_API_URL and SHOWFLOW_API_TOKEN environment variables",
            ))
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turns a non-2xx response into a save error, surfacing `detail` when
    /// the body carries one
    async fn check(resp: Response, path: &str) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let detail = resp
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| error_detail(&body));
        let message = match detail {
            Some(detail) => format!("Request to {path} returned {status}: {detail}"),
            None => format!("Request to {path} returned {status}"),
        };
        Err(Error::save_status(message, status.as_u16()))
    }
}

/// Extracts a readable message from a structured error body.
fn error_detail(body: &Value) -> Option<String> {
    match body.get("detail")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let messages: Vec<String> = items
                .iter()
                .map(|item| {
                    item.get("msg")
                        .and_then(Value::as_str)
                        .map_or_else(|| item.to_string(), str::to_string)
                })
                .collect();
            Some(messages.join("; "))
        }
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl ScriptStore for ApiClient {
    async fn load_script(&self, script_id: &ScriptId) -> Result<ServerScript> {
        self.ensure_configured()?;
        let path = format!("/scripts/{script_id}");
        let resp = self
            .client
            .get(self.url(&path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Request to {path} failed: {e}")))?;
        let resp = Self::check(resp, &path).await?;

        let mut script: ServerScript = resp
            .json()
            .await
            .map_err(|e| Error::parse(format!("Invalid script JSON from {path}: {e}"), None))?;
        if script.script_id.as_str().is_empty() {
            script.script_id = script_id.clone();
        }
        tracing::info!(
            script = %script_id,
            elements = script.elements.len(),
            "Loaded script from server"
        );
        Ok(script)
    }

    async fn save_batch(
        &self,
        script_id: &ScriptId,
        request: &SaveRequest,
    ) -> Result<Vec<ScriptElement>> {
        self.ensure_configured()?;
        let path = format!("/scripts/{script_id}/batch");
        let resp = self
            .client
            .post(self.url(&path))
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Request to {path} failed: {e}")))?;
        let resp = Self::check(resp, &path).await?;

        let saved: SavedElements = resp
            .json()
            .await
            .map_err(|e| Error::parse(format!("Invalid save response from {path}: {e}"), None))?;
        Ok(match saved {
            SavedElements::Bare(elements) | SavedElements::Wrapped { elements } => elements,
        })
    }
}
