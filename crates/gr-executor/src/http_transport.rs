//! OpenAI-compatible chat completions transport.
//!
//! The tier half of an endpoint selects the model, the slot half selects the
//! API key. Keys are read from the environment variables named in config and
//! never logged.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gr_config::RouterConfig;
use gr_core::EndpointId;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::transport::{BackendRequest, Transport, TransportError};

pub struct HttpTransport {
    base_url: String,
    json_mode: bool,
    models: HashMap<String, String>,
    keys: HashMap<u32, String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut slots: Vec<&u32> = self.keys.keys().collect();
        slots.sort();
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("json_mode", &self.json_mode)
            .field("models", &self.models)
            .field("slots_with_keys", &slots)
            .finish()
    }
}

impl HttpTransport {
    /// Build from config, resolving each credential slot's key from its env var.
    ///
    /// Slots whose variable is unset are kept out of the key table; calls to
    /// them fail with [`TransportError::MissingCredential`].
    pub fn from_config(config: &RouterConfig) -> Result<Self> {
        let mut keys = HashMap::new();
        for credential in &config.credentials {
            match std::env::var(&credential.api_key_env) {
                Ok(key) if !key.trim().is_empty() => {
                    keys.insert(credential.slot, key.trim().to_string());
                }
                _ => warn!(
                    slot = credential.slot,
                    env = %credential.api_key_env,
                    "credential env var not set; slot will be rejected"
                ),
            }
        }
        if keys.is_empty() {
            let names: Vec<&str> = config
                .credentials
                .iter()
                .map(|c| c.api_key_env.as_str())
                .collect();
            bail!("No API key found. Set at least one of: {}", names.join(", "));
        }
        Self::with_keys(config, keys)
    }

    /// Build from config with explicit keys per slot.
    pub fn with_keys(config: &RouterConfig, keys: HashMap<u32, String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        let models = config
            .tiers
            .iter()
            .map(|(name, tier)| (name.clone(), tier.model.clone()))
            .collect();
        Ok(Self {
            base_url: config.backend.base_url.trim_end_matches('/').to_string(),
            json_mode: config.backend.json_mode,
            models,
            keys,
            client,
        })
    }

    fn request_body(&self, model: &str, request: &BackendRequest) -> Value {
        let instruction = match &request.system {
            Some(system) => format!("{}\n\n{}", system, request.shape.describe()),
            None => request.shape.describe(),
        };
        let mut messages = vec![json!({"role": "system", "content": instruction})];
        messages.extend(
            request
                .turns
                .iter()
                .map(|turn| json!({"role": turn.role.as_str(), "content": turn.content})),
        );

        let mut body = json!({
            "model": model,
            "messages": messages,
            "temperature": 0.1
        });
        if self.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        endpoint: &EndpointId,
        request: &BackendRequest,
        cancel: &CancellationToken,
    ) -> Result<String, TransportError> {
        let model = self
            .models
            .get(&endpoint.tier)
            .ok_or_else(|| TransportError::Other(format!("unknown tier '{}'", endpoint.tier)))?;
        let key = self
            .keys
            .get(&endpoint.slot)
            .ok_or(TransportError::MissingCredential(endpoint.slot))?;

        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(model, request);
        let call = async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(key)
                .json(&body)
                .send()
                .await?;
            let status = response.status();
            let headers = response.headers().clone();
            let text = response.text().await?;
            Ok::<_, TransportError>((status, headers, text))
        };

        let (status, headers, text) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            result = call => result?,
        };

        if !status.is_success() {
            if let Some(retry_after) = parse_retry_after(&headers) {
                debug!(
                    tier = %endpoint.tier,
                    slot = endpoint.slot,
                    status = status.as_u16(),
                    retry_after_secs = retry_after.as_secs(),
                    "backend sent Retry-After"
                );
            }
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_completion_content(&text)
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let retry_at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let seconds = (retry_at - Utc::now()).num_seconds().max(0) as u64;
    Some(Duration::from_secs(seconds))
}

fn parse_completion_content(body: &str) -> Result<String, TransportError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| TransportError::InvalidEnvelope(format!("not JSON: {e}")))?;
    value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            TransportError::InvalidEnvelope("missing choices[0].message.content".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gr_core::Turn;
    use gr_session::{ExpectedShape, FieldKind};
    use mockito::{Matcher, Server};
    use reqwest::header::HeaderValue;

    fn config_for(base_url: &str) -> RouterConfig {
        let mut config = RouterConfig::default();
        config.backend.base_url = format!("{base_url}/");
        config
    }

    fn keys() -> HashMap<u32, String> {
        HashMap::from([(1, "key-one".to_string()), (2, "key-two".to_string())])
    }

    fn request() -> BackendRequest {
        BackendRequest {
            system: Some("You book tables.".to_string()),
            turns: vec![Turn::user("table for two")],
            shape: ExpectedShape::new().field("reply", FieldKind::String),
        }
    }

    fn completion(content: &str) -> String {
        json!({
            "choices": [{
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_send_uses_tier_model_and_slot_key() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer key-two")
            .match_body(Matcher::PartialJson(json!({
                "model": "gemini-2.5-flash",
                "response_format": {"type": "json_object"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion(r#"{"reply":"done"}"#))
            .create_async()
            .await;

        let transport = HttpTransport::with_keys(&config_for(&server.url()), keys()).unwrap();
        let raw = transport
            .send(
                &EndpointId::new("balanced", 2),
                &request(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(raw, r#"{"reply":"done"}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_status_is_structured() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_header("retry-after", "30")
            .with_body(r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#)
            .create_async()
            .await;

        let transport = HttpTransport::with_keys(&config_for(&server.url()), keys()).unwrap();
        let err = transport
            .send(
                &EndpointId::new("reasoning", 1),
                &request(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Status { status: 429, .. }));
        assert_eq!(err.classify(), gr_core::ErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn test_missing_content_is_invalid_envelope() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let transport = HttpTransport::with_keys(&config_for(&server.url()), keys()).unwrap();
        let err = transport
            .send(
                &EndpointId::new("fast", 1),
                &request(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidEnvelope(_)));
    }

    #[tokio::test]
    async fn test_missing_credential_and_unknown_tier() {
        let transport = HttpTransport::with_keys(
            &config_for("http://127.0.0.1:9"),
            HashMap::from([(1, "only-one".to_string())]),
        )
        .unwrap();
        let cancel = CancellationToken::new();

        let err = transport
            .send(&EndpointId::new("fast", 2), &request(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::MissingCredential(2));

        let err = transport
            .send(&EndpointId::new("nope", 1), &request(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Other(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let transport =
            HttpTransport::with_keys(&config_for("http://127.0.0.1:9"), keys()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = transport
            .send(&EndpointId::new("fast", 1), &request(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Cancelled);
    }

    #[test]
    fn test_request_body_prepends_instruction() {
        let mut config = RouterConfig::default();
        config.backend.json_mode = false;
        let transport = HttpTransport::with_keys(&config, keys()).unwrap();
        let body = transport.request_body("m", &request());

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        let instruction = messages[0]["content"].as_str().unwrap();
        assert!(instruction.starts_with("You book tables."));
        assert!(instruction.contains("\"reply\": string"));
        assert_eq!(messages[1], json!({"role": "user", "content": "table for two"}));
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_retry_after_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(120)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), None);
    }
}
