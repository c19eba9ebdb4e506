//! HTTP generation backend.

use super::backend::{BackendFailure, GenerationBackend, GenerationHints};
use crate::config::BackendConfig;
use crate::error_code::FailureClass;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use reqwest::Proxy;
use serde_json::{json, Value};
use tracing::{debug, warn};

const MAX_ERROR_BODY: usize = 256;

/// POSTs `{prompt, hints}` to a configured endpoint and classifies failures by status.
pub struct HttpGenerationBackend {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpGenerationBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let url = config.url.clone().ok_or_else(|| {
            Error::configuration_with_context(
                "generation backend url is not configured",
                ErrorContext::new()
                    .with_field_path("backend.url")
                    .with_source("http_backend"),
            )
        })?;

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(8);
        if let Some(proxy) = config.proxy_url.as_deref().and_then(proxy_from) {
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url,
            api_key: config.api_key.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn generate(
        &self,
        prompt: &str,
        hints: &GenerationHints,
    ) -> std::result::Result<Value, BackendFailure> {
        let mut req = self
            .client
            .post(&self.url)
            .json(&json!({ "prompt": prompt, "hints": hints }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(classify_send_error)?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %self.url, "generation backend responded");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendFailure::new(
                FailureClass::from_http_status(status.as_u16()),
                error_message(status.as_u16(), &body),
            )
            .with_status(status.as_u16()));
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                BackendFailure::new(FailureClass::Timeout, e.to_string())
            } else {
                BackendFailure::new(
                    FailureClass::ServerFault,
                    format!("malformed generation response: {}", e),
                )
            }
        })?;
        Ok(unwrap_plan(body))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// An unusable proxy URL is logged and skipped; requests then go direct.
fn proxy_from(url: &str) -> Option<Proxy> {
    match Proxy::all(url) {
        Ok(proxy) => Some(proxy),
        Err(e) => {
            warn!(proxy_url = url, error = %e, "ignoring invalid proxy url");
            None
        }
    }
}

fn classify_send_error(e: reqwest::Error) -> BackendFailure {
    let class = if e.is_timeout() {
        FailureClass::Timeout
    } else if e.is_connect() {
        FailureClass::ServerFault
    } else {
        FailureClass::Unknown
    };
    BackendFailure::new(class, e.to_string())
}

fn error_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error"))
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(MAX_ERROR_BODY).collect());
    if detail.trim().is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, detail.trim())
    }
}

/// Accepts either a bare plan or `{ "plan": ... }`.
fn unwrap_plan(body: Value) -> Value {
    match body {
        Value::Object(mut obj) if obj.get("plan").map_or(false, Value::is_object) => {
            obj.remove("plan").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_url_is_configuration_error() {
        let err = HttpGenerationBackend::new(&BackendConfig::default()).err().unwrap();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn error_message_prefers_structured_detail() {
        assert_eq!(
            error_message(429, r#"{"error":{"message":"slow down"}}"#),
            "HTTP 429: slow down"
        );
        assert_eq!(error_message(500, ""), "HTTP 500");
        assert_eq!(error_message(502, "bad gateway"), "HTTP 502: bad gateway");
    }

    #[test]
    fn invalid_proxy_is_skipped() {
        assert!(proxy_from("http://proxy.internal:3128").is_some());
        assert!(proxy_from("http://bad host:3128").is_none());

        let config = BackendConfig::default()
            .with_url("http://127.0.0.1:9/generate")
            .with_proxy_url("http://bad host:3128");
        assert!(HttpGenerationBackend::new(&config).is_ok());
    }

    #[test]
    fn unwraps_plan_envelope() {
        let inner = json!({"main": ["Squat"]});
        assert_eq!(unwrap_plan(json!({"plan": inner.clone()})), inner);
        assert_eq!(unwrap_plan(inner.clone()), inner);
    }

    #[tokio::test]
    async fn posts_prompt_and_hints_with_bearer_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/generate")
            .match_header("authorization", "Bearer test-key")
            .match_body(mockito::Matcher::PartialJson(json!({
                "hints": {"workoutType": "Legs", "experience": "beginner", "durationMinutes": 30}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"plan": {"main": [{"name": "Squat"}]}}"#)
            .create_async()
            .await;

        let backend = HttpGenerationBackend::new(
            &BackendConfig::default()
                .with_url(format!("{}/generate", server.url()))
                .with_api_key("test-key"),
        )
        .unwrap();
        let hints = GenerationHints {
            workout_type: "Legs".into(),
            experience: "beginner".into(),
            duration_minutes: 30,
        };
        let value = backend.generate("make a plan", &hints).await.unwrap();
        assert_eq!(value["main"][0]["name"], "Squat");
        mock.assert_async().await;
    }
}
