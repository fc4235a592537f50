//! The LLM gateway: a single bounded door between the room executor and
//! whatever model backs a given run.

pub mod protocol;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::{ApiError, ApiResult};
use crate::models::{LlmUsage, ProviderHints};

/// One chat completion call's worth of parameters. Grouped into a struct
/// because almost every call site threads the same half-dozen provider hints
/// through unchanged.
#[derive(Debug, Clone, Default)]
pub struct LlmCallParams {
    pub model: String,
    pub prompt: String,
    pub max_tokens: Option<i64>,
    pub temperature: Option<f64>,
    pub hints: ProviderHints,
}

/// A single normalized chat call against whatever backs `model`. Every
/// provider-specific quirk (OpenAI vs. OpenAI-compatible vs. reasoning
/// models) lives behind this one method.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn call(&self, params: LlmCallParams) -> ApiResult<(String, Option<LlmUsage>)>;
}

/// `reqwest`-backed implementation speaking the OpenAI chat-completions wire
/// format, which is what every common self-hosted and hosted OpenAI-compatible
/// server implements. `api_base` selects where the call lands; without one we
/// fall back to the public OpenAI API and expect `OPENAI_API_KEY` in the
/// environment.
pub struct HttpLlmGateway {
    client: reqwest::Client,
    semaphore: Arc<Semaphore>,
    default_api_base: String,
}

impl HttpLlmGateway {
    pub fn new(max_concurrent_calls: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build LLM HTTP client");

        HttpLlmGateway {
            client,
            semaphore: Arc::new(Semaphore::new(max_concurrent_calls.max(1))),
            default_api_base: "https://api.openai.com/v1".to_string(),
        }
    }
}

#[async_trait]
impl LlmGateway for HttpLlmGateway {
    async fn call(&self, params: LlmCallParams) -> ApiResult<(String, Option<LlmUsage>)> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ApiError::Invariant("LLM concurrency gate closed".to_string()))?;

        let model = params.model.trim();
        if model.is_empty() {
            return Err(ApiError::BadInput("Missing model".to_string()));
        }

        // Strip a `provider:` prefix (`openai:gpt-4o`, `openai-responses:gpt-5`):
        // only the bare model name is meaningful to an OpenAI-compatible
        // chat-completions endpoint.
        let model_name = model.rsplit_once(':').map(|(_, rest)| rest).unwrap_or(model);

        let api_base = params
            .hints
            .api_base
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.default_api_base);

        let mut body = serde_json::json!({
            "model": model_name,
            "messages": [{"role": "user", "content": params.prompt}],
        });

        if let Some(max_tokens) = params.max_tokens.filter(|v| *v > 0) {
            body["max_tokens"] = serde_json::Value::from(max_tokens);
        }
        if let Some(temperature) = params.temperature {
            body["temperature"] = serde_json::Value::from(temperature);
        }
        if let Some(effort) = params.hints.openai_reasoning_effort.as_deref().filter(|s| !s.trim().is_empty()) {
            body["reasoning_effort"] = serde_json::Value::from(effort);
        }

        let mut request = self.client.post(format!("{api_base}/chat/completions")).json(&body);
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| ApiError::UpstreamFetch(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::UpstreamFetch(format!("LLM call failed ({status}): {text}")));
        }

        let payload: serde_json::Value = response.json().await.map_err(|e| ApiError::UpstreamFetch(e.to_string()))?;

        let content = payload["choices"][0]["message"]["content"].as_str().unwrap_or_default().to_string();

        let usage = payload.get("usage").map(|usage| LlmUsage {
            prompt_tokens: usage.get("prompt_tokens").and_then(|v| v.as_i64()),
            completion_tokens: usage.get("completion_tokens").and_then(|v| v.as_i64()),
            total_tokens: usage.get("total_tokens").and_then(|v| v.as_i64()),
        });

        Ok((content, usage))
    }
}
