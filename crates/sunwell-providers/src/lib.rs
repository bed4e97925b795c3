//! Model Provider: the one seam where the execution core calls out to
//! an LLM. Every engine that needs a completion (planner candidate
//! generation, specialist reasoning, convergence fix proposals) goes
//! through a `Provider`, never a raw HTTP client.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub url: Option<String>,
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    pub default_provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    pub default_model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Per-call sampling knobs. Planner candidate generation sets
/// `temperature` to a different value per candidate so a batch of N
/// completions samples genuinely different continuations rather than
/// replaying the same most-likely one N times.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub seed: Option<u64>,
}

impl CompletionOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        Self { temperature: Some(temperature), seed: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn info(&self) -> ProviderInfo;

    async fn complete(
        &self,
        messages: &[ChatMessage],
        model_override: Option<&str>,
        options: Option<CompletionOptions>,
    ) -> anyhow::Result<Completion>;
}

/// Deterministic provider used by tests and dry runs: echoes back a
/// canned response so planner/spawner/convergence logic can be
/// exercised without network access.
pub struct MockProvider {
    id: String,
    response: String,
}

impl MockProvider {
    pub fn new(id: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            response: response.into(),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: self.id.clone(),
            default_model: None,
        }
    }

    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _model_override: Option<&str>,
        _options: Option<CompletionOptions>,
    ) -> anyhow::Result<Completion> {
        Ok(Completion {
            text: self.response.clone(),
            usage: TokenUsage::default(),
        })
    }
}

/// Talks to an OpenAI-compatible chat completions endpoint. Works for
/// any provider that speaks that wire format (OpenAI, most local
/// inference servers, several hosted aggregators).
pub struct HttpProvider {
    id: String,
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    default_model: String,
}

impl HttpProvider {
    pub fn new(id: impl Into<String>, config: ProviderConfig) -> Self {
        Self {
            id: id.into(),
            client: reqwest::Client::new(),
            url: config
                .url
                .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string()),
            api_key: config.api_key,
            default_model: config.default_model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
        }
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: self.id.clone(),
            default_model: Some(self.default_model.clone()),
        }
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        model_override: Option<&str>,
        options: Option<CompletionOptions>,
    ) -> anyhow::Result<Completion> {
        let model = model_override.unwrap_or(&self.default_model);
        let mut body = serde_json::json!({
            "model": model,
            "messages": messages.iter().map(|m| serde_json::json!({"role": m.role, "content": m.content})).collect::<Vec<_>>(),
        });
        if let Some(options) = options {
            if let Some(temperature) = options.temperature {
                body["temperature"] = serde_json::json!(temperature);
            }
            if let Some(seed) = options.seed {
                body["seed"] = serde_json::json!(seed);
            }
        }

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?.error_for_status()?;
        let payload: serde_json::Value = response.json().await?;

        let text = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        let usage = TokenUsage {
            prompt_tokens: payload["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
            completion_tokens: payload["usage"]["completion_tokens"].as_u64().unwrap_or(0),
            total_tokens: payload["usage"]["total_tokens"].as_u64().unwrap_or(0),
        };

        Ok(Completion { text, usage })
    }
}

#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Arc<RwLock<HashMap<String, Arc<dyn Provider>>>>,
    default_provider: Arc<RwLock<Option<String>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: Arc::new(RwLock::new(HashMap::new())),
            default_provider: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn register(&self, provider: Arc<dyn Provider>, make_default: bool) {
        let id = provider.info().id.clone();
        self.providers.write().await.insert(id.clone(), provider);
        if make_default {
            *self.default_provider.write().await = Some(id);
        }
    }

    pub async fn list(&self) -> Vec<ProviderInfo> {
        self.providers.read().await.values().map(|p| p.info()).collect()
    }

    pub async fn complete(
        &self,
        provider_id: Option<&str>,
        messages: &[ChatMessage],
        model_override: Option<&str>,
    ) -> anyhow::Result<Completion> {
        self.complete_with_options(provider_id, messages, model_override, None).await
    }

    pub async fn complete_with_options(
        &self,
        provider_id: Option<&str>,
        messages: &[ChatMessage],
        model_override: Option<&str>,
        options: Option<CompletionOptions>,
    ) -> anyhow::Result<Completion> {
        let provider = self.select(provider_id).await?;
        provider.complete(messages, model_override, options).await
    }

    async fn select(&self, provider_id: Option<&str>) -> anyhow::Result<Arc<dyn Provider>> {
        let providers = self.providers.read().await;
        let id = match provider_id {
            Some(id) => id.to_string(),
            None => self
                .default_provider
                .read()
                .await
                .clone()
                .ok_or_else(|| anyhow::anyhow!("no default provider configured"))?,
        };
        providers
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown provider: {id}"))
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_completes_through_the_default_provider() {
        let registry = ProviderRegistry::new();
        registry
            .register(Arc::new(MockProvider::new("mock", "42 tasks planned")), true)
            .await;

        let completion = registry
            .complete(None, &[ChatMessage { role: "user".into(), content: "plan this".into() }], None)
            .await
            .unwrap();
        assert_eq!(completion.text, "42 tasks planned");
    }

    #[tokio::test]
    async fn missing_default_provider_is_an_error() {
        let registry = ProviderRegistry::new();
        let result = registry.complete(None, &[], None).await;
        assert!(result.is_err());
    }
}
