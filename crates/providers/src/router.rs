//! Provider router: the generation dispatch step.
//!
//! Holds the allow-list of configured providers, resolves which provider and
//! model serve a request, shapes the prompt for that provider, and normalizes
//! the reply text.

use std::collections::HashMap;
use std::sync::Arc;

use ragbridge_config::{AppConfig, ModelFallback, ProviderKind};
use ragbridge_core::error::Error;
use ragbridge_core::prompt::PromptRequest;
use ragbridge_core::provider::{Provider, ProviderRequest};
use tracing::{debug, warn};

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::RetryingProvider;

/// Reply returned when the provider's envelope held no completion text.
pub const NO_REPLY_SENTINEL: &str = "No reply generated.";

/// A registered provider and the models callers may ask it for.
struct ProviderEntry {
    provider: Arc<dyn Provider>,
    default_model: String,
    /// Empty means any model is accepted.
    models: Vec<String>,
}

/// Routes generation requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, ProviderEntry>,
    default_provider: String,
    model_fallback: ModelFallback,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
            model_fallback: ModelFallback::Reject,
            temperature: 0.7,
            max_tokens: Some(150),
        }
    }

    pub fn with_model_fallback(mut self, policy: ModelFallback) -> Self {
        self.model_fallback = policy;
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Register a provider under `name` with its default model and allow-list.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn Provider>,
        default_model: impl Into<String>,
        models: Vec<String>,
    ) {
        self.providers.insert(
            name.into(),
            ProviderEntry {
                provider,
                default_model: default_model.into(),
                models,
            },
        );
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).map(|e| e.provider.clone())
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Default model and allow-list of a registered provider.
    pub fn models(&self, name: &str) -> Option<(&str, &[String])> {
        self.providers
            .get(name)
            .map(|e| (e.default_model.as_str(), e.models.as_slice()))
    }

    /// Resolve the provider and model for a request without calling anything.
    pub fn resolve(
        &self,
        provider_id: Option<&str>,
        model: Option<&str>,
    ) -> Result<(Arc<dyn Provider>, String), Error> {
        let provider_id = provider_id.unwrap_or(&self.default_provider);
        let entry = self
            .providers
            .get(provider_id)
            .ok_or_else(|| Error::UnsupportedProvider(provider_id.to_string()))?;

        let model = match model {
            None => entry.default_model.clone(),
            Some(m) if entry.models.is_empty() || entry.models.iter().any(|a| a == m) => {
                m.to_string()
            }
            Some(m) => match self.model_fallback {
                ModelFallback::Reject => {
                    return Err(Error::UnsupportedProvider(format!(
                        "model '{m}' is not available for provider '{provider_id}'"
                    )));
                }
                ModelFallback::Default => {
                    warn!(
                        provider = %provider_id,
                        requested = %m,
                        using = %entry.default_model,
                        "Requested model not allowed, using provider default"
                    );
                    entry.default_model.clone()
                }
            },
        };

        Ok((entry.provider.clone(), model))
    }

    /// Send `prompt` to the resolved provider and return the reply text.
    ///
    /// An unknown provider fails before any network call. A reply envelope
    /// without text yields [`NO_REPLY_SENTINEL`].
    pub async fn dispatch(
        &self,
        provider_id: Option<&str>,
        model: Option<&str>,
        prompt: &PromptRequest,
    ) -> Result<String, Error> {
        let (provider, model) = self.resolve(provider_id, model)?;

        let request = ProviderRequest {
            model,
            prompt: prompt.shaped(provider.prompt_shape()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(provider = %provider.name(), model = %request.model, "Dispatching prompt");

        let response = provider.complete(request).await?;

        Ok(match response.content {
            Some(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => NO_REPLY_SENTINEL.to_string(),
        })
    }
}

/// Build the provider allow-list from configuration.
///
/// Every configured provider is registered behind a [`RetryingProvider`].
/// The default provider is registered even when it has no section of its own.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider)
        .with_model_fallback(config.model_fallback)
        .with_sampling(config.temperature, Some(config.max_tokens));

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let provider = build_provider(
            name,
            provider_config.kind,
            provider_config.api_url.as_deref(),
            &api_key,
        );

        let default_model = provider_config
            .default_model
            .clone()
            .unwrap_or_else(|| default_model_for(provider_config.kind, config));

        router.register(
            name.clone(),
            Arc::new(RetryingProvider::from_config(provider, &config.retry)),
            default_model,
            provider_config.models.clone(),
        );
    }

    // Ensure the default provider exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let kind = default_kind(&config.default_provider);
        let api_key = config.api_key.clone().unwrap_or_default();
        let provider = build_provider(&config.default_provider, kind, None, &api_key);

        router.register(
            config.default_provider.clone(),
            Arc::new(RetryingProvider::from_config(provider, &config.retry)),
            config.default_model.clone(),
            vec![],
        );
    }

    router
}

fn build_provider(
    name: &str,
    kind: ProviderKind,
    api_url: Option<&str>,
    api_key: &str,
) -> Arc<dyn Provider> {
    match kind {
        ProviderKind::Anthropic => {
            let mut p = AnthropicProvider::new(api_key).with_name(name);
            if let Some(url) = api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        ProviderKind::OpenaiChat | ProviderKind::OpenaiCompletions => {
            let base_url = api_url
                .map(str::to_string)
                .unwrap_or_else(|| default_base_url(name));
            Arc::new(OpenAiCompatProvider::new(name, base_url, api_key).with_api(kind.into()))
        }
    }
}

/// Wire protocol assumed for a provider that has no config section.
fn default_kind(provider_name: &str) -> ProviderKind {
    if provider_name == "anthropic" {
        ProviderKind::Anthropic
    } else {
        ProviderKind::OpenaiChat
    }
}

fn default_model_for(kind: ProviderKind, config: &AppConfig) -> String {
    match kind {
        ProviderKind::Anthropic => "claude-sonnet-4-20250514".into(),
        ProviderKind::OpenaiCompletions => "gpt-3.5-turbo-instruct".into(),
        ProviderKind::OpenaiChat => config.default_model.clone(),
    }
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "anthropic" => "https://api.anthropic.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => "https://api.openai.com/v1".into(),
    }
}
