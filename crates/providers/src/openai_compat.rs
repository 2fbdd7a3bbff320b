//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM, Groq and any endpoint that
//! mirrors the OpenAI wire format.
//!
//! Supports:
//! - Chat completions (`/chat/completions`, message array)
//! - Legacy text completions (`/completions`, one prompt string)
//! - Embeddings

use async_trait::async_trait;
use ragbridge_config::ProviderKind;
use ragbridge_core::error::ProviderError;
use ragbridge_core::prompt::{ChatMessage, Prompt, PromptShape};
use ragbridge_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Which OpenAI endpoint family a provider talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionApi {
    Chat,
    Completions,
}

impl CompletionApi {
    fn path(self) -> &'static str {
        match self {
            CompletionApi::Chat => "chat/completions",
            CompletionApi::Completions => "completions",
        }
    }
}

impl From<ProviderKind> for CompletionApi {
    fn from(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::OpenaiCompletions => CompletionApi::Completions,
            _ => CompletionApi::Chat,
        }
    }
}

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    api: CompletionApi,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new chat-completions provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api: CompletionApi::Chat,
            client,
        }
    }

    /// Switch the endpoint family.
    pub fn with_api(mut self, api: CompletionApi) -> Self {
        self.api = api;
        self
    }

    pub fn api(&self) -> CompletionApi {
        self.api
    }

    fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.to_string(),
                content: Some(m.content.clone()),
            })
            .collect()
    }

    /// Build the JSON body for this provider's endpoint. A prompt in the
    /// wrong shape is re-rendered rather than rejected.
    fn request_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "temperature": request.temperature,
        });

        match (self.api, &request.prompt) {
            (CompletionApi::Chat, Prompt::Messages(messages)) => {
                body["messages"] = serde_json::json!(Self::to_api_messages(messages));
            }
            (CompletionApi::Chat, Prompt::Text(text)) => {
                body["messages"] = serde_json::json!([{ "role": "user", "content": text }]);
            }
            (CompletionApi::Completions, Prompt::Text(text)) => {
                body["prompt"] = serde_json::json!(text);
            }
            (CompletionApi::Completions, Prompt::Messages(messages)) => {
                let joined = messages
                    .iter()
                    .map(|m| format!("{}: {}", m.role.label(), m.content))
                    .collect::<Vec<_>>()
                    .join("\n");
                body["prompt"] = serde_json::json!(joined);
            }
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }

    async fn post(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ragbridge_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn prompt_shape(&self) -> PromptShape {
        match self.api {
            CompletionApi::Chat => PromptShape::Messages,
            CompletionApi::Completions => PromptShape::Transcript,
        }
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/{}", self.base_url, self.api.path());
        let body = self.request_body(&request);

        debug!(provider = %self.name, model = %request.model, api = ?self.api, "Sending completion request");

        let response = self.post(&url, &body).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {e}")))?;

        Ok(api_response.into_provider_response(&request.model))
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        let url = format!("{}/embeddings", self.base_url);

        let body = serde_json::json!({
            "model": request.model,
            "input": request.inputs,
            "encoding_format": "float",
        });

        debug!(
            provider = %self.name,
            model = %request.model,
            count = request.inputs.len(),
            "Sending embedding request"
        );

        let response = self.post(&url, &body).await?;

        let api_resp: EmbeddingApiResponse = response.json().await.map_err(|e| {
            ProviderError::MalformedResponse(format!("Failed to parse embedding response: {e}"))
        })?;

        Ok(EmbeddingResponse {
            embeddings: api_resp.data.into_iter().map(|d| d.embedding).collect(),
            model: api_resp.model,
        })
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

/// Shared envelope for both endpoint families. Chat choices carry a
/// `message`; legacy completion choices carry `text`.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    message: Option<ApiMessage>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl ApiResponse {
    /// Only the first choice is used. A missing choice or missing text
    /// yields `content: None`, never an error.
    fn into_provider_response(self, requested_model: &str) -> ProviderResponse {
        let content = self.choices.into_iter().next().and_then(|choice| {
            choice
                .message
                .and_then(|m| m.content)
                .or(choice.text)
        });

        ProviderResponse {
            content,
            model: self.model.unwrap_or_else(|| requested_model.to_string()),
            usage: self.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        }
    }
}

// --- Embedding API types ---

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragbridge_core::message::Role;
    use ragbridge_core::Provider;

    fn request(prompt: Prompt) -> ProviderRequest {
        ProviderRequest {
            model: "gpt-4o-mini".into(),
            prompt,
            temperature: 0.7,
            max_tokens: Some(150),
        }
    }

    #[test]
    fn trailing_slash_trimmed() {
        let p = OpenAiCompatProvider::new("custom", "http://localhost:8000/v1/", "k");
        assert_eq!(p.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn prompt_shape_follows_api() {
        let chat = OpenAiCompatProvider::new("openai", "https://api.openai.com/v1", "sk-test");
        assert_eq!(chat.prompt_shape(), PromptShape::Messages);
        let legacy = OpenAiCompatProvider::new("openai", "https://api.openai.com/v1", "sk-test")
            .with_api(CompletionApi::Completions);
        assert_eq!(legacy.prompt_shape(), PromptShape::Transcript);
        assert_eq!(CompletionApi::from(ProviderKind::OpenaiCompletions), CompletionApi::Completions);
    }

    #[test]
    fn chat_body_carries_messages() {
        let p = OpenAiCompatProvider::new("openai", "https://api.openai.com/v1", "sk-test");
        let body = p.request_body(&request(Prompt::Messages(vec![
            ChatMessage {
                role: Role::System,
                content: "Be brief.".into(),
            },
            ChatMessage {
                role: Role::User,
                content: "Hi".into(),
            },
        ])));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hi");
        assert_eq!(body["max_tokens"], 150);
        assert!(body.get("prompt").is_none());
        assert!(body.get("stop").is_none());
    }

    #[test]
    fn completions_body_carries_prompt_string() {
        let p = OpenAiCompatProvider::new("openai", "https://api.openai.com/v1", "sk-test")
            .with_api(CompletionApi::Completions);
        let body = p.request_body(&request(Prompt::Text("Sys\n\nUser: Hi\nAssistant:".into())));
        assert_eq!(body["prompt"], "Sys\n\nUser: Hi\nAssistant:");
        assert!(body.get("messages").is_none());
    }

    #[test]
    fn parse_chat_response() {
        let data = r#"{
            "model": "gpt-4o-mini",
            "choices": [{"message": {"role": "assistant", "content": "Hello!"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let resp = parsed.into_provider_response("gpt-4o-mini");
        assert_eq!(resp.content.as_deref(), Some("Hello!"));
        assert_eq!(resp.usage.unwrap().total_tokens, 12);
    }

    #[test]
    fn parse_legacy_completion_response() {
        let data = r#"{"choices": [{"text": " About 40 W.", "index": 0}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let resp = parsed.into_provider_response("gpt-3.5-turbo-instruct");
        assert_eq!(resp.content.as_deref(), Some(" About 40 W."));
        assert_eq!(resp.model, "gpt-3.5-turbo-instruct");
    }

    #[test]
    fn empty_choices_yield_no_content() {
        let parsed: ApiResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(parsed.into_provider_response("m").content.is_none());

        let parsed: ApiResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.into_provider_response("m").content.is_none());
    }

    #[test]
    fn parse_embedding_response() {
        let data = r#"{
            "data": [
                {"embedding": [0.1, 0.2, 0.3], "index": 0},
                {"embedding": [0.4, 0.5, 0.6], "index": 1}
            ],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 8, "total_tokens": 8}
        }"#;
        let parsed: EmbeddingApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.data[1].embedding, vec![0.4, 0.5, 0.6]);
        assert_eq!(parsed.model, "text-embedding-3-small");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let p = OpenAiCompatProvider::new("dead", "http://127.0.0.1:1/v1", "k");
        let err = p
            .complete(request(Prompt::Text("Hi".into())))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
