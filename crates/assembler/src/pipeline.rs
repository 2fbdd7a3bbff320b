//! The chat pipeline: one user message in, one reply out.
//!
//! message → retrieve → filter → truncate → build prompt (with the session's
//! completed exchanges) → dispatch → record the exchange → reply.

use std::sync::Arc;
use std::time::Duration;

use ragbridge_config::AppConfig;
use ragbridge_core::error::{Error, ProviderError};
use ragbridge_core::message::SessionId;
use ragbridge_core::retrieval::{ContextFragment, Retriever};
use ragbridge_providers::ProviderRouter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::{PromptBuilder, truncate_context};
use crate::history::SessionHistories;

/// One inbound chat message and its routing hints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatTurnRequest {
    #[serde(default)]
    pub session: Option<SessionId>,
    pub message: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl ChatTurnRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn in_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub session_id: SessionId,
    /// Whether retrieved context made it into the prompt
    pub context_used: bool,
    /// Fragments that passed the relevance threshold
    pub fragments: usize,
}

/// Retrieval and sizing knobs, taken from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub top_k: usize,
    pub min_relevance: f32,
    pub max_context_chars: usize,
    pub request_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            top_k: if config.retrieval.enabled {
                config.retrieval.top_k
            } else {
                0
            },
            min_relevance: config.retrieval.min_relevance,
            max_context_chars: config.assembler.max_context_chars,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

pub struct ChatPipeline {
    retriever: Arc<dyn Retriever>,
    router: Arc<ProviderRouter>,
    builder: PromptBuilder,
    sessions: SessionHistories,
    settings: PipelineSettings,
}

impl ChatPipeline {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        router: Arc<ProviderRouter>,
        builder: PromptBuilder,
        sessions: SessionHistories,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            retriever,
            router,
            builder,
            sessions,
            settings,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        retriever: Arc<dyn Retriever>,
        router: Arc<ProviderRouter>,
    ) -> Self {
        Self::new(
            retriever,
            router,
            PromptBuilder::from_config(&config.assembler),
            SessionHistories::new(config.assembler.max_history_turns, config.sessions.max_sessions),
            PipelineSettings::from_config(config),
        )
    }

    pub fn sessions(&self) -> &SessionHistories {
        &self.sessions
    }

    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }

    /// Run one exchange.
    ///
    /// Nothing is recorded unless generation succeeds. Retrieval failures
    /// degrade to an empty context; an unknown provider or model is rejected
    /// before any collaborator is called.
    pub async fn chat(&self, request: ChatTurnRequest) -> Result<ChatReply, Error> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(Error::Validation("message is required".into()));
        }

        let provider = request.provider.as_deref().filter(|p| !p.trim().is_empty());
        let model = request.model.as_deref().filter(|m| !m.trim().is_empty());
        self.router.resolve(provider, model)?;

        let session = request.session.unwrap_or_else(SessionId::default_session);
        let deadline = self.settings.request_timeout;

        let turn = self.run_turn(&session, message, provider, model);
        let (reply, fragments, context_used) = tokio::time::timeout(deadline, turn).await.map_err(|_| {
            warn!(session = %session, timeout_secs = deadline.as_secs(), "Chat request timed out");
            Error::Generation(ProviderError::Timeout(format!(
                "no reply within {}s",
                deadline.as_secs()
            )))
        })??;

        info!(
            session = %session,
            fragments,
            context_used,
            reply_chars = reply.chars().count(),
            "Chat exchange complete"
        );

        Ok(ChatReply {
            reply,
            session_id: session,
            context_used,
            fragments,
        })
    }

    async fn run_turn(
        &self,
        session: &SessionId,
        message: &str,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> Result<(String, usize, bool), Error> {
        let fragments = self.retrieve(message).await;
        let context = truncate_context(&fragments, self.settings.max_context_chars);
        let context_used = !context.trim().is_empty();

        let mut history = self.sessions.lock(session).await;
        let prompt = self
            .builder
            .build(&context, &history.view(usize::MAX), message);

        debug!(
            session = %session,
            history_turns = prompt.history().len(),
            context_chars = context.chars().count(),
            "Prompt assembled"
        );

        let reply = self.router.dispatch(provider, model, &prompt).await?;

        history.record_user(message);
        history.record_assistant(reply.clone());

        Ok((reply, fragments.len(), context_used))
    }

    async fn retrieve(&self, message: &str) -> Vec<ContextFragment> {
        if self.settings.top_k == 0 {
            return Vec::new();
        }

        match self.retriever.retrieve(message, self.settings.top_k).await {
            Ok(fragments) => {
                let total = fragments.len();
                let kept: Vec<ContextFragment> = fragments
                    .into_iter()
                    .filter(|f| f.meets(self.settings.min_relevance))
                    .collect();
                debug!(
                    retriever = %self.retriever.name(),
                    total,
                    kept = kept.len(),
                    "Retrieval finished"
                );
                kept
            }
            Err(e) => {
                warn!(retriever = %self.retriever.name(), error = %e, "Retrieval failed, continuing without context");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragbridge_core::error::RetrievalError;
    use ragbridge_core::prompt::{Prompt, PromptShape};
    use ragbridge_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use std::sync::Mutex;

    /// Replies "reply N" and keeps every request it saw.
    struct ScriptedProvider {
        requests: Mutex<Vec<ProviderRequest>>,
        fail: bool,
        delay: Option<Duration>,
    }

    impl ScriptedProvider {
        fn new() -> Self {
            Self {
                requests: Mutex::new(vec![]),
                fail: false,
                delay: None,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new()
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn system_of_last(&self) -> String {
            match &self.requests.lock().unwrap().last().unwrap().prompt {
                Prompt::Messages(m) => m[0].content.clone(),
                Prompt::Text(t) => t.clone(),
            }
        }

        fn message_count_of_last(&self) -> usize {
            match &self.requests.lock().unwrap().last().unwrap().prompt {
                Prompt::Messages(m) => m.len(),
                Prompt::Text(_) => 1,
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn prompt_shape(&self) -> PromptShape {
            PromptShape::Messages
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let n = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(request.clone());
                requests.len()
            };
            if self.fail {
                return Err(ProviderError::ApiError {
                    status_code: 500,
                    message: "internal secret detail".into(),
                });
            }
            Ok(ProviderResponse {
                content: Some(format!("reply {n}")),
                model: request.model,
                usage: None,
            })
        }
    }

    struct FixedRetriever(Result<Vec<ContextFragment>, RetrievalError>);

    #[async_trait]
    impl Retriever for FixedRetriever {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn retrieve(&self, _query: &str, top_k: usize) -> Result<Vec<ContextFragment>, RetrievalError> {
            self.0.clone().map(|mut f| {
                f.truncate(top_k);
                f
            })
        }
    }

    fn pipeline(
        retriever: FixedRetriever,
        provider: Arc<ScriptedProvider>,
        settings: PipelineSettings,
    ) -> ChatPipeline {
        let mut router = ProviderRouter::new("openai");
        router.register("openai", provider, "gpt-4o-mini", vec![]);
        ChatPipeline::new(
            Arc::new(retriever),
            Arc::new(router),
            PromptBuilder::default(),
            SessionHistories::new(6, 100),
            settings,
        )
    }

    fn no_context() -> FixedRetriever {
        FixedRetriever(Ok(vec![]))
    }

    #[tokio::test]
    async fn fallback_when_nothing_retrieved() {
        let provider = Arc::new(ScriptedProvider::new());
        let pipeline = pipeline(no_context(), provider.clone(), PipelineSettings::default());

        let reply = pipeline
            .chat(ChatTurnRequest::new("Qual a potência recomendada?"))
            .await
            .unwrap();

        assert_eq!(reply.reply, "reply 1");
        assert!(!reply.context_used);
        assert_eq!(reply.session_id.as_str(), "default");
        assert!(!provider.system_of_last().contains("[Retrieved Information]"));

        let history = pipeline.sessions().snapshot(&SessionId::default_session()).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content(), "Qual a potência recomendada?");
        assert_eq!(history[1].content(), "reply 1");
    }

    #[tokio::test]
    async fn context_goes_into_system_message() {
        let provider = Arc::new(ScriptedProvider::new());
        let retriever = FixedRetriever(Ok(vec![
            ContextFragment::new("manual.txt", "Use 40 W.").with_score(0.9),
            ContextFragment::new("noise.txt", "Unrelated.").with_score(0.05),
        ]));
        let pipeline = pipeline(retriever, provider.clone(), PipelineSettings::default());

        let reply = pipeline.chat(ChatTurnRequest::new("Power?")).await.unwrap();

        assert!(reply.context_used);
        assert_eq!(reply.fragments, 1);
        let system = provider.system_of_last();
        assert!(system.contains("[Retrieved Information]"));
        assert!(system.contains("Use 40 W."));
        assert!(!system.contains("Unrelated."));
    }

    #[tokio::test]
    async fn context_truncated_to_budget() {
        let provider = Arc::new(ScriptedProvider::new());
        let retriever = FixedRetriever(Ok(vec![ContextFragment::new("big.txt", "y".repeat(5000))]));
        let settings = PipelineSettings {
            max_context_chars: 100,
            ..PipelineSettings::default()
        };
        let pipeline = pipeline(retriever, provider.clone(), settings);

        pipeline.chat(ChatTurnRequest::new("Anything?")).await.unwrap();
        let system = provider.system_of_last();
        assert!(system.contains(&"y".repeat(100)));
        assert!(!system.contains(&"y".repeat(101)));
    }

    #[tokio::test]
    async fn zero_context_budget_reports_no_context() {
        let provider = Arc::new(ScriptedProvider::new());
        let retriever = FixedRetriever(Ok(vec![
            ContextFragment::new("manual.txt", "Use 40 W.").with_score(0.9),
        ]));
        let settings = PipelineSettings {
            max_context_chars: 0,
            ..PipelineSettings::default()
        };
        let pipeline = pipeline(retriever, provider.clone(), settings);

        let reply = pipeline.chat(ChatTurnRequest::new("Power?")).await.unwrap();
        assert_eq!(reply.fragments, 1);
        assert!(!reply.context_used);
        let system = provider.system_of_last();
        assert!(!system.contains("[Retrieved Information]"));
        assert!(!system.contains("Use 40 W."));
    }

    #[tokio::test]
    async fn blank_fragments_report_no_context() {
        let provider = Arc::new(ScriptedProvider::new());
        let retriever = FixedRetriever(Ok(vec![
            ContextFragment::new("blank.txt", "  \n  ").with_score(0.9),
        ]));
        let pipeline = pipeline(retriever, provider.clone(), PipelineSettings::default());

        let reply = pipeline.chat(ChatTurnRequest::new("Power?")).await.unwrap();
        assert_eq!(reply.fragments, 1);
        assert!(!reply.context_used);
        assert!(!provider.system_of_last().contains("[Retrieved Information]"));
    }

    #[tokio::test]
    async fn retrieval_failure_degrades_to_fallback() {
        let provider = Arc::new(ScriptedProvider::new());
        let retriever = FixedRetriever(Err(RetrievalError::Search("index offline".into())));
        let pipeline = pipeline(retriever, provider.clone(), PipelineSettings::default());

        let reply = pipeline.chat(ChatTurnRequest::new("Hello")).await.unwrap();
        assert!(!reply.context_used);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn empty_message_rejected_before_collaborators() {
        let provider = Arc::new(ScriptedProvider::new());
        let pipeline = pipeline(no_context(), provider.clone(), PipelineSettings::default());

        let err = pipeline.chat(ChatTurnRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_provider_rejected_without_call() {
        let provider = Arc::new(ScriptedProvider::new());
        let pipeline = pipeline(no_context(), provider.clone(), PipelineSettings::default());

        let err = pipeline
            .chat(ChatTurnRequest::new("Hi").with_provider("mystery"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedProvider(_)));
        assert_eq!(provider.calls(), 0);
        assert!(pipeline.sessions().snapshot(&SessionId::default_session()).await.is_empty());
    }

    #[tokio::test]
    async fn failed_generation_records_nothing() {
        let provider = Arc::new(ScriptedProvider::failing());
        let pipeline = pipeline(no_context(), provider.clone(), PipelineSettings::default());

        let err = pipeline.chat(ChatTurnRequest::new("Hi")).await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert!(pipeline.sessions().snapshot(&SessionId::default_session()).await.is_empty());
    }

    #[tokio::test]
    async fn history_reaches_later_prompts_and_stays_bounded() {
        let provider = Arc::new(ScriptedProvider::new());
        let pipeline = pipeline(no_context(), provider.clone(), PipelineSettings::default());

        for i in 1..=4 {
            pipeline.chat(ChatTurnRequest::new(format!("q{i}"))).await.unwrap();
        }

        // 4th prompt: system + 3 completed exchanges + the new user turn
        assert_eq!(provider.message_count_of_last(), 1 + 6 + 1);

        let history = pipeline.sessions().snapshot(&SessionId::default_session()).await;
        let contents: Vec<_> = history.iter().map(|t| t.content().to_string()).collect();
        assert_eq!(contents, vec!["q2", "reply 2", "q3", "reply 3", "q4", "reply 4"]);
    }

    #[tokio::test]
    async fn sessions_do_not_share_history() {
        let provider = Arc::new(ScriptedProvider::new());
        let pipeline = pipeline(no_context(), provider.clone(), PipelineSettings::default());

        pipeline
            .chat(ChatTurnRequest::new("from a").in_session(SessionId::from("a")))
            .await
            .unwrap();
        pipeline
            .chat(ChatTurnRequest::new("from b").in_session(SessionId::from("b")))
            .await
            .unwrap();

        // b's prompt saw no history from a
        assert_eq!(provider.message_count_of_last(), 2);
        assert_eq!(pipeline.sessions().snapshot(&SessionId::from("a")).await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generation_times_out() {
        let provider = Arc::new(ScriptedProvider::slow(Duration::from_secs(60)));
        let settings = PipelineSettings {
            request_timeout: Duration::from_secs(30),
            ..PipelineSettings::default()
        };
        let pipeline = pipeline(no_context(), provider, settings);

        let err = pipeline.chat(ChatTurnRequest::new("Hi")).await.unwrap_err();
        assert!(matches!(err, Error::Generation(ProviderError::Timeout(_))));
        assert!(pipeline.sessions().snapshot(&SessionId::default_session()).await.is_empty());
    }

    #[test]
    fn settings_follow_config() {
        let mut config = AppConfig::default();
        config.retrieval.enabled = false;
        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.top_k, 0);
        assert_eq!(settings.max_context_chars, 2000);
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
    }
}
