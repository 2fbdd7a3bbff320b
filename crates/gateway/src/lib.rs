//! HTTP surface for RagBridge.
//!
//! Exposes chat (`/chat`, `/chatbot`), document upload and listing
//! (`/upload`, `/files`), a health probe, and the embedded landing page.
//!
//! Built on Axum; every handler shares one [`AppState`].

pub mod api;
pub mod frontend;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::{
    Router,
    routing::{get, post},
};
use ragbridge_assembler::ChatPipeline;
use ragbridge_config::{AppConfig, GatewayConfig};
use ragbridge_core::error::Error;
use ragbridge_core::retrieval::{EmbeddingService, Retriever};
use ragbridge_core::storage::BlobStore;
use ragbridge_memory::{DocumentIndex, DocumentIngestor, HybridRetriever, LocalBlobStore, NoRetrieval};
use ragbridge_providers::{ProviderEmbedder, ProviderRouter, build_from_config};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

/// Shared application state for the gateway.
pub struct AppState {
    pub pipeline: Arc<ChatPipeline>,
    pub ingestor: Arc<DocumentIngestor>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(pipeline: Arc<ChatPipeline>, ingestor: Arc<DocumentIngestor>) -> Self {
        Self { pipeline, ingestor }
    }

    /// Wire every collaborator from configuration.
    ///
    /// Files already present in the upload directory are indexed again, so a
    /// restart keeps previously uploaded documents searchable.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let router = Arc::new(build_from_config(config));
        let embedder = embedder_for(config, &router);

        let store = LocalBlobStore::new(config.storage.upload_dir.clone());
        store.ensure_root().await?;
        let store: Arc<dyn BlobStore> = Arc::new(store);

        let index = DocumentIndex::new();
        let mut ingestor = DocumentIngestor::new(store, index.clone(), config.retrieval.chunk_chars);
        if let Some(embedder) = &embedder {
            ingestor = ingestor.with_embedder(embedder.clone());
        }

        let retriever: Arc<dyn Retriever> = if config.retrieval.enabled {
            let mut hybrid = HybridRetriever::new(index);
            if let Some(embedder) = embedder {
                hybrid = hybrid.with_embedder(embedder);
            }
            Arc::new(hybrid)
        } else {
            Arc::new(NoRetrieval)
        };

        let state = Self::new(
            Arc::new(ChatPipeline::from_config(config, retriever, router)),
            Arc::new(ingestor),
        );
        state.reindex_uploads().await;
        Ok(state)
    }

    async fn reindex_uploads(&self) {
        let store = self.ingestor.store();
        let blobs = match store.list().await {
            Ok(blobs) => blobs,
            Err(e) => {
                warn!(error = %e, "Could not list existing uploads");
                return;
            }
        };

        for blob in blobs {
            let bytes = match store.read(&blob.path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(file = %blob.name, error = %e, "Skipping unreadable upload");
                    continue;
                }
            };
            match self.ingestor.ingest(&blob.name, None, &bytes).await {
                Ok(report) => debug!(file = %report.name, chunks = report.chunks, "Re-indexed upload"),
                Err(e) => warn!(file = %blob.name, error = %e, "Skipping upload that failed to index"),
            }
        }
    }
}

fn embedder_for(config: &AppConfig, router: &ProviderRouter) -> Option<Arc<dyn EmbeddingService>> {
    let name = config.retrieval.embedding_provider.as_deref()?;
    match router.get(name) {
        Some(provider) => {
            info!(provider = %name, model = %config.retrieval.embedding_model, "Embeddings enabled");
            Some(Arc::new(ProviderEmbedder::new(
                provider,
                config.retrieval.embedding_model.clone(),
            )))
        }
        None => {
            warn!(provider = %name, "Embedding provider not registered, using keyword retrieval");
            None
        }
    }
}

/// Build the Axum router with all routes and layers.
///
/// Layers applied:
/// - CORS for `gateway.allowed_origins` (same-origin only when empty)
/// - Request body limit from `gateway.max_upload_bytes`
/// - HTTP trace logging
pub fn build_router(state: SharedState, gateway: &GatewayConfig) -> Router {
    Router::new()
        .route("/chat", post(api::chat_handler))
        .route("/chatbot", post(api::chat_handler))
        .route("/upload", post(api::upload_handler))
        .route("/files", get(api::files_handler))
        .route("/health", get(api::health_handler))
        .with_state(state)
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(gateway.max_upload_bytes))
        .layer(cors_layer(&gateway.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(api::SESSION_HEADER),
        ])
        .max_age(Duration::from_secs(3600));

    if allowed_origins.is_empty() {
        return cors;
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Start the HTTP server and serve until the process exits.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let state = Arc::new(AppState::from_config(&config).await?);
    info!(
        providers = ?state.pipeline.router().list(),
        default_provider = %config.default_provider,
        upload_dir = %config.storage.upload_dir.display(),
        "Collaborators ready"
    );

    let app = build_router(state, &config.gateway);

    info!(addr = %addr, "Server starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use ragbridge_assembler::{PipelineSettings, PromptBuilder, SessionHistories};
    use ragbridge_core::error::ProviderError;
    use ragbridge_core::message::SessionId;
    use ragbridge_core::prompt::Prompt;
    use ragbridge_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Records every prompt; fails when asked to.
    struct MockProvider {
        prompts: Mutex<Vec<Prompt>>,
        fail: bool,
    }

    impl MockProvider {
        fn new(fail: bool) -> Self {
            Self {
                prompts: Mutex::new(vec![]),
                fail,
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }

        fn last_system(&self) -> String {
            match self.prompts.lock().unwrap().last().unwrap() {
                Prompt::Messages(m) => m[0].content.clone(),
                Prompt::Text(t) => t.clone(),
            }
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            if self.fail {
                return Err(ProviderError::ApiError {
                    status_code: 502,
                    message: "upstream secret".into(),
                });
            }
            Ok(ProviderResponse {
                content: Some("  Mocked answer.  ".into()),
                model: request.model,
                usage: None,
            })
        }
    }

    struct Harness {
        app: Router,
        provider: Arc<MockProvider>,
        state: SharedState,
        _dir: tempfile::TempDir,
    }

    fn harness(fail: bool) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::new(fail));

        let mut router = ProviderRouter::new("mock");
        router.register("mock", provider.clone(), "mock-model", vec![]);

        let index = DocumentIndex::new();
        let store: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(dir.path()));
        let ingestor = DocumentIngestor::new(store, index.clone(), 2000);
        let pipeline = ChatPipeline::new(
            Arc::new(HybridRetriever::new(index)),
            Arc::new(router),
            PromptBuilder::default(),
            SessionHistories::new(6, 100),
            PipelineSettings::default(),
        );

        let state = Arc::new(AppState::new(Arc::new(pipeline), Arc::new(ingestor)));
        let app = build_router(state.clone(), &GatewayConfig::default());
        Harness {
            app,
            provider,
            state,
            _dir: dir,
        }
    }

    fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_post(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let boundary = "ragbridge-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/upload")
            .header("content-type", format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let h = harness(false);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = h.app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn chat_returns_trimmed_reply() {
        let h = harness(false);
        let response = h
            .app
            .oneshot(json_post("/chat", serde_json::json!({"message": "Olá"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["reply"], "Mocked answer.");
        assert_eq!(json["session_id"], "default");
    }

    #[tokio::test]
    async fn chatbot_alias_behaves_like_chat() {
        let h = harness(false);
        let response = h
            .app
            .oneshot(json_post("/chatbot", serde_json::json!({"message": "Hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.provider.calls(), 1);
    }

    #[tokio::test]
    async fn missing_or_blank_message_is_400() {
        let h = harness(false);
        for body in [serde_json::json!({}), serde_json::json!({"message": "   "})] {
            let response = h.app.clone().oneshot(json_post("/chat", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await["error"], "message is required");
        }

        let garbage = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = h.app.clone().oneshot(garbage).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_provider_is_400_without_generation() {
        let h = harness(false);
        let response = h
            .app
            .oneshot(json_post(
                "/chat",
                serde_json::json!({"message": "Hi", "provider": "mystery"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].as_str().unwrap().contains("mystery"));
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn provider_failure_is_generic_500() {
        let h = harness(true);
        let response = h
            .app
            .oneshot(json_post("/chat", serde_json::json!({"message": "Hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Error processing the message");
        assert!(!json.to_string().contains("upstream secret"));
    }

    #[tokio::test]
    async fn session_from_header_or_body() {
        let h = harness(false);

        let with_header = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .header("X-Session-Id", "from-header")
            .body(Body::from(r#"{"message": "one"}"#))
            .unwrap();
        let response = h.app.clone().oneshot(with_header).await.unwrap();
        assert_eq!(body_json(response).await["session_id"], "from-header");

        let response = h
            .app
            .clone()
            .oneshot(json_post(
                "/chat",
                serde_json::json!({"message": "two", "session_id": "from-body"}),
            ))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["session_id"], "from-body");

        let sessions = h.state.pipeline.sessions();
        assert_eq!(sessions.snapshot(&SessionId::from("from-header")).await.len(), 2);
        assert_eq!(sessions.snapshot(&SessionId::from("from-body")).await.len(), 2);
        assert!(sessions.snapshot(&SessionId::default_session()).await.is_empty());
    }

    #[tokio::test]
    async fn upload_indexes_and_feeds_chat() {
        let h = harness(false);
        let response = h
            .app
            .clone()
            .oneshot(multipart_post(
                "file",
                "manual.txt",
                "text/plain",
                b"The soldering iron should be set to 40 watts for fine work.",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["message"], "File uploaded successfully");
        assert_eq!(json["fileName"], "manual.txt");

        let response = h
            .app
            .clone()
            .oneshot(json_post(
                "/chat",
                serde_json::json!({"message": "soldering iron watts"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(h.provider.last_system().contains("40 watts"));

        let req = Request::builder().uri("/files").body(Body::empty()).unwrap();
        let response = h.app.clone().oneshot(req).await.unwrap();
        let files = body_json(response).await;
        assert_eq!(files[0]["name"], "manual.txt");
        assert!(files[0]["size"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn upload_without_file_field_is_400() {
        let h = harness(false);
        let response = h
            .app
            .oneshot(multipart_post("attachment", "a.txt", "text/plain", b"hello"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "No files were uploaded.");
    }

    #[tokio::test]
    async fn unsupported_upload_stored_not_indexed() {
        let h = harness(false);
        let response = h
            .app
            .oneshot(multipart_post(
                "file",
                "photo.png",
                "image/png",
                &[0x89, b'P', b'N', b'G', 0x00, 0xff],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(h.state.ingestor.index().is_empty().await);
        assert_eq!(h.state.ingestor.store().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_reupload_is_500_and_keeps_document() {
        let h = harness(false);
        let original = b"The soldering iron should be set to 40 watts for fine work.";

        let response = h
            .app
            .clone()
            .oneshot(multipart_post("file", "manual.txt", "text/plain", original))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = h
            .app
            .clone()
            .oneshot(multipart_post("file", "manual.txt", "text/plain", &[0xff, 0xfe, 0xfd]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "Error uploading the file");

        let req = Request::builder().uri("/files").body(Body::empty()).unwrap();
        let files = body_json(h.app.clone().oneshot(req).await.unwrap()).await;
        assert_eq!(files.as_array().unwrap().len(), 1);
        assert_eq!(files[0]["size"].as_u64().unwrap(), original.len() as u64);

        let response = h
            .app
            .clone()
            .oneshot(json_post(
                "/chat",
                serde_json::json!({"message": "soldering iron watts"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(h.provider.last_system().contains("40 watts"));
    }

    #[tokio::test]
    async fn files_empty_before_any_upload() {
        let h = harness(false);
        let req = Request::builder().uri("/files").body(Body::empty()).unwrap();
        let response = h.app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn state_from_config_reindexes_existing_uploads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "Restart-safe knowledge about flux.").unwrap();

        let mut config = AppConfig::default();
        config.storage.upload_dir = dir.path().to_path_buf();

        let state = AppState::from_config(&config).await.unwrap();
        assert_eq!(state.ingestor.index().sources().await, vec!["notes.txt".to_string()]);
    }

    #[test]
    fn invalid_cors_origins_are_skipped() {
        // Builds without panicking even with a bad entry.
        let _ = cors_layer(&["http://localhost:3000".into(), "bad\norigin".into()]);
    }
}
