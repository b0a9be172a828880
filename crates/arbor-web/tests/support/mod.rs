#![allow(dead_code)]

use arbor_config::{ArborConfig, AuthConfig};
use arbor_llm::{ChatMessage, CompletionProvider, LlmError, LlmResult};
use arbor_web::auth::{ConfiguredCapabilities, StaticIdentityResolver};
use arbor_web::services::default_node_types;
use arbor_web::{build_router, AppState};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

pub const ALICE: &str = "token-alice";
pub const BOB: &str = "token-bob";
pub const CAROL: &str = "token-carol";

/// Completion provider with a canned outcome
pub struct StubProvider {
    reply: Result<String, String>,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for StubProvider {
    async fn complete(&self, _messages: &[ChatMessage]) -> LlmResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(LlmError::Api {
                status: 502,
                message: message.clone(),
            }),
        }
    }

    fn provider_name(&self) -> &str {
        "stub"
    }
}

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        tokens: HashMap::from([
            (ALICE.to_string(), "alice".to_string()),
            (BOB.to_string(), "bob".to_string()),
            (CAROL.to_string(), "carol".to_string()),
        ]),
        create_users: Some(vec!["alice".to_string(), "bob".to_string()]),
        ai_users: Some(vec!["alice".to_string()]),
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_provider(StubProvider::replying("Rewritten text"))
    }

    pub fn with_provider(provider: Arc<StubProvider>) -> Self {
        let config = ArborConfig {
            auth: auth_config(),
            ..ArborConfig::default()
        };
        let state = AppState::new(
            config.clone(),
            Arc::new(StaticIdentityResolver::from_config(&config.auth)),
            Arc::new(ConfiguredCapabilities::from_config(&config.auth)),
            provider,
            default_node_types(),
        );
        let router = build_router(state.clone());
        Self { state, router }
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    /// Create the sample tree as `token` and return its id
    pub async fn create_sample(&self, token: &str, root_title: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/trees",
                Some(token),
                Some(json!({ "patch": sample_patch(root_title) })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["tree_id"].as_str().unwrap().to_string()
    }
}

pub fn sample_patch(root_title: &str) -> Value {
    json!({
        "id": "r1",
        "title": root_title,
        "children": [{ "id": "c1", "title": "Child", "type": "text", "content": "draft" }]
    })
}
