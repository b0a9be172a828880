use crate::extract::{ApiJson, AuthUser};
use crate::services::AppState;
use crate::WebError;
use arbor_llm::ChatMessage;
use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

pub fn llm_routes() -> Router<AppState> {
    Router::new().route("/api/llm", post(relay))
}

#[derive(Debug, Deserialize)]
struct RelayRequest {
    messages: Vec<ChatMessage>,
}

async fn relay(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    ApiJson(req): ApiJson<RelayRequest>,
) -> Result<Json<Value>, WebError> {
    let result = state.trees.llm_relay(&identity, &req.messages).await?;
    Ok(Json(json!({ "result": result })))
}
