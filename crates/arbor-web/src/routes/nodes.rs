use crate::extract::{parse_tree_id, ApiJson, AuthUser};
use crate::services::{AppState, NodeContentView};
use crate::WebError;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

pub fn node_routes() -> Router<AppState> {
    Router::new().route(
        "/api/trees/{tree_id}/nodes/{node_id}/content",
        get(get_content).put(put_content),
    )
}

#[derive(Debug, Deserialize)]
struct PutContentRequest {
    content: String,
}

async fn get_content(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    Path((tree_id, node_id)): Path<(String, String)>,
) -> Result<Json<NodeContentView>, WebError> {
    let tree_id = parse_tree_id(&tree_id)?;
    Ok(Json(state.trees.node_content(&tree_id, &node_id)?))
}

async fn put_content(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    Path((tree_id, node_id)): Path<(String, String)>,
    ApiJson(req): ApiJson<PutContentRequest>,
) -> Result<Json<NodeContentView>, WebError> {
    let tree_id = parse_tree_id(&tree_id)?;
    Ok(Json(
        state
            .trees
            .set_node_content(&tree_id, &node_id, &req.content)?,
    ))
}
