use crate::extract::{parse_tree_id, ApiJson, AuthUser};
use crate::services::AppState;
use crate::WebError;
use arbor_sync::NodePatch;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

pub fn tree_routes() -> Router<AppState> {
    Router::new()
        .route("/api/trees", post(create_tree).get(list_trees))
        .route("/api/trees/{tree_id}", get(get_tree).delete(delete_tree))
        .route("/api/trees/{tree_id}/duplicate", post(duplicate_tree))
        .route("/api/trees/{tree_id}/snapshot", get(tree_snapshot))
}

#[derive(Debug, Deserialize)]
struct CreateTreeRequest {
    patch: Value,
    #[serde(rename = "rootId", alias = "root_id")]
    root_id: Option<String>,
}

async fn create_tree(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    ApiJson(req): ApiJson<CreateTreeRequest>,
) -> Result<Json<Value>, WebError> {
    let patch = NodePatch::from_value(req.patch)?;
    let tree_id = state
        .trees
        .create(&identity, &patch, req.root_id.as_deref())?;
    Ok(Json(json!({ "tree_id": tree_id })))
}

async fn duplicate_tree(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(tree_id): Path<String>,
) -> Result<Json<Value>, WebError> {
    let source = parse_tree_id(&tree_id)?;
    let new_tree_id = state.trees.duplicate(&identity, &source)?;
    Ok(Json(json!({ "new_tree_id": new_tree_id })))
}

async fn list_trees(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<Value>, WebError> {
    Ok(Json(json!({ "trees": state.trees.list(&identity) })))
}

async fn get_tree(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    Path(tree_id): Path<String>,
) -> Result<Json<Value>, WebError> {
    let tree_id = parse_tree_id(&tree_id)?;
    Ok(Json(json!(state.trees.get(&tree_id)?)))
}

async fn delete_tree(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(tree_id): Path<String>,
) -> Result<Json<Value>, WebError> {
    let tree_id = parse_tree_id(&tree_id)?;
    state.trees.delete(&identity, &tree_id)?;
    Ok(Json(json!({ "success": true })))
}

async fn tree_snapshot(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    Path(tree_id): Path<String>,
) -> Result<Json<Value>, WebError> {
    let tree_id = parse_tree_id(&tree_id)?;
    Ok(Json(state.trees.snapshot(&tree_id)?))
}
