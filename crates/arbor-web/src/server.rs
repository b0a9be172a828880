use crate::routes::{health_routes, llm_routes, node_routes, sync_routes, tree_routes};
use crate::services::AppState;
use crate::{Result, WebError};
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Assemble every route over `state`
pub fn build_router(state: AppState) -> Router {
    let max_body = state.config.server.max_body_bytes();
    let cors = cors_layer(&state.config.server.cors_origins);

    let app = Router::new()
        .merge(tree_routes())
        .merge(node_routes())
        .merge(llm_routes())
        .merge(sync_routes())
        .with_state(state)
        .merge(health_routes())
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http());

    match cors {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
    )
}

pub async fn start_server(state: AppState) -> Result<()> {
    let addr: SocketAddr = state
        .config
        .server
        .socket_addr()
        .parse()
        .map_err(|e| WebError::Config(format!("Invalid address: {e}")))?;
    let app = build_router(state);

    tracing::info!("Starting arbor server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(WebError::Io)?;

    axum::serve(listener, app).await.map_err(WebError::Io)?;

    Ok(())
}
