//! Realtime endpoint: `GET /{tree_id}` upgraded to a WebSocket.
//!
//! Binary frames carry the sync protocol; the socket is handed to the
//! gateway, which owns the connection until either side goes away.

use crate::extract::parse_tree_id;
use crate::services::AppState;
use crate::WebError;
use arbor_sync::SyncGateway;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::Uri;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::{future, SinkExt, StreamExt};
use std::sync::Arc;

pub fn sync_routes() -> Router<AppState> {
    Router::new().route("/{tree_id}", get(sync_socket))
}

async fn sync_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(tree_id): Path<String>,
    uri: Uri,
) -> Result<Response, WebError> {
    // refused before the upgrade so no document is ever created for it
    parse_tree_id(&tree_id)?;
    let target = uri
        .path_and_query()
        .map(|target| target.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let gateway = Arc::clone(&state.gateway);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, gateway, target)))
}

async fn handle_socket(socket: WebSocket, gateway: Arc<SyncGateway>, target: String) {
    let (sender, receiver) = socket.split();

    let inbound = receiver
        .take_while(|message| future::ready(!matches!(message, Err(_) | Ok(Message::Close(_)))))
        .filter_map(|message| {
            future::ready(match message {
                Ok(Message::Binary(frame)) => Some(frame.to_vec()),
                _ => None,
            })
        });
    let outbound = sender.with(|frame: Vec<u8>| {
        future::ready(Ok::<_, axum::Error>(Message::Binary(frame.into())))
    });

    gateway
        .serve(&target, Box::pin(inbound), Box::pin(outbound))
        .await;
}
