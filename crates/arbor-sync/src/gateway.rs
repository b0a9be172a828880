//! Realtime sync gateway.
//!
//! Each connection is bound to one tree and walks
//! `Listening -> Handshaking -> Synced -> Closed`:
//!
//! - **Listening**: the target path is parsed into a tree id; placeholders
//!   and malformed ids are refused before any state is created.
//! - **Handshaking**: the document is resolved (created if unknown), the
//!   connection subscribes to its relay, and the server sends its state
//!   vector. Each side answers the other's state vector with exactly the
//!   updates it is missing.
//! - **Synced**: entered when the peer's diff arrives. Missing schema
//!   fields are backfilled, and every inbound update is merged and relayed
//!   to the other subscribers.
//! - **Closed**: the relay receiver is dropped; nothing persists.
//!
//! The process is the hub of a star: peers never talk to each other
//! directly.

use crate::document::{ConnectionId, Relay, RelayFrame, TreeDocument};
use crate::protocol::{self, Message, SyncMessage};
use crate::{DocumentRegistry, SyncError, SyncResult};
use arbor_core::{TreeId, TreeMetadataManager};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use yrs::updates::encoder::Encode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Listening,
    Handshaking,
    Synced,
    Closed,
}

/// Protocol state of one realtime connection, independent of transport
pub struct SyncConnection {
    id: ConnectionId,
    document: Arc<TreeDocument>,
    state: ConnectionState,
}

impl SyncConnection {
    fn new(document: Arc<TreeDocument>) -> Self {
        Self {
            id: ConnectionId::new(),
            document,
            state: ConnectionState::Listening,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn tree_id(&self) -> &TreeId {
        self.document.tree_id()
    }

    pub fn document(&self) -> &Arc<TreeDocument> {
        &self.document
    }

    /// Enter `Handshaking` and produce the server's step-1 frame
    pub fn begin_handshake(&mut self) -> Vec<u8> {
        self.state = ConnectionState::Handshaking;
        Message::Sync(SyncMessage::SyncStep1(self.document.state_vector())).encode_v1()
    }

    /// Process one inbound frame and return the frames to send back to
    /// this peer. Any error means the connection must be terminated.
    pub fn handle_frame(&mut self, frame: &[u8]) -> SyncResult<Vec<Vec<u8>>> {
        if matches!(
            self.state,
            ConnectionState::Listening | ConnectionState::Closed
        ) {
            return Err(SyncError::Protocol(format!(
                "frame received while {:?}",
                self.state
            )));
        }

        let mut replies = Vec::new();
        for message in protocol::decode_frame(frame)? {
            match message {
                Message::Sync(SyncMessage::SyncStep1(state_vector)) => {
                    let diff = self.document.encode_diff(&state_vector);
                    replies.push(Message::Sync(SyncMessage::SyncStep2(diff)).encode_v1());
                }
                Message::Sync(SyncMessage::SyncStep2(update)) => {
                    self.document.apply_remote(self.id, &update)?;
                    if self.state == ConnectionState::Handshaking {
                        self.enter_synced();
                    }
                }
                Message::Sync(SyncMessage::Update(update)) => {
                    self.document.apply_remote(self.id, &update)?;
                }
                Message::Awareness(update) => self.document.publish_awareness(self.id, update),
                Message::AwarenessQuery => {}
                Message::Auth(_) | Message::Custom(..) => {
                    return Err(SyncError::Protocol("unsupported message".into()))
                }
            }
        }
        Ok(replies)
    }

    fn enter_synced(&mut self) {
        self.state = ConnectionState::Synced;
        if self.document.ensure_schema() {
            debug!(tree_id = %self.tree_id(), "Backfilled document metadata");
        }
        info!(tree_id = %self.tree_id(), connection_id = %self.id, "Connection synced");
    }

    /// Frame to forward for a relayed event, or `None` when this
    /// connection originated it
    pub fn relay(&self, event: &Relay) -> Option<Vec<u8>> {
        if self.state == ConnectionState::Closed || event.origin == Some(self.id) {
            return None;
        }
        let message = match &event.frame {
            RelayFrame::Update(update) => Message::Sync(SyncMessage::Update(update.to_vec())),
            RelayFrame::Awareness(update) => Message::Awareness(update.as_ref().clone()),
        };
        Some(message.encode_v1())
    }

    /// Full document state, sent when this connection fell behind the relay
    pub fn resync_frame(&self) -> Vec<u8> {
        Message::Sync(SyncMessage::SyncStep2(self.document.encode_state())).encode_v1()
    }

    pub fn close(&mut self) {
        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Closed;
            info!(tree_id = %self.tree_id(), connection_id = %self.id, "Connection closed");
        }
    }
}

/// Accepts realtime connections and binds them to tree documents
pub struct SyncGateway {
    registry: Arc<DocumentRegistry>,
    metadata: Arc<TreeMetadataManager>,
    gc_enabled: bool,
}

impl SyncGateway {
    pub fn new(
        registry: Arc<DocumentRegistry>,
        metadata: Arc<TreeMetadataManager>,
        gc_enabled: bool,
    ) -> Self {
        Self {
            registry,
            metadata,
            gc_enabled,
        }
    }

    /// Tree id from a connection target such as `/abc?token=x`
    pub fn parse_target(target: &str) -> Option<TreeId> {
        let path = target.split(['?', '#']).next().unwrap_or_default();
        TreeId::parse(path.strip_prefix('/').unwrap_or(path))
    }

    /// Resolve the target's document and subscribe to it. The returned
    /// connection is still `Listening`.
    pub fn connect(
        &self,
        target: &str,
    ) -> SyncResult<(SyncConnection, broadcast::Receiver<Relay>)> {
        let tree_id =
            Self::parse_target(target).ok_or_else(|| SyncError::Refused(target.to_string()))?;
        let document = self.registry.get_or_create(&tree_id, self.gc_enabled);
        self.metadata.update_last_accessed(&tree_id);

        let relay = document.subscribe();
        let connection = SyncConnection::new(document);
        info!(
            tree_id = %tree_id,
            connection_id = %connection.id(),
            subscribers = connection.document().subscriber_count(),
            "Connection opened"
        );
        Ok((connection, relay))
    }

    /// Drive one connection until either side goes away.
    ///
    /// `inbound` yields binary frames from the peer; `outbound` carries
    /// frames to it. Protocol errors end the connection without an in-band
    /// error message.
    pub async fn serve<I, O>(&self, target: &str, mut inbound: I, mut outbound: O)
    where
        I: Stream<Item = Vec<u8>> + Unpin,
        O: Sink<Vec<u8>> + Unpin,
        O::Error: fmt::Display,
    {
        let (mut connection, mut relay) = match self.connect(target) {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(path = target, error = %err, "Refusing realtime connection");
                let _ = outbound.close().await;
                return;
            }
        };

        let opening = connection.begin_handshake();
        if let Err(err) = outbound.send(opening).await {
            debug!(connection_id = %connection.id(), error = %err, "Peer gone before handshake");
            connection.close();
            return;
        }

        loop {
            tokio::select! {
                frame = inbound.next() => {
                    let Some(frame) = frame else { break };
                    let replies = match connection.handle_frame(&frame) {
                        Ok(replies) => replies,
                        Err(err) => {
                            warn!(connection_id = %connection.id(), error = %err, "Terminating connection");
                            break;
                        }
                    };
                    if send_all(&mut outbound, replies).await.is_err() {
                        break;
                    }
                }
                event = relay.recv() => {
                    let frame = match event {
                        Ok(event) => connection.relay(&event),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(connection_id = %connection.id(), skipped, "Subscriber lagged, resending state");
                            Some(connection.resync_frame())
                        }
                        Err(RecvError::Closed) => break,
                    };
                    if let Some(frame) = frame {
                        if outbound.send(frame).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        drop(relay);
        connection.close();
        let _ = outbound.close().await;
    }
}

async fn send_all<O>(outbound: &mut O, frames: Vec<Vec<u8>>) -> Result<(), O::Error>
where
    O: Sink<Vec<u8>> + Unpin,
{
    for frame in frames {
        outbound.send(frame).await?;
    }
    Ok(())
}
