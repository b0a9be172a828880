//! A minimal client replica speaking the sync protocol, used to exercise
//! the gateway the way a browser provider would.

#![allow(dead_code)]

use arbor_sync::protocol::{self, Message, SyncMessage};
use arbor_sync::schema::{self, Roots};
use arbor_sync::{NodePatch, Relay, RelayFrame, TreeDocument};
use serde_json::Value;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{Doc, ReadTxn, Transact, Update};

pub struct Peer {
    doc: Doc,
}

impl Peer {
    pub fn new() -> Self {
        Self { doc: Doc::new() }
    }

    /// Step 1 a provider sends as soon as the socket opens
    pub fn hello(&self) -> Vec<u8> {
        let sv = self.doc.transact().state_vector();
        Message::Sync(SyncMessage::SyncStep1(sv)).encode_v1()
    }

    /// Handle a server frame, returning the replies
    pub fn receive(&self, frame: &[u8]) -> Vec<Vec<u8>> {
        let mut replies = Vec::new();
        for message in protocol::decode_frame(frame).expect("server sent a malformed frame") {
            match message {
                Message::Sync(SyncMessage::SyncStep1(sv)) => {
                    let diff = self.doc.transact().encode_state_as_update_v1(&sv);
                    replies.push(Message::Sync(SyncMessage::SyncStep2(diff)).encode_v1());
                }
                Message::Sync(SyncMessage::SyncStep2(update))
                | Message::Sync(SyncMessage::Update(update)) => self.apply(&update),
                _ => {}
            }
        }
        replies
    }

    pub fn apply(&self, update: &[u8]) {
        let update = Update::decode_v1(update).unwrap();
        self.doc.transact_mut().apply_update(update).unwrap();
    }

    /// Rename a node locally and return the update frame to send
    pub fn rename(&self, node_id: &str, title: &str) -> Vec<u8> {
        let roots = Roots::of(&self.doc);
        let mut txn = self.doc.transact_mut();
        assert!(schema::set_node_title(&mut txn, &roots, node_id, title));
        let update = txn.encode_update_v1();
        Message::Sync(SyncMessage::Update(update)).encode_v1()
    }

    pub fn title(&self, node_id: &str) -> Option<String> {
        let roots = Roots::of(&self.doc);
        let txn = self.doc.transact();
        schema::read_node(&txn, &roots, node_id).and_then(|node| node.title)
    }

    pub fn snapshot(&self) -> Value {
        let roots = Roots::of(&self.doc);
        let txn = self.doc.transact();
        schema::snapshot(&txn, &roots)
    }
}

pub fn sample_patch() -> NodePatch {
    NodePatch::from_value(serde_json::json!({
        "id": "r1",
        "title": "Root",
        "children": [{ "id": "c1", "title": "Child", "type": "text", "content": "draft" }]
    }))
    .unwrap()
}

/// Run `mutate` and capture the update it broadcast
pub fn captured_update(document: &TreeDocument, mutate: impl FnOnce(&TreeDocument)) -> Vec<u8> {
    let mut rx = document.subscribe();
    mutate(document);
    match rx.try_recv() {
        Ok(Relay {
            frame: RelayFrame::Update(update),
            ..
        }) => update.to_vec(),
        other => panic!("mutation produced no update: {other:?}"),
    }
}
