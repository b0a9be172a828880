//! End-to-end behaviour of the sync gateway

mod support;

use arbor_core::{TreeId, TreeMetadataManager};
use arbor_sync::protocol::{AwarenessUpdate, Message};
use arbor_sync::{patch, ConnectionState, DocumentRegistry, Relay, SyncConnection, SyncGateway};
use futures::channel::mpsc;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use support::{sample_patch, Peer};
use tokio::sync::broadcast;
use yrs::sync::awareness::AwarenessUpdateEntry;
use yrs::updates::encoder::Encode;

struct Fixture {
    registry: Arc<DocumentRegistry>,
    metadata: Arc<TreeMetadataManager>,
    gateway: Arc<SyncGateway>,
}

fn fixture() -> Fixture {
    fixture_with(DocumentRegistry::default())
}

fn fixture_with(registry: DocumentRegistry) -> Fixture {
    let registry = Arc::new(registry);
    let metadata = Arc::new(TreeMetadataManager::new());
    let gateway = Arc::new(SyncGateway::new(
        Arc::clone(&registry),
        Arc::clone(&metadata),
        true,
    ));
    Fixture {
        registry,
        metadata,
        gateway,
    }
}

fn tree(raw: &str) -> TreeId {
    TreeId::parse(raw).unwrap()
}

/// A connection wired directly to a peer, with frames pumped synchronously
struct Link {
    connection: SyncConnection,
    relay: broadcast::Receiver<Relay>,
    peer: Peer,
}

impl Link {
    fn open(gateway: &SyncGateway, target: &str) -> Self {
        let (mut connection, relay) = gateway.connect(target).unwrap();
        let opening = connection.begin_handshake();
        let mut link = Link {
            connection,
            relay,
            peer: Peer::new(),
        };
        let hello = link.peer.hello();
        link.to_server(hello);
        link.to_peer(opening);
        link
    }

    fn to_server(&mut self, frame: Vec<u8>) {
        for reply in self.connection.handle_frame(&frame).unwrap() {
            self.to_peer(reply);
        }
    }

    fn to_peer(&mut self, frame: Vec<u8>) {
        for reply in self.peer.receive(&frame) {
            self.to_server(reply);
        }
    }

    fn drain_relay(&mut self) {
        while let Ok(event) = self.relay.try_recv() {
            if let Some(frame) = self.connection.relay(&event) {
                self.to_peer(frame);
            }
        }
    }
}

#[test]
fn test_two_connections_see_rename_after_one_round() {
    let fx = fixture();
    let document = fx.registry.get_or_create(&tree("t1"), true);
    patch::seed(&document, &sample_patch(), None).unwrap();
    assert_eq!(document.root_id().as_deref(), Some("r1"));

    let mut a = Link::open(&fx.gateway, "/t1");
    let mut b = Link::open(&fx.gateway, "/t1");
    assert_eq!(a.connection.state(), ConnectionState::Synced);
    assert_eq!(b.connection.state(), ConnectionState::Synced);
    assert_eq!(a.peer.title("c1").as_deref(), Some("Child"));
    assert_eq!(b.peer.title("c1").as_deref(), Some("Child"));

    let rename = a.peer.rename("c1", "Renamed");
    a.to_server(rename);
    a.drain_relay();
    b.drain_relay();

    assert_eq!(a.peer.title("c1").as_deref(), Some("Renamed"));
    assert_eq!(b.peer.title("c1").as_deref(), Some("Renamed"));
    assert_eq!(document.node("c1").unwrap().title.as_deref(), Some("Renamed"));
    assert_eq!(a.peer.snapshot(), document.snapshot());
    assert_eq!(b.peer.snapshot(), document.snapshot());
}

#[test]
fn test_update_not_echoed_to_sender() {
    let fx = fixture();
    let document = fx.registry.get_or_create(&tree("t1"), true);
    patch::seed(&document, &sample_patch(), None).unwrap();
    let mut a = Link::open(&fx.gateway, "/t1");
    a.drain_relay();

    let rename = a.peer.rename("c1", "Mine");
    a.to_server(rename);
    let event = a.relay.try_recv().unwrap();
    assert_eq!(event.origin, Some(a.connection.id()));
    assert!(a.connection.relay(&event).is_none());
}

#[test]
fn test_unknown_tree_created_lazily_and_backfilled() {
    let fx = fixture();
    let link = Link::open(&fx.gateway, "/fresh-tree");
    assert_eq!(link.connection.state(), ConnectionState::Synced);

    let document = fx.registry.get(&tree("fresh-tree")).unwrap();
    assert_eq!(document.node_count(), 0);
    assert_eq!(
        document.snapshot(),
        serde_json::json!({ "nodes": {}, "metadata": { "version": 1 } })
    );
    // no metadata record is invented for a lazily created tree
    assert!(fx.metadata.get_tree(&tree("fresh-tree")).is_none());
}

#[test]
fn test_connect_touches_last_accessed() {
    let fx = fixture();
    let created = fx.metadata.create_tree(tree("t1"), "alice", "Root", 2);
    std::thread::sleep(Duration::from_millis(2));
    let _link = Link::open(&fx.gateway, "/t1");
    let touched = fx.metadata.get_tree(&tree("t1")).unwrap();
    assert!(touched.last_accessed > created.last_accessed);
}

#[test]
fn test_corrupt_frame_is_an_error() {
    let fx = fixture();
    let mut link = Link::open(&fx.gateway, "/t1");
    assert!(link.connection.handle_frame(&[0, 2, 3, 0xff, 0xff, 0xff]).is_err());
    assert!(link.connection.handle_frame(&[7]).is_err());
}

#[test]
fn test_awareness_relayed_to_others_only() {
    let fx = fixture();
    let mut a = Link::open(&fx.gateway, "/t1");
    let mut b = Link::open(&fx.gateway, "/t1");
    a.drain_relay();
    b.drain_relay();

    let presence = Message::Awareness(AwarenessUpdate {
        clients: HashMap::from([(
            42,
            AwarenessUpdateEntry {
                clock: 1,
                json: Arc::from(r#"{"cursor":"c1"}"#),
            },
        )]),
    })
    .encode_v1();
    a.connection.handle_frame(&presence).unwrap();

    let to_a = a.relay.try_recv().unwrap();
    assert!(a.connection.relay(&to_a).is_none());
    let to_b = b.relay.try_recv().unwrap();
    assert_eq!(b.connection.relay(&to_b), Some(presence));
}

type Client = (
    Peer,
    mpsc::UnboundedSender<Vec<u8>>,
    mpsc::UnboundedReceiver<Vec<u8>>,
);

fn spawn_connection(
    gateway: &Arc<SyncGateway>,
    target: &'static str,
) -> (Client, tokio::task::JoinHandle<()>) {
    let (to_server, server_in) = mpsc::unbounded::<Vec<u8>>();
    let (server_out, from_server) = mpsc::unbounded::<Vec<u8>>();
    let gateway = Arc::clone(gateway);
    let handle = tokio::spawn(async move {
        gateway.serve(target, server_in, server_out).await;
    });
    let peer = Peer::new();
    to_server.unbounded_send(peer.hello()).unwrap();
    ((peer, to_server, from_server), handle)
}

async fn pump_until(client: &mut Client, done: impl Fn(&Peer) -> bool) {
    let (peer, tx, rx) = client;
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done(peer) {
            let frame = rx.next().await.expect("server closed the connection");
            for reply in peer.receive(&frame) {
                tx.unbounded_send(reply).unwrap();
            }
        }
    })
    .await
    .expect("timed out waiting for sync");
}

#[tokio::test]
async fn test_serve_relays_between_async_connections() {
    let fx = fixture();
    let document = fx.registry.get_or_create(&tree("t1"), true);
    patch::seed(&document, &sample_patch(), None).unwrap();

    let (mut a, handle_a) = spawn_connection(&fx.gateway, "/t1");
    let (mut b, handle_b) = spawn_connection(&fx.gateway, "/t1");
    pump_until(&mut a, |peer| peer.title("c1").is_some()).await;
    pump_until(&mut b, |peer| peer.title("c1").is_some()).await;

    let rename = a.0.rename("c1", "Renamed");
    a.1.unbounded_send(rename).unwrap();
    pump_until(&mut b, |peer| peer.title("c1").as_deref() == Some("Renamed")).await;
    assert_eq!(document.node("c1").unwrap().title.as_deref(), Some("Renamed"));

    // server-side mutations reach every peer
    document.set_node_title("r1", "From server");
    pump_until(&mut a, |peer| peer.title("r1").as_deref() == Some("From server")).await;
    pump_until(&mut b, |peer| peer.title("r1").as_deref() == Some("From server")).await;

    drop(a);
    drop(b);
    handle_a.await.unwrap();
    handle_b.await.unwrap();
    assert_eq!(document.subscriber_count(), 0);
}

#[tokio::test]
async fn test_serve_refuses_placeholder_target() {
    let fx = fixture();
    let (to_server, server_in) = mpsc::unbounded::<Vec<u8>>();
    let (server_out, mut from_server) = mpsc::unbounded::<Vec<u8>>();
    fx.gateway.serve("/undefined", server_in, server_out).await;

    assert!(from_server.next().await.is_none());
    assert!(to_server.is_closed());
    assert!(fx.registry.is_empty());
}

#[tokio::test]
async fn test_serve_terminates_on_protocol_error() {
    let fx = fixture();
    let (to_server, server_in) = mpsc::unbounded::<Vec<u8>>();
    let (server_out, mut from_server) = mpsc::unbounded::<Vec<u8>>();
    to_server.unbounded_send(vec![9, 9, 9]).unwrap();

    tokio::time::timeout(
        Duration::from_secs(5),
        fx.gateway.serve("/t1", server_in, server_out),
    )
    .await
    .expect("connection should terminate");

    // only the opening step 1 was sent before termination
    assert!(from_server.next().await.is_some());
    assert!(from_server.next().await.is_none());
    let document = fx.registry.get(&tree("t1")).unwrap();
    assert_eq!(document.subscriber_count(), 0);
}

#[tokio::test]
async fn test_lagged_connection_resyncs_full_state() {
    // room for a single buffered relay frame per document
    let fx = fixture_with(DocumentRegistry::new(1));
    let document = fx.registry.get_or_create(&tree("t1"), true);
    patch::seed(&document, &sample_patch(), None).unwrap();

    let (mut a, handle) = spawn_connection(&fx.gateway, "/t1");
    pump_until(&mut a, |peer| peer.title("r1").is_some()).await;

    // the serve task does not run in between, so its receiver falls behind
    for title in ["first", "second", "third"] {
        assert!(document.set_node_title("r1", title));
    }
    pump_until(&mut a, |peer| peer.title("r1").as_deref() == Some("third")).await;
    assert_eq!(a.0.snapshot(), document.snapshot());

    drop(a);
    handle.await.unwrap();
}
