//! WebSocket sessions over a real listener

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use camrelay::{RelayServer, ServerConfig};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Running {
    server: Arc<RelayServer>,
    addr: SocketAddr,
    _shutdown: oneshot::Sender<()>,
    _dir: tempfile::TempDir,
}

async fn start() -> Running {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig::default().config_path(dir.path().join("config.json"));
    let server = Arc::new(RelayServer::new(config).await);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown, stop) = oneshot::channel::<()>();

    let serving = Arc::clone(&server);
    tokio::spawn(async move {
        serving
            .serve(listener, async {
                let _ = stop.await;
            })
            .await
    });

    Running {
        server,
        addr,
        _shutdown: shutdown,
        _dir: dir,
    }
}

impl Running {
    async fn connect(&self, identify: &str) -> Client {
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", self.addr))
            .await
            .unwrap();
        ws.send(Message::Text(identify.into())).await.unwrap();
        ws
    }

    async fn wait_for_consumers(&self, expected: usize) {
        let registry = self.server.state().registry();
        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.consumer_count().await != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("consumer count never reached {}", expected));
    }

    async fn wait_for_producer(&self) {
        let registry = self.server.state().registry();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !registry.has_producer().await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("producer never registered");
    }
}

/// Next data or close frame, skipping ping/pong
async fn next_frame(ws: &mut Client) -> Message {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("no frame received")
            .expect("stream ended")
            .expect("websocket error");
        match frame {
            Message::Ping(_) | Message::Pong(_) => continue,
            other => return other,
        }
    }
}

fn close_of(frame: Message) -> (u16, String) {
    match frame {
        Message::Close(Some(close)) => (u16::from(close.code), close.reason.as_str().to_string()),
        other => panic!("expected close frame, got {:?}", other),
    }
}

#[tokio::test]
async fn superseded_producer_gets_normal_close() {
    let relay = start().await;

    let mut first = relay.connect(r#"{"type":"producer"}"#).await;
    relay.wait_for_producer().await;
    let _second = relay.connect(r#"{"type":"esp32"}"#).await;

    let (code, reason) = close_of(next_frame(&mut first).await);
    assert_eq!(code, 1000);
    assert_eq!(reason, "superseded by new producer");

    // The old connection's cleanup must not evict its replacement
    tokio::time::sleep(Duration::from_millis(100)).await;
    let state = relay.server.state();
    assert!(state.registry().has_producer().await);
    assert_eq!(state.stats().snapshot().producer_replacements, 1);
}

#[tokio::test]
async fn malformed_identification_gets_protocol_close() {
    let relay = start().await;

    let mut ws = relay.connect("{bad").await;

    let (code, reason) = close_of(next_frame(&mut ws).await);
    assert_eq!(code, 1002);
    assert_eq!(reason, "invalid message");

    let state = relay.server.state();
    assert_eq!(state.registry().consumer_count().await, 0);
    assert!(!state.registry().has_producer().await);
    assert_eq!(state.stats().snapshot().protocol_violations, 1);
}

#[tokio::test]
async fn unknown_type_gets_error_and_can_retry() {
    let relay = start().await;

    let mut ws = relay.connect(r#"{"type":"television"}"#).await;
    match next_frame(&mut ws).await {
        Message::Text(text) => assert_eq!(
            text.as_str(),
            r#"{"type":"error","message":"unknown client type"}"#
        ),
        other => panic!("expected error envelope, got {:?}", other),
    }

    ws.send(Message::Text(r#"{"type":"consumer"}"#.into()))
        .await
        .unwrap();
    relay.wait_for_consumers(1).await;
}

#[tokio::test]
async fn consumers_are_removed_on_drop_and_on_close() {
    let relay = start().await;

    let mut kept = relay.connect(r#"{"type":"consumer"}"#).await;
    let dropped = relay.connect(r#"{"type":"android"}"#).await;
    let mut closed = relay.connect(r#"{"type":"consumer"}"#).await;
    relay.wait_for_consumers(3).await;

    // Abrupt TCP drop without a close handshake
    drop(dropped);
    relay.wait_for_consumers(2).await;

    closed.close(None).await.unwrap();
    relay.wait_for_consumers(1).await;

    let report = relay
        .server
        .state()
        .ingestor
        .ingest(Bytes::from_static(b"frame"))
        .await
        .unwrap();
    assert_eq!(report.delivered, 1);

    match next_frame(&mut kept).await {
        Message::Text(text) => {
            let v: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            assert_eq!(v["type"], "image");
            assert_eq!(v["data"], "ZnJhbWU=");
        }
        other => panic!("expected image frame, got {:?}", other),
    }
}
