//! Integration tests for the packet server over real WebSocket connections.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use wsps::prelude::*;

// =========================================================================
// Records
// =========================================================================

record! {
    #[derive(Debug, Clone, PartialEq)]
    struct TestNest {
        name: String,
        value: u8,
    }
}

record! {
    #[derive(Debug, Clone, PartialEq)]
    struct TestPacket {
        name: String,
        user: u8,
        values: Vec<TestNest>,
    }
}

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const HELLO: u64 = 1;
const TEST: u64 = 2;

fn test_packet() -> TestPacket {
    TestPacket {
        name: "Jacob".into(),
        user: 2,
        values: vec![
            TestNest {
                name: "HI".into(),
                value: 12,
            },
            TestNest {
                name: "HI 2".into(),
                value: 15,
            },
        ],
    }
}

struct TestServer {
    addr: String,
    seen: mpsc::UnboundedReceiver<TestPacket>,
    errors: mpsc::UnboundedReceiver<WspsError>,
}

async fn start_server() -> (String, mpsc::UnboundedReceiver<TestPacket>) {
    let server = start_server_with(Duration::from_secs(10)).await;
    (server.addr, server.seen)
}

/// Starts a server on a random port. Every `TestPacket` it receives is
/// forwarded to `seen` and echoed back to the sender, and every reported
/// error is forwarded to `errors`. Each new connection is greeted with a
/// `HELLO` packet.
async fn start_server_with(handshake_timeout: Duration) -> TestServer {
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let (errors_tx, errors_rx) = mpsc::unbounded_channel();

    let mut system: PacketSystem<WebSocketConnection> = PacketSystem::new();
    system
        .add_handler(TEST, move |conn, packet: TestPacket| {
            let _ = seen_tx.send(packet.clone());
            async move {
                conn.send(TEST, &packet).await;
            }
        })
        .set_error_handler(move |err| {
            let _ = errors_tx.send(err);
        });

    let server = PacketServer::builder()
        .bind("127.0.0.1:0")
        .handshake_timeout(handshake_timeout)
        .build(system)
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server
            .run(|conn| async move {
                conn.send(
                    HELLO,
                    &TestNest {
                        name: "welcome".into(),
                        value: 1,
                    },
                )
                .await;
            })
            .await;
    });

    TestServer {
        addr,
        seen: seen_rx,
        errors: errors_rx,
    }
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

/// Reads the next binary message, skipping anything else.
async fn next_binary(ws: &mut ClientWs) -> Vec<u8> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("message should arrive")
            .expect("stream should be open")
            .expect("message should be valid");
        if let Message::Binary(data) = msg {
            return data.to_vec();
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_on_open_packet_reaches_client() {
    let (addr, _seen) = start_server().await;
    let mut ws = connect(&addr).await;

    let bytes = next_binary(&mut ws).await;
    assert_eq!(
        bytes,
        [0x01, 0x07, b'w', b'e', b'l', b'c', b'o', b'm', b'e', 0x01]
    );
}

#[tokio::test]
async fn test_client_packet_reaches_handler_and_echoes() {
    let (addr, mut seen) = start_server().await;
    let mut ws = connect(&addr).await;
    let _hello = next_binary(&mut ws).await;

    let bytes = Packet::new(TEST, test_packet()).to_bytes();
    ws.send(Message::Binary(bytes.clone().into())).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), seen.recv())
        .await
        .expect("handler should run")
        .expect("channel open");
    assert_eq!(received, test_packet());

    let echoed = next_binary(&mut ws).await;
    assert_eq!(echoed, bytes);
}

#[tokio::test]
async fn test_unknown_and_text_messages_do_not_close_connection() {
    let (addr, mut seen) = start_server().await;
    let mut ws = connect(&addr).await;
    let _hello = next_binary(&mut ws).await;

    ws.send(Message::Binary(vec![0x63, 0x00].into())).await.unwrap();
    ws.send(Message::Text("ignored".into())).await.unwrap();
    ws.send(Message::Binary(Packet::new(TEST, test_packet()).to_bytes().into()))
        .await
        .unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), seen.recv())
        .await
        .expect("handler should run")
        .expect("channel open");
    assert_eq!(received, test_packet());
}

#[tokio::test]
async fn test_connections_are_independent() {
    let (addr, mut seen) = start_server().await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    let _ = next_binary(&mut a).await;
    let _ = next_binary(&mut b).await;

    a.send(Message::Close(None)).await.unwrap();

    let bytes = Packet::new(TEST, test_packet()).to_bytes();
    b.send(Message::Binary(bytes.clone().into())).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), seen.recv())
        .await
        .expect("handler should run")
        .expect("channel open");
    assert_eq!(received, test_packet());
    assert_eq!(next_binary(&mut b).await, bytes);
}

#[tokio::test]
async fn test_idle_handshake_does_not_block_other_clients() {
    let (addr, _seen) = start_server().await;

    // Opens TCP but never sends the upgrade request.
    let _idle = TcpStream::connect(&addr).await.expect("should connect");

    let (mut ws, _) = tokio::time::timeout(
        Duration::from_secs(2),
        tokio_tungstenite::connect_async(format!("ws://{addr}")),
    )
    .await
    .expect("second client should not wait on the first")
    .expect("should connect");
    let _hello = next_binary(&mut ws).await;
}

#[tokio::test]
async fn test_failed_upgrade_is_reported_and_server_keeps_accepting() {
    let mut server = start_server_with(Duration::from_secs(10)).await;

    let mut garbage = TcpStream::connect(&server.addr)
        .await
        .expect("should connect");
    garbage
        .write_all(b"this is not http\r\n\r\n")
        .await
        .unwrap();

    let err = tokio::time::timeout(Duration::from_secs(2), server.errors.recv())
        .await
        .expect("failure should be reported")
        .expect("channel open");
    assert!(matches!(
        err,
        WspsError::Transport(TransportError::AcceptFailed(_))
    ));

    let mut ws = connect(&server.addr).await;
    let _hello = next_binary(&mut ws).await;
}

#[tokio::test]
async fn test_stalled_upgrade_times_out() {
    let mut server = start_server_with(Duration::from_millis(100)).await;

    let _idle = TcpStream::connect(&server.addr)
        .await
        .expect("should connect");

    let err = tokio::time::timeout(Duration::from_secs(2), server.errors.recv())
        .await
        .expect("timeout should be reported")
        .expect("channel open");
    match err {
        WspsError::Transport(TransportError::AcceptFailed(io)) => {
            assert_eq!(io.kind(), std::io::ErrorKind::TimedOut);
        }
        other => panic!("unexpected error: {other}"),
    }
}
