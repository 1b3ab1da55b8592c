use std::collections::HashMap;

use tracing_subscriber::EnvFilter;
use wsps::prelude::*;

// ---------------------------------------------------------------------------
// Packets
// ---------------------------------------------------------------------------

const WELCOME: u64 = 1;
const CHAT: u64 = 2;
const STATS: u64 = 3;

record! {
    /// Sent to every client when it connects.
    pub struct Welcome {
        pub connection: VarInt,
        pub motd: String,
    }
}

record! {
    /// Client → server chat line, echoed back unchanged.
    #[derive(Debug)]
    pub struct Chat {
        pub name: String,
        pub age: u8,
        pub text: String,
        pub attachment: Vec<u8>,
    }
}

record! {
    /// Server → client summary of the last chat line.
    pub struct Stats {
        pub words: u32,
        pub letters: HashMap<String, u32>,
    }
}

fn stats(text: &str) -> Stats {
    let mut letters = HashMap::new();
    for c in text.chars().filter(|c| c.is_alphabetic()) {
        *letters.entry(c.to_lowercase().to_string()).or_insert(0) += 1;
    }
    Stats {
        words: text.split_whitespace().count() as u32,
        letters,
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), WspsError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());

    let mut system: PacketSystem<WebSocketConnection> = PacketSystem::new();
    system
        .add_handler(CHAT, |conn, chat: Chat| async move {
            tracing::info!(conn_id = %conn.id(), name = %chat.name, "chat");
            conn.send(STATS, &stats(&chat.text)).await;
            conn.send(CHAT, &chat).await;
        })
        .set_error_handler(|err| tracing::warn!(error = %err, "packet error"));

    let server = PacketServer::builder()
        .config(ServerConfig {
            bind_addr: addr,
            ..ServerConfig::default()
        })
        .build(system)
        .await?;
    let local_addr = server.local_addr().map_err(TransportError::AcceptFailed)?;
    tracing::info!(addr = %local_addr, "echo server ready");

    server
        .run(|conn| async move {
            let welcome = Welcome {
                connection: VarInt(conn.id().into_inner()),
                motd: "send packet 2 to chat".into(),
            };
            conn.send(WELCOME, &welcome).await;
        })
        .await
}
