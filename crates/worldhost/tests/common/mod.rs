//! Shared helpers for the worldhost integration tests.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use worldhost::prelude::*;
use worldhost::{FORCE_SAFE_CHAT, StoreConfig};

pub type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A loopback config with one worker per instance and chat set to `chat`.
pub fn config(chat: &str) -> Config {
    let mut config = Config::new("unused.json");
    config.bind_host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.workers_per_instance = 1;
    config.properties = Properties::new().with(FORCE_SAFE_CHAT, chat);
    config
}

/// Boots against an in-memory store. Port 0 rows get ephemeral ports.
pub fn boot_memory(records: Vec<ServerRecord>, config: Config) -> (Booted, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new(records));
    let booted = BootSequencer::new(ConfigSource::Inline(config))
        .store_connector(Arc::clone(&store))
        .boot()
        .expect("boot should succeed");
    (booted, store)
}

pub fn store_config(path: &std::path::Path) -> StoreConfig {
    StoreConfig {
        path: path.to_path_buf(),
    }
}

pub fn addr_of(booted: &Booted, id: u32) -> SocketAddr {
    booted
        .registry
        .get(ServerId(id))
        .and_then(|s| s.local_addr())
        .expect("instance should be listening")
}

pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("client runtime")
}

pub async fn connect(addr: SocketAddr) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

pub async fn send(ws: &mut ClientWs, msg: &ClientMessage) {
    let text = serde_json::to_string(msg).expect("encode");
    ws.send(Message::text(text)).await.expect("send");
}

/// Next server message, failing the test after two seconds.
pub async fn recv(ws: &mut ClientWs) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for server message")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Text(_) | Message::Binary(_) => {
                return serde_json::from_slice(&msg.into_data()).expect("decode");
            }
            Message::Close(_) => panic!("connection closed while waiting for a message"),
            _ => continue,
        }
    }
}

/// Connects and logs in; returns the socket after the `Welcome`.
pub async fn login(addr: SocketAddr, user_id: u64, name: &str) -> (ClientWs, ServerMessage) {
    let mut ws = connect(addr).await;
    send(
        &mut ws,
        &ClientMessage::Login {
            user_id: UserId(user_id),
            name: name.into(),
        },
    )
    .await;
    let welcome = recv(&mut ws).await;
    (ws, welcome)
}

/// Polls until `check` holds, for up to two seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
