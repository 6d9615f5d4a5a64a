//! End-to-end chat flows against real servers on ephemeral ports.
//!
//! Every instance uses the in-memory store and attaches to a shared
//! in-process bus, so two instances in one test behave like two relay
//! processes behind one Redis.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use chat_relay::auth::JwtService;
use chat_relay::bridge::LocalBus;
use chat_relay::config::SessionSettings;
use chat_relay::persistence::{ChatStore, MemoryStore, UserStore};
use chat_relay::server::{build_app, build_state, start_runtime};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(2);

struct Cluster {
    bus: LocalBus,
    store: Arc<MemoryStore>,
    jwt: Arc<JwtService>,
    http: reqwest::Client,
}

impl Cluster {
    fn new() -> Self {
        Self {
            bus: LocalBus::default(),
            store: Arc::new(MemoryStore::new()),
            jwt: Arc::new(JwtService::new("integration-secret", 1)),
            http: reqwest::Client::new(),
        }
    }

    async fn spawn_instance(&self) -> SocketAddr {
        let (client, stream) = self.bus.connect();
        let runtime = start_runtime(
            Arc::clone(&self.store) as Arc<dyn ChatStore>,
            Arc::new(client),
            stream,
            true,
        );
        let state = build_state(
            runtime.hub,
            Arc::clone(&self.store) as Arc<dyn ChatStore>,
            Arc::clone(&self.store) as Arc<dyn UserStore>,
            Arc::clone(&self.jwt),
            SessionSettings::default(),
            50,
        );

        let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local address");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, build_app(state)).await;
        });
        addr
    }

    async fn post(
        &self,
        addr: SocketAddr,
        path: &str,
        token: Option<&str>,
        body: Value,
    ) -> (u16, Value) {
        let mut request = self.http.post(format!("http://{addr}{path}")).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let Ok(response) = request.send().await else {
            panic!("POST {path} failed");
        };
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, addr: SocketAddr, path: &str, token: Option<&str>) -> (u16, Value) {
        let mut request = self.http.get(format!("http://{addr}{path}"));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let Ok(response) = request.send().await else {
            panic!("GET {path} failed");
        };
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    /// Registers and logs in, returning `(user id, token)`.
    async fn sign_up(&self, addr: SocketAddr, name: &str) -> (i64, String) {
        let creds = json!({ "username": name, "password": "secret" });
        let (status, _) = self.post(addr, "/register", None, creds.clone()).await;
        assert_eq!(status, 201);
        let (status, body) = self.post(addr, "/login", None, creds).await;
        assert_eq!(status, 200);
        let (Some(id), Some(token)) = (body["id"].as_i64(), body["access_token"].as_str()) else {
            panic!("login response incomplete: {body}");
        };
        (id, token.to_string())
    }

    /// Polls `/health` until the instance reports `expected` sessions.
    async fn wait_for_sessions(&self, addr: SocketAddr, expected: u64) {
        for _ in 0..100 {
            let (_, body) = self.get(addr, "/health", None).await;
            if body["connected_sessions"].as_u64() == Some(expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("instance {addr} never reached {expected} sessions");
    }
}

async fn connect(addr: SocketAddr, token: &str) -> Client {
    let Ok((socket, _)) = connect_async(format!("ws://{addr}/ws?token={token}")).await else {
        panic!("websocket upgrade failed");
    };
    socket
}

async fn next_payload(socket: &mut Client) -> Value {
    loop {
        let Ok(Some(Ok(message))) = tokio::time::timeout(WAIT, socket.next()).await else {
            panic!("expected a chat frame");
        };
        match message {
            Message::Text(text) => {
                let Ok(payload) = serde_json::from_str(text.as_str()) else {
                    panic!("frame is not json: {text}");
                };
                return payload;
            }
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

async fn start_conversation(cluster: &Cluster, addr: SocketAddr, token: &str, target: i64) -> i64 {
    let (status, body) = cluster
        .post(addr, "/api/v1/conversations", Some(token), json!({ "target_id": target }))
        .await;
    assert_eq!(status, 200);
    let Some(id) = body["conversation_id"].as_i64() else {
        panic!("conversation id missing: {body}");
    };
    id
}

#[tokio::test]
async fn two_users_chat_on_one_instance() {
    let cluster = Cluster::new();
    let addr = cluster.spawn_instance().await;
    let (_, alice_token) = cluster.sign_up(addr, "alice").await;
    let (bob_id, bob_token) = cluster.sign_up(addr, "bob").await;
    let conversation = start_conversation(&cluster, addr, &alice_token, bob_id).await;

    let mut alice = connect(addr, &alice_token).await;
    let mut bob = connect(addr, &bob_token).await;
    cluster.wait_for_sessions(addr, 2).await;

    let frame = json!({ "conversation_id": conversation, "content": "hi" }).to_string();
    let Ok(()) = alice.send(Message::text(frame)).await else {
        panic!("send failed");
    };

    for socket in [&mut bob, &mut alice] {
        let payload = next_payload(socket).await;
        assert_eq!(payload["content"], "hi");
        assert_eq!(payload["username"], "alice");
        assert_eq!(payload["conversation_id"], conversation);
    }

    let (status, history) = cluster
        .get(addr, &format!("/api/v1/conversations/{conversation}/messages"), Some(&bob_token))
        .await;
    assert_eq!(status, 200);
    assert_eq!(history.as_array().map(Vec::len), Some(1));
    assert_eq!(history[0]["content"], "hi");
}

#[tokio::test]
async fn delivery_crosses_instances() {
    let cluster = Cluster::new();
    let a = cluster.spawn_instance().await;
    let b = cluster.spawn_instance().await;
    let (_, alice_token) = cluster.sign_up(a, "alice").await;
    let (bob_id, bob_token) = cluster.sign_up(b, "bob").await;
    let conversation = start_conversation(&cluster, a, &alice_token, bob_id).await;

    let mut alice = connect(a, &alice_token).await;
    let mut bob = connect(b, &bob_token).await;
    cluster.wait_for_sessions(a, 1).await;
    cluster.wait_for_sessions(b, 1).await;

    let frame = json!({ "conversation_id": conversation, "content": "across" }).to_string();
    let Ok(()) = alice.send(Message::text(frame)).await else {
        panic!("send failed");
    };

    assert_eq!(next_payload(&mut bob).await["content"], "across");
    assert_eq!(next_payload(&mut alice).await["content"], "across");
}

#[tokio::test]
async fn announcements_reach_every_instance() {
    let cluster = Cluster::new();
    let a = cluster.spawn_instance().await;
    let b = cluster.spawn_instance().await;
    let (_, alice_token) = cluster.sign_up(a, "alice").await;
    let (_, bob_token) = cluster.sign_up(b, "bob").await;

    let mut alice = connect(a, &alice_token).await;
    let mut bob = connect(b, &bob_token).await;
    cluster.wait_for_sessions(a, 1).await;
    cluster.wait_for_sessions(b, 1).await;

    let (status, _) = cluster
        .post(b, "/api/v1/announcements", Some(&bob_token), json!({ "content": "deploy at 5" }))
        .await;
    assert_eq!(status, 202);

    for socket in [&mut alice, &mut bob] {
        let payload = next_payload(socket).await;
        assert_eq!(payload["conversation_id"], 0);
        assert_eq!(payload["content"], "deploy at 5");
    }
}

#[tokio::test]
async fn oversized_frame_ends_the_session() {
    let cluster = Cluster::new();
    let addr = cluster.spawn_instance().await;
    let (_, token) = cluster.sign_up(addr, "alice").await;
    let mut socket = connect(addr, &token).await;
    cluster.wait_for_sessions(addr, 1).await;

    let frame = json!({ "conversation_id": 1, "content": "x".repeat(600) }).to_string();
    let _ = socket.send(Message::text(frame)).await;

    let ended = tokio::time::timeout(WAIT, async {
        loop {
            match socket.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "server should close the connection");
    cluster.wait_for_sessions(addr, 0).await;
}

#[tokio::test]
async fn upgrade_without_token_is_rejected() {
    let cluster = Cluster::new();
    let addr = cluster.spawn_instance().await;

    assert!(connect_async(format!("ws://{addr}/ws")).await.is_err());
    assert!(connect_async(format!("ws://{addr}/ws?token=forged")).await.is_err());
}
