//! WebSocket bridge to a browser extension (or an embedding webview).
//!
//! The browser side connects to the bridge and receives requests such as
//! `{"id":"..","action":"eval","code":"..","await_promise":true}`. It answers
//! with `{"id":"..","ok":true,"result":..}` or `{"id":"..","ok":false,"error":".."}`.
//! Replies are matched to requests by id.

use std::{
    collections::{HashMap, HashSet},
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use uuid::Uuid;

use crate::errors::RelayError;
use crate::evaluator::ScriptEvaluator;

pub const DEFAULT_BRIDGE_ADDR: &str = "127.0.0.1:17373";

type BridgeResult = Result<serde_json::Value, String>;
type PendingMap = HashMap<String, oneshot::Sender<BridgeResult>>;
type Pending = Arc<Mutex<PendingMap>>;
type Clients = Arc<Mutex<Vec<Client>>>;

#[derive(Debug, Serialize, Deserialize)]
struct BridgeRequest {
    id: String,
    action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(default)]
    await_promise: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum BridgeIncoming {
    EvalResult {
        id: String,
        ok: bool,
        result: Option<serde_json::Value>,
        error: Option<String>,
    },
    Typed(TypedIncoming),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum TypedIncoming {
    #[serde(rename = "hello")]
    Hello { from: Option<String> },
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "console_event")]
    ConsoleEvent {
        level: Option<String>,
        args: Option<serde_json::Value>,
    },
}

struct Client {
    id: Uuid,
    sender: mpsc::UnboundedSender<Message>,
    /// Request ids sent to this client and not yet answered.
    in_flight: HashSet<String>,
}

pub struct ExtensionBridge {
    server_task: JoinHandle<()>,
    local_addr: SocketAddr,
    clients: Clients,
    pending: Pending,
}

impl ExtensionBridge {
    /// Binds the WebSocket listener and starts accepting browser clients.
    pub async fn start(addr: &str) -> Result<ExtensionBridge, RelayError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RelayError::Bridge(format!("failed to bind {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| RelayError::Bridge(format!("no local address: {e}")))?;
        tracing::info!("Browser bridge listening on ws://{}", local_addr);

        let clients: Clients = Arc::new(Mutex::new(Vec::new()));
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let server_task = tokio::spawn(accept_loop(listener, clients.clone(), pending.clone()));

        Ok(ExtensionBridge {
            server_task,
            local_addr,
            clients,
            pending,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn is_client_connected(&self) -> bool {
        !self.clients.lock().await.is_empty()
    }

    async fn request(
        &self,
        action: &str,
        code: Option<&str>,
        timeout: Duration,
    ) -> Result<serde_json::Value, RelayError> {
        let id = Uuid::new_v4().to_string();
        let req = BridgeRequest {
            id: id.clone(),
            action: action.to_string(),
            code: code.map(str::to_string),
            await_promise: true,
        };
        let payload = serde_json::to_string(&req)?;

        let (tx, rx) = oneshot::channel::<BridgeResult>();
        self.pending.lock().await.insert(id.clone(), tx);

        // send over first client
        let sent = {
            let mut clients = self.clients.lock().await;
            tracing::debug!(
                clients = clients.len(),
                preview = %payload.chars().take(120).collect::<String>(),
                "Sending request to browser"
            );
            match clients.first_mut() {
                Some(c) => {
                    let ok = c.sender.send(Message::Text(payload)).is_ok();
                    if ok {
                        c.in_flight.insert(id.clone());
                    }
                    ok
                }
                None => false,
            }
        };
        if !sent {
            self.pending.lock().await.remove(&id);
            return Err(RelayError::Bridge("no browser client connected".into()));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(val))) => Ok(unwrap_json_string(val)),
            Ok(Ok(Err(err))) => Err(RelayError::Bridge(err)),
            Ok(Err(_canceled)) => Err(RelayError::Bridge(
                "browser client disconnected before replying".into(),
            )),
            Err(_elapsed) => {
                self.pending.lock().await.remove(&id);
                for client in self.clients.lock().await.iter_mut() {
                    client.in_flight.remove(&id);
                }
                tracing::warn!(id = %id, "Timed out waiting for browser reply");
                Err(RelayError::Timeout(format!(
                    "browser did not reply within {}ms",
                    timeout.as_millis()
                )))
            }
        }
    }
}

impl Drop for ExtensionBridge {
    fn drop(&mut self) {
        self.server_task.abort();
    }
}

#[async_trait]
impl ScriptEvaluator for ExtensionBridge {
    async fn evaluate(
        &self,
        script: &str,
        timeout: Duration,
    ) -> Result<serde_json::Value, RelayError> {
        self.request("eval", Some(script), timeout).await
    }

    async fn capture_screenshot(
        &self,
        timeout: Duration,
    ) -> Result<serde_json::Value, RelayError> {
        let data = self.request("capture", None, timeout).await?;
        Ok(serde_json::json!({ "success": true, "screenshot": data }))
    }
}

/// Extensions frequently reply with `JSON.stringify(result)`.
fn unwrap_json_string(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => match serde_json::from_str::<serde_json::Value>(&s) {
            Ok(parsed @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => parsed,
            _ => serde_json::Value::String(s),
        },
        other => other,
    }
}

async fn accept_loop(listener: TcpListener, clients: Clients, pending: Pending) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("ws accept error: {}", e);
                continue;
            }
        };
        tokio::spawn(serve_client(stream, peer, clients.clone(), pending.clone()));
    }
}

async fn serve_client(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    clients: Clients,
    pending: Pending,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(%peer, "ws handshake error: {}", e);
            return;
        }
    };
    let (mut sink, mut stream) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // writer task
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = sink.send(msg).await {
                tracing::warn!("ws send error: {}", e);
                break;
            }
        }
    });

    let client_id = Uuid::new_v4();
    clients.lock().await.push(Client {
        id: client_id,
        sender: tx,
        in_flight: HashSet::new(),
    });
    tracing::info!(%peer, "Browser client connected");

    // reader loop
    while let Some(Ok(msg)) = stream.next().await {
        if !msg.is_text() {
            continue;
        }
        let txt = msg.into_text().unwrap_or_default();
        match serde_json::from_str::<BridgeIncoming>(&txt) {
            Ok(BridgeIncoming::EvalResult {
                id,
                ok,
                result,
                error,
            }) => {
                if ok {
                    let size = result.as_ref().map(|r| r.to_string().len()).unwrap_or(0);
                    tracing::debug!(id = %id, result_size = size, "Browser reply received");
                } else {
                    let head: String = error
                        .as_deref()
                        .unwrap_or("unknown error")
                        .chars()
                        .take(400)
                        .collect();
                    tracing::warn!(id = %id, error = %head, "Browser reply reported an error");
                }
                if let Some(client) = clients.lock().await.iter_mut().find(|c| c.id == client_id) {
                    client.in_flight.remove(&id);
                }
                if let Some(tx) = pending.lock().await.remove(&id) {
                    let _ = tx.send(if ok {
                        Ok(result.unwrap_or(serde_json::Value::Null))
                    } else {
                        Err(error.unwrap_or_else(|| "unknown error".into()))
                    });
                }
            }
            Ok(BridgeIncoming::Typed(TypedIncoming::ConsoleEvent { level, args })) => {
                let args_str = args.map(|v| v.to_string()).unwrap_or_else(|| "[]".into());
                match level.as_deref().unwrap_or("log") {
                    "error" => tracing::error!(args = %args_str, "Console error event"),
                    "warning" | "warn" => tracing::warn!(args = %args_str, "Console warn event"),
                    _ => tracing::debug!(args = %args_str, "Console event"),
                }
            }
            Ok(BridgeIncoming::Typed(TypedIncoming::Hello { from })) => {
                tracing::info!(from = from.as_deref().unwrap_or("unknown"), "Browser client said hello");
            }
            Ok(BridgeIncoming::Typed(TypedIncoming::Pong)) => {}
            Err(e) => tracing::warn!("Invalid incoming JSON: {}", e),
        }
    }

    writer.abort();
    let orphaned = {
        let mut clients = clients.lock().await;
        match clients.iter().position(|c| c.id == client_id) {
            Some(index) => clients.remove(index).in_flight,
            None => HashSet::new(),
        }
    };
    if !orphaned.is_empty() {
        // Dropping the senders wakes their waiters with a cancellation.
        let mut pending = pending.lock().await;
        for id in &orphaned {
            pending.remove(id);
        }
        tracing::warn!(%peer, requests = orphaned.len(), "Browser client left with unanswered requests");
    }
    tracing::info!(%peer, "Browser client disconnected");
}
