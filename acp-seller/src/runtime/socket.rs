//! The push-side event source.
//!
//! Maintains a persistent websocket to the backend, authenticated by the
//! seller wallet, and feeds `onNewTask`/`onEvaluate` payloads into the
//! dispatcher. Reconnects with capped exponential backoff; a prolonged
//! outage or a run of failed reconnects raises a deduplicated operational
//! alert that resolves on the next successful connect.

use crate::runtime::alert::Alerter;
use crate::runtime::dispatcher::{Dispatcher, Source};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

const ALERT_DEDUP_KEY: &str = "acp-seller-socket-disconnect";
const RECONNECT_BASE: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(30);
const MONITOR_TICK: Duration = Duration::from_secs(15);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub url: String,
    pub wallet_address: String,
    /// Outage duration after which the alert fires.
    pub disconnect_alert_after: Duration,
    /// Consecutive failed reconnects after which the alert fires.
    pub reconnect_alert_attempts: u32,
}

#[derive(Default)]
struct SocketState {
    connected: AtomicBool,
    /// Start of the current outage, present while disconnected.
    disconnected_since: Mutex<Option<Instant>>,
    failed_attempts: AtomicU32,
}

impl SocketState {
    fn mark_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.failed_attempts.store(0, Ordering::SeqCst);
        *self.disconnected_since.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }

    fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let mut since = self.disconnected_since.lock().unwrap_or_else(|p| p.into_inner());
        if since.is_none() {
            *since = Some(Instant::now());
        }
    }

    fn outage(&self) -> Option<Duration> {
        self.disconnected_since
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .map(|since| since.elapsed())
    }
}

pub struct SocketListener {
    config: SocketConfig,
    dispatcher: Arc<Dispatcher>,
    alerter: Arc<Alerter>,
    state: Arc<SocketState>,
}

impl SocketListener {
    pub fn new(config: SocketConfig, dispatcher: Arc<Dispatcher>, alerter: Arc<Alerter>) -> Self {
        Self {
            config,
            dispatcher,
            alerter,
            state: Arc::new(SocketState::default()),
        }
    }

    /// Run forever: connect, pump events, reconnect on any interruption.
    pub async fn run(self) {
        // The process starts disconnected; a backend that never answers
        // still crosses the outage threshold.
        self.state.mark_disconnected();
        self.spawn_monitor();
        self.spawn_heartbeat();

        let mut backoff = RECONNECT_BASE;
        loop {
            match connect_async(self.config.url.as_str()).await {
                Ok((stream, _response)) => {
                    info!(component = "socket", "connected");
                    self.state.mark_connected();
                    self.alerter.resolve(ALERT_DEDUP_KEY).await;
                    backoff = RECONNECT_BASE;

                    self.pump(stream).await;

                    warn!(component = "socket", "disconnected");
                    self.state.mark_disconnected();
                }
                Err(err) => {
                    self.state.mark_disconnected();
                    let failed = self.state.failed_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    warn!(
                        component = "socket",
                        error = %err,
                        failed_attempts = failed,
                        "connect failed"
                    );
                    if failed == self.config.reconnect_alert_attempts {
                        self.alerter
                            .trigger(
                                ALERT_DEDUP_KEY,
                                &format!("seller socket reconnect failed {failed} times"),
                            )
                            .await;
                    }
                }
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(RECONNECT_MAX);
        }
    }

    /// Read frames until the connection drops.
    async fn pump(&self, stream: WsStream) {
        let (mut write, mut read) = stream.split();

        let auth = json!({
            "event": "authenticate",
            "data": { "walletAddress": self.config.wallet_address },
        });
        if let Err(err) = write.send(Message::Text(auth.to_string().into())).await {
            warn!(component = "socket", error = %err, "auth frame failed");
            return;
        }

        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => self.handle_frame(text.as_str(), &mut write).await,
                Ok(Message::Ping(payload)) => {
                    let _ = write.send(Message::Pong(payload)).await;
                }
                Ok(Message::Close(_)) => {
                    info!(component = "socket", "server closed connection");
                    break;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(component = "socket", error = %err, "read failed");
                    break;
                }
            }
        }
    }

    /// Decode one event envelope `{event, data, id?}` and route it.
    async fn handle_frame(&self, text: &str, write: &mut WsSink) {
        let Ok(envelope) = serde_json::from_str::<Value>(text) else {
            debug!(component = "socket", "ignoring non-JSON frame");
            return;
        };
        let event = envelope.get("event").and_then(Value::as_str).unwrap_or("");
        let data = envelope.get("data").cloned().unwrap_or(Value::Null);

        match event {
            "roomJoined" => info!(component = "socket", "room joined"),
            "onNewTask" | "onEvaluate" => {
                self.dispatcher.handle_job(&data, Source::Socket).await;
            }
            other => debug!(component = "socket", event = other, "ignoring event"),
        }

        if let Some(id) = envelope.get("id").cloned() {
            let ack = json!({ "event": "ack", "id": id, "data": true });
            if let Err(err) = write.send(Message::Text(ack.to_string().into())).await {
                warn!(component = "socket", error = %err, "ack failed");
            }
        }
    }

    /// Fires the outage alert once the disconnect crosses the threshold.
    fn spawn_monitor(&self) {
        let state = self.state.clone();
        let alerter = self.alerter.clone();
        let threshold = self.config.disconnect_alert_after;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(MONITOR_TICK);
            loop {
                tick.tick().await;
                if let Some(outage) = state.outage() {
                    if outage >= threshold {
                        alerter
                            .trigger(
                                ALERT_DEDUP_KEY,
                                &format!(
                                    "seller socket disconnected for {}s",
                                    outage.as_secs()
                                ),
                            )
                            .await;
                    }
                }
            }
        });
    }

    fn spawn_heartbeat(&self) {
        let state = self.state.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(HEARTBEAT_INTERVAL);
            loop {
                tick.tick().await;
                info!(
                    component = "socket",
                    connected = state.connected.load(Ordering::SeqCst),
                    "heartbeat"
                );
            }
        });
    }
}
