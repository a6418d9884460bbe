//! Push channel
//!
//! This module owns the single persistent connection to the chat hub:
//! - Idempotent connect with in-flight deduplication
//! - Automatic reconnect on a fixed delay schedule
//! - Joined-conversation tracking, replayed after every reconnect
//! - Fan-out of server-pushed messages to subscribers
//!
//! The wire format is JSON text frames over WebSocket: outgoing frames carry
//! `{"target": ..., "arguments": [...]}` for the invokable hub operations,
//! incoming frames carry `{"target": ..., "data": ...}`. The transport sits
//! behind a connector trait so tests can run against an in-memory fake.

use crate::api::decode;
use crate::api::types::ChatMessage;
use crate::{Error, Result};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

/// Capacity of the server-event broadcast channel
const EVENT_CAPACITY: usize = 256;

/// Automatic-reconnect delay schedule in seconds
///
/// After an established connection drops, one attempt is made per entry;
/// exhausting the schedule returns the client to disconnected.
const RECONNECT_DELAYS_SECS: [u64; 4] = [0, 2, 10, 30];

/// Supplies the bearer token for each (re)connect attempt
///
/// Invoked fresh per attempt so a refreshed token is picked up naturally.
pub type TokenSupplier = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Events pushed by the hub to subscribers
#[derive(Debug, Clone)]
pub enum HubEvent {
    /// A chat message was delivered out-of-band
    Message(ChatMessage),
    /// The underlying transport dropped and was re-established; joined
    /// conversations have already been replayed
    Reconnected,
}

/// Outgoing invoke frame
#[derive(Serialize)]
struct InvokeFrame<'a> {
    target: &'a str,
    arguments: Vec<Value>,
}

/// Incoming event frame
#[derive(Deserialize)]
struct EventFrame {
    target: String,
    #[serde(default)]
    data: Value,
}

/// Connection-level status shared with waiters
#[derive(Debug, Clone)]
enum ConnStatus {
    /// No connection and no attempt in flight
    Idle,
    /// An attempt (initial or reconnect) is in flight
    Connecting,
    /// Connected and serving
    Connected,
    /// The last attempt (or the whole reconnect schedule) failed
    Failed(String),
}

/// The two halves of an established hub connection
pub type HubSplit = (Box<dyn HubSink>, Box<dyn HubStream>);

/// Dials the hub endpoint
#[async_trait]
pub trait HubConnector: Send + Sync {
    /// Establish a connection to `url`, authenticating with `token` if
    /// present, and hand back its writer and reader halves
    async fn connect(&self, url: &str, token: Option<String>) -> Result<HubSplit>;
}

/// Writer half of a hub connection
#[async_trait]
pub trait HubSink: Send {
    /// Send one text frame
    async fn send(&mut self, text: String) -> Result<()>;
}

/// Reader half of a hub connection
#[async_trait]
pub trait HubStream: Send {
    /// Receive the next text frame; `None` means the peer closed
    async fn recv(&mut self) -> Option<Result<String>>;
}

/// Production connector dialing the hub over WebSocket
pub struct WsConnector;

#[async_trait]
impl HubConnector for WsConnector {
    async fn connect(&self, url: &str, token: Option<String>) -> Result<HubSplit> {
        // The hub authenticates WebSocket upgrades via the access_token query
        // parameter rather than a header.
        let url = match token {
            Some(token) => format!("{}?access_token={}", url, token),
            None => url.to_string(),
        };

        let (stream, _) = connect_async(url.as_str()).await?;
        let (sink, stream) = stream.split();
        Ok((Box::new(WsSink { inner: sink }), Box::new(WsStream { inner: stream })))
    }
}

struct WsSink {
    inner: SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>,
}

#[async_trait]
impl HubSink for WsSink {
    async fn send(&mut self, text: String) -> Result<()> {
        self.inner.send(WsMessage::Text(text)).await.map_err(Error::from)
    }
}

struct WsStream {
    inner: SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

#[async_trait]
impl HubStream for WsStream {
    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.inner.next().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(text)),
                Ok(WsMessage::Close(_)) => return None,
                // Control and binary frames are not part of the hub protocol
                Ok(_) => continue,
                Err(e) => return Some(Err(Error::from(e))),
            }
        }
    }
}

/// Push-channel client
///
/// Cloneable handle over one shared connection. All clones see the same
/// connection state, joined set, and event stream.
///
/// # Example
/// ```rust,no_run
/// use hubchat::hub::{HubClient, HubEvent};
/// use std::sync::Arc;
///
/// # async fn example() -> hubchat::Result<()> {
/// let hub = HubClient::new("ws://localhost:5134/hubs/chat", Arc::new(|| None));
/// let mut events = hub.subscribe();
///
/// hub.join_conversation(42).await?;
/// hub.send_message(42, "hello").await?;
///
/// while let Ok(event) = events.recv().await {
///     if let HubEvent::Message(msg) = event {
///         println!("[{}] {}", msg.sender_user_id, msg.body);
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HubClient {
    /// Hub endpoint URL
    url: Arc<String>,
    /// Transport dialer
    connector: Arc<dyn HubConnector>,
    /// Token source, invoked per connect attempt
    token_supplier: TokenSupplier,
    /// Whether the connection actor is running (dedup guard)
    actor_running: Arc<Mutex<bool>>,
    /// Connection status, observed by ensure_connection waiters
    status: Arc<watch::Sender<ConnStatus>>,
    /// Writer half of the live connection, when one exists
    outgoing: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    /// Conversations joined over the lifetime of this session
    joined: Arc<Mutex<BTreeSet<i64>>>,
    /// Server-event fan-out
    events: broadcast::Sender<HubEvent>,
    /// Reconnect delay schedule
    reconnect_delays: Arc<Vec<Duration>>,
}

impl HubClient {
    /// Create a hub client dialing the given URL over WebSocket
    pub fn new(url: &str, token_supplier: TokenSupplier) -> Self {
        Self::with_connector(url, Arc::new(WsConnector), token_supplier)
    }

    /// Create a hub client over a custom connector
    pub fn with_connector(
        url: &str,
        connector: Arc<dyn HubConnector>,
        token_supplier: TokenSupplier,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (status, _) = watch::channel(ConnStatus::Idle);

        Self {
            url: Arc::new(url.to_string()),
            connector,
            token_supplier,
            actor_running: Arc::new(Mutex::new(false)),
            status: Arc::new(status),
            outgoing: Arc::new(Mutex::new(None)),
            joined: Arc::new(Mutex::new(BTreeSet::new())),
            events,
            reconnect_delays: Arc::new(
                RECONNECT_DELAYS_SECS.iter().map(|s| Duration::from_secs(*s)).collect(),
            ),
        }
    }

    /// Override the reconnect delay schedule (used by tests)
    pub fn reconnect_delays(mut self, delays: Vec<Duration>) -> Self {
        self.reconnect_delays = Arc::new(delays);
        self
    }

    /// Subscribe to server-pushed events
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the joined-conversation set
    pub async fn joined_conversations(&self) -> Vec<i64> {
        self.joined.lock().await.iter().copied().collect()
    }

    /// Ensure the push channel is connected
    ///
    /// Resolves immediately when already connected. When a connect attempt is
    /// in flight, awaits that same attempt rather than starting another: two
    /// concurrent callers produce exactly one underlying connection attempt.
    /// Otherwise spawns the connection actor, which keeps the connection
    /// alive with automatic reconnects until the schedule is exhausted.
    pub async fn ensure_connection(&self) -> Result<()> {
        let mut status_rx = {
            let mut running = self.actor_running.lock().await;
            if !*running {
                *running = true;
                self.status.send_replace(ConnStatus::Connecting);

                let client = self.clone();
                tokio::spawn(async move {
                    client.run_connection().await;
                });
            }
            self.status.subscribe()
        };

        loop {
            let current = status_rx.borrow_and_update().clone();
            match current {
                ConnStatus::Connected => return Ok(()),
                ConnStatus::Failed(reason) => return Err(Error::Hub(reason)),
                ConnStatus::Idle | ConnStatus::Connecting => {
                    if status_rx.changed().await.is_err() {
                        return Err(Error::Hub("Connection task ended".to_string()));
                    }
                }
            }
        }
    }

    /// Join a conversation on the push channel
    ///
    /// The identifier enters the joined set before the invoke goes out, so
    /// the set grows monotonically even when the invoke fails; a later
    /// reconnect replays it.
    pub async fn join_conversation(&self, conversation_id: i64) -> Result<()> {
        self.joined.lock().await.insert(conversation_id);
        self.invoke("JoinConversation", vec![json!(conversation_id)]).await
    }

    /// Send a chat message through the hub
    pub async fn send_message(&self, conversation_id: i64, body: &str) -> Result<()> {
        self.invoke("SendMessage", vec![json!(conversation_id), json!(body)]).await
    }

    /// Issue a keep-alive ping
    pub async fn ping(&self) -> Result<()> {
        self.invoke("Ping", Vec::new()).await
    }

    /// Spawn the periodic keep-alive task
    ///
    /// Ping failures are logged and ignored; real disconnects are handled by
    /// the connection actor's reconnect schedule. The caller aborts the
    /// returned handle at teardown.
    pub fn start_keepalive(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = client.ping().await {
                    debug!("Keep-alive ping failed: {}", e);
                }
            }
        })
    }

    /// Invoke a hub operation
    pub async fn invoke(&self, target: &str, arguments: Vec<Value>) -> Result<()> {
        self.ensure_connection().await?;

        let text = serde_json::to_string(&InvokeFrame { target, arguments })?;
        let outgoing = self.outgoing.lock().await;
        match outgoing.as_ref() {
            Some(sender) => sender
                .send(text)
                .map_err(|_| Error::Hub("Push channel closed".to_string())),
            None => Err(Error::Hub("Push channel not connected".to_string())),
        }
    }

    async fn connect_once(&self) -> Result<HubSplit> {
        let token = (self.token_supplier)();
        self.connector.connect(&self.url, token).await
    }

    /// Connection actor: one initial attempt, then reconnects until the
    /// schedule runs dry
    async fn run_connection(self) {
        match self.connect_once().await {
            Ok(split) => {
                info!("Push channel connected to {}", self.url);
                self.serve(split, false).await;
            }
            Err(e) => {
                warn!("Push channel connect failed: {}", e);
                self.finish(ConnStatus::Failed(e.to_string())).await;
                return;
            }
        }

        'reconnect: loop {
            self.status.send_replace(ConnStatus::Connecting);
            for delay in self.reconnect_delays.iter() {
                tokio::time::sleep(*delay).await;
                match self.connect_once().await {
                    Ok(split) => {
                        info!("Push channel reconnected to {}", self.url);
                        self.serve(split, true).await;
                        continue 'reconnect;
                    }
                    Err(e) => {
                        warn!("Push channel reconnect attempt failed: {}", e);
                    }
                }
            }
            break;
        }

        self.finish(ConnStatus::Failed("Reconnect attempts exhausted".to_string())).await;
    }

    async fn finish(&self, status: ConnStatus) {
        let mut running = self.actor_running.lock().await;
        *running = false;
        self.status.send_replace(status);
    }

    /// Drive one established connection until it drops
    async fn serve(&self, split: HubSplit, reconnected: bool) {
        let (mut sink, mut stream) = split;
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        *self.outgoing.lock().await = Some(out_tx);

        if reconnected {
            self.rejoin(sink.as_mut()).await;
        }

        self.status.send_replace(ConnStatus::Connected);

        if reconnected {
            let _ = self.events.send(HubEvent::Reconnected);
        }

        loop {
            tokio::select! {
                frame = out_rx.recv() => match frame {
                    Some(text) => {
                        if let Err(e) = sink.send(text).await {
                            warn!("Push channel send failed: {}", e);
                            break;
                        }
                    }
                    None => break,
                },
                incoming = stream.recv() => match incoming {
                    Some(Ok(text)) => self.dispatch(&text),
                    Some(Err(e)) => {
                        warn!("Push channel read failed: {}", e);
                        break;
                    }
                    None => {
                        info!("Push channel closed by server");
                        break;
                    }
                },
            }
        }

        *self.outgoing.lock().await = None;
    }

    /// Replay JoinConversation for every joined id, best-effort
    async fn rejoin(&self, sink: &mut dyn HubSink) {
        let ids: Vec<i64> = self.joined.lock().await.iter().copied().collect();

        for id in &ids {
            let frame = InvokeFrame {
                target: "JoinConversation",
                arguments: vec![json!(id)],
            };
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode rejoin frame for {}: {}", id, e);
                    continue;
                }
            };
            if let Err(e) = sink.send(text).await {
                warn!("Failed to rejoin conversation {}: {}", id, e);
            }
        }

        if !ids.is_empty() {
            info!("Replayed {} conversation joins after reconnect", ids.len());
        }
    }

    /// Parse one incoming frame and fan out the event
    fn dispatch(&self, text: &str) {
        let frame: EventFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Ignoring unparseable hub frame: {}", e);
                return;
            }
        };

        match frame.target.as_str() {
            "message" => match decode::item::<ChatMessage>(frame.data) {
                Some(message) => {
                    let _ = self.events.send(HubEvent::Message(message));
                }
                None => debug!("Ignoring message event with unexpected payload"),
            },
            other => debug!("Ignoring unknown hub event: {}", other),
        }
    }
}
