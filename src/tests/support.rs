//! Shared test fixtures: an in-memory hub transport and DTO builders

use crate::api::types::ChatMessage;
use crate::hub::{HubClient, HubConnector, HubSink, HubSplit, HubStream, TokenSupplier};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// The server side of one fake hub connection
pub struct ServerEnd {
    /// Frames the client sent on this connection
    pub sent: mpsc::UnboundedReceiver<String>,
    /// Push frames (or errors) to the client; dropping this closes the connection
    pub push: mpsc::UnboundedSender<Result<String>>,
    /// Token the client presented for this attempt
    pub token: Option<String>,
}

/// In-memory hub connector
///
/// Every successful connect produces a [`ServerEnd`] on the fixture channel so
/// tests can script the server side. A fail budget makes the next N attempts
/// error out.
pub struct FakeConnector {
    attempts: AtomicUsize,
    fail_budget: AtomicUsize,
    ends: mpsc::UnboundedSender<ServerEnd>,
}

impl FakeConnector {
    /// Number of connect attempts made so far
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Make the next `n` connect attempts fail
    pub fn fail_next(&self, n: usize) {
        self.fail_budget.store(n, Ordering::SeqCst);
    }
}

struct FakeSink(mpsc::UnboundedSender<String>);

#[async_trait]
impl HubSink for FakeSink {
    async fn send(&mut self, text: String) -> Result<()> {
        self.0
            .send(text)
            .map_err(|_| Error::Hub("fake connection closed".to_string()))
    }
}

struct FakeStream(mpsc::UnboundedReceiver<Result<String>>);

#[async_trait]
impl HubStream for FakeStream {
    async fn recv(&mut self) -> Option<Result<String>> {
        self.0.recv().await
    }
}

#[async_trait]
impl HubConnector for FakeConnector {
    async fn connect(&self, _url: &str, token: Option<String>) -> Result<HubSplit> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let budget = self.fail_budget.load(Ordering::SeqCst);
        if budget > 0 {
            self.fail_budget.store(budget - 1, Ordering::SeqCst);
            return Err(Error::Hub("simulated connect failure".to_string()));
        }

        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (push_tx, push_rx) = mpsc::unbounded_channel();

        self.ends
            .send(ServerEnd {
                sent: sent_rx,
                push: push_tx,
                token,
            })
            .map_err(|_| Error::Hub("test dropped the server-end channel".to_string()))?;

        Ok((Box::new(FakeSink(sent_tx)), Box::new(FakeStream(push_rx))))
    }
}

/// Build a hub client over a fake transport with a zero-delay reconnect schedule
pub fn fake_hub() -> (HubClient, Arc<FakeConnector>, mpsc::UnboundedReceiver<ServerEnd>) {
    fake_hub_with_supplier(Arc::new(|| Some("test-token".to_string())))
}

/// Same as [`fake_hub`] with a custom token supplier
pub fn fake_hub_with_supplier(
    supplier: TokenSupplier,
) -> (HubClient, Arc<FakeConnector>, mpsc::UnboundedReceiver<ServerEnd>) {
    let (ends_tx, ends_rx) = mpsc::unbounded_channel();
    let connector = Arc::new(FakeConnector {
        attempts: AtomicUsize::new(0),
        fail_budget: AtomicUsize::new(0),
        ends: ends_tx,
    });

    let hub = HubClient::with_connector("ws://fake/hubs/chat", connector.clone(), supplier)
        .reconnect_delays(vec![Duration::from_millis(0)]);

    (hub, connector, ends_rx)
}

/// Receive the next frame the client sent, parsed as JSON, within 2 seconds
pub async fn recv_frame(end: &mut ServerEnd) -> serde_json::Value {
    let text = tokio::time::timeout(Duration::from_secs(2), end.sent.recv())
        .await
        .expect("timed out waiting for a client frame")
        .expect("connection closed before a frame arrived");
    serde_json::from_str(&text).expect("client sent invalid JSON")
}

/// Await the next server end with a 2-second guard
pub async fn recv_end(ends: &mut mpsc::UnboundedReceiver<ServerEnd>) -> ServerEnd {
    tokio::time::timeout(Duration::from_secs(2), ends.recv())
        .await
        .expect("timed out waiting for a connection attempt")
        .expect("connector dropped")
}

/// Build a chat message with the given conversation and message ids
pub fn message(conversation_id: i64, id: i64) -> ChatMessage {
    ChatMessage {
        id,
        conversation_id,
        sender_user_id: 99,
        body: format!("message {}", id),
        sent_at: "2024-05-01T10:00:00Z".to_string(),
        edited_at: None,
        deleted_at: None,
    }
}
