//! Shared harness: a mock API, a mock connector and a recording listener,
//! all queue-and-assert style. The connector hands each dialed connection
//! back to the test, which injects frames as raw JSON so the whole parse
//! path is exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;

use eventsub_ws::{
    ApiError, BackendHandle, CloseCause, Config, ConnId, Connector, CreateSubscriptionBody,
    CreatedSubscription, EventSub, EventSubListener, Frame, ServerSubscription, TwitchApi,
    WsEvent,
};

pub const WAIT: Duration = Duration::from_secs(5);
pub const QUIET: Duration = Duration::from_millis(250);

/// Receives the next item or panics after a generous timeout.
pub async fn recv<T>(rx: &mut UnboundedReceiver<T>, what: &str) -> T {
    tokio::time::timeout(WAIT, rx.next())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
        .unwrap_or_else(|| panic!("channel closed waiting for {what}"))
}

/// Asserts nothing arrives on `rx` within the quiet window.
pub async fn assert_quiet<T: std::fmt::Debug>(rx: &mut UnboundedReceiver<T>, what: &str) {
    if let Ok(Some(item)) = tokio::time::timeout(QUIET, rx.next()).await {
        panic!("expected no {what}, got {item:?}");
    }
}

#[derive(Debug)]
pub struct MockApi {
    users: Mutex<HashMap<String, String>>,
    user_delays: Mutex<HashMap<String, Duration>>,
    /// How many upcoming creates should fail with 429.
    pub rate_limit_next: AtomicUsize,
    next_sub: AtomicU64,
    creates_tx: UnboundedSender<Value>,
    deletes_tx: UnboundedSender<String>,
    pub token_updates: AtomicUsize,
    server_subs: Mutex<Vec<ServerSubscription>>,
}

impl MockApi {
    pub fn new() -> (Arc<Self>, UnboundedReceiver<Value>, UnboundedReceiver<String>) {
        let (creates_tx, creates_rx) = mpsc::unbounded();
        let (deletes_tx, deletes_rx) = mpsc::unbounded();
        let api = Arc::new(Self {
            users: Mutex::new(HashMap::new()),
            user_delays: Mutex::new(HashMap::new()),
            rate_limit_next: AtomicUsize::new(0),
            next_sub: AtomicU64::new(1),
            creates_tx,
            deletes_tx,
            token_updates: AtomicUsize::new(0),
            server_subs: Mutex::new(Vec::new()),
        });
        (api, creates_rx, deletes_rx)
    }

    pub fn add_user(&self, login: &str, id: &str) {
        self.users.lock().unwrap().insert(login.to_owned(), id.to_owned());
    }

    /// Makes `user_id(login)` sleep before answering, to model slow
    /// resolution.
    pub fn delay_user(&self, login: &str, delay: Duration) {
        self.user_delays.lock().unwrap().insert(login.to_owned(), delay);
    }

    pub fn set_server_subs(&self, subs: Vec<ServerSubscription>) {
        *self.server_subs.lock().unwrap() = subs;
    }
}

#[async_trait]
impl TwitchApi for MockApi {
    async fn user_id(&self, login: &str) -> Result<Option<String>, ApiError> {
        let delay = self.user_delays.lock().unwrap().get(login).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.users.lock().unwrap().get(login).cloned())
    }

    async fn create_subscription(
        &self,
        body: &CreateSubscriptionBody,
    ) -> Result<CreatedSubscription, ApiError> {
        let cost = if body.kind == "channel.raid" { 1 } else { 0 };
        let _ = self.creates_tx.unbounded_send(serde_json::to_value(body)?);
        if self.rate_limit_next.load(Ordering::SeqCst) > 0 {
            self.rate_limit_next.fetch_sub(1, Ordering::SeqCst);
            return Err(ApiError::Status(http::StatusCode::TOO_MANY_REQUESTS))
        }
        let n = self.next_sub.fetch_add(1, Ordering::SeqCst);
        Ok(CreatedSubscription { id: format!("sub-{n}"), status: "enabled".to_owned(), cost })
    }

    async fn delete_subscription(&self, id: &str) -> Result<(), ApiError> {
        let _ = self.deletes_tx.unbounded_send(id.to_owned());
        Ok(())
    }

    async fn subscriptions(&self) -> Result<Vec<ServerSubscription>, ApiError> {
        Ok(self.server_subs.lock().unwrap().clone())
    }

    fn token_updated(&self) {
        self.token_updates.fetch_add(1, Ordering::SeqCst);
    }
}

/// One dialed (mock) connection, handed to the test to drive.
pub struct MockConn {
    pub conn: ConnId,
    pub url: String,
    events: UnboundedSender<WsEvent>,
    pub remote: eventsub_ws::ws::BackendRemote,
}

impl MockConn {
    /// Injects one raw text frame, going through the real parser.
    pub fn frame(&self, text: &str) {
        let frame = Frame::parse(text).expect("test frame must parse");
        self.events
            .unbounded_send(WsEvent::Frame { conn: self.conn, frame })
            .expect("manager gone");
    }

    pub fn welcome(&self, session_id: &str, keepalive_secs: u64) {
        self.frame(&json!({
            "metadata": { "message_id": "m", "message_type": "session_welcome" },
            "payload": { "session": { "id": session_id, "status": "connected",
                "keepalive_timeout_seconds": keepalive_secs } }
        })
        .to_string());
    }

    pub fn keepalive(&self) {
        self.frame(r#"{ "metadata": { "message_type": "session_keepalive" }, "payload": {} }"#);
    }

    pub fn notification(&self, subscription_type: &str, event: Value) {
        self.frame(&json!({
            "metadata": { "message_type": "notification", "subscription_type": subscription_type },
            "payload": { "subscription": { "id": "x" }, "event": event }
        })
        .to_string());
    }

    pub fn reconnect_to(&self, url: &str) {
        self.frame(&json!({
            "metadata": { "message_type": "session_reconnect" },
            "payload": { "session": { "id": "s", "reconnect_url": url } }
        })
        .to_string());
    }

    pub fn revoke(&self, subscription_id: &str, status: &str) {
        self.frame(&json!({
            "metadata": { "message_type": "revocation" },
            "payload": { "subscription": { "id": subscription_id, "status": status } }
        })
        .to_string());
    }

    /// Reports the connection dead, the way a real backend would on its way
    /// out.
    pub fn closed(&self, cause: CloseCause) {
        let _ = self.events.unbounded_send(WsEvent::Closed { conn: self.conn, cause });
    }

    /// Resolves once the manager shut this connection down.
    pub async fn expect_shutdown(&mut self) {
        tokio::time::timeout(WAIT, &mut self.remote.shutdown)
            .await
            .expect("timed out waiting for shutdown")
            .expect("handle dropped without shutdown");
    }
}

#[derive(Debug)]
pub struct MockConnector {
    conns_tx: UnboundedSender<MockConn>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, UnboundedReceiver<MockConn>) {
        let (conns_tx, conns_rx) = mpsc::unbounded();
        (Arc::new(Self { conns_tx }), conns_rx)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        url: &str,
        conn: ConnId,
        events: UnboundedSender<WsEvent>,
    ) -> Result<BackendHandle, eventsub_ws::ws::TransportError> {
        let (handle, remote) = BackendHandle::channel();
        self.conns_tx
            .unbounded_send(MockConn { conn, url: url.to_owned(), events, remote })
            .map_err(|_| eventsub_ws::ws::TransportError::DeadChannel)?;
        Ok(handle)
    }
}

pub struct RecordingListener {
    pub infos: Mutex<Vec<String>>,
    pub statuses: Mutex<Vec<String>>,
    events_tx: UnboundedSender<(String, String)>,
}

impl RecordingListener {
    pub fn new() -> (Arc<Self>, UnboundedReceiver<(String, String)>) {
        let (events_tx, events_rx) = mpsc::unbounded();
        (
            Arc::new(Self {
                infos: Mutex::new(Vec::new()),
                statuses: Mutex::new(Vec::new()),
                events_tx,
            }),
            events_rx,
        )
    }

    pub fn infos_containing(&self, needle: &str) -> usize {
        self.infos.lock().unwrap().iter().filter(|i| i.contains(needle)).count()
    }
}

impl EventSubListener for RecordingListener {
    fn info(&self, text: &str) {
        self.infos.lock().unwrap().push(text.to_owned());
    }

    fn event(&self, subscription_type: &str, payload: &serde_json::value::RawValue) {
        let _ = self
            .events_tx
            .unbounded_send((subscription_type.to_owned(), payload.get().to_owned()));
    }

    fn status_changed(&self, summary: &str) {
        self.statuses.lock().unwrap().push(summary.to_owned());
    }
}

/// Everything a test needs, wired together.
pub struct Harness {
    pub eventsub: EventSub,
    pub api: Arc<MockApi>,
    pub listener: Arc<RecordingListener>,
    pub creates: UnboundedReceiver<Value>,
    pub deletes: UnboundedReceiver<String>,
    pub conns: UnboundedReceiver<MockConn>,
    pub events: UnboundedReceiver<(String, String)>,
}

impl Harness {
    pub fn new(config: Config) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let (api, creates, deletes) = MockApi::new();
        let (connector, conns) = MockConnector::new();
        let (listener, events) = RecordingListener::new();
        let eventsub =
            EventSub::with_connector(api.clone(), listener.clone(), connector, config);
        Self { eventsub, api, listener, creates, deletes, conns, events }
    }

    pub fn with_users(users: &[(&str, &str)]) -> Self {
        let harness = Self::new(Config::default());
        for (login, id) in users {
            harness.api.add_user(login, id);
        }
        harness
    }

    pub async fn next_conn(&mut self) -> MockConn {
        recv(&mut self.conns, "connection").await
    }

    pub async fn next_create(&mut self) -> Value {
        recv(&mut self.creates, "create request").await
    }

    pub async fn next_delete(&mut self) -> String {
        recv(&mut self.deletes, "delete request").await
    }
}
