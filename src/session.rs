//! One EventSub session: the state machine wrapped around a single
//! server-assigned `session_id` and however many websocket connections it
//! takes to keep that session alive.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::topic::Topic;
use crate::ws::{BackendHandle, ConnId};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SessionState {
    /// Waiting for the transport to open and the welcome frame to arrive.
    Connecting,
    /// Welcome received; subscriptions can be placed.
    Welcomed,
    /// The server asked us to move; a replacement connection is underway
    /// while the old one keeps delivering events.
    Reconnecting,
    /// No live connection. A reopen may be scheduled via the deadline.
    Closed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Welcomed => "welcomed",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Closed => "closed",
        }
    }
}

/// Where a placed subscription is in its server-side lifecycle.
#[derive(Clone, Debug)]
pub(crate) enum PlacedState {
    /// Create request in flight. `remove_after` is set when an unlisten
    /// arrived while the create was still outstanding; the subscription is
    /// deleted as soon as the server hands us its id.
    Creating { remove_after: bool },
    /// Created; the server knows it under this id.
    Active { server_id: String },
}

#[derive(Clone, Debug)]
pub(crate) struct Placed {
    pub state: PlacedState,
    /// Cost counted against the session budget. Starts as the catalogue's
    /// expected cost, mirrors the server-reported cost once known.
    pub cost: u32,
}

/// Outcome of asking a session to take a subscription.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum PlaceOutcome {
    Accepted,
    /// Session has no server-assigned id yet; retry after welcome.
    NoSessionId,
    /// Accepting would blow the per-session cost budget.
    CostExceeded,
}

/// Exponential reopen backoff: 1s, 2s, 4s, ... capped at the ceiling.
/// Reset after any successful welcome.
#[derive(Clone, Debug)]
pub(crate) struct Backoff {
    attempt: u32,
    ceiling: Duration,
}

impl Backoff {
    pub fn new(ceiling: Duration) -> Self {
        Self { attempt: 0, ceiling }
    }

    pub fn next_delay(&mut self) -> Duration {
        let exp = self.attempt.min(30);
        let delay = Duration::from_secs(1u64 << exp).min(self.ceiling);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

pub(crate) struct Session {
    /// Local index, stable for the process; display only.
    pub index: usize,
    pub state: SessionState,

    /// Current connection. After a full close this names the dead
    /// connection until a reopen allocates a fresh one.
    pub conn: ConnId,
    pub handle: Option<BackendHandle>,

    /// Replacement connection during a server-directed reconnect.
    pub next_conn: Option<ConnId>,
    pub next_handle: Option<BackendHandle>,

    /// The connection being retired during the handoff overlap window.
    /// Notifications from it are still dispatched until it reports closed.
    pub prev_conn: Option<ConnId>,
    pub prev_handle: Option<BackendHandle>,

    pub session_id: Option<String>,
    pub keepalive: Duration,

    /// The one time-based trigger for this session; meaning depends on
    /// state: welcome timeout while connecting/reconnecting, keepalive
    /// watchdog while welcomed, reopen time while closed.
    pub deadline: Option<Instant>,
    pub backoff: Backoff,

    pub placed: HashMap<Topic, Placed>,
    pub used_cost: u32,
}

impl Session {
    pub fn new(index: usize, conn: ConnId, backoff_ceiling: Duration) -> Self {
        Self {
            index,
            state: SessionState::Connecting,
            conn,
            handle: None,
            next_conn: None,
            next_handle: None,
            prev_conn: None,
            prev_handle: None,
            session_id: None,
            keepalive: Duration::from_secs(10),
            deadline: None,
            backoff: Backoff::new(backoff_ceiling),
            placed: HashMap::new(),
            used_cost: 0,
        }
    }

    /// Whether `conn` is one of the connections this session is (still)
    /// listening to.
    pub fn owns_conn(&self, conn: ConnId) -> bool {
        self.conn == conn || self.next_conn == Some(conn) || self.prev_conn == Some(conn)
    }

    pub fn arm_welcome(&mut self, timeout: Duration) {
        self.deadline = Some(Instant::now() + timeout);
    }

    /// Watchdog window: two keepalive periods plus grace. Re-armed on every
    /// frame received on the current connection.
    pub fn arm_watchdog(&mut self, grace: Duration) {
        self.deadline = Some(Instant::now() + self.keepalive * 2 + grace);
    }

    /// Accounts for a subscription without touching the network. The caller
    /// submits the create request on success.
    pub fn place(&mut self, topic: Topic, cost: u32, budget: u32) -> PlaceOutcome {
        if self.state != SessionState::Welcomed || self.session_id.is_none() {
            return PlaceOutcome::NoSessionId
        }
        if self.used_cost + cost > budget {
            return PlaceOutcome::CostExceeded
        }
        self.used_cost += cost;
        self.placed.insert(topic, Placed { state: PlacedState::Creating { remove_after: false }, cost });
        PlaceOutcome::Accepted
    }

    /// Forgets a placed subscription and returns the server id to delete,
    /// if the server ever assigned one. A subscription whose create is still
    /// in flight is flagged for removal instead and stays accounted until
    /// the create response arrives.
    pub fn remove(&mut self, topic: &Topic) -> Option<String> {
        match self.placed.get_mut(topic) {
            Some(Placed { state: PlacedState::Creating { remove_after }, .. }) => {
                *remove_after = true;
                None
            }
            Some(Placed { state: PlacedState::Active { server_id }, cost }) => {
                let server_id = server_id.clone();
                let cost = *cost;
                self.placed.remove(topic);
                self.used_cost -= cost;
                Some(server_id)
            }
            None => None,
        }
    }

    /// Drops a subscription from the books without producing a delete, used
    /// when the server already forgot it (revocation, failed create).
    pub fn forget(&mut self, topic: &Topic) {
        if let Some(placed) = self.placed.remove(topic) {
            self.used_cost -= placed.cost;
        }
    }

    /// Tears down all connection state and empties the placement books,
    /// handing the drained topics back to the caller for re-placement.
    /// Leaves the reopen scheduling to the caller.
    pub fn close(&mut self) -> Vec<Topic> {
        for handle in
            [self.handle.take(), self.next_handle.take(), self.prev_handle.take()].into_iter().flatten()
        {
            handle.shutdown();
        }
        self.next_conn = None;
        self.prev_conn = None;
        self.session_id = None;
        self.state = SessionState::Closed;
        self.deadline = None;
        self.used_cost = 0;
        self.placed.drain().map(|(topic, _)| topic).collect()
    }

    pub fn status_line(&self) -> String {
        let mut line = format!("#{} {}", self.index, self.state.as_str());
        if let Some(id) = &self.session_id {
            line.push_str(&format!(" ({id}, cost {})", self.used_cost));
        }
        line
    }
}
