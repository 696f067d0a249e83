//! The connection pool: a creation-ordered set of sessions sharing the
//! desired subscriptions under a per-session cost budget.
//!
//! The pool is plain owned state of the manager task; it performs no I/O
//! itself. Placement decisions come back as values and the actor turns them
//! into connect/create/delete tasks.

use std::time::Duration;

use tokio::time::Instant;

use crate::session::{PlaceOutcome, Session, SessionState};
use crate::topic::Topic;
use crate::ws::ConnId;

/// Pool-level outcome of trying to place one subscription.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum PoolPlacement {
    /// Accepted by the session at this position (creation order).
    Placed(usize),
    /// No session can take it right now, but one is connecting, reconnecting
    /// or scheduled to reopen; retry on the next reconcile pass.
    AwaitSession,
    /// Every session is welcomed and full.
    Full,
}

pub(crate) struct Pool {
    sessions: Vec<Session>,
    next_index: usize,
    next_conn: u64,
    pub budget: u32,
    pub max_sessions: usize,
    backoff_ceiling: Duration,
}

impl Pool {
    pub fn new(budget: u32, max_sessions: usize, backoff_ceiling: Duration) -> Self {
        Self { sessions: Vec::new(), next_index: 0, next_conn: 0, budget, max_sessions, backoff_ceiling }
    }

    pub fn alloc_conn(&mut self) -> ConnId {
        let conn = ConnId(self.next_conn);
        self.next_conn += 1;
        conn
    }

    /// Adds a session in `Connecting` state and returns it; the caller is
    /// responsible for actually dialing its connection.
    pub fn open_session(&mut self) -> &mut Session {
        let conn = self.alloc_conn();
        let index = self.next_index;
        self.next_index += 1;
        self.sessions.push(Session::new(index, conn, self.backoff_ceiling));
        self.sessions.last_mut().expect("just pushed")
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.iter_mut()
    }

    pub fn get(&self, pos: usize) -> Option<&Session> {
        self.sessions.get(pos)
    }

    pub fn get_mut(&mut self, pos: usize) -> Option<&mut Session> {
        self.sessions.get_mut(pos)
    }

    pub fn by_conn_mut(&mut self, conn: ConnId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.owns_conn(conn))
    }

    pub fn position_by_conn(&self, conn: ConnId) -> Option<usize> {
        self.sessions.iter().position(|s| s.owns_conn(conn))
    }

    pub fn any_welcomed(&self) -> bool {
        self.sessions.iter().any(|s| s.state == SessionState::Welcomed)
    }

    /// Is this topic placed (or being placed) on any session?
    pub fn holds(&self, topic: &Topic) -> bool {
        self.sessions.iter().any(|s| s.placed.contains_key(topic))
    }

    pub fn position_of(&self, topic: &Topic) -> Option<usize> {
        self.sessions.iter().position(|s| s.placed.contains_key(topic))
    }

    /// Looks a placed subscription up by its server-assigned id.
    pub fn position_by_server_id(&self, server_id: &str) -> Option<(usize, Topic)> {
        for (pos, session) in self.sessions.iter().enumerate() {
            for (topic, placed) in &session.placed {
                if matches!(&placed.state,
                    crate::session::PlacedState::Active { server_id: id } if id == server_id)
                {
                    return Some((pos, topic.clone()))
                }
            }
        }
        None
    }

    /// First-fit placement over sessions in creation order.
    pub fn try_place(&mut self, topic: &Topic, cost: u32) -> PoolPlacement {
        let mut awaiting = false;
        for (pos, session) in self.sessions.iter_mut().enumerate() {
            match session.place(topic.clone(), cost, self.budget) {
                PlaceOutcome::Accepted => return PoolPlacement::Placed(pos),
                PlaceOutcome::NoSessionId => awaiting = true,
                PlaceOutcome::CostExceeded => {}
            }
        }
        if awaiting {
            PoolPlacement::AwaitSession
        } else {
            PoolPlacement::Full
        }
    }

    /// The earliest armed deadline across all sessions.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.sessions.iter().filter_map(|s| s.deadline).min()
    }

    /// Positions whose deadline has passed, in creation order.
    pub fn expired(&self, now: Instant) -> Vec<usize> {
        self.sessions
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s.deadline, Some(d) if d <= now))
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Drops closed sessions holding nothing. Their backends are already
    /// gone; nothing to shut down.
    pub fn prune(&mut self) {
        self.sessions
            .retain(|s| s.state != SessionState::Closed || !s.placed.is_empty() || s.deadline.is_some());
    }

    /// Shuts down every connection and empties all placement books,
    /// returning the drained topics.
    pub fn close_all(&mut self) -> Vec<Topic> {
        let mut drained = Vec::new();
        for session in &mut self.sessions {
            drained.extend(session.close());
        }
        self.sessions.clear();
        drained
    }

    pub fn status_text(&self) -> String {
        if self.sessions.is_empty() {
            return "no sessions".to_owned()
        }
        let lines: Vec<String> = self.sessions.iter().map(Session::status_line).collect();
        lines.join(", ")
    }
}
