//! The manager task.
//!
//! All mutations of the pool, the desired-topic set, the name cache and the
//! raid refcounts happen here, on one task. Websocket backends, API calls
//! and the deadline timer post events into the mailbox; no handler awaits
//! the network. We bias the loop so that we always drain I/O events before
//! accepting new instructions.

use std::collections::HashSet;
use std::sync::Arc;

use futures_channel::{mpsc, oneshot};
use futures_util::{pin_mut, select_biased, FutureExt, StreamExt};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::api::{ApiError, CreatedSubscription, ServerSubscription, TwitchApi};
use crate::dedup::RaidDedup;
use crate::listener::EventSubListener;
use crate::manager::{Config, Instruction};
use crate::pool::{Pool, PoolPlacement};
use crate::resolver::IdResolver;
use crate::session::{Placed, PlacedState, SessionState};
use crate::topic::{Topic, TopicFamily};
use crate::ws::{BackendHandle, CloseCause, ConnId, Connector, Frame, TransportError, WsEvent};

/// Completions posted back into the mailbox by spawned tasks.
enum TaskEvent {
    Opened {
        conn: ConnId,
        result: Result<BackendHandle, TransportError>,
    },
    Resolved {
        login: String,
        result: Result<Option<String>, ApiError>,
    },
    Created {
        conn: ConnId,
        topic: Topic,
        result: Result<CreatedSubscription, ApiError>,
    },
    ServerList {
        result: Result<Vec<ServerSubscription>, ApiError>,
        tx: oneshot::Sender<Result<String, ApiError>>,
    },
}

pub(crate) struct ManagerActor {
    cfg: Config,
    api: Arc<dyn TwitchApi>,
    listener: Arc<dyn EventSubListener>,
    connector: Arc<dyn Connector>,

    instructions: mpsc::UnboundedReceiver<Instruction>,

    ws_rx: mpsc::UnboundedReceiver<WsEvent>,
    ws_tx: mpsc::UnboundedSender<WsEvent>,
    task_rx: mpsc::UnboundedReceiver<TaskEvent>,
    task_tx: mpsc::UnboundedSender<TaskEvent>,

    pool: Pool,
    desired: HashSet<Topic>,
    resolver: IdResolver,
    dedup: RaidDedup,
    local_login: Option<String>,

    /// Cleared by `disconnect()`; while false the pool stays empty and
    /// reconcile passes do nothing.
    active: bool,

    limit_notified: bool,
    capacity_notified: bool,
    last_status: String,
}

impl ManagerActor {
    pub fn new(
        cfg: Config,
        api: Arc<dyn TwitchApi>,
        listener: Arc<dyn EventSubListener>,
        connector: Arc<dyn Connector>,
        instructions: mpsc::UnboundedReceiver<Instruction>,
    ) -> Self {
        let (ws_tx, ws_rx) = mpsc::unbounded();
        let (task_tx, task_rx) = mpsc::unbounded();
        let pool = Pool::new(cfg.cost_budget, cfg.max_sessions, cfg.backoff_ceiling);
        Self {
            cfg,
            api,
            listener,
            connector,
            instructions,
            ws_rx,
            ws_tx,
            task_rx,
            task_tx,
            pool,
            desired: HashSet::new(),
            resolver: IdResolver::default(),
            dedup: RaidDedup::default(),
            local_login: None,
            active: true,
            limit_notified: false,
            capacity_notified: false,
            last_status: String::new(),
        }
    }

    pub fn spawn(self) {
        tokio::spawn(self.run());
    }

    async fn run(mut self) {
        loop {
            let deadline = self.pool.next_deadline();
            let timer = async move {
                match deadline {
                    Some(d) => tokio::time::sleep_until(d).await,
                    None => futures_util::future::pending::<()>().await,
                }
            }
            .fuse();
            pin_mut!(timer);

            select_biased! {
                ev = self.ws_rx.next() => {
                    if let Some(ev) = ev {
                        self.on_ws(ev);
                    }
                }
                ev = self.task_rx.next() => {
                    if let Some(ev) = ev {
                        self.on_task(ev);
                    }
                }
                inst = self.instructions.next() => {
                    match inst {
                        Some(inst) => self.on_instruction(inst),
                        // every handle dropped: nothing can reach us again
                        None => break,
                    }
                }
                _ = timer => self.on_deadline(),
            }
            self.emit_status();
        }
        self.pool.close_all();
    }

    // ---- instructions ----

    fn on_instruction(&mut self, inst: Instruction) {
        match inst {
            Instruction::Listen { family, channel } => self.listen(family, &channel),
            Instruction::Unlisten { family, channel } => self.unlisten(family, &channel),
            Instruction::SetLocalUsername(login) => {
                if self.local_login.as_deref() != Some(login.as_str()) {
                    debug!(login, "Local username set");
                    self.resolver.renew_interest(&login);
                    self.local_login = Some(login);
                    self.reconcile();
                }
            }
            Instruction::TokenUpdated => self.api.token_updated(),
            Instruction::Reconnect => {
                self.listener.info("eventsub: manual reconnect");
                self.pool.close_all();
                self.active = true;
                self.reconcile();
            }
            Instruction::Disconnect => {
                self.listener.info("eventsub: disconnect");
                self.pool.close_all();
                self.active = false;
            }
            Instruction::IsConnected(tx) => {
                let _ = tx.send(self.active && self.pool.any_welcomed());
            }
            Instruction::StatusText(tx) => {
                let _ = tx.send(self.status_summary());
            }
            Instruction::TopicsText(tx) => {
                let _ = tx.send(self.topics_summary());
            }
            Instruction::ServerTopics(tx) => {
                let api = self.api.clone();
                let task_tx = self.task_tx.clone();
                tokio::spawn(async move {
                    let result = api.subscriptions().await;
                    let _ = task_tx.unbounded_send(TaskEvent::ServerList { result, tx });
                });
            }
        }
    }

    fn listen(&mut self, family: TopicFamily, channel: &str) {
        let channel = crate::topic::normalize_login(channel);
        if family == TopicFamily::Raid && self.local_login.as_deref() == Some(channel.as_str()) {
            // raids on the own channel are shared between callers
            if !self.dedup.listen(&channel) {
                trace!(channel, "Raid topic already held for local channel");
                return
            }
        }
        self.resolver.renew_interest(&channel);
        if let Some(local) = &self.local_login {
            let local = local.clone();
            self.resolver.renew_interest(&local);
        }
        for kind in family.kinds() {
            self.desired.insert(Topic::new(*kind, &channel));
        }
        self.reconcile();
    }

    fn unlisten(&mut self, family: TopicFamily, channel: &str) {
        let channel = crate::topic::normalize_login(channel);
        if family == TopicFamily::Raid
            && self.local_login.as_deref() == Some(channel.as_str())
            && !self.dedup.unlisten(&channel)
        {
            trace!(channel, "Raid topic still held by another caller");
            return
        }
        for kind in family.kinds() {
            self.desired.remove(&Topic::new(*kind, &channel));
        }
        self.reconcile();
    }

    // ---- websocket events ----

    fn on_ws(&mut self, ev: WsEvent) {
        match ev {
            WsEvent::Frame { conn, frame } => self.on_frame(conn, frame),
            WsEvent::Closed { conn, cause } => self.on_conn_closed(conn, cause),
        }
    }

    #[tracing::instrument(skip(self, frame), fields(%conn))]
    fn on_frame(&mut self, conn: ConnId, frame: Frame) {
        let Some(pos) = self.pool.position_by_conn(conn) else {
            trace!("Frame from stale connection");
            return
        };
        match frame {
            Frame::Welcome { session_id, keepalive_secs } => {
                self.on_welcome(pos, conn, session_id, keepalive_secs)
            }
            Frame::Keepalive => {
                let grace = self.cfg.keepalive_grace;
                if let Some(s) = self.pool.get_mut(pos) {
                    if s.conn == conn && s.state == SessionState::Welcomed {
                        s.arm_watchdog(grace);
                    }
                }
            }
            Frame::Notification { subscription_type, event } => {
                let grace = self.cfg.keepalive_grace;
                if let Some(s) = self.pool.get_mut(pos) {
                    if s.conn == conn && s.state == SessionState::Welcomed {
                        s.arm_watchdog(grace);
                    }
                }
                // also dispatched for the connection being retired during a
                // handoff; that window must not lose events
                self.listener.event(&subscription_type, &event);
            }
            Frame::Reconnect { reconnect_url } => self.on_reconnect_frame(pos, conn, reconnect_url),
            Frame::Revocation { subscription_id, status } => {
                self.on_revocation(&subscription_id, &status)
            }
            Frame::Unknown { message_type } => {
                self.listener.info(&format!("eventsub: ignoring unknown frame type {message_type:?}"));
            }
        }
    }

    fn on_welcome(&mut self, pos: usize, conn: ConnId, session_id: String, keepalive_secs: u64) {
        let grace = self.cfg.keepalive_grace;
        let Some(s) = self.pool.get_mut(pos) else { return };

        if s.next_conn == Some(conn) {
            // replacement connection of a server-directed reconnect came up:
            // swap it in, then re-create every subscription against the new
            // session id before retiring the old connection
            s.prev_conn = Some(s.conn);
            s.prev_handle = s.handle.take();
            s.conn = conn;
            s.handle = s.next_handle.take();
            s.next_conn = None;
            s.session_id = Some(session_id.clone());
            s.keepalive = std::time::Duration::from_secs(keepalive_secs);
            s.state = SessionState::Welcomed;
            s.backoff.reset();
            s.arm_watchdog(grace);

            for placed in s.placed.values_mut() {
                let remove_after = matches!(placed.state, PlacedState::Creating { remove_after: true });
                placed.state = PlacedState::Creating { remove_after };
            }
            if let Some(old) = s.prev_handle.take() {
                old.shutdown();
            }
            let index = s.index;
            let topics: Vec<Topic> = s.placed.keys().cloned().collect();
            self.listener
                .info(&format!("eventsub: session #{index} moved to new connection ({session_id})"));
            for topic in topics {
                self.submit_create(pos, &topic);
            }
            self.reconcile();
            return
        }

        if s.conn != conn {
            trace!("Welcome from neither current nor replacement connection");
            return
        }
        match s.state {
            SessionState::Connecting => {
                s.session_id = Some(session_id.clone());
                s.keepalive = std::time::Duration::from_secs(keepalive_secs);
                s.state = SessionState::Welcomed;
                s.backoff.reset();
                s.arm_watchdog(grace);
                let index = s.index;
                self.listener.info(&format!("eventsub: session #{index} ready ({session_id})"));
                self.reconcile();
            }
            SessionState::Welcomed => {
                // duplicate welcome; treat as traffic
                s.arm_watchdog(grace);
            }
            SessionState::Reconnecting | SessionState::Closed => {
                trace!("Welcome in state {:?} ignored", s.state);
            }
        }
    }

    fn on_reconnect_frame(&mut self, pos: usize, conn: ConnId, reconnect_url: String) {
        let next = self.pool.alloc_conn();
        let welcome_timeout = self.cfg.welcome_timeout;
        let Some(s) = self.pool.get_mut(pos) else { return };
        if s.conn != conn || s.state != SessionState::Welcomed {
            trace!("Reconnect directive ignored in state {:?}", s.state);
            return
        }
        s.state = SessionState::Reconnecting;
        s.next_conn = Some(next);
        s.arm_welcome(welcome_timeout);
        let index = s.index;
        self.listener
            .info(&format!("eventsub: session #{index} asked to reconnect, opening {reconnect_url}"));
        self.spawn_connect(next, reconnect_url);
    }

    fn on_revocation(&mut self, subscription_id: &str, status: &str) {
        match self.pool.position_by_server_id(subscription_id) {
            Some((pos, topic)) => {
                if let Some(s) = self.pool.get_mut(pos) {
                    s.forget(&topic);
                }
                self.desired.remove(&topic);
                self.listener.info(&format!("eventsub: subscription revoked ({status}): {topic}"));
                self.reconcile();
            }
            None => {
                self.listener
                    .info(&format!("eventsub: revocation for unknown subscription {subscription_id} ({status})"));
            }
        }
    }

    fn on_conn_closed(&mut self, conn: ConnId, cause: CloseCause) {
        let Some(pos) = self.pool.position_by_conn(conn) else {
            trace!(%conn, "Close from stale connection");
            return
        };
        let Some(s) = self.pool.get_mut(pos) else { return };

        if s.prev_conn == Some(conn) {
            // retired handoff connection is finally gone
            s.prev_conn = None;
            s.prev_handle = None;
            return
        }
        if s.next_conn == Some(conn) {
            // replacement died before it was welcomed; the old connection is
            // on its way out per the server, so start over from scratch
            s.next_conn = None;
            s.next_handle = None;
            self.close_session(pos, &format!("replacement connection failed: {cause}"));
            return
        }
        match s.state {
            SessionState::Closed => {}
            SessionState::Reconnecting => {
                // old connection died during the overlap; keep waiting for
                // the replacement's welcome
                s.handle = None;
            }
            SessionState::Connecting | SessionState::Welcomed => {
                self.close_session(pos, &cause.to_string());
            }
        }
    }

    /// Full teardown of one session: backends shut down, placements drained
    /// back into the pending pool, reopen scheduled with backoff while
    /// anything still wants a session.
    fn close_session(&mut self, pos: usize, reason: &str) {
        let Some(s) = self.pool.get_mut(pos) else { return };
        let index = s.index;
        let drained = s.close();
        trace!(index, drained = drained.len(), reason, "Session closed");

        let needed =
            self.active && self.desired.iter().any(|t| !self.pool.holds(t));
        if needed {
            if let Some(s) = self.pool.get_mut(pos) {
                let delay = s.backoff.next_delay();
                s.deadline = Some(Instant::now() + delay);
                self.listener.info(&format!(
                    "eventsub: session #{index} lost ({reason}); reconnecting in {}s",
                    delay.as_secs()
                ));
            }
        } else {
            self.listener.info(&format!("eventsub: session #{index} closed ({reason})"));
        }
        self.pool.prune();
        self.reconcile();
    }

    // ---- task completions ----

    fn on_task(&mut self, ev: TaskEvent) {
        match ev {
            TaskEvent::Opened { conn, result } => self.on_opened(conn, result),
            TaskEvent::Resolved { login, result } => self.on_resolved(login, result),
            TaskEvent::Created { conn, topic, result } => self.on_created(conn, topic, result),
            TaskEvent::ServerList { result, tx } => {
                let _ = tx.send(result.map(|subs| self.render_server_list(&subs)));
            }
        }
    }

    fn on_opened(&mut self, conn: ConnId, result: Result<BackendHandle, TransportError>) {
        let Some(pos) = self.pool.position_by_conn(conn) else {
            // session was torn down while the dial was in flight
            if let Ok(handle) = result {
                handle.shutdown();
            }
            return
        };
        match result {
            Ok(handle) => {
                let welcome_timeout = self.cfg.welcome_timeout;
                let Some(s) = self.pool.get_mut(pos) else { return };
                if s.next_conn == Some(conn) {
                    s.next_handle = Some(handle);
                } else if s.conn == conn && s.handle.is_none() && s.state != SessionState::Closed {
                    // frames may already have raced ahead of this completion
                    // and welcomed the session; keep the handle either way
                    s.handle = Some(handle);
                    if s.state == SessionState::Connecting {
                        // transport open: the welcome window starts now
                        s.arm_welcome(welcome_timeout);
                    }
                } else {
                    handle.shutdown();
                }
            }
            Err(e) => self.on_conn_closed(conn, CloseCause::ConnectFailed(e.to_string())),
        }
    }

    fn on_resolved(&mut self, login: String, result: Result<Option<String>, ApiError>) {
        match result {
            Ok(Some(id)) => {
                debug!(login, id, "Resolved user id");
                self.resolver.complete(&login, Some(id));
                self.reconcile();
            }
            Ok(None) => {
                self.resolver.complete(&login, None);
                self.listener.info(&format!("eventsub: no such user: {login}"));
            }
            Err(e) => {
                warn!(login, err = %e, "User id lookup failed");
                self.resolver.abandon(&login);
            }
        }
    }

    fn on_created(&mut self, conn: ConnId, topic: Topic, result: Result<CreatedSubscription, ApiError>) {
        let pos = self
            .pool
            .position_by_conn(conn)
            .filter(|&p| {
                self.pool
                    .get(p)
                    .map(|s| s.conn == conn && s.state == SessionState::Welcomed)
                    .unwrap_or(false)
            });
        let Some(pos) = pos else {
            // the session this create was bound to is gone; clean up whatever
            // the server may have registered for it
            if let Ok(created) = result {
                self.spawn_delete(created.id);
            }
            return
        };

        match result {
            Ok(created) => {
                let Some(s) = self.pool.get_mut(pos) else { return };
                match s.placed.get_mut(&topic) {
                    Some(Placed { state: PlacedState::Creating { remove_after: true }, .. }) => {
                        s.forget(&topic);
                        self.spawn_delete(created.id);
                    }
                    Some(placed @ Placed { state: PlacedState::Creating { remove_after: false }, .. }) => {
                        // mirror the server-reported cost
                        let expected = placed.cost;
                        placed.cost = created.cost;
                        placed.state = PlacedState::Active { server_id: created.id };
                        s.used_cost = s.used_cost - expected + created.cost;
                        debug!(%topic, "Subscription active");
                    }
                    Some(Placed { state: PlacedState::Active { .. }, .. }) | None => {
                        // duplicate response or already forgotten
                        self.spawn_delete(created.id);
                    }
                }
            }
            Err(e) if e.is_rate_limit() => {
                if let Some(s) = self.pool.get_mut(pos) {
                    s.forget(&topic);
                }
                // back to pending; picked up again on the next reconcile
                // trigger rather than in a tight loop
                self.notice_limit();
            }
            Err(e) => {
                if let Some(s) = self.pool.get_mut(pos) {
                    s.forget(&topic);
                }
                self.desired.remove(&topic);
                self.listener.info(&format!("eventsub: could not create {topic}: {e}"));
            }
        }
    }

    // ---- deadlines ----

    fn on_deadline(&mut self) {
        let now = Instant::now();
        // handle one expiry at a time; each handler rewrites or clears the
        // deadline it fired for
        while let Some(pos) = self.pool.expired(now).first().copied() {
            let Some(s) = self.pool.get_mut(pos) else { break };
            match s.state {
                SessionState::Closed => {
                    let conn = self.pool.alloc_conn();
                    let url = self.cfg.url.clone();
                    let welcome_timeout = self.cfg.welcome_timeout;
                    let Some(s) = self.pool.get_mut(pos) else { continue };
                    s.conn = conn;
                    s.session_id = None;
                    s.state = SessionState::Connecting;
                    s.arm_welcome(welcome_timeout);
                    debug!(index = s.index, %conn, "Reopening session");
                    self.spawn_connect(conn, url);
                }
                SessionState::Connecting => {
                    self.close_session(pos, "no welcome within timeout");
                }
                SessionState::Reconnecting => {
                    self.close_session(pos, "replacement not welcomed within timeout");
                }
                SessionState::Welcomed => {
                    self.close_session(pos, "keepalive watchdog expired");
                }
            }
        }
    }

    // ---- reconciliation ----

    /// Runs whenever an id resolves, a session is welcomed or the desired
    /// set changes: deletes placed-but-undesired subscriptions, places every
    /// pending-and-ready one, opens capacity when needed.
    fn reconcile(&mut self) {
        if !self.active {
            return
        }

        // drop what is no longer wanted
        let mut deletes = Vec::new();
        for s in self.pool.iter_mut() {
            let stale: Vec<Topic> =
                s.placed.keys().filter(|t| !self.desired.contains(*t)).cloned().collect();
            for topic in stale {
                if let Some(server_id) = s.remove(&topic) {
                    deletes.push(server_id);
                }
            }
        }
        for server_id in deletes {
            self.spawn_delete(server_id);
        }

        // wake dormant closed sessions if there is anything left to place
        let unplaced: Vec<Topic> =
            self.desired.iter().filter(|t| !self.pool.holds(t)).cloned().collect();
        if !unplaced.is_empty() {
            let now = Instant::now();
            for s in self.pool.iter_mut() {
                if s.state == SessionState::Closed && s.deadline.is_none() {
                    s.deadline = Some(now);
                }
            }
        }

        // place everything that is ready
        let mut need_session = false;
        for topic in &unplaced {
            if !self.is_ready(topic) {
                self.request_ids(topic);
                continue
            }
            let cost = topic.kind.descriptor().cost;
            match self.pool.try_place(topic, cost) {
                PoolPlacement::Placed(pos) => self.submit_create(pos, topic),
                PoolPlacement::AwaitSession => {}
                PoolPlacement::Full => need_session = true,
            }
        }

        if need_session {
            if self.pool.len() < self.pool.max_sessions {
                self.open_new_session();
            } else {
                self.notice_capacity();
            }
        } else if self.pool.is_empty() && !unplaced.is_empty() {
            // ids may still be resolving, but the session can welcome in the
            // meantime
            self.open_new_session();
        }

        self.pool.prune();
    }

    fn is_ready(&self, topic: &Topic) -> bool {
        if self.resolver.lookup(&topic.channel).is_none() {
            return false
        }
        if topic.kind.needs_local() {
            match &self.local_login {
                None => return false,
                Some(local) => {
                    if self.resolver.lookup(local).is_none() {
                        return false
                    }
                }
            }
        }
        true
    }

    /// Kicks off resolution for whichever of the topic's logins are still
    /// unknown. Concurrent interest in one login shares a single call.
    fn request_ids(&mut self, topic: &Topic) {
        if self.resolver.lookup(&topic.channel).is_none() && self.resolver.begin(&topic.channel) {
            self.spawn_resolve(topic.channel.clone());
        }
        if topic.kind.needs_local() {
            if let Some(local) = self.local_login.clone() {
                if self.resolver.lookup(&local).is_none() && self.resolver.begin(&local) {
                    self.spawn_resolve(local);
                }
            }
        }
    }

    fn submit_create(&mut self, pos: usize, topic: &Topic) {
        let (conn, session_id, index) = {
            let Some(s) = self.pool.get_mut(pos) else { return };
            match &s.session_id {
                Some(id) => (s.conn, id.clone(), s.index),
                None => {
                    s.forget(topic);
                    return
                }
            }
        };
        let Some(broadcaster_id) = self.resolver.lookup(&topic.channel).map(str::to_owned) else {
            if let Some(s) = self.pool.get_mut(pos) {
                s.forget(topic);
            }
            return
        };
        let local_id = self
            .local_login
            .as_ref()
            .and_then(|l| self.resolver.lookup(l))
            .map(str::to_owned);

        let body = topic.create_body(&broadcaster_id, local_id.as_deref(), &session_id);
        self.listener.info(&format!("eventsub: creating {topic} on session #{index}"));

        let api = self.api.clone();
        let task_tx = self.task_tx.clone();
        let topic = topic.clone();
        tokio::spawn(async move {
            let result = api.create_subscription(&body).await;
            let _ = task_tx.unbounded_send(TaskEvent::Created { conn, topic, result });
        });
    }

    fn open_new_session(&mut self) {
        let url = self.cfg.url.clone();
        let welcome_timeout = self.cfg.welcome_timeout;
        let s = self.pool.open_session();
        s.arm_welcome(welcome_timeout);
        let conn = s.conn;
        debug!(index = s.index, %conn, "Opening session");
        self.spawn_connect(conn, url);
    }

    fn spawn_connect(&self, conn: ConnId, url: String) {
        let connector = self.connector.clone();
        let ws_tx = self.ws_tx.clone();
        let task_tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = connector.connect(&url, conn, ws_tx).await;
            let _ = task_tx.unbounded_send(TaskEvent::Opened { conn, result });
        });
    }

    fn spawn_resolve(&self, login: String) {
        let api = self.api.clone();
        let task_tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = api.user_id(&login).await;
            let _ = task_tx.unbounded_send(TaskEvent::Resolved { login, result });
        });
    }

    fn spawn_delete(&self, server_id: String) {
        let api = self.api.clone();
        tokio::spawn(async move {
            match api.delete_subscription(&server_id).await {
                Ok(()) => debug!(server_id, "Subscription deleted"),
                Err(e) => warn!(server_id, err = %e, "Delete failed"),
            }
        });
    }

    // ---- notices & summaries ----

    fn notice_limit(&mut self) {
        if !self.limit_notified {
            self.limit_notified = true;
            self.listener.info(
                "session.eventsub.limit: subscription limit reached; topics stay queued until something changes",
            );
        }
    }

    fn notice_capacity(&mut self) {
        if !self.capacity_notified {
            self.capacity_notified = true;
            self.listener.info(&format!(
                "session.eventsub.capacity: all {} sessions at their cost budget; queuing further topics",
                self.pool.len()
            ));
        }
    }

    fn status_summary(&self) -> String {
        if !self.active {
            return "disconnected".to_owned()
        }
        let state = if self.pool.any_welcomed() { "connected" } else { "connecting" };
        format!("{state} ({})", self.pool.status_text())
    }

    fn emit_status(&mut self) {
        let summary = self.status_summary();
        if summary != self.last_status {
            self.last_status = summary.clone();
            self.listener.status_changed(&summary);
        }
    }

    fn topics_summary(&self) -> String {
        if self.desired.is_empty() {
            return "no topics".to_owned()
        }
        let mut lines: Vec<String> = self
            .desired
            .iter()
            .map(|topic| match self.pool.position_of(topic) {
                Some(pos) => match self.pool.get(pos) {
                    Some(s) => {
                        let state = match s.placed.get(topic).map(|p| &p.state) {
                            Some(PlacedState::Active { .. }) => "active",
                            _ => "creating",
                        };
                        format!("{topic}: {state} on session #{}", s.index)
                    }
                    None => format!("{topic}: pending"),
                },
                None if self.is_ready(topic) => format!("{topic}: waiting for session"),
                None => format!("{topic}: waiting for ids"),
            })
            .collect();
        lines.sort();
        lines.join("\n")
    }

    fn render_server_list(&self, subs: &[ServerSubscription]) -> String {
        if subs.is_empty() {
            return "no server-side subscriptions".to_owned()
        }
        let mut lines: Vec<String> = subs
            .iter()
            .map(|sub| {
                let who = sub
                    .condition
                    .broadcaster_user_id
                    .as_deref()
                    .or(sub.condition.from_broadcaster_user_id.as_deref())
                    .map(|id| self.resolver.login_for(id).unwrap_or(id).to_owned())
                    .unwrap_or_else(|| "-".to_owned());
                format!("{} {} ({}, cost {})", sub.kind, who, sub.status, sub.cost)
            })
            .collect();
        lines.sort();
        lines.join("\n")
    }
}
