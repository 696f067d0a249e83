#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

//! Self-healing EventSub subscription management over websocket transport.
//!
//! The entry point is [`EventSub`]: hand it an implementation of the
//! [`TwitchApi`] collaborator and an [`EventSubListener`], then call the
//! `listen_*`/`unlisten_*` methods with channel names. The manager resolves
//! names to ids, opens however many websocket sessions the per-session cost
//! budget requires, keeps every subscription alive across keepalive losses
//! and server-directed reconnects, and fans incoming notifications out to
//! the listener.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use eventsub_ws::{EventSub, EventSubListener, TwitchApi};
//! # async fn run(api: Arc<dyn TwitchApi>, listener: Arc<dyn EventSubListener>) {
//! let eventsub = EventSub::new(api, listener);
//! eventsub.set_local_username("me").unwrap();
//! eventsub.listen_mod_actions("somechannel").unwrap();
//! # }
//! ```

mod actor;

mod api;
pub use api::{ApiError, CreatedSubscription, ServerSubscription, TwitchApi};

mod dedup;

mod error;
pub use error::EventSubError;

mod listener;
pub use listener::EventSubListener;

mod manager;
pub use manager::{Config, EventSub, DEFAULT_URL};

mod pool;

mod resolver;

mod session;

mod topic;
pub use topic::{
    normalize_login, Condition, CreateSubscriptionBody, Topic, TopicFamily, TopicKind,
    TransportSpec,
};

pub mod ws;
pub use ws::{BackendHandle, CloseCause, ConnId, Connector, Frame, WsConnector, WsEvent};
