//! The public face of the crate: a cloneable handle that talks to the
//! manager task over an instruction channel.

use std::sync::Arc;
use std::time::Duration;

use futures_channel::{mpsc, oneshot};

use crate::actor::ManagerActor;
use crate::api::TwitchApi;
use crate::error::EventSubError;
use crate::listener::EventSubListener;
use crate::topic::TopicFamily;
use crate::ws::{Connector, WsConnector};

/// The standard EventSub websocket endpoint.
pub const DEFAULT_URL: &str = "wss://eventsub.wss.twitch.tv/ws";

/// Tunables. The defaults match the upstream platform's published limits at
/// the time of writing; none of them are load-bearing for correctness.
#[derive(Clone, Debug)]
pub struct Config {
    /// Websocket endpoint for fresh sessions. A `session_reconnect`
    /// directive overrides this for the replacement connection only.
    pub url: String,
    /// Per-session cost budget.
    pub cost_budget: u32,
    /// Hard cap on concurrently open sessions.
    pub max_sessions: usize,
    /// How long a connection may take from dialing to the welcome frame.
    pub welcome_timeout: Duration,
    /// Slack added on top of two keepalive periods for the watchdog.
    pub keepalive_grace: Duration,
    /// Ceiling for the exponential reopen backoff.
    pub backoff_ceiling: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
            cost_budget: 10,
            max_sessions: 3,
            welcome_timeout: Duration::from_secs(15),
            keepalive_grace: Duration::from_secs(3),
            backoff_ceiling: Duration::from_secs(60),
        }
    }
}

/// Instructions for the manager task.
pub(crate) enum Instruction {
    Listen { family: TopicFamily, channel: String },
    Unlisten { family: TopicFamily, channel: String },
    SetLocalUsername(String),
    TokenUpdated,
    Reconnect,
    Disconnect,
    IsConnected(oneshot::Sender<bool>),
    StatusText(oneshot::Sender<String>),
    TopicsText(oneshot::Sender<String>),
    ServerTopics(oneshot::Sender<Result<String, crate::api::ApiError>>),
}

/// Maintains a durable set of EventSub subscriptions for the application.
///
/// Cloning is cheap; all clones drive the same manager task. The task keeps
/// running until every handle is dropped.
#[derive(Clone)]
pub struct EventSub {
    instructions: mpsc::UnboundedSender<Instruction>,
}

impl EventSub {
    /// Starts a manager with the default configuration and the production
    /// websocket connector. Must be called within a tokio runtime.
    pub fn new(api: Arc<dyn TwitchApi>, listener: Arc<dyn EventSubListener>) -> Self {
        Self::with_config(api, listener, Config::default())
    }

    pub fn with_config(
        api: Arc<dyn TwitchApi>,
        listener: Arc<dyn EventSubListener>,
        config: Config,
    ) -> Self {
        Self::with_connector(api, listener, Arc::new(WsConnector), config)
    }

    /// Starts a manager with a custom [`Connector`]. This is the seam test
    /// harnesses use to feed synthetic frames.
    pub fn with_connector(
        api: Arc<dyn TwitchApi>,
        listener: Arc<dyn EventSubListener>,
        connector: Arc<dyn Connector>,
        config: Config,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded();
        ManagerActor::new(config, api, listener, connector, rx).spawn();
        Self { instructions: tx }
    }

    fn send(&self, instruction: Instruction) -> Result<(), EventSubError> {
        self.instructions.unbounded_send(instruction).map_err(|_| EventSubError::ManagerGone)
    }

    async fn query<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Instruction,
    ) -> Result<T, EventSubError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx))?;
        rx.await.map_err(|_| EventSubError::QueryDropped)
    }

    /// Must be set before any topic that carries the local user's id can be
    /// submitted; pending topics flush automatically once it resolves.
    pub fn set_local_username(&self, name: &str) -> Result<(), EventSubError> {
        self.send(Instruction::SetLocalUsername(crate::topic::normalize_login(name)))
    }

    /// The application refreshed its token; subsequent API calls pick up the
    /// new authorization. Existing subscriptions are untouched.
    pub fn token_updated(&self) -> Result<(), EventSubError> {
        self.send(Instruction::TokenUpdated)
    }

    /// Drops every connection and builds the session set up from scratch.
    pub fn reconnect(&self) -> Result<(), EventSubError> {
        self.send(Instruction::Reconnect)
    }

    /// Cooperatively closes all sessions. Listens are remembered and
    /// realized again after [`EventSub::reconnect`].
    pub fn disconnect(&self) -> Result<(), EventSubError> {
        self.send(Instruction::Disconnect)
    }

    pub async fn is_connected(&self) -> Result<bool, EventSubError> {
        self.query(Instruction::IsConnected).await
    }

    /// One-line connectivity summary, the same text pushed through
    /// [`crate::EventSubListener::status_changed`].
    pub async fn status_text(&self) -> Result<String, EventSubError> {
        self.query(Instruction::StatusText).await
    }

    /// Multi-line diagnostic: every desired topic and where it stands.
    pub async fn topics_text(&self) -> Result<String, EventSubError> {
        self.query(Instruction::TopicsText).await
    }

    /// Fetches and renders the server-side subscription list.
    pub async fn server_topics(&self) -> Result<String, EventSubError> {
        self.query(Instruction::ServerTopics).await?.map_err(EventSubError::Api)
    }
}

macro_rules! listen_methods {
    ($(($listen:ident, $unlisten:ident, $family:ident, $doc:literal),)*) => {
        impl EventSub {
            $(
                #[doc = concat!("Listens for ", $doc, " on `channel`.")]
                pub fn $listen(&self, channel: &str) -> Result<(), EventSubError> {
                    self.send(Instruction::Listen {
                        family: TopicFamily::$family,
                        channel: channel.to_owned(),
                    })
                }

                #[doc = concat!("Stops listening for ", $doc, " on `channel`.")]
                pub fn $unlisten(&self, channel: &str) -> Result<(), EventSubError> {
                    self.send(Instruction::Unlisten {
                        family: TopicFamily::$family,
                        channel: channel.to_owned(),
                    })
                }
            )*
        }
    };
}

listen_methods! {
    (listen_raid, unlisten_raid, Raid, "incoming raids"),
    (listen_poll, unlisten_poll, Poll, "poll start/end"),
    (listen_shield, unlisten_shield, Shield, "shield mode changes"),
    (listen_shoutouts, unlisten_shoutouts, Shoutouts, "shoutouts"),
    (listen_mod_actions, unlisten_mod_actions, ModActions, "moderator actions"),
    (listen_automod, unlisten_automod, Automod, "automod message holds/updates"),
    (listen_suspicious, unlisten_suspicious, Suspicious, "suspicious-user messages"),
    (listen_warnings, unlisten_warnings, Warnings, "warning acknowledgements"),
    (listen_message_held, unlisten_message_held, MessageHeld, "held own-message updates"),
    (listen_points, unlisten_points, Points, "channel point redemptions"),
}
