use std::fmt;

use serde::Deserialize;
use serde_json::value::RawValue;
use thiserror::Error;

/// Identifies one underlying websocket connection for the lifetime of the
/// process. A session swaps connections on reconnect; tagging every event
/// with the connection it came from lets the owner drop stale traffic.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why a backend task ended.
#[derive(Clone, Debug)]
pub enum CloseCause {
    /// The initial connect failed.
    ConnectFailed(String),
    /// Socket-level error while reading or writing.
    Error(String),
    /// Remote server sent a Close message
    ServerClose(Option<String>),
    /// The stream ended without a close frame.
    Gone,
    /// We asked the backend to stop.
    Shutdown,
}

impl fmt::Display for CloseCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseCause::ConnectFailed(e) => write!(f, "connect failed: {e}"),
            CloseCause::Error(e) => write!(f, "socket error: {e}"),
            CloseCause::ServerClose(Some(reason)) => write!(f, "closed by server: {reason}"),
            CloseCause::ServerClose(None) => write!(f, "closed by server"),
            CloseCause::Gone => write!(f, "server has gone away"),
            CloseCause::Shutdown => write!(f, "shut down"),
        }
    }
}

/// What a backend task posts into the owner's mailbox.
#[derive(Debug)]
pub enum WsEvent {
    Frame { conn: ConnId, frame: Frame },
    Closed { conn: ConnId, cause: CloseCause },
}

/// A classified inbound frame.
#[derive(Debug)]
pub enum Frame {
    Welcome {
        session_id: String,
        keepalive_secs: u64,
    },
    Keepalive,
    Notification {
        subscription_type: String,
        event: Box<RawValue>,
    },
    Reconnect {
        reconnect_url: String,
    },
    Revocation {
        subscription_id: String,
        status: String,
    },
    /// Frame types this crate does not know; logged and ignored upstream.
    Unknown {
        message_type: String,
    },
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("frame is missing required field {0}")]
    MissingField(&'static str),
}

#[derive(Deserialize)]
struct RawFrame {
    metadata: Metadata,
    #[serde(default)]
    payload: Payload,
}

#[derive(Deserialize)]
struct Metadata {
    message_type: String,
    #[serde(default)]
    subscription_type: Option<String>,
}

#[derive(Default, Deserialize)]
struct Payload {
    #[serde(default)]
    session: Option<PayloadSession>,
    #[serde(default)]
    subscription: Option<PayloadSubscription>,
    #[serde(default)]
    event: Option<Box<RawValue>>,
}

#[derive(Deserialize)]
struct PayloadSession {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    keepalive_timeout_seconds: Option<u64>,
    #[serde(default)]
    reconnect_url: Option<String>,
}

#[derive(Deserialize)]
struct PayloadSubscription {
    id: String,
    #[serde(default)]
    status: Option<String>,
}

impl Frame {
    /// Parses one text frame. Unknown `message_type`s parse successfully as
    /// [`Frame::Unknown`]; missing required fields for a known type are an
    /// error.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let raw: RawFrame = serde_json::from_str(text)?;
        let frame = match raw.metadata.message_type.as_str() {
            "session_welcome" => {
                let session = raw
                    .payload
                    .session
                    .ok_or(FrameError::MissingField("payload.session"))?;
                Frame::Welcome {
                    session_id: session.id.ok_or(FrameError::MissingField("payload.session.id"))?,
                    keepalive_secs: session
                        .keepalive_timeout_seconds
                        .ok_or(FrameError::MissingField("payload.session.keepalive_timeout_seconds"))?,
                }
            }
            "session_keepalive" => Frame::Keepalive,
            "notification" => Frame::Notification {
                subscription_type: raw
                    .metadata
                    .subscription_type
                    .ok_or(FrameError::MissingField("metadata.subscription_type"))?,
                event: raw.payload.event.ok_or(FrameError::MissingField("payload.event"))?,
            },
            "session_reconnect" => Frame::Reconnect {
                reconnect_url: raw
                    .payload
                    .session
                    .and_then(|s| s.reconnect_url)
                    .ok_or(FrameError::MissingField("payload.session.reconnect_url"))?,
            },
            "revocation" => {
                let sub = raw
                    .payload
                    .subscription
                    .ok_or(FrameError::MissingField("payload.subscription"))?;
                Frame::Revocation {
                    subscription_id: sub.id,
                    status: sub.status.unwrap_or_else(|| "unknown".to_owned()),
                }
            }
            other => Frame::Unknown { message_type: other.to_owned() },
        };
        Ok(frame)
    }
}

// Display is what ends up in the wire-traffic info log, so keep it terse.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Welcome { session_id, keepalive_secs } => {
                write!(f, "welcome (session {session_id}, keepalive {keepalive_secs}s)")
            }
            Frame::Keepalive => write!(f, "keepalive"),
            Frame::Notification { subscription_type, .. } => {
                write!(f, "notification ({subscription_type})")
            }
            Frame::Reconnect { reconnect_url } => write!(f, "reconnect -> {reconnect_url}"),
            Frame::Revocation { subscription_id, status } => {
                write!(f, "revocation ({subscription_id}: {status})")
            }
            Frame::Unknown { message_type } => write!(f, "unknown frame type {message_type:?}"),
        }
    }
}

mod aliases {
    pub use tokio_tungstenite::{connect_async, tungstenite};
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
    pub type Message = tungstenite::protocol::Message;
    pub type WsError = tungstenite::Error;

    pub type InternalStream =
        futures_util::stream::Fuse<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;
}

pub use aliases::*;
