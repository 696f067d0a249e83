//! The catalogue of EventSub topics this crate can maintain, and the wire
//! body used to create them.
//!
//! Every server-side subscription kind is one [`TopicKind`] variant. The
//! variant fixes the wire type string, the condition shape, the version and
//! the cost counted against a session's budget. A [`Topic`] (kind + channel
//! login) is the identity used everywhere else in the crate: the pending set,
//! the per-session placement maps and the listen/unlisten surface all key on
//! it.

use serde::{Deserialize, Serialize};

/// Strips an IRC-style `#` prefix and lowercases, so that listen/unlisten
/// calls agree on identity no matter how the caller spells the channel.
pub fn normalize_login(login: &str) -> String {
    login.trim().trim_start_matches('#').to_ascii_lowercase()
}

/// Which resolved id of the local (authenticated) user a topic's condition
/// carries, if any.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LocalRole {
    /// The condition has no field for the local user.
    None,
    /// The local user appears as `moderator_user_id`.
    Moderator,
    /// The local user appears as `user_id`.
    User,
}

/// Static description of one topic kind: everything needed to build and
/// budget its create request.
#[derive(Copy, Clone, Debug)]
pub struct Descriptor {
    /// Wire `type` string.
    pub type_str: &'static str,
    /// Wire `version` string.
    pub version: &'static str,
    /// Cost counted against the per-session budget.
    pub cost: u32,
    /// How the local user's id enters the condition.
    pub local: LocalRole,
    /// `true` for topics whose broadcaster id goes into
    /// `from_broadcaster_user_id` instead of `broadcaster_user_id`.
    pub from_broadcaster: bool,
}

/// All subscription kinds the manager knows how to create.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TopicKind {
    Raid,
    PollBegin,
    PollEnd,
    ShieldBegin,
    ShieldEnd,
    ShoutoutCreate,
    ChannelModerate,
    AutomodMessageHold,
    AutomodMessageUpdate,
    SuspiciousMessage,
    SuspiciousUpdate,
    WarningAcknowledge,
    UserMessageUpdate,
    #[cfg(feature = "user-message-hold")]
    UserMessageHold,
    PointsRedemptionAdd,
    PointsRedemptionUpdate,
}

impl TopicKind {
    /// The descriptor table. A create body is a pure function of
    /// (descriptor, resolved ids, session id), see [`Topic::create_body`].
    pub fn descriptor(self) -> Descriptor {
        use LocalRole::*;
        let (type_str, version, cost, local, from_broadcaster) = match self {
            Self::Raid => ("channel.raid", "1", 1, None, true),
            Self::PollBegin => ("channel.poll.begin", "1", 0, None, false),
            Self::PollEnd => ("channel.poll.end", "1", 0, None, false),
            Self::ShieldBegin => ("channel.shield_mode.begin", "1", 0, Moderator, false),
            Self::ShieldEnd => ("channel.shield_mode.end", "1", 0, Moderator, false),
            Self::ShoutoutCreate => ("channel.shoutout.create", "1", 0, Moderator, false),
            Self::ChannelModerate => ("channel.moderate", "2", 0, Moderator, false),
            Self::AutomodMessageHold => ("automod.message.hold", "2", 0, Moderator, false),
            Self::AutomodMessageUpdate => ("automod.message.update", "2", 0, Moderator, false),
            Self::SuspiciousMessage => ("channel.suspicious_user.message", "1", 0, Moderator, false),
            Self::SuspiciousUpdate => ("channel.suspicious_user.update", "1", 0, Moderator, false),
            Self::WarningAcknowledge => ("channel.warning.acknowledge", "1", 0, Moderator, false),
            Self::UserMessageUpdate => ("channel.chat.user_message_update", "1", 0, User, false),
            #[cfg(feature = "user-message-hold")]
            Self::UserMessageHold => ("channel.chat.user_message_hold", "1", 0, User, false),
            Self::PointsRedemptionAdd => {
                ("channel.channel_points_custom_reward_redemption.add", "1", 0, None, false)
            }
            Self::PointsRedemptionUpdate => {
                ("channel.channel_points_custom_reward_redemption.update", "1", 0, None, false)
            }
        };
        Descriptor { type_str, version, cost, local, from_broadcaster }
    }

    /// Whether the condition requires the local user's resolved id.
    pub fn needs_local(self) -> bool {
        self.descriptor().local != LocalRole::None
    }
}

/// The high-level intents exposed on the manager surface. Most map to a
/// single topic kind, a few fan out to a begin/end or add/update pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TopicFamily {
    Raid,
    Poll,
    Shield,
    Shoutouts,
    ModActions,
    Automod,
    Suspicious,
    Warnings,
    MessageHeld,
    Points,
}

impl TopicFamily {
    /// The topic kinds one listen call on this family creates.
    pub fn kinds(self) -> &'static [TopicKind] {
        match self {
            Self::Raid => &[TopicKind::Raid],
            Self::Poll => &[TopicKind::PollBegin, TopicKind::PollEnd],
            Self::Shield => &[TopicKind::ShieldBegin, TopicKind::ShieldEnd],
            Self::Shoutouts => &[TopicKind::ShoutoutCreate],
            Self::ModActions => &[TopicKind::ChannelModerate],
            Self::Automod => &[TopicKind::AutomodMessageHold, TopicKind::AutomodMessageUpdate],
            Self::Suspicious => &[TopicKind::SuspiciousMessage, TopicKind::SuspiciousUpdate],
            Self::Warnings => &[TopicKind::WarningAcknowledge],
            #[cfg(not(feature = "user-message-hold"))]
            Self::MessageHeld => &[TopicKind::UserMessageUpdate],
            #[cfg(feature = "user-message-hold")]
            Self::MessageHeld => &[TopicKind::UserMessageUpdate, TopicKind::UserMessageHold],
            Self::Points => {
                &[TopicKind::PointsRedemptionAdd, TopicKind::PointsRedemptionUpdate]
            }
        }
    }
}

/// Identity of one desired server-side subscription.
///
/// Equality and hashing are (kind, channel login); the login is stored
/// normalized.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Topic {
    pub kind: TopicKind,
    pub channel: String,
}

impl Topic {
    pub fn new(kind: TopicKind, channel: &str) -> Self {
        Self { kind, channel: normalize_login(channel) }
    }

    /// Builds the create-subscription request body for this topic, bound to
    /// `session_id`. `broadcaster_id` is the resolved id of the topic's
    /// channel; `local_id` is the resolved id of the authenticated user and
    /// is only read for kinds whose condition carries it.
    pub fn create_body(
        &self,
        broadcaster_id: &str,
        local_id: Option<&str>,
        session_id: &str,
    ) -> CreateSubscriptionBody {
        let desc = self.kind.descriptor();
        let mut condition = Condition::default();
        if desc.from_broadcaster {
            condition.from_broadcaster_user_id = Some(broadcaster_id.to_owned());
        } else {
            condition.broadcaster_user_id = Some(broadcaster_id.to_owned());
        }
        match desc.local {
            LocalRole::None => {}
            LocalRole::Moderator => {
                condition.moderator_user_id = local_id.map(str::to_owned);
            }
            LocalRole::User => {
                condition.user_id = local_id.map(str::to_owned);
            }
        }
        CreateSubscriptionBody {
            kind: desc.type_str,
            version: desc.version,
            condition,
            transport: TransportSpec { method: "websocket", session_id: session_id.to_owned() },
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.kind.descriptor().type_str, self.channel)
    }
}

/// Condition block of a create request. Unused fields are omitted from the
/// serialized body entirely.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcaster_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_broadcaster_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderator_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// `transport` block of a create request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransportSpec {
    pub method: &'static str,
    pub session_id: String,
}

/// Body of the HTTP create-subscription request.
#[derive(Clone, Debug, Serialize)]
pub struct CreateSubscriptionBody {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub version: &'static str,
    pub condition: Condition,
    pub transport: TransportSpec,
}
