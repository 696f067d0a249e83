//! The upstream HTTP API contract the manager consumes.
//!
//! The crate never talks HTTP itself; everything goes through [`TwitchApi`].
//! Implementations own the token and are expected to be safe for concurrent
//! use and to rate-limit internally.

use crate::topic::CreateSubscriptionBody;
use async_trait::async_trait;
use auto_impl::auto_impl;
use serde::Deserialize;
use std::fmt::Debug;
use thiserror::Error;

/// Error surfaced by a [`TwitchApi`] implementation.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-success HTTP status.
    #[error("api returned status {0}")]
    Status(http::StatusCode),

    /// Thrown if a response body could not be parsed
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// Implementation-specific transport failure
    #[error("api transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Whether the error is the server telling us to slow down (HTTP 429).
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ApiError::Status(s) if *s == http::StatusCode::TOO_MANY_REQUESTS)
    }
}

/// One subscription as reported by the server after a successful create.
///
/// The cost is whatever the server says it is; the manager mirrors it but
/// budgets with the catalogue's expected cost.
#[derive(Clone, Debug, Deserialize)]
pub struct CreatedSubscription {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub cost: u32,
}

/// One entry of the server-side subscription listing.
#[derive(Clone, Debug, Deserialize)]
pub struct ServerSubscription {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    #[serde(default)]
    pub cost: u32,
    #[serde(default)]
    pub condition: crate::topic::Condition,
}

/// Trait which must be implemented by the API collaborator handed to the
/// manager. Covers name resolution and the three subscription endpoints.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait TwitchApi: Debug + Send + Sync {
    /// Resolves a login to its numeric user id. `Ok(None)` means the login
    /// does not currently exist.
    async fn user_id(&self, login: &str) -> Result<Option<String>, ApiError>;

    /// Submits a create-subscription request.
    async fn create_subscription(
        &self,
        body: &CreateSubscriptionBody,
    ) -> Result<CreatedSubscription, ApiError>;

    /// Deletes a subscription by its server-assigned id.
    async fn delete_subscription(&self, id: &str) -> Result<(), ApiError>;

    /// Lists the subscriptions the server currently holds for this client.
    async fn subscriptions(&self) -> Result<Vec<ServerSubscription>, ApiError>;

    /// Called when the application refreshed its token; implementations
    /// rebuild authorization headers for subsequent calls.
    fn token_updated(&self) {}
}
