use thiserror::Error;

/// Errors surfaced on the public handle.
#[derive(Error, Debug)]
pub enum EventSubError {
    /// The manager task is gone. Happens after `disconnect()` tore it down
    /// or if it panicked; either way no further instructions can be served.
    #[error("manager task has shut down")]
    ManagerGone,

    /// A query was accepted but the manager dropped the response channel.
    #[error("manager dropped the query response")]
    QueryDropped,

    /// An API call made on behalf of a query failed.
    #[error(transparent)]
    Api(#[from] crate::api::ApiError),
}
