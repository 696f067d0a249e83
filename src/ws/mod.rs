//! Websocket transport: one background task per connection, driven through
//! a [`BackendHandle`] and reporting inbound traffic as tagged [`WsEvent`]s.

mod backend;
pub use backend::{BackendHandle, BackendRemote, WsBackend};

mod types;
pub use types::{CloseCause, ConnId, Frame, FrameError, WsEvent};
pub(self) use types::*;

mod error;
pub use error::TransportError;

use async_trait::async_trait;
use futures_channel::mpsc;
use std::fmt::Debug;

/// Opens websocket connections. The default [`WsConnector`] dials real
/// servers with tungstenite; tests substitute a connector that hands frames
/// to the manager directly.
#[async_trait]
pub trait Connector: Debug + Send + Sync + 'static {
    /// Connects to `url`, spawns the I/O task for it and returns the handle.
    /// All inbound traffic is posted to `events`, tagged with `conn`.
    async fn connect(
        &self,
        url: &str,
        conn: ConnId,
        events: mpsc::UnboundedSender<WsEvent>,
    ) -> Result<BackendHandle, TransportError>;
}

/// The production connector.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        url: &str,
        conn: ConnId,
        events: mpsc::UnboundedSender<WsEvent>,
    ) -> Result<BackendHandle, TransportError> {
        let (backend, handle) = WsBackend::connect(url, conn, events).await?;
        backend.spawn();
        Ok(handle)
    }
}

