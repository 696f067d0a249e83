use futures_channel::{mpsc, oneshot};
use futures_util::{select, sink::SinkExt, stream::StreamExt};

use super::{error::TransportError, types::*};
use tracing::{error, trace};

/// Handle through which the owner drives one `WsBackend`: send text frames
/// and shut the connection down. Inbound traffic does not flow through the
/// handle; the backend posts [`WsEvent`]s straight into the owner's mailbox.
#[derive(Debug)]
pub struct BackendHandle {
    dispatcher: mpsc::UnboundedSender<String>,
    shutdown: oneshot::Sender<()>,
}

/// The backend half of [`BackendHandle::channel`]; owned by the I/O task.
#[derive(Debug)]
pub struct BackendRemote {
    pub to_dispatch: mpsc::UnboundedReceiver<String>,
    pub shutdown: oneshot::Receiver<()>,
}

impl BackendHandle {
    /// Creates the paired channels linking an owner to an I/O task. Mock
    /// transports use this directly; the real one lives in [`WsBackend`].
    pub fn channel() -> (BackendHandle, BackendRemote) {
        let (dispatcher, to_dispatch) = mpsc::unbounded();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        (
            BackendHandle { dispatcher, shutdown: shutdown_tx },
            BackendRemote { to_dispatch, shutdown: shutdown_rx },
        )
    }

    /// Queues one outbound text frame. Sends are ordered within the
    /// connection; anything still queued when the connection dies is dropped.
    pub fn send(&self, text: String) -> Result<(), TransportError> {
        self.dispatcher.unbounded_send(text).map_err(|_| TransportError::DeadChannel)
    }

    pub fn shutdown(self) {
        // don't care if it fails, as that means the backend is gone anyway
        let _ = self.shutdown.send(());
    }
}

/// `WsBackend` owns one websocket and routes classified frames into the
/// owner's mailbox, tagged with this connection's [`ConnId`]. It ends when
/// told to shut down, when the owner drops the handle, or when the socket
/// dies; it always posts a final [`WsEvent::Closed`] with the cause.
pub struct WsBackend {
    server: InternalStream,

    conn: ConnId,
    // mailbox of the owning task, shared by every backend it runs
    events: mpsc::UnboundedSender<WsEvent>,

    remote: BackendRemote,
}

impl WsBackend {
    pub async fn connect(
        url: &str,
        conn: ConnId,
        events: mpsc::UnboundedSender<WsEvent>,
    ) -> Result<(Self, BackendHandle), TransportError> {
        let (ws, _) = connect_async(url).await?;
        let (handle, remote) = BackendHandle::channel();
        Ok((WsBackend { server: ws.fuse(), conn, events, remote }, handle))
    }

    fn handle_text(&mut self, t: String) -> Result<(), TransportError> {
        trace!(text = t, conn = %self.conn, "Received message");
        match Frame::parse(&t) {
            Ok(frame) => {
                let res = self.events.unbounded_send(WsEvent::Frame { conn: self.conn, frame });
                if res.is_err() {
                    return Err(TransportError::DeadChannel)
                }
            }
            Err(e) => {
                // the session watchdog catches a server that only sends
                // garbage; a single bad frame is not fatal
                error!(e = %e, conn = %self.conn, "Failed to deserialize frame");
            }
        }
        Ok(())
    }

    pub fn spawn(mut self) {
        let fut = async move {
            let cause = loop {
                select! {
                    resp = self.server.next() => {
                        match resp {
                            Some(Ok(Message::Text(t))) => {
                                if self.handle_text(t).is_err() {
                                    // owner is gone, nobody left to tell
                                    return
                                }
                            }
                            Some(Ok(Message::Ping(_))) => {}
                            Some(Ok(Message::Pong(_))) => {}
                            Some(Ok(Message::Frame(_))) => {}
                            Some(Ok(Message::Binary(_))) => {
                                error!(conn = %self.conn, "Unexpected binary message");
                                break CloseCause::Error("unexpected binary message".to_owned())
                            }
                            Some(Ok(Message::Close(frame))) => {
                                break CloseCause::ServerClose(frame.map(|f| f.to_string()))
                            }
                            Some(Err(e)) => {
                                error!(err = %e, conn = %self.conn, "Error response from WS");
                                break CloseCause::Error(e.to_string())
                            }
                            None => break CloseCause::Gone,
                        }
                    }
                    // we've received a new dispatch, so we send it via websocket
                    inst = self.remote.to_dispatch.next() => {
                        match inst {
                            Some(msg) => {
                                if let Err(e) = self.server.send(Message::Text(msg)).await {
                                    error!(err = %e, conn = %self.conn, "WS connection error");
                                    break CloseCause::Error(e.to_string())
                                }
                            }
                            // owner dropped the handle
                            None => break CloseCause::Shutdown,
                        }
                    }
                    // break on shutdown recv, or on shutdown recv error
                    _ = &mut self.remote.shutdown => {
                        break CloseCause::Shutdown
                    }
                }
            };
            let _ = self.events.unbounded_send(WsEvent::Closed { conn: self.conn, cause });
        };

        tokio::spawn(fut);
    }
}
