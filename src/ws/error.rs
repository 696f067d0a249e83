use super::WsError;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Internal lib error
    #[error(transparent)]
    Tungstenite(#[from] WsError),

    /// Unexpected channel closure
    #[error("Unexpected internal channel closure. This is likely a bug. Please report via github")]
    DeadChannel,
}
