use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("not connected to the real-time channel")]
    NotConnected,

    #[error("real-time channel closed")]
    Closed,

    #[error("websocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid socket url: {0}")]
    InvalidUrl(String),
}
