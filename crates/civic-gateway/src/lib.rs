//! Real-time channel for the discussion page.
//!
//! Pages talk to the channel only through [`MessagingClient`], so the
//! WebSocket transport can be swapped for the in-process loopback hub.

pub mod backoff;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod loopback;
pub mod session;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use civic_types::events::{ChannelCommand, ChannelEvent};

pub use backoff::ReconnectPolicy;
pub use connection::{WsClient, WsConfig, socket_url_from_api};
pub use dispatcher::{ConnectionState, Dispatcher};
pub use error::GatewayError;
pub use loopback::{LoopbackClient, LoopbackHub};
pub use session::ChannelSession;

#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Open the connection. Connecting an already connected client is a no-op.
    async fn connect(&self) -> Result<(), GatewayError>;

    async fn send(&self, command: ChannelCommand) -> Result<(), GatewayError>;

    /// Receiver for inbound events. Each receiver sees every event once.
    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent>;

    /// Close the connection. Disconnecting twice is a no-op.
    async fn disconnect(&self) -> Result<(), GatewayError>;

    fn state(&self) -> ConnectionState;

    /// Receiver that observes every state change, including the final
    /// `Disconnected` once reconnects are exhausted.
    fn watch_state(&self) -> watch::Receiver<ConnectionState>;
}
