use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use civic_types::events::ChannelEvent;

/// Connection lifecycle as seen by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

/// Fans inbound events out to every subscriber of one client. Outlives the
/// underlying socket, so receivers keep working across reconnects.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for inbound events; every subscriber sees every event
    events_tx: broadcast::Sender<ChannelEvent>,

    state_tx: watch::Sender<ConnectionState>,
}

impl Dispatcher {
    pub fn new(capacity: usize) -> Self {
        let (events_tx, _) = broadcast::channel(capacity);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(DispatcherInner { events_tx, state_tx }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Publish an inbound event. Returns how many subscribers received it.
    pub fn publish(&self, event: ChannelEvent) -> usize {
        self.inner.events_tx.send(event).unwrap_or(0)
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.inner.state_tx.send_replace(state);
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(256)
    }
}
