use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::watch;
use tracing::{info, warn};

use civic_types::events::{ChannelCommand, ChannelEvent};
use civic_types::models::ChatMessage;

use crate::MessagingClient;
use crate::dispatcher::ConnectionState;
use crate::error::GatewayError;

/// A page's handle on the real-time channel: opened when the page mounts,
/// closed when it unmounts. Dropping an open session disconnects in the
/// background.
pub struct ChannelSession {
    client: Arc<dyn MessagingClient>,
    events: broadcast::Receiver<ChannelEvent>,
    state: watch::Receiver<ConnectionState>,
    user_id: String,
    open: bool,
}

impl ChannelSession {
    /// Connect and announce `user_id`. Subscribes before announcing so no
    /// event addressed to the user is missed. A failed announce disconnects
    /// before the error is returned.
    pub async fn open(client: Arc<dyn MessagingClient>, user_id: &str) -> Result<Self, GatewayError> {
        client.connect().await?;
        let events = client.subscribe();
        let state = client.watch_state();
        if let Err(e) = client
            .send(ChannelCommand::NewUserAdd(user_id.to_string()))
            .await
        {
            if let Err(close) = client.disconnect().await {
                warn!("Disconnect after failed announce failed: {}", close);
            }
            return Err(e);
        }

        info!("Channel session opened for {}", user_id);
        Ok(Self {
            client,
            events,
            state,
            user_id: user_id.to_string(),
            open: true,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// False once the client has given up, even if events are still queued.
    pub fn is_live(&self) -> bool {
        *self.state.borrow() != ConnectionState::Disconnected
    }

    pub async fn join(&self, chat_id: &str) -> Result<(), GatewayError> {
        self.client
            .send(ChannelCommand::JoinGroup(chat_id.to_string()))
            .await
    }

    /// Relay an already stored message to the other members of its group.
    pub async fn relay(&self, message: ChatMessage) -> Result<(), GatewayError> {
        self.client
            .send(ChannelCommand::SendGroupMessage(message))
            .await
    }

    /// Wait for the next inbound event. Events queued before the client went
    /// `Disconnected` are still returned, then `None`.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        loop {
            if *self.state.borrow_and_update() == ConnectionState::Disconnected {
                return self.try_next_event();
            }
            tokio::select! {
                biased;
                received = self.events.recv() => match received {
                    Ok(event) => return Some(event),
                    Err(RecvError::Lagged(n)) => {
                        warn!("Channel session lagged by {} events", n);
                    }
                    Err(RecvError::Closed) => return None,
                },
                changed = self.state.changed() => {
                    if changed.is_err() {
                        return self.try_next_event();
                    }
                }
            }
        }
    }

    /// Next event if one is already queued.
    pub fn try_next_event(&mut self) -> Option<ChannelEvent> {
        loop {
            match self.events.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(n)) => {
                    warn!("Channel session lagged by {} events", n);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    pub async fn close(mut self) -> Result<(), GatewayError> {
        self.open = false;
        info!("Channel session closed for {}", self.user_id);
        self.client.disconnect().await
    }
}

impl Drop for ChannelSession {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let client = self.client.clone();
            handle.spawn(async move {
                if let Err(e) = client.disconnect().await {
                    warn!("Disconnect on drop failed: {}", e);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::loopback::LoopbackHub;

    fn message(chat: &str, content: &str) -> ChatMessage {
        ChatMessage {
            id: None,
            sender: "someone".into(),
            content: content.into(),
            chat: Some(chat.into()),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn open_announces_user_and_close_disconnects() {
        let hub = LoopbackHub::new();
        let client = Arc::new(hub.client());
        let session = ChannelSession::open(client.clone(), "u1").await.unwrap();
        assert_eq!(hub.online_users(), vec!["u1".to_string()]);
        assert_eq!(client.state(), ConnectionState::Connected);

        session.close().await.unwrap();
        assert!(hub.online_users().is_empty());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn joined_session_receives_relayed_messages() {
        let hub = LoopbackHub::new();
        let mut reader = ChannelSession::open(Arc::new(hub.client()), "reader").await.unwrap();
        let writer = ChannelSession::open(Arc::new(hub.client()), "writer").await.unwrap();
        reader.join("c1").await.unwrap();
        writer.join("c1").await.unwrap();

        writer.relay(message("c1", "hello")).await.unwrap();

        let event = reader.next_event().await.unwrap();
        assert_eq!(event.message().content, "hello");
        assert!(reader.try_next_event().is_none());
    }

    #[tokio::test]
    async fn next_event_ends_after_disconnect() {
        let hub = LoopbackHub::new();
        let mut session = ChannelSession::open(Arc::new(hub.client()), "u1").await.unwrap();
        session.join("c1").await.unwrap();
        assert!(session.is_live());

        hub.push_group("c1", message("c1", "last words"));
        hub.shutdown();

        assert!(!session.is_live());
        let event = session.next_event().await.unwrap();
        assert_eq!(event.message().content, "last words");
        assert!(session.next_event().await.is_none());
    }

    /// Connects fine but refuses every command.
    struct Refusing {
        dispatcher: Dispatcher,
        disconnects: AtomicUsize,
    }

    #[async_trait]
    impl MessagingClient for Refusing {
        async fn connect(&self) -> Result<(), GatewayError> {
            self.dispatcher.set_state(ConnectionState::Connected);
            Ok(())
        }

        async fn send(&self, _command: ChannelCommand) -> Result<(), GatewayError> {
            Err(GatewayError::Closed)
        }

        fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
            self.dispatcher.subscribe()
        }

        async fn disconnect(&self) -> Result<(), GatewayError> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            self.dispatcher.set_state(ConnectionState::Disconnected);
            Ok(())
        }

        fn state(&self) -> ConnectionState {
            self.dispatcher.state()
        }

        fn watch_state(&self) -> watch::Receiver<ConnectionState> {
            self.dispatcher.watch_state()
        }
    }

    #[tokio::test]
    async fn failed_announce_disconnects() {
        let client = Arc::new(Refusing {
            dispatcher: Dispatcher::default(),
            disconnects: AtomicUsize::new(0),
        });

        let err = ChannelSession::open(client.clone(), "u1").await.err().unwrap();
        assert!(matches!(err, GatewayError::Closed));
        assert_eq!(client.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn dropping_open_session_disconnects() {
        let hub = LoopbackHub::new();
        let client = Arc::new(hub.client());
        let session = ChannelSession::open(client.clone(), "u1").await.unwrap();
        drop(session);
        for _ in 0..16 {
            if hub.online_users().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(hub.online_users().is_empty());
    }
}
