//! In-process stand-in for the real-time server. Clients obtained from one
//! `LoopbackHub` see each other the way sockets on the real server do:
//! `join-group` puts a client in a room and `send-group-message` reaches the
//! other members of that room.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use civic_types::events::{ChannelCommand, ChannelEvent};
use civic_types::models::ChatMessage;

use crate::MessagingClient;
use crate::dispatcher::{ConnectionState, Dispatcher};
use crate::error::GatewayError;

#[derive(Clone, Default)]
pub struct LoopbackHub {
    inner: Arc<Mutex<HubState>>,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    clients: HashMap<u64, Member>,
}

struct Member {
    dispatcher: Dispatcher,
    connected: bool,
    user_id: Option<String>,
    groups: HashSet<String>,
}

impl HubState {
    fn deliver<F>(&self, mut to: F, event: &ChannelEvent) -> usize
    where
        F: FnMut(u64, &Member) -> bool,
    {
        let mut delivered = 0;
        for (&id, member) in &self.clients {
            if member.connected && to(id, member) {
                member.dispatcher.publish(event.clone());
                delivered += 1;
            }
        }
        delivered
    }
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new, not yet connected client attached to this hub.
    pub fn client(&self) -> LoopbackClient {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;

        let dispatcher = Dispatcher::default();
        state.clients.insert(
            id,
            Member {
                dispatcher: dispatcher.clone(),
                connected: false,
                user_id: None,
                groups: HashSet::new(),
            },
        );

        LoopbackClient {
            id,
            hub: self.clone(),
            dispatcher,
        }
    }

    /// Push a direct message to every connected socket of `user_id`, the way
    /// the server does after a one-to-one message is stored. Returns the
    /// number of sockets reached.
    pub fn push_direct(&self, user_id: &str, message: ChatMessage) -> usize {
        let event = ChannelEvent::ReceiveMessage(message);
        self.lock()
            .deliver(|_, m| m.user_id.as_deref() == Some(user_id), &event)
    }

    /// Push a group message to every connected member of `chat_id`.
    pub fn push_group(&self, chat_id: &str, message: ChatMessage) -> usize {
        let event = ChannelEvent::ReceiveGroupMessage(message);
        self.lock().deliver(|_, m| m.groups.contains(chat_id), &event)
    }

    /// Drop every connection, the way a server going away does. Clients see
    /// `Disconnected` and must connect again before sending.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        for member in state.clients.values_mut() {
            member.connected = false;
            member.user_id = None;
            member.groups.clear();
            member.dispatcher.set_state(ConnectionState::Disconnected);
        }
    }

    /// User ids announced by currently connected clients.
    pub fn online_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self
            .lock()
            .clients
            .values()
            .filter(|m| m.connected)
            .filter_map(|m| m.user_id.clone())
            .collect();
        users.sort();
        users.dedup();
        users
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.inner.lock().expect("hub lock poisoned")
    }
}

pub struct LoopbackClient {
    id: u64,
    hub: LoopbackHub,
    dispatcher: Dispatcher,
}

#[async_trait]
impl MessagingClient for LoopbackClient {
    async fn connect(&self) -> Result<(), GatewayError> {
        if let Some(member) = self.hub.lock().clients.get_mut(&self.id) {
            member.connected = true;
        }
        self.dispatcher.set_state(ConnectionState::Connected);
        Ok(())
    }

    async fn send(&self, command: ChannelCommand) -> Result<(), GatewayError> {
        let mut state = self.hub.lock();
        let member = state
            .clients
            .get_mut(&self.id)
            .filter(|m| m.connected)
            .ok_or(GatewayError::NotConnected)?;

        debug!("loopback emit {}", command.name());
        match command {
            ChannelCommand::NewUserAdd(user_id) => member.user_id = Some(user_id),
            ChannelCommand::JoinGroup(chat_id) => {
                member.groups.insert(chat_id);
            }
            ChannelCommand::SendGroupMessage(message) => {
                let Some(chat_id) = message.chat_id().map(str::to_string) else {
                    warn!("Group message without a chat id dropped");
                    return Ok(());
                };
                let sender = self.id;
                let event = ChannelEvent::ReceiveGroupMessage(message);
                state.deliver(|id, m| id != sender && m.groups.contains(&chat_id), &event);
            }
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.dispatcher.subscribe()
    }

    async fn disconnect(&self) -> Result<(), GatewayError> {
        if let Some(member) = self.hub.lock().clients.get_mut(&self.id) {
            member.connected = false;
            member.user_id = None;
            member.groups.clear();
        }
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

impl Drop for LoopbackClient {
    fn drop(&mut self) {
        if let Ok(mut state) = self.hub.inner.lock() {
            state.clients.remove(&self.id);
        }
    }
}
