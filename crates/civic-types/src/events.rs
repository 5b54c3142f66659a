use serde::{Deserialize, Serialize};

use crate::models::ChatMessage;

/// Frames sent FROM client TO server over the real-time channel.
/// On the wire: `{"event": "<kebab-case name>", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ChannelCommand {
    /// Announce the connected user; the server maps the socket to this id
    NewUserAdd(String),

    /// Join a group chat room by chat id
    JoinGroup(String),

    /// Relay a stored message to the other members of its group
    SendGroupMessage(ChatMessage),
}

impl ChannelCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewUserAdd(_) => "new-user-add",
            Self::JoinGroup(_) => "join-group",
            Self::SendGroupMessage(_) => "send-group-message",
        }
    }
}

/// Events sent FROM server TO client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ChannelEvent {
    /// A message posted to a group this client joined
    ReceiveGroupMessage(ChatMessage),

    /// A direct message addressed to this user
    ReceiveMessage(ChatMessage),
}

impl ChannelEvent {
    pub fn message(&self) -> &ChatMessage {
        match self {
            Self::ReceiveGroupMessage(m) | Self::ReceiveMessage(m) => m,
        }
    }

    pub fn into_message(self) -> ChatMessage {
        match self {
            Self::ReceiveGroupMessage(m) | Self::ReceiveMessage(m) => m,
        }
    }
}
