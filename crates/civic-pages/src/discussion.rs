//! Group discussion: chat list, the open chat's transcript, and live
//! delivery over the real-time channel.
//!
//! The channel is opened when the page mounts and closed when it unmounts.
//! REST stays authoritative: history comes from the API, sending goes through
//! the API first, and the channel only relays the stored message to other
//! members. If the channel cannot be opened the page keeps working without
//! live updates.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use civic_api::CivicApi;
use civic_gateway::{ChannelSession, MessagingClient};
use civic_types::events::ChannelEvent;
use civic_types::models::{Chat, ChatMessage};

use crate::format::relative_time;
use crate::state::{PageState, Toast};

const NO_CHATS_MESSAGE: &str = "You are not in any discussions yet.";
const NO_MESSAGES_MESSAGE: &str = "No messages yet. Say hello!";

#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub chat: Chat,
    pub title: String,
    pub unread: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub author: String,
    pub mine: bool,
    pub text: String,
    pub when: Option<String>,
}

/// What happened to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Shown,
    Unread(String),
    Duplicate,
    Unrouted,
}

#[derive(Debug, Error, PartialEq)]
pub enum SendError {
    #[error("message is empty")]
    Empty,

    #[error("no chat is open")]
    NoOpenChat,

    #[error("{0}")]
    Api(String),
}

struct OpenChat {
    id: String,
    messages: PageState<Vec<ChatMessage>>,
}

pub struct DiscussionPage {
    api: Arc<dyn CivicApi>,
    session: Option<ChannelSession>,
    user_id: String,
    chats: PageState<Vec<ChatEntry>>,
    open: Option<OpenChat>,
    seen: HashSet<String>,
    toast: Option<Toast>,
}

impl DiscussionPage {
    /// Open the channel as `user_id` and load the chat list.
    pub async fn mount(api: Arc<dyn CivicApi>, messaging: Arc<dyn MessagingClient>, user_id: &str) -> Self {
        let mut toast = None;
        let session = match ChannelSession::open(messaging, user_id).await {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Live updates unavailable: {}", e);
                toast = Some(Toast::error("Live updates are unavailable right now."));
                None
            }
        };

        let mut page = Self {
            api,
            session,
            user_id: user_id.to_string(),
            chats: PageState::Loading,
            open: None,
            seen: HashSet::new(),
            toast,
        };
        page.refresh_chats().await;
        info!("Discussion page mounted for {}", page.user_id);
        page
    }

    pub async fn refresh_chats(&mut self) {
        let result = self.api.chats().await.map(|chats| {
            chats
                .into_iter()
                .map(|chat| ChatEntry {
                    title: chat.title_for(&self.user_id),
                    chat,
                    unread: 0,
                })
                .collect::<Vec<_>>()
        });
        if let Err(e) = &result {
            warn!("Failed to load chats: {}", e);
        }
        self.chats = PageState::from_result(result);
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Whether the real-time channel is open and has not given up.
    pub fn is_live(&self) -> bool {
        self.session.as_ref().is_some_and(ChannelSession::is_live)
    }

    pub fn chats(&self) -> &PageState<Vec<ChatEntry>> {
        &self.chats
    }

    pub fn chats_banner(&self) -> Option<String> {
        self.chats.banner(NO_CHATS_MESSAGE)
    }

    pub fn unread(&self, chat_id: &str) -> u32 {
        self.entry(chat_id).map(|e| e.unread).unwrap_or(0)
    }

    pub fn open_chat_id(&self) -> Option<&str> {
        self.open.as_ref().map(|c| c.id.as_str())
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.open.as_ref().map(|c| c.messages.items()).unwrap_or(&[])
    }

    pub fn messages_banner(&self) -> Option<String> {
        self.open.as_ref()?.messages.banner(NO_MESSAGES_MESSAGE)
    }

    pub fn take_toast(&mut self) -> Option<Toast> {
        self.toast.take()
    }

    /// Load a chat's history, join its group and clear its unread count.
    pub async fn open_chat(&mut self, chat_id: &str) {
        info!("Opening chat {}", chat_id);
        let result = self.api.messages(chat_id).await;
        match &result {
            Ok(messages) => self
                .seen
                .extend(messages.iter().filter_map(|m| m.id.clone())),
            Err(e) => warn!("Failed to load messages for {}: {}", chat_id, e),
        }
        self.open = Some(OpenChat {
            id: chat_id.to_string(),
            messages: PageState::from_result(result),
        });

        if let Some(session) = &self.session {
            if let Err(e) = session.join(chat_id).await {
                warn!("Failed to join group {}: {}", chat_id, e);
            }
        }
        if let Some(entry) = self.entry_mut(chat_id) {
            entry.unread = 0;
        }
    }

    /// Store a message through the API, show it, then relay it to the group.
    pub async fn send(&mut self, content: &str) -> Result<(), SendError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(SendError::Empty);
        }
        let chat_id = self
            .open
            .as_ref()
            .map(|c| c.id.clone())
            .ok_or(SendError::NoOpenChat)?;

        let mut message = match self.api.send_message(&chat_id, content).await {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to send message to {}: {}", chat_id, e);
                self.toast = Some(Toast::error(format!("Message not sent: {}", e)));
                return Err(SendError::Api(e.to_string()));
            }
        };
        if message.chat.is_none() {
            message.chat = Some(chat_id.as_str().into());
        }

        self.deliver(message.clone());
        if let Some(session) = &self.session {
            if let Err(e) = session.relay(message).await {
                warn!("Failed to relay message to {}: {}", chat_id, e);
            }
        }
        Ok(())
    }

    /// Route an inbound channel event.
    pub fn receive(&mut self, event: ChannelEvent) -> Delivery {
        let delivery = self.deliver(event.into_message());
        debug!("Inbound message: {:?}", delivery);
        delivery
    }

    /// Handle every event already queued on the channel. Returns how many
    /// were shown in the open chat.
    pub fn drain_events(&mut self) -> usize {
        let mut shown = 0;
        while let Some(event) = self.session.as_mut().and_then(ChannelSession::try_next_event) {
            if self.receive(event) == Delivery::Shown {
                shown += 1;
            }
        }
        shown
    }

    /// Wait for the next event and handle it. `None` without a live channel.
    /// Once the channel gives up the session is closed and the page carries
    /// on without live updates.
    pub async fn next_event(&mut self) -> Option<Delivery> {
        let event = self.session.as_mut()?.next_event().await;
        match event {
            Some(event) => Some(self.receive(event)),
            None => {
                warn!("Live updates stopped for {}", self.user_id);
                if let Some(session) = self.session.take() {
                    if let Err(e) = session.close().await {
                        warn!("Channel close failed: {}", e);
                    }
                }
                None
            }
        }
    }

    pub fn transcript(&self, now: DateTime<Utc>) -> Vec<TranscriptLine> {
        self.messages()
            .iter()
            .map(|m| {
                let mine = m.sender.id() == self.user_id;
                TranscriptLine {
                    author: if mine {
                        "You".to_string()
                    } else {
                        m.sender.display_name().to_string()
                    },
                    mine,
                    text: m.content.clone(),
                    when: m.created_at.map(|t| relative_time(t, now)),
                }
            })
            .collect()
    }

    pub async fn unmount(mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!("Channel close failed: {}", e);
            }
        }
        info!("Discussion page unmounted for {}", self.user_id);
    }

    fn deliver(&mut self, message: ChatMessage) -> Delivery {
        if let Some(id) = &message.id {
            if self.seen.contains(id) {
                return Delivery::Duplicate;
            }
        }
        let Some(chat_id) = message.chat_id().map(str::to_string) else {
            return Delivery::Unrouted;
        };

        let in_open_chat = self.open_chat_id() == Some(chat_id.as_str());
        let Some(entry) = self.entry_mut(&chat_id) else {
            if !in_open_chat {
                return Delivery::Unrouted;
            }
            return self.show(message);
        };
        entry.chat.latest_message = Some(message.clone());

        if in_open_chat {
            self.show(message)
        } else {
            entry.unread += 1;
            if let Some(id) = message.id {
                self.seen.insert(id);
            }
            Delivery::Unread(chat_id)
        }
    }

    fn show(&mut self, message: ChatMessage) -> Delivery {
        if let Some(id) = &message.id {
            self.seen.insert(id.clone());
        }
        if let Some(open) = self.open.as_mut() {
            match &mut open.messages {
                PageState::Loaded(list) => list.push(message),
                other => *other = PageState::Loaded(vec![message]),
            }
        }
        Delivery::Shown
    }

    fn entry(&self, chat_id: &str) -> Option<&ChatEntry> {
        self.chats.items().iter().find(|e| e.chat.id == chat_id)
    }

    fn entry_mut(&mut self, chat_id: &str) -> Option<&mut ChatEntry> {
        self.chats
            .loaded_mut()
            .and_then(|list| list.iter_mut().find(|e| e.chat.id == chat_id))
    }
}
