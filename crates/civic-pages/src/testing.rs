//! In-memory `CivicApi` for page tests.

use std::sync::Mutex;

use async_trait::async_trait;

use civic_api::{ApiError, CivicApi};
use civic_types::api::{PostResults, VerificationResponse, VoteRequest, VoteResponse};
use civic_types::models::{Announcement, Chat, ChatMessage, EmergencyService, Post};

/// `Err(text)` turns into a 500 carrying `text`.
pub type Reply<T> = Result<T, String>;

pub struct FakeApi {
    pub announcements: Mutex<Reply<Vec<Announcement>>>,
    pub emergency: Mutex<Reply<Vec<EmergencyService>>>,
    pub posts: Mutex<Reply<Vec<Post>>>,
    pub vote: Mutex<Reply<VoteResponse>>,
    pub results: Mutex<Reply<PostResults>>,
    pub verification: Mutex<Reply<VerificationResponse>>,
    pub chats: Mutex<Reply<Vec<Chat>>>,
    pub messages: Mutex<Reply<Vec<ChatMessage>>>,
    pub send: Mutex<Reply<()>>,

    pub votes: Mutex<Vec<(String, VoteRequest)>>,
    pub codes: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub sender: String,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            announcements: Mutex::new(Ok(vec![])),
            emergency: Mutex::new(Ok(vec![])),
            posts: Mutex::new(Ok(vec![])),
            vote: Mutex::new(Ok(VoteResponse::default())),
            results: Mutex::new(Err("no results".into())),
            verification: Mutex::new(Ok(VerificationResponse::default())),
            chats: Mutex::new(Ok(vec![])),
            messages: Mutex::new(Ok(vec![])),
            send: Mutex::new(Ok(())),
            votes: Mutex::new(vec![]),
            codes: Mutex::new(vec![]),
            sent: Mutex::new(vec![]),
            sender: "me".into(),
        }
    }
}

fn reply<T: Clone>(slot: &Mutex<Reply<T>>) -> Result<T, ApiError> {
    slot.lock()
        .unwrap()
        .clone()
        .map_err(|message| ApiError::Status {
            status: 500,
            message,
        })
}

#[async_trait]
impl CivicApi for FakeApi {
    async fn announcements(&self) -> Result<Vec<Announcement>, ApiError> {
        reply(&self.announcements)
    }

    async fn emergency_services(&self) -> Result<Vec<EmergencyService>, ApiError> {
        reply(&self.emergency)
    }

    async fn posts(&self) -> Result<Vec<Post>, ApiError> {
        reply(&self.posts)
    }

    async fn vote(&self, post_id: &str, vote: &VoteRequest) -> Result<VoteResponse, ApiError> {
        self.votes
            .lock()
            .unwrap()
            .push((post_id.to_string(), vote.clone()));
        reply(&self.vote)
    }

    async fn results(&self, _post_id: &str) -> Result<PostResults, ApiError> {
        reply(&self.results)
    }

    async fn verify_registration(&self, code: &str) -> Result<VerificationResponse, ApiError> {
        self.codes.lock().unwrap().push(code.to_string());
        reply(&self.verification)
    }

    async fn chats(&self) -> Result<Vec<Chat>, ApiError> {
        reply(&self.chats)
    }

    async fn messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        Ok(reply(&self.messages)?
            .into_iter()
            .filter(|m| m.chat_id() == Some(chat_id))
            .collect())
    }

    async fn send_message(&self, chat_id: &str, content: &str) -> Result<ChatMessage, ApiError> {
        reply(&self.send)?;
        let mut sent = self.sent.lock().unwrap();
        sent.push((chat_id.to_string(), content.to_string()));
        Ok(ChatMessage {
            id: Some(format!("srv-{}", sent.len())),
            sender: self.sender.as_str().into(),
            content: content.to_string(),
            chat: Some(chat_id.into()),
            created_at: None,
        })
    }
}

pub fn message(id: &str, chat: &str, sender: &str, content: &str) -> ChatMessage {
    ChatMessage {
        id: Some(id.into()),
        sender: sender.into(),
        content: content.into(),
        chat: Some(chat.into()),
        created_at: None,
    }
}
