//! REST client for the civic platform API, plus the reverse-geocoding
//! providers used by the location page.

pub mod announcements;
pub mod auth;
pub mod client;
pub mod emergency;
pub mod error;
pub mod geocode;
pub mod messages;
pub mod polls;

use async_trait::async_trait;

use civic_types::api::{PostResults, VerificationResponse, VoteRequest, VoteResponse};
use civic_types::models::{Announcement, Chat, ChatMessage, EmergencyService, Post};

pub use client::{ApiClient, ApiConfig};
pub use error::ApiError;

/// The API surface the pages depend on. `ApiClient` is the real
/// implementation; tests substitute in-memory fakes.
#[async_trait]
pub trait CivicApi: Send + Sync {
    async fn announcements(&self) -> Result<Vec<Announcement>, ApiError>;

    async fn emergency_services(&self) -> Result<Vec<EmergencyService>, ApiError>;

    async fn posts(&self) -> Result<Vec<Post>, ApiError>;

    async fn vote(&self, post_id: &str, vote: &VoteRequest) -> Result<VoteResponse, ApiError>;

    async fn results(&self, post_id: &str) -> Result<PostResults, ApiError>;

    async fn verify_registration(&self, code: &str) -> Result<VerificationResponse, ApiError>;

    async fn chats(&self) -> Result<Vec<Chat>, ApiError>;

    async fn messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, ApiError>;

    async fn send_message(&self, chat_id: &str, content: &str) -> Result<ChatMessage, ApiError>;
}

#[async_trait]
impl CivicApi for ApiClient {
    async fn announcements(&self) -> Result<Vec<Announcement>, ApiError> {
        self.get_announcements().await
    }

    async fn emergency_services(&self) -> Result<Vec<EmergencyService>, ApiError> {
        self.get_emergency_services().await
    }

    async fn posts(&self) -> Result<Vec<Post>, ApiError> {
        self.get_posts().await
    }

    async fn vote(&self, post_id: &str, vote: &VoteRequest) -> Result<VoteResponse, ApiError> {
        self.cast_vote(post_id, vote).await
    }

    async fn results(&self, post_id: &str) -> Result<PostResults, ApiError> {
        self.get_results(post_id).await
    }

    async fn verify_registration(&self, code: &str) -> Result<VerificationResponse, ApiError> {
        self.submit_verification(code).await
    }

    async fn chats(&self) -> Result<Vec<Chat>, ApiError> {
        self.get_chats().await
    }

    async fn messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        self.get_messages(chat_id).await
    }

    async fn send_message(&self, chat_id: &str, content: &str) -> Result<ChatMessage, ApiError> {
        self.post_message(chat_id, content).await
    }
}
