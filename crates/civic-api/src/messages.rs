use civic_types::api::{ChatsResponse, MessagesResponse, SendMessageRequest, SentMessageResponse};
use civic_types::models::{Chat, ChatMessage};

use crate::client::ApiClient;
use crate::error::ApiError;

impl ApiClient {
    pub async fn get_chats(&self) -> Result<Vec<Chat>, ApiError> {
        self.require_token()?;
        let resp: ChatsResponse = self.get_json(&["user", "chats"]).await?;
        Ok(resp.into_vec())
    }

    pub async fn get_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        self.require_token()?;
        let resp: MessagesResponse = self.get_json(&["message", "all", chat_id]).await?;
        Ok(resp.into_vec())
    }

    /// Store a message server-side. Relaying it to the other members is the
    /// real-time channel's job.
    pub async fn post_message(&self, chat_id: &str, content: &str) -> Result<ChatMessage, ApiError> {
        self.require_token()?;
        let req = SendMessageRequest {
            content: content.to_string(),
            chat_id: chat_id.to_string(),
        };
        let resp: SentMessageResponse = self.post_json(&["message", "send"], &req).await?;
        Ok(resp.into_message())
    }
}
