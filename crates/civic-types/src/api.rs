use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Announcement, Chat, ChatMessage, EmergencyService, Post};

// -- Announcements --

#[derive(Debug, Serialize, Deserialize)]
pub struct AnnouncementsResponse {
    #[serde(default)]
    pub announcements: Vec<Announcement>,
}

// -- Emergency services --

#[derive(Debug, Serialize, Deserialize)]
pub struct EmergencyServicesResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<EmergencyService>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// -- Polls & surveys --

#[derive(Debug, Serialize, Deserialize)]
pub struct PostsResponse {
    #[serde(default)]
    pub posts: Vec<Post>,
}

/// Body of `POST /post/{id}/vote`. Serializes as a single-key object:
/// `{"option": ..}`, `{"response": ..}` or `{"rating": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteRequest {
    Option(String),
    Response(String),
    Rating(u8),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoteResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub results: PostResults,
}

/// Aggregates for a post. The shape depends on the post kind, so the first
/// variant that matches the payload wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostResults {
    Ratings(RatingSummary),
    Tally(BTreeMap<String, u64>),
    Options(Vec<OptionCount>),
    Responses(Vec<String>),
}

/// Requires both `average` and `count`, which no option tally carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average: f64,
    #[serde(alias = "total")]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionCount {
    #[serde(alias = "text")]
    pub option: String,
    #[serde(alias = "votes")]
    pub count: u64,
}

impl PostResults {
    /// Option tally, when these are poll results.
    pub fn tally(&self) -> Option<BTreeMap<String, u64>> {
        match self {
            Self::Tally(map) => Some(map.clone()),
            Self::Options(list) => Some(list.iter().map(|o| (o.option.clone(), o.count)).collect()),
            _ => None,
        }
    }
}

// -- Registration --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub verification_code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// -- Chats & messages --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    pub chat_id: String,
}

/// `GET /user/chats` answers with either a bare array or `{ chats }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChatsResponse {
    List(Vec<Chat>),
    Wrapped { chats: Vec<Chat> },
}

impl ChatsResponse {
    pub fn into_vec(self) -> Vec<Chat> {
        match self {
            Self::List(chats) | Self::Wrapped { chats } => chats,
        }
    }
}

/// `GET /message/all/{chatId}` answers with either a bare array or `{ messages }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessagesResponse {
    List(Vec<ChatMessage>),
    Wrapped { messages: Vec<ChatMessage> },
}

impl MessagesResponse {
    pub fn into_vec(self) -> Vec<ChatMessage> {
        match self {
            Self::List(messages) | Self::Wrapped { messages } => messages,
        }
    }
}

/// `POST /message/send` answers with the stored message, bare or wrapped.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SentMessageResponse {
    Bare(ChatMessage),
    Wrapped { message: ChatMessage },
}

impl SentMessageResponse {
    pub fn into_message(self) -> ChatMessage {
        match self {
            Self::Bare(message) | Self::Wrapped { message } => message,
        }
    }
}

// -- Errors --

/// Error body the server attaches to non-2xx responses.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn into_text(self) -> Option<String> {
        self.message.or(self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_body_is_a_single_key_object() {
        let body = serde_json::to_value(VoteRequest::Option("Yes".into())).unwrap();
        assert_eq!(body, serde_json::json!({ "option": "Yes" }));
        let body = serde_json::to_value(VoteRequest::Rating(4)).unwrap();
        assert_eq!(body, serde_json::json!({ "rating": 4 }));
    }

    #[test]
    fn results_shapes() {
        let r: ResultsResponse = serde_json::from_str(r#"{"results":{"Yes":3,"No":1}}"#).unwrap();
        assert_eq!(r.results.tally().unwrap()["Yes"], 3);

        let r: ResultsResponse =
            serde_json::from_str(r#"{"results":{"average":4.5,"count":2}}"#).unwrap();
        assert!(matches!(r.results, PostResults::Ratings(RatingSummary { count: 2, .. })));

        let r: ResultsResponse = serde_json::from_str(
            r#"{"results":{"average":4.2,"count":5,"distribution":{"5":3,"4":2}}}"#,
        )
        .unwrap();
        assert!(matches!(r.results, PostResults::Ratings(RatingSummary { count: 5, .. })));

        let r: ResultsResponse =
            serde_json::from_str(r#"{"results":{"average":4,"total":3}}"#).unwrap();
        assert!(r.results.tally().is_none());

        let r: ResultsResponse =
            serde_json::from_str(r#"{"results":[{"text":"Park","votes":7}]}"#).unwrap();
        assert_eq!(r.results.tally().unwrap()["Park"], 7);

        let r: ResultsResponse = serde_json::from_str(r#"{"results":["more lights"]}"#).unwrap();
        assert_eq!(r.results, PostResults::Responses(vec!["more lights".into()]));
    }

    #[test]
    fn chat_list_bare_or_wrapped() {
        let bare: ChatsResponse = serde_json::from_str(r#"[{"_id":"c1"}]"#).unwrap();
        let wrapped: ChatsResponse = serde_json::from_str(r#"{"chats":[{"_id":"c1"}]}"#).unwrap();
        assert_eq!(bare.into_vec()[0].id, "c1");
        assert_eq!(wrapped.into_vec()[0].id, "c1");
    }
}
