use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reference to another server document. Depending on the endpoint the
/// server sends either the bare id or the populated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocRef {
    Id(String),
    Doc(RefDoc),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefDoc {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl DocRef {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Doc(doc) => &doc.id,
        }
    }

    /// Name to show for the referenced document, falling back to its id.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Doc(RefDoc { name: Some(name), .. }) if !name.is_empty() => name,
            _ => self.id(),
        }
    }
}

impl From<&str> for DocRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyService {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Poll,
    Survey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
    pub text: String,
    #[serde(default)]
    pub votes: u64,
}

/// A poll or survey post. Polls are voted on by option, surveys take a free
/// text response and/or a rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "postType", alias = "type")]
    pub kind: PostKind,
    #[serde(default)]
    pub options: Vec<PollOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_scale: Option<u8>,
    #[serde(default)]
    pub has_voted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|o| o.votes).sum()
    }

    pub fn option_mut(&mut self, text: &str) -> Option<&mut PollOption> {
        self.options.iter_mut().find(|o| o.text == text)
    }
}

/// A discussion channel: a group (or one-to-one) chat with its members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub chat_name: String,
    #[serde(default)]
    pub is_group_chat: bool,
    #[serde(default)]
    pub users: Vec<DocRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_message: Option<ChatMessage>,
}

impl Chat {
    /// Title for a chat list entry. One-to-one chats usually carry no name,
    /// so the other member is used instead.
    pub fn title_for(&self, me: &str) -> String {
        if !self.chat_name.is_empty() {
            return self.chat_name.clone();
        }
        self.users
            .iter()
            .find(|u| u.id() != me)
            .map(|u| u.display_name().to_string())
            .unwrap_or_else(|| self.id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub sender: DocRef,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<DocRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn chat_id(&self) -> Option<&str> {
        self.chat.as_ref().map(DocRef::id)
    }
}

/// Device position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A reverse-geocoded place name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub coordinates: Coordinates,
    pub provider: String,
}

/// Claims carried by the bearer token. The client only reads them to learn
/// who the current user is; the server is the one that verifies them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "_id")]
    pub object_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub exp: Option<u64>,
}

impl Claims {
    /// Servers disagree on where the user id goes; take the first present.
    pub fn user_id(&self) -> Option<&str> {
        [&self.id, &self.object_id, &self.user_id, &self.sub]
            .into_iter()
            .find_map(|v| v.as_deref())
    }
}
