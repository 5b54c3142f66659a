use thiserror::Error;

/// Failure of a single REST request. The `Display` text is what pages show
/// in their error banner, so it stays short and user-facing.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("not signed in")]
    MissingToken,

    #[error("session expired or unauthorized: {0}")]
    Unauthorized(String),

    #[error("{message} ({status})")]
    Status { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The server answered 2xx but flagged the request as unsuccessful.
    #[error("{0}")]
    Rejected(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Unauthorized(_) => Some(401),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
