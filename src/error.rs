use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not a watch page: {0}")]
    NotWatchPage(String),

    #[error("transcript was empty after every acquisition strategy")]
    NoTranscript,

    #[error("malformed embedded payload: {0}")]
    MalformedPayload(String),

    #[error("chat completion failed ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("model reply failed validation: {0}")]
    InvalidReply(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable machine-readable code for collaborators that dispatch on
    /// failure kind rather than message text.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotWatchPage(_) => "NOT_WATCH_PAGE",
            Error::NoTranscript => "NO_TRANSCRIPT",
            Error::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            Error::Api { .. } => "API_ERROR",
            Error::InvalidReply(_) => "INVALID_REPLY",
            Error::Http(_) | Error::Json(_) => "COLLECTION_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
