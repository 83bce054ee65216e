pub mod captions;
pub mod collector;
pub mod config;
pub mod error;
pub mod host;
pub mod resolver;
pub mod scan;
pub mod summarize;

pub use error::{Error, Result};

use serde::Serialize;

/// Origin of a caption track. Authored tracks are preferred over
/// machine-generated (ASR) ones whenever both exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackKind {
    Authored,
    AutoGenerated,
}

impl TrackKind {
    /// The wire format tags ASR tracks with `kind: "asr"` and omits the
    /// field for authored ones.
    pub fn from_wire(kind: Option<&str>) -> Self {
        match kind {
            Some("asr") => TrackKind::AutoGenerated,
            _ => TrackKind::Authored,
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Authored => write!(f, "authored"),
            TrackKind::AutoGenerated => write!(f, "asr"),
        }
    }
}

/// Reference to one fetchable caption track, derived from the player state.
#[derive(Debug, Clone, Serialize)]
pub struct CaptionTrackRef {
    pub fetch_url: String,
    pub kind: TrackKind,
}

/// Everything collected from one watch page.
///
/// `transcript_text` is non-blank by construction: an empty transcript
/// after every acquisition strategy fails the collection instead of
/// producing a hollow record.
#[derive(Debug, Clone, Serialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub url: String,
    pub published_at: Option<String>,
    pub transcript_text: String,
}

/// Validated structured summary produced from a model reply.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRecord {
    pub summary_lines: Vec<String>,
    pub key_points: Vec<String>,
    pub keywords: Vec<String>,
    pub broad_tags: Vec<String>,
    pub model: String,
    pub language_notice: Option<String>,
}

/// Extract a video ID from a watch URL, short URL, embed/shorts URL, or a
/// bare 11-character ID.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();

    if regex::Regex::new(r"^[a-zA-Z0-9_-]{11}$").unwrap().is_match(input) {
        return Some(input.to_string());
    }

    let patterns = [
        r"(?:youtube\.com/watch\?.*v=)([a-zA-Z0-9_-]{11})",
        r"youtu\.be/([a-zA-Z0-9_-]{11})",
        r"youtube\.com/embed/([a-zA-Z0-9_-]{11})",
        r"youtube\.com/shorts/([a-zA-Z0-9_-]{11})",
    ];

    for pattern in patterns {
        if let Some(caps) = regex::Regex::new(pattern).unwrap().captures(input) {
            return Some(caps[1].to_string());
        }
    }

    None
}

/// Whether a URL's path is a watch page. Collection refuses to run
/// anywhere else.
pub fn is_watch_page(url: &str) -> bool {
    regex::Regex::new(r"^https?://[^/]+/watch(?:[/?#]|$)")
        .unwrap()
        .is_match(url.trim())
}
