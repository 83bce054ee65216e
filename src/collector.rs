use log::debug;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::host::{DomHost, TextFetch};
use crate::resolver::resolve_transcript;
use crate::scan::extract_json_object;
use crate::{CaptionTrackRef, TrackKind, VideoRecord};

const PLAYER_RESPONSE_MARKER: &str = "ytInitialPlayerResponse = ";

const META_TITLE_SELECTOR: &str = "meta[name=\"title\"]";
const CHANNEL_NAME_SELECTOR: &str = "ytd-watch-metadata #channel-name a";

/// Subset of the embedded player state this pipeline consumes: the
/// caption tracklist and a few metadata fields used as fallbacks.
#[derive(Debug, Deserialize)]
pub struct PlayerState {
    captions: Option<CaptionsData>,
    #[serde(rename = "videoDetails")]
    video_details: Option<VideoDetails>,
    microformat: Option<Microformat>,
}

#[derive(Debug, Deserialize)]
struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks")]
    caption_tracks: Option<Vec<WireCaptionTrack>>,
}

#[derive(Debug, Deserialize)]
struct WireCaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoDetails {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
    title: Option<String>,
    author: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Microformat {
    #[serde(rename = "playerMicroformatRenderer")]
    player_microformat_renderer: Option<MicroformatRenderer>,
}

#[derive(Debug, Deserialize)]
struct MicroformatRenderer {
    #[serde(rename = "publishDate")]
    publish_date: Option<String>,
}

impl PlayerState {
    /// Parse the player state embedded in watch-page HTML.
    ///
    /// The object sits mid-script, immediately followed by further
    /// statements, so it is cut out with the depth-aware scanner before
    /// deserializing.
    pub fn from_watch_html(html: &str) -> Result<Self> {
        let marker = html
            .find(PLAYER_RESPONSE_MARKER)
            .ok_or_else(|| Error::MalformedPayload("player response marker not found in page HTML".into()))?;
        let span = extract_json_object(html, marker + PLAYER_RESPONSE_MARKER.len())?;
        serde_json::from_str(span)
            .map_err(|e| Error::MalformedPayload(format!("player response did not parse: {e}")))
    }

    pub fn caption_tracks(&self) -> Vec<CaptionTrackRef> {
        self.captions
            .as_ref()
            .and_then(|c| c.player_captions_tracklist_renderer.as_ref())
            .and_then(|r| r.caption_tracks.as_ref())
            .map(|tracks| {
                tracks
                    .iter()
                    .map(|t| CaptionTrackRef {
                        fetch_url: t.base_url.clone(),
                        kind: TrackKind::from_wire(t.kind.as_deref()),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn video_id(&self) -> Option<String> {
        self.video_details.as_ref().and_then(|d| d.video_id.clone())
    }

    pub fn title(&self) -> Option<String> {
        self.video_details.as_ref().and_then(|d| d.title.clone())
    }

    pub fn author(&self) -> Option<String> {
        self.video_details.as_ref().and_then(|d| d.author.clone())
    }

    pub fn publish_date(&self) -> Option<String> {
        self.microformat
            .as_ref()
            .and_then(|m| m.player_microformat_renderer.as_ref())
            .and_then(|r| r.publish_date.clone())
    }
}

/// Collect a complete [`VideoRecord`] from the current page.
///
/// One attempt per invocation; by the time this runs the page load is
/// already settled, so there is nothing a retry would change.
pub async fn collect_video_data(fetch: &dyn TextFetch, dom: &dyn DomHost) -> Result<VideoRecord> {
    let url = dom.url();
    if !crate::is_watch_page(&url) {
        return Err(Error::NotWatchPage(url));
    }

    let html = fetch.get_text(&url).await?;
    let player = PlayerState::from_watch_html(&html)?;

    let video_id = crate::extract_video_id(&url)
        .or_else(|| player.video_id())
        .unwrap_or_else(|| "unknown-video".to_string());

    let tracks = player.caption_tracks();
    debug!("collected {} caption track(s) for {video_id}", tracks.len());

    let transcript_text = resolve_transcript(fetch, dom, &tracks, &video_id, dom.lang().as_deref()).await?;
    if transcript_text.trim().is_empty() {
        return Err(Error::NoTranscript);
    }

    // Each field resolves through its fallback chain, first non-blank wins.
    let title = non_blank(dom.attribute(META_TITLE_SELECTOR, "content"))
        .or_else(|| non_blank(dom.document_title().map(|t| strip_site_suffix(&t))))
        .or_else(|| non_blank(player.title()))
        .unwrap_or_default();

    let channel = non_blank(dom.query_text(CHANNEL_NAME_SELECTOR).into_iter().next())
        .or_else(|| non_blank(player.author()))
        .unwrap_or_else(|| "unknown-channel".to_string());

    Ok(VideoRecord {
        video_id,
        title,
        channel,
        url,
        published_at: player.publish_date(),
        transcript_text,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn strip_site_suffix(title: &str) -> String {
    title.strip_suffix(" - YouTube").unwrap_or(title).to_string()
}
