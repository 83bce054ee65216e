use std::time::Duration;

use log::debug;

use crate::captions::normalize_caption_payload;
use crate::error::Result;
use crate::host::{DomHost, TextFetch};
use crate::{CaptionTrackRef, TrackKind};

pub const TIMED_TEXT_ENDPOINT: &str = "https://www.youtube.com/api/timedtext";

/// Languages swept after the page's own language. ASR coverage is best for
/// these two on the pages this tool targets.
const FALLBACK_LANGS: [&str; 2] = ["ja", "en"];

const PANEL_SETTLE: Duration = Duration::from_millis(300);
const PANEL_POLL_INTERVAL: Duration = Duration::from_millis(120);
const PANEL_POLL_TIMEOUT: Duration = Duration::from_millis(3000);

const SEGMENT_SELECTORS: [&str; 3] = [
    "ytd-transcript-segment-renderer .segment-text",
    "ytd-transcript-segment-renderer yt-formatted-string",
    "ytd-engagement-panel-section-list-renderer[visibility=\"ENGAGEMENT_PANEL_VISIBILITY_EXPANDED\"] ytd-transcript-segment-renderer",
];

const DIRECT_TRIGGER_SELECTORS: [&str; 5] = [
    "button[aria-label*=\"transcript\" i]",
    "button[aria-label*=\"文字起こし\"]",
    "ytd-video-description-transcript-section-renderer button",
    "tp-yt-paper-button[aria-label*=\"transcript\" i]",
    "tp-yt-paper-button[aria-label*=\"文字起こし\"]",
];

const MENU_BUTTON_SELECTORS: [&str; 3] = [
    "ytd-menu-renderer yt-icon-button button",
    "button[aria-label*=\"More actions\" i]",
    "button[aria-label*=\"その他の操作\"]",
];

const TRANSCRIPT_MENU_LABELS: [&str; 2] = ["transcript", "文字起こし"];

/// Resolve a transcript through three acquisition strategies in strict
/// priority order, returning the first non-blank result.
///
/// The direct track fetch and the timed-text sweep never touch the page
/// UI; the DOM panel scrape mutates it and depends on current markup, so
/// it runs last and only when both network tiers came back blank. An
/// all-blank outcome is `Ok("")`; the caller decides whether that is
/// fatal.
pub async fn resolve_transcript(
    fetch: &dyn TextFetch,
    dom: &dyn DomHost,
    tracks: &[CaptionTrackRef],
    video_id: &str,
    page_lang: Option<&str>,
) -> Result<String> {
    if let Some(track) = preferred_track(tracks) {
        debug!("trying caption track ({}) for {video_id}", track.kind);
        let text = fetch_from_track(fetch, track).await?;
        if !text.trim().is_empty() {
            return Ok(text);
        }
    }

    let text = sweep_timed_text(fetch, video_id, page_lang).await?;
    if !text.trim().is_empty() {
        return Ok(text);
    }

    debug!("network tiers blank for {video_id}, scraping transcript panel");
    Ok(scrape_dom_panel(dom).await)
}

/// First authored track if any, otherwise the first track of any kind.
fn preferred_track(tracks: &[CaptionTrackRef]) -> Option<&CaptionTrackRef> {
    tracks
        .iter()
        .find(|t| t.kind == TrackKind::Authored)
        .or_else(|| tracks.first())
}

async fn fetch_from_track(fetch: &dyn TextFetch, track: &CaptionTrackRef) -> Result<String> {
    let separator = if track.fetch_url.contains('?') { '&' } else { '?' };
    let url = format!("{}{}fmt=json3", track.fetch_url, separator);
    let raw = fetch.get_text(&url).await?;
    Ok(normalize_caption_payload(&raw))
}

/// Sweep the public timed-text endpoint over language and kind candidates,
/// stopping at the first non-blank normalization.
///
/// Language order is the page's declared language first, then the fixed
/// fallbacks, deduplicated with order preserved. ASR is tried before the
/// authored kind: on pages where tier 1 found no track list at all, an
/// auto-generated caption is the more likely one to exist.
async fn sweep_timed_text(fetch: &dyn TextFetch, video_id: &str, page_lang: Option<&str>) -> Result<String> {
    let mut langs: Vec<String> = Vec::new();
    for candidate in page_lang
        .map(|l| l.trim().to_lowercase())
        .into_iter()
        .filter(|l| !l.is_empty())
        .chain(FALLBACK_LANGS.iter().map(|l| l.to_string()))
    {
        if !langs.contains(&candidate) {
            langs.push(candidate);
        }
    }

    for lang in &langs {
        for kind in [Some("asr"), None] {
            let mut url = format!("{TIMED_TEXT_ENDPOINT}?v={video_id}&lang={lang}&fmt=json3");
            if let Some(kind) = kind {
                url.push_str("&kind=");
                url.push_str(kind);
            }
            let raw = fetch.get_text(&url).await?;
            let text = normalize_caption_payload(&raw);
            if !text.trim().is_empty() {
                debug!("timed-text hit: lang={lang} kind={kind:?}");
                return Ok(text);
            }
        }
    }

    Ok(String::new())
}

/// Last-resort tier: read the transcript panel out of the rendered page,
/// opening it first if needed.
async fn scrape_dom_panel(dom: &dyn DomHost) -> String {
    let existing = collect_panel_segments(dom);
    if !existing.trim().is_empty() {
        return existing;
    }

    try_open_transcript_panel(dom).await;

    let deadline = tokio::time::Instant::now() + PANEL_POLL_TIMEOUT;
    loop {
        let text = collect_panel_segments(dom);
        if !text.trim().is_empty() {
            return text.trim().to_string();
        }
        if tokio::time::Instant::now() >= deadline {
            return String::new();
        }
        tokio::time::sleep(PANEL_POLL_INTERVAL).await;
    }
}

fn collect_panel_segments(dom: &dyn DomHost) -> String {
    for selector in SEGMENT_SELECTORS {
        let lines: Vec<String> = dom
            .query_text(selector)
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        if !lines.is_empty() {
            return lines.join("\n");
        }
    }
    String::new()
}

/// Try the direct transcript triggers first; failing that, open the
/// more-actions menu and activate a menu item labeled "transcript" in any
/// of the localizations we know about.
async fn try_open_transcript_panel(dom: &dyn DomHost) {
    for selector in DIRECT_TRIGGER_SELECTORS {
        if dom.click(selector) {
            tokio::time::sleep(PANEL_SETTLE).await;
            return;
        }
    }

    for selector in MENU_BUTTON_SELECTORS {
        if dom.click(selector) {
            tokio::time::sleep(PANEL_SETTLE).await;
            break;
        }
    }

    if dom.activate_menu_item(&TRANSCRIPT_MENU_LABELS) {
        tokio::time::sleep(PANEL_SETTLE).await;
    }
}
