use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::scan::extract_json_object;
use crate::{SummaryRecord, VideoRecord};

pub const CHAT_COMPLETIONS_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

pub const MAX_TRANSCRIPT_CHARS: usize = 30_000;
pub const MAX_RETRIES: u32 = 3;
const BASE_RETRY_MS: u64 = 500;
const JITTER_MS: u64 = 200;

/// Language-mismatch thresholds. Empirically chosen; they hold for the
/// Japanese/English pair and are not expected to generalize further.
pub const JA_NOTICE_CJK_MAX: usize = 10;
pub const JA_NOTICE_LATIN_MIN: usize = 50;
pub const EN_NOTICE_LATIN_MAX: usize = 20;
pub const EN_NOTICE_CJK_MIN: usize = 20;

const SYSTEM_PROMPT: &str =
    "You summarize YouTube transcripts. Return strict JSON with summary_lines, key_points, keywords, broad_tags.";

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub user: String,
}

/// Raw chat-completion reply: status plus unparsed body. Parsing is the
/// caller's job so that shape failures stay distinguishable from
/// transport failures.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub status: u16,
    pub body: String,
}

/// Chat-completion capability. Implementations return `Err` only for
/// transport-level failures; any HTTP status comes back as a response.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

/// reqwest-backed OpenRouter client.
pub struct OpenRouterChat {
    client: reqwest::Client,
    api_key: String,
}

impl OpenRouterChat {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ChatApi for OpenRouterChat {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = serde_json::json!({
            "model": request.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user }
            ]
        });

        let resp = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", "https://youtube.com")
            .header("X-Title", "ytnote")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(ChatResponse { status, body })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionBody {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug)]
struct ParsedSummary {
    summary_lines: Vec<String>,
    key_points: Vec<String>,
    keywords: Vec<String>,
    broad_tags: Vec<String>,
}

/// Summarize a collected video into a validated structured record.
///
/// Transient remote failures (429, 5xx, network-level errors) are retried
/// with exponential backoff up to [`MAX_RETRIES`] times. Reply-shape
/// failures are never retried: another attempt costs quota and will not
/// fix a parsing problem.
pub async fn summarize_video(
    chat: &dyn ChatApi,
    video: &VideoRecord,
    model: &str,
    language: &str,
) -> Result<SummaryRecord> {
    let request = ChatRequest {
        model: model.to_string(),
        system: SYSTEM_PROMPT.to_string(),
        user: build_prompt(video, language),
    };

    let mut attempt = 0u32;
    loop {
        match chat.complete(&request).await {
            Ok(resp) if (200..300).contains(&resp.status) => {
                let content = extract_reply_content(&resp.body)?;
                let parsed = parse_summary_reply(&content)?;
                let language_notice = language_notice(&parsed, language);
                return Ok(SummaryRecord {
                    summary_lines: parsed.summary_lines,
                    key_points: parsed.key_points,
                    keywords: parsed.keywords,
                    broad_tags: parsed.broad_tags,
                    model: model.to_string(),
                    language_notice,
                });
            }
            Ok(resp) => {
                if retryable_status(resp.status) && attempt < MAX_RETRIES {
                    backoff(attempt).await;
                    attempt += 1;
                    continue;
                }
                return Err(Error::Api {
                    status: resp.status,
                    body: truncate_chars(&resp.body, 200),
                });
            }
            Err(err) => {
                if attempt >= MAX_RETRIES || !is_network_error(&err) {
                    return Err(err);
                }
                backoff(attempt).await;
                attempt += 1;
            }
        }
    }
}

fn retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Transport-level failures are worth retrying; anything else (reply
/// shape, JSON decode) is not.
fn is_network_error(err: &Error) -> bool {
    if matches!(err, Error::Http(_)) {
        return true;
    }
    let message = err.to_string().to_lowercase();
    message.contains("fetch") || message.contains("network")
}

async fn backoff(attempt: u32) {
    let jitter = rand::random::<u64>() % JITTER_MS;
    let delay = Duration::from_millis(BASE_RETRY_MS * 2u64.pow(attempt) + jitter);
    debug!("chat completion attempt {} failed, retrying in {delay:?}", attempt + 1);
    tokio::time::sleep(delay).await;
}

fn extract_reply_content(body: &str) -> Result<String> {
    let parsed: ChatCompletionBody = serde_json::from_str(body)?;
    parsed
        .choices
        .and_then(|mut choices| if choices.is_empty() { None } else { choices.swap_remove(0).message })
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| Error::InvalidReply("model returned an empty reply".into()))
}

/// Pull the first JSON object out of the reply (models wrap it in prose or
/// Markdown fences) and validate the four array fields against their
/// bounds.
fn parse_summary_reply(content: &str) -> Result<ParsedSummary> {
    let span = extract_json_object(content, 0)
        .map_err(|_| Error::InvalidReply("no JSON object found in model output".into()))?;
    let value: serde_json::Value = serde_json::from_str(span)
        .map_err(|e| Error::InvalidReply(format!("model output was not valid JSON: {e}")))?;

    Ok(ParsedSummary {
        summary_lines: ensure_string_array(value.get("summary_lines"), "summary_lines", 3, 5)?,
        key_points: ensure_string_array(value.get("key_points"), "key_points", 5, 10)?,
        keywords: ensure_string_array(value.get("keywords"), "keywords", 3, 8)?,
        broad_tags: ensure_string_array(value.get("broad_tags"), "broad_tags", 2, 6)?,
    })
}

/// Coerce elements to trimmed strings, drop blanks and non-strings, clamp
/// to `max`. Fewer than `min` survivors is a hard validation failure.
fn ensure_string_array(
    value: Option<&serde_json::Value>,
    field: &str,
    min: usize,
    max: usize,
) -> Result<Vec<String>> {
    let Some(items) = value.and_then(|v| v.as_array()) else {
        return Err(Error::InvalidReply(format!("expected {field} to be an array")));
    };

    let items: Vec<String> = items
        .iter()
        .map(|item| item.as_str().unwrap_or("").trim().to_string())
        .filter(|item| !item.is_empty())
        .take(max)
        .collect();

    if items.len() < min {
        return Err(Error::InvalidReply(format!(
            "expected at least {min} items in {field}, got {}",
            items.len()
        )));
    }

    Ok(items)
}

/// Build the bounded user prompt: output rules, metadata, and the
/// transcript cut at a fixed character ceiling.
pub fn build_prompt(video: &VideoRecord, language: &str) -> String {
    let (transcript, truncated) = truncate_transcript(&video.transcript_text);
    let target = language_instruction(language);
    let truncation_note = if truncated {
        format!("Transcript note: input was truncated to first {MAX_TRANSCRIPT_CHARS} characters.")
    } else {
        "Transcript note: full transcript included.".to_string()
    };

    [
        format!("Language: {language}"),
        format!("All output text must be in {target}."),
        "Output rules:".to_string(),
        "- summary_lines: 3-5 lines".to_string(),
        "- key_points: 5-10 bullet points (as array items)".to_string(),
        "- keywords: 3-8 short terms".to_string(),
        "- broad_tags: 2-6 broad topic tags in lowercase (e.g. llm, chatgpt, openai, ai, programming, finance, health, startup, marketing, design)".to_string(),
        String::new(),
        format!("Title: {}", video.title),
        format!("Channel: {}", video.channel),
        format!("URL: {}", video.url),
        truncation_note,
        "Transcript:".to_string(),
        transcript,
    ]
    .join("\n")
}

fn truncate_transcript(text: &str) -> (String, bool) {
    if text.chars().count() <= MAX_TRANSCRIPT_CHARS {
        return (text.to_string(), false);
    }
    let cut: String = text.chars().take(MAX_TRANSCRIPT_CHARS).collect();
    (format!("{cut}\n...[TRUNCATED]"), true)
}

fn language_instruction(language: &str) -> String {
    match language.trim().to_lowercase().as_str() {
        "ja" | "ja-jp" => "Japanese".to_string(),
        "en" | "en-us" | "en-gb" => "English".to_string(),
        "ko" | "ko-kr" => "Korean".to_string(),
        "zh" | "zh-cn" | "zh-tw" => "Chinese".to_string(),
        _ => language.to_string(),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Script-count heuristic flagging a reply that is probably not in the
/// requested language. Advisory only; it rides along on a successful
/// record.
fn language_notice(parsed: &ParsedSummary, language: &str) -> Option<String> {
    let normalized = language.trim().to_lowercase();
    let merged: String = parsed
        .summary_lines
        .iter()
        .chain(parsed.key_points.iter())
        .chain(parsed.keywords.iter())
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");

    let cjk = merged.chars().filter(|c| is_cjk(*c)).count();
    let latin = merged.chars().filter(char::is_ascii_alphabetic).count();

    if normalized.starts_with("ja") {
        if cjk < JA_NOTICE_CJK_MAX && latin > JA_NOTICE_LATIN_MIN {
            return Some(format!("注意: 選択言語（{language}）以外で要約された可能性があります。"));
        }
        return None;
    }

    if normalized.starts_with("en") {
        if latin < EN_NOTICE_LATIN_MAX && cjk > EN_NOTICE_CJK_MIN {
            return Some(format!("Note: The summary may not be in selected language ({language})."));
        }
        return None;
    }

    None
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{309F}'   // Hiragana
        | '\u{30A0}'..='\u{30FF}' // Katakana
        | '\u{3400}'..='\u{4DBF}' // CJK extension A
        | '\u{4E00}'..='\u{9FFF}' // CJK unified
        | '\u{F900}'..='\u{FAFF}' // CJK compatibility
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedChat {
        responses: Mutex<Vec<Result<ChatResponse>>>,
        calls: AtomicUsize,
    }

    impl ScriptedChat {
        fn new(responses: Vec<ChatResponse>) -> Self {
            Self::scripted(responses.into_iter().map(Ok).collect())
        }

        fn scripted(responses: Vec<Result<ChatResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatApi for ScriptedChat {
        async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("more chat calls than scripted responses");
            }
            responses.remove(0)
        }
    }

    fn valid_content() -> String {
        serde_json::json!({
            "summary_lines": ["one", "two", "three"],
            "key_points": ["p1", "p2", "p3", "p4", "p5"],
            "keywords": ["k1", "k2", "k3"],
            "broad_tags": ["ai", "programming"]
        })
        .to_string()
    }

    fn chat_body(content: &str) -> String {
        serde_json::json!({"choices": [{"message": {"content": content}}]}).to_string()
    }

    fn ok_response(content: &str) -> ChatResponse {
        ChatResponse {
            status: 200,
            body: chat_body(content),
        }
    }

    fn sample_video() -> VideoRecord {
        VideoRecord {
            video_id: "abc12345678".to_string(),
            title: "Sample".to_string(),
            channel: "Channel".to_string(),
            url: "https://www.youtube.com/watch?v=abc12345678".to_string(),
            published_at: None,
            transcript_text: "hello world".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_on_429_then_success() {
        let chat = ScriptedChat::new(vec![
            ChatResponse {
                status: 429,
                body: "rate limited".to_string(),
            },
            ok_response(&valid_content()),
        ]);
        let started = tokio::time::Instant::now();

        let record = summarize_video(&chat, &sample_video(), "test-model", "en").await.unwrap();
        assert_eq!(record.summary_lines.len(), 3);
        assert_eq!(record.model, "test-model");
        assert_eq!(chat.calls(), 2);

        // Exactly one backoff window: base 500ms plus jitter under 200ms.
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(500), "waited {waited:?}");
        assert!(waited < Duration::from_millis(700), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_exhaust_retries() {
        let failing = ChatResponse {
            status: 503,
            body: "unavailable".to_string(),
        };
        let chat = ScriptedChat::new(vec![failing.clone(), failing.clone(), failing.clone(), failing]);

        let err = summarize_video(&chat, &sample_video(), "test-model", "en").await.unwrap_err();
        assert_eq!(chat.calls(), 1 + MAX_RETRIES as usize);
        match err {
            Error::Api { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "unavailable");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_pattern_error_is_retried() {
        let chat = ScriptedChat::scripted(vec![
            Err(Error::InvalidReply("simulated network failure while sending".into())),
            Ok(ok_response(&valid_content())),
        ]);

        let record = summarize_video(&chat, &sample_video(), "test-model", "en").await.unwrap();
        assert_eq!(record.keywords.len(), 3);
        assert_eq!(chat.calls(), 2);
    }

    #[tokio::test]
    async fn test_non_network_error_propagates_immediately() {
        let chat = ScriptedChat::scripted(vec![Err(Error::InvalidReply("shape mismatch".into()))]);

        let err = summarize_video(&chat, &sample_video(), "test-model", "en").await.unwrap_err();
        assert_eq!(chat.calls(), 1);
        assert_eq!(err.code(), "INVALID_REPLY");
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let chat = ScriptedChat::new(vec![ChatResponse {
            status: 401,
            body: "bad key".to_string(),
        }]);

        let err = summarize_video(&chat, &sample_video(), "test-model", "en").await.unwrap_err();
        assert_eq!(chat.calls(), 1);
        assert_eq!(err.code(), "API_ERROR");
    }

    #[tokio::test]
    async fn test_validation_failure_is_not_retried() {
        let short = serde_json::json!({
            "summary_lines": ["one", "two", "three"],
            "key_points": ["p1", "p2"],
            "keywords": ["k1", "k2", "k3"],
            "broad_tags": ["ai", "programming"]
        })
        .to_string();
        let chat = ScriptedChat::new(vec![ok_response(&short)]);

        let err = summarize_video(&chat, &sample_video(), "test-model", "en").await.unwrap_err();
        assert_eq!(chat.calls(), 1);
        assert_eq!(err.code(), "INVALID_REPLY");
        assert!(err.to_string().contains("key_points"));
    }

    #[tokio::test]
    async fn test_reply_wrapped_in_markdown_fence() {
        let content = format!("Sure! Here is the JSON:\n```json\n{}\n```", valid_content());
        let chat = ScriptedChat::new(vec![ok_response(&content)]);

        let record = summarize_video(&chat, &sample_video(), "test-model", "en").await.unwrap();
        assert_eq!(record.key_points.len(), 5);
        assert_eq!(record.broad_tags, vec!["ai", "programming"]);
    }

    #[tokio::test]
    async fn test_empty_reply_is_invalid() {
        let chat = ScriptedChat::new(vec![ChatResponse {
            status: 200,
            body: serde_json::json!({"choices": []}).to_string(),
        }]);

        let err = summarize_video(&chat, &sample_video(), "test-model", "en").await.unwrap_err();
        assert_eq!(err.code(), "INVALID_REPLY");
    }

    #[test]
    fn test_ensure_string_array_coerces_and_clamps() {
        let value = serde_json::json!(["  a  ", "", 42, "b", "c", "d", "e", "f"]);
        let items = ensure_string_array(Some(&value), "keywords", 3, 5).unwrap();
        assert_eq!(items, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_ensure_string_array_rejects_non_array() {
        let value = serde_json::json!("not an array");
        assert!(ensure_string_array(Some(&value), "keywords", 3, 8).is_err());
        assert!(ensure_string_array(None, "keywords", 3, 8).is_err());
    }

    #[test]
    fn test_prompt_includes_rules_and_metadata() {
        let prompt = build_prompt(&sample_video(), "ja");
        assert!(prompt.contains("All output text must be in Japanese."));
        assert!(prompt.contains("- key_points: 5-10 bullet points"));
        assert!(prompt.contains("Title: Sample"));
        assert!(prompt.contains("Transcript note: full transcript included."));
        assert!(prompt.ends_with("hello world"));
    }

    #[test]
    fn test_prompt_truncates_long_transcripts() {
        let mut video = sample_video();
        video.transcript_text = "x".repeat(MAX_TRANSCRIPT_CHARS + 100);
        let prompt = build_prompt(&video, "en");
        assert!(prompt.contains("...[TRUNCATED]"));
        assert!(prompt.contains("input was truncated"));
    }

    #[test]
    fn test_language_notice_japanese_target_latin_reply() {
        let parsed = ParsedSummary {
            summary_lines: vec!["This is a fully English summary of the video content".to_string()],
            key_points: vec!["another English point with plenty of Latin letters".to_string()],
            keywords: vec!["english".to_string()],
            broad_tags: vec!["ai".to_string()],
        };
        assert!(language_notice(&parsed, "ja").is_some());
    }

    #[test]
    fn test_language_notice_absent_for_japanese_reply() {
        let parsed = ParsedSummary {
            summary_lines: vec!["この動画は要約の検証のためのサンプルです".to_string()],
            key_points: vec!["重要な点がここに並びます".to_string()],
            keywords: vec!["要約".to_string()],
            broad_tags: vec!["ai".to_string()],
        };
        assert!(language_notice(&parsed, "ja").is_none());
    }

    #[test]
    fn test_language_notice_english_target_cjk_reply() {
        let parsed = ParsedSummary {
            summary_lines: vec!["この動画は日本語で要約されています".to_string()],
            key_points: vec!["日本語の箇条書きが続きます".to_string()],
            keywords: vec!["日本語".to_string()],
            broad_tags: vec!["ai".to_string()],
        };
        assert!(language_notice(&parsed, "en").is_some());
    }

    #[test]
    fn test_language_notice_skipped_for_other_targets() {
        let parsed = ParsedSummary {
            summary_lines: vec!["whatever".to_string()],
            key_points: vec![],
            keywords: vec![],
            broad_tags: vec![],
        };
        assert!(language_notice(&parsed, "ko").is_none());
    }
}
