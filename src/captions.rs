use serde::Deserialize;

/// JSON3 caption payload: an ordered list of timed events, each carrying
/// zero or more text segments.
#[derive(Debug, Deserialize)]
struct Json3Payload {
    events: Option<Vec<Json3Event>>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    segs: Option<Vec<Json3Segment>>,
}

#[derive(Debug, Deserialize)]
struct Json3Segment {
    utf8: Option<String>,
}

/// Normalize a raw caption response body into plain transcript text.
///
/// The caption endpoints answer with JSON3, XML captions, or an HTML error
/// page depending on the video and the request parameters. Anything that is
/// not recognizable caption data normalizes to the empty string so the
/// caller can move on to its next acquisition strategy.
pub fn normalize_caption_payload(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    if let Ok(payload) = serde_json::from_str::<Json3Payload>(raw) {
        return normalize_json3(payload);
    }

    normalize_caption_xml(raw)
}

fn normalize_json3(payload: Json3Payload) -> String {
    let Some(events) = payload.events else {
        return String::new();
    };

    let mut lines = Vec::new();
    for event in events {
        let Some(segs) = event.segs else { continue };
        let text = segs
            .iter()
            .filter_map(|seg| seg.utf8.as_deref())
            .map(|s| html_escape::decode_html_entities(s).to_string())
            .collect::<Vec<_>>()
            .join("");
        let text = text.trim();
        if !text.is_empty() {
            lines.push(text.to_string());
        }
    }
    lines.join("\n")
}

fn normalize_caption_xml(xml: &str) -> String {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    let mut lines = Vec::new();
    let mut in_text = false;
    let mut buffer = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"text" => {
                in_text = true;
                buffer.clear();
            }
            Ok(Event::Text(ref e)) if in_text => {
                buffer.push_str(&e.unescape().unwrap_or_default());
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"text" => {
                let decoded = html_escape::decode_html_entities(&buffer).to_string();
                let line = decoded.trim();
                if !line.is_empty() {
                    lines.push(line.to_string());
                }
                in_text = false;
            }
            Ok(Event::Empty(_)) => {
                // Self-closing <text .../> with no content — skip
            }
            Ok(Event::Eof) => break,
            // A document that does not parse as XML (an HTML error page,
            // garbage) yields no transcript rather than an error.
            Err(_) => return String::new(),
            _ => {}
        }
    }

    lines.join("\n")
}
