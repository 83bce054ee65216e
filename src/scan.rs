use crate::error::{Error, Result};

/// Extract one balanced top-level `{...}` object from `input`, scanning
/// forward from byte offset `start`.
///
/// A greedy regex bounded by the nearest `}` would truncate nested objects,
/// and the embedded player state is typically followed by further script
/// statements on the same line. This scanner tracks brace depth and string
/// state instead: braces inside string literals (including ones after
/// escaped quotes) never affect depth.
pub fn extract_json_object(input: &str, start: usize) -> Result<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut obj_start: Option<usize> = None;

    for (i, ch) in input[start..].char_indices() {
        let pos = start + i;

        let Some(begin) = obj_start else {
            if ch == '{' {
                obj_start = Some(pos);
                depth = 1;
            }
            continue;
        };

        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&input[begin..=pos]);
                }
            }
            _ => {}
        }
    }

    if obj_start.is_some() {
        Err(Error::MalformedPayload("unterminated JSON object".into()))
    } else {
        Err(Error::MalformedPayload("no JSON object found".into()))
    }
}
