//! Tolerant JSON extractor for LLM completion output (spec §9): strips code
//! fences, locates the first `{`/last `}`, strips trailing commas, then
//! attempts a strict parse. Falls back to a typed "raw text" variant on
//! parse failure rather than propagating an error, since a malformed LLM
//! response is an expected, not exceptional, outcome.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedJson {
    Parsed(Value),
    RawText(String),
}

/// Removes a leading/trailing Markdown code fence (```` ``` ```` or
/// ```` ```json ````), if present.
fn strip_code_fences(input: &str) -> &str {
    let trimmed = input.trim();
    let Some(without_leading) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let without_lang = without_leading
        .strip_prefix("json")
        .or_else(|| without_leading.strip_prefix("JSON"))
        .unwrap_or(without_leading);
    let without_lang = without_lang.strip_prefix('\n').unwrap_or(without_lang);
    without_lang.strip_suffix("```").unwrap_or(without_lang).trim()
}

/// Narrows to the substring between the first `{` and the last `}`,
/// inclusive. Returns the input unchanged if no balanced braces are found.
fn locate_object(input: &str) -> &str {
    let Some(start) = input.find('{') else { return input };
    let Some(end) = input.rfind('}') else { return input };
    if end < start {
        return input;
    }
    &input[start..=end]
}

/// Removes a trailing comma immediately before a closing `}` or `]`, which
/// LLMs emit often enough to be worth tolerating.
fn strip_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                i += 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Best-effort extraction of a JSON value from raw LLM text.
pub fn extract_json(raw: &str) -> ExtractedJson {
    let unfenced = strip_code_fences(raw);
    let narrowed = locate_object(unfenced);
    let cleaned = strip_trailing_commas(narrowed);

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => ExtractedJson::Parsed(value),
        Err(_) => ExtractedJson::RawText(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_from_fenced_json_block() {
        let raw = "```json\n{\"project_id\": \"proj_1\"}\n```";
        assert_eq!(extract_json(raw), ExtractedJson::Parsed(json!({ "project_id": "proj_1" })));
    }

    #[test]
    fn extracts_object_surrounded_by_prose() {
        let raw = "Sure, here is the result: {\"ok\": true} Let me know if you need more.";
        assert_eq!(extract_json(raw), ExtractedJson::Parsed(json!({ "ok": true })));
    }

    #[test]
    fn tolerates_trailing_comma() {
        let raw = r#"{"a": 1, "b": 2,}"#;
        assert_eq!(extract_json(raw), ExtractedJson::Parsed(json!({ "a": 1, "b": 2 })));
    }

    #[test]
    fn falls_back_to_raw_text_on_unparseable_input() {
        let raw = "I could not complete this request.";
        assert_eq!(extract_json(raw), ExtractedJson::RawText(raw.to_string()));
    }
}
