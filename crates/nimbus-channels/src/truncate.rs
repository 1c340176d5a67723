//! Unicode-safe truncation to Slack's documented field-length limits
//! (spec §4.6 slack_dm).

pub const HEADER_TEXT_LIMIT: usize = 150;
pub const TEXT_LIMIT: usize = 3000;
pub const FIELD_TEXT_LIMIT: usize = 2000;
pub const BUTTON_TEXT_LIMIT: usize = 75;
pub const BUTTON_VALUE_LIMIT: usize = 2000;

const ELLIPSIS: char = '\u{2026}';

/// Truncates by Unicode scalar count, never splitting inside a code point.
/// Reserves one slot for the ellipsis when truncation is necessary.
pub fn truncate_chars(input: &str, max_len: usize) -> String {
    if input.chars().count() <= max_len {
        return input.to_string();
    }
    if max_len == 0 {
        return String::new();
    }
    let mut out: String = input.chars().take(max_len.saturating_sub(1)).collect();
    out.push(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_short_strings_untouched() {
        assert_eq!(truncate_chars("hello", HEADER_TEXT_LIMIT), "hello");
    }

    #[test]
    fn truncates_multibyte_safely_with_ellipsis() {
        let input = "é".repeat(HEADER_TEXT_LIMIT + 10);
        let out = truncate_chars(&input, HEADER_TEXT_LIMIT);
        assert_eq!(out.chars().count(), HEADER_TEXT_LIMIT);
        assert!(out.ends_with('\u{2026}'));
    }
}
