/// Strip a markdown code fence from a model response, leaving the payload.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Truncate to at most `max_bytes` bytes without splitting a character.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_json() {
        assert_eq!(strip_code_blocks("```json\n[1,2]\n```"), "[1,2]");
        assert_eq!(strip_code_blocks("```\n[1,2]\n```"), "[1,2]");
        assert_eq!(strip_code_blocks("  [1,2]  "), "[1,2]");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "Maiduguri 北東";
        let truncated = truncate_to_char_boundary(text, 12);
        assert!(truncated.len() <= 12);
        assert!(text.starts_with(truncated));
        assert_eq!(truncate_to_char_boundary("short", 100), "short");
    }
}
