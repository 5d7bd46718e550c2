//! UTF-8-safe output truncation.

/// Truncate `s` at the nearest char boundary at or before `max_bytes`.
#[must_use]
pub fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    s.get(..end).unwrap_or_default()
}

/// Cap command output, noting how much was dropped.
#[must_use]
pub fn cap_output(output: String, max_bytes: usize) -> String {
    if output.len() <= max_bytes {
        return output;
    }
    let kept = truncate_at_char_boundary(&output, max_bytes);
    format!(
        "{kept}\n... (output truncated: showing {} of {} bytes)",
        kept.len(),
        output.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_string_unchanged() {
        assert_eq!(truncate_at_char_boundary("hello", 200), "hello");
        assert_eq!(cap_output("hello".to_string(), 5), "hello");
    }

    #[test]
    fn multibyte_at_boundary() {
        let mut s = "x".repeat(198);
        s.push('🦀');
        assert_eq!(truncate_at_char_boundary(&s, 200), "x".repeat(198));
    }

    #[test]
    fn zero_budget() {
        assert_eq!(truncate_at_char_boundary("hello", 0), "");
    }

    #[test]
    fn cap_output_marks_truncation() {
        let capped = cap_output("a".repeat(50), 10);
        assert!(capped.starts_with(&"a".repeat(10)));
        assert!(capped.ends_with("(output truncated: showing 10 of 50 bytes)"));
    }
}
