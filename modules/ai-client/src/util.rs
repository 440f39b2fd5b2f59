/// Truncate a string to at most `max_bytes` bytes at a character boundary.
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
    fn truncates_at_char_boundary() {
        let text = "トレンド速報";
        let truncated = truncate_to_char_boundary(text, 7);
        assert_eq!(truncated, "トレ");
    }

    #[test]
    fn short_input_is_untouched() {
        assert_eq!(truncate_to_char_boundary("trend", 100), "trend");
    }
}
