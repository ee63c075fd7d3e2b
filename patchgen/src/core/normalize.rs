//! Text normalization shared by the extractor and synthesizer.

/// Convert CRLF and lone CR line endings to LF.
pub fn normalize_line_endings(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Strip trailing empty lines and end with exactly one newline.
///
/// Whitespace-only lines are kept: in a diff body they are blank context
/// lines. Empty input stays empty.
pub fn ensure_trailing_newline(text: &str) -> String {
    let trimmed = text.trim_end_matches('\n');
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{trimmed}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_crlf_and_cr() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn trailing_newline_is_exactly_one() {
        assert_eq!(ensure_trailing_newline("a\nb"), "a\nb\n");
        assert_eq!(ensure_trailing_newline("a\n\n\n"), "a\n");
        assert_eq!(ensure_trailing_newline(" \n"), " \n");
        assert_eq!(ensure_trailing_newline("\n\n"), "");
    }
}
