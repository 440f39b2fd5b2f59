use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>?").expect("valid regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Deduplication identity for a title: lowercased, with every whitespace character removed.
pub fn normalize_key(title: &str) -> String {
    title
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Collapse runs of whitespace into a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    WS_RE.replace_all(text.trim(), " ").into_owned()
}

/// Strip embedded markup from a feed snippet, returning plain text.
///
/// Handles the handful of entities news snippets actually carry after the
/// XML layer has already unescaped the outer document.
pub fn strip_markup(html: &str) -> String {
    let without_tags = TAG_RE.replace_all(html, "");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    collapse_whitespace(&decoded)
}
