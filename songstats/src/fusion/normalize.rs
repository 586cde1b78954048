//! String normalization for identity matching

/// Normalize an artist or title for comparison
///
/// - case-folds
/// - drops parenthesized and bracketed groups (`(Live)`, `[Remastered]`)
/// - spells `&` as `and`, drops apostrophes
/// - turns other punctuation into spaces and collapses whitespace
///
/// A string that consists only of a parenthesized group keeps its content,
/// so `"(Untitled)"` normalizes to `"untitled"` rather than to nothing.
/// Punctuation-only titles such as `"?"` fall back to the trimmed,
/// lowercased input.
pub fn normalize(s: &str) -> String {
    let stripped = fold(s, true);
    if !stripped.is_empty() {
        return stripped;
    }
    let unstripped = fold(s, false);
    if !unstripped.is_empty() {
        return unstripped;
    }
    s.trim().to_lowercase()
}

fn fold(s: &str, strip_groups: bool) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;

    for ch in s.chars() {
        match ch {
            '(' | '[' | '{' if strip_groups => depth += 1,
            ')' | ']' | '}' if strip_groups => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            '&' => out.push_str(" and "),
            '\'' | '\u{2019}' | '`' => {}
            c if c.is_alphanumeric() => out.extend(c.to_lowercase()),
            _ => out.push(' '),
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace tokens of an already-normalized string
pub fn tokens(normalized: &str) -> Vec<&str> {
    normalized.split(' ').filter(|t| !t.is_empty()).collect()
}

/// Whether `needle`'s token sequence appears contiguously in `haystack`
pub fn contains_tokens(haystack: &str, needle: &str) -> bool {
    let hay = tokens(haystack);
    let needle = tokens(needle);
    if needle.is_empty() || needle.len() > hay.len() {
        return false;
    }
    hay.windows(needle.len()).any(|w| w == needle.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize("Island In The Sun"), "island in the sun");
        assert_eq!(normalize("  Island   In  The Sun  "), "island in the sun");
    }

    #[test]
    fn test_normalize_strips_parenthetical_suffixes() {
        assert_eq!(normalize("Island In The Sun (Live)"), "island in the sun");
        assert_eq!(normalize("Buddy Holly [Remastered 2004]"), "buddy holly");
    }

    #[test]
    fn test_normalize_punctuation() {
        assert_eq!(normalize("Guns N' Roses"), "guns n roses");
        assert_eq!(normalize("Simon & Garfunkel"), "simon and garfunkel");
        assert_eq!(normalize("Don’t Stop Me Now!"), "dont stop me now");
        assert_eq!(normalize("AC/DC"), "ac dc");
    }

    #[test]
    fn test_normalize_keeps_unicode_letters() {
        assert_eq!(normalize("Sigur Rós"), "sigur rós");
        assert_eq!(normalize("BEYONCÉ"), "beyoncé");
    }

    #[test]
    fn test_normalize_only_group() {
        assert_eq!(normalize("(Untitled)"), "untitled");
    }

    #[test]
    fn test_normalize_punctuation_only_title() {
        assert_eq!(normalize("?"), "?");
        assert_eq!(normalize(" ... "), "...");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_contains_tokens_respects_word_boundaries() {
        assert!(contains_tokens("island in the sun remastered", "island in the sun"));
        assert!(!contains_tokens("island in the sun", "land in"));
        assert!(!contains_tokens("sun", "island in the sun"));
        assert!(!contains_tokens("anything", ""));
    }
}
