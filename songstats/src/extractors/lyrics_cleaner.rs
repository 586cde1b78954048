//! Lyrics cleaning
//!
//! Scraped lyrics pages carry section tags, contributor counters, share
//! widgets and ticket promos around the actual text. [`clean_lyrics`] strips
//! them with a fixed sequence of rules:
//!
//! 1. Drop a leading metadata header ending in a `---` separator
//! 2. Drop page banners ahead of the first lyric line, and boilerplate lines
//!    anywhere
//! 3. Remove inline annotations from the remaining lines
//! 4. Collapse runs of blank lines and trim
//!
//! Rules are pure string transforms; the same input always yields the same
//! output.

use once_cell::sync::Lazy;
use regex::Regex;

/// Separator between a page's metadata header and the lyrics
const HEADER_SEPARATOR: &str = "---";

/// A header is only dropped when at least this much text follows it
const MIN_BODY_AFTER_HEADER: usize = 100;

/// Page banners, only dropped before the first lyric line
static LEADING_BANNERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Contributor counters: "12 Contributors", "1 ContributorTranslations"
        r"^\d+\s*Contributors?",
        // Translation / romanization banners
        r"(?i)^(genius\s+)?(translations?|romanizations?)$",
        // Page headers: "Island In The Sun Lyrics"
        r"^.+\sLyrics$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid regex"))
    .collect()
});

/// Lines dropped entirely
static DROPPED_LINES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Section tags: [Chorus], [Verse 1: Rivers Cuomo]
        r"^\[[^\]]*\]$",
        // Share widgets
        r"^(\d*Embed|EmbedShare URLCopyEmbedCopy|Share URL|Copy)$",
        r"^You might also like$",
        // Ticket promos
        r"^See .+ Live$",
        r"^Get tickets as low as",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid regex"))
    .collect()
});

/// Widget text glued to the end of a lyric line
static TRAILING_EMBED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d*Embed(Share URLCopyEmbedCopy)?|You might also like)$").expect("valid regex")
});

/// Inline `[...]` annotations
static INLINE_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").expect("valid regex"));

/// Parenthesized background vocals
static INLINE_PARENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").expect("valid regex"));

static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Clean scraped lyrics
///
/// ```
/// use songstats::extractors::lyrics_cleaner::clean_lyrics;
///
/// let raw = "[Chorus]\nLa la la\n[Chorus]\nLa la la\nEmbedShare URLCopyEmbedCopy";
/// assert_eq!(clean_lyrics(raw), "La la la\nLa la la");
/// ```
pub fn clean_lyrics(raw: &str) -> String {
    let body = strip_header(raw);

    let mut kept: Vec<String> = Vec::new();
    let mut in_lyrics = false;
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            kept.push(String::new());
            continue;
        }
        if !in_lyrics && LEADING_BANNERS.iter().any(|re| re.is_match(trimmed)) {
            continue;
        }
        if DROPPED_LINES.iter().any(|re| re.is_match(trimmed)) {
            continue;
        }

        let rewritten = rewrite_line(trimmed);
        // A line that held only annotations is dropped, not left blank
        if !rewritten.is_empty() {
            kept.push(rewritten);
            in_lyrics = true;
        }
    }

    let joined = kept.join("\n");
    BLANK_RUNS.replace_all(&joined, "\n\n").trim().to_string()
}

fn strip_header(raw: &str) -> &str {
    match raw.find(HEADER_SEPARATOR) {
        Some(pos) => {
            let rest = &raw[pos + HEADER_SEPARATOR.len()..];
            if rest.chars().count() > MIN_BODY_AFTER_HEADER {
                rest
            } else {
                raw
            }
        }
        None => raw,
    }
}

fn rewrite_line(line: &str) -> String {
    let line = TRAILING_EMBED.replace(line, "");
    let line = INLINE_BRACKETS.replace_all(&line, "");
    let line = INLINE_PARENS.replace_all(&line, "");
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}
