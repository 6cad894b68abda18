//! The advertisement filter: URL-ish patterns, `t.me/` links, and
//! configured keyword matching. Deterministic, no natural-language anything.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::Classification;

/// Matches `http(s)://` links, `www.` hosts, `t.me/` links, and bare
/// domain-looking tokens. The last alternative is very broad on purpose and
/// also catches things like "file.txt"; that false positive is part of the
/// filter's contract, not an accident to fix here.
static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(https?://\S+)|(www\.\S+)|(t\.me/\S+)|(\S+\.[a-z]{2,})")
        .expect("Regex will always be valid")
});

pub fn contains_url(text: &str) -> bool {
    URL_REGEX.is_match(text)
}

pub fn contains_platform_link(text: &str) -> bool {
    text.to_lowercase().contains("t.me/")
}

/// Classify a message's text. Case-insensitive throughout.
///
/// Link checks run first; keyword matching is skipped entirely when either
/// of them hits. Keywords are tried in configured order and the first match
/// wins.
pub fn classify(text: &str, banned_keywords: &[&str]) -> Classification {
    if contains_platform_link(text) {
        return Classification::ContainsPlatformLink;
    }
    if contains_url(text) {
        return Classification::ContainsUrl;
    }

    let lowered = text.to_lowercase();
    for keyword in banned_keywords {
        if keyword.is_empty() {
            continue;
        }
        if lowered.contains(&keyword.to_lowercase()) {
            return Classification::ContainsBannedKeyword((*keyword).to_string());
        }
    }

    Classification::Clean
}
