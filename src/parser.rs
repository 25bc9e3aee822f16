//! Log line classification.
//!
//! Pure functions over single log lines: a line either yields a typed
//! [`Marker`] or nothing. Most lines yield nothing; that is the expected
//! case, not an error. URL markers are resolved through an ordered rules
//! table where the first matching rule wins, so rule order is part of the
//! contract.

use once_cell::sync::Lazy;
use regex::Regex;

/// Trace emitted when the client has created a network game.
pub const NEW_RAID_TRACE: &str = "TRACE-NetworkGameCreate 5";

/// Trace emitted while the client is matchmaking.
pub const MATCHING_TRACE: &str = "TRACE-NetworkGameMatching";

/// Backend endpoints the client is known to call, keyed by URL substring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlMarkerKind {
    /// Insurance cost listing, shown on the pre-raid insurance screen.
    Insurance,
    /// Group invite cancellation or stopping a group search.
    GroupCancel,
    /// Group status poll while waiting for group members.
    GroupStatus,
    /// Metrics upload or offline-match end, both mark the raid as over.
    RaidEnd,
    /// Full item sync, issued when the client lands back in the main menu.
    Items,
    /// Bot generation, only requested by offline (practice) raids.
    BotGenerate,
    /// Session keepalive, first seen shortly after a raid begins.
    Keepalive,
}

/// A classified signal extracted from one log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// The raid-create trace; the caller re-resolves the whole file for the
    /// descriptor line that follows it.
    NewRaidTrace,
    /// The matchmaking trace.
    SearchingTrace,
    Url(UrlMarkerKind),
}

/// Ordered URL substring rules; the first matching entry wins. Needles are
/// lower case because the extracted URL is case-normalized before matching.
const URL_RULES: &[(&str, UrlMarkerKind)] = &[
    ("insurance/items/list/cost", UrlMarkerKind::Insurance),
    ("match/group/invite/cancel-all", UrlMarkerKind::GroupCancel),
    ("match/group/looking/stop", UrlMarkerKind::GroupCancel),
    ("match/group/status", UrlMarkerKind::GroupStatus),
    ("client/putmetrics", UrlMarkerKind::RaidEnd),
    ("/match/offline/end", UrlMarkerKind::RaidEnd),
    ("client/items", UrlMarkerKind::Items),
    ("bot/generate", UrlMarkerKind::BotGenerate),
    ("game/keepalive", UrlMarkerKind::Keepalive),
];

#[allow(clippy::expect_used)]
static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)https?://(www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b[-a-zA-Z0-9()'@:%_+.~#?!&/=]*",
    )
    .expect("url pattern is valid")
});

/// First well-formed URL substring in `line`, if any.
pub fn extract_url(line: &str) -> Option<&str> {
    URL_REGEX.find(line).map(|m| m.as_str())
}

/// Classifies one log line into a [`Marker`].
///
/// Trace substrings are matched case-sensitively, mirroring the literal
/// markers the game emits. URL matching is case-insensitive.
pub fn classify_line(line: &str) -> Option<Marker> {
    if line.contains(NEW_RAID_TRACE) {
        return Some(Marker::NewRaidTrace);
    }
    if line.contains(MATCHING_TRACE) {
        return Some(Marker::SearchingTrace);
    }

    let url = extract_url(line)?.to_ascii_lowercase();
    URL_RULES
        .iter()
        .find(|(needle, _)| url.contains(needle))
        .map(|&(_, kind)| Marker::Url(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_trace_lines() {
        assert_eq!(
            classify_line("2024-08-28 12:00:01|Info|TRACE-NetworkGameCreate 5"),
            Some(Marker::NewRaidTrace)
        );
        assert_eq!(
            classify_line("2024-08-28 12:00:01|Info|TRACE-NetworkGameMatching"),
            Some(Marker::SearchingTrace)
        );
    }

    #[test]
    fn trace_match_is_case_sensitive() {
        assert_eq!(classify_line("trace-networkgamematching"), None);
    }

    #[test]
    fn classifies_known_urls() {
        let cases = [
            (
                "https://prod.escapefromtarkov.com/client/insurance/items/list/cost HTTP 200",
                UrlMarkerKind::Insurance,
            ),
            (
                "https://prod.escapefromtarkov.com/client/match/group/invite/cancel-all",
                UrlMarkerKind::GroupCancel,
            ),
            (
                "https://prod.escapefromtarkov.com/client/match/group/looking/stop",
                UrlMarkerKind::GroupCancel,
            ),
            (
                "https://prod.escapefromtarkov.com/client/match/group/status",
                UrlMarkerKind::GroupStatus,
            ),
            (
                "https://prod.escapefromtarkov.com/client/putMetrics",
                UrlMarkerKind::RaidEnd,
            ),
            (
                "https://prod.escapefromtarkov.com/client/match/offline/end",
                UrlMarkerKind::RaidEnd,
            ),
            (
                "https://prod.escapefromtarkov.com/client/items HTTP 200",
                UrlMarkerKind::Items,
            ),
            (
                "https://prod.escapefromtarkov.com/client/game/bot/generate",
                UrlMarkerKind::BotGenerate,
            ),
            (
                "https://prod.escapefromtarkov.com/client/game/keepalive",
                UrlMarkerKind::Keepalive,
            ),
        ];

        for (line, kind) in cases {
            assert_eq!(classify_line(line), Some(Marker::Url(kind)), "line: {line}");
        }
    }

    #[test]
    fn url_match_is_case_normalized() {
        assert_eq!(
            classify_line("HTTPS://Prod.EscapeFromTarkov.com/client/PutMetrics"),
            Some(Marker::Url(UrlMarkerKind::RaidEnd))
        );
    }

    #[test]
    fn line_without_url_or_trace_is_ignored() {
        assert_eq!(classify_line("plain log chatter, nothing of note"), None);
        assert_eq!(classify_line(""), None);
    }

    #[test]
    fn url_outside_rules_table_is_ignored() {
        assert_eq!(
            classify_line("https://prod.escapefromtarkov.com/client/ragfair/find"),
            None
        );
    }

    #[test]
    fn first_rule_wins_when_substrings_cooccur() {
        // A single URL containing two needles resolves to the earlier rule.
        let line = "https://prod.escapefromtarkov.com/client/items/match/group/status";
        assert_eq!(classify_line(line), Some(Marker::Url(UrlMarkerKind::GroupStatus)));
    }

    #[test]
    fn classification_is_pure() {
        let line = "https://prod.escapefromtarkov.com/client/game/keepalive";
        let first = classify_line(line);
        let second = classify_line(line);
        assert_eq!(first, second);
    }

    #[test]
    fn extracts_first_url_substring() {
        let line = "req https://a.example.com/one then https://b.example.com/two";
        assert_eq!(extract_url(line), Some("https://a.example.com/one"));
    }
}
