//! Raid descriptor resolution.
//!
//! When a raid starts, the trace log gains a `NetworkGameCreate
//! profileStatus` line carrying the raid's mode, map and server. A log can
//! hold many historical create lines; only the most recent one describes the
//! raid in progress.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Marker on the profile status dump logged for a created game.
const RAID_CREATE_MARKER: &str = "TRACE-NetworkGameCreate profileStatus";

#[allow(clippy::expect_used)]
static RAID_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"'Profileid: (?P<profile_id>.*?), Status: (?P<status>.*?), RaidMode: (?P<raid_mode>.*?), Ip: (?P<ip>.*?), Port: (?P<port>.*?), Location: (?P<location>.*?), Sid: (?P<sid>.*?), GameMode: (?P<game_mode>.*?), shortId: (?P<raid_id>.*?)'",
    )
    .expect("raid line pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RaidMode {
    Online,
    Offline,
}

/// Structured raid metadata parsed from a creation trace line.
///
/// Immutable once produced; the phase that embeds it drops it when the
/// session moves on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RaidDescriptor {
    pub mode: RaidMode,
    /// Map id, lower-cased; downstream map lookups are case-insensitive.
    pub location: String,
    pub server_address: String,
    pub raid_id: String,
}

impl RaidDescriptor {
    /// Placeholder descriptor for offline practice raids, which announce
    /// themselves through bot generation rather than a create trace.
    pub fn offline() -> Self {
        Self {
            mode: RaidMode::Offline,
            location: String::new(),
            server_address: String::new(),
            raid_id: String::new(),
        }
    }
}

/// Finds the most recent raid-create line in `contents` and parses it.
///
/// Scans from the end so that the latest raid wins. Returns `None` when no
/// create line exists or its fields are unusable; the caller must treat that
/// as a skip, not an error.
pub fn resolve_latest_raid(contents: &str) -> Option<RaidDescriptor> {
    let line = contents
        .lines()
        .rev()
        .find(|line| line.contains(RAID_CREATE_MARKER))?;
    parse_raid_line(line)
}

fn parse_raid_line(line: &str) -> Option<RaidDescriptor> {
    let caps = RAID_LINE_REGEX.captures(line)?;

    let mode = match caps.name("raid_mode")?.as_str() {
        "Online" => RaidMode::Online,
        "Offline" => RaidMode::Offline,
        _ => return None,
    };

    let location = caps.name("location")?.as_str();
    let server_address = caps.name("ip")?.as_str();
    if location.is_empty() || server_address.is_empty() {
        return None;
    }

    Some(RaidDescriptor {
        mode,
        location: location.to_lowercase(),
        server_address: server_address.to_string(),
        raid_id: caps
            .name("raid_id")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_line(location: &str, ip: &str) -> String {
        format!(
            "2024-08-28 12:00:01|Info|TRACE-NetworkGameCreate profileStatus: \
             'Profileid: p1, Status: ok, RaidMode: Online, Ip: {ip}, Port: 9999, \
             Location: {location}, Sid: s, GameMode: pvp, shortId: abcd'"
        )
    }

    #[test]
    fn parses_descriptor_fields() {
        let contents = create_line("Woods", "1.2.3.4");
        let descriptor = resolve_latest_raid(&contents).unwrap();

        assert_eq!(descriptor.mode, RaidMode::Online);
        assert_eq!(descriptor.location, "woods");
        assert_eq!(descriptor.server_address, "1.2.3.4");
        assert_eq!(descriptor.raid_id, "abcd");
    }

    #[test]
    fn most_recent_create_line_wins() {
        let contents = format!(
            "{}\nsome chatter in between\n{}\ntrailing chatter",
            create_line("Woods", "1.2.3.4"),
            create_line("Shoreline", "5.6.7.8"),
        );
        let descriptor = resolve_latest_raid(&contents).unwrap();

        assert_eq!(descriptor.location, "shoreline");
        assert_eq!(descriptor.server_address, "5.6.7.8");
    }

    #[test]
    fn offline_mode_is_accepted() {
        let contents =
            "TRACE-NetworkGameCreate profileStatus: 'Profileid: p1, Status: ok, \
             RaidMode: Offline, Ip: 127.0.0.1, Port: 0, Location: factory4_day, Sid: s, \
             GameMode: pve, shortId: x'";
        let descriptor = resolve_latest_raid(contents).unwrap();
        assert_eq!(descriptor.mode, RaidMode::Offline);
        assert_eq!(descriptor.location, "factory4_day");
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let contents =
            "TRACE-NetworkGameCreate profileStatus: 'Profileid: p1, Status: ok, \
             RaidMode: Weird, Ip: 1.2.3.4, Port: 0, Location: woods, Sid: s, \
             GameMode: pvp, shortId: x'";
        assert_eq!(resolve_latest_raid(contents), None);
    }

    #[test]
    fn missing_fields_are_rejected() {
        let contents =
            "TRACE-NetworkGameCreate profileStatus: 'Profileid: p1, Status: ok, \
             RaidMode: Online, Ip: , Port: 0, Location: woods, Sid: s, \
             GameMode: pvp, shortId: x'";
        assert_eq!(resolve_latest_raid(contents), None);
    }

    #[test]
    fn file_without_create_line_resolves_to_none() {
        assert_eq!(resolve_latest_raid("just\nsome\nlines"), None);
    }
}
