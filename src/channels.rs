use tracing::{info, warn};

use crate::metrics::{CHANNELS_PARSED, ORPHANED_ENTRIES};

pub const EXTINF_MARKER: &str = "#EXTINF:";
pub const DEFAULT_TIMESTAMP_MARKER: &str = "# Last forced update:";

/// One channel block of an M3U playlist.
///
/// `extinf_line` always starts with `#EXTINF:` and `stream_url` is never
/// empty or a comment. Metadata lines keep their source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEntry {
    pub extinf_line: String,
    pub metadata_lines: Vec<String>,
    pub stream_url: String,
}

#[derive(Debug, Default)]
pub struct ParsedPlaylist {
    pub entries: Vec<ChannelEntry>,
    /// `#EXTINF` lines that were dropped because no URL line followed them.
    pub orphaned: Vec<String>,
}

pub fn parse_playlist<S: AsRef<str>>(lines: &[S], source: &str) -> Vec<ChannelEntry> {
    parse_playlist_report(lines, source).entries
}

pub fn parse_playlist_report<S: AsRef<str>>(lines: &[S], source: &str) -> ParsedPlaylist {
    let mut parsed = ParsedPlaylist::default();
    let mut i = 0;

    while i < lines.len() {
        let line = line_at(lines, i);
        if !line.starts_with(EXTINF_MARKER) {
            i += 1;
            continue;
        }

        let extinf_line = line.to_string();
        let mut metadata_lines = Vec::new();
        i += 1;

        while i < lines.len() {
            let next = line_at(lines, i);
            if !next.starts_with('#') || next.starts_with(EXTINF_MARKER) {
                break;
            }
            metadata_lines.push(next.to_string());
            i += 1;
        }

        // The line failing this check is left for the outer loop.
        match (i < lines.len()).then(|| line_at(lines, i)) {
            Some(url) if !url.is_empty() && !url.starts_with('#') => {
                parsed.entries.push(ChannelEntry {
                    extinf_line,
                    metadata_lines,
                    stream_url: url.to_string(),
                });
                i += 1;
            }
            _ => {
                warn!("Skipping orphaned EXTINF in {}: {}", source, extinf_line);
                ORPHANED_ENTRIES.with_label_values(&[source]).inc();
                parsed.orphaned.push(extinf_line);
            }
        }
    }

    CHANNELS_PARSED
        .with_label_values(&[source])
        .inc_by(parsed.entries.len() as u64);
    info!("Parsed {} channels from {}", parsed.entries.len(), source);
    parsed
}

fn line_at<S: AsRef<str>>(lines: &[S], i: usize) -> &str {
    lines[i].as_ref().trim()
}

/// Returns the first line (trimmed) that starts with `marker`.
pub fn extract_timestamp<S: AsRef<str>>(lines: &[S], marker: &str) -> Option<String> {
    lines
        .iter()
        .map(|l| l.as_ref().trim())
        .find(|l| l.starts_with(marker))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_entry_with_metadata() {
        let lines = [
            "#EXTINF:-1 group-title=\"News\",Channel A",
            "#EXTVLCOPT:logo=x",
            "http://a",
        ];
        let entries = parse_playlist(&lines, "test");
        assert_eq!(
            entries,
            vec![ChannelEntry {
                extinf_line: "#EXTINF:-1 group-title=\"News\",Channel A".to_string(),
                metadata_lines: vec!["#EXTVLCOPT:logo=x".to_string()],
                stream_url: "http://a".to_string(),
            }]
        );
    }

    #[test]
    fn test_parse_m3u_with_header_and_vlcopt() {
        let data = r#"#EXTM3U
#EXTINF:0,3sat SD
#EXTVLCOPT:network-caching=1000
rtsp://192.168.178.1:554/?avm=1&freq=450&pids=0,16,17,18,20,200
#EXTINF:0,KiKA SD
#EXTVLCOPT:network-caching=1000
rtsp://192.168.178.1:554/?avm=1&freq=450&pids=0,16,17,18,20,300"#;
        let lines: Vec<&str> = data.lines().collect();

        let entries = parse_playlist(&lines, "fritzbox");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].extinf_line, "#EXTINF:0,3sat SD");
        assert!(entries[0].stream_url.starts_with("rtsp://"));
        assert_eq!(entries[1].extinf_line, "#EXTINF:0,KiKA SD");
    }

    #[test]
    fn test_orphan_at_end_of_input_is_reported() {
        let report = parse_playlist_report(&["#EXTINF:-1,Channel B"], "src");
        assert!(report.entries.is_empty());
        assert_eq!(report.orphaned, vec!["#EXTINF:-1,Channel B".to_string()]);
    }

    #[test]
    fn test_second_extinf_interrupts_first_entry() {
        let lines = [
            "#EXTINF:-1,First",
            "#EXTGRP:Sports",
            "#EXTINF:-1,Second",
            "http://second",
        ];
        let report = parse_playlist_report(&lines, "src");
        assert_eq!(report.orphaned, vec!["#EXTINF:-1,First".to_string()]);
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].extinf_line, "#EXTINF:-1,Second");
        assert!(report.entries[0].metadata_lines.is_empty());
        assert_eq!(report.entries[0].stream_url, "http://second");
    }

    #[test]
    fn test_blank_line_after_extinf_drops_entry() {
        let lines = ["#EXTINF:-1,Lost", "", "http://stray", "#EXTINF:-1,Kept", "http://kept"];
        let report = parse_playlist_report(&lines, "src");
        assert_eq!(report.orphaned.len(), 1);
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].stream_url, "http://kept");
    }

    #[test]
    fn test_lines_are_trimmed() {
        let lines = ["  #EXTINF:-1,Padded  ", "\t#EXTVLCOPT:a=b ", "  http://padded \r"];
        let entries = parse_playlist(&lines, "src");
        assert_eq!(entries[0].extinf_line, "#EXTINF:-1,Padded");
        assert_eq!(entries[0].metadata_lines, vec!["#EXTVLCOPT:a=b".to_string()]);
        assert_eq!(entries[0].stream_url, "http://padded");
    }

    #[test]
    fn test_every_entry_is_well_formed() {
        let lines = [
            "garbage",
            "#EXTINF:-1,A",
            "#",
            "#EXTINF:-1,B",
            "#KODIPROP:x",
            "http://b",
            "http://c",
            "#EXTINF:-1,D",
        ];
        let entries = parse_playlist(&lines, "src");
        assert_eq!(entries.len(), 1);
        for e in &entries {
            assert!(e.extinf_line.starts_with(EXTINF_MARKER));
            assert!(!e.stream_url.is_empty());
            assert!(!e.stream_url.starts_with('#'));
        }
    }

    #[test]
    fn test_extract_timestamp_first_match_wins() {
        let lines = [
            "#EXTM3U",
            "  # Last forced update: 2025-01-01 10:00  ",
            "# Last forced update: 2025-02-02 10:00",
        ];
        assert_eq!(
            extract_timestamp(&lines, DEFAULT_TIMESTAMP_MARKER).as_deref(),
            Some("# Last forced update: 2025-01-01 10:00")
        );
        assert_eq!(extract_timestamp(&["#EXTM3U"], DEFAULT_TIMESTAMP_MARKER), None);
    }
}
