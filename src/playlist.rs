use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::channels::ChannelEntry;

pub const DEFAULT_GROUP: &str = "Other";
pub const GROUP_HEADER_PREFIX: &str = "#EXTGRP:";

lazy_static! {
    static ref RE_GROUP_TITLE: Regex = Regex::new(r#"group-title="([^"]+)""#).unwrap();
    static ref RE_ANY_GROUP_TITLE: Regex = Regex::new(r#"group-title="[^"]*""#).unwrap();
    static ref RE_DISPLAY_NAME: Regex = Regex::new(r",([^,]+)$").unwrap();
}

/// How fetched sources are combined into the output document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Parse every source, sort by group and name, emit `#EXTGRP` sections.
    #[default]
    Grouped,
    /// Append raw source lines one after another with `group-title` removed.
    Concatenated,
}

/// Raw lines of one source that was fetched successfully.
#[derive(Debug, Clone)]
pub struct FetchedSource {
    pub url: String,
    pub lines: Vec<String>,
}

pub fn group_title(entry: &ChannelEntry) -> &str {
    RE_GROUP_TITLE
        .captures(&entry.extinf_line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(DEFAULT_GROUP)
}

pub fn display_name(entry: &ChannelEntry) -> &str {
    RE_DISPLAY_NAME
        .captures(&entry.extinf_line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or("")
}

/// Renders the grouped document: header, optional provenance line, then one
/// `#EXTGRP` section per group in case-insensitive (group, name) order.
/// Entries with equal keys keep their input order.
pub fn serialize_grouped(
    entries: &[ChannelEntry],
    timestamp: Option<&str>,
    epg_url: &str,
) -> String {
    let mut sorted: Vec<&ChannelEntry> = entries.iter().collect();
    sorted.sort_by_cached_key(|e| {
        (
            group_title(e).to_lowercase(),
            display_name(e).to_lowercase(),
        )
    });

    let mut lines = vec![format!("#EXTM3U url-tvg=\"{}\"", epg_url)];
    if let Some(ts) = timestamp {
        lines.push(ts.to_string());
    }
    lines.push(String::new());

    let mut current_group: Option<&str> = None;
    for entry in sorted {
        let group = group_title(entry);
        if current_group != Some(group) {
            if current_group.is_some() {
                lines.push(String::new());
            }
            lines.push(format!("{}{}", GROUP_HEADER_PREFIX, group));
            current_group = Some(group);
        }

        lines.push(entry.extinf_line.clone());
        lines.extend(entry.metadata_lines.iter().cloned());
        lines.push(entry.stream_url.clone());
    }

    if lines.last().is_some_and(|l| !l.is_empty()) {
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Renders the concatenated document: every source's lines in fetch order,
/// each block introduced by a source comment. No parsing or sorting.
pub fn serialize_concatenated(
    sources: &[FetchedSource],
    epg_url: &str,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("#EXTM3U x-tvg-url=\"{}\"\n\n", epg_url));
    out.push_str(&format!(
        "# Generated on {} UTC\n\n",
        generated_at.format("%Y-%m-%dT%H:%M:%S%.6f")
    ));

    for source in sources {
        out.push_str(&format!("# 📺 Source: {}\n", source.url));
        for line in source.lines.iter().filter(|l| !l.starts_with("#EXTM3U")) {
            out.push_str(&strip_group_title(line));
            out.push('\n');
        }
        out.push('\n');
    }

    out
}

pub fn strip_group_title(line: &str) -> std::borrow::Cow<'_, str> {
    RE_ANY_GROUP_TITLE.replace_all(line, "")
}
