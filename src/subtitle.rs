use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{Result, SrtfixError};

static BLOCK_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("block separator pattern is valid"));

static TIMING_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2}:\d{2}:\d{2},\d{3})\s*-->\s*(\d{2}:\d{2}:\d{2},\d{3})")
        .expect("timing line pattern is valid")
});

/// One caption block of an SRT document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    pub id: u32,
    /// `HH:MM:SS,mmm`
    pub start_time: String,
    /// `HH:MM:SS,mmm`
    pub end_time: String,
    /// Caption text, lines separated by `\n`
    pub text: String,
}

impl SubtitleEntry {
    pub fn start_seconds(&self) -> f64 {
        timestamp_to_seconds(&self.start_time)
    }

    pub fn end_seconds(&self) -> f64 {
        timestamp_to_seconds(&self.end_time)
    }
}

/// Parse SRT text into entries, dropping malformed blocks.
///
/// An empty result means nothing could be parsed; callers decide whether that
/// is an error.
pub fn parse_srt(raw: &str) -> Vec<SubtitleEntry> {
    let normalized = raw.trim_start_matches('\u{FEFF}').replace("\r\n", "\n");
    let content = normalized.trim();
    if content.is_empty() {
        return Vec::new();
    }

    let mut entries: Vec<SubtitleEntry> = Vec::new();
    for (block_idx, block) in BLOCK_SEPARATOR.split(content).enumerate() {
        match parse_block(block) {
            Ok(entry) => {
                if entries.iter().any(|e| e.id == entry.id) {
                    warn!("Duplicate subtitle id {} in block #{}, only the first is addressable", entry.id, block_idx + 1);
                }
                entries.push(entry);
            }
            Err(reason) => warn!("Skipping malformed SRT block #{}: {} ({:?})", block_idx + 1, reason, block),
        }
    }

    debug!("Parsed {} subtitle entries", entries.len());
    entries
}

fn parse_block(block: &str) -> std::result::Result<SubtitleEntry, &'static str> {
    let lines: Vec<&str> = block.split('\n').collect();
    if lines.len() < 3 {
        return Err("fewer than three lines");
    }

    let id = lines[0]
        .trim()
        .parse::<u32>()
        .map_err(|_| "index is not an integer")?;

    let caps = TIMING_LINE
        .captures(lines[1])
        .ok_or("timing line does not match HH:MM:SS,mmm --> HH:MM:SS,mmm")?;

    let text = lines[2..].join("\n");
    if text.is_empty() {
        return Err("empty text");
    }

    Ok(SubtitleEntry {
        id,
        start_time: caps[1].to_string(),
        end_time: caps[2].to_string(),
        text,
    })
}

/// Make caption text safe to serialize as a single block.
///
/// Blank and whitespace-only lines would read back as a block separator, so
/// they are dropped along with trailing whitespace on each line.
pub fn normalize_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .split('\n')
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render entries as SRT text: blocks separated by one blank line, no trailing blank line
pub fn to_srt_string(entries: &[SubtitleEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("{}\n{} --> {}\n{}", entry.id, entry.start_time, entry.end_time, entry.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Read an SRT file from disk as text
pub async fn read_srt_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SrtfixError::FileNotFound(path.display().to_string()));
    }

    info!("Reading SRT file: {}", path.display());
    let content = fs::read_to_string(path).await?;
    Ok(content)
}

/// Write entries to an SRT file
pub async fn write_srt<P: AsRef<Path>>(entries: &[SubtitleEntry], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Writing {} subtitle entries to {}", entries.len(), output_path.display());

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    fs::write(output_path, to_srt_string(entries)).await?;

    info!("SRT file written successfully");
    Ok(())
}

/// Convert `HH:MM:SS,mmm` to seconds. Anything malformed yields 0.
pub fn timestamp_to_seconds(time: &str) -> f64 {
    let parts: Vec<&str> = time.split([':', ',']).collect();
    if parts.len() != 4 {
        return 0.0;
    }

    let mut values = [0u64; 4];
    for (slot, part) in values.iter_mut().zip(&parts) {
        match part.trim().parse::<u64>() {
            Ok(v) => *slot = v,
            Err(_) => return 0.0,
        }
    }

    let [hours, minutes, seconds, millis] = values;
    let whole = hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .and_then(|hm| hm.checked_add(seconds));
    match whole {
        Some(whole) => whole as f64 + millis as f64 / 1000.0,
        None => 0.0,
    }
}

/// Format time in seconds to SRT time format (HH:MM:SS,mmm)
pub fn format_timestamp(seconds: f64) -> String {
    let total_milliseconds = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_BLOCKS: &str = "1\n00:00:01,000 --> 00:00:02,000\nHello wrold\n\n2\n00:00:03,000 --> 00:00:04,000\nGoodbye";

    #[test]
    fn test_parse_two_blocks() {
        let entries = parse_srt(TWO_BLOCKS);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 1);
        assert_eq!(entries[0].start_time, "00:00:01,000");
        assert_eq!(entries[0].end_time, "00:00:02,000");
        assert_eq!(entries[0].text, "Hello wrold");
        assert_eq!(entries[1].text, "Goodbye");
    }

    #[test]
    fn test_serialize_matches_source() {
        let entries = parse_srt(TWO_BLOCKS);
        assert_eq!(to_srt_string(&entries), TWO_BLOCKS);
    }

    #[test]
    fn test_multiline_text_preserved() {
        let raw = "7\n00:01:00,000 --> 00:01:02,500\nfirst line\nsecond line\n";
        let entries = parse_srt(raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "first line\nsecond line");

        let reparsed = parse_srt(&to_srt_string(&entries));
        assert_eq!(reparsed, entries);
    }

    #[test]
    fn test_malformed_blocks_skipped() {
        let raw = "x\n00:00:01,000 --> 00:00:02,000\nbad index\n\n\
                   2\n00:00:03,000 --> 00:00:04,000\ngood\n\n\
                   3\n0:0:5,0 --> 0:0:6,0\nbad timing\n\n\
                   4\n00:00:07,000 --> 00:00:08,000";
        let entries = parse_srt(raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, 2);
        assert_eq!(entries[0].text, "good");
    }

    #[test]
    fn test_empty_and_garbage_input() {
        assert!(parse_srt("").is_empty());
        assert!(parse_srt("   \n\n  ").is_empty());
        assert!(parse_srt("garbage").is_empty());
    }

    #[test]
    fn test_tolerant_separators_and_arrow_spacing() {
        let raw = "1\r\n00:00:01,000-->00:00:02,000\r\none\r\n \r\n\r\n2\n00:00:03,000   -->   00:00:04,000\ntwo\n\n\n";
        let entries = parse_srt(raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "one");
        assert_eq!(entries[1].start_time, "00:00:03,000");
        assert_eq!(
            to_srt_string(&entries),
            "1\n00:00:01,000 --> 00:00:02,000\none\n\n2\n00:00:03,000 --> 00:00:04,000\ntwo"
        );
    }

    #[test]
    fn test_source_order_kept() {
        let raw = "5\n00:00:09,000 --> 00:00:10,000\nlate\n\n1\n00:00:01,000 --> 00:00:02,000\nearly";
        let ids: Vec<u32> = parse_srt(raw).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![5, 1]);
    }

    #[test]
    fn test_timestamp_to_seconds() {
        assert_eq!(timestamp_to_seconds("00:00:00,000"), 0.0);
        assert!((timestamp_to_seconds("01:01:01,500") - 3661.5).abs() < 1e-9);
        assert_eq!(timestamp_to_seconds("01:01:01"), 0.0);
        assert_eq!(timestamp_to_seconds("aa:bb:cc,ddd"), 0.0);
    }

    #[test]
    fn test_timestamp_overflow_yields_zero() {
        assert_eq!(timestamp_to_seconds("9999999999999999:00:00,000"), 0.0);
        assert_eq!(timestamp_to_seconds("00:99999999999999999:00,000"), 0.0);
    }

    #[test]
    fn test_leading_bom_stripped() {
        let entries = parse_srt(&format!("\u{FEFF}{}", TWO_BLOCKS));
        let ids: Vec<u32> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(to_srt_string(&entries), TWO_BLOCKS);

        let single = parse_srt("\u{FEFF}1\r\n00:00:01,000 --> 00:00:02,000\r\nonly one\r\n");
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].text, "only one");
    }

    #[test]
    fn test_normalize_text_drops_blank_lines() {
        assert_eq!(normalize_text("line one\n\nline two"), "line one\nline two");
        assert_eq!(normalize_text("a  \r\n \t \r\nb"), "a\nb");
        assert_eq!(normalize_text(" \n\n "), "");
        assert_eq!(normalize_text("  indented"), "  indented");
    }

    #[test]
    fn test_duplicate_ids_kept_in_order() {
        let raw = "1\n00:00:01,000 --> 00:00:02,000\nfirst\n\n1\n00:00:03,000 --> 00:00:04,000\nsecond";
        let entries = parse_srt(raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "first");
        assert_eq!(entries[1].text, "second");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_timestamp(65.123), "00:01:05,123");
        assert_eq!(format_timestamp(3661.500), "01:01:01,500");
    }

    #[tokio::test]
    async fn test_write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("corrected_a.srt");
        let entries = parse_srt(TWO_BLOCKS);

        write_srt(&entries, &path).await.unwrap();
        let raw = read_srt_file(&path).await.unwrap();
        assert_eq!(raw, TWO_BLOCKS);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let err = read_srt_file("/definitely/not/here.srt").await.unwrap_err();
        assert!(matches!(err, SrtfixError::FileNotFound(_)));
    }
}
