use std::path::Path;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::error::{Result, SubflowError};

/// One timestamped unit of subtitle text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    pub index: u32,
    /// `HH:MM:SS,mmm`
    pub start_time: String,
    /// `HH:MM:SS,mmm`
    pub end_time: String,
    pub text: String,
}

impl SubtitleEntry {
    pub fn new<S1, S2, S3>(index: u32, start_time: S1, end_time: S2, text: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            index,
            start_time: start_time.into(),
            end_time: end_time.into(),
            text: text.into(),
        }
    }

    /// Copy of this entry with replaced text; index and timestamps are kept
    pub fn with_text<S: Into<String>>(&self, text: S) -> Self {
        Self {
            index: self.index,
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            text: text.into(),
        }
    }
}

/// Render entries as SRT text
pub fn to_srt_string(entries: &[SubtitleEntry]) -> String {
    let mut srt_content = String::new();

    for entry in entries {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            entry.index,
            entry.start_time,
            entry.end_time,
            entry.text.trim()
        ));
    }

    srt_content
}

/// Generate SRT subtitle file from subtitle entries
pub async fn generate_srt<P: AsRef<Path>>(entries: &[SubtitleEntry], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating SRT file: {}", output_path.display());

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    fs::write(output_path, to_srt_string(entries)).await?;

    info!("SRT file generated successfully ({} entries)", entries.len());
    Ok(())
}

/// Parse SRT text into subtitle entries
pub fn parse_srt(content: &str) -> Result<Vec<SubtitleEntry>> {
    let content = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let mut entries = Vec::new();

    for block in content.split("\n\n") {
        let mut lines = block.lines().skip_while(|line| line.trim().is_empty());

        let Some(index_line) = lines.next() else {
            continue;
        };
        let index: u32 = index_line.trim().parse().map_err(|_| {
            SubflowError::SubtitleParse(format!("Invalid subtitle index: {}", index_line))
        })?;

        let timing_line = lines.next().ok_or_else(|| {
            SubflowError::SubtitleParse(format!("Missing timing line for entry {}", index))
        })?;
        let (start_time, end_time) = timing_line.split_once("-->").ok_or_else(|| {
            SubflowError::SubtitleParse(format!("Invalid timing line: {}", timing_line))
        })?;
        let start_time = start_time.trim();
        let end_time = end_time.trim();
        parse_srt_time(start_time)?;
        parse_srt_time(end_time)?;

        let text = lines.collect::<Vec<_>>().join("\n");
        entries.push(SubtitleEntry::new(index, start_time, end_time, text));
    }

    Ok(entries)
}

/// Read and parse an SRT file
pub async fn read_srt<P: AsRef<Path>>(path: P) -> Result<Vec<SubtitleEntry>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SubflowError::FileNotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path).await?;
    parse_srt(&content)
}

/// Format a millisecond offset to SRT time format (HH:MM:SS,mmm)
pub fn format_srt_millis(total_milliseconds: u64) -> String {
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Parse `HH:MM:SS,mmm` into milliseconds
pub fn parse_srt_time(timestamp: &str) -> Result<u64> {
    let invalid = || SubflowError::SubtitleParse(format!("Invalid timestamp: {}", timestamp));

    let (clock, millis) = timestamp.trim().split_once(',').ok_or_else(invalid)?;
    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() != 3 || millis.len() != 3 {
        return Err(invalid());
    }

    let hours: u64 = parts[0].parse().map_err(|_| invalid())?;
    let minutes: u64 = parts[1].parse().map_err(|_| invalid())?;
    let secs: u64 = parts[2].parse().map_err(|_| invalid())?;
    let millis: u64 = millis.parse().map_err(|_| invalid())?;
    if minutes >= 60 || secs >= 60 {
        return Err(invalid());
    }

    hours
        .checked_mul(3_600_000)
        .and_then(|total| total.checked_add(minutes * 60_000 + secs * 1_000 + millis))
        .ok_or_else(invalid)
}
