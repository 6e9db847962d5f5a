use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SubflowError};
use crate::subtitle::{format_srt_millis, SubtitleEntry};

/// Service-agnostic transcription segment, times in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

impl TranscriptSegment {
    /// Segment from second offsets, as emitted by openai-whisper
    pub fn from_seconds<S: Into<String>>(start: f64, end: f64, text: S) -> Self {
        Self {
            start_ms: seconds_to_millis(start),
            end_ms: seconds_to_millis(end),
            text: text.into(),
        }
    }
}

fn seconds_to_millis(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

/// Converts a service-specific transcription output into segments
pub trait TranscriptionMapper<T> {
    fn to_segments(service_result: T) -> Vec<TranscriptSegment>;
}

/// Turn segments into subtitle entries.
///
/// Segments whose text is blank are dropped and the remaining entries are
/// numbered from 1 in order. No segments left is a transcription failure.
pub fn segments_to_entries(segments: Vec<TranscriptSegment>) -> Result<Vec<SubtitleEntry>> {
    let entries: Vec<SubtitleEntry> = segments
        .into_iter()
        .filter(|segment| !segment.text.trim().is_empty())
        .enumerate()
        .map(|(i, segment)| {
            SubtitleEntry::new(
                (i + 1) as u32,
                format_srt_millis(segment.start_ms),
                format_srt_millis(segment.end_ms),
                segment.text.trim(),
            )
        })
        .collect();

    if entries.is_empty() {
        return Err(SubflowError::TranscriptionFailed(
            "No speech segments found in audio".to_string(),
        ));
    }

    debug!("Transcription produced {} entries", entries.len());
    Ok(entries)
}

/// Run a transcriber command, failing with its stderr on a non-zero exit
pub async fn run_transcriber_command(mut command: Command, binary_path: &str) -> Result<()> {
    debug!("Executing transcriber command: {:?}", command);

    let output = command
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| SubflowError::TranscriptionFailed(format!("Failed to execute {}: {}", binary_path, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SubflowError::TranscriptionFailed(format!(
            "{} failed: {}",
            binary_path,
            stderr.trim()
        )));
    }

    Ok(())
}

/// Read and parse the JSON file a transcriber wrote
pub async fn read_json_output<T: for<'de> Deserialize<'de>>(json_path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(json_path).await.map_err(|e| {
        SubflowError::TranscriptionFailed(format!(
            "Failed to read transcriber output {}: {}",
            json_path.display(),
            e
        ))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| SubflowError::TranscriptionFailed(format!("Failed to parse transcriber JSON: {}", e)))
}

/// File stem of the audio file, used to name transcriber output
pub fn audio_stem(audio_path: &Path) -> Result<String> {
    audio_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| SubflowError::TranscriptionFailed("Invalid audio filename".to_string()))
}

/// Fail early when the audio file is missing
pub fn ensure_audio_exists(audio_path: &Path) -> Result<PathBuf> {
    if audio_path.exists() {
        Ok(audio_path.to_path_buf())
    } else {
        Err(SubflowError::TranscriptionFailed(format!(
            "Audio file not found: {}",
            audio_path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_segments_dropped_and_renumbered() {
        let segments = vec![
            TranscriptSegment::from_seconds(0.0, 1.5, " Hello "),
            TranscriptSegment::from_seconds(1.5, 2.0, "   "),
            TranscriptSegment::from_seconds(2.0, 3.25, "World"),
        ];

        let entries = segments_to_entries(segments).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], SubtitleEntry::new(1, "00:00:00,000", "00:00:01,500", "Hello"));
        assert_eq!(entries[1], SubtitleEntry::new(2, "00:00:02,000", "00:00:03,250", "World"));
    }

    #[test]
    fn test_no_segments_is_failure() {
        let err = segments_to_entries(vec![TranscriptSegment::from_seconds(0.0, 1.0, "")]).unwrap_err();
        assert!(matches!(err, SubflowError::TranscriptionFailed(_)));
    }

    #[test]
    fn test_negative_offsets_clamp_to_zero() {
        let segment = TranscriptSegment::from_seconds(-0.2, 0.0016, "x");
        assert_eq!(segment.start_ms, 0);
        assert_eq!(segment.end_ms, 2);
    }

    #[test]
    fn test_missing_audio_is_transcription_failure() {
        let err = ensure_audio_exists(Path::new("/nonexistent/talk_audio.wav")).unwrap_err();
        assert!(matches!(err, SubflowError::TranscriptionFailed(_)));
        assert_eq!(
            err.to_string(),
            "Transcription failed: Audio file not found: /nonexistent/talk_audio.wav"
        );
    }

    #[test]
    fn test_audio_stem() {
        assert_eq!(audio_stem(Path::new("/tmp/talk_audio.wav")).unwrap(), "talk_audio");
    }
}
