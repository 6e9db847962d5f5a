use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::process::Command;
use tracing::info;

use crate::config::TranscriberConfig;
use crate::error::{Result, SubflowError};
use crate::subtitle::SubtitleEntry;
use super::Transcriber;
use super::common::{
    audio_stem, ensure_audio_exists, read_json_output, run_transcriber_command, segments_to_entries,
    TranscriptSegment, TranscriptionMapper,
};

/// whisper-cli `-oj` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppOutput {
    pub transcription: Vec<WhisperCppSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppSegment {
    pub offsets: WhisperCppOffsets,
    pub text: String,
}

/// Segment boundaries in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppOffsets {
    pub from: u64,
    pub to: u64,
}

pub struct WhisperCppMapper;

impl TranscriptionMapper<WhisperCppOutput> for WhisperCppMapper {
    fn to_segments(output: WhisperCppOutput) -> Vec<TranscriptSegment> {
        output
            .transcription
            .into_iter()
            .map(|seg| TranscriptSegment {
                start_ms: seg.offsets.from,
                end_ms: seg.offsets.to,
                text: seg.text,
            })
            .collect()
    }
}

/// whisper.cpp command line transcriber
pub struct WhisperCppTranscriber {
    config: TranscriberConfig,
}

impl WhisperCppTranscriber {
    pub fn new(config: TranscriberConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Transcriber for WhisperCppTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<SubtitleEntry>> {
        let audio_path = ensure_audio_exists(audio_path)?;
        info!("Transcribing {} with whisper.cpp", audio_path.display());

        let temp_dir = tempfile::tempdir()
            .map_err(|e| SubflowError::TranscriptionFailed(format!("Failed to create temp directory: {}", e)))?;
        let stem = audio_stem(&audio_path)?;
        let output_base = temp_dir.path().join(&stem);

        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg("-m")
            .arg(&self.config.model)
            .arg("-f")
            .arg(&audio_path)
            .arg("-oj")
            .arg("-of")
            .arg(&output_base);

        if let Some(language) = &self.config.language {
            cmd.arg("-l").arg(language);
        }

        run_transcriber_command(cmd, &self.config.binary_path).await?;

        let output: WhisperCppOutput = read_json_output(&temp_dir.path().join(format!("{}.json", stem))).await?;
        let entries = segments_to_entries(WhisperCppMapper::to_segments(output))?;

        info!("Transcribed {} segments", entries.len());
        Ok(entries)
    }

    async fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.config.binary_path)
            .arg("--help")
            .output()
            .await
            .map_err(|e| SubflowError::BackendUnavailable(format!("{} ({})", self.config.binary_path, e)))?;

        if !output.status.success() {
            return Err(SubflowError::BackendUnavailable(format!(
                "{} exited with {}",
                self.config.binary_path, output.status
            )));
        }

        if !Path::new(&self.config.model).exists() {
            return Err(SubflowError::BackendUnavailable(format!(
                "whisper.cpp model not found: {}",
                self.config.model
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whisper_cpp_json() {
        let json = r#"{
            "systeminfo": "AVX = 1",
            "transcription": [
                {"timestamps": {"from": "00:00:00,000", "to": "00:00:02,500"},
                 "offsets": {"from": 0, "to": 2500}, "text": " Hello there."},
                {"timestamps": {"from": "00:00:02,500", "to": "00:00:03,000"},
                 "offsets": {"from": 2500, "to": 3000}, "text": " "},
                {"timestamps": {"from": "00:00:03,000", "to": "00:01:05,120"},
                 "offsets": {"from": 3000, "to": 65120}, "text": " General Kenobi."}
            ]
        }"#;

        let output: WhisperCppOutput = serde_json::from_str(json).unwrap();
        let entries = segments_to_entries(WhisperCppMapper::to_segments(output)).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], SubtitleEntry::new(1, "00:00:00,000", "00:00:02,500", "Hello there."));
        assert_eq!(entries[1], SubtitleEntry::new(2, "00:00:03,000", "00:01:05,120", "General Kenobi."));
    }

    #[tokio::test]
    async fn test_missing_audio_fails_transcription() {
        let transcriber = WhisperCppTranscriber::new(TranscriberConfig {
            implementation: crate::config::TranscriberImplementation::WhisperCpp,
            binary_path: "whisper-cli".to_string(),
            model: "models/ggml-base.bin".to_string(),
            language: None,
        });

        let err = transcriber.transcribe(Path::new("/nonexistent/audio.wav")).await.unwrap_err();
        assert!(matches!(err, SubflowError::TranscriptionFailed(_)));
    }
}
