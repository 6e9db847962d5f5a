// OpenAI Whisper Python implementation, driven through the `whisper` command

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::TranscriberConfig;
use crate::error::{Result, SubflowError};
use crate::subtitle::SubtitleEntry;
use super::Transcriber;
use super::common::{
    audio_stem, ensure_audio_exists, read_json_output, run_transcriber_command, segments_to_entries,
    TranscriptSegment, TranscriptionMapper,
};

/// OpenAI Whisper JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIWhisperOutput {
    #[serde(default)]
    pub text: String,
    pub segments: Vec<OpenAIWhisperSegment>,
    pub language: Option<String>,
}

/// Segment boundaries in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIWhisperSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

pub struct OpenAIWhisperMapper;

impl TranscriptionMapper<OpenAIWhisperOutput> for OpenAIWhisperMapper {
    fn to_segments(output: OpenAIWhisperOutput) -> Vec<TranscriptSegment> {
        output
            .segments
            .into_iter()
            .map(|seg| TranscriptSegment::from_seconds(seg.start, seg.end, seg.text))
            .collect()
    }
}

pub struct OpenAiWhisperTranscriber {
    config: TranscriberConfig,
}

impl OpenAiWhisperTranscriber {
    pub fn new(config: TranscriberConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Transcriber for OpenAiWhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<SubtitleEntry>> {
        let audio_path = ensure_audio_exists(audio_path)?;
        info!("Transcribing {} with OpenAI Whisper ({})", audio_path.display(), self.config.model);

        let temp_dir = tempfile::tempdir()
            .map_err(|e| SubflowError::TranscriptionFailed(format!("Failed to create temp directory: {}", e)))?;
        let output_dir = temp_dir.path();

        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg(&audio_path)
            .arg("--model")
            .arg(&self.config.model)
            .arg("--output_dir")
            .arg(output_dir)
            .arg("--output_format")
            .arg("json");

        if let Some(language) = &self.config.language {
            cmd.arg("--language").arg(language);
        }

        run_transcriber_command(cmd, &self.config.binary_path).await?;

        let json_file = output_dir.join(format!("{}.json", audio_stem(&audio_path)?));
        let output: OpenAIWhisperOutput = read_json_output(&json_file).await?;
        if let Some(language) = &output.language {
            debug!("Detected language: {}", language);
        }

        let entries = segments_to_entries(OpenAIWhisperMapper::to_segments(output))?;
        info!("Transcribed {} segments", entries.len());
        Ok(entries)
    }

    async fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.config.binary_path)
            .arg("--help")
            .output()
            .await
            .map_err(|e| SubflowError::BackendUnavailable(format!("{} ({})", self.config.binary_path, e)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(SubflowError::BackendUnavailable(format!(
                "OpenAI Whisper not available. Install with: pip install openai-whisper ({})",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}
