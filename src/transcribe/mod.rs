// Speech-to-text transcription
//
// Implementations are selected by the factory from configuration:
// - WhisperCpp: whisper.cpp `whisper-cli` with JSON output
// - OpenAI: OpenAI Whisper Python command
//
// To add a transcription service, parse its JSON into a service-specific
// struct, implement `TranscriptionMapper` for it, and add a variant to
// `TranscriberImplementation`.

pub mod common;
pub mod openai;
pub mod whisper_cpp;

use async_trait::async_trait;
use std::path::Path;

pub use common::*;
pub use openai::OpenAiWhisperTranscriber;
pub use whisper_cpp::WhisperCppTranscriber;

use crate::config::{TranscriberConfig, TranscriberImplementation};
use crate::error::Result;
use crate::subtitle::SubtitleEntry;

/// Converts an audio file into timed subtitle entries
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio_path`; entries are numbered from 1 in time order
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<SubtitleEntry>>;

    /// Check that the backend can run
    async fn check_availability(&self) -> Result<()>;
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    pub fn create_transcriber(config: TranscriberConfig) -> Box<dyn Transcriber> {
        match config.implementation {
            TranscriberImplementation::WhisperCpp => Box::new(WhisperCppTranscriber::new(config)),
            TranscriberImplementation::OpenAiWhisper => Box::new(OpenAiWhisperTranscriber::new(config)),
        }
    }
}
