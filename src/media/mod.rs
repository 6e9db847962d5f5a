// Audio extraction for the pipeline
//
// - Processor: ffmpeg-backed extractor
// - Commands: command builders for the media binary

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Pulls the audio track out of a video file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Extract audio from `video_path`, returning the path of the audio file
    async fn extract_audio(&self, video_path: &Path) -> Result<PathBuf>;

    /// Check that the backend can run
    async fn check_availability(&self) -> Result<()>;
}

/// Factory for creating audio extractor instances
pub struct AudioExtractorFactory;

impl AudioExtractorFactory {
    /// Create the default extractor (FFmpeg-based), writing audio into `audio_dir`
    pub fn create_extractor(config: MediaConfig, audio_dir: PathBuf) -> Box<dyn AudioExtractor> {
        Box::new(FfmpegAudioExtractor::new(config, audio_dir))
    }
}
