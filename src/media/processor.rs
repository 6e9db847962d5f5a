use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Result, SubflowError};
use super::{AudioExtractor, MediaCommandBuilder};

/// FFmpeg-based audio extractor
pub struct FfmpegAudioExtractor {
    config: MediaConfig,
    audio_dir: PathBuf,
    command_builder: MediaCommandBuilder,
}

impl FfmpegAudioExtractor {
    pub fn new(config: MediaConfig, audio_dir: PathBuf) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);

        Self {
            config,
            audio_dir,
            command_builder,
        }
    }

    /// `<audio_dir>/<stem>_audio.wav`
    pub fn audio_path_for(&self, video_path: &Path) -> PathBuf {
        let stem = video_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        self.audio_dir.join(format!("{}_audio.wav", stem))
    }

    /// First line of `ffmpeg -version`
    pub async fn version_info(&self) -> Result<String> {
        let stdout = self.command_builder.version_check().execute().await?;
        Ok(stdout.lines().next().unwrap_or("Unknown version").to_string())
    }
}

#[async_trait]
impl AudioExtractor for FfmpegAudioExtractor {
    async fn extract_audio(&self, video_path: &Path) -> Result<PathBuf> {
        if !video_path.exists() {
            return Err(SubflowError::FileNotFound(video_path.display().to_string()));
        }

        tokio::fs::create_dir_all(&self.audio_dir).await.map_err(|e| {
            SubflowError::ExtractionFailed(format!(
                "Failed to create audio directory {}: {}",
                self.audio_dir.display(),
                e
            ))
        })?;

        let audio_path = self.audio_path_for(video_path);
        info!("Extracting audio from {} to {}", video_path.display(), audio_path.display());

        self.command_builder
            .extract_audio(video_path, &audio_path)
            .execute()
            .await?;

        if !audio_path.exists() {
            return Err(SubflowError::ExtractionFailed(format!(
                "{} produced no output at {}",
                self.config.binary_path,
                audio_path.display()
            )));
        }

        info!("Audio extraction completed");
        Ok(audio_path)
    }

    async fn check_availability(&self) -> Result<()> {
        match self.version_info().await {
            Ok(version) => {
                debug!("Media processor: {}", version);
                Ok(())
            }
            Err(e) => Err(SubflowError::BackendUnavailable(format!(
                "{} ({})",
                self.config.binary_path, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(binary_path: &str, audio_dir: &Path) -> FfmpegAudioExtractor {
        FfmpegAudioExtractor::new(
            MediaConfig {
                binary_path: binary_path.to_string(),
                audio_dir: None,
            },
            audio_dir.to_path_buf(),
        )
    }

    #[test]
    fn test_audio_path_uses_video_stem() {
        let extractor = extractor("ffmpeg", Path::new("/tmp/audio"));
        assert_eq!(
            extractor.audio_path_for(Path::new("/videos/lecture.01.mkv")),
            PathBuf::from("/tmp/audio/lecture.01_audio.wav")
        );
    }

    #[tokio::test]
    async fn test_missing_video_is_file_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let extractor = extractor("ffmpeg", temp.path());

        let err = extractor
            .extract_audio(&temp.path().join("missing.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, SubflowError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_unavailable_binary_reported() {
        let temp = tempfile::tempdir().unwrap();
        let extractor = extractor("/nonexistent/ffmpeg", temp.path());

        let err = extractor.check_availability().await.unwrap_err();
        assert!(matches!(err, SubflowError::BackendUnavailable(_)));
    }
}
