use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Result, SubflowError};
use crate::media::{AudioExtractor, AudioExtractorFactory};
use crate::subtitle::SubtitleEntry;
use crate::transcribe::{Transcriber, TranscriberFactory};
use crate::translate::TranslationOrchestrator;

/// Stage of a pipeline run, in the order the stages happen
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProcessingStatus {
    Idle,
    ExtractingAudio,
    Transcribing,
    Translating,
    Completed,
    Error,
}

impl ProcessingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Whether a run in this state may move to `next`
    pub fn can_advance_to(self, next: ProcessingStatus) -> bool {
        !self.is_terminal() && next > self
    }
}

/// A progress event; the last one of a run carries the outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub status: ProcessingStatus,
    pub message: String,
    /// Fraction of the run completed, in [0, 1]
    pub progress: f32,
    /// Translated entries; only present on `Completed`
    pub subtitles: Option<Vec<SubtitleEntry>>,
}

impl ProcessingResult {
    pub fn stage<S: Into<String>>(status: ProcessingStatus, message: S, progress: f32) -> Self {
        Self {
            status,
            message: message.into(),
            progress: progress.clamp(0.0, 1.0),
            subtitles: None,
        }
    }

    pub fn completed(subtitles: Vec<SubtitleEntry>) -> Self {
        Self {
            status: ProcessingStatus::Completed,
            message: "Processing completed successfully".to_string(),
            progress: 1.0,
            subtitles: Some(subtitles),
        }
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "Error: unknown failure".to_string();
        }
        Self {
            status: ProcessingStatus::Error,
            message,
            progress: 0.0,
            subtitles: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ProcessingStatus::Completed
    }
}

/// Receives progress events of a pipeline run
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, result: &ProcessingResult) -> Result<()>;
}

impl<F> ProgressSink for F
where
    F: Fn(&ProcessingResult) + Send + Sync,
{
    fn on_progress(&self, result: &ProcessingResult) -> Result<()> {
        self(result);
        Ok(())
    }
}

/// Discards every event
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_progress(&self, _result: &ProcessingResult) -> Result<()> {
        Ok(())
    }
}

/// Forwards events to a channel; a dropped receiver is ignored
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<ProcessingResult>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::UnboundedSender<ProcessingResult>) -> Self {
        Self { sender }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProcessingResult>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl ProgressSink for ChannelSink {
    fn on_progress(&self, result: &ProcessingResult) -> Result<()> {
        if self.sender.send(result.clone()).is_err() {
            debug!("Progress receiver dropped, discarding {:?} event", result.status);
        }
        Ok(())
    }
}

/// Video to translated subtitles: extract audio, transcribe, translate
#[derive(Clone)]
pub struct Pipeline {
    extractor: Arc<dyn AudioExtractor>,
    transcriber: Arc<dyn Transcriber>,
    translation: Arc<TranslationOrchestrator>,
}

impl Pipeline {
    pub fn new(
        extractor: Arc<dyn AudioExtractor>,
        transcriber: Arc<dyn Transcriber>,
        translation: Arc<TranslationOrchestrator>,
    ) -> Self {
        Self {
            extractor,
            transcriber,
            translation,
        }
    }

    /// Wire the configured ffmpeg, transcriber and translation providers
    pub fn from_config(config: &Config) -> Result<Self> {
        let extractor = AudioExtractorFactory::create_extractor(config.media.clone(), config.audio_dir());
        let transcriber = TranscriberFactory::create_transcriber(config.transcriber.clone());
        let translation = TranslationOrchestrator::from_config(&config.translate)?;

        Ok(Self::new(
            Arc::from(extractor),
            Arc::from(transcriber),
            Arc::new(translation),
        ))
    }

    /// Run one video through the pipeline.
    ///
    /// Never fails: stage failures become an `Error` result. Every stage
    /// event and the final result are sent to `sink`.
    pub async fn process(
        &self,
        video_path: &Path,
        target_language: &str,
        translation_method: &str,
        sink: &dyn ProgressSink,
    ) -> ProcessingResult {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline", run_id = %run_id, video = %video_path.display());

        async {
            let result = match self.run(video_path, target_language, translation_method, sink).await {
                Ok(subtitles) => {
                    info!("Processing completed with {} subtitles", subtitles.len());
                    ProcessingResult::completed(subtitles)
                }
                Err(e) => {
                    error!("Processing failed: {}", e);
                    ProcessingResult::error(format!("Error: {}", e))
                }
            };

            notify(sink, &result);
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        video_path: &Path,
        target_language: &str,
        translation_method: &str,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<SubtitleEntry>> {
        if !video_path.exists() {
            return Err(SubflowError::FileNotFound(video_path.display().to_string()));
        }

        notify(
            sink,
            &ProcessingResult::stage(ProcessingStatus::ExtractingAudio, "Extracting audio...", 0.0),
        );
        let audio_path = self.extractor.extract_audio(video_path).await?;
        debug!("Audio written to {}", audio_path.display());

        notify(
            sink,
            &ProcessingResult::stage(ProcessingStatus::Transcribing, "Transcribing audio...", 0.33),
        );
        let entries = self.transcriber.transcribe(&audio_path).await?;
        info!("Transcribed {} subtitles", entries.len());

        notify(
            sink,
            &ProcessingResult::stage(
                ProcessingStatus::Translating,
                format!("Translating to {} with {}...", target_language, translation_method),
                0.66,
            ),
        );
        Ok(self
            .translation
            .translate_lenient(&entries, target_language, translation_method)
            .await)
    }

    /// Process videos concurrently, at most `concurrency` at a time.
    ///
    /// Each run gets its own sink from `sink_factory`. Results are in the
    /// order of `videos`.
    pub async fn process_batch<F>(
        &self,
        videos: Vec<PathBuf>,
        target_language: &str,
        translation_method: &str,
        concurrency: usize,
        sink_factory: F,
    ) -> Vec<ProcessingResult>
    where
        F: Fn(&Path) -> Arc<dyn ProgressSink>,
    {
        let total = videos.len();
        info!("Processing batch of {} videos, {} at a time", total, concurrency.max(1));

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (position, video_path) in videos.into_iter().enumerate() {
            let pipeline = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let sink = sink_factory(&video_path);
            let target_language = target_language.to_string();
            let translation_method = translation_method.to_string();

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        pipeline
                            .process(&video_path, &target_language, &translation_method, sink.as_ref())
                            .await
                    }
                    Err(e) => ProcessingResult::error(format!("Error: {}", e)),
                };
                (position, result)
            });
        }

        let mut results: Vec<Option<ProcessingResult>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, result)) => results[position] = Some(result),
                Err(e) => warn!("Batch task failed: {}", e),
            }
        }

        let results: Vec<ProcessingResult> = results
            .into_iter()
            .map(|result| result.unwrap_or_else(|| ProcessingResult::error("Error: processing task aborted")))
            .collect();

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!("Batch finished: {}/{} videos succeeded", succeeded, total);
        results
    }
}

/// Deliver an event, logging and swallowing sink errors and panics
fn notify(sink: &dyn ProgressSink, result: &ProcessingResult) {
    match catch_unwind(AssertUnwindSafe(|| sink.on_progress(result))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Progress sink failed on {:?}: {}", result.status, e),
        Err(_) => warn!("Progress sink panicked on {:?}", result.status),
    }
}

/// Video files under `dir` with one of `extensions`, sorted by path
pub fn discover_videos<P: AsRef<Path>>(dir: P, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(SubflowError::FileNotFound(dir.display().to_string()));
    }

    let mut videos: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    videos.sort();
    info!("Found {} video files in {}", videos.len(), dir.display());
    Ok(videos)
}

/// `<output_dir>/<stem>_<lang>.srt`
pub fn subtitle_output_path(video_path: &Path, output_dir: &Path, target_language: &str) -> PathBuf {
    let stem = video_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "subtitles".to_string());
    output_dir.join(format!("{}_{}.srt", stem, target_language))
}
