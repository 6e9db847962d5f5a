//! End-to-end pipeline runs with in-process collaborators

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::assert_ok;

use subflow::config::Config;
use subflow::error::{Result, SubflowError};
use subflow::media::AudioExtractor;
use subflow::pipeline::{ChannelSink, Pipeline, ProcessingStatus};
use subflow::subtitle::{generate_srt, read_srt, SubtitleEntry};
use subflow::transcribe::{Transcriber, WhisperCppTranscriber};
use subflow::translate::{
    ChunkTranslator, LocalPackageProvider, PackageResolver, PackageTranslator, RemoteChunkedProvider,
    TranslationOrchestrator, TranslationPackage,
};

struct FakeExtractor {
    audio_dir: PathBuf,
}

#[async_trait]
impl AudioExtractor for FakeExtractor {
    async fn extract_audio(&self, video_path: &Path) -> Result<PathBuf> {
        let stem = video_path.file_stem().unwrap().to_string_lossy().into_owned();
        let audio_path = self.audio_dir.join(format!("{}_audio.wav", stem));
        tokio::fs::write(&audio_path, b"RIFF").await?;
        Ok(audio_path)
    }

    async fn check_availability(&self) -> Result<()> {
        Ok(())
    }
}

/// Reports an audio file that was never written
struct VanishingExtractor;

#[async_trait]
impl AudioExtractor for VanishingExtractor {
    async fn extract_audio(&self, video_path: &Path) -> Result<PathBuf> {
        Ok(video_path.with_file_name("vanished_audio.wav"))
    }

    async fn check_availability(&self) -> Result<()> {
        Ok(())
    }
}

struct FakeTranscriber;

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<SubtitleEntry>> {
        if !audio_path.exists() {
            return Err(SubflowError::TranscriptionFailed("no audio".to_string()));
        }
        Ok(vec![
            SubtitleEntry::new(1, "00:00:00,000", "00:00:02,000", "good morning"),
            SubtitleEntry::new(2, "00:00:02,000", "00:00:04,000", "stall here please"),
            SubtitleEntry::new(3, "00:00:04,000", "00:00:06,000", "see you"),
        ])
    }

    async fn check_availability(&self) -> Result<()> {
        Ok(())
    }
}

/// Uppercases chunks; a chunk containing "stall" never answers in time
struct FakeRemote;

#[async_trait]
impl ChunkTranslator for FakeRemote {
    async fn translate_chunk(&self, text: &str, target_language: &str) -> Result<String> {
        if text.contains("stall") {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        Ok(format!("[{}] {}", target_language, text.to_uppercase()))
    }

    fn name(&self) -> &'static str {
        "fake-remote"
    }
}

struct FakeEngine {
    calls: Mutex<usize>,
}

#[async_trait]
impl PackageTranslator for FakeEngine {
    async fn translate_text(&self, text: &str, _source_code: &str, target_code: &str) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        Ok(format!("{}:{}", target_code, text))
    }
}

fn orchestrator(engine: Arc<FakeEngine>) -> Arc<TranslationOrchestrator> {
    let remote = RemoteChunkedProvider::new(Arc::new(FakeRemote), 500, Duration::from_millis(100));
    let resolver = PackageResolver::new(vec![TranslationPackage::new("en", "fr")], "en");
    let local = LocalPackageProvider::new(resolver, engine, "en");
    Arc::new(TranslationOrchestrator::new(Arc::new(remote), Arc::new(local)))
}

fn pipeline(audio_dir: &Path, engine: Arc<FakeEngine>) -> Pipeline {
    Pipeline::new(
        Arc::new(FakeExtractor {
            audio_dir: audio_dir.to_path_buf(),
        }),
        Arc::new(FakeTranscriber),
        orchestrator(engine),
    )
}

fn engine() -> Arc<FakeEngine> {
    Arc::new(FakeEngine { calls: Mutex::new(0) })
}

#[tokio::test]
async fn test_remote_translation_end_to_end_writes_srt() {
    let temp = assert_ok!(tempfile::tempdir());
    let video = temp.path().join("interview.mp4");
    assert_ok!(std::fs::write(&video, b"video"));

    let (sink, mut events) = ChannelSink::channel();
    let result = pipeline(temp.path(), engine())
        .process(&video, "es", "GoogleTrans", &sink)
        .await;
    drop(sink);

    assert_eq!(result.status, ProcessingStatus::Completed);
    let subtitles = result.subtitles.unwrap();
    assert_eq!(subtitles.len(), 3);
    assert_eq!(subtitles[0].text, "[es] GOOD MORNING");
    assert_eq!(subtitles[1].text, "stall here please");
    assert_eq!(subtitles[2].text, "[es] SEE YOU");

    let mut progress = Vec::new();
    while let Some(event) = events.recv().await {
        progress.push(event.progress);
    }
    assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(progress.last(), Some(&1.0));

    let srt_path = temp.path().join("interview_es.srt");
    assert_ok!(generate_srt(&subtitles, &srt_path).await);
    let reread = assert_ok!(read_srt(&srt_path).await);
    assert_eq!(reread, subtitles);
}

#[tokio::test]
async fn test_local_translation_uses_installed_package() {
    let temp = assert_ok!(tempfile::tempdir());
    let video = temp.path().join("lesson.mkv");
    assert_ok!(std::fs::write(&video, b"video"));

    let engine = engine();
    let result = pipeline(temp.path(), engine.clone())
        .process(&video, "fr", "Argos Translate", &subflow::pipeline::NoopSink)
        .await;

    let subtitles = result.subtitles.unwrap();
    assert_eq!(subtitles[2].text, "fr:see you");
    assert_eq!(*engine.calls.lock().unwrap(), 3);
}

#[tokio::test]
async fn test_local_translation_without_package_keeps_transcript() {
    let temp = assert_ok!(tempfile::tempdir());
    let video = temp.path().join("lesson.mkv");
    assert_ok!(std::fs::write(&video, b"video"));

    let engine = engine();
    let result = pipeline(temp.path(), engine.clone())
        .process(&video, "de", "Argos", &subflow::pipeline::NoopSink)
        .await;

    assert_eq!(result.status, ProcessingStatus::Completed);
    let subtitles = result.subtitles.unwrap();
    assert_eq!(subtitles[0].text, "good morning");
    assert_eq!(*engine.calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_method_falls_back_to_remote_translation() {
    let temp = assert_ok!(tempfile::tempdir());
    let video = temp.path().join("lesson.mkv");
    assert_ok!(std::fs::write(&video, b"video"));

    let engine = engine();
    let result = pipeline(temp.path(), engine.clone())
        .process(&video, "fr", "Babelfish", &subflow::pipeline::NoopSink)
        .await;

    assert_eq!(result.status, ProcessingStatus::Completed);
    let subtitles = result.subtitles.unwrap();
    assert_eq!(subtitles[0].text, "[fr] GOOD MORNING");
    assert_eq!(*engine.calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_missing_audio_reports_transcription_failure() {
    let temp = assert_ok!(tempfile::tempdir());
    let video = temp.path().join("talk.mp4");
    assert_ok!(std::fs::write(&video, b"video"));

    let pipeline = Pipeline::new(
        Arc::new(VanishingExtractor),
        Arc::new(WhisperCppTranscriber::new(Config::default().transcriber)),
        orchestrator(engine()),
    );

    let result = pipeline
        .process(&video, "es", "GoogleTrans", &subflow::pipeline::NoopSink)
        .await;

    assert_eq!(result.status, ProcessingStatus::Error);
    assert_eq!(
        result.message,
        format!(
            "Error: Transcription failed: Audio file not found: {}",
            temp.path().join("vanished_audio.wav").display()
        )
    );
}
