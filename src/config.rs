use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, SubflowError};
use crate::translate::remote::{DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_TIMEOUT};

// Default values for fields that older config files may not carry
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_timeout_secs() -> f64 {
    DEFAULT_CHUNK_TIMEOUT.as_secs_f64()
}

fn default_batch_concurrency() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub media: MediaConfig,
    pub transcriber: TranscriberConfig,
    pub translate: TranslateConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Directory for extracted audio; the system temp dir when unset
    pub audio_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Which speech-to-text backend to run
    pub implementation: TranscriberImplementation,
    /// Path to transcriber binary (e.g., whisper-cli or whisper)
    pub binary_path: String,
    /// Model name (openai-whisper) or model file path (whisper.cpp)
    pub model: String,
    /// Source language hint; auto-detect when unset
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranscriberImplementation {
    /// whisper.cpp `whisper-cli` with JSON output
    WhisperCpp,
    /// Python openai-whisper `whisper` command
    OpenAiWhisper,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Provider used when none is requested: "GoogleTrans" or "Argos"
    pub default_method: String,
    /// Default target language code
    pub target_language: String,
    /// Maximum characters per translated chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Per-chunk timeout in seconds
    #[serde(default = "default_chunk_timeout_secs")]
    pub chunk_timeout_secs: f64,
    pub remote: RemoteTranslateConfig,
    pub local: LocalTranslateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTranslateConfig {
    /// Network service: "google" or "libretranslate"
    pub service: String,
    /// Service endpoint; the service default when unset
    pub endpoint: Option<String>,
    /// API key for services that need one
    pub api_key: Option<String>,
    /// HTTP client timeout in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalTranslateConfig {
    /// Path to the argos-translate CLI
    pub binary_path: String,
    /// Path to the argospm package manager CLI
    pub package_manager_path: String,
    /// Installed package directory; resolved from the environment when unset
    pub packages_dir: Option<PathBuf>,
    /// Fixed source language of local translation
    pub source_language: String,
    /// Intermediate language tried when no direct package exists
    pub intermediate_language: String,
    /// Package pairs installed by `packages install`
    pub install_pairs: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of videos processed at once in batch mode
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
    /// Video file extensions picked up by batch mode
    pub video_extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                audio_dir: None,
            },
            transcriber: TranscriberConfig {
                implementation: TranscriberImplementation::WhisperCpp,
                binary_path: "whisper-cli".to_string(),
                model: "models/ggml-base.bin".to_string(),
                language: None,
            },
            translate: TranslateConfig {
                default_method: "GoogleTrans".to_string(),
                target_language: "es".to_string(),
                chunk_size: default_chunk_size(),
                chunk_timeout_secs: default_chunk_timeout_secs(),
                remote: RemoteTranslateConfig {
                    service: "google".to_string(),
                    endpoint: None,
                    api_key: None,
                    request_timeout_secs: 30,
                },
                local: LocalTranslateConfig {
                    binary_path: "argos-translate".to_string(),
                    package_manager_path: "argospm".to_string(),
                    packages_dir: None,
                    source_language: "en".to_string(),
                    intermediate_language: "en".to_string(),
                    install_pairs: ["es", "fr", "de", "it", "pt", "ar"]
                        .iter()
                        .map(|to| ("en".to_string(), to.to_string()))
                        .collect(),
                },
            },
            pipeline: PipelineConfig {
                batch_concurrency: default_batch_concurrency(),
                video_extensions: ["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm"]
                    .iter()
                    .map(|ext| ext.to_string())
                    .collect(),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubflowError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubflowError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubflowError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.translate.chunk_size == 0 {
            return Err(SubflowError::Config("translate.chunk_size must be positive".to_string()));
        }
        if !(self.translate.chunk_timeout_secs > 0.0) {
            return Err(SubflowError::Config(
                "translate.chunk_timeout_secs must be positive".to_string(),
            ));
        }
        if self.pipeline.batch_concurrency == 0 {
            return Err(SubflowError::Config(
                "pipeline.batch_concurrency must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory extracted audio is written to
    pub fn audio_dir(&self) -> PathBuf {
        self.media
            .audio_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
