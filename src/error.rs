use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Video file not found: {0}")]
    FileNotFound(String),

    #[error("Audio extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Translation timed out after {timeout_secs:.1}s")]
    TranslationChunkTimeout { timeout_secs: f64 },

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Unsupported translation method: {0}")]
    UnsupportedTranslationMethod(String),

    #[error("No translation package found for {source_code}->{target_code}")]
    PackageResolutionFailed {
        source_code: String,
        target_code: String,
    },

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Subtitle parse error: {0}")]
    SubtitleParse(String),
}

pub type Result<T> = std::result::Result<T, SubflowError>;
