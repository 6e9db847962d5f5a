use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{RemoteTranslateConfig, TranslateConfig};
use crate::error::{Result, SubflowError};
use crate::subtitle::SubtitleEntry;
use super::{TranslationProvider, chunker::chunk_text};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_secs(10);

const GOOGLE_DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";
const LIBRETRANSLATE_DEFAULT_ENDPOINT: &str = "http://localhost:5000";

/// Network backend that translates one chunk of text
#[async_trait]
pub trait ChunkTranslator: Send + Sync {
    /// Translate `text` into `target_language`, detecting the source language
    async fn translate_chunk(&self, text: &str, target_language: &str) -> Result<String>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Remote translation services the chunked provider can talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoteService {
    #[default]
    Google,
    LibreTranslate,
}

impl RemoteService {
    /// Resolve a configured service name, falling back to the default service
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "google" | "googletrans" => Self::Google,
            "libretranslate" | "libre" => Self::LibreTranslate,
            other => {
                warn!(
                    "Unsupported remote translation service '{}', falling back to {:?}",
                    other,
                    Self::default()
                );
                Self::default()
            }
        }
    }
}

/// Client for the public Google Translate web endpoint
pub struct GoogleTranslateClient {
    client: Client,
    endpoint: String,
}

impl GoogleTranslateClient {
    pub fn new(client: Client, endpoint: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.unwrap_or_else(|| GOOGLE_DEFAULT_ENDPOINT.to_string()),
        }
    }

    /// Pull the translated sentences out of the nested array response
    fn parse_response(body: &Value) -> Result<String> {
        let sentences = body
            .get(0)
            .and_then(Value::as_array)
            .ok_or_else(|| SubflowError::Translation("Unexpected Google Translate response".to_string()))?;

        let translated: String = sentences
            .iter()
            .filter_map(|sentence| sentence.get(0).and_then(Value::as_str))
            .collect();

        if translated.trim().is_empty() {
            return Err(SubflowError::Translation("Empty translation received".to_string()));
        }
        Ok(translated.trim().to_string())
    }
}

#[async_trait]
impl ChunkTranslator for GoogleTranslateClient {
    async fn translate_chunk(&self, text: &str, target_language: &str) -> Result<String> {
        debug!("Sending translation request to: {}", self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target_language),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| SubflowError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SubflowError::Translation(format!(
                "Google Translate error {}: {}",
                status, error_text
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SubflowError::Translation(format!("Failed to parse response: {}", e)))?;

        Self::parse_response(&body)
    }

    fn name(&self) -> &'static str {
        "google"
    }
}

#[derive(Debug, Clone, Serialize)]
struct LibreTranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
struct LibreTranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// Client for a LibreTranslate server
pub struct LibreTranslateClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl LibreTranslateClient {
    pub fn new(client: Client, endpoint: Option<String>, api_key: Option<String>) -> Self {
        let endpoint = endpoint.unwrap_or_else(|| LIBRETRANSLATE_DEFAULT_ENDPOINT.to_string());
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl ChunkTranslator for LibreTranslateClient {
    async fn translate_chunk(&self, text: &str, target_language: &str) -> Result<String> {
        let url = format!("{}/translate", self.endpoint);
        debug!("Sending translation request to: {}", url);

        let request = LibreTranslateRequest {
            q: text,
            source: "auto",
            target: target_language,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SubflowError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SubflowError::Translation(format!(
                "LibreTranslate error {}: {}",
                status, error_text
            )));
        }

        let body: LibreTranslateResponse = response
            .json()
            .await
            .map_err(|e| SubflowError::Translation(format!("Failed to parse response: {}", e)))?;

        Ok(body.translated_text.trim().to_string())
    }

    fn name(&self) -> &'static str {
        "libretranslate"
    }
}

/// Provider that translates each entry chunk by chunk over the network.
///
/// A chunk that times out keeps its original text; any other chunk failure
/// keeps the whole original entry. Neither aborts the sequence.
pub struct RemoteChunkedProvider {
    backend: Arc<dyn ChunkTranslator>,
    chunk_size: usize,
    chunk_timeout: Duration,
}

impl RemoteChunkedProvider {
    pub fn new(backend: Arc<dyn ChunkTranslator>, chunk_size: usize, chunk_timeout: Duration) -> Self {
        Self {
            backend,
            chunk_size: chunk_size.max(1),
            chunk_timeout,
        }
    }

    /// Build the provider and its network backend from configuration
    pub fn from_config(config: &TranslateConfig) -> Result<Self> {
        let backend = create_backend(&config.remote)?;
        let chunk_timeout = Duration::try_from_secs_f64(config.chunk_timeout_secs)
            .map_err(|e| SubflowError::Config(format!("Invalid chunk timeout: {}", e)))?;
        Ok(Self::new(backend, config.chunk_size, chunk_timeout))
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_timeout(&self) -> Duration {
        self.chunk_timeout
    }

    async fn translate_entry(&self, entry: &SubtitleEntry, target_language: &str) -> Result<SubtitleEntry> {
        let chunks = chunk_text(&entry.text, self.chunk_size);
        let mut translated_chunks = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let call = self.backend.translate_chunk(&chunk, target_language);
            match tokio::time::timeout(self.chunk_timeout, call).await {
                Ok(Ok(translated)) => translated_chunks.push(translated),
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    let timeout = SubflowError::TranslationChunkTimeout {
                        timeout_secs: self.chunk_timeout.as_secs_f64(),
                    };
                    warn!("{} for chunk of entry {}: {}", timeout, entry.index, chunk);
                    translated_chunks.push(chunk);
                }
            }
        }

        Ok(entry.with_text(translated_chunks.join(" ")))
    }
}

#[async_trait]
impl TranslationProvider for RemoteChunkedProvider {
    fn name(&self) -> &'static str {
        "GoogleTrans"
    }

    async fn translate(&self, entries: &[SubtitleEntry], target_language: &str) -> Vec<SubtitleEntry> {
        info!(
            "Starting chunked translation of {} entries to {} via {}",
            entries.len(),
            target_language,
            self.backend.name()
        );

        let mut translated = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.translate_entry(entry, target_language).await {
                Ok(result) => translated.push(result),
                Err(e) => {
                    warn!("Translation failed for entry {}, keeping original: {}", entry.index, e);
                    translated.push(entry.clone());
                }
            }
        }

        translated
    }
}

/// Create the network backend named in configuration
pub fn create_backend(config: &RemoteTranslateConfig) -> Result<Arc<dyn ChunkTranslator>> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;

    let backend: Arc<dyn ChunkTranslator> = match RemoteService::from_name(&config.service) {
        RemoteService::Google => Arc::new(GoogleTranslateClient::new(client, config.endpoint.clone())),
        RemoteService::LibreTranslate => Arc::new(LibreTranslateClient::new(
            client,
            config.endpoint.clone(),
            config.api_key.clone(),
        )),
    };
    Ok(backend)
}
