// Translation subsystem
//
// Providers are selected by method name through the orchestrator:
// - GoogleTrans: remote service, text chunked with a per-chunk timeout
// - Argos: locally installed language packages resolved through the package graph

pub mod chunker;
pub mod local;
pub mod remote;
pub mod resolver;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

pub use chunker::chunk_text;
pub use local::{ArgosCliTranslator, LocalPackageProvider, PackageTranslator};
pub use remote::{ChunkTranslator, RemoteChunkedProvider};
pub use resolver::{PackageIndex, PackageResolver, TranslationPackage};

use crate::config::TranslateConfig;
use crate::error::{Result, SubflowError};
use crate::subtitle::SubtitleEntry;

/// A capability that translates subtitle text for one method
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Method name this provider serves
    fn name(&self) -> &'static str;

    /// Translate entries to `target_language`.
    ///
    /// Never fails as a whole: the output has the same length and index
    /// order as `entries`, with untranslatable entries kept as they were.
    async fn translate(&self, entries: &[SubtitleEntry], target_language: &str) -> Vec<SubtitleEntry>;
}

/// Available translation methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TranslationMethod {
    #[default]
    GoogleTrans,
    Argos,
}

impl TranslationMethod {
    /// Parse a method name; unknown names are an error
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "googletrans" | "google" => Ok(Self::GoogleTrans),
            "argos" | "argos translate" => Ok(Self::Argos),
            _ => Err(SubflowError::UnsupportedTranslationMethod(name.to_string())),
        }
    }

    /// Parse a method name, substituting the default for unknown names
    pub fn from_name_or_default(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|e| {
            warn!("{}, falling back to {}", e, Self::default());
            Self::default()
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoogleTrans => "GoogleTrans",
            Self::Argos => "Argos",
        }
    }
}

impl fmt::Display for TranslationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatches translation to the provider registered for a method
pub struct TranslationOrchestrator {
    remote: Arc<dyn TranslationProvider>,
    local: Arc<dyn TranslationProvider>,
}

impl TranslationOrchestrator {
    pub fn new(remote: Arc<dyn TranslationProvider>, local: Arc<dyn TranslationProvider>) -> Self {
        Self { remote, local }
    }

    /// Build both providers from configuration
    pub fn from_config(config: &TranslateConfig) -> Result<Self> {
        let remote = Arc::new(RemoteChunkedProvider::from_config(config)?);
        let local = Arc::new(LocalPackageProvider::from_config(&config.local)?);
        Ok(Self::new(remote, local))
    }

    pub fn provider(&self, method: TranslationMethod) -> &Arc<dyn TranslationProvider> {
        match method {
            TranslationMethod::GoogleTrans => &self.remote,
            TranslationMethod::Argos => &self.local,
        }
    }

    pub async fn translate(
        &self,
        entries: &[SubtitleEntry],
        target_language: &str,
        method: TranslationMethod,
    ) -> Vec<SubtitleEntry> {
        let provider = self.provider(method);
        info!(
            "Translating {} subtitles to {} using {}",
            entries.len(),
            target_language,
            provider.name()
        );

        let translated = provider.translate(entries, target_language).await;
        Self::align(entries, translated)
    }

    /// Translate with a method name; unknown names fail with `UnsupportedTranslationMethod`
    pub async fn translate_named(
        &self,
        entries: &[SubtitleEntry],
        target_language: &str,
        method_name: &str,
    ) -> Result<Vec<SubtitleEntry>> {
        let method = TranslationMethod::from_name(method_name)?;
        Ok(self.translate(entries, target_language, method).await)
    }

    /// Translate with a method name; unknown names use the default method
    pub async fn translate_lenient(
        &self,
        entries: &[SubtitleEntry],
        target_language: &str,
        method_name: &str,
    ) -> Vec<SubtitleEntry> {
        let method = TranslationMethod::from_name_or_default(method_name);
        self.translate(entries, target_language, method).await
    }

    /// Keep the provider output only if it lines up with the input entry for entry
    fn align(entries: &[SubtitleEntry], translated: Vec<SubtitleEntry>) -> Vec<SubtitleEntry> {
        let aligned = translated.len() == entries.len()
            && translated
                .iter()
                .zip(entries)
                .all(|(out, input)| out.index == input.index);

        if aligned {
            translated
        } else {
            warn!(
                "Provider returned {} entries for {} inputs out of order, keeping originals",
                translated.len(),
                entries.len()
            );
            entries.to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TaggingProvider {
        tag: &'static str,
    }

    #[async_trait]
    impl TranslationProvider for TaggingProvider {
        fn name(&self) -> &'static str {
            self.tag
        }

        async fn translate(&self, entries: &[SubtitleEntry], target_language: &str) -> Vec<SubtitleEntry> {
            entries
                .iter()
                .map(|entry| entry.with_text(format!("{}/{}/{}", self.tag, target_language, entry.text)))
                .collect()
        }
    }

    /// Drops the last entry to break the length invariant
    struct LossyProvider;

    #[async_trait]
    impl TranslationProvider for LossyProvider {
        fn name(&self) -> &'static str {
            "lossy"
        }

        async fn translate(&self, entries: &[SubtitleEntry], _target_language: &str) -> Vec<SubtitleEntry> {
            let mut out: Vec<SubtitleEntry> = entries.iter().map(|e| e.with_text("x")).collect();
            out.pop();
            out
        }
    }

    fn orchestrator() -> TranslationOrchestrator {
        TranslationOrchestrator::new(
            Arc::new(TaggingProvider { tag: "remote" }),
            Arc::new(TaggingProvider { tag: "local" }),
        )
    }

    fn entries() -> Vec<SubtitleEntry> {
        vec![
            SubtitleEntry::new(1, "00:00:01,000", "00:00:02,000", "Hello"),
            SubtitleEntry::new(2, "00:00:02,000", "00:00:03,000", "World"),
        ]
    }

    #[test]
    fn test_method_names() {
        assert_eq!(TranslationMethod::from_name("GoogleTrans").unwrap(), TranslationMethod::GoogleTrans);
        assert_eq!(TranslationMethod::from_name("Argos").unwrap(), TranslationMethod::Argos);
        assert_eq!(TranslationMethod::from_name("Argos Translate").unwrap(), TranslationMethod::Argos);
        assert!(matches!(
            TranslationMethod::from_name("DeepL"),
            Err(SubflowError::UnsupportedTranslationMethod(name)) if name == "DeepL"
        ));
        assert_eq!(TranslationMethod::from_name_or_default("DeepL"), TranslationMethod::GoogleTrans);
        assert_eq!(TranslationMethod::default().to_string(), "GoogleTrans");
    }

    #[tokio::test]
    async fn test_dispatches_by_method() {
        let orchestrator = orchestrator();

        let remote = orchestrator.translate(&entries(), "es", TranslationMethod::GoogleTrans).await;
        let local = orchestrator.translate(&entries(), "es", TranslationMethod::Argos).await;

        assert_eq!(remote[0].text, "remote/es/Hello");
        assert_eq!(local[1].text, "local/es/World");
    }

    #[tokio::test]
    async fn test_strict_name_rejects_unknown_method() {
        let err = orchestrator().translate_named(&entries(), "es", "Babelfish").await.unwrap_err();
        assert!(matches!(err, SubflowError::UnsupportedTranslationMethod(_)));
    }

    #[tokio::test]
    async fn test_lenient_name_uses_default_method() {
        let translated = orchestrator().translate_lenient(&entries(), "fr", "Babelfish").await;
        assert_eq!(translated[0].text, "remote/fr/Hello");
    }

    #[tokio::test]
    async fn test_misaligned_provider_output_is_discarded() {
        let orchestrator = TranslationOrchestrator::new(Arc::new(LossyProvider), Arc::new(LossyProvider));
        let translated = orchestrator.translate(&entries(), "es", TranslationMethod::Argos).await;
        assert_eq!(translated, entries());
    }
}
