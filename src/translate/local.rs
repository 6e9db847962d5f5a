use async_trait::async_trait;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::LocalTranslateConfig;
use crate::error::{Result, SubflowError};
use crate::subtitle::SubtitleEntry;
use super::TranslationProvider;
use super::resolver::{PackageIndex, PackageResolver};

/// Target languages the local provider accepts, with display names
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("ar", "Arabic"),
];

pub const FALLBACK_LANGUAGE: &str = "en";

pub fn is_supported_language(code: &str) -> bool {
    SUPPORTED_LANGUAGES.iter().any(|(supported, _)| *supported == code)
}

/// Engine that runs text through an installed language package
#[async_trait]
pub trait PackageTranslator: Send + Sync {
    async fn translate_text(&self, text: &str, source_code: &str, target_code: &str) -> Result<String>;
}

/// Runs the `argos-translate` command line tool
pub struct ArgosCliTranslator {
    binary_path: String,
}

impl ArgosCliTranslator {
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// `--` keeps dialogue lines such as "- Hi" from being read as options
    fn arguments<'a>(text: &'a str, source_code: &'a str, target_code: &'a str) -> [&'a str; 6] {
        ["--from-lang", source_code, "--to-lang", target_code, "--", text]
    }
}

#[async_trait]
impl PackageTranslator for ArgosCliTranslator {
    async fn translate_text(&self, text: &str, source_code: &str, target_code: &str) -> Result<String> {
        debug!("Executing {} {}->{}", self.binary_path, source_code, target_code);

        let output = Command::new(&self.binary_path)
            .args(Self::arguments(text, source_code, target_code))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SubflowError::Translation(format!("Failed to execute argos-translate: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SubflowError::Translation(format!("argos-translate failed: {}", stderr)));
        }

        let translated = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if translated.is_empty() && !text.trim().is_empty() {
            return Err(SubflowError::Translation("Empty translation received".to_string()));
        }
        Ok(translated)
    }
}

/// Provider backed by locally installed translation packages
pub struct LocalPackageProvider {
    resolver: PackageResolver,
    engine: Arc<dyn PackageTranslator>,
    source_language: String,
}

impl LocalPackageProvider {
    pub fn new<S: Into<String>>(
        resolver: PackageResolver,
        engine: Arc<dyn PackageTranslator>,
        source_language: S,
    ) -> Self {
        Self {
            resolver,
            engine,
            source_language: source_language.into(),
        }
    }

    /// Scan the configured package directory and wire up the argos CLI engine
    pub fn from_config(config: &LocalTranslateConfig) -> Result<Self> {
        let installed = match config
            .packages_dir
            .clone()
            .or_else(PackageIndex::default_packages_dir)
        {
            Some(dir) => PackageIndex::scan(dir)?,
            None => {
                warn!("Could not determine translation package directory");
                Vec::new()
            }
        };

        let resolver = PackageResolver::new(installed, config.intermediate_language.clone());
        let engine = Arc::new(ArgosCliTranslator::new(config.binary_path.clone()));
        Ok(Self::new(resolver, engine, config.source_language.clone()))
    }

    pub fn resolver(&self) -> &PackageResolver {
        &self.resolver
    }

    fn normalize_target<'a>(&self, target_language: &'a str) -> &'a str {
        if is_supported_language(target_language) {
            target_language
        } else {
            warn!(
                "Unsupported language: {}. Falling back to {}.",
                target_language, FALLBACK_LANGUAGE
            );
            FALLBACK_LANGUAGE
        }
    }
}

#[async_trait]
impl TranslationProvider for LocalPackageProvider {
    fn name(&self) -> &'static str {
        "Argos"
    }

    async fn translate(&self, entries: &[SubtitleEntry], target_language: &str) -> Vec<SubtitleEntry> {
        let target_code = self.normalize_target(target_language);
        let source_code = self.source_language.as_str();

        if self.resolver.resolve(source_code, target_code).is_none() {
            let error = SubflowError::PackageResolutionFailed {
                source_code: source_code.to_string(),
                target_code: target_code.to_string(),
            };
            warn!("{}; returning subtitles untranslated", error);
            return entries.to_vec();
        }

        info!(
            "Starting local translation of {} entries {}->{}",
            entries.len(),
            source_code,
            target_code
        );

        let mut translated = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.engine.translate_text(&entry.text, source_code, target_code).await {
                Ok(text) => translated.push(entry.with_text(text)),
                Err(e) => {
                    warn!("Translation error for subtitle {}: {}", entry.index, e);
                    translated.push(entry.clone());
                }
            }
        }

        translated
    }
}
