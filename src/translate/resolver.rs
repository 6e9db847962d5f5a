use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::Result;

/// An installed language-pair capability of the local translator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationPackage {
    pub source_language_code: String,
    pub target_language_code: String,
    pub package_version: Option<String>,
    pub install_path: Option<PathBuf>,
}

impl TranslationPackage {
    pub fn new<S1: Into<String>, S2: Into<String>>(source: S1, target: S2) -> Self {
        Self {
            source_language_code: source.into(),
            target_language_code: target.into(),
            package_version: None,
            install_path: None,
        }
    }

    pub fn matches(&self, source_code: &str, target_code: &str) -> bool {
        self.source_language_code == source_code && self.target_language_code == target_code
    }
}

/// Subset of an argos package's metadata.json
#[derive(Debug, Clone, Deserialize)]
struct PackageMetadata {
    from_code: String,
    to_code: String,
    package_version: Option<String>,
}

/// Installed packages discovered on disk
pub struct PackageIndex;

impl PackageIndex {
    /// Default argos package directory: `$ARGOS_PACKAGES_DIR` or the platform data dir
    pub fn default_packages_dir() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var("ARGOS_PACKAGES_DIR") {
            return Some(PathBuf::from(dir));
        }
        dirs::data_dir().map(|dir| dir.join("argos-translate").join("packages"))
    }

    /// Walk `packages_dir` for package metadata files.
    ///
    /// A missing directory is an empty index. Unreadable metadata is skipped.
    pub fn scan<P: AsRef<Path>>(packages_dir: P) -> Result<Vec<TranslationPackage>> {
        let packages_dir = packages_dir.as_ref();
        if !packages_dir.is_dir() {
            warn!("Translation package directory not found: {}", packages_dir.display());
            return Ok(Vec::new());
        }

        let mut packages = Vec::new();
        for entry in WalkDir::new(packages_dir)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_name() != "metadata.json" {
                continue;
            }

            let content = match std::fs::read_to_string(entry.path()) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Failed to read {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            match serde_json::from_str::<PackageMetadata>(&content) {
                Ok(metadata) => {
                    debug!("Found package {}->{}", metadata.from_code, metadata.to_code);
                    packages.push(TranslationPackage {
                        source_language_code: metadata.from_code,
                        target_language_code: metadata.to_code,
                        package_version: metadata.package_version,
                        install_path: entry.path().parent().map(Path::to_path_buf),
                    });
                }
                Err(e) => warn!("Failed to parse {}: {}", entry.path().display(), e),
            }
        }

        packages.sort_by(|a, b| {
            (&a.source_language_code, &a.target_language_code)
                .cmp(&(&b.source_language_code, &b.target_language_code))
        });
        info!("Found {} installed translation packages", packages.len());
        Ok(packages)
    }
}

/// Lookup of a translation path over installed packages.
///
/// Prefers a direct `(source, target)` package. Otherwise returns the
/// `(source, intermediate)` package as a stand-in; no second hop is composed.
#[derive(Debug, Clone)]
pub struct PackageResolver {
    installed: Vec<TranslationPackage>,
    intermediate_code: String,
}

impl PackageResolver {
    pub fn new<S: Into<String>>(installed: Vec<TranslationPackage>, intermediate_code: S) -> Self {
        Self {
            installed,
            intermediate_code: intermediate_code.into(),
        }
    }

    pub fn installed(&self) -> &[TranslationPackage] {
        &self.installed
    }

    pub fn intermediate_code(&self) -> &str {
        &self.intermediate_code
    }

    pub fn resolve(&self, source_code: &str, target_code: &str) -> Option<TranslationPackage> {
        if let Some(direct) = self.find(source_code, target_code) {
            return Some(direct.clone());
        }

        // TODO: compose source->intermediate->target once a second-hop package lookup exists
        if let Some(intermediate) = self.find(source_code, &self.intermediate_code) {
            info!(
                "No direct package for {}->{}, using {} as intermediate language",
                source_code, target_code, self.intermediate_code
            );
            return Some(intermediate.clone());
        }

        warn!("No suitable translation package found for {}->{}", source_code, target_code);
        None
    }

    fn find(&self, source_code: &str, target_code: &str) -> Option<&TranslationPackage> {
        self.installed
            .iter()
            .find(|package| package.matches(source_code, target_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn resolver(pairs: &[(&str, &str)]) -> PackageResolver {
        let installed = pairs
            .iter()
            .map(|(from, to)| TranslationPackage::new(*from, *to))
            .collect();
        PackageResolver::new(installed, "en")
    }

    #[test]
    fn test_direct_package_preferred() {
        let resolver = resolver(&[("de", "en"), ("de", "fr")]);
        let package = resolver.resolve("de", "fr").unwrap();
        assert!(package.matches("de", "fr"));
    }

    #[test]
    fn test_intermediate_package_used_when_no_direct_path() {
        let resolver = resolver(&[("de", "en"), ("en", "es")]);
        let package = resolver.resolve("de", "fr").unwrap();
        assert!(package.matches("de", "en"));
    }

    #[test]
    fn test_no_path_returns_none() {
        let resolver = resolver(&[("en", "es"), ("en", "fr")]);
        assert_eq!(resolver.resolve("en", "xx"), None);
    }

    #[test]
    fn test_empty_index_returns_none() {
        let resolver = resolver(&[]);
        assert_eq!(resolver.resolve("en", "es"), None);
    }

    #[test]
    fn test_scan_reads_package_metadata() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("translate-en_es/metadata.json")
            .write_str(r#"{"from_code": "en", "to_code": "es", "package_version": "1.0"}"#)
            .unwrap();
        temp.child("translate-en_fr/metadata.json")
            .write_str(r#"{"from_code": "en", "to_code": "fr"}"#)
            .unwrap();
        temp.child("broken/metadata.json").write_str("not json").unwrap();
        temp.child("translate-en_de/model.bin").write_str("weights").unwrap();

        let packages = PackageIndex::scan(temp.path()).unwrap();

        assert_eq!(packages.len(), 2);
        assert!(packages[0].matches("en", "es"));
        assert_eq!(packages[0].package_version.as_deref(), Some("1.0"));
        assert!(packages[1].matches("en", "fr"));
        assert!(packages[1].install_path.as_ref().unwrap().ends_with("translate-en_fr"));
    }

    #[test]
    fn test_scan_missing_dir_is_empty() {
        let packages = PackageIndex::scan("/nonexistent/argos/packages").unwrap();
        assert!(packages.is_empty());
    }
}
