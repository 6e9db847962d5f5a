use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, Response};
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::{Config, LocalTranslateConfig, TranscriberImplementation};
use crate::error::{Result, SubflowError};
use crate::media::AudioExtractorFactory;
use crate::transcribe::TranscriberFactory;
use crate::translate::{PackageIndex, TranslationMethod, TranslationPackage};

pub struct SetupManager {
    client: Client,
    subflow_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub filename: String,
    pub url: String,
    pub size_mb: f64,
}

impl ModelInfo {
    fn ggml(name: &str, size_mb: f64) -> Self {
        let filename = format!("ggml-{}.bin", name);
        Self {
            name: name.to_string(),
            url: format!("https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}", filename),
            filename,
            size_mb,
        }
    }
}

/// argospm package name for a language pair
pub fn package_name(source_code: &str, target_code: &str) -> String {
    format!("translate-{}_{}", source_code, target_code)
}

/// Configured pairs that have no installed package yet
pub fn missing_pairs(pairs: &[(String, String)], installed: &[TranslationPackage]) -> Vec<(String, String)> {
    pairs
        .iter()
        .filter(|(from, to)| !installed.iter().any(|package| package.matches(from, to)))
        .cloned()
        .collect()
}

impl SetupManager {
    pub fn new<P: AsRef<Path>>(subflow_dir: P) -> Result<Self> {
        let subflow_dir = subflow_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(subflow_dir.join("models"))?;

        let client = Client::builder()
            .user_agent(concat!("subflow/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, subflow_dir })
    }

    /// Make sure every backend the run needs can start.
    ///
    /// The local translator is only required when `method` is Argos.
    pub async fn check_backends(&self, config: &Config, method: TranslationMethod) -> Result<()> {
        info!("Checking backends...");

        AudioExtractorFactory::create_extractor(config.media.clone(), config.audio_dir())
            .check_availability()
            .await?;
        TranscriberFactory::create_transcriber(config.transcriber.clone())
            .check_availability()
            .await?;

        match check_binary(&config.translate.local.binary_path, "--help").await {
            Ok(()) => {}
            Err(e) if method == TranslationMethod::Argos => return Err(e),
            Err(e) => warn!("Local translation unavailable: {}", e),
        }

        info!("All required backends are available");
        Ok(())
    }

    /// Download the whisper.cpp model when the configured one is missing
    pub async fn ensure_whisper_model(&self, config: &mut Config) -> Result<()> {
        if config.transcriber.implementation != TranscriberImplementation::WhisperCpp {
            return Ok(());
        }
        if Path::new(&config.transcriber.model).exists() {
            return Ok(());
        }

        info!("Whisper model not found: {}", config.transcriber.model);
        let model = select_model(&available_models(), &config.transcriber.model)?;
        config.transcriber.model = self.download_model(&model).await?;
        Ok(())
    }

    pub async fn download_model(&self, model: &ModelInfo) -> Result<String> {
        let local_path = self.subflow_dir.join("models").join(&model.filename);

        if local_path.exists() {
            info!("Model {} already exists at {}", model.name, local_path.display());
            return Ok(local_path.to_string_lossy().to_string());
        }

        info!("Downloading {} model ({:.1} MB)...", model.name, model.size_mb);

        let pb = ProgressBar::new((model.size_mb * 1_000_000.0) as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .map_err(|e| SubflowError::Config(format!("Invalid progress template: {}", e)))?
                .progress_chars("#>-"),
        );

        let response = self.client.get(&model.url).send().await?;
        if !response.status().is_success() {
            return Err(SubflowError::BackendUnavailable(format!(
                "Failed to download model {}: HTTP {}",
                model.name,
                response.status()
            )));
        }
        if let Some(length) = response.content_length() {
            pb.set_length(length);
        }

        save_download(response, &local_path, &pb).await?;

        pb.finish_with_message(format!("Downloaded {}", model.name));
        info!("Successfully downloaded {} to {}", model.name, local_path.display());

        Ok(local_path.to_string_lossy().to_string())
    }

    /// Install configured translation packages that are not on disk yet.
    ///
    /// Returns the pairs installed. A failed pair is logged and skipped.
    pub async fn install_packages(&self, config: &LocalTranslateConfig) -> Result<Vec<(String, String)>> {
        check_binary(&config.package_manager_path, "--help").await?;

        let installed = match config
            .packages_dir
            .clone()
            .or_else(PackageIndex::default_packages_dir)
        {
            Some(dir) => PackageIndex::scan(dir)?,
            None => Vec::new(),
        };

        let pending = missing_pairs(&config.install_pairs, &installed);
        if pending.is_empty() {
            info!("All translation packages already installed");
            return Ok(Vec::new());
        }

        info!("Updating package index...");
        run_package_manager(&config.package_manager_path, &["update"]).await?;

        let pb = ProgressBar::new(pending.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .map_err(|e| SubflowError::Config(format!("Invalid progress template: {}", e)))?
                .progress_chars("#>-"),
        );

        let mut done = Vec::new();
        for (from, to) in pending {
            let name = package_name(&from, &to);
            pb.set_message(name.clone());

            match run_package_manager(&config.package_manager_path, &["install", &name]).await {
                Ok(()) => {
                    info!("Installed {}", name);
                    done.push((from, to));
                }
                Err(e) => warn!("Failed to install {}: {}", name, e),
            }
            pb.inc(1);
        }

        pb.finish_with_message(format!("Installed {} packages", done.len()));
        Ok(done)
    }

    pub fn subflow_dir(&self) -> &Path {
        &self.subflow_dir
    }
}

pub fn available_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo::ggml("tiny", 39.0),
        ModelInfo::ggml("tiny.en", 39.0),
        ModelInfo::ggml("base", 142.0),
        ModelInfo::ggml("base.en", 142.0),
        ModelInfo::ggml("small", 244.0),
        ModelInfo::ggml("small.en", 244.0),
        ModelInfo::ggml("medium", 769.0),
        ModelInfo::ggml("large-v3", 1550.0),
    ]
}

/// Pick the model named by `preferred` (a name or a `ggml-<name>.bin` path), else base
pub fn select_model(models: &[ModelInfo], preferred: &str) -> Result<ModelInfo> {
    let filename = Path::new(preferred)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(preferred);

    if let Some(model) = models
        .iter()
        .find(|m| m.name == preferred || m.filename == filename)
    {
        return Ok(model.clone());
    }

    if let Some(model) = models.iter().find(|m| m.name == "base") {
        warn!("Preferred model '{}' not found, using 'base' instead", preferred);
        return Ok(model.clone());
    }

    Err(SubflowError::Config("No suitable whisper model found".to_string()))
}

async fn check_binary(binary_path: &str, check_arg: &str) -> Result<()> {
    let output = Command::new(binary_path)
        .arg(check_arg)
        .output()
        .await
        .map_err(|e| SubflowError::BackendUnavailable(format!("{} ({})", binary_path, e)))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(SubflowError::BackendUnavailable(format!(
            "{} exited with {}",
            binary_path, output.status
        )))
    }
}

async fn run_package_manager(binary_path: &str, args: &[&str]) -> Result<()> {
    let output = Command::new(binary_path)
        .args(args)
        .output()
        .await
        .map_err(|e| SubflowError::BackendUnavailable(format!("{} ({})", binary_path, e)))?;

    if !output.status.success() {
        return Err(SubflowError::Translation(format!(
            "{} {} failed: {}",
            binary_path,
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

/// Stream a response body into `<path>.tmp`, then move it to `path`.
///
/// The partial file is removed when the transfer fails.
async fn save_download(mut response: Response, path: &Path, pb: &ProgressBar) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    let written = async {
        let mut file = async_fs::File::create(&temp_path).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            pb.inc(chunk.len() as u64);
        }
        file.flush().await?;
        Ok::<(), SubflowError>(())
    }
    .await;

    if let Err(e) = written {
        warn!("Download of {} failed, removing partial file", path.display());
        if let Err(remove_err) = async_fs::remove_file(&temp_path).await {
            warn!("Failed to remove {}: {}", temp_path.display(), remove_err);
        }
        return Err(e);
    }

    async_fs::rename(&temp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_name() {
        assert_eq!(package_name("en", "es"), "translate-en_es");
    }

    #[test]
    fn test_missing_pairs_skips_installed() {
        let pairs = Config::default().translate.local.install_pairs;
        let installed = vec![TranslationPackage::new("en", "es"), TranslationPackage::new("en", "ar")];

        let missing = missing_pairs(&pairs, &installed);

        let targets: Vec<&str> = missing.iter().map(|(_, to)| to.as_str()).collect();
        assert_eq!(targets, vec!["fr", "de", "it", "pt"]);
    }

    #[test]
    fn test_select_model_by_name_or_path() {
        let models = available_models();
        assert_eq!(select_model(&models, "small").unwrap().name, "small");
        assert_eq!(select_model(&models, "models/ggml-tiny.en.bin").unwrap().name, "tiny.en");
        assert_eq!(select_model(&models, "huge").unwrap().name, "base");
    }

    #[tokio::test]
    async fn test_missing_package_manager_is_unavailable() {
        let temp = tempfile::tempdir().unwrap();
        let manager = SetupManager::new(temp.path().join(".subflow")).unwrap();
        assert!(manager.subflow_dir().join("models").is_dir());

        let mut config = Config::default().translate.local;
        config.package_manager_path = "/nonexistent/argospm".to_string();

        let err = manager.install_packages(&config).await.unwrap_err();
        assert!(matches!(err, SubflowError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_existing_model_is_not_downloaded() {
        let temp = tempfile::tempdir().unwrap();
        let model_path = temp.path().join("ggml-base.bin");
        std::fs::write(&model_path, b"weights").unwrap();

        let manager = SetupManager::new(temp.path().join(".subflow")).unwrap();
        let mut config = Config::default();
        config.transcriber.model = model_path.to_string_lossy().to_string();

        manager.ensure_whisper_model(&mut config).await.unwrap();
        assert_eq!(config.transcriber.model, model_path.to_string_lossy());
    }

    #[tokio::test]
    async fn test_interrupted_download_leaves_no_partial_file() {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\npartial")
                .await
                .unwrap();
            socket.flush().await.unwrap();
        });

        let client = Client::builder().no_proxy().build().unwrap();
        let response = client
            .get(format!("http://{}/ggml-base.bin", addr))
            .send()
            .await
            .unwrap();
        server.await.unwrap();

        let temp = tempfile::tempdir().unwrap();
        let model_path = temp.path().join("ggml-base.bin");
        let result = save_download(response, &model_path, &ProgressBar::hidden()).await;

        assert!(result.is_err());
        assert!(!model_path.exists());
        assert!(!model_path.with_extension("tmp").exists());
    }
}
