//! subflow - video to translated subtitles
//!
//! Command line entry point: extracts audio with ffmpeg, transcribes it with
//! whisper, translates the transcript and writes SRT files.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subflow::cli::{Args, Commands, ConfigAction, PackagesAction};
use subflow::config::Config;
use subflow::media::AudioExtractorFactory;
use subflow::pipeline::{
    discover_videos, subtitle_output_path, Pipeline, ProcessingResult, ProcessingStatus, ProgressSink,
};
use subflow::setup::SetupManager;
use subflow::subtitle::{generate_srt, read_srt};
use subflow::transcribe::TranscriberFactory;
use subflow::translate::{PackageIndex, TranslationMethod, TranslationOrchestrator};

const DEFAULT_CONFIG_FILE: &str = "subflow.toml";

/// Shows pipeline progress on an indicatif bar
struct ProgressBarSink {
    bar: ProgressBar,
}

impl ProgressBarSink {
    fn new(bar: ProgressBar, label: String) -> Self {
        if let Ok(style) = ProgressStyle::default_bar().template("{prefix:.bold} [{bar:30.cyan/blue}] {percent:>3}% {msg}") {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_prefix(label);
        Self { bar }
    }
}

impl ProgressSink for ProgressBarSink {
    fn on_progress(&self, result: &ProcessingResult) -> subflow::error::Result<()> {
        self.bar.set_position((result.progress * 100.0).round() as u64);
        match result.status {
            ProcessingStatus::Completed => self.bar.finish_with_message(result.message.clone()),
            ProcessingStatus::Error => self.bar.abandon_with_message(result.message.clone()),
            _ => self.bar.set_message(result.message.clone()),
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Keep the guard alive so buffered log lines reach the file
    let _log_guard = setup_logging(args.verbose)?;
    info!("Starting subflow");

    let mut config = load_config(args.config.as_deref())?;
    let subflow_dir = std::env::current_dir()?.join(".subflow");

    match args.command {
        Commands::Config { action: ConfigAction::Init { output, force } } => {
            if output.exists() && !force {
                anyhow::bail!("{} already exists, use --force to overwrite", output.display());
            }
            Config::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
        Commands::Packages { action } => {
            let local = &config.translate.local;
            match action {
                PackagesAction::List => {
                    let packages = match local.packages_dir.clone().or_else(PackageIndex::default_packages_dir) {
                        Some(dir) => PackageIndex::scan(dir)?,
                        None => Vec::new(),
                    };

                    if packages.is_empty() {
                        println!("No translation packages installed.");
                    } else {
                        println!("{:<8} {:<8} {:<10}", "From", "To", "Version");
                        println!("{}", "-".repeat(28));
                        for package in packages {
                            println!(
                                "{:<8} {:<8} {:<10}",
                                package.source_language_code,
                                package.target_language_code,
                                package.package_version.as_deref().unwrap_or("-")
                            );
                        }
                    }
                }
                PackagesAction::Install => {
                    let setup_manager = SetupManager::new(&subflow_dir)?;
                    let installed = setup_manager.install_packages(local).await?;
                    println!("Installed {} translation packages", installed.len());
                }
            }
        }
        Commands::Process {
            input,
            target_lang,
            method,
            output_dir,
        } => {
            let target_language = target_lang.unwrap_or_else(|| config.translate.target_language.clone());
            let method = method.unwrap_or_else(|| config.translate.default_method.clone());

            prepare_backends(&subflow_dir, &mut config, &method, args.skip_checks).await?;
            let pipeline = Pipeline::from_config(&config)?;

            let sink = ProgressBarSink::new(ProgressBar::new(100), display_name(&input));
            let result = pipeline.process(&input, &target_language, &method, &sink).await;

            let output_dir = output_dir.unwrap_or_else(|| parent_dir(&input));
            let srt_path = write_subtitles(&input, &output_dir, &target_language, result).await?;
            println!("Subtitles written to {}", srt_path.display());
        }
        Commands::Batch {
            input_dir,
            target_lang,
            method,
            output_dir,
            concurrency,
        } => {
            let target_language = target_lang.unwrap_or_else(|| config.translate.target_language.clone());
            let method = method.unwrap_or_else(|| config.translate.default_method.clone());
            let concurrency = concurrency.unwrap_or(config.pipeline.batch_concurrency);

            let videos = discover_videos(&input_dir, &config.pipeline.video_extensions)?;
            if videos.is_empty() {
                println!("No video files found in {}", input_dir.display());
                return Ok(());
            }

            prepare_backends(&subflow_dir, &mut config, &method, args.skip_checks).await?;
            let pipeline = Pipeline::from_config(&config)?;

            let multi = MultiProgress::new();
            let results = pipeline
                .process_batch(videos.clone(), &target_language, &method, concurrency, |video| {
                    let bar = multi.add(ProgressBar::new(100));
                    Arc::new(ProgressBarSink::new(bar, display_name(video))) as Arc<dyn ProgressSink>
                })
                .await;

            let output_dir = output_dir.unwrap_or_else(|| input_dir.clone());
            let mut failed = 0;
            for (video, result) in videos.iter().zip(results) {
                match write_subtitles(video, &output_dir, &target_language, result).await {
                    Ok(path) => info!("Wrote {}", path.display()),
                    Err(e) => {
                        failed += 1;
                        error!("Failed to process {}: {:#}", video.display(), e);
                    }
                }
            }

            println!("Processed {} videos, {} failed", videos.len(), failed);
            if failed > 0 {
                anyhow::bail!("{} of {} videos failed", failed, videos.len());
            }
        }
        Commands::Extract { input } => {
            let extractor = AudioExtractorFactory::create_extractor(config.media.clone(), config.audio_dir());
            let audio_path = extractor.extract_audio(&input).await?;
            println!("Audio written to {}", audio_path.display());
        }
        Commands::Transcribe {
            input,
            output,
            language,
        } => {
            if language.is_some() {
                config.transcriber.language = language;
            }
            let transcriber = TranscriberFactory::create_transcriber(config.transcriber.clone());
            let entries = transcriber.transcribe(&input).await?;
            generate_srt(&entries, &output).await?;
            println!("Wrote {} subtitles to {}", entries.len(), output.display());
        }
        Commands::Translate {
            input,
            output,
            target_lang,
            method,
        } => {
            let target_language = target_lang.unwrap_or_else(|| config.translate.target_language.clone());
            let method = method.unwrap_or_else(|| config.translate.default_method.clone());

            let entries = read_srt(&input).await?;
            let orchestrator = TranslationOrchestrator::from_config(&config.translate)?;
            let translated = orchestrator
                .translate_named(&entries, &target_language, &method)
                .await?;

            generate_srt(&translated, &output).await?;
            println!("Wrote {} subtitles to {}", translated.len(), output.display());
        }
    }

    info!("subflow finished");
    Ok(())
}

/// Load `--config`, else `./subflow.toml` when present, else defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path).with_context(|| format!("Loading {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
            Ok(Config::from_file(DEFAULT_CONFIG_FILE)?)
        }
        None => Ok(Config::default()),
    }
}

/// Download a missing whisper model and check the backends a run needs
async fn prepare_backends(subflow_dir: &Path, config: &mut Config, method: &str, skip_checks: bool) -> Result<()> {
    let setup_manager = SetupManager::new(subflow_dir)?;
    setup_manager.ensure_whisper_model(config).await?;

    if skip_checks {
        warn!("Skipping backend availability checks");
        return Ok(());
    }

    let method = TranslationMethod::from_name_or_default(method);
    setup_manager.check_backends(config, method).await?;
    Ok(())
}

/// Write the SRT for a finished run, or turn a failed run into an error
async fn write_subtitles(
    video: &Path,
    output_dir: &Path,
    target_language: &str,
    result: ProcessingResult,
) -> Result<PathBuf> {
    match result.subtitles {
        Some(subtitles) if result.status == ProcessingStatus::Completed => {
            let srt_path = subtitle_output_path(video, output_dir, target_language);
            generate_srt(&subtitles, &srt_path).await?;
            Ok(srt_path)
        }
        _ => Err(anyhow::anyhow!("{}", result.message)),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<WorkerGuard> {
    let log_dir = std::env::current_dir()?.join(".subflow").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Daily rotation
    let file_appender = rolling::daily(&log_dir, "subflow.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("subflow.log").display()
    );

    Ok(guard)
}
