use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use iris::cache::{CacheManager, ControlMessage, HttpFetch};
use iris::capture::{read_ppm, FrameSource, StillSource, SyntheticSource};
use iris::config::Settings;
use iris::labels::LabelStore;
use iris::model::{EnvCapabilities, ExecutionConfig, FlatScoreLoader, SessionError, SessionManager};
use iris::realtime::RealtimeClassifier;
use iris::speech::ConsoleAnnouncer;
use iris::ui::ConsoleSink;

/// Class count assumed by the placeholder execution provider.
const DEFAULT_CLASS_COUNT: usize = 1000;

#[derive(Parser)]
#[command(name = "iris", about = "Offline-first on-device image classification")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the realtime classification loop until interrupted
    Run {
        /// Classify a PPM still on each tick instead of the synthetic feed
        #[arg(long)]
        source: Option<PathBuf>,
        /// Speak the top label when it changes
        #[arg(long)]
        speak: bool,
    },
    /// Classify a single PPM frame and print the ranking
    Classify {
        image: PathBuf,
        /// Speak the top label
        #[arg(long)]
        speak: bool,
    },
    /// Manage the offline asset cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Precache the asset manifest into the current version's generation
    Install,
    /// Activate the current version now, deleting superseded generations
    Activate,
    /// Delete every cache generation, forcing a rebuild
    Clear,
}

/// Main entry point for the iris application
///
/// Parses command line arguments and dispatches the three modes of
/// operation: the realtime loop, one-shot classification, and cache
/// management.
///
/// # Errors
/// Returns an error if configuration loading or component setup fails;
/// per-cycle inference failures never propagate here.
#[tokio::main]
async fn main() -> Result<()> {
    // Load settings first
    let settings = Settings::new().context("failed to load configuration")?;

    // Initialize the subscriber first, before any file operations
    let file_appender = tracing_appender::rolling::RollingFileAppender::new(
        tracing_appender::rolling::Rotation::DAILY,
        // Use log file path from settings, or default to "logs"
        settings.logging.file.as_deref().unwrap_or_else(|| Path::new("logs")),
        "iris",
    );

    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        // Disable ANSI colors for cleaner log files
        .with_ansi(false)
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .with_max_level(log_level(&settings.logging.level))
        .init();

    info!("Iris starting up...");

    let cli = Cli::parse();

    let manager = Arc::new(
        CacheManager::new(&settings.cache, Arc::new(HttpFetch::new()))
            .context("failed to initialize asset cache")?,
    );

    match cli.command {
        Command::Cache { action } => cache_command(&manager, action).await,
        Command::Run { source, speak } => run(settings, manager, source, speak).await,
        Command::Classify { image, speak } => classify(settings, manager, image, speak).await,
    }
}

fn log_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    }
}

async fn cache_command(manager: &Arc<CacheManager>, action: CacheAction) -> Result<()> {
    match action {
        CacheAction::Install => {
            let report = manager.install().await.context("cache install failed")?;
            println!(
                "precache: {} cached, {} already present, {} failed",
                report.cached, report.skipped, report.failed
            );
        }
        CacheAction::Activate => {
            manager
                .handle(ControlMessage::ActivateNow)
                .context("cache activation failed")?;
            println!("cache activated: only the current generations remain");
        }
        CacheAction::Clear => {
            manager
                .handle(ControlMessage::ClearCache)
                .context("cache clear failed")?;
            println!("all cache generations deleted");
        }
    }
    Ok(())
}

/// Wires the label store, session manager and loop together.
fn build_classifier(
    settings: &Settings,
    manager: &Arc<CacheManager>,
    speak: bool,
) -> Arc<RealtimeClassifier> {
    let labels = Arc::new(LabelStore::new());

    // Fire-and-forget label load; lookups degrade gracefully until it
    // lands.
    {
        let labels = Arc::clone(&labels);
        let manager = Arc::clone(manager);
        let path = settings.labels.path.clone();
        tokio::spawn(async move {
            labels.load(&manager, &path).await;
        });
    }

    let env = EnvCapabilities::detect(settings.runtime.shared_memory);
    let exec = ExecutionConfig::for_env(&env);
    info!(
        "Execution config: {} thread(s), simd {} ({} hardware threads, shared memory {})",
        exec.threads, exec.simd, env.hardware_concurrency, env.shared_memory
    );

    let sessions = Arc::new(SessionManager::new(
        Arc::new(FlatScoreLoader::new(DEFAULT_CLASS_COUNT, settings.realtime.input_size)),
        Arc::clone(manager),
        settings.model.path.clone(),
        exec,
    ));

    Arc::new(RealtimeClassifier::new(
        sessions,
        labels,
        Arc::new(ConsoleSink),
        Arc::new(ConsoleAnnouncer),
        settings.realtime.clone(),
        speak || settings.speech.enabled,
    ))
}

async fn run(
    settings: Settings,
    manager: Arc<CacheManager>,
    source: Option<PathBuf>,
    speak: bool,
) -> Result<()> {
    // First load: precache the manifest and activate this version. Both
    // tolerate partial failure; offline startup proceeds on whatever is
    // already cached.
    match manager.install().await {
        Ok(report) if report.failed > 0 => {
            warn!("{} manifest asset(s) failed to precache; continuing", report.failed);
        }
        Ok(_) => {}
        Err(e) => warn!("Cache install failed, continuing with existing cache: {}", e),
    }
    manager.activate().context("cache activation failed")?;

    let classifier = build_classifier(&settings, &manager, speak);

    let frames: Box<dyn FrameSource> = match source {
        Some(path) => Box::new(StillSource::from_ppm(&path).context("failed to read frame")?),
        None => Box::new(SyntheticSource::new(settings.realtime.input_size as u32)),
    };

    classifier
        .attach(frames)
        .await
        .map_err(|e| anyhow::anyhow!("failed to arm realtime loop: {e}"))?;
    Arc::clone(&classifier)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start realtime loop: {e}"))?;

    println!("classifying; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("failed to wait for interrupt")?;
    classifier.stop().await;
    Ok(())
}

async fn classify(
    settings: Settings,
    manager: Arc<CacheManager>,
    image: PathBuf,
    speak: bool,
) -> Result<()> {
    let classifier = build_classifier(&settings, &manager, speak);
    let frame = read_ppm(&image).context("failed to read frame")?;

    match classifier.classify_frame(&frame).await {
        Ok(_ranking) => Ok(()),
        Err(e) => {
            if let Some(SessionError::NetworkRequired) = e.downcast_ref::<SessionError>() {
                println!("model not yet cached: connect once to initialize, then retry offline");
            }
            Err(anyhow::anyhow!("classification failed: {e}"))
        }
    }
}
