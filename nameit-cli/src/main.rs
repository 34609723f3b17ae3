// NameIt command line interface
// Point the camera at something, press Enter, see what four models call it

mod terminal;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use nameit_eye::camera::{CameraManager, FrameSource, ReplaySource};
use nameit_eye::config::VisionConfig;
use nameit_eye::controller::{UiEvent, ViewController};
use nameit_eye::models::{ModelKind, ModelRegistry, ModelStore};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use terminal::TerminalView;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nameit")]
#[command(about = "NameIt - classify a photo with ResNet50, VGG16, MobileNet and NASNetMobile", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Directory holding model and label files
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the camera screen (Enter captures or resumes, q quits)
    Run {
        /// Replay JPEG/PNG frames from a directory instead of a camera
        #[arg(long)]
        frames: Option<PathBuf>,

        /// Camera device index
        #[arg(long)]
        camera: Option<u32>,
    },

    /// Download model and label files that are missing
    Fetch {
        /// Only these models (ResNet50, VGG16, MobileNet, NASNetMobile)
        #[arg(long = "model")]
        models: Vec<String>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(model_dir) = cli.model_dir {
        config.model_path = model_dir;
    }

    match cli.command {
        Commands::Run { frames, camera } => {
            if let Some(camera_id) = camera {
                config.camera_id = camera_id;
            }
            config.validate().map_err(|e| anyhow!("Invalid configuration: {}", e))?;
            run_screen(config, frames).await?;
        }
        Commands::Fetch { models } => {
            fetch_models(config, &models).await?;
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<VisionConfig> {
    match path {
        Some(path) => VisionConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(VisionConfig::default()),
    }
}

fn frame_source(config: &VisionConfig, frames: Option<PathBuf>) -> Result<Box<dyn FrameSource>> {
    if let Some(dir) = frames {
        return Ok(Box::new(ReplaySource::from_dir(&dir)?));
    }

    #[cfg(feature = "opencv")]
    {
        Ok(Box::new(nameit_eye::camera::OpenCvSource::new(config)))
    }

    #[cfg(not(feature = "opencv"))]
    {
        let _ = config;
        bail!("No camera backend available: pass --frames DIR or build with --features opencv")
    }
}

async fn run_screen(config: VisionConfig, frames: Option<PathBuf>) -> Result<()> {
    let config = Arc::new(config);
    let source = frame_source(&config, frames)?;

    info!("Loading models from {:?}", config.model_path);
    let registry = Arc::new(ModelRegistry::load(config.clone()).await);
    if registry.kinds().all(|kind| !registry.is_ready(kind)) {
        warn!("No model could be loaded, run `nameit fetch` first");
    }

    let camera = Arc::new(CameraManager::new(config, source));
    let view = TerminalView::new();
    let controller = ViewController::new(camera, registry, view);

    let (events_tx, events_rx) = mpsc::channel(16);
    spawn_stdin_reader(events_tx.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = events_tx.send(UiEvent::Shutdown).await;
        }
    });

    println!("Press Enter to capture or resume, q to quit");
    controller.run(events_rx).await;
    Ok(())
}

/// Stdin is read on a plain thread so a pending read never holds up runtime
/// shutdown
fn spawn_stdin_reader(events: mpsc::Sender<UiEvent>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let event = match line {
                Ok(line) => parse_command(&line),
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    UiEvent::Shutdown
                }
            };
            if events.blocking_send(event).is_err() || event == UiEvent::Shutdown {
                return;
            }
        }
        let _ = events.blocking_send(UiEvent::Shutdown);
    });
}

fn parse_command(line: &str) -> UiEvent {
    match line.trim() {
        "q" | "quit" | "exit" => UiEvent::Shutdown,
        _ => UiEvent::Tap,
    }
}

async fn fetch_models(config: VisionConfig, names: &[String]) -> Result<()> {
    let selected = names
        .iter()
        .map(|name| ModelKind::from_name(name).ok_or_else(|| anyhow!("Unknown model: {}", name)))
        .collect::<Result<Vec<_>>>()?;

    let config = Arc::new(config);
    let store = ModelStore::new(config.clone());
    store.ensure_model_dir()?;

    let mut failed = 0;
    for spec in &config.models {
        if !selected.is_empty() && !selected.contains(&spec.kind) {
            continue;
        }
        match store.resolve(spec).await {
            Ok(files) => println!("{:<14} {}", spec.kind.name(), files.model.display()),
            Err(e) => {
                error!("Failed to fetch {}: {}", spec.kind, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} model(s) could not be fetched", failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(""), UiEvent::Tap);
        assert_eq!(parse_command("  \n"), UiEvent::Tap);
        assert_eq!(parse_command("q"), UiEvent::Shutdown);
        assert_eq!(parse_command(" quit "), UiEvent::Shutdown);
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from([
            "nameit",
            "run",
            "--frames",
            "shots",
            "--model-dir",
            "/tmp/models",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.model_dir, Some(PathBuf::from("/tmp/models")));
        match cli.command {
            Commands::Run { frames, camera } => {
                assert_eq!(frames, Some(PathBuf::from("shots")));
                assert_eq!(camera, None);
            }
            _ => panic!("Expected run"),
        }
    }

    #[test]
    fn test_fetch_accepts_repeated_models() {
        let cli = Cli::try_parse_from(["nameit", "fetch", "--model", "VGG16", "--model", "MobileNet"]).unwrap();
        match cli.command {
            Commands::Fetch { models } => assert_eq!(models, vec!["VGG16", "MobileNet"]),
            _ => panic!("Expected fetch"),
        }
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/nameit.toml"))).is_err());
        assert!(load_config(None).is_ok());
    }
}
