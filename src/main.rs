mod annotation;
mod app;
mod config;
mod controls;
mod detection;
mod health;
mod landmarks;
mod media;
mod models;
mod onnx;
mod recognizer;
mod stabilizer;

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use clap::Parser;

use app::{AppEvent, AppState};
use config::{Config, Mode};

/// Practice sign language in front of a camera.
#[derive(Parser, Debug)]
#[command(name = "sign-practice", version, about)]
struct Args {
    /// Config file (default: ~/.config/sign-practice/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Perception mode to start in
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Base URL of the sign recognizer
    #[arg(long)]
    recognizer_url: Option<String>,

    /// Latest-frame file written by the capture process
    #[arg(long)]
    frame_path: Option<PathBuf>,

    /// Write the landmark overlay PNG here after every frame
    #[arg(long)]
    overlay_path: Option<PathBuf>,

    /// Write the default config to the config path and exit
    #[arg(long)]
    init_config: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();
    log::info!("Sign practice starting");

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);

    if args.init_config {
        Config::default().save(&config_path)?;
        println!("Wrote default config to {}", config_path.display());
        return Ok(());
    }

    let mut config = Config::load(&config_path);
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(url) = args.recognizer_url {
        config.recognizer.base_url = url;
    }
    if let Some(path) = args.frame_path {
        config.camera.frame_path = path;
    }
    if let Some(path) = args.overlay_path {
        config.detection.overlay_path = Some(path);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = tokio::task::LocalSet::new();
    let result = local.block_on(&runtime, run(config));

    // The stdin reader sits on a blocking thread that never returns on its own.
    drop(local);
    runtime.shutdown_timeout(Duration::from_millis(200));
    result
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (event_tx, event_rx) = async_channel::unbounded::<AppEvent>();
    let mode = config.mode;

    let on_recognized = Box::new(|text: &str| println!("{text}"));
    let state = Rc::new(RefCell::new(AppState::new(
        config,
        event_tx.clone(),
        on_recognized,
    )?));
    log::info!("Recognizer at {}", state.borrow().recognizer.base_url());

    controls::start_listener(event_tx.clone());

    // Ctrl-C tears down like `quit` so the camera is always released.
    {
        let sender = event_tx.clone();
        tokio::task::spawn_local(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = sender.send(AppEvent::Quit).await;
            }
        });
    }

    app::enter_mode(&state, mode);

    while let Ok(event) = event_rx.recv().await {
        let quit = event == AppEvent::Quit;
        app::handle_app_event(&state, event);
        if quit {
            break;
        }
    }
    Ok(())
}
