#[cfg(feature = "rodio")]
mod audio_rodio;
mod commands;
mod display;

use crate::commands::{Command, HELP};
use cadenza_captions_youtube::{
    YouTubeCaptionProvider, YouTubeProviderConfig, CONFIG_TEMPLATE as YOUTUBE_CONFIG_TEMPLATE,
};
use cadenza_core::{
    AudioEngine, CadenzaConfig, CaptionProvider, CaptionProviderType, Catalog, ClockEngine,
    CoreError, LyricTrack, LyricsFetcher, Player, PlayerEvent, TomlParseError,
};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    // Check config for logging.enabled before full config load
    let file_logging_enabled = check_file_logging_enabled();
    init_tracing(file_logging_enabled);

    // Load config or create template on first run
    let provider_templates: &[&str] = &[YOUTUBE_CONFIG_TEMPLATE];
    let config = match CadenzaConfig::load_or_create(Some(provider_templates)) {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            println!(
                "Created a config template at {}.\nAdd your tracks and run cadenza again.",
                path.display()
            );
            std::process::exit(0);
        }
        Err(CoreError::ConfigParseError(parse_error)) => {
            report_parse_error(&parse_error, &CadenzaConfig::config_path());
            std::process::exit(1);
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        error!("{e}");
        eprintln!("Fix {} and restart.", CadenzaConfig::config_path().display());
        std::process::exit(1);
    }

    let catalog = match config.catalog() {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    // Create shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    runtime.block_on(run(&config, catalog, cancel_token));

    // Stdin reads block a runtime thread; don't wait on them
    runtime.shutdown_timeout(Duration::from_millis(500));
}

async fn run(config: &CadenzaConfig, catalog: Catalog, cancel_token: CancellationToken) {
    let providers = create_providers(config);
    let provider_names: Vec<_> = providers.iter().map(|p| p.name()).collect();
    info!(
        "Initialized {} caption provider(s): {:?}",
        providers.len(),
        provider_names
    );

    let engine = create_engine();
    let player = Player::new(catalog, engine, &config.player, Some(cancel_token.clone()));
    let fetcher = Arc::new(LyricsFetcher::new(
        player.clone(),
        providers,
        Some(cancel_token.clone()),
    ));

    let player_task = player.clone().start();
    let fetcher_task = fetcher.start();
    tokio::spawn(log_player_events(player.clone()));
    tokio::spawn(show_player_events(player.clone()));

    print!("{}", display::track_list(player.catalog(), None));
    println!("Type 'help' for commands.");

    if config.player.autoplay {
        player.toggle_play().await;
    }

    read_commands(&player, &cancel_token).await;

    cancel_token.cancel();
    if let Err(e) = player_task.await {
        error!("Player task failed: {}", e);
    }
    if let Err(e) = fetcher_task.await {
        error!("Lyrics fetcher task failed: {}", e);
    }
}

/// Read commands from stdin until `quit` or cancellation
async fn read_commands(player: &Player, cancel_token: &CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            () = cancel_token.cancelled() => break,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Input closed, playing until Ctrl+C");
                cancel_token.cancelled().await;
                break;
            }
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        };

        match commands::parse(&line) {
            Ok(None) => {}
            Ok(Some(Command::Player(action))) => player.dispatch(action).await,
            Ok(Some(Command::List)) => {
                let selected = player.state().await.current_index;
                print!("{}", display::track_list(player.catalog(), Some(selected)));
            }
            Ok(Some(Command::Help)) => println!("{HELP}"),
            Ok(Some(Command::Quit)) => break,
            Err(message) => println!("{message}"),
        }
    }
}

#[cfg(feature = "rodio")]
fn create_engine() -> Arc<dyn AudioEngine> {
    match audio_rodio::RodioEngine::open() {
        Ok(engine) => {
            info!("Using rodio audio output");
            Arc::new(engine)
        }
        Err(e) => {
            warn!("No audio output, falling back to silent playback: {}", e);
            Arc::new(ClockEngine::new())
        }
    }
}

#[cfg(not(feature = "rodio"))]
fn create_engine() -> Arc<dyn AudioEngine> {
    warn!("Built without the rodio feature, playback is silent");
    Arc::new(ClockEngine::new())
}

fn create_providers(config: &CadenzaConfig) -> Vec<Box<dyn CaptionProvider>> {
    config
        .lyrics
        .providers
        .iter()
        .filter_map(|provider_type| -> Option<Box<dyn CaptionProvider>> {
            match provider_type {
                CaptionProviderType::Youtube => {
                    let youtube_config =
                        match YouTubeProviderConfig::from_providers(&config.providers) {
                            Ok(Some(cfg)) => cfg,
                            Ok(None) => YouTubeProviderConfig::default(),
                            Err(e) => {
                                error!("Failed to parse YouTube config: {}", e);
                                return None;
                            }
                        };

                    match YouTubeCaptionProvider::new(&youtube_config) {
                        Ok(provider) => {
                            info!("Initializing YouTube caption provider");
                            Some(Box::new(provider))
                        }
                        Err(CoreError::MissingCredential { var }) => {
                            info!("Skipping YouTube caption provider: {} is not set", var);
                            None
                        }
                        Err(e) => {
                            error!("Failed to create YouTube caption provider: {}", e);
                            None
                        }
                    }
                }
            }
        })
        .collect()
}

/// Print track changes, status and the lyric window to stdout
async fn show_player_events(player: Arc<Player>) {
    let mut rx = player.subscribe();
    let mut lyrics = LyricTrack::default();
    let mut shown_line: Option<usize> = None;

    loop {
        match rx.recv().await {
            Ok(PlayerEvent::TrackChanged { track_index }) => {
                lyrics = LyricTrack::default();
                shown_line = None;
                if let Some(track) = player.track(track_index) {
                    println!("\nNow playing {}. {}", track_index + 1, track);
                }
            }
            Ok(PlayerEvent::LyricsLoaded { lyrics: loaded, .. }) => {
                if loaded.is_empty() {
                    println!("(no lyrics)");
                }
                lyrics = loaded;
                shown_line = None;
            }
            Ok(PlayerEvent::PositionSync { position }) => {
                let current = lyrics.current_line_index(position);
                if current.is_some() && current != shown_line {
                    shown_line = current;
                    println!("{}", display::lyric_window(&lyrics, position));
                }
            }
            Ok(PlayerEvent::PlaybackPaused { .. }) => println!("Paused"),
            Ok(PlayerEvent::PlaybackResumed { .. }) => println!("Playing"),
            Ok(PlayerEvent::PlaybackStopped) => println!("Stopped"),
            Ok(PlayerEvent::VolumeChanged { volume }) => {
                println!("Volume {:.0}%", volume * 100.0);
            }
            Ok(PlayerEvent::Error { message }) => println!("Error: {message}"),
            Ok(PlayerEvent::PlaybackStarted { .. }) => {}
            Err(RecvError::Closed) => break,
            Err(RecvError::Lagged(_)) => {}
        }
    }
}

async fn log_player_events(player: Arc<Player>) {
    let mut rx = player.subscribe();

    loop {
        match rx.recv().await {
            Ok(event) => match &event {
                PlayerEvent::TrackChanged { track_index } => {
                    if let Some(track) = player.track(*track_index) {
                        info!("Track changed: {} ({})", track, track.id);
                    }
                }
                PlayerEvent::PlaybackStarted { track_index } => {
                    info!("Playback started: track {}", track_index);
                }
                PlayerEvent::PlaybackPaused { position } => {
                    info!("Playback paused at {:?}", position);
                }
                PlayerEvent::PlaybackResumed { position } => {
                    info!("Playback resumed at {:?}", position);
                }
                PlayerEvent::PlaybackStopped => {
                    info!("Playback stopped");
                }
                PlayerEvent::PositionSync { .. } => {
                    // Samples are traced by the player loop
                }
                PlayerEvent::VolumeChanged { volume } => {
                    info!("Volume set to {}", volume);
                }
                PlayerEvent::LyricsLoaded {
                    track_index,
                    lyrics,
                } => {
                    info!(
                        "Lyrics loaded for track {}: {} lines",
                        track_index,
                        lyrics.len()
                    );
                }
                PlayerEvent::Error { message } => {
                    error!("Player error: {}", message);
                }
            },
            Err(RecvError::Closed) => {
                info!("Player event channel closed");
                break;
            }
            Err(RecvError::Lagged(n)) => {
                info!("Missed {} player events", n);
            }
        }
    }
}

fn report_parse_error(parse_error: &TomlParseError, config_path: &Path) {
    error!("Failed to parse config: {parse_error}");
    eprintln!(
        "Config file {} has a syntax error:\n\n{parse_error}\n\nFix it, or delete the file to regenerate the template.",
        config_path.display()
    );
}

fn check_file_logging_enabled() -> bool {
    // Minimal structs to parse just the logging.enabled field
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let Ok(content) = std::fs::read_to_string(CadenzaConfig::config_path()) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

fn init_tracing(file_logging_enabled: bool) {
    // The terminal is the UI; keep console logs quiet unless asked
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if file_logging_enabled {
        let log_path = cadenza_core::log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    // Fallback: console only
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
