pub mod caption;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod paths;
pub mod player;
pub mod session;
pub mod srt;
pub mod state;
pub mod time;
pub mod tracker;

pub use caption::{fetch_lyrics, CaptionFormat, CaptionProvider};
pub use catalog::{Catalog, Track};
pub use config::{
    build_config_template, CadenzaConfig, CaptionProviderType, InlineLyric, LoggingConfig,
    LyricsConfig, PlayerConfig, ProvidersConfig, TrackConfig,
};

/// Re-export toml error type for config parsing error handling
pub use toml::de::Error as TomlParseError;
pub use engine::{AudioEngine, AudioHandle, ClockEngine, EndCallback};
pub use error::{CoreError, Result};
pub use fetcher::LyricsFetcher;
pub use paths::{config_dir, log_file_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME, LOG_FILE_NAME};
pub use player::Player;
pub use session::PlaybackSession;
pub use srt::{parse as parse_srt, LyricLine, LyricTrack};
pub use state::{
    PlaybackStatus, PlayerAction, PlayerCommand, PlayerEvent, PlayerState, Transition,
};
pub use time::DurationExt;
pub use tracker::{PositionSample, PositionTracker, MIN_SAMPLE_INTERVAL};
