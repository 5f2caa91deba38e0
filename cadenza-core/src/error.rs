use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Config file not found at {path}. A template has been created - please add your tracks and restart.")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Missing required config field: {field}")]
    ConfigMissingField { field: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Subtitle errors
    #[error("Invalid subtitle timestamp {input:?}: {reason}")]
    InvalidTimestamp { input: String, reason: String },

    // Caption errors
    #[error("Caption provider {provider} failed: {reason}")]
    CaptionProviderFailed { provider: String, reason: String },

    #[error("Missing API credential: environment variable {var} is not set")]
    MissingCredential { var: String },

    // Playback errors
    #[error("Failed to load {track}: {reason}")]
    AudioLoad { track: String, reason: String },

    // Network errors
    #[error("Network request failed: {0}")]
    NetworkError(#[from] reqwest::Error),

    // IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
