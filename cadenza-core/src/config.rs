use crate::catalog::{Catalog, Track};
use crate::error::{CoreError, Result};
use crate::srt::{LyricLine, LyricTrack};
use crate::time::duration_from_secs_f64;
use const_format::concatcp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default position sampling cadence
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 500;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CadenzaConfig {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub lyrics: LyricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Provider-specific sections, parsed by the provider crates
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub tracks: Vec<TrackConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// How often the playback position is sampled
    #[serde(default = "default_sample_interval")]
    pub sample_interval_ms: u64,
    /// Initial volume, 0.0 to 1.0
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Start the first track on launch
    #[serde(default)]
    pub autoplay: bool,
}

const fn default_sample_interval() -> u64 {
    DEFAULT_SAMPLE_INTERVAL_MS
}

const fn default_volume() -> f32 {
    0.5
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval(),
            volume: default_volume(),
            autoplay: false,
        }
    }
}

impl PlayerConfig {
    #[must_use]
    pub const fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsConfig {
    /// Caption providers, tried in order
    #[serde(default = "default_providers")]
    pub providers: Vec<CaptionProviderType>,
}

fn default_providers() -> Vec<CaptionProviderType> {
    vec![CaptionProviderType::Youtube]
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionProviderType {
    Youtube,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Also write logs to a file
    #[serde(default)]
    pub enabled: bool,
}

/// Dynamic provider sections (`[providers.<name>]`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ProvidersConfig(toml::Table);

impl ProvidersConfig {
    /// Deserialize the section for one provider, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the section exists but does not match `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.0
            .get(name)
            .map(|value| value.clone().try_into::<T>())
            .transpose()
            .map_err(CoreError::from)
    }
}

/// A `[[tracks]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackConfig {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub audio_file: PathBuf,
    #[serde(default)]
    pub album_art: Option<PathBuf>,
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub caption_video_id: Option<String>,
    #[serde(default)]
    pub subtitle_file: Option<PathBuf>,
    #[serde(default)]
    pub lyrics: Vec<InlineLyric>,
}

/// Inline lyric line: `{ time = 1.5, text = "..." }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineLyric {
    /// Seconds from track start
    pub time: f64,
    pub text: String,
}

impl TrackConfig {
    fn to_track(&self) -> Result<Track> {
        let mut track = Track::new(&self.id, &self.title, &self.artist, &self.audio_file);
        track.album_art.clone_from(&self.album_art);
        track.caption_video_id.clone_from(&self.caption_video_id);
        track.subtitle_file.clone_from(&self.subtitle_file);

        if let Some(secs) = self.duration_secs {
            track.duration = Some(duration_from_secs_f64(secs).ok_or_else(|| {
                CoreError::ConfigInvalid {
                    message: format!("tracks.{}.duration_secs must be non-negative", self.id),
                }
            })?);
        }

        if !self.lyrics.is_empty() {
            let lines = self
                .lyrics
                .iter()
                .map(|lyric| {
                    let timestamp = duration_from_secs_f64(lyric.time).ok_or_else(|| {
                        CoreError::ConfigInvalid {
                            message: format!(
                                "tracks.{}.lyrics time {} must be non-negative",
                                self.id, lyric.time
                            ),
                        }
                    })?;
                    let text = lyric.text.trim();
                    if text.is_empty() {
                        return Err(CoreError::ConfigInvalid {
                            message: format!(
                                "tracks.{}.lyrics entry at {}s has no text",
                                self.id, lyric.time
                            ),
                        });
                    }
                    Ok(LyricLine::new(timestamp, text))
                })
                .collect::<Result<Vec<_>>>()?;
            track.lyrics = Some(LyricTrack::new(lines));
        }

        Ok(track)
    }
}

impl CadenzaConfig {
    /// Get the configuration directory path (~/.config/cadenza/)
    #[must_use]
    pub fn config_dir() -> PathBuf {
        crate::paths::config_dir()
    }

    /// Get the config file path (~/.config/cadenza/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from file or create template on first run
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after writing a template on first
    /// run, or an error if the file cannot be read or parsed.
    pub fn load_or_create(provider_templates: Option<&[&str]>) -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(&config_path, build_config_template(provider_templates))?;

            return Err(CoreError::ConfigNotFound { path: config_path });
        }

        Self::load(&config_path)
    }

    /// Load config from a specific file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid config TOML.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check field values that serde cannot express
    ///
    /// # Errors
    ///
    /// Returns the first missing or invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.tracks.is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "tracks".to_string(),
            });
        }
        if self.player.sample_interval_ms == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "player.sample_interval_ms must be greater than zero".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.player.volume) {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "player.volume must be between 0.0 and 1.0, got {}",
                    self.player.volume
                ),
            });
        }
        for (i, track) in self.tracks.iter().enumerate() {
            if track.id.trim().is_empty() {
                return Err(CoreError::ConfigMissingField {
                    field: format!("tracks[{i}].id"),
                });
            }
            if track.audio_file.as_os_str().is_empty() {
                return Err(CoreError::ConfigMissingField {
                    field: format!("tracks[{i}].audio_file"),
                });
            }
        }
        Ok(())
    }

    /// Build the track catalog from the `[[tracks]]` entries
    ///
    /// # Errors
    ///
    /// Returns an error if a track carries an invalid duration or lyric time.
    pub fn catalog(&self) -> Result<Catalog> {
        let tracks = self
            .tracks
            .iter()
            .map(TrackConfig::to_track)
            .collect::<Result<Vec<_>>>()?;
        Ok(Catalog::new(tracks))
    }
}

/// Assemble the first-run config file from the base template, the provider
/// sections and the example track.
#[must_use]
pub fn build_config_template(provider_templates: Option<&[&str]>) -> String {
    let mut template = String::from(CONFIG_TEMPLATE);
    for provider_template in provider_templates.unwrap_or_default() {
        template.push_str(provider_template);
    }
    template.push_str(TRACKS_TEMPLATE);
    template
}

const CONFIG_TEMPLATE: &str = concatcp!(
    r#"# Cadenza Configuration
# ~/.config/cadenza/config.toml

[player]
# How often the playback position is sampled for lyric highlighting
sample_interval_ms = "#,
    DEFAULT_SAMPLE_INTERVAL_MS,
    r#"
volume = 0.5
autoplay = false

[lyrics]
# Caption providers, tried in order: "youtube"
providers = ["youtube"]

[logging]
# Also write logs to ~/.cache/cadenza/cadenza.log
enabled = false

"#
);

const TRACKS_TEMPLATE: &str = r#"# Add one [[tracks]] table per song. Lyrics come from, in order:
# inline `lyrics`, a local `subtitle_file` (SRT), or the caption track of
# `caption_video_id`.
#
# [[tracks]]
# id = "harleys-in-hawaii"
# title = "Harleys In Hawaii"
# artist = "Katy Perry"
# audio_file = "/home/me/Music/HarleysInHawaii.mp3"
# album_art = "/home/me/Music/harleys.png"
# duration_secs = 185.0
# caption_video_id = ""
# subtitle_file = "/home/me/Music/HarleysInHawaii.srt"
# lyrics = [
#   { time = 0.0, text = "First line" },
#   { time = 4.5, text = "Second line" },
# ]
"#;
