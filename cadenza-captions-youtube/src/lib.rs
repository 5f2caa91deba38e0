//! Caption provider backed by the YouTube Data API v3 captions endpoints.

use async_trait::async_trait;
use cadenza_core::{CaptionFormat, CaptionProvider, CoreError, ProvidersConfig};
use const_format::concatcp;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Provider name used in config file
pub const PROVIDER_NAME: &str = "youtube";

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Environment variable holding the API key unless configured otherwise
pub const DEFAULT_API_KEY_ENV: &str = "YOUTUBE_API_KEY";

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// YouTube-specific configuration (`[providers.youtube]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YouTubeProviderConfig {
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// API root, overridable for proxies and tests
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Preferred caption language (e.g. "en"); the first track is used otherwise
    #[serde(default)]
    pub language: Option<String>,
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.into()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for YouTubeProviderConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            language: None,
        }
    }
}

impl YouTubeProviderConfig {
    /// Extract YouTube config from the dynamic providers config.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be parsed.
    pub fn from_providers(providers: &ProvidersConfig) -> Result<Option<Self>, CoreError> {
        providers.get(PROVIDER_NAME)
    }
}

/// Config template for the YouTube provider.
/// This is appended to the base config template when creating a new config file.
pub const CONFIG_TEMPLATE: &str = concatcp!(
    r#"[providers.youtube]
# The API key is read from this environment variable, never from this file
api_key_env = ""#,
    DEFAULT_API_KEY_ENV,
    r#""
base_url = ""#,
    DEFAULT_BASE_URL,
    r#""
timeout_secs = "#,
    DEFAULT_TIMEOUT_SECS,
    r#"
# Optional: preferred caption language
# language = "en"

"#
);

/// Response from the caption list endpoint. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct CaptionListResponse {
    #[serde(default)]
    items: Vec<CaptionItem>,
}

#[derive(Debug, Deserialize)]
struct CaptionItem {
    id: String,
    #[serde(default)]
    snippet: Option<CaptionSnippet>,
}

#[derive(Debug, Deserialize)]
struct CaptionSnippet {
    #[serde(default)]
    language: Option<String>,
}

impl CaptionListResponse {
    fn pick(self, language: Option<&str>) -> Option<String> {
        let preferred = language.and_then(|lang| {
            self.items.iter().position(|item| {
                item.snippet
                    .as_ref()
                    .and_then(|s| s.language.as_deref())
                    .is_some_and(|l| l.eq_ignore_ascii_case(lang))
            })
        });
        let index = preferred.unwrap_or(0);
        self.items.into_iter().nth(index).map(|item| item.id)
    }
}

/// YouTube caption provider
pub struct YouTubeCaptionProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    language: Option<String>,
}

impl YouTubeCaptionProvider {
    /// Create a provider, reading the API key from the configured
    /// environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingCredential`] if the variable is unset or
    /// empty, or an error if the HTTP client cannot be created.
    pub fn new(config: &YouTubeProviderConfig) -> Result<Self, CoreError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| CoreError::MissingCredential {
                var: config.api_key_env.clone(),
            })?;
        Self::with_api_key(config, api_key)
    }

    /// Create a provider with an explicit API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_api_key(
        config: &YouTubeProviderConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .user_agent("Cadenza/0.1")
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            language: config.language.clone(),
        })
    }

    fn failure(&self, reason: String) -> CoreError {
        CoreError::CaptionProviderFailed {
            provider: self.name().to_string(),
            reason,
        }
    }
}

#[async_trait]
impl CaptionProvider for YouTubeCaptionProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn caption_track_id(&self, video_id: &str) -> Result<Option<String>, CoreError> {
        let url = format!(
            "{}/captions?part=snippet&videoId={}&key={}",
            self.base_url,
            urlencoding::encode(video_id),
            urlencoding::encode(&self.api_key)
        );
        debug!("Listing caption tracks for video {}", video_id);

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            info!("YouTube video {} not found", video_id);
            return Ok(None);
        }

        if !status.is_success() {
            warn!("YouTube caption list returned status: {}", status);
            return Err(self.failure(format!("caption list returned status: {status}")));
        }

        let list: CaptionListResponse = response.json().await?;
        debug!("Video {} has {} caption tracks", video_id, list.items.len());
        Ok(list.pick(self.language.as_deref()))
    }

    async fn caption_body(
        &self,
        caption_id: &str,
        format: CaptionFormat,
    ) -> Result<String, CoreError> {
        let url = format!(
            "{}/captions/{}?tfmt={}&key={}",
            self.base_url,
            urlencoding::encode(caption_id),
            format,
            urlencoding::encode(&self.api_key)
        );
        debug!("Downloading caption track {} as {}", caption_id, format);

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            warn!("YouTube caption download returned status: {}", status);
            return Err(self.failure(format!("caption download returned status: {status}")));
        }

        Ok(response.text().await?)
    }
}
