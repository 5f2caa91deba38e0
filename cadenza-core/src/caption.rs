use crate::error::CoreError;
use crate::srt::{self, LyricTrack};
use async_trait::async_trait;
use tracing::{info, warn};

/// Subtitle formats a caption service can render a track in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionFormat {
    Srt,
}

impl CaptionFormat {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
        }
    }
}

impl std::fmt::Display for CaptionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for caption services that host subtitle tracks for videos
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Look up the caption track of a video. `Ok(None)` means the video has
    /// no caption track.
    async fn caption_track_id(&self, video_id: &str) -> Result<Option<String>, CoreError>;

    /// Download the body of a caption track in the given format
    async fn caption_body(
        &self,
        caption_id: &str,
        format: CaptionFormat,
    ) -> Result<String, CoreError>;
}

/// Fetch and parse the lyrics carried by a video's caption track.
///
/// Never fails: a missing caption track, a network error or an unusable body
/// is logged and yields an empty [`LyricTrack`].
pub async fn fetch_lyrics(provider: &dyn CaptionProvider, video_id: &str) -> LyricTrack {
    fetch_lyrics_with(provider, video_id, srt::parse).await
}

/// Same as [`fetch_lyrics`] with a caller-supplied parser.
pub async fn fetch_lyrics_with<F>(
    provider: &dyn CaptionProvider,
    video_id: &str,
    parse: F,
) -> LyricTrack
where
    F: FnOnce(&str) -> LyricTrack + Send,
{
    let caption_id = match provider.caption_track_id(video_id).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            info!(
                "{} has no caption track for video {}",
                provider.name(),
                video_id
            );
            return LyricTrack::default();
        }
        Err(e) => {
            warn!(
                "{} caption lookup failed for video {}: {}",
                provider.name(),
                video_id,
                e
            );
            return LyricTrack::default();
        }
    };

    let body = match provider.caption_body(&caption_id, CaptionFormat::Srt).await {
        Ok(body) => body,
        Err(e) => {
            warn!(
                "{} caption download failed for track {}: {}",
                provider.name(),
                caption_id,
                e
            );
            return LyricTrack::default();
        }
    };

    let lyrics = parse(&body);
    info!(
        "Parsed {} lyric lines from {} caption track {}",
        lyrics.len(),
        provider.name(),
        caption_id
    );
    lyrics
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory caption service recording the calls it receives
    pub struct StaticCaptions {
        pub caption_id: Result<Option<String>, String>,
        pub body: Result<String, String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl StaticCaptions {
        pub fn new(caption_id: Option<&str>, body: &str) -> Self {
            Self {
                caption_id: Ok(caption_id.map(str::to_string)),
                body: Ok(body.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failure(reason: &str) -> CoreError {
            CoreError::CaptionProviderFailed {
                provider: "static".to_string(),
                reason: reason.to_string(),
            }
        }
    }

    #[async_trait]
    impl CaptionProvider for StaticCaptions {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn caption_track_id(&self, video_id: &str) -> Result<Option<String>, CoreError> {
            self.calls.lock().unwrap().push(format!("list:{video_id}"));
            self.caption_id.clone().map_err(|r| Self::failure(&r))
        }

        async fn caption_body(
            &self,
            caption_id: &str,
            format: CaptionFormat,
        ) -> Result<String, CoreError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("body:{caption_id}:{format}"));
            self.body.clone().map_err(|r| Self::failure(&r))
        }
    }

    const BODY: &str = "1\n00:00:01,500 --> 00:00:03,000\nHello\n\n";

    #[tokio::test]
    async fn test_fetch_lyrics_two_steps() {
        let provider = StaticCaptions::new(Some("cap-1"), BODY);
        let lyrics = fetch_lyrics(&provider, "vid").await;

        assert_eq!(lyrics.len(), 1);
        assert_eq!(lyrics.lines()[0].timestamp, Duration::from_millis(1500));
        assert_eq!(
            *provider.calls.lock().unwrap(),
            vec!["list:vid".to_string(), "body:cap-1:srt".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fetch_lyrics_no_caption_track() {
        let provider = StaticCaptions::new(None, BODY);
        let lyrics = fetch_lyrics(&provider, "vid").await;

        assert!(lyrics.is_empty());
        // The body is never requested without a caption id
        assert_eq!(provider.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_lyrics_lookup_error() {
        let mut provider = StaticCaptions::new(Some("cap-1"), BODY);
        provider.caption_id = Err("quota exceeded".to_string());

        assert!(fetch_lyrics(&provider, "vid").await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_lyrics_body_error() {
        let mut provider = StaticCaptions::new(Some("cap-1"), BODY);
        provider.body = Err("forbidden".to_string());

        assert!(fetch_lyrics(&provider, "vid").await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_lyrics_with_custom_parser() {
        let provider = StaticCaptions::new(Some("cap-1"), "ignored");
        let lyrics = fetch_lyrics_with(&provider, "vid", |_| LyricTrack::default()).await;
        assert!(lyrics.is_empty());
    }
}
