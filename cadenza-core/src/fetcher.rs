//! Lyrics fetcher that resolves the lyrics of each newly started track.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::caption::{self, CaptionProvider};
use crate::catalog::Track;
use crate::player::Player;
use crate::srt::{self, LyricTrack};
use crate::state::{PlaybackStatus, PlayerAction, PlayerEvent};

/// Lyrics fetcher that listens for track changes and loads lyrics into the
/// player
pub struct LyricsFetcher {
    player: Arc<Player>,
    providers: Vec<Box<dyn CaptionProvider>>,
    cancel_token: CancellationToken,
}

impl LyricsFetcher {
    /// Create a new lyrics fetcher
    ///
    /// # Arguments
    /// * `player` - Player to listen to and load lyrics into
    /// * `providers` - Caption providers to try in order
    /// * `cancel_token` - Optional external cancellation token for graceful shutdown
    pub fn new(
        player: Arc<Player>,
        providers: Vec<Box<dyn CaptionProvider>>,
        cancel_token: Option<CancellationToken>,
    ) -> Self {
        Self {
            player,
            providers,
            cancel_token: cancel_token.unwrap_or_default(),
        }
    }

    /// Get a clone of the cancellation token
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Start the lyrics fetcher in a background task
    #[must_use]
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the lyrics fetching loop
    async fn run(&self) {
        info!("Initializing lyrics fetching handler");

        let mut rx = self.player.subscribe();

        // A track may already be playing before we subscribed
        let state = self.player.state().await;
        if state.status != PlaybackStatus::Stopped && state.lyrics.is_empty() {
            self.load_lyrics(state.current_index).await;
        }

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!("Lyrics fetcher shutting down");
                    break;
                }
                event = rx.recv() => {
                    match event {
                        Ok(PlayerEvent::TrackChanged { track_index }) => {
                            self.load_lyrics(track_index).await;
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(n)) => {
                            debug!("Lyrics fetcher skipped {} player events", n);
                        }
                        Ok(_) => {}
                    }
                }
            }
        }
    }

    /// Resolve lyrics for a catalog entry and hand them to the player
    async fn load_lyrics(&self, track_index: usize) {
        let Some(track) = self.player.track(track_index) else {
            warn!("Track changed to unknown catalog entry {}", track_index);
            return;
        };

        // A provider may hang for its whole HTTP timeout
        let lyrics = tokio::select! {
            () = self.cancel_token.cancelled() => {
                debug!("Lyrics fetch for {} cancelled", track);
                return;
            }
            lyrics = self.resolve(track) => lyrics,
        };
        info!("Loaded {} lyric lines for {}", lyrics.len(), track);

        self.player
            .dispatch(PlayerAction::LyricsLoaded {
                track_index,
                lyrics,
            })
            .await;
    }

    /// Inline lyrics win, then a local subtitle file, then caption providers.
    /// Each source that yields no lines falls through to the next.
    pub async fn resolve(&self, track: &Track) -> LyricTrack {
        if let Some(lyrics) = track.lyrics.as_ref().filter(|l| !l.is_empty()) {
            debug!("Using catalog lyrics for {}", track);
            return lyrics.clone();
        }

        if let Some(path) = &track.subtitle_file {
            let lyrics = read_subtitle_file(path).await;
            if !lyrics.is_empty() {
                return lyrics;
            }
        }

        if let Some(video_id) = &track.caption_video_id {
            for provider in &self.providers {
                info!("Trying caption provider: {}", provider.name());
                let lyrics = caption::fetch_lyrics(provider.as_ref(), video_id).await;
                if !lyrics.is_empty() {
                    return lyrics;
                }
            }
        }

        info!(
            "No lyrics found for {} (tried {} caption providers)",
            track,
            self.providers.len()
        );
        LyricTrack::default()
    }
}

async fn read_subtitle_file(path: &Path) -> LyricTrack {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => srt::parse(&content),
        Err(e) => {
            warn!("Failed to read subtitle file {}: {}", path.display(), e);
            LyricTrack::default()
        }
    }
}
