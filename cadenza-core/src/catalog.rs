//! Static track catalog. Tracks are addressed by index only.

use crate::srt::LyricTrack;
use std::path::PathBuf;
use std::time::Duration;

/// A playable track and where its lyrics come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Stable identifier from the catalog
    pub id: String,
    /// Track title
    pub title: String,
    /// Artist name(s)
    pub artist: String,
    /// Audio file to hand to the audio engine
    pub audio_file: PathBuf,
    /// Album art image, if any
    pub album_art: Option<PathBuf>,
    /// Known track length, used by engines that cannot probe the file
    pub duration: Option<Duration>,
    /// Video whose caption track carries the lyrics
    pub caption_video_id: Option<String>,
    /// Local SRT file with the lyrics
    pub subtitle_file: Option<PathBuf>,
    /// Lyrics shipped with the catalog entry
    pub lyrics: Option<LyricTrack>,
}

impl Track {
    /// Create a new track with no lyrics source
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        audio_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            audio_file: audio_file.into(),
            album_art: None,
            duration: None,
            caption_video_id: None,
            subtitle_file: None,
            lyrics: None,
        }
    }

    #[must_use]
    pub fn with_album_art(mut self, path: impl Into<PathBuf>) -> Self {
        self.album_art = Some(path.into());
        self
    }

    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    #[must_use]
    pub fn with_caption_video_id(mut self, video_id: impl Into<String>) -> Self {
        self.caption_video_id = Some(video_id.into());
        self
    }

    #[must_use]
    pub fn with_subtitle_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.subtitle_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_lyrics(mut self, lyrics: LyricTrack) -> Self {
        self.lyrics = Some(lyrics);
        self
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// Fixed, ordered list of tracks
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tracks: Vec<Track>,
}

impl Catalog {
    #[must_use]
    pub const fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}
