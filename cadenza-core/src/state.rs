//! Player state machine.
//!
//! [`PlayerState::reduce`] is a pure transition function: it returns the next
//! state, the commands the audio layer must execute and the events to
//! announce. Edges:
//!
//! - `Stopped -> Playing` on `TogglePlay`, `Select`, `SkipForward`, `SkipBack`
//! - `Playing -> Paused` and `Paused -> Playing` on `TogglePlay`
//! - `Playing | Paused -> Playing` (new track) on `Select`, skips and the end
//!   of the current track
//! - `Playing | Paused -> Stopped` on `Stop` and on a failed load

use crate::srt::LyricTrack;
use std::time::Duration;

/// Whether audio is playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Explicit application state of the player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    /// Selected catalog index
    pub current_index: usize,
    pub status: PlaybackStatus,
    /// 0.0 to 1.0
    pub volume: f32,
    /// Lyrics of the selected track, empty until loaded
    pub lyrics: LyricTrack,
    /// Last sampled playback position
    pub position: Duration,
    /// Generation of the most recent session; events from older sessions are
    /// ignored
    pub session_id: u64,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new(0.5)
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    /// Play/pause button
    TogglePlay,
    /// Start a catalog entry
    Select(usize),
    SkipForward,
    SkipBack,
    Stop,
    SetVolume(f32),
    /// The audio engine reached the end of a session's track
    TrackEnded { session_id: u64 },
    /// The position tracker produced a sample
    PositionSampled { session_id: u64, position: Duration },
    /// Lyrics resolved for a catalog entry
    LyricsLoaded { track_index: usize, lyrics: LyricTrack },
    /// The audio engine could not load a session's track
    LoadFailed { session_id: u64, reason: String },
}

/// Work for the audio layer
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    /// Release the current session, if any
    Release,
    /// Load and start a track as a new session
    Load { track_index: usize, session_id: u64 },
    Pause,
    Resume,
    SetVolume(f32),
}

/// Events broadcast to player subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// A track was selected; its lyrics are not loaded yet
    TrackChanged { track_index: usize },
    /// Playback started from the beginning of a track
    PlaybackStarted { track_index: usize },
    PlaybackPaused { position: Duration },
    PlaybackResumed { position: Duration },
    PlaybackStopped,
    /// Regular position update
    PositionSync { position: Duration },
    VolumeChanged { volume: f32 },
    LyricsLoaded { track_index: usize, lyrics: LyricTrack },
    Error { message: String },
}

/// Result of one reduction
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: PlayerState,
    pub commands: Vec<PlayerCommand>,
    pub events: Vec<PlayerEvent>,
}

impl Transition {
    const fn unchanged(state: PlayerState) -> Self {
        Self {
            state,
            commands: Vec::new(),
            events: Vec::new(),
        }
    }
}

impl PlayerState {
    #[must_use]
    pub fn new(volume: f32) -> Self {
        Self {
            current_index: 0,
            status: PlaybackStatus::Stopped,
            volume: volume.clamp(0.0, 1.0),
            lyrics: LyricTrack::default(),
            position: Duration::ZERO,
            session_id: 0,
        }
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    /// Apply an action to a catalog of `track_count` tracks.
    #[must_use]
    pub fn reduce(self, action: PlayerAction, track_count: usize) -> Transition {
        match action {
            PlayerAction::TogglePlay => self.toggle_play(track_count),
            PlayerAction::Select(index) if index < track_count => self.start(index),
            PlayerAction::SkipForward if track_count > 0 => {
                let index = (self.current_index + 1) % track_count;
                self.start(index)
            }
            PlayerAction::SkipBack if track_count > 0 => {
                let index = (self.current_index + track_count - 1) % track_count;
                self.start(index)
            }
            PlayerAction::Stop if self.status != PlaybackStatus::Stopped => {
                let mut transition = self.stopped();
                transition.events.push(PlayerEvent::PlaybackStopped);
                transition
            }
            PlayerAction::SetVolume(volume) if volume.is_finite() => self.set_volume(volume),
            PlayerAction::TrackEnded { session_id }
                if session_id == self.session_id
                    && self.status == PlaybackStatus::Playing
                    && track_count > 0 =>
            {
                let index = (self.current_index + 1) % track_count;
                self.start(index)
            }
            PlayerAction::PositionSampled {
                session_id,
                position,
            } if session_id == self.session_id && self.status != PlaybackStatus::Stopped => {
                let mut state = self;
                state.position = position;
                Transition {
                    state,
                    commands: Vec::new(),
                    events: vec![PlayerEvent::PositionSync { position }],
                }
            }
            PlayerAction::LyricsLoaded {
                track_index,
                lyrics,
            } if track_index == self.current_index => {
                let mut state = self;
                state.lyrics = lyrics.clone();
                Transition {
                    state,
                    commands: Vec::new(),
                    events: vec![PlayerEvent::LyricsLoaded {
                        track_index,
                        lyrics,
                    }],
                }
            }
            PlayerAction::LoadFailed { session_id, reason }
                if session_id == self.session_id && self.status != PlaybackStatus::Stopped =>
            {
                let mut transition = self.stopped();
                transition.events.push(PlayerEvent::Error { message: reason });
                transition.events.push(PlayerEvent::PlaybackStopped);
                transition
            }
            _ => Transition::unchanged(self),
        }
    }

    fn toggle_play(self, track_count: usize) -> Transition {
        match self.status {
            PlaybackStatus::Stopped if track_count > 0 => {
                let index = self.current_index.min(track_count - 1);
                self.start(index)
            }
            PlaybackStatus::Stopped => Transition::unchanged(self),
            PlaybackStatus::Playing => {
                let mut state = self;
                state.status = PlaybackStatus::Paused;
                let position = state.position;
                Transition {
                    state,
                    commands: vec![PlayerCommand::Pause],
                    events: vec![PlayerEvent::PlaybackPaused { position }],
                }
            }
            PlaybackStatus::Paused => {
                let mut state = self;
                state.status = PlaybackStatus::Playing;
                let position = state.position;
                Transition {
                    state,
                    commands: vec![PlayerCommand::Resume],
                    events: vec![PlayerEvent::PlaybackResumed { position }],
                }
            }
        }
    }

    /// Replace whatever is playing with a fresh session of `index`
    fn start(self, index: usize) -> Transition {
        let mut state = self;
        state.current_index = index;
        state.status = PlaybackStatus::Playing;
        state.position = Duration::ZERO;
        state.lyrics = LyricTrack::default();
        state.session_id += 1;
        let session_id = state.session_id;

        Transition {
            state,
            commands: vec![
                PlayerCommand::Release,
                PlayerCommand::Load {
                    track_index: index,
                    session_id,
                },
            ],
            events: vec![
                PlayerEvent::TrackChanged { track_index: index },
                PlayerEvent::PlaybackStarted { track_index: index },
            ],
        }
    }

    fn stopped(self) -> Transition {
        let mut state = self;
        state.status = PlaybackStatus::Stopped;
        state.position = Duration::ZERO;
        Transition {
            state,
            commands: vec![PlayerCommand::Release],
            events: Vec::new(),
        }
    }

    fn set_volume(self, volume: f32) -> Transition {
        let volume = volume.clamp(0.0, 1.0);
        let mut state = self;
        state.volume = volume;
        Transition {
            state,
            commands: vec![PlayerCommand::SetVolume(volume)],
            events: vec![PlayerEvent::VolumeChanged { volume }],
        }
    }
}
