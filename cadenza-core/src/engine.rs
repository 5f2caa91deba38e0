//! Audio engine abstraction.
//!
//! The player only needs a small surface from an audio backend: load a
//! track, control it through a shared handle, query the playback offset and
//! get told when the track finishes. [`ClockEngine`] is a silent backend
//! driven by the tokio clock.

use crate::catalog::Track;
use crate::error::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// End-of-track notification. Invoked at most once per loaded handle.
pub type EndCallback = Box<dyn FnOnce() + Send + 'static>;

/// A loaded audio source. Handles start paused.
pub trait AudioHandle: Send + Sync {
    fn play(&self);

    fn pause(&self);

    /// Stop playback and rewind
    fn stop(&self);

    /// Free the underlying resource. The handle is inert afterwards.
    fn unload(&self);

    /// Current playback offset
    fn position(&self) -> Duration;

    /// Set volume, 0.0 to 1.0
    fn set_volume(&self, volume: f32);
}

/// Trait for audio backends
pub trait AudioEngine: Send + Sync {
    /// Get the engine name
    fn name(&self) -> &'static str;

    /// Load a track, returning a paused handle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AudioLoad`](crate::CoreError::AudioLoad) if the
    /// source cannot be opened or decoded.
    fn load(&self, track: &Track, volume: f32, on_end: EndCallback)
        -> Result<Arc<dyn AudioHandle>>;
}

/// Silent engine whose position follows the clock while playing.
///
/// Tracks with a known duration finish when the clock reaches it; the end is
/// noticed on the next position query.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClockEngine;

impl ClockEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl AudioEngine for ClockEngine {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn load(
        &self,
        track: &Track,
        volume: f32,
        on_end: EndCallback,
    ) -> Result<Arc<dyn AudioHandle>> {
        debug!("Clock engine loaded {} (length: {:?})", track, track.duration);
        Ok(Arc::new(ClockHandle::new(track.duration, volume, on_end)))
    }
}

struct ClockState {
    /// Position accumulated before the current play run
    base: Duration,
    started_at: Option<Instant>,
    volume: f32,
    unloaded: bool,
    on_end: Option<EndCallback>,
}

/// Handle produced by [`ClockEngine`]
pub struct ClockHandle {
    length: Option<Duration>,
    state: Mutex<ClockState>,
}

impl ClockHandle {
    #[must_use]
    pub fn new(length: Option<Duration>, volume: f32, on_end: EndCallback) -> Self {
        Self {
            length,
            state: Mutex::new(ClockState {
                base: Duration::ZERO,
                started_at: None,
                volume,
                unloaded: false,
                on_end: Some(on_end),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.lock().started_at.is_some()
    }

    #[must_use]
    pub fn volume(&self) -> f32 {
        self.lock().volume
    }
}

impl AudioHandle for ClockHandle {
    fn play(&self) {
        let mut state = self.lock();
        if !state.unloaded && state.started_at.is_none() {
            state.started_at = Some(Instant::now());
        }
    }

    fn pause(&self) {
        let mut state = self.lock();
        if let Some(started_at) = state.started_at.take() {
            state.base += started_at.elapsed();
        }
    }

    fn stop(&self) {
        let mut state = self.lock();
        state.started_at = None;
        state.base = Duration::ZERO;
    }

    fn unload(&self) {
        let mut state = self.lock();
        state.started_at = None;
        state.base = Duration::ZERO;
        state.unloaded = true;
        state.on_end = None;
    }

    fn position(&self) -> Duration {
        let mut state = self.lock();
        let position = state.base + state.started_at.map_or(Duration::ZERO, |s| s.elapsed());

        let Some(length) = self.length else {
            return position;
        };
        if position < length {
            return position;
        }

        state.started_at = None;
        state.base = length;
        let on_end = state.on_end.take();
        drop(state);

        if let Some(on_end) = on_end {
            on_end();
        }
        length
    }

    fn set_volume(&self, volume: f32) {
        self.lock().volume = volume;
    }
}
