//! The live pairing of one loaded audio handle and its position tracker.

use crate::engine::AudioHandle;
use crate::tracker::PositionTracker;
use std::sync::Arc;
use tracing::debug;

/// Owned playback resource. Releasing stops the tracker, then stops and
/// unloads the handle. Release happens once, on [`release`](Self::release)
/// or on drop, whichever comes first.
pub struct PlaybackSession {
    id: u64,
    track_index: usize,
    handle: Arc<dyn AudioHandle>,
    tracker: PositionTracker,
    released: bool,
}

impl PlaybackSession {
    #[must_use]
    pub fn new(
        id: u64,
        track_index: usize,
        handle: Arc<dyn AudioHandle>,
        tracker: PositionTracker,
    ) -> Self {
        Self {
            id,
            track_index,
            handle,
            tracker,
            released: false,
        }
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub const fn track_index(&self) -> usize {
        self.track_index
    }

    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }

    pub fn play(&self) {
        if !self.released {
            self.handle.play();
        }
    }

    pub fn pause(&self) {
        if !self.released {
            self.handle.pause();
        }
    }

    pub fn set_volume(&self, volume: f32) {
        if !self.released {
            self.handle.set_volume(volume);
        }
    }

    /// Release the audio resource and stop sampling. Later calls are no-ops.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.tracker.stop();
        self.handle.stop();
        self.handle.unload();
        debug!("Released playback session {}", self.id);
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.release();
    }
}
