//! Plain-text rendering of the track list and the lyric window.

use cadenza_core::{Catalog, DurationExt, LyricTrack};
use std::fmt::Write;
use std::time::Duration;

/// Lines shown above the current lyric line
pub const LINES_BEFORE: usize = 1;
/// Lines shown below the current lyric line
pub const LINES_AFTER: usize = 2;

/// Numbered track list; the selected track is marked with `*`.
pub fn track_list(catalog: &Catalog, selected: Option<usize>) -> String {
    let mut out = String::new();
    for (i, track) in catalog.tracks().iter().enumerate() {
        let marker = if selected == Some(i) { '*' } else { ' ' };
        let _ = writeln!(out, "{marker} {:>2}. {track}", i + 1);
    }
    out
}

/// The lines around `position`. Every line whose time has been reached is
/// highlighted with `>`.
pub fn lyric_window(lyrics: &LyricTrack, position: Duration) -> String {
    let mut out = String::new();
    for line in lyrics.visible_lines(position, LINES_BEFORE, LINES_AFTER) {
        let marker = if line.is_active(position) { '>' } else { ' ' };
        let _ = writeln!(
            out,
            "{marker} [{}] {}",
            line.timestamp.to_clock(),
            line.text
        );
    }
    out
}
