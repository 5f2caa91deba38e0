//! SRT subtitle parsing into timed lyric lines.
//!
//! The parser is a single line-oriented pass. It keeps two pieces of state
//! across lines (the pending start time and a text buffer) and emits a
//! [`LyricLine`] each time a blank line closes a block that has both.

use crate::error::{CoreError, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// Separator between the start and end time of an SRT timing line.
pub const TIMING_SEPARATOR: &str = "-->";

/// A single line of lyrics with its start time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricLine {
    /// Offset from the start of the track
    pub timestamp: Duration,
    /// Trimmed, non-empty lyric text
    pub text: String,
}

impl LyricLine {
    pub fn new(timestamp: Duration, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            text: text.into(),
        }
    }

    /// Timestamp in fractional seconds
    #[must_use]
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp.as_secs_f64()
    }

    /// A line is active once playback has reached its timestamp.
    #[must_use]
    pub fn is_active(&self, position: Duration) -> bool {
        position >= self.timestamp
    }
}

/// Ordered lyric lines for one track. Empty means "no lyrics available".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LyricTrack {
    lines: Vec<LyricLine>,
}

impl LyricTrack {
    #[must_use]
    pub const fn new(lines: Vec<LyricLine>) -> Self {
        Self { lines }
    }

    #[must_use]
    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LyricLine> {
        self.lines.iter()
    }

    /// Every line whose timestamp is at or before `position`, each line
    /// checked on its own.
    pub fn active_lines(&self, position: Duration) -> impl Iterator<Item = &LyricLine> {
        self.lines.iter().filter(move |line| line.is_active(position))
    }

    /// Index of the last line that is active at `position`
    #[must_use]
    pub fn current_line_index(&self, position: Duration) -> Option<usize> {
        self.lines
            .iter()
            .enumerate()
            .rev()
            .find(|(_, line)| line.is_active(position))
            .map(|(i, _)| i)
    }

    /// Lines around the current position, for a scrolling display
    #[must_use]
    pub fn visible_lines(&self, position: Duration, before: usize, after: usize) -> &[LyricLine] {
        if self.lines.is_empty() {
            return &[];
        }
        let current_idx = self.current_line_index(position).unwrap_or(0);

        let start = current_idx.saturating_sub(before);
        let end = (current_idx + after + 1).min(self.lines.len());

        &self.lines[start..end]
    }
}

impl FromIterator<LyricLine> for LyricTrack {
    fn from_iter<I: IntoIterator<Item = LyricLine>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a LyricTrack {
    type Item = &'a LyricLine;
    type IntoIter = std::slice::Iter<'a, LyricLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

/// Parse SRT text into a [`LyricTrack`].
///
/// A block is emitted only when a blank line terminates it, so a final block
/// whose last text line has no newline after it is dropped. The start time is
/// not reset by a blank line: text that follows without a new timing line is
/// attributed to the previous start time. A timing line whose start cannot be
/// parsed is logged and its block skipped.
///
/// Every other non-blank line is text, the sequence index included, so a
/// standard block `1`, timing, `Hello` yields the line `"1 Hello"`.
#[must_use]
pub fn parse(input: &str) -> LyricTrack {
    let mut lines = Vec::new();
    let mut current_start: Option<Duration> = None;
    let mut buffer = String::new();

    for (number, raw) in input.split('\n').enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        if let Some((start, _)) = line.split_once(TIMING_SEPARATOR) {
            match parse_timestamp(start.trim()) {
                Ok(timestamp) => current_start = Some(timestamp),
                Err(e) => {
                    warn!("Skipping subtitle block at line {}: {}", number + 1, e);
                    current_start = None;
                }
            }
        } else if line.trim().is_empty() {
            let text = buffer.trim();
            if let Some(timestamp) = current_start {
                if !text.is_empty() {
                    lines.push(LyricLine::new(timestamp, text));
                }
            }
            buffer.clear();
        } else {
            buffer.push_str(line);
            buffer.push(' ');
        }
    }

    if !buffer.trim().is_empty() {
        debug!("Dropping unterminated final subtitle block");
    }

    LyricTrack::new(lines)
}

/// Convert an SRT timestamp (`HH:MM:SS,mmm`) into a duration.
///
/// Milliseconds are always divided by 1000, whatever their digit count:
/// `00:00:01,5` is 1.005 seconds.
///
/// # Errors
///
/// Returns [`CoreError::InvalidTimestamp`] if the field layout is wrong, a
/// component is not an unsigned integer, or the value overflows.
pub fn parse_timestamp(input: &str) -> Result<Duration> {
    let invalid = |reason: &str| CoreError::InvalidTimestamp {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let mut fields = input.split(':');
    let (Some(hours), Some(minutes), Some(rest), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(invalid("expected HH:MM:SS,mmm"));
    };
    let Some((seconds, millis)) = rest.split_once(',') else {
        return Err(invalid("missing ',' before milliseconds"));
    };

    let component = |value: &str, name: &str| -> Result<u64> {
        value
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid(&format!("{name} is not a number")))
    };

    let hours = component(hours, "hours")?;
    let minutes = component(minutes, "minutes")?;
    let seconds = component(seconds, "seconds")?;
    let millis = component(millis, "milliseconds")?;

    let whole_secs = hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .and_then(|hm| hm.checked_add(seconds))
        .ok_or_else(|| invalid("value out of range"))?;

    Duration::from_secs(whole_secs)
        .checked_add(Duration::from_millis(millis))
        .ok_or_else(|| invalid("value out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_BLOCKS: &str = "1
00:00:01,500 --> 00:00:04,000
Hello world

2
00:00:05,000 --> 00:00:08,000
Second line

";

    #[test]
    fn test_parse_simple_srt() {
        let track = parse(TWO_BLOCKS);
        assert_eq!(track.len(), 2);
        assert_eq!(track.lines()[0].timestamp, Duration::from_millis(1500));
        assert_eq!(track.lines()[0].text, "1 Hello world");
        assert_eq!(track.lines()[1].timestamp, Duration::from_secs(5));
        assert_eq!(track.lines()[1].text, "2 Second line");
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse("").is_empty());
        assert!(parse("   \n\n").is_empty());
    }

    #[test]
    fn test_parse_without_timing_lines() {
        let track = parse("just some text\nmore text\n\n");
        assert!(track.is_empty());
    }

    #[test]
    fn test_multi_line_text_joined() {
        let input = "00:00:02,000 --> 00:00:03,000\nfirst part\nsecond part  \n\n";
        let track = parse(input);
        assert_eq!(track.len(), 1);
        assert_eq!(track.lines()[0].text, "first part second part");
    }

    #[test]
    fn test_block_without_text_dropped() {
        let input = "00:00:01,000 --> 00:00:02,000\n\n00:00:03,000 --> 00:00:04,000\nKept\n\n";
        let track = parse(input);
        assert_eq!(track.len(), 1);
        assert_eq!(track.lines()[0].text, "Kept");
        assert_eq!(track.lines()[0].timestamp, Duration::from_secs(3));
    }

    #[test]
    fn test_sequence_index_is_text() {
        let input = "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n2\n00:00:03,000 --> 00:00:04,000\nWorld\n\n";
        let texts: Vec<_> = parse(input).iter().map(|l| l.text.clone()).collect();
        assert_eq!(texts, vec!["1 Hello", "2 World"]);

        // An index with no caption under it still counts as the block's text
        let track = parse("7\n00:00:01,000 --> 00:00:02,000\n\n");
        assert_eq!(track.len(), 1);
        assert_eq!(track.lines()[0].text, "7");
    }

    #[test]
    fn test_unterminated_final_block_dropped() {
        let input = "1\n00:00:01,000 --> 00:00:02,000\nFirst\n\n2\n00:00:03,000 --> 00:00:04,000\nLast";
        let track = parse(input);
        assert_eq!(track.len(), 1);
        assert_eq!(track.lines()[0].text, "1 First");
    }

    #[test]
    fn test_single_trailing_newline_flushes() {
        let input = "1\n00:00:01,000 --> 00:00:02,000\nOnly line\n";
        let track = parse(input);
        assert_eq!(track.len(), 1);
        assert_eq!(track.lines()[0].text, "1 Only line");
    }

    #[test]
    fn test_crlf_line_endings() {
        let input = "1\r\n00:00:01,000 --> 00:00:02,000\r\nLine one\r\nLine two\r\n\r\n";
        let track = parse(input);
        assert_eq!(track.len(), 1);
        assert_eq!(track.lines()[0].text, "1 Line one Line two");
    }

    #[test]
    fn test_start_time_carries_over_blank_line() {
        // Text after a blank line with no new timing line reuses the last start
        let input = "00:00:07,000 --> 00:00:09,000\nVerse\n\nStray text\n\n";
        let track = parse(input);
        assert_eq!(track.len(), 2);
        assert_eq!(track.lines()[1].text, "Stray text");
        assert_eq!(track.lines()[1].timestamp, Duration::from_secs(7));
    }

    #[test]
    fn test_malformed_block_skipped() {
        let input = "1\n00:00:01,000 --> 00:00:02,000\nGood\n\n\
                     2\n00:xx:03,000 --> 00:00:04,000\nBad\n\n\
                     3\n00:00:05,000 --> 00:00:06,000\nAlso good\n\n";
        let track = parse(input);
        let texts: Vec<_> = track.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["1 Good", "3 Also good"]);
    }

    #[test]
    fn test_timestamps_keep_source_order() {
        let input = "00:00:09,000 --> 00:00:10,000\nLate\n\n00:00:01,000 --> 00:00:02,000\nEarly\n\n";
        let track = parse(input);
        assert_eq!(track.lines()[0].text, "Late");
        assert_eq!(track.lines()[1].text, "Early");
    }

    #[test]
    fn test_block_count_matches_terminated_blocks() {
        let mut input = String::new();
        for i in 0..25 {
            input.push_str(&format!(
                "{}\n00:00:{:02},000 --> 00:00:{:02},500\nLine {i}\n\n",
                i + 1,
                i,
                i
            ));
        }
        assert_eq!(parse(&input).len(), 25);
    }

    #[test]
    fn test_parse_cjk_lyrics() {
        let track = parse("1\n00:00:05,000 --> 00:00:06,000\n你好世界\n\n");
        assert_eq!(track.lines()[0].text, "1 你好世界");
    }

    #[test]
    fn test_parse_timestamp_values() {
        assert_eq!(parse_timestamp("00:00:01,500").unwrap(), Duration::from_millis(1500));
        assert_eq!(
            parse_timestamp("01:02:03,004").unwrap(),
            Duration::from_millis(3_723_004)
        );
        assert_eq!(parse_timestamp("00:00:00,000").unwrap(), Duration::ZERO);
        assert!((parse_timestamp("01:02:03,004").unwrap().as_secs_f64() - 3723.004).abs() < 1e-9);
    }

    #[test]
    fn test_parse_timestamp_short_millis_not_padded() {
        assert_eq!(parse_timestamp("00:00:01,5").unwrap(), Duration::from_millis(1005));
        assert_eq!(parse_timestamp("00:00:01,50").unwrap(), Duration::from_millis(1050));
    }

    #[test]
    fn test_parse_timestamp_malformed() {
        assert!(parse_timestamp("00:01,500").is_err());
        assert!(parse_timestamp("00:00:01.500").is_err());
        assert!(parse_timestamp("aa:00:01,500").is_err());
        assert!(parse_timestamp("00:00:01,-5").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_highlighting_is_non_strict() {
        let track = LyricTrack::new(vec![
            LyricLine::new(Duration::ZERO, "A"),
            LyricLine::new(Duration::from_secs(10), "B"),
        ]);

        let active: Vec<_> = track
            .active_lines(Duration::from_secs_f64(9.9))
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(active, vec!["A"]);

        let active: Vec<_> = track
            .active_lines(Duration::from_secs(10))
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(active, vec!["A", "B"]);
    }

    #[test]
    fn test_current_line_index() {
        let track = parse(
            "00:00:05,000 --> 00:00:06,000\nFirst\n\n\
             00:00:10,000 --> 00:00:11,000\nSecond\n\n\
             00:00:15,000 --> 00:00:16,000\nThird\n\n",
        );

        assert_eq!(track.current_line_index(Duration::ZERO), None);
        assert_eq!(track.current_line_index(Duration::from_secs(7)), Some(0));
        assert_eq!(track.current_line_index(Duration::from_secs(12)), Some(1));
        assert_eq!(track.current_line_index(Duration::from_secs(20)), Some(2));
    }

    #[test]
    fn test_visible_lines() {
        let track: LyricTrack = (1..=5)
            .map(|i| LyricLine::new(Duration::from_secs(i * 5), format!("Line {i}")))
            .collect();

        let visible = track.visible_lines(Duration::from_secs(12), 1, 1);
        assert_eq!(visible.len(), 3);
        assert_eq!(visible[0].text, "Line 1");
        assert_eq!(visible[1].text, "Line 2");
        assert_eq!(visible[2].text, "Line 3");

        assert!(LyricTrack::default().visible_lines(Duration::ZERO, 1, 1).is_empty());
    }
}
