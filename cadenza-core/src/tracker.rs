//! Playback position sampling.

use crate::engine::AudioHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Shortest sampling period; `tokio::time::interval` rejects zero
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(1);

/// A position reading tagged with the session that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionSample {
    pub session_id: u64,
    pub position: Duration,
}

/// Repeating sampler that publishes the playback offset of one handle.
///
/// Samples are not guaranteed to increase: a seek, a loop or scheduler
/// jitter can produce a smaller or repeated value.
pub struct PositionTracker {
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl PositionTracker {
    /// Start sampling `handle` every `interval` into `tx` until `cancel_token`
    /// is cancelled. The first sample is taken immediately. Intervals shorter
    /// than [`MIN_SAMPLE_INTERVAL`] are raised to it.
    #[must_use]
    pub fn spawn(
        session_id: u64,
        handle: Arc<dyn AudioHandle>,
        interval: Duration,
        tx: Arc<watch::Sender<PositionSample>>,
        cancel_token: CancellationToken,
    ) -> Self {
        let interval = interval.max(MIN_SAMPLE_INTERVAL);
        let token = cancel_token.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let position = handle.position();
                        trace!("Session {} position {:?}", session_id, position);
                        tx.send_replace(PositionSample { session_id, position });
                    }
                }
            }
        });

        Self { cancel_token, task }
    }

    /// Stop sampling. No sample is published once this returns, unless one
    /// was already being taken.
    pub fn stop(&self) {
        self.cancel_token.cancel();
        self.task.abort();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Drop for PositionTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ClockHandle;

    fn playing_handle() -> Arc<ClockHandle> {
        let handle = Arc::new(ClockHandle::new(None, 1.0, Box::new(|| {})));
        handle.play();
        handle
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_at_interval() {
        let (tx, rx) = watch::channel(PositionSample::default());
        let tx = Arc::new(tx);
        let handle = playing_handle();

        let tracker = PositionTracker::spawn(
            7,
            handle.clone(),
            Duration::from_millis(500),
            tx,
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let sample = *rx.borrow();
        assert_eq!(sample.session_id, 7);
        assert_eq!(sample.position, Duration::from_millis(1000));

        tracker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_still_samples() {
        let (tx, rx) = watch::channel(PositionSample::default());
        let tracker = PositionTracker::spawn(
            3,
            playing_handle(),
            Duration::ZERO,
            Arc::new(tx),
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        let sample = *rx.borrow();
        assert_eq!(sample.session_id, 3);
        assert!(sample.position > Duration::ZERO);
        assert!(sample.position <= Duration::from_millis(10));
        assert!(!tracker.task.is_finished());

        tracker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_sampling() {
        let (tx, rx) = watch::channel(PositionSample::default());
        let tx = Arc::new(tx);
        let handle = playing_handle();
        let cancel_token = CancellationToken::new();

        let tracker = PositionTracker::spawn(
            1,
            handle.clone(),
            Duration::from_millis(500),
            tx,
            cancel_token.clone(),
        );

        tokio::time::sleep(Duration::from_millis(600)).await;
        tracker.stop();
        assert!(tracker.is_stopped());
        assert!(cancel_token.is_cancelled());
        let before = *rx.borrow();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(*rx.borrow(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation_stops_tracker() {
        let (tx, rx) = watch::channel(PositionSample::default());
        let parent = CancellationToken::new();
        let _tracker = PositionTracker::spawn(
            1,
            playing_handle(),
            Duration::from_millis(500),
            Arc::new(tx),
            parent.child_token(),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        parent.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let before = *rx.borrow();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(*rx.borrow(), before);
    }
}
