use crate::catalog::{Catalog, Track};
use crate::config::PlayerConfig;
use crate::engine::{AudioEngine, EndCallback};
use crate::error::{CoreError, Result};
use crate::session::PlaybackSession;
use crate::state::{PlayerAction, PlayerCommand, PlayerEvent, PlayerState, Transition};
use crate::time::DurationExt;
use crate::tracker::{PositionSample, PositionTracker};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Player state and the session currently holding audio
struct PlayerInner {
    state: PlayerState,
    session: Option<PlaybackSession>,
}

/// Drives the audio engine from [`PlayerAction`]s and broadcasts
/// [`PlayerEvent`]s.
///
/// At most one [`PlaybackSession`] exists at a time: loading a track
/// releases the previous session first. Position samples and end-of-track
/// notifications come back as actions through [`Player::start`]'s loop.
pub struct Player {
    catalog: Catalog,
    engine: Arc<dyn AudioEngine>,
    sample_interval: Duration,
    inner: Mutex<PlayerInner>,
    event_tx: broadcast::Sender<PlayerEvent>,
    position_tx: Arc<watch::Sender<PositionSample>>,
    action_tx: mpsc::UnboundedSender<PlayerAction>,
    action_rx: Mutex<Option<mpsc::UnboundedReceiver<PlayerAction>>>,
    cancel_token: CancellationToken,
}

impl Player {
    /// Create a new player
    ///
    /// # Arguments
    /// * `catalog` - Tracks the player can select
    /// * `engine` - Audio backend used to load tracks
    /// * `config` - Sampling cadence and initial volume
    /// * `cancel_token` - Optional external cancellation token for graceful shutdown
    #[must_use]
    pub fn new(
        catalog: Catalog,
        engine: Arc<dyn AudioEngine>,
        config: &PlayerConfig,
        cancel_token: Option<CancellationToken>,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);
        let (position_tx, _) = watch::channel(PositionSample::default());
        let (action_tx, action_rx) = mpsc::unbounded_channel();

        Arc::new(Self {
            catalog,
            engine,
            sample_interval: config.sample_interval(),
            inner: Mutex::new(PlayerInner {
                state: PlayerState::new(config.volume),
                session: None,
            }),
            event_tx,
            position_tx: Arc::new(position_tx),
            action_tx,
            action_rx: Mutex::new(Some(action_rx)),
            cancel_token: cancel_token.unwrap_or_default(),
        })
    }

    /// Subscribe to player events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.event_tx.subscribe()
    }

    /// Subscribe to raw position samples of the live session
    pub fn subscribe_position(&self) -> watch::Receiver<PositionSample> {
        self.position_tx.subscribe()
    }

    /// Sender for queueing actions from synchronous code
    #[must_use]
    pub fn action_sender(&self) -> mpsc::UnboundedSender<PlayerAction> {
        self.action_tx.clone()
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.catalog.get(index)
    }

    /// Get a clone of the cancellation token
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Snapshot of the current state
    pub async fn state(&self) -> PlayerState {
        self.inner.lock().await.state.clone()
    }

    /// Whether a session currently holds an audio resource
    pub async fn has_session(&self) -> bool {
        self.inner.lock().await.session.is_some()
    }

    pub async fn toggle_play(&self) {
        self.dispatch(PlayerAction::TogglePlay).await;
    }

    pub async fn select(&self, index: usize) {
        self.dispatch(PlayerAction::Select(index)).await;
    }

    pub async fn skip_forward(&self) {
        self.dispatch(PlayerAction::SkipForward).await;
    }

    pub async fn skip_back(&self) {
        self.dispatch(PlayerAction::SkipBack).await;
    }

    pub async fn stop(&self) {
        self.dispatch(PlayerAction::Stop).await;
    }

    pub async fn set_volume(&self, volume: f32) {
        self.dispatch(PlayerAction::SetVolume(volume)).await;
    }

    /// Apply an action: reduce, execute the resulting commands, then emit the
    /// events. A failed load turns into a `LoadFailed` transition.
    pub async fn dispatch(&self, action: PlayerAction) {
        let track_count = self.catalog.len();
        let mut inner = self.inner.lock().await;

        let state = std::mem::take(&mut inner.state);
        let Transition {
            state,
            commands,
            mut events,
        } = state.reduce(action, track_count);
        inner.state = state;

        for command in commands {
            if let Err(e) = self.execute(&mut inner, command) {
                error!("{}", e);
                let session_id = inner.state.session_id;
                let state = std::mem::take(&mut inner.state);
                let failed = state.reduce(
                    PlayerAction::LoadFailed {
                        session_id,
                        reason: e.to_string(),
                    },
                    track_count,
                );
                inner.state = failed.state;
                for command in failed.commands {
                    if let Err(e) = self.execute(&mut inner, command) {
                        warn!("Cleanup after failed load also failed: {}", e);
                    }
                }
                events.retain(|event| !matches!(event, PlayerEvent::PlaybackStarted { .. }));
                events.extend(failed.events);
                break;
            }
        }

        for event in events {
            let _ = self.event_tx.send(event);
        }
    }

    fn execute(&self, inner: &mut PlayerInner, command: PlayerCommand) -> Result<()> {
        match command {
            PlayerCommand::Release => {
                if let Some(mut session) = inner.session.take() {
                    session.release();
                }
            }
            PlayerCommand::Load {
                track_index,
                session_id,
            } => self.load(inner, track_index, session_id)?,
            PlayerCommand::Pause => {
                if let Some(session) = &inner.session {
                    session.pause();
                }
            }
            PlayerCommand::Resume => {
                if let Some(session) = &inner.session {
                    session.play();
                }
            }
            PlayerCommand::SetVolume(volume) => {
                if let Some(session) = &inner.session {
                    session.set_volume(volume);
                }
            }
        }
        Ok(())
    }

    fn load(&self, inner: &mut PlayerInner, track_index: usize, session_id: u64) -> Result<()> {
        let track = self
            .catalog
            .get(track_index)
            .ok_or_else(|| CoreError::AudioLoad {
                track: format!("catalog entry {track_index}"),
                reason: "no such track".to_string(),
            })?;

        // Never hold two resources at once
        if let Some(mut previous) = inner.session.take() {
            previous.release();
        }

        let action_tx = self.action_tx.clone();
        let on_end: EndCallback = Box::new(move || {
            let _ = action_tx.send(PlayerAction::TrackEnded { session_id });
        });

        let handle = self.engine.load(track, inner.state.volume, on_end)?;
        handle.play();

        self.position_tx.send_replace(PositionSample {
            session_id,
            position: Duration::ZERO,
        });
        let tracker = PositionTracker::spawn(
            session_id,
            handle.clone(),
            self.sample_interval,
            self.position_tx.clone(),
            self.cancel_token.child_token(),
        );

        inner.session = Some(PlaybackSession::new(
            session_id,
            track_index,
            handle,
            tracker,
        ));
        info!(
            "Playing {} via {} engine (session {})",
            track,
            self.engine.name(),
            session_id
        );
        Ok(())
    }

    /// Start the action loop in a background task
    #[must_use]
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Consume queued actions and position samples until cancelled, then
    /// release the session.
    async fn run(&self) {
        let Some(mut action_rx) = self.action_rx.lock().await.take() else {
            warn!("Player loop is already running");
            return;
        };
        let mut position_rx = self.position_tx.subscribe();

        info!("Player started ({} tracks)", self.catalog.len());

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!("Player shutting down");
                    break;
                }
                Some(action) = action_rx.recv() => {
                    self.dispatch(action).await;
                }
                Ok(()) = position_rx.changed() => {
                    let sample = *position_rx.borrow_and_update();
                    debug!(
                        "Position {} (session {})",
                        sample.position.to_clock(),
                        sample.session_id
                    );
                    self.dispatch(PlayerAction::PositionSampled {
                        session_id: sample.session_id,
                        position: sample.position,
                    })
                    .await;
                }
            }
        }

        self.shutdown().await;
    }

    /// Stop playback and release the audio resource
    pub async fn shutdown(&self) {
        self.dispatch(PlayerAction::Stop).await;
        // Stop is a no-op when already stopped; make sure nothing is held
        if let Some(mut session) = self.inner.lock().await.session.take() {
            session.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AudioHandle;
    use crate::state::PlaybackStatus;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        live: AtomicUsize,
        max_live: AtomicUsize,
    }

    struct RecordingHandle {
        track_id: String,
        counters: Arc<Counters>,
        playing: AtomicBool,
        unloads: AtomicUsize,
        volume: std::sync::Mutex<f32>,
        position: std::sync::Mutex<Duration>,
        on_end: std::sync::Mutex<Option<EndCallback>>,
    }

    impl RecordingHandle {
        fn finish(&self) {
            if let Some(on_end) = self.on_end.lock().unwrap().take() {
                on_end();
            }
        }
    }

    impl AudioHandle for RecordingHandle {
        fn play(&self) {
            self.playing.store(true, Ordering::SeqCst);
        }
        fn pause(&self) {
            self.playing.store(false, Ordering::SeqCst);
        }
        fn stop(&self) {
            self.playing.store(false, Ordering::SeqCst);
        }
        fn unload(&self) {
            if self.unloads.fetch_add(1, Ordering::SeqCst) == 0 {
                self.counters.live.fetch_sub(1, Ordering::SeqCst);
            }
        }
        fn position(&self) -> Duration {
            *self.position.lock().unwrap()
        }
        fn set_volume(&self, volume: f32) {
            *self.volume.lock().unwrap() = volume;
        }
    }

    #[derive(Default)]
    struct RecordingEngine {
        counters: Arc<Counters>,
        handles: std::sync::Mutex<Vec<Arc<RecordingHandle>>>,
        fail_track: Option<String>,
    }

    impl RecordingEngine {
        fn handle(&self, i: usize) -> Arc<RecordingHandle> {
            self.handles.lock().unwrap()[i].clone()
        }

        fn load_count(&self) -> usize {
            self.handles.lock().unwrap().len()
        }
    }

    impl AudioEngine for RecordingEngine {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn load(
            &self,
            track: &Track,
            volume: f32,
            on_end: EndCallback,
        ) -> Result<Arc<dyn AudioHandle>> {
            if self.fail_track.as_deref() == Some(track.id.as_str()) {
                return Err(CoreError::AudioLoad {
                    track: track.to_string(),
                    reason: "unsupported format".to_string(),
                });
            }
            let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.max_live.fetch_max(live, Ordering::SeqCst);

            let handle = Arc::new(RecordingHandle {
                track_id: track.id.clone(),
                counters: self.counters.clone(),
                playing: AtomicBool::new(false),
                unloads: AtomicUsize::new(0),
                volume: std::sync::Mutex::new(volume),
                position: std::sync::Mutex::new(Duration::ZERO),
                on_end: std::sync::Mutex::new(Some(on_end)),
            });
            self.handles.lock().unwrap().push(handle.clone());
            Ok(handle)
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            Track::new("a", "A", "X", "a.mp3"),
            Track::new("b", "B", "Y", "b.mp3"),
            Track::new("c", "C", "Z", "c.mp3"),
        ])
    }

    fn player(engine: Arc<RecordingEngine>) -> Arc<Player> {
        Player::new(catalog(), engine, &PlayerConfig::default(), None)
    }

    async fn wait_for<F>(rx: &mut broadcast::Receiver<PlayerEvent>, mut predicate: F) -> PlayerEvent
    where
        F: FnMut(&PlayerEvent) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = rx.recv().await.unwrap();
                if predicate(&event) {
                    return event;
                }
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_toggle_loads_and_plays() {
        let engine = Arc::new(RecordingEngine::default());
        let player = player(engine.clone());

        player.toggle_play().await;

        assert_eq!(engine.load_count(), 1);
        let handle = engine.handle(0);
        assert_eq!(handle.track_id, "a");
        assert!(handle.playing.load(Ordering::SeqCst));
        assert!((*handle.volume.lock().unwrap() - 0.5).abs() < f32::EPSILON);
        assert_eq!(player.state().await.status, PlaybackStatus::Playing);
        assert!(player.has_session().await);
    }

    #[tokio::test]
    async fn test_pause_and_resume_reach_handle() {
        let engine = Arc::new(RecordingEngine::default());
        let player = player(engine.clone());

        player.toggle_play().await;
        player.toggle_play().await;
        assert!(!engine.handle(0).playing.load(Ordering::SeqCst));
        assert_eq!(player.state().await.status, PlaybackStatus::Paused);

        player.toggle_play().await;
        assert!(engine.handle(0).playing.load(Ordering::SeqCst));
        // Resuming reuses the loaded handle
        assert_eq!(engine.load_count(), 1);
    }

    #[tokio::test]
    async fn test_switching_tracks_releases_previous_once() {
        let engine = Arc::new(RecordingEngine::default());
        let player = player(engine.clone());

        player.select(0).await;
        player.skip_forward().await;
        player.skip_forward().await;
        player.skip_back().await;

        assert_eq!(engine.load_count(), 4);
        for i in 0..3 {
            assert_eq!(engine.handle(i).unloads.load(Ordering::SeqCst), 1);
        }
        assert_eq!(engine.handle(3).unloads.load(Ordering::SeqCst), 0);
        assert_eq!(engine.handle(3).track_id, "b");
        assert_eq!(engine.counters.live.load(Ordering::SeqCst), 1);
        assert_eq!(engine.counters.max_live.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_releases_session() {
        let engine = Arc::new(RecordingEngine::default());
        let player = player(engine.clone());
        let mut rx = player.subscribe();

        player.select(1).await;
        player.stop().await;
        player.stop().await;

        assert!(!player.has_session().await);
        assert_eq!(engine.handle(0).unloads.load(Ordering::SeqCst), 1);
        assert_eq!(engine.counters.live.load(Ordering::SeqCst), 0);
        wait_for(&mut rx, |e| matches!(e, PlayerEvent::PlaybackStopped)).await;
    }

    #[tokio::test]
    async fn test_volume_applies_to_session() {
        let engine = Arc::new(RecordingEngine::default());
        let player = player(engine.clone());

        player.select(0).await;
        player.set_volume(0.9).await;
        assert!((*engine.handle(0).volume.lock().unwrap() - 0.9).abs() < f32::EPSILON);

        // New sessions start at the current volume
        player.skip_forward().await;
        assert!((*engine.handle(1).volume.lock().unwrap() - 0.9).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_load_failure_leaves_player_stopped() {
        let engine = Arc::new(RecordingEngine {
            fail_track: Some("b".to_string()),
            ..Default::default()
        });
        let player = player(engine.clone());
        let mut rx = player.subscribe();

        player.select(0).await;
        player.skip_forward().await;

        let state = player.state().await;
        assert_eq!(state.status, PlaybackStatus::Stopped);
        assert_eq!(state.current_index, 1);
        assert!(!player.has_session().await);
        assert_eq!(engine.handle(0).unloads.load(Ordering::SeqCst), 1);

        let event = wait_for(&mut rx, |e| matches!(e, PlayerEvent::Error { .. })).await;
        let PlayerEvent::Error { message } = event else {
            unreachable!()
        };
        assert!(message.contains("unsupported format"));

        // The player recovers on the next selection
        player.select(2).await;
        assert_eq!(player.state().await.status, PlaybackStatus::Playing);
    }

    #[tokio::test]
    async fn test_track_end_advances_to_next() {
        let engine = Arc::new(RecordingEngine::default());
        let player = player(engine.clone());
        let mut rx = player.subscribe();
        let _loop = player.clone().start();

        player.select(2).await;
        engine.handle(0).finish();

        wait_for(&mut rx, |e| {
            matches!(e, PlayerEvent::TrackChanged { track_index: 0 })
        })
        .await;
        assert_eq!(engine.handle(0).unloads.load(Ordering::SeqCst), 1);
        assert_eq!(engine.handle(1).track_id, "a");

        player.cancel_token().cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_samples_reach_state() {
        let engine = Arc::new(RecordingEngine::default());
        let player = player(engine.clone());
        let mut rx = player.subscribe();
        let _loop = player.clone().start();

        player.select(0).await;
        *engine.handle(0).position.lock().unwrap() = Duration::from_millis(1500);

        wait_for(&mut rx, |e| {
            matches!(e, PlayerEvent::PositionSync { position } if *position == Duration::from_millis(1500))
        })
        .await;
        assert_eq!(player.state().await.position, Duration::from_millis(1500));
        assert_eq!(
            player.subscribe_position().borrow().position,
            Duration::from_millis(1500)
        );

        player.cancel_token().cancel();
    }

    #[tokio::test]
    async fn test_cancellation_releases_session() {
        let engine = Arc::new(RecordingEngine::default());
        let player = player(engine.clone());
        let handle = player.clone().start();

        player.select(0).await;
        player.cancel_token().cancel();
        handle.await.unwrap();

        assert!(!player.has_session().await);
        assert_eq!(engine.handle(0).unloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_twice_is_rejected() {
        let engine = Arc::new(RecordingEngine::default());
        let player = player(engine);
        let first = player.clone().start();
        tokio::task::yield_now().await;

        // Second loop finds no receiver and returns immediately
        player.clone().start().await.unwrap();

        player.cancel_token().cancel();
        first.await.unwrap();
    }
}
