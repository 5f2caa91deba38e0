//! Audio output through the default device using rodio.
//!
//! The output stream lives on its own thread for the lifetime of the engine;
//! sinks connect to its mixer.

use cadenza_core::{AudioEngine, AudioHandle, CoreError, EndCallback, Result, Track};
use rodio::mixer::Mixer;
use rodio::source::EmptyCallback;
use rodio::{Decoder, OutputStreamBuilder, Sink};
use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::debug;

pub struct RodioEngine {
    mixer: Mixer,
    /// Dropping this ends the output thread
    _shutdown: mpsc::Sender<()>,
}

impl RodioEngine {
    /// Open the default output device.
    ///
    /// # Errors
    ///
    /// Returns an error if no output device can be opened.
    pub fn open() -> Result<Self> {
        let (mixer_tx, mixer_rx) = mpsc::sync_channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("cadenza-audio".into())
            .spawn(move || match OutputStreamBuilder::open_default_stream() {
                Ok(mut stream) => {
                    stream.log_on_drop(false);
                    let _ = mixer_tx.send(Ok(stream.mixer().clone()));
                    let _ = shutdown_rx.recv();
                }
                Err(e) => {
                    let _ = mixer_tx.send(Err(e.to_string()));
                }
            })?;

        let mixer = mixer_rx
            .recv()
            .map_err(|_| "audio thread exited".to_string())
            .and_then(|opened| opened)
            .map_err(|reason| CoreError::AudioLoad {
                track: "default output device".to_string(),
                reason,
            })?;

        Ok(Self {
            mixer,
            _shutdown: shutdown_tx,
        })
    }
}

fn load_error(track: &Track, reason: &impl std::fmt::Display) -> CoreError {
    CoreError::AudioLoad {
        track: track.to_string(),
        reason: reason.to_string(),
    }
}

impl AudioEngine for RodioEngine {
    fn name(&self) -> &'static str {
        "rodio"
    }

    fn load(
        &self,
        track: &Track,
        volume: f32,
        on_end: EndCallback,
    ) -> Result<Arc<dyn AudioHandle>> {
        let file = File::open(&track.audio_file).map_err(|e| load_error(track, &e))?;
        let source = Decoder::new(BufReader::new(file)).map_err(|e| load_error(track, &e))?;

        let sink = Sink::connect_new(&self.mixer);
        sink.pause();
        sink.set_volume(volume);
        sink.append(source);

        // Runs once the decoded source is exhausted
        let unloaded = Arc::new(AtomicBool::new(false));
        let on_end = Mutex::new(Some(on_end));
        let skip = unloaded.clone();
        sink.append(EmptyCallback::new(Box::new(move || {
            if skip.load(Ordering::SeqCst) {
                return;
            }
            let on_end = on_end.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(on_end) = on_end {
                on_end();
            }
        })));

        debug!("Loaded {} into rodio sink", track.audio_file.display());
        Ok(Arc::new(RodioHandle { sink, unloaded }))
    }
}

struct RodioHandle {
    sink: Sink,
    unloaded: Arc<AtomicBool>,
}

impl AudioHandle for RodioHandle {
    fn play(&self) {
        if !self.unloaded.load(Ordering::SeqCst) {
            self.sink.play();
        }
    }

    fn pause(&self) {
        self.sink.pause();
    }

    fn stop(&self) {
        self.sink.pause();
        if let Err(e) = self.sink.try_seek(Duration::ZERO) {
            debug!("Rewind not supported: {}", e);
        }
    }

    fn unload(&self) {
        self.unloaded.store(true, Ordering::SeqCst);
        self.sink.stop();
    }

    fn position(&self) -> Duration {
        self.sink.get_pos()
    }

    fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume);
    }
}
