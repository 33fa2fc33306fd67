//! Producer/consumer wrapper around an [`OrcaStream`].
//!
//! Text producers (typically an LLM emitting tokens) call
//! [`StreamingSynthesizer::synthesize`] from their own thread; a worker
//! thread owns the stream, turns each chunk into PCM and hands it to the
//! audio consumer callback.  The first `audio_wait_chunks` PCM chunks are
//! held back and released together, so playback does not start before a
//! little buffer exists.
//!
//! ```no_run
//! # use orca_tts::{Orca, SynthesizeParams, streaming::StreamingSynthesizer};
//! # fn run(orca: &Orca) -> orca_tts::Result<()> {
//! let stream = orca.stream_open(&SynthesizeParams::default())?;
//! let synth = StreamingSynthesizer::start(stream, 1, |pcm| {
//!     // push `pcm` into the playback buffer
//! #   let _ = pcm;
//! });
//! for token in ["Hello ", "from ", "a ", "stream."] {
//!     synth.synthesize(token)?;
//! }
//! synth.flush()?;
//! synth.close()?;
//! # Ok(())
//! # }
//! ```

use std::{
    sync::{mpsc, Arc, Mutex},
    thread::JoinHandle,
    time::{Duration, Instant},
};

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::{
    error::{OrcaError, Result},
    orca::OrcaStream,
};

type AudioSink = Box<dyn FnMut(Vec<i16>) + Send>;

enum Command {
    Text(String),
    Flush(mpsc::Sender<Result<()>>),
}

/// Holds PCM chunks until `wait_chunks` have been produced, then passes
/// everything through.  Opens once and stays open.
struct StartGate {
    wait_chunks: usize,
    held: Vec<Vec<i16>>,
    open: bool,
}

impl StartGate {
    fn new(wait_chunks: usize) -> Self {
        Self { wait_chunks, held: Vec::new(), open: wait_chunks == 0 }
    }

    fn push(&mut self, pcm: Vec<i16>, sink: &mut AudioSink) {
        if self.open {
            sink(pcm);
            return;
        }
        self.held.push(pcm);
        if self.held.len() >= self.wait_chunks {
            self.release(sink);
        }
    }

    /// Open the gate and drain whatever is held.
    fn release(&mut self, sink: &mut AudioSink) {
        self.open = true;
        for pcm in self.held.drain(..) {
            sink(pcm);
        }
    }
}

/// Feeds an [`OrcaStream`] from a worker thread.
pub struct StreamingSynthesizer {
    sender: Option<mpsc::Sender<Command>>,
    worker: Option<JoinHandle<()>>,
    error: Arc<Mutex<Option<OrcaError>>>,
    started: Instant,
    first_audio: Arc<OnceCell<Instant>>,
}

impl StreamingSynthesizer {
    /// Spawn the worker.  `on_audio` runs on the worker thread, in order.
    pub fn start(
        mut stream: OrcaStream,
        audio_wait_chunks: usize,
        on_audio: impl FnMut(Vec<i16>) + Send + 'static,
    ) -> Self {
        let (sender, receiver) = mpsc::channel::<Command>();
        let error: Arc<Mutex<Option<OrcaError>>> = Arc::default();
        let first_audio: Arc<OnceCell<Instant>> = Arc::default();

        let worker = {
            let error = Arc::clone(&error);
            let first_audio = Arc::clone(&first_audio);
            let mut sink: AudioSink = Box::new(on_audio);
            std::thread::spawn(move || {
                let mut gate = StartGate::new(audio_wait_chunks);
                let mut deliver = |pcm: Option<Vec<i16>>, gate: &mut StartGate| {
                    if let Some(pcm) = pcm {
                        let _ = first_audio.set(Instant::now());
                        gate.push(pcm, &mut sink);
                    }
                };

                for command in receiver {
                    match command {
                        Command::Text(text) => match stream.synthesize(&text) {
                            Ok(pcm) => deliver(pcm, &mut gate),
                            Err(e) => {
                                warn!(error = %e, text = %text, "streaming synthesis failed");
                                *error.lock().unwrap_or_else(|p| p.into_inner()) = Some(e);
                                break;
                            }
                        },
                        Command::Flush(ack) => {
                            let result = stream.flush().map(|pcm| {
                                deliver(pcm, &mut gate);
                            });
                            let _ = ack.send(result);
                        }
                    }
                }

                // Anything held back is still audio the caller asked for.
                drop(deliver);
                gate.release(&mut sink);
                stream.close();
                debug!("streaming worker stopped");
            })
        };

        Self {
            sender: Some(sender),
            worker: Some(worker),
            error,
            started: Instant::now(),
            first_audio,
        }
    }

    fn take_error(&self) -> OrcaError {
        self.error
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
            .unwrap_or_else(|| OrcaError::invalid_state("Streaming worker has stopped"))
    }

    fn sender(&self) -> Result<&mpsc::Sender<Command>> {
        self.sender
            .as_ref()
            .ok_or_else(|| OrcaError::invalid_state("Streaming synthesizer is closed"))
    }

    /// Queue a chunk of text.  Never blocks.
    pub fn synthesize(&self, text: &str) -> Result<()> {
        let sender = self.sender()?;
        sender.send(Command::Text(text.to_string())).map_err(|_| self.take_error())
    }

    /// Block until every queued chunk is synthesized and the stream flushed.
    pub fn flush(&self) -> Result<()> {
        let sender = self.sender()?;
        let (ack, done) = mpsc::channel();
        sender.send(Command::Flush(ack)).map_err(|_| self.take_error())?;
        match done.recv() {
            Ok(result) => result,
            Err(_) => Err(self.take_error()),
        }
    }

    /// Time from [`start`](Self::start) until the first PCM chunk was produced.
    pub fn time_to_first_audio(&self) -> Option<Duration> {
        self.first_audio.get().map(|t| t.duration_since(self.started))
    }

    fn shutdown(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("streaming worker panicked");
            }
        }
    }

    /// Stop the worker, deliver held audio and close the stream.  Returns the
    /// first synthesis error, if any occurred.
    pub fn close(mut self) -> Result<()> {
        self.shutdown();
        match self.error.lock().unwrap_or_else(|p| p.into_inner()).take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for StreamingSynthesizer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
