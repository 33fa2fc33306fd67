//! Engine and stream handles.
//!
//! ```text
//!   Builder::build()          delete() / drop
//! ─────────────────► Ready ─────────────────► Deleted
//!                      │
//!                      │ stream_open()        close() / drop / engine deleted
//!                      └────────────► Open ─────────────────────────► Closed
//! ```
//!
//! Both handles check liveness before every native call, so a call after
//! release returns [`OrcaError::InvalidState`] instead of touching a stale
//! pointer.  An [`OrcaStream`] shares its engine's state cell: deleting the
//! engine closes the stream natively and every later stream call fails,
//! even if the stream was never closed itself.
//!
//! Every native call on an engine, and on the streams opened from it, runs
//! with the engine's state lock held, so one `pv_orca_t` never sees two
//! calls at once even when an [`Orca`] is shared between threads.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::{
    alignment::{OrcaAudio, OrcaWord},
    config::OrcaConfig,
    error::{OrcaError, Result},
    native::{EngineHandle, NativeLibrary, OrcaBackend, StreamHandle, DEFAULT_DEVICE},
    params::SynthesizeParams,
    resource::{default_library_path, ResourceProvider},
};

/// SDK identifier reported to the engine on every init.
static SDK: Lazy<Mutex<String>> = Lazy::new(|| Mutex::new("rust".to_string()));

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

/// Engine liveness plus the streams opened on it.
#[derive(Debug, Default)]
struct EngineState {
    handle: Option<EngineHandle>,
    streams: Vec<StreamHandle>,
}

impl EngineState {
    fn live(&self, op: &str) -> Result<EngineHandle> {
        self.handle.ok_or_else(|| {
            OrcaError::invalid_state(format!("Attempted to call Orca {op} after delete."))
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orca
// ─────────────────────────────────────────────────────────────────────────────

/// An Orca engine instance.  Build with [`Orca::builder`].
pub struct Orca {
    backend: Arc<dyn OrcaBackend>,
    state: Arc<Mutex<EngineState>>,
}

impl std::fmt::Debug for Orca {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orca").field("state", &*lock(&self.state)).finish_non_exhaustive()
    }
}

impl Orca {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Set the SDK identifier sent to the engine by later [`Builder::build`] calls.
    pub fn set_sdk(sdk: &str) {
        *lock(&SDK) = sdk.to_string();
    }

    fn sdk() -> String {
        lock(&SDK).clone()
    }

    /// Release the engine.  Open streams are closed first.  Idempotent.
    pub fn delete(&mut self) {
        let mut state = lock(&self.state);
        let Some(handle) = state.handle.take() else {
            return;
        };
        for stream in state.streams.drain(..) {
            self.backend.stream_close(stream);
        }
        self.backend.delete(handle);
        debug!(?handle, "deleted Orca engine");
    }

    pub fn is_deleted(&self) -> bool {
        lock(&self.state).handle.is_none()
    }

    pub fn version(&self) -> String {
        self.backend.version()
    }

    /// Sample rate of the generated audio, in Hz.
    pub fn sample_rate(&self) -> Result<u32> {
        let state = lock(&self.state);
        let handle = state.live("sample_rate")?;
        self.backend.sample_rate(handle)
    }

    /// Maximum number of characters accepted by one synthesis call.
    pub fn max_character_limit(&self) -> Result<usize> {
        let state = lock(&self.state);
        let handle = state.live("max_character_limit")?;
        self.backend.max_character_limit(handle)
    }

    /// Characters the engine accepts, in engine order.
    pub fn valid_characters(&self) -> Result<Vec<String>> {
        let state = lock(&self.state);
        let handle = state.live("valid_characters")?;
        self.backend.valid_characters(handle)
    }

    /// Synthesize `text` into PCM plus word alignments.
    ///
    /// Custom pronunciations use the `{word|ARPABET PHONEMES}` syntax and are
    /// passed through to the engine unchanged.
    pub fn synthesize(&self, text: &str, params: &SynthesizeParams) -> Result<OrcaAudio> {
        let state = lock(&self.state);
        let handle = state.live("synthesize")?;
        self.backend.synthesize(handle, text, params)
    }

    /// Synthesize `text` into a 16-bit mono WAV file at `output_path`.
    pub fn synthesize_to_file(
        &self,
        text: &str,
        output_path: impl AsRef<Path>,
        params: &SynthesizeParams,
    ) -> Result<Vec<OrcaWord>> {
        let state = lock(&self.state);
        let handle = state.live("synthesize_to_file")?;
        self.backend.synthesize_to_file(handle, text, output_path.as_ref(), params)
    }

    /// Open a stream for incremental synthesis.
    pub fn stream_open(&self, params: &SynthesizeParams) -> Result<OrcaStream> {
        let mut state = lock(&self.state);
        let handle = state.live("stream_open")?;
        let stream = self.backend.stream_open(handle, params)?;
        state.streams.push(stream);
        debug!(?stream, "opened Orca stream");
        Ok(OrcaStream {
            backend: Arc::clone(&self.backend),
            engine: Arc::clone(&self.state),
            handle: Some(stream),
        })
    }
}

impl Drop for Orca {
    fn drop(&mut self) {
        self.delete();
    }
}

/// Hardware devices the engine can run on, e.g. `cpu:0`, `gpu:0`.
pub fn list_hardware_devices(backend: &dyn OrcaBackend) -> Result<Vec<String>> {
    backend.list_hardware_devices()
}

// ─────────────────────────────────────────────────────────────────────────────
// OrcaStream
// ─────────────────────────────────────────────────────────────────────────────

/// An open streaming-synthesis session.  Obtain with [`Orca::stream_open`].
pub struct OrcaStream {
    backend: Arc<dyn OrcaBackend>,
    engine: Arc<Mutex<EngineState>>,
    handle: Option<StreamHandle>,
}

impl std::fmt::Debug for OrcaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrcaStream").field("handle", &self.handle).finish_non_exhaustive()
    }
}

impl OrcaStream {
    /// Stream handle, provided both stream and engine are live.
    fn live(&self, engine: &EngineState, op: &str) -> Result<StreamHandle> {
        engine.live(op)?;
        match self.handle {
            Some(h) if engine.streams.contains(&h) => Ok(h),
            _ => Err(OrcaError::invalid_state(format!(
                "Attempted to call OrcaStream {op} after close."
            ))),
        }
    }

    /// Append a chunk of text.  Returns audio for the text that is now fully
    /// resolved, or `None` if the engine needs more context.
    pub fn synthesize(&mut self, text: &str) -> Result<Option<Vec<i16>>> {
        let engine = lock(&self.engine);
        let handle = self.live(&engine, "synthesize")?;
        let pcm = self.backend.stream_synthesize(handle, text)?;
        Ok((!pcm.is_empty()).then_some(pcm))
    }

    /// Emit audio for whatever text is still buffered.  The stream stays open.
    pub fn flush(&mut self) -> Result<Option<Vec<i16>>> {
        let engine = lock(&self.engine);
        let handle = self.live(&engine, "flush")?;
        let pcm = self.backend.stream_flush(handle)?;
        Ok((!pcm.is_empty()).then_some(pcm))
    }

    /// Release the stream.  Idempotent.
    pub fn close(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let mut engine = lock(&self.engine);
        // Already closed natively if the engine was deleted first.
        if let Some(i) = engine.streams.iter().position(|&s| s == handle) {
            engine.streams.swap_remove(i);
            self.backend.stream_close(handle);
            debug!(?handle, "closed Orca stream");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_none() || lock(&self.engine).handle.is_none()
    }
}

impl Drop for OrcaStream {
    fn drop(&mut self) {
        self.close();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Validates inputs and constructs an [`Orca`].
#[derive(Default)]
pub struct Builder {
    access_key: Option<String>,
    model_path: Option<PathBuf>,
    device: Option<String>,
    library_path: Option<PathBuf>,
    backend: Option<Arc<dyn OrcaBackend>>,
    resources: Option<Box<dyn ResourceProvider>>,
}

impl Builder {
    /// Pre-fill from a loaded configuration.
    pub fn from_config(config: &OrcaConfig) -> Self {
        Self {
            access_key: config.access_key.clone(),
            model_path: config.model_path.clone(),
            device: config.device.clone(),
            library_path: config.library_path.clone(),
            ..Self::default()
        }
    }

    pub fn access_key(mut self, access_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self
    }

    pub fn model_path(mut self, model_path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(model_path.into());
        self
    }

    /// Hardware device string, e.g. `"best"`, `"cpu:4"`, `"gpu:0"`.
    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Path to `libpv_orca`.  Defaults to [`default_library_path`].
    pub fn library_path(mut self, library_path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(library_path.into());
        self
    }

    /// Use an already-loaded engine library instead of loading one.
    pub fn backend(mut self, backend: Arc<dyn OrcaBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Provider used to materialise the model file when `model_path` does
    /// not exist on disk.
    pub fn resources(mut self, resources: impl ResourceProvider + 'static) -> Self {
        self.resources = Some(Box::new(resources));
        self
    }

    fn resolve_model_path(&self) -> Result<PathBuf> {
        let Some(model_path) = &self.model_path else {
            return Err(OrcaError::invalid_argument("ModelPath must not be null"));
        };
        let has_file_name = model_path.file_name().is_some_and(|n| !n.is_empty());
        if model_path.is_file() || !has_file_name {
            return Ok(model_path.clone());
        }
        match &self.resources {
            Some(resources) => resources.resolve(&model_path.to_string_lossy()),
            None => Ok(model_path.clone()),
        }
    }

    pub fn build(self) -> Result<Orca> {
        let access_key = match self.access_key.as_deref() {
            Some(k) if !k.is_empty() => k.to_string(),
            _ => return Err(OrcaError::invalid_argument("No AccessKey was provided to Orca")),
        };
        let model_path = self.resolve_model_path()?;
        let device = self.device.clone().unwrap_or_else(|| DEFAULT_DEVICE.to_string());

        let backend: Arc<dyn OrcaBackend> = match self.backend {
            Some(backend) => backend,
            None => {
                let library_path = match self.library_path {
                    Some(p) => p,
                    None => default_library_path()?,
                };
                Arc::new(NativeLibrary::load(&library_path)?)
            }
        };

        backend.set_sdk(&Orca::sdk());
        let handle = backend.init(&access_key, &model_path, &device)?;
        debug!(?handle, model = %model_path.display(), device = %device, "initialised Orca engine");

        Ok(Orca {
            backend,
            state: Arc::new(Mutex::new(EngineState { handle: Some(handle), streams: Vec::new() })),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
