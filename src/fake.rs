//! Deterministic in-process engine used by the unit tests.
//!
//! Audio is a pure function of each character, the speech rate and the
//! random state, so one-shot, file and streaming output can be compared
//! sample for sample.  Streams emit audio for text up to the last
//! whitespace and keep the rest buffered until the next chunk or a flush.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use crate::{
    alignment::{OrcaAudio, OrcaPhoneme, OrcaWord},
    error::{OrcaError, PvStatus, Result},
    native::{EngineHandle, OrcaBackend, StreamHandle},
    params::SynthesizeParams,
    wav,
};

pub const FAKE_SAMPLE_RATE: u32 = 22_050;

const SAMPLES_PER_CHAR: f32 = 200.0;
const MAX_CHARACTER_LIMIT: usize = 2_000;
const PUNCTUATION: &str = ",.?!'-:;\"{}|";

struct FakeStream {
    engine: usize,
    params: SynthesizeParams,
    buffer: String,
}

#[derive(Default)]
struct State {
    next_handle: usize,
    engines: Vec<usize>,
    streams: HashMap<usize, FakeStream>,
    last_sdk: Option<String>,
    last_device: Option<String>,
    last_model_path: Option<PathBuf>,
    last_text: Option<String>,
}

#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
    init_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    stream_close_calls: AtomicUsize,
    noise: AtomicU64,
    call_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every synthesis call sleeps for `delay`, widening the window in which
    /// overlapping calls would be observed.
    pub fn with_call_delay(delay: Duration) -> Self {
        Self { call_delay: delay, ..Self::default() }
    }

    /// Most synthesis calls that were ever inside the backend at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Text of the most recent synthesis call, exactly as received.
    pub fn last_text(&self) -> Option<String> {
        self.state().last_text.clone()
    }

    /// Record `text` and hold the call open for the configured delay.
    fn enter(&self, text: &str) -> InFlight<'_> {
        self.state().last_text = Some(text.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.call_delay.is_zero() {
            std::thread::sleep(self.call_delay);
        }
        InFlight(&self.in_flight)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn stream_close_calls(&self) -> usize {
        self.stream_close_calls.load(Ordering::SeqCst)
    }

    pub fn live_engines(&self) -> usize {
        self.state().engines.len()
    }

    pub fn live_streams(&self) -> usize {
        self.state().streams.len()
    }

    pub fn last_sdk(&self) -> Option<String> {
        self.state().last_sdk.clone()
    }

    pub fn last_device(&self) -> Option<String> {
        self.state().last_device.clone()
    }

    pub fn last_model_path(&self) -> Option<PathBuf> {
        self.state().last_model_path.clone()
    }

    fn check_text(text: &str) -> Result<()> {
        if text.chars().count() > MAX_CHARACTER_LIMIT {
            return Err(OrcaError::from_status(
                PvStatus::InvalidArgument,
                "Unable to synthesize speech",
                vec![format!("Text exceeds {MAX_CHARACTER_LIMIT} characters")],
            ));
        }
        if let Some(c) = text.chars().find(|&c| !is_valid(c)) {
            return Err(OrcaError::from_status(
                PvStatus::InvalidArgument,
                "Unable to synthesize speech",
                vec![format!("Invalid character `{c}`")],
            ));
        }
        Ok(())
    }

    /// PCM for `text`.  Unseeded calls mix in a per-call noise term.
    fn render(&self, text: &str, params: &SynthesizeParams) -> Vec<i16> {
        let noise = match params.random_state() {
            Some(seed) => seed as u64,
            None => self.noise.fetch_add(1, Ordering::SeqCst).wrapping_add(1 << 32),
        };
        let per_char = (SAMPLES_PER_CHAR / params.speech_rate()).round() as usize;
        let mut pcm = Vec::with_capacity(text.len() * per_char);
        for c in text.chars() {
            let base = (c as u32 as i64 * 97 + (noise % 101) as i64) % 2_000 - 1_000;
            pcm.extend((0..per_char).map(|i| (base + i as i64 % 7) as i16));
        }
        pcm
    }

    fn align(text: &str, params: &SynthesizeParams) -> Vec<OrcaWord> {
        let sec_per_char = SAMPLES_PER_CHAR / params.speech_rate() / FAKE_SAMPLE_RATE as f32;
        let at = |offset: usize| offset as f32 * sec_per_char;
        let mut words = Vec::new();
        let mut offset = 0usize;
        for token in text.split(' ') {
            let len = token.chars().count();
            if len > 0 {
                let phonemes = token
                    .chars()
                    .enumerate()
                    .map(|(i, c)| {
                        let label = c.to_ascii_uppercase().to_string();
                        OrcaPhoneme::new(label, at(offset + i), at(offset + i + 1))
                    })
                    .collect();
                // Same expression as the last phoneme's end, so the two agree exactly.
                words.push(OrcaWord::new(token, at(offset), at(offset + len), phonemes));
            }
            offset += len + 1;
        }
        words
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn is_valid(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == ' ' || PUNCTUATION.contains(c)
}

impl OrcaBackend for FakeBackend {
    fn version(&self) -> String {
        "1.0.0-fake".to_string()
    }

    fn set_sdk(&self, sdk: &str) {
        self.state().last_sdk = Some(sdk.to_string());
    }

    fn init(&self, access_key: &str, model_path: &Path, device: &str) -> Result<EngineHandle> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if access_key == "invalid" {
            return Err(OrcaError::from_status(
                PvStatus::ActivationError,
                "Initialization failed",
                vec!["AccessKey is invalid".into(), "Activation failed".into()],
            ));
        }
        if !model_path.is_file() {
            return Err(OrcaError::from_status(
                PvStatus::IoError,
                "Initialization failed",
                vec![format!("Cannot open `{}`", model_path.display())],
            ));
        }
        let mut state = self.state();
        state.next_handle += 1;
        let handle = state.next_handle;
        state.engines.push(handle);
        state.last_device = Some(device.to_string());
        state.last_model_path = Some(model_path.to_path_buf());
        Ok(EngineHandle(handle))
    }

    fn delete(&self, engine: EngineHandle) {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        state.engines.retain(|&e| e != engine.0);
        assert!(
            state.streams.values().all(|s| s.engine != engine.0),
            "engine deleted with open streams"
        );
    }

    fn sample_rate(&self, _engine: EngineHandle) -> Result<u32> {
        Ok(FAKE_SAMPLE_RATE)
    }

    fn max_character_limit(&self, _engine: EngineHandle) -> Result<usize> {
        Ok(MAX_CHARACTER_LIMIT)
    }

    fn valid_characters(&self, _engine: EngineHandle) -> Result<Vec<String>> {
        let mut chars: Vec<String> = ('a'..='z')
            .chain('A'..='Z')
            .chain('0'..='9')
            .chain(PUNCTUATION.chars())
            .map(String::from)
            .collect();
        chars.push(" ".into());
        Ok(chars)
    }

    fn list_hardware_devices(&self) -> Result<Vec<String>> {
        Ok(vec!["cpu:0".into(), "cpu:1".into()])
    }

    fn synthesize(
        &self,
        _engine: EngineHandle,
        text: &str,
        params: &SynthesizeParams,
    ) -> Result<OrcaAudio> {
        let _call = self.enter(text);
        Self::check_text(text)?;
        Ok(OrcaAudio::new(self.render(text, params), Self::align(text, params)))
    }

    fn synthesize_to_file(
        &self,
        engine: EngineHandle,
        text: &str,
        output_path: &Path,
        params: &SynthesizeParams,
    ) -> Result<Vec<OrcaWord>> {
        let (pcm, words) = self.synthesize(engine, text, params)?.into_parts();
        wav::write_pcm(output_path, &pcm, FAKE_SAMPLE_RATE)?;
        Ok(words)
    }

    fn stream_open(&self, engine: EngineHandle, params: &SynthesizeParams) -> Result<StreamHandle> {
        let mut state = self.state();
        state.next_handle += 1;
        let handle = state.next_handle;
        state.streams.insert(handle, FakeStream { engine: engine.0, params: *params, buffer: String::new() });
        Ok(StreamHandle(handle))
    }

    fn stream_synthesize(&self, stream: StreamHandle, text: &str) -> Result<Vec<i16>> {
        let _call = self.enter(text);
        Self::check_text(text)?;
        let (ready, params) = {
            let mut state = self.state();
            let s = state.streams.get_mut(&stream.0).expect("stream used after close");
            s.buffer.push_str(text);
            match s.buffer.rfind(' ') {
                Some(i) => {
                    let rest = s.buffer.split_off(i + 1);
                    (std::mem::replace(&mut s.buffer, rest), s.params)
                }
                None => (String::new(), s.params),
            }
        };
        Ok(self.render(&ready, &params))
    }

    fn stream_flush(&self, stream: StreamHandle) -> Result<Vec<i16>> {
        let (ready, params) = {
            let mut state = self.state();
            let s = state.streams.get_mut(&stream.0).expect("stream used after close");
            (std::mem::take(&mut s.buffer), s.params)
        };
        Ok(self.render(&ready, &params))
    }

    fn stream_close(&self, stream: StreamHandle) {
        self.stream_close_calls.fetch_add(1, Ordering::SeqCst);
        let removed = self.state().streams.remove(&stream.0);
        assert!(removed.is_some(), "stream closed twice");
    }
}
