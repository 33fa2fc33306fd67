//! An `OrcaBackend` implemented outside the crate drives `Orca` end to end.

use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use orca_tts::{
    native::{EngineHandle, StreamHandle},
    Orca, OrcaAudio, OrcaBackend, OrcaError, OrcaWord, SynthesizeParams,
};

/// Emits one sample per character and remembers how many handles are live.
#[derive(Default)]
struct Silence {
    engines: AtomicUsize,
    streams: AtomicUsize,
}

impl OrcaBackend for Silence {
    fn version(&self) -> String {
        "0.0.0".into()
    }

    fn set_sdk(&self, _sdk: &str) {}

    fn init(&self, _access_key: &str, _model_path: &Path, _device: &str) -> orca_tts::Result<EngineHandle> {
        self.engines.fetch_add(1, Ordering::SeqCst);
        Ok(EngineHandle::from_raw(0x10))
    }

    fn delete(&self, engine: EngineHandle) {
        assert_eq!(engine.raw(), 0x10);
        self.engines.fetch_sub(1, Ordering::SeqCst);
    }

    fn sample_rate(&self, _engine: EngineHandle) -> orca_tts::Result<u32> {
        Ok(16_000)
    }

    fn max_character_limit(&self, _engine: EngineHandle) -> orca_tts::Result<usize> {
        Ok(100)
    }

    fn valid_characters(&self, _engine: EngineHandle) -> orca_tts::Result<Vec<String>> {
        Ok(vec!["a".into()])
    }

    fn list_hardware_devices(&self) -> orca_tts::Result<Vec<String>> {
        Ok(vec!["cpu:0".into()])
    }

    fn synthesize(
        &self,
        _engine: EngineHandle,
        text: &str,
        _params: &SynthesizeParams,
    ) -> orca_tts::Result<OrcaAudio> {
        Ok(OrcaAudio::new(vec![0; text.chars().count()], Vec::new()))
    }

    fn synthesize_to_file(
        &self,
        _engine: EngineHandle,
        _text: &str,
        _output_path: &Path,
        _params: &SynthesizeParams,
    ) -> orca_tts::Result<Vec<OrcaWord>> {
        Err(OrcaError::io("read-only"))
    }

    fn stream_open(&self, _engine: EngineHandle, _params: &SynthesizeParams) -> orca_tts::Result<StreamHandle> {
        self.streams.fetch_add(1, Ordering::SeqCst);
        Ok(StreamHandle::from_raw(0x20))
    }

    fn stream_synthesize(&self, _stream: StreamHandle, text: &str) -> orca_tts::Result<Vec<i16>> {
        Ok(vec![0; text.len()])
    }

    fn stream_flush(&self, _stream: StreamHandle) -> orca_tts::Result<Vec<i16>> {
        Ok(Vec::new())
    }

    fn stream_close(&self, stream: StreamHandle) {
        assert_eq!(stream.raw(), 0x20);
        self.streams.fetch_sub(1, Ordering::SeqCst);
    }
}

#[test]
fn external_backend_drives_orca() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("orca_params_en_female.pv");
    std::fs::write(&model, b"model").unwrap();

    let backend = Arc::new(Silence::default());
    let mut orca = Orca::builder()
        .access_key("key")
        .model_path(&model)
        .backend(backend.clone())
        .build()
        .unwrap();

    assert_eq!(orca.sample_rate().unwrap(), 16_000);
    assert_eq!(orca.synthesize("abc", &SynthesizeParams::default()).unwrap().pcm().len(), 3);

    let mut stream = orca.stream_open(&SynthesizeParams::default()).unwrap();
    assert_eq!(stream.synthesize("ab").unwrap().map(|pcm| pcm.len()), Some(2));
    assert_eq!(stream.flush().unwrap(), None);

    orca.delete();
    assert_eq!(backend.engines.load(Ordering::SeqCst), 0);
    assert_eq!(backend.streams.load(Ordering::SeqCst), 0);
    assert!(stream.synthesize("a").is_err());
}
