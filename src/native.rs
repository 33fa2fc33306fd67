//! Native call surface of the Orca engine.
//!
//! [`OrcaBackend`] is the complete set of calls the binding makes into the
//! engine.  [`NativeLibrary`] implements it by loading the prebuilt
//! `libpv_orca` at runtime with [`libloading`] and resolving every symbol
//! up front, so a missing or mismatched library fails at load time rather
//! than on first use.
//!
//! ## Memory contract
//!
//! Every buffer the engine hands out is copied into an owned Rust value and
//! released with its matching deleter before the call returns:
//!
//! | Native allocation              | Released with                      |
//! |--------------------------------|------------------------------------|
//! | PCM (`int16_t *`)              | `pv_orca_pcm_delete`               |
//! | word alignments                | `pv_orca_word_alignments_delete`   |
//! | valid characters               | `pv_orca_valid_characters_delete`  |
//! | hardware device list           | `pv_orca_free_hardware_devices`    |
//! | error stack                    | `pv_free_error_stack`              |
//! | synthesize params              | `pv_orca_synthesize_params_delete` |

use std::{
    ffi::{c_char, c_void, CStr, CString},
    path::{Path, PathBuf},
    ptr,
};

use libloading::Library;
use tracing::{debug, warn};

use crate::{
    alignment::{OrcaAudio, OrcaPhoneme, OrcaWord},
    error::{OrcaError, PvStatus, Result},
    params::SynthesizeParams,
};

/// Device string passed to `pv_orca_init` when the caller picks none.
pub const DEFAULT_DEVICE: &str = "best";

/// Opaque token for an engine instance owned by a backend.
///
/// The value is whatever the backend uses to find the instance again; for
/// [`NativeLibrary`] it is the `pv_orca_t` pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineHandle(pub(crate) usize);

impl EngineHandle {
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

/// Opaque token for an open stream owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub(crate) usize);

impl StreamHandle {
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

/// The calls the binding makes into the engine.
///
/// Implementations are not required to validate handles: the
/// [`Orca`](crate::Orca) and [`OrcaStream`](crate::OrcaStream) wrappers
/// guarantee that a handle is never used after `delete` / `stream_close`.
pub trait OrcaBackend: Send + Sync {
    fn version(&self) -> String;

    fn set_sdk(&self, sdk: &str);

    fn init(&self, access_key: &str, model_path: &Path, device: &str) -> Result<EngineHandle>;

    fn delete(&self, engine: EngineHandle);

    fn sample_rate(&self, engine: EngineHandle) -> Result<u32>;

    fn max_character_limit(&self, engine: EngineHandle) -> Result<usize>;

    fn valid_characters(&self, engine: EngineHandle) -> Result<Vec<String>>;

    fn list_hardware_devices(&self) -> Result<Vec<String>>;

    fn synthesize(
        &self,
        engine: EngineHandle,
        text: &str,
        params: &SynthesizeParams,
    ) -> Result<OrcaAudio>;

    fn synthesize_to_file(
        &self,
        engine: EngineHandle,
        text: &str,
        output_path: &Path,
        params: &SynthesizeParams,
    ) -> Result<Vec<OrcaWord>>;

    fn stream_open(&self, engine: EngineHandle, params: &SynthesizeParams) -> Result<StreamHandle>;

    /// PCM for the text that is now fully resolved; may be empty.
    fn stream_synthesize(&self, stream: StreamHandle, text: &str) -> Result<Vec<i16>>;

    /// PCM for everything still buffered; may be empty.
    fn stream_flush(&self, stream: StreamHandle) -> Result<Vec<i16>>;

    fn stream_close(&self, stream: StreamHandle);
}

// ─────────────────────────────────────────────────────────────────────────────
// C types
// ─────────────────────────────────────────────────────────────────────────────

#[repr(C)]
struct CPhonemeAlignment {
    phoneme: *const c_char,
    start_sec: f32,
    end_sec: f32,
}

#[repr(C)]
struct CWordAlignment {
    word: *const c_char,
    start_sec: f32,
    end_sec: f32,
    num_phonemes: i32,
    phonemes: *mut *mut CPhonemeAlignment,
}

type Status = i32;

/// Function pointers resolved from the shared library.
struct Symbols {
    version: unsafe extern "C" fn() -> *const c_char,
    set_sdk: unsafe extern "C" fn(*const c_char),
    get_error_stack: unsafe extern "C" fn(*mut *mut *mut c_char, *mut i32) -> Status,
    free_error_stack: unsafe extern "C" fn(*mut *mut c_char),
    init: unsafe extern "C" fn(*const c_char, *const c_char, *const c_char, *mut *mut c_void) -> Status,
    delete: unsafe extern "C" fn(*mut c_void),
    sample_rate: unsafe extern "C" fn(*const c_void, *mut i32) -> Status,
    max_character_limit: unsafe extern "C" fn(*const c_void, *mut i32) -> Status,
    valid_characters: unsafe extern "C" fn(*const c_void, *mut i32, *mut *const *const c_char) -> Status,
    valid_characters_delete: unsafe extern "C" fn(*const *const c_char),
    list_hardware_devices: unsafe extern "C" fn(*mut *mut *mut c_char, *mut i32) -> Status,
    free_hardware_devices: unsafe extern "C" fn(*mut *mut c_char, i32),
    params_init: unsafe extern "C" fn(*mut *mut c_void) -> Status,
    params_delete: unsafe extern "C" fn(*mut c_void),
    params_set_speech_rate: unsafe extern "C" fn(*mut c_void, f32) -> Status,
    params_set_random_state: unsafe extern "C" fn(*mut c_void, i64) -> Status,
    synthesize: unsafe extern "C" fn(
        *const c_void,
        *const c_char,
        *const c_void,
        *mut i32,
        *mut *mut i16,
        *mut i32,
        *mut *mut *mut CWordAlignment,
    ) -> Status,
    synthesize_to_file: unsafe extern "C" fn(
        *const c_void,
        *const c_char,
        *const c_void,
        *const c_char,
        *mut i32,
        *mut *mut *mut CWordAlignment,
    ) -> Status,
    word_alignments_delete: unsafe extern "C" fn(i32, *mut *mut CWordAlignment) -> Status,
    pcm_delete: unsafe extern "C" fn(*mut i16),
    stream_open: unsafe extern "C" fn(*mut c_void, *const c_void, *mut *mut c_void) -> Status,
    stream_synthesize: unsafe extern "C" fn(*mut c_void, *const c_char, *mut i32, *mut *mut i16) -> Status,
    stream_flush: unsafe extern "C" fn(*mut c_void, *mut i32, *mut *mut i16) -> Status,
    stream_close: unsafe extern "C" fn(*mut c_void),
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn to_cstring(what: &str, s: &str) -> Result<CString> {
    CString::new(s).map_err(|_| OrcaError::invalid_argument(format!("{what} contains a NUL byte")))
}

fn path_to_cstring(what: &str, path: &Path) -> Result<CString> {
    to_cstring(what, &path.to_string_lossy())
}

/// Copy a nul-terminated engine string.  Null maps to an empty string.
unsafe fn copy_c_str(p: *const c_char) -> String {
    if p.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned()
}

/// Copy `len` engine strings starting at `array`.
unsafe fn copy_c_str_array(array: *const *const c_char, len: i32) -> Vec<String> {
    if array.is_null() || len <= 0 {
        return Vec::new();
    }
    (0..len as usize).map(|i| unsafe { copy_c_str(*array.add(i)) }).collect()
}

/// Copy `len` samples starting at `pcm`.
unsafe fn copy_pcm(pcm: *const i16, len: i32) -> Vec<i16> {
    if pcm.is_null() || len <= 0 {
        return Vec::new();
    }
    unsafe { std::slice::from_raw_parts(pcm, len as usize) }.to_vec()
}

/// Copy `len` word alignments, phonemes included.
unsafe fn copy_alignments(array: *const *mut CWordAlignment, len: i32) -> Vec<OrcaWord> {
    if array.is_null() || len <= 0 {
        return Vec::new();
    }
    let mut words = Vec::with_capacity(len as usize);
    for i in 0..len as usize {
        let w = unsafe { &**array.add(i) };
        let mut phonemes = Vec::with_capacity(w.num_phonemes.max(0) as usize);
        if !w.phonemes.is_null() {
            for j in 0..w.num_phonemes.max(0) as usize {
                let p = unsafe { &**w.phonemes.add(j) };
                phonemes.push(OrcaPhoneme::new(
                    unsafe { copy_c_str(p.phoneme) },
                    p.start_sec,
                    p.end_sec,
                ));
            }
        }
        words.push(OrcaWord::new(unsafe { copy_c_str(w.word) }, w.start_sec, w.end_sec, phonemes));
    }
    words
}

/// Resolve `name` (nul-terminated) to a function pointer of type `T`.
unsafe fn symbol<T: Copy>(library: &Library, name: &str) -> Result<T> {
    let sym = unsafe { library.get::<T>(name.as_bytes()) }.map_err(|e| {
        OrcaError::generic(format!("Failed to load symbol '{}': {e}", name.trim_end_matches('\0')))
    })?;
    Ok(*sym)
}

// ─────────────────────────────────────────────────────────────────────────────
// NativeLibrary
// ─────────────────────────────────────────────────────────────────────────────

/// `libpv_orca` loaded at runtime.
pub struct NativeLibrary {
    symbols: Symbols,
    path: PathBuf,
    // Must outlive `symbols`; dropped last.
    _library: Library,
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary").field("path", &self.path).finish_non_exhaustive()
    }
}

/// RAII wrapper around `pv_orca_synthesize_params_t`.
struct NativeParams<'a> {
    symbols: &'a Symbols,
    ptr: *mut c_void,
}

impl Drop for NativeParams<'_> {
    fn drop(&mut self) {
        unsafe { (self.symbols.params_delete)(self.ptr) };
    }
}

impl NativeLibrary {
    /// Load the engine library at `path` and resolve every symbol.
    ///
    /// A bare file name (no directory part) is left to the system loader's
    /// search path.
    pub fn load(path: &Path) -> Result<Self> {
        let is_bare_name = path.parent().map_or(true, |p| p.as_os_str().is_empty());
        if !is_bare_name && !path.exists() {
            return Err(OrcaError::io(format!(
                "Could not find Orca's dynamic library at `{}`",
                path.display()
            )));
        }

        let library = unsafe { Library::new(path) }.map_err(|e| {
            OrcaError::generic(format!("Failed to load `{}`: {e}", path.display()))
        })?;

        macro_rules! sym {
            ($name:literal) => {
                unsafe { symbol(&library, concat!($name, "\0")) }?
            };
        }

        let symbols = Symbols {
            version: sym!("pv_orca_version"),
            set_sdk: sym!("pv_set_sdk"),
            get_error_stack: sym!("pv_get_error_stack"),
            free_error_stack: sym!("pv_free_error_stack"),
            init: sym!("pv_orca_init"),
            delete: sym!("pv_orca_delete"),
            sample_rate: sym!("pv_orca_sample_rate"),
            max_character_limit: sym!("pv_orca_max_character_limit"),
            valid_characters: sym!("pv_orca_valid_characters"),
            valid_characters_delete: sym!("pv_orca_valid_characters_delete"),
            list_hardware_devices: sym!("pv_orca_list_hardware_devices"),
            free_hardware_devices: sym!("pv_orca_free_hardware_devices"),
            params_init: sym!("pv_orca_synthesize_params_init"),
            params_delete: sym!("pv_orca_synthesize_params_delete"),
            params_set_speech_rate: sym!("pv_orca_synthesize_params_set_speech_rate"),
            params_set_random_state: sym!("pv_orca_synthesize_params_set_random_state"),
            synthesize: sym!("pv_orca_synthesize"),
            synthesize_to_file: sym!("pv_orca_synthesize_to_file"),
            word_alignments_delete: sym!("pv_orca_word_alignments_delete"),
            pcm_delete: sym!("pv_orca_pcm_delete"),
            stream_open: sym!("pv_orca_stream_open"),
            stream_synthesize: sym!("pv_orca_stream_synthesize"),
            stream_flush: sym!("pv_orca_stream_flush"),
            stream_close: sym!("pv_orca_stream_close"),
        };

        debug!(path = %path.display(), "loaded Orca library");
        Ok(Self { symbols, path: path.to_path_buf(), _library: library })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fetch and clear the engine's error stack.
    fn error_stack(&self) -> Vec<String> {
        let mut stack: *mut *mut c_char = ptr::null_mut();
        let mut depth: i32 = 0;
        let status = PvStatus::from(unsafe { (self.symbols.get_error_stack)(&mut stack, &mut depth) });
        if !status.is_success() {
            warn!(?status, "unable to get Orca error state");
            return Vec::new();
        }
        let messages = unsafe { copy_c_str_array(stack as *const *const c_char, depth) };
        unsafe { (self.symbols.free_error_stack)(stack) };
        messages
    }

    /// Map a status code to `Ok(())` or an error carrying the native stack.
    fn check(&self, status: Status, message: &str) -> Result<()> {
        let status = PvStatus::from(status);
        if status.is_success() {
            return Ok(());
        }
        Err(OrcaError::from_status(status, message, self.error_stack()))
    }

    fn params(&self, params: &SynthesizeParams) -> Result<NativeParams<'_>> {
        let mut ptr: *mut c_void = ptr::null_mut();
        self.check(
            unsafe { (self.symbols.params_init)(&mut ptr) },
            "Unable to create Orca synthesize params object",
        )?;
        let native = NativeParams { symbols: &self.symbols, ptr };
        self.check(
            unsafe { (self.symbols.params_set_speech_rate)(native.ptr, params.speech_rate()) },
            "Unable to set Orca speech rate",
        )?;
        self.check(
            unsafe { (self.symbols.params_set_random_state)(native.ptr, params.native_random_state()) },
            "Unable to set Orca random state",
        )?;
        Ok(native)
    }

    /// Copy alignments out of engine memory and release them.
    fn take_alignments(&self, array: *mut *mut CWordAlignment, len: i32) -> Result<Vec<OrcaWord>> {
        let words = unsafe { copy_alignments(array, len) };
        if !array.is_null() {
            self.check(
                unsafe { (self.symbols.word_alignments_delete)(len, array) },
                "Unable to delete Orca word alignments",
            )?;
        }
        Ok(words)
    }

    /// Copy PCM out of engine memory and release it.
    fn take_pcm(&self, pcm: *mut i16, len: i32) -> Vec<i16> {
        let samples = unsafe { copy_pcm(pcm, len) };
        if !pcm.is_null() {
            unsafe { (self.symbols.pcm_delete)(pcm) };
        }
        samples
    }
}

impl OrcaBackend for NativeLibrary {
    fn version(&self) -> String {
        unsafe { copy_c_str((self.symbols.version)()) }
    }

    fn set_sdk(&self, sdk: &str) {
        match CString::new(sdk) {
            Ok(s) => unsafe { (self.symbols.set_sdk)(s.as_ptr()) },
            Err(_) => warn!(sdk, "ignoring SDK name with NUL byte"),
        }
    }

    fn init(&self, access_key: &str, model_path: &Path, device: &str) -> Result<EngineHandle> {
        let access_key = to_cstring("AccessKey", access_key)?;
        let model_path = path_to_cstring("Model path", model_path)?;
        let device = to_cstring("Device", device)?;

        let mut object: *mut c_void = ptr::null_mut();
        self.check(
            unsafe {
                (self.symbols.init)(access_key.as_ptr(), model_path.as_ptr(), device.as_ptr(), &mut object)
            },
            "Initialization failed",
        )?;
        Ok(EngineHandle(object as usize))
    }

    fn delete(&self, engine: EngineHandle) {
        unsafe { (self.symbols.delete)(engine.0 as *mut c_void) };
    }

    fn sample_rate(&self, engine: EngineHandle) -> Result<u32> {
        let mut sample_rate: i32 = 0;
        self.check(
            unsafe { (self.symbols.sample_rate)(engine.0 as *const c_void, &mut sample_rate) },
            "Unable to get Orca sample rate",
        )?;
        Ok(sample_rate.max(0) as u32)
    }

    fn max_character_limit(&self, engine: EngineHandle) -> Result<usize> {
        let mut limit: i32 = 0;
        self.check(
            unsafe { (self.symbols.max_character_limit)(engine.0 as *const c_void, &mut limit) },
            "Unable to get Orca maximum character limit",
        )?;
        Ok(limit.max(0) as usize)
    }

    fn valid_characters(&self, engine: EngineHandle) -> Result<Vec<String>> {
        let mut num: i32 = 0;
        let mut characters: *const *const c_char = ptr::null();
        self.check(
            unsafe { (self.symbols.valid_characters)(engine.0 as *const c_void, &mut num, &mut characters) },
            "Unable to get Orca valid characters",
        )?;
        let out = unsafe { copy_c_str_array(characters, num) };
        if !characters.is_null() {
            unsafe { (self.symbols.valid_characters_delete)(characters) };
        }
        Ok(out)
    }

    fn list_hardware_devices(&self) -> Result<Vec<String>> {
        let mut devices: *mut *mut c_char = ptr::null_mut();
        let mut num: i32 = 0;
        self.check(
            unsafe { (self.symbols.list_hardware_devices)(&mut devices, &mut num) },
            "Unable to list hardware devices",
        )?;
        let out = unsafe { copy_c_str_array(devices as *const *const c_char, num) };
        if !devices.is_null() {
            unsafe { (self.symbols.free_hardware_devices)(devices, num) };
        }
        Ok(out)
    }

    fn synthesize(
        &self,
        engine: EngineHandle,
        text: &str,
        params: &SynthesizeParams,
    ) -> Result<OrcaAudio> {
        let text = to_cstring("Text", text)?;
        let native_params = self.params(params)?;

        let mut num_samples: i32 = 0;
        let mut pcm: *mut i16 = ptr::null_mut();
        let mut num_alignments: i32 = 0;
        let mut alignments: *mut *mut CWordAlignment = ptr::null_mut();
        self.check(
            unsafe {
                (self.symbols.synthesize)(
                    engine.0 as *const c_void,
                    text.as_ptr(),
                    native_params.ptr,
                    &mut num_samples,
                    &mut pcm,
                    &mut num_alignments,
                    &mut alignments,
                )
            },
            "Unable to synthesize speech",
        )?;

        let pcm = self.take_pcm(pcm, num_samples);
        let words = self.take_alignments(alignments, num_alignments)?;
        Ok(OrcaAudio::new(pcm, words))
    }

    fn synthesize_to_file(
        &self,
        engine: EngineHandle,
        text: &str,
        output_path: &Path,
        params: &SynthesizeParams,
    ) -> Result<Vec<OrcaWord>> {
        let text = to_cstring("Text", text)?;
        let output_path = path_to_cstring("Output path", output_path)?;
        let native_params = self.params(params)?;

        let mut num_alignments: i32 = 0;
        let mut alignments: *mut *mut CWordAlignment = ptr::null_mut();
        self.check(
            unsafe {
                (self.symbols.synthesize_to_file)(
                    engine.0 as *const c_void,
                    text.as_ptr(),
                    native_params.ptr,
                    output_path.as_ptr(),
                    &mut num_alignments,
                    &mut alignments,
                )
            },
            "Unable to synthesize speech",
        )?;

        self.take_alignments(alignments, num_alignments)
    }

    fn stream_open(&self, engine: EngineHandle, params: &SynthesizeParams) -> Result<StreamHandle> {
        let native_params = self.params(params)?;
        let mut stream: *mut c_void = ptr::null_mut();
        self.check(
            unsafe { (self.symbols.stream_open)(engine.0 as *mut c_void, native_params.ptr, &mut stream) },
            "Unable to open Orca stream",
        )?;
        Ok(StreamHandle(stream as usize))
    }

    fn stream_synthesize(&self, stream: StreamHandle, text: &str) -> Result<Vec<i16>> {
        let text = to_cstring("Text", text)?;
        let mut num_samples: i32 = 0;
        let mut pcm: *mut i16 = ptr::null_mut();
        self.check(
            unsafe {
                (self.symbols.stream_synthesize)(stream.0 as *mut c_void, text.as_ptr(), &mut num_samples, &mut pcm)
            },
            "Unable to synthesize text in Orca stream",
        )?;
        Ok(self.take_pcm(pcm, num_samples))
    }

    fn stream_flush(&self, stream: StreamHandle) -> Result<Vec<i16>> {
        let mut num_samples: i32 = 0;
        let mut pcm: *mut i16 = ptr::null_mut();
        self.check(
            unsafe { (self.symbols.stream_flush)(stream.0 as *mut c_void, &mut num_samples, &mut pcm) },
            "Unable to flush Orca stream",
        )?;
        Ok(self.take_pcm(pcm, num_samples))
    }

    fn stream_close(&self, stream: StreamHandle) {
        unsafe { (self.symbols.stream_close)(stream.0 as *mut c_void) };
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
