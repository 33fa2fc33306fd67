//! # orca-tts
//!
//! Rust bindings for the Picovoice Orca on-device text-to-speech engine.
//!
//! The engine ships as a prebuilt shared library (`libpv_orca`) that is
//! loaded at runtime, together with a model parameter file
//! (`orca_params_<lang>_<gender>.pv`) and an AccessKey from the Picovoice
//! Console.
//!
//! ## Quick start
//!
//! ```no_run
//! use orca_tts::{Orca, SynthesizeParams};
//!
//! let orca = Orca::builder()
//!     .access_key("${ACCESS_KEY}")
//!     .model_path("/opt/orca/orca_params_en_female.pv")
//!     .library_path("/opt/orca/lib/linux/x86_64/libpv_orca.so")
//!     .build()?;
//!
//! // PCM (16-bit mono at `orca.sample_rate()?`) plus word timings.
//! let audio = orca.synthesize("Hello from Rust!", &SynthesizeParams::default())?;
//! for word in audio.words() {
//!     println!("{:>8.3}s  {}", word.start_sec(), word.word());
//! }
//!
//! // Or straight to a WAV file.
//! let params = SynthesizeParams::builder().speech_rate(1.1).random_state(7).build()?;
//! orca.synthesize_to_file("Hello again.", "hello.wav", &params)?;
//! # Ok::<(), orca_tts::OrcaError>(())
//! ```
//!
//! ## Streaming
//!
//! Text can arrive incrementally, e.g. token by token from an LLM:
//!
//! ```no_run
//! # use orca_tts::{Orca, SynthesizeParams};
//! # fn run(orca: &Orca) -> orca_tts::Result<()> {
//! let mut stream = orca.stream_open(&SynthesizeParams::default())?;
//! for token in ["The ", "quick ", "brown ", "fox."] {
//!     if let Some(pcm) = stream.synthesize(token)? {
//!         // play `pcm`
//! #       let _ = pcm;
//!     }
//! }
//! if let Some(pcm) = stream.flush()? {
//! #   let _ = pcm;
//! }
//! stream.close();
//! # Ok(())
//! # }
//! ```
//!
//! [`streaming::StreamingSynthesizer`] wraps this in a worker thread.
//!
//! ## Configuration
//! | Variable               | Meaning                              |
//! |------------------------|--------------------------------------|
//! | `PV_ACCESS_KEY`        | AccessKey                            |
//! | `PV_ORCA_MODEL_PATH`   | Model parameter file                 |
//! | `PV_ORCA_LIBRARY_PATH` | Engine shared library                |
//! | `PV_ORCA_DEVICE`       | Inference device (`best`, `cpu:4`…)  |
//!
//! See [`OrcaConfig`] and [`orca::Builder::from_config`].

pub mod alignment;
pub mod config;
pub mod error;
pub mod native;
pub mod orca;
pub mod params;
pub mod resource;
pub mod streaming;
pub mod text;
pub mod wav;

#[cfg(test)]
mod fake;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use alignment::{OrcaAudio, OrcaPhoneme, OrcaWord};
pub use config::OrcaConfig;
pub use error::{OrcaError, PvStatus, Result};
pub use native::{NativeLibrary, OrcaBackend};
pub use orca::{list_hardware_devices, Orca, OrcaStream};
pub use params::SynthesizeParams;
