//! Synthesis results: PCM plus word / phoneme alignments.
//!
//! All three types are plain values.  They are produced by a single native
//! call, copied out of engine memory, and never mutated afterwards.  They
//! implement `serde` traits so alignment fixtures can be loaded straight
//! from JSON:
//!
//! ```json
//! { "word": "hello", "start_sec": 0.0, "end_sec": 0.42,
//!   "phonemes": [ { "phoneme": "HH", "start_sec": 0.0, "end_sec": 0.08 } ] }
//! ```

use serde::{Deserialize, Serialize};

/// A phoneme and the time interval it occupies in the audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrcaPhoneme {
    phoneme: String,
    start_sec: f32,
    end_sec: f32,
}

impl OrcaPhoneme {
    pub fn new(phoneme: impl Into<String>, start_sec: f32, end_sec: f32) -> Self {
        Self { phoneme: phoneme.into(), start_sec, end_sec }
    }

    pub fn phoneme(&self) -> &str {
        &self.phoneme
    }

    pub fn start_sec(&self) -> f32 {
        self.start_sec
    }

    pub fn end_sec(&self) -> f32 {
        self.end_sec
    }
}

/// A word, its time interval, and its phonemes in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrcaWord {
    word: String,
    start_sec: f32,
    end_sec: f32,
    #[serde(default)]
    phonemes: Vec<OrcaPhoneme>,
}

impl OrcaWord {
    pub fn new(
        word: impl Into<String>,
        start_sec: f32,
        end_sec: f32,
        phonemes: Vec<OrcaPhoneme>,
    ) -> Self {
        Self { word: word.into(), start_sec, end_sec, phonemes }
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn start_sec(&self) -> f32 {
        self.start_sec
    }

    pub fn end_sec(&self) -> f32 {
        self.end_sec
    }

    pub fn phonemes(&self) -> &[OrcaPhoneme] {
        &self.phonemes
    }

    /// `start <= end` for the word and every phoneme, phonemes inside the
    /// word interval and non-decreasing in start time.
    pub fn is_well_formed(&self) -> bool {
        if self.start_sec > self.end_sec {
            return false;
        }
        let mut prev_start = f32::NEG_INFINITY;
        for p in &self.phonemes {
            if p.start_sec > p.end_sec
                || p.start_sec < prev_start
                || p.start_sec < self.start_sec
                || p.end_sec > self.end_sec
            {
                return false;
            }
            prev_start = p.start_sec;
        }
        true
    }
}

/// Every word well formed and consecutive words non-decreasing in start time.
pub fn is_monotonic(words: &[OrcaWord]) -> bool {
    words.iter().all(OrcaWord::is_well_formed)
        && words.windows(2).all(|w| w[0].start_sec <= w[1].start_sec)
}

/// Output of a one-shot synthesis: 16-bit mono PCM and its word alignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrcaAudio {
    pcm: Vec<i16>,
    words: Vec<OrcaWord>,
}

impl OrcaAudio {
    pub fn new(pcm: Vec<i16>, words: Vec<OrcaWord>) -> Self {
        Self { pcm, words }
    }

    pub fn pcm(&self) -> &[i16] {
        &self.pcm
    }

    pub fn words(&self) -> &[OrcaWord] {
        &self.words
    }

    /// Duration in seconds at the given sample rate.
    pub fn duration_sec(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.pcm.len() as f32 / sample_rate as f32
    }

    pub fn into_parts(self) -> (Vec<i16>, Vec<OrcaWord>) {
        (self.pcm, self.words)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
