//! Input text helpers.
//!
//! Custom pronunciations are written inline as `{word|PHONEMES}` with
//! ARPAbet phonemes, e.g. `"I {live|L IH V} in {Sevilla|S EH V IY Y AH}"`.
//! The engine receives the text untouched; these helpers only inspect it.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

static PRONUNCIATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}|]+)\|([^{}|]*)\}").expect("valid regex"));

/// One `{word|PHONEMES}` annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomPronunciation {
    pub word: String,
    pub phonemes: Vec<String>,
    /// Byte range of the whole annotation, braces included.
    pub span: Range<usize>,
}

/// All custom pronunciation annotations in `text`, in order.
pub fn custom_pronunciations(text: &str) -> Vec<CustomPronunciation> {
    PRONUNCIATION
        .captures_iter(text)
        .filter_map(|c| {
            let whole = c.get(0)?;
            Some(CustomPronunciation {
                word: c[1].to_string(),
                phonemes: c[2].split_whitespace().map(str::to_string).collect(),
                span: whole.range(),
            })
        })
        .collect()
}

/// `text` with each annotation replaced by its word.
pub fn spoken_text(text: &str) -> String {
    PRONUNCIATION.replace_all(text, "$1").into_owned()
}

/// Characters of `text` missing from `valid`, first occurrence order,
/// without duplicates.
///
/// Phoneme segments of annotations are skipped, as are the annotation
/// delimiters; the annotated word itself is checked.
pub fn invalid_characters(text: &str, valid: &[String]) -> Vec<char> {
    let mut invalid = Vec::new();
    let mut check = |segment: &str| {
        for c in segment.chars() {
            let mut buf = [0u8; 4];
            let s: &str = c.encode_utf8(&mut buf);
            if !valid.iter().any(|v| v == s) && !invalid.contains(&c) {
                invalid.push(c);
            }
        }
    };

    let mut last = 0;
    for p in custom_pronunciations(text) {
        check(&text[last..p.span.start]);
        check(p.word.as_str());
        last = p.span.end;
    }
    check(&text[last..]);
    invalid
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
