//! 16-bit mono WAV helpers.
//!
//! The engine writes `synthesize_to_file` output in this format; these
//! helpers read it back and write streamed PCM the same way.

use std::path::Path;

use crate::error::{OrcaError, Result};

fn wav_error(path: &Path, e: hound::Error) -> OrcaError {
    match e {
        hound::Error::IoError(io) => OrcaError::io(format!("{}: {io}", path.display())),
        other => OrcaError::invalid_argument(format!("{}: {other}", path.display())),
    }
}

/// Write `pcm` as a single-channel 16-bit linear PCM WAV file.
pub fn write_pcm(path: &Path, pcm: &[i16], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| wav_error(path, e))?;
    for &s in pcm {
        writer.write_sample(s).map_err(|e| wav_error(path, e))?;
    }
    writer.finalize().map_err(|e| wav_error(path, e))
}

/// Read a 16-bit mono WAV file.  Returns the samples and the sample rate.
pub fn read_pcm(path: &Path) -> Result<(Vec<i16>, u32)> {
    let reader = hound::WavReader::open(path).map_err(|e| wav_error(path, e))?;
    let spec = reader.spec();
    if spec.channels != 1 || spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(OrcaError::invalid_argument(format!(
            "{}: expected 16-bit mono PCM, got {} channel(s) / {}-bit {:?}",
            path.display(),
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format
        )));
    }
    let pcm = reader
        .into_samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| wav_error(path, e))?;
    Ok((pcm, spec.sample_rate))
}

/// Same length and every sample within `tolerance` of its counterpart.
pub fn pcm_matches(a: &[i16], b: &[i16], tolerance: u16) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(&x, &y)| (x as i32 - y as i32).unsigned_abs() <= tolerance as u32)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        let pcm: Vec<i16> = vec![0, 1, -1, i16::MAX, i16::MIN, 1234];
        write_pcm(&path, &pcm, 22_050).unwrap();
        let (back, rate) = read_pcm(&path).unwrap();
        assert_eq!(back, pcm);
        assert_eq!(rate, 22_050);
    }

    #[test]
    fn test_read_rejects_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(&path, spec).unwrap();
        w.write_sample(0i16).unwrap();
        w.write_sample(0i16).unwrap();
        w.finalize().unwrap();
        assert!(matches!(read_pcm(&path).unwrap_err(), OrcaError::InvalidArgument(_)));
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_pcm(Path::new("/nonexistent/out.wav")).unwrap_err();
        assert!(matches!(err, OrcaError::Io(_)), "{err}");
    }

    #[test]
    fn test_pcm_matches() {
        assert!(pcm_matches(&[10, 20, 30], &[12, 18, 30], 2));
        assert!(!pcm_matches(&[10, 20, 30], &[13, 20, 30], 2));
        assert!(!pcm_matches(&[10, 20], &[10, 20, 30], 100));
        assert!(pcm_matches(&[i16::MIN], &[i16::MAX], u16::MAX));
    }
}
