//! Resource lookup: bundled model files and the engine library.
//!
//! The engine only accepts absolute paths to readable files.  A
//! [`ResourceProvider`] turns a logical resource name into such a path
//! before initialisation; [`DirectoryResources`] does it by copying the
//! resource out of a read-only bundle directory into a writable cache, the
//! same way mobile apps extract packaged assets on first use.
//!
//! Model files follow the naming scheme `orca_params_<lang>_<gender>.pv`.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{OrcaError, Result};

/// Produces an absolute, readable file path for a named resource.
pub trait ResourceProvider {
    fn resolve(&self, name: &str) -> Result<PathBuf>;
}

/// Extracts resources from `bundle_dir` into `cache_dir`.
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    bundle_dir: PathBuf,
    cache_dir: PathBuf,
}

impl DirectoryResources {
    pub fn new(bundle_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self { bundle_dir: bundle_dir.into(), cache_dir: cache_dir.into() }
    }
}

impl ResourceProvider for DirectoryResources {
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let src = self.bundle_dir.join(name);
        let file_name = src
            .file_name()
            .ok_or_else(|| OrcaError::invalid_argument(format!("Resource name `{name}` has no file name")))?;
        let dst = self.cache_dir.join(file_name);

        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| OrcaError::io(format!("Cannot create `{}`: {e}", self.cache_dir.display())))?;
        fs::copy(&src, &dst).map_err(|e| {
            OrcaError::io(format!("Cannot extract `{}` to `{}`: {e}", src.display(), dst.display()))
        })?;
        debug!(src = %src.display(), dst = %dst.display(), "extracted resource");

        dst.canonicalize()
            .map_err(|e| OrcaError::io(format!("Cannot resolve `{}`: {e}", dst.display())))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Model files
// ─────────────────────────────────────────────────────────────────────────────

static MODEL_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^orca_params_([a-z]{2})_(male|female)\.pv$").expect("valid regex"));

/// Voice gender encoded in a model file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gender::Male => "male",
            Gender::Female => "female",
        })
    }
}

impl std::str::FromStr for Gender {
    type Err = OrcaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(OrcaError::invalid_argument(format!(
                "Unknown gender `{other}`, expected `male` or `female`"
            ))),
        }
    }
}

/// Language codes with at least one model file in `models_dir`, sorted.
pub fn available_languages(models_dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(models_dir)
        .map_err(|e| OrcaError::io(format!("Cannot list `{}`: {e}", models_dir.display())))?;

    let mut languages: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            MODEL_FILE.captures(name).map(|c| c[1].to_string())
        })
        .collect();
    languages.sort();
    languages.dedup();
    Ok(languages)
}

/// Path of the model for `language` and `gender` inside `models_dir`.
pub fn model_path(models_dir: &Path, language: &str, gender: Gender) -> Result<PathBuf> {
    let path = models_dir.join(format!("orca_params_{language}_{gender}.pv"));
    if !path.is_file() {
        let available = available_languages(models_dir).unwrap_or_default();
        return Err(OrcaError::io(format!(
            "No {gender} model for language `{language}` in `{}` (available: {available:?})",
            models_dir.display()
        )));
    }
    Ok(path)
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine library
// ─────────────────────────────────────────────────────────────────────────────

/// File name of the engine library on this platform.
pub fn library_file_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "libpv_orca.dll"
    } else if cfg!(target_os = "macos") {
        "libpv_orca.dylib"
    } else {
        "libpv_orca.so"
    }
}

/// `lib/<platform>/<arch>` subdirectory of the SDK distribution.
fn platform_dir() -> Result<PathBuf> {
    let arch = std::env::consts::ARCH;
    let dir = match (std::env::consts::OS, arch) {
        ("linux", "x86_64") => "linux/x86_64",
        ("linux", "aarch64") => "linux/aarch64",
        ("macos", "x86_64") => "mac/x86_64",
        ("macos", "aarch64") => "mac/arm64",
        ("windows", "x86_64") => "windows/amd64",
        ("windows", "aarch64") => "windows/arm64",
        ("android", _) | ("ios", _) => return Ok(PathBuf::new()),
        (os, arch) => {
            return Err(OrcaError::generic(format!("Unsupported platform: {os} ({arch})")));
        }
    };
    Ok(Path::new("lib").join(dir))
}

/// Default location of the engine library.
///
/// Probes `lib/<platform>/<arch>/` and then the directory next to the
/// running executable; falls back to the bare file name so the system
/// loader search path (`LD_LIBRARY_PATH`, `DYLD_LIBRARY_PATH`, `PATH`)
/// applies.
pub fn default_library_path() -> Result<PathBuf> {
    let file_name = library_file_name();
    let platform = platform_dir()?;

    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        for dir in [exe_dir.join(&platform), exe_dir] {
            let candidate = dir.join(file_name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }
    Ok(PathBuf::from(file_name))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
