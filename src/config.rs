//! Engine configuration from a JSON file and/or the environment.
//!
//! ```json
//! {
//!   "access_key": "...",
//!   "model_path": "/opt/orca/orca_params_en_female.pv",
//!   "library_path": "/opt/orca/lib/linux/x86_64/libpv_orca.so",
//!   "device": "cpu:2"
//! }
//! ```
//!
//! | Field          | Environment variable   |
//! |----------------|------------------------|
//! | `access_key`   | `PV_ACCESS_KEY`        |
//! | `model_path`   | `PV_ORCA_MODEL_PATH`   |
//! | `library_path` | `PV_ORCA_LIBRARY_PATH` |
//! | `device`       | `PV_ORCA_DEVICE`       |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OrcaError, Result};

pub const ENV_ACCESS_KEY: &str = "PV_ACCESS_KEY";
pub const ENV_MODEL_PATH: &str = "PV_ORCA_MODEL_PATH";
pub const ENV_LIBRARY_PATH: &str = "PV_ORCA_LIBRARY_PATH";
pub const ENV_DEVICE: &str = "PV_ORCA_DEVICE";

/// Everything needed to construct an [`Orca`](crate::Orca).  All fields are
/// optional here; [`Builder::build`](crate::orca::Builder::build) reports
/// what is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrcaConfig {
    pub access_key: Option<String>,
    pub model_path: Option<PathBuf>,
    pub library_path: Option<PathBuf>,
    pub device: Option<String>,
}

impl OrcaConfig {
    /// Parse a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| OrcaError::io(format!("Cannot read config `{}`: {e}", path.display())))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            OrcaError::invalid_argument(format!("Failed to parse `{}`: {e}", path.display()))
        })
    }

    /// Configuration taken from the environment only.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Overlay the process environment on top of `self`.
    pub fn with_env(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Overlay non-empty values returned by `lookup` for each variable name.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        if let Some(v) = get(ENV_ACCESS_KEY) {
            self.access_key = Some(v);
        }
        if let Some(v) = get(ENV_MODEL_PATH) {
            self.model_path = Some(v.into());
        }
        if let Some(v) = get(ENV_LIBRARY_PATH) {
            self.library_path = Some(v.into());
        }
        if let Some(v) = get(ENV_DEVICE) {
            self.device = Some(v);
        }
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orca.json");
        std::fs::write(&path, r#"{"access_key": "abc", "device": "cpu:2"}"#).unwrap();

        let config = OrcaConfig::from_file(&path).unwrap();
        assert_eq!(config.access_key.as_deref(), Some("abc"));
        assert_eq!(config.device.as_deref(), Some("cpu:2"));
        assert_eq!(config.model_path, None);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orca.json");
        std::fs::write(&path, r#"{"acess_key": "typo"}"#).unwrap();
        let err = OrcaConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, OrcaError::InvalidArgument(_)), "{err}");
    }

    #[test]
    fn test_missing_file() {
        let err = OrcaConfig::from_file(Path::new("/nonexistent/orca.json")).unwrap_err();
        assert!(matches!(err, OrcaError::Io(_)));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_ACCESS_KEY, "from-env"),
            (ENV_MODEL_PATH, "/models/orca_params_en_male.pv"),
            (ENV_DEVICE, ""),
        ]
        .into_iter()
        .collect();

        let base = OrcaConfig { device: Some("gpu:0".into()), ..OrcaConfig::default() };
        let config = base.with_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.access_key.as_deref(), Some("from-env"));
        assert_eq!(config.model_path, Some(PathBuf::from("/models/orca_params_en_male.pv")));
        // Empty values do not override.
        assert_eq!(config.device.as_deref(), Some("gpu:0"));
        assert_eq!(config.library_path, None);
    }
}
