//! Editor configuration.
//!
//! Every field has a default so an empty `{}` file (or no file at all) is a
//! valid configuration. The backend URL can also come from the
//! `OVERLORD_BACKEND_URL` environment variable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendConfig;
use crate::geometry::HexGeometry;

pub const BACKEND_URL_ENV: &str = "OVERLORD_BACKEND_URL";

/// Failure to read or parse a configuration or data file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level editor configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub backend: BackendConfig,
    pub geometry: HexGeometry,
    /// Directory holding `terrain_types.json` / `settlement_names.json` overrides
    pub data_dir: Option<PathBuf>,
    /// Seed for the settlement name generator (random when absent)
    pub seed: Option<u64>,
}

impl EditorConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                self.backend.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::HexLayout;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: EditorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.backend.base_url, BackendConfig::default().base_url);
        assert_eq!(config.geometry.layout, HexLayout::ColumnOffset);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_partial_geometry() {
        let config: EditorConfig =
            serde_json::from_str(r#"{"geometry": {"layout": "row_offset", "hex_size": 40.0}}"#)
                .unwrap();
        assert_eq!(config.geometry.layout, HexLayout::RowOffset);
        assert_eq!(config.geometry.hex_size, 40.0);
        assert_eq!(config.geometry.margin, HexGeometry::default().margin);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.json");
        let config = EditorConfig {
            seed: Some(7),
            ..EditorConfig::default()
        };
        config.to_file(&path).unwrap();
        let loaded = EditorConfig::from_file(&path).unwrap();
        assert_eq!(loaded.seed, Some(7));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = EditorConfig::from_file(Path::new("/nonexistent/editor.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_unwritable_path_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("editor.json");
        let err = EditorConfig::default().to_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Write { .. }));
        assert!(err.to_string().starts_with("failed to write"));
    }
}
