//! Cultural naming style definitions.
//!
//! The configuration has the shape served by `GET /api/settlement-names`.
//! Defaults are embedded; when neither the backend nor a data file yields a
//! usable configuration the small built-in fallback style is used instead, so
//! name generation never fails outright.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ConfigError;

const DEFAULT_SETTLEMENT_NAMES_JSON: &str =
    include_str!("../../data/defaults/settlement_names.json");

/// Name of the style used when nothing else is configured.
pub const FALLBACK_STYLE: &str = "fallback";

/// Token banks and patterns for one naming culture.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CulturalStyle {
    pub prefixes: Vec<String>,
    pub middles: Vec<String>,
    pub suffixes: Vec<String>,
    /// Patterns such as "prefix+suffix" or "prefix+middle+suffix"
    pub patterns: Vec<String>,
    /// Curated names reserved for cities
    pub unique_city_names: Vec<String>,
}

impl CulturalStyle {
    /// The built-in style used when configuration cannot be loaded.
    pub fn fallback() -> Self {
        Self {
            prefixes: strs(&["Gold", "Silver", "Stone", "River", "Green", "Iron"]),
            middles: Vec::new(),
            suffixes: strs(&["vale", "ford", "wood", "haven", "ridge", "burg"]),
            patterns: strs(&["prefix+suffix"]),
            unique_city_names: Vec::new(),
        }
    }

    /// A style can synthesize names only with both prefixes and suffixes.
    pub fn can_synthesize(&self) -> bool {
        !self.prefixes.is_empty() && !self.suffixes.is_empty()
    }
}

/// Complete naming configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamingConfig {
    #[serde(default)]
    pub cultural_styles: BTreeMap<String, CulturalStyle>,
    /// Terrain name -> acceptable style names
    #[serde(default)]
    pub terrain_styles: BTreeMap<String, Vec<String>>,
    /// Terrain name -> style name -> curated names
    #[serde(default)]
    pub special_names: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    #[serde(default = "default_style_name")]
    pub default_style: String,
}

fn default_style_name() -> String {
    FALLBACK_STYLE.to_string()
}

impl NamingConfig {
    /// Configuration with only the built-in fallback style.
    pub fn fallback() -> Self {
        let mut cultural_styles = BTreeMap::new();
        cultural_styles.insert(FALLBACK_STYLE.to_string(), CulturalStyle::fallback());
        Self {
            cultural_styles,
            terrain_styles: BTreeMap::new(),
            special_names: BTreeMap::new(),
            default_style: FALLBACK_STYLE.to_string(),
        }
    }

    /// Configuration from the embedded defaults.
    pub fn defaults() -> Self {
        match Self::from_json(DEFAULT_SETTLEMENT_NAMES_JSON) {
            Ok(config) => config,
            Err(err) => {
                warn!(
                    error = %err,
                    "embedded settlement_names.json is invalid, using fallback style"
                );
                Self::fallback()
            }
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: NamingConfig = serde_json::from_str(text)?;
        Ok(config.validated())
    }

    /// Configuration from the backend's `/api/settlement-names` payload.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let config: NamingConfig = serde_json::from_value(value)?;
        Ok(config.validated())
    }

    /// Defaults, replaced by `settlement_names.json` in `dir` when present.
    pub fn load_from(dir: &Path) -> Self {
        let path = dir.join("settlement_names.json");
        if !path.exists() {
            return Self::defaults();
        }
        let loaded = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })
            .and_then(|text| Self::from_json(&text));
        match loaded {
            Ok(config) => {
                info!(
                    path = %path.display(),
                    styles = config.cultural_styles.len(),
                    "naming styles loaded"
                );
                config
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "naming styles unreadable, using fallback style"
                );
                Self::fallback()
            }
        }
    }

    /// Ensure the default style exists and can synthesize names.
    fn validated(mut self) -> Self {
        let usable = self
            .cultural_styles
            .get(&self.default_style)
            .map(CulturalStyle::can_synthesize)
            .unwrap_or(false);
        if !usable {
            self.cultural_styles
                .insert(FALLBACK_STYLE.to_string(), CulturalStyle::fallback());
            self.default_style = FALLBACK_STYLE.to_string();
        }
        self
    }

    pub fn style(&self, name: &str) -> Option<&CulturalStyle> {
        self.cultural_styles.get(name)
    }

    /// Styles configured for a terrain that actually exist.
    pub fn styles_for_terrain(&self, terrain: &str) -> Vec<&str> {
        self.terrain_styles
            .get(terrain)
            .map(|names| {
                names
                    .iter()
                    .filter(|name| self.cultural_styles.contains_key(name.as_str()))
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn special_names(&self, terrain: &str, style: &str) -> &[String] {
        self.special_names
            .get(terrain)
            .and_then(|by_style| by_style.get(style))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Helper to convert &[&str] to Vec<String>.
fn strs(slice: &[&str]) -> Vec<String> {
    slice.iter().map(|s| s.to_string()).collect()
}
