//! Terrain kinds and the terrain catalog.
//!
//! The catalog is the single source of truth for what a terrain looks like
//! and what it yields. Defaults are embedded in the binary via `include_str!`;
//! a `terrain_types.json` in the data directory or the backend's
//! `/api/terrain-types` listing can override them at startup. After that the
//! catalog is shared read-only.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ConfigError;

const DEFAULT_TERRAIN_JSON: &str = include_str!("../data/defaults/terrain_types.json");

/// Kind of terrain covering a hex.
///
/// Names the backend sends that are not part of the known set are kept as
/// `Other` so they survive a load/save round trip.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TerrainKind {
    Plains,
    Hills,
    Mountains,
    Forests,
    Swamps,
    Deserts,
    Water,
    Tundra,
    Other(String),
}

impl TerrainKind {
    /// All built-in kinds, in palette order.
    pub fn all() -> &'static [TerrainKind] {
        &[
            TerrainKind::Plains,
            TerrainKind::Hills,
            TerrainKind::Mountains,
            TerrainKind::Forests,
            TerrainKind::Swamps,
            TerrainKind::Deserts,
            TerrainKind::Water,
            TerrainKind::Tundra,
        ]
    }

    pub fn as_str(&self) -> &str {
        match self {
            TerrainKind::Plains => "plains",
            TerrainKind::Hills => "hills",
            TerrainKind::Mountains => "mountains",
            TerrainKind::Forests => "forests",
            TerrainKind::Swamps => "swamps",
            TerrainKind::Deserts => "deserts",
            TerrainKind::Water => "water",
            TerrainKind::Tundra => "tundra",
            TerrainKind::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, TerrainKind::Other(_))
    }
}

impl From<&str> for TerrainKind {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "plains" => TerrainKind::Plains,
            "hills" => TerrainKind::Hills,
            "mountains" => TerrainKind::Mountains,
            "forests" => TerrainKind::Forests,
            "swamps" => TerrainKind::Swamps,
            "deserts" => TerrainKind::Deserts,
            "water" => TerrainKind::Water,
            "tundra" => TerrainKind::Tundra,
            _ => TerrainKind::Other(value.to_string()),
        }
    }
}

impl From<String> for TerrainKind {
    fn from(value: String) -> Self {
        TerrainKind::from(value.as_str())
    }
}

impl From<TerrainKind> for String {
    fn from(value: TerrainKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for TerrainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display and economic data for one terrain kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainInfo {
    pub name: String,
    /// CSS-style hex color, e.g. "#90EE90"
    pub color: String,
    #[serde(default = "default_glyph")]
    pub glyph: char,
    #[serde(default)]
    pub resources: Vec<String>,
    /// Multiplier applied to rural wages (>= 1.0)
    #[serde(default = "default_wage_modifier")]
    pub wage_modifier: f64,
}

fn default_glyph() -> char {
    '.'
}

fn default_wage_modifier() -> f64 {
    1.0
}

impl TerrainInfo {
    /// Parse the `#RRGGBB` color into components; grey if malformed.
    pub fn rgb(&self) -> (u8, u8, u8) {
        parse_hex_color(&self.color).unwrap_or((128, 128, 128))
    }
}

/// On-disk / backend shape: `{"terrain_types": {"plains": {...}}}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TerrainTypesFile {
    pub terrain_types: BTreeMap<String, TerrainInfo>,
}

/// Terrain kind -> display color, resources and wage modifier.
#[derive(Clone, Debug)]
pub struct TerrainCatalog {
    entries: BTreeMap<TerrainKind, TerrainInfo>,
}

impl TerrainCatalog {
    /// Catalog built from the embedded defaults.
    pub fn defaults() -> Self {
        match serde_json::from_str::<TerrainTypesFile>(DEFAULT_TERRAIN_JSON) {
            Ok(file) => Self::from_file(file),
            Err(err) => {
                // Embedded data is checked by tests; keep the editor usable regardless
                warn!(
                    error = %err,
                    "embedded terrain_types.json is invalid, using minimal catalog"
                );
                Self::minimal()
            }
        }
    }

    fn minimal() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            TerrainKind::Plains,
            TerrainInfo {
                name: "Plains".to_string(),
                color: "#90EE90".to_string(),
                glyph: '"',
                resources: vec!["grain".to_string(), "horses".to_string()],
                wage_modifier: 1.0,
            },
        );
        Self { entries }
    }

    fn from_file(file: TerrainTypesFile) -> Self {
        let entries = file
            .terrain_types
            .into_iter()
            .map(|(key, info)| (TerrainKind::from(key), info))
            .collect();
        Self { entries }
    }

    /// Read a `terrain_types.json` file.
    pub fn read(path: &Path) -> Result<TerrainTypesFile, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Defaults, overridden by `terrain_types.json` in `dir` when present.
    ///
    /// A missing or unreadable file keeps the defaults.
    pub fn load_from(dir: &Path) -> Self {
        let mut catalog = Self::defaults();
        let path = dir.join("terrain_types.json");
        if !path.exists() {
            return catalog;
        }
        match Self::read(&path) {
            Ok(file) => {
                catalog.overlay(file);
                info!(path = %path.display(), "terrain catalog loaded");
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "terrain catalog override ignored");
            }
        }
        catalog
    }

    /// Overlay a listing; entries replace existing ones wholesale.
    pub fn overlay(&mut self, file: TerrainTypesFile) {
        for (key, info) in file.terrain_types {
            self.entries.insert(TerrainKind::from(key), info);
        }
    }

    /// Merge the backend's terrain listing.
    ///
    /// The backend does not know about wage modifiers or glyphs, so those are
    /// kept from the local entry when one exists.
    pub fn merge_backend(&mut self, listing: &serde_json::Value) -> Result<usize, ConfigError> {
        let file: BackendTerrainTypes = serde_json::from_value(listing.clone())?;
        let mut merged = 0;
        for (key, remote) in file.terrain_types {
            let kind = TerrainKind::from(key);
            let local = self.entries.get(&kind);
            let info = TerrainInfo {
                name: remote.name,
                color: remote.color,
                glyph: local.map(|l| l.glyph).unwrap_or_else(default_glyph),
                resources: remote.resources,
                wage_modifier: local.map(|l| l.wage_modifier).unwrap_or(1.0),
            };
            self.entries.insert(kind, info);
            merged += 1;
        }
        Ok(merged)
    }

    pub fn info(&self, kind: &TerrainKind) -> Option<&TerrainInfo> {
        self.entries.get(kind)
    }

    /// Base resources for a terrain; empty for unknown kinds.
    pub fn resources_for(&self, kind: &TerrainKind) -> &[String] {
        self.entries
            .get(kind)
            .map(|info| info.resources.as_slice())
            .unwrap_or(&[])
    }

    /// Rural wage multiplier; 1.0 for unknown kinds.
    pub fn wage_modifier_for(&self, kind: &TerrainKind) -> f64 {
        self.entries
            .get(kind)
            .map(|info| info.wage_modifier)
            .unwrap_or(1.0)
    }

    pub fn glyph_for(&self, kind: &TerrainKind) -> char {
        self.entries.get(kind).map(|info| info.glyph).unwrap_or('?')
    }

    pub fn kinds(&self) -> impl Iterator<Item = &TerrainKind> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TerrainCatalog {
    fn default() -> Self {
        Self::defaults()
    }
}

#[derive(Deserialize)]
struct BackendTerrainTypes {
    terrain_types: BTreeMap<String, BackendTerrainInfo>,
}

#[derive(Deserialize)]
struct BackendTerrainInfo {
    name: String,
    color: String,
    #[serde(default)]
    resources: Vec<String>,
}

fn parse_hex_color(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}
