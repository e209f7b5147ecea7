//! World model
//!
//! The authoritative in-memory representation of one world: a sparse grid of
//! hex cells keyed by coordinate, each possibly holding a settlement. All
//! mutation goes through `World` so resources and economics never drift from
//! the terrain they are derived from.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::economics::Economics;
use crate::terrain::{TerrainCatalog, TerrainKind};

/// Grid coordinate of a hex, 0-indexed.
///
/// Ordered row-major (by `y`, then `x`) so iteration follows reading order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HexCoord {
    pub x: u32,
    pub y: u32,
}

impl HexCoord {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Canonical `"x,y"` key.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl Ord for HexCoord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for HexCoord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for HexCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid hex key {0:?}, expected \"x,y\"")]
pub struct ParseCoordError(pub String);

impl FromStr for HexCoord {
    type Err = ParseCoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s.split_once(',').ok_or_else(|| ParseCoordError(s.to_string()))?;
        let parse = |part: &str| {
            // No padding or signs in canonical keys
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseCoordError(s.to_string()));
            }
            part.parse::<u32>().map_err(|_| ParseCoordError(s.to_string()))
        };
        Ok(HexCoord::new(parse(x)?, parse(y)?))
    }
}

/// Settlement size class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementType {
    Village,
    Town,
    City,
}

impl SettlementType {
    pub fn all() -> &'static [SettlementType] {
        &[SettlementType::Village, SettlementType::Town, SettlementType::City]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementType::Village => "village",
            SettlementType::Town => "town",
            SettlementType::City => "city",
        }
    }

    /// Population given to a settlement founded in the editor.
    pub fn default_population(&self) -> u64 {
        match self {
            SettlementType::Village => 500,
            SettlementType::Town => 750,
            SettlementType::City => 1000,
        }
    }
}

impl fmt::Display for SettlementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named inhabited place inside a hex.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SettlementType,
    pub population: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub race: Option<String>,
}

impl Settlement {
    pub fn new(name: impl Into<String>, kind: SettlementType) -> Self {
        Self {
            name: name.into(),
            kind,
            population: kind.default_population(),
            race: None,
        }
    }
}

/// One grid cell.
#[derive(Clone, Debug, PartialEq)]
pub struct HexCell {
    coord: HexCoord,
    terrain: TerrainKind,
    resources: Vec<String>,
    /// Backend-supplied quantities, display only
    pub resource_quantities: Option<BTreeMap<String, u64>>,
    settlement: Option<Settlement>,
    population: u64,
    pub geographic_name: Option<String>,
    pub location_id: Option<String>,
    economics: Option<Economics>,
}

impl HexCell {
    /// Plains, catalog resources, nobody living there.
    pub fn empty(coord: HexCoord, catalog: &TerrainCatalog) -> Self {
        let terrain = TerrainKind::Plains;
        Self {
            coord,
            resources: catalog.resources_for(&terrain).to_vec(),
            terrain,
            resource_quantities: None,
            settlement: None,
            population: 0,
            geographic_name: None,
            location_id: None,
            economics: None,
        }
    }

    /// Cell as read from a world file. Validation is the caller's job.
    pub(crate) fn from_parts(
        coord: HexCoord,
        terrain: TerrainKind,
        resources: Vec<String>,
        settlement: Option<Settlement>,
        population: u64,
        economics: Option<Economics>,
    ) -> Self {
        Self {
            coord,
            terrain,
            resources,
            resource_quantities: None,
            settlement,
            population,
            geographic_name: None,
            location_id: None,
            economics,
        }
    }

    pub fn coord(&self) -> HexCoord {
        self.coord
    }

    pub fn terrain(&self) -> &TerrainKind {
        &self.terrain
    }

    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    pub fn settlement(&self) -> Option<&Settlement> {
        self.settlement.as_ref()
    }

    /// Rural plus settlement population.
    pub fn population(&self) -> u64 {
        self.population
    }

    pub fn economics(&self) -> Option<&Economics> {
        self.economics.as_ref()
    }

    fn recompute_economics(&mut self, catalog: &TerrainCatalog) {
        self.economics = Some(Economics::compute(
            self.population,
            self.settlement.as_ref(),
            catalog.wage_modifier_for(&self.terrain),
        ));
    }
}

/// Errors from world loading and editing.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("invalid world data: {0}")]
    InvalidWorldData(String),
    #[error("no cell at ({0})")]
    CellNotFound(HexCoord),
    #[error("hex ({0}) already has a settlement")]
    SettlementExists(HexCoord),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSize {
    pub width: u32,
    pub height: u32,
}

/// Edge wrapping rules, carried for the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapRules {
    #[serde(default)]
    pub east_west: bool,
    #[serde(default)]
    pub north_south: bool,
}

impl Default for WrapRules {
    fn default() -> Self {
        Self {
            east_west: true,
            north_south: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldMetadata {
    pub name: String,
    pub size: WorldSize,
    #[serde(default)]
    pub wrap: WrapRules,
    /// ISO-8601 timestamp; naive timestamps from the backend are kept as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    /// Fields this editor does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl WorldMetadata {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            size: WorldSize { width, height },
            wrap: WrapRules::default(),
            generated_at: Some(chrono::Utc::now().to_rfc3339()),
            extra: serde_json::Map::new(),
        }
    }
}

/// One world and everything in it.
#[derive(Clone, Debug)]
pub struct World {
    metadata: WorldMetadata,
    cells: BTreeMap<HexCoord, HexCell>,
    catalog: Arc<TerrainCatalog>,
    /// Ids the backend gave the settlements, by hex
    settlement_ids: BTreeMap<HexCoord, String>,
    dirty: bool,
    edit_seq: u64,
}

impl World {
    /// A `width` x `height` world of empty plains.
    pub fn create_empty(width: u32, height: u32, catalog: Arc<TerrainCatalog>) -> Self {
        let mut cells = BTreeMap::new();
        for y in 0..height {
            for x in 0..width {
                let coord = HexCoord::new(x, y);
                cells.insert(coord, HexCell::empty(coord, &catalog));
            }
        }
        Self {
            metadata: WorldMetadata::new("Untitled World", width, height),
            cells,
            catalog,
            settlement_ids: BTreeMap::new(),
            dirty: false,
            edit_seq: 0,
        }
    }

    /// Assemble a world from already validated parts.
    pub(crate) fn from_parts(
        metadata: WorldMetadata,
        cells: BTreeMap<HexCoord, HexCell>,
        catalog: Arc<TerrainCatalog>,
        settlement_ids: BTreeMap<HexCoord, String>,
    ) -> Self {
        Self {
            metadata,
            cells,
            catalog,
            settlement_ids,
            dirty: false,
            edit_seq: 0,
        }
    }

    pub fn metadata(&self) -> &WorldMetadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.metadata.name = name.into();
        self.touch();
    }

    pub fn width(&self) -> u32 {
        self.metadata.size.width
    }

    pub fn height(&self) -> u32 {
        self.metadata.size.height
    }

    pub fn catalog(&self) -> &Arc<TerrainCatalog> {
        &self.catalog
    }

    /// Backend id of the settlement at `coord`, if it came with one.
    pub fn settlement_id(&self, coord: HexCoord) -> Option<&str> {
        self.settlement_ids.get(&coord).map(String::as_str)
    }

    pub fn in_bounds(&self, coord: HexCoord) -> bool {
        coord.x < self.width() && coord.y < self.height()
    }

    pub fn cell(&self, coord: HexCoord) -> Option<&HexCell> {
        self.cells.get(&coord)
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &HexCell> {
        self.cells.values()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn settlement_names(&self) -> impl Iterator<Item = &str> {
        self.cells
            .values()
            .filter_map(|cell| cell.settlement.as_ref())
            .map(|s| s.name.as_str())
    }

    /// True when local edits have not been acknowledged by the backend.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Sequence number of the latest local edit.
    pub fn edit_seq(&self) -> u64 {
        self.edit_seq
    }

    /// Clear the dirty flag if `edit_seq` is still the latest edit.
    pub fn mark_synced(&mut self, edit_seq: u64) -> bool {
        if edit_seq == self.edit_seq {
            self.dirty = false;
        }
        !self.dirty
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.edit_seq += 1;
    }

    /// Change the grid dimensions.
    ///
    /// Cells inside both the old and new bounds keep their data; cells
    /// outside the new bounds are dropped; coordinates beyond the old bounds
    /// get empty cells. There is no undo.
    pub fn resize(&mut self, width: u32, height: u32) {
        let (old_width, old_height) = (self.width(), self.height());
        self.cells.retain(|coord, _| coord.x < width && coord.y < height);
        self.settlement_ids.retain(|coord, _| coord.x < width && coord.y < height);
        for y in 0..height {
            for x in 0..width {
                if x < old_width && y < old_height {
                    continue;
                }
                let coord = HexCoord::new(x, y);
                self.cells.insert(coord, HexCell::empty(coord, &self.catalog));
            }
        }
        self.metadata.size = WorldSize { width, height };
        debug!(old_width, old_height, width, height, "world resized");
        self.touch();
    }

    /// Change a cell's terrain, re-deriving its resources and economics.
    pub fn set_terrain(
        &mut self,
        coord: HexCoord,
        terrain: TerrainKind,
    ) -> Result<&HexCell, WorldError> {
        let catalog = Arc::clone(&self.catalog);
        let cell = self
            .cells
            .get_mut(&coord)
            .ok_or(WorldError::CellNotFound(coord))?;
        cell.resources = catalog.resources_for(&terrain).to_vec();
        cell.terrain = terrain;
        cell.recompute_economics(&catalog);
        self.touch();
        debug!(x = coord.x, y = coord.y, edit_seq = self.edit_seq, "terrain changed");
        self.cell(coord).ok_or(WorldError::CellNotFound(coord))
    }

    /// Current economics of a cell, `None` if never computed.
    pub fn economics_for(&self, coord: HexCoord) -> Option<&Economics> {
        self.cells.get(&coord).and_then(HexCell::economics)
    }

    /// Place a settlement in a cell that has none.
    ///
    /// The cell population grows by the settlement population.
    pub fn found_settlement(
        &mut self,
        coord: HexCoord,
        settlement: Settlement,
    ) -> Result<&HexCell, WorldError> {
        if settlement.population == 0 {
            return Err(WorldError::InvalidWorldData(format!(
                "settlement {} has no population",
                settlement.name
            )));
        }
        let catalog = Arc::clone(&self.catalog);
        let cell = self
            .cells
            .get_mut(&coord)
            .ok_or(WorldError::CellNotFound(coord))?;
        if cell.settlement.is_some() {
            return Err(WorldError::SettlementExists(coord));
        }
        cell.population += settlement.population;
        cell.settlement = Some(settlement);
        cell.recompute_economics(&catalog);
        self.touch();
        self.cell(coord).ok_or(WorldError::CellNotFound(coord))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Arc<TerrainCatalog> {
        Arc::new(TerrainCatalog::defaults())
    }

    #[test]
    fn test_coord_key_round_trip() {
        let coord = HexCoord::new(12, 3);
        assert_eq!(coord.key(), "12,3");
        assert_eq!("12,3".parse::<HexCoord>(), Ok(coord));
        assert!("12".parse::<HexCoord>().is_err());
        assert!("1, 2".parse::<HexCoord>().is_err());
        assert!("-1,2".parse::<HexCoord>().is_err());
        assert!("a,b".parse::<HexCoord>().is_err());
    }

    #[test]
    fn test_coords_order_row_major() {
        let mut coords = vec![HexCoord::new(1, 1), HexCoord::new(2, 0), HexCoord::new(0, 1)];
        coords.sort();
        assert_eq!(coords, vec![HexCoord::new(2, 0), HexCoord::new(0, 1), HexCoord::new(1, 1)]);
    }

    #[test]
    fn test_create_empty_fills_grid() {
        let catalog = catalog();
        let world = World::create_empty(4, 3, Arc::clone(&catalog));
        assert_eq!(world.cell_count(), 12);
        for y in 0..3 {
            for x in 0..4 {
                let cell = world.cell(HexCoord::new(x, y)).unwrap();
                assert_eq!(cell.terrain(), &TerrainKind::Plains);
                assert_eq!(cell.resources(), catalog.resources_for(&TerrainKind::Plains));
                assert!(cell.settlement().is_none());
                assert!(cell.economics().is_none());
            }
        }
        assert!(!world.is_dirty());
    }

    #[test]
    fn test_set_terrain_mountains_scenario() {
        let catalog = catalog();
        let mut world = World::create_empty(3, 3, Arc::clone(&catalog));
        let before = world.clone();

        let cell = world.set_terrain(HexCoord::new(1, 1), TerrainKind::Mountains).unwrap();
        assert_eq!(cell.resources(), &["stone", "iron", "gems"]);

        for y in 0..3 {
            for x in 0..3 {
                let coord = HexCoord::new(x, y);
                if coord == HexCoord::new(1, 1) {
                    continue;
                }
                assert_eq!(world.cell(coord), before.cell(coord));
            }
        }
        assert!(world.is_dirty());
        assert_eq!(world.edit_seq(), 1);
    }

    #[test]
    fn test_set_terrain_is_idempotent() {
        let mut world = World::create_empty(2, 2, catalog());
        let coord = HexCoord::new(0, 1);
        let first = world.set_terrain(coord, TerrainKind::Swamps).unwrap().clone();
        let second = world.set_terrain(coord, TerrainKind::Swamps).unwrap();
        assert_eq!(first.resources(), second.resources());
        assert_eq!(first.economics(), second.economics());
    }

    #[test]
    fn test_set_terrain_missing_cell() {
        let mut world = World::create_empty(2, 2, catalog());
        let err = world.set_terrain(HexCoord::new(5, 5), TerrainKind::Hills).unwrap_err();
        assert!(matches!(err, WorldError::CellNotFound(c) if c == HexCoord::new(5, 5)));
        assert!(!world.is_dirty());
        assert_eq!(world.edit_seq(), 0);
    }

    #[test]
    fn test_unknown_terrain_has_no_resources() {
        let mut world = World::create_empty(1, 1, catalog());
        let cell = world.set_terrain(HexCoord::new(0, 0), TerrainKind::from("lava")).unwrap();
        assert!(cell.resources().is_empty());
        assert_eq!(cell.economics().unwrap().rural.wages, 13);
    }

    #[test]
    fn test_economics_split_after_edit() {
        let mut world = World::create_empty(2, 2, catalog());
        let coord = HexCoord::new(1, 0);
        world
            .found_settlement(coord, Settlement::new("Westmarch", SettlementType::City))
            .unwrap();
        world.set_terrain(coord, TerrainKind::Hills).unwrap();

        let cell = world.cell(coord).unwrap();
        let eco = world.economics_for(coord).unwrap();
        let settlement = eco.settlement.as_ref().unwrap();
        assert_eq!(settlement.population, cell.settlement().unwrap().population);
        assert_eq!(settlement.population + eco.rural.population, cell.population());
        assert_eq!(settlement.name, "Westmarch");
    }

    #[test]
    fn test_found_settlement_rejects_occupied() {
        let mut world = World::create_empty(2, 1, catalog());
        let coord = HexCoord::new(0, 0);
        world
            .found_settlement(coord, Settlement::new("Aldermere", SettlementType::Town))
            .unwrap();
        assert_eq!(world.cell(coord).unwrap().population(), 750);
        let err = world
            .found_settlement(coord, Settlement::new("Highcrown", SettlementType::Village))
            .unwrap_err();
        assert!(matches!(err, WorldError::SettlementExists(_)));
        assert_eq!(world.settlement_names().collect::<Vec<_>>(), vec!["Aldermere"]);
    }

    #[test]
    fn test_resize_keeps_intersection() {
        let mut world = World::create_empty(3, 3, catalog());
        world.set_terrain(HexCoord::new(1, 1), TerrainKind::Forests).unwrap();
        world.resize(5, 2);
        assert_eq!(world.cell_count(), 10);
        assert_eq!(world.width(), 5);
        assert_eq!(world.cell(HexCoord::new(1, 1)).unwrap().terrain(), &TerrainKind::Forests);
        assert!(world.cell(HexCoord::new(1, 2)).is_none());
        assert_eq!(world.cell(HexCoord::new(4, 1)).unwrap().terrain(), &TerrainKind::Plains);
    }

    #[test]
    fn test_resize_does_not_resurrect() {
        let mut world = World::create_empty(4, 4, catalog());
        let far = HexCoord::new(3, 3);
        world.set_terrain(far, TerrainKind::Deserts).unwrap();
        world
            .found_settlement(far, Settlement::new("Sunspire", SettlementType::Town))
            .unwrap();

        world.resize(2, 2);
        world.resize(4, 4);

        let cell = world.cell(far).unwrap();
        assert_eq!(cell.terrain(), &TerrainKind::Plains);
        assert!(cell.settlement().is_none());
        assert_eq!(cell.population(), 0);
        assert_eq!(world.cell_count(), 16);
    }

    #[test]
    fn test_mark_synced_only_for_latest_edit() {
        let mut world = World::create_empty(2, 2, catalog());
        world.set_terrain(HexCoord::new(0, 0), TerrainKind::Hills).unwrap();
        world.set_terrain(HexCoord::new(1, 0), TerrainKind::Hills).unwrap();
        assert!(!world.mark_synced(1));
        assert!(world.is_dirty());
        assert!(world.mark_synced(2));
        assert!(!world.is_dirty());
    }
}
