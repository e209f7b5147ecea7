//! World file format
//!
//! The JSON shape exchanged with the backend and written to disk:
//!
//! ```json
//! { "metadata": { "name": "...", "size": {"width": 5, "height": 5},
//!                 "wrap": {"east_west": true, "north_south": false},
//!                 "generated_at": "..." },
//!   "hexes": { "0,0": { "terrain": "plains", "resources": [...],
//!                       "population_center": null } },
//!   "population_centers": { "settlement_1": { "hex": "0,0", "type": "city",
//!                           "race": "human", "population": 1000, "name": "..." } } }
//! ```
//!
//! `population_center` is either a settlement id into `population_centers`
//! (the backend's generator output) or an inline settlement object (what this
//! editor writes). The table is rebuilt from the cells on every write, so it
//! never names a hex that is gone or misses a founded settlement.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::economics::Economics;
use crate::terrain::{TerrainCatalog, TerrainKind};
use crate::world::{
    HexCell, HexCoord, Settlement, SettlementType, World, WorldError, WorldMetadata,
};

/// Serialized world.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldFile {
    pub metadata: WorldMetadata,
    pub hexes: BTreeMap<String, HexRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_centers: Option<BTreeMap<String, PopulationCenterRecord>>,
}

/// Serialized hex cell.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HexRecord {
    pub terrain: TerrainKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub resource_quantities: Option<BTreeMap<String, u64>>,
    #[serde(default)]
    pub population_center: Option<PopulationCenterRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geographic_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub economics: Option<Economics>,
}

/// Settlement reference in a hex.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PopulationCenterRef {
    Id(String),
    Inline(Settlement),
}

/// Entry of the top-level `population_centers` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PopulationCenterRecord {
    pub hex: String,
    #[serde(rename = "type")]
    pub kind: SettlementType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub race: Option<String>,
    pub population: u64,
    pub name: String,
}

impl PopulationCenterRecord {
    fn new(coord: HexCoord, settlement: &Settlement) -> Self {
        Self {
            hex: coord.key(),
            kind: settlement.kind,
            race: settlement.race.clone(),
            population: settlement.population,
            name: settlement.name.clone(),
        }
    }
}

/// Optional fields that are dropped instead of failing the load when their
/// contents are malformed.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

impl WorldFile {
    /// Serialized form of a world.
    ///
    /// Settlements are written inline and listed in `population_centers`
    /// under their backend id, or `settlement_{x}_{y}` when they have none.
    pub fn from_world(world: &World) -> Self {
        let hexes = world
            .cells()
            .map(|cell| {
                let record = HexRecord {
                    terrain: cell.terrain().clone(),
                    resources: Some(cell.resources().to_vec()),
                    resource_quantities: cell.resource_quantities.clone(),
                    population_center: cell
                        .settlement()
                        .cloned()
                        .map(PopulationCenterRef::Inline),
                    population: Some(cell.population()),
                    geographic_name: cell.geographic_name.clone(),
                    location_id: cell.location_id.clone(),
                    economics: cell.economics().cloned(),
                };
                (cell.coord().key(), record)
            })
            .collect();

        let population_centers = settlement_table(world);

        Self {
            metadata: world.metadata().clone(),
            hexes,
            population_centers,
        }
    }

    /// Validate and build the in-memory world.
    pub fn into_world(self, catalog: Arc<TerrainCatalog>) -> Result<World, WorldError> {
        let size = self.metadata.size;
        let table = self.population_centers.clone().unwrap_or_default();

        let mut cells = BTreeMap::new();
        let mut settlement_ids = BTreeMap::new();
        for (key, record) in self.hexes {
            let coord: HexCoord = key
                .parse()
                .map_err(|err| WorldError::InvalidWorldData(format!("{}", err)))?;
            if coord.x >= size.width || coord.y >= size.height {
                return Err(WorldError::InvalidWorldData(format!(
                    "hex {} outside {}x{} world",
                    key, size.width, size.height
                )));
            }

            let settlement = match record.population_center {
                None => None,
                Some(PopulationCenterRef::Inline(settlement)) => Some(settlement),
                Some(PopulationCenterRef::Id(id)) => {
                    let entry = table.get(&id).ok_or_else(|| {
                        WorldError::InvalidWorldData(format!(
                            "hex {} references unknown settlement {}",
                            key, id
                        ))
                    })?;
                    settlement_ids.insert(coord, id.clone());
                    Some(Settlement {
                        name: entry.name.clone(),
                        kind: entry.kind,
                        population: entry.population,
                        race: entry.race.clone(),
                    })
                }
            };
            if let Some(settlement) = &settlement {
                if settlement.population == 0 {
                    return Err(WorldError::InvalidWorldData(format!(
                        "settlement {} at {} has no population",
                        settlement.name, key
                    )));
                }
            }

            let resources = record
                .resources
                .unwrap_or_else(|| catalog.resources_for(&record.terrain).to_vec());
            let population = record
                .population
                .or_else(|| settlement.as_ref().map(|s| s.population))
                .unwrap_or(0);

            let mut cell = HexCell::from_parts(
                coord,
                record.terrain,
                resources,
                settlement,
                population,
                record.economics,
            );
            cell.resource_quantities = record.resource_quantities;
            cell.geographic_name = record.geographic_name;
            cell.location_id = record.location_id;
            cells.insert(coord, cell);
        }

        // Inline settlements keep the id the table files them under
        for (id, entry) in table {
            if let Ok(coord) = entry.hex.parse::<HexCoord>() {
                let settled = cells.get(&coord).is_some_and(|c| c.settlement().is_some());
                if settled && !settlement_ids.values().any(|known| *known == id) {
                    settlement_ids.entry(coord).or_insert(id);
                }
            }
        }

        debug!(cells = cells.len(), width = size.width, height = size.height, "world file parsed");
        Ok(World::from_parts(self.metadata, cells, catalog, settlement_ids))
    }
}

/// `population_centers` for the settlements currently on the map.
fn settlement_table(world: &World) -> Option<BTreeMap<String, PopulationCenterRecord>> {
    let mut table = BTreeMap::new();
    let mut unfiled = Vec::new();
    for cell in world.cells() {
        let settlement = match cell.settlement() {
            Some(settlement) => settlement,
            None => continue,
        };
        let record = PopulationCenterRecord::new(cell.coord(), settlement);
        match world.settlement_id(cell.coord()) {
            Some(id) if !table.contains_key(id) => {
                table.insert(id.to_string(), record);
            }
            _ => unfiled.push((cell.coord(), record)),
        }
    }

    for (coord, record) in unfiled {
        let base = format!("settlement_{}_{}", coord.x, coord.y);
        let mut id = base.clone();
        let mut n = 2;
        while table.contains_key(&id) {
            id = format!("{}_{}", base, n);
            n += 1;
        }
        table.insert(id, record);
    }

    if table.is_empty() {
        None
    } else {
        Some(table)
    }
}

impl World {
    /// Build a world from a backend payload.
    ///
    /// Malformed payloads fail with `InvalidWorldData`; the caller's current
    /// world is not touched since this only constructs a new one.
    pub fn load(
        payload: serde_json::Value,
        catalog: Arc<TerrainCatalog>,
    ) -> Result<World, WorldError> {
        let file: WorldFile = serde_json::from_value(payload)
            .map_err(|err| WorldError::InvalidWorldData(err.to_string()))?;
        file.into_world(catalog)
    }

    pub fn from_json(text: &str, catalog: Arc<TerrainCatalog>) -> Result<World, WorldError> {
        let file: WorldFile = serde_json::from_str(text)
            .map_err(|err| WorldError::InvalidWorldData(err.to_string()))?;
        file.into_world(catalog)
    }

    pub fn to_file(&self) -> WorldFile {
        WorldFile::from_world(self)
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Every field is plain data, so this cannot fail
        serde_json::to_value(self.to_file()).unwrap_or(serde_json::Value::Null)
    }
}

/// Failure to read or write a world file on disk.
#[derive(Debug, Error)]
pub enum WorldFileError {
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode world: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    World(#[from] WorldError),
}

pub fn read_world(path: &Path, catalog: Arc<TerrainCatalog>) -> Result<World, WorldFileError> {
    let text = std::fs::read_to_string(path).map_err(|source| WorldFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let world = World::from_json(&text, catalog)?;
    info!(path = %path.display(), name = world.name(), "world loaded from disk");
    Ok(world)
}

pub fn write_world(path: &Path, world: &World) -> Result<(), WorldFileError> {
    let json = serde_json::to_string_pretty(&world.to_file())?;
    std::fs::write(path, json).map_err(|source| WorldFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), name = world.name(), "world written to disk");
    Ok(())
}

/// File name the backend uses for a saved world.
pub fn default_filename(world_name: &str) -> String {
    format!("{}.json", world_name.replace(' ', "_").to_lowercase())
}
