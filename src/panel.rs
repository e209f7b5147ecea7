//! Renderer interface and the view models painted through it.
//!
//! The controller builds plain data (`CellView`, `PanelContent`,
//! `StatusMessage`) and hands it to a `Renderer`; front ends decide how it
//! looks. Panel text formatting lives here so every front end shows the same
//! thing.

use crate::economics::Economics;
use crate::geometry::{HexGeometry, PixelPos, PixelSize};
use crate::movement::{MovementReport, Neighbour};
use crate::terrain::{TerrainCatalog, TerrainKind};
use crate::world::{HexCell, HexCoord, Settlement, SettlementType};

/// Drawing surface for the map editor.
pub trait Renderer {
    /// Size the map canvas for a new grid.
    fn set_canvas_size(&mut self, size: PixelSize);
    /// Draw (or redraw) one hex.
    fn paint_cell(&mut self, cell: &CellView);
    /// Replace the info panel contents.
    fn paint_panel(&mut self, content: &PanelContent);
    /// Show a non-blocking status line.
    fn show_status(&mut self, status: &StatusMessage);
}

/// Everything needed to draw one hex.
#[derive(Clone, Debug, PartialEq)]
pub struct CellView {
    pub coord: HexCoord,
    pub position: PixelPos,
    pub terrain: TerrainKind,
    pub color: (u8, u8, u8),
    pub glyph: char,
    pub settlement: Option<SettlementType>,
    /// Settlement name, shown as a label
    pub label: Option<String>,
    pub selected: bool,
}

impl CellView {
    pub fn new(
        cell: &HexCell,
        catalog: &TerrainCatalog,
        geometry: &HexGeometry,
        selected: bool,
    ) -> Self {
        let info = catalog.info(cell.terrain());
        Self {
            coord: cell.coord(),
            position: geometry.position(cell.coord()),
            terrain: cell.terrain().clone(),
            color: info.map(|i| i.rgb()).unwrap_or((128, 128, 128)),
            glyph: catalog.glyph_for(cell.terrain()),
            settlement: cell.settlement().map(|s| s.kind),
            label: cell.settlement().map(|s| s.name.clone()),
            selected,
        }
    }

    /// Marker drawn over the terrain glyph for settlements.
    pub fn icon(&self) -> Option<char> {
        self.settlement.map(|kind| match kind {
            SettlementType::City => '#',
            SettlementType::Town => '*',
            SettlementType::Village => 'o',
        })
    }
}

/// Read-only snapshot of a cell for the info panel.
#[derive(Clone, Debug, PartialEq)]
pub struct CellSummary {
    pub coord: HexCoord,
    pub terrain: String,
    /// Resource tag and quantity when the backend supplied one
    pub resources: Vec<(String, Option<u64>)>,
    pub population: u64,
    pub economics: Option<Economics>,
    pub settlement: Option<Settlement>,
    pub geographic_name: Option<String>,
    pub location_id: Option<String>,
}

impl CellSummary {
    pub fn new(cell: &HexCell, catalog: &TerrainCatalog) -> Self {
        let terrain = catalog
            .info(cell.terrain())
            .map(|info| info.name.clone())
            .unwrap_or_else(|| cell.terrain().to_string());
        let resources = cell
            .resources()
            .iter()
            .map(|tag| {
                let quantity = cell
                    .resource_quantities
                    .as_ref()
                    .and_then(|q| q.get(tag).copied());
                (tag.clone(), quantity)
            })
            .collect();
        Self {
            coord: cell.coord(),
            terrain,
            resources,
            population: cell.population(),
            economics: cell.economics().cloned(),
            settlement: cell.settlement().cloned(),
            geographic_name: cell.geographic_name.clone(),
            location_id: cell.location_id.clone(),
        }
    }
}

/// State of the movement section of the panel.
#[derive(Clone, Debug, PartialEq)]
pub enum MovementPanel {
    Loading,
    Ready(MovementReport),
    Unavailable,
}

/// Info panel contents.
#[derive(Clone, Debug, PartialEq)]
pub enum PanelContent {
    /// Nothing selected
    Empty,
    Cell {
        summary: CellSummary,
        movement: MovementPanel,
    },
}

impl PanelContent {
    /// The panel as text, one entry per line.
    pub fn lines(&self) -> Vec<String> {
        let (summary, movement) = match self {
            PanelContent::Empty => return vec!["Select a hex to inspect it.".to_string()],
            PanelContent::Cell { summary, movement } => (summary, movement),
        };

        let mut lines = Vec::new();
        let title = summary
            .geographic_name
            .clone()
            .unwrap_or_else(|| summary.terrain.clone());
        lines.push(format!("{} ({})", title, summary.coord));
        lines.push(format!("Terrain: {}", summary.terrain));
        if let Some(id) = &summary.location_id {
            lines.push(format!("Location: {}", id));
        }

        if summary.resources.is_empty() {
            lines.push("Resources: none".to_string());
        } else {
            let list: Vec<String> = summary
                .resources
                .iter()
                .map(|(tag, quantity)| match quantity {
                    Some(q) => format!("{} ({})", tag, q),
                    None => tag.clone(),
                })
                .collect();
            lines.push(format!("Resources: {}", list.join(", ")));
        }

        match &summary.economics {
            Some(eco) => {
                lines.push(format!(
                    "Rural: pop {}, wages {}, taxes {}",
                    eco.rural.population, eco.rural.wages, eco.rural.taxes
                ));
                if let Some(s) = &eco.settlement {
                    lines.push(format!(
                        "{} ({}): pop {}, wages {}, taxes {}",
                        s.name, s.kind, s.population, s.wages, s.taxes
                    ));
                    lines.push(format!("Total taxes: {}", eco.total_taxes()));
                }
            }
            None => lines.push(format!("Population: {}", summary.population)),
        }

        if let Some(s) = &summary.settlement {
            let race = s.race.as_deref().map(|r| format!(", {}", r)).unwrap_or_default();
            lines.push(format!("Settlement: {} [{}{}] pop {}", s.name, s.kind, race, s.population));
        }

        lines.push(String::new());
        match movement {
            MovementPanel::Loading => lines.push("Loading movement data...".to_string()),
            MovementPanel::Unavailable => lines.push("Movement data unavailable".to_string()),
            MovementPanel::Ready(report) => {
                lines.push("Movement (walk / ride / fly):".to_string());
                for (direction, neighbour) in report.compass() {
                    lines.push(match neighbour {
                        Some(n) => format!("{:>2} {}", direction, neighbour_line(n)),
                        None => format!("{:>2} -", direction),
                    });
                }
            }
        }
        lines
    }
}

fn neighbour_line(n: &Neighbour) -> String {
    let id = n
        .location_id
        .as_deref()
        .map(|id| format!(" [{}]", id))
        .unwrap_or_default();
    let times = if n.movement.is_impassable() {
        match &n.movement.note {
            Some(note) => format!("impassable ({}), fly {}", note, n.movement.flying),
            None => format!("impassable, fly {}", n.movement.flying),
        }
    } else {
        format!(
            "{} / {} / {}",
            n.movement.walking, n.movement.riding, n.movement.flying
        )
    };
    format!("{}{} {}: {}", n.destination, id, n.terrain, times)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// One-line status shown without interrupting the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            text: text.into(),
        }
    }
}
