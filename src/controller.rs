//! Map interaction controller
//!
//! Owns the world and the name generator, routes clicks to inspect or edit
//! behaviour and paints through a `Renderer`. It never performs I/O itself:
//! operations that need the backend return `BackendRequest`s for the front
//! end to dispatch, and the answers come back through `apply_response`.
//! Local changes are always painted before the request is handed out.

use tracing::{debug, info, warn};

use crate::backend::BackendError;
use crate::geometry::{HexGeometry, HexLayout};
use crate::movement::MovementReport;
use crate::naming::SettlementNameGenerator;
use crate::panel::{CellSummary, CellView, MovementPanel, PanelContent, Renderer, StatusMessage};
use crate::terrain::TerrainKind;
use crate::world::{HexCoord, Settlement, SettlementType, World, WorldError};
use crate::world_file::WorldFile;

/// What a click does.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum EditMode {
    /// Clicks select and inspect
    #[default]
    Browsing,
    /// Clicks paint the given terrain
    Editing(TerrainKind),
}

/// Work for the backend, produced by the controller.
#[derive(Clone, Debug)]
pub enum BackendRequest {
    /// Load movement data for the selected hex
    FetchMovement { ticket: u64, coord: HexCoord },
    /// Push the whole world after a local edit
    PushWorld { edit_seq: u64, payload: WorldFile },
}

/// Backend answer to a `BackendRequest`.
#[derive(Debug)]
pub enum BackendResponse {
    Movement {
        ticket: u64,
        coord: HexCoord,
        result: Result<MovementReport, BackendError>,
    },
    WorldPushed {
        edit_seq: u64,
        result: Result<(), BackendError>,
    },
}

/// Interaction controller for one editing session.
pub struct MapController {
    world: World,
    names: SettlementNameGenerator,
    geometry: HexGeometry,
    mode: EditMode,
    selected: Option<HexCoord>,
    /// Latest movement ticket; responses with any other ticket are stale
    movement_ticket: u64,
    movement: MovementPanel,
}

impl MapController {
    /// Take ownership of a world. The generator is seeded with the world's
    /// existing settlement names.
    pub fn new(world: World, mut names: SettlementNameGenerator, geometry: HexGeometry) -> Self {
        names.reserve(world.settlement_names().map(str::to_string));
        Self {
            world,
            names,
            geometry,
            mode: EditMode::Browsing,
            selected: None,
            movement_ticket: 0,
            movement: MovementPanel::Loading,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn names(&self) -> &SettlementNameGenerator {
        &self.names
    }

    pub fn geometry(&self) -> &HexGeometry {
        &self.geometry
    }

    pub fn mode(&self) -> &EditMode {
        &self.mode
    }

    pub fn selected(&self) -> Option<HexCoord> {
        self.selected
    }

    pub fn enable_edit_mode(&mut self, terrain: TerrainKind) {
        info!(%terrain, "edit mode on");
        self.mode = EditMode::Editing(terrain);
    }

    pub fn exit_edit_mode(&mut self) {
        if self.mode != EditMode::Browsing {
            info!("edit mode off");
        }
        self.mode = EditMode::Browsing;
    }

    /// Paint the whole map and the panel.
    pub fn render_all<R: Renderer + ?Sized>(&self, renderer: &mut R) {
        renderer.set_canvas_size(
            self.geometry
                .container_size(self.world.width(), self.world.height()),
        );
        for cell in self.world.cells() {
            let selected = self.selected == Some(cell.coord());
            renderer.paint_cell(&CellView::new(
                cell,
                self.world.catalog(),
                &self.geometry,
                selected,
            ));
        }
        renderer.paint_panel(&self.panel_content());
    }

    /// Current info panel contents.
    pub fn panel_content(&self) -> PanelContent {
        match self.selected.and_then(|coord| self.world.cell(coord)) {
            Some(cell) => PanelContent::Cell {
                summary: CellSummary::new(cell, self.world.catalog()),
                movement: self.movement.clone(),
            },
            None => PanelContent::Empty,
        }
    }

    /// Pointer click at pixel coordinates on the map canvas.
    pub fn click_at<R: Renderer + ?Sized>(
        &mut self,
        px: f64,
        py: f64,
        renderer: &mut R,
    ) -> Vec<BackendRequest> {
        match self
            .geometry
            .cell_at(px, py, self.world.width(), self.world.height())
        {
            Some(coord) => self.click(coord, renderer),
            None => Vec::new(),
        }
    }

    /// Click on a hex: inspect while browsing, paint while editing.
    pub fn click<R: Renderer + ?Sized>(
        &mut self,
        coord: HexCoord,
        renderer: &mut R,
    ) -> Vec<BackendRequest> {
        match self.mode.clone() {
            EditMode::Browsing => self.select(coord, renderer).into_iter().collect(),
            EditMode::Editing(terrain) => self.edit(coord, terrain, renderer).into_iter().collect(),
        }
    }

    fn select<R: Renderer + ?Sized>(
        &mut self,
        coord: HexCoord,
        renderer: &mut R,
    ) -> Option<BackendRequest> {
        if self.world.cell(coord).is_none() {
            debug!(x = coord.x, y = coord.y, "click on hex without data");
            return None;
        }

        if let Some(previous) = self.selected.take() {
            self.repaint_cell(previous, renderer);
        }
        self.selected = Some(coord);
        self.movement_ticket += 1;
        self.movement = MovementPanel::Loading;
        self.repaint_cell(coord, renderer);
        renderer.paint_panel(&self.panel_content());

        Some(BackendRequest::FetchMovement {
            ticket: self.movement_ticket,
            coord,
        })
    }

    fn edit<R: Renderer + ?Sized>(
        &mut self,
        coord: HexCoord,
        terrain: TerrainKind,
        renderer: &mut R,
    ) -> Option<BackendRequest> {
        if let Err(err) = self.world.set_terrain(coord, terrain) {
            // Missing cells are display-only
            warn!(x = coord.x, y = coord.y, error = %err, "terrain edit ignored");
            return None;
        }
        Some(self.after_edit(coord, renderer))
    }

    /// Found a settlement in a hex, naming it from the hex's terrain.
    pub fn found_settlement<R: Renderer + ?Sized>(
        &mut self,
        coord: HexCoord,
        kind: SettlementType,
        renderer: &mut R,
    ) -> Vec<BackendRequest> {
        let terrain = match self.world.cell(coord) {
            Some(cell) if cell.settlement().is_some() => {
                let err = WorldError::SettlementExists(coord);
                warn!(x = coord.x, y = coord.y, error = %err, "settlement not founded");
                renderer.show_status(&StatusMessage::warning(err.to_string()));
                return Vec::new();
            }
            Some(cell) => cell.terrain().clone(),
            None => {
                warn!(x = coord.x, y = coord.y, "settlement not founded, no cell");
                return Vec::new();
            }
        };

        let name = self.names.generate(&terrain, kind);
        match self.world.found_settlement(coord, Settlement::new(name.clone(), kind)) {
            Ok(_) => {
                info!(x = coord.x, y = coord.y, %name, %kind, "settlement founded");
                renderer.show_status(&StatusMessage::info(format!("Founded {} {}", kind, name)));
                vec![self.after_edit(coord, renderer)]
            }
            Err(err) => {
                warn!(x = coord.x, y = coord.y, error = %err, "settlement not founded");
                renderer.show_status(&StatusMessage::warning(err.to_string()));
                Vec::new()
            }
        }
    }

    /// Resize the world. Data outside the new bounds is lost.
    pub fn resize<R: Renderer + ?Sized>(
        &mut self,
        width: u32,
        height: u32,
        renderer: &mut R,
    ) -> Vec<BackendRequest> {
        self.world.resize(width, height);
        if let Some(coord) = self.selected {
            if !self.world.in_bounds(coord) {
                self.clear_selection();
            }
        }
        self.render_all(renderer);
        vec![self.push_request()]
    }

    /// Switch hex layout and repaint.
    pub fn set_layout<R: Renderer + ?Sized>(&mut self, layout: HexLayout, renderer: &mut R) {
        self.geometry.layout = layout;
        self.render_all(renderer);
    }

    /// Install a freshly generated or loaded world.
    ///
    /// The name generator starts over with the new world's settlement names;
    /// in-flight movement lookups become stale.
    pub fn replace_world<R: Renderer + ?Sized>(&mut self, world: World, renderer: &mut R) {
        self.names.clear();
        self.names.reserve(world.settlement_names().map(str::to_string));
        self.world = world;
        self.clear_selection();
        info!(
            name = self.world.name(),
            width = self.world.width(),
            height = self.world.height(),
            settlements = self.names.used_count(),
            "world replaced"
        );
        self.render_all(renderer);
    }

    /// A full save of the world as of `edit_seq` reached the backend.
    pub fn mark_saved(&mut self, edit_seq: u64) -> bool {
        self.world.mark_synced(edit_seq)
    }

    /// Apply a backend answer, discarding it if no longer relevant.
    pub fn apply_response<R: Renderer + ?Sized>(
        &mut self,
        response: BackendResponse,
        renderer: &mut R,
    ) {
        match response {
            BackendResponse::Movement { ticket, coord, result } => {
                if ticket != self.movement_ticket || self.selected != Some(coord) {
                    debug!(ticket, x = coord.x, y = coord.y, "stale movement response dropped");
                    return;
                }
                self.movement = match result {
                    Ok(report) => MovementPanel::Ready(report),
                    Err(err) => {
                        warn!(x = coord.x, y = coord.y, error = %err, "movement lookup failed");
                        MovementPanel::Unavailable
                    }
                };
                renderer.paint_panel(&self.panel_content());
            }
            BackendResponse::WorldPushed { edit_seq, result } => match result {
                Ok(()) => {
                    let clean = self.world.mark_synced(edit_seq);
                    debug!(edit_seq, clean, "world sync acknowledged");
                }
                Err(err) => {
                    // Local state stays as edited
                    warn!(edit_seq, error = %err, "world sync failed");
                    renderer.show_status(&StatusMessage::warning(format!(
                        "Failed to sync world: {}",
                        err
                    )));
                }
            },
        }
    }

    /// Repaint after a local mutation of `coord` and build the sync request.
    fn after_edit<R: Renderer + ?Sized>(
        &mut self,
        coord: HexCoord,
        renderer: &mut R,
    ) -> BackendRequest {
        self.repaint_cell(coord, renderer);
        if self.selected == Some(coord) {
            renderer.paint_panel(&self.panel_content());
        }
        self.push_request()
    }

    fn push_request(&self) -> BackendRequest {
        BackendRequest::PushWorld {
            edit_seq: self.world.edit_seq(),
            payload: self.world.to_file(),
        }
    }

    fn repaint_cell<R: Renderer + ?Sized>(&self, coord: HexCoord, renderer: &mut R) {
        if let Some(cell) = self.world.cell(coord) {
            let selected = self.selected == Some(coord);
            renderer.paint_cell(&CellView::new(
                cell,
                self.world.catalog(),
                &self.geometry,
                selected,
            ));
        }
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.movement_ticket += 1;
        self.movement = MovementPanel::Loading;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PixelSize;
    use crate::movement::MovementResponse;
    use crate::naming::NamingConfig;
    use crate::terrain::TerrainCatalog;
    use std::sync::Arc;

    /// Renderer that records every call.
    #[derive(Default)]
    struct Recorder {
        canvas: Vec<PixelSize>,
        cells: Vec<CellView>,
        panels: Vec<PanelContent>,
        statuses: Vec<StatusMessage>,
    }

    impl Renderer for Recorder {
        fn set_canvas_size(&mut self, size: PixelSize) {
            self.canvas.push(size);
        }
        fn paint_cell(&mut self, cell: &CellView) {
            self.cells.push(cell.clone());
        }
        fn paint_panel(&mut self, content: &PanelContent) {
            self.panels.push(content.clone());
        }
        fn show_status(&mut self, status: &StatusMessage) {
            self.statuses.push(status.clone());
        }
    }

    fn controller(width: u32, height: u32) -> MapController {
        let world = World::create_empty(width, height, Arc::new(TerrainCatalog::defaults()));
        let names = SettlementNameGenerator::new(NamingConfig::fallback(), 42);
        MapController::new(world, names, HexGeometry::default())
    }

    fn ticket_of(requests: &[BackendRequest]) -> u64 {
        match requests {
            [BackendRequest::FetchMovement { ticket, .. }] => *ticket,
            other => panic!("expected one movement fetch, got {:?}", other),
        }
    }

    fn server_error() -> BackendError {
        BackendError::Status {
            status: 500,
            message: "Internal Server Error".to_string(),
        }
    }

    fn movement_ok() -> MovementReport {
        let response: MovementResponse = serde_json::from_value(serde_json::json!({
            "directions": {"N": {"destination": "Goldford", "terrain": "plains",
                                 "movement": {"walking": 1.0, "riding": 0.5, "flying": 0.5}}}
        }))
        .unwrap();
        MovementReport::from_response(response)
    }

    #[test]
    fn test_browsing_click_selects_and_fetches() {
        let mut ctl = controller(3, 3);
        let mut r = Recorder::default();
        let requests = ctl.click(HexCoord::new(1, 2), &mut r);
        let ticket = ticket_of(&requests);
        assert_eq!(ctl.selected(), Some(HexCoord::new(1, 2)));
        assert!(r.cells.last().unwrap().selected);
        match r.panels.last().unwrap() {
            PanelContent::Cell { movement, summary } => {
                assert_eq!(movement, &MovementPanel::Loading);
                assert_eq!(summary.coord, HexCoord::new(1, 2));
            }
            PanelContent::Empty => panic!("panel not painted"),
        }

        ctl.apply_response(
            BackendResponse::Movement {
                ticket,
                coord: HexCoord::new(1, 2),
                result: Ok(movement_ok()),
            },
            &mut r,
        );
        assert!(matches!(
            r.panels.last().unwrap(),
            PanelContent::Cell { movement: MovementPanel::Ready(_), .. }
        ));
    }

    #[test]
    fn test_reselect_unpaints_previous() {
        let mut ctl = controller(3, 3);
        let mut r = Recorder::default();
        ctl.click(HexCoord::new(0, 0), &mut r);
        r.cells.clear();
        ctl.click(HexCoord::new(2, 2), &mut r);
        assert_eq!(r.cells.len(), 2);
        assert_eq!(r.cells[0].coord, HexCoord::new(0, 0));
        assert!(!r.cells[0].selected);
        assert_eq!(r.cells[1].coord, HexCoord::new(2, 2));
        assert!(r.cells[1].selected);
    }

    #[test]
    fn test_stale_failure_is_discarded() {
        let mut ctl = controller(3, 3);
        let mut r = Recorder::default();
        let first = ticket_of(&ctl.click(HexCoord::new(0, 0), &mut r));
        let second = ticket_of(&ctl.click(HexCoord::new(1, 0), &mut r));
        let panels_before = r.panels.len();

        ctl.apply_response(
            BackendResponse::Movement {
                ticket: first,
                coord: HexCoord::new(0, 0),
                result: Err(server_error()),
            },
            &mut r,
        );
        assert_eq!(r.panels.len(), panels_before);
        assert!(r.statuses.is_empty());

        ctl.apply_response(
            BackendResponse::Movement {
                ticket: second,
                coord: HexCoord::new(1, 0),
                result: Ok(movement_ok()),
            },
            &mut r,
        );
        assert_eq!(r.panels.len(), panels_before + 1);
    }

    #[test]
    fn test_current_failure_shows_unavailable() {
        let mut ctl = controller(2, 2);
        let mut r = Recorder::default();
        let ticket = ticket_of(&ctl.click(HexCoord::new(0, 0), &mut r));
        ctl.apply_response(
            BackendResponse::Movement {
                ticket,
                coord: HexCoord::new(0, 0),
                result: Err(server_error()),
            },
            &mut r,
        );
        let lines = r.panels.last().unwrap().lines();
        assert_eq!(lines.last().unwrap(), "Movement data unavailable");
    }

    #[test]
    fn test_edit_mode_swamps_single_sync() {
        let mut ctl = controller(3, 3);
        let mut r = Recorder::default();
        ctl.enable_edit_mode(TerrainKind::Swamps);
        let requests = ctl.click(HexCoord::new(2, 0), &mut r);

        assert_eq!(requests.len(), 1);
        match &requests[0] {
            BackendRequest::PushWorld { edit_seq, payload } => {
                assert_eq!(*edit_seq, 1);
                assert_eq!(payload.hexes["2,0"].terrain, TerrainKind::Swamps);
            }
            other => panic!("expected push, got {:?}", other),
        }
        let cell = ctl.world().cell(HexCoord::new(2, 0)).unwrap();
        assert_eq!(cell.terrain(), &TerrainKind::Swamps);
        assert_eq!(cell.resources(), &["herbs", "rare_materials"]);
        assert_eq!(r.cells.len(), 1);
        assert_eq!(r.cells[0].terrain, TerrainKind::Swamps);
        // Not selected, so no panel refresh
        assert!(r.panels.is_empty());
        assert_eq!(ctl.selected(), None);
    }

    #[test]
    fn test_edit_refreshes_selected_panel() {
        let mut ctl = controller(3, 3);
        let mut r = Recorder::default();
        ctl.click(HexCoord::new(1, 1), &mut r);
        ctl.enable_edit_mode(TerrainKind::Mountains);
        r.panels.clear();
        ctl.click(HexCoord::new(1, 1), &mut r);
        match r.panels.as_slice() {
            [PanelContent::Cell { summary, .. }] => {
                assert_eq!(summary.terrain, "Mountains");
                assert!(summary.economics.is_some());
            }
            other => panic!("unexpected panels {:?}", other),
        }
        assert!(r.cells.last().unwrap().selected);
    }

    #[test]
    fn test_edit_missing_cell_is_noop() {
        let mut ctl = controller(2, 2);
        let mut r = Recorder::default();
        ctl.enable_edit_mode(TerrainKind::Hills);
        assert!(ctl.click(HexCoord::new(9, 9), &mut r).is_empty());
        assert!(r.cells.is_empty());
        assert!(!ctl.world().is_dirty());
    }

    #[test]
    fn test_push_failure_keeps_edit() {
        let mut ctl = controller(2, 2);
        let mut r = Recorder::default();
        ctl.enable_edit_mode(TerrainKind::Deserts);
        ctl.click(HexCoord::new(0, 1), &mut r);
        ctl.apply_response(
            BackendResponse::WorldPushed {
                edit_seq: 1,
                result: Err(server_error()),
            },
            &mut r,
        );
        assert_eq!(
            ctl.world().cell(HexCoord::new(0, 1)).unwrap().terrain(),
            &TerrainKind::Deserts
        );
        assert!(ctl.world().is_dirty());
        assert_eq!(r.statuses.len(), 1);
        assert!(r.statuses[0].text.starts_with("Failed to sync world"));
    }

    #[test]
    fn test_only_latest_ack_cleans() {
        let mut ctl = controller(2, 2);
        let mut r = Recorder::default();
        ctl.enable_edit_mode(TerrainKind::Forests);
        ctl.click(HexCoord::new(0, 0), &mut r);
        ctl.click(HexCoord::new(1, 0), &mut r);
        ctl.apply_response(BackendResponse::WorldPushed { edit_seq: 1, result: Ok(()) }, &mut r);
        assert!(ctl.world().is_dirty());
        ctl.apply_response(BackendResponse::WorldPushed { edit_seq: 2, result: Ok(()) }, &mut r);
        assert!(!ctl.world().is_dirty());
    }

    #[test]
    fn test_save_of_older_snapshot_leaves_dirty() {
        let mut ctl = controller(2, 2);
        let mut r = Recorder::default();
        ctl.enable_edit_mode(TerrainKind::Tundra);
        ctl.click(HexCoord::new(0, 0), &mut r);
        let saved_at = ctl.world().edit_seq();
        ctl.click(HexCoord::new(1, 1), &mut r);
        assert!(!ctl.mark_saved(saved_at));
        assert!(ctl.mark_saved(ctl.world().edit_seq()));
        assert!(!ctl.world().is_dirty());
    }

    #[test]
    fn test_exit_edit_mode_returns_to_browsing() {
        let mut ctl = controller(2, 2);
        let mut r = Recorder::default();
        ctl.enable_edit_mode(TerrainKind::Water);
        ctl.exit_edit_mode();
        assert_eq!(ctl.mode(), &EditMode::Browsing);
        let requests = ctl.click(HexCoord::new(0, 0), &mut r);
        assert!(matches!(requests[0], BackendRequest::FetchMovement { .. }));
        assert_eq!(ctl.world().cell(HexCoord::new(0, 0)).unwrap().terrain(), &TerrainKind::Plains);
    }

    #[test]
    fn test_found_settlement_names_uniquely() {
        let mut ctl = controller(3, 1);
        let mut r = Recorder::default();
        for x in 0..3 {
            let requests =
                ctl.found_settlement(HexCoord::new(x, 0), SettlementType::Village, &mut r);
            assert_eq!(requests.len(), 1);
        }
        let names: Vec<&str> = ctl.world().settlement_names().collect();
        assert_eq!(names.len(), 3);
        assert!(names.iter().all(|n| ctl.names().is_used(n)));
        assert_ne!(names[0], names[1]);

        let again = ctl.found_settlement(HexCoord::new(0, 0), SettlementType::City, &mut r);
        assert!(again.is_empty());
        assert_eq!(ctl.names().used_count(), 3);
    }

    #[test]
    fn test_replace_world_rehydrates_names() {
        let mut ctl = controller(2, 2);
        let mut r = Recorder::default();
        ctl.click(HexCoord::new(1, 1), &mut r);
        let ticket = ctl.movement_ticket;

        let mut world = World::create_empty(4, 4, Arc::new(TerrainCatalog::defaults()));
        world
            .found_settlement(
                HexCoord::new(3, 3),
                Settlement::new("Goldvale", SettlementType::Town),
            )
            .unwrap();
        ctl.replace_world(world, &mut r);

        assert!(ctl.names().is_used("Goldvale"));
        assert_eq!(ctl.names().used_count(), 1);
        assert_eq!(ctl.selected(), None);
        assert_eq!(r.panels.last().unwrap(), &PanelContent::Empty);
        assert!(r.cells.iter().filter(|c| !c.selected).count() >= 16);

        // The lookup for the old world arrives late
        let panels = r.panels.len();
        ctl.apply_response(
            BackendResponse::Movement {
                ticket,
                coord: HexCoord::new(1, 1),
                result: Ok(movement_ok()),
            },
            &mut r,
        );
        assert_eq!(r.panels.len(), panels);
    }

    #[test]
    fn test_resize_drops_selection_outside() {
        let mut ctl = controller(4, 4);
        let mut r = Recorder::default();
        ctl.click(HexCoord::new(3, 3), &mut r);
        let requests = ctl.resize(2, 2, &mut r);
        assert_eq!(requests.len(), 1);
        assert_eq!(ctl.selected(), None);
        assert_eq!(ctl.world().cell_count(), 4);
        assert_eq!(r.canvas.last().unwrap(), &ctl.geometry().container_size(2, 2));
    }

    #[test]
    fn test_click_at_pixel() {
        let mut ctl = controller(3, 3);
        let mut r = Recorder::default();
        let center = ctl.geometry().position(HexCoord::new(2, 1));
        let requests = ctl.click_at(center.x, center.y, &mut r);
        assert_eq!(requests.len(), 1);
        assert_eq!(ctl.selected(), Some(HexCoord::new(2, 1)));
        assert!(ctl.click_at(-100.0, -100.0, &mut r).is_empty());
    }
}
