//! Terminal hex map editor using ratatui
//!
//! Draws the map the controller paints, forwards keys and mouse clicks to it
//! and dispatches whatever backend work it hands back. Backend results are
//! drained from the dispatcher channel between frames, so the UI never blocks
//! on the network.

use std::collections::BTreeMap;
use std::io::stdout;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use anyhow::Context;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, Paragraph},
};
use tracing::{info, warn};

use crate::backend::GenerateWorldRequest;
use crate::controller::{EditMode, MapController};
use crate::dispatch::{DispatchEvent, Dispatcher};
use crate::geometry::{HexGeometry, HexLayout, PixelPos, PixelSize};
use crate::panel::{CellView, PanelContent, Renderer, StatusLevel, StatusMessage};
use crate::terrain::TerrainKind;
use crate::world::{HexCoord, SettlementType, World};
use crate::world_file::{default_filename, write_world};

const PANEL_WIDTH: u16 = 46;

/// Darkened terrain color for the cell background.
fn make_bg_color((r, g, b): (u8, u8, u8)) -> Color {
    let darken = |c: u8| (c as f32 * 0.35) as u8;
    Color::Rgb(darken(r), darken(g), darken(b))
}

/// Slightly brightened terrain color for the glyph.
fn make_fg_color((r, g, b): (u8, u8, u8)) -> Color {
    let brighten = |c: u8| (c as u16 + 40).min(255) as u8;
    Color::Rgb(brighten(r), brighten(g), brighten(b))
}

/// How many pixels of the hex canvas one terminal character covers.
///
/// Chosen so neighbouring hex centers never land on the same character and
/// every center maps back to its own hex within `cell_at` tolerance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TermScale {
    pub col_px: f64,
    pub row_px: f64,
}

impl TermScale {
    pub fn for_geometry(geometry: &HexGeometry) -> Self {
        let (col_px, row_px) = match geometry.layout {
            HexLayout::ColumnOffset => (geometry.h_spacing * 0.75 / 3.0, geometry.v_spacing / 2.0),
            HexLayout::RowOffset => (geometry.h_spacing / 4.0, geometry.v_spacing * 0.75),
        };
        Self {
            col_px: col_px.max(1.0),
            row_px: row_px.max(1.0),
        }
    }

    /// Terminal column and row of a pixel position.
    pub fn to_cell(&self, pos: PixelPos) -> (u16, u16) {
        let col = (pos.x / self.col_px).floor().max(0.0);
        let row = (pos.y / self.row_px).floor().max(0.0);
        (col.min(u16::MAX as f64) as u16, row.min(u16::MAX as f64) as u16)
    }

    /// Pixel position at the middle of a terminal character.
    pub fn to_pixel(&self, col: u16, row: u16) -> (f64, f64) {
        ((col as f64 + 0.5) * self.col_px, (row as f64 + 0.5) * self.row_px)
    }
}

/// Renderer that keeps the last painted state for the next frame.
#[derive(Debug, Default)]
pub struct TerminalView {
    canvas: Option<PixelSize>,
    cells: BTreeMap<HexCoord, CellView>,
    panel: Vec<String>,
    status: Option<StatusMessage>,
}

impl Renderer for TerminalView {
    fn set_canvas_size(&mut self, size: PixelSize) {
        // A new canvas means a full repaint follows
        self.canvas = Some(size);
        self.cells.clear();
    }

    fn paint_cell(&mut self, cell: &CellView) {
        self.cells.insert(cell.coord, cell.clone());
    }

    fn paint_panel(&mut self, content: &PanelContent) {
        self.panel = content.lines();
    }

    fn show_status(&mut self, status: &StatusMessage) {
        self.status = Some(status.clone());
    }
}

impl TerminalView {
    pub fn canvas(&self) -> Option<PixelSize> {
        self.canvas
    }

    pub fn cell(&self, coord: HexCoord) -> Option<&CellView> {
        self.cells.get(&coord)
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    /// Draw the painted hexes, two characters each: terrain glyph and
    /// settlement icon (or the glyph again).
    pub fn render_map(
        &self,
        area: Rect,
        buf: &mut Buffer,
        scale: TermScale,
        scroll: (u16, u16),
        cursor: Option<HexCoord>,
    ) {
        for view in self.cells.values() {
            let (col, row) = scale.to_cell(view.position);
            if col < scroll.0 || row < scroll.1 {
                continue;
            }
            let x = area.x as u32 + (col - scroll.0) as u32;
            let y = area.y as u32 + (row - scroll.1) as u32;
            if y >= area.bottom() as u32 {
                continue;
            }

            let style = if cursor == Some(view.coord) {
                Style::default().fg(Color::Black).bg(Color::Yellow)
            } else if view.selected {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::White)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
                    .fg(make_fg_color(view.color))
                    .bg(make_bg_color(view.color))
            };

            let second = view.icon().unwrap_or(view.glyph);
            for (dx, ch) in [(0, view.glyph), (1, second)] {
                let cx = x + dx;
                if cx >= area.right() as u32 {
                    continue;
                }
                if let Some(cell) = buf.cell_mut((cx as u16, y as u16)) {
                    cell.set_char(ch).set_style(style);
                }
            }
        }
    }

    fn render_panel(
        &self,
        area: Rect,
        buf: &mut Buffer,
        palette: &[TerrainKind],
        brush: usize,
        mode: &EditMode,
    ) {
        let block = Block::default()
            .title(" Hex ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .style(Style::default().bg(Color::Black));
        let inner = block.inner(area);
        block.render(area, buf);

        let mut lines: Vec<(String, Style)> = Vec::new();
        for (i, line) in self.panel.iter().enumerate() {
            let style = if i == 0 {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if line.starts_with("Movement") {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default().fg(Color::White)
            };
            lines.push((line.clone(), style));
        }

        lines.push((String::new(), Style::default()));
        lines.push((
            " Brush".to_string(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
        for (i, terrain) in palette.iter().enumerate() {
            let active = i == brush;
            let marker = match (active, mode) {
                (true, EditMode::Editing(_)) => '>',
                (true, EditMode::Browsing) => '-',
                _ => ' ',
            };
            let style = if active {
                Style::default().fg(Color::Black).bg(Color::Gray)
            } else {
                Style::default().fg(Color::Gray)
            };
            lines.push((format!("{} {} {}", marker, i + 1, terrain), style));
        }

        for (i, (text, style)) in lines.iter().enumerate() {
            if i as u16 >= inner.height {
                break;
            }
            let width = inner.width as usize;
            let clipped: String = text.chars().take(width).collect();
            buf.set_string(inner.x, inner.y + i as u16, clipped, *style);
        }
    }
}

/// Startup options for the editor.
#[derive(Clone, Debug, Default)]
pub struct EditorOptions {
    /// Local file written with `w`
    pub world_path: Option<PathBuf>,
    /// Template for `g`; defaults to the current world's size
    pub generate: Option<GenerateWorldRequest>,
}

/// Editor state
struct Explorer {
    controller: MapController,
    view: TerminalView,
    dispatcher: Dispatcher,
    cursor: HexCoord,
    scroll: (u16, u16),
    palette: Vec<TerrainKind>,
    brush: usize,
    show_help: bool,
    quit_armed: bool,
    /// Map area of the last frame, for mouse hit testing
    map_area: Rect,
    options: EditorOptions,
}

impl Explorer {
    fn new(controller: MapController, dispatcher: Dispatcher, options: EditorOptions) -> Self {
        let mut palette: Vec<TerrainKind> = TerrainKind::all().to_vec();
        let catalog = controller.world().catalog();
        palette.extend(catalog.kinds().filter(|k| !k.is_known()).cloned());
        palette.retain(|kind| catalog.info(kind).is_some());

        let mut view = TerminalView::default();
        controller.render_all(&mut view);
        view.show_status(&StatusMessage::info("Press ? for help"));

        Self {
            controller,
            view,
            dispatcher,
            cursor: HexCoord::new(0, 0),
            scroll: (0, 0),
            palette,
            brush: 0,
            show_help: false,
            quit_armed: false,
            map_area: Rect::default(),
            options,
        }
    }

    fn scale(&self) -> TermScale {
        TermScale::for_geometry(self.controller.geometry())
    }

    fn brush_terrain(&self) -> Option<&TerrainKind> {
        self.palette.get(self.brush)
    }

    fn move_cursor(&mut self, dx: i64, dy: i64) {
        let world = self.controller.world();
        if world.width() == 0 || world.height() == 0 {
            return;
        }
        let x = (self.cursor.x as i64 + dx).clamp(0, world.width() as i64 - 1);
        let y = (self.cursor.y as i64 + dy).clamp(0, world.height() as i64 - 1);
        self.cursor = HexCoord::new(x as u32, y as u32);
    }

    /// Scroll so the cursor hex (both characters) is inside the map area.
    fn ensure_cursor_visible(&mut self) {
        if self.map_area.width < 2 || self.map_area.height == 0 {
            return;
        }
        let pos = self.controller.geometry().position(self.cursor);
        let (col, row) = self.scale().to_cell(pos);
        let (width, height) = (self.map_area.width, self.map_area.height);

        if col < self.scroll.0 {
            self.scroll.0 = col;
        } else if col + 2 > self.scroll.0 + width {
            self.scroll.0 = col + 2 - width;
        }
        if row < self.scroll.1 {
            self.scroll.1 = row;
        } else if row + 1 > self.scroll.1 + height {
            self.scroll.1 = row + 1 - height;
        }
    }

    fn activate(&mut self) {
        let requests = self.controller.click(self.cursor, &mut self.view);
        self.dispatcher.dispatch_all(requests);
    }

    fn handle_mouse(&mut self, column: u16, row: u16) {
        let area = self.map_area;
        if column < area.x || row < area.y || column >= area.right() || row >= area.bottom() {
            return;
        }
        let scale = self.scale();
        let (px, py) =
            scale.to_pixel(column - area.x + self.scroll.0, row - area.y + self.scroll.1);
        let world = self.controller.world();
        let hit = self
            .controller
            .geometry()
            .cell_at(px, py, world.width(), world.height());
        if let Some(coord) = hit {
            self.cursor = coord;
        }
        let requests = self.controller.click_at(px, py, &mut self.view);
        self.dispatcher.dispatch_all(requests);
    }

    fn toggle_edit(&mut self) {
        match self.controller.mode() {
            EditMode::Editing(_) => {
                self.controller.exit_edit_mode();
                self.view.show_status(&StatusMessage::info("Browsing"));
            }
            EditMode::Browsing => self.start_editing(),
        }
    }

    fn start_editing(&mut self) {
        if let Some(terrain) = self.brush_terrain().cloned() {
            self.view
                .show_status(&StatusMessage::info(format!("Editing: click to paint {}", terrain)));
            self.controller.enable_edit_mode(terrain);
        }
    }

    fn select_brush(&mut self, index: usize) {
        if index >= self.palette.len() {
            return;
        }
        self.brush = index;
        if matches!(self.controller.mode(), EditMode::Editing(_)) {
            self.start_editing();
        }
    }

    fn found(&mut self, kind: SettlementType) {
        let requests = self.controller.found_settlement(self.cursor, kind, &mut self.view);
        self.dispatcher.dispatch_all(requests);
    }

    fn resize_by(&mut self, delta: i64) {
        let world = self.controller.world();
        let width = (world.width() as i64 + delta).max(1) as u32;
        let height = (world.height() as i64 + delta).max(1) as u32;
        let requests = self.controller.resize(width, height, &mut self.view);
        self.dispatcher.dispatch_all(requests);
        self.move_cursor(0, 0);
        self.view
            .show_status(&StatusMessage::info(format!("Resized to {}x{}", width, height)));
    }

    fn toggle_layout(&mut self) {
        let layout = match self.controller.geometry().layout {
            HexLayout::ColumnOffset => HexLayout::RowOffset,
            HexLayout::RowOffset => HexLayout::ColumnOffset,
        };
        self.controller.set_layout(layout, &mut self.view);
        self.scroll = (0, 0);
        self.view
            .show_status(&StatusMessage::info(format!("Layout: {}", layout.name())));
    }

    fn save_remote(&mut self) {
        let world = self.controller.world();
        let filename = default_filename(world.name());
        info!(%filename, "saving world to backend");
        self.dispatcher
            .save_world(world.edit_seq(), world.to_file(), Some(filename.clone()));
        self.view
            .show_status(&StatusMessage::info(format!("Saving {}...", filename)));
    }

    fn write_local(&mut self) {
        let status = match &self.options.world_path {
            Some(path) => match write_world(path, self.controller.world()) {
                Ok(()) => StatusMessage::info(format!("Wrote {}", path.display())),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "world not written");
                    StatusMessage::error(format!("Write failed: {}", err))
                }
            },
            None => StatusMessage::warning("No world file; start with --world to write locally"),
        };
        self.view.show_status(&status);
    }

    fn regenerate(&mut self) {
        let world = self.controller.world();
        let request = self
            .options
            .generate
            .clone()
            .unwrap_or_else(|| {
                GenerateWorldRequest::new(world.width(), world.height(), world.name())
            });
        info!(width = request.width, height = request.height, "requesting new world");
        self.view.show_status(&StatusMessage::info(format!(
            "Generating {}x{} world...",
            request.width, request.height
        )));
        self.dispatcher.generate_world(request);
    }

    fn handle_dispatch(&mut self, event: DispatchEvent) {
        match event {
            DispatchEvent::Backend(response) => {
                self.controller.apply_response(response, &mut self.view)
            }
            DispatchEvent::WorldReceived { source, result } => {
                let catalog = self.controller.world().catalog().clone();
                let loaded = result
                    .map_err(|e| e.to_string())
                    .and_then(|payload| World::load(payload, catalog).map_err(|e| e.to_string()));
                match loaded {
                    Ok(world) => {
                        let status = StatusMessage::info(format!(
                            "Loaded {} ({}, {}x{})",
                            world.name(),
                            source,
                            world.width(),
                            world.height()
                        ));
                        self.controller.replace_world(world, &mut self.view);
                        self.cursor = HexCoord::new(0, 0);
                        self.scroll = (0, 0);
                        self.view.show_status(&status);
                    }
                    Err(err) => {
                        // Current world stays on screen
                        warn!(%source, error = %err, "world not replaced");
                        self.view.show_status(&StatusMessage::error(format!(
                            "Could not load world: {}",
                            err
                        )));
                    }
                }
            }
            DispatchEvent::WorldSaved {
                edit_seq,
                result: Ok(saved),
            } => {
                self.controller.mark_saved(edit_seq);
                let text = saved.message.unwrap_or_else(|| format!("Saved as {}", saved.filename));
                self.view.show_status(&StatusMessage::info(text));
            }
            DispatchEvent::WorldSaved { result: Err(err), .. } => {
                warn!(error = %err, "save failed");
                self.view
                    .show_status(&StatusMessage::error(format!("Save failed: {}", err)));
            }
        }
    }

    /// Returns true when the editor should exit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        if self.show_help {
            self.show_help = false;
            return false;
        }

        let quitting = matches!(code, KeyCode::Char('q') | KeyCode::Char('Q'));
        if quitting {
            if self.controller.world().is_dirty() && !self.quit_armed {
                self.quit_armed = true;
                self.view.show_status(&StatusMessage::warning(
                    "Edits not yet synced with the backend; press q again to quit",
                ));
                return false;
            }
            return true;
        }
        self.quit_armed = false;

        match code {
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(0, -1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(0, 1),
            KeyCode::Left | KeyCode::Char('h') => self.move_cursor(-1, 0),
            KeyCode::Right | KeyCode::Char('l') => self.move_cursor(1, 0),
            KeyCode::PageUp => self.move_cursor(0, -10),
            KeyCode::PageDown => self.move_cursor(0, 10),
            KeyCode::Home => self.move_cursor(-10, 0),
            KeyCode::End => self.move_cursor(10, 0),
            KeyCode::Enter | KeyCode::Char(' ') => self.activate(),
            KeyCode::Char('e') => self.toggle_edit(),
            KeyCode::Esc => {
                self.controller.exit_edit_mode();
                self.view.show_status(&StatusMessage::info("Browsing"));
            }
            KeyCode::Tab => self.select_brush((self.brush + 1) % self.palette.len().max(1)),
            KeyCode::Char(c @ '1'..='9') => self.select_brush(c as usize - '1' as usize),
            KeyCode::Char('v') => self.found(SettlementType::Village),
            KeyCode::Char('t') => self.found(SettlementType::Town),
            KeyCode::Char('c') => self.found(SettlementType::City),
            KeyCode::Char('+') | KeyCode::Char('>') => self.resize_by(1),
            KeyCode::Char('-') | KeyCode::Char('<') => self.resize_by(-1),
            KeyCode::Char('L') => self.toggle_layout(),
            KeyCode::Char('s') => self.save_remote(),
            KeyCode::Char('w') => self.write_local(),
            KeyCode::Char('g') => self.regenerate(),
            KeyCode::Char('?') => self.show_help = true,
            _ => {}
        }
        false
    }

    fn render_help(&self, area: Rect, buf: &mut Buffer) {
        let help_text = vec![
            "=== Overlord Map Editor ===",
            "",
            "Navigation:",
            "  Arrow keys / HJKL - Move cursor",
            "  PgUp/PgDn, Home/End - Move by 10",
            "  Enter / Space / click - Select or paint",
            "",
            "Editing:",
            "  E - Toggle edit mode",
            "  1-9 / Tab - Choose brush terrain",
            "  Esc - Back to browsing",
            "  V / T / C - Found village / town / city",
            "  + / - - Grow or shrink the map",
            "",
            "World:",
            "  G - Generate a new world",
            "  S - Save to the game server",
            "  W - Write the local world file",
            "  Shift+L - Toggle hex layout",
            "  ? - Toggle this help",
            "  Q - Quit",
            "",
            "Press any key to close",
        ];

        let width = 46;
        let height = help_text.len() as u16 + 2;
        let x = area.x + (area.width.saturating_sub(width)) / 2;
        let y = area.y + (area.height.saturating_sub(height)) / 2;
        let help_area = Rect::new(x, y, width.min(area.width), height.min(area.height));

        Clear.render(help_area, buf);
        let block = Block::default()
            .title(" Help ")
            .borders(Borders::ALL)
            .style(Style::default().bg(Color::DarkGray));
        let inner = block.inner(help_area);
        block.render(help_area, buf);

        for (i, line) in help_text.iter().enumerate() {
            if i as u16 >= inner.height {
                break;
            }
            buf.set_string(inner.x, inner.y + i as u16, line, Style::default().fg(Color::White));
        }
    }

    fn status_line(&self) -> (String, Style) {
        let world = self.controller.world();
        let mode = match self.controller.mode() {
            EditMode::Browsing => "Browse".to_string(),
            EditMode::Editing(terrain) => format!("Paint {}", terrain),
        };
        let sync = if world.is_dirty() { " | unsynced" } else { "" };
        let (message, style) = match self.view.status() {
            Some(status) => {
                let fg = match status.level {
                    StatusLevel::Info => Color::White,
                    StatusLevel::Warning => Color::Yellow,
                    StatusLevel::Error => Color::LightRed,
                };
                (format!(" | {}", status.text), Style::default().bg(Color::DarkGray).fg(fg))
            }
            None => (String::new(), Style::default().bg(Color::DarkGray).fg(Color::White)),
        };
        (
            format!(
                " {} {}x{} | {} | ({}){}{}",
                world.name(),
                world.width(),
                world.height(),
                mode,
                self.cursor,
                sync,
                message
            ),
            style,
        )
    }

    fn draw(&mut self, f: &mut Frame) {
        let size = f.area();

        // Main layout: content area + status bar
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(size);
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(1), Constraint::Length(PANEL_WIDTH)])
            .split(main_chunks[0]);

        self.map_area = content_chunks[0];
        self.ensure_cursor_visible();

        let scale = self.scale();
        self.view
            .render_map(self.map_area, f.buffer_mut(), scale, self.scroll, Some(self.cursor));
        self.view.render_panel(
            content_chunks[1],
            f.buffer_mut(),
            &self.palette,
            self.brush,
            self.controller.mode(),
        );

        let (text, style) = self.status_line();
        f.render_widget(Paragraph::new(text).style(style), main_chunks[1]);

        if self.show_help {
            self.render_help(size, f.buffer_mut());
        }
    }
}

/// Run the interactive editor until the user quits.
pub fn run_editor(
    controller: MapController,
    dispatcher: Dispatcher,
    events: Receiver<DispatchEvent>,
    options: EditorOptions,
) -> anyhow::Result<()> {
    terminal::enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut explorer = Explorer::new(controller, dispatcher, options);
    let result = event_loop(&mut terminal, &mut explorer, &events);

    // Restore the terminal even when the loop failed
    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    info!(
        name = explorer.controller.world().name(),
        unsynced = explorer.controller.world().is_dirty(),
        "editor closed"
    );
    result
}

fn event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    explorer: &mut Explorer,
    events: &Receiver<DispatchEvent>,
) -> anyhow::Result<()> {
    loop {
        while let Ok(event) = events.try_recv() {
            explorer.handle_dispatch(event);
        }

        terminal.draw(|f| explorer.draw(f))?;

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(KeyEvent {
                    code,
                    kind: KeyEventKind::Press,
                    ..
                }) => {
                    if explorer.handle_key(code) {
                        return Ok(());
                    }
                }
                Event::Mouse(MouseEvent {
                    kind: MouseEventKind::Down(MouseButton::Left),
                    column,
                    row,
                    ..
                }) => explorer.handle_mouse(column, row),
                _ => {}
            }
        }
    }
}
