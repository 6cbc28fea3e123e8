use anyhow::Result;
use crossterm::event::{KeyCode, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use std::{
    cell::Cell,
    rc::Rc,
    sync::mpsc::{Receiver, TryRecvError},
    time::Duration,
};

use crate::{
    color::ColorMode,
    data::{RecordId, StatRecord, StatsTable, Year},
    engine::{Engine, EngineConfig, InputEvent},
    filter::Filter,
    geometry::GeoFeature,
    matcher::{self, EnrichedFeature},
    projection::Viewport,
};

/// Percentage points moved by one range key press.
const RANGE_STEP: f64 = 5.0;

pub enum GeometryState {
    Loading(Receiver<Result<Vec<GeoFeature>>>),
    Ready(Vec<EnrichedFeature>),
    Failed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
}

pub struct AppState {
    pub table: StatsTable,
    pub geometry: GeometryState,
    pub engine: Engine,
    pub year: Year,
    pub mode: ColorMode,
    pub filter: Filter,
    pub input: InputMode,
    regions: Vec<String>,
    region_cursor: Option<usize>,
    canvas_area: Rect,
    dirty: Rc<Cell<bool>>,
    drawn_revision: Option<u64>,
}

impl AppState {
    pub const HELP_TEXT: &'static str = "\
drag: rotate   click: select
wheel: zoom
y: year   t: coverage/trend
r: reset   Esc: close
/: search   g: region
[ ]: min   { }: max
q: quit";

    pub fn new(table: StatsTable, geometry: GeometryState, year: Year, config: EngineConfig) -> Self {
        let mut engine = Engine::new(config, Viewport::new(1.0, 1.0));
        let dirty = Rc::new(Cell::new(true));

        let names: Vec<String> =
            (0..table.len()).filter_map(|i| table.get(RecordId(i)).map(|r| r.name.clone())).collect();
        let flag = Rc::clone(&dirty);
        engine.selection_mut().subscribe(move |selected| {
            match selected.and_then(|id| names.get(id.0)) {
                Some(name) => tracing::info!(country = %name, "country selected"),
                None => tracing::info!("selection cleared"),
            }
            flag.set(true);
        });

        let regions = table.regions();
        Self {
            table,
            geometry,
            engine,
            year,
            mode: ColorMode::Coverage,
            filter: Filter::default(),
            input: InputMode::Normal,
            regions,
            region_cursor: None,
            canvas_area: Rect::default(),
            dirty,
            drawn_revision: None,
        }
    }

    pub fn features(&self) -> &[EnrichedFeature] {
        match &self.geometry {
            GeometryState::Ready(features) => features.as_slice(),
            _ => &[],
        }
    }

    pub fn selected_record(&self) -> Option<&StatRecord> {
        self.engine.selection().current().and_then(|id| self.table.get(id))
    }

    /// Name and coverage in the displayed year of the feature under the pointer.
    pub fn hover_label(&self) -> Option<String> {
        let hovered = self.engine.hovered().and_then(|i| self.features().get(i))?;
        let coverage = match hovered.record(&self.table).and_then(|r| r.value(self.year)) {
            Some(v) => format!("{v:.2}%"),
            None => "no data".to_string(),
        };
        Some(format!("{}: {coverage} forest in {}", hovered.feature.name, self.year))
    }

    /// Features passing the side panel filters.
    pub fn admitted_count(&self) -> usize {
        self.features()
            .iter()
            .filter(|f| self.filter.admits(&f.feature.name, f.record(&self.table), self.year))
            .count()
    }

    pub fn needs_redraw(&self) -> bool {
        self.dirty.get() || self.drawn_revision != Some(self.engine.revision())
    }

    pub fn request_redraw(&self) {
        self.dirty.set(true);
    }

    pub fn mark_drawn(&mut self) {
        self.dirty.set(false);
        self.drawn_revision = Some(self.engine.revision());
    }

    /// Picks up the loader's result once it arrives.
    pub fn poll_geometry(&mut self) {
        let GeometryState::Loading(rx) = &self.geometry else { return };
        let next = match rx.try_recv() {
            Ok(Ok(features)) => {
                let mut joined = matcher::join(features, &self.table);
                matcher::recolor(&mut joined, &self.table, self.year, self.mode);
                GeometryState::Ready(joined)
            }
            Ok(Err(e)) => GeometryState::Failed(format!("{e:#}")),
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => GeometryState::Failed("geometry loader stopped".into()),
        };
        self.geometry = next;
        self.dirty.set(true);
    }

    pub fn tick(&mut self, dt: Duration) {
        self.poll_geometry();
        self.engine.tick(dt);
    }

    fn dispatch(&mut self, event: InputEvent) {
        let features: &[EnrichedFeature] = match &self.geometry {
            GeometryState::Ready(features) => features.as_slice(),
            _ => &[],
        };
        self.engine.handle_event(event, features);
    }

    /// Tells the engine how large the globe canvas is. Cells are twice as
    /// tall as wide, so each row spans two viewport units.
    pub fn set_canvas_area(&mut self, area: Rect) {
        if area == self.canvas_area {
            return;
        }
        self.canvas_area = area;
        self.dispatch(InputEvent::Resize { width: f64::from(area.width), height: f64::from(area.height) * 2.0 });
    }

    /// Center of a terminal cell in viewport units.
    fn to_viewport(&self, column: u16, row: u16) -> (f64, f64) {
        let x = f64::from(column) - f64::from(self.canvas_area.x) + 0.5;
        let y = (f64::from(row) - f64::from(self.canvas_area.y) + 0.5) * 2.0;
        (x, y)
    }

    fn in_canvas(&self, column: u16, row: u16) -> bool {
        let a = self.canvas_area;
        column >= a.x && row >= a.y && column < a.x + a.width && row < a.y + a.height
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        let (x, y) = self.to_viewport(mouse.column, mouse.row);
        let inside = self.in_canvas(mouse.column, mouse.row);
        let event = match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) if inside => InputEvent::PointerDown { x, y },
            MouseEventKind::Drag(MouseButton::Left) | MouseEventKind::Moved => InputEvent::PointerMove { x, y },
            MouseEventKind::Up(MouseButton::Left) => InputEvent::PointerUp { x, y },
            MouseEventKind::ScrollUp if inside => InputEvent::Wheel { x, y, delta: -1.0 },
            MouseEventKind::ScrollDown if inside => InputEvent::Wheel { x, y, delta: 1.0 },
            _ => return,
        };
        self.dispatch(event);
    }

    fn recolor(&mut self) {
        if let GeometryState::Ready(features) = &mut self.geometry {
            matcher::recolor(features, &self.table, self.year, self.mode);
        }
        self.dirty.set(true);
    }

    fn cycle_region(&mut self) {
        self.region_cursor = match self.region_cursor {
            None if !self.regions.is_empty() => Some(0),
            Some(i) if i + 1 < self.regions.len() => Some(i + 1),
            _ => None,
        };
        self.filter.region = self.region_cursor.and_then(|i| self.regions.get(i).cloned());
    }

    /// Returns true when the app should quit.
    pub fn handle_key(&mut self, key: KeyCode) -> bool {
        use KeyCode::*;
        self.dirty.set(true);

        if self.input == InputMode::Search {
            match key {
                Char(c) => self.filter.search.push(c),
                Backspace => {
                    self.filter.search.pop();
                }
                Enter => self.input = InputMode::Normal,
                Esc => {
                    self.filter.search.clear();
                    self.input = InputMode::Normal;
                }
                _ => {}
            }
            return false;
        }

        match key {
            Char('q') => return true,
            Char('y') => {
                self.year = self.year.toggled();
                tracing::info!(year = %self.year, "year changed");
                self.recolor();
            }
            Char('t') => {
                self.mode = self.mode.toggled();
                self.recolor();
            }
            Char('r') => self.dispatch(InputEvent::Reset),
            Esc => self.dispatch(InputEvent::CloseSelection),
            Char('/') => self.input = InputMode::Search,
            Char('g') => self.cycle_region(),
            Char('[') => self.filter.nudge(true, -RANGE_STEP),
            Char(']') => self.filter.nudge(true, RANGE_STEP),
            Char('{') => self.filter.nudge(false, -RANGE_STEP),
            Char('}') => self.filter.nudge(false, RANGE_STEP),
            _ => {}
        }
        false
    }
}
