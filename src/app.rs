use parcel_map::config::EngineConfig;
use parcel_map::engine::{ControllerEvent, ViewportController};
use parcel_map::entity::{EntityId, GeoEntity};
use parcel_map::map::{BaseMap, Lod};
use parcel_map::style::{StyleConfig, StyleWatcher};
use parcel_map::surface::{RenderSurface, TerminalSurface};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::debug;

/// Width of the attributes panel in terminal cells
pub const PANEL_COLS: u16 = 34;

/// Map pixel size for a terminal size.
/// Braille gives 2x4 dots per cell; 2 columns of border, 2 rows of border
/// plus 1 row of status bar.
fn map_pixels(width: usize, height: usize) -> (usize, usize) {
    let inner_width = width.saturating_sub(2);
    let inner_height = height.saturating_sub(3);
    (inner_width * 2, inner_height * 4)
}

/// Application state
pub struct App {
    pub controller: ViewportController<TerminalSurface>,
    /// Every loaded parcel, before the segment filter
    parcels: Vec<GeoEntity>,
    segments: Vec<String>,
    /// Index into `segments`; `None` shows everything
    filter: Option<usize>,
    styles: Option<StyleWatcher>,
    visible: Vec<EntityId>,
    panel_open: bool,
    hovered: Option<EntityId>,
    status: Option<String>,
    pub should_quit: bool,
    pub last_mouse: Option<(u16, u16)>,
    dragged: bool,
    pub mouse_pos: Option<(u16, u16)>,
}

impl App {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        width: usize,
        height: usize,
        config: EngineConfig,
        styles: StyleConfig,
        watcher: Option<StyleWatcher>,
        basemap: BaseMap,
        parcels: Vec<GeoEntity>,
        now: Instant,
    ) -> Self {
        let (pixel_width, pixel_height) = map_pixels(width, height);
        let surface = TerminalSurface::new(pixel_width, pixel_height, basemap);
        let mut controller = ViewportController::new(surface, config, Box::new(styles));
        controller.set_panel_padding(f64::from(PANEL_COLS) * 2.0);

        let segments: Vec<String> = parcels
            .iter()
            .map(|p| p.segment.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        // Queued until the surface reports ready on the first tick
        controller.set_entities(parcels.clone(), now);
        controller.surface_mut().mark_ready();

        Self {
            controller,
            parcels,
            segments,
            filter: None,
            styles: watcher,
            visible: Vec::new(),
            panel_open: false,
            hovered: None,
            status: None,
            should_quit: false,
            last_mouse: None,
            dragged: false,
            mouse_pos: None,
        }
    }

    /// Advance animations, then let the controller react to what happened
    pub fn tick(&mut self, now: Instant) {
        self.controller.surface_mut().advance(now);

        if let Some(styles) = self.styles.as_mut().and_then(StyleWatcher::poll) {
            self.controller.set_style_resolver(Box::new(styles), now);
            self.status = Some("styles reloaded".to_string());
        }

        self.controller.tick(now);

        for event in self.controller.drain_events() {
            match event {
                ControllerEvent::EntityClicked(entity) => {
                    self.status = Some(format!("selected {}", entity.label()));
                }
                ControllerEvent::EntityHovered(id) => self.hovered = id,
                ControllerEvent::PanelVisibilityChanged(open) => self.panel_open = open,
                ControllerEvent::VisibleEntities(ids) => self.visible = ids,
            }
        }
    }

    /// Forward a terminal resize; the controller debounces it
    pub fn resize(&mut self, width: usize, height: usize) {
        let (pixel_width, pixel_height) = map_pixels(width, height);
        self.controller
            .surface_mut()
            .notify_container_resize(pixel_width as u32, pixel_height as u32);
    }

    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.controller.surface_mut().pan_by(dx, dy);
    }

    pub fn zoom_in(&mut self) {
        self.controller.surface_mut().zoom_by(1.0);
    }

    pub fn zoom_out(&mut self) {
        self.controller.surface_mut().zoom_by(-1.0);
    }

    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        let (px, py) = cell_to_pixel(col, row);
        self.controller.surface_mut().zoom_at(px, py, 1.0);
    }

    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        let (px, py) = cell_to_pixel(col, row);
        self.controller.surface_mut().zoom_at(px, py, -1.0);
    }

    pub fn toggle_map_type(&mut self) {
        let next = self.controller.map_type().toggled();
        self.controller.set_map_type(next);
    }

    /// Esc clears a selection before it quits
    pub fn back(&mut self, now: Instant) {
        if self.controller.selected().is_some() {
            if !self.controller.set_selected(None, now) {
                self.status = Some("busy, try again".to_string());
            }
        } else {
            self.quit();
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn reset_view(&mut self, now: Instant) {
        if !self.controller.reset_view(now) {
            debug!("no baseline view to return to");
        }
    }

    /// Cycle the segment filter: all, then each segment, then all again
    pub fn cycle_filter(&mut self, now: Instant) {
        self.filter = match self.filter {
            None if !self.segments.is_empty() => Some(0),
            Some(i) if i + 1 < self.segments.len() => Some(i + 1),
            _ => None,
        };
        let entities: Vec<GeoEntity> = match self.filter_segment() {
            Some(segment) => self
                .parcels
                .iter()
                .filter(|p| p.segment == segment)
                .cloned()
                .collect(),
            None => self.parcels.clone(),
        };
        self.status = Some(format!("filter: {}", self.filter_label()));
        self.controller.set_entities(entities, now);
    }

    pub fn select_next(&mut self, now: Instant) {
        self.select_step(1, now);
    }

    pub fn select_prev(&mut self, now: Instant) {
        self.select_step(-1, now);
    }

    /// Step through renderable parcels in id order
    fn select_step(&mut self, step: isize, now: Instant) {
        let mut candidates: Vec<EntityId> = self
            .controller
            .entities()
            .iter()
            .filter(|e| e.is_renderable())
            .map(|e| e.id.clone())
            .collect();
        candidates.sort_unstable();
        if candidates.is_empty() {
            return;
        }

        let len = candidates.len() as isize;
        let current = self
            .controller
            .selected()
            .and_then(|s| candidates.iter().position(|id| *id == s.id));
        let index = match current {
            Some(i) => (i as isize + step).rem_euclid(len),
            None if step > 0 => 0,
            None => len - 1,
        };
        let id = candidates[index as usize].clone();
        if self.controller.set_selected(Some(id.clone()), now) {
            self.status = Some(format!("selected {id}"));
        } else {
            self.status = Some("busy, try again".to_string());
        }
    }

    /// Press: remember where a possible drag starts
    pub fn begin_drag(&mut self, col: u16, row: u16) {
        self.last_mouse = Some((col, row));
        self.dragged = false;
    }

    /// Drag pans by the pointer delta in Braille dots
    pub fn handle_drag(&mut self, col: u16, row: u16) {
        if let Some((last_col, last_row)) = self.last_mouse {
            let dx = (i32::from(last_col) - i32::from(col)) * 2;
            let dy = (i32::from(last_row) - i32::from(row)) * 4;
            if dx != 0 || dy != 0 {
                self.dragged = true;
                self.pan(dx, dy);
            }
        }
        self.last_mouse = Some((col, row));
    }

    /// Release: a press without movement is a click
    pub fn end_drag(&mut self, col: u16, row: u16) {
        if self.last_mouse.is_some() && !self.dragged {
            let (px, py) = cell_to_pixel(col, row);
            self.controller.surface_mut().pointer_clicked(px, py);
        }
        self.last_mouse = None;
        self.dragged = false;
    }

    /// Track the pointer for hover and the cursor marker
    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
        let (px, py) = cell_to_pixel(col, row);
        let viewport = self.controller.surface().viewport();
        let inside = px < viewport.width as i32 && py < viewport.height as i32;
        if col == 0 || row == 0 || !inside {
            self.controller.surface_mut().pointer_left();
        } else {
            self.controller.surface_mut().pointer_moved(px, py);
        }
    }

    /// Mouse position in Braille pixel coordinates
    pub fn mouse_pixel_pos(&self) -> Option<(i32, i32)> {
        self.mouse_pos.map(|(col, row)| cell_to_pixel(col, row))
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open
    }

    pub fn selected(&self) -> Option<&GeoEntity> {
        self.controller.selected()
    }

    pub fn hovered(&self) -> Option<&GeoEntity> {
        self.hovered.as_ref().and_then(|id| self.controller.entity(id))
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    pub fn entity_count(&self) -> usize {
        self.controller.entities().len()
    }

    pub fn filter_segment(&self) -> Option<&str> {
        self.filter.and_then(|i| self.segments.get(i)).map(String::as_str)
    }

    pub fn filter_label(&self) -> &str {
        self.filter_segment().unwrap_or("all")
    }

    pub fn zoom_level(&self) -> String {
        format!("{:.1}", self.controller.surface().zoom())
    }

    pub fn center_coords(&self) -> String {
        let viewport = self.controller.surface().viewport();
        format!(
            "{:.4}°{} {:.4}°{}",
            viewport.center_lat.abs(),
            if viewport.center_lat >= 0.0 { "N" } else { "S" },
            viewport.center_lon.abs(),
            if viewport.center_lon >= 0.0 { "E" } else { "W" }
        )
    }

    pub fn lod_level(&self) -> &'static str {
        Lod::from_zoom(self.controller.surface().zoom()).label()
    }
}

/// Terminal cell to Braille pixel, accounting for the 1-cell border
fn cell_to_pixel(col: u16, row: u16) -> (i32, i32) {
    let px = i32::from(col.saturating_sub(1)) * 2;
    let py = i32::from(row.saturating_sub(1)) * 4;
    (px, py)
}
