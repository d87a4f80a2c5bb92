use crate::app::{App, PANEL_COLS};
use parcel_map::braille::{BrailleCanvas, BLANK};
use parcel_map::entity::GeoEntity;
use parcel_map::map::{MapLayers, MarkerPlacement};
use parcel_map::style::Rgb;
use parcel_map::surface::MapType;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
    Frame,
};
use serde_json::Value;

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Split into map area and status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_map(frame, app, chunks[0]);
    render_status_bar(frame, app, chunks[1]);
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " Parcels ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let layers = app
        .controller
        .surface()
        .layers(inner.width as usize, inner.height as usize);

    // Braille pixels back to character cells
    let cursor_pos = app.mouse_pixel_pos().and_then(|(px, py)| {
        let cx = (px / 2) as u16;
        let cy = (py / 4) as u16;
        (cx < inner.width && cy < inner.height).then_some((cx, cy))
    });

    let map_widget = MapWidget {
        layers,
        cursor_pos,
        map_type: app.controller.map_type(),
    };
    frame.render_widget(map_widget, inner);

    if app.panel_open() {
        if let Some(entity) = app.selected() {
            render_panel(frame, entity, inner);
        }
    }
}

/// Renders basemap, parcel outlines and marker sprites
struct MapWidget {
    layers: MapLayers,
    cursor_pos: Option<(u16, u16)>,
    map_type: MapType,
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

impl MapWidget {
    /// Render a braille canvas layer with a specific color
    fn render_layer(&self, canvas: &BrailleCanvas, color: Color, area: Rect, buf: &mut Buffer) {
        for (row_idx, row_str) in canvas.rows().enumerate() {
            if row_idx >= area.height as usize {
                break;
            }
            let y = area.y + row_idx as u16;

            for (col_idx, ch) in row_str.chars().enumerate() {
                if col_idx >= area.width as usize {
                    break;
                }
                if ch == BLANK {
                    continue;
                }
                let x = area.x + col_idx as u16;
                buf[(x, y)].set_char(ch).set_fg(color);
            }
        }
    }

    /// Blit a sprite; outline dots win over fill dots in the same cell
    fn render_marker(&self, marker: &MarkerPlacement, area: Rect, buf: &mut Buffer) {
        let image = &marker.image;
        let rows = image.fill_rows.iter().zip(&image.stroke_rows).enumerate();
        for (r, (fill, stroke)) in rows {
            let y = marker.row + r as i32;
            if y < 0 || y >= i32::from(area.height) {
                continue;
            }
            for (c, (f, s)) in fill.chars().zip(stroke.chars()).enumerate() {
                let x = marker.col + c as i32;
                if x < 0 || x >= i32::from(area.width) {
                    continue;
                }
                let (ch, color) = if s != BLANK {
                    (s, image.stroke)
                } else if f != BLANK {
                    (f, image.fill)
                } else {
                    continue;
                };
                buf[(area.x + x as u16, area.y + y as u16)]
                    .set_char(ch)
                    .set_fg(to_color(color));
            }
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Back to front: basemap, outlines by z, markers by z
        let base_color = match self.map_type {
            MapType::Roadmap => Color::Cyan,
            MapType::Satellite => Color::Green,
        };
        self.render_layer(&self.layers.base, base_color, area, buf);

        for layer in &self.layers.shapes {
            self.render_layer(&layer.canvas, to_color(layer.color), area, buf);
        }

        for marker in &self.layers.markers {
            self.render_marker(marker, area, buf);
        }

        if let Some((cx, cy)) = self.cursor_pos {
            let x = area.x + cx;
            let y = area.y + cy;
            if x < area.x + area.width && y < area.y + area.height {
                buf[(x, y)].set_char('╋').set_fg(Color::Red);
            }
        }
    }
}

fn attribute_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

/// Attributes panel docked to the right edge of the map
fn render_panel(frame: &mut Frame, entity: &GeoEntity, map: Rect) {
    let width = PANEL_COLS.min(map.width);
    let area = Rect {
        x: map.x + map.width - width,
        y: map.y,
        width,
        height: map.height,
    };

    let key = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(Span::styled(
            entity.label().to_string(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("id: ", key),
            Span::raw(entity.id.to_string()),
        ]),
        Line::from(vec![
            Span::styled("segment: ", key),
            Span::raw(entity.segment.clone()),
        ]),
        Line::from(vec![
            Span::styled("at: ", key),
            Span::raw(format!("{:.5}, {:.5}", entity.centroid.lat, entity.centroid.lon)),
        ]),
        Line::default(),
    ];
    lines.extend(entity.attributes.iter().map(|(name, value)| {
        Line::from(vec![
            Span::styled(format!("{name}: "), key),
            Span::raw(attribute_text(value)),
        ])
    }));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(" Parcel ", Style::default().fg(Color::Cyan)));
    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let dim = Style::default().fg(Color::DarkGray);

    let mut spans = vec![
        Span::styled(" Zoom: ", dim),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::styled(" (", dim),
        Span::styled(app.lod_level(), Style::default().fg(Color::Magenta)),
        Span::styled(") ", dim),
        Span::styled(
            format!("[m]{} ", app.controller.map_type().as_str()),
            Style::default().fg(Color::Green),
        ),
        Span::styled(
            format!("[f]{} ", app.filter_label()),
            Style::default().fg(Color::Green),
        ),
        Span::styled(
            format!("{}/{} visible ", app.visible_count(), app.entity_count()),
            Style::default().fg(Color::White),
        ),
    ];

    if let Some(entity) = app.hovered() {
        spans.push(Span::styled("| ", dim));
        spans.push(Span::styled(
            format!("{} ", entity.label()),
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(status) = app.status() {
        spans.push(Span::styled("| ", dim));
        spans.push(Span::styled(format!("{status} "), Style::default().fg(Color::Magenta)));
    }

    spans.push(Span::styled("| ", dim));
    spans.push(Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)));
    spans.push(Span::styled(
        " | hjkl:pan +/-:zoom n/p:select r:reset q:quit",
        dim,
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
