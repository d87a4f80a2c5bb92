use crate::braille::BrailleCanvas;
use crate::geo::LonLat;
use crate::map::geometry::{draw_line, draw_polygon};
use crate::map::projection::Viewport;
use crate::style::{MarkerImage, Rgb};
use std::rc::Rc;

/// A geographic line (sequence of lon/lat coordinates)
pub type LineString = Vec<(f64, f64)>;

/// Level of detail for basemap data
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Lod {
    Low,    // 110m - world view
    Medium, // 50m - continental
    High,   // 10m - regional
}

impl Lod {
    /// Select LOD from a web zoom level
    pub fn from_zoom(zoom: f64) -> Self {
        if zoom < 3.0 {
            Lod::Low
        } else if zoom < 6.0 {
            Lod::Medium
        } else {
            Lod::High
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Lod::Low => "110m",
            Lod::Medium => "50m",
            Lod::High => "10m",
        }
    }
}

/// Outline of one boundary shape as the surface wants it drawn
pub struct ShapeView<'a> {
    pub points: &'a [LonLat],
    pub color: Rgb,
    pub thick: bool,
    pub z: i32,
}

/// One marker sprite at a geographic point
pub struct MarkerView {
    pub point: LonLat,
    pub image: Rc<MarkerImage>,
    pub z: i32,
}

/// All outlines sharing a colour and weight
pub struct ColorLayer {
    pub color: Rgb,
    pub canvas: BrailleCanvas,
    z: i32,
}

/// Sprite placed at a terminal cell (may be partly off screen)
pub struct MarkerPlacement {
    pub col: i32,
    pub row: i32,
    pub image: Rc<MarkerImage>,
}

/// Rendered layers, back to front
pub struct MapLayers {
    pub base: BrailleCanvas,
    pub shapes: Vec<ColorLayer>,
    pub markers: Vec<MarkerPlacement>,
}

/// Multi-resolution basemap lines
#[derive(Default)]
pub struct BaseMap {
    pub coastlines_low: Vec<LineString>,
    pub coastlines_medium: Vec<LineString>,
    pub coastlines_high: Vec<LineString>,
    pub borders_medium: Vec<LineString>,
    pub borders_high: Vec<LineString>,
}

impl BaseMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coastlines for the LOD, falling back to coarser data
    fn coastlines(&self, lod: Lod) -> &[LineString] {
        match lod {
            Lod::High if !self.coastlines_high.is_empty() => self.coastlines_high.as_slice(),
            Lod::High | Lod::Medium if !self.coastlines_medium.is_empty() => {
                self.coastlines_medium.as_slice()
            }
            _ => self.coastlines_low.as_slice(),
        }
    }

    fn borders(&self, lod: Lod) -> &[LineString] {
        match lod {
            Lod::High if !self.borders_high.is_empty() => self.borders_high.as_slice(),
            Lod::Low => &[],
            _ => self.borders_medium.as_slice(),
        }
    }

    pub fn add_coastline(&mut self, line: LineString, lod: Lod) {
        match lod {
            Lod::Low => self.coastlines_low.push(line),
            Lod::Medium => self.coastlines_medium.push(line),
            Lod::High => self.coastlines_high.push(line),
        }
    }

    pub fn add_border(&mut self, line: LineString, lod: Lod) {
        match lod {
            Lod::High => self.borders_high.push(line),
            Lod::Low | Lod::Medium => self.borders_medium.push(line),
        }
    }

    pub fn has_data(&self) -> bool {
        !self.coastlines_low.is_empty()
            || !self.coastlines_medium.is_empty()
            || !self.coastlines_high.is_empty()
    }

    /// Render basemap plus overlays into a `cols x rows` cell area
    pub fn render<'a>(
        &self,
        cols: usize,
        rows: usize,
        viewport: &Viewport,
        shapes: impl Iterator<Item = ShapeView<'a>>,
        markers: impl Iterator<Item = MarkerView>,
    ) -> MapLayers {
        let lod = Lod::from_zoom(viewport.zoom);

        let mut base = BrailleCanvas::new(cols, rows);
        for line in self.coastlines(lod).iter().chain(self.borders(lod)) {
            draw_linestring(&mut base, line, viewport);
        }

        let mut layers: Vec<ColorLayer> = Vec::new();
        for shape in shapes {
            let projected: Vec<(i32, i32)> = shape
                .points
                .iter()
                .map(|p| viewport.project(p.lon, p.lat))
                .collect();
            if !projected
                .iter()
                .zip(projected.iter().cycle().skip(1))
                .any(|(a, b)| viewport.line_might_be_visible(*a, *b))
            {
                continue;
            }

            let idx = match layers.iter().position(|l| l.color == shape.color && l.z == shape.z) {
                Some(idx) => idx,
                None => {
                    layers.push(ColorLayer {
                        color: shape.color,
                        canvas: BrailleCanvas::new(cols, rows),
                        z: shape.z,
                    });
                    layers.len() - 1
                }
            };
            draw_polygon(&mut layers[idx].canvas, &projected, shape.thick);
        }
        layers.sort_by_key(|l| l.z);

        let mut placed: Vec<(i32, MarkerPlacement)> = markers
            .filter_map(|m| {
                let (px, py) = viewport.project(m.point.lon, m.point.lat);
                if !viewport.is_visible(px, py) {
                    return None;
                }
                let col = px.div_euclid(2) - m.image.cols() as i32 / 2;
                let row = py.div_euclid(4) - m.image.rows() as i32 / 2;
                Some((m.z, MarkerPlacement { col, row, image: m.image }))
            })
            .collect();
        placed.sort_by_key(|(z, _)| *z);

        MapLayers {
            base,
            shapes: layers,
            markers: placed.into_iter().map(|(_, m)| m).collect(),
        }
    }
}

/// Draw a linestring with viewport culling
fn draw_linestring(canvas: &mut BrailleCanvas, line: &LineString, viewport: &Viewport) {
    if line.len() < 2 {
        return;
    }

    let mut prev: Option<(i32, i32)> = None;

    for &(lon, lat) in line {
        let (px, py) = viewport.project(lon, lat);

        if let Some((prev_x, prev_y)) = prev {
            // Skip segments that wrap around the antimeridian
            let dist = ((px - prev_x).abs() + (py - prev_y).abs()) as usize;
            if dist < viewport.width.max(1) * 4 && viewport.line_might_be_visible((prev_x, prev_y), (px, py)) {
                draw_line(canvas, prev_x, prev_y, px, py);
            }
        }

        prev = Some((px, py));
    }
}
