use crate::braille::BrailleCanvas;
use crate::map::geometry::{draw_circle, draw_ring};
use crate::style::{Rgb, Style, VisualState};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::rc::Rc;
use tracing::trace;

/// Generated marker sprite: a filled disc with an outline ring, as Braille rows
#[derive(Debug, PartialEq, Eq)]
pub struct MarkerImage {
    pub fingerprint: String,
    /// Diameter in Braille dots
    pub size: u32,
    /// Fill colour after opacity
    pub fill: Rgb,
    pub stroke: Rgb,
    pub fill_rows: Vec<String>,
    pub stroke_rows: Vec<String>,
}

impl MarkerImage {
    /// Sprite width in terminal cells
    pub fn cols(&self) -> usize {
        self.fill_rows.first().map(|r| r.chars().count()).unwrap_or(0)
    }

    /// Sprite height in terminal cells
    pub fn rows(&self) -> usize {
        self.fill_rows.len()
    }
}

/// Deterministic key for a style in a visual state at a pixel size
pub fn fingerprint(style: &Style, state: VisualState, size: u32) -> String {
    format!(
        "{}|{:.3}|{}|{:.2}|{}|{}",
        style.fill_color,
        style.fill_opacity,
        style.stroke_color,
        style.stroke_width,
        state.as_str(),
        size
    )
}

/// Memoizes marker imagery by fingerprint.
///
/// A fingerprint always maps to the same image; entries are only dropped
/// wholesale by `clear` or when the LRU bound is exceeded.
pub struct MarkerCache {
    entries: LruCache<String, Rc<MarkerImage>>,
    generated: u64,
}

impl MarkerCache {
    pub const DEFAULT_CAPACITY: usize = 512;

    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            generated: 0,
        }
    }

    pub fn resolve(&mut self, style: &Style, state: VisualState, size: u32) -> Rc<MarkerImage> {
        let key = fingerprint(style, state, size);
        if let Some(image) = self.entries.get(&key) {
            return Rc::clone(image);
        }

        let image = Rc::new(synthesize(key.clone(), style, state, size));
        self.generated += 1;
        trace!(fingerprint = %key, "marker imagery generated");
        self.entries.put(key, Rc::clone(&image));
        image
    }

    /// Number of images synthesized since creation
    pub fn generated(&self) -> u64 {
        self.generated
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for MarkerCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

fn synthesize(fingerprint: String, style: &Style, state: VisualState, size: u32) -> MarkerImage {
    let (opacity, extra_stroke) = match state {
        VisualState::Normal => (style.fill_opacity, 0),
        VisualState::Hover => ((style.fill_opacity + 0.25).min(1.0), 1),
        VisualState::Selected => (1.0, 1),
    };

    let size = size.max(2);
    let radius = (size / 2) as i32;
    let stroke_px = (style.stroke_width.round() as i32).max(1) + extra_stroke;

    // Braille cells are 2x4 dots
    let cols = (size as usize + 2) / 2;
    let rows = (size as usize + 4) / 4;
    let (cx, cy) = (radius, radius);

    let mut fill = BrailleCanvas::new(cols, rows);
    draw_circle(&mut fill, cx, cy, (radius - stroke_px).max(0));

    let mut stroke = BrailleCanvas::new(cols, rows);
    draw_ring(&mut stroke, cx, cy, radius, stroke_px);

    MarkerImage {
        fingerprint,
        size,
        fill: style.fill_color.dimmed(opacity.max(0.2)),
        stroke: style.stroke_color,
        fill_rows: fill.rows().collect(),
        stroke_rows: stroke.rows().collect(),
    }
}
