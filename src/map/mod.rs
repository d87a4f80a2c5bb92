pub mod geometry;
mod projection;
mod renderer;
pub mod spatial;

pub use projection::{CameraState, Viewport, MAX_ZOOM, MIN_ZOOM, TILE_SIZE};
pub use renderer::{BaseMap, ColorLayer, LineString, Lod, MapLayers, MarkerPlacement, MarkerView, ShapeView};
