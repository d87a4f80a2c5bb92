use crate::geo::{
    lat_from_mercator, lon_from_mercator, mercator_x, mercator_y, wrap_lon, GeoBounds, LonLat,
    MAX_MERCATOR_LAT,
};
use crate::surface::Padding;

/// World width in pixels at zoom 0
pub const TILE_SIZE: f64 = 256.0;
pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 20.0;

/// Camera position: what the map is centered on and how far in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub center: LonLat,
    pub zoom: f64,
}

impl CameraState {
    pub fn new(center: LonLat, zoom: f64) -> Self {
        Self { center, zoom }
    }

    /// Eased interpolation; zoom moves linearly in level space
    pub fn lerp(&self, to: &CameraState, t: f64) -> CameraState {
        let t = ease_in_out(t.clamp(0.0, 1.0));
        let from_x = mercator_x(self.center.lon);
        let from_y = mercator_y(self.center.lat);
        let x = from_x + (mercator_x(to.center.lon) - from_x) * t;
        let y = from_y + (mercator_y(to.center.lat) - from_y) * t;
        CameraState {
            center: LonLat::new(lon_from_mercator(x), lat_from_mercator(y)),
            zoom: self.zoom + (to.zoom - self.zoom) * t,
        }
    }
}

fn ease_in_out(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

/// Web Mercator viewport in Braille pixel space
#[derive(Debug, Clone)]
pub struct Viewport {
    pub center_lon: f64,
    pub center_lat: f64,
    /// Web map zoom level (world is `256 * 2^zoom` pixels wide)
    pub zoom: f64,
    pub width: usize,
    pub height: usize,
}

impl Viewport {
    pub fn new(center_lon: f64, center_lat: f64, zoom: f64, width: usize, height: usize) -> Self {
        Self {
            center_lon,
            center_lat,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            width,
            height,
        }
    }

    pub fn world(width: usize, height: usize) -> Self {
        Self::new(0.0, 20.0, 1.0, width, height)
    }

    pub fn camera(&self) -> CameraState {
        CameraState::new(LonLat::new(self.center_lon, self.center_lat), self.zoom)
    }

    pub fn set_camera(&mut self, camera: CameraState) {
        self.center_lon = wrap_lon(camera.center.lon);
        self.center_lat = camera.center.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
        self.zoom = camera.zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Pixels per unit of normalized mercator space
    #[inline(always)]
    fn scale(&self) -> f64 {
        TILE_SIZE * self.zoom.exp2()
    }

    /// Pan by pixel delta
    pub fn pan(&mut self, dx: i32, dy: i32) {
        let scale = self.scale();
        let x = mercator_x(self.center_lon) + dx as f64 / scale;
        let y = (mercator_y(self.center_lat) + dy as f64 / scale).clamp(0.0, 1.0);
        self.center_lon = wrap_lon(lon_from_mercator(x));
        self.center_lat = lat_from_mercator(y).clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    }

    /// Zoom by `delta` levels keeping the geographic point under (px, py) fixed
    pub fn zoom_at(&mut self, px: i32, py: i32, delta: f64) {
        let anchor = self.unproject(px, py);
        self.zoom = (self.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
        let (new_px, new_py) = self.project(anchor.lon, anchor.lat);
        self.pan(new_px - px, new_py - py);
    }

    pub fn project(&self, lon: f64, lat: f64) -> (i32, i32) {
        let scale = self.scale();
        let px = (mercator_x(lon) - mercator_x(self.center_lon)) * scale + self.width as f64 / 2.0;
        let py = (mercator_y(lat) - mercator_y(self.center_lat)) * scale + self.height as f64 / 2.0;
        (px.round() as i32, py.round() as i32)
    }

    pub fn unproject(&self, px: i32, py: i32) -> LonLat {
        let scale = self.scale();
        let x = (px as f64 - self.width as f64 / 2.0) / scale + mercator_x(self.center_lon);
        let y = (py as f64 - self.height as f64 / 2.0) / scale + mercator_y(self.center_lat);
        LonLat::new(lon_from_mercator(x), lat_from_mercator(y.clamp(0.0, 1.0)))
    }

    /// Geographic rectangle currently on screen
    pub fn visible_bounds(&self) -> GeoBounds {
        let top_left = self.unproject(0, 0);
        let bottom_right = self.unproject(self.width as i32, self.height as i32);
        GeoBounds {
            min: LonLat::new(top_left.lon, bottom_right.lat),
            max: LonLat::new(bottom_right.lon, top_left.lat),
        }
    }

    /// Camera that shows `bounds` inside the viewport minus `padding`.
    /// Uneven padding shifts the center away from the wider side.
    pub fn fit_bounds(&self, bounds: &GeoBounds, padding: Padding, max_zoom: f64) -> CameraState {
        let avail_w = (self.width as f64 - padding.left - padding.right).max(1.0);
        let avail_h = (self.height as f64 - padding.top - padding.bottom).max(1.0);

        let x0 = mercator_x(bounds.min.lon);
        let x1 = mercator_x(bounds.max.lon);
        let y0 = mercator_y(bounds.max.lat);
        let y1 = mercator_y(bounds.min.lat);
        let span_x = (x1 - x0).max(f64::EPSILON);
        let span_y = (y1 - y0).max(f64::EPSILON);

        let zoom = ((avail_w / span_x).min(avail_h / span_y) / TILE_SIZE)
            .log2()
            .clamp(MIN_ZOOM, max_zoom.min(MAX_ZOOM));
        let scale = TILE_SIZE * zoom.exp2();

        let cx = (x0 + x1) / 2.0 + (padding.right - padding.left) / 2.0 / scale;
        let cy = (y0 + y1) / 2.0 + (padding.bottom - padding.top) / 2.0 / scale;
        CameraState::new(
            LonLat::new(lon_from_mercator(cx), lat_from_mercator(cy)),
            zoom,
        )
    }

    pub fn is_visible(&self, px: i32, py: i32) -> bool {
        px >= -10 && px < self.width as i32 + 10 && py >= -10 && py < self.height as i32 + 10
    }

    /// Rough bounding-box check for a segment
    pub fn line_might_be_visible(&self, p1: (i32, i32), p2: (i32, i32)) -> bool {
        let min_x = p1.0.min(p2.0);
        let max_x = p1.0.max(p2.0);
        let min_y = p1.1.min(p2.1);
        let max_y = p1.1.max(p2.1);

        max_x >= 0 && min_x < self.width as i32 && max_y >= 0 && min_y < self.height as i32
    }
}
