use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Geographic coordinate pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    #[inline(always)]
    pub fn to_vec(self) -> DVec2 {
        DVec2::new(self.lon, self.lat)
    }

    #[inline(always)]
    pub fn from_vec(v: DVec2) -> Self {
        Self::new(v.x, v.y)
    }
}

impl From<(f64, f64)> for LonLat {
    fn from((lon, lat): (f64, f64)) -> Self {
        Self::new(lon, lat)
    }
}

/// Axis-aligned lon/lat rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min: LonLat,
    pub max: LonLat,
}

impl GeoBounds {
    pub fn from_point(p: LonLat) -> Self {
        Self { min: p, max: p }
    }

    /// Bounds of a point sequence, `None` when empty
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a LonLat>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self::from_point(*first);
        for p in iter {
            bounds.extend(*p);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, p: LonLat) {
        let min = self.min.to_vec().min(p.to_vec());
        let max = self.max.to_vec().max(p.to_vec());
        self.min = LonLat::from_vec(min);
        self.max = LonLat::from_vec(max);
    }

    pub fn union(&self, other: &GeoBounds) -> GeoBounds {
        let mut out = *self;
        out.extend(other.min);
        out.extend(other.max);
        out
    }

    pub fn center(&self) -> LonLat {
        LonLat::from_vec((self.min.to_vec() + self.max.to_vec()) * 0.5)
    }

    pub fn lon_delta(&self) -> f64 {
        self.max.lon - self.min.lon
    }

    pub fn lat_delta(&self) -> f64 {
        self.max.lat - self.min.lat
    }

    pub fn intersects(&self, other: &GeoBounds) -> bool {
        self.min.lon <= other.max.lon
            && self.max.lon >= other.min.lon
            && self.min.lat <= other.max.lat
            && self.max.lat >= other.min.lat
    }

    pub fn contains(&self, p: LonLat) -> bool {
        p.lon >= self.min.lon && p.lon <= self.max.lon && p.lat >= self.min.lat && p.lat <= self.max.lat
    }
}

/// Latitude limit of the square Web Mercator world
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Normalized Web Mercator x in [0, 1)
#[inline(always)]
pub fn mercator_x(lon: f64) -> f64 {
    (lon + 180.0) / 360.0
}

/// Normalized Web Mercator y, 0 at the north edge
#[inline(always)]
pub fn mercator_y(lat: f64) -> f64 {
    let lat_rad = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0
}

#[inline(always)]
pub fn lon_from_mercator(x: f64) -> f64 {
    x * 360.0 - 180.0
}

#[inline(always)]
pub fn lat_from_mercator(y: f64) -> f64 {
    (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees()
}

/// Wrap longitude into [-180, 180]
#[inline(always)]
pub fn wrap_lon(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else if lon < -180.0 {
        lon + 360.0
    } else {
        lon
    }
}

/// Drop a closing vertex that repeats the first one
pub fn open_ring(mut ring: Vec<LonLat>) -> Vec<LonLat> {
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

/// Signed shoelace area (degrees squared) of an open ring
pub fn ring_area(ring: &[LonLat]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (i, a) in ring.iter().enumerate() {
        let b = ring[(i + 1) % ring.len()];
        twice += a.to_vec().perp_dot(b.to_vec());
    }
    twice * 0.5
}

/// Area-weighted centroid of an open ring.
/// Falls back to the vertex mean when the ring is degenerate.
pub fn polygon_centroid(ring: &[LonLat]) -> Option<LonLat> {
    if ring.is_empty() {
        return None;
    }

    // Work relative to the first vertex to keep precision at parcel scale
    let origin = ring[0].to_vec();
    let mut acc = DVec2::ZERO;
    let mut twice_area = 0.0;
    for (i, a) in ring.iter().enumerate() {
        let a = a.to_vec() - origin;
        let b = ring[(i + 1) % ring.len()].to_vec() - origin;
        let cross = a.perp_dot(b);
        twice_area += cross;
        acc += (a + b) * cross;
    }

    if twice_area.abs() < 1e-18 {
        let sum: DVec2 = ring.iter().map(|p| p.to_vec()).sum();
        return Some(LonLat::from_vec(sum / ring.len() as f64));
    }

    Some(LonLat::from_vec(origin + acc / (3.0 * twice_area)))
}

/// Even-odd point in polygon test on an open ring
pub fn point_in_ring(p: LonLat, ring: &[LonLat]) -> bool {
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.lat > p.lat) != (b.lat > p.lat) {
            let x = (b.lon - a.lon) * (p.lat - a.lat) / (b.lat - a.lat) + a.lon;
            if p.lon < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
