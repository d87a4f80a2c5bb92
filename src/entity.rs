use crate::geo::{GeoBounds, LonLat};
use serde_json::{Map, Value};
use std::fmt;

/// Minimum vertex count for a boundary to be drawn as a polygon
pub const MIN_BOUNDARY_POINTS: usize = 3;

/// Stable, unique entity identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A geographic parcel as supplied by the property list.
/// Read-only for the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoEntity {
    pub id: EntityId,
    pub centroid: LonLat,
    /// Open ring; `None` for point-only records
    pub boundary: Option<Vec<LonLat>>,
    /// Style classification (segment/category)
    pub segment: String,
    pub name: Option<String>,
    /// Remaining feature properties, shown in the attributes panel
    pub attributes: Map<String, Value>,
}

impl GeoEntity {
    pub fn new(id: impl Into<String>, centroid: LonLat, segment: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(id),
            centroid,
            boundary: None,
            segment: segment.into(),
            name: None,
            attributes: Map::new(),
        }
    }

    pub fn with_boundary(mut self, boundary: Vec<LonLat>) -> Self {
        self.boundary = Some(boundary);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Boundary usable as a polygon; short boundaries count as missing
    pub fn renderable_boundary(&self) -> Option<&[LonLat]> {
        self.boundary
            .as_deref()
            .filter(|ring| ring.len() >= MIN_BOUNDARY_POINTS)
    }

    pub fn is_renderable(&self) -> bool {
        self.renderable_boundary().is_some()
    }

    /// Bounds of the boundary plus the centroid
    pub fn bounds(&self) -> GeoBounds {
        let mut bounds = GeoBounds::from_point(self.centroid);
        if let Some(ring) = self.renderable_boundary() {
            for p in ring {
                bounds.extend(*p);
            }
        }
        bounds
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Identity of an entity list: its identifiers, sorted.
/// Reordering or re-allocating the list keeps the same identity.
pub fn list_identity(entities: &[GeoEntity]) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = entities.iter().map(|e| e.id.clone()).collect();
    ids.sort_unstable();
    ids
}
