use crate::entity::{EntityId, GeoEntity};
use crate::error::{MapError, Result};
use crate::geo::{open_ring, polygon_centroid, ring_area, LonLat};
use crate::map::{BaseMap, LineString, Lod};
use geojson::feature::Id;
use geojson::{Feature, GeoJson, Geometry, Value};
use rayon::prelude::*;
use serde_json::{Map, Value as JsonValue};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Style key for features without a `segment` property
pub const DEFAULT_SEGMENT: &str = "default";

/// Load parcels from a GeoJSON file
pub fn load_parcels(path: &Path) -> Result<Vec<GeoEntity>> {
    let bytes = fs::read(path)?;
    let entities = parse_parcels(bytes)?;
    info!(path = %path.display(), count = entities.len(), "parcels loaded");
    Ok(entities)
}

/// Parse a GeoJSON document into entities, keeping feature order
pub fn parse_parcels(mut bytes: Vec<u8>) -> Result<Vec<GeoEntity>> {
    let value: JsonValue = simd_json::serde::from_slice(&mut bytes)?;
    let features = match GeoJson::from_json_value(value)? {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => {
            return Err(MapError::config("parcel file holds a bare geometry, expected features"));
        }
    };

    Ok(features
        .into_par_iter()
        .enumerate()
        .filter_map(|(index, feature)| feature_to_entity(index, feature))
        .collect())
}

fn feature_to_entity(index: usize, feature: Feature) -> Option<GeoEntity> {
    let mut props = feature.properties.unwrap_or_default();

    let id = match feature.id {
        Some(Id::String(s)) => Some(s),
        Some(Id::Number(n)) => Some(n.to_string()),
        None => props.remove("id").and_then(|v| match v {
            JsonValue::String(s) => Some(s),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        }),
    };
    let Some(id) = id else {
        warn!(index, "feature without id skipped");
        return None;
    };

    let Some(geometry) = feature.geometry else {
        warn!(index, %id, "feature without geometry skipped");
        return None;
    };
    let Some((centroid, boundary)) = entity_shape(&geometry) else {
        warn!(index, %id, "unsupported or empty geometry skipped");
        return None;
    };

    let segment = take_string(&mut props, "segment").unwrap_or_else(|| DEFAULT_SEGMENT.to_string());
    let name = take_string(&mut props, "name");

    Some(GeoEntity {
        id: EntityId::new(id),
        centroid,
        boundary,
        segment,
        name,
        attributes: props,
    })
}

fn take_string(props: &mut Map<String, JsonValue>, key: &str) -> Option<String> {
    match props.remove(key)? {
        JsonValue::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Centroid and optional boundary of a parcel geometry.
/// Multipolygons keep their largest exterior ring.
fn entity_shape(geometry: &Geometry) -> Option<(LonLat, Option<Vec<LonLat>>)> {
    match &geometry.value {
        Value::Point(c) if c.len() >= 2 => Some((LonLat::new(c[0], c[1]), None)),
        Value::Polygon(rings) => ring_shape(rings.first()?),
        Value::MultiPolygon(polygons) => {
            let largest = polygons
                .iter()
                .filter_map(|rings| rings.first())
                .map(|ring| to_ring(ring))
                .max_by(|a, b| ring_area(a).abs().total_cmp(&ring_area(b).abs()))?;
            let centroid = polygon_centroid(&largest)?;
            Some((centroid, Some(largest)))
        }
        _ => None,
    }
}

fn ring_shape(exterior: &[Vec<f64>]) -> Option<(LonLat, Option<Vec<LonLat>>)> {
    let ring = to_ring(exterior);
    let centroid = polygon_centroid(&ring)?;
    Some((centroid, Some(ring)))
}

fn to_ring(coords: &[Vec<f64>]) -> Vec<LonLat> {
    open_ring(
        coords
            .iter()
            .filter(|c| c.len() >= 2)
            .map(|c| LonLat::new(c[0], c[1]))
            .collect(),
    )
}

/// Load whichever Natural Earth files exist in `data_dir`
pub fn load_basemap(base: &mut BaseMap, data_dir: &Path) {
    let coastline_files = [
        ("ne_110m_coastline.json", Lod::Low),
        ("natural-earth.json", Lod::Medium),
        ("ne_50m_coastline.json", Lod::Medium),
        ("ne_10m_coastline.json", Lod::High),
    ];

    for (filename, lod) in coastline_files {
        let path = data_dir.join(filename);
        if path.exists() {
            if let Err(e) = load_lines(&path, |line| base.add_coastline(line, lod)) {
                warn!(file = filename, error = %e, "failed to load coastlines");
            }
        }
    }

    let border_files = [
        ("ne_50m_borders.json", Lod::Medium),
        ("ne_10m_borders.json", Lod::High),
    ];

    for (filename, lod) in border_files {
        let path = data_dir.join(filename);
        if path.exists() {
            if let Err(e) = load_lines(&path, |line| base.add_border(line, lod)) {
                warn!(file = filename, error = %e, "failed to load borders");
            }
        }
    }
}

fn load_lines(path: &Path, add_line: impl FnMut(LineString)) -> Result<()> {
    let content = fs::read_to_string(path)?;
    let geojson: GeoJson = content.parse()?;
    process_geojson_lines(&geojson, add_line);
    Ok(())
}

/// Process GeoJSON and extract line features
fn process_geojson_lines<F>(geojson: &GeoJson, mut add_line: F)
where
    F: FnMut(LineString),
{
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                if let Some(ref geometry) = feature.geometry {
                    process_geometry_lines(geometry, &mut add_line);
                }
            }
        }
        GeoJson::Feature(f) => {
            if let Some(ref geometry) = f.geometry {
                process_geometry_lines(geometry, &mut add_line);
            }
        }
        GeoJson::Geometry(geometry) => {
            process_geometry_lines(geometry, &mut add_line);
        }
    }
}

fn process_geometry_lines<F>(geometry: &Geometry, add_line: &mut F)
where
    F: FnMut(LineString),
{
    match &geometry.value {
        Value::LineString(coords) => add_line(to_line(coords)),
        Value::MultiLineString(lines) => {
            for coords in lines {
                add_line(to_line(coords));
            }
        }
        Value::Polygon(rings) => {
            if let Some(exterior) = rings.first() {
                add_line(to_line(exterior));
            }
        }
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                if let Some(exterior) = rings.first() {
                    add_line(to_line(exterior));
                }
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                process_geometry_lines(g, add_line);
            }
        }
        _ => {}
    }
}

fn to_line(coords: &[Vec<f64>]) -> LineString {
    coords.iter().map(|c| (c[0], c[1])).collect()
}

/// Coarse continent outlines for when no data files are available
pub fn builtin_world(base: &mut BaseMap) {
    let outlines: [&[(f64, f64)]; 6] = [
        &[
            (-168.0, 65.0), (-166.0, 60.0), (-141.0, 60.0), (-130.0, 55.0),
            (-125.0, 48.0), (-124.0, 40.0), (-117.0, 32.0), (-110.0, 25.0),
            (-97.0, 25.0), (-97.0, 28.0), (-82.0, 24.0), (-80.0, 25.0),
            (-81.0, 31.0), (-75.0, 35.0), (-70.0, 41.0), (-67.0, 45.0),
            (-55.0, 47.0), (-58.0, 55.0), (-73.0, 62.0), (-95.0, 62.0),
            (-130.0, 70.0), (-168.0, 65.0),
        ],
        &[
            (-80.0, 10.0), (-60.0, 5.0), (-35.0, -5.0), (-40.0, -22.0),
            (-55.0, -34.0), (-68.0, -50.0), (-75.0, -52.0), (-72.0, -30.0),
            (-80.0, -5.0), (-80.0, 10.0),
        ],
        &[
            (-10.0, 36.0), (0.0, 38.0), (10.0, 44.0), (20.0, 40.0),
            (30.0, 40.0), (40.0, 43.0), (40.0, 55.0), (25.0, 65.0),
            (10.0, 71.0), (5.0, 58.0), (-10.0, 52.0), (-5.0, 43.0),
            (-10.0, 36.0),
        ],
        &[
            (-17.0, 15.0), (-5.0, 35.0), (10.0, 37.0), (35.0, 30.0),
            (42.0, 12.0), (50.0, 12.0), (35.0, -20.0), (20.0, -35.0),
            (10.0, -15.0), (10.0, 0.0), (-10.0, 5.0), (-17.0, 15.0),
        ],
        &[
            (40.0, 43.0), (55.0, 37.0), (70.0, 20.0), (80.0, 8.0),
            (92.0, 22.0), (105.0, 10.0), (120.0, 22.0), (130.0, 35.0),
            (145.0, 45.0), (135.0, 55.0), (110.0, 45.0), (70.0, 55.0),
            (40.0, 43.0),
        ],
        &[
            (115.0, -20.0), (130.0, -12.0), (145.0, -15.0), (153.0, -30.0),
            (145.0, -38.0), (130.0, -32.0), (115.0, -35.0), (115.0, -20.0),
        ],
    ];

    for outline in outlines {
        base.add_coastline(outline.to_vec(), Lod::Low);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PARCELS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": "lot-a",
                "properties": { "segment": "premium", "name": "Harbour Lot", "area_m2": 1200 },
                "geometry": { "type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]] }
            },
            {
                "type": "Feature",
                "properties": { "id": 42 },
                "geometry": { "type": "Point", "coordinates": [5.0, 6.0] }
            },
            {
                "type": "Feature",
                "properties": { "segment": "standard" },
                "geometry": { "type": "Point", "coordinates": [1.0, 1.0] }
            },
            {
                "type": "Feature",
                "id": 7,
                "properties": null,
                "geometry": { "type": "MultiPolygon", "coordinates": [
                    [[[10,10],[11,10],[11,11],[10,10]]],
                    [[[20,20],[24,20],[24,24],[20,24],[20,20]]]
                ] }
            }
        ]
    }"#;

    fn parse(json: &str) -> Vec<GeoEntity> {
        parse_parcels(json.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_parcels_in_order_and_unidentified_skipped() {
        let entities = parse(PARCELS);
        let ids: Vec<&str> = entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["lot-a", "42", "7"]);
    }

    #[test]
    fn test_polygon_feature() {
        let entities = parse(PARCELS);
        let lot = &entities[0];
        assert_eq!(lot.segment, "premium");
        assert_eq!(lot.name.as_deref(), Some("Harbour Lot"));
        assert_eq!(lot.boundary.as_ref().map(|b| b.len()), Some(4));
        assert!((lot.centroid.lon - 1.0).abs() < 1e-9);
        assert!((lot.centroid.lat - 1.0).abs() < 1e-9);
        assert_eq!(lot.attributes.get("area_m2"), Some(&JsonValue::from(1200)));
        assert!(!lot.attributes.contains_key("segment"));
    }

    #[test]
    fn test_point_feature_has_no_boundary() {
        let entities = parse(PARCELS);
        let point = &entities[1];
        assert_eq!(point.boundary, None);
        assert_eq!(point.centroid, LonLat::new(5.0, 6.0));
        assert_eq!(point.segment, DEFAULT_SEGMENT);
        assert!(!point.is_renderable());
    }

    #[test]
    fn test_multipolygon_keeps_largest_ring() {
        let entities = parse(PARCELS);
        let multi = &entities[2];
        let ring = multi.boundary.as_ref().unwrap();
        assert_eq!(ring.len(), 4);
        assert_eq!(ring[0], LonLat::new(20.0, 20.0));
        assert!((multi.centroid.lon - 22.0).abs() < 1e-9);
    }

    #[test]
    fn test_bare_geometry_rejected() {
        let err = parse_parcels(br#"{ "type": "Point", "coordinates": [0, 0] }"#.to_vec()).unwrap_err();
        assert!(matches!(err, MapError::Config(_)));
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(parse_parcels(b"{ not json".to_vec()).is_err());
    }

    #[test]
    fn test_builtin_world_has_low_lod_data() {
        let mut base = BaseMap::new();
        assert!(!base.has_data());
        builtin_world(&mut base);
        assert!(base.has_data());
        assert_eq!(base.coastlines_low.len(), 6);
    }

    #[test]
    fn test_line_extraction_from_multilinestring() {
        let geojson: GeoJson = r#"{ "type": "Feature", "properties": {}, "geometry":
            { "type": "MultiLineString", "coordinates": [[[0,0],[1,1]], [[2,2],[3,3],[4,4]]] } }"#
            .parse()
            .unwrap();
        let mut lines = Vec::new();
        process_geojson_lines(&geojson, |l| lines.push(l));
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], vec![(2.0, 2.0), (3.0, 3.0), (4.0, 4.0)]);
    }
}
