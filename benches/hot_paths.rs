//! Hot paths of the viewport engine: reconciliation of large parcel lists,
//! marker imagery lookups, parcel parsing and frame rendering.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use parcel_map::config::{MarkerConfig, ReconcilerConfig};
use parcel_map::data::parse_parcels;
use parcel_map::engine::OverlayReconciler;
use parcel_map::entity::GeoEntity;
use parcel_map::geo::LonLat;
use parcel_map::map::BaseMap;
use parcel_map::style::{MarkerCache, Style, StyleConfig, VisualState};
use parcel_map::surface::TerminalSurface;

const SEGMENTS: [&str; 4] = ["premium", "standard", "commercial", "residential"];

fn square(cx: f64, cy: f64) -> Vec<LonLat> {
    vec![
        LonLat::new(cx - 0.0004, cy - 0.0004),
        LonLat::new(cx + 0.0004, cy - 0.0004),
        LonLat::new(cx + 0.0004, cy + 0.0004),
        LonLat::new(cx - 0.0004, cy + 0.0004),
    ]
}

/// Parcels on a square grid around Paris
fn parcels(n: usize) -> Vec<GeoEntity> {
    let side = (n as f64).sqrt().ceil() as usize;
    (0..n)
        .map(|i| {
            let x = 2.30 + (i % side) as f64 * 0.001;
            let y = 48.80 + (i / side) as f64 * 0.001;
            GeoEntity::new(format!("lot-{i}"), LonLat::new(x, y), SEGMENTS[i % SEGMENTS.len()])
                .with_boundary(square(x, y))
        })
        .collect()
}

fn parcels_geojson(n: usize) -> Vec<u8> {
    let features: Vec<String> = parcels(n)
        .iter()
        .map(|p| {
            let ring: Vec<String> = p
                .boundary
                .iter()
                .flatten()
                .chain(p.boundary.iter().flatten().take(1))
                .map(|c| format!("[{},{}]", c.lon, c.lat))
                .collect();
            format!(
                r#"{{"type":"Feature","id":"{}","properties":{{"segment":"{}"}},"geometry":{{"type":"Polygon","coordinates":[[{}]]}}}}"#,
                p.id,
                p.segment,
                ring.join(",")
            )
        })
        .collect();
    format!(r#"{{"type":"FeatureCollection","features":[{}]}}"#, features.join(",")).into_bytes()
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");
    let styles = StyleConfig::builtin();

    for n in [100, 1_000, 5_000] {
        let entities = parcels(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &entities, |b, entities| {
            let mut surface = TerminalSurface::new(400, 200, BaseMap::new());
            let mut cache = MarkerCache::default();
            let mut reconciler = OverlayReconciler::new(ReconcilerConfig::default(), MarkerConfig::default());
            b.iter(|| {
                let outcome = reconciler.reconcile(&mut surface, entities, &styles, &mut cache);
                black_box(outcome)
            });
        });
    }

    group.finish();
}

fn bench_marker_cache(c: &mut Criterion) {
    let style = Style::default();
    let mut group = c.benchmark_group("marker_cache");

    group.bench_function("hit", |b| {
        let mut cache = MarkerCache::default();
        cache.resolve(&style, VisualState::Normal, 6);
        b.iter(|| black_box(cache.resolve(&style, VisualState::Normal, 6)));
    });

    group.bench_function("generate", |b| {
        b.iter(|| {
            let mut cache = MarkerCache::default();
            black_box(cache.resolve(&style, VisualState::Selected, 10))
        });
    });

    group.finish();
}

fn bench_parse_parcels(c: &mut Criterion) {
    let bytes = parcels_geojson(2_000);
    let mut group = c.benchmark_group("parse_parcels");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("2000_polygons", |b| {
        b.iter(|| black_box(parse_parcels(bytes.clone())))
    });
    group.finish();
}

fn bench_render_layers(c: &mut Criterion) {
    let entities = parcels(1_000);
    let mut surface = TerminalSurface::new(400, 200, BaseMap::new());
    let mut cache = MarkerCache::default();
    let mut reconciler = OverlayReconciler::new(ReconcilerConfig::default(), MarkerConfig::default());
    reconciler.reconcile(&mut surface, &entities, &StyleConfig::builtin(), &mut cache);

    c.bench_function("render_layers_1000", |b| {
        b.iter(|| black_box(surface.layers(200, 50)))
    });
}

criterion_group!(
    benches,
    bench_reconcile,
    bench_marker_cache,
    bench_parse_parcels,
    bench_render_layers
);
criterion_main!(benches);
