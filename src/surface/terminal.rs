use super::{
    FitOptions, MapType, OverlayHandle, OverlayOption, RenderSurface, SubscriptionId, SurfaceEvent,
    SurfaceEventKind, TransitionOptions,
};
use crate::geo::{point_in_ring, GeoBounds, LonLat};
use crate::map::spatial::FeatureGrid;
use crate::map::{BaseMap, CameraState, MapLayers, MarkerView, ShapeView, Viewport};
use crate::style::{MarkerImage, Style};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Grid cell size in degrees, tuned for parcel-sized overlays
const GRID_CELL_DEGREES: f64 = 0.01;

struct ShapeOverlay {
    points: Vec<LonLat>,
    bounds: GeoBounds,
    style: Style,
    stroke_width: f64,
    fill_opacity: f64,
    visible: bool,
    z: i32,
}

struct MarkerOverlay {
    point: LonLat,
    image: Rc<MarkerImage>,
    size: u32,
    visible: bool,
    z: i32,
}

enum Overlay {
    Shape(ShapeOverlay),
    Marker(MarkerOverlay),
}

impl Overlay {
    fn bounds(&self) -> GeoBounds {
        match self {
            Overlay::Shape(s) => s.bounds,
            Overlay::Marker(m) => GeoBounds::from_point(m.point),
        }
    }

    fn visible(&self) -> bool {
        match self {
            Overlay::Shape(s) => s.visible,
            Overlay::Marker(m) => m.visible,
        }
    }

    fn z(&self) -> i32 {
        match self {
            Overlay::Shape(s) => s.z,
            Overlay::Marker(m) => m.z,
        }
    }
}

struct Transition {
    from: CameraState,
    to: CameraState,
    started: Instant,
    duration: Duration,
}

/// Rendering surface drawn with Braille dots in a terminal.
///
/// Time only moves when the host calls [`TerminalSurface::advance`]; camera
/// transitions interpolate between frames and end with `ActionEnd`.
pub struct TerminalSurface {
    viewport: Viewport,
    basemap: BaseMap,
    map_type: MapType,
    overlays: HashMap<OverlayHandle, Overlay>,
    grid: Option<FeatureGrid<OverlayHandle>>,
    next_id: u64,
    subscriptions: HashMap<SubscriptionId, SurfaceEventKind>,
    queue: VecDeque<SurfaceEvent>,
    transition: Option<Transition>,
    ready: bool,
    hovered: Option<OverlayHandle>,
    visible: Vec<OverlayHandle>,
    now: Instant,
}

impl TerminalSurface {
    pub fn new(width: usize, height: usize, basemap: BaseMap) -> Self {
        Self {
            viewport: Viewport::world(width, height),
            basemap,
            map_type: MapType::default(),
            overlays: HashMap::new(),
            grid: None,
            next_id: 0,
            subscriptions: HashMap::new(),
            queue: VecDeque::new(),
            transition: None,
            ready: false,
            hovered: None,
            visible: Vec::new(),
            now: Instant::now(),
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn map_type(&self) -> MapType {
        self.map_type
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    /// Flag the surface as usable and announce it
    pub fn mark_ready(&mut self) {
        if !self.ready {
            self.ready = true;
            self.emit(SurfaceEvent::Ready);
        }
    }

    /// Step the clock: progress the running transition and re-cull
    pub fn advance(&mut self, now: Instant) {
        self.now = now;

        if let Some(tr) = &self.transition {
            let elapsed = now.saturating_duration_since(tr.started);
            let t = if tr.duration.is_zero() {
                1.0
            } else {
                elapsed.as_secs_f64() / tr.duration.as_secs_f64()
            };

            if t >= 1.0 {
                let to = tr.to;
                self.viewport.set_camera(to);
                self.transition = None;
                self.emit(SurfaceEvent::ActionEnd);
                self.emit(SurfaceEvent::BoundsChanged(self.viewport.camera()));
            } else {
                let camera = tr.from.lerp(&tr.to, t);
                self.viewport.set_camera(camera);
            }
        }

        self.update_visible();
    }

    /// User pan by pixel delta; ignored during a transition
    pub fn pan_by(&mut self, dx: i32, dy: i32) {
        if self.transition.is_some() {
            return;
        }
        self.viewport.pan(dx, dy);
        self.camera_moved();
    }

    /// User zoom around a pixel; ignored during a transition
    pub fn zoom_at(&mut self, px: i32, py: i32, delta: f64) {
        if self.transition.is_some() {
            return;
        }
        self.viewport.zoom_at(px, py, delta);
        self.camera_moved();
    }

    /// User zoom around the viewport center
    pub fn zoom_by(&mut self, delta: f64) {
        let (cx, cy) = (self.viewport.width as i32 / 2, self.viewport.height as i32 / 2);
        self.zoom_at(cx, cy, delta);
    }

    pub fn pointer_moved(&mut self, px: i32, py: i32) {
        let hit = self.hit_test(px, py);
        if hit == self.hovered {
            return;
        }
        if let Some(old) = self.hovered.take() {
            self.emit(SurfaceEvent::MouseLeave(old));
        }
        if let Some(new) = hit {
            self.emit(SurfaceEvent::MouseEnter(new));
        }
        self.hovered = hit;
    }

    pub fn pointer_left(&mut self) {
        if let Some(old) = self.hovered.take() {
            self.emit(SurfaceEvent::MouseLeave(old));
        }
    }

    pub fn pointer_clicked(&mut self, px: i32, py: i32) {
        let handle = self.hit_test(px, py);
        let at = self.viewport.unproject(px, py);
        self.emit(SurfaceEvent::Click { handle, at });
    }

    /// The hosting container changed size (in pixels)
    pub fn notify_container_resize(&mut self, width: u32, height: u32) {
        self.emit(SurfaceEvent::ContainerResized { width, height });
    }

    /// Draw basemap and visible overlays into `cols x rows` cells
    pub fn layers(&self, cols: usize, rows: usize) -> MapLayers {
        let shapes = self.overlays.values().filter_map(|o| match o {
            Overlay::Shape(s) if s.visible => Some(ShapeView {
                points: &s.points,
                color: s.style.stroke_color.dimmed(0.5 + s.fill_opacity.clamp(0.0, 1.0) / 2.0),
                thick: s.stroke_width >= 2.0,
                z: s.z,
            }),
            _ => None,
        });
        let markers = self.overlays.values().filter_map(|o| match o {
            Overlay::Marker(m) if m.visible => Some(MarkerView {
                point: m.point,
                image: Rc::clone(&m.image),
                z: m.z,
            }),
            _ => None,
        });
        self.basemap.render(cols, rows, &self.viewport, shapes, markers)
    }

    fn emit(&mut self, event: SurfaceEvent) {
        let kind = event.kind();
        if self.subscriptions.values().any(|k| *k == kind) {
            trace!(?kind, "surface event queued");
            self.queue.push_back(event);
        }
    }

    fn camera_moved(&mut self) {
        self.emit(SurfaceEvent::BoundsChanged(self.viewport.camera()));
        self.update_visible();
    }

    fn next_handle(&mut self) -> OverlayHandle {
        self.next_id += 1;
        OverlayHandle(self.next_id)
    }

    fn insert(&mut self, overlay: Overlay) -> OverlayHandle {
        let handle = self.next_handle();
        if let Some(grid) = &mut self.grid {
            grid.insert(handle, &overlay.bounds());
        }
        self.overlays.insert(handle, overlay);
        handle
    }

    fn grid(&mut self) -> &FeatureGrid<OverlayHandle> {
        let overlays = &self.overlays;
        self.grid.get_or_insert_with(|| {
            FeatureGrid::build(overlays.iter().map(|(h, o)| (*h, o.bounds())), GRID_CELL_DEGREES)
        })
    }

    /// Topmost visible overlay under a pixel: markers before shapes
    fn hit_test(&mut self, px: i32, py: i32) -> Option<OverlayHandle> {
        let at = self.viewport.unproject(px, py);
        let corner_a = self.viewport.unproject(px - 8, py - 8);
        let corner_b = self.viewport.unproject(px + 8, py + 8);
        let mut query_box = GeoBounds::from_point(corner_a);
        query_box.extend(corner_b);
        query_box.extend(at);

        let candidates = self.grid().query(&query_box);

        let mut best_marker: Option<(i32, OverlayHandle)> = None;
        let mut best_shape: Option<(i32, OverlayHandle)> = None;
        for handle in candidates {
            let Some(overlay) = self.overlays.get(&handle) else {
                continue;
            };
            if !overlay.visible() {
                continue;
            }
            match overlay {
                Overlay::Marker(m) => {
                    let (mx, my) = self.viewport.project(m.point.lon, m.point.lat);
                    let r = (m.size / 2) as i32 + 1;
                    let (dx, dy) = (mx - px, my - py);
                    if dx * dx + dy * dy <= r * r && best_marker.map_or(true, |(z, _)| m.z > z) {
                        best_marker = Some((m.z, handle));
                    }
                }
                Overlay::Shape(s) => {
                    if s.bounds.contains(at)
                        && point_in_ring(at, &s.points)
                        && best_shape.map_or(true, |(z, _)| s.z > z)
                    {
                        best_shape = Some((s.z, handle));
                    }
                }
            }
        }

        best_marker.or(best_shape).map(|(_, h)| h)
    }

    fn update_visible(&mut self) {
        if !self.subscriptions.values().any(|k| *k == SurfaceEventKind::VisibleChanged) {
            return;
        }
        let view = self.viewport.visible_bounds();
        let candidates = self.grid().query(&view);
        let mut visible: Vec<OverlayHandle> = candidates
            .into_iter()
            .filter(|h| {
                self.overlays
                    .get(h)
                    .is_some_and(|o| o.visible() && o.bounds().intersects(&view))
            })
            .collect();
        visible.sort_unstable();

        if visible != self.visible {
            self.visible = visible.clone();
            self.emit(SurfaceEvent::VisibleChanged(visible));
        }
    }

    /// Where the camera is heading: the running transition's end, or here
    fn target(&self) -> CameraState {
        self.transition
            .as_ref()
            .map_or_else(|| self.viewport.camera(), |tr| tr.to)
    }

    fn start_transition(&mut self, to: CameraState, duration: Duration) {
        self.transition = Some(Transition {
            from: self.viewport.camera(),
            to,
            started: self.now,
            duration,
        });
    }
}

impl RenderSurface for TerminalSurface {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn create_boundary_shape(&mut self, points: &[LonLat], style: &Style) -> OverlayHandle {
        let bounds = GeoBounds::from_points(points).unwrap_or(GeoBounds::from_point(LonLat::default()));
        self.insert(Overlay::Shape(ShapeOverlay {
            points: points.to_vec(),
            bounds,
            style: style.clone(),
            stroke_width: style.stroke_width,
            fill_opacity: style.fill_opacity,
            visible: true,
            z: 0,
        }))
    }

    fn create_marker(&mut self, point: LonLat, image: Rc<MarkerImage>, size: u32) -> OverlayHandle {
        self.insert(Overlay::Marker(MarkerOverlay {
            point,
            image,
            size,
            visible: true,
            z: 0,
        }))
    }

    fn remove(&mut self, handle: OverlayHandle) {
        if self.overlays.remove(&handle).is_some() {
            self.grid = None;
        }
        if self.hovered == Some(handle) {
            self.hovered = None;
        }
    }

    fn set_option(&mut self, handle: OverlayHandle, option: OverlayOption) {
        let Some(overlay) = self.overlays.get_mut(&handle) else {
            return;
        };
        match (overlay, option) {
            (Overlay::Shape(s), OverlayOption::Visible(v)) => s.visible = v,
            (Overlay::Shape(s), OverlayOption::StrokeWidth(w)) => s.stroke_width = w,
            (Overlay::Shape(s), OverlayOption::FillOpacity(o)) => s.fill_opacity = o,
            (Overlay::Shape(s), OverlayOption::ZIndex(z)) => s.z = z,
            (Overlay::Marker(m), OverlayOption::Visible(v)) => m.visible = v,
            (Overlay::Marker(m), OverlayOption::Image(image)) => m.image = image,
            (Overlay::Marker(m), OverlayOption::Size(size)) => m.size = size,
            (Overlay::Marker(m), OverlayOption::ZIndex(z)) => m.z = z,
            _ => {}
        }
    }

    fn pan_to(&mut self, point: LonLat, opts: TransitionOptions) {
        let to = CameraState::new(point, self.target().zoom);
        self.start_transition(to, opts.duration);
    }

    fn set_bounds(&mut self, bounds: GeoBounds, opts: FitOptions) {
        let to = self.viewport.fit_bounds(&bounds, opts.padding, opts.max_zoom);
        self.start_transition(to, opts.duration);
    }

    fn set_zoom(&mut self, level: f64, opts: TransitionOptions) {
        let center = self.target().center;
        self.start_transition(CameraState::new(center, level), opts.duration);
    }

    fn zoom(&self) -> f64 {
        self.viewport.zoom
    }

    fn center(&self) -> LonLat {
        LonLat::new(self.viewport.center_lon, self.viewport.center_lat)
    }

    fn set_map_type(&mut self, map_type: MapType) {
        self.map_type = map_type;
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.viewport.width = width as usize;
        self.viewport.height = height as usize;
        self.update_visible();
    }

    fn subscribe(&mut self, kind: SurfaceEventKind) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscriptions.insert(id, kind);
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscriptions.remove(&id);
    }

    fn drain_events(&mut self) -> Vec<SurfaceEvent> {
        self.queue.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{MarkerCache, VisualState};

    fn surface() -> TerminalSurface {
        let mut s = TerminalSurface::new(200, 100, BaseMap::new());
        s.viewport.set_camera(CameraState::new(LonLat::new(0.0, 0.0), 15.0));
        s
    }

    fn parcel() -> Vec<LonLat> {
        vec![
            LonLat::new(-0.001, -0.001),
            LonLat::new(0.001, -0.001),
            LonLat::new(0.001, 0.001),
            LonLat::new(-0.001, 0.001),
        ]
    }

    #[test]
    fn test_events_require_subscription() {
        let mut s = surface();
        s.mark_ready();
        assert!(s.drain_events().is_empty());

        let mut s = surface();
        s.subscribe(SurfaceEventKind::Ready);
        s.mark_ready();
        assert_eq!(s.drain_events(), vec![SurfaceEvent::Ready]);
        assert!(s.is_ready());
    }

    #[test]
    fn test_transition_ends_with_action_end() {
        let mut s = surface();
        s.subscribe(SurfaceEventKind::ActionEnd);
        let t0 = Instant::now();
        s.advance(t0);
        s.set_zoom(17.0, TransitionOptions::animated(Duration::from_millis(500)));
        s.advance(t0 + Duration::from_millis(250));
        assert!(s.is_animating());
        assert!(s.zoom() > 15.0 && s.zoom() < 17.0);
        assert!(s.drain_events().is_empty());

        s.advance(t0 + Duration::from_millis(600));
        assert!(!s.is_animating());
        assert_eq!(s.zoom(), 17.0);
        assert_eq!(s.drain_events(), vec![SurfaceEvent::ActionEnd]);
    }

    #[test]
    fn test_unsubscribe_stops_events() {
        let mut s = surface();
        let id = s.subscribe(SurfaceEventKind::BoundsChanged);
        s.pan_by(5, 0);
        assert_eq!(s.drain_events().len(), 1);
        s.unsubscribe(id);
        s.pan_by(5, 0);
        assert!(s.drain_events().is_empty());
    }

    #[test]
    fn test_manual_pan_ignored_while_animating() {
        let mut s = surface();
        s.advance(Instant::now());
        s.pan_to(LonLat::new(0.01, 0.0), TransitionOptions::animated(Duration::from_secs(1)));
        let before = s.center();
        s.pan_by(50, 0);
        assert_eq!(s.center(), before);
    }

    #[test]
    fn test_hover_enter_and_leave() {
        let mut s = surface();
        s.subscribe(SurfaceEventKind::MouseEnter);
        s.subscribe(SurfaceEventKind::MouseLeave);
        let handle = s.create_boundary_shape(&parcel(), &Style::FALLBACK);

        s.pointer_moved(100, 50);
        assert_eq!(s.drain_events(), vec![SurfaceEvent::MouseEnter(handle)]);
        s.pointer_moved(101, 50);
        assert!(s.drain_events().is_empty());
        s.pointer_moved(0, 0);
        assert_eq!(s.drain_events(), vec![SurfaceEvent::MouseLeave(handle)]);
    }

    #[test]
    fn test_marker_wins_hit_test_over_shape() {
        let mut s = surface();
        s.subscribe(SurfaceEventKind::Click);
        s.create_boundary_shape(&parcel(), &Style::FALLBACK);
        let image = MarkerCache::default().resolve(&Style::FALLBACK, VisualState::Normal, 6);
        let marker = s.create_marker(LonLat::new(0.0, 0.0), image, 6);

        s.pointer_clicked(100, 50);
        match s.drain_events().as_slice() {
            [SurfaceEvent::Click { handle, .. }] => assert_eq!(*handle, Some(marker)),
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn test_hidden_overlay_not_hit() {
        let mut s = surface();
        s.subscribe(SurfaceEventKind::Click);
        let handle = s.create_boundary_shape(&parcel(), &Style::FALLBACK);
        s.set_option(handle, OverlayOption::Visible(false));
        s.pointer_clicked(100, 50);
        match s.drain_events().as_slice() {
            [SurfaceEvent::Click { handle, .. }] => assert_eq!(*handle, None),
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn test_visible_changed_reports_on_screen_overlays() {
        let mut s = surface();
        s.subscribe(SurfaceEventKind::VisibleChanged);
        let near = s.create_boundary_shape(&parcel(), &Style::FALLBACK);
        let far: Vec<LonLat> = parcel().iter().map(|p| LonLat::new(p.lon + 1.0, p.lat)).collect();
        s.create_boundary_shape(&far, &Style::FALLBACK);

        s.advance(Instant::now());
        assert_eq!(s.drain_events(), vec![SurfaceEvent::VisibleChanged(vec![near])]);
        s.advance(Instant::now());
        assert!(s.drain_events().is_empty());
    }

    #[test]
    fn test_set_bounds_fits_region() {
        let mut s = surface();
        let t0 = Instant::now();
        s.advance(t0);
        let bounds = GeoBounds::from_points(&parcel()).unwrap();
        let opts = FitOptions {
            padding: crate::surface::Padding::uniform(10.0),
            duration: Duration::ZERO,
            max_zoom: 20.0,
        };
        s.set_bounds(bounds, opts);
        s.advance(t0);
        assert!(!s.is_animating());
        let (x0, _) = s.viewport().project(-0.001, 0.0);
        let (x1, _) = s.viewport().project(0.001, 0.0);
        assert!(x0 >= 9 && x1 <= 191);
    }

    #[test]
    fn test_zoom_during_pan_keeps_pan_target() {
        let mut s = surface();
        let t0 = Instant::now();
        s.advance(t0);
        let target = LonLat::new(0.002, 0.001);
        s.pan_to(target, TransitionOptions::animated(Duration::from_millis(600)));
        s.advance(t0 + Duration::from_millis(300));
        s.set_zoom(16.0, TransitionOptions::animated(Duration::from_millis(600)));
        s.advance(t0 + Duration::from_millis(1000));
        assert!((s.center().lon - target.lon).abs() < 1e-9);
        assert!((s.center().lat - target.lat).abs() < 1e-9);
        assert_eq!(s.zoom(), 16.0);
    }

    #[test]
    fn test_remove_clears_hover() {
        let mut s = surface();
        let handle = s.create_boundary_shape(&parcel(), &Style::FALLBACK);
        s.pointer_moved(100, 50);
        s.remove(handle);
        assert_eq!(s.overlay_count(), 0);
        s.subscribe(SurfaceEventKind::MouseLeave);
        s.pointer_moved(0, 0);
        assert!(s.drain_events().is_empty());
    }
}
