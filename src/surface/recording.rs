use super::{
    FitOptions, MapType, OverlayHandle, OverlayOption, RenderSurface, SubscriptionId, SurfaceEvent,
    SurfaceEventKind, TransitionOptions,
};
use crate::geo::{GeoBounds, LonLat};
use crate::style::{MarkerImage, Style};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// One recorded call against the surface
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    CreateShape(OverlayHandle),
    CreateMarker(OverlayHandle),
    Remove(OverlayHandle),
    SetOption(OverlayHandle, OverlayOption),
    PanTo(LonLat),
    SetBounds(GeoBounds, FitOptions),
    SetZoom(f64),
    SetMapType(MapType),
    Resize(u32, u32),
    Subscribe(SurfaceEventKind),
    Unsubscribe(SubscriptionId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayRecord {
    Shape { points: Vec<LonLat>, style: Style },
    Marker { point: LonLat, image: Rc<MarkerImage>, size: u32, z: i32, visible: bool },
}

/// Test double that records every call and only emits injected events
#[derive(Default)]
pub struct RecordingSurface {
    pub ready: bool,
    pub zoom: f64,
    pub center: LonLat,
    pub calls: Vec<SurfaceCall>,
    pub overlays: BTreeMap<OverlayHandle, OverlayRecord>,
    subscriptions: HashMap<SubscriptionId, SurfaceEventKind>,
    queue: Vec<SurfaceEvent>,
    next_id: u64,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self {
            zoom: 12.0,
            ..Self::default()
        }
    }

    /// Queue an event as if the surface fired it
    pub fn emit(&mut self, event: SurfaceEvent) {
        if event == SurfaceEvent::Ready {
            self.ready = true;
        }
        if self.subscriptions.values().any(|k| *k == event.kind()) {
            self.queue.push(event);
        }
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn subscription_count(&self, kind: SurfaceEventKind) -> usize {
        self.subscriptions.values().filter(|k| **k == kind).count()
    }

    pub fn shape_count(&self) -> usize {
        self.overlays
            .values()
            .filter(|o| matches!(o, OverlayRecord::Shape { .. }))
            .count()
    }

    pub fn marker_count(&self) -> usize {
        self.overlays
            .values()
            .filter(|o| matches!(o, OverlayRecord::Marker { .. }))
            .count()
    }

    pub fn marker(&self, handle: OverlayHandle) -> Option<(&Rc<MarkerImage>, u32, i32, bool)> {
        match self.overlays.get(&handle)? {
            OverlayRecord::Marker { image, size, z, visible, .. } => Some((image, *size, *z, *visible)),
            OverlayRecord::Shape { .. } => None,
        }
    }

    pub fn count_calls(&self, pred: impl Fn(&SurfaceCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    fn next_handle(&mut self) -> OverlayHandle {
        self.next_id += 1;
        OverlayHandle(self.next_id)
    }
}

impl RenderSurface for RecordingSurface {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn create_boundary_shape(&mut self, points: &[LonLat], style: &Style) -> OverlayHandle {
        let handle = self.next_handle();
        self.overlays.insert(
            handle,
            OverlayRecord::Shape {
                points: points.to_vec(),
                style: style.clone(),
            },
        );
        self.calls.push(SurfaceCall::CreateShape(handle));
        handle
    }

    fn create_marker(&mut self, point: LonLat, image: Rc<MarkerImage>, size: u32) -> OverlayHandle {
        let handle = self.next_handle();
        self.overlays.insert(
            handle,
            OverlayRecord::Marker {
                point,
                image,
                size,
                z: 0,
                visible: true,
            },
        );
        self.calls.push(SurfaceCall::CreateMarker(handle));
        handle
    }

    fn remove(&mut self, handle: OverlayHandle) {
        self.overlays.remove(&handle);
        self.calls.push(SurfaceCall::Remove(handle));
    }

    fn set_option(&mut self, handle: OverlayHandle, option: OverlayOption) {
        if let Some(OverlayRecord::Marker { image, size, z, visible, .. }) = self.overlays.get_mut(&handle) {
            match &option {
                OverlayOption::Image(i) => *image = Rc::clone(i),
                OverlayOption::Size(s) => *size = *s,
                OverlayOption::ZIndex(v) => *z = *v,
                OverlayOption::Visible(v) => *visible = *v,
                _ => {}
            }
        }
        self.calls.push(SurfaceCall::SetOption(handle, option));
    }

    fn pan_to(&mut self, point: LonLat, _opts: TransitionOptions) {
        self.center = point;
        self.calls.push(SurfaceCall::PanTo(point));
    }

    fn set_bounds(&mut self, bounds: GeoBounds, opts: FitOptions) {
        self.center = bounds.center();
        self.calls.push(SurfaceCall::SetBounds(bounds, opts));
    }

    fn set_zoom(&mut self, level: f64, _opts: TransitionOptions) {
        self.zoom = level;
        self.calls.push(SurfaceCall::SetZoom(level));
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn center(&self) -> LonLat {
        self.center
    }

    fn set_map_type(&mut self, map_type: MapType) {
        self.calls.push(SurfaceCall::SetMapType(map_type));
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.calls.push(SurfaceCall::Resize(width, height));
    }

    fn subscribe(&mut self, kind: SurfaceEventKind) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscriptions.insert(id, kind);
        self.calls.push(SurfaceCall::Subscribe(kind));
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscriptions.remove(&id);
        self.calls.push(SurfaceCall::Unsubscribe(id));
    }

    fn drain_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.queue)
    }
}
