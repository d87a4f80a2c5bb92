use super::camera::CameraAnimator;
use super::interaction::{InteractionState, SelectionChange};
use super::reconciler::OverlayReconciler;
use crate::config::EngineConfig;
use crate::entity::{list_identity, EntityId, GeoEntity};
use crate::style::{MarkerCache, StyleResolver};
use crate::surface::{MapType, RenderSurface, SubscriptionId, SurfaceEvent, SurfaceEventKind};
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tracing::{debug, info, trace};

/// Notifications for the host application
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    EntityClicked(GeoEntity),
    /// Hover moved on the map
    EntityHovered(Option<EntityId>),
    PanelVisibilityChanged(bool),
    /// Entities with at least one overlay on screen, sorted
    VisibleEntities(Vec<EntityId>),
}

const SURFACE_EVENTS: [SurfaceEventKind; 7] = [
    SurfaceEventKind::Ready,
    SurfaceEventKind::Click,
    SurfaceEventKind::MouseEnter,
    SurfaceEventKind::MouseLeave,
    SurfaceEventKind::ActionEnd,
    SurfaceEventKind::VisibleChanged,
    SurfaceEventKind::ContainerResized,
];

/// Keeps a rendering surface in sync with the entity list, selection,
/// hover and base layer.
///
/// Nothing is issued against the surface before it reports `Ready`; inputs
/// that arrive earlier are held and applied then. Surface events are pulled
/// in [`ViewportController::tick`], which also drives the camera's timers.
pub struct ViewportController<S: RenderSurface> {
    surface: S,
    config: EngineConfig,
    resolver: Box<dyn StyleResolver>,
    cache: MarkerCache,
    reconciler: OverlayReconciler,
    camera: CameraAnimator,
    interaction: InteractionState,
    entities: Vec<GeoEntity>,
    index: HashMap<EntityId, usize>,
    map_type: MapType,
    subscriptions: Vec<SubscriptionId>,
    ready: bool,
    pass_pending: bool,
    resize_pending: Option<(u32, u32, Instant)>,
    panel_open: bool,
    outbox: Vec<ControllerEvent>,
}

impl<S: RenderSurface> ViewportController<S> {
    pub fn new(mut surface: S, config: EngineConfig, resolver: Box<dyn StyleResolver>) -> Self {
        let subscriptions = SURFACE_EVENTS.iter().map(|kind| surface.subscribe(*kind)).collect();
        let ready = surface.is_ready();
        Self {
            cache: MarkerCache::new(config.markers.cache_capacity),
            reconciler: OverlayReconciler::new(config.reconciler.clone(), config.markers.clone()),
            camera: CameraAnimator::new(config.camera.clone()),
            interaction: InteractionState::new(config.markers.clone()),
            surface,
            config,
            resolver,
            entities: Vec::new(),
            index: HashMap::new(),
            map_type: MapType::default(),
            subscriptions,
            ready,
            pass_pending: false,
            resize_pending: None,
            panel_open: false,
            outbox: Vec::new(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_animating(&self) -> bool {
        self.camera.is_animating()
    }

    pub fn camera(&self) -> &CameraAnimator {
        &self.camera
    }

    pub fn reconciler(&self) -> &OverlayReconciler {
        &self.reconciler
    }

    pub fn cache(&self) -> &MarkerCache {
        &self.cache
    }

    pub fn entities(&self) -> &[GeoEntity] {
        &self.entities
    }

    pub fn entity(&self, id: &EntityId) -> Option<&GeoEntity> {
        self.index.get(id).map(|&i| &self.entities[i])
    }

    pub fn selected(&self) -> Option<&GeoEntity> {
        self.interaction.selected().and_then(|id| self.entity(id))
    }

    pub fn hovered(&self) -> Option<&EntityId> {
        self.interaction.hovered()
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open
    }

    pub fn map_type(&self) -> MapType {
        self.map_type
    }

    /// Width of the panel covering the right edge, in surface pixels
    pub fn set_panel_padding(&mut self, px: f64) {
        self.camera.set_panel_padding(px);
    }

    /// Replace the entity list. Overlays are only rebuilt when the list
    /// identity changed.
    pub fn set_entities(&mut self, entities: Vec<GeoEntity>, now: Instant) {
        self.index = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        self.entities = entities;

        let index = &self.index;
        if let Some(gone) = self.interaction.retain_selected(|id| index.contains_key(id)) {
            debug!(%gone, "selected entity left the list, clearing selection");
            self.set_panel(false);
        }

        if !self.ready {
            debug!(count = self.entities.len(), "surface not ready, deferring reconciliation");
            self.pass_pending = true;
            return;
        }
        if self.reconciler.identity() == Some(list_identity(&self.entities).as_slice()) {
            debug!("entity list identity unchanged, skipping reconciliation");
            return;
        }
        self.reconcile_pass(now);
    }

    /// New style rules: rebuild overlays, no camera fit for an unchanged list
    pub fn set_style_resolver(&mut self, resolver: Box<dyn StyleResolver>, now: Instant) {
        self.resolver = resolver;
        if self.ready {
            self.reconcile_pass(now);
        } else {
            self.pass_pending = true;
        }
    }

    /// Select an entity (or clear with `None`) and move the camera.
    ///
    /// Returns false when nothing changed: unknown id, same selection,
    /// surface not ready, or a camera transition still running.
    pub fn set_selected(&mut self, id: Option<EntityId>, now: Instant) -> bool {
        if !self.ready {
            return false;
        }
        if self.camera.is_animating() {
            debug!(?id, "selection ignored while camera is moving");
            return false;
        }
        if let Some(id) = &id {
            if !self.index.contains_key(id) {
                debug!(%id, "selection of unknown entity ignored");
                return false;
            }
        }

        let change = self
            .interaction
            .set_selected(&mut self.surface, &self.reconciler, &mut self.cache, id);
        match change {
            SelectionChange::Unchanged => false,
            SelectionChange::Selected { id, .. } => {
                let centroid = self.entities[self.index[&id]].centroid;
                let bounds = self.reconciler.shape_bounds(&id);
                self.camera.zoom_to_entity(&mut self.surface, bounds, centroid, now);
                self.set_panel(true);
                true
            }
            SelectionChange::Cleared { .. } => {
                self.camera.zoom_out(&mut self.surface, now);
                self.set_panel(false);
                true
            }
        }
    }

    pub fn set_hover(&mut self, id: Option<EntityId>) -> bool {
        if !self.ready {
            return false;
        }
        self.interaction
            .set_hover(&mut self.surface, &self.reconciler, &mut self.cache, id)
    }

    /// Switch the base layer; overlays are untouched
    pub fn set_map_type(&mut self, map_type: MapType) {
        if self.map_type == map_type {
            return;
        }
        self.map_type = map_type;
        if self.ready {
            self.surface.set_map_type(map_type);
        }
    }

    /// Animate back to the camera recorded at the first auto-fit
    pub fn reset_view(&mut self, now: Instant) -> bool {
        self.ready && self.camera.reset_view(&mut self.surface, now)
    }

    /// Pull surface events, run camera timers and the resize debounce
    pub fn tick(&mut self, now: Instant) {
        for event in self.surface.drain_events() {
            self.handle_event(event, now);
        }
        if !self.ready {
            return;
        }

        self.camera.tick(&mut self.surface, now);

        if let Some((width, height, due)) = self.resize_pending {
            if now >= due {
                debug!(width, height, "re-fitting surface to container");
                self.surface.resize(width, height);
                self.resize_pending = None;
            }
        }
    }

    pub fn drain_events(&mut self) -> Vec<ControllerEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Drop every subscription, overlay and cached image
    pub fn teardown(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.surface.unsubscribe(id);
        }
        self.reconciler.teardown(&mut self.surface);
        self.cache.clear();
        self.interaction.reset();
        self.entities.clear();
        self.index.clear();
        self.outbox.clear();
        self.resize_pending = None;
        self.pass_pending = false;
        self.ready = false;
        info!("viewport controller torn down");
    }

    fn handle_event(&mut self, event: SurfaceEvent, now: Instant) {
        match event {
            SurfaceEvent::Ready => self.on_ready(now),
            SurfaceEvent::Click { handle: Some(handle), .. } => {
                if self.camera.is_animating() {
                    debug!(?handle, "click ignored while camera is moving");
                    return;
                }
                let Some(id) = self.reconciler.owner(handle).cloned() else {
                    return;
                };
                if let Some(entity) = self.entity(&id) {
                    self.outbox.push(ControllerEvent::EntityClicked(entity.clone()));
                }
                self.set_selected(Some(id), now);
            }
            SurfaceEvent::Click { handle: None, at } => trace!(?at, "click on empty map"),
            SurfaceEvent::MouseEnter(handle) => {
                if let Some(id) = self.reconciler.owner(handle).cloned() {
                    if self.set_hover(Some(id.clone())) {
                        self.outbox.push(ControllerEvent::EntityHovered(Some(id)));
                    }
                }
            }
            SurfaceEvent::MouseLeave(handle) => {
                let owner = self.reconciler.owner(handle);
                if owner.is_some() && owner == self.interaction.hovered() && self.set_hover(None) {
                    self.outbox.push(ControllerEvent::EntityHovered(None));
                }
            }
            SurfaceEvent::BoundsChanged(camera) => {
                if self.ready {
                    self.reconciler.on_zoom_changed(&mut self.surface, camera.zoom);
                }
            }
            SurfaceEvent::ActionEnd => self.camera.on_action_end(&self.surface),
            SurfaceEvent::VisibleChanged(handles) => {
                let ids: BTreeSet<&EntityId> =
                    handles.iter().filter_map(|h| self.reconciler.owner(*h)).collect();
                let ids = ids.into_iter().cloned().collect();
                self.outbox.push(ControllerEvent::VisibleEntities(ids));
            }
            SurfaceEvent::ContainerResized { width, height } => {
                self.resize_pending = Some((width, height, now + self.config.controller.resize_debounce()));
            }
        }
    }

    fn on_ready(&mut self, now: Instant) {
        if self.ready {
            return;
        }
        self.ready = true;
        info!("rendering surface ready");
        if self.map_type != MapType::default() {
            self.surface.set_map_type(self.map_type);
        }
        if self.pass_pending {
            self.reconcile_pass(now);
        }
    }

    fn reconcile_pass(&mut self, now: Instant) {
        self.pass_pending = false;
        // Rebuilt overlays never see the pointer leave the old ones
        if self.interaction.clear_hover().is_some() {
            self.outbox.push(ControllerEvent::EntityHovered(None));
        }
        let outcome = self.reconciler.reconcile(
            &mut self.surface,
            &self.entities,
            self.resolver.as_ref(),
            &mut self.cache,
        );
        self.interaction
            .reapply(&mut self.surface, &self.reconciler, &mut self.cache);

        if !outcome.identity_changed {
            return;
        }
        // Check and fit without yielding in between
        match outcome.bounds {
            None => debug!("no renderable entities, skipping camera fit"),
            Some(_) if self.interaction.selected().is_some() => {
                debug!("selection active, skipping camera fit")
            }
            Some(_) if self.camera.is_animating() => debug!("camera busy, skipping camera fit"),
            Some(bounds) => {
                self.camera.fit_all(&mut self.surface, bounds, now);
            }
        }
    }

    fn set_panel(&mut self, open: bool) {
        if self.panel_open != open {
            self.panel_open = open;
            self.outbox.push(ControllerEvent::PanelVisibilityChanged(open));
        }
    }
}
