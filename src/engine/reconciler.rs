use crate::config::{MarkerConfig, ReconcilerConfig};
use crate::entity::{list_identity, EntityId, GeoEntity};
use crate::geo::GeoBounds;
use crate::style::{resolve_or_fallback, MarkerCache, Style, StyleResolver, VisualState};
use crate::surface::{OverlayHandle, OverlayOption, RenderSurface, SubscriptionId, SurfaceEventKind};
use std::collections::HashMap;
use tracing::{debug, info};

/// Surface objects backing one entity
#[derive(Debug, Clone)]
pub struct EntityOverlays {
    pub shape: OverlayHandle,
    pub marker: OverlayHandle,
    pub style: Style,
    pub bounds: GeoBounds,
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub shapes: usize,
    pub markers: usize,
    /// The list identity differs from the previous pass
    pub identity_changed: bool,
    /// Union of all rendered entities, `None` when nothing was rendered
    pub bounds: Option<GeoBounds>,
}

/// Sole owner of the overlay set on the surface.
///
/// Overlays are keyed by entity id, and every handle maps back to its entity
/// so surface events can be routed without comparing geometry.
pub struct OverlayReconciler {
    config: ReconcilerConfig,
    markers: MarkerConfig,
    overlays: HashMap<EntityId, EntityOverlays>,
    owners: HashMap<OverlayHandle, EntityId>,
    last_identity: Option<Vec<EntityId>>,
    zoom_subscription: Option<SubscriptionId>,
    markers_visible: bool,
}

impl OverlayReconciler {
    pub fn new(config: ReconcilerConfig, markers: MarkerConfig) -> Self {
        Self {
            config,
            markers,
            overlays: HashMap::new(),
            owners: HashMap::new(),
            last_identity: None,
            zoom_subscription: None,
            markers_visible: true,
        }
    }

    /// Identity of the list rendered by the last pass
    pub fn identity(&self) -> Option<&[EntityId]> {
        self.last_identity.as_deref()
    }

    /// Clear and rebuild every overlay for `entities`
    pub fn reconcile(
        &mut self,
        surface: &mut dyn RenderSurface,
        entities: &[GeoEntity],
        resolver: &dyn StyleResolver,
        cache: &mut MarkerCache,
    ) -> ReconcileOutcome {
        self.clear(surface);

        let mut bounds: Option<GeoBounds> = None;
        for entity in entities {
            let Some(boundary) = entity.renderable_boundary() else {
                continue;
            };
            let style = resolve_or_fallback(resolver, entity);

            let shape = surface.create_boundary_shape(boundary, &style);
            let image = cache.resolve(&style, VisualState::Normal, self.markers.normal_size);
            let marker = surface.create_marker(entity.centroid, image, self.markers.normal_size);
            surface.set_option(marker, OverlayOption::ZIndex(self.markers.base_z));

            let entity_bounds = entity.bounds();
            bounds = Some(match bounds {
                Some(b) => b.union(&entity_bounds),
                None => entity_bounds,
            });

            self.owners.insert(shape, entity.id.clone());
            self.owners.insert(marker, entity.id.clone());
            self.overlays.insert(
                entity.id.clone(),
                EntityOverlays {
                    shape,
                    marker,
                    style,
                    bounds: entity_bounds,
                },
            );
        }

        let identity = list_identity(entities);
        let identity_changed = self.last_identity.as_ref() != Some(&identity);
        self.last_identity = Some(identity);

        // Re-arm the zoom listener for the new overlay set
        if let Some(id) = self.zoom_subscription.take() {
            surface.unsubscribe(id);
        }
        self.zoom_subscription = Some(surface.subscribe(SurfaceEventKind::BoundsChanged));
        let zoom = surface.zoom();
        self.on_zoom_changed(surface, zoom);

        let count = self.overlays.len();
        info!(
            entities = entities.len(),
            rendered = count,
            skipped = entities.len() - count,
            identity_changed,
            "overlays reconciled"
        );

        ReconcileOutcome {
            shapes: count,
            markers: count,
            identity_changed,
            bounds,
        }
    }

    /// Show centroid markers at or below the hide threshold, hide them above
    pub fn on_zoom_changed(&mut self, surface: &mut dyn RenderSurface, zoom: f64) {
        let visible = zoom <= self.config.marker_hide_zoom;
        if visible == self.markers_visible {
            return;
        }
        debug!(zoom, visible, "toggling centroid markers");
        self.markers_visible = visible;
        for overlays in self.overlays.values() {
            surface.set_option(overlays.marker, OverlayOption::Visible(visible));
        }
    }

    /// Transient outline emphasis for a hovered shape, outside the marker cache
    pub fn set_shape_hover(&self, surface: &mut dyn RenderSurface, id: &EntityId, hovered: bool) -> bool {
        let Some(o) = self.overlays.get(id) else {
            return false;
        };
        let (stroke, opacity) = if hovered {
            (
                o.style.stroke_width + self.config.hover_stroke_boost,
                (o.style.fill_opacity + self.config.hover_fill_opacity_boost).min(1.0),
            )
        } else {
            (o.style.stroke_width, o.style.fill_opacity)
        };
        surface.set_option(o.shape, OverlayOption::StrokeWidth(stroke));
        surface.set_option(o.shape, OverlayOption::FillOpacity(opacity));
        true
    }

    /// Swap one centroid marker's imagery, size and stacking
    pub fn set_marker_state(
        &self,
        surface: &mut dyn RenderSurface,
        cache: &mut MarkerCache,
        id: &EntityId,
        state: VisualState,
        size: u32,
        z: i32,
    ) -> bool {
        let Some(o) = self.overlays.get(id) else {
            return false;
        };
        let image = cache.resolve(&o.style, state, size);
        surface.set_option(o.marker, OverlayOption::Image(image));
        surface.set_option(o.marker, OverlayOption::Size(size));
        surface.set_option(o.marker, OverlayOption::ZIndex(z));
        true
    }

    pub fn get(&self, id: &EntityId) -> Option<&EntityOverlays> {
        self.overlays.get(id)
    }

    /// Bounds of the entity's boundary shape
    pub fn shape_bounds(&self, id: &EntityId) -> Option<GeoBounds> {
        self.overlays.get(id).map(|o| o.bounds)
    }

    /// Entity that owns a surface overlay
    pub fn owner(&self, handle: OverlayHandle) -> Option<&EntityId> {
        self.owners.get(&handle)
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn markers_visible(&self) -> bool {
        self.markers_visible
    }

    /// Remove everything, including the zoom listener, and forget the identity
    pub fn teardown(&mut self, surface: &mut dyn RenderSurface) {
        self.clear(surface);
        if let Some(id) = self.zoom_subscription.take() {
            surface.unsubscribe(id);
        }
        self.last_identity = None;
    }

    fn clear(&mut self, surface: &mut dyn RenderSurface) {
        for (_, o) in self.overlays.drain() {
            surface.remove(o.shape);
            surface.remove(o.marker);
        }
        self.owners.clear();
        self.markers_visible = true;
    }
}
