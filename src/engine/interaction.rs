use super::reconciler::OverlayReconciler;
use crate::config::MarkerConfig;
use crate::entity::EntityId;
use crate::style::{MarkerCache, VisualState};
use crate::surface::RenderSurface;
use tracing::trace;

/// Outcome of a selection update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    Unchanged,
    Selected {
        id: EntityId,
        previous: Option<EntityId>,
    },
    Cleared {
        previous: EntityId,
    },
}

/// Hover and selection, applied as per-overlay patches.
///
/// Only the overlays of the entities whose emphasis changed are touched.
pub struct InteractionState {
    markers: MarkerConfig,
    hovered: Option<EntityId>,
    selected: Option<EntityId>,
}

impl InteractionState {
    pub fn new(markers: MarkerConfig) -> Self {
        Self {
            markers,
            hovered: None,
            selected: None,
        }
    }

    pub fn hovered(&self) -> Option<&EntityId> {
        self.hovered.as_ref()
    }

    pub fn selected(&self) -> Option<&EntityId> {
        self.selected.as_ref()
    }

    /// Visual state, size and z-index for an entity's marker.
    /// Selection wins; hover on a selected marker only lifts it one level.
    pub fn emphasis(&self, id: &EntityId) -> (VisualState, u32, i32) {
        let hovered = self.hovered.as_ref() == Some(id);
        let selected = self.selected.as_ref() == Some(id);
        let m = &self.markers;
        match (selected, hovered) {
            (true, true) => (VisualState::Selected, m.selected_size, m.selected_z + 1),
            (true, false) => (VisualState::Selected, m.selected_size, m.selected_z),
            (false, true) => (VisualState::Hover, m.hover_size, m.base_z + 1),
            (false, false) => (VisualState::Normal, m.normal_size, m.base_z),
        }
    }

    pub fn set_hover(
        &mut self,
        surface: &mut dyn RenderSurface,
        reconciler: &OverlayReconciler,
        cache: &mut MarkerCache,
        id: Option<EntityId>,
    ) -> bool {
        if self.hovered == id {
            return false;
        }
        let previous = std::mem::replace(&mut self.hovered, id);
        trace!(?previous, hovered = ?self.hovered, "hover changed");

        if let Some(prev) = &previous {
            reconciler.set_shape_hover(surface, prev, false);
            self.patch_marker(surface, reconciler, cache, prev);
        }
        if let Some(next) = self.hovered.clone() {
            reconciler.set_shape_hover(surface, &next, true);
            self.patch_marker(surface, reconciler, cache, &next);
        }
        true
    }

    pub fn set_selected(
        &mut self,
        surface: &mut dyn RenderSurface,
        reconciler: &OverlayReconciler,
        cache: &mut MarkerCache,
        id: Option<EntityId>,
    ) -> SelectionChange {
        if self.selected == id {
            return SelectionChange::Unchanged;
        }
        let previous = std::mem::replace(&mut self.selected, id);

        if let Some(prev) = &previous {
            self.patch_marker(surface, reconciler, cache, prev);
        }
        match (self.selected.clone(), previous) {
            (Some(next), previous) => {
                self.patch_marker(surface, reconciler, cache, &next);
                SelectionChange::Selected { id: next, previous }
            }
            (None, Some(previous)) => SelectionChange::Cleared { previous },
            (None, None) => SelectionChange::Unchanged,
        }
    }

    /// Restore emphasis after the overlays were rebuilt
    pub fn reapply(&self, surface: &mut dyn RenderSurface, reconciler: &OverlayReconciler, cache: &mut MarkerCache) {
        if let Some(id) = &self.hovered {
            reconciler.set_shape_hover(surface, id, true);
            self.patch_marker(surface, reconciler, cache, id);
        }
        if let Some(id) = &self.selected {
            if self.hovered.as_ref() != Some(id) {
                self.patch_marker(surface, reconciler, cache, id);
            }
        }
    }

    /// Drop the hover without patching; its overlays are about to be rebuilt
    pub fn clear_hover(&mut self) -> Option<EntityId> {
        self.hovered.take()
    }

    /// Drop the selection if `keep` rejects it, without patching
    pub fn retain_selected(&mut self, keep: impl Fn(&EntityId) -> bool) -> Option<EntityId> {
        match &self.selected {
            Some(id) if !keep(id) => self.selected.take(),
            _ => None,
        }
    }

    /// Forget hover and selection without touching overlays
    pub fn reset(&mut self) {
        self.hovered = None;
        self.selected = None;
    }

    fn patch_marker(
        &self,
        surface: &mut dyn RenderSurface,
        reconciler: &OverlayReconciler,
        cache: &mut MarkerCache,
        id: &EntityId,
    ) {
        let (state, size, z) = self.emphasis(id);
        reconciler.set_marker_state(surface, cache, id, state, size, z);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconcilerConfig;
    use crate::entity::GeoEntity;
    use crate::geo::LonLat;
    use crate::style::StyleConfig;
    use crate::surface::recording::{RecordingSurface, SurfaceCall};
    use crate::surface::OverlayHandle;
    use std::rc::Rc;

    struct Fixture {
        surface: RecordingSurface,
        reconciler: OverlayReconciler,
        cache: MarkerCache,
        state: InteractionState,
    }

    fn fixture() -> Fixture {
        let mut surface = RecordingSurface::new();
        let mut cache = MarkerCache::default();
        let mut reconciler = OverlayReconciler::new(ReconcilerConfig::default(), MarkerConfig::default());
        let entities: Vec<GeoEntity> = ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let x = i as f64 * 0.01;
                GeoEntity::new(*id, LonLat::new(x, 0.0), "premium").with_boundary(vec![
                    LonLat::new(x, 0.0),
                    LonLat::new(x + 0.001, 0.0),
                    LonLat::new(x, 0.001),
                ])
            })
            .collect();
        reconciler.reconcile(&mut surface, &entities, &StyleConfig::builtin(), &mut cache);
        surface.clear_calls();
        Fixture {
            surface,
            reconciler,
            cache,
            state: InteractionState::new(MarkerConfig::default()),
        }
    }

    fn marker(f: &Fixture, id: &str) -> OverlayHandle {
        f.reconciler.get(&EntityId::from(id)).unwrap().marker
    }

    fn touched(f: &Fixture) -> Vec<OverlayHandle> {
        let mut handles: Vec<OverlayHandle> = f
            .surface
            .calls
            .iter()
            .filter_map(|c| match c {
                SurfaceCall::SetOption(h, _) => Some(*h),
                _ => None,
            })
            .collect();
        handles.sort_unstable();
        handles.dedup();
        handles
    }

    #[test]
    fn test_hover_swap_touches_only_two_entities() {
        let mut f = fixture();
        let normal = Rc::clone(f.surface.marker(marker(&f, "a")).unwrap().0);

        f.state
            .set_hover(&mut f.surface, &f.reconciler, &mut f.cache, Some(EntityId::from("a")));
        let (image, size, _, _) = f.surface.marker(marker(&f, "a")).unwrap();
        assert_eq!(size, 8);
        assert!(!Rc::ptr_eq(image, &normal));

        f.surface.clear_calls();
        f.state
            .set_hover(&mut f.surface, &f.reconciler, &mut f.cache, Some(EntityId::from("b")));

        let (image, size, z, _) = f.surface.marker(marker(&f, "a")).unwrap();
        assert!(Rc::ptr_eq(image, &normal));
        assert_eq!((size, z), (6, 10));
        let (_, size, z, _) = f.surface.marker(marker(&f, "b")).unwrap();
        assert_eq!((size, z), (8, 11));

        let a = f.reconciler.get(&EntityId::from("a")).unwrap().clone();
        let b = f.reconciler.get(&EntityId::from("b")).unwrap().clone();
        let mut expected = vec![a.shape, a.marker, b.shape, b.marker];
        expected.sort_unstable();
        assert_eq!(touched(&f), expected);
    }

    #[test]
    fn test_same_hover_is_noop() {
        let mut f = fixture();
        let id = Some(EntityId::from("a"));
        assert!(f.state.set_hover(&mut f.surface, &f.reconciler, &mut f.cache, id.clone()));
        f.surface.clear_calls();
        assert!(!f.state.set_hover(&mut f.surface, &f.reconciler, &mut f.cache, id));
        assert!(f.surface.calls.is_empty());
    }

    #[test]
    fn test_selection_emphasis_and_clear() {
        let mut f = fixture();
        let change = f
            .state
            .set_selected(&mut f.surface, &f.reconciler, &mut f.cache, Some(EntityId::from("c")));
        assert_eq!(
            change,
            SelectionChange::Selected {
                id: EntityId::from("c"),
                previous: None
            }
        );
        let (image, size, z, _) = f.surface.marker(marker(&f, "c")).unwrap();
        assert_eq!((size, z), (10, 1000));
        assert_eq!(image.fingerprint.split('|').nth(4), Some("selected"));

        let change = f.state.set_selected(&mut f.surface, &f.reconciler, &mut f.cache, None);
        assert_eq!(
            change,
            SelectionChange::Cleared {
                previous: EntityId::from("c")
            }
        );
        let (_, size, z, _) = f.surface.marker(marker(&f, "c")).unwrap();
        assert_eq!((size, z), (6, 10));
    }

    #[test]
    fn test_hovering_selected_keeps_selected_imagery() {
        let mut f = fixture();
        let id = EntityId::from("a");
        f.state
            .set_selected(&mut f.surface, &f.reconciler, &mut f.cache, Some(id.clone()));
        f.state
            .set_hover(&mut f.surface, &f.reconciler, &mut f.cache, Some(id.clone()));
        assert_eq!(f.state.emphasis(&id), (VisualState::Selected, 10, 1001));

        f.state.set_hover(&mut f.surface, &f.reconciler, &mut f.cache, None);
        let (_, size, z, _) = f.surface.marker(marker(&f, "a")).unwrap();
        assert_eq!((size, z), (10, 1000));
    }

    #[test]
    fn test_retain_selected_drops_missing_entity() {
        let mut f = fixture();
        f.state
            .set_selected(&mut f.surface, &f.reconciler, &mut f.cache, Some(EntityId::from("b")));
        f.surface.clear_calls();

        assert_eq!(f.state.retain_selected(|id| id.as_str() == "b"), None);
        assert_eq!(f.state.retain_selected(|id| id.as_str() == "a"), Some(EntityId::from("b")));
        assert_eq!(f.state.selected(), None);
        assert!(f.surface.calls.is_empty());
    }

    #[test]
    fn test_reapply_after_rebuild() {
        let mut f = fixture();
        f.state
            .set_selected(&mut f.surface, &f.reconciler, &mut f.cache, Some(EntityId::from("b")));

        let entities: Vec<GeoEntity> = vec![GeoEntity::new("b", LonLat::new(0.01, 0.0), "premium")
            .with_boundary(vec![
                LonLat::new(0.01, 0.0),
                LonLat::new(0.011, 0.0),
                LonLat::new(0.01, 0.001),
            ])];
        f.reconciler
            .reconcile(&mut f.surface, &entities, &StyleConfig::builtin(), &mut f.cache);
        f.state.reapply(&mut f.surface, &f.reconciler, &mut f.cache);

        let (_, size, z, _) = f.surface.marker(marker(&f, "b")).unwrap();
        assert_eq!((size, z), (10, 1000));
    }
}
