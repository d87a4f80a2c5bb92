//! Viewport synchronization: overlays, camera transitions and interaction
//! emphasis driven against a [`RenderSurface`](crate::surface::RenderSurface).

pub mod camera;
pub mod controller;
pub mod interaction;
pub mod reconciler;

pub use camera::{target_zoom, CameraAnimator, CameraPhase};
pub use controller::{ControllerEvent, ViewportController};
pub use interaction::{InteractionState, SelectionChange};
pub use reconciler::{EntityOverlays, OverlayReconciler, ReconcileOutcome};
