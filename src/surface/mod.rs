//! The imperative rendering-surface boundary.
//!
//! The engine never draws anything itself. It creates, mutates and removes
//! overlays and requests camera transitions through [`RenderSurface`], and it
//! learns about the outcome later through queued [`SurfaceEvent`]s. All calls
//! return immediately; completion arrives as an `ActionEnd` event.

pub mod terminal;

#[cfg(test)]
pub mod recording;

pub use terminal::TerminalSurface;

use crate::geo::{GeoBounds, LonLat};
use crate::map::CameraState;
use crate::style::{MarkerImage, Style};
use std::rc::Rc;
use std::time::Duration;

/// Opaque reference to an overlay owned by the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Base layer mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapType {
    #[default]
    Roadmap,
    Satellite,
}

impl MapType {
    pub fn toggled(self) -> Self {
        match self {
            MapType::Roadmap => MapType::Satellite,
            MapType::Satellite => MapType::Roadmap,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MapType::Roadmap => "roadmap",
            MapType::Satellite => "satellite",
        }
    }
}

/// Per-side margin in surface pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Padding {
    pub fn uniform(px: f64) -> Self {
        Self {
            top: px,
            right: px,
            bottom: px,
            left: px,
        }
    }

    pub fn with_right(mut self, px: f64) -> Self {
        self.right = px;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionOptions {
    pub duration: Duration,
}

impl TransitionOptions {
    pub fn animated(duration: Duration) -> Self {
        Self { duration }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub padding: Padding,
    pub duration: Duration,
    pub max_zoom: f64,
}

/// Mutable presentation properties of an overlay
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayOption {
    Visible(bool),
    StrokeWidth(f64),
    FillOpacity(f64),
    Image(Rc<MarkerImage>),
    Size(u32),
    ZIndex(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceEventKind {
    Ready,
    Click,
    MouseEnter,
    MouseLeave,
    BoundsChanged,
    ActionEnd,
    VisibleChanged,
    ContainerResized,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Ready,
    /// `handle` is the topmost overlay under the pointer, if any
    Click {
        handle: Option<OverlayHandle>,
        at: LonLat,
    },
    MouseEnter(OverlayHandle),
    MouseLeave(OverlayHandle),
    BoundsChanged(CameraState),
    /// A camera transition finished
    ActionEnd,
    /// Overlays actually on screen after culling
    VisibleChanged(Vec<OverlayHandle>),
    ContainerResized {
        width: u32,
        height: u32,
    },
}

impl SurfaceEvent {
    pub fn kind(&self) -> SurfaceEventKind {
        match self {
            SurfaceEvent::Ready => SurfaceEventKind::Ready,
            SurfaceEvent::Click { .. } => SurfaceEventKind::Click,
            SurfaceEvent::MouseEnter(_) => SurfaceEventKind::MouseEnter,
            SurfaceEvent::MouseLeave(_) => SurfaceEventKind::MouseLeave,
            SurfaceEvent::BoundsChanged(_) => SurfaceEventKind::BoundsChanged,
            SurfaceEvent::ActionEnd => SurfaceEventKind::ActionEnd,
            SurfaceEvent::VisibleChanged(_) => SurfaceEventKind::VisibleChanged,
            SurfaceEvent::ContainerResized { .. } => SurfaceEventKind::ContainerResized,
        }
    }
}

/// Imperative map rendering surface driven by the engine
pub trait RenderSurface {
    fn is_ready(&self) -> bool;

    fn create_boundary_shape(&mut self, points: &[LonLat], style: &Style) -> OverlayHandle;
    fn create_marker(&mut self, point: LonLat, image: Rc<MarkerImage>, size: u32) -> OverlayHandle;
    fn remove(&mut self, handle: OverlayHandle);
    fn set_option(&mut self, handle: OverlayHandle, option: OverlayOption);

    fn pan_to(&mut self, point: LonLat, opts: TransitionOptions);
    fn set_bounds(&mut self, bounds: GeoBounds, opts: FitOptions);
    fn set_zoom(&mut self, level: f64, opts: TransitionOptions);
    fn zoom(&self) -> f64;
    fn center(&self) -> LonLat;

    fn set_map_type(&mut self, map_type: MapType);
    /// Re-fit the drawing area to its container, in pixels
    fn resize(&mut self, width: u32, height: u32);

    fn subscribe(&mut self, kind: SurfaceEventKind) -> SubscriptionId;
    fn unsubscribe(&mut self, id: SubscriptionId);
    /// Queued events for live subscriptions, oldest first
    fn drain_events(&mut self) -> Vec<SurfaceEvent>;
}
