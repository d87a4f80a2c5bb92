use crate::config::CameraConfig;
use crate::geo::{GeoBounds, LonLat};
use crate::map::CameraState;
use crate::surface::{FitOptions, Padding, RenderSurface, TransitionOptions};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where the single in-flight camera transition stands
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraPhase {
    Idle,
    /// Pan issued. With a `target_zoom`, the zoom follows at `zoom_at`
    /// and the pan's own `ActionEnd` does not release the guard.
    Panning {
        target_zoom: Option<f64>,
        zoom_at: Instant,
    },
    Zooming,
    Fitting {
        record_baseline: bool,
    },
}

/// Target zoom for a bounds fit, floored to an integer level.
///
/// `min(log2(360 / lng / 1.5), log2(180 / lat / 1.5), max_zoom)`
pub fn target_zoom(lat_delta: f64, lng_delta: f64, max_zoom: f64) -> f64 {
    let by_lng = (360.0 / lng_delta / 1.5).log2();
    let by_lat = (180.0 / lat_delta / 1.5).log2();
    by_lng.min(by_lat).min(max_zoom).floor()
}

/// Issues camera transitions, at most one at a time.
///
/// Every request is rejected while the guard is held. The guard drops on the
/// `ActionEnd` that finishes the transition, or after `guard_timeout` if the
/// surface never sends one.
pub struct CameraAnimator {
    config: CameraConfig,
    phase: CameraPhase,
    guard_since: Option<Instant>,
    baseline: Option<CameraState>,
}

impl CameraAnimator {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            phase: CameraPhase::Idle,
            guard_since: None,
            baseline: None,
        }
    }

    pub fn phase(&self) -> CameraPhase {
        self.phase
    }

    pub fn is_animating(&self) -> bool {
        self.phase != CameraPhase::Idle
    }

    /// Camera recorded at the end of the first auto-fit
    pub fn baseline(&self) -> Option<CameraState> {
        self.baseline
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Right-hand margin for the attributes panel
    pub fn set_panel_padding(&mut self, px: f64) {
        self.config.panel_padding_px = px;
    }

    pub fn pan_to(&mut self, surface: &mut dyn RenderSurface, point: LonLat, now: Instant) -> bool {
        if !self.acquire("pan", now) {
            return false;
        }
        surface.pan_to(point, TransitionOptions::animated(self.config.pan_duration()));
        self.phase = CameraPhase::Panning {
            target_zoom: None,
            zoom_at: now,
        };
        true
    }

    pub fn zoom_to_bounds(
        &mut self,
        surface: &mut dyn RenderSurface,
        bounds: GeoBounds,
        padding: Padding,
        duration: Duration,
        now: Instant,
    ) -> bool {
        self.fit(surface, bounds, padding, duration, false, now)
    }

    /// Fit the whole entity set; the first completed fit becomes the baseline
    pub fn fit_all(&mut self, surface: &mut dyn RenderSurface, bounds: GeoBounds, now: Instant) -> bool {
        let record_baseline = self.baseline.is_none();
        let padding = Padding::uniform(self.config.fit_padding_px);
        let duration = self.config.fit_duration();
        let accepted = self.fit(surface, bounds, padding, duration, record_baseline, now);
        if accepted {
            info!(record_baseline, "fitting camera to entity bounds");
        }
        accepted
    }

    /// Bring a selected entity into view.
    ///
    /// `bounds` come from the entity's boundary shape; point-only entities
    /// pass `None` and get a plain pan to `centroid`.
    pub fn zoom_to_entity(
        &mut self,
        surface: &mut dyn RenderSurface,
        bounds: Option<GeoBounds>,
        centroid: LonLat,
        now: Instant,
    ) -> bool {
        let Some(bounds) = bounds else {
            return self.pan_to(surface, centroid, now);
        };

        if !self.config.two_phase_selection {
            let pad = self.config.fit_padding_px;
            let padding = Padding::uniform(pad).with_right(pad + self.config.panel_padding_px);
            let duration = self.config.zoom_duration();
            return self.fit(surface, bounds, padding, duration, false, now);
        }

        if !self.acquire("zoom to entity", now) {
            return false;
        }
        let zoom = target_zoom(bounds.lat_delta(), bounds.lon_delta(), self.config.max_zoom);
        let pan = self.config.pan_duration();
        surface.pan_to(bounds.center(), TransitionOptions::animated(pan));
        self.phase = CameraPhase::Panning {
            target_zoom: Some(zoom),
            zoom_at: now + pan,
        };
        debug!(zoom, "pan issued, zoom scheduled");
        true
    }

    /// Step back out by `zoom_out_step`, never below `min_zoom`
    pub fn zoom_out(&mut self, surface: &mut dyn RenderSurface, now: Instant) -> bool {
        let current = surface.zoom();
        if current <= self.config.min_zoom {
            debug!(current, "already at minimum zoom");
            return false;
        }
        if !self.acquire("zoom out", now) {
            return false;
        }
        let level = (current - self.config.zoom_out_step).max(self.config.min_zoom);
        surface.set_zoom(level, TransitionOptions::animated(self.config.zoom_duration()));
        self.phase = CameraPhase::Zooming;
        true
    }

    /// Return to the baseline: pan to its center then zoom to its level
    pub fn reset_view(&mut self, surface: &mut dyn RenderSurface, now: Instant) -> bool {
        let Some(baseline) = self.baseline else {
            debug!("no baseline recorded yet");
            return false;
        };
        if !self.acquire("reset view", now) {
            return false;
        }
        let pan = self.config.pan_duration();
        surface.pan_to(baseline.center, TransitionOptions::animated(pan));
        self.phase = CameraPhase::Panning {
            target_zoom: Some(baseline.zoom),
            zoom_at: now + pan,
        };
        true
    }

    /// Completion of a surface transition. Stray or repeated events are no-ops.
    pub fn on_action_end(&mut self, surface: &dyn RenderSurface) {
        match self.phase {
            CameraPhase::Idle => debug!("stray action end"),
            CameraPhase::Panning {
                target_zoom: Some(_), ..
            } => debug!("pan settled, waiting for scheduled zoom"),
            CameraPhase::Fitting { record_baseline } => {
                if record_baseline && self.baseline.is_none() {
                    let camera = CameraState::new(surface.center(), surface.zoom());
                    info!(zoom = camera.zoom, "baseline view recorded");
                    self.baseline = Some(camera);
                }
                self.release();
            }
            CameraPhase::Panning { target_zoom: None, .. } | CameraPhase::Zooming => self.release(),
        }
    }

    /// Issue the scheduled zoom and expire a stuck guard
    pub fn tick(&mut self, surface: &mut dyn RenderSurface, now: Instant) {
        if let CameraPhase::Panning {
            target_zoom: Some(zoom),
            zoom_at,
        } = self.phase
        {
            if now >= zoom_at {
                surface.set_zoom(zoom, TransitionOptions::animated(self.config.zoom_duration()));
                self.phase = CameraPhase::Zooming;
                self.guard_since = Some(now);
                return;
            }
        }

        if let Some(since) = self.guard_since {
            if now.saturating_duration_since(since) >= self.config.guard_timeout() {
                warn!(phase = ?self.phase, "no action end received, releasing camera guard");
                self.release();
            }
        }
    }

    fn fit(
        &mut self,
        surface: &mut dyn RenderSurface,
        bounds: GeoBounds,
        padding: Padding,
        duration: Duration,
        record_baseline: bool,
        now: Instant,
    ) -> bool {
        if !self.acquire("bounds fit", now) {
            return false;
        }
        let opts = FitOptions {
            padding,
            duration,
            max_zoom: self.config.max_zoom,
        };
        surface.set_bounds(bounds, opts);
        self.phase = CameraPhase::Fitting { record_baseline };
        true
    }

    fn acquire(&mut self, what: &str, now: Instant) -> bool {
        if self.is_animating() {
            debug!(request = what, phase = ?self.phase, "transition rejected, camera busy");
            return false;
        }
        self.guard_since = Some(now);
        true
    }

    fn release(&mut self) {
        self.phase = CameraPhase::Idle;
        self.guard_since = None;
    }
}
