//! Rotation/zoom state machine behind the globe.
//!
//! The engine owns the view transform, the selection and the single running
//! transition. The host feeds it [`InputEvent`]s and elapsed time; it never
//! touches a terminal, so every transition can be driven from tests.

use geo::MultiPolygon;
use std::time::Duration;

use crate::{
    animation::{Scheduler, Tween},
    matcher::EnrichedFeature,
    projection::{Projection, Rotation, ViewTransform, Viewport, ZoomTransform, wrap_longitude},
    selection::Selection,
};

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Idle spin in degrees per second.
    pub rotation_speed: f64,
    /// Degrees of rotation per unit of pointer travel.
    pub drag_sensitivity: f64,
    pub center_duration: Duration,
    pub fit_duration: Duration,
    pub reset_duration: Duration,
    /// Scale range for zoom-to-selection.
    pub fit_scale_extent: (f64, f64),
    /// Scale range for wheel zoom.
    pub wheel_scale_extent: (f64, f64),
    /// Log-scale zoom per wheel notch.
    pub wheel_step: f64,
    /// Share of the viewport a fitted country may fill.
    pub fit_padding: f64,
    /// Pointer travel below which a press counts as a click.
    pub click_slop: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rotation_speed: 6.25,
            drag_sensitivity: 0.5,
            center_duration: Duration::from_millis(1000),
            fit_duration: Duration::from_millis(750),
            reset_duration: Duration::from_millis(750),
            fit_scale_extent: (1.0, 8.0),
            wheel_scale_extent: (0.5, 8.0),
            wheel_step: 0.2,
            fit_padding: 0.9,
            click_slop: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    IdleRotating,
    Dragging,
    TransitioningToSelection,
    Selected,
    TransitioningToReset,
}

impl EngineState {
    pub fn label(self) -> &'static str {
        match self {
            EngineState::IdleRotating => "spinning",
            EngineState::Dragging => "dragging",
            EngineState::TransitioningToSelection => "centering",
            EngineState::Selected => "selected",
            EngineState::TransitioningToReset => "resetting",
        }
    }
}

/// Host input in viewport units (origin top left, y down).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    /// Positive `delta` zooms out.
    Wheel { x: f64, y: f64, delta: f64 },
    Resize { width: f64, height: f64 },
    Reset,
    CloseSelection,
}

#[derive(Debug)]
enum Transition {
    /// Turn the globe until the focus geometry is centered, then fit it.
    Center { tween: Tween<Rotation>, focus: MultiPolygon<f64> },
    Fit { tween: Tween<ZoomTransform> },
    Reset { tween: Tween<ZoomTransform> },
}

#[derive(Clone, Copy, Debug)]
struct Drag {
    origin: (f64, f64),
    last: (f64, f64),
    moved: bool,
}

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    state: EngineState,
    view: ViewTransform,
    viewport: Viewport,
    scheduler: Scheduler<Transition>,
    selection: Selection,
    drag: Option<Drag>,
    hovered: Option<usize>,
    revision: u64,
}

impl Engine {
    pub fn new(config: EngineConfig, viewport: Viewport) -> Self {
        Self {
            config,
            state: EngineState::IdleRotating,
            view: ViewTransform::default(),
            viewport,
            scheduler: Scheduler::default(),
            selection: Selection::default(),
            drag: None,
            hovered: None,
            revision: 0,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn view(&self) -> ViewTransform {
        self.view
    }

    /// Projection for the current frame.
    pub fn projection(&self) -> Projection {
        Projection::new(self.viewport, self.view)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    /// Bumped on every change that moves geometry on screen.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    fn resting_state(&self) -> EngineState {
        if self.selection.is_empty() { EngineState::IdleRotating } else { EngineState::Selected }
    }

    /// Advances time-based motion by `dt`.
    pub fn tick(&mut self, dt: Duration) {
        match self.state {
            EngineState::IdleRotating => {
                if self.config.rotation_speed != 0.0 {
                    let lambda = self.view.rotation.lambda + self.config.rotation_speed * dt.as_secs_f64();
                    self.view.rotation.lambda = wrap_longitude(lambda);
                    self.touch();
                }
            }
            EngineState::TransitioningToSelection | EngineState::TransitioningToReset => {
                self.step_transition(dt)
            }
            EngineState::Dragging | EngineState::Selected => {}
        }
    }

    fn step_transition(&mut self, dt: Duration) {
        let Some(mut task) = self.scheduler.take() else {
            self.state = self.resting_state();
            return;
        };
        match &mut task {
            Transition::Center { tween, focus } => {
                let (rotation, done) = tween.advance(dt);
                self.view.rotation = rotation.normalized();
                self.touch();
                if done {
                    let target = self.fit_zoom(focus);
                    self.scheduler.start(Transition::Fit {
                        tween: Tween::new(self.view.zoom, target, self.config.fit_duration),
                    });
                    return;
                }
            }
            Transition::Fit { tween } => {
                let (zoom, done) = tween.advance(dt);
                self.view.zoom = zoom;
                self.touch();
                if done {
                    self.state = EngineState::Selected;
                    return;
                }
            }
            Transition::Reset { tween } => {
                let (zoom, done) = tween.advance(dt);
                self.view.zoom = zoom;
                self.touch();
                if done {
                    self.selection.clear();
                    self.state = EngineState::IdleRotating;
                    return;
                }
            }
        }
        self.scheduler.resume(task);
    }

    pub fn handle_event(&mut self, event: InputEvent, features: &[EnrichedFeature]) {
        match event {
            InputEvent::PointerDown { x, y } => {
                if self.scheduler.cancel().is_some() {
                    tracing::debug!(state = ?self.state, "transition cancelled by drag");
                }
                self.drag = Some(Drag { origin: (x, y), last: (x, y), moved: false });
                self.state = EngineState::Dragging;
            }
            InputEvent::PointerMove { x, y } => match self.drag {
                Some(ref mut drag) => {
                    let (dx, dy) = (x - drag.last.0, y - drag.last.1);
                    drag.last = (x, y);
                    if (x - drag.origin.0).hypot(y - drag.origin.1) >= self.config.click_slop {
                        drag.moved = true;
                    }
                    let s = self.config.drag_sensitivity;
                    let r = self.view.rotation;
                    self.view.rotation = Rotation {
                        lambda: wrap_longitude(r.lambda + dx * s),
                        phi: (r.phi - dy * s).clamp(-90.0, 90.0),
                    };
                    self.touch();
                }
                None => {
                    let hovered = self.pick((x, y), features);
                    if hovered != self.hovered {
                        self.hovered = hovered;
                        self.touch();
                    }
                }
            },
            InputEvent::PointerUp { x, y } => {
                let Some(drag) = self.drag.take() else { return };
                self.state = self.resting_state();
                if !drag.moved {
                    if let Some(index) = self.pick((x, y), features) {
                        self.select_feature(index, features);
                    }
                }
            }
            InputEvent::Wheel { x, y, delta } => {
                if matches!(
                    self.state,
                    EngineState::TransitioningToSelection | EngineState::TransitioningToReset
                ) {
                    return;
                }
                let factor = (-delta * self.config.wheel_step).exp();
                self.view.zoom = self.view.zoom.zoomed_at(factor, (x, y), self.config.wheel_scale_extent);
                self.touch();
            }
            InputEvent::Resize { width, height } => {
                self.viewport = Viewport::new(width, height);
                self.touch();
            }
            InputEvent::Reset | InputEvent::CloseSelection => self.start_reset(),
        }
    }

    /// Index of the feature under a screen point, if any.
    pub fn pick(&self, point: (f64, f64), features: &[EnrichedFeature]) -> Option<usize> {
        let (lon, lat) = self.projection().invert(point.0, point.1)?;
        features.iter().position(|f| f.feature.contains(lon, lat))
    }

    /// Selects a matched feature and starts centering on it. Features with
    /// no statistics are ignored.
    pub fn select_feature(&mut self, index: usize, features: &[EnrichedFeature]) {
        let Some(feature) = features.get(index) else { return };
        let Some(record) = feature.record else { return };
        let Some(centroid) = feature.feature.centroid() else { return };

        self.drag = None;
        self.selection.select(record);
        let target = Rotation::centering(centroid.x(), centroid.y());
        let task = if target.approx_eq(self.view.rotation) {
            let fit = self.fit_zoom(&feature.feature.focus);
            Transition::Fit { tween: Tween::new(self.view.zoom, fit, self.config.fit_duration) }
        } else {
            Transition::Center {
                tween: Tween::rotation(self.view.rotation, target, self.config.center_duration),
                focus: feature.feature.focus.clone(),
            }
        };
        tracing::debug!(feature = %feature.feature.name, ?target, "centering on selection");
        self.scheduler.start(task);
        self.state = EngineState::TransitioningToSelection;
    }

    fn start_reset(&mut self) {
        self.drag = None;
        if self.selection.is_empty() && self.view.zoom == ZoomTransform::IDENTITY {
            self.scheduler.cancel();
            self.state = EngineState::IdleRotating;
            return;
        }
        self.scheduler.start(Transition::Reset {
            tween: Tween::new(self.view.zoom, ZoomTransform::IDENTITY, self.config.reset_duration),
        });
        self.state = EngineState::TransitioningToReset;
    }

    /// Zoom that frames `focus` under the current rotation.
    fn fit_zoom(&self, focus: &MultiPolygon<f64>) -> ZoomTransform {
        let Some([min, max]) = self.projection().unzoomed().bounds(focus) else {
            return self.view.zoom;
        };
        let Viewport { width, height } = self.viewport;
        let (lo, hi) = self.config.fit_scale_extent;
        let spread = ((max.0 - min.0) / width).max((max.1 - min.1) / height);
        let k = (if spread > 0.0 { self.config.fit_padding / spread } else { hi }).clamp(lo, hi);
        let (cx, cy) = ((min.0 + max.0) / 2.0, (min.1 + max.1) / 2.0);
        ZoomTransform { k, x: width / 2.0 - k * cx, y: height / 2.0 - k * cy }
    }
}
