use std::time::Duration;

use crate::projection::{Rotation, ZoomTransform, wrap_longitude};

/// Values a [`Tween`] can move between.
pub trait Lerp: Copy {
    fn lerp(a: Self, b: Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: f64, b: f64, t: f64) -> f64 {
        a + (b - a) * t
    }
}

/// Longitude is interpolated without wrapping; callers unwrap `to` first so
/// the tween takes the short way round.
impl Lerp for Rotation {
    fn lerp(a: Rotation, b: Rotation, t: f64) -> Rotation {
        Rotation { lambda: f64::lerp(a.lambda, b.lambda, t), phi: f64::lerp(a.phi, b.phi, t) }
    }
}

impl Lerp for ZoomTransform {
    fn lerp(a: ZoomTransform, b: ZoomTransform, t: f64) -> ZoomTransform {
        ZoomTransform { k: f64::lerp(a.k, b.k, t), x: f64::lerp(a.x, b.x, t), y: f64::lerp(a.y, b.y, t) }
    }
}

/// Cubic ease-in-out.
pub fn cubic_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0) * 2.0;
    if t <= 1.0 {
        t * t * t / 2.0
    } else {
        let t = t - 2.0;
        (t * t * t + 2.0) / 2.0
    }
}

/// A timed, eased move from one value to another, driven by elapsed time.
#[derive(Clone, Copy, Debug)]
pub struct Tween<T> {
    from: T,
    to: T,
    elapsed: Duration,
    duration: Duration,
}

impl<T: Lerp> Tween<T> {
    pub fn new(from: T, to: T, duration: Duration) -> Self {
        Self { from, to, elapsed: Duration::ZERO, duration }
    }

    /// Advances by `dt`; returns the value and whether the tween finished.
    /// The final step lands exactly on `to`.
    pub fn advance(&mut self, dt: Duration) -> (T, bool) {
        self.elapsed = (self.elapsed + dt).min(self.duration);
        if self.elapsed >= self.duration {
            return (self.to, true);
        }
        let t = self.elapsed.as_secs_f64() / self.duration.as_secs_f64();
        (T::lerp(self.from, self.to, cubic_in_out(t)), false)
    }
}

impl Tween<Rotation> {
    /// Rotation tween whose longitude takes the shortest path.
    pub fn rotation(from: Rotation, to: Rotation, duration: Duration) -> Self {
        let from = from.normalized();
        let to = Rotation {
            lambda: from.lambda + wrap_longitude(to.lambda - from.lambda),
            phi: to.phi,
        };
        Self::new(from, to, duration)
    }
}

/// Holds at most one running task. Starting a task drops the previous one,
/// so two animations can never drive the same state.
#[derive(Debug)]
pub struct Scheduler<T> {
    active: Option<T>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self { active: None }
    }
}

impl<T> Scheduler<T> {
    /// Replaces the running task; returns the one it displaced.
    pub fn start(&mut self, task: T) -> Option<T> {
        self.active.replace(task)
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.active.take()
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_none()
    }

    /// Takes the task out for a step. Hand it back with [`Scheduler::resume`]
    /// unless it finished or started a successor.
    pub fn take(&mut self) -> Option<T> {
        self.active.take()
    }

    /// Puts back a task taken for a step, unless another one was started.
    pub fn resume(&mut self, task: T) {
        if self.is_idle() {
            self.active = Some(task);
        }
    }
}
