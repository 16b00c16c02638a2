//! # Remote Avatar Interpolation
//!
//! Turns discrete transform samples, arriving once per server tick, into
//! continuous motion.
//!
//! ## Design
//!
//! - A new sample blends from what is on screen *now*, not from the previous
//!   sample, so a late or repeated sample never causes a visible jump
//! - The blend weight is `easing(elapsed / tick_interval) * compensation`,
//!   clamped to `[0, 1]`. A compensation factor above 1 finishes the blend
//!   early, which hides part of the network latency
//! - Once the weight reaches 1 the target is returned bit-for-bit
//!
//! ## Usage
//!
//! ```ignore
//! let mut state = InterpolationState::new(spawn_transform, 1.0 / 60.0, 1.5, Easing::Linear);
//!
//! // When a sample arrives:
//! state.set_target(sample, rendered, 1.0 / 60.0);
//!
//! // Each frame:
//! let rendered = state.advance(dt);
//! ```

use serde::Deserialize;
use tether_shared::Transform;

/// Shape of the blend curve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    /// Constant speed.
    #[default]
    Linear,
    /// Fast start, slow end.
    EaseOut,
    /// S-curve.
    SmoothStep,
}

impl Easing {
    /// Maps progress in `[0, 1]` to a blend weight in `[0, 1]`.
    #[inline]
    #[must_use]
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseOut => {
                // 1 - (1-t)^2
                let inv = 1.0 - t;
                1.0 - inv * inv
            }
            Self::SmoothStep => t * t * (3.0 - 2.0 * t),
        }
    }
}

/// Blend state for one remote avatar.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InterpolationState {
    start: Transform,
    target: Transform,
    /// Seconds since the current target was set. Never exceeds `tick_interval`.
    elapsed: f32,
    /// Expected seconds between samples.
    tick_interval: f32,
    compensation_factor: f32,
    easing: Easing,
}

impl InterpolationState {
    /// Creates a settled state resting at `initial`.
    #[must_use]
    pub fn new(initial: Transform, tick_interval: f32, compensation_factor: f32, easing: Easing) -> Self {
        let tick_interval = tick_interval.max(0.0);
        Self {
            start: initial,
            target: initial,
            elapsed: tick_interval,
            tick_interval,
            compensation_factor: compensation_factor.max(0.0),
            easing,
        }
    }

    /// Starts a blend from `current_rendered` towards `new_target`.
    ///
    /// A sample equal to the current target is ignored so that the in-flight
    /// blend keeps its progress.
    pub fn set_target(&mut self, new_target: Transform, current_rendered: Transform, tick_interval: f32) {
        if new_target == self.target {
            return;
        }
        self.start = current_rendered;
        self.target = new_target;
        self.tick_interval = tick_interval.max(0.0);
        self.elapsed = 0.0;
    }

    /// Advances time by `dt` seconds and returns the transform to render.
    pub fn advance(&mut self, dt: f32) -> Transform {
        if self.tick_interval <= 0.0 {
            return self.target;
        }
        self.elapsed = (self.elapsed + dt.max(0.0)).min(self.tick_interval);
        self.current()
    }

    /// Transform to render at the current elapsed time.
    #[must_use]
    pub fn current(&self) -> Transform {
        self.start.blend(self.target, self.weight())
    }

    /// Blend weight in `[0, 1]`.
    #[must_use]
    pub fn weight(&self) -> f32 {
        if self.tick_interval <= 0.0 {
            return 1.0;
        }
        let progress = self.elapsed / self.tick_interval;
        (self.easing.apply(progress) * self.compensation_factor).clamp(0.0, 1.0)
    }

    /// True once the rendered transform equals the target.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.weight() >= 1.0
    }

    /// Latest sample.
    #[inline]
    #[must_use]
    pub const fn target(&self) -> Transform {
        self.target
    }

    /// Seconds since the latest sample.
    #[inline]
    #[must_use]
    pub const fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Expected seconds between samples.
    #[inline]
    #[must_use]
    pub const fn tick_interval(&self) -> f32 {
        self.tick_interval
    }
}
