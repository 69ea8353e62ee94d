//! Click-free parameter ramps.
//!
//! Parameters move toward their target with an exponential approach
//! (`current = target + (current - target) * e^(-dt / tau)`), the same curve on
//! both sides of the graph:
//!
//! - the audio thread steps it per sample with [`SmoothedValue::next_sample`];
//! - the control side models it with [`SmoothedValue::advance`] so it can
//!   report where a voice currently is without asking the audio thread.
//!
//! # Example
//!
//! ```
//! use radiodial_core::{Ramp, SmoothedValue};
//! use std::time::Duration;
//!
//! let mut gain = SmoothedValue::new(0.0, 48000.0);
//! gain.set(0.5, Ramp::TimeConstant(Duration::from_millis(60)));
//!
//! # let mut buffer = [1.0f32; 512];
//! gain.apply_gain(&mut buffer);
//! assert!(buffer[511] > 0.0 && buffer[511] < 0.5);
//! ```

use std::time::Duration;

/// Below this distance from its target a value counts as settled.
pub const SETTLE_EPSILON: f32 = 1e-4;

/// How a new parameter value is applied.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Ramp {
    /// Jump straight to the value.
    #[default]
    Immediate,
    /// Exponential approach with this time constant.
    TimeConstant(Duration),
}

#[derive(Debug, Clone)]
pub struct SmoothedValue {
    current: f32,
    target: f32,
    tau_secs: f32,
    sample_rate: f32,
    /// Per-sample decay factor, `e^(-1 / (tau * sample_rate))`.
    coeff: f32,
}

impl SmoothedValue {
    pub fn new(initial: f32, sample_rate: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            tau_secs: 0.0,
            sample_rate,
            coeff: 0.0,
        }
    }

    #[inline]
    pub fn set(&mut self, value: f32, ramp: Ramp) {
        match ramp {
            Ramp::Immediate => self.set_immediate(value),
            Ramp::TimeConstant(tau) if tau.is_zero() => self.set_immediate(value),
            Ramp::TimeConstant(tau) => {
                self.target = value;
                let tau_secs = tau.as_secs_f32();
                if tau_secs != self.tau_secs {
                    self.tau_secs = tau_secs;
                    self.coeff = decay(1.0 / self.sample_rate.max(1.0), tau_secs);
                }
            }
        }
    }

    #[inline]
    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
    }

    /// Call once per sample in the audio callback.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if self.current != self.target {
            self.current = self.target + (self.current - self.target) * self.coeff;
            // Snap once inaudible to avoid denormals.
            if (self.current - self.target).abs() < SETTLE_EPSILON * 0.01 {
                self.current = self.target;
            }
        }
        self.current
    }

    /// Advance the model by `dt` of wall time.
    pub fn advance(&mut self, dt: Duration) -> f32 {
        if self.current != self.target {
            let k = if self.tau_secs > 0.0 {
                decay(dt.as_secs_f32(), self.tau_secs)
            } else {
                0.0
            };
            self.current = self.target + (self.current - self.target) * k;
        }
        self.current
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    pub fn is_smoothing(&self) -> bool {
        (self.current - self.target).abs() > SETTLE_EPSILON
    }

    #[inline]
    pub fn skip_to_target(&mut self) {
        self.current = self.target;
    }

    /// Takes effect on the next ramped `set()`.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.tau_secs = 0.0;
    }

    #[inline]
    pub fn apply_gain(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample *= self.next_sample();
        }
    }
}

impl Default for SmoothedValue {
    fn default() -> Self {
        Self::new(0.0, 48000.0)
    }
}

#[inline]
fn decay(dt_secs: f32, tau_secs: f32) -> f32 {
    (-dt_secs / tau_secs).exp()
}
