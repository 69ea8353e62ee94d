//! Voice units built from fundsp nodes.
//!
//! Every voice is a one-in, one-out unit: the bus so far comes in, the voice
//! adds itself and passes the sum on (`pass() + voice`). Control values live
//! in [`Shared`] atomics written by the control thread; the audio thread
//! smooths them with [`Glide`], the same exponential approach the mixer models.

use std::sync::Arc;
use std::time::Duration;

use fundsp::prelude::*;
use fundsp::shared::Shared;
use radiodial_core::{Ramp, SmoothedValue};

use crate::loader::LoadState;

/// Decoded mono audio for a station.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleData {
    frames: Vec<f32>,
    sample_rate: u32,
}

impl SampleData {
    pub fn new(frames: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate,
        }
    }

    pub fn frames(&self) -> &[f32] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames.len() as f64 / self.sample_rate as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseColor {
    White,
    /// Integrated white noise, darker and softer.
    Brown,
}

/// A smoothed control value: target and time constant, both atomics.
#[derive(Clone)]
pub struct Param {
    target: Shared,
    tau: Shared,
}

impl Param {
    pub fn new(initial: f32) -> Self {
        Self {
            target: Shared::new(initial),
            tau: Shared::new(0.0),
        }
    }

    /// The time constant is written first so a new target never ramps at the old speed.
    pub fn set(&self, value: f32, ramp: Ramp) {
        let tau = match ramp {
            Ramp::Immediate => 0.0,
            Ramp::TimeConstant(tau) => tau.as_secs_f32(),
        };
        self.tau.set_value(tau);
        self.target.set_value(value);
    }

    pub fn target(&self) -> f32 {
        self.target.value()
    }

    /// Audio-rate output of this parameter.
    pub fn glide(&self) -> An<impl AudioNode<Inputs = U0, Outputs = U1>> {
        (var(&self.target) | var(&self.tau)) >> An(Glide::new(self.target.value()))
    }
}

/// Control handles of one voice.
#[derive(Clone)]
pub struct VoiceParams {
    pub gain: Param,
    pub frequency: Param,
    gate: Shared,
}

impl VoiceParams {
    pub fn new() -> Self {
        Self {
            gain: Param::new(0.0),
            frequency: Param::new(0.0),
            gate: Shared::new(0.0),
        }
    }

    pub fn set_gate(&self, open: bool) {
        self.gate.set_value(if open { 1.0 } else { 0.0 });
    }

    pub fn is_gate_open(&self) -> bool {
        self.gate.value() > 0.0
    }
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self::new()
    }
}

/// Smooths a `(target, time constant in seconds)` input pair.
///
/// A zero time constant jumps straight to the target.
#[derive(Clone)]
pub struct Glide {
    smooth: SmoothedValue,
    target: f32,
    tau: f32,
}

impl Glide {
    pub fn new(initial: f32) -> Self {
        Self {
            smooth: SmoothedValue::new(initial, 44_100.0),
            target: initial,
            tau: 0.0,
        }
    }
}

impl AudioNode for Glide {
    const ID: u64 = 0x5244_474c; // "RDGL"
    type Inputs = U2;
    type Outputs = U1;

    fn reset(&mut self) {
        self.smooth.skip_to_target();
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.smooth.set_sample_rate(sample_rate as f32);
        // Re-apply the ramp at the new rate on the next tick.
        self.tau = f32::NAN;
    }

    #[inline]
    fn tick(&mut self, input: &Frame<f32, Self::Inputs>) -> Frame<f32, Self::Outputs> {
        let (target, tau) = (input[0], input[1]);
        if target != self.target || tau != self.tau {
            self.target = target;
            self.tau = tau;
            self.smooth.set(target, ramp_from_secs(tau));
        }
        [self.smooth.next_sample()].into()
    }
}

#[inline]
fn ramp_from_secs(tau: f32) -> Ramp {
    if tau.is_finite() && tau > 0.0 {
        Ramp::TimeConstant(Duration::from_secs_f32(tau))
    } else {
        Ramp::Immediate
    }
}

/// Loops a station's decoded audio once it has loaded.
///
/// Input 0 is the gate; the playhead holds while it is closed. Playback is
/// resampled with linear interpolation.
#[derive(Clone)]
pub struct SamplePlayer {
    state: Arc<LoadState>,
    position: f64,
    sample_rate: f64,
}

impl SamplePlayer {
    pub fn new(state: Arc<LoadState>) -> Self {
        Self {
            state,
            position: 0.0,
            sample_rate: 44_100.0,
        }
    }
}

impl AudioNode for SamplePlayer {
    const ID: u64 = 0x5244_5350; // "RDSP"
    type Inputs = U1;
    type Outputs = U1;

    fn reset(&mut self) {
        self.position = 0.0;
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    #[inline]
    fn tick(&mut self, input: &Frame<f32, Self::Inputs>) -> Frame<f32, Self::Outputs> {
        let Some(data) = self.state.sample() else {
            return [0.0].into();
        };
        if input[0] <= 0.0 || data.is_empty() {
            return [0.0].into();
        }

        let frames = data.frames();
        let len = frames.len();
        let index = Ord::min(self.position as usize, len - 1);
        let frac = (self.position - index as f64) as f32;
        let a = frames[index];
        let b = frames[(index + 1) % len];

        self.position += data.sample_rate() as f64 / self.sample_rate;
        if self.position >= len as f64 {
            self.position %= len as f64;
        }

        [a + (b - a) * frac].into()
    }
}

/// Sine whistle voice.
pub fn tone_voice(params: &VoiceParams) -> Box<dyn AudioUnit> {
    let voice = (params.frequency.glide() >> sine::<f32>()) * params.gain.glide() * var(&params.gate);
    Box::new(pass() + voice)
}

/// Noise bed voice.
pub fn noise_voice(color: NoiseColor, params: &VoiceParams) -> Box<dyn AudioUnit> {
    let level = params.gain.glide() * var(&params.gate);
    match color {
        NoiseColor::White => Box::new(pass() + noise() * level),
        NoiseColor::Brown => Box::new(pass() + brown::<f32>() * level),
    }
}

/// Station voice playing whatever `state` loads.
pub fn sample_voice(state: Arc<LoadState>, params: &VoiceParams) -> Box<dyn AudioUnit> {
    let player = var(&params.gate) >> An(SamplePlayer::new(state));
    Box::new(pass() + player * params.gain.glide())
}
