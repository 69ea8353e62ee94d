//! Power/fade state machine.
//!
//! `Off -> FadingIn` on power-on, `FadingIn -> On` when the fade completes,
//! anything `-> Off` on power-off. There is no instant `Off -> On`: every
//! power-on fades in from zero.

use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PowerState {
    #[default]
    Off,
    FadingIn,
    On,
}

impl PowerState {
    /// Audible (fading in or fully on).
    #[inline]
    pub fn is_on(self) -> bool {
        !matches!(self, PowerState::Off)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    PowerOn(Instant),
    FadeTick(Instant),
    PowerOff,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionResult {
    None,
    FadeStarted,
    FadeProgress(f32),
    FadeCompleted,
    PoweredOff,
}

#[derive(Debug, Clone, Copy)]
struct FadeTimer {
    started: Instant,
    next_step: Instant,
}

pub struct PowerSequencer {
    state: PowerState,
    fade: Option<FadeTimer>,
    master_volume: f32,
    fade_duration: Duration,
    fade_interval: Duration,
}

impl PowerSequencer {
    pub fn new(fade_duration: Duration, fade_interval: Duration) -> Self {
        Self {
            state: PowerState::Off,
            fade: None,
            master_volume: 0.0,
            fade_duration,
            fade_interval,
        }
    }

    pub fn transition(&mut self, event: PowerEvent) -> TransitionResult {
        match event {
            PowerEvent::PowerOn(now) => match self.state {
                PowerState::Off => {
                    self.state = PowerState::FadingIn;
                    self.master_volume = 0.0;
                    self.fade = Some(FadeTimer {
                        started: now,
                        next_step: now + self.fade_interval,
                    });
                    TransitionResult::FadeStarted
                }
                // Mid-fade or fully on: never a second fade.
                PowerState::FadingIn | PowerState::On => TransitionResult::None,
            },

            PowerEvent::FadeTick(now) => {
                let (PowerState::FadingIn, Some(timer)) = (self.state, self.fade.as_mut()) else {
                    return TransitionResult::None;
                };

                let progress = fade_progress(
                    now.saturating_duration_since(timer.started),
                    self.fade_duration,
                );
                self.master_volume = self.master_volume.max(progress);

                if progress >= 1.0 {
                    self.state = PowerState::On;
                    self.master_volume = 1.0;
                    self.fade = None;
                    TransitionResult::FadeCompleted
                } else {
                    timer.next_step = now + self.fade_interval;
                    TransitionResult::FadeProgress(progress)
                }
            }

            PowerEvent::PowerOff => match self.state {
                PowerState::Off => TransitionResult::None,
                PowerState::FadingIn | PowerState::On => {
                    self.state = PowerState::Off;
                    self.master_volume = 0.0;
                    self.fade = None;
                    TransitionResult::PoweredOff
                }
            },
        }
    }

    #[inline]
    pub fn state(&self) -> PowerState {
        self.state
    }

    #[inline]
    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Whether the fade timer wants a step at `now`.
    pub fn fade_due(&self, now: Instant) -> bool {
        self.fade.is_some_and(|t| now >= t.next_step)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.fade.map(|t| t.next_step)
    }

    /// Push a pending fade step out to `until` without advancing progress.
    pub fn defer_step(&mut self, until: Instant) {
        if let Some(timer) = self.fade.as_mut() {
            timer.next_step = timer.next_step.max(until);
        }
    }
}

/// `min(elapsed / duration, 1)`; a zero duration is complete immediately.
pub fn fade_progress(elapsed: Duration, duration: Duration) -> f32 {
    if duration.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f32() / duration.as_secs_f32()).min(1.0)
}
