//! Heterodyne whistle synthesizer.
//!
//! Each station owns one sine voice whose pitch grows with the dial's distance
//! from the station's center. Gain follows an edge Gaussian narrower than the
//! tuning curve, so the whistle is loudest just outside the deadband and fades
//! further out. Per update:
//!
//! 1. inside the deadband the target is silence;
//! 2. `frequency = offset * scale`, clamped to the ceiling with a
//!    `sqrt(ceiling / frequency)` gain reduction;
//! 3. `gain = max_gain * exp(-0.5 * (offset / edge_width)^2) * reduction * strength`;
//! 4. only the `max_simultaneous` loudest voices keep their target;
//! 5. if their summed gain exceeds the ceiling they are scaled down uniformly;
//! 6. every voice ramps toward its target with an exponential approach.
//!
//! Voices are created on first reference and never restarted; they are only
//! ramped to silence. Disabling the synth releases them entirely.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::Station;
use crate::config::{TunerConfig, WhistleConfig};
use crate::node::{AudioBackend, AudioNode};
use crate::smooth::{Ramp, SmoothedValue, SETTLE_EPSILON};
use crate::Result;

/// Rate used for the control-side voice model; only `advance()` is used there.
const CONTROL_RATE: f32 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct WhistleTarget {
    pub frequency: f32,
    pub gain: f32,
}

impl WhistleTarget {
    pub const SILENT: WhistleTarget = WhistleTarget {
        frequency: 0.0,
        gain: 0.0,
    };
}

/// Steps 1-3 for a single station, before ranking and the sum ceiling.
pub fn whistle_target(dial: f32, station: &Station, config: &WhistleConfig) -> WhistleTarget {
    let offset = (dial - station.position).abs();
    if offset < config.deadband {
        return WhistleTarget::SILENT;
    }

    let raw = offset * config.scale_hz_per_unit;
    let (frequency, reduction) = if raw > config.ceiling_hz {
        (config.ceiling_hz, (config.ceiling_hz / raw).sqrt())
    } else {
        (raw, 1.0)
    };

    let edge = offset / config.edge_width;
    let gain = config.max_gain * (-0.5 * edge * edge).exp() * reduction * station.strength;

    WhistleTarget { frequency, gain }
}

/// Targets for every station (in input order) after ranking and the sum ceiling.
pub fn plan_whistles<'a>(
    dial: f32,
    stations: impl IntoIterator<Item = &'a Station>,
    config: &WhistleConfig,
) -> Vec<WhistleTarget> {
    let mut targets: Vec<WhistleTarget> = stations
        .into_iter()
        .map(|s| whistle_target(dial, s, config))
        .collect();

    let mut ranked: Vec<usize> = (0..targets.len()).collect();
    ranked.sort_by(|&a, &b| targets[b].gain.total_cmp(&targets[a].gain));
    let (kept, dropped) = ranked.split_at(config.max_simultaneous.min(ranked.len()));

    for &i in dropped {
        targets[i] = WhistleTarget::SILENT;
    }

    let sum: f32 = kept.iter().map(|&i| targets[i].gain).sum();
    if sum > config.total_gain_ceiling {
        let scale = config.total_gain_ceiling / sum;
        for &i in kept {
            targets[i].gain *= scale;
        }
    }

    targets
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VoicePhase {
    Silent,
    Ramping,
    Audible,
}

pub struct WhistleVoice<N> {
    node: N,
    frequency: SmoothedValue,
    gain: SmoothedValue,
    started: bool,
}

impl<N: AudioNode> WhistleVoice<N> {
    fn new(mut node: N) -> Self {
        node.set_gain(0.0, Ramp::Immediate);
        node.set_frequency(0.0, Ramp::Immediate);
        Self {
            node,
            frequency: SmoothedValue::new(0.0, CONTROL_RATE),
            gain: SmoothedValue::new(0.0, CONTROL_RATE),
            started: false,
        }
    }

    fn start_once(&mut self, station_id: &str) {
        if self.started {
            return;
        }
        match self.node.start() {
            Ok(()) => self.started = true,
            Err(e) => warn!("Failed to start whistle for '{}': {}", station_id, e),
        }
    }

    fn ramp_to(&mut self, target: WhistleTarget, tau: Duration, max_hz: f32) {
        let ramp = Ramp::TimeConstant(tau);
        let frequency = target.frequency.clamp(0.0, max_hz);
        self.node.set_frequency(frequency, ramp);
        self.node.set_gain(target.gain, ramp);
        self.frequency.set(frequency, ramp);
        self.gain.set(target.gain, ramp);
    }

    fn mute(&mut self) {
        self.node.set_gain(0.0, Ramp::Immediate);
        self.gain.set_immediate(0.0);
    }

    fn advance(&mut self, dt: Duration) {
        self.frequency.advance(dt);
        self.gain.advance(dt);
    }

    pub fn phase(&self) -> VoicePhase {
        if self.gain.is_smoothing() {
            VoicePhase::Ramping
        } else if self.gain.target() > SETTLE_EPSILON {
            VoicePhase::Audible
        } else {
            VoicePhase::Silent
        }
    }

    /// Modelled current frequency.
    pub fn frequency(&self) -> f32 {
        self.frequency.current()
    }

    /// Modelled current gain.
    pub fn gain(&self) -> f32 {
        self.gain.current()
    }

    pub fn target(&self) -> WhistleTarget {
        WhistleTarget {
            frequency: self.frequency.target(),
            gain: self.gain.target(),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

pub struct WhistleSynth<N> {
    config: Arc<TunerConfig>,
    voices: HashMap<String, WhistleVoice<N>>,
    enabled: bool,
    last_update: Option<Instant>,
}

impl<N: AudioNode> WhistleSynth<N> {
    pub fn new(config: Arc<TunerConfig>) -> Self {
        let enabled = config.whistle.enabled;
        Self {
            config,
            voices: HashMap::new(),
            enabled,
            last_update: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Voice for `station_id`, created and started on first reference.
    pub fn ensure_voice<B>(
        &mut self,
        backend: &mut B,
        station_id: &str,
    ) -> Result<&mut WhistleVoice<N>>
    where
        B: AudioBackend<Node = N>,
    {
        let voice = match self.voices.entry(station_id.to_owned()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let node = backend.create_oscillator()?;
                debug!("Created whistle voice for '{}'", station_id);
                entry.insert(WhistleVoice::new(node))
            }
        };
        voice.start_once(station_id);
        Ok(voice)
    }

    /// Create any missing voices and hold them all at zero gain.
    pub fn ensure_all<'a, B>(
        &mut self,
        backend: &mut B,
        stations: impl IntoIterator<Item = &'a Station>,
    ) where
        B: AudioBackend<Node = N>,
    {
        if !self.enabled {
            return;
        }
        for station in stations {
            match self.ensure_voice(backend, &station.id) {
                Ok(voice) => voice.mute(),
                Err(e) => warn!("Failed to create whistle for '{}': {}", station.id, e),
            }
        }
    }

    /// One synthesis pass over the active stations.
    pub fn update<B>(
        &mut self,
        backend: &mut B,
        dial: f32,
        stations: &[&Station],
        master: f32,
        now: Instant,
    ) where
        B: AudioBackend<Node = N>,
    {
        if !self.enabled {
            return;
        }

        if let Some(last) = self.last_update {
            let dt = now.saturating_duration_since(last);
            for voice in self.voices.values_mut() {
                voice.advance(dt);
            }
        }
        self.last_update = Some(now);

        let config = Arc::clone(&self.config);
        let whistle = &config.whistle;
        let targets = plan_whistles(dial, stations.iter().copied(), whistle);

        for (station, target) in stations.iter().zip(targets) {
            let target = WhistleTarget {
                frequency: target.frequency,
                gain: target.gain * master,
            };
            match self.ensure_voice(backend, &station.id) {
                Ok(voice) => {
                    voice.ramp_to(target, whistle.ramp_time_constant, whistle.max_audio_hz)
                }
                Err(e) => warn!("Failed to create whistle for '{}': {}", station.id, e),
            }
        }
    }

    /// Immediate silence on every voice; oscillators keep running.
    pub fn silence(&mut self) {
        for voice in self.voices.values_mut() {
            voice.mute();
        }
    }

    pub fn silence_voice(&mut self, station_id: &str) {
        if let Some(voice) = self.voices.get_mut(station_id) {
            voice.mute();
        }
    }

    /// Disabling releases every voice; enabling recreates them lazily.
    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.release_all();
        }
        self.enabled = enabled;
    }

    /// Stop and disconnect every voice.
    pub fn release_all(&mut self) {
        for (_, mut voice) in self.voices.drain() {
            voice.node.release();
        }
        self.last_update = None;
    }

    pub fn voice(&self, station_id: &str) -> Option<&WhistleVoice<N>> {
        self.voices.get(station_id)
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }
}
