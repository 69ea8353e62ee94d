//! The receiver: single driver of the whole mix.
//!
//! Every entry point (dial change, power toggle, fade tick, timer poll) ends in
//! the same deterministic recomputation from the current dial position and
//! power state. Entry points never return errors; failures are absorbed and
//! show up only in the ready/playing flags of the [`ReceiverReport`].
//!
//! The receiver is driven from one thread by an external event loop. Call
//! [`Receiver::poll`] no later than [`Receiver::next_deadline`].

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error};

use crate::catalog::{Catalog, Station};
use crate::clock::{Clock, SystemClock};
use crate::config::TunerConfig;
use crate::mix::{MixEngine, MixSnapshot};
use crate::node::AudioBackend;
use crate::power::{PowerEvent, PowerSequencer, PowerState, TransitionResult};
use crate::report::{ReceiverReport, StationReport, WhistleReport};
use crate::tuning::{self, DialState};
use crate::whistle::WhistleSynth;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitStatus {
    Uninitialized,
    Ready,
    /// Initialization failed; every operation is a no-op.
    Inert,
}

pub struct Receiver<B: AudioBackend, C: Clock = SystemClock> {
    config: Arc<TunerConfig>,
    catalog: Catalog,
    backend: B,
    clock: C,
    dial: DialState,
    power: PowerSequencer,
    mix: MixEngine<B::Node>,
    whistle: WhistleSynth<B::Node>,
    enabled: Vec<bool>,
    status: InitStatus,
    last_mix: MixSnapshot,
}

impl<B: AudioBackend> Receiver<B, SystemClock> {
    pub fn new(catalog: Catalog, config: TunerConfig, backend: B) -> Result<Self> {
        Self::with_clock(catalog, config, backend, SystemClock)
    }
}

impl<B: AudioBackend, C: Clock> Receiver<B, C> {
    pub fn with_clock(catalog: Catalog, config: TunerConfig, backend: B, clock: C) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let count = catalog.len();

        Ok(Self {
            dial: DialState::new(0.0, config.max_dial),
            power: PowerSequencer::new(config.fade_duration, config.fade_interval),
            mix: MixEngine::new(Arc::clone(&config), count),
            whistle: WhistleSynth::new(Arc::clone(&config)),
            enabled: vec![true; count],
            status: InitStatus::Uninitialized,
            last_mix: MixSnapshot::default(),
            config,
            catalog,
            backend,
            clock,
        })
    }

    /// Create the noise beds (and every source when preloading).
    ///
    /// A failure is reported once; the receiver then stays inert and later
    /// calls return [`Error::Inert`].
    pub fn init(&mut self) -> Result<()> {
        match self.status {
            InitStatus::Ready => return Ok(()),
            InitStatus::Inert => return Err(Error::Inert),
            InitStatus::Uninitialized => {}
        }

        let now = self.clock.now();
        let result = self.mix.init_beds(&mut self.backend).and_then(|()| {
            if self.config.preload_sources {
                self.mix.preload(&mut self.backend, &self.catalog, now)
            } else {
                Ok(())
            }
        });

        match result {
            Ok(()) => {
                self.status = InitStatus::Ready;
                Ok(())
            }
            Err(e) => {
                error!("Receiver initialization failed: {}", e);
                self.mix.release_all();
                self.status = InitStatus::Inert;
                Err(e)
            }
        }
    }

    #[inline]
    fn is_active(&self) -> bool {
        self.status == InitStatus::Ready
    }

    pub fn is_inert(&self) -> bool {
        self.status == InitStatus::Inert
    }

    /// New dial position from the UI. The position is committed before the mix runs.
    pub fn on_dial_position_change(&mut self, position: f32) {
        if !self.dial.set(position) {
            debug!("Ignoring non-finite dial position {}", position);
            return;
        }
        if self.is_active() {
            let now = self.clock.now();
            self.update_mix(now);
        }
    }

    pub fn power_on(&mut self) {
        if !self.is_active() {
            return;
        }
        if self.power.state() != PowerState::Off {
            debug!("Power on ignored, already {:?}", self.power.state());
            return;
        }
        if !self.backend.is_running() {
            debug!("Power on ignored, output device not running");
            return;
        }

        let now = self.clock.now();
        self.mix.start_beds();
        let active: Vec<&Station> = active_stations(&self.catalog, &self.enabled);
        self.whistle.ensure_all(&mut self.backend, active);

        if self.power.transition(PowerEvent::PowerOn(now)) == TransitionResult::FadeStarted {
            debug!("Power on, fading in over {:?}", self.config.fade_duration);
        }
        self.update_mix(now);
    }

    /// Immediate silence, no fade-out. Cancels a running fade.
    pub fn power_off(&mut self) {
        if !self.is_active() {
            return;
        }
        if self.power.transition(PowerEvent::PowerOff) != TransitionResult::PoweredOff {
            return;
        }
        debug!("Power off");
        self.mix.silence();
        self.whistle.silence();
        self.last_mix = MixSnapshot::default();
    }

    pub fn toggle_power(&mut self) {
        if self.power.state().is_on() {
            self.power_off();
        } else {
            self.power_on();
        }
    }

    /// Advance the fade-in and re-mix at the new master volume.
    pub fn fade_step(&mut self) {
        if !self.is_active() || self.power.state() != PowerState::FadingIn {
            return;
        }
        let now = self.clock.now();
        if !self.backend.is_running() {
            self.power.defer_step(now + self.config.fade_interval);
            return;
        }

        if self.power.transition(PowerEvent::FadeTick(now)) == TransitionResult::FadeCompleted {
            debug!("Fade-in complete");
        }
        self.update_mix(now);
    }

    /// Run whatever timer work is due: a fade step, or a re-mix after a
    /// source became ready or a playback retry came due.
    ///
    /// While the output device is down, due timers are pushed out by one
    /// fade interval so [`next_deadline`](Self::next_deadline) stays ahead of now.
    pub fn poll(&mut self) {
        if !self.is_active() || !self.power.state().is_on() {
            return;
        }

        let now = self.clock.now();
        let became_ready = self.mix.poll_sources(now);

        if !self.backend.is_running() {
            let resume = now + self.config.fade_interval;
            self.power.defer_step(resume);
            self.mix.defer_retries(resume);
            return;
        }

        if self.power.fade_due(now) {
            self.fade_step();
            return;
        }

        if became_ready || self.mix.retry_due(now) {
            self.update_mix(now);
        }
    }

    /// Earliest instant at which [`poll`](Self::poll) has work.
    ///
    /// Sources still loading are re-checked every fade interval.
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.is_active() || !self.power.state().is_on() {
            return None;
        }

        let loading = self
            .mix
            .has_pending()
            .then(|| self.clock.now() + self.config.fade_interval);

        [self.power.next_deadline(), self.mix.next_deadline(), loading]
            .into_iter()
            .flatten()
            .min()
    }

    /// Release a station's source and drop it from selection and whistles.
    pub fn disable_station(&mut self, id: &str) -> Result<()> {
        let index = self
            .catalog
            .index_of(id)
            .ok_or_else(|| Error::UnknownStation(id.to_owned()))?;

        if self.enabled[index] {
            self.enabled[index] = false;
            self.mix.release_source(index);
            self.whistle.silence_voice(id);
            debug!("Disabled station '{}'", id);
            if self.is_active() {
                let now = self.clock.now();
                self.update_mix(now);
            }
        }
        Ok(())
    }

    /// Disabling releases every whistle voice; enabling recreates them on demand.
    pub fn set_whistles_enabled(&mut self, enabled: bool) {
        if self.whistle.is_enabled() == enabled {
            return;
        }
        self.whistle.set_enabled(enabled);
        if enabled && self.is_active() {
            let now = self.clock.now();
            self.update_mix(now);
        }
    }

    /// Release every node. The receiver is inert afterwards.
    pub fn shutdown(&mut self) {
        if self.status == InitStatus::Inert {
            return;
        }
        self.power.transition(PowerEvent::PowerOff);
        self.whistle.release_all();
        self.mix.release_all();
        self.status = InitStatus::Inert;
        debug!("Receiver shut down");
    }

    fn update_mix(&mut self, now: Instant) {
        if !self.power.state().is_on() || !self.backend.is_running() {
            return;
        }

        let master = self.power.master_volume();
        let dial = self.dial.position();
        let volumes: Vec<f32> = self
            .catalog
            .iter()
            .zip(&self.enabled)
            .map(|(station, &enabled)| {
                if enabled {
                    tuning::volume(dial, station)
                } else {
                    0.0
                }
            })
            .collect();

        self.last_mix = self
            .mix
            .update(&mut self.backend, &self.catalog, &volumes, master, now);

        let active = active_stations(&self.catalog, &self.enabled);
        self.whistle
            .update(&mut self.backend, dial, &active, master, now);
    }

    pub fn report(&self) -> ReceiverReport {
        let dial = self.dial.position();
        let stations = self
            .catalog
            .iter()
            .enumerate()
            .map(|(i, station)| {
                let source = self.mix.source(i);
                let selected = self
                    .last_mix
                    .entries
                    .get(i)
                    .is_some_and(|e| e.selected);
                StationReport {
                    id: station.id.clone(),
                    title: station.title.clone(),
                    volume: if self.enabled[i] {
                        tuning::volume(dial, station)
                    } else {
                        0.0
                    },
                    selected,
                    enabled: self.enabled[i],
                    ready: source.is_some_and(|s| s.is_ready()),
                    playing: source.is_some_and(|s| s.is_playing()),
                    whistle: self.whistle.voice(&station.id).map(|v| WhistleReport {
                        frequency: v.frequency(),
                        gain: v.gain(),
                        target_gain: v.target().gain,
                        phase: v.phase(),
                    }),
                }
            })
            .collect();

        ReceiverReport {
            dial,
            power: self.power.state(),
            master_volume: self.power.master_volume(),
            ether_level: self.mix.ether_level(),
            stations,
        }
    }

    pub fn mix_snapshot(&self) -> &MixSnapshot {
        &self.last_mix
    }

    pub fn dial_position(&self) -> f32 {
        self.dial.position()
    }

    pub fn power_state(&self) -> PowerState {
        self.power.state()
    }

    pub fn master_volume(&self) -> f32 {
        self.power.master_volume()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    pub fn whistle_voice_count(&self) -> usize {
        self.whistle.voice_count()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

fn active_stations<'a>(catalog: &'a Catalog, enabled: &[bool]) -> Vec<&'a Station> {
    catalog
        .iter()
        .zip(enabled)
        .filter_map(|(station, &enabled)| enabled.then_some(station))
        .collect()
}
