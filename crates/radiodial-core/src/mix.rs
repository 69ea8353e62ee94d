//! Mix engine: per-source gains and the noise beds.
//!
//! Each update the selected sources get `volume * master` as an immediate,
//! unramped assignment; the short update interval is what keeps it smooth.
//! The ether bed fills in when nothing is tuned:
//! `max_ether * (1 - loudest_selected) * master`.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::config::TunerConfig;
use crate::node::{AudioBackend, AudioNode, NoiseBed};
use crate::selector::selection_mask;
use crate::smooth::Ramp;
use crate::source::SourceHandle;
use crate::Result;

/// One row of a [`MixSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixEntry {
    pub station_id: String,
    pub raw_volume: f32,
    pub selected: bool,
}

/// Result of one mix pass, in catalog order. Recomputed every update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MixSnapshot {
    pub entries: Vec<MixEntry>,
}

impl MixSnapshot {
    pub fn selected(&self) -> impl Iterator<Item = &MixEntry> {
        self.entries.iter().filter(|e| e.selected)
    }

    pub fn max_selected_volume(&self) -> f32 {
        self.selected().map(|e| e.raw_volume).fold(0.0, f32::max)
    }
}

struct NoiseBeds<N> {
    ether: N,
    background: N,
}

pub struct MixEngine<N> {
    config: Arc<TunerConfig>,
    sources: Vec<Option<SourceHandle<N>>>,
    beds: Option<NoiseBeds<N>>,
    ether_level: f32,
}

impl<N: AudioNode> MixEngine<N> {
    pub fn new(config: Arc<TunerConfig>, station_count: usize) -> Self {
        Self {
            config,
            sources: (0..station_count).map(|_| None).collect(),
            beds: None,
            ether_level: 0.0,
        }
    }

    /// Create the two noise beds. Called once at init.
    pub fn init_beds<B>(&mut self, backend: &mut B) -> Result<()>
    where
        B: AudioBackend<Node = N>,
    {
        if self.beds.is_none() {
            let mut ether = backend.create_noise(NoiseBed::Ether)?;
            let mut background = backend.create_noise(NoiseBed::Background)?;
            ether.set_gain(0.0, Ramp::Immediate);
            background.set_gain(0.0, Ramp::Immediate);
            self.beds = Some(NoiseBeds { ether, background });
        }
        Ok(())
    }

    /// Eagerly create a source for every station.
    pub fn preload<B>(&mut self, backend: &mut B, catalog: &Catalog, now: Instant) -> Result<()>
    where
        B: AudioBackend<Node = N>,
    {
        for (slot, station) in self.sources.iter_mut().zip(catalog) {
            if slot.is_none() {
                let node = backend.create_source(station)?;
                *slot = Some(SourceHandle::new(station.id.clone(), node, now));
            }
        }
        Ok(())
    }

    /// Start both beds at zero gain.
    pub fn start_beds(&mut self) {
        if let Some(beds) = self.beds.as_mut() {
            for node in [&mut beds.ether, &mut beds.background] {
                node.set_gain(0.0, Ramp::Immediate);
                if !node.is_playing() {
                    if let Err(e) = node.start() {
                        warn!("Failed to start noise bed: {}", e);
                    }
                }
            }
        }
        self.ether_level = 0.0;
    }

    /// Resolve readiness of every pending source. True if any became ready.
    pub fn poll_sources(&mut self, now: Instant) -> bool {
        let timeout = self.config.ready_timeout;
        let mut changed = false;
        for handle in self.sources.iter_mut().flatten() {
            changed |= handle.poll_ready(now, timeout);
        }
        changed
    }

    pub fn retry_due(&self, now: Instant) -> bool {
        self.sources.iter().flatten().any(|h| h.retry_due(now))
    }

    pub fn defer_retries(&mut self, until: Instant) {
        for handle in self.sources.iter_mut().flatten() {
            handle.defer_retry(until);
        }
    }

    pub fn has_pending(&self) -> bool {
        self.sources.iter().flatten().any(|h| h.is_pending())
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        let timeout = self.config.ready_timeout;
        self.sources
            .iter()
            .flatten()
            .filter_map(|h| h.deadline(timeout))
            .min()
    }

    /// One mix pass. `volumes` is indexed like the catalog; disabled stations
    /// must already be zero.
    pub fn update<B>(
        &mut self,
        backend: &mut B,
        catalog: &Catalog,
        volumes: &[f32],
        master: f32,
        now: Instant,
    ) -> MixSnapshot
    where
        B: AudioBackend<Node = N>,
    {
        let selected = selection_mask(volumes, self.config.top_k);
        let timeout = self.config.ready_timeout;
        let retry_delay = self.config.play_retry_delay;

        for (i, station) in catalog.iter().enumerate() {
            let slot = &mut self.sources[i];

            if selected[i] && slot.is_none() {
                match backend.create_source(station) {
                    Ok(node) => {
                        debug!("Created source for '{}'", station.id);
                        *slot = Some(SourceHandle::new(station.id.clone(), node, now));
                    }
                    Err(e) => warn!("Failed to create source for '{}': {}", station.id, e),
                }
            }

            let Some(handle) = slot.as_mut() else {
                continue;
            };

            handle.poll_ready(now, timeout);
            if selected[i] {
                handle.set_gain(volumes[i] * master);
                handle.ensure_playing(now, retry_delay);
            } else {
                handle.deselect();
            }
        }

        let snapshot = MixSnapshot {
            entries: catalog
                .iter()
                .zip(volumes)
                .zip(&selected)
                .map(|((station, &raw_volume), &selected)| MixEntry {
                    station_id: station.id.clone(),
                    raw_volume,
                    selected,
                })
                .collect(),
        };

        let noise = &self.config.noise;
        self.ether_level = noise.max_ether_volume * (1.0 - snapshot.max_selected_volume()) * master;
        if let Some(beds) = self.beds.as_mut() {
            beds.ether.set_gain(self.ether_level, Ramp::Immediate);
            beds.background
                .set_gain(noise.background_volume * master, Ramp::Immediate);
        }

        snapshot
    }

    /// Zero every gain and halt all playback.
    pub fn silence(&mut self) {
        for handle in self.sources.iter_mut().flatten() {
            handle.silence();
        }
        if let Some(beds) = self.beds.as_mut() {
            for node in [&mut beds.ether, &mut beds.background] {
                node.set_gain(0.0, Ramp::Immediate);
                node.stop();
            }
        }
        self.ether_level = 0.0;
    }

    /// Release a station's source; it is recreated lazily if selected again.
    pub fn release_source(&mut self, index: usize) {
        if let Some(handle) = self.sources.get_mut(index).and_then(|slot| slot.take()) {
            handle.release();
        }
    }

    pub fn release_all(&mut self) {
        for index in 0..self.sources.len() {
            self.release_source(index);
        }
        if let Some(mut beds) = self.beds.take() {
            beds.ether.release();
            beds.background.release();
        }
        self.ether_level = 0.0;
    }

    pub fn source(&self, index: usize) -> Option<&SourceHandle<N>> {
        self.sources.get(index).and_then(Option::as_ref)
    }

    pub fn ether_level(&self) -> f32 {
        self.ether_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StationRecord;
    use crate::testing::{FakeBackend, FakeNode};
    use approx::assert_relative_eq;

    fn catalog(stations: &[(&str, f32)]) -> Catalog {
        Catalog::new(stations.iter().map(|&(id, position)| StationRecord {
            id: id.into(),
            title: String::new(),
            description: String::new(),
            audio_ref: format!("{id}.wav"),
            position,
            strength: 1.0,
            sigma: 2.0,
        }))
        .unwrap()
    }

    fn engine(catalog: &Catalog, backend: &mut FakeBackend) -> MixEngine<FakeNode> {
        let mut mix = MixEngine::new(Arc::new(TunerConfig::default()), catalog.len());
        mix.init_beds(backend).unwrap();
        mix.start_beds();
        mix
    }

    #[test]
    fn test_selected_gain_is_volume_times_master() {
        let catalog = catalog(&[("a", 10.0), ("b", 50.0)]);
        let mut backend = FakeBackend::new();
        let mut mix = engine(&catalog, &mut backend);
        let now = Instant::now();

        let snapshot = mix.update(&mut backend, &catalog, &[0.8, 0.0], 0.5, now);

        assert!(snapshot.entries[0].selected);
        assert!(!snapshot.entries[1].selected);
        let a = backend.source("a").unwrap();
        assert_relative_eq!(a.gain, 0.4);
        assert_eq!(a.last_gain_ramp, Ramp::Immediate);
        assert!(a.playing);
        assert!(backend.source("b").is_none());
    }

    #[test]
    fn test_ether_inverse_of_tuning() {
        let catalog = catalog(&[("a", 10.0)]);
        let mut backend = FakeBackend::new();
        let mut mix = engine(&catalog, &mut backend);
        let now = Instant::now();
        let max_ether = TunerConfig::default().noise.max_ether_volume;

        mix.update(&mut backend, &catalog, &[0.0], 1.0, now);
        assert_relative_eq!(mix.ether_level(), max_ether);

        mix.update(&mut backend, &catalog, &[0.75], 1.0, now);
        assert_relative_eq!(mix.ether_level(), max_ether * 0.25);

        mix.update(&mut backend, &catalog, &[0.75], 0.5, now);
        assert_relative_eq!(mix.ether_level(), max_ether * 0.25 * 0.5);
        assert_relative_eq!(backend.noise(NoiseBed::Ether).unwrap().gain, mix.ether_level());
    }

    #[test]
    fn test_background_scaled_only_by_master() {
        let catalog = catalog(&[("a", 10.0)]);
        let mut backend = FakeBackend::new();
        let mut mix = engine(&catalog, &mut backend);
        let bg = TunerConfig::default().noise.background_volume;

        mix.update(&mut backend, &catalog, &[1.0], 0.5, Instant::now());
        assert_relative_eq!(backend.noise(NoiseBed::Background).unwrap().gain, bg * 0.5);

        mix.update(&mut backend, &catalog, &[0.0], 0.5, Instant::now());
        assert_relative_eq!(backend.noise(NoiseBed::Background).unwrap().gain, bg * 0.5);
    }

    #[test]
    fn test_leaving_selection_stops_source() {
        let catalog = catalog(&[("a", 10.0), ("b", 12.0), ("c", 14.0), ("d", 16.0)]);
        let mut backend = FakeBackend::new();
        let mut mix = engine(&catalog, &mut backend);
        let now = Instant::now();

        mix.update(&mut backend, &catalog, &[0.1, 0.8, 0.3, 0.05], 1.0, now);
        assert!(backend.source("a").unwrap().playing);
        assert!(backend.source("d").is_none());

        mix.update(&mut backend, &catalog, &[0.05, 0.8, 0.3, 0.1], 1.0, now);
        let a = backend.source("a").unwrap();
        assert!(!a.playing);
        assert_eq!(a.stops, 1);
        assert!(backend.source("d").unwrap().playing);
    }

    #[test]
    fn test_silence_stops_everything() {
        let catalog = catalog(&[("a", 10.0)]);
        let mut backend = FakeBackend::new();
        let mut mix = engine(&catalog, &mut backend);

        mix.update(&mut backend, &catalog, &[0.9], 1.0, Instant::now());
        mix.silence();

        let a = backend.source("a").unwrap();
        assert!(!a.playing);
        assert_eq!(a.gain, 0.0);
        let ether = backend.noise(NoiseBed::Ether).unwrap();
        assert!(!ether.playing);
        assert_eq!(ether.gain, 0.0);
    }

    #[test]
    fn test_preload_creates_all_sources() {
        let catalog = catalog(&[("a", 10.0), ("b", 50.0)]);
        let mut backend = FakeBackend::new();
        let mut mix = MixEngine::new(Arc::new(TunerConfig::default()), catalog.len());

        mix.preload(&mut backend, &catalog, Instant::now()).unwrap();
        assert!(mix.source(0).is_some());
        assert!(mix.source(1).is_some());
        assert!(!backend.source("b").unwrap().playing);
    }
}
