//! [`AudioBackend`] implementation over the voice bus.
//!
//! Nodes are thin handles. Gain, frequency and gate changes go straight to the
//! voice's shared parameters; only creating and releasing a voice edits the
//! bus and commits it to the audio thread.

use std::path::PathBuf;
use std::sync::Arc;

use fundsp::audiounit::AudioUnit;
use parking_lot::Mutex;
use radiodial_core::{
    AtomicFlag, AtomicFloat, AudioBackend, AudioNode, NoiseBed, PlaybackError, Ramp, Station,
};
use tracing::{debug, info};

use crate::cabinet::output_chain;
use crate::device::AudioDevice;
use crate::graph::{RenderGraph, VoiceGraph, VoiceId};
use crate::loader::{LoadState, SampleLoader};
use crate::voice::{noise_voice, sample_voice, tone_voice, NoiseColor, VoiceParams};
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    /// `None` picks the host's default output device.
    pub device_index: Option<usize>,
    /// Station audio references are resolved against this directory.
    pub audio_root: PathBuf,
    /// Route the mix through the cabinet chain instead of passing it straight out.
    pub cabinet: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            device_index: None,
            audio_root: PathBuf::from("."),
            cabinet: true,
        }
    }
}

pub struct CpalBackend {
    device: Option<AudioDevice>,
    running: Arc<AtomicFlag>,
    graph: Arc<Mutex<VoiceGraph>>,
    loader: SampleLoader,
    audio_root: PathBuf,
    sample_rate: f32,
    peak: Arc<AtomicFloat>,
}

impl CpalBackend {
    /// Open the output device and start rendering.
    pub fn open(config: OutputConfig) -> Result<Self> {
        let mut device = AudioDevice::new(config.device_index)?;
        let sample_rate = device.sample_rate() as f32;

        let (backend, graph) = Self::assemble(&config, sample_rate, device.running_flag())?;
        device.start(graph)?;

        info!(
            "Audio output started: {} Hz, {} channels",
            device.sample_rate(),
            device.channels()
        );
        Ok(Self {
            device: Some(device),
            ..backend
        })
    }

    /// A backend without a device. The caller drives the returned graph,
    /// e.g. to render offline.
    pub fn offline(config: OutputConfig, sample_rate: f32) -> Result<(Self, RenderGraph)> {
        let running = Arc::new(AtomicFlag::new(true));
        Self::assemble(&config, sample_rate, running)
    }

    fn assemble(
        config: &OutputConfig,
        sample_rate: f32,
        running: Arc<AtomicFlag>,
    ) -> Result<(Self, RenderGraph)> {
        let (voices, graph) = VoiceGraph::new(output_chain(config.cabinet), sample_rate)?;
        let loader = SampleLoader::spawn()?;

        let backend = Self {
            device: None,
            running,
            graph: Arc::new(Mutex::new(voices)),
            loader,
            audio_root: config.audio_root.clone(),
            sample_rate,
            peak: graph.peak_meter(),
        };
        Ok((backend, graph))
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Peak absolute output of the most recent block.
    pub fn output_peak(&self) -> f32 {
        self.peak.get()
    }

    /// Voices currently on the bus.
    pub fn voice_count(&self) -> usize {
        self.graph.lock().voice_count()
    }

    pub fn device_name(&self) -> Option<String> {
        self.device.as_ref().and_then(|d| d.device_name().ok())
    }

    /// Stop the device; `is_running()` reports false afterwards.
    pub fn stop(&mut self) {
        if let Some(device) = self.device.as_mut() {
            device.stop();
        }
        self.running.set(false);
    }

    fn insert(
        &self,
        voice: Box<dyn AudioUnit>,
        params: VoiceParams,
        load: Option<Arc<LoadState>>,
    ) -> Result<CpalNode> {
        let id = self.graph.lock().insert(voice)?;
        debug!("Voice {} added to bus", id.index());

        Ok(CpalNode {
            id,
            params,
            graph: Arc::clone(&self.graph),
            load,
            playing: false,
            released: false,
        })
    }
}

impl AudioBackend for CpalBackend {
    type Node = CpalNode;

    fn is_running(&self) -> bool {
        self.running.get()
    }

    fn create_source(&mut self, station: &Station) -> radiodial_core::Result<CpalNode> {
        let state = Arc::new(LoadState::new());
        let params = VoiceParams::new();
        let voice = sample_voice(Arc::clone(&state), &params);
        let node = self.insert(voice, params, Some(Arc::clone(&state)))?;
        let path = self.audio_root.join(station.source.as_str());
        self.loader.request(path, state);
        Ok(node)
    }

    fn create_oscillator(&mut self) -> radiodial_core::Result<CpalNode> {
        let params = VoiceParams::new();
        let voice = tone_voice(&params);
        Ok(self.insert(voice, params, None)?)
    }

    fn create_noise(&mut self, bed: NoiseBed) -> radiodial_core::Result<CpalNode> {
        let color = match bed {
            NoiseBed::Ether => NoiseColor::White,
            NoiseBed::Background => NoiseColor::Brown,
        };
        let params = VoiceParams::new();
        let voice = noise_voice(color, &params);
        Ok(self.insert(voice, params, None)?)
    }
}

/// Control handle for one voice on the bus.
pub struct CpalNode {
    id: VoiceId,
    params: VoiceParams,
    graph: Arc<Mutex<VoiceGraph>>,
    load: Option<Arc<LoadState>>,
    playing: bool,
    released: bool,
}

impl CpalNode {
    pub fn id(&self) -> VoiceId {
        self.id
    }
}

impl AudioNode for CpalNode {
    fn set_gain(&mut self, value: f32, ramp: Ramp) {
        self.params.gain.set(value, ramp);
    }

    fn set_frequency(&mut self, value: f32, ramp: Ramp) {
        self.params.frequency.set(value, ramp);
    }

    fn start(&mut self) -> std::result::Result<(), PlaybackError> {
        if self.released {
            return Err(PlaybackError::Rejected("node released".into()));
        }
        if let Some(load) = &self.load {
            if let Some(reason) = load.failure() {
                return Err(PlaybackError::Decode(reason));
            }
            if !load.is_loaded() {
                return Err(PlaybackError::NotReady);
            }
        }
        self.params.set_gate(true);
        self.playing = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.playing {
            self.params.set_gate(false);
            self.playing = false;
        }
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    /// A failed load also counts as settled; `start()` then reports the decode error.
    fn is_loaded(&self) -> bool {
        self.load.as_ref().map_or(true, |l| l.is_settled())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.stop();
        self.graph.lock().remove(self.id);
        self.released = true;
    }
}

impl Drop for CpalNode {
    fn drop(&mut self) {
        self.release();
    }
}
