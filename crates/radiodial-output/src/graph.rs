//! The voice bus: a fundsp [`Net`] edited on the control thread and rendered
//! by its [`NetBackend`] on the audio thread.
//!
//! Voices are chained. Each slot takes the bus so far and adds itself; the
//! last slot feeds the output chain. A released slot is swapped for `pass()`
//! so the chain stays intact, and the next voice inserted reuses it.

use std::sync::Arc;

use fundsp::audiounit::AudioUnit;
use fundsp::net::{Net, NodeId};
use fundsp::prelude::pass;
use fundsp::realnet::NetBackend;
use radiodial_core::AtomicFloat;

use crate::{Error, Result};

/// Slot index of a voice on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(pub(crate) usize);

impl VoiceId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Control-thread half of the bus.
pub struct VoiceGraph {
    net: Net,
    output: NodeId,
    slots: Vec<NodeId>,
    free: Vec<usize>,
    sample_rate: f64,
}

impl VoiceGraph {
    /// Build the bus around `output_chain` (one input, one output) and return
    /// the audio-thread half alongside it.
    pub fn new(mut output_chain: Box<dyn AudioUnit>, sample_rate: f32) -> Result<(Self, RenderGraph)> {
        check_slot_shape(output_chain.as_ref())?;
        let sample_rate = sample_rate as f64;

        let mut net = Net::new(0, 1);
        net.set_sample_rate(sample_rate);
        output_chain.set_sample_rate(sample_rate);
        let output = net.push(output_chain);
        net.pipe_output(output);
        let backend = net.backend();

        let graph = Self {
            net,
            output,
            slots: Vec::with_capacity(64),
            free: Vec::new(),
            sample_rate,
        };
        Ok((graph, RenderGraph::new(backend)))
    }

    /// Add a voice to the bus. `voice` must take the bus as its single input
    /// and output the bus with itself mixed in.
    pub fn insert(&mut self, mut voice: Box<dyn AudioUnit>) -> Result<VoiceId> {
        check_slot_shape(voice.as_ref())?;
        voice.set_sample_rate(self.sample_rate);

        let index = match self.free.pop() {
            Some(index) => {
                self.net.replace(self.slots[index], voice);
                index
            }
            None => {
                let node = self.net.push(voice);
                if let Some(&tail) = self.slots.last() {
                    self.net.connect(tail, 0, node, 0);
                }
                self.net.connect(node, 0, self.output, 0);
                self.slots.push(node);
                self.slots.len() - 1
            }
        };

        self.commit();
        Ok(VoiceId(index))
    }

    /// Take a voice off the bus. Unknown or already free slots are ignored.
    pub fn remove(&mut self, id: VoiceId) {
        let Some(&node) = self.slots.get(id.0) else {
            return;
        };
        if self.free.contains(&id.0) {
            return;
        }
        self.net.replace(node, Box::new(pass()));
        self.free.push(id.0);
        self.commit();
    }

    pub fn voice_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate as f32
    }

    fn commit(&mut self) {
        if self.net.has_backend() {
            self.net.commit();
        }
    }
}

fn check_slot_shape(unit: &dyn AudioUnit) -> Result<()> {
    if unit.inputs() != 1 || unit.outputs() != 1 {
        return Err(Error::VoiceShape {
            inputs: unit.inputs(),
            outputs: unit.outputs(),
        });
    }
    Ok(())
}

/// Audio-thread half of the bus, moved into the device callback.
pub struct RenderGraph {
    backend: NetBackend,
    peak: Arc<AtomicFloat>,
}

impl RenderGraph {
    fn new(backend: NetBackend) -> Self {
        Self {
            backend,
            peak: Arc::new(AtomicFloat::new(0.0)),
        }
    }

    /// Peak absolute output of the last block.
    pub fn peak_meter(&self) -> Arc<AtomicFloat> {
        Arc::clone(&self.peak)
    }

    /// Render one mono block into `out`. Committed bus edits land first.
    pub fn process(&mut self, out: &mut [f32]) {
        let mut peak = 0.0f32;
        for sample in out.iter_mut() {
            *sample = self.backend.get_mono();
            peak = peak.max(sample.abs());
        }
        self.peak.set(peak);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundsp::prelude::dc;

    const SR: f32 = 48000.0;

    fn bus() -> (VoiceGraph, RenderGraph) {
        VoiceGraph::new(Box::new(pass()), SR).unwrap()
    }

    fn level(value: f32) -> Box<dyn AudioUnit> {
        Box::new(pass() + dc(value))
    }

    fn render(graph: &mut RenderGraph, len: usize) -> Vec<f32> {
        let mut out = vec![0.0; len];
        graph.process(&mut out);
        out
    }

    #[test]
    fn test_voices_sum() {
        let (mut voices, mut render_graph) = bus();
        for _ in 0..3 {
            voices.insert(level(0.1)).unwrap();
        }

        let out = render(&mut render_graph, 4);
        assert!(out.iter().all(|&s| (s - 0.3).abs() < 1e-6), "{out:?}");
        assert_eq!(voices.voice_count(), 3);
    }

    #[test]
    fn test_removed_slot_keeps_chain() {
        let (mut voices, mut render_graph) = bus();
        voices.insert(level(0.1)).unwrap();
        let middle = voices.insert(level(0.2)).unwrap();
        voices.insert(level(0.4)).unwrap();

        voices.remove(middle);
        let out = render(&mut render_graph, 4);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6), "{out:?}");
        assert_eq!(voices.voice_count(), 2);
    }

    #[test]
    fn test_free_slot_reused() {
        let (mut voices, _render_graph) = bus();
        voices.insert(level(0.1)).unwrap();
        let freed = voices.insert(level(0.2)).unwrap();

        voices.remove(freed);
        voices.remove(freed);
        let reused = voices.insert(level(0.3)).unwrap();

        assert_eq!(reused, freed);
        assert_eq!(voices.slot_count(), 2);
        assert_eq!(voices.voice_count(), 2);
    }

    #[test]
    fn test_wrong_shape_rejected() {
        let (mut voices, _render_graph) = bus();
        let err = voices.insert(Box::new(dc(0.1))).unwrap_err();
        assert!(matches!(
            err,
            Error::VoiceShape {
                inputs: 0,
                outputs: 1
            }
        ));
        assert_eq!(voices.slot_count(), 0);
    }

    #[test]
    fn test_output_chain_applied() {
        let (mut voices, mut render_graph) =
            VoiceGraph::new(Box::new(pass() * 0.5), SR).unwrap();
        voices.insert(level(0.4)).unwrap();

        let out = render(&mut render_graph, 4);
        assert!(out.iter().all(|&s| (s - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_peak_meter() {
        let (mut voices, mut render_graph) = bus();
        voices.insert(level(-0.25)).unwrap();

        render(&mut render_graph, 16);
        assert!((render_graph.peak_meter().get() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_empty_bus_is_silent() {
        let (_voices, mut render_graph) = bus();
        let out = render(&mut render_graph, 8);
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
