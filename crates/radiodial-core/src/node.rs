//! Seams between the mixing logic and a concrete audio backend.
//!
//! [`AudioBackend`] creates nodes; [`AudioNode`] is the narrow control surface
//! every node exposes. The real adapter lives in `radiodial-output`; tests use
//! [`testing::FakeBackend`](crate::testing::FakeBackend).

use crate::catalog::Station;
use crate::error::PlaybackError;
use crate::smooth::Ramp;
use crate::Result;

/// Which noise bed a noise node feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoiseBed {
    /// Rises when nothing is tuned in.
    Ether,
    /// Constant hiss, scaled only by master volume.
    Background,
}

/// Control surface of one node in the audio graph.
pub trait AudioNode: Send {
    fn set_gain(&mut self, value: f32, ramp: Ramp);

    /// Ignored by nodes without a pitch.
    fn set_frequency(&mut self, value: f32, ramp: Ramp);

    fn start(&mut self) -> std::result::Result<(), PlaybackError>;

    fn stop(&mut self);

    fn is_playing(&self) -> bool;

    /// Whether the node's audio has finished loading. Generators are always loaded.
    fn is_loaded(&self) -> bool {
        true
    }

    /// Stop and disconnect the node; it is not used again afterwards.
    fn release(&mut self) {
        self.stop();
    }
}

/// Factory for nodes plus the device running predicate.
pub trait AudioBackend: Send {
    type Node: AudioNode;

    /// No automation may be emitted while this is false.
    fn is_running(&self) -> bool;

    /// Playable source for a station's audio. Loading may finish later; see
    /// [`AudioNode::is_loaded`].
    fn create_source(&mut self, station: &Station) -> Result<Self::Node>;

    /// Sine oscillator, created silent.
    fn create_oscillator(&mut self) -> Result<Self::Node>;

    fn create_noise(&mut self, bed: NoiseBed) -> Result<Self::Node>;
}
