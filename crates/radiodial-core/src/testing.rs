//! Test doubles: a recording backend and a manually advanced clock.
//!
//! Both are cheap handles over shared state, so a test can keep a clone after
//! moving the original into a [`Receiver`](crate::Receiver).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::catalog::Station;
use crate::clock::Clock;
use crate::error::PlaybackError;
use crate::node::{AudioBackend, AudioNode, NoiseBed};
use crate::smooth::Ramp;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Source(String),
    Oscillator,
    Noise(NoiseBed),
}

/// Everything a fake node has been told, last value wins.
#[derive(Debug, Clone)]
pub struct FakeNodeState {
    pub kind: NodeKind,
    pub gain: f32,
    pub frequency: f32,
    pub last_gain_ramp: Ramp,
    pub last_frequency_ramp: Ramp,
    pub gain_writes: usize,
    pub playing: bool,
    pub loaded: bool,
    pub released: bool,
    pub starts: usize,
    pub stops: usize,
    start_failure: Option<PlaybackError>,
}

impl FakeNodeState {
    fn new(kind: NodeKind, loaded: bool) -> Self {
        Self {
            kind,
            gain: 0.0,
            frequency: 0.0,
            last_gain_ramp: Ramp::Immediate,
            last_frequency_ramp: Ramp::Immediate,
            gain_writes: 0,
            playing: false,
            loaded,
            released: false,
            starts: 0,
            stops: 0,
            start_failure: None,
        }
    }
}

pub struct FakeNode {
    state: Arc<Mutex<FakeNodeState>>,
}

impl AudioNode for FakeNode {
    fn set_gain(&mut self, value: f32, ramp: Ramp) {
        let mut state = self.state.lock();
        state.gain = value;
        state.last_gain_ramp = ramp;
        state.gain_writes += 1;
    }

    fn set_frequency(&mut self, value: f32, ramp: Ramp) {
        let mut state = self.state.lock();
        state.frequency = value;
        state.last_frequency_ramp = ramp;
    }

    fn start(&mut self) -> std::result::Result<(), PlaybackError> {
        let mut state = self.state.lock();
        if state.released {
            return Err(PlaybackError::Rejected("node released".into()));
        }
        if !state.loaded {
            return Err(PlaybackError::NotReady);
        }
        if let Some(e) = state.start_failure.clone() {
            return Err(e);
        }
        state.playing = true;
        state.starts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        if state.playing {
            state.playing = false;
            state.stops += 1;
        }
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    fn release(&mut self) {
        self.stop();
        self.state.lock().released = true;
    }
}

#[derive(Default)]
struct FakeBackendInner {
    running: bool,
    fail_creation: bool,
    nodes: Vec<Arc<Mutex<FakeNodeState>>>,
    deferred: HashSet<String>,
    start_failures: HashMap<String, PlaybackError>,
}

/// Backend recording every node it creates.
#[derive(Clone)]
pub struct FakeBackend {
    inner: Arc<Mutex<FakeBackendInner>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    /// A running backend whose sources load instantly.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeBackendInner {
                running: true,
                ..Default::default()
            })),
        }
    }

    pub fn set_running(&self, running: bool) {
        self.inner.lock().running = running;
    }

    /// Every node creation fails from now on.
    pub fn fail_node_creation(&self, fail: bool) {
        self.inner.lock().fail_creation = fail;
    }

    /// Sources for `station_id` start out unloaded until [`finish_load`](Self::finish_load).
    pub fn defer_load(&self, station_id: &str) {
        self.inner.lock().deferred.insert(station_id.to_owned());
    }

    pub fn finish_load(&self, station_id: &str) {
        let mut inner = self.inner.lock();
        inner.deferred.remove(station_id);
        for node in &inner.nodes {
            let mut node = node.lock();
            if node.kind == NodeKind::Source(station_id.to_owned()) {
                node.loaded = true;
            }
        }
    }

    /// `start()` on sources for `station_id` fails with `error`.
    pub fn fail_start(&self, station_id: &str, error: PlaybackError) {
        let mut inner = self.inner.lock();
        inner.start_failures.insert(station_id.to_owned(), error.clone());
        for node in &inner.nodes {
            let mut node = node.lock();
            if node.kind == NodeKind::Source(station_id.to_owned()) {
                node.start_failure = Some(error.clone());
            }
        }
    }

    pub fn clear_start_failure(&self, station_id: &str) {
        let mut inner = self.inner.lock();
        inner.start_failures.remove(station_id);
        for node in &inner.nodes {
            let mut node = node.lock();
            if node.kind == NodeKind::Source(station_id.to_owned()) {
                node.start_failure = None;
            }
        }
    }

    pub fn nodes(&self) -> Vec<FakeNodeState> {
        self.inner.lock().nodes.iter().map(|n| n.lock().clone()).collect()
    }

    /// Most recently created source for `station_id`.
    pub fn source(&self, station_id: &str) -> Option<FakeNodeState> {
        let kind = NodeKind::Source(station_id.to_owned());
        self.nodes().into_iter().rev().find(|n| n.kind == kind)
    }

    pub fn sources(&self) -> Vec<FakeNodeState> {
        self.nodes()
            .into_iter()
            .filter(|n| matches!(n.kind, NodeKind::Source(_)))
            .collect()
    }

    pub fn oscillators(&self) -> Vec<FakeNodeState> {
        self.nodes()
            .into_iter()
            .filter(|n| n.kind == NodeKind::Oscillator)
            .collect()
    }

    pub fn noise(&self, bed: NoiseBed) -> Option<FakeNodeState> {
        self.nodes()
            .into_iter()
            .rev()
            .find(|n| n.kind == NodeKind::Noise(bed))
    }

    fn create(&self, kind: NodeKind) -> Result<FakeNode> {
        let mut inner = self.inner.lock();
        if inner.fail_creation {
            return Err(Error::Backend("node creation disabled".into()));
        }

        let (loaded, failure) = match &kind {
            NodeKind::Source(id) => (
                !inner.deferred.contains(id),
                inner.start_failures.get(id).cloned(),
            ),
            _ => (true, None),
        };
        let mut state = FakeNodeState::new(kind, loaded);
        state.start_failure = failure;

        let state = Arc::new(Mutex::new(state));
        inner.nodes.push(Arc::clone(&state));
        Ok(FakeNode { state })
    }
}

impl AudioBackend for FakeBackend {
    type Node = FakeNode;

    fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    fn create_source(&mut self, station: &Station) -> Result<FakeNode> {
        self.create(NodeKind::Source(station.id.clone()))
    }

    fn create_oscillator(&mut self) -> Result<FakeNode> {
        self.create(NodeKind::Oscillator)
    }

    fn create_noise(&mut self, bed: NoiseBed) -> Result<FakeNode> {
        self.create(NodeKind::Noise(bed))
    }
}

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}
