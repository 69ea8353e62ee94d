//! Station source handles and their readiness signal.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::PlaybackError;
use crate::node::AudioNode;
use crate::smooth::Ramp;

/// Readiness of one source, resolved exactly once.
///
/// Resolves when the node reports loaded, or is forced after the timeout so a
/// stuck source never blocks selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadySignal {
    Pending { since: Instant },
    Ready { forced: bool },
}

impl ReadySignal {
    pub fn pending(now: Instant) -> Self {
        ReadySignal::Pending { since: now }
    }

    /// Returns true only on the call that resolves the signal.
    pub fn poll(&mut self, loaded: bool, now: Instant, timeout: Duration) -> bool {
        let ReadySignal::Pending { since } = *self else {
            return false;
        };

        if loaded {
            *self = ReadySignal::Ready { forced: false };
            true
        } else if now.saturating_duration_since(since) >= timeout {
            *self = ReadySignal::Ready { forced: true };
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadySignal::Ready { .. })
    }

    pub fn deadline(&self, timeout: Duration) -> Option<Instant> {
        match self {
            ReadySignal::Pending { since } => Some(*since + timeout),
            ReadySignal::Ready { .. } => None,
        }
    }
}

/// Retry bookkeeping for a source that was ready but not actually loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartRetry {
    Idle,
    Scheduled(Instant),
    Abandoned,
}

/// A station paired with its playable node.
///
/// Never playing unless ready.
pub struct SourceHandle<N> {
    station_id: String,
    node: N,
    ready: ReadySignal,
    retry: StartRetry,
}

impl<N: AudioNode> SourceHandle<N> {
    pub fn new(station_id: impl Into<String>, node: N, now: Instant) -> Self {
        Self {
            station_id: station_id.into(),
            node,
            ready: ReadySignal::pending(now),
            retry: StartRetry::Idle,
        }
    }

    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.ready.is_ready() && self.node.is_playing()
    }

    pub fn is_pending(&self) -> bool {
        !self.ready.is_ready()
    }

    /// Returns true when the source became ready on this call.
    pub fn poll_ready(&mut self, now: Instant, timeout: Duration) -> bool {
        let loaded = self.node.is_loaded();
        let resolved = self.ready.poll(loaded, now, timeout);
        if resolved && !loaded {
            warn!(
                "Source '{}' did not load within {:?}, marking ready",
                self.station_id, timeout
            );
        }
        resolved
    }

    /// Earliest instant at which this source needs attention again.
    pub fn deadline(&self, timeout: Duration) -> Option<Instant> {
        match self.retry {
            StartRetry::Scheduled(at) => Some(at),
            _ => self.ready.deadline(timeout),
        }
    }

    pub fn retry_due(&self, now: Instant) -> bool {
        matches!(self.retry, StartRetry::Scheduled(at) if now >= at)
    }

    /// Move a scheduled retry no earlier than `until`.
    pub fn defer_retry(&mut self, until: Instant) {
        if let StartRetry::Scheduled(at) = &mut self.retry {
            *at = (*at).max(until);
        }
    }

    pub fn set_gain(&mut self, value: f32) {
        self.node.set_gain(value, Ramp::Immediate);
    }

    /// Start playback if the source is selected, ready and not already playing.
    pub fn ensure_playing(&mut self, now: Instant, retry_delay: Duration) {
        if !self.ready.is_ready() || self.node.is_playing() {
            return;
        }
        match self.retry {
            StartRetry::Abandoned => return,
            StartRetry::Scheduled(at) if now < at => return,
            _ => {}
        }

        match self.node.start() {
            Ok(()) => {
                debug!("Started source '{}'", self.station_id);
                self.retry = StartRetry::Idle;
            }
            Err(PlaybackError::NotReady) => {
                self.retry = match self.retry {
                    StartRetry::Idle => StartRetry::Scheduled(now + retry_delay),
                    _ => {
                        debug!("Source '{}' still not loaded, giving up", self.station_id);
                        StartRetry::Abandoned
                    }
                };
            }
            Err(e) => {
                // Picked up again on the next cycle while still selected.
                warn!("Failed to start source '{}': {}", self.station_id, e);
                self.retry = StartRetry::Idle;
            }
        }
    }

    /// Leave the selected set: silence and stop decoding.
    pub fn deselect(&mut self) {
        if self.node.is_playing() {
            self.node.set_gain(0.0, Ramp::Immediate);
            self.node.stop();
            debug!("Stopped source '{}'", self.station_id);
        }
        self.retry = StartRetry::Idle;
    }

    pub fn silence(&mut self) {
        self.node.set_gain(0.0, Ramp::Immediate);
        self.node.stop();
        self.retry = StartRetry::Idle;
    }

    pub fn release(mut self) {
        self.node.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use crate::AudioBackend;

    const TIMEOUT: Duration = Duration::from_secs(5);
    const RETRY: Duration = Duration::from_millis(250);

    fn station(id: &str) -> crate::Station {
        crate::Station {
            id: id.into(),
            title: String::new(),
            description: String::new(),
            position: 10.0,
            strength: 1.0,
            sigma: 1.0,
            source: crate::SourceRef(format!("{id}.wav")),
        }
    }

    #[test]
    fn test_ready_signal_resolves_once() {
        let t0 = Instant::now();
        let mut signal = ReadySignal::pending(t0);

        assert!(!signal.poll(false, t0, TIMEOUT));
        assert!(signal.poll(true, t0, TIMEOUT));
        assert!(!signal.poll(true, t0, TIMEOUT));
        assert_eq!(signal, ReadySignal::Ready { forced: false });
    }

    #[test]
    fn test_ready_signal_forced_after_timeout() {
        let t0 = Instant::now();
        let mut signal = ReadySignal::pending(t0);

        assert!(!signal.poll(false, t0 + Duration::from_secs(4), TIMEOUT));
        assert!(signal.poll(false, t0 + TIMEOUT, TIMEOUT));
        assert_eq!(signal, ReadySignal::Ready { forced: true });
    }

    #[test]
    fn test_not_started_before_ready() {
        let mut backend = FakeBackend::new();
        backend.defer_load("a");
        let t0 = Instant::now();
        let mut handle = SourceHandle::new("a", backend.create_source(&station("a")).unwrap(), t0);

        handle.ensure_playing(t0, RETRY);
        assert!(!handle.is_playing());
        assert_eq!(backend.source("a").unwrap().starts, 0);

        backend.finish_load("a");
        assert!(handle.poll_ready(t0, TIMEOUT));
        handle.ensure_playing(t0, RETRY);
        assert!(handle.is_playing());
    }

    #[test]
    fn test_forced_ready_retries_once_then_abandons() {
        let mut backend = FakeBackend::new();
        backend.defer_load("a");
        let t0 = Instant::now();
        let mut handle = SourceHandle::new("a", backend.create_source(&station("a")).unwrap(), t0);

        let t1 = t0 + TIMEOUT;
        assert!(handle.poll_ready(t1, TIMEOUT));
        handle.ensure_playing(t1, RETRY);
        assert!(!handle.is_playing());
        assert_eq!(handle.deadline(TIMEOUT), Some(t1 + RETRY));

        // Not due yet: no second attempt.
        handle.ensure_playing(t1 + Duration::from_millis(100), RETRY);
        assert!(!handle.retry_due(t1 + Duration::from_millis(100)));

        assert!(handle.retry_due(t1 + RETRY));
        handle.ensure_playing(t1 + RETRY, RETRY);
        assert_eq!(handle.deadline(TIMEOUT), None);

        // Abandoned even once the audio shows up.
        backend.finish_load("a");
        handle.ensure_playing(t1 + RETRY * 4, RETRY);
        assert!(!handle.is_playing());

        // Leaving and re-entering the selection resets the retry budget.
        handle.deselect();
        handle.ensure_playing(t1 + RETRY * 5, RETRY);
        assert!(handle.is_playing());
    }

    #[test]
    fn test_start_failure_retried_next_cycle() {
        let mut backend = FakeBackend::new();
        backend.fail_start("a", PlaybackError::Rejected("autoplay policy".into()));
        let t0 = Instant::now();
        let mut handle = SourceHandle::new("a", backend.create_source(&station("a")).unwrap(), t0);
        handle.poll_ready(t0, TIMEOUT);

        handle.ensure_playing(t0, RETRY);
        assert!(!handle.is_playing());

        backend.clear_start_failure("a");
        handle.ensure_playing(t0, RETRY);
        assert!(handle.is_playing());
    }

    #[test]
    fn test_deselect_stops_playback() {
        let mut backend = FakeBackend::new();
        let t0 = Instant::now();
        let mut handle = SourceHandle::new("a", backend.create_source(&station("a")).unwrap(), t0);
        handle.poll_ready(t0, TIMEOUT);
        handle.ensure_playing(t0, RETRY);
        handle.set_gain(0.8);

        handle.deselect();
        let state = backend.source("a").unwrap();
        assert!(!state.playing);
        assert_eq!(state.gain, 0.0);
        assert_eq!(state.stops, 1);
    }
}
