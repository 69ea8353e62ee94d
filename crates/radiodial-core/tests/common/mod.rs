//! Fixtures shared by the radiodial-core integration tests.

#![allow(dead_code)]

use std::time::Duration;

use radiodial_core::testing::{FakeBackend, ManualClock};
use radiodial_core::{Catalog, Receiver, StationRecord, TunerConfig};

pub type TestReceiver = Receiver<FakeBackend, ManualClock>;

pub fn record(id: &str, position: f32, strength: f32, sigma: f32) -> StationRecord {
    StationRecord {
        id: id.to_owned(),
        title: id.to_uppercase(),
        description: String::new(),
        audio_ref: format!("audio/{id}.wav"),
        position,
        strength,
        sigma,
    }
}

/// Four stations spread over the default 0-100 dial.
pub fn test_catalog() -> Catalog {
    Catalog::new([
        record("jazz", 20.0, 0.9, 2.0),
        record("news", 50.0, 0.9, 2.0),
        record("rock", 53.0, 0.6, 3.0),
        record("opera", 80.0, 0.8, 2.5),
    ])
    .expect("valid test catalog")
}

pub fn test_receiver(config: TunerConfig) -> (TestReceiver, FakeBackend, ManualClock) {
    test_receiver_with(test_catalog(), config, FakeBackend::new())
}

pub fn test_receiver_with(
    catalog: Catalog,
    config: TunerConfig,
    backend: FakeBackend,
) -> (TestReceiver, FakeBackend, ManualClock) {
    let clock = ManualClock::new();
    let mut receiver = Receiver::with_clock(catalog, config, backend.clone(), clock.clone())
        .expect("Failed to create test receiver");
    receiver.init().expect("Failed to init test receiver");
    (receiver, backend, clock)
}

/// Power on and drive the fade to completion with the manual clock.
pub fn power_on_and_settle(receiver: &mut TestReceiver, clock: &ManualClock) {
    let settle = receiver.config().fade_duration + Duration::from_millis(50);
    receiver.power_on();
    run_for(receiver, clock, settle);
}

/// Advance the clock in fade-interval steps, polling after each.
pub fn run_for(receiver: &mut TestReceiver, clock: &ManualClock, total: Duration) {
    let step = receiver.config().fade_interval;
    let mut elapsed = Duration::ZERO;
    while elapsed < total {
        clock.advance(step);
        receiver.poll();
        elapsed += step;
    }
}
