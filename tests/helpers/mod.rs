//! Test helpers and fixtures for radiodial engine tests.

#![allow(dead_code)]

use std::time::{Duration, Instant};

use radiodial::core::testing::FakeBackend;
use radiodial::core::StationRecord;
use radiodial::prelude::*;

pub fn record(id: &str, position: f32) -> StationRecord {
    StationRecord {
        id: id.to_owned(),
        title: id.to_uppercase(),
        description: String::new(),
        audio_ref: format!("{id}.wav"),
        position,
        strength: 0.9,
        sigma: 2.0,
    }
}

pub fn test_catalog() -> Catalog {
    Catalog::new([record("jazz", 20.0), record("news", 50.0), record("opera", 80.0)])
        .expect("valid test catalog")
}

/// Short fade so tests settle quickly.
pub fn fast_config() -> TunerConfig {
    TunerConfig {
        fade_duration: Duration::from_millis(60),
        fade_interval: Duration::from_millis(5),
        ..Default::default()
    }
}

pub fn test_engine() -> (RadioEngine, FakeBackend) {
    let backend = FakeBackend::new();
    let engine = RadioEngine::with_backend(test_catalog(), fast_config(), backend.clone())
        .expect("Failed to create test engine");
    (engine, backend)
}

/// Poll `done` until it holds or a generous timeout passes.
pub fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    done()
}
