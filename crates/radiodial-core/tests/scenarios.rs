//! End-to-end receiver scenarios against the fake backend.
//!
//! Run with:
//! ```bash
//! cargo test -p radiodial-core --test scenarios
//! ```

mod common;

use std::time::Duration;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use radiodial_core::prelude::*;
use radiodial_core::testing::FakeBackend;
use radiodial_core::{whistle_target, WhistleConfig};

use common::*;

#[test]
fn test_peak_and_falloff_reach_the_source_gain() {
    let catalog = Catalog::new([record("center", 50.0, 0.9, 2.0)]).unwrap();
    let (mut rx, backend, clock) =
        test_receiver_with(catalog, TunerConfig::default(), FakeBackend::new());
    power_on_and_settle(&mut rx, &clock);

    rx.on_dial_position_change(50.0);
    let source = backend.source("center").unwrap();
    assert_relative_eq!(source.gain, 0.9, epsilon = 1e-6);
    assert!(source.playing);
    assert_eq!(source.last_gain_ramp, Ramp::Immediate);

    rx.on_dial_position_change(52.0);
    let expected = 0.9 * (-0.5f32).exp();
    assert_relative_eq!(backend.source("center").unwrap().gain, expected, epsilon = 1e-5);
    assert_relative_eq!(rx.report().station("center").unwrap().volume, 0.546, epsilon = 1e-3);
}

#[test]
fn test_fourth_loudest_station_is_muted() {
    // Co-located stations so the dial yields exactly these volumes.
    let catalog = Catalog::new([
        record("a", 50.0, 0.8, 5.0),
        record("b", 50.0, 0.3, 5.0),
        record("c", 50.0, 0.1, 5.0),
        record("d", 50.0, 0.05, 5.0),
    ])
    .unwrap();
    let (mut rx, backend, clock) =
        test_receiver_with(catalog, TunerConfig::default(), FakeBackend::new());
    power_on_and_settle(&mut rx, &clock);
    rx.on_dial_position_change(50.0);

    let selected: Vec<&str> = rx
        .mix_snapshot()
        .selected()
        .map(|e| e.station_id.as_str())
        .collect();
    assert_eq!(selected, vec!["a", "b", "c"]);

    for id in ["a", "b", "c"] {
        assert!(backend.source(id).unwrap().playing, "{id} should play");
    }
    let d = rx.report();
    let d = d.station("d").unwrap();
    assert_relative_eq!(d.volume, 0.05, epsilon = 1e-6);
    assert!(!d.selected);
    assert!(!d.playing);
    assert!(backend.source("d").map_or(true, |s| !s.playing && s.gain == 0.0));
}

#[test]
fn test_deselected_source_is_stopped() {
    let (mut rx, backend, clock) = test_receiver(TunerConfig::default());
    power_on_and_settle(&mut rx, &clock);

    rx.on_dial_position_change(20.0);
    assert!(backend.source("jazz").unwrap().playing);

    rx.on_dial_position_change(80.0);
    let jazz = backend.source("jazz").unwrap();
    assert!(!jazz.playing);
    assert_eq!(jazz.gain, 0.0);
    assert!(backend.source("opera").unwrap().playing);
}

#[test]
fn test_whistle_frequency_and_ceiling() {
    let config = WhistleConfig::default();
    let station = Station::try_from(record("s", 50.0, 1.0, 2.0)).unwrap();

    let near = whistle_target(55.0, &station, &config);
    assert_relative_eq!(near.frequency, 5000.0);
    let expected = 0.06 * (-0.5f32 * (5.0f32 / 1.5).powi(2)).exp();
    assert_relative_eq!(near.gain, expected, max_relative = 1e-5);

    let far = whistle_target(59.0, &station, &config);
    assert_relative_eq!(far.frequency, 8000.0);
    let reduction = (8000.0f32 / 9000.0).sqrt();
    assert_relative_eq!(reduction, 0.943, epsilon = 1e-3);
    let expected = 0.06 * (-0.5f32 * (9.0f32 / 1.5).powi(2)).exp() * reduction;
    assert_relative_eq!(far.gain, expected, max_relative = 1e-5);
}

#[test]
fn test_whistle_voice_targets_follow_dial() {
    let catalog = Catalog::new([record("s", 50.0, 1.0, 2.0)]).unwrap();
    let (mut rx, _, clock) = test_receiver_with(catalog, TunerConfig::default(), FakeBackend::new());
    power_on_and_settle(&mut rx, &clock);

    rx.on_dial_position_change(55.0);
    let whistle = rx.report().station("s").unwrap().whistle.clone().unwrap();
    assert!(whistle.target_gain > 0.0);

    rx.on_dial_position_change(50.1);
    let whistle = rx.report().station("s").unwrap().whistle.clone().unwrap();
    assert_eq!(whistle.target_gain, 0.0);
}

#[test]
fn test_power_off_mid_fade_restarts_from_zero() {
    let config = TunerConfig {
        fade_duration: Duration::from_millis(1000),
        fade_interval: Duration::from_millis(20),
        ..Default::default()
    };
    let (mut rx, backend, clock) = test_receiver(config);
    rx.on_dial_position_change(20.0);
    rx.power_on();

    run_for(&mut rx, &clock, Duration::from_millis(400));
    assert_eq!(rx.power_state(), PowerState::FadingIn);
    assert_relative_eq!(rx.master_volume(), 0.4, epsilon = 1e-3);

    rx.power_off();
    assert_eq!(rx.power_state(), PowerState::Off);
    assert_eq!(rx.master_volume(), 0.0);
    assert!(backend.sources().iter().all(|s| !s.playing && s.gain == 0.0));
    assert!(backend.oscillators().iter().all(|o| o.gain == 0.0));
    assert_eq!(backend.noise(NoiseBed::Ether).unwrap().gain, 0.0);

    rx.power_on();
    assert_eq!(rx.master_volume(), 0.0);
    run_for(&mut rx, &clock, Duration::from_millis(20));
    assert!(rx.master_volume() < 0.1);
    assert_eq!(rx.power_state(), PowerState::FadingIn);
}

#[test]
fn test_fade_completes_at_full_volume() {
    let (mut rx, _, clock) = test_receiver(TunerConfig::default());
    power_on_and_settle(&mut rx, &clock);

    assert_eq!(rx.power_state(), PowerState::On);
    assert_eq!(rx.master_volume(), 1.0);
    assert!(rx.next_deadline().is_none());
}

#[test]
fn test_ether_tracks_tuning() {
    let (mut rx, backend, clock) = test_receiver(TunerConfig::default());
    power_on_and_settle(&mut rx, &clock);
    let noise = rx.config().noise.clone();

    rx.on_dial_position_change(35.0);
    let ether = backend.noise(NoiseBed::Ether).unwrap();
    assert!(ether.playing);
    assert_abs_diff_eq!(ether.gain, noise.max_ether_volume, epsilon = 1e-3);

    rx.on_dial_position_change(20.0);
    let ether = backend.noise(NoiseBed::Ether).unwrap();
    assert_relative_eq!(ether.gain, noise.max_ether_volume * (1.0 - 0.9), epsilon = 1e-4);

    let background = backend.noise(NoiseBed::Background).unwrap();
    assert_relative_eq!(background.gain, noise.background_volume);
}

#[test]
fn test_dial_clamped_to_range() {
    let (mut rx, _, _) = test_receiver(TunerConfig::default());
    rx.on_dial_position_change(140.0);
    assert_eq!(rx.dial_position(), 100.0);
    rx.on_dial_position_change(-3.0);
    assert_eq!(rx.dial_position(), 0.0);
    rx.on_dial_position_change(f32::NAN);
    assert_eq!(rx.dial_position(), 0.0);
}

#[test]
fn test_whistles_disabled_releases_voices() {
    let (mut rx, backend, clock) = test_receiver(TunerConfig::default());
    power_on_and_settle(&mut rx, &clock);
    assert_eq!(rx.whistle_voice_count(), 4);

    rx.set_whistles_enabled(false);
    assert_eq!(rx.whistle_voice_count(), 0);
    assert!(backend.oscillators().iter().all(|o| o.released));

    rx.set_whistles_enabled(true);
    rx.on_dial_position_change(25.0);
    assert_eq!(rx.whistle_voice_count(), 4);
    assert_eq!(backend.oscillators().len(), 8);
}
