//! Mixing and automation engine for an analog radio dial.
//!
//! # Primary API
//!
//! - [`Receiver`]: Entry points (dial, power, timers) and the mix recomputation
//! - [`Catalog`] / [`Station`]: Stations placed along the dial
//! - [`TunerConfig`]: Tuning, fade, noise and whistle constants
//! - [`AudioBackend`] / [`AudioNode`]: What the engine drives
//! - [`ReceiverReport`]: Observable state for a UI
//!
//! # Feature-gated APIs
//!
//! - `"test-utils"`: [`testing::FakeBackend`] and [`testing::ManualClock`]
//!
//! # Example
//!
//! ```ignore
//! use radiodial_core::prelude::*;
//!
//! let catalog = Catalog::from_json_file("stations.json")?;
//! let mut receiver = Receiver::new(catalog, TunerConfig::default(), backend)?;
//! receiver.init()?;
//!
//! receiver.power_on();
//! receiver.on_dial_position_change(42.0);
//! ```

pub mod error;
pub use error::{Error, PlaybackError, Result};

pub mod catalog;
pub use catalog::{Catalog, SourceRef, Station, StationRecord};

pub mod config;
pub use config::{NoiseConfig, TunerConfig, WhistleConfig};

mod clock;
pub use clock::{Clock, SystemClock};

pub(crate) mod lockfree;
pub use lockfree::{AtomicFlag, AtomicFloat};

pub mod node;
pub use node::{AudioBackend, AudioNode, NoiseBed};

pub mod smooth;
pub use smooth::{Ramp, SmoothedValue};

pub mod tuning;
pub use tuning::DialState;

pub mod selector;
pub use selector::select_top_k;

mod source;
pub use source::{ReadySignal, SourceHandle};

pub mod mix;
pub use mix::{MixEngine, MixEntry, MixSnapshot};

pub mod whistle;
pub use whistle::{plan_whistles, whistle_target, VoicePhase, WhistleSynth, WhistleTarget};

pub mod power;
pub use power::{PowerEvent, PowerSequencer, PowerState, TransitionResult};

mod receiver;
pub use receiver::Receiver;

pub mod report;
pub use report::{ReceiverReport, StationReport, WhistleReport};

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub mod prelude {
    pub use crate::{
        AudioBackend, AudioNode, Catalog, Error, NoiseBed, PlaybackError, PowerState, Ramp,
        Receiver, ReceiverReport, Result, Station, TunerConfig,
    };
}
