//! # Radiodial - Analog Radio Dial Simulator
//!
//! Real-time mixing and automation engine behind a virtual radio dial.
//!
//! ## Architecture
//!
//! Radiodial is an umbrella crate that coordinates:
//! - **radiodial-core** - Tuning model, top-K selection, noise and whistle automation, power fade
//! - **radiodial-output** - CPAL device, render graph, WAV loading, cabinet chain
//!
//! ## Quick Start
//!
//! ```ignore
//! use radiodial::prelude::*;
//!
//! let engine = RadioEngine::builder()
//!     .catalog(Catalog::from_json_file("stations.json")?)
//!     .audio_root("assets/audio")
//!     .build()?;
//!
//! engine.power_on();
//! engine.set_dial(42.0);
//! ```

/// Re-export of radiodial-core for direct access
pub use radiodial_core as core;

/// Re-export of radiodial-output for direct access
pub use radiodial_output as output;

pub use radiodial_core::{
    AudioBackend, AudioNode, Catalog, PowerState, ReceiverReport, Station, StationReport,
    TunerConfig, WhistleReport,
};
pub use radiodial_output::{CpalBackend, OutputConfig};

mod builder;
mod engine;
mod error;

pub use builder::RadioEngineBuilder;
pub use engine::RadioEngine;
pub use error::{Error, Result};

pub mod prelude {
    pub use crate::{
        Catalog, Error, PowerState, RadioEngine, ReceiverReport, Result, Station, TunerConfig,
    };
}
