//! CPAL output backend for the radiodial receiver.
//!
//! # Primary API
//!
//! - [`CpalBackend`] / [`OutputConfig`]: [`AudioBackend`](radiodial_core::AudioBackend) on a real device
//! - [`VoiceGraph`] / [`RenderGraph`]: fundsp voice bus, control and audio halves
//! - [`tone_voice`], [`noise_voice`], [`sample_voice`]: Voices driven by [`VoiceParams`]
//! - [`SampleLoader`]: Background WAV decoding
//! - [`cabinet_chain`]: Fixed output coloration
//!
//! # Example
//!
//! ```ignore
//! use radiodial_output::{CpalBackend, OutputConfig};
//!
//! let backend = CpalBackend::open(OutputConfig {
//!     audio_root: "assets/audio".into(),
//!     ..Default::default()
//! })?;
//! ```

pub mod error;
pub use error::{Error, Result};

mod backend;
pub use backend::{CpalBackend, CpalNode, OutputConfig};

pub mod cabinet;
pub use cabinet::{cabinet_chain, output_chain};

mod device;
pub use device::AudioDevice;

mod graph;
pub use graph::{RenderGraph, VoiceGraph, VoiceId};

mod loader;
pub use loader::{decode_wav, decode_wav_file, LoadState, SampleLoader};

mod voice;
pub use voice::{
    noise_voice, sample_voice, tone_voice, Glide, NoiseColor, Param, SampleData, SamplePlayer,
    VoiceParams,
};
