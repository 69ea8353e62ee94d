//! Fixed cabinet coloration applied to the summed receiver output.
//!
//! The chain is static routing: bandpass, a speaker resonance, soft
//! saturation and a short room reverb. Mixing never touches it; a host can
//! only switch it in or out when the backend is built.

use fundsp::prelude::*;

pub const HIGHPASS_HZ: f32 = 250.0;
pub const LOWPASS_HZ: f32 = 4500.0;
pub const RESONANCE_HZ: f32 = 1200.0;
pub const DRIVE: f32 = 1.6;
pub const WET: f32 = 0.12;

/// Small-speaker cabinet: 250 Hz - 4.5 kHz band, a bump near 1.2 kHz, mild
/// drive and a short, dark room.
pub fn cabinet_chain() -> An<impl AudioNode<Inputs = U1, Outputs = U1>> {
    let band = highpass_hz(HIGHPASS_HZ, 0.707)
        >> lowpass_hz(LOWPASS_HZ, 0.707)
        >> bell_hz(RESONANCE_HZ, 2.0, 2.0);
    let colored = band >> shape(Tanh(DRIVE)) * (1.0 / DRIVE.tanh());
    let room = split::<U2>() >> reverb_stereo(8.0, 0.4, 0.7) >> join::<U2>();

    colored >> ((pass() * (1.0 - WET)) & (room * WET))
}

/// The unit a backend routes its mix through.
pub fn output_chain(cabinet: bool) -> Box<dyn AudioUnit> {
    if cabinet {
        Box::new(cabinet_chain())
    } else {
        Box::new(pass())
    }
}
