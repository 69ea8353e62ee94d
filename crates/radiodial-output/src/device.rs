//! CPAL output device running the render graph.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use radiodial_core::AtomicFlag;
use tracing::warn;

use crate::graph::RenderGraph;
use crate::{Error, Result};

/// Wrapper to hold `cpal::Stream` in a `Send` context.
///
/// # Safety
/// `cpal::Stream` is `!Send` due to platform internals. The stream is only
/// created, held and dropped by the thread that owns the backend; it is never
/// used from the audio callback.
struct StreamHandle(#[allow(dead_code)] cpal::Stream);

unsafe impl Send for StreamHandle {}

pub struct AudioDevice {
    sample_rate: u32,
    channels: usize,
    device_index: Option<usize>,
    running: Arc<AtomicFlag>,
    _stream: Option<StreamHandle>,
}

impl AudioDevice {
    pub fn new(device_index: Option<usize>) -> Result<Self> {
        let device = get_device(device_index)?;
        let config = device.default_output_config()?;

        Ok(Self {
            sample_rate: config.sample_rate().0,
            channels: config.channels() as usize,
            device_index,
            running: Arc::new(AtomicFlag::new(false)),
            _stream: None,
        })
    }

    /// Move `graph` into the device callback and start the stream.
    pub fn start(&mut self, graph: RenderGraph) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let device = get_device(self.device_index)?;
        let config = device.default_output_config()?;
        let running = Arc::clone(&self.running);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), graph, running)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), graph, running)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config.into(), graph, running)?,
            format => {
                return Err(Error::UnsupportedFormat(format!("{format:?}")));
            }
        };

        stream.play()?;
        self._stream = Some(StreamHandle(stream));
        self.running.set(true);

        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.set(false);
        self._stream = None;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// False before `start()` and after the stream reported an error.
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub(crate) fn running_flag(&self) -> Arc<AtomicFlag> {
        Arc::clone(&self.running)
    }

    pub fn device_name(&self) -> Result<String> {
        Ok(get_device(self.device_index)?.name()?)
    }

    pub fn list_devices() -> Result<Vec<String>> {
        cpal::default_host()
            .output_devices()?
            .enumerate()
            .map(|(i, d)| Ok(format!("{i}: {}", d.name()?)))
            .collect()
    }
}

fn get_device(index: Option<usize>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    match index {
        Some(i) => {
            let devices: Vec<_> = host.output_devices()?.collect();
            let count = devices.len();
            devices.into_iter().nth(i).ok_or_else(|| {
                Error::InvalidDevice(format!("Device index {i} out of range ({count} available)"))
            })
        }
        None => host
            .default_output_device()
            .ok_or_else(|| Error::InvalidDevice("No output device available".into())),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut graph: RenderGraph,
    running: Arc<AtomicFlag>,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;

    // Grows on the first callback, then stable
    let mut mono = Vec::<f32>::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let frames = data.len() / channels;
                if mono.len() < frames {
                    mono.resize(frames, 0.0);
                }
                graph.process(&mut mono[..frames]);
                write_output(data, channels, &mono[..frames]);
            }));

            if result.is_err() {
                output_silence(data);
            }
        },
        move |err| {
            warn!("Audio stream error: {}", err);
            running.set(false);
        },
        None,
    )?;

    Ok(stream)
}

/// Copy the mono mix into every device channel.
#[inline]
fn write_output<T: cpal::SizedSample + cpal::FromSample<f32>>(
    data: &mut [T],
    channels: usize,
    mono: &[f32],
) {
    for (frame, &value) in data.chunks_mut(channels).zip(mono) {
        let value = T::from_sample(value.clamp(-1.0, 1.0));
        frame.fill(value);
    }
}

/// Output silence (panic recovery).
#[inline]
fn output_silence<T: cpal::SizedSample + cpal::FromSample<f32>>(data: &mut [T]) {
    for sample in data.iter_mut() {
        *sample = T::from_sample(0.0);
    }
}
