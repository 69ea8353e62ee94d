//! Background WAV decoding for station sources.
//!
//! Decoding happens on a dedicated thread. The finished buffer is published
//! through the shared [`LoadState`], which the voice's sample player reads on
//! the audio thread and the mixer's readiness polling observes.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use radiodial_core::AtomicFlag;
use tracing::{debug, warn};

use crate::voice::SampleData;
use crate::{Error, Result};

/// Load progress shared between the loader thread and a source node.
#[derive(Debug)]
pub struct LoadState {
    data: OnceLock<SampleData>,
    failed: AtomicFlag,
    error: Mutex<Option<String>>,
}

impl LoadState {
    pub fn new() -> Self {
        Self {
            data: OnceLock::new(),
            failed: AtomicFlag::new(false),
            error: Mutex::new(None),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.data.get().is_some()
    }

    /// The decoded audio, once loaded.
    pub fn sample(&self) -> Option<&SampleData> {
        self.data.get()
    }

    pub fn is_failed(&self) -> bool {
        self.failed.get()
    }

    /// Loaded or failed.
    pub fn is_settled(&self) -> bool {
        self.is_loaded() || self.is_failed()
    }

    pub fn failure(&self) -> Option<String> {
        if !self.failed.get() {
            return None;
        }
        self.error.lock().clone()
    }

    /// Publish decoded audio. Only the first buffer stored sticks.
    pub(crate) fn store(&self, data: SampleData) {
        let _ = self.data.set(data);
    }

    fn mark_failed(&self, reason: String) {
        *self.error.lock() = Some(reason);
        self.failed.set(true);
    }
}

impl Default for LoadState {
    fn default() -> Self {
        Self::new()
    }
}

struct LoadRequest {
    path: PathBuf,
    state: Arc<LoadState>,
}

enum LoaderCommand {
    Load(LoadRequest),
    Shutdown,
}

pub struct SampleLoader {
    command_tx: Sender<LoaderCommand>,
    thread: Option<JoinHandle<()>>,
}

impl SampleLoader {
    pub fn spawn() -> Result<Self> {
        let (command_tx, command_rx) = unbounded();
        let thread = thread::Builder::new()
            .name("radiodial-loader".into())
            .spawn(move || loader_loop(command_rx))?;

        Ok(Self {
            command_tx,
            thread: Some(thread),
        })
    }

    pub fn request(&self, path: PathBuf, state: Arc<LoadState>) {
        let request = LoadRequest { path, state };
        if let Err(e) = self.command_tx.send(LoaderCommand::Load(request)) {
            if let LoaderCommand::Load(request) = e.into_inner() {
                request.state.mark_failed("loader stopped".into());
            }
        }
    }

    pub fn shutdown(&mut self) {
        let _ = self.command_tx.send(LoaderCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SampleLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn loader_loop(commands: Receiver<LoaderCommand>) {
    while let Ok(command) = commands.recv() {
        let request = match command {
            LoaderCommand::Load(request) => request,
            LoaderCommand::Shutdown => break,
        };

        match decode_wav_file(&request.path) {
            Ok(data) => {
                debug!(
                    "Loaded {} ({:.1}s at {} Hz)",
                    request.path.display(),
                    data.duration_secs(),
                    data.sample_rate()
                );
                request.state.store(data);
            }
            Err(e) => {
                warn!("Failed to load {}: {}", request.path.display(), e);
                request.state.mark_failed(e.to_string());
            }
        }
    }
}

pub fn decode_wav_file(path: &Path) -> Result<SampleData> {
    let reader = hound::WavReader::open(path)?;
    let data = decode_wav(reader)?;
    if data.is_empty() {
        return Err(Error::EmptyAudio(path.display().to_string()));
    }
    Ok(data)
}

/// Decode any WAV stream to mono f32, averaging channels.
pub fn decode_wav<R: Read>(mut reader: hound::WavReader<R>) -> Result<SampleData> {
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let frames = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    Ok(SampleData::new(frames, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::time::{Duration, Instant};

    fn write_wav(path: &Path, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn wait_settled(state: &LoadState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !state.is_settled() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_decode_downmixes_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, &[16384, 0, -16384, -16384, 0, 32767]);

        let data = decode_wav_file(&path).unwrap();
        assert_eq!(data.sample_rate(), 22050);
        assert_eq!(data.len(), 3);
        assert_relative_eq!(data.frames()[0], 0.25, epsilon = 1e-4);
        assert_relative_eq!(data.frames()[1], -0.5, epsilon = 1e-4);
        assert_relative_eq!(data.frames()[2], 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_decode_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for s in [0.1f32, -0.2, 0.3] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let data = decode_wav_file(&path).unwrap();
        assert_eq!(data.frames(), &[0.1, -0.2, 0.3]);
    }

    #[test]
    fn test_empty_wav_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, 1, &[]);
        assert!(matches!(decode_wav_file(&path), Err(Error::EmptyAudio(_))));
    }

    #[test]
    fn test_loader_stores_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, &[0, 8192, 16384]);

        let loader = SampleLoader::spawn().unwrap();
        let state = Arc::new(LoadState::new());
        assert!(state.sample().is_none());
        loader.request(path, Arc::clone(&state));
        wait_settled(&state);

        assert!(state.is_loaded());
        assert!(!state.is_failed());
        assert_eq!(state.sample().map(SampleData::len), Some(3));
    }

    #[test]
    fn test_first_stored_buffer_wins() {
        let state = LoadState::new();
        state.store(SampleData::new(vec![0.1], 8000));
        state.store(SampleData::new(vec![0.2, 0.3], 8000));
        assert_eq!(state.sample().map(SampleData::frames), Some(&[0.1][..]));
    }

    #[test]
    fn test_loader_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = SampleLoader::spawn().unwrap();
        let state = Arc::new(LoadState::new());
        loader.request(dir.path().join("missing.wav"), Arc::clone(&state));
        wait_settled(&state);

        assert!(!state.is_loaded());
        assert!(state.failure().is_some());
    }
}
