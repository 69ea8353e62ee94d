//! Builder for configuring and constructing a `RadioEngine` on a real device.

use std::path::PathBuf;
use std::time::Duration;

use radiodial_core::{Catalog, SystemClock, TunerConfig};
use radiodial_output::{CpalBackend, OutputConfig};

use crate::{Error, RadioEngine, Result};

/// The sample rate is determined by the output device.
///
/// # Example
///
/// ```ignore
/// use radiodial::prelude::*;
///
/// let engine = RadioEngine::builder()
///     .catalog(catalog)
///     .config(TunerConfig::from_toml_file("tuner.toml")?)
///     .output_device(1)
///     .build()?;
/// ```
#[derive(Default)]
pub struct RadioEngineBuilder {
    catalog: Option<Catalog>,
    config: TunerConfig,
    output: OutputConfig,
    debug_log_interval: Option<Duration>,
}

impl RadioEngineBuilder {
    /// Required.
    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn config(mut self, config: TunerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn output_device(mut self, index: usize) -> Self {
        self.output.device_index = Some(index);
        self
    }

    /// Directory station audio references are resolved against. Default: `.`
    pub fn audio_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.output.audio_root = path.into();
        self
    }

    /// Default: true
    pub fn cabinet(mut self, enabled: bool) -> Self {
        self.output.cabinet = enabled;
        self
    }

    /// Log the receiver report at `debug` level every `interval`. Off by default.
    pub fn debug_log_interval(mut self, interval: Duration) -> Self {
        self.debug_log_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<RadioEngine> {
        let catalog = self.catalog.ok_or(Error::MissingCatalog)?;
        self.config.validate()?;

        let backend = CpalBackend::open(self.output)?;
        RadioEngine::launch(
            catalog,
            self.config,
            backend,
            SystemClock,
            self.debug_log_interval,
        )
    }
}
