//! RadioEngine: the receiver on its own driver thread.
//!
//! The driver owns the [`Receiver`] and is its only caller. UI threads send
//! commands; the driver applies them in order, runs timer work at the
//! receiver's deadlines and publishes a [`ReceiverReport`] after every batch.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use radiodial_core::{
    AudioBackend, Catalog, Clock, PowerState, Receiver, ReceiverReport, SystemClock, TunerConfig,
};
use tracing::debug;

use crate::Result;

enum EngineCommand {
    SetDial(f32),
    PowerOn,
    PowerOff,
    TogglePower,
    SetWhistlesEnabled(bool),
    DisableStation(String),
    Flush(Sender<()>),
    Shutdown,
}

/// Handle to a running receiver.
///
/// Commands never fail: once the driver is gone they are dropped. Dropping the
/// engine stops the driver and releases every audio node.
///
/// # Example
///
/// ```ignore
/// use radiodial::prelude::*;
///
/// let engine = RadioEngine::builder()
///     .catalog(Catalog::from_json_file("stations.json")?)
///     .audio_root("assets/audio")
///     .build()?;
///
/// engine.power_on();
/// engine.set_dial(42.0);
/// println!("{}", engine.snapshot().summary());
/// ```
pub struct RadioEngine {
    command_tx: Sender<EngineCommand>,
    snapshot: Arc<Mutex<ReceiverReport>>,
    thread: Option<JoinHandle<()>>,
}

impl RadioEngine {
    pub fn builder() -> crate::RadioEngineBuilder {
        crate::RadioEngineBuilder::default()
    }

    /// Run the receiver over any backend.
    pub fn with_backend<B>(catalog: Catalog, config: TunerConfig, backend: B) -> Result<Self>
    where
        B: AudioBackend + 'static,
    {
        Self::launch(catalog, config, backend, SystemClock, None)
    }

    pub(crate) fn launch<B, C>(
        catalog: Catalog,
        config: TunerConfig,
        backend: B,
        clock: C,
        debug_log_interval: Option<Duration>,
    ) -> Result<Self>
    where
        B: AudioBackend + 'static,
        C: Clock + 'static,
    {
        let mut receiver = Receiver::with_clock(catalog, config, backend, clock)?;
        receiver.init()?;

        let snapshot = Arc::new(Mutex::new(receiver.report()));
        let (command_tx, command_rx) = unbounded();

        let driver = Driver {
            receiver,
            commands: command_rx,
            snapshot: Arc::clone(&snapshot),
            debug_log_interval,
        };
        let thread = thread::Builder::new()
            .name("radiodial-driver".into())
            .spawn(move || driver.run())?;

        Ok(Self {
            command_tx,
            snapshot,
            thread: Some(thread),
        })
    }

    fn send(&self, command: EngineCommand) {
        let _ = self.command_tx.send(command);
    }

    pub fn set_dial(&self, position: f32) {
        self.send(EngineCommand::SetDial(position));
    }

    pub fn power_on(&self) {
        self.send(EngineCommand::PowerOn);
    }

    pub fn power_off(&self) {
        self.send(EngineCommand::PowerOff);
    }

    pub fn toggle_power(&self) {
        self.send(EngineCommand::TogglePower);
    }

    pub fn set_whistles_enabled(&self, enabled: bool) {
        self.send(EngineCommand::SetWhistlesEnabled(enabled));
    }

    /// Unknown ids are logged and ignored.
    pub fn disable_station(&self, id: impl Into<String>) {
        self.send(EngineCommand::DisableStation(id.into()));
    }

    /// Block until every command sent so far has been applied and published.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if self.command_tx.send(EngineCommand::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Latest published report.
    pub fn snapshot(&self) -> ReceiverReport {
        self.snapshot.lock().clone()
    }

    pub fn power_state(&self) -> PowerState {
        self.snapshot.lock().power
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the driver and release every node. Idempotent.
    pub fn shutdown(&mut self) {
        self.send(EngineCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RadioEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Driver<B: AudioBackend, C: Clock> {
    receiver: Receiver<B, C>,
    commands: crossbeam_channel::Receiver<EngineCommand>,
    snapshot: Arc<Mutex<ReceiverReport>>,
    debug_log_interval: Option<Duration>,
}

impl<B: AudioBackend, C: Clock> Driver<B, C> {
    fn run(mut self) {
        let mut next_log = self.debug_log_interval.map(|i| Instant::now() + i);

        loop {
            let deadline = [self.receiver.next_deadline(), next_log]
                .into_iter()
                .flatten()
                .min();

            let first = match deadline {
                Some(at) => match self.commands.recv_deadline(at) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.commands.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                },
            };

            let mut acks = Vec::new();
            let stop = self.apply_batch(first, &mut acks);

            self.receiver.poll();
            self.publish();
            for ack in acks {
                let _ = ack.send(());
            }
            if stop {
                break;
            }

            if let (Some(at), Some(interval)) = (next_log, self.debug_log_interval) {
                if Instant::now() >= at {
                    debug!("{}", self.receiver.report().summary());
                    next_log = Some(at + interval);
                }
            }
        }

        self.receiver.shutdown();
        self.publish();
        debug!("Driver stopped");
    }

    /// Apply `first` plus everything already queued. Runs of dial commands
    /// collapse to the last position. Returns true on shutdown.
    fn apply_batch(&mut self, first: Option<EngineCommand>, acks: &mut Vec<Sender<()>>) -> bool {
        let mut pending_dial = None;
        let queued: Vec<EngineCommand> = first.into_iter().chain(self.commands.try_iter()).collect();

        for command in queued {
            if let EngineCommand::SetDial(position) = command {
                pending_dial = Some(position);
                continue;
            }
            if let Some(position) = pending_dial.take() {
                self.receiver.on_dial_position_change(position);
            }

            match command {
                EngineCommand::SetDial(_) => {}
                EngineCommand::PowerOn => self.receiver.power_on(),
                EngineCommand::PowerOff => self.receiver.power_off(),
                EngineCommand::TogglePower => self.receiver.toggle_power(),
                EngineCommand::SetWhistlesEnabled(enabled) => {
                    self.receiver.set_whistles_enabled(enabled)
                }
                EngineCommand::DisableStation(id) => {
                    if let Err(e) = self.receiver.disable_station(&id) {
                        debug!("Ignoring disable: {}", e);
                    }
                }
                EngineCommand::Flush(ack) => acks.push(ack),
                EngineCommand::Shutdown => return true,
            }
        }

        if let Some(position) = pending_dial {
            self.receiver.on_dial_position_change(position);
        }
        false
    }

    fn publish(&self) {
        *self.snapshot.lock() = self.receiver.report();
    }
}
