//! Effects engine - control plane and signal plane
//!
//! `FxEngine` is the handle the host keeps on its own threads. Commands go
//! through the [`ImpulseWorker`], which makes sure any reverb preset a
//! command needs is already in the cache, then on to the [`FxProcessor`]
//! that the audio callback owns. The audio thread therefore never
//! synthesizes an impulse response and never blocks on the control plane.

use crate::chain::{ChainState, EffectChain, EffectSlot};
use crate::effects::{CompressorState, DelayState, Effect, EqState, FilterState, ReverbState};
use crate::reverb::ImpulseCache;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Commands sent to the effects engine
#[derive(Debug, Clone)]
pub enum FxCommand {
    UpdateEq(EqState),
    UpdateCompressor(CompressorState),
    UpdateFilter(FilterState),
    UpdateDelay(DelayState),
    UpdateReverb(ReverbState),
    ApplyState(ChainState),
    SetOrder([EffectSlot; 5]),
    Shutdown,
}

/// Events sent from the audio thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FxEvent {
    /// Periodic level report
    Meter {
        compressor_reduction_db: f32,
        peak_l: f32,
        peak_r: f32,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("effects engine is no longer running")]
    Disconnected,
    #[error("command queue is full")]
    QueueFull,
    #[error("failed to spawn impulse worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Meter reports per second
const METER_RATE_HZ: f32 = 20.0;

/// Signal-plane half of the engine, owned by the audio callback
pub struct FxProcessor {
    chain: EffectChain,
    command_rx: Receiver<FxCommand>,
    event_tx: Sender<FxEvent>,
    running: bool,
    meter_interval: usize,
    meter_frames: usize,
    peak_l: f32,
    peak_r: f32,
}

impl FxProcessor {
    pub fn new(
        chain: EffectChain,
        command_rx: Receiver<FxCommand>,
        event_tx: Sender<FxEvent>,
    ) -> Self {
        let meter_interval = ((chain.sample_rate() / METER_RATE_HZ) as usize).max(1);
        Self {
            chain,
            command_rx,
            event_tx,
            running: true,
            meter_interval,
            meter_frames: 0,
            peak_l: 0.0,
            peak_r: 0.0,
        }
    }

    /// Apply a single command to the chain
    pub fn handle_command(&mut self, cmd: FxCommand) {
        if !self.running {
            return;
        }

        match cmd {
            FxCommand::UpdateEq(state) => self.chain.apply_eq(&state),
            FxCommand::UpdateCompressor(state) => self.chain.apply_compressor(&state),
            FxCommand::UpdateFilter(state) => self.chain.apply_filter(&state),
            FxCommand::UpdateDelay(state) => self.chain.apply_delay(&state),
            FxCommand::UpdateReverb(state) => self.chain.apply_reverb(&state),
            FxCommand::ApplyState(state) => self.chain.apply_state(&state),
            FxCommand::SetOrder(order) => {
                self.chain.set_order(order);
            }
            FxCommand::Shutdown => {
                self.running = false;
                self.chain.dispose();
            }
        }
    }

    /// Apply every pending command; returns how many were handled
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(cmd) = self.command_rx.try_recv() {
            self.handle_command(cmd);
            handled += 1;
        }
        handled
    }

    /// Drain commands, then run the chain over one buffer
    pub fn process(&mut self, samples: &mut [f32]) {
        self.drain();
        self.chain.process(samples);

        for frame in samples.chunks_exact(2) {
            self.peak_l = self.peak_l.max(frame[0].abs());
            self.peak_r = self.peak_r.max(frame[1].abs());
        }
        self.meter_frames += samples.len() / 2;
        if self.meter_frames >= self.meter_interval {
            // Dropped if the host is not reading events
            let _ = self.event_tx.try_send(self.meter());
            self.meter_frames = 0;
            self.peak_l = 0.0;
            self.peak_r = 0.0;
        }
    }

    /// Levels accumulated since the last report
    pub fn meter(&self) -> FxEvent {
        let compressor = self.chain.compressor();
        let compressor_reduction_db = if compressor.is_enabled() {
            compressor.reduction_db()
        } else {
            0.0
        };
        FxEvent::Meter {
            compressor_reduction_db,
            peak_l: self.peak_l,
            peak_r: self.peak_r,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn chain(&self) -> &EffectChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut EffectChain {
        &mut self.chain
    }
}

/// How long the worker waits on a full signal-plane queue before rechecking shutdown
const FORWARD_POLL: Duration = Duration::from_millis(20);

/// Upper bound on how long `shutdown` waits for the worker
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Background thread that pre-warms the impulse cache ahead of the audio thread
pub struct ImpulseWorker {
    handle: Option<JoinHandle<()>>,
}

impl ImpulseWorker {
    /// Spawn the worker; it forwards every command from `rx` to `tx` in order
    /// until `Shutdown` passes through or `shutdown` is raised while stalled
    pub fn spawn(
        sample_rate: u32,
        cache: Arc<ImpulseCache>,
        rx: Receiver<FxCommand>,
        tx: Sender<FxCommand>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self, EngineError> {
        let handle = thread::Builder::new()
            .name("vela-impulse".into())
            .spawn(move || Self::run(sample_rate, &cache, rx, tx, &shutdown))?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    fn run(
        sample_rate: u32,
        cache: &ImpulseCache,
        rx: Receiver<FxCommand>,
        tx: Sender<FxCommand>,
        shutdown: &AtomicBool,
    ) {
        for cmd in rx.iter() {
            match &cmd {
                FxCommand::UpdateReverb(state) => {
                    cache.get_or_synthesize(state.preset, sample_rate);
                }
                FxCommand::ApplyState(state) => {
                    cache.get_or_synthesize(state.reverb.preset, sample_rate);
                }
                _ => {}
            }

            let last = matches!(cmd, FxCommand::Shutdown);
            if !Self::forward(&tx, cmd, shutdown) || last {
                break;
            }
        }
        tracing::debug!("impulse worker stopped");
    }

    /// Hand a command to the signal plane; false once it can no longer be delivered
    fn forward(tx: &Sender<FxCommand>, mut cmd: FxCommand, shutdown: &AtomicBool) -> bool {
        loop {
            match tx.send_timeout(cmd, FORWARD_POLL) {
                Ok(()) => return true,
                Err(SendTimeoutError::Disconnected(_)) => return false,
                Err(SendTimeoutError::Timeout(pending)) => {
                    if shutdown.load(Ordering::Relaxed) {
                        tracing::warn!("signal plane not draining, abandoning queued commands");
                        return false;
                    }
                    cmd = pending;
                }
            }
        }
    }

    /// Wait up to `timeout` for the worker thread to exit; true if it did
    pub fn join_timeout(&mut self, timeout: Duration) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                // Detached; it exits on its own once its current step completes
                tracing::warn!("impulse worker still busy at shutdown, detaching");
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        if handle.join().is_err() {
            tracing::error!("impulse worker panicked");
        }
        true
    }
}

/// Control-plane handle to the effects engine
pub struct FxEngine {
    command_tx: Sender<FxCommand>,
    event_rx: Receiver<FxEvent>,
    shutdown: Arc<AtomicBool>,
    worker: ImpulseWorker,
}

impl FxEngine {
    /// Create channels for engine communication
    /// Buffer size of 1024 provides headroom for command bursts without saturation
    pub fn create_channels() -> (
        Sender<FxCommand>,
        Receiver<FxCommand>,
        Sender<FxEvent>,
        Receiver<FxEvent>,
    ) {
        let (cmd_tx, cmd_rx) = bounded(1024);
        let (evt_tx, evt_rx) = bounded(1024);
        (cmd_tx, cmd_rx, evt_tx, evt_rx)
    }

    /// Build the chain, spawn the impulse worker and hand back both planes
    pub fn start(
        sample_rate: f32,
        cache: Arc<ImpulseCache>,
    ) -> Result<(FxEngine, FxProcessor), EngineError> {
        let (cmd_tx, worker_rx, evt_tx, evt_rx) = Self::create_channels();
        let (worker_tx, proc_rx) = bounded(1024);
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker = ImpulseWorker::spawn(
            ImpulseCache::rate_key(sample_rate),
            Arc::clone(&cache),
            worker_rx,
            worker_tx,
            Arc::clone(&shutdown),
        )?;
        let processor = FxProcessor::new(EffectChain::new(sample_rate, cache), proc_rx, evt_tx);

        tracing::info!(sample_rate, "effects engine started");
        let engine = FxEngine {
            command_tx: cmd_tx,
            event_rx: evt_rx,
            shutdown,
            worker,
        };
        Ok((engine, processor))
    }

    /// Queue a command without blocking
    pub fn send(&self, cmd: FxCommand) -> Result<(), EngineError> {
        match self.command_tx.try_send(cmd) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(cmd)) => {
                tracing::warn!(?cmd, "command queue full, dropping command");
                Err(EngineError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(EngineError::Disconnected),
        }
    }

    pub fn update_eq(&self, state: EqState) -> Result<(), EngineError> {
        self.send(FxCommand::UpdateEq(state))
    }

    pub fn update_compressor(&self, state: CompressorState) -> Result<(), EngineError> {
        self.send(FxCommand::UpdateCompressor(state))
    }

    pub fn update_filter(&self, state: FilterState) -> Result<(), EngineError> {
        self.send(FxCommand::UpdateFilter(state))
    }

    pub fn update_delay(&self, state: DelayState) -> Result<(), EngineError> {
        self.send(FxCommand::UpdateDelay(state))
    }

    pub fn update_reverb(&self, state: ReverbState) -> Result<(), EngineError> {
        self.send(FxCommand::UpdateReverb(state))
    }

    pub fn apply_state(&self, state: ChainState) -> Result<(), EngineError> {
        self.send(FxCommand::ApplyState(state))
    }

    pub fn set_order(&self, order: [EffectSlot; 5]) -> Result<(), EngineError> {
        self.send(FxCommand::SetOrder(order))
    }

    /// Next pending event, if any
    pub fn try_recv_event(&self) -> Option<FxEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn events(&self) -> &Receiver<FxEvent> {
        &self.event_rx
    }

    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Stop the engine: the processor disposes the chain once the command arrives
    ///
    /// Never waits on the signal plane for longer than a bounded timeout, so a
    /// stalled audio callback cannot hang the caller.
    pub fn shutdown(&mut self) {
        if self.shutdown.swap(true, Ordering::Relaxed) {
            return;
        }
        match self.command_tx.send_timeout(FxCommand::Shutdown, FORWARD_POLL) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                tracing::warn!("command queue full at shutdown");
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                tracing::debug!("worker already gone at shutdown");
            }
        }
        self.worker.join_timeout(SHUTDOWN_TIMEOUT);
        tracing::info!("effects engine stopped");
    }
}

impl Drop for FxEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
