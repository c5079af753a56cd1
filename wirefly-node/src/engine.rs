//! TickEngine - drives the phase machine with real I/O.
//!
//! The engine interprets [`Action`]s from [`TickPhase`]: it publishes
//! through the relay and hands events to the display stream. One
//! [`TickEngine::step`] is one subtick and never sleeps, so tests can run
//! an exact number of subticks. [`TickEngine::run`] adds the timing and
//! stops on a shutdown signal or when the inbound stream closes.
//!
//! ```text
//! InboundStream::try_next → TickPhase::step → [Display | Publish | Halt]
//! ```

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wirefly_core::{Action, DisplayEvent, Observation, TickConfig, TickPhase};

use crate::display::DisplaySink;
use crate::relay::{InboundStream, MessageRelay, TryNext};
use crate::shutdown;
use crate::transport::Subscription;

/// Counters kept by a running engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Completed cycles (own ticks).
    pub cycles: u64,
    /// External ticks consumed.
    pub external_ticks: u64,
    /// Publishes the transport rejected.
    pub publish_failures: u64,
}

/// Result of one subtick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Keep stepping.
    Continue,
    /// The inbound stream closed; further steps do nothing.
    Halted,
}

/// Why [`TickEngine::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineExit {
    /// The shutdown signal fired.
    Cancelled,
    /// The relay stopped delivering.
    InboundClosed,
}

/// Final state of a spawned engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineReport {
    /// Why the engine stopped.
    pub exit: EngineExit,
    /// Counters at exit.
    pub stats: EngineStats,
}

/// Pulse-coupled tick engine for one peer.
pub struct TickEngine<S: Subscription> {
    phase: TickPhase,
    relay: Arc<MessageRelay<S>>,
    inbound: InboundStream,
    display: DisplaySink,
    display_open: bool,
    stats: EngineStats,
}

impl<S: Subscription + 'static> TickEngine<S> {
    /// Create an engine at the start of a cycle.
    pub fn new(
        config: TickConfig,
        relay: Arc<MessageRelay<S>>,
        inbound: InboundStream,
        display: DisplaySink,
    ) -> Self {
        Self::starting_at(config, relay, inbound, display, 0)
    }

    /// Create an engine with an initial phase offset.
    pub fn starting_at(
        config: TickConfig,
        relay: Arc<MessageRelay<S>>,
        inbound: InboundStream,
        display: DisplaySink,
        subtick: u32,
    ) -> Self {
        let phase = TickPhase::starting_at(config, relay.local_peer().clone(), subtick);
        Self {
            phase,
            relay,
            inbound,
            display,
            display_open: true,
            stats: EngineStats::default(),
        }
    }

    /// Run one subtick without sleeping.
    ///
    /// Takes at most one message from the inbound stream.
    pub async fn step(&mut self) -> StepOutcome {
        if self.phase.is_halted() {
            return StepOutcome::Halted;
        }

        let observation = match self.inbound.try_next() {
            TryNext::Message(message) => Observation::Heard(message),
            TryNext::Empty => Observation::Quiet,
            TryNext::Closed => Observation::Closed,
        };

        let mut outcome = StepOutcome::Continue;
        for action in self.phase.step(observation) {
            match action {
                Action::Display(event) => self.show(event).await,
                Action::Publish { content } => {
                    if let Err(e) = self.relay.publish(&content).await {
                        self.stats.publish_failures += 1;
                        warn!(error = %e, failures = self.stats.publish_failures, "tick publish failed");
                    }
                }
                Action::Halt => {
                    info!(
                        cycles = self.phase.cycles(),
                        "inbound stream closed, engine halting"
                    );
                    outcome = StepOutcome::Halted;
                }
            }
        }

        self.stats.cycles = self.phase.cycles();
        self.stats.external_ticks = self.phase.external_ticks();
        outcome
    }

    /// Step every subtick until `shutdown` fires or the inbound stream
    /// closes.
    ///
    /// A dropped shutdown sender counts as a shutdown.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> EngineExit {
        let period = self.phase.config().subtick_duration;
        debug!(?period, subtick = self.phase.subtick(), "engine running");

        loop {
            tokio::select! {
                biased;
                _ = shutdown::requested(&mut shutdown) => break,
                _ = tokio::time::sleep(period) => {}
            }

            tokio::select! {
                biased;
                _ = shutdown::requested(&mut shutdown) => break,
                outcome = self.step() => {
                    if outcome == StepOutcome::Halted {
                        return EngineExit::InboundClosed;
                    }
                }
            }
        }

        info!(cycles = self.stats.cycles, "engine cancelled");
        EngineExit::Cancelled
    }

    /// Run on a tokio task.
    pub fn spawn(mut self, shutdown: watch::Receiver<bool>) -> JoinHandle<EngineReport> {
        tokio::spawn(async move {
            let exit = self.run(shutdown).await;
            EngineReport {
                exit,
                stats: self.stats,
            }
        })
    }

    /// Counters so far.
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Subticks elapsed in the current cycle.
    pub fn subtick(&self) -> u32 {
        self.phase.subtick()
    }

    /// Check if the engine stopped for good.
    pub fn is_halted(&self) -> bool {
        self.phase.is_halted()
    }

    async fn show(&mut self, event: DisplayEvent) {
        if !self.display_open {
            return;
        }
        if self.display.emit(event).await.is_err() {
            // Keep ticking for the other peers
            info!("display consumer gone, continuing without display");
            self.display_open = false;
        }
    }
}

impl<S: Subscription> std::fmt::Debug for TickEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickEngine")
            .field("phase", &self.phase)
            .field("stats", &self.stats)
            .finish()
    }
}
