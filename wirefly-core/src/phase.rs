//! Tick phase state machine.
//!
//! Each cycle is split into `subticks_per_cycle` subticks. Once per subtick
//! the driver reports what it saw on the inbound stream; hearing another
//! peer's tick advances the local phase by a fraction of the progress
//! already made (`subtick += floor(subtick * bump_factor)`), so peers that
//! hear each other fire earlier and earlier until they fire together.
//!
//! This module is pure: the driver (wirefly-node) sleeps, polls and
//! executes the returned [`Action`]s.

use std::time::Duration;
use thiserror::Error;
use wirefly_types::TickMessage;

use crate::event::{DisplayEvent, LocalPeer};

/// Subticks in one full cycle.
pub const SUBTICKS_PER_CYCLE: u32 = 250;

/// Wall-clock length of one subtick (250 * 10ms = 2.5s per cycle).
pub const SUBTICK_DURATION: Duration = Duration::from_millis(10);

/// Fraction of the elapsed phase added when another peer's tick is heard.
pub const BUMP_FACTOR: f64 = 0.08;

/// Content broadcast on every completed cycle.
pub const TICK_CONTENT: &str = "tick";

/// Tunables for the oscillator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickConfig {
    /// Subticks in one cycle.
    pub subticks_per_cycle: u32,
    /// Length of one subtick.
    pub subtick_duration: Duration,
    /// Coupling strength.
    pub bump_factor: f64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            subticks_per_cycle: SUBTICKS_PER_CYCLE,
            subtick_duration: SUBTICK_DURATION,
            bump_factor: BUMP_FACTOR,
        }
    }
}

impl TickConfig {
    /// Cycle period when no other peer is heard.
    pub fn nominal_cycle(&self) -> Duration {
        self.subtick_duration * self.subticks_per_cycle
    }

    /// Check that the oscillator can run with these values.
    pub fn validate(&self) -> Result<(), InvalidTickConfig> {
        if self.subticks_per_cycle == 0 {
            return Err(InvalidTickConfig::ZeroSubticks);
        }
        if self.subtick_duration.is_zero() {
            return Err(InvalidTickConfig::ZeroDuration);
        }
        if !self.bump_factor.is_finite() || !(0.0..=1.0).contains(&self.bump_factor) {
            return Err(InvalidTickConfig::BumpFactor(self.bump_factor));
        }
        Ok(())
    }
}

/// Rejected [`TickConfig`] values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidTickConfig {
    /// A cycle needs at least one subtick.
    #[error("subticks_per_cycle must be at least 1")]
    ZeroSubticks,
    /// Subticks must take time.
    #[error("subtick duration must be non-zero")]
    ZeroDuration,
    /// Coupling outside `[0, 1]` or not a number.
    #[error("bump_factor must be a finite value in [0, 1], got {0}")]
    BumpFactor(f64),
}

/// Advance `subtick` after hearing one external tick.
///
/// Returns `subtick + floor(subtick * factor)`, never less than `subtick`.
pub fn bump(subtick: u32, factor: f64) -> u32 {
    // `as` saturates and maps NaN to 0, so the advance is never negative.
    let advance = (f64::from(subtick) * factor).floor() as u32;
    subtick.saturating_add(advance)
}

/// Phase state - NO I/O, just transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    /// Counting subticks toward the next tick.
    Running {
        /// Subticks elapsed in the current cycle.
        subtick: u32,
    },
    /// The inbound stream closed; no further work is produced.
    Halted {
        /// Subtick at which the machine stopped.
        subtick: u32,
    },
}

/// What the driver saw on the inbound stream during one subtick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Nothing was waiting.
    Quiet,
    /// One tick from another peer.
    Heard(TickMessage),
    /// The inbound stream is permanently closed.
    Closed,
}

/// Actions to be executed by the driver, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Hand an event to the presentation layer.
    Display(DisplayEvent),
    /// Broadcast our own tick.
    Publish {
        /// Content to broadcast.
        content: String,
    },
    /// Stop driving this machine.
    Halt,
}

/// Pulse-coupled oscillator for one peer.
#[derive(Debug, Clone)]
pub struct TickPhase {
    config: TickConfig,
    local: LocalPeer,
    state: PhaseState,
    cycles: u64,
    external_ticks: u64,
}

impl TickPhase {
    /// Create a machine at the start of a cycle.
    pub fn new(config: TickConfig, local: LocalPeer) -> Self {
        Self::starting_at(config, local, 0)
    }

    /// Create a machine with an initial phase offset.
    ///
    /// `subtick` is clamped below the cycle length.
    pub fn starting_at(config: TickConfig, local: LocalPeer, subtick: u32) -> Self {
        let subtick = subtick.min(config.subticks_per_cycle.saturating_sub(1));
        Self {
            config,
            local,
            state: PhaseState::Running { subtick },
            cycles: 0,
            external_ticks: 0,
        }
    }

    /// Process one subtick and return the actions to execute.
    ///
    /// At most one external tick is consumed per subtick, so a burst of
    /// simultaneous ticks is absorbed over several subticks.
    pub fn step(&mut self, observation: Observation) -> Vec<Action> {
        match (self.state, observation) {
            (PhaseState::Halted { .. }, _) => vec![],
            (PhaseState::Running { subtick }, Observation::Closed) => {
                self.state = PhaseState::Halted { subtick };
                vec![Action::Halt]
            }
            (PhaseState::Running { subtick }, Observation::Quiet) => self.advance(subtick, None),
            (PhaseState::Running { subtick }, Observation::Heard(message)) => {
                self.advance(subtick, Some(message))
            }
        }
    }

    fn advance(&mut self, mut subtick: u32, heard: Option<TickMessage>) -> Vec<Action> {
        let mut actions = Vec::new();

        if let Some(message) = heard {
            actions.push(Action::Display(DisplayEvent::external(&message)));
            subtick = bump(subtick, self.config.bump_factor);
            self.external_ticks += 1;
        }

        subtick = subtick.saturating_add(1);

        if subtick >= self.config.subticks_per_cycle {
            actions.push(Action::Publish {
                content: TICK_CONTENT.to_string(),
            });
            actions.push(Action::Display(DisplayEvent::self_tick(&self.local)));
            subtick = 0;
            self.cycles += 1;
        }

        self.state = PhaseState::Running { subtick };
        actions
    }

    /// Current state.
    pub fn state(&self) -> PhaseState {
        self.state
    }

    /// Subticks elapsed in the current cycle.
    pub fn subtick(&self) -> u32 {
        match self.state {
            PhaseState::Running { subtick } | PhaseState::Halted { subtick } => subtick,
        }
    }

    /// Completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// External ticks consumed.
    pub fn external_ticks(&self) -> u64 {
        self.external_ticks
    }

    /// Check if the machine has stopped.
    pub fn is_halted(&self) -> bool {
        matches!(self.state, PhaseState::Halted { .. })
    }

    /// Tunables in use.
    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    /// Identity used for self-tick events.
    pub fn local(&self) -> &LocalPeer {
        &self.local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DisplayKind;

    fn local() -> LocalPeer {
        LocalPeer::new("peer-a", "alice")
    }

    fn heard() -> Observation {
        Observation::Heard(TickMessage::new(TICK_CONTENT, "peer-b", "bob"))
    }

    fn publishes(actions: &[Action]) -> usize {
        actions
            .iter()
            .filter(|a| matches!(a, Action::Publish { .. }))
            .count()
    }

    fn self_ticks(actions: &[Action]) -> usize {
        actions
            .iter()
            .filter(|a| matches!(a, Action::Display(e) if e.kind == DisplayKind::SelfTick))
            .count()
    }

    // ===========================================
    // Config Tests
    // ===========================================

    #[test]
    fn default_config_matches_constants() {
        let config = TickConfig::default();
        assert_eq!(config.subticks_per_cycle, 250);
        assert_eq!(config.subtick_duration, Duration::from_millis(10));
        assert_eq!(config.bump_factor, 0.08);
        assert_eq!(config.nominal_cycle(), Duration::from_millis(2500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_configs_rejected() {
        let base = TickConfig::default();

        let zero_subticks = TickConfig {
            subticks_per_cycle: 0,
            ..base
        };
        assert_eq!(zero_subticks.validate(), Err(InvalidTickConfig::ZeroSubticks));

        let zero_duration = TickConfig {
            subtick_duration: Duration::ZERO,
            ..base
        };
        assert_eq!(zero_duration.validate(), Err(InvalidTickConfig::ZeroDuration));

        for factor in [-0.1, 1.5, f64::NAN, f64::INFINITY] {
            let bad = TickConfig {
                bump_factor: factor,
                ..base
            };
            assert!(matches!(
                bad.validate(),
                Err(InvalidTickConfig::BumpFactor(_))
            ));
        }
    }

    // ===========================================
    // Bump Formula Tests
    // ===========================================

    #[test]
    fn bump_matches_formula() {
        assert_eq!(bump(50, BUMP_FACTOR), 54);
        assert_eq!(bump(100, BUMP_FACTOR), 108);
        assert_eq!(bump(249, BUMP_FACTOR), 268);
        assert_eq!(bump(12, BUMP_FACTOR), 12); // floor(0.96) = 0
        assert_eq!(bump(0, BUMP_FACTOR), 0);
    }

    #[test]
    fn bump_is_monotonic() {
        for subtick in 0..=1000 {
            assert!(bump(subtick, BUMP_FACTOR) >= subtick);
        }
        assert_eq!(bump(u32::MAX, 1.0), u32::MAX);
        assert_eq!(bump(10, f64::NAN), 10);
    }

    // ===========================================
    // Cycle Tests
    // ===========================================

    #[test]
    fn quiet_cycle_publishes_once_after_250_subticks() {
        let mut phase = TickPhase::new(TickConfig::default(), local());

        for i in 1..SUBTICKS_PER_CYCLE {
            let actions = phase.step(Observation::Quiet);
            assert!(actions.is_empty(), "unexpected actions at subtick {i}");
            assert_eq!(phase.subtick(), i);
        }

        let actions = phase.step(Observation::Quiet);
        assert_eq!(publishes(&actions), 1);
        assert_eq!(self_ticks(&actions), 1);
        assert_eq!(actions.len(), 2);
        assert_eq!(phase.subtick(), 0);
        assert_eq!(phase.cycles(), 1);
    }

    #[test]
    fn publish_precedes_self_display() {
        let mut phase = TickPhase::starting_at(TickConfig::default(), local(), 249);
        let actions = phase.step(Observation::Quiet);

        assert_eq!(
            actions[0],
            Action::Publish {
                content: "tick".into()
            }
        );
        match &actions[1] {
            Action::Display(event) => {
                assert!(event.is_self());
                assert_eq!(event.sender_id, "peer-a");
                assert_eq!(event.sender_peer_name, "alice");
            }
            other => panic!("expected self display, got {other:?}"),
        }
    }

    #[test]
    fn heard_tick_bumps_then_increments() {
        let mut phase = TickPhase::starting_at(TickConfig::default(), local(), 50);
        let actions = phase.step(heard());

        // 50 + floor(50 * 0.08) = 54, plus the regular subtick
        assert_eq!(phase.subtick(), 55);
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::Display(event) => {
                assert_eq!(event.kind, DisplayKind::ExternalTick);
                assert_eq!(event.sender_peer_name, "bob");
            }
            other => panic!("expected external display, got {other:?}"),
        }
        assert_eq!(phase.external_ticks(), 1);
    }

    #[test]
    fn heard_tick_near_end_completes_cycle() {
        let mut phase = TickPhase::starting_at(TickConfig::default(), local(), 240);
        let actions = phase.step(heard());

        assert_eq!(actions.len(), 3);
        assert!(matches!(&actions[0], Action::Display(e) if e.kind == DisplayKind::ExternalTick));
        assert!(matches!(&actions[1], Action::Publish { .. }));
        assert!(matches!(&actions[2], Action::Display(e) if e.is_self()));
        assert_eq!(phase.subtick(), 0);
    }

    #[test]
    fn heard_tick_at_cycle_start_has_no_effect() {
        let mut phase = TickPhase::new(TickConfig::default(), local());
        phase.step(heard());
        assert_eq!(phase.subtick(), 1);
    }

    #[test]
    fn each_heard_tick_bumps_separately() {
        let mut phase = TickPhase::starting_at(TickConfig::default(), local(), 100);
        phase.step(heard()); // 100 -> 108 -> 109
        phase.step(heard()); // 109 -> 117 -> 118
        assert_eq!(phase.subtick(), 118);
        assert_eq!(phase.external_ticks(), 2);
    }

    #[test]
    fn external_ticks_shorten_the_cycle() {
        let mut quiet = TickPhase::new(TickConfig::default(), local());
        let mut coupled = TickPhase::new(TickConfig::default(), local());

        let mut quiet_steps = 0;
        while quiet.cycles() == 0 {
            quiet.step(Observation::Quiet);
            quiet_steps += 1;
        }

        let mut coupled_steps = 0;
        while coupled.cycles() == 0 {
            let observation = if coupled_steps % 10 == 9 {
                heard()
            } else {
                Observation::Quiet
            };
            coupled.step(observation);
            coupled_steps += 1;
        }

        assert_eq!(quiet_steps, 250);
        assert!(coupled_steps < quiet_steps);
    }

    #[test]
    fn starting_at_clamps_below_cycle_length() {
        let phase = TickPhase::starting_at(TickConfig::default(), local(), 10_000);
        assert_eq!(phase.subtick(), 249);
    }

    // ===========================================
    // Halt Tests
    // ===========================================

    #[test]
    fn closed_halts_once() {
        let mut phase = TickPhase::starting_at(TickConfig::default(), local(), 17);

        assert_eq!(phase.step(Observation::Closed), vec![Action::Halt]);
        assert!(phase.is_halted());
        assert_eq!(phase.state(), PhaseState::Halted { subtick: 17 });

        assert!(phase.step(Observation::Closed).is_empty());
        assert!(phase.step(Observation::Quiet).is_empty());
        assert!(phase.step(heard()).is_empty());
        assert_eq!(phase.subtick(), 17);
        assert_eq!(phase.cycles(), 0);
    }

    // ===========================================
    // Convergence Simulation
    // ===========================================

    fn circular_offset(a: u32, b: u32, n: u32) -> u32 {
        let d = a.abs_diff(b) % n;
        d.min(n - d)
    }

    /// Run two coupled oscillators whose only link is each other's publish,
    /// delivered one subtick later. Returns the offset sampled each time
    /// `a` fires.
    fn simulate_pair(start_a: u32, start_b: u32, cycles: usize) -> Vec<u32> {
        let config = TickConfig::default();
        let mut a = TickPhase::starting_at(config, LocalPeer::new("a", "a"), start_a);
        let mut b = TickPhase::starting_at(config, LocalPeer::new("b", "b"), start_b);
        let mut inbox_a = Observation::Quiet;
        let mut inbox_b = Observation::Quiet;
        let mut offsets = Vec::new();

        while offsets.len() < cycles {
            let fired_a = publishes(&a.step(std::mem::replace(&mut inbox_a, Observation::Quiet))) > 0;
            let fired_b = publishes(&b.step(std::mem::replace(&mut inbox_b, Observation::Quiet))) > 0;

            if fired_a {
                inbox_b = Observation::Heard(TickMessage::new(TICK_CONTENT, "a", "a"));
                offsets.push(circular_offset(a.subtick(), b.subtick(), SUBTICKS_PER_CYCLE));
            }
            if fired_b {
                inbox_a = Observation::Heard(TickMessage::new(TICK_CONTENT, "b", "b"));
            }
        }
        offsets
    }

    #[test]
    fn two_peers_converge() {
        for start_b in [40, 90, 160, 200] {
            let initial = circular_offset(0, start_b, SUBTICKS_PER_CYCLE);
            let offsets = simulate_pair(0, start_b, 20);

            for pair in offsets.windows(2) {
                assert!(pair[1] <= pair[0], "offset grew for start {start_b}: {offsets:?}");
            }
            // One subtick of delivery latency is the floor.
            assert!(*offsets.last().unwrap() <= 1, "no convergence: {offsets:?}");
            assert!(*offsets.last().unwrap() < initial);
        }
    }

    #[test]
    fn synchronized_peers_stay_synchronized() {
        let offsets = simulate_pair(0, 0, 10);
        assert!(offsets.iter().all(|&o| o == 0), "{offsets:?}");
    }
}
