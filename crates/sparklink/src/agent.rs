//! The perceive, decide, act cycle.
//!
//! An [`Agent`] owns a [`ChannelManager`] and a [`DecisionEngine`] and wires
//! them to two application hooks: a [`ThoughtModel`] that digests each
//! perception, and an [`ActionMapper`] that turns the resulting state into
//! effector commands.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use sparklink_channel::{ActionRecord, ChannelManager, ManagerStatus, PerceptionRecord};
use sparklink_decision::{DecisionEngine, DecisionError};
use tracing::{debug, info, warn};

/// Application model updated from perceptions.
pub trait ThoughtModel: Send {
    /// Digest a perception, or `None` when the cycle brought no data.
    ///
    /// Returns whether a decision should be taken this cycle.
    fn update(&mut self, perception: Option<&PerceptionRecord>) -> bool;
}

impl<F> ThoughtModel for F
where
    F: FnMut(Option<&PerceptionRecord>) -> bool + Send,
{
    fn update(&mut self, perception: Option<&PerceptionRecord>) -> bool {
        self(perception)
    }
}

/// Fills the effector commands after a decision.
pub trait ActionMapper: Send {
    fn map_state_to_action(&mut self, action: &mut ActionRecord, remote_controlled: bool);
}

impl<F> ActionMapper for F
where
    F: FnMut(&mut ActionRecord, bool) + Send,
{
    fn map_state_to_action(&mut self, action: &mut ActionRecord, remote_controlled: bool) {
        self(action, remote_controlled)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("main channel failed to connect: {0}")]
    NotConnected(String),

    #[error(transparent)]
    Decision(#[from] DecisionError),
}

/// Cycle driver settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// How long one cycle waits for a perception.
    pub cycle_timeout: Duration,
    /// Pause before each reconnect attempt. `None` ends the run on a lost
    /// main connection.
    pub reconnect_delay: Option<Duration>,
    pub max_reconnects: Option<u32>,
    /// Stop after this many cycles.
    pub max_cycles: Option<u64>,
    pub remote_controlled: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cycle_timeout: Duration::from_secs(1),
            reconnect_delay: None,
            max_reconnects: None,
            max_cycles: None,
            remote_controlled: false,
        }
    }
}

impl AgentConfig {
    pub fn with_cycle_timeout(mut self, timeout: Duration) -> Self {
        self.cycle_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, delay: Duration, max_attempts: Option<u32>) -> Self {
        self.reconnect_delay = Some(delay);
        self.max_reconnects = max_attempts;
        self
    }

    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    pub fn with_remote_control(mut self, remote_controlled: bool) -> Self {
        self.remote_controlled = remote_controlled;
        self
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub perceived: bool,
    pub decided: bool,
    /// Effector commands sent.
    pub effectors: usize,
}

/// Totals of a [`run`](Agent::run).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct RunSummary {
    pub cycles: u64,
    pub perceptions: u64,
    pub decisions: u64,
    pub reconnects: u32,
    pub reconnect_attempts: u32,
    /// The run ended because the main connection was lost.
    pub lost_main: bool,
}

pub struct Agent<T, M> {
    manager: ChannelManager,
    engine: DecisionEngine,
    thought: T,
    mapper: M,
    config: AgentConfig,
}

impl<T: ThoughtModel, M: ActionMapper> Agent<T, M> {
    pub fn new(manager: ChannelManager, engine: DecisionEngine, thought: T, mapper: M) -> Self {
        Self {
            manager,
            engine,
            thought,
            mapper,
            config: AgentConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one cycle: wait for a perception, update the model, decide, act.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, AgentError> {
        let perception = self.manager.wait_next_perception(self.config.cycle_timeout);
        let mut outcome = CycleOutcome {
            perceived: perception.is_some(),
            ..CycleOutcome::default()
        };

        if !self.thought.update(perception.as_ref()) {
            return Ok(outcome);
        }

        self.engine.decide()?;
        outcome.decided = true;

        let mut action = ActionRecord::new();
        self.mapper
            .map_state_to_action(&mut action, self.config.remote_controlled);
        if !action.is_empty() {
            self.manager.perform_action(&action);
            outcome.effectors = action.len();
        }
        Ok(outcome)
    }

    /// Start the channels and cycle until `running` is cleared, the cycle
    /// limit is reached, or the main connection is lost for good.
    ///
    /// Channels are stopped on return.
    pub fn run(&mut self, running: &AtomicBool) -> Result<RunSummary, AgentError> {
        if self.manager.main_channel_id().is_none() {
            return Err(AgentError::NotConnected("no main channel".to_string()));
        }
        self.manager.start();
        if self.manager.status() != ManagerStatus::Started {
            let reason = self
                .manager
                .main_channel_state()
                .and_then(|state| state.last_error)
                .unwrap_or_else(|| "no error recorded".to_string());
            return Err(AgentError::NotConnected(reason));
        }
        info!(behaviors = self.engine.registry().len(), "agent running");

        let mut summary = RunSummary::default();
        let result = self.cycle_until_done(running, &mut summary);

        summary.lost_main = self.manager.status() == ManagerStatus::LostMainConnection;
        summary.decisions = self.engine.number_of_decisions();
        self.manager.stop();
        info!(cycles = summary.cycles, lost_main = summary.lost_main, "agent stopped");
        result.map(|()| summary)
    }

    fn cycle_until_done(&mut self, running: &AtomicBool, summary: &mut RunSummary) -> Result<(), AgentError> {
        while running.load(Ordering::SeqCst) {
            if self
                .config
                .max_cycles
                .is_some_and(|limit| summary.cycles >= limit)
            {
                break;
            }

            match self.manager.status() {
                ManagerStatus::Started => {}
                ManagerStatus::LostMainConnection => {
                    if !self.reconnect(running, summary) {
                        break;
                    }
                    continue;
                }
                ManagerStatus::Created | ManagerStatus::Stopped => break,
            }

            let outcome = self.run_cycle()?;
            summary.cycles += 1;
            if outcome.perceived {
                summary.perceptions += 1;
            }
        }
        Ok(())
    }

    /// One reconnect attempt. Returns false when the run should end.
    fn reconnect(&mut self, running: &AtomicBool, summary: &mut RunSummary) -> bool {
        let Some(delay) = self.config.reconnect_delay else {
            return false;
        };
        if self
            .config
            .max_reconnects
            .is_some_and(|max| summary.reconnect_attempts >= max)
        {
            warn!(attempts = summary.reconnect_attempts, "giving up on main connection");
            return false;
        }

        summary.reconnect_attempts += 1;
        thread::sleep(delay);
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        if self.manager.reconnect_main() {
            summary.reconnects += 1;
            self.engine.reset();
            info!(attempt = summary.reconnect_attempts, "main connection restored");
        } else {
            debug!(attempt = summary.reconnect_attempts, "reconnect failed");
        }
        true
    }

    pub fn manager(&self) -> &ChannelManager {
        &self.manager
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut DecisionEngine {
        &mut self.engine
    }

    pub fn thought_model(&self) -> &T {
        &self.thought
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}
