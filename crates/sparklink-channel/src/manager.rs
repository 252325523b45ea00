use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::channel::{ChannelLink, InputChannel, OutputChannel, PerceptionSink};
use crate::config::ManagerConfig;
use crate::error::{ChannelError, Result};
use crate::observer::Subject;
use crate::perception::{ActionRecord, PerceptionRecord};
use crate::perception_log::PerceptionLogger;
use crate::state::{ChannelId, ChannelState};
use crate::watchdog::{Alarm, PeriodicTrigger};

/// Aggregate manager status, driven by the main input channel.
///
/// ```text
/// Created -> Started -> Stopped
///               ^  \-> LostMainConnection
///               \______________/  (reconnect)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerStatus {
    Created,
    Started,
    Stopped,
    LostMainConnection,
}

impl fmt::Display for ManagerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ManagerStatus::Created => "created",
            ManagerStatus::Started => "started",
            ManagerStatus::Stopped => "stopped",
            ManagerStatus::LostMainConnection => "lost main connection",
        })
    }
}

/// Notifications published by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    Started,
    Perception { channel: ChannelId, sequence: u64 },
    InvalidData { channel: ChannelId, error: String },
    ConnectionLost { channel: ChannelId, main: bool },
    /// The main channel was silent for the configured perception timeout.
    Stalled,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Input,
    Output,
}

/// Status line for one registered channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelStatus {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
    pub main: bool,
    #[serde(flatten)]
    pub state: ChannelState,
}

struct InputEntry {
    id: ChannelId,
    main: bool,
    channel: Arc<dyn InputChannel>,
}

struct OutputEntry {
    id: ChannelId,
    channel: Arc<dyn OutputChannel>,
}

struct Shared {
    config: ManagerConfig,
    inputs: RwLock<Vec<InputEntry>>,
    outputs: RwLock<Vec<OutputEntry>>,
    next_id: AtomicU32,
    status: RwLock<ManagerStatus>,
    had_connection: AtomicBool,
    shutting_down: AtomicBool,
    stalled: AtomicBool,
    stall_epoch: AtomicU64,
    /// Bumped on every main-channel loss.
    loss_epoch: AtomicU64,
    dropped: AtomicU64,
    /// One pending perception per input channel.
    slots: Mutex<HashMap<ChannelId, PerceptionRecord>>,
    arrived: Condvar,
    alarm: Mutex<Option<Alarm>>,
    heartbeat: Mutex<Option<PeriodicTrigger>>,
    events: Subject<ManagerEvent>,
    logger: RwLock<Option<Arc<dyn PerceptionLogger>>>,
    this: Weak<Shared>,
}

/// Owns the input and output channels of an agent.
///
/// Receive threads drop decoded perceptions into single-slot mailboxes, one
/// per input channel; a newer perception replaces an unclaimed one. The cycle
/// driver takes the main channel's perception with [`next_perception`] or
/// [`wait_next_perception`] and sends its response with [`perform_action`].
///
/// Cloning yields another handle to the same manager.
///
/// [`next_perception`]: ChannelManager::next_perception
/// [`wait_next_perception`]: ChannelManager::wait_next_perception
/// [`perform_action`]: ChannelManager::perform_action
#[derive(Clone)]
pub struct ChannelManager {
    shared: Arc<Shared>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    pub fn with_config(config: ManagerConfig) -> Self {
        let shared = Arc::new_cyclic(|this| Shared {
            config,
            inputs: RwLock::new(Vec::new()),
            outputs: RwLock::new(Vec::new()),
            next_id: AtomicU32::new(1),
            status: RwLock::new(ManagerStatus::Created),
            had_connection: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            stalled: AtomicBool::new(false),
            stall_epoch: AtomicU64::new(0),
            loss_epoch: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            slots: Mutex::new(HashMap::new()),
            arrived: Condvar::new(),
            alarm: Mutex::new(None),
            heartbeat: Mutex::new(None),
            events: Subject::new(),
            logger: RwLock::new(None),
            this: this.clone(),
        });
        Self { shared }
    }

    /// Register an input channel. At most one may be the main channel.
    pub fn add_input_channel(&self, channel: Arc<dyn InputChannel>, is_main: bool) -> Result<ChannelId> {
        let mut inputs = self.shared.inputs.write();
        if is_main {
            if let Some(existing) = inputs.iter().find(|entry| entry.main) {
                return Err(ChannelError::DuplicateMainChannel {
                    existing: existing.channel.name().to_string(),
                });
            }
        }

        let id = self.shared.allocate_id();
        let sink: Arc<dyn PerceptionSink> = self.shared.clone();
        channel.bind(ChannelLink::new(id, Arc::downgrade(&sink)));
        debug!(%id, name = channel.name(), main = is_main, "input channel added");
        inputs.push(InputEntry {
            id,
            main: is_main,
            channel,
        });
        Ok(id)
    }

    pub fn add_output_channel(&self, channel: Arc<dyn OutputChannel>) -> ChannelId {
        let id = self.shared.allocate_id();
        debug!(%id, name = channel.name(), "output channel added");
        self.shared.outputs.write().push(OutputEntry { id, channel });
        id
    }

    /// Start input channels, then output channels.
    ///
    /// Returns false, stopping everything and leaving the status unchanged,
    /// if the main channel cannot connect. If the main channel connects but
    /// drops again before start completes, everything is stopped, the status
    /// is `LostMainConnection` and the result is false. Otherwise the manager
    /// is `Started` and the result tells whether every output channel started.
    ///
    /// Perceptions delivered while the channels start stay in their slots.
    pub fn start(&self) -> bool {
        self.shared.start()
    }

    /// Restart the channels after the main connection was lost.
    pub fn reconnect_main(&self) -> bool {
        info!(status = %self.status(), "reconnecting main channel");
        self.shared.start()
    }

    pub fn stop(&self) {
        let shared = &self.shared;
        shared.shutting_down.store(true, Ordering::SeqCst);
        shared.stop_channels();
        shared.set_status(ManagerStatus::Stopped);
        shared.shutting_down.store(false, Ordering::SeqCst);
        if let Some(logger) = shared.logger.read().as_ref() {
            logger.flush();
        }
        info!("channel manager stopped");
        shared.events.on_state_change(&ManagerEvent::Stopped);
    }

    /// Take the main channel's pending perception, if any.
    pub fn next_perception(&self) -> Option<PerceptionRecord> {
        let main = self.shared.main_id()?;
        self.shared.slots.lock().remove(&main)
    }

    /// Take the main channel's next perception, waiting up to `timeout`.
    ///
    /// Returns early with `None` when the manager leaves `Started` or the
    /// watchdog reports a stall.
    pub fn wait_next_perception(&self, timeout: Duration) -> Option<PerceptionRecord> {
        let shared = &self.shared;
        let main = shared.main_id()?;
        let deadline = Instant::now() + timeout;
        let epoch = shared.stall_epoch.load(Ordering::SeqCst);

        let mut slots = shared.slots.lock();
        loop {
            if let Some(record) = slots.remove(&main) {
                return Some(record);
            }
            if *shared.status.read() != ManagerStatus::Started
                || shared.stall_epoch.load(Ordering::SeqCst) != epoch
            {
                return None;
            }
            if shared.arrived.wait_until(&mut slots, deadline).timed_out() {
                return slots.remove(&main);
            }
        }
    }

    /// Take the pending perception of an auxiliary input channel.
    pub fn next_auxiliary_perception(&self, channel: ChannelId) -> Result<Option<PerceptionRecord>> {
        if !self.shared.inputs.read().iter().any(|entry| entry.id == channel) {
            return Err(ChannelError::UnknownChannel(channel));
        }
        Ok(self.shared.slots.lock().remove(&channel))
    }

    /// Send an action on every output channel.
    pub fn perform_action(&self, action: &ActionRecord) {
        self.shared.perform_action(action);
    }

    /// Report that an input channel's transport failed.
    pub fn lost_connection(&self, channel: ChannelId) {
        self.shared.lost_connection(channel);
    }

    /// True if the main channel is connected.
    pub fn is_connected(&self) -> bool {
        self.shared
            .main_channel()
            .is_some_and(|channel| channel.is_connected())
    }

    pub fn status(&self) -> ManagerStatus {
        *self.shared.status.read()
    }

    /// True once the manager has started successfully. Never reset.
    pub fn had_connection(&self) -> bool {
        self.shared.had_connection.load(Ordering::SeqCst)
    }

    /// True while the main channel is silent past the perception timeout.
    pub fn is_stalled(&self) -> bool {
        self.shared.stalled.load(Ordering::SeqCst)
    }

    /// Perceptions overwritten before anyone claimed them.
    pub fn dropped_perceptions(&self) -> u64 {
        self.shared.dropped.load(Ordering::SeqCst)
    }

    pub fn main_channel_id(&self) -> Option<ChannelId> {
        self.shared.main_id()
    }

    pub fn main_channel_state(&self) -> Option<ChannelState> {
        self.shared.main_channel().map(|channel| channel.state())
    }

    pub fn channel_states(&self) -> Vec<ChannelStatus> {
        let mut states: Vec<ChannelStatus> = self
            .shared
            .inputs
            .read()
            .iter()
            .map(|entry| ChannelStatus {
                id: entry.id,
                name: entry.channel.name().to_string(),
                kind: ChannelKind::Input,
                main: entry.main,
                state: entry.channel.state(),
            })
            .collect();
        states.extend(self.shared.outputs.read().iter().map(|entry| ChannelStatus {
            id: entry.id,
            name: entry.channel.name().to_string(),
            kind: ChannelKind::Output,
            main: false,
            state: entry.channel.state(),
        }));
        states
    }

    /// Log every accepted perception, from any input channel, through `logger`.
    /// Replaces a previously set logger.
    pub fn set_perception_logger(&self, logger: Arc<dyn PerceptionLogger>) {
        *self.shared.logger.write() = Some(logger);
    }

    pub fn perception_logger(&self) -> Option<Arc<dyn PerceptionLogger>> {
        self.shared.logger.read().clone()
    }

    /// Observers notified of perceptions, losses and stalls.
    ///
    /// Observers run on the thread that raised the event (usually a receive
    /// thread) and must not block.
    pub fn events(&self) -> &Subject<ManagerEvent> {
        &self.shared.events
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChannelManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.main_channel_state() {
            Some(state) => write!(f, "{}", state.connection),
            None => write!(f, "{}", self.status()),
        }
    }
}

impl fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelManager")
            .field("status", &self.status())
            .field("inputs", &self.shared.inputs.read().len())
            .field("outputs", &self.shared.outputs.read().len())
            .finish()
    }
}

impl Shared {
    fn allocate_id(&self) -> ChannelId {
        ChannelId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn main_id(&self) -> Option<ChannelId> {
        self.inputs
            .read()
            .iter()
            .find(|entry| entry.main)
            .map(|entry| entry.id)
    }

    fn main_channel(&self) -> Option<Arc<dyn InputChannel>> {
        self.inputs
            .read()
            .iter()
            .find(|entry| entry.main)
            .map(|entry| Arc::clone(&entry.channel))
    }

    fn input_snapshot(&self) -> Vec<(ChannelId, Arc<dyn InputChannel>)> {
        self.inputs
            .read()
            .iter()
            .map(|entry| (entry.id, Arc::clone(&entry.channel)))
            .collect()
    }

    fn output_snapshot(&self) -> Vec<Arc<dyn OutputChannel>> {
        self.outputs
            .read()
            .iter()
            .map(|entry| Arc::clone(&entry.channel))
            .collect()
    }

    /// Change status and wake any waiting cycle driver.
    fn set_status(&self, status: ManagerStatus) {
        *self.status.write() = status;
        self.wake_waiters();
    }

    fn wake_waiters(&self) {
        let _slots = self.slots.lock();
        self.arrived.notify_all();
    }

    fn start(&self) -> bool {
        let main = self.main_id();
        let losses = self.loss_epoch.load(Ordering::SeqCst);
        self.slots.lock().clear();
        self.stalled.store(false, Ordering::SeqCst);

        for (id, channel) in self.input_snapshot() {
            let connected = channel.start();
            if !connected && Some(id) == main {
                warn!(channel = channel.name(), "main channel failed to start");
                self.stop_channels();
                return false;
            }
        }

        let mut all_outputs = true;
        for channel in self.output_snapshot() {
            all_outputs &= channel.start();
        }

        self.had_connection.store(true, Ordering::SeqCst);
        if !self.enter_started(losses) {
            warn!("main channel lost while starting");
            self.stop_channels();
            return false;
        }
        self.start_timers();

        info!(all_outputs, "channel manager started");
        self.events.on_state_change(&ManagerEvent::Started);
        all_outputs
    }

    /// Move to `Started` unless the main channel dropped since `losses` was
    /// read. A loss reported later sees `Started` and overrides it.
    fn enter_started(&self, losses: u64) -> bool {
        let started = {
            let mut status = self.status.write();
            let alive = self
                .main_channel()
                .is_none_or(|channel| channel.is_connected());
            let started = alive && self.loss_epoch.load(Ordering::SeqCst) == losses;
            *status = if started {
                ManagerStatus::Started
            } else {
                ManagerStatus::LostMainConnection
            };
            started
        };
        self.wake_waiters();
        started
    }

    fn stop_channels(&self) {
        let alarm = self.alarm.lock().take();
        drop(alarm);
        let heartbeat = self.heartbeat.lock().take();
        drop(heartbeat);

        for (_, channel) in self.input_snapshot() {
            channel.stop();
        }
        for channel in self.output_snapshot() {
            channel.stop();
        }
    }

    fn start_timers(&self) {
        if let Some(timeout) = self.config.perception_timeout {
            self.arm_watchdog(timeout);
        }

        if let Some(heartbeat) = &self.config.heartbeat {
            let this = self.this.clone();
            let action = heartbeat.action.clone();
            match PeriodicTrigger::start(heartbeat.period, move || {
                if let Some(shared) = this.upgrade() {
                    shared.perform_action(&action);
                }
            }) {
                Ok(trigger) => *self.heartbeat.lock() = Some(trigger),
                Err(err) => warn!(error = %err, "failed to start heartbeat"),
            }
        }
    }

    fn arm_watchdog(&self, timeout: Duration) {
        let this = self.this.clone();
        let armed = Alarm::arm(timeout, move || {
            if let Some(shared) = this.upgrade() {
                shared.on_stall(timeout);
            }
        });
        match armed {
            Ok(alarm) => {
                let previous = self.alarm.lock().replace(alarm);
                drop(previous);
            }
            Err(err) => warn!(error = %err, "failed to arm perception watchdog"),
        }
    }

    /// Push the watchdog deadline out after a main-channel perception.
    fn feed_watchdog(&self) {
        let Some(timeout) = self.config.perception_timeout else {
            return;
        };
        let fed = self.alarm.lock().as_ref().is_some_and(Alarm::reset);
        if !fed && *self.status.read() == ManagerStatus::Started {
            self.arm_watchdog(timeout);
        }
    }

    fn on_stall(&self, timeout: Duration) {
        if *self.status.read() != ManagerStatus::Started {
            return;
        }
        warn!(?timeout, "no perception from main channel");
        self.stalled.store(true, Ordering::SeqCst);
        self.stall_epoch.fetch_add(1, Ordering::SeqCst);
        self.wake_waiters();
        self.events.on_state_change(&ManagerEvent::Stalled);
    }

    fn perform_action(&self, action: &ActionRecord) {
        for channel in self.output_snapshot() {
            channel.send_message(action);
        }
    }
}

impl PerceptionSink for Shared {
    fn deliver(&self, channel: ChannelId, record: PerceptionRecord) {
        let sequence = record.sequence();
        let is_main = self.main_id() == Some(channel);
        if let Some(logger) = self.logger.read().as_ref() {
            logger.log(channel, &record);
        }
        {
            let mut slots = self.slots.lock();
            if slots.insert(channel, record).is_some() {
                self.dropped.fetch_add(1, Ordering::SeqCst);
                debug!(%channel, "unclaimed perception replaced");
            }
            if is_main {
                self.arrived.notify_all();
            }
        }

        if is_main {
            if self.stalled.swap(false, Ordering::SeqCst) {
                info!("main channel perceptions resumed");
            }
            self.feed_watchdog();
        }
        self.events
            .on_state_change(&ManagerEvent::Perception { channel, sequence });
    }

    fn invalid_data(&self, channel: ChannelId, error: &str) {
        // A cycle sees fresh data or nothing.
        self.slots.lock().remove(&channel);
        self.events.on_state_change(&ManagerEvent::InvalidData {
            channel,
            error: error.to_string(),
        });
    }

    fn lost_connection(&self, channel: ChannelId) {
        if self.shutting_down.load(Ordering::SeqCst) {
            return;
        }
        let main = self.main_id() == Some(channel);
        self.events
            .on_state_change(&ManagerEvent::ConnectionLost { channel, main });
        if !main {
            info!(%channel, "auxiliary channel lost");
            return;
        }

        warn!(%channel, "main connection lost");
        self.loss_epoch.fetch_add(1, Ordering::SeqCst);
        self.set_status(ManagerStatus::LostMainConnection);
        self.stop_channels();
    }
}
