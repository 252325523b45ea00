use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use sparklink::channel::{
    ActionRecord, ChannelConfig, ChannelManager, FilePerceptionLogger, ManagerConfig,
    PerceptionRecord, SexprMessageEncoder, StreamInputChannel,
};
use sparklink::decision::{BehaviorRegistry, DecisionEngine, NONE};
use sparklink::frame::FrameConfig;
use sparklink::transport::TcpConnector;
use sparklink::{ActionMapper, Agent, AgentConfig, RunSummary, ThoughtModel};
use tracing::debug;

use crate::cmd::listen::install_ctrlc_handler;
use crate::cmd::send::parse_duration;
use crate::cmd::RunArgs;
use crate::exit::{agent_error, channel_error, CliResult, CONNECTION_LOST, SUCCESS};
use crate::output::{print_run, OutputFormat};

/// Simulation time in milliseconds, shared between model and policy.
#[derive(Default)]
struct WorldClock {
    millis: AtomicU64,
    seen: AtomicBool,
}

impl WorldClock {
    /// Latest simulation time, once any perception carried one.
    fn sim_time_ms(&self) -> Option<u64> {
        self.seen
            .load(Ordering::SeqCst)
            .then(|| self.millis.load(Ordering::SeqCst))
    }
}

/// Tracks `(time (now t))` from each perception.
struct ClockModel {
    clock: Arc<WorldClock>,
}

impl ThoughtModel for ClockModel {
    fn update(&mut self, perception: Option<&PerceptionRecord>) -> bool {
        let Some(perception) = perception else {
            return false;
        };
        let now = perception
            .get("time")
            .and_then(|time| time.value("now"))
            .and_then(|now| now.parse::<f64>().ok());
        if let Some(now) = now {
            self.clock
                .millis
                .store((now * 1000.0).round() as u64, Ordering::SeqCst);
            self.clock.seen.store(true, Ordering::SeqCst);
        }
        true
    }
}

/// Keeps the simulator stepping by acknowledging every cycle.
struct SyncMapper;

impl ActionMapper for SyncMapper {
    fn map_state_to_action(&mut self, action: &mut ActionRecord, remote_controlled: bool) {
        if !remote_controlled {
            action.set("syn", "");
        }
    }
}

fn demo_engine(clock: Arc<WorldClock>) -> CliResult<DecisionEngine> {
    let mut registry = BehaviorRegistry::new();
    let stand_cycles = Arc::new(AtomicU64::new(0));
    let stand_clock = Arc::clone(&clock);
    registry
        .add_leaf("stand", move || {
            let cycles = stand_cycles.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(cycles, sim_ms = stand_clock.sim_time_ms(), "standing");
        })
        .map_err(|err| agent_error("behavior setup failed", err.into()))?;

    let policy = move |_: &BehaviorRegistry| {
        if clock.seen.load(Ordering::SeqCst) {
            "stand".to_string()
        } else {
            NONE.to_string()
        }
    };
    Ok(DecisionEngine::new(registry, policy))
}

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let cycle_timeout = parse_duration(&args.cycle_timeout)?;

    let mut channel_config = ChannelConfig::default()
        .with_frame_config(FrameConfig::default().with_framing(args.framing));
    if let Some(scene) = &args.scene {
        channel_config = channel_config.with_connect_message(scene.clone().into_bytes());
    }
    if let Some(init) = &args.init {
        channel_config = channel_config.with_first_message_reply(init.clone().into_bytes());
    }

    let mut manager_config = ManagerConfig::default();
    if let Some(timeout) = &args.perception_timeout {
        manager_config = manager_config.with_perception_timeout(parse_duration(timeout)?);
    }
    if let Some(period) = &args.heartbeat {
        manager_config = manager_config
            .with_heartbeat(parse_duration(period)?, ActionRecord::new().with("syn", ""));
    }

    let connector = TcpConnector::new(args.addr.as_str()).with_connect_timeout(cycle_timeout);
    let input = Arc::new(
        StreamInputChannel::new("server", Arc::new(connector)).with_config(channel_config),
    );
    let output = Arc::new(input.output_channel(Arc::new(SexprMessageEncoder)));

    let manager = ChannelManager::with_config(manager_config);
    manager
        .add_input_channel(input, true)
        .map_err(|err| channel_error("channel setup failed", err))?;
    manager.add_output_channel(output);
    if let Some(path) = &args.record {
        record_perceptions(&manager, path)?;
    }

    let mut agent_config = AgentConfig::default().with_cycle_timeout(cycle_timeout);
    if let Some(cycles) = args.cycles {
        agent_config = agent_config.with_max_cycles(cycles);
    }
    if let Some(delay) = &args.reconnect {
        agent_config = agent_config.with_reconnect(parse_duration(delay)?, args.max_reconnects);
    }

    let summary = drive_demo_agent(manager, agent_config, format)?;
    if summary.lost_main {
        return Ok(CONNECTION_LOST);
    }
    Ok(SUCCESS)
}

fn record_perceptions(manager: &ChannelManager, path: &Path) -> CliResult<()> {
    let logger = FilePerceptionLogger::create(path)
        .map_err(|err| channel_error(&format!("cannot record to {}", path.display()), err))?;
    manager.set_perception_logger(Arc::new(logger));
    Ok(())
}

/// Run the demo agent on `manager` until it is done, then print the summary.
pub(crate) fn drive_demo_agent(
    manager: ChannelManager,
    config: AgentConfig,
    format: OutputFormat,
) -> CliResult<RunSummary> {
    let clock = Arc::new(WorldClock::default());
    let engine = demo_engine(Arc::clone(&clock))?;
    let model = ClockModel {
        clock: Arc::clone(&clock),
    };
    let mut agent = Agent::new(manager, engine, model, SyncMapper).with_config(config);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let summary = agent
        .run(&running)
        .map_err(|err| agent_error("agent failed", err))?;
    print_run(
        &summary,
        clock.sim_time_ms(),
        &agent.engine().describe(),
        &agent.manager().channel_states(),
        format,
    );
    Ok(summary)
}
