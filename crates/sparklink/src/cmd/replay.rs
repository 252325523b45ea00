use std::sync::Arc;

use sparklink::channel::{ChannelManager, LogfileInputChannel, ReplayConfig};
use sparklink::frame::FrameConfig;
use sparklink::AgentConfig;
use tracing::info;

use crate::cmd::run::drive_demo_agent;
use crate::cmd::send::parse_duration;
use crate::cmd::ReplayArgs;
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    let cycle_timeout = parse_duration(&args.cycle_timeout)?;

    let mut config = ReplayConfig::default().with_interval(parse_duration(&args.interval)?);
    if let Some(framing) = args.framing {
        config = config.with_frame_config(FrameConfig::default().with_framing(framing));
    }
    if let Some(actions) = &args.actions {
        config = config.with_action_log(actions);
    }

    let channel = Arc::new(LogfileInputChannel::new("replay", &args.log).with_config(config));
    let manager = ChannelManager::new();
    manager
        .add_input_channel(channel.clone(), true)
        .map_err(|err| channel_error("channel setup failed", err))?;
    manager.add_output_channel(channel);

    let mut agent_config = AgentConfig::default().with_cycle_timeout(cycle_timeout);
    if let Some(cycles) = args.cycles {
        agent_config = agent_config.with_max_cycles(cycles);
    }

    // The end of the log ends the run as a lost connection would.
    let summary = drive_demo_agent(manager, agent_config, format)?;
    info!(log = %args.log.display(), cycles = summary.cycles, "replay finished");
    Ok(SUCCESS)
}
