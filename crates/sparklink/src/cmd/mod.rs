use std::fs;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use sparklink::frame::Framing;

use crate::exit::{io_error, CliResult};
use crate::output::OutputFormat;

pub mod listen;
pub mod parse;
pub mod replay;
pub mod run;
pub mod send;
pub mod slip;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a message and print its expression tree.
    Parse(ParseArgs),
    /// SLIP-encode or decode bytes.
    #[command(subcommand)]
    Slip(SlipCommand),
    /// Accept one connection and print received messages.
    Listen(ListenArgs),
    /// Send a single message.
    Send(SendArgs),
    /// Run a demo agent against a simulator.
    Run(RunArgs),
    /// Run the demo agent on a recorded perception log.
    Replay(ReplayArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Parse(args) => parse::run(args, format),
        Command::Slip(command) => slip::run(command, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Run(args) => run::run(args, format),
        Command::Replay(args) => replay::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

/// Payload source shared by commands that take input bytes.
#[derive(Args, Debug, Default)]
pub struct PayloadArgs {
    /// Literal text payload.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Payload given as hex digits.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
}

impl PayloadArgs {
    /// The payload bytes, or `None` when no option was given.
    pub fn resolve(&self) -> CliResult<Option<Vec<u8>>> {
        if let Some(data) = &self.data {
            return Ok(Some(data.as_bytes().to_vec()));
        }
        if let Some(hex) = &self.hex {
            return crate::output::from_hex(hex).map(Some);
        }
        if let Some(path) = &self.file {
            return fs::read(path)
                .map(Some)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
        }
        Ok(None)
    }
}

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Message text. Read from stdin when no payload option is given.
    #[arg(conflicts_with_all = ["data", "hex", "file"])]
    pub message: Option<String>,
    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[derive(Subcommand, Debug)]
pub enum SlipCommand {
    /// Wrap a payload in a SLIP frame.
    Encode(PayloadArgs),
    /// Unwrap one SLIP frame.
    Decode(PayloadArgs),
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// TCP address to bind (e.g. 127.0.0.1:3100).
    pub addr: String,
    /// Message framing on the wire.
    #[arg(long, default_value = "length")]
    pub framing: Framing,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Reply to each received message with this text.
    #[arg(long)]
    pub reply: Option<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// TCP address to connect to.
    pub addr: String,
    #[arg(long, default_value = "length")]
    pub framing: Framing,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Wait for one reply and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Simulator address (e.g. 127.0.0.1:3100).
    pub addr: String,
    #[arg(long, default_value = "length")]
    pub framing: Framing,
    /// Message sent right after connecting.
    #[arg(long)]
    pub scene: Option<String>,
    /// Reply sent after the first received message.
    #[arg(long)]
    pub init: Option<String>,
    /// Stop after N cycles. Runs until interrupted otherwise.
    #[arg(long)]
    pub cycles: Option<u64>,
    /// Time one cycle waits for a perception.
    #[arg(long, default_value = "1s")]
    pub cycle_timeout: String,
    /// Stall alarm on the main channel.
    #[arg(long)]
    pub perception_timeout: Option<String>,
    /// Send a `(syn)` keep-alive at this period.
    #[arg(long)]
    pub heartbeat: Option<String>,
    /// Reconnect after a lost connection, waiting this long between attempts.
    #[arg(long)]
    pub reconnect: Option<String>,
    /// Give up after N reconnect attempts.
    #[arg(long, requires = "reconnect")]
    pub max_reconnects: Option<u32>,
    /// Record every perception to this file, one per line.
    #[arg(long)]
    pub record: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Perception log, as written by `run --record`.
    pub log: PathBuf,
    /// Delay between replayed perceptions.
    #[arg(long, default_value = "20ms")]
    pub interval: String,
    /// Read the log as frames instead of one message per line.
    #[arg(long)]
    pub framing: Option<Framing>,
    /// Write the agent's actions to this file, one per line.
    #[arg(long)]
    pub actions: Option<PathBuf>,
    /// Stop after N cycles. Runs to the end of the log otherwise.
    #[arg(long)]
    pub cycles: Option<u64>,
    /// Time one cycle waits for a perception.
    #[arg(long, default_value = "1s")]
    pub cycle_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
