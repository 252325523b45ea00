//! Channels and the channel manager of a simulation agent.
//!
//! An agent talks to the simulator (and to optional auxiliary sensor links)
//! through *channels*. Input channels decode incoming messages into
//! [`PerceptionRecord`]s on a background thread; output channels encode
//! [`ActionRecord`]s and write them out. The [`ChannelManager`] owns the
//! channels, keeps a single-slot mailbox per input channel, and derives its
//! status from the one *main* input channel.
//!
//! A recorded session can be replayed with [`LogfileInputChannel`] in place of
//! a live link; [`FilePerceptionLogger`] records one.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use sparklink_channel::{ChannelManager, StreamInputChannel, SexprMessageEncoder};
//! use sparklink_transport::TcpConnector;
//!
//! let connector = Arc::new(TcpConnector::new("127.0.0.1:3100"));
//! let input = Arc::new(StreamInputChannel::new("server", connector));
//! let output = Arc::new(input.output_channel(Arc::new(SexprMessageEncoder)));
//!
//! let manager = ChannelManager::new();
//! manager.add_input_channel(input, true)?;
//! manager.add_output_channel(output);
//! if manager.start() {
//!     if let Some(perception) = manager.wait_next_perception(Duration::from_millis(100)) {
//!         println!("{} sensors", perception.len());
//!     }
//! }
//! manager.stop();
//! # Ok::<(), sparklink_channel::ChannelError>(())
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod logfile;
pub mod manager;
pub mod observer;
pub mod perception;
pub mod perception_log;
pub mod state;
pub mod watchdog;

pub use channel::{
    Channel, ChannelLink, InputChannel, OutputChannel, PerceptionSink, SharedWireOutput,
    StreamInputChannel, StreamOutputChannel,
};
pub use config::{
    ChannelConfig, HeartbeatConfig, ManagerConfig, ReplayConfig, DEFAULT_REPLAY_INTERVAL,
};
pub use error::{ChannelError, Result};
pub use logfile::LogfileInputChannel;
pub use manager::{ChannelKind, ChannelManager, ChannelStatus, ManagerEvent, ManagerStatus};
pub use observer::{Observer, Subject};
pub use perception::{
    ActionRecord, MessageEncoder, MessageParser, PerceptionRecord, RawMessageParser,
    SexprMessageEncoder, SexprMessageParser,
};
pub use perception_log::{FilePerceptionLogger, PerceptionLogger};
pub use state::{ChannelId, ChannelState, ConnectionState, DataState, StateCell};
pub use watchdog::{Alarm, PeriodicTrigger};
