use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use sparklink_frame::{FrameConfig, Framing};

use crate::perception::ActionRecord;

/// Configuration for a stream-backed channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelConfig {
    /// Wire framing, payload limit and socket timeouts.
    pub frame: FrameConfig,
    /// Sent in order right after the link comes up (e.g. scene selection).
    pub connect_messages: Vec<Bytes>,
    /// Sent once in reply to the first message received on a new link
    /// (e.g. the simulator's init handshake).
    pub first_message_reply: Option<Bytes>,
}

impl ChannelConfig {
    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.frame.framing = framing;
        self
    }

    pub fn with_connect_message(mut self, message: impl Into<Bytes>) -> Self {
        self.connect_messages.push(message.into());
        self
    }

    pub fn with_first_message_reply(mut self, message: impl Into<Bytes>) -> Self {
        self.first_message_reply = Some(message.into());
        self
    }
}

/// An action sent to every output channel at a fixed period.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    pub period: Duration,
    pub action: ActionRecord,
}

/// Configuration for [`ChannelManager`](crate::ChannelManager).
#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    /// Mark the manager stalled when the main channel is silent this long.
    pub perception_timeout: Option<Duration>,
    pub heartbeat: Option<HeartbeatConfig>,
}

impl ManagerConfig {
    pub fn with_perception_timeout(mut self, timeout: Duration) -> Self {
        self.perception_timeout = Some(timeout);
        self
    }

    pub fn with_heartbeat(mut self, period: Duration, action: ActionRecord) -> Self {
        self.heartbeat = Some(HeartbeatConfig { period, action });
        self
    }
}

/// Pace of a replayed perception log, matching the simulator's 20 ms step.
pub const DEFAULT_REPLAY_INTERVAL: Duration = Duration::from_millis(20);

/// Configuration for a [`LogfileInputChannel`](crate::LogfileInputChannel).
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Delay between two replayed perceptions.
    pub interval: Duration,
    /// Frame layout of the log. `None` reads one message per line.
    pub frame: Option<FrameConfig>,
    /// Actions sent to the channel are appended here, one per line.
    pub action_log: Option<PathBuf>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REPLAY_INTERVAL,
            frame: None,
            action_log: None,
        }
    }
}

impl ReplayConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = Some(frame);
        self
    }

    pub fn with_action_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.action_log = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_config_builders() {
        let config = ChannelConfig::default()
            .with_framing(Framing::Slip)
            .with_connect_message("(scene rsg/agent/nao/nao.rsg)")
            .with_first_message_reply("(init (unum 7)(teamname sparks))");

        assert_eq!(config.frame.framing, Framing::Slip);
        assert_eq!(config.connect_messages.len(), 1);
        assert_eq!(
            config.first_message_reply.as_deref(),
            Some(&b"(init (unum 7)(teamname sparks))"[..])
        );
    }

    #[test]
    fn manager_config_defaults_off() {
        let config = ManagerConfig::default();
        assert!(config.perception_timeout.is_none());
        assert!(config.heartbeat.is_none());

        let config = config
            .with_perception_timeout(Duration::from_millis(500))
            .with_heartbeat(Duration::from_secs(1), ActionRecord::new().with("syn", ""));
        assert_eq!(config.perception_timeout, Some(Duration::from_millis(500)));
        assert_eq!(config.heartbeat.unwrap().action.get("syn"), Some(""));
    }

    #[test]
    fn replay_config_reads_lines_at_simulator_pace() {
        let config = ReplayConfig::default();
        assert_eq!(config.interval, Duration::from_millis(20));
        assert!(config.frame.is_none());
        assert!(config.action_log.is_none());

        let config = config
            .with_interval(Duration::ZERO)
            .with_frame_config(FrameConfig::default().with_framing(Framing::Slip))
            .with_action_log("actions.log");
        assert_eq!(config.interval, Duration::ZERO);
        assert_eq!(config.frame.unwrap().framing, Framing::Slip);
        assert_eq!(config.action_log.unwrap().to_str(), Some("actions.log"));
    }
}
