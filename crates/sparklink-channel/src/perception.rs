use std::time::{Instant, SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use sparklink_sexpr::ExprNode;

use crate::error::Result;
use crate::state::ChannelId;

/// One decoded sensor snapshot.
///
/// Sensor entries are the top-level lists of the message keyed by their
/// leading token. Names may repeat (one `HJ` per joint) and keep message
/// order.
#[derive(Debug, Clone)]
pub struct PerceptionRecord {
    channel: ChannelId,
    sequence: u64,
    received_at: Instant,
    received_wall: SystemTime,
    tree: Option<ExprNode>,
    raw: Bytes,
}

impl PerceptionRecord {
    pub fn new(channel: ChannelId, sequence: u64, tree: Option<ExprNode>, raw: Bytes) -> Self {
        Self {
            channel,
            sequence,
            received_at: Instant::now(),
            received_wall: SystemTime::now(),
            tree,
            raw,
        }
    }

    /// Channel the message arrived on.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Zero-based message counter of the channel's current connection.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    pub fn received_wall(&self) -> SystemTime {
        self.received_wall
    }

    /// Parsed message, `None` for channels that skip expression parsing.
    pub fn tree(&self) -> Option<&ExprNode> {
        self.tree.as_ref()
    }

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// `(name, list)` pairs in message order.
    pub fn sensors(&self) -> impl Iterator<Item = (&str, &ExprNode)> {
        self.tree
            .iter()
            .flat_map(|tree| tree.nodes())
            .filter_map(|node| node.head().map(|name| (name, node)))
    }

    /// First sensor list called `name`.
    pub fn get(&self, name: &str) -> Option<&ExprNode> {
        self.sensors()
            .find(|(sensor, _)| *sensor == name)
            .map(|(_, node)| node)
    }

    /// Every sensor list called `name`.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ExprNode> + 'a {
        self.sensors()
            .filter(move |(sensor, _)| *sensor == name)
            .map(|(_, node)| node)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of sensor entries.
    pub fn len(&self) -> usize {
        self.sensors().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for PerceptionRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let received_unix_ms = self
            .received_wall
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let mut s = serializer.serialize_struct("PerceptionRecord", 5)?;
        s.serialize_field("channel", &self.channel)?;
        s.serialize_field("sequence", &self.sequence)?;
        s.serialize_field("received_unix_ms", &received_unix_ms)?;
        s.serialize_field("bytes", &self.raw.len())?;
        s.serialize_field("sensors", &self.tree)?;
        s.end()
    }
}

/// Effector commands for one cycle, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionRecord {
    effectors: Vec<(String, String)>,
}

impl ActionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the command for `effector`, replacing an earlier one in place.
    pub fn set(&mut self, effector: impl Into<String>, payload: impl Into<String>) -> &mut Self {
        let effector = effector.into();
        let payload = payload.into();
        match self.effectors.iter_mut().find(|(name, _)| *name == effector) {
            Some(entry) => entry.1 = payload,
            None => self.effectors.push((effector, payload)),
        }
        self
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, effector: impl Into<String>, payload: impl Into<String>) -> Self {
        self.set(effector, payload);
        self
    }

    pub fn get(&self, effector: &str) -> Option<&str> {
        self.effectors
            .iter()
            .find(|(name, _)| name == effector)
            .map(|(_, payload)| payload.as_str())
    }

    pub fn remove(&mut self, effector: &str) -> Option<String> {
        let index = self.effectors.iter().position(|(name, _)| name == effector)?;
        Some(self.effectors.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.effectors
            .iter()
            .map(|(name, payload)| (name.as_str(), payload.as_str()))
    }

    pub fn len(&self) -> usize {
        self.effectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effectors.is_empty()
    }

    pub fn clear(&mut self) {
        self.effectors.clear();
    }
}

/// Turns a received payload into a perception.
pub trait MessageParser: Send + Sync {
    fn parse(&self, channel: ChannelId, sequence: u64, payload: Bytes) -> Result<PerceptionRecord>;
}

/// Parses payloads as s-expression messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct SexprMessageParser;

impl MessageParser for SexprMessageParser {
    fn parse(&self, channel: ChannelId, sequence: u64, payload: Bytes) -> Result<PerceptionRecord> {
        let tree = sparklink_sexpr::parse_bytes(&payload)?;
        Ok(PerceptionRecord::new(channel, sequence, Some(tree), payload))
    }
}

/// Keeps payloads as raw bytes (binary sensor links).
#[derive(Debug, Clone, Copy, Default)]
pub struct RawMessageParser;

impl MessageParser for RawMessageParser {
    fn parse(&self, channel: ChannelId, sequence: u64, payload: Bytes) -> Result<PerceptionRecord> {
        Ok(PerceptionRecord::new(channel, sequence, None, payload))
    }
}

/// Turns an action into a wire payload.
pub trait MessageEncoder: Send + Sync {
    fn encode(&self, action: &ActionRecord) -> Bytes;
}

/// Encodes actions as `(name payload)(name payload)...`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SexprMessageEncoder;

impl MessageEncoder for SexprMessageEncoder {
    fn encode(&self, action: &ActionRecord) -> Bytes {
        let mut out = BytesMut::new();
        for (name, payload) in action.iter() {
            out.put_u8(b'(');
            out.put_slice(name.as_bytes());
            if !payload.is_empty() {
                out.put_u8(b' ');
                out.put_slice(payload.as_bytes());
            }
            out.put_u8(b')');
        }
        out.freeze()
    }
}
