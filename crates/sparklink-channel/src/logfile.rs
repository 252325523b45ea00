use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use sparklink_frame::{FrameError, FrameReader, Framing};
use tracing::{debug, info, warn};

use crate::channel::{is_recoverable, Channel, ChannelLink, InputChannel, OutputChannel};
use crate::config::ReplayConfig;
use crate::perception::{
    ActionRecord, MessageEncoder, MessageParser, SexprMessageEncoder, SexprMessageParser,
};
use crate::state::{ChannelId, ChannelState, ConnectionState, DataState, StateCell};

/// Messages read back from a perception log.
enum Records {
    Lines(std::io::Split<BufReader<File>>),
    Frames(FrameReader<File>),
}

impl Records {
    fn open(path: &Path, config: &ReplayConfig) -> std::io::Result<Self> {
        let file = File::open(path)?;
        Ok(match &config.frame {
            Some(frame) => Records::Frames(FrameReader::with_config(file, frame.clone())),
            None => Records::Lines(BufReader::new(file).split(b'\n')),
        })
    }

    /// The next message, or `None` at end of file. Blank lines are skipped.
    fn next(&mut self) -> Option<Result<Bytes, FrameError>> {
        match self {
            Records::Lines(lines) => loop {
                match lines.next()? {
                    Ok(mut line) => {
                        if line.last() == Some(&b'\r') {
                            line.pop();
                        }
                        if !line.iter().all(u8::is_ascii_whitespace) {
                            return Some(Ok(Bytes::from(line)));
                        }
                    }
                    Err(err) => return Some(Err(FrameError::Io(err))),
                }
            },
            Records::Frames(reader) => match reader.read_frame() {
                Ok(payload) => Some(Ok(payload)),
                Err(FrameError::ConnectionClosed) => None,
                Err(err) => Some(Err(err)),
            },
        }
    }

    fn framing(&self) -> Option<Framing> {
        match self {
            Records::Lines(_) => None,
            Records::Frames(reader) => Some(reader.config().framing),
        }
    }
}

struct Replay {
    stopping: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

fn stop_replay(replay: Option<Replay>) {
    let Some(replay) = replay else {
        return;
    };
    replay.stopping.store(true, Ordering::SeqCst);
    if let Some(handle) = replay.handle {
        if handle.thread().id() != thread::current().id() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

type ActionLog = Arc<Mutex<Option<BufWriter<File>>>>;

/// Input channel replaying a recorded perception log.
///
/// Behaves like a live simulator link: `start()` opens the log and a replay
/// thread hands one message per interval to the owner. The end of the log
/// marks the channel `Disconnected` and reports the loss, the way a closed
/// simulator connection would.
///
/// Actions are never sent anywhere. When an action log is configured, the
/// channel also works as an [`OutputChannel`] appending each encoded action
/// as one line.
pub struct LogfileInputChannel {
    name: String,
    path: PathBuf,
    config: ReplayConfig,
    parser: Arc<dyn MessageParser>,
    encoder: Arc<dyn MessageEncoder>,
    state: StateCell,
    link: RwLock<Option<ChannelLink>>,
    replay: Mutex<Option<Replay>>,
    actions: ActionLog,
    received: Arc<AtomicU64>,
}

impl LogfileInputChannel {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            config: ReplayConfig::default(),
            parser: Arc::new(SexprMessageParser),
            encoder: Arc::new(SexprMessageEncoder),
            state: StateCell::new(),
            link: RwLock::new(None),
            replay: Mutex::new(None),
            actions: Arc::new(Mutex::new(None)),
            received: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_config(mut self, config: ReplayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn MessageParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn MessageEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    fn open_action_log(&self) -> std::io::Result<()> {
        let Some(path) = &self.config.action_log else {
            return Ok(());
        };
        let mut actions = self.actions.lock();
        if actions.is_none() {
            *actions = Some(BufWriter::new(File::create(path)?));
            debug!(channel = %self.name, path = %path.display(), "action log opened");
        }
        Ok(())
    }

    fn close_action_log(&self) {
        if let Some(mut out) = self.actions.lock().take() {
            if let Err(err) = out.flush() {
                warn!(channel = %self.name, error = %err, "action log flush failed");
            }
        }
    }

    fn fail_start(&self, error: String) -> bool {
        warn!(channel = %self.name, path = %self.path.display(), %error, "log replay failed to start");
        self.state.fail(ConnectionState::ConnectionFailed, error);
        false
    }
}

impl Channel for LogfileInputChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> bool {
        if self.state.connection().is_connected() {
            return true;
        }
        let previous = self.replay.lock().take();
        stop_replay(previous);

        self.state.set_connection(ConnectionState::TryingToConnect);
        let records = match Records::open(&self.path, &self.config) {
            Ok(records) => records,
            Err(err) => return self.fail_start(err.to_string()),
        };
        if let Err(err) = self.open_action_log() {
            return self.fail_start(err.to_string());
        }

        self.received.store(0, Ordering::SeqCst);
        self.state.connected();

        let stopping = Arc::new(AtomicBool::new(false));
        let replay = ReplayLoop {
            name: self.name.clone(),
            link: self.link.read().clone(),
            parser: Arc::clone(&self.parser),
            records,
            interval: self.config.interval,
            state: self.state.clone(),
            stopping: Arc::clone(&stopping),
            received: Arc::clone(&self.received),
        };
        let spawned = thread::Builder::new()
            .name(format!("sparklink-replay-{}", self.name))
            .spawn(move || replay.run());

        match spawned {
            Ok(handle) => {
                *self.replay.lock() = Some(Replay {
                    stopping,
                    handle: Some(handle),
                });
                info!(channel = %self.name, path = %self.path.display(), "log replay started");
                true
            }
            Err(err) => {
                self.close_action_log();
                self.fail_start(err.to_string())
            }
        }
    }

    fn stop(&self) {
        let replay = self.replay.lock().take();
        let had_replay = replay.is_some();
        stop_replay(replay);
        self.close_action_log();

        self.state.set_connection(ConnectionState::Disconnected);
        if had_replay {
            info!(channel = %self.name, "log replay stopped");
        }
    }

    fn state(&self) -> ChannelState {
        self.state.snapshot()
    }
}

impl InputChannel for LogfileInputChannel {
    fn bind(&self, link: ChannelLink) {
        *self.link.write() = Some(link);
    }

    fn received_messages(&self) -> u64 {
        self.received.load(Ordering::SeqCst)
    }
}

impl OutputChannel for LogfileInputChannel {
    fn send_message(&self, action: &ActionRecord) {
        let mut actions = self.actions.lock();
        let Some(out) = actions.as_mut() else {
            return;
        };
        let payload = self.encoder.encode(action);
        let written = out.write_all(&payload).and_then(|()| out.write_all(b"\n"));
        if let Err(err) = written {
            warn!(channel = %self.name, error = %err, "action log disabled");
            self.state.set_last_error(err.to_string());
            *actions = None;
        }
    }
}

impl Drop for LogfileInputChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ReplayLoop {
    name: String,
    link: Option<ChannelLink>,
    parser: Arc<dyn MessageParser>,
    records: Records,
    interval: Duration,
    state: StateCell,
    stopping: Arc<AtomicBool>,
    received: Arc<AtomicU64>,
}

impl ReplayLoop {
    fn run(mut self) {
        debug!(channel = %self.name, "replay loop started");
        while !self.stopping.load(Ordering::SeqCst) {
            match self.records.next() {
                Some(Ok(payload)) => self.on_message(payload),
                Some(Err(err)) if self.is_recoverable(&err) => self.on_invalid(err.to_string()),
                Some(Err(err)) => {
                    self.on_end(Some(err.to_string()));
                    break;
                }
                None => {
                    self.on_end(None);
                    break;
                }
            }
            if !self.interval.is_zero() {
                thread::park_timeout(self.interval);
            }
        }
        debug!(channel = %self.name, "replay loop finished");
    }

    fn is_recoverable(&self, err: &FrameError) -> bool {
        self.records
            .framing()
            .is_some_and(|framing| is_recoverable(err, framing))
    }

    fn on_message(&self, payload: Bytes) {
        let sequence = self.received.fetch_add(1, Ordering::SeqCst);
        let channel = self.link.as_ref().map_or(ChannelId(0), ChannelLink::id);
        match self.parser.parse(channel, sequence, payload) {
            Ok(record) => {
                self.state.set_data(DataState::CorrectData);
                if let Some(link) = &self.link {
                    link.deliver(record);
                }
            }
            Err(err) => self.on_invalid(err.to_string()),
        }
    }

    fn on_invalid(&self, error: String) {
        warn!(channel = %self.name, %error, "invalid data in perception log");
        self.state.invalid_data(error.clone());
        if let Some(link) = &self.link {
            link.invalid_data(&error);
        }
    }

    /// End of log, or a read error that leaves nothing to replay.
    fn on_end(&self, error: Option<String>) {
        if self.stopping.load(Ordering::SeqCst) {
            return;
        }
        match error {
            Some(error) => {
                warn!(channel = %self.name, %error, "perception log unreadable");
                self.state.fail(ConnectionState::Disconnected, error);
            }
            None => {
                info!(
                    channel = %self.name,
                    replayed = self.received.load(Ordering::SeqCst),
                    "perception log exhausted"
                );
                self.state.set_connection(ConnectionState::Disconnected);
            }
        }
        if let Some(link) = &self.link {
            link.lost_connection();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use sparklink_frame::{FrameConfig, FrameWriter};

    use super::*;
    use crate::channel::PerceptionSink;
    use crate::perception::PerceptionRecord;

    #[derive(Default)]
    struct Sink {
        records: Mutex<Vec<PerceptionRecord>>,
        invalid: Mutex<Vec<String>>,
        lost: AtomicU64,
    }

    impl PerceptionSink for Sink {
        fn deliver(&self, _channel: ChannelId, record: PerceptionRecord) {
            self.records.lock().push(record);
        }

        fn invalid_data(&self, _channel: ChannelId, error: &str) {
            self.invalid.lock().push(error.to_string());
        }

        fn lost_connection(&self, _channel: ChannelId) {
            self.lost.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn bound(channel: &LogfileInputChannel) -> Arc<Sink> {
        let sink = Arc::new(Sink::default());
        let dyn_sink: Arc<dyn PerceptionSink> = sink.clone();
        channel.bind(ChannelLink::new(ChannelId(1), Arc::downgrade(&dyn_sink)));
        sink
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sparklink-replay-{}-{name}", std::process::id()))
    }

    fn fast() -> ReplayConfig {
        ReplayConfig::default().with_interval(Duration::ZERO)
    }

    #[test]
    fn replays_lines_then_reports_loss() {
        let path = temp_path("lines.log");
        std::fs::write(&path, "(time (now 0.02))\r\n\n(time (now 0.04))\n(oops\n(time (now 0.06))").unwrap();

        let channel = LogfileInputChannel::new("log", &path).with_config(fast());
        let sink = bound(&channel);
        assert!(channel.start());

        assert!(wait_for(|| sink.lost.load(Ordering::SeqCst) == 1));
        let records = sink.records.lock();
        let times: Vec<_> = records
            .iter()
            .map(|record| record.get("time").unwrap().value("now").unwrap().to_string())
            .collect();
        assert_eq!(times, ["0.02", "0.04", "0.06"]);
        assert_eq!(sink.invalid.lock().len(), 1);
        assert_eq!(channel.received_messages(), 4);
        assert_eq!(channel.connection_state(), ConnectionState::Disconnected);

        drop(records);
        channel.stop();
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn replays_framed_log() {
        let path = temp_path("frames.slip");
        let frame = FrameConfig::default().with_framing(Framing::Slip);
        {
            let mut writer = FrameWriter::with_config(File::create(&path).unwrap(), frame.clone());
            writer.send(b"(GS (t 0.00) (pm BeforeKickOff))").unwrap();
            writer.send(b"(GS (t 0.02) (pm KickOff_Left))").unwrap();
        }

        let channel =
            LogfileInputChannel::new("log", &path).with_config(fast().with_frame_config(frame));
        let sink = bound(&channel);
        assert!(channel.start());

        assert!(wait_for(|| sink.lost.load(Ordering::SeqCst) == 1));
        assert_eq!(sink.records.lock().len(), 2);
        assert_eq!(channel.state().data, DataState::CorrectData);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_log_fails_to_start() {
        let channel = LogfileInputChannel::new("log", temp_path("does-not-exist.log"));
        assert!(!channel.start());
        let state = channel.state();
        assert_eq!(state.connection, ConnectionState::ConnectionFailed);
        assert!(state.last_error.is_some());
    }

    #[test]
    fn stop_ends_paced_replay_early() {
        let path = temp_path("paced.log");
        std::fs::write(&path, "(time (now 0.02))\n".repeat(1000)).unwrap();

        let channel = LogfileInputChannel::new("log", &path)
            .with_config(ReplayConfig::default().with_interval(Duration::from_secs(10)));
        let sink = bound(&channel);
        assert!(channel.start());
        assert!(wait_for(|| sink.records.lock().len() == 1));

        let begin = Instant::now();
        channel.stop();
        assert!(begin.elapsed() < Duration::from_secs(5));
        assert_eq!(sink.lost.load(Ordering::SeqCst), 0);
        assert_eq!(channel.connection_state(), ConnectionState::Disconnected);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn actions_go_to_the_action_log() {
        let path = temp_path("act-percepts.log");
        let actions = temp_path("act-actions.log");
        std::fs::write(&path, "(time (now 0.02))\n").unwrap();

        let channel = LogfileInputChannel::new("log", &path).with_config(
            ReplayConfig::default()
                .with_interval(Duration::from_secs(10))
                .with_action_log(&actions),
        );
        channel.send_message(&ActionRecord::new().with("syn", ""));
        assert!(channel.start());
        channel.send_message(&ActionRecord::new().with("he1", "0.5").with("syn", ""));
        channel.send_message(&ActionRecord::new().with("syn", ""));
        channel.stop();
        channel.send_message(&ActionRecord::new().with("he2", "1.0"));

        let written = std::fs::read_to_string(&actions).unwrap();
        assert_eq!(written, "(he1 0.5)(syn)\n(syn)\n");
        std::fs::remove_file(&path).unwrap();
        std::fs::remove_file(&actions).unwrap();
    }
}
