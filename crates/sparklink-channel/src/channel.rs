use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use sparklink_frame::{FrameError, FrameReader, FrameWriter, Framing};
use sparklink_transport::{Connector, TransportStream};
use tracing::{debug, info, warn};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};
use crate::perception::{
    ActionRecord, MessageEncoder, MessageParser, PerceptionRecord, SexprMessageEncoder,
    SexprMessageParser,
};
use crate::state::{ChannelId, ChannelState, ConnectionState, DataState, StateCell};

/// A single logical link with its own connection state.
///
/// All operations take `&self`: channels are shared between the manager, the
/// cycle driver and their own receive threads.
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Establish the link. True once the channel is `Connected`.
    fn start(&self) -> bool;

    /// Tear the link down. The channel ends `Disconnected` whatever state it
    /// was in; the last error is kept. Idempotent.
    fn stop(&self);

    fn state(&self) -> ChannelState;

    fn connection_state(&self) -> ConnectionState {
        self.state().connection
    }

    fn is_connected(&self) -> bool {
        self.connection_state().is_connected()
    }
}

/// A channel producing perceptions.
pub trait InputChannel: Channel {
    /// Attach the channel to its owner. Called once on registration.
    fn bind(&self, link: ChannelLink);

    /// Messages received on the current link.
    fn received_messages(&self) -> u64;
}

/// A channel consuming actions.
pub trait OutputChannel: Channel {
    /// Encode and send an action. Failures are recorded in the channel state,
    /// never returned.
    fn send_message(&self, action: &ActionRecord);
}

/// What an input channel reports to its owner.
pub trait PerceptionSink: Send + Sync {
    fn deliver(&self, channel: ChannelId, record: PerceptionRecord);
    fn invalid_data(&self, channel: ChannelId, error: &str);
    fn lost_connection(&self, channel: ChannelId);
}

/// An input channel's registration: its id and a weak handle to the owner.
#[derive(Clone)]
pub struct ChannelLink {
    id: ChannelId,
    sink: Weak<dyn PerceptionSink>,
}

impl ChannelLink {
    pub fn new(id: ChannelId, sink: Weak<dyn PerceptionSink>) -> Self {
        Self { id, sink }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Hand a decoded perception to the owner.
    pub fn deliver(&self, record: PerceptionRecord) {
        if let Some(sink) = self.sink.upgrade() {
            sink.deliver(self.id, record);
        }
    }

    pub fn invalid_data(&self, error: &str) {
        if let Some(sink) = self.sink.upgrade() {
            sink.invalid_data(self.id, error);
        }
    }

    pub fn lost_connection(&self) {
        if let Some(sink) = self.sink.upgrade() {
            sink.lost_connection(self.id);
        }
    }
}

impl std::fmt::Debug for ChannelLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelLink").field("id", &self.id).finish()
    }
}

type WriterSlot = Arc<Mutex<Option<FrameWriter<TransportStream>>>>;

/// Encode and write one action over a shared writer, recording failures.
fn send_over(
    name: &str,
    writer: &WriterSlot,
    encoder: &dyn MessageEncoder,
    state: &StateCell,
    action: &ActionRecord,
) {
    if !state.connection().is_connected() {
        state.set_last_error("not connected");
        debug!(channel = name, "send skipped, not connected");
        return;
    }

    let payload = encoder.encode(action);
    let mut guard = writer.lock();
    let Some(frame_writer) = guard.as_mut() else {
        state.fail(ConnectionState::Disconnected, "link closed");
        return;
    };

    match frame_writer.send(&payload) {
        Ok(()) => debug!(channel = name, len = payload.len(), "action sent"),
        Err(err) => {
            warn!(channel = name, error = %err, "send failed");
            *guard = None;
            state.fail(ConnectionState::Disconnected, err.to_string());
        }
    }
}

/// True if the reader can go on after `err`.
///
/// Oversized SLIP frames are dropped from the buffer; a bad length prefix
/// leaves the stream out of sync.
pub(crate) fn is_recoverable(err: &FrameError, framing: Framing) -> bool {
    err.is_frame_local()
        || (matches!(err, FrameError::PayloadTooLarge { .. }) && framing == Framing::Slip)
}

fn stop_session(session: Option<Session>) {
    let Some(session) = session else {
        return;
    };
    session.stopping.store(true, Ordering::SeqCst);
    if let Err(err) = session.stream.shutdown() {
        debug!(error = %err, "stream shutdown failed");
    }
    if let Some(handle) = session.handle {
        if handle.thread().id() != thread::current().id() {
            let _ = handle.join();
        }
    }
}

struct Session {
    stream: TransportStream,
    stopping: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// Input channel reading framed messages from a connected stream.
///
/// `start()` connects through the [`Connector`], sends the configured connect
/// messages and spawns a receive thread. The thread decodes every frame with
/// the [`MessageParser`] and hands the result to the owner. A message that
/// fails to decode marks the data invalid and keeps the link up. A transport
/// failure marks the channel `Disconnected` and reports the loss.
pub struct StreamInputChannel {
    name: String,
    connector: Arc<dyn Connector>,
    config: ChannelConfig,
    parser: Arc<dyn MessageParser>,
    state: StateCell,
    link: RwLock<Option<ChannelLink>>,
    session: Mutex<Option<Session>>,
    writer: WriterSlot,
    received: Arc<AtomicU64>,
}

impl StreamInputChannel {
    pub fn new(name: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        Self {
            name: name.into(),
            connector,
            config: ChannelConfig::default(),
            parser: Arc::new(SexprMessageParser),
            state: StateCell::new(),
            link: RwLock::new(None),
            session: Mutex::new(None),
            writer: Arc::new(Mutex::new(None)),
            received: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn MessageParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// An output channel writing over this channel's connection.
    ///
    /// It can only start while this channel is connected, so register it
    /// after the input channel.
    pub fn output_channel(&self, encoder: Arc<dyn MessageEncoder>) -> SharedWireOutput {
        SharedWireOutput {
            name: format!("{}-out", self.name),
            writer: Arc::clone(&self.writer),
            encoder,
            state: StateCell::new(),
        }
    }

    fn open_session(&self, stream: TransportStream) -> Result<()> {
        let frame = self.config.frame.clone();
        let reader = FrameReader::with_config_stream(stream.try_clone()?, frame.clone())?;
        let mut writer = FrameWriter::with_config_stream(stream.try_clone()?, frame)?;

        for message in &self.config.connect_messages {
            writer.send(message)?;
            debug!(channel = %self.name, len = message.len(), "connect message sent");
        }
        *self.writer.lock() = Some(writer);

        self.received.store(0, Ordering::SeqCst);
        self.state.connected();

        let stopping = Arc::new(AtomicBool::new(false));
        let receive = ReceiveLoop {
            name: self.name.clone(),
            link: self.link.read().clone(),
            parser: Arc::clone(&self.parser),
            reader,
            writer: Arc::clone(&self.writer),
            state: self.state.clone(),
            stopping: Arc::clone(&stopping),
            received: Arc::clone(&self.received),
            first_reply: self.config.first_message_reply.clone(),
        };
        let spawned = thread::Builder::new()
            .name(format!("sparklink-recv-{}", self.name))
            .spawn(move || receive.run());

        match spawned {
            Ok(handle) => {
                *self.session.lock() = Some(Session {
                    stream,
                    stopping,
                    handle: Some(handle),
                });
                Ok(())
            }
            Err(err) => {
                *self.writer.lock() = None;
                let _ = stream.shutdown();
                Err(err.into())
            }
        }
    }
}

impl Channel for StreamInputChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> bool {
        if self.state.connection().is_connected() {
            return true;
        }
        // A previous link may have died on its own; reap its thread first.
        let previous = self.session.lock().take();
        stop_session(previous);

        self.state.set_connection(ConnectionState::TryingToConnect);
        let target = self.connector.describe();

        let stream = match self.connector.connect() {
            Ok(stream) => stream,
            Err(err) => {
                warn!(
                    channel = %self.name,
                    %target,
                    error = %err,
                    transient = err.is_transient(),
                    "connection failed"
                );
                self.state.fail(ConnectionState::ConnectionFailed, err.to_string());
                return false;
            }
        };

        match self.open_session(stream) {
            Ok(()) => {
                info!(channel = %self.name, %target, "channel connected");
                true
            }
            Err(err) => {
                warn!(channel = %self.name, %target, error = %err, "channel setup failed");
                *self.writer.lock() = None;
                self.state.fail(ConnectionState::ConnectionFailed, err.to_string());
                false
            }
        }
    }

    fn stop(&self) {
        let session = self.session.lock().take();
        self.writer.lock().take();
        let had_session = session.is_some();
        stop_session(session);

        self.state.set_connection(ConnectionState::Disconnected);
        if had_session {
            info!(channel = %self.name, "channel stopped");
        }
    }

    fn state(&self) -> ChannelState {
        self.state.snapshot()
    }
}

impl InputChannel for StreamInputChannel {
    fn bind(&self, link: ChannelLink) {
        *self.link.write() = Some(link);
    }

    fn received_messages(&self) -> u64 {
        self.received.load(Ordering::SeqCst)
    }
}

impl Drop for StreamInputChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ReceiveLoop {
    name: String,
    link: Option<ChannelLink>,
    parser: Arc<dyn MessageParser>,
    reader: FrameReader<TransportStream>,
    writer: WriterSlot,
    state: StateCell,
    stopping: Arc<AtomicBool>,
    received: Arc<AtomicU64>,
    first_reply: Option<Bytes>,
}

impl ReceiveLoop {
    fn run(mut self) {
        debug!(channel = %self.name, "receive loop started");
        loop {
            match self.reader.read_frame() {
                Ok(payload) => {
                    if let Err(err) = self.on_message(payload) {
                        self.on_transport_failure(err.to_string());
                        break;
                    }
                }
                Err(err) if err.is_timeout() => {
                    if self.stopping.load(Ordering::SeqCst) {
                        break;
                    }
                }
                Err(err) if self.is_recoverable(&err) => self.on_invalid(err.to_string()),
                Err(err) => {
                    if !self.stopping.load(Ordering::SeqCst) {
                        self.on_transport_failure(err.to_string());
                    }
                    break;
                }
            }
        }
        debug!(channel = %self.name, "receive loop finished");
    }

    fn is_recoverable(&self, err: &FrameError) -> bool {
        is_recoverable(err, self.reader.config().framing)
    }

    fn on_message(&mut self, payload: Bytes) -> std::result::Result<(), FrameError> {
        let sequence = self.received.fetch_add(1, Ordering::SeqCst);
        if sequence == 0 {
            if let Some(reply) = &self.first_reply {
                if let Some(writer) = self.writer.lock().as_mut() {
                    writer.send(reply)?;
                    debug!(channel = %self.name, "first-message reply sent");
                }
            }
        }

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
        Ok(())
    }

    fn on_invalid(&self, error: String) {
        warn!(channel = %self.name, %error, "invalid data received");
        self.state.invalid_data(error.clone());
        if let Some(link) = &self.link {
            link.invalid_data(&error);
        }
    }

    fn on_transport_failure(&self, error: String) {
        warn!(channel = %self.name, %error, "connection lost");
        self.writer.lock().take();
        self.state.fail(ConnectionState::Disconnected, error);
        if let Some(link) = &self.link {
            link.lost_connection();
        }
    }
}

/// Output channel sharing an input channel's connection.
pub struct SharedWireOutput {
    name: String,
    writer: WriterSlot,
    encoder: Arc<dyn MessageEncoder>,
    state: StateCell,
}

impl Channel for SharedWireOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> bool {
        if self.writer.lock().is_some() {
            self.state.connected();
            true
        } else {
            self.state
                .fail(ConnectionState::ConnectionFailed, "input channel not connected");
            false
        }
    }

    fn stop(&self) {
        self.state.set_connection(ConnectionState::Disconnected);
    }

    fn state(&self) -> ChannelState {
        self.state.snapshot()
    }
}

impl OutputChannel for SharedWireOutput {
    fn send_message(&self, action: &ActionRecord) {
        send_over(&self.name, &self.writer, self.encoder.as_ref(), &self.state, action);
    }
}

/// Output channel with a connection of its own.
pub struct StreamOutputChannel {
    name: String,
    connector: Arc<dyn Connector>,
    config: ChannelConfig,
    encoder: Arc<dyn MessageEncoder>,
    state: StateCell,
    stream: Mutex<Option<TransportStream>>,
    writer: WriterSlot,
}

impl StreamOutputChannel {
    pub fn new(name: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        Self {
            name: name.into(),
            connector,
            config: ChannelConfig::default(),
            encoder: Arc::new(SexprMessageEncoder),
            state: StateCell::new(),
            stream: Mutex::new(None),
            writer: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn MessageEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    fn open(&self, stream: &TransportStream) -> Result<FrameWriter<TransportStream>> {
        let mut writer =
            FrameWriter::with_config_stream(stream.try_clone()?, self.config.frame.clone())?;
        for message in &self.config.connect_messages {
            writer.send(message)?;
        }
        Ok(writer)
    }
}

impl Channel for StreamOutputChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> bool {
        if self.state.connection().is_connected() {
            return true;
        }
        self.state.set_connection(ConnectionState::TryingToConnect);

        let opened = self
            .connector
            .connect()
            .map_err(ChannelError::from)
            .and_then(|stream| self.open(&stream).map(|writer| (stream, writer)));

        match opened {
            Ok((stream, writer)) => {
                *self.writer.lock() = Some(writer);
                *self.stream.lock() = Some(stream);
                self.state.connected();
                info!(channel = %self.name, target = %self.connector.describe(), "channel connected");
                true
            }
            Err(err) => {
                warn!(channel = %self.name, error = %err, "connection failed");
                self.state.fail(ConnectionState::ConnectionFailed, err.to_string());
                false
            }
        }
    }

    fn stop(&self) {
        self.writer.lock().take();
        if let Some(stream) = self.stream.lock().take() {
            let _ = stream.shutdown();
            info!(channel = %self.name, "channel stopped");
        }
        self.state.set_connection(ConnectionState::Disconnected);
    }

    fn state(&self) -> ChannelState {
        self.state.snapshot()
    }
}

impl OutputChannel for StreamOutputChannel {
    fn send_message(&self, action: &ActionRecord) {
        send_over(&self.name, &self.writer, self.encoder.as_ref(), &self.state, action);
    }
}

impl Drop for StreamOutputChannel {
    fn drop(&mut self) {
        self.stop();
    }
}
