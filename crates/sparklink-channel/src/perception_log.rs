use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use sparklink_frame::{FrameConfig, FrameWriter};
use tracing::{debug, warn};

use crate::error::Result;
use crate::perception::PerceptionRecord;
use crate::state::ChannelId;

/// Receives every perception the manager accepts, before it is queued.
///
/// Runs on the delivering channel's receive thread and must not block.
pub trait PerceptionLogger: Send + Sync {
    fn log(&self, channel: ChannelId, record: &PerceptionRecord);

    /// Push buffered output to its destination. Called when the manager stops.
    fn flush(&self) {}
}

enum LogWriter {
    Lines(BufWriter<File>),
    Frames(FrameWriter<BufWriter<File>>),
}

impl LogWriter {
    fn write(&mut self, payload: &[u8]) -> std::io::Result<()> {
        match self {
            LogWriter::Lines(out) => {
                out.write_all(payload)?;
                out.write_all(b"\n")
            }
            LogWriter::Frames(out) => out.send(payload).map_err(std::io::Error::other),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            LogWriter::Lines(out) => out.flush(),
            LogWriter::Frames(out) => out.flush().map_err(std::io::Error::other),
        }
    }
}

/// Writes the raw payload of each perception to a file.
///
/// The default layout is one message per line, which is what
/// [`LogfileInputChannel`](crate::LogfileInputChannel) replays. A write
/// failure is logged once and disables the logger.
pub struct FilePerceptionLogger {
    path: PathBuf,
    out: Mutex<Option<LogWriter>>,
    logged: AtomicU64,
}

impl FilePerceptionLogger {
    /// Create (or truncate) `path` and log one message per line.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self::with_writer(path.as_ref(), LogWriter::Lines(BufWriter::new(file))))
    }

    /// Create (or truncate) `path` and log framed payloads.
    pub fn create_framed(path: impl AsRef<Path>, frame: FrameConfig) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        let writer = FrameWriter::with_config(BufWriter::new(file), frame);
        Ok(Self::with_writer(path.as_ref(), LogWriter::Frames(writer)))
    }

    fn with_writer(path: &Path, writer: LogWriter) -> Self {
        debug!(path = %path.display(), "perception log opened");
        Self {
            path: path.to_path_buf(),
            out: Mutex::new(Some(writer)),
            logged: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Perceptions written so far.
    pub fn logged(&self) -> u64 {
        self.logged.load(Ordering::SeqCst)
    }
}

impl PerceptionLogger for FilePerceptionLogger {
    fn log(&self, channel: ChannelId, record: &PerceptionRecord) {
        let mut out = self.out.lock();
        let Some(writer) = out.as_mut() else {
            return;
        };
        match writer.write(record.raw()) {
            Ok(()) => {
                self.logged.fetch_add(1, Ordering::SeqCst);
            }
            Err(err) => {
                warn!(path = %self.path.display(), %channel, error = %err, "perception log disabled");
                *out = None;
            }
        }
    }

    fn flush(&self) {
        if let Some(writer) = self.out.lock().as_mut() {
            if let Err(err) = writer.flush() {
                warn!(path = %self.path.display(), error = %err, "perception log flush failed");
            }
        }
    }
}

impl Drop for FilePerceptionLogger {
    fn drop(&mut self) {
        self.flush();
    }
}
