//! BZIP2 stream driver: a sequential file that compresses on write and
//! decompresses on read.
//!
//! # Lifecycle
//! A [`Bz2File`] wraps an already-open underlying [`FileHandle`].  No codec
//! session exists until the first data call:
//!
//! ```text
//!            first read ok                 logical end
//! Unset ──────────────────► Read (Decoding) ───────────► Read (ended, idle)
//!   │
//!   │        first write ok                close
//!   └─────────────────────► Write (Encoding) ──────────► finalised + closed
//! ```
//!
//! The mode locks on the first successful session start; a call of the
//! opposite kind afterwards fails with [`FileError::Unsupported`].  The open
//! access mode seeds the mode as a hint, so a handle opened write-only
//! refuses reads from the start.
//!
//! # Close
//! Closing a write-mode handle runs the finalisation flush, which emits the
//! stream trailer.  Dropping a handle without `close` skips it and leaves a
//! truncated stream behind.
//!
//! # Positional access
//! There is no seeking inside a compressed stream.  Positional calls succeed
//! only at the current logical position and then behave like their
//! sequential counterparts; `size` always reports "unsupported".

mod flusher;
mod puller;

use std::io::{self, SeekFrom};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::buffer::{StagingBuffer, DEFAULT_BUFFER_SIZE};
use crate::codec::{Bzip2Engine, Decoder, Encoder, Engine, DEFAULT_LEVEL};
use crate::config::DriverConfig;
use crate::file::{
    AccessMode, ConfigOption, ConfigValue, FileError, FileHandle, LockKind, Transfer,
    ERR_NONE, TIMEOUT_DEFAULT,
};
use crate::name::TAG_PREFIX;

// ── Mode / options / statistics ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Unset,
    Read,
    Write,
}

impl StreamMode {
    /// State code reported through `ConfigOption::State`.
    pub fn code(self) -> i64 {
        match self {
            StreamMode::Read  => 0,
            StreamMode::Write => 1,
            StreamMode::Unset => 2,
        }
    }

    fn from_access(access: AccessMode) -> Self {
        match access {
            AccessMode::Read      => StreamMode::Read,
            AccessMode::Write     => StreamMode::Write,
            AccessMode::ReadWrite => StreamMode::Unset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Encoder block size, 1..=9.  Checked when the encoder starts.
    pub level:       u32,
    pub buffer_size: usize,
    /// Initial timeout budget.
    pub timeout:     i64,
}

impl StreamOptions {
    pub fn from_config(config: &DriverConfig, level: u32) -> Self {
        Self {
            level,
            buffer_size: config.buffer_size,
            timeout:     config.default_timeout,
        }
    }
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            level:       DEFAULT_LEVEL,
            buffer_size: DEFAULT_BUFFER_SIZE,
            timeout:     TIMEOUT_DEFAULT,
        }
    }
}

/// Per-handle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStats {
    /// Uncompressed bytes handed to / returned from the caller.
    pub plain_bytes:       u64,
    /// Compressed bytes read from / written to the underlying handle.
    pub compressed_bytes:  u64,
    pub refills:           u64,
    pub drains:            u64,
    /// Failures hidden because the same call already transferred bytes.
    pub suppressed_errors: u64,
}

enum Session {
    Idle,
    Decoding(Box<dyn Decoder>),
    Encoding(Box<dyn Encoder>),
}

// ── Handle ───────────────────────────────────────────────────────────────────

pub struct Bz2File {
    inner:      Box<dyn FileHandle>,
    engine:     Arc<dyn Engine>,
    session:    Session,
    mode:       StreamMode,
    ended:      bool,
    staging:    StagingBuffer,
    position:   u64,
    timeout:    i64,
    level:      u32,
    last_error: i32,
    stats:      StreamStats,
}

impl Bz2File {
    pub fn new(inner: Box<dyn FileHandle>, access: AccessMode, level: u32) -> Self {
        Self::with_options(
            inner,
            access,
            StreamOptions { level, ..StreamOptions::default() },
            Arc::new(Bzip2Engine::default()),
        )
    }

    pub fn with_options(
        inner:   Box<dyn FileHandle>,
        access:  AccessMode,
        options: StreamOptions,
        engine:  Arc<dyn Engine>,
    ) -> Self {
        Self {
            inner,
            engine,
            session:    Session::Idle,
            mode:       StreamMode::from_access(access),
            ended:      false,
            staging:    StagingBuffer::with_capacity(options.buffer_size),
            position:   0,
            timeout:    options.timeout,
            level:      options.level,
            last_error: ERR_NONE,
            stats:      StreamStats::default(),
        }
    }

    pub fn mode(&self) -> StreamMode { self.mode }

    /// Logical (uncompressed) position.
    pub fn position(&self) -> u64 { self.position }

    pub fn level(&self) -> u32 { self.level }

    pub fn timeout(&self) -> i64 { self.timeout }

    /// Whether a codec session is live.
    pub fn is_initialized(&self) -> bool {
        !matches!(self.session, Session::Idle)
    }

    /// Whether the decoder has reported logical end.
    pub fn is_end_of_stream(&self) -> bool { self.ended }

    pub fn last_error(&self) -> i32 { self.last_error }

    pub fn stats(&self) -> StreamStats { self.stats }

    // ── Internal helpers ────────────────────────────────────────────────────

    fn fail<T>(&mut self, err: FileError) -> Result<T, FileError> {
        self.last_error = err.code();
        Err(err)
    }

    fn record<T>(&mut self, result: Result<T, FileError>) -> Result<T, FileError> {
        self.last_error = match &result {
            Ok(_)  => ERR_NONE,
            Err(e) => e.code(),
        };
        result
    }

    fn resolve_timeout(&self, timeout: i64) -> i64 {
        if timeout == TIMEOUT_DEFAULT { self.timeout } else { timeout }
    }

    fn start_decoder(&mut self) -> Result<(), FileError> {
        if let Session::Idle = self.session {
            let decoder = self.engine.start_decoder().map_err(FileError::codec)?;
            self.session = Session::Decoding(decoder);
            self.mode    = StreamMode::Read;
            debug!("decoder session started");
        }
        Ok(())
    }

    fn start_encoder(&mut self) -> Result<(), FileError> {
        if let Session::Idle = self.session {
            let encoder = self.engine.start_encoder(self.level).map_err(FileError::codec)?;
            self.staging.clear();
            self.session = Session::Encoding(encoder);
            self.mode    = StreamMode::Write;
            debug!(level = self.level, "encoder session started");
        }
        Ok(())
    }
}

impl FileHandle for Bz2File {
    fn read(&mut self, buf: &mut [u8], timeout: i64) -> Result<Transfer, FileError> {
        if self.mode == StreamMode::Write {
            return self.fail(FileError::Unsupported);
        }
        if self.ended {
            self.last_error = ERR_NONE;
            return Ok(Transfer::EndOfStream);
        }
        if let Err(e) = self.start_decoder() {
            return self.fail(e);
        }

        let timeout = self.resolve_timeout(timeout);
        let pull = match &mut self.session {
            Session::Decoding(decoder) => puller::pull(
                decoder.as_mut(),
                &mut self.staging,
                self.inner.as_mut(),
                buf,
                timeout,
                &mut self.stats,
            ),
            _ => return self.fail(FileError::Unsupported),
        };

        if pull.ended {
            self.session = Session::Idle;
            self.ended   = true;
            debug!(position = self.position + pull.produced as u64, "logical end of stream");
        }
        self.position          += pull.produced as u64;
        self.stats.plain_bytes += pull.produced as u64;

        match (pull.produced, pull.failure) {
            (0, Some(err)) => self.fail(err),
            (n, Some(err)) => {
                self.last_error = err.code();
                self.stats.suppressed_errors += 1;
                warn!(bytes = n, error = %err, "read failure suppressed by partial progress");
                Ok(Transfer::Bytes(n))
            }
            (0, None) if self.ended => {
                self.last_error = ERR_NONE;
                Ok(Transfer::EndOfStream)
            }
            (n, None) => {
                self.last_error = ERR_NONE;
                Ok(Transfer::Bytes(n))
            }
        }
    }

    fn write(&mut self, buf: &[u8], timeout: i64) -> Result<usize, FileError> {
        if self.mode == StreamMode::Read {
            return self.fail(FileError::Unsupported);
        }
        if let Err(e) = self.start_encoder() {
            return self.fail(e);
        }

        let timeout = self.resolve_timeout(timeout);
        let push = match &mut self.session {
            Session::Encoding(encoder) => flusher::push(
                encoder.as_mut(),
                &mut self.staging,
                self.inner.as_mut(),
                buf,
                timeout,
                &mut self.stats,
            ),
            _ => return self.fail(FileError::Unsupported),
        };

        self.position          += push.consumed as u64;
        self.stats.plain_bytes += push.consumed as u64;

        match (push.consumed, push.failure) {
            (0, Some(err)) => self.fail(err),
            (n, Some(err)) => {
                self.last_error = err.code();
                self.stats.suppressed_errors += 1;
                warn!(bytes = n, error = %err, "write stopped early");
                Ok(n)
            }
            (n, None) => {
                self.last_error = ERR_NONE;
                Ok(n)
            }
        }
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<Transfer, FileError> {
        if self.mode != StreamMode::Write && offset == self.position {
            let timeout = self.timeout;
            self.read(buf, timeout)
        } else {
            self.fail(FileError::Unsupported)
        }
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize, FileError> {
        if self.mode != StreamMode::Read && offset == self.position {
            let timeout = self.timeout;
            self.write(buf, timeout)
        } else {
            self.fail(FileError::Unsupported)
        }
    }

    // Nothing past the current position exists yet, so there is nothing to cut.
    fn truncate_at(&mut self, offset: u64) -> Result<(), FileError> {
        if self.mode != StreamMode::Read && offset == self.position {
            self.last_error = ERR_NONE;
            Ok(())
        } else {
            self.fail(FileError::Unsupported)
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, FileError> {
        match pos {
            SeekFrom::Start(n) if n == self.position => {}
            SeekFrom::Current(0) => {}
            _ => return self.fail(FileError::Seek { position: self.position }),
        }
        self.last_error = ERR_NONE;
        Ok(self.position)
    }

    fn size(&mut self) -> Result<u64, FileError> {
        self.fail(FileError::Unsupported)
    }

    fn eof(&mut self) -> bool {
        self.mode == StreamMode::Write || self.ended || self.inner.eof()
    }

    // Only the underlying handle is flushed; the encoder keeps its open block.
    fn flush(&mut self, dirty: bool) -> Result<(), FileError> {
        if self.mode == StreamMode::Write && self.is_initialized() {
            let result = self.inner.flush(dirty);
            self.record(result)
        } else {
            self.last_error = ERR_NONE;
            Ok(())
        }
    }

    fn commit(&mut self) -> Result<(), FileError> {
        if self.mode == StreamMode::Write && self.is_initialized() {
            self.flush(true)?;
            let result = self.inner.commit();
            self.record(result)
        } else {
            self.last_error = ERR_NONE;
            Ok(())
        }
    }

    fn lock(&mut self, start: u64, len: u64, kind: LockKind) -> Result<bool, FileError> {
        let result = self.inner.lock(start, len, kind);
        self.record(result)
    }

    fn lock_test(&mut self, start: u64, len: u64, kind: LockKind) -> Result<bool, FileError> {
        let result = self.inner.lock_test(start, len, kind);
        self.record(result)
    }

    fn configure(&mut self, option: ConfigOption) -> Result<ConfigValue, FileError> {
        let result = match option {
            ConfigOption::Timeout(new) => {
                let old = self.timeout;
                if let Some(t) = new {
                    self.timeout = t;
                }
                Ok(ConfigValue::Int(old))
            }
            ConfigOption::State => Ok(ConfigValue::Int(self.mode.code())),
            ConfigOption::ReadHandle | ConfigOption::WriteHandle => {
                Ok(ConfigValue::Int(self.inner.handle().unwrap_or(-1)))
            }
            ConfigOption::IoName => {
                let next = match self.inner.configure(ConfigOption::IoName) {
                    Ok(ConfigValue::Text(s)) => s,
                    _                        => String::new(),
                };
                Ok(ConfigValue::Text(format!("{TAG_PREFIX}{next}")))
            }
            ConfigOption::LastError => Ok(ConfigValue::Int(i64::from(self.last_error))),
            ConfigOption::Statistics => serde_json::to_value(self.stats)
                .map(ConfigValue::Json)
                .map_err(|e| FileError::Io(io::Error::new(io::ErrorKind::Other, e))),
            other => self.inner.configure(other),
        };
        self.record(result)
    }

    fn handle(&self) -> Option<i64> {
        self.inner.handle()
    }

    fn close(self: Box<Self>) -> Result<(), FileError> {
        let mut this = *self;

        let finished = match std::mem::replace(&mut this.session, Session::Idle) {
            Session::Encoding(mut encoder) => {
                let result = flusher::finish(
                    encoder.as_mut(),
                    &mut this.staging,
                    this.inner.as_mut(),
                    this.timeout,
                    &mut this.stats,
                );
                debug!(
                    plain      = this.stats.plain_bytes,
                    compressed = this.stats.compressed_bytes,
                    ok         = result.is_ok(),
                    "encoder session finalised"
                );
                result
            }
            // Nothing to emit on the read side; the session is simply released.
            Session::Decoding(_) | Session::Idle => Ok(()),
        };

        let closed = this.inner.close();
        finished?;
        closed
    }
}
