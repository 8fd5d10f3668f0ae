//! Generic sequential file contract shared by every layer of the driver chain.
//!
//! A [`FileHandle`] is what a driver hands back from `open`.  Filters such as
//! the BZIP2 stream driver consume their underlying storage through the very
//! same trait, so layers stack without knowing what sits below them.
//!
//! # Timeouts
//! Data calls take a timeout in milliseconds:
//!
//! | Value | Meaning |
//! |-------|---------|
//! | `-1`  | use the handle's configured default |
//! | `0`   | single non-blocking attempt |
//! | `>0`  | bounded blocking wait |
//!
//! # Error codes
//! Every [`FileError`] has a numeric [`FileError::code`], which is what the
//! last-error slot of a handle stores.  `0` means "no error".

use std::io::{self, SeekFrom};
use thiserror::Error;

use crate::codec::{driver_error, EngineStatus, ERROR_BASE};

pub mod local;
pub mod memory;

pub use local::{LocalDriver, LocalFile};
pub use memory::MemoryFile;

/// Timeout value meaning "use the handle's configured default".
pub const TIMEOUT_DEFAULT: i64 = -1;

/// Last-error value for a successful call.
pub const ERR_NONE:        i32 = 0;
/// Fallback code for I/O errors that carry no OS errno.
pub const ERR_IO:          i32 = 5;
/// "Seek Error".
pub const ERR_SEEK:        i32 = 25;
/// Operation not supported by this driver / in this state.
pub const ERR_UNSUPPORTED: i32 = -1;

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum FileError {
    /// Engine failure during session start, encode or decode.
    #[error("Codec error {code}: {status}")]
    Codec { status: EngineStatus, code: i32 },
    #[error("Operation not supported")]
    Unsupported,
    /// Seek to anything other than the current position.
    #[error("Seek error (stream is at {position})")]
    Seek { position: u64 },
    /// Propagated verbatim from the underlying storage.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FileError {
    /// Build a codec error from an engine status.
    pub fn codec(status: EngineStatus) -> Self {
        let code = driver_error(status).unwrap_or(ERROR_BASE - status.code());
        FileError::Codec { status, code }
    }

    /// Numeric code stored in a handle's last-error slot.
    pub fn code(&self) -> i32 {
        match self {
            FileError::Codec { code, .. } => *code,
            FileError::Unsupported        => ERR_UNSUPPORTED,
            FileError::Seek { .. }        => ERR_SEEK,
            FileError::Io(e)              => e.raw_os_error().unwrap_or(ERR_IO),
        }
    }
}

// ── Data-call results ────────────────────────────────────────────────────────

/// Outcome of a read call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// `n` bytes were placed in the caller's buffer (`n` may be 0 when
    /// nothing was available within the timeout).
    Bytes(usize),
    /// The stream has ended; nothing will ever be transferred again.
    EndOfStream,
}

impl Transfer {
    #[inline]
    pub fn len(self) -> usize {
        match self {
            Transfer::Bytes(n)    => n,
            Transfer::EndOfStream => 0,
        }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_end(self) -> bool {
        matches!(self, Transfer::EndOfStream)
    }
}

// ── Open parameters ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    pub access:   AccessMode,
    pub create:   bool,
    pub truncate: bool,
}

impl OpenFlags {
    /// Open an existing file for reading.
    pub fn read() -> Self {
        Self { access: AccessMode::Read, create: false, truncate: false }
    }

    /// Create (or truncate) a file for writing.
    pub fn create() -> Self {
        Self { access: AccessMode::Write, create: true, truncate: true }
    }

    pub fn read_write() -> Self {
        Self { access: AccessMode::ReadWrite, create: false, truncate: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Shared,
    Exclusive,
    Unlock,
}

// ── Configure ────────────────────────────────────────────────────────────────

/// Options understood by `configure`.  Drivers forward what they do not
/// recognise to the layer below.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOption {
    /// Get the timeout budget; set it when `Some`.  Returns the previous value.
    Timeout(Option<i64>),
    /// Numeric stream state code.
    State,
    /// Native descriptor used for reading.
    ReadHandle,
    /// Native descriptor used for writing.
    WriteHandle,
    /// Reconstructed, fully tagged name of the handle.
    IoName,
    /// Code left by the last call on this handle.
    LastError,
    /// Driver statistics as JSON.
    Statistics,
    /// Driver-specific option.
    Custom { id: u32, value: ConfigValue },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    None,
    Int(i64),
    Text(String),
    Json(serde_json::Value),
}

impl ConfigValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(v) => Some(*v),
            _                   => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ConfigValue::Text(s) => Some(s),
            _                    => None,
        }
    }
}

// ── Handle trait ─────────────────────────────────────────────────────────────

/// An open sequential file.
///
/// Handles are single-caller: no two calls on the same handle may be in
/// flight at once.  `close` consumes the handle; dropping a handle without
/// closing it releases resources but skips any close-time finalisation.
pub trait FileHandle: Send {
    fn read(&mut self, buf: &mut [u8], timeout: i64) -> Result<Transfer, FileError>;
    fn write(&mut self, buf: &[u8], timeout: i64) -> Result<usize, FileError>;

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<Transfer, FileError>;
    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize, FileError>;
    fn truncate_at(&mut self, offset: u64) -> Result<(), FileError>;

    /// Returns the resulting position.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, FileError>;
    fn size(&mut self) -> Result<u64, FileError>;
    fn eof(&mut self) -> bool;

    fn flush(&mut self, dirty: bool) -> Result<(), FileError>;
    fn commit(&mut self) -> Result<(), FileError>;

    /// Returns whether the lock was obtained (or released).
    fn lock(&mut self, start: u64, len: u64, kind: LockKind) -> Result<bool, FileError>;
    /// Returns whether the range is held by someone else.
    fn lock_test(&mut self, start: u64, len: u64, kind: LockKind) -> Result<bool, FileError>;

    fn configure(&mut self, option: ConfigOption) -> Result<ConfigValue, FileError>;
    /// Native descriptor, if the handle is backed by one.
    fn handle(&self) -> Option<i64>;

    fn close(self: Box<Self>) -> Result<(), FileError>;
}
