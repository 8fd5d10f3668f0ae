//! Codec engine boundary: block-streaming encoder/decoder sessions.
//!
//! # Model
//! An engine hands out *sessions*.  A session is fed input and drained into
//! caller-provided output in bounded steps; every step reports how many bytes
//! it consumed and produced plus an [`EngineStatus`].  Sessions never own the
//! buffers they work on, so the stream driver decides where compressed bytes
//! are staged and when they hit storage.
//!
//! # Status space
//! [`EngineStatus`] reuses libbzip2's numeric status codes verbatim.  Positive
//! values are progress reports, negative values are failures.  The driver
//! translates them into its own error space with [`driver_error`]:
//!
//! ```text
//! driver_code = ERROR_BASE - engine_code      (ERROR_BASE = 100)
//! ```
//!
//! `Ok`, `RunOk` and `StreamEnd` translate to "no error".

use std::fmt;

/// Offset between engine status codes and driver error codes.
pub const ERROR_BASE: i32 = 100;

/// Default encoder block size (libbzip2 `blockSize100k`).
pub const DEFAULT_LEVEL: u32 = 9;

/// Upper bound accepted by libbzip2 for `workFactor`.
pub const MAX_WORK_FACTOR: u32 = 250;

// ── Status codes ─────────────────────────────────────────────────────────────

/// Outcome of one engine call.  Discriminants are the libbzip2 codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineStatus {
    Ok,
    RunOk,
    FlushOk,
    FinishOk,
    StreamEnd,
    SequenceError,
    ParamError,
    MemError,
    DataError,
    DataMagicError,
    IoError,
    UnexpectedEof,
    OutbuffFull,
    ConfigError,
}

impl EngineStatus {
    /// Raw libbzip2 code.
    pub fn code(self) -> i32 {
        match self {
            EngineStatus::Ok             => 0,
            EngineStatus::RunOk          => 1,
            EngineStatus::FlushOk        => 2,
            EngineStatus::FinishOk       => 3,
            EngineStatus::StreamEnd      => 4,
            EngineStatus::SequenceError  => -1,
            EngineStatus::ParamError     => -2,
            EngineStatus::MemError       => -3,
            EngineStatus::DataError      => -4,
            EngineStatus::DataMagicError => -5,
            EngineStatus::IoError        => -6,
            EngineStatus::UnexpectedEof  => -7,
            EngineStatus::OutbuffFull    => -8,
            EngineStatus::ConfigError    => -9,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0  => EngineStatus::Ok,
            1  => EngineStatus::RunOk,
            2  => EngineStatus::FlushOk,
            3  => EngineStatus::FinishOk,
            4  => EngineStatus::StreamEnd,
            -1 => EngineStatus::SequenceError,
            -2 => EngineStatus::ParamError,
            -3 => EngineStatus::MemError,
            -4 => EngineStatus::DataError,
            -5 => EngineStatus::DataMagicError,
            -6 => EngineStatus::IoError,
            -7 => EngineStatus::UnexpectedEof,
            -8 => EngineStatus::OutbuffFull,
            -9 => EngineStatus::ConfigError,
            _  => return None,
        })
    }

    /// True for statuses that report progress rather than failure.
    pub fn is_progress(self) -> bool {
        self.code() >= 0
    }

    /// Human-readable name (diagnostics only).
    pub fn name(self) -> &'static str {
        match self {
            EngineStatus::Ok             => "ok",
            EngineStatus::RunOk          => "run ok",
            EngineStatus::FlushOk        => "flush in progress",
            EngineStatus::FinishOk       => "finish in progress",
            EngineStatus::StreamEnd      => "stream end",
            EngineStatus::SequenceError  => "sequence error",
            EngineStatus::ParamError     => "parameter error",
            EngineStatus::MemError       => "out of memory",
            EngineStatus::DataError      => "data integrity error",
            EngineStatus::DataMagicError => "bad stream magic",
            EngineStatus::IoError        => "engine I/O error",
            EngineStatus::UnexpectedEof  => "unexpected end of data",
            EngineStatus::OutbuffFull    => "output buffer full",
            EngineStatus::ConfigError    => "library misconfigured",
        }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// Translate an engine status into a driver error code.
///
/// Returns `None` for the statuses that mean "no error".
pub fn driver_error(status: EngineStatus) -> Option<i32> {
    match status {
        EngineStatus::Ok | EngineStatus::RunOk | EngineStatus::StreamEnd => None,
        other => Some(ERROR_BASE - other.code()),
    }
}

// ── Session traits ───────────────────────────────────────────────────────────

/// Encoder drive mode for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeAction {
    /// Accumulate input; emit output only when a block fills.
    Run,
    /// Close the current block and emit it.
    Flush,
    /// Emit everything buffered plus the stream trailer.
    Finish,
}

/// What one engine step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStep {
    pub consumed: usize,
    pub produced: usize,
    pub status:   EngineStatus,
}

pub trait Encoder: Send {
    fn encode(&mut self, input: &[u8], output: &mut [u8], action: EncodeAction) -> EngineStep;
}

pub trait Decoder: Send {
    fn decode(&mut self, input: &[u8], output: &mut [u8]) -> EngineStep;
}

/// Session factory.  A failed start is reported as the engine status that
/// caused it.
pub trait Engine: Send + Sync {
    fn start_encoder(&self, level: u32) -> Result<Box<dyn Encoder>, EngineStatus>;
    fn start_decoder(&self) -> Result<Box<dyn Decoder>, EngineStatus>;
}

// ── BZIP2 engine ─────────────────────────────────────────────────────────────

/// libbzip2 engine (via the `bzip2` crate).
#[derive(Debug, Clone, Copy, Default)]
pub struct Bzip2Engine {
    /// Use the low-memory decompression variant.
    pub small:       bool,
    /// Encoder work factor; 0 selects the library default.
    pub work_factor: u32,
}

impl Engine for Bzip2Engine {
    fn start_encoder(&self, level: u32) -> Result<Box<dyn Encoder>, EngineStatus> {
        if !(1..=9).contains(&level) || self.work_factor > MAX_WORK_FACTOR {
            return Err(EngineStatus::ParamError);
        }
        let stream = bzip2::Compress::new(bzip2::Compression::new(level), self.work_factor);
        Ok(Box::new(Bzip2Encoder { stream }))
    }

    fn start_decoder(&self) -> Result<Box<dyn Decoder>, EngineStatus> {
        Ok(Box::new(Bzip2Decoder { stream: bzip2::Decompress::new(self.small) }))
    }
}

struct Bzip2Encoder {
    stream: bzip2::Compress,
}

impl Encoder for Bzip2Encoder {
    fn encode(&mut self, input: &[u8], output: &mut [u8], action: EncodeAction) -> EngineStep {
        let (in_before, out_before) = (self.stream.total_in(), self.stream.total_out());
        let action = match action {
            EncodeAction::Run    => bzip2::Action::Run,
            EncodeAction::Flush  => bzip2::Action::Flush,
            EncodeAction::Finish => bzip2::Action::Finish,
        };
        let status = match self.stream.compress(input, output, action) {
            Ok(s)  => status_of(s),
            Err(e) => error_of(e),
        };
        EngineStep {
            consumed: (self.stream.total_in() - in_before) as usize,
            produced: (self.stream.total_out() - out_before) as usize,
            status,
        }
    }
}

struct Bzip2Decoder {
    stream: bzip2::Decompress,
}

impl Decoder for Bzip2Decoder {
    fn decode(&mut self, input: &[u8], output: &mut [u8]) -> EngineStep {
        let (in_before, out_before) = (self.stream.total_in(), self.stream.total_out());
        let status = match self.stream.decompress(input, output) {
            Ok(s)  => status_of(s),
            Err(e) => error_of(e),
        };
        EngineStep {
            consumed: (self.stream.total_in() - in_before) as usize,
            produced: (self.stream.total_out() - out_before) as usize,
            status,
        }
    }
}

fn status_of(status: bzip2::Status) -> EngineStatus {
    match status {
        bzip2::Status::Ok        => EngineStatus::Ok,
        bzip2::Status::RunOk     => EngineStatus::RunOk,
        bzip2::Status::FlushOk   => EngineStatus::FlushOk,
        bzip2::Status::FinishOk  => EngineStatus::FinishOk,
        bzip2::Status::StreamEnd => EngineStatus::StreamEnd,
        bzip2::Status::MemNeeded => EngineStatus::MemError,
    }
}

fn error_of(err: bzip2::Error) -> EngineStatus {
    match err {
        bzip2::Error::Sequence  => EngineStatus::SequenceError,
        bzip2::Error::Data      => EngineStatus::DataError,
        bzip2::Error::DataMagic => EngineStatus::DataMagicError,
        bzip2::Error::Param     => EngineStatus::ParamError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_statuses_are_not_errors() {
        assert_eq!(driver_error(EngineStatus::Ok), None);
        assert_eq!(driver_error(EngineStatus::RunOk), None);
        assert_eq!(driver_error(EngineStatus::StreamEnd), None);
    }

    #[test]
    fn failures_map_through_error_base() {
        assert_eq!(driver_error(EngineStatus::DataError), Some(104));
        assert_eq!(driver_error(EngineStatus::DataMagicError), Some(105));
        assert_eq!(driver_error(EngineStatus::ParamError), Some(102));
        // An unfinished trailer is still an error.
        assert_eq!(driver_error(EngineStatus::FinishOk), Some(97));
    }

    #[test]
    fn codes_round_trip() {
        for code in -9..=4 {
            let status = EngineStatus::from_code(code).expect("known code");
            assert_eq!(status.code(), code);
        }
        assert_eq!(EngineStatus::from_code(42), None);
    }

    #[test]
    fn encoder_rejects_bad_level() {
        let engine = Bzip2Engine::default();
        assert_eq!(engine.start_encoder(0).err(), Some(EngineStatus::ParamError));
        assert_eq!(engine.start_encoder(10).err(), Some(EngineStatus::ParamError));
        let bad_wf = Bzip2Engine { small: false, work_factor: 251 };
        assert_eq!(bad_wf.start_encoder(9).err(), Some(EngineStatus::ParamError));
    }

    #[test]
    fn single_shot_stream() {
        let engine = Bzip2Engine::default();
        let mut enc = engine.start_encoder(1).unwrap();
        let mut packed = vec![0u8; 1024];

        let step = enc.encode(b"hello hello hello", &mut packed, EncodeAction::Run);
        assert_eq!(step.consumed, 17);
        assert_eq!(step.status, EngineStatus::RunOk);

        let fin = enc.encode(&[], &mut packed[step.produced..], EncodeAction::Finish);
        assert_eq!(fin.status, EngineStatus::StreamEnd);
        let len = step.produced + fin.produced;
        assert_eq!(&packed[..3], b"BZh");

        let mut dec = engine.start_decoder().unwrap();
        let mut plain = vec![0u8; 64];
        let step = dec.decode(&packed[..len], &mut plain);
        assert_eq!(step.status, EngineStatus::StreamEnd);
        assert_eq!(&plain[..step.produced], b"hello hello hello");
    }

    #[test]
    fn decoder_rejects_garbage() {
        let mut dec = Bzip2Engine::default().start_decoder().unwrap();
        let mut out = [0u8; 16];
        let step = dec.decode(b"not a bzip2 stream", &mut out);
        assert_eq!(step.status, EngineStatus::DataMagicError);
        assert_eq!(step.produced, 0);
    }
}
