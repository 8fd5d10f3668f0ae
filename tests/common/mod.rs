#![allow(dead_code)]

use std::io::{self, SeekFrom};
use std::sync::{Arc, Mutex};

use bz2io::codec::{Bzip2Engine, Decoder, Encoder, Engine, EngineStatus, EngineStep};
use bz2io::file::{
    AccessMode, ConfigOption, ConfigValue, FileError, FileHandle, LockKind, MemoryFile, Transfer,
};
use bz2io::Bz2File;

/// Deterministic test payload.  `text` payloads compress well; binary ones
/// barely compress at all.
pub fn payload(len: usize, seed: u64, text: bool) -> Vec<u8> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..len).map(|_| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let r = (state >> 33) as u8;
        if text { b"abcdefgh ij\n"[(r % 12) as usize] } else { r }
    }).collect()
}

/// Write `data` through a fresh write-mode stream and return the compressed bytes.
pub fn compress(data: &[u8], level: u32) -> Vec<u8> {
    let mem   = MemoryFile::new();
    let store = mem.store();
    let mut f = Box::new(Bz2File::new(Box::new(mem), AccessMode::Write, level));
    // Always issue one write so an empty payload still yields a valid stream.
    let mut off = f.write(data, -1).unwrap();
    while off < data.len() {
        let n = f.write(&data[off..], -1).unwrap();
        assert!(n > 0, "write made no progress");
        off += n;
    }
    f.close().unwrap();
    let bytes = store.lock().unwrap().clone();
    bytes
}

/// Read a compressed stream to logical end in `chunk`-sized calls.
pub fn decompress_from(inner: MemoryFile, chunk: usize) -> Vec<u8> {
    let mut f   = Box::new(Bz2File::new(Box::new(inner), AccessMode::Read, 9));
    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk];
    loop {
        match f.read(&mut buf, -1).unwrap() {
            Transfer::EndOfStream => break,
            Transfer::Bytes(0)    => panic!("read stalled before logical end"),
            Transfer::Bytes(n)    => out.extend_from_slice(&buf[..n]),
        }
    }
    assert_eq!(f.position(), out.len() as u64);
    f.close().unwrap();
    out
}

pub fn decompress(packed: Vec<u8>, chunk: usize) -> Vec<u8> {
    decompress_from(MemoryFile::from_bytes(packed), chunk)
}

// ── Recording handle ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct CallLog {
    pub read_timeouts:  Vec<i64>,
    pub write_timeouts: Vec<i64>,
    pub flushes:        usize,
    pub commits:        usize,
    pub closes:         usize,
    pub locks:          Vec<(u64, u64, LockKind)>,
    pub custom:         Vec<u32>,
}

/// Underlying handle that records what the stream driver asks of it.
pub struct RecordingFile {
    inner:        MemoryFile,
    log:          Arc<Mutex<CallLog>>,
    fail_writes:  bool,
    stall_writes: bool,
}

impl RecordingFile {
    pub fn new(inner: MemoryFile) -> (Self, Arc<Mutex<CallLog>>) {
        let log = Arc::new(Mutex::new(CallLog::default()));
        (Self { inner, log: log.clone(), fail_writes: false, stall_writes: false }, log)
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Every write accepts zero bytes without failing.
    pub fn stalled_writes(mut self) -> Self {
        self.stall_writes = true;
        self
    }
}

impl FileHandle for RecordingFile {
    fn read(&mut self, buf: &mut [u8], timeout: i64) -> Result<Transfer, FileError> {
        self.log.lock().unwrap().read_timeouts.push(timeout);
        self.inner.read(buf, timeout)
    }

    fn write(&mut self, buf: &[u8], timeout: i64) -> Result<usize, FileError> {
        self.log.lock().unwrap().write_timeouts.push(timeout);
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink gone").into());
        }
        if self.stall_writes {
            return Ok(0);
        }
        self.inner.write(buf, timeout)
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<Transfer, FileError> {
        self.inner.read_at(buf, offset)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize, FileError> {
        self.inner.write_at(buf, offset)
    }

    fn truncate_at(&mut self, offset: u64) -> Result<(), FileError> {
        self.inner.truncate_at(offset)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, FileError> {
        self.inner.seek(pos)
    }

    fn size(&mut self) -> Result<u64, FileError> {
        self.inner.size()
    }

    fn eof(&mut self) -> bool {
        self.inner.eof()
    }

    fn flush(&mut self, dirty: bool) -> Result<(), FileError> {
        self.log.lock().unwrap().flushes += 1;
        self.inner.flush(dirty)
    }

    fn commit(&mut self) -> Result<(), FileError> {
        self.log.lock().unwrap().commits += 1;
        self.inner.commit()
    }

    fn lock(&mut self, start: u64, len: u64, kind: LockKind) -> Result<bool, FileError> {
        self.log.lock().unwrap().locks.push((start, len, kind));
        self.inner.lock(start, len, kind)
    }

    fn lock_test(&mut self, start: u64, len: u64, kind: LockKind) -> Result<bool, FileError> {
        self.inner.lock_test(start, len, kind)
    }

    fn configure(&mut self, option: ConfigOption) -> Result<ConfigValue, FileError> {
        match option {
            ConfigOption::Custom { id, .. } => {
                self.log.lock().unwrap().custom.push(id);
                Ok(ConfigValue::Int(i64::from(id) * 10))
            }
            other => self.inner.configure(other),
        }
    }

    fn handle(&self) -> Option<i64> {
        Some(42)
    }

    fn close(self: Box<Self>) -> Result<(), FileError> {
        self.log.lock().unwrap().closes += 1;
        Box::new(self.inner).close()
    }
}

// ── Scripted engine ──────────────────────────────────────────────────────────

/// Decoder that emits a fixed plain payload, then fails with `fail_with`.
/// Encoding is delegated to the real bzip2 engine.
pub struct ScriptedEngine {
    pub plain:      Vec<u8>,
    pub fail_with:  EngineStatus,
    pub fail_start: bool,
}

struct ScriptedDecoder {
    remaining: Vec<u8>,
    fail_with: EngineStatus,
}

impl Decoder for ScriptedDecoder {
    fn decode(&mut self, input: &[u8], output: &mut [u8]) -> EngineStep {
        if self.remaining.is_empty() {
            return EngineStep { consumed: 0, produced: 0, status: self.fail_with };
        }
        let n = self.remaining.len().min(output.len());
        output[..n].copy_from_slice(&self.remaining[..n]);
        self.remaining.drain(..n);
        EngineStep { consumed: input.len(), produced: n, status: EngineStatus::Ok }
    }
}

impl Engine for ScriptedEngine {
    fn start_encoder(&self, level: u32) -> Result<Box<dyn Encoder>, EngineStatus> {
        if self.fail_start {
            return Err(EngineStatus::MemError);
        }
        Bzip2Engine::default().start_encoder(level)
    }

    fn start_decoder(&self) -> Result<Box<dyn Decoder>, EngineStatus> {
        if self.fail_start {
            return Err(EngineStatus::MemError);
        }
        Ok(Box::new(ScriptedDecoder {
            remaining: self.plain.clone(),
            fail_with: self.fail_with,
        }))
    }
}
