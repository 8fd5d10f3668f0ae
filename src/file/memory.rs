//! In-memory underlying handle.
//!
//! The byte store is shared (`Arc<Mutex<Vec<u8>>>`) so it outlives the handle
//! that wrote it: write through one `MemoryFile`, close it, and open a reader
//! on the same store.  An optional per-call chunk limit makes every read and
//! write transfer at most that many bytes, which is how partial progress
//! from slow storage is reproduced.

use std::io::SeekFrom;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{ConfigOption, ConfigValue, FileError, FileHandle, LockKind, Transfer};

pub type SharedBytes = Arc<Mutex<Vec<u8>>>;

#[derive(Debug)]
pub struct MemoryFile {
    store:     SharedBytes,
    pos:       usize,
    chunk:     Option<usize>,
    timeout:   i64,
    name:      String,
    locks:     Vec<(u64, u64, LockKind)>,
}

impl MemoryFile {
    pub fn new() -> Self {
        Self::with_store(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::with_store(Arc::new(Mutex::new(bytes)))
    }

    pub fn with_store(store: SharedBytes) -> Self {
        Self {
            store,
            pos:     0,
            chunk:   None,
            timeout: -1,
            name:    "mem".to_string(),
            locks:   Vec::new(),
        }
    }

    /// Cap every read/write call at `limit` bytes.
    pub fn with_chunk_limit(mut self, limit: usize) -> Self {
        self.chunk = Some(limit.max(1));
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Handle on the backing store.
    pub fn store(&self) -> SharedBytes {
        self.store.clone()
    }

    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    fn bytes(&self) -> MutexGuard<'_, Vec<u8>> {
        self.store.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn cap(&self, n: usize) -> usize {
        self.chunk.map_or(n, |c| n.min(c))
    }

    fn overlaps(&self, start: u64, len: u64) -> bool {
        self.locks.iter().any(|&(s, l, _)| start < s + l && s < start + len)
    }
}

impl Default for MemoryFile {
    fn default() -> Self {
        Self::new()
    }
}

impl FileHandle for MemoryFile {
    fn read(&mut self, buf: &mut [u8], _timeout: i64) -> Result<Transfer, FileError> {
        let pos  = self.pos;
        let want = self.cap(buf.len());
        let n = {
            let data = self.bytes();
            if pos >= data.len() && !buf.is_empty() {
                return Ok(Transfer::EndOfStream);
            }
            let n = want.min(data.len().saturating_sub(pos));
            buf[..n].copy_from_slice(&data[pos..pos + n]);
            n
        };
        self.pos += n;
        Ok(Transfer::Bytes(n))
    }

    fn write(&mut self, buf: &[u8], _timeout: i64) -> Result<usize, FileError> {
        let pos = self.pos;
        let n   = self.cap(buf.len());
        {
            let mut data = self.bytes();
            if data.len() < pos + n {
                data.resize(pos + n, 0);
            }
            data[pos..pos + n].copy_from_slice(&buf[..n]);
        }
        self.pos += n;
        Ok(n)
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<Transfer, FileError> {
        self.pos = offset as usize;
        self.read(buf, self.timeout)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize, FileError> {
        self.pos = offset as usize;
        self.write(buf, self.timeout)
    }

    fn truncate_at(&mut self, offset: u64) -> Result<(), FileError> {
        self.bytes().resize(offset as usize, 0);
        Ok(())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, FileError> {
        let len = self.bytes().len() as i64;
        let target = match pos {
            SeekFrom::Start(n)   => n as i64,
            SeekFrom::Current(d) => self.pos as i64 + d,
            SeekFrom::End(d)     => len + d,
        };
        if target < 0 {
            return Err(FileError::Seek { position: self.pos as u64 });
        }
        self.pos = target as usize;
        Ok(self.pos as u64)
    }

    fn size(&mut self) -> Result<u64, FileError> {
        Ok(self.bytes().len() as u64)
    }

    fn eof(&mut self) -> bool {
        self.pos >= self.bytes().len()
    }

    fn flush(&mut self, _dirty: bool) -> Result<(), FileError> {
        Ok(())
    }

    fn commit(&mut self) -> Result<(), FileError> {
        Ok(())
    }

    fn lock(&mut self, start: u64, len: u64, kind: LockKind) -> Result<bool, FileError> {
        match kind {
            LockKind::Unlock => {
                let before = self.locks.len();
                self.locks.retain(|&(s, l, _)| !(s == start && l == len));
                Ok(self.locks.len() != before)
            }
            _ if self.overlaps(start, len) => Ok(false),
            _ => {
                self.locks.push((start, len, kind));
                Ok(true)
            }
        }
    }

    // Locks held through this handle are never "someone else's".
    fn lock_test(&mut self, _start: u64, _len: u64, _kind: LockKind) -> Result<bool, FileError> {
        Ok(false)
    }

    fn configure(&mut self, option: ConfigOption) -> Result<ConfigValue, FileError> {
        match option {
            ConfigOption::Timeout(new) => {
                let old = self.timeout;
                if let Some(t) = new {
                    self.timeout = t;
                }
                Ok(ConfigValue::Int(old))
            }
            ConfigOption::IoName => Ok(ConfigValue::Text(self.name.clone())),
            ConfigOption::ReadHandle | ConfigOption::WriteHandle => Ok(ConfigValue::Int(-1)),
            _ => Err(FileError::Unsupported),
        }
    }

    fn handle(&self) -> Option<i64> {
        None
    }

    fn close(self: Box<Self>) -> Result<(), FileError> {
        Ok(())
    }
}
