//! Write side: encode caller bytes into the staging buffer and drain it to
//! the underlying handle, tolerating partial writes.

use std::io;

use tracing::{trace, warn};

use super::StreamStats;
use crate::buffer::StagingBuffer;
use crate::codec::{driver_error, EncodeAction, Encoder, EngineStatus};
use crate::file::{FileError, FileHandle};

/// What one push consumed.  `failure` may coexist with `consumed > 0`.
#[derive(Debug)]
pub(super) struct Push {
    pub consumed: usize,
    pub failure:  Option<FileError>,
}

/// Feed `input` to the encoder in accumulate mode, draining whenever the
/// staging buffer fills.  A drain that makes no progress ends the push early.
pub(super) fn push(
    encoder: &mut dyn Encoder,
    staging: &mut StagingBuffer,
    inner:   &mut dyn FileHandle,
    input:   &[u8],
    timeout: i64,
    stats:   &mut StreamStats,
) -> Push {
    let mut consumed = 0usize;
    let mut timeout  = timeout;

    while consumed < input.len() {
        if staging.is_full() {
            match drain(staging, inner, timeout, stats) {
                Ok(0)  => break,
                Ok(_)  => {}
                Err(e) => return Push { consumed, failure: Some(e) },
            }
            timeout = 0;
        }

        let step = encoder.encode(&input[consumed..], staging.spare_mut(), EncodeAction::Run);
        staging.commit(step.produced);
        consumed += step.consumed;
        if step.status != EngineStatus::RunOk {
            return Push { consumed, failure: Some(FileError::codec(step.status)) };
        }
    }

    Push { consumed, failure: None }
}

/// Write staged bytes to `inner` until the buffer empties, the handle stops
/// accepting bytes, or it fails.  Retries after the first write never block.
/// Returns the number of bytes written.
pub(super) fn drain(
    staging: &mut StagingBuffer,
    inner:   &mut dyn FileHandle,
    timeout: i64,
    stats:   &mut StreamStats,
) -> Result<usize, FileError> {
    let mut written = 0usize;
    let mut timeout = timeout;
    stats.drains += 1;

    while !staging.is_empty() {
        let n = match inner.write(staging.pending(), timeout) {
            Ok(n)  => n,
            Err(e) => {
                staging.compact();
                return Err(e);
            }
        };
        if n == 0 {
            break;
        }
        staging.consume(n);
        written                += n;
        stats.compressed_bytes += n as u64;
        timeout = 0;
    }

    staging.compact();
    trace!(bytes = written, pending = staging.len(), "staging drained");
    Ok(written)
}

/// Close-time finalisation: run the encoder in finish mode and drain until
/// the trailer is out.  Only the first drain waits up to `timeout`.  A stalled
/// drain leaves the stream unfinished and fails the close: with the encoder's
/// in-progress status when it had more to emit, otherwise with `WriteZero`.
pub(super) fn finish(
    encoder: &mut dyn Encoder,
    staging: &mut StagingBuffer,
    inner:   &mut dyn FileHandle,
    timeout: i64,
    stats:   &mut StreamStats,
) -> Result<(), FileError> {
    let mut status  = EngineStatus::FinishOk;
    let mut timeout = timeout;

    loop {
        if matches!(status, EngineStatus::FinishOk | EngineStatus::FlushOk) && !staging.is_full() {
            let step = encoder.encode(&[], staging.spare_mut(), EncodeAction::Finish);
            staging.commit(step.produced);
            status = step.status;
        }
        if staging.is_empty() {
            break;
        }
        let written = drain(staging, inner, timeout, stats)?;
        timeout = 0;
        if written == 0 {
            warn!(pending = staging.len(), "finalisation stalled; stream trailer incomplete");
            break;
        }
    }

    if !staging.is_empty() {
        return Err(match driver_error(status) {
            Some(_) => FileError::codec(status),
            None    => FileError::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                "compressed stream not fully written",
            )),
        });
    }
    match driver_error(status) {
        None    => Ok(()),
        Some(_) => Err(FileError::codec(status)),
    }
}
