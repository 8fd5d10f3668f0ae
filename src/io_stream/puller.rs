//! Read side: decode staged compressed bytes into the caller's buffer,
//! refilling the staging buffer from the underlying handle on demand.

use tracing::trace;

use super::StreamStats;
use crate::buffer::StagingBuffer;
use crate::codec::{Decoder, EngineStatus};
use crate::file::{FileError, FileHandle};

/// What one pull produced.  `failure` may coexist with `produced > 0`; the
/// caller decides which one wins.
#[derive(Debug)]
pub(super) struct Pull {
    pub produced: usize,
    /// The decoder reported logical end of stream.
    pub ended:    bool,
    pub failure:  Option<FileError>,
}

/// Decode into `out` until it is full, the stream ends, the engine fails, or
/// the underlying handle has nothing more to give.
///
/// Only the first refill waits up to `timeout`; later refills in the same
/// pull are non-blocking attempts.
pub(super) fn pull(
    decoder: &mut dyn Decoder,
    staging: &mut StagingBuffer,
    inner:   &mut dyn FileHandle,
    out:     &mut [u8],
    timeout: i64,
    stats:   &mut StreamStats,
) -> Pull {
    let mut produced = 0usize;
    let mut timeout  = timeout;

    while produced < out.len() {
        let step = decoder.decode(staging.pending(), &mut out[produced..]);
        staging.consume(step.consumed);
        produced += step.produced;

        match step.status {
            EngineStatus::StreamEnd => {
                return Pull { produced, ended: true, failure: None };
            }
            s if s.is_progress() => {}
            s => {
                return Pull { produced, ended: false, failure: Some(FileError::codec(s)) };
            }
        }

        if staging.is_empty() {
            if produced == out.len() {
                break;
            }
            match refill(staging, inner, timeout, stats) {
                Ok(0)  => break,
                Ok(_)  => {}
                Err(e) => return Pull { produced, ended: false, failure: Some(e) },
            }
            timeout = 0;
        } else if step.consumed == 0 && step.produced == 0 {
            // Engine neither takes input nor gives output: nothing to wait for.
            break;
        }
    }

    Pull { produced, ended: false, failure: None }
}

fn refill(
    staging: &mut StagingBuffer,
    inner:   &mut dyn FileHandle,
    timeout: i64,
    stats:   &mut StreamStats,
) -> Result<usize, FileError> {
    staging.clear();
    let n = inner.read(staging.spare_mut(), timeout)?.len();
    staging.commit(n);
    stats.refills          += 1;
    stats.compressed_bytes += n as u64;
    trace!(bytes = n, timeout, "staging refilled");
    Ok(n)
}
