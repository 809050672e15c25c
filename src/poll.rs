use std::{future::Future, io::Write};
use tracing::{info, warn};

use crate::device::{Cycle, Device};
use crate::proto::{ProtoError, Result};
use crate::report::Reporter;

/// Why a polling session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// The requested number of cycles ran.
    Limit,
    /// The shutdown future completed.
    Shutdown,
    /// The line source ended (port gone or end of a capture file).
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub cycles: usize,
    pub readings: usize,
    pub undecodable: usize,
    pub stop: Stop,
}

/// Poll `device` and report every reading until `limit` cycles ran,
/// `shutdown` completes or the line source ends.
///
/// Lines that are not text are logged and skipped. Only I/O errors of
/// the line source or the report output end the session with an error.
pub async fn run<W, F>(
    device: &mut Device,
    reporter: &mut Reporter<W>,
    limit: Option<usize>,
    shutdown: F,
) -> Result<Summary>
where
    W: Write,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let mut cycles = 0;
    let mut readings = 0;
    let mut undecodable = 0;

    let stop = loop {
        if limit.is_some_and(|n| cycles >= n) {
            break Stop::Limit;
        }

        let cycle = tokio::select! {
            biased;
            _ = &mut shutdown => break Stop::Shutdown,
            cycle = device.poll() => cycle,
        };

        let cycle = match cycle {
            Ok(cycle) => cycle,
            Err(ProtoError::Abort) => break Stop::Closed,
            Err(err) => return Err(err),
        };
        cycles += 1;

        match cycle {
            Cycle::Reading(parsed) => {
                reporter.report(&parsed.reading)?;
                readings += 1;
            }
            Cycle::Undecodable(err) => {
                warn!(cycle = cycles, truncated = err.is_truncated(), "Dropping sensor line: {}", err);
                undecodable += 1;
            }
        }
    };

    let summary = Summary {
        cycles,
        readings,
        undecodable,
        stop,
    };
    info!(?summary, "Polling stopped");
    Ok(summary)
}
