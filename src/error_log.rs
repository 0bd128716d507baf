//! Read-error bookkeeping and log file serialization.

use std::io::Write;

use crate::digest::DigestSet;
use crate::error::{Result, VerifyError};

/// A span of media bytes that could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ErrorRange {
    pub(crate) start_offset: u64,
    pub(crate) length: u64,
}

/// Append-only record of read failures, in detection order.
#[derive(Debug, Default)]
pub(crate) struct ErrorLog {
    ranges: Vec<ErrorRange>,
}

impl ErrorLog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a range. Adjacent ranges are kept separate.
    pub(crate) fn record(&mut self, start_offset: u64, length: u64) {
        self.ranges.push(ErrorRange {
            start_offset,
            length,
        });
    }

    pub(crate) fn ranges(&self) -> &[ErrorRange] {
        &self.ranges
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Write `offset,length` lines followed by `algorithm:hexdigest` lines.
    pub(crate) fn flush(&self, out: &mut impl Write, digests: &DigestSet) -> Result<()> {
        let output_error = |source| VerifyError::Output {
            message: "unable to write verification log".to_string(),
            source,
        };
        for range in &self.ranges {
            writeln!(out, "{},{}", range.start_offset, range.length).map_err(output_error)?;
        }
        for (algorithm, hex) in digests.iter() {
            writeln!(out, "{}:{}", algorithm.name(), hex).map_err(output_error)?;
        }
        out.flush().map_err(output_error)
    }
}
