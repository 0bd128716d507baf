//! The verification loop: read the media chunk by chunk and hash what reads.
//!
//! A session moves through `Created -> Opened -> Verifying` and ends in one of
//! `Completed`, `Failed` or `Aborted`. Chunks that fail to read are recorded in
//! the error log and skipped, so the final digests only cover bytes that were
//! actually read.

use std::io;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::abort::AbortHandle;
use crate::buffer::StorageBuffer;
use crate::digest::{parse_digest_types, AlgorithmSet, DigestAlgorithm, DigestEngine, DigestSet};
use crate::error::{ErrorCode, Result, VerifyError};
use crate::error_log::{ErrorLog, ErrorRange};
use crate::source::{BlockSource, RawImage};
use crate::status::ProgressReporter;

/// Chunk size used when none, or an unsupported one, is configured.
pub(crate) const DEFAULT_PROCESS_CHUNK_SIZE: usize = 32768;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    Created,
    Opened,
    Verifying,
    Completed,
    Aborted,
    Failed,
}

/// Terminal classification of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// Every byte was read and hashed.
    Completed,
    /// The run finished but at least one range could not be read.
    Failed,
    /// The run stopped early on request.
    Aborted,
}

impl Verdict {
    pub(crate) fn exit_code(self) -> i32 {
        match self {
            Verdict::Completed => 0,
            Verdict::Failed | Verdict::Aborted => 1,
        }
    }

    pub(crate) fn banner(self) -> &'static str {
        match self {
            Verdict::Completed => "SUCCESS",
            Verdict::Failed => "FAILURE",
            Verdict::Aborted => "ABORTED",
        }
    }
}

/// Outcome of a single run.
#[derive(Debug)]
pub(crate) struct VerificationReport {
    pub(crate) verdict: Verdict,
    pub(crate) digests: DigestSet,
    pub(crate) errors: Vec<ErrorRange>,
    pub(crate) media_size: u64,
    pub(crate) bytes_verified: u64,
    pub(crate) elapsed: Duration,
}

pub(crate) struct VerificationSession<S: BlockSource = RawImage> {
    algorithms: AlgorithmSet,
    source: Option<S>,
    buffer: Option<StorageBuffer>,
    last_offset_read: u64,
    process_chunk_size: usize,
    abort: AbortHandle,
    error_log: ErrorLog,
    state: SessionState,
}

impl<S: BlockSource> VerificationSession<S> {
    /// A new session computing MD5 only, polling `abort` between chunks.
    pub(crate) fn new(abort: AbortHandle) -> Self {
        Self {
            algorithms: AlgorithmSet::from([DigestAlgorithm::Md5]),
            source: None,
            buffer: None,
            last_offset_read: 0,
            process_chunk_size: DEFAULT_PROCESS_CHUNK_SIZE,
            abort,
            error_log: ErrorLog::new(),
            state: SessionState::Created,
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn last_offset_read(&self) -> u64 {
        self.last_offset_read
    }

    pub(crate) fn process_chunk_size(&self) -> usize {
        self.process_chunk_size
    }

    pub(crate) fn algorithms(&self) -> &AlgorithmSet {
        &self.algorithms
    }

    pub(crate) fn error_log(&self) -> &ErrorLog {
        &self.error_log
    }

    /// Set the number of bytes requested per read.
    ///
    /// Zero and values above `isize::MAX` are rejected; the session then
    /// keeps the default size and the caller decides how to report it.
    pub(crate) fn set_process_chunk_size(&mut self, size: u64) -> Result<()> {
        match usize::try_from(size) {
            Ok(size) if size > 0 && size <= isize::MAX as usize => {
                self.process_chunk_size = size;
                Ok(())
            }
            _ => {
                self.process_chunk_size = DEFAULT_PROCESS_CHUNK_SIZE;
                Err(VerifyError::unsupported(format!(
                    "unsupported process buffer size: {size}"
                )))
            }
        }
    }

    /// Enable additional digests from a comma-separated list (`sha1`, `sha256`).
    ///
    /// On error the previous selection is kept.
    pub(crate) fn set_enabled_algorithms(&mut self, tokens: &str) -> Result<()> {
        self.expect_state(&[SessionState::Created, SessionState::Opened], "configure")?;
        self.algorithms = parse_digest_types(tokens)?;
        Ok(())
    }

    /// Handle that stops the loop at the next chunk boundary when signalled.
    pub(crate) fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Open the media at `path` and bind it as this session's source.
    pub(crate) fn open(&mut self, path: &Path) -> Result<()> {
        self.expect_state(&[SessionState::Created], "open")?;
        let source = S::open(path).map_err(|err| {
            VerifyError::io(
                ErrorCode::OpenFailed,
                format!("unable to open source: {}", path.display()),
                err,
            )
        })?;
        self.bind(source)
    }

    /// Bind an already opened source.
    pub(crate) fn bind(&mut self, source: S) -> Result<()> {
        self.expect_state(&[SessionState::Created], "open")?;
        debug!(size = source.size(), "bound block source");
        self.source = Some(source);
        self.state = SessionState::Opened;
        Ok(())
    }

    /// Read the whole media, hashing every chunk that reads successfully.
    ///
    /// Read failures do not end the run; they are recorded and the run ends in
    /// `Verdict::Failed`. Setup, memory and digest failures are returned as
    /// errors and leave the session in `SessionState::Failed`.
    pub(crate) fn run(&mut self, report_progress: bool) -> Result<VerificationReport> {
        self.expect_state(&[SessionState::Opened], "verify")?;
        self.state = SessionState::Verifying;
        match self.verify(report_progress) {
            Ok(report) => {
                self.state = match report.verdict {
                    Verdict::Completed => SessionState::Completed,
                    Verdict::Failed => SessionState::Failed,
                    Verdict::Aborted => SessionState::Aborted,
                };
                Ok(report)
            }
            Err(err) => {
                self.state = SessionState::Failed;
                Err(err)
            }
        }
    }

    fn verify(&mut self, report_progress: bool) -> Result<VerificationReport> {
        let started = Instant::now();
        let mut engine = DigestEngine::initialize(&self.algorithms)?;
        let source = self.source.as_mut().ok_or_else(|| {
            VerifyError::runtime(ErrorCode::InvalidState, "missing block source")
        })?;
        let media_size = source.size();
        info!(
            media_size,
            chunk_size = self.process_chunk_size,
            algorithms = ?engine.algorithms().collect::<Vec<_>>(),
            "verification started"
        );

        let mut progress = ProgressReporter::new(media_size, report_progress);
        let mut bytes_verified = 0u64;
        let mut aborted = false;

        if media_size > 0 {
            if self.buffer.is_none() {
                let initial = chunk_len(self.process_chunk_size, media_size);
                self.buffer = Some(StorageBuffer::initialize(initial)?);
            }
            let buffer = self.buffer.as_mut().ok_or_else(|| {
                VerifyError::runtime(ErrorCode::InvalidState, "missing read buffer")
            })?;

            while self.last_offset_read < media_size {
                if self.abort.is_signalled() {
                    aborted = true;
                    break;
                }
                let remaining = media_size - self.last_offset_read;
                let chunk = chunk_len(self.process_chunk_size, remaining);
                let capacity = buffer.capacity();
                buffer.resize(chunk)?;
                if buffer.capacity() != capacity {
                    debug!(capacity = buffer.capacity(), "read buffer grown");
                }

                match read_chunk(source, buffer, chunk) {
                    Ok(read) => {
                        let (data, valid) = buffer.get_data();
                        engine.update(data)?;
                        debug!(offset = self.last_offset_read, read, "chunk verified");
                        self.last_offset_read += valid as u64;
                        bytes_verified += valid as u64;
                    }
                    Err(err) => {
                        warn!(
                            offset = self.last_offset_read,
                            size = chunk,
                            error = %err,
                            "unable to read chunk, skipping"
                        );
                        self.error_log.record(self.last_offset_read, chunk as u64);
                        self.last_offset_read += chunk as u64;
                        if self.last_offset_read < media_size {
                            source.seek(self.last_offset_read).map_err(|err| {
                                VerifyError::io(
                                    ErrorCode::SeekFailed,
                                    format!(
                                        "unable to seek source to offset {}",
                                        self.last_offset_read
                                    ),
                                    err,
                                )
                            })?;
                        }
                    }
                }
                progress.update(self.last_offset_read);
            }
        }
        progress.finish();

        let digests = engine.finalize()?;
        let verdict = if aborted {
            Verdict::Aborted
        } else if self.error_log.is_empty() {
            Verdict::Completed
        } else {
            Verdict::Failed
        };
        info!(
            ?verdict,
            bytes_verified,
            read_errors = self.error_log.ranges().len(),
            "verification finished"
        );

        Ok(VerificationReport {
            verdict,
            digests,
            errors: self.error_log.ranges().to_vec(),
            media_size,
            bytes_verified,
            elapsed: started.elapsed(),
        })
    }

    /// Release the source and the read buffer. Safe to call more than once.
    pub(crate) fn close(&mut self) -> Result<()> {
        if let Some(buffer) = self.buffer.take() {
            buffer.free();
        }
        if let Some(mut source) = self.source.take() {
            source.close().map_err(|err| {
                VerifyError::io(ErrorCode::CloseFailed, "unable to close source", err)
            })?;
        }
        Ok(())
    }

    fn expect_state(&self, allowed: &[SessionState], action: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(VerifyError::runtime(
            ErrorCode::InvalidState,
            format!("unable to {action} session in state {:?}", self.state),
        ))
    }
}

fn chunk_len(chunk_size: usize, remaining: u64) -> usize {
    usize::try_from(remaining).map_or(chunk_size, |remaining| remaining.min(chunk_size))
}

/// Read one chunk into `buffer`. A zero-byte read before the end of the media
/// counts as a failure so the loop always makes progress.
fn read_chunk<S: BlockSource>(
    source: &mut S,
    buffer: &mut StorageBuffer,
    chunk: usize,
) -> io::Result<usize> {
    buffer.set_valid_size(0);
    let read = source.read(buffer.as_mut_slice(chunk))?;
    if read == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "source ended before the reported media size",
        ));
    }
    let read = read.min(chunk);
    buffer.set_valid_size(read);
    Ok(read)
}
