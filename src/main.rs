//! mediaverify entrypoint: verify a raw media image and report its digests.

mod abort;
mod buffer;
mod bytesize;
mod digest;
mod error;
mod error_log;
mod session;
mod source;
mod status;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::abort::AbortHandle;
use crate::bytesize::parse_byte_size;
use crate::error::VerifyError;
use crate::session::{
    Verdict, VerificationReport, VerificationSession, DEFAULT_PROCESS_CHUNK_SIZE,
};
use crate::source::RawImage;
use crate::status::write_summary;

const PROGRAM: &str = "mediaverify";
/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "MEDIAVERIFY_LOG";

/// CLI arguments for the verifier.
#[derive(Parser, Debug)]
#[command(
    name = "mediaverify",
    version,
    about = "Verify the data stored in a raw optical disc image"
)]
struct Args {
    /// Path to the media image to verify
    source: PathBuf,

    /// Additional digest types besides md5 (comma separated: sha1, sha256)
    #[arg(short = 'd', value_name = "DIGEST_TYPES")]
    digest_types: Option<String>,

    /// Write read errors and the final digests to this file
    #[arg(short = 'l', value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Bytes requested per read (default 32768; k/m/g suffixes accepted)
    #[arg(short = 'p', value_name = "SIZE")]
    process_buffer_size: Option<String>,

    /// Do not report progress
    #[arg(short = 'q')]
    quiet: bool,

    /// Verbose diagnostics on stderr
    #[arg(short = 'v')]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };
    init_logging(args.verbose);

    match run(args) {
        Ok(verdict) => {
            print_banner(verdict.banner());
            if verdict.exit_code() == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            print_error_chain(&err);
            print_banner(Verdict::Failed.banner());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Configure, open and verify the source, then report the outcome.
fn run(args: Args) -> Result<Verdict> {
    let mut session: VerificationSession<RawImage> = VerificationSession::new(AbortHandle::new());

    if let Some(value) = &args.process_buffer_size {
        let accepted = match parse_byte_size(value) {
            Some(size) => session.set_process_chunk_size(size).is_ok(),
            None => false,
        };
        if !accepted {
            warn!(value = %value, "unsupported process buffer size");
            eprintln!(
                "Unsupported process buffer size defaulting to: {DEFAULT_PROCESS_CHUNK_SIZE}."
            );
        }
    }
    if let Some(types) = &args.digest_types {
        session
            .set_enabled_algorithms(types)
            .context("unable to set additional digest types")?;
    }

    session
        .open(&args.source)
        .with_context(|| format!("unable to open file: {}", args.source.display()))?;

    let log_file = match &args.log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("unable to open log file: {}", path.display()))?;
            Some(BufWriter::new(file))
        }
        None => None,
    };

    if let Err(err) = abort::attach(&session.abort_handle()) {
        warn!(error = %err, "unable to attach signal handler");
    }
    let outcome = session.run(!args.quiet);
    if let Err(err) = abort::detach() {
        warn!(error = %err, "unable to detach signal handler");
    }

    let report = match outcome {
        Ok(report) => report,
        Err(err) => {
            let _ = session.close();
            return Err(anyhow::Error::new(err).context("unable to verify input"));
        }
    };
    debug!(
        state = ?session.state(),
        algorithms = ?session.algorithms(),
        chunk_size = session.process_chunk_size(),
        media_size = report.media_size,
        last_offset_read = session.last_offset_read(),
        "verification session finished"
    );

    // Output failures are reported but never change the verdict.
    if let Some(mut out) = log_file {
        if let Err(err) = session.error_log().flush(&mut out, &report.digests) {
            print_error_chain(&anyhow::Error::new(err).context("unable to write log file"));
        }
    }

    if let Err(err) = print_summary(&mut io::stdout().lock(), &report) {
        print_error_chain(&anyhow::Error::new(err).context("unable to write status summary"));
    }

    session.close().context("unable to close verification session")?;
    Ok(report.verdict)
}

fn print_summary(out: &mut impl Write, report: &VerificationReport) -> io::Result<()> {
    writeln!(out)?;
    write_summary(
        out,
        report.bytes_verified,
        report.elapsed,
        &report.errors,
        &report.digests,
    )?;
    writeln!(out)?;
    out.flush()
}

/// Print the final `mediaverify: <RESULT>` line; a failing stdout is reported on stderr.
fn print_banner(banner: &str) {
    let mut stdout = io::stdout().lock();
    if let Err(err) = writeln!(stdout, "{PROGRAM}: {banner}").and_then(|()| stdout.flush()) {
        eprintln!("{PROGRAM}: {banner} (unable to write to stdout: {err})");
    }
}

/// Print an error and each of its causes, one per line.
fn print_error_chain(err: &anyhow::Error) {
    for (depth, cause) in err.chain().enumerate() {
        let tag = cause
            .downcast_ref::<VerifyError>()
            .map(|err| format!("[{}:{}] ", err.domain(), err.code()))
            .unwrap_or_default();
        if depth == 0 {
            eprintln!("{tag}{cause}");
        } else {
            eprintln!("  caused by: {tag}{cause}");
        }
    }
}
