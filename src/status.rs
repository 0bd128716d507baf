//! Progress notifications and the end-of-run status summary.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, IsTerminal, Write};
use std::time::{Duration, Instant};
use tracing::info;

use crate::digest::DigestSet;
use crate::error_log::ErrorRange;

/// Minimum time between two progress updates.
const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

/// Throttled percentage-complete reporting for one run.
pub(crate) struct ProgressReporter {
    bar: Option<ProgressBar>,
    total: u64,
    last_update: Option<Instant>,
    last_logged_decile: u64,
}

impl ProgressReporter {
    /// A reporter that draws on stderr when it is a terminal.
    pub(crate) fn new(total: u64, enabled: bool) -> Self {
        let bar = enabled.then(|| {
            let bar = ProgressBar::new(total);
            if !io::stderr().is_terminal() {
                bar.set_draw_target(ProgressDrawTarget::hidden());
            }
            if let Ok(style) = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {bytes}/{total_bytes} ({eta})")
            {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar
        });
        Self {
            bar,
            total,
            last_update: None,
            last_logged_decile: 0,
        }
    }

    /// Report that `processed` bytes of the media have been handled.
    ///
    /// Updates are dropped when the previous one is less than the throttling
    /// interval old. Returns whether a notification was emitted.
    pub(crate) fn update(&mut self, processed: u64) -> bool {
        self.update_at(processed, Instant::now())
    }

    fn update_at(&mut self, processed: u64, now: Instant) -> bool {
        let Some(bar) = &self.bar else {
            return false;
        };
        if let Some(last) = self.last_update {
            if now.duration_since(last) < PROGRESS_UPDATE_INTERVAL {
                return false;
            }
        }
        self.last_update = Some(now);
        bar.set_position(processed);

        let percent = percentage(processed, self.total);
        let decile = percent / 10;
        if decile > self.last_logged_decile {
            self.last_logged_decile = decile;
            info!(percent, processed, total = self.total, "verification progress");
        }
        true
    }

    pub(crate) fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Whole percentage of `processed` against `total`, capped at 100.
pub(crate) fn percentage(processed: u64, total: u64) -> u64 {
    if total == 0 {
        return 100;
    }
    let percent = (u128::from(processed) * 100) / u128::from(total);
    percent.min(100) as u64
}

/// Print throughput, read errors and digests in the human-readable layout.
pub(crate) fn write_summary(
    out: &mut impl Write,
    bytes_verified: u64,
    elapsed: Duration,
    errors: &[ErrorRange],
    digests: &DigestSet,
) -> io::Result<()> {
    let seconds = elapsed.as_secs_f64();
    let rate = if seconds > 0.0 {
        (bytes_verified as f64 / seconds) as u64
    } else {
        bytes_verified
    };
    writeln!(
        out,
        "Read: {bytes_verified} bytes in {seconds:.3} seconds, with {rate} bytes/second."
    )?;
    writeln!(out)?;

    if errors.is_empty() {
        writeln!(out, "No read errors.")?;
    } else {
        writeln!(out, "Read errors: total number: {}", errors.len())?;
        for range in errors {
            writeln!(
                out,
                "\tat offset {} (0x{:08x}) of size {}",
                range.start_offset, range.start_offset, range.length
            )?;
        }
    }
    writeln!(out)?;

    for (algorithm, hex) in digests.iter() {
        writeln!(out, "{} hash calculated over data:\t{}", algorithm.label(), hex)?;
    }
    Ok(())
}
