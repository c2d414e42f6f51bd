//! Progress display module
//!
//! Prints batch status and the final per-outcome summary.

use crate::service::{BatchSummary, Outcome};
use std::io::{self, Write};
use std::time::{Duration, Instant};

const OUTCOMES: [Outcome; 4] = [
    Outcome::Ok,
    Outcome::TriedFailed,
    Outcome::ExplicitlySkipped,
    Outcome::DidntTry,
];

/// Format duration to human readable string
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Summary display for CLI
pub struct SummaryDisplay {
    /// Start time of the batch
    start_time: Instant,
    /// Quiet mode (errors only)
    quiet: bool,
}

impl SummaryDisplay {
    pub fn new(quiet: bool) -> Self {
        Self {
            start_time: Instant::now(),
            quiet,
        }
    }

    /// Write the summary table to `out`
    pub fn write_summary<W: Write>(&self, out: &mut W, summary: &BatchSummary) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "Batch Summary:")?;
        writeln!(out, "  Releases: {}", summary.total())?;
        for outcome in OUTCOMES {
            writeln!(out, "  {}: {}", outcome, summary.count(outcome))?;
        }
        for outcome in OUTCOMES.into_iter().filter(|o| *o != Outcome::Ok) {
            for release in summary.releases(outcome) {
                writeln!(out, "    [{}] {}", outcome, release)?;
            }
        }
        writeln!(out, "  Elapsed Time: {}", format_duration(self.start_time.elapsed()))?;
        Ok(())
    }

    /// Print the final summary
    pub fn print_summary(&self, summary: &BatchSummary) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.write_summary(&mut out, summary)?;
        out.flush()
    }

    /// Print a status message
    pub fn print_status(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        println!("{}", message);
        Ok(())
    }

    /// Print an error message, even in quiet mode
    pub fn print_error(&self, message: &str) -> io::Result<()> {
        eprintln!("Error: {}", message);
        Ok(())
    }

    /// Get the elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}
