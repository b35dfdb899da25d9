//! Progress display utilities for CLI output
//!
//! Key features:
//! - A session status spinner driven by session events
//! - Consistent console helpers across commands
//! - A log writer that copies output to a file

use crate::core::error::ScanError;
use crate::core::session::{
    FailureKind, SavedScan, SessionContext, SessionObserver, SessionState, SessionSummary,
    StopReason,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::{Duration, Instant};

// ============================================================================
// Styles - Consistent visual appearance
// ============================================================================

/// Get the spinner style for session status
fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷")
}

// ============================================================================
// Console output helpers
// ============================================================================

/// Print a header section with a box
pub fn print_header(title: &str) {
    let width = 68;
    let title_padded = format!("{:^width$}", title, width = width - 4);
    println!();
    println!("╔{}╗", "═".repeat(width - 2));
    println!("║{}║", title_padded);
    println!("╚{}╝", "═".repeat(width - 2));
    println!();
}

/// Print a success message with checkmark
pub fn print_success(msg: &str) {
    println!("  ✓ {}", msg);
}

/// Print an info message with bullet
pub fn print_info(msg: &str) {
    println!("  • {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("  ⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    println!("  ✗ {}", msg);
}

// ============================================================================
// Session status spinner
// ============================================================================

/// Spinner showing what a running session is doing
pub struct SessionStatus {
    spinner: ProgressBar,
    start_time: Instant,
}

impl SessionStatus {
    /// Create a visible spinner
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message("Starting session...");

        Self {
            spinner,
            start_time: Instant::now(),
        }
    }

    /// Create a status that never draws
    pub fn hidden() -> Self {
        Self {
            spinner: ProgressBar::hidden(),
            start_time: Instant::now(),
        }
    }

    fn describe(ctx: &SessionContext) -> String {
        format!(
            "{} | {} saved, last #{} | {} failures",
            ctx.state, ctx.scans_saved, ctx.last_scan_number, ctx.failures
        )
    }

    /// Print a line above the spinner
    pub fn log(&self, msg: &str) {
        self.spinner.suspend(|| {
            println!("  {}", msg);
        });
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionObserver for SessionStatus {
    fn on_transition(&self, _from: SessionState, _to: SessionState, ctx: &SessionContext) {
        self.spinner.set_message(Self::describe(ctx));
    }

    fn on_scan_saved(&self, scan: &SavedScan, ctx: &SessionContext) {
        let names: Vec<String> = scan
            .files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        self.log(&format!("✓ Scan #{}: {}", scan.number, names.join(", ")));
        self.spinner.set_message(Self::describe(ctx));
    }

    fn on_failure(&self, kind: FailureKind, error: &ScanError, ctx: &SessionContext) {
        match kind {
            FailureKind::Transient => self.log(&format!(
                "⚠ Iteration {} failed ({} so far): {}",
                ctx.iteration, ctx.failures, error
            )),
            FailureKind::DeviceDown => {
                self.log(&format!("⚠ Scanner unreachable, waiting: {}", error))
            }
        }
    }

    fn on_stop(&self, summary: &SessionSummary) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let message = match summary.stop {
            StopReason::ScanLimitReached => format!(
                "✓ {} scans saved in {:.1}s ({} failures)",
                summary.scans_saved, elapsed, summary.failures
            ),
            StopReason::FailureBudgetExhausted => format!(
                "✗ Stopped after {} failures ({} scans saved)",
                summary.failures, summary.scans_saved
            ),
        };
        self.spinner.finish_with_message(message);
    }
}

// ============================================================================
// Log output
// ============================================================================

/// Writer that copies log output to stderr and a file
pub struct DualWriter {
    pub console: std::io::Stderr,
    pub file: std::fs::File,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        // Console output is best effort; the file is authoritative
        let _ = self.console.write(buf);
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}
