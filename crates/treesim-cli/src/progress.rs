//! Progress reporting for batch comparisons.
//!
//! On a terminal, a single status line on stderr is rewritten as pairs
//! finish. When stderr is redirected the same events go to `tracing` at
//! debug level so logs and reports stay clean.

use std::io::{self, IsTerminal, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;
use treesim_core::batch::{BatchSummary, ProgressObserver};

/// Redraw at most this many times over a run.
const REDRAW_STEPS: usize = 100;

pub struct StderrProgress {
    interactive: bool,
    step: AtomicUsize,
    out: Mutex<Box<dyn Write + Send>>,
}

impl StderrProgress {
    /// Progress bar on stderr, drawn only if stderr is a terminal.
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stderr()), io::stderr().is_terminal())
    }

    pub fn with_writer(out: Box<dyn Write + Send>, interactive: bool) -> Self {
        Self {
            interactive,
            step: AtomicUsize::new(1),
            out: Mutex::new(out),
        }
    }

    fn draw(&self, line: &str) {
        if let Ok(mut out) = self.out.lock() {
            let _ = write!(out, "\r{line}");
            let _ = out.flush();
        }
    }
}

impl ProgressObserver for StderrProgress {
    fn on_start(&self, total: usize) {
        self.step.store(total.div_ceil(REDRAW_STEPS).max(1), Ordering::Relaxed);
        if self.interactive {
            self.draw(&format!("Comparing files: 0/{total}"));
        } else {
            debug!(total, "comparison started");
        }
    }

    fn on_pair_done(&self, completed: usize, total: usize) {
        let step = self.step.load(Ordering::Relaxed);
        if completed != total && completed % step != 0 {
            return;
        }
        if self.interactive {
            self.draw(&format!("Comparing files: {completed}/{total}"));
        } else {
            debug!(completed, total, "comparison progress");
        }
    }

    fn on_finish(&self, summary: &BatchSummary) {
        if self.interactive {
            // Workers report out of order, so the last redraw may be stale.
            self.draw(&format!(
                "Comparing files: {}/{}",
                summary.completed, summary.total
            ));
            if let Ok(mut out) = self.out.lock() {
                let _ = writeln!(out);
            }
        }
        debug!(
            completed = summary.completed,
            failed = summary.failed,
            "comparison finished"
        );
    }
}
