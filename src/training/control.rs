//! Cooperative cancellation and time budgets

use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared flag a caller flips to stop a running prediction or training
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Limits checked once per epoch and once per time step
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancel: Option<CancelFlag>,
    deadline: Option<Instant>,
    show_progress: bool,
}

impl RunControl {
    /// No cancellation, no deadline, no progress bar
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Deadline relative to now
    ///
    /// A budget too large to represent as an `Instant` means no deadline.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.deadline = Instant::now().checked_add(budget);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// `Cancelled` or `Timeout` once a limit is hit
    pub fn check(&self) -> Result<()> {
        if let Some(flag) = &self.cancel {
            if flag.is_cancelled() {
                return Err(Error::Cancelled);
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }
        }
        Ok(())
    }

    pub(crate) fn progress_bar(&self, epochs: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(epochs as u64);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) Loss: {msg}",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
