//! Stage progress reporting
//!
//! Every pipeline stage reports `(message, percentage)` pairs. `Progress`
//! wraps an optional caller callback, keeps the percentage monotonic and
//! mirrors each update to `tracing`.

use tracing::info;

/// Callback signature accepted by [`Progress::new`]
pub type ProgressFn<'a> = dyn FnMut(&str, u8) + 'a;

/// Monotonic progress reporter
pub struct Progress<'a> {
    callback: Option<Box<ProgressFn<'a>>>,
    last: u8,
}

impl<'a> Progress<'a> {
    /// Report through `callback`
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(&str, u8) + 'a,
    {
        Self {
            callback: Some(Box::new(callback)),
            last: 0,
        }
    }

    /// Reporter that only logs
    pub fn silent() -> Self {
        Self {
            callback: None,
            last: 0,
        }
    }

    /// Report a milestone. Percentages above 100 are capped and regressions
    /// are raised to the last reported value.
    pub fn report(&mut self, message: &str, percentage: u8) {
        let pct = percentage.min(100).max(self.last);
        self.last = pct;
        info!("[{:>3}%] {}", pct, message);
        if let Some(cb) = self.callback.as_mut() {
            cb(message, pct);
        }
    }

    /// Report step `step` of `total` mapped linearly onto `[start, end]`
    pub fn report_step(&mut self, message: &str, start: u8, end: u8, step: usize, total: usize) {
        let span = end.saturating_sub(start) as usize;
        let offset = if total == 0 { span } else { span * step.min(total) / total };
        self.report(message, start.saturating_add(offset as u8));
    }

    /// Last reported percentage
    pub fn last(&self) -> u8 {
        self.last
    }
}

impl Default for Progress<'_> {
    fn default() -> Self {
        Self::silent()
    }
}

impl std::fmt::Debug for Progress<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("has_callback", &self.callback.is_some())
            .field("last", &self.last)
            .finish()
    }
}
