//! Coarse status channel between long-running operations and whatever
//! displays them, plus the "Downloading (x%, t remaining)" line.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;
use std::time::Instant;

/// Receiver of status text and overall progress.
pub trait StatusSink: Send + Sync {
    /// A message that must be shown.
    fn status(&self, message: &str);

    /// A message that may be dropped if updates arrive too quickly.
    fn status_lazy(&self, message: &str) {
        self.status(message);
    }

    /// Overall progress in `0.0..=1.0`.
    fn progress_bar(&self, ratio: f64);
}

/// Sink that writes every update to the `log` facade.
#[derive(Debug, Clone, Default)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn status(&self, message: &str) {
        log::info!("{}", message);
    }

    fn status_lazy(&self, message: &str) {
        log::debug!("{}", message);
    }

    fn progress_bar(&self, ratio: f64) {
        log::trace!("progress {:.2}", ratio);
    }
}

/// Drops `status_lazy` messages arriving closer together than `interval`.
pub struct ThrottledStatus<S> {
    inner: S,
    interval: std::time::Duration,
    last: Mutex<Option<Instant>>,
}

impl<S: StatusSink> ThrottledStatus<S> {
    pub const DEFAULT_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);

    pub fn new(inner: S) -> Self {
        Self::with_interval(inner, Self::DEFAULT_INTERVAL)
    }

    pub fn with_interval(inner: S, interval: std::time::Duration) -> Self {
        Self {
            inner,
            interval,
            last: Mutex::new(None),
        }
    }

    fn mark(&self) {
        if let Ok(mut last) = self.last.lock() {
            *last = Some(Instant::now());
        }
    }
}

impl<S: StatusSink> StatusSink for ThrottledStatus<S> {
    fn status(&self, message: &str) {
        self.mark();
        self.inner.status(message);
    }

    fn status_lazy(&self, message: &str) {
        {
            let Ok(mut last) = self.last.lock() else {
                return;
            };
            let now = Instant::now();
            if matches!(*last, Some(t) if now.duration_since(t) < self.interval) {
                return;
            }
            *last = Some(now);
        }
        self.inner.status_lazy(message);
    }

    fn progress_bar(&self, ratio: f64) {
        self.inner.progress_bar(ratio);
    }
}

// ─── Status line ─────────────────────────────────────────────────────

/// Estimated time left, given time spent so far and the completed ratio.
///
/// Formats as `mm:ss`, `h:mm:ss` or `d:hh:mm:ss`; `--:--` while the
/// ratio is still zero.
pub fn remaining_display(elapsed: Duration, ratio: f64) -> String {
    if ratio.is_nan() || ratio <= 0.0 {
        return "--:--".to_string();
    }
    let ratio = ratio.min(1.0);
    let elapsed_secs = elapsed.num_milliseconds().max(0) as f64 / 1000.0;
    let remaining = (elapsed_secs / ratio - elapsed_secs).max(0.0).round() as i64;

    let days = remaining / 86_400;
    let hours = (remaining % 86_400) / 3_600;
    let minutes = (remaining % 3_600) / 60;
    let seconds = remaining % 60;
    if days > 0 {
        format!("{}:{:02}:{:02}:{:02}", days, hours, minutes, seconds)
    } else if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// `Downloading (45.00%, 01:23 remaining) name...`
pub fn download_status(name: &str, ratio: f64, started: DateTime<Utc>) -> String {
    download_status_at(name, ratio, started, Utc::now())
}

pub fn download_status_at(name: &str, ratio: f64, started: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format!(
        "Downloading ({:.2}%, {} remaining) {}...",
        ratio.clamp(0.0, 1.0) * 100.0,
        remaining_display(now - started, ratio),
        name
    )
}
