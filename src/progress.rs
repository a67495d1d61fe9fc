//! Run progress reporting.
//!
//! [`RunProgress`] counts finished tasks and keeps a smoothed interval
//! between completions (exponential moving average, the first completion
//! seeds it). With the `progress` feature it also drives an `indicatif` bar
//! showing both; without it, only the closing `debug` event is emitted.
use std::time::{Duration, Instant};

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// Weight of the newest completion interval in the moving average.
const INTERVAL_SMOOTHING: f64 = 0.2;

/// Fold one completion interval into the moving average.
fn smooth(mean: Option<Duration>, sample: Duration) -> Duration {
    match mean {
        None => sample,
        Some(mean) => sample.mul_f64(INTERVAL_SMOOTHING) + mean.mul_f64(1.0 - INTERVAL_SMOOTHING),
    }
}

/// Progress of one orchestrator run.
pub struct RunProgress {
    total: usize,
    succeeded: usize,
    failed: usize,
    last_completion: Instant,
    mean_interval: Option<Duration>,
    #[cfg(feature = "progress")]
    bar: ProgressBar,
}

impl RunProgress {
    pub fn new(total: usize) -> Self {
        #[cfg(feature = "progress")]
        let bar = {
            let bar = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} frames | ETA {eta_precise} | {msg}",
            ) {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(250));
            bar
        };

        RunProgress {
            total,
            succeeded: 0,
            failed: 0,
            last_completion: Instant::now(),
            mean_interval: None,
            #[cfg(feature = "progress")]
            bar,
        }
    }

    /// Record one finished task.
    pub fn task_done(&mut self, success: bool) {
        let now = Instant::now();
        self.mean_interval = Some(smooth(self.mean_interval, now - self.last_completion));
        self.last_completion = now;
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }

        #[cfg(feature = "progress")]
        {
            self.bar.set_message(self.status());
            self.bar.inc(1);
        }
    }

    fn status(&self) -> String {
        let interval = self
            .mean_interval
            .map_or_else(|| "-".to_string(), |d| format!("{d:.1?}"));
        format!(
            "measured {} / failed {} | {interval} per frame",
            self.succeeded, self.failed
        )
    }

    pub fn finish(&self) {
        #[cfg(feature = "progress")]
        self.bar.finish_and_clear();
        debug!(total = self.total, status = %self.status(), "progress finished");
    }

    pub fn interrupt(&self) {
        #[cfg(feature = "progress")]
        self.bar.abandon_with_message(format!("interrupted: {}", self.status()));
        debug!(total = self.total, status = %self.status(), "progress interrupted");
    }
}
