use std::time::{
    Duration,
    Instant,
};

use prometheus::HistogramVec;

/// Records elapsed time into a `status`-labeled histogram when dropped.
pub struct Timer<'a> {
    start: Instant,
    histogram: &'a HistogramVec,
    status: &'static str,
}

impl<'a> Timer<'a> {
    pub fn new(histogram: &'a HistogramVec) -> Self {
        Self {
            start: Instant::now(),
            histogram,
            status: "error",
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        let elapsed = self.start.elapsed().as_secs_f64();
        self.histogram.with_label_values(&[self.status]).observe(elapsed);
    }
}

/// A timer that defaults to recording `status="error"` on drop unless
/// [`finish`](StatusTimer::finish) is called — so an early `return` or `?`
/// inside the timed scope is never silently counted as a success.
pub struct StatusTimer<'a>(Timer<'a>);

impl<'a> StatusTimer<'a> {
    pub fn new(histogram: &'a HistogramVec) -> Self {
        Self(Timer::new(histogram))
    }

    pub fn finish(mut self, success: bool) -> Duration {
        self.0.status = if success { "success" } else { "error" };
        self.0.elapsed()
    }

    pub fn finish_with(mut self, status: &'static str) -> Duration {
        self.0.status = status;
        self.0.elapsed()
    }
}
