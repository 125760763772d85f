use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Hard cap on retained speed samples.
const MAX_SPEED_SAMPLES: usize = 256;

/// Estimates transfer speed over a sliding time window.
///
/// The orchestrator records a sample per acked chunk; the estimate rides
/// along on progress events.
pub struct SpeedCalculator {
    inner: Mutex<SpeedInner>,
}

struct SpeedInner {
    samples: VecDeque<(Instant, usize)>,
    window: Duration,
}

impl SpeedCalculator {
    /// Creates a calculator with the given sliding window (default 5 s).
    pub fn new(window: Option<Duration>) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: VecDeque::new(),
                window: window.unwrap_or(Duration::from_secs(5)),
            }),
        }
    }

    /// Records `bytes` transferred at the current instant.
    pub fn add_sample(&self, bytes: usize) {
        let mut s = self.inner.lock().unwrap();
        let now = Instant::now();
        s.samples.push_back((now, bytes));

        let cutoff = now.checked_sub(s.window);
        while let Some(&(t, _)) = s.samples.front() {
            let stale = cutoff.is_some_and(|c| t < c);
            if stale || s.samples.len() > MAX_SPEED_SAMPLES {
                s.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Average speed in bytes/second within the window; 0.0 under two
    /// samples.
    pub fn bytes_per_second(&self) -> f64 {
        let s = self.inner.lock().unwrap();
        if s.samples.len() < 2 {
            return 0.0;
        }
        let (first, _) = s.samples[0];
        let (last, _) = s.samples[s.samples.len() - 1];
        let elapsed = last.duration_since(first);
        if elapsed.is_zero() {
            return 0.0;
        }
        let total: usize = s.samples.iter().map(|&(_, b)| b).sum();
        total as f64 / elapsed.as_secs_f64()
    }

    /// Estimated time to transfer `remaining` bytes; `None` when speed is
    /// unknown.
    pub fn eta(&self, remaining: usize) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / speed))
    }

    /// Clears all recorded samples.
    pub fn reset(&self) {
        let mut s = self.inner.lock().unwrap();
        s.samples.clear();
    }
}
