//! Progress reporter (C3): sampled bytes/sec and cumulative counters,
//! guarded by a lock that is never held across I/O.

use std::sync::Mutex;
use std::time::Instant;

const SAMPLE_INTERVAL_SECS: f64 = 0.5;

#[derive(Debug)]
struct Counters {
  downloaded:        u64,
  total:             Option<u64>,
  speed_bps:         f64,
  last_sample_time:  Instant,
  last_sample_bytes: u64,
}

/// Progress counters and speed sampling state for one task. The lock here
/// protects exactly this struct, never the task's status, control
/// signals, or any I/O.
pub struct ProgressState {
  inner: Mutex<Counters>,
}

impl ProgressState {
  pub fn new(total: Option<u64>) -> Self {
    Self {
      inner: Mutex::new(Counters {
        downloaded: 0,
        total,
        speed_bps: 0.0,
        last_sample_time: Instant::now(),
        last_sample_bytes: 0,
      }),
    }
  }

  pub fn set_total(&self, total: Option<u64>) {
    self.inner.lock().unwrap().total = total;
  }

  pub fn total(&self) -> Option<u64> {
    self.inner.lock().unwrap().total
  }

  pub fn downloaded(&self) -> u64 {
    self.inner.lock().unwrap().downloaded
  }

  pub fn speed_bps(&self) -> f64 {
    self.inner.lock().unwrap().speed_bps
  }

  /// Record `bytes_written` more bytes transferred and recompute the
  /// sampled speed if at least `SAMPLE_INTERVAL_SECS` have elapsed since
  /// the last sample. Returns the new cumulative total so the caller can
  /// emit a progress event without re-locking.
  pub fn record(&self, bytes_written: u64) -> (u64, f64) {
    let mut counters = self.inner.lock().unwrap();
    counters.downloaded += bytes_written;
    let now = Instant::now();
    let elapsed = now.duration_since(counters.last_sample_time).as_secs_f64();
    if elapsed >= SAMPLE_INTERVAL_SECS {
      let delta = counters.downloaded - counters.last_sample_bytes;
      counters.speed_bps = if elapsed > 0.0 { delta as f64 / elapsed } else { 0.0 };
      counters.last_sample_time = now;
      counters.last_sample_bytes = counters.downloaded;
    }
    (counters.downloaded, counters.speed_bps)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn downloaded_accumulates() {
    let state = ProgressState::new(Some(100));
    let (downloaded, _) = state.record(10);
    assert_eq!(downloaded, 10);
    let (downloaded, _) = state.record(5);
    assert_eq!(downloaded, 15);
  }

  #[test]
  fn speed_unset_before_first_sample_window() {
    let state = ProgressState::new(None);
    state.record(1000);
    // Less than 0.5s has elapsed; speed stays at its initial value.
    assert_eq!(state.speed_bps(), 0.0);
  }
}
