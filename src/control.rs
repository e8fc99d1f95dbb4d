//! Pause gate + stop flag (§9): two orthogonal control signals checked at
//! every chunk boundary. Pause is level-triggered and reversible; stop is
//! edge-triggered and absorbing. Stop always takes precedence over pause.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, PartialEq, Eq)]
pub enum Checkpoint {
  Continue,
  Stop,
}

#[derive(Clone)]
pub struct Control {
  stop_tx:  Arc<watch::Sender<bool>>,
  stop_rx:  watch::Receiver<bool>,
  pause_tx: Arc<watch::Sender<bool>>,
  pause_rx: watch::Receiver<bool>,
}

impl Control {
  pub fn new() -> Self {
    let (stop_tx, stop_rx) = watch::channel(false);
    let (pause_tx, pause_rx) = watch::channel(true);
    Self {
      stop_tx: Arc::new(stop_tx),
      stop_rx,
      pause_tx: Arc::new(pause_tx),
      pause_rx,
    }
  }

  pub fn is_stopped(&self) -> bool {
    *self.stop_rx.borrow()
  }

  pub fn is_paused(&self) -> bool {
    !*self.pause_rx.borrow()
  }

  /// Clear the pause gate. No-op if already paused (callers enforce the
  /// "only valid from `downloading`" rule at the task level).
  pub fn pause(&self) {
    let _ = self.pause_tx.send(false);
  }

  /// Set the pause gate again.
  pub fn resume(&self) {
    let _ = self.pause_tx.send(true);
  }

  /// Set the stop flag. `watch` stores the new value rather than firing a
  /// one-shot notification, so a worker that checks `changed()` after this
  /// call still observes it even if it raced `stop()` and missed the
  /// moment it was sent (no lost wakeup).
  pub fn stop(&self) {
    let _ = self.stop_tx.send(true);
  }

  /// Check stop and pause at a chunk boundary. Blocks while paused; wakes
  /// promptly when either `resume()` or `stop()` is called.
  pub async fn checkpoint(&self) -> Checkpoint {
    if self.is_stopped() {
      return Checkpoint::Stop;
    }
    let mut pause_rx = self.pause_rx.clone();
    let mut stop_rx = self.stop_rx.clone();
    loop {
      if *pause_rx.borrow() {
        return Checkpoint::Continue;
      }
      if *stop_rx.borrow() {
        return Checkpoint::Stop;
      }
      tokio::select! {
        _ = pause_rx.changed() => {},
        _ = stop_rx.changed() => {},
      }
      if *stop_rx.borrow() {
        return Checkpoint::Stop;
      }
    }
  }
}

impl Default for Control {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn continues_when_running() {
    let control = Control::new();
    assert_eq!(control.checkpoint().await, Checkpoint::Continue);
  }

  #[tokio::test]
  async fn stop_takes_precedence_over_pause() {
    let control = Control::new();
    control.pause();
    control.stop();
    assert_eq!(control.checkpoint().await, Checkpoint::Stop);
  }

  #[tokio::test]
  async fn paused_worker_wakes_on_resume() {
    let control = Control::new();
    control.pause();
    let control2 = control.clone();
    let handle = tokio::spawn(async move { control2.checkpoint().await });
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    control.resume();
    let result = tokio::time::timeout(std::time::Duration::from_secs(1), handle).await;
    assert_eq!(result.unwrap().unwrap(), Checkpoint::Continue);
  }

  #[tokio::test]
  async fn paused_worker_wakes_on_stop() {
    let control = Control::new();
    control.pause();
    let control2 = control.clone();
    let handle = tokio::spawn(async move { control2.checkpoint().await });
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    control.stop();
    let result = tokio::time::timeout(std::time::Duration::from_secs(1), handle).await;
    assert_eq!(result.unwrap().unwrap(), Checkpoint::Stop);
  }

  #[tokio::test]
  async fn stop_racing_registration_is_not_lost() {
    // Regression: stop() firing between the borrow check and select!
    // registration must still be observed, since watch stores the value
    // instead of relying on a one-shot wakeup.
    let control = Control::new();
    control.pause();
    let control2 = control.clone();
    let handle = tokio::spawn(async move {
      tokio::task::yield_now().await;
      control2.checkpoint().await
    });
    control.stop();
    let result = tokio::time::timeout(std::time::Duration::from_secs(1), handle).await;
    assert_eq!(result.unwrap().unwrap(), Checkpoint::Stop);
  }
}
