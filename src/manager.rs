//! Manager (C5): a multi-task registry and command dispatcher. Owns no
//! I/O itself: every operation either mutates the map or delegates to a
//! task's own (idempotent, fire-and-forget) control methods.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::models::{DownloadProgress, DownloadRequest, TaskConfig};
use crate::task::DownloadTask;

pub struct DownloadManager {
  tasks:       Mutex<HashMap<String, Arc<DownloadTask>>>,
  temp_root:   PathBuf,
  config:      TaskConfig,
  progress_tx: mpsc::UnboundedSender<DownloadProgress>,
}

/// Default temp root, `<home>/.alter/temp`, falling back to the current
/// directory if the home directory can't be resolved.
pub fn default_temp_root() -> PathBuf {
  dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".alter").join("temp")
}

impl DownloadManager {
  /// Build a manager and the receiver end of its progress channel. The
  /// channel is unbounded so a slow consumer never stalls the engine
  /// (§9).
  pub fn new(temp_root: PathBuf, config: TaskConfig) -> (Self, mpsc::UnboundedReceiver<DownloadProgress>) {
    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    (
      Self {
        tasks: Mutex::new(HashMap::new()),
        temp_root,
        config,
        progress_tx,
      },
      progress_rx,
    )
  }

  /// Register a new task in the `queued` state and emit its initial
  /// progress event.
  pub fn add(&self, request: DownloadRequest) -> Arc<DownloadTask> {
    let task = DownloadTask::new(request, self.temp_root.clone(), self.config, self.progress_tx.clone());
    task.notify();
    self.tasks.lock().unwrap().insert(task.id.clone(), Arc::clone(&task));
    task
  }

  pub fn get(&self, id: &str) -> Option<Arc<DownloadTask>> {
    self.tasks.lock().unwrap().get(id).cloned()
  }

  pub fn list(&self) -> Vec<Arc<DownloadTask>> {
    self.tasks.lock().unwrap().values().cloned().collect()
  }

  /// Remove a task from the registry. Does not touch anything on disk;
  /// deleting a completed output is a separate, explicit operation.
  pub fn remove(&self, id: &str) {
    self.tasks.lock().unwrap().remove(id);
  }

  pub fn start(&self, id: &str) {
    if let Some(task) = self.get(id) {
      task.start();
    }
  }

  pub fn pause(&self, id: &str) {
    if let Some(task) = self.get(id) {
      task.pause();
    }
  }

  pub fn resume(&self, id: &str) {
    if let Some(task) = self.get(id) {
      task.resume();
    }
  }

  pub fn stop(&self, id: &str) {
    if let Some(task) = self.get(id) {
      task.stop();
    }
  }
}
