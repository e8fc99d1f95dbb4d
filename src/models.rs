use std::path::PathBuf;

/// A caller-supplied request to fetch a resource. Immutable once created.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
  pub url:    String,
  pub output: Option<PathBuf>,
}

impl DownloadRequest {
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      url:    url.into(),
      output: None,
    }
  }

  pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
    self.output = Some(output.into());
    self
  }
}

pub const DEFAULT_PARTS: usize = 6;
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_CONNECTIONS: usize = 4;

/// Immutable per-task configuration.
#[derive(Debug, Clone, Copy)]
pub struct TaskConfig {
  pub parts:           usize,
  pub chunk_size:       usize,
  pub timeout_secs:     u64,
  pub max_connections: usize,
}

impl Default for TaskConfig {
  fn default() -> Self {
    Self {
      parts:           DEFAULT_PARTS,
      chunk_size:       DEFAULT_CHUNK_SIZE,
      timeout_secs:     DEFAULT_TIMEOUT_SECS,
      max_connections: DEFAULT_MAX_CONNECTIONS,
    }
  }
}

impl TaskConfig {
  /// Clamp caller-supplied values to the invariants in the data model
  /// (`parts >= 1`, `chunk_size >= 1`, `max_connections >= 1`).
  pub fn normalized(mut self) -> Self {
    self.parts = self.parts.max(1);
    self.chunk_size = self.chunk_size.max(1);
    self.max_connections = self.max_connections.max(1);
    self
  }
}

/// A task's current lifecycle state. Terminal variants are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
  Queued,
  Downloading,
  Paused,
  Stopped,
  Completed,
  Error,
}

impl TaskStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Stopped | Self::Completed | Self::Error)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Queued => "queued",
      Self::Downloading => "downloading",
      Self::Paused => "paused",
      Self::Stopped => "stopped",
      Self::Completed => "completed",
      Self::Error => "error",
    }
  }
}

impl std::fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A progress snapshot emitted to subscribers. `downloaded` is
/// monotonically non-decreasing for a given `task_id`.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
  pub task_id:    String,
  pub downloaded: u64,
  pub total:      Option<u64>,
  pub speed_bps:  f64,
  pub status:     TaskStatus,
  pub name:       String,
  pub error:      Option<String>,
}
