use thiserror::Error;

/// Surface-level error kinds (§7). Every variant renders a human-readable
/// message suitable for a task's `error` field.
#[derive(Error, Debug)]
pub enum DownloadError {
  #[error("connection error: {0}")]
  Connection(#[from] reqwest::Error),

  #[error("protocol error: unexpected status {status}{}", message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
  Protocol {
    status:  u16,
    message: Option<String>,
  },

  #[error("range violation: expected {expected} bytes, got {got}")]
  RangeViolation { expected: u64, got: u64 },

  #[error("timeout: {0}")]
  Timeout(String),

  #[error("filesystem error: {0}")]
  Filesystem(#[from] std::io::Error),

  #[error("internal error: {0}")]
  Internal(String),

  #[error("indicatif error: {0}")]
  IndicatifTemplate(#[from] indicatif::style::TemplateError),
}

pub type Result<T> = std::result::Result<T, DownloadError>;

impl DownloadError {
  /// The message stored on `DownloadTask::error` for this failure.
  pub fn user_message(&self) -> String {
    self.to_string()
  }
}
