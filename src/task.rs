//! Task runtime (C4): the single-task state machine, probe then a
//! single-stream or multi-part fetch, then merge and cleanup.

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};
use reqwest::{Client, Response, StatusCode};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::control::{Checkpoint, Control};
use crate::error::{DownloadError, Result};
use crate::filename;
use crate::models::{DownloadProgress, DownloadRequest, TaskConfig, TaskStatus};
use crate::planner;
use crate::progress::ProgressState;
use crate::tempfile as tmp;

/// Per-task naming state, guarded separately from the progress counters:
/// the probe mutates it at most twice, everything else only reads it.
struct Naming {
  output:     PathBuf,
  name:       String,
  auto_named: bool,
}

pub struct DownloadTask {
  pub id:    String,
  pub url:   String,
  config:    TaskConfig,
  temp_root: PathBuf,

  naming:   Mutex<Naming>,
  status:   Mutex<TaskStatus>,
  error:    Mutex<Option<String>>,
  temp_dir: Mutex<Option<PathBuf>>,

  progress:    ProgressState,
  control:     Control,
  progress_tx: UnboundedSender<DownloadProgress>,

  runner: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl DownloadTask {
  pub fn new(
    request: DownloadRequest,
    temp_root: PathBuf,
    config: TaskConfig,
    progress_tx: UnboundedSender<DownloadProgress>,
  ) -> Arc<Self> {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let (output, auto_named) = filename::resolve_initial(&request.url, request.output);
    let name = output.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

    Arc::new(Self {
      id,
      url: request.url,
      config: config.normalized(),
      temp_root,
      naming: Mutex::new(Naming { output, name, auto_named }),
      status: Mutex::new(TaskStatus::Queued),
      error: Mutex::new(None),
      temp_dir: Mutex::new(None),
      progress: ProgressState::new(None),
      control: Control::new(),
      progress_tx,
      runner: Mutex::new(None),
    })
  }

  pub fn status(&self) -> TaskStatus {
    *self.status.lock().unwrap()
  }

  pub fn output(&self) -> PathBuf {
    self.naming.lock().unwrap().output.clone()
  }

  pub fn name(&self) -> String {
    self.naming.lock().unwrap().name.clone()
  }

  fn auto_named(&self) -> bool {
    self.naming.lock().unwrap().auto_named
  }

  fn set_output(&self, new_output: PathBuf) {
    let mut naming = self.naming.lock().unwrap();
    naming.name = new_output.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    naming.output = new_output;
  }

  pub fn snapshot(&self) -> DownloadProgress {
    DownloadProgress {
      task_id:    self.id.clone(),
      downloaded: self.progress.downloaded(),
      total:      self.progress.total(),
      speed_bps:  self.progress.speed_bps(),
      status:     self.status(),
      name:       self.name(),
      error:      self.error.lock().unwrap().clone(),
    }
  }

  /// Emit the current snapshot to the progress channel. Public so the
  /// manager can send the initial `queued` event right after
  /// registering a task (§3's lifecycle: "Created: ... an initial
  /// progress event is emitted").
  pub(crate) fn notify(&self) {
    let _ = self.progress_tx.send(self.snapshot());
  }

  fn set_status(&self, status: TaskStatus, error: Option<String>) {
    *self.status.lock().unwrap() = status;
    *self.error.lock().unwrap() = error;
    self.notify();
  }

  fn on_bytes(&self, bytes_written: u64) {
    self.progress.record(bytes_written);
    self.notify();
  }

  /// Idempotent: a no-op unless the task is still `queued`.
  pub fn start(self: &Arc<Self>) {
    if self.status() != TaskStatus::Queued {
      return;
    }
    let mut guard = self.runner.lock().unwrap();
    if guard.is_some() {
      return;
    }
    let this = Arc::clone(self);
    *guard = Some(tokio::spawn(async move { this.run().await }));
  }

  /// A no-op unless the task is currently `downloading`.
  pub fn pause(&self) {
    if self.status() == TaskStatus::Downloading {
      self.control.pause();
      self.set_status(TaskStatus::Paused, None);
    }
  }

  /// A no-op unless the task is currently `paused`.
  pub fn resume(&self) {
    if self.status() == TaskStatus::Paused {
      self.control.resume();
      self.set_status(TaskStatus::Downloading, None);
    }
  }

  /// Fire-and-forget cancellation (§5). A no-op in terminal states. Never
  /// blocks: the running task observes the stop flag and transitions
  /// itself to `stopped` once cleanup finishes.
  pub fn stop(&self) {
    let current = self.status();
    if current.is_terminal() {
      return;
    }
    self.control.stop();
    if current == TaskStatus::Queued {
      // Never started: nothing was ever written, so there's nothing to
      // clean up and no runner that will ever transition the status.
      self.set_status(TaskStatus::Stopped, None);
    }
  }

  async fn run(self: Arc<Self>) {
    self.set_status(TaskStatus::Downloading, None);

    let client = match self.build_client() {
      Ok(client) => client,
      Err(err) => {
        self.cleanup_best_effort().await;
        self.set_status(TaskStatus::Error, Some(err.user_message()));
        return;
      },
    };

    let (total, supports_ranges) = self.probe(&client).await;
    self.progress.set_total(total);

    let result = if supports_ranges && total.is_some() && self.config.parts > 1 {
      self.clone().download_multipart(client, total.unwrap()).await
    } else {
      self.download_single(&client).await
    };

    match result {
      Ok(()) if self.control.is_stopped() => self.finalize_stopped().await,
      Ok(()) => self.set_status(TaskStatus::Completed, None),
      Err(err) => {
        self.cleanup_best_effort().await;
        self.set_status(TaskStatus::Error, Some(err.user_message()));
      },
    }
  }

  fn build_client(&self) -> Result<Client> {
    Client::builder()
      .connect_timeout(Duration::from_secs(self.config.timeout_secs))
      .pool_max_idle_per_host(self.config.max_connections)
      .build()
      .map_err(DownloadError::Connection)
  }

  async fn finalize_stopped(&self) {
    self.cleanup_best_effort().await;
    self.set_status(TaskStatus::Stopped, None);
  }

  /// Best-effort, idempotent cleanup invoked on every non-`completed` exit
  /// path (C6). Never fails.
  async fn cleanup_best_effort(&self) {
    tmp::remove_output_file(&self.output()).await;
    let temp_dir = self.temp_dir.lock().unwrap().clone();
    if let Some(dir) = temp_dir {
      tmp::remove_temp_dir(&dir).await;
    }
  }

  fn maybe_upgrade_filename(&self, headers: &reqwest::header::HeaderMap) {
    if !self.auto_named() {
      return;
    }
    if let Some(upgraded) = filename::maybe_upgrade_from_headers(&self.output(), headers) {
      self.set_output(upgraded);
    }
  }

  fn extract_probe_fields(&self, response: &Response) -> (Option<u64>, bool) {
    let total = response
      .content_length()
      .or_else(|| response.headers().get(CONTENT_LENGTH).and_then(|v| v.to_str().ok()).and_then(|s| s.parse().ok()));
    let supports_ranges = response
      .headers()
      .get(ACCEPT_RANGES)
      .and_then(|v| v.to_str().ok())
      .map(|v| v.eq_ignore_ascii_case("bytes"))
      .unwrap_or(false);
    (total, supports_ranges)
  }

  /// HEAD-then-GET probe (§4.4). Never returns an error: a transport
  /// failure or non-2xx status on both attempts simply yields
  /// `(None, false)`, leaving the real failure to surface from the fetch
  /// that follows.
  #[tracing::instrument(skip(self, client), fields(task_id = %self.id))]
  async fn probe(&self, client: &Client) -> (Option<u64>, bool) {
    let timeout = Duration::from_secs(self.config.timeout_secs);

    if let Ok(Ok(response)) = tokio::time::timeout(timeout, client.head(&self.url).send()).await {
      if response.status().is_success() {
        self.maybe_upgrade_filename(response.headers());
        return self.extract_probe_fields(&response);
      }
    }

    if let Ok(Ok(response)) = tokio::time::timeout(timeout, client.get(&self.url).send()).await {
      if response.status().is_success() {
        self.maybe_upgrade_filename(response.headers());
        return self.extract_probe_fields(&response);
      }
    }

    (None, false)
  }

  #[tracing::instrument(skip(self, client), fields(task_id = %self.id), err(level = tracing::Level::ERROR))]
  async fn download_single(&self, client: &Client) -> Result<()> {
    let output = self.output();
    tmp::ensure_parent(&output).await?;

    let timeout = Duration::from_secs(self.config.timeout_secs);
    let response = with_timeout(timeout, client.get(&self.url).send()).await?;
    let status = response.status();
    if !status.is_success() {
      return Err(DownloadError::Protocol { status: status.as_u16(), message: None });
    }
    self.maybe_upgrade_filename(response.headers());

    let output = self.output();
    let mut file = tokio::fs::File::create(&output).await?;
    stream_body(response, &mut file, self.config.chunk_size, timeout, &self.control, |n| self.on_bytes(n))
      .await?;
    Ok(())
  }

  #[tracing::instrument(skip(self, client, semaphore), fields(task_id = %self.id, start, end))]
  async fn fetch_range(
    self: Arc<Self>,
    client: Client,
    semaphore: Arc<Semaphore>,
    start: u64,
    end: u64,
    path: PathBuf,
  ) -> Result<()> {
    let _permit = semaphore.acquire_owned().await.map_err(|e| DownloadError::Internal(e.to_string()))?;
    if self.control.is_stopped() {
      return Ok(());
    }

    let timeout = Duration::from_secs(self.config.timeout_secs);
    let response = with_timeout(
      timeout,
      client.get(&self.url).header(RANGE, format!("bytes={start}-{end}")).send(),
    )
    .await?;
    if response.status() != StatusCode::PARTIAL_CONTENT {
      return Err(DownloadError::Protocol {
        status:  response.status().as_u16(),
        message: Some("range request failed".to_string()),
      });
    }

    let expected = end - start + 1;
    let mut file = tokio::fs::File::create(&path).await?;
    let this = Arc::clone(&self);
    let written =
      stream_body(response, &mut file, self.config.chunk_size, timeout, &self.control, |n| this.on_bytes(n))
        .await?;

    if written != expected && !self.control.is_stopped() {
      return Err(DownloadError::RangeViolation { expected, got: written });
    }
    Ok(())
  }

  #[tracing::instrument(skip(self, client), fields(task_id = %self.id, total))]
  async fn download_multipart(self: Arc<Self>, client: Client, total: u64) -> Result<()> {
    let ranges = planner::compute_ranges(total, self.config.parts);
    let temp_dir = tmp::temp_dir_for(&self.temp_root, &self.id);
    *self.temp_dir.lock().unwrap() = Some(temp_dir.clone());
    tmp::create_temp_dir(&temp_dir).await?;

    let part_paths: Vec<PathBuf> = (0..ranges.len()).map(|i| tmp::part_path(&temp_dir, i)).collect();
    let permits = self.config.max_connections.min(ranges.len().max(1)).max(1);
    let semaphore = Arc::new(Semaphore::new(permits));

    let mut join_set = JoinSet::new();
    for (&(start, end), path) in ranges.iter().zip(part_paths.iter()) {
      let this = Arc::clone(&self);
      let client = client.clone();
      let semaphore = Arc::clone(&semaphore);
      let path = path.clone();
      join_set.spawn(this.fetch_range(client, semaphore, start, end, path));
    }

    let mut first_err: Option<DownloadError> = None;
    while let Some(joined) = join_set.join_next().await {
      match joined {
        Ok(Ok(())) => {},
        Ok(Err(err)) => {
          first_err.get_or_insert(err);
          join_set.abort_all();
        },
        Err(join_err) => {
          if !join_err.is_cancelled() {
            first_err.get_or_insert(DownloadError::Internal(join_err.to_string()));
          }
          join_set.abort_all();
        },
      }
    }
    if let Some(err) = first_err {
      return Err(err);
    }

    if self.control.is_stopped() {
      return Ok(());
    }

    tmp::merge_parts(&self.output(), &part_paths, self.config.chunk_size).await?;
    tmp::remove_temp_dir(&temp_dir).await;
    Ok(())
  }
}

/// Wrap a fallible future with a timeout that surfaces as
/// `DownloadError::Timeout` rather than a bare elapsed error.
async fn with_timeout<T, E, F>(duration: Duration, fut: F) -> Result<T>
where
  F: Future<Output = std::result::Result<T, E>>,
  DownloadError: From<E>,
{
  match tokio::time::timeout(duration, fut).await {
    Ok(inner) => inner.map_err(DownloadError::from),
    Err(_) => Err(DownloadError::Timeout(format!("{:.0}s elapsed", duration.as_secs_f64()))),
  }
}

/// Stream `response`'s body into `file` in `chunk_size`-sized writes,
/// checking the pause/stop control signals at every chunk boundary (§5).
/// Returns the number of bytes written.
async fn stream_body(
  response: Response,
  file: &mut tokio::fs::File,
  chunk_size: usize,
  timeout: Duration,
  control: &Control,
  on_progress: impl Fn(u64),
) -> Result<u64> {
  let mut buffer: Vec<u8> = Vec::with_capacity(chunk_size);
  let mut written = 0u64;
  let mut stream = response.bytes_stream();

  loop {
    if control.checkpoint().await == Checkpoint::Stop {
      return Ok(written);
    }

    let next = with_timeout(timeout, async { stream.next().await.transpose() }).await?;
    let Some(bytes) = next else { break };
    buffer.extend_from_slice(&bytes);

    while buffer.len() >= chunk_size {
      let piece: Vec<u8> = buffer.drain(..chunk_size).collect();
      file.write_all(&piece).await?;
      written += piece.len() as u64;
      on_progress(piece.len() as u64);
      if control.checkpoint().await == Checkpoint::Stop {
        return Ok(written);
      }
    }
  }

  if !buffer.is_empty() {
    let len = buffer.len();
    file.write_all(&buffer).await?;
    written += len as u64;
    on_progress(len as u64);
  }
  file.flush().await?;
  Ok(written)
}
