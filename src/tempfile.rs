//! Temp-file coordinator (C6): per-task temp directory, part-file paths,
//! and idempotent teardown. Every function here is safe to call zero, one,
//! or many times, and from any exit path.

use std::path::{Path, PathBuf};

use crate::error::Result;

/// `temp_root / task_id`.
pub fn temp_dir_for(temp_root: &Path, task_id: &str) -> PathBuf {
  temp_root.join(task_id)
}

/// `temp_dir / "part-{index}.bin"`.
pub fn part_path(temp_dir: &Path, index: usize) -> PathBuf {
  temp_dir.join(format!("part-{index}.bin"))
}

/// Create `temp_dir` (and any missing parents).
pub async fn create_temp_dir(temp_dir: &Path) -> Result<()> {
  tokio::fs::create_dir_all(temp_dir).await?;
  Ok(())
}

/// Create the parent directory of `path`, if it has one and it is missing.
pub async fn ensure_parent(path: &Path) -> Result<()> {
  if let Some(parent) = path.parent() {
    if !parent.as_os_str().is_empty() {
      tokio::fs::create_dir_all(parent).await?;
    }
  }
  Ok(())
}

/// Best-effort, idempotent removal of a temp directory. Never fails: a
/// missing directory or a race with another remover is not an error.
pub async fn remove_temp_dir(temp_dir: &Path) {
  if let Err(err) = tokio::fs::remove_dir_all(temp_dir).await {
    if err.kind() != std::io::ErrorKind::NotFound {
      tracing::debug!(path = %temp_dir.display(), error = %err, "temp dir removal failed (ignored)");
    }
  }
}

/// Best-effort, idempotent removal of the output file, e.g. when a task is
/// stopped or errors out mid-transfer.
pub async fn remove_output_file(output: &Path) {
  if let Err(err) = tokio::fs::remove_file(output).await {
    if err.kind() != std::io::ErrorKind::NotFound {
      tracing::debug!(path = %output.display(), error = %err, "output removal failed (ignored)");
    }
  }
}

/// Concatenate `parts` (in order) into `output`, truncating any existing
/// file. Streams each part in `chunk_size` reads rather than holding a
/// whole part in memory.
pub async fn merge_parts(output: &Path, parts: &[PathBuf], chunk_size: usize) -> Result<()> {
  use tokio::io::{AsyncReadExt, AsyncWriteExt};

  ensure_parent(output).await?;
  let mut target = tokio::fs::File::create(output).await?;
  let mut buf = vec![0u8; chunk_size];
  for part in parts {
    let mut handle = tokio::fs::File::open(part).await?;
    loop {
      let read = handle.read(&mut buf).await?;
      if read == 0 {
        break;
      }
      target.write_all(&buf[..read]).await?;
    }
  }
  target.flush().await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn merge_concatenates_in_order() {
    let root = tempfile::tempdir().unwrap();
    let part0 = root.path().join("part-0.bin");
    let part1 = root.path().join("part-1.bin");
    tokio::fs::write(&part0, b"hello ").await.unwrap();
    tokio::fs::write(&part1, b"world").await.unwrap();

    let output = root.path().join("out.bin");
    merge_parts(&output, &[part0, part1], 4).await.unwrap();

    let merged = tokio::fs::read(&output).await.unwrap();
    assert_eq!(merged, b"hello world");
  }

  #[tokio::test]
  async fn remove_temp_dir_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("sub");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    remove_temp_dir(&dir).await;
    // Calling it again on an already-removed directory must not panic.
    remove_temp_dir(&dir).await;
    assert!(!dir.exists());
  }

  #[tokio::test]
  async fn remove_output_file_missing_is_a_noop() {
    let root = tempfile::tempdir().unwrap();
    let path = root.path().join("nope.bin");
    remove_output_file(&path).await;
  }
}
