mod cli;
mod control;
mod error;
mod filename;
mod formatting;
mod manager;
mod models;
mod planner;
mod progress;
mod task;
mod tempfile;
mod utils;

use std::collections::HashMap;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use indicatif::{MultiProgress, MultiProgressAlignment, ProgressBar, ProgressStyle};
use tracing::info;

use crate::cli::Cli;
use crate::error::Result;
use crate::formatting::format_bytes;
use crate::manager::{default_temp_root, DownloadManager};
use crate::models::TaskStatus;

fn bar_style() -> std::result::Result<ProgressStyle, indicatif::style::TemplateError> {
  Ok(
    ProgressStyle::default_bar()
      .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}")?
      .progress_chars("+>-"),
  )
}

fn status_prefix(status: TaskStatus) -> &'static str {
  match status {
    TaskStatus::Queued => "\x1b[90mQueued\x1b[0m",
    TaskStatus::Downloading => "\x1b[93mDownloading\x1b[0m",
    TaskStatus::Paused => "\x1b[94mPaused\x1b[0m",
    TaskStatus::Stopped => "\x1b[91mStopped\x1b[0m",
    TaskStatus::Completed => "\x1b[32mDone\x1b[0m",
    TaskStatus::Error => "\x1b[31mError\x1b[0m",
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  utils::init_tracing();
  info!("Alter download manager v{}", env!("CARGO_PKG_VERSION"));

  let mut cmd = Cli::command();
  let cli = Cli::parse();

  if let Some(shell) = cli.completion {
    cli::generate_completions("alter", shell, &mut cmd);
    return Ok(());
  }

  let requests = cli.requests();
  if requests.is_empty() {
    eprintln!("Error: No URLs provided");
    std::process::exit(1);
  }

  let (manager, mut progress_rx) = DownloadManager::new(default_temp_root(), cli.config());
  let manager = Arc::new(manager);

  let mp = Arc::new(MultiProgress::new());
  mp.set_alignment(MultiProgressAlignment::Top);
  let mut bars: HashMap<String, ProgressBar> = HashMap::new();

  let mut task_ids = Vec::with_capacity(requests.len());
  for request in requests {
    let task = manager.add(request);
    let bar = mp.add(ProgressBar::new(0));
    bar.set_style(bar_style()?);
    bars.insert(task.id.clone(), bar);
    task_ids.push(task.id.clone());
  }
  for id in &task_ids {
    manager.start(id);
  }

  let mut remaining = task_ids.len();
  while remaining > 0 {
    let Some(event) = progress_rx.recv().await else { break };
    let Some(bar) = bars.get(&event.task_id) else { continue };
    if let Some(total) = event.total {
      bar.set_length(total);
    }
    bar.set_position(event.downloaded);
    let speed = format_bytes(event.speed_bps as i64);
    bar.set_message(format!("{} {} ({speed}/s)", status_prefix(event.status), event.name));

    if event.status.is_terminal() {
      let summary = match event.status {
        TaskStatus::Completed => format!("\x1b[32mOk\x1b[0m {} {}", event.name, "✔"),
        TaskStatus::Stopped => format!("\x1b[91mStopped\x1b[0m {}", event.name),
        TaskStatus::Error => {
          format!("\x1b[31mError\x1b[0m {}: {}", event.name, event.error.as_deref().unwrap_or("unknown error"))
        },
        _ => unreachable!("is_terminal() only returns true for the variants above"),
      };
      bar.finish_with_message(summary);
      remaining -= 1;
    }
  }

  info!("All downloads finished");
  Ok(())
}
