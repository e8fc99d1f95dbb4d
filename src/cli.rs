use std::path::PathBuf;

use clap::Parser;
use clap_complete::{generate, shells};

use crate::models::{DownloadRequest, TaskConfig, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CONNECTIONS, DEFAULT_PARTS, DEFAULT_TIMEOUT_SECS};

#[derive(Debug, Clone, Copy, clap::ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
  Bash,
  Zsh,
  Fish,
  Powershell,
  Elvish,
}

#[derive(Parser, Debug, Clone)]
#[command(
  author = env!("CARGO_PKG_AUTHORS"),
  name = "alter",
  version = env!("CARGO_PKG_VERSION"),
  about = "A concurrent, multi-connection HTTP(S) download manager",
  long_about = None,
)]
pub struct Cli {
  /// URL(s) to download
  #[arg(value_name = "URL")]
  pub urls: Vec<String>,

  /// Output path(s), paired positionally with URLs
  #[arg(short, long, value_name = "PATH")]
  pub output: Vec<PathBuf>,

  /// Number of parallel ranges per download
  #[arg(long, default_value_t = DEFAULT_PARTS)]
  pub parts: usize,

  /// Chunk size in bytes
  #[arg(long = "chunk-size", default_value_t = DEFAULT_CHUNK_SIZE)]
  pub chunk_size: usize,

  /// Connect/read timeout in seconds
  #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
  pub timeout: u64,

  /// Max concurrent connections per download
  #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
  pub connections: usize,

  /// Shell to generate completion script for, then exit
  #[arg(long, alias = "compl")]
  pub completion: Option<Shell>,
}

impl Cli {
  pub fn config(&self) -> TaskConfig {
    TaskConfig {
      parts:           self.parts,
      chunk_size:       self.chunk_size,
      timeout_secs:     self.timeout,
      max_connections: self.connections,
    }
    .normalized()
  }

  /// Pair URLs with outputs positionally (§6): extra URLs get no explicit
  /// output, extra outputs are ignored.
  pub fn requests(&self) -> Vec<DownloadRequest> {
    self
      .urls
      .iter()
      .enumerate()
      .map(|(index, url)| {
        let mut request = DownloadRequest::new(url.clone());
        if let Some(output) = self.output.get(index) {
          request = request.with_output(expand_tilde(output));
        }
        request
      })
      .collect()
  }
}

/// Expand a leading `~` in a caller-supplied path before it's used as an
/// output destination.
fn expand_tilde(path: &PathBuf) -> PathBuf {
  PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string())
}

/// Generate shell completions for the CLI.
pub fn generate_completions(bin_name: &str, shell: Shell, cmd: &mut clap::Command) {
  match shell {
    Shell::Bash => generate(shells::Bash, cmd, bin_name, &mut std::io::stdout()),
    Shell::Zsh => generate(shells::Zsh, cmd, bin_name, &mut std::io::stdout()),
    Shell::Fish => generate(shells::Fish, cmd, bin_name, &mut std::io::stdout()),
    Shell::Powershell => generate(shells::PowerShell, cmd, bin_name, &mut std::io::stdout()),
    Shell::Elvish => generate(shells::Elvish, cmd, bin_name, &mut std::io::stdout()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn cli_with(urls: Vec<&str>, output: Vec<&str>) -> Cli {
    Cli {
      urls:       urls.into_iter().map(String::from).collect(),
      output:     output.into_iter().map(PathBuf::from).collect(),
      parts:      DEFAULT_PARTS,
      chunk_size: DEFAULT_CHUNK_SIZE,
      timeout:    DEFAULT_TIMEOUT_SECS,
      connections: DEFAULT_MAX_CONNECTIONS,
      completion: None,
    }
  }

  #[test]
  fn pairs_urls_with_outputs_positionally() {
    let cli = cli_with(vec!["https://a.example/x.bin", "https://b.example/y.bin"], vec!["first.bin"]);
    let requests = cli.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].output, Some(PathBuf::from("first.bin")));
    assert_eq!(requests[1].output, None);
  }

  #[test]
  fn expands_tilde_in_output_path() {
    let cli = cli_with(vec!["https://a.example/x.bin"], vec!["~/downloads/x.bin"]);
    let requests = cli.requests();
    let home = dirs::home_dir().unwrap();
    assert_eq!(requests[0].output, Some(home.join("downloads/x.bin")));
  }

  #[test]
  fn extra_outputs_are_ignored() {
    let cli = cli_with(vec!["https://a.example/x.bin"], vec!["first.bin", "unused.bin"]);
    assert_eq!(cli.requests().len(), 1);
  }

  #[test]
  fn config_reflects_cli_flags() {
    let mut cli = cli_with(vec![], vec![]);
    cli.parts = 8;
    cli.connections = 0; // invariant: clamped to at least 1
    let config = cli.config();
    assert_eq!(config.parts, 8);
    assert_eq!(config.max_connections, 1);
  }
}
