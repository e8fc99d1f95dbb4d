//! Filename resolution (C2): derive an output path from caller input, the
//! URL path, and, once the probe response arrives, the
//! `Content-Disposition` header.

use std::path::{Path, PathBuf};

use reqwest::header::HeaderMap;
use url::Url;

/// Replace filesystem-hostile characters and trim stray dots/spaces.
/// Never returns an empty string.
pub fn sanitize(name: &str) -> String {
  let mut sanitized: String = name
    .chars()
    .map(|c| {
      if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || (c as u32) < 0x20 {
        '_'
      } else {
        c
      }
    })
    .collect();
  sanitized = sanitized.trim_matches(|c| c == '.' || c == ' ').to_string();
  if sanitized.is_empty() {
    "download".to_string()
  } else {
    sanitized
  }
}

fn last_path_segment(url: &str) -> Option<String> {
  let parsed = Url::parse(url).ok()?;
  let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
  let decoded = percent_decode(segment);
  if decoded.is_empty() {
    None
  } else {
    Some(decoded)
  }
}

fn percent_decode(s: &str) -> String {
  percent_encoding::percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Priority 2: a name extracted from the URL path, accepted only if it
/// looks like a real filename (has a short, non-empty extension).
fn extract_filename_from_url(url: &str) -> Option<String> {
  let filename = last_path_segment(url)?;
  if !filename.contains('.') || filename.starts_with('.') {
    return None;
  }
  let ext = filename.rsplit('.').next()?;
  if ext.is_empty() || ext.len() > 10 {
    return None;
  }
  Some(sanitize(&filename))
}

/// Priority 3: a fallback name that always succeeds: last path segment,
/// else the host, else the literal `download`.
fn url_fallback_name(url: &str) -> String {
  if let Some(filename) = last_path_segment(url) {
    let sanitized = sanitize(&filename);
    if !sanitized.is_empty() {
      return sanitized;
    }
  }
  if let Ok(parsed) = Url::parse(url) {
    if let Some(host) = parsed.host_str() {
      return sanitize(host);
    }
  }
  "download".to_string()
}

/// Resolve the initial output path and whether it is eligible for a later
/// header-driven upgrade (§4.2 priorities 1-3).
pub fn resolve_initial(url: &str, caller_output: Option<PathBuf>) -> (PathBuf, bool) {
  if let Some(output) = caller_output {
    return (output, false);
  }
  let name = extract_filename_from_url(url).unwrap_or_else(|| url_fallback_name(url));
  (PathBuf::from(name), true)
}

/// Extract a filename from a `Content-Disposition` header value, preferring
/// the RFC 5987 `filename*=` form over the plain `filename=` form.
pub fn extract_from_content_disposition(value: &str) -> Option<String> {
  if let Some(name) = extract_rfc5987(value) {
    return Some(sanitize(&name));
  }
  extract_plain_filename(value).map(|name| sanitize(&name))
}

fn extract_rfc5987(value: &str) -> Option<String> {
  let lower = value.to_ascii_lowercase();
  let key_pos = lower.find("filename*=")?;
  let rest = &value[key_pos + "filename*=".len()..];
  let rest = rest.split(';').next().unwrap_or(rest).trim();
  let rest = rest.strip_prefix("UTF-8''").or_else(|| rest.strip_prefix("utf-8''")).unwrap_or(rest);
  let rest = rest.trim_matches(|c| c == '\'' || c == '"');
  if rest.is_empty() {
    None
  } else {
    Some(percent_decode(rest))
  }
}

fn extract_plain_filename(value: &str) -> Option<String> {
  let lower = value.to_ascii_lowercase();
  let key_pos = lower.find("filename=")?;
  // Don't match the `filename*=` form again.
  if key_pos > 0 && value.as_bytes().get(key_pos - 1) == Some(&b'*') {
    return None;
  }
  let rest = &value[key_pos + "filename=".len()..];
  let rest = rest.split(';').next().unwrap_or(rest).trim();
  let rest = rest.trim_matches(|c| c == '\'' || c == '"');
  if rest.is_empty() {
    None
  } else {
    Some(rest.to_string())
  }
}

/// Replace the final path component of `current`, preserving any parent
/// directory the caller implied.
pub fn upgrade_output(current: &Path, new_name: &str) -> PathBuf {
  match current.parent().filter(|p| !p.as_os_str().is_empty()) {
    Some(parent) => parent.join(new_name),
    None => PathBuf::from(new_name),
  }
}

/// Look for a `Content-Disposition` header in `headers` and compute the
/// upgraded output path, if any. Pure function of `(current_output, headers)`
/// as required by §9, safe to call repeatedly with equal inputs.
pub fn maybe_upgrade_from_headers(current: &Path, headers: &HeaderMap) -> Option<PathBuf> {
  let raw = headers.get(reqwest::header::CONTENT_DISPOSITION)?.to_str().ok()?;
  let name = extract_from_content_disposition(raw)?;
  Some(upgrade_output(current, &name))
}
