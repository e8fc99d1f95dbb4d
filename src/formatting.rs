//! Human-readable byte counts. The teacher repo reaches for `humansize`,
//! but its output doesn't match the exact format this spec tests against
//! (`"0 B"`, `"1.0 KB"`), so it's hand-rolled here instead.

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

pub fn format_bytes(value: i64) -> String {
  if value < 0 {
    return "0 B".to_string();
  }
  let mut size = value as f64;
  for (index, unit) in UNITS.iter().enumerate() {
    if size < 1024.0 || index == UNITS.len() - 1 {
      return if *unit == "B" {
        format!("{} {}", size as u64, unit)
      } else {
        format!("{:.1} {}", size, unit)
      };
    }
    size /= 1024.0;
  }
  format!("{} B", value)
}
