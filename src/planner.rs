//! Range planning (C1): split a known resource size into contiguous,
//! non-overlapping byte ranges reported as inclusive `(start, end)` pairs
//! suitable for an HTTP `Range: bytes=start-end` header.

/// Split `size` bytes into at most `parts` contiguous ranges.
///
/// The first `size % parts` ranges get one extra byte so the lengths are as
/// even as possible. Zero-length ranges are never emitted, which is the
/// only way the result can have fewer than `parts` entries.
pub fn compute_ranges(size: u64, parts: usize) -> Vec<(u64, u64)> {
  if size == 0 {
    return Vec::new();
  }
  let parts = parts.max(1) as u64;
  let base = size / parts;
  let remainder = size % parts;

  let mut ranges = Vec::with_capacity(parts as usize);
  let mut start = 0u64;
  for index in 0..parts {
    let length = base + u64::from(index < remainder);
    if length == 0 {
      break;
    }
    let end = start + length - 1;
    ranges.push((start, end));
    start = end + 1;
  }
  ranges
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn even_split() {
    assert_eq!(compute_ranges(100, 4), vec![
      (0, 24),
      (25, 49),
      (50, 74),
      (75, 99)
    ]);
  }

  #[test]
  fn more_parts_than_bytes() {
    assert_eq!(compute_ranges(3, 10), vec![(0, 0), (1, 1), (2, 2)]);
  }

  #[test]
  fn zero_size_yields_empty() {
    assert_eq!(compute_ranges(0, 4), Vec::<(u64, u64)>::new());
  }

  #[test]
  fn single_part() {
    assert_eq!(compute_ranges(500, 1), vec![(0, 499)]);
  }

  #[test]
  fn parts_clamped_to_at_least_one() {
    assert_eq!(compute_ranges(10, 0), vec![(0, 9)]);
  }

  #[test]
  fn ranges_are_contiguous_and_sum_to_size() {
    for size in [1u64, 7, 64, 1000, 1_000_000] {
      for parts in [1usize, 2, 3, 5, 8, 16] {
        let ranges = compute_ranges(size, parts);
        let mut covered = 0u64;
        let mut prev_end: Option<u64> = None;
        for &(start, end) in &ranges {
          assert!(end >= start);
          if let Some(prev) = prev_end {
            assert_eq!(start, prev + 1, "ranges must be contiguous");
          }
          covered += end - start + 1;
          prev_end = Some(end);
        }
        assert_eq!(covered, size);
      }
    }
  }

  #[test]
  fn exactly_parts_ranges_when_size_at_least_parts() {
    for parts in 1usize..=12 {
      let ranges = compute_ranges(parts as u64 * 3, parts);
      assert_eq!(ranges.len(), parts);
    }
  }

  #[test]
  fn one_range_per_byte_when_size_below_parts() {
    for size in 0u64..8 {
      let ranges = compute_ranges(size, 10);
      assert_eq!(ranges.len(), size as usize);
    }
  }
}
