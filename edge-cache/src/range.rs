//! `Range` header parsing and multipart boundary generation (spec.md §4.F).
//!
//! Neither of these has a helper in the retrieved reference pack — the
//! original calls `httpRequestParseContentRange`/`httpRequestGenBoundary`
//! but neither is present anywhere in `original_source/` — so both are
//! built directly from spec.md §4.F's prose and the literal vectors in §8.

use rand::Rng;

/// Inclusive `[start, end]` byte range, already resolved against an object
/// size (suffix ranges rewritten, open ends filled in, clamped to size-1).
pub type ByteRange = (i64, i64);

/// A `Range` header could not be satisfied against `size` — the caller
/// responds 416 and stops (spec.md §4.F "Range handling").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotSatisfiable;

/// Parses a `Range: bytes=...` header value into resolved, inclusive byte
/// ranges for an object of `size` bytes.
///
/// - `bytes=0-99` → `[[0, 99]]`.
/// - `bytes=-100` against `size=1000` → `[[900, 999]]` (suffix range).
/// - `bytes=500-` against `size=1000` → `[[500, 999]]` (open-ended).
/// - `bytes=5-2` → `Err(NotSatisfiable)` (start > end).
pub fn parse_range(header: &str, size: i64) -> Result<Vec<ByteRange>, NotSatisfiable> {
    let spec = header.strip_prefix("bytes=").ok_or(NotSatisfiable)?;
    let mut ranges = Vec::new();

    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(NotSatisfiable);
        }
        let (start_str, end_str) = part.split_once('-').ok_or(NotSatisfiable)?;

        let (start, mut end) = if start_str.is_empty() {
            // Suffix range: last `n` bytes.
            let n: i64 = end_str.parse().map_err(|_| NotSatisfiable)?;
            let start = size - n;
            if start < 0 {
                return Err(NotSatisfiable);
            }
            (start, size - 1)
        } else {
            let start: i64 = start_str.parse().map_err(|_| NotSatisfiable)?;
            let end = if end_str.is_empty() {
                size - 1
            } else {
                end_str.parse().map_err(|_| NotSatisfiable)?
            };
            (start, end)
        };

        if end < 0 || end >= size {
            end = size - 1;
        }
        if start > end {
            return Err(NotSatisfiable);
        }
        ranges.push((start, end));
    }

    Ok(ranges)
}

/// Generates a random multipart boundary for `Content-Type:
/// multipart/byteranges; boundary=<...>`.
pub fn generate_boundary() -> String {
    let mut rng = rand::thread_rng();
    (0..24).map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap()).collect()
}
