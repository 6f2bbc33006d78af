//! Storage reader interface (spec.md §4.D) and header-framing helper.
//!
//! The callback shape differs slightly from the original: instead of
//! `callback(n int)` closing over a buffer declared in the caller's scope,
//! [`Reader::read_header`]/[`Reader::read_body_range`] hand the callback the
//! filled slice directly. Same information, without the double-borrow a
//! `(buf, n)` pair would need in Rust.

use edge_common::{CacheError, CacheResult};

/// An open handle over a cached object's metadata, headers, and body.
pub trait Reader: Send {
    fn status(&self) -> u16;
    fn body_size(&self) -> i64;
    fn expires_at(&self) -> i64;
    fn last_modified(&self) -> i64;
    fn type_name(&self) -> &str;

    /// Streams the raw header bytes, invoking `on_chunk` with each filled
    /// slice of `buf` until headers are fully consumed. `on_chunk` returns
    /// `Ok(false)` to stop early.
    fn read_header(
        &mut self,
        buf: &mut [u8],
        on_chunk: &mut dyn FnMut(&[u8]) -> CacheResult<bool>,
    ) -> CacheResult<()>;

    /// Streams `[start, end]` (inclusive) of the body.
    fn read_body_range(
        &mut self,
        buf: &mut [u8],
        start: i64,
        end_inclusive: i64,
        on_chunk: &mut dyn FnMut(&[u8]) -> CacheResult<bool>,
    ) -> CacheResult<()>;

    fn close(&mut self);
}

/// Backing store consulted by the request cache reader (spec.md §4.D).
pub trait Storage: Send + Sync {
    /// `Err(CacheError::NotFound)` is the expected miss path.
    fn open_reader(&self, key: &str, allow_stale: bool) -> CacheResult<Box<dyn Reader>>;
    fn delete(&self, key: &str) -> CacheResult<()>;
}

/// Drives [`Reader::read_header`] and parses the `name:value\n` framing
/// (spec.md §9: no space after the colon, trailing whitespace preserved).
///
/// A line with no `:` before the terminator is a reader error.
pub fn read_framed_headers(reader: &mut dyn Reader, buf: &mut [u8]) -> CacheResult<Vec<(String, String)>> {
    let mut headers = Vec::new();
    let mut pending: Vec<u8> = Vec::new();
    let mut parse_err: Option<CacheError> = None;

    reader.read_header(buf, &mut |chunk| {
        pending.extend_from_slice(chunk);
        while let Some(nl) = pending.iter().position(|&b| b == b'\n') {
            let row = pending[..nl].to_vec();
            pending.drain(..=nl);

            let colon = row.iter().position(|&b| b == b':');
            match colon {
                Some(idx) if idx > 0 => {
                    let name = String::from_utf8_lossy(&row[..idx]).into_owned();
                    let value = String::from_utf8_lossy(&row[idx + 1..]).into_owned();
                    headers.push((name, value));
                }
                _ => {
                    parse_err = Some(CacheError::MalformedHeader(String::from_utf8_lossy(&row).into_owned()));
                    return Ok(false);
                }
            }
        }
        Ok(true)
    })?;

    if let Some(err) = parse_err {
        return Err(err);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeReader {
        chunks: Vec<&'static [u8]>,
    }

    impl Reader for FakeReader {
        fn status(&self) -> u16 {
            200
        }
        fn body_size(&self) -> i64 {
            0
        }
        fn expires_at(&self) -> i64 {
            0
        }
        fn last_modified(&self) -> i64 {
            0
        }
        fn type_name(&self) -> &str {
            "memory"
        }

        fn read_header(
            &mut self,
            _buf: &mut [u8],
            on_chunk: &mut dyn FnMut(&[u8]) -> CacheResult<bool>,
        ) -> CacheResult<()> {
            for chunk in self.chunks.drain(..) {
                if !on_chunk(chunk)? {
                    break;
                }
            }
            Ok(())
        }

        fn read_body_range(
            &mut self,
            _buf: &mut [u8],
            _start: i64,
            _end_inclusive: i64,
            _on_chunk: &mut dyn FnMut(&[u8]) -> CacheResult<bool>,
        ) -> CacheResult<()> {
            Ok(())
        }

        fn close(&mut self) {}
    }

    #[test]
    fn parses_headers_split_across_chunks() {
        let mut reader = FakeReader { chunks: vec![b"Content-Typ", b"e:text/plain\nX-Cach", b"e:HIT\n"] };
        let mut buf = [0u8; 16];
        let headers = read_framed_headers(&mut reader, &mut buf).unwrap();
        assert_eq!(
            headers,
            vec![
                ("Content-Type".to_string(), "text/plain".to_string()),
                ("X-Cache".to_string(), "HIT".to_string()),
            ]
        );
    }

    #[test]
    fn rejects_a_line_with_no_colon() {
        let mut reader = FakeReader { chunks: vec![b"not-a-header-line\n"] };
        let mut buf = [0u8; 32];
        let err = read_framed_headers(&mut reader, &mut buf).unwrap_err();
        assert!(matches!(err, CacheError::MalformedHeader(_)));
    }

    #[test]
    fn rejects_a_line_starting_with_a_colon() {
        let mut reader = FakeReader { chunks: vec![b":value\n"] };
        let mut buf = [0u8; 32];
        let err = read_framed_headers(&mut reader, &mut buf).unwrap_err();
        assert!(matches!(err, CacheError::MalformedHeader(_)));
    }
}
