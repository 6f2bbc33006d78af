//! Request cache reader — the orchestrating state machine (spec.md §4.F).

use tracing::warn;

use edge_common::config::{CacheHeaderSettings, WebpSettings};
use edge_common::date::{format_gmt_two_digit_day, now_unix};
use edge_common::{CacheError, CacheResult};

use crate::model::{CachePolicy, CacheRef, CacheStatus};
use crate::range::{generate_boundary, parse_range};
use crate::reader::{read_framed_headers, Reader, Storage};
use crate::request::{PurgeNotifier, RequestContext, ResponseWriter};
use crate::selector::{select_ref, RefSelection};

const HEADER_BUF_SIZE: usize = 32 * 1024;

/// Result of a single [`serve`] call.
pub struct CacheOutcome {
    /// The request has been fully answered from cache (or deliberately
    /// terminated, e.g. 416/PURGE); the outer pipeline must not forward it
    /// to the origin.
    pub should_stop: bool,
    pub status: Option<CacheStatus>,
    /// Set on a storage miss when stale serving is enabled and this call
    /// was not itself already a stale attempt — the outer orchestrator may
    /// call `serve` again with `allow_stale = true`.
    pub can_try_stale: bool,
}

impl CacheOutcome {
    fn pass_through() -> Self {
        Self { should_stop: false, status: None, can_try_stale: false }
    }
}

fn is_loopback(remote_addr: &str) -> bool {
    remote_addr.starts_with("127.") || remote_addr == "::1" || remote_addr == "[::1]"
}

fn extension_of(path: &str) -> String {
    std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Runs the full §4.F read/serve flow for one request.
///
/// `storage` is the already-resolved backend for the policy id (step 5 —
/// resolution itself is an external collaborator, spec.md §6).
#[allow(clippy::too_many_arguments)]
pub fn serve(
    ctx: &dyn RequestContext,
    writer: &mut dyn ResponseWriter,
    policy: &CachePolicy,
    server_refs: &[CacheRef],
    storage: Option<&dyn Storage>,
    cache_settings: &CacheHeaderSettings,
    webp_settings: &WebpSettings,
    purge_notifier: Option<&dyn PurgeNotifier>,
    allow_stale: bool,
) -> CacheResult<CacheOutcome> {
    if !policy.enabled || (server_refs.is_empty() && policy.refs.is_empty()) {
        return Ok(CacheOutcome::pass_through());
    }

    // Step 1: preheat bypass.
    if is_loopback(ctx.remote_addr()) && ctx.header("X-Cache-Action") == Some("preheat") {
        return Ok(CacheOutcome::pass_through());
    }

    // Step 2: select ref.
    let (cache_ref, origin) = match select_ref(ctx, server_refs, &policy.refs) {
        RefSelection::Selected { cache_ref, origin } => (cache_ref, origin),
        RefSelection::DoNotCache | RefSelection::NoMatch => return Ok(CacheOutcome::pass_through()),
    };

    // Step 3: no-cache request honoring.
    if cache_ref.honor_request_no_cache
        && (ctx.header("Cache-Control") == Some("no-cache") || ctx.header("Pragma") == Some("no-cache"))
    {
        return Ok(CacheOutcome::pass_through());
    }

    // Step 4: key derivation.
    let key = ctx.format(&cache_ref.key_template);
    if key.is_empty() {
        return Ok(CacheOutcome::pass_through());
    }

    // Step 5: resolve storage.
    let Some(storage) = storage else { return Ok(CacheOutcome::pass_through()) };

    // Step 6: purge.
    if cache_settings.purge_is_on
        && ctx.method().eq_ignore_ascii_case("PURGE")
        && ctx.header("X-Edge-Purge-Key") == Some(cache_settings.purge_key.as_str())
    {
        if let Err(err) = storage.delete(&key) {
            warn!(%key, error = %err, "purge failed");
        }
        if let Some(notifier) = purge_notifier {
            notifier.notify(ctx.host(), &key);
        }
        return Ok(CacheOutcome { should_stop: true, status: Some(CacheStatus::Purge), can_try_stale: false });
    }

    // Step 7: WebP preference.
    let mut is_webp = false;
    let mut reader: Option<Box<dyn Reader>> = None;
    if webp_settings.is_on {
        let ext = extension_of(ctx.path());
        let ext_matches = webp_settings.ext_set.iter().any(|e| e.eq_ignore_ascii_case(&ext));
        let accept = ctx.header("Accept").unwrap_or("");
        let accept_matches = webp_settings.accept_set.iter().any(|a| accept.contains(a.as_str()));
        if ext_matches && accept_matches {
            let webp_key = format!("{key}{}", webp_settings.suffix);
            if let Ok(found) = storage.open_reader(&webp_key, allow_stale) {
                reader = Some(found);
                is_webp = true;
            }
        }
    }

    // Step 8: open the primary reader if WebP wasn't served.
    let mut reader = match reader {
        Some(reader) => reader,
        None => match storage.open_reader(&key, allow_stale) {
            Ok(reader) => reader,
            Err(CacheError::NotFound) => {
                if cache_settings.add_status_header {
                    writer.header_set("X-Cache", "MISS");
                }
                let can_try_stale = !allow_stale && cache_settings.stale_is_on;
                return Ok(CacheOutcome { should_stop: false, status: Some(CacheStatus::Miss), can_try_stale });
            }
            Err(err) => {
                // StorageIOError (spec.md §7): falls through to origin with no
                // cache status recorded, so no X-Cache write here either.
                if !err.is_ignorable() {
                    warn!(%key, error = %err, "read from cache failed: open cache failed");
                }
                return Ok(CacheOutcome::pass_through());
            }
        },
    };

    // Step 9: status classification.
    let status = if allow_stale { CacheStatus::Stale } else { CacheStatus::Hit };

    // Step 10: stream headers.
    let mut buf = vec![0u8; HEADER_BUF_SIZE];
    let headers = match read_framed_headers(reader.as_mut(), &mut buf) {
        Ok(headers) => headers,
        Err(err) => {
            if !err.is_ignorable() {
                warn!(%key, error = %err, "read from cache failed: read header failed");
            }
            if !writer.delay_read() {
                reader.close();
            }
            return Ok(CacheOutcome::pass_through());
        }
    };
    for (name, value) in &headers {
        writer.header_set(name, value);
    }

    // Step 11: age / X-Cache / Age headers.
    let now = now_unix();
    let age = (reader.expires_at() - now).max(0);
    if cache_settings.add_status_header {
        let label = match status {
            CacheStatus::Stale => "STALE",
            _ => "HIT",
        };
        writer.header_set("X-Cache", &format!("{label}, {}, {}", origin.as_str(), reader.type_name()));
    }
    if cache_settings.add_age_header {
        writer.header_set("Age", &age.to_string());
    }

    // Step 12: forced validators.
    let last_modified_at = reader.last_modified();
    let mut etag = String::new();
    let mut last_modified_str = String::new();
    if last_modified_at > 0 {
        etag = if is_webp { format!("\"{last_modified_at}_webp\"") } else { format!("\"{last_modified_at}\"") };
        writer.header_del("ETag");
        writer.header_set("ETag", &etag);

        last_modified_str = format_gmt_two_digit_day(last_modified_at);
        writer.header_set("Last-Modified", &last_modified_str);
    }

    // Step 13: conditional GET.
    if (!etag.is_empty() && ctx.header("If-None-Match") == Some(etag.as_str()))
        || (!last_modified_str.is_empty() && ctx.header("If-Modified-Since") == Some(last_modified_str.as_str()))
    {
        writer.write_header(304);
        writer.set_ok();
        if !writer.delay_read() {
            reader.close();
        }
        return Ok(CacheOutcome { should_stop: true, status: Some(status), can_try_stale: false });
    }

    // Step 14: Expires header.
    apply_expires_header(writer, cache_ref, reader.expires_at(), now);

    // Step 15: body.
    if ctx.method().eq_ignore_ascii_case("HEAD") {
        writer.write_header(reader.status());
        if !writer.delay_read() {
            reader.close();
        }
        return Ok(CacheOutcome { should_stop: true, status: Some(status), can_try_stale: false });
    }

    let range_supported = match ctx.header("If-Range") {
        None => true,
        Some(value) => value == etag || value == last_modified_str,
    };

    let body_size = reader.body_size();
    let range_header = range_supported.then(|| ctx.header("Range")).flatten();

    let outcome = match range_header {
        Some(range_header) => {
            if body_size == 0 {
                writer.write_header(416);
                if !writer.delay_read() {
                    reader.close();
                }
                return Ok(CacheOutcome { should_stop: true, status: Some(status), can_try_stale: false });
            }
            match parse_range(range_header, body_size) {
                Err(_) => {
                    writer.write_header(416);
                    if !writer.delay_read() {
                        reader.close();
                    }
                    return Ok(CacheOutcome { should_stop: true, status: Some(status), can_try_stale: false });
                }
                Ok(ranges) if ranges.len() == 1 => {
                    let (start, end) = ranges[0];
                    serve_single_range(writer, reader.as_mut(), &mut buf, start, end, body_size)
                }
                Ok(ranges) if ranges.len() > 1 => serve_multipart(writer, reader.as_mut(), &mut buf, &ranges, body_size),
                Ok(_) => serve_full_body(writer, reader.as_mut(), &mut buf),
            }
        }
        None => serve_full_body(writer, reader.as_mut(), &mut buf),
    };

    if !writer.delay_read() {
        reader.close();
    }
    Ok(CacheOutcome { should_stop: outcome.should_stop, status: outcome.status.or(Some(status)), can_try_stale: false })
}

fn apply_expires_header(writer: &mut dyn ResponseWriter, cache_ref: &CacheRef, expires_at: i64, now: i64) {
    let Some(expires) = &cache_ref.expires_time else { return };
    if !(expires.is_prior && expires.is_on) {
        return;
    }
    if !(expires.overwrite || writer.header_get("Expires").is_none()) {
        return;
    }
    let at = if expires.auto_calculate { expires_at } else { now + expires.duration_secs };
    writer.header_set("Expires", &edge_common::date::format_gmt_single_digit_day(at));
}

struct StreamOutcome {
    should_stop: bool,
    status: Option<CacheStatus>,
}

fn serve_full_body(writer: &mut dyn ResponseWriter, reader: &mut dyn Reader, buf: &mut [u8]) -> StreamOutcome {
    writer.write_header(reader.status());
    let result = reader.read_body_range(buf, 0, reader.body_size() - 1, &mut |chunk| match writer.write(chunk) {
        Ok(()) => Ok(true),
        Err(_) => Err(CacheError::ClientWrite),
    });
    match result {
        Ok(()) => StreamOutcome { should_stop: true, status: None },
        Err(err) => {
            if !err.is_ignorable() {
                warn!(error = %err, "read from cache failed: read body failed");
            }
            StreamOutcome { should_stop: true, status: Some(CacheStatus::Miss) }
        }
    }
}

/// Single range: 206 with `Content-Range`/`Content-Length`.
fn serve_single_range(
    writer: &mut dyn ResponseWriter,
    reader: &mut dyn Reader,
    buf: &mut [u8],
    start: i64,
    end: i64,
    body_size: i64,
) -> StreamOutcome {
    writer.header_set("Content-Range", &format!("bytes {start}-{end}/{body_size}"));
    writer.header_set("Content-Length", &(end - start + 1).to_string());
    writer.write_header(206);

    let result = reader.read_body_range(buf, start, end, &mut |chunk| match writer.write(chunk) {
        Ok(()) => Ok(true),
        Err(_) => Err(CacheError::ClientWrite),
    });
    match result {
        Ok(()) => StreamOutcome { should_stop: true, status: None },
        Err(err) => {
            if !err.is_ignorable() {
                warn!(error = %err, "read from cache failed: read body range failed");
            }
            StreamOutcome { should_stop: true, status: Some(CacheStatus::Miss) }
        }
    }
}

/// Multiple ranges: `multipart/byteranges`. The per-part `Content-Type` is
/// read back from the writer *after* it was told to set the multipart
/// type, so every part's `Content-Type:` line degenerates to the boundary
/// value rather than the object's real type. Preserved per spec.md §9.
fn serve_multipart(
    writer: &mut dyn ResponseWriter,
    reader: &mut dyn Reader,
    buf: &mut [u8],
    ranges: &[(i64, i64)],
    body_size: i64,
) -> StreamOutcome {
    let boundary = generate_boundary();
    writer.header_set("Content-Type", &format!("multipart/byteranges; boundary={boundary}"));
    writer.header_del("Content-Length");
    let content_type = writer.header_get("Content-Type").unwrap_or_default();
    writer.write_header(206);

    for (index, (start, end)) in ranges.iter().enumerate() {
        let preamble = if index == 0 { format!("--{boundary}\r\n") } else { format!("\r\n--{boundary}\r\n") };
        if writer.write_string(&preamble).is_err() {
            return StreamOutcome { should_stop: true, status: None };
        }
        if writer.write_string(&format!("Content-Range: bytes {start}-{end}/{body_size}\r\n")).is_err() {
            return StreamOutcome { should_stop: true, status: None };
        }
        if !content_type.is_empty() && writer.write_string(&format!("Content-Type: {content_type}\r\n\r\n")).is_err() {
            return StreamOutcome { should_stop: true, status: None };
        }

        let result = reader.read_body_range(buf, *start, *end, &mut |chunk| match writer.write(chunk) {
            Ok(()) => Ok(true),
            Err(_) => Err(CacheError::ClientWrite),
        });
        if let Err(err) = result {
            if !err.is_ignorable() {
                warn!(error = %err, "read from cache failed: read body range failed");
            }
            return StreamOutcome { should_stop: true, status: None };
        }
    }

    if writer.write_string(&format!("\r\n--{boundary}--\r\n")).is_err() {
        return StreamOutcome { should_stop: true, status: Some(CacheStatus::Miss) };
    }
    StreamOutcome { should_stop: true, status: None }
}
