//! External request/response/RPC collaborator interfaces (spec.md §6).
//!
//! These are consumed, never implemented, by this crate: request parsing,
//! response writing, and control-plane RPC are all out of scope (§1).

use edge_common::CacheResult;

/// Read-only view of the incoming request, plus the variable formatter.
pub trait RequestContext {
    fn method(&self) -> &str;
    fn path(&self) -> &str;
    fn remote_addr(&self) -> &str;
    fn host(&self) -> &str;
    fn header(&self, name: &str) -> Option<&str>;
    /// Expands a key template (e.g. `"${host}${path}"`) against the
    /// request's variables. Out of scope to implement (§1); this crate only
    /// calls it.
    fn format(&self, template: &str) -> String;
    /// Opaque client fingerprint for CC2 secondary counting (§4.G).
    fn fingerprint(&self) -> &[u8];
    /// HTTP Basic Auth username, if the request carries one
    /// (`request_remote_user.go`'s `BasicAuth()`).
    fn basic_auth_user(&self) -> Option<&str>;
}

/// Response sink the request cache reader streams headers/body into.
pub trait ResponseWriter {
    fn header_set(&mut self, name: &str, value: &str);
    fn header_get(&self, name: &str) -> Option<String>;
    fn header_del(&mut self, name: &str);
    fn write_header(&mut self, status: u16);
    fn write(&mut self, bytes: &[u8]) -> CacheResult<()>;
    fn write_string(&mut self, s: &str) -> CacheResult<()>;
    fn set_ok(&mut self);
    /// True if the writer wants to take ownership of the open reader and
    /// close it itself on finalization, rather than have the caller close
    /// it before returning (spec.md §9 "no coroutine chains").
    fn delay_read(&self) -> bool {
        false
    }
}

/// Fire-and-forget fan-out to every known control-plane RPC endpoint
/// (spec.md §4.F step 6, §6 purge protocol).
pub trait PurgeNotifier {
    fn notify(&self, domain: &str, key: &str);
}
