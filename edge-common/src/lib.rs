//! Shared error types, HTTP-date formatting, and config structs used across
//! the edge cache workspace (`edge-ttlcache`, `edge-filecache`, `edge-cache`,
//! `edge-waf`).

pub mod config;
pub mod date;
pub mod error;

pub use config::Settings;
pub use error::{CacheError, CacheResult};
