//! Request-rate limiting (the CC2 counter, spec.md §4.G) built on top of
//! `edge-ttlcache`.

mod cc2;

pub use cc2::{evaluate, Cc2Options, Cc2Outcome, Cc2Request};
