//! HTTP cached-response read path: cache-ref/policy selection, conditional
//! GET, byte-range serving, and request metrics for the edge node.

pub mod metrics;
pub mod model;
pub mod range;
pub mod reader;
pub mod request;
pub mod selector;
pub mod serve;

pub use model::{CachePolicy, CacheRef, CacheStatus, Conds, ExpiresTimeConfig, Predicate, RefOrigin};
pub use range::{generate_boundary, parse_range, ByteRange, NotSatisfiable};
pub use reader::{read_framed_headers, Reader, Storage};
pub use request::{PurgeNotifier, RequestContext, ResponseWriter};
pub use selector::{select_ref, RefSelection};
pub use serve::{serve, CacheOutcome};
