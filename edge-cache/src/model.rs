//! Cache-ref / cache-policy data model (spec.md §3).
//!
//! `Conds` and the request-revalidation check are modeled as predicates
//! rather than a parsed condition tree: the rule language itself (how a
//! condition set is built from config) is out of scope (§1), so a ref only
//! needs *something callable* against a request at match time.

use std::sync::Arc;

use crate::request::RequestContext;

/// A predicate over an incoming request, used for both `Conds` matching and
/// post-selection revalidation.
pub type Predicate = Arc<dyn Fn(&dyn RequestContext) -> bool + Send + Sync>;

/// The condition set attached to a [`CacheRef`].
#[derive(Clone)]
pub struct Conds {
    /// Whether this condition set includes any request-level condition at
    /// all. A ref whose conds are empty never matches (§4.E step 1).
    pub has_request_conds: bool,
    pub matcher: Predicate,
}

impl Conds {
    pub fn new(matcher: Predicate) -> Self {
        Self { has_request_conds: true, matcher }
    }

    pub fn matches(&self, ctx: &dyn RequestContext) -> bool {
        self.has_request_conds && (self.matcher)(ctx)
    }
}

/// `cache_ref.expires_time.*` policy (spec.md §6).
#[derive(Debug, Clone)]
pub struct ExpiresTimeConfig {
    pub is_prior: bool,
    pub is_on: bool,
    pub overwrite: bool,
    pub auto_calculate: bool,
    pub duration_secs: i64,
}

impl From<&edge_common::config::ExpiresTimeSettings> for ExpiresTimeConfig {
    fn from(settings: &edge_common::config::ExpiresTimeSettings) -> Self {
        Self {
            is_prior: settings.is_prior,
            is_on: settings.is_on,
            overwrite: settings.overwrite,
            auto_calculate: settings.auto_calculate,
            duration_secs: settings.duration_secs as i64,
        }
    }
}

/// One rule describing a class of cacheable requests (spec.md §3).
pub struct CacheRef {
    pub enabled: bool,
    pub conds: Conds,
    /// Inverts the match into "never cache" (§4.E step 1).
    pub is_reverse: bool,
    pub key_template: String,
    pub honor_request_no_cache: bool,
    pub expires_time: Option<ExpiresTimeConfig>,
    pub is_stale_allowed: bool,
    /// Post-selection revalidation (§4.E step 4). Defaults to "always
    /// passes" when a ref has no extra method/header whitelist.
    pub revalidate: Predicate,
}

impl CacheRef {
    pub fn new(key_template: impl Into<String>, matcher: Predicate) -> Self {
        Self {
            enabled: true,
            conds: Conds::new(matcher),
            is_reverse: false,
            key_template: key_template.into(),
            honor_request_no_cache: false,
            expires_time: None,
            is_stale_allowed: false,
            revalidate: Arc::new(|_| true),
        }
    }

    pub fn validate(&self, ctx: &dyn RequestContext) -> bool {
        (self.revalidate)(ctx)
    }
}

/// A collection of default refs used when no server-level ref matches
/// (spec.md §3).
pub struct CachePolicy {
    pub id: i64,
    pub name: String,
    pub policy_type: String,
    pub refs: Vec<CacheRef>,
    pub enabled: bool,
}

/// Where a selected [`CacheRef`] came from — reflected in the `X-Cache`
/// status header (§4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefOrigin {
    Server,
    Policy,
}

impl RefOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefOrigin::Server => "server",
            RefOrigin::Policy => "policy",
        }
    }
}

/// `cache.status` values recorded for a request (§4.F, §8 literal scenarios).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Miss,
    Hit,
    Stale,
    Purge,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Miss => "MISS",
            CacheStatus::Hit => "HIT",
            CacheStatus::Stale => "STALE",
            CacheStatus::Purge => "PURGE",
        }
    }
}
