//! Cache-ref selector (spec.md §4.E).

use crate::model::{CacheRef, RefOrigin};
use crate::request::RequestContext;

/// Outcome of scanning a single ref group (server or policy refs).
enum GroupOutcome<'a> {
    NoMatch,
    /// A matching ref was found but it is `is_reverse`: stop selection
    /// entirely, the whole function returns "do not cache" (§4.E step 1).
    Reverse,
    Matched(&'a CacheRef),
}

fn scan_group<'a>(ctx: &dyn RequestContext, refs: &'a [CacheRef]) -> GroupOutcome<'a> {
    for cache_ref in refs {
        if !cache_ref.enabled {
            continue;
        }
        if !cache_ref.conds.matches(ctx) {
            continue;
        }
        if cache_ref.is_reverse {
            return GroupOutcome::Reverse;
        }
        return GroupOutcome::Matched(cache_ref);
    }
    GroupOutcome::NoMatch
}

/// Result of [`select_ref`].
pub enum RefSelection<'a> {
    Selected { cache_ref: &'a CacheRef, origin: RefOrigin },
    /// A matching ref opted out of caching via `is_reverse`.
    DoNotCache,
    /// No ref matched, or the matched ref failed revalidation.
    NoMatch,
}

/// Scans `server_refs` then `policy_refs` for the first enabled ref whose
/// conditions match the request, then revalidates the winner against the
/// raw request (spec.md §4.E).
pub fn select_ref<'a>(
    ctx: &dyn RequestContext,
    server_refs: &'a [CacheRef],
    policy_refs: &'a [CacheRef],
) -> RefSelection<'a> {
    let (cache_ref, origin) = match scan_group(ctx, server_refs) {
        GroupOutcome::Reverse => return RefSelection::DoNotCache,
        GroupOutcome::Matched(cache_ref) => (cache_ref, RefOrigin::Server),
        GroupOutcome::NoMatch => match scan_group(ctx, policy_refs) {
            GroupOutcome::Reverse => return RefSelection::DoNotCache,
            GroupOutcome::Matched(cache_ref) => (cache_ref, RefOrigin::Policy),
            GroupOutcome::NoMatch => return RefSelection::NoMatch,
        },
    };

    if !cache_ref.validate(ctx) {
        return RefSelection::NoMatch;
    }

    RefSelection::Selected { cache_ref, origin }
}
