//! Visibility predicate.
//!
//! Decides whether a client with a given [`RoleSnapshot`] may see an object
//! guarded by a [`RestrictionSet`]. The check is pure: no state and no I/O.
//!
//! Rules:
//! - no restrictions: visible to everyone
//! - restrictions but no snapshot: not visible
//! - `roles`: the client's role must be listed
//! - `sub_roles`: the client's sub-role must be listed, if it has one
//! - `min_rank`: the client's rank must be at least the threshold

use crate::restriction::RestrictionSet;
use crate::types::RoleSnapshot;

/// Returns true if a client with `snapshot` passes `restrictions`.
pub fn can_see(snapshot: Option<&RoleSnapshot>, restrictions: Option<&RestrictionSet>) -> bool {
    let restrictions = match restrictions {
        Some(r) if !r.is_empty() => r,
        _ => return true,
    };

    let snapshot = match snapshot {
        Some(s) => s,
        None => return false,
    };

    if let Some(roles) = &restrictions.roles {
        if !roles.contains(&snapshot.role) {
            return false;
        }
    }

    if let (Some(sub_roles), Some(sub_role)) = (&restrictions.sub_roles, &snapshot.sub_role) {
        if !sub_roles.contains(sub_role) {
            return false;
        }
    }

    if let Some(min_rank) = restrictions.min_rank {
        if snapshot.rank < min_rank {
            return false;
        }
    }

    true
}
