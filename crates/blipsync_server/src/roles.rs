//! Role-oriented marker helpers.
//!
//! Each known role owns two categories: a restricted one (`<role>`) whose
//! markers only members of the role can see, and a public one
//! (`<role>_public`) for markers everybody sees, such as a police station.
//! Categories are created on first use.

use crate::error::{ServerError, ServerResult};
use crate::identity::IdentityProvider;
use crate::server::{BlipServer, SyncState};
use crate::transport::EventTransport;
use blipsync_core::{CategoryData, Marker, MarkerData, MarkerId, RestrictionSet};
use std::collections::BTreeMap;
use tracing::info;

/// Static description of a role's categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleProfile {
    /// Role name as reported by the identity provider.
    pub role: &'static str,
    /// Label of the role's categories.
    pub label: &'static str,
    /// Sprite used when a role marker does not specify one.
    pub default_sprite: u32,
    /// Color used when a role marker does not specify one.
    pub default_color: u32,
}

impl RoleProfile {
    /// Id of the restricted category.
    pub fn category_id(&self) -> String {
        self.role.to_string()
    }

    /// Id of the public category.
    pub fn public_category_id(&self) -> String {
        format!("{}_public", self.role)
    }

    fn restrictions(&self) -> RestrictionSet {
        RestrictionSet::new().with_roles([self.role])
    }
}

const ROLE_PROFILES: &[RoleProfile] = &[
    RoleProfile { role: "police", label: "Police", default_sprite: 60, default_color: 29 },
    RoleProfile { role: "ambulance", label: "EMS", default_sprite: 61, default_color: 1 },
    RoleProfile { role: "mechanic", label: "Mechanic", default_sprite: 446, default_color: 47 },
    RoleProfile { role: "taxi", label: "Taxi", default_sprite: 198, default_color: 5 },
    RoleProfile { role: "realestate", label: "Real Estate", default_sprite: 374, default_color: 2 },
];

/// Returns the profile of a role.
pub fn role_profile(role: &str) -> Option<&'static RoleProfile> {
    ROLE_PROFILES.iter().find(|p| p.role == role)
}

/// Returns every known role profile.
pub fn role_profiles() -> &'static [RoleProfile] {
    ROLE_PROFILES
}

/// Outcome of one item of [`BlipServer::add_role_markers`].
#[derive(Debug, Clone, PartialEq)]
pub struct RoleMarkerResult {
    /// Role the item was filed under.
    pub role: String,
    /// Position of the item within its role's list.
    pub index: usize,
    /// The new marker id, or why the item was rejected.
    pub outcome: ServerResult<MarkerId>,
}

impl RoleMarkerResult {
    /// Returns true if the marker was added.
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

fn lookup(role: &str) -> ServerResult<&'static RoleProfile> {
    role_profile(role).ok_or_else(|| ServerError::UnknownRole(role.to_string()))
}

impl<T: EventTransport, I: IdentityProvider> BlipServer<T, I> {
    /// Adds a marker only members of `role` can see.
    ///
    /// The marker is placed in the role's restricted category and its
    /// `roles` restriction is set to the role. Sub-role and rank conditions
    /// supplied in `data` are kept.
    pub fn add_role_marker(&self, role: &str, data: MarkerData) -> ServerResult<MarkerId> {
        let profile = lookup(role)?;
        self.with_state(|state| self.add_role_marker_locked(state, profile, data))
    }

    /// Adds a marker filed under `role` that everyone can see.
    pub fn add_public_role_marker(&self, role: &str, data: MarkerData) -> ServerResult<MarkerId> {
        let profile = lookup(role)?;
        self.with_state(|state| self.add_public_role_marker_locked(state, profile, data))
    }

    /// Adds restricted role markers in bulk.
    ///
    /// Every item is attempted; a failure is recorded in its result and
    /// does not stop the remaining items.
    pub fn add_role_markers(
        &self,
        batches: BTreeMap<String, Vec<MarkerData>>,
    ) -> Vec<RoleMarkerResult> {
        let mut results = Vec::new();
        for (role, items) in batches {
            for (index, data) in items.into_iter().enumerate() {
                results.push(RoleMarkerResult {
                    role: role.clone(),
                    index,
                    outcome: self.add_role_marker(&role, data),
                });
            }
        }
        let failed = results.iter().filter(|r| !r.is_ok()).count();
        info!(total = results.len(), failed, "role markers added");
        results
    }

    /// Removes every marker in both of a role's categories. Returns the count.
    pub fn remove_role_markers(&self, role: &str) -> ServerResult<usize> {
        let profile = lookup(role)?;
        self.with_state(|state| {
            let ids: Vec<MarkerId> = [profile.category_id(), profile.public_category_id()]
                .iter()
                .flat_map(|c| state.registry.markers_by_category(c))
                .map(|m| m.id)
                .collect();
            for id in &ids {
                self.remove_marker_locked(state, *id)?;
            }
            Ok(ids.len())
        })
    }

    /// Returns the markers in both of a role's categories, ordered by id.
    pub fn role_markers(&self, role: &str) -> ServerResult<Vec<Marker>> {
        let profile = lookup(role)?;
        let category_ids = [profile.category_id(), profile.public_category_id()];
        Ok(self
            .markers()
            .into_iter()
            .filter(|m| {
                m.category_id
                    .as_ref()
                    .is_some_and(|c| category_ids.contains(c))
            })
            .collect())
    }

    fn add_role_marker_locked(
        &self,
        state: &mut SyncState,
        profile: &RoleProfile,
        mut data: MarkerData,
    ) -> ServerResult<MarkerId> {
        let category_id = profile.category_id();
        if state.registry.category(&category_id).is_none() {
            let category = CategoryData::new(profile.label)
                .with_description(format!("{} only", profile.label))
                .with_restrictions(profile.restrictions());
            self.create_category_locked(state, &category_id, category)?;
        }

        let restrictions = data.restrictions.take().unwrap_or_default();
        data.restrictions = Some(RestrictionSet {
            roles: profile.restrictions().roles,
            ..restrictions
        });
        data.category_id = Some(category_id);
        self.add_marker_locked(state, with_defaults(profile, data))
    }

    fn add_public_role_marker_locked(
        &self,
        state: &mut SyncState,
        profile: &RoleProfile,
        mut data: MarkerData,
    ) -> ServerResult<MarkerId> {
        let category_id = profile.public_category_id();
        if state.registry.category(&category_id).is_none() {
            let category = CategoryData::new(profile.label)
                .with_description(format!("Public {} locations", profile.label));
            self.create_category_locked(state, &category_id, category)?;
        }

        data.restrictions = None;
        data.category_id = Some(category_id);
        self.add_marker_locked(state, with_defaults(profile, data))
    }
}

fn with_defaults(profile: &RoleProfile, mut data: MarkerData) -> MarkerData {
    data.sprite.get_or_insert(profile.default_sprite);
    data.color.get_or_insert(profile.default_color);
    data
}
