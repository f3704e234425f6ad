//! Restriction sets gating marker and category visibility.

use crate::error::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Conditions a client must satisfy to see a category or marker.
///
/// Every present condition must pass. A set with no conditions at all is
/// treated the same as no restrictions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RestrictionSet {
    /// Allowed roles. The client's role must be a member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<BTreeSet<String>>,

    /// Allowed sub-roles. Only checked when the client has a sub-role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_roles: Option<BTreeSet<String>>,

    /// Minimum rank required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rank: Option<i64>,
}

impl RestrictionSet {
    /// Creates an empty restriction set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts visibility to the given roles.
    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts visibility to the given sub-roles.
    #[must_use]
    pub fn with_sub_roles<I, S>(mut self, sub_roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_roles = Some(sub_roles.into_iter().map(Into::into).collect());
        self
    }

    /// Requires a minimum rank.
    #[must_use]
    pub const fn with_min_rank(mut self, rank: i64) -> Self {
        self.min_rank = Some(rank);
        self
    }

    /// Parses a restriction set from a JSON value.
    ///
    /// Non-string role entries and a non-numeric `minRank` are rejected.
    pub fn from_json(value: serde_json::Value) -> RegistryResult<Self> {
        let set: Self = serde_json::from_value(value)?;
        set.validate()?;
        Ok(set)
    }

    /// Returns true if no condition is present.
    pub fn is_empty(&self) -> bool {
        self.roles.is_none() && self.sub_roles.is_none() && self.min_rank.is_none()
    }

    /// Checks the structural constraints that deserialization cannot express.
    pub fn validate(&self) -> RegistryResult<()> {
        check_names("roles", self.roles.as_ref())?;
        check_names("subRoles", self.sub_roles.as_ref())
    }
}

fn check_names(field: &str, names: Option<&BTreeSet<String>>) -> RegistryResult<()> {
    match names {
        Some(names) if names.iter().any(|n| n.trim().is_empty()) => Err(RegistryError::invalid(
            format!("restrictions.{field} contains a blank name"),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn parse_full_set() {
        let set = RestrictionSet::from_json(json!({
            "roles": ["police", "sheriff"],
            "subRoles": ["swat"],
            "minRank": 2
        }))
        .unwrap();

        assert_eq!(set.roles.as_ref().map(|r| r.len()), Some(2));
        assert!(set.sub_roles.unwrap().contains("swat"));
        assert_eq!(set.min_rank, Some(2));
    }

    #[test]
    fn reject_non_string_roles() {
        let err = RestrictionSet::from_json(json!({ "roles": ["police", 4] })).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn reject_non_numeric_rank() {
        let err = RestrictionSet::from_json(json!({ "minRank": "high" })).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn reject_blank_names() {
        let set = RestrictionSet::new().with_sub_roles(["  "]);
        assert!(set.validate().is_err());
    }

    #[test]
    fn empty_set() {
        assert!(RestrictionSet::new().is_empty());
        assert!(!RestrictionSet::new().with_min_rank(0).is_empty());
    }

    #[test]
    fn serialize_skips_absent_conditions() {
        let value = serde_json::to_value(RestrictionSet::new().with_roles(["ambulance"])).unwrap();
        assert_eq!(value, json!({ "roles": ["ambulance"] }));
    }
}
