//! Categories group markers under a shared enable switch.

use crate::restriction::RestrictionSet;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

/// A named group of markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Unique key.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Free-form description.
    pub description: String,
    /// Visibility restrictions for the category itself.
    pub restrictions: Option<RestrictionSet>,
    /// Whether the category and its markers are shown.
    pub enabled: bool,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Option<Timestamp>,
    /// Number of live markers referencing this category.
    pub member_count: usize,
}

/// Input for creating a category.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryData {
    /// Display label. Required, non-empty after trimming.
    #[serde(default)]
    pub label: Option<String>,
    /// Description. Defaults to empty.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional restrictions.
    #[serde(default)]
    pub restrictions: Option<RestrictionSet>,
    /// Initial enabled flag. Defaults to `true`.
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl CategoryData {
    /// Creates category input with the given label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the restrictions.
    #[must_use]
    pub fn with_restrictions(mut self, restrictions: RestrictionSet) -> Self {
        self.restrictions = Some(restrictions);
        self
    }

    /// Sets the initial enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }
}
