//! Registry statistics.

use crate::types::MarkerId;
use serde::Serialize;
use std::collections::BTreeMap;

/// Point-in-time counts of the registry contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    /// Number of categories.
    pub total_categories: usize,
    /// Number of enabled categories.
    pub enabled_categories: usize,
    /// Number of markers.
    pub total_markers: usize,
    /// Number of markers with their own flag enabled.
    pub enabled_markers: usize,
    /// Markers without a category.
    pub uncategorized_markers: usize,
    /// Member count per category id.
    pub markers_per_category: BTreeMap<String, usize>,
    /// Id the next marker will receive.
    pub next_marker_id: MarkerId,
}
