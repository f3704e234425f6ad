//! Authoritative store of categories and markers.
//!
//! The registry enforces the structural invariants of the data model:
//! - a marker's `category_id` always names a live category
//! - every category's `member_count` equals the number of markers in it
//! - marker ids come from a strictly increasing counter and are never reused
//!
//! It knows nothing about clients. Callers that track per-client views are
//! handed back whatever was removed so they can clean up and notify.

use crate::category::{Category, CategoryData};
use crate::config::Config;
use crate::error::{RegistryError, RegistryResult};
use crate::marker::{Marker, MarkerData, MarkerUpdate};
use crate::stats::RegistryStats;
use crate::types::{now_millis, MarkerId};
use std::collections::BTreeMap;
use tracing::debug;

/// A category removed together with its members.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedCategory {
    /// The removed category.
    pub category: Category,
    /// Member markers, in the order they were removed.
    pub markers: Vec<Marker>,
}

/// In-memory registry of categories and markers.
#[derive(Debug)]
pub struct Registry {
    config: Config,
    categories: BTreeMap<String, Category>,
    markers: BTreeMap<MarkerId, Marker>,
    next_marker_id: MarkerId,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            categories: BTreeMap::new(),
            markers: BTreeMap::new(),
            next_marker_id: 1,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates a category.
    ///
    /// Ids are stored exactly as given and looked up verbatim, so an id with
    /// surrounding whitespace is rejected rather than trimmed.
    pub fn create_category(&mut self, id: &str, data: CategoryData) -> RegistryResult<Category> {
        if id.trim().is_empty() {
            return Err(RegistryError::invalid("category id must be a non-empty string"));
        }
        if id.trim() != id {
            return Err(RegistryError::invalid(
                "category id must not have surrounding whitespace",
            ));
        }
        if self.categories.contains_key(id) {
            return Err(RegistryError::DuplicateCategory { id: id.to_string() });
        }
        if self.categories.len() >= self.config.max_categories {
            return Err(RegistryError::CategoryLimitReached {
                max: self.config.max_categories,
            });
        }
        let label = match data.label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => return Err(RegistryError::invalid("category label must be a non-empty string")),
        };
        if let Some(restrictions) = &data.restrictions {
            restrictions.validate()?;
        }

        let category = Category {
            id: id.to_string(),
            label,
            description: data.description.unwrap_or_default(),
            restrictions: data.restrictions,
            enabled: data.enabled.unwrap_or(true),
            created_at: now_millis(),
            updated_at: None,
            member_count: 0,
        };
        self.categories.insert(category.id.clone(), category.clone());
        debug!(category = %category.id, "category created");
        Ok(category)
    }

    /// Removes a category after removing every marker in it.
    pub fn remove_category(&mut self, id: &str) -> RegistryResult<RemovedCategory> {
        if !self.categories.contains_key(id) {
            return Err(RegistryError::CategoryNotFound { id: id.to_string() });
        }

        let member_ids: Vec<MarkerId> = self.markers_by_category(id).iter().map(|m| m.id).collect();
        let mut markers = Vec::with_capacity(member_ids.len());
        for marker_id in member_ids {
            markers.push(self.remove_marker(marker_id)?);
        }

        let category = self
            .categories
            .remove(id)
            .ok_or_else(|| RegistryError::CategoryNotFound { id: id.to_string() })?;
        debug!(category = %id, removed = markers.len(), "category removed");
        Ok(RemovedCategory { category, markers })
    }

    /// Adds a marker and returns its id.
    ///
    /// Fields are validated before the category is checked.
    pub fn add_marker(&mut self, data: MarkerData) -> RegistryResult<MarkerId> {
        let id = self.next_marker_id;
        let marker = data.into_marker(id, now_millis())?;
        if let Some(category_id) = &marker.category_id {
            self.check_room(category_id)?;
        }
        self.next_marker_id += 1;

        if let Some(category) = marker
            .category_id
            .as_ref()
            .and_then(|c| self.categories.get_mut(c))
        {
            category.member_count += 1;
        }
        self.markers.insert(id, marker);
        Ok(id)
    }

    /// Removes a marker and returns it.
    pub fn remove_marker(&mut self, id: MarkerId) -> RegistryResult<Marker> {
        let marker = self
            .markers
            .remove(&id)
            .ok_or(RegistryError::MarkerNotFound { id })?;
        if let Some(category_id) = &marker.category_id {
            self.release_slot(category_id);
        }
        Ok(marker)
    }

    /// Applies a partial update to a marker.
    ///
    /// Moving a marker to another category checks that the target exists and
    /// has room, and moves the membership count with it.
    pub fn update_marker(&mut self, id: MarkerId, mut update: MarkerUpdate) -> RegistryResult<()> {
        let current = self
            .markers
            .get(&id)
            .ok_or(RegistryError::MarkerNotFound { id })?
            .category_id
            .clone();
        update.validate()?;

        let target = update.category_id.take().filter(|target| *target != current);
        if let Some(Some(target_id)) = &target {
            self.check_room(target_id)?;
        }

        let now = now_millis();
        if let Some(target) = target {
            if let Some(old) = &current {
                self.release_slot(old);
            }
            if let Some(category) = target.as_ref().and_then(|t| self.categories.get_mut(t)) {
                category.member_count += 1;
            }
            if let Some(marker) = self.markers.get_mut(&id) {
                marker.category_id = target;
            }
        }

        let marker = self
            .markers
            .get_mut(&id)
            .ok_or(RegistryError::MarkerNotFound { id })?;
        update.apply_to(marker, now);
        Ok(())
    }

    /// Sets a category's enabled flag.
    pub fn set_category_enabled(&mut self, id: &str, enabled: bool) -> RegistryResult<()> {
        let category = self
            .categories
            .get_mut(id)
            .ok_or_else(|| RegistryError::CategoryNotFound { id: id.to_string() })?;
        category.enabled = enabled;
        category.updated_at = Some(now_millis());
        Ok(())
    }

    /// Sets a marker's enabled flag.
    pub fn set_marker_enabled(&mut self, id: MarkerId, enabled: bool) -> RegistryResult<()> {
        let marker = self
            .markers
            .get_mut(&id)
            .ok_or(RegistryError::MarkerNotFound { id })?;
        marker.enabled = enabled;
        marker.updated_at = Some(now_millis());
        Ok(())
    }

    /// Removes every category and marker.
    ///
    /// The id counter keeps counting so ids stay unique for the lifetime of
    /// the registry.
    pub fn clear_all(&mut self) {
        self.categories.clear();
        self.markers.clear();
    }

    /// Returns a category by id.
    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.get(id)
    }

    /// Returns every category, ordered by id.
    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    /// Returns a marker by id.
    pub fn marker(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.get(&id)
    }

    /// Returns every marker, ordered by id.
    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    /// Returns the markers of a category, ordered by id.
    pub fn markers_by_category(&self, id: &str) -> Vec<&Marker> {
        self.markers
            .values()
            .filter(|m| m.category_id.as_deref() == Some(id))
            .collect()
    }

    /// Returns true if the marker and its category (if any) are enabled.
    ///
    /// A marker failing this check is hidden from everyone regardless of
    /// restrictions.
    pub fn is_effectively_enabled(&self, marker: &Marker) -> bool {
        marker.enabled
            && marker
                .category_id
                .as_ref()
                .map_or(true, |c| self.categories.get(c).is_some_and(|c| c.enabled))
    }

    /// Returns current counts.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            total_categories: self.categories.len(),
            enabled_categories: self.categories.values().filter(|c| c.enabled).count(),
            total_markers: self.markers.len(),
            enabled_markers: self.markers.values().filter(|m| m.enabled).count(),
            uncategorized_markers: self
                .markers
                .values()
                .filter(|m| m.category_id.is_none())
                .count(),
            markers_per_category: self
                .categories
                .values()
                .map(|c| (c.id.clone(), c.member_count))
                .collect(),
            next_marker_id: self.next_marker_id,
        }
    }

    fn check_room(&self, category_id: &str) -> RegistryResult<()> {
        let category = self
            .categories
            .get(category_id)
            .ok_or_else(|| RegistryError::CategoryNotFound {
                id: category_id.to_string(),
            })?;
        if category.member_count >= self.config.max_markers_per_category {
            return Err(RegistryError::CategoryFull {
                id: category_id.to_string(),
                max: self.config.max_markers_per_category,
            });
        }
        Ok(())
    }

    fn release_slot(&mut self, category_id: &str) {
        if let Some(category) = self.categories.get_mut(category_id) {
            category.member_count = category.member_count.saturating_sub(1);
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::restriction::RestrictionSet;
    use crate::types::Coords;

    fn marker(label: &str) -> MarkerData {
        MarkerData::new(Coords::new(100.0, -200.0, 30.0), 61, 1, label)
    }

    fn registry_with_ems() -> Registry {
        let mut registry = Registry::default();
        registry
            .create_category("ems", CategoryData::new("EMS"))
            .unwrap();
        registry
    }

    /// Asserts the member-count and no-dangling-category invariants.
    fn assert_consistent(registry: &Registry) {
        for marker in registry.markers() {
            if let Some(category_id) = &marker.category_id {
                assert!(registry.category(category_id).is_some());
            }
        }
        for category in registry.categories() {
            assert_eq!(
                category.member_count,
                registry.markers_by_category(&category.id).len()
            );
        }
    }

    #[test]
    fn create_category_defaults() {
        let registry = registry_with_ems();
        let category = registry.category("ems").unwrap();
        assert!(category.enabled);
        assert_eq!(category.member_count, 0);
        assert_eq!(category.description, "");
    }

    #[test]
    fn create_category_disabled() {
        let mut registry = Registry::default();
        let category = registry
            .create_category("hidden", CategoryData::new("Hidden").with_enabled(false))
            .unwrap();
        assert!(!category.enabled);
    }

    #[test]
    fn create_category_errors() {
        let mut registry = registry_with_ems();

        let err = registry
            .create_category("ems", CategoryData::new("Again"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateKey);

        let err = registry
            .create_category("  ", CategoryData::new("Blank"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = registry
            .create_category("police", CategoryData::new(" "))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = registry
            .create_category(
                "police",
                CategoryData::new("Police").with_restrictions(RestrictionSet::new().with_roles([""])),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(registry.category("police").is_none());
    }

    #[test]
    fn category_ids_are_not_trimmed() {
        let mut registry = registry_with_ems();
        let err = registry
            .create_category(" police ", CategoryData::new("Police"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(registry.categories().count(), 1);

        assert_eq!(
            registry.remove_category(" ems ").unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(registry.category("ems").is_some());
    }

    #[test]
    fn category_limit() {
        let mut registry = Registry::new(Config::new().with_max_categories(1));
        registry
            .create_category("one", CategoryData::new("One"))
            .unwrap();
        let err = registry
            .create_category("two", CategoryData::new("Two"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
    }

    #[test]
    fn add_marker_counts_membership() {
        let mut registry = registry_with_ems();
        let a = registry.add_marker(marker("A").in_category("ems")).unwrap();
        let b = registry.add_marker(marker("B").in_category("ems")).unwrap();
        registry.add_marker(marker("C")).unwrap();

        assert!(b > a);
        assert_eq!(registry.category("ems").unwrap().member_count, 2);
        assert_eq!(registry.stats().uncategorized_markers, 1);
        assert_consistent(&registry);
    }

    #[test]
    fn add_marker_unknown_category() {
        let mut registry = Registry::default();
        let err = registry
            .add_marker(marker("A").in_category("nope"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn add_marker_invalid_leaves_registry_unchanged() {
        let mut registry = registry_with_ems();
        let mut data = marker("A").in_category("ems");
        data.label = None;

        let before = registry.stats();
        assert_eq!(
            registry.add_marker(data).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(registry.stats(), before);
    }

    #[test]
    fn field_errors_take_precedence_over_category_errors() {
        let mut registry = Registry::default();
        let mut data = marker("A").in_category("nope");
        data.label = None;
        assert_eq!(
            registry.add_marker(data).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );

        let err = registry
            .update_marker(42, MarkerUpdate::new().label(""))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(registry.stats().next_marker_id, 1);
    }

    #[test]
    fn per_category_limit() {
        let mut registry = Registry::new(Config::new().with_max_markers_per_category(1));
        registry
            .create_category("ems", CategoryData::new("EMS"))
            .unwrap();
        registry.add_marker(marker("A").in_category("ems")).unwrap();
        let err = registry
            .add_marker(marker("B").in_category("ems"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
        assert_eq!(registry.category("ems").unwrap().member_count, 1);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut registry = Registry::default();
        let first = registry.add_marker(marker("A")).unwrap();
        registry.remove_marker(first).unwrap();
        let second = registry.add_marker(marker("B")).unwrap();
        assert!(second > first);

        registry.clear_all();
        let third = registry.add_marker(marker("C")).unwrap();
        assert!(third > second);
    }

    #[test]
    fn remove_marker_releases_slot() {
        let mut registry = registry_with_ems();
        let id = registry.add_marker(marker("A").in_category("ems")).unwrap();
        let removed = registry.remove_marker(id).unwrap();
        assert_eq!(removed.id, id);
        assert_eq!(registry.category("ems").unwrap().member_count, 0);

        let err = registry.remove_marker(id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn remove_category_cascades() {
        let mut registry = registry_with_ems();
        let a = registry.add_marker(marker("A").in_category("ems")).unwrap();
        let b = registry.add_marker(marker("B").in_category("ems")).unwrap();
        let other = registry.add_marker(marker("C")).unwrap();

        let removed = registry.remove_category("ems").unwrap();
        let ids: Vec<_> = removed.markers.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![a, b]);
        assert!(registry.category("ems").is_none());
        assert!(registry.markers_by_category("ems").is_empty());
        assert!(registry.marker(other).is_some());

        let err = registry.remove_category("ems").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn update_marker_fields() {
        let mut registry = registry_with_ems();
        let id = registry.add_marker(marker("A")).unwrap();
        let created_at = registry.marker(id).unwrap().created_at;

        registry
            .update_marker(id, MarkerUpdate::new().label("Renamed"))
            .unwrap();
        let updated = registry.marker(id).unwrap();
        assert_eq!(updated.label, "Renamed");
        assert_eq!(updated.created_at, created_at);
        assert!(updated.updated_at.is_some());

        let err = registry
            .update_marker(99, MarkerUpdate::new().label("x"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn update_rejects_invalid_restrictions() {
        let mut registry = Registry::default();
        let id = registry.add_marker(marker("A")).unwrap();
        let err = registry
            .update_marker(
                id,
                MarkerUpdate::new().restrictions(Some(RestrictionSet::new().with_roles(["  "]))),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(registry.marker(id).unwrap().restrictions.is_none());
    }

    #[test]
    fn update_moves_membership() {
        let mut registry = registry_with_ems();
        registry
            .create_category("police", CategoryData::new("Police"))
            .unwrap();
        let id = registry.add_marker(marker("A").in_category("ems")).unwrap();

        registry
            .update_marker(id, MarkerUpdate::new().category(Some("police".into())))
            .unwrap();
        assert_eq!(registry.category("ems").unwrap().member_count, 0);
        assert_eq!(registry.category("police").unwrap().member_count, 1);

        registry
            .update_marker(id, MarkerUpdate::new().category(None))
            .unwrap();
        assert_eq!(registry.category("police").unwrap().member_count, 0);
        assert!(registry.marker(id).unwrap().category_id.is_none());
        assert_consistent(&registry);
    }

    #[test]
    fn update_into_full_or_missing_category() {
        let mut registry = Registry::new(Config::new().with_max_markers_per_category(1));
        registry
            .create_category("ems", CategoryData::new("EMS"))
            .unwrap();
        registry.add_marker(marker("A").in_category("ems")).unwrap();
        let loose = registry.add_marker(marker("B")).unwrap();

        let err = registry
            .update_marker(loose, MarkerUpdate::new().category(Some("ems".into())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);

        let err = registry
            .update_marker(loose, MarkerUpdate::new().category(Some("nope".into())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(registry.marker(loose).unwrap().category_id.is_none());
        assert_consistent(&registry);
    }

    #[test]
    fn effective_enablement() {
        let mut registry = registry_with_ems();
        let id = registry.add_marker(marker("A").in_category("ems")).unwrap();
        assert!(registry.is_effectively_enabled(registry.marker(id).unwrap()));

        registry.set_category_enabled("ems", false).unwrap();
        assert!(!registry.is_effectively_enabled(registry.marker(id).unwrap()));
        assert!(registry.category("ems").unwrap().updated_at.is_some());

        registry.set_category_enabled("ems", true).unwrap();
        registry.set_marker_enabled(id, false).unwrap();
        assert!(!registry.is_effectively_enabled(registry.marker(id).unwrap()));
    }

    #[test]
    fn stats_counts() {
        let mut registry = registry_with_ems();
        registry
            .create_category("off", CategoryData::new("Off").with_enabled(false))
            .unwrap();
        registry.add_marker(marker("A").in_category("ems")).unwrap();
        registry
            .add_marker(marker("B").with_enabled(false))
            .unwrap();

        let stats = registry.stats();
        assert_eq!(stats.total_categories, 2);
        assert_eq!(stats.enabled_categories, 1);
        assert_eq!(stats.total_markers, 2);
        assert_eq!(stats.enabled_markers, 1);
        assert_eq!(stats.markers_per_category["ems"], 1);
        assert_eq!(stats.next_marker_id, 3);
    }

    #[test]
    fn clear_all_empties_stores() {
        let mut registry = registry_with_ems();
        registry.add_marker(marker("A").in_category("ems")).unwrap();
        registry.clear_all();
        assert_eq!(registry.stats().total_categories, 0);
        assert_eq!(registry.stats().total_markers, 0);
    }
}
