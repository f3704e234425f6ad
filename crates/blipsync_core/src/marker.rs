//! Markers (map blips) and their input shapes.

use crate::error::{RegistryError, RegistryResult};
use crate::restriction::RestrictionSet;
use crate::types::{Coords, MarkerId, Timestamp};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Arbitrary per-marker data carried to clients untouched.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A single point of interest on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    /// Registry-assigned id.
    pub id: MarkerId,
    /// World position.
    pub coords: Coords,
    /// Sprite index.
    pub sprite: u32,
    /// Color index.
    pub color: u32,
    /// Sprite scale.
    pub scale: f32,
    /// Display label, trimmed.
    pub label: String,
    /// Only shown on the minimap when nearby.
    pub short_range: bool,
    /// Owning category, if any.
    pub category_id: Option<String>,
    /// Visibility restrictions.
    pub restrictions: Option<RestrictionSet>,
    /// Whether the marker is shown.
    pub enabled: bool,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Option<Timestamp>,
    /// Caller-supplied data.
    pub metadata: Metadata,
    /// Opacity (0-255).
    pub alpha: Option<u8>,
    /// Heading in degrees.
    pub rotation: Option<f32>,
    /// Native display mode.
    pub display: Option<u8>,
}

/// Input for creating a marker.
///
/// Every field is optional so that malformed input can be reported as
/// [`RegistryError::InvalidArgument`] instead of failing to deserialize.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkerData {
    /// World position. Required.
    pub coords: Option<Coords>,
    /// Sprite index. Required.
    pub sprite: Option<u32>,
    /// Color index. Required.
    pub color: Option<u32>,
    /// Sprite scale, defaults to 1.0.
    pub scale: Option<f32>,
    /// Display label. Required, non-empty after trimming.
    pub label: Option<String>,
    /// Short-range flag, defaults to false.
    pub short_range: Option<bool>,
    /// Owning category.
    pub category_id: Option<String>,
    /// Visibility restrictions.
    pub restrictions: Option<RestrictionSet>,
    /// Initial enabled flag, defaults to true.
    pub enabled: Option<bool>,
    /// Caller-supplied data.
    pub metadata: Metadata,
    /// Opacity.
    pub alpha: Option<u8>,
    /// Heading in degrees.
    pub rotation: Option<f32>,
    /// Native display mode.
    pub display: Option<u8>,
}

impl MarkerData {
    /// Creates marker input with the required fields set.
    pub fn new(coords: Coords, sprite: u32, color: u32, label: impl Into<String>) -> Self {
        Self {
            coords: Some(coords),
            sprite: Some(sprite),
            color: Some(color),
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Parses marker input from a JSON value.
    pub fn from_json(value: serde_json::Value) -> RegistryResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Sets the owning category.
    #[must_use]
    pub fn in_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
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

    /// Validates the input and builds a marker with the given id.
    ///
    /// Category existence and capacity are checked by the registry.
    pub(crate) fn into_marker(self, id: MarkerId, now: Timestamp) -> RegistryResult<Marker> {
        let coords = self
            .coords
            .ok_or_else(|| RegistryError::invalid("coords.x and coords.y are required"))?;
        if !coords.is_finite() {
            return Err(RegistryError::invalid("coords must be finite numbers"));
        }
        let sprite = self
            .sprite
            .ok_or_else(|| RegistryError::invalid("sprite must be a number"))?;
        let color = self
            .color
            .ok_or_else(|| RegistryError::invalid("color must be a number"))?;
        let label = normalize_label(self.label.as_deref())?;
        let scale = self.scale.unwrap_or(1.0);
        check_scale(scale)?;
        if let Some(restrictions) = &self.restrictions {
            restrictions.validate()?;
        }

        Ok(Marker {
            id,
            coords,
            sprite,
            color,
            scale,
            label,
            short_range: self.short_range.unwrap_or(false),
            category_id: self.category_id,
            restrictions: self.restrictions,
            enabled: self.enabled.unwrap_or(true),
            created_at: now,
            updated_at: None,
            metadata: self.metadata,
            alpha: self.alpha,
            rotation: self.rotation,
            display: self.display,
        })
    }
}

/// Partial update of a marker. Absent fields are left unchanged.
///
/// Fields that are optional on [`Marker`] (`category_id`, `restrictions`,
/// `alpha`, `rotation`, `display`) distinguish "unchanged" (`None`) from
/// "cleared" (`Some(None)`); in JSON an explicit `null` clears.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct MarkerUpdate {
    /// New position.
    pub coords: Option<Coords>,
    /// New sprite.
    pub sprite: Option<u32>,
    /// New color.
    pub color: Option<u32>,
    /// New scale.
    pub scale: Option<f32>,
    /// New label.
    pub label: Option<String>,
    /// New short-range flag.
    pub short_range: Option<bool>,
    /// New owning category, or `Some(None)` to detach.
    #[serde(deserialize_with = "double_option")]
    pub category_id: Option<Option<String>>,
    /// New restrictions, or `Some(None)` to make the marker public.
    #[serde(deserialize_with = "double_option")]
    pub restrictions: Option<Option<RestrictionSet>>,
    /// New enabled flag.
    pub enabled: Option<bool>,
    /// Replacement metadata.
    pub metadata: Option<Metadata>,
    /// New opacity, or `Some(None)` to reset it.
    #[serde(deserialize_with = "double_option")]
    pub alpha: Option<Option<u8>>,
    /// New heading, or `Some(None)` to reset it.
    #[serde(deserialize_with = "double_option")]
    pub rotation: Option<Option<f32>>,
    /// New display mode, or `Some(None)` to reset it.
    #[serde(deserialize_with = "double_option")]
    pub display: Option<Option<u8>>,
}

/// Fields that identify a marker and can never be updated.
const IMMUTABLE_FIELDS: &[&str] = &["id", "createdAt"];

impl MarkerUpdate {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an update from a JSON object, rejecting immutable fields.
    pub fn from_json(value: serde_json::Value) -> RegistryResult<Self> {
        if let Some(object) = value.as_object() {
            if let Some(field) = IMMUTABLE_FIELDS.iter().find(|f| object.contains_key(**f)) {
                return Err(RegistryError::invalid(format!("{field} cannot be updated")));
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Sets a new position.
    #[must_use]
    pub fn coords(mut self, coords: Coords) -> Self {
        self.coords = Some(coords);
        self
    }

    /// Sets a new label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Moves the marker to another category (or detaches it with `None`).
    #[must_use]
    pub fn category(mut self, category_id: Option<String>) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Replaces the restrictions (or clears them with `None`).
    #[must_use]
    pub fn restrictions(mut self, restrictions: Option<RestrictionSet>) -> Self {
        self.restrictions = Some(restrictions);
        self
    }

    /// Checks every supplied field before any of them is applied.
    pub(crate) fn validate(&self) -> RegistryResult<()> {
        if let Some(label) = &self.label {
            normalize_label(Some(label))?;
        }
        if let Some(coords) = &self.coords {
            if !coords.is_finite() {
                return Err(RegistryError::invalid("coords must be finite numbers"));
            }
        }
        if let Some(scale) = self.scale {
            check_scale(scale)?;
        }
        if let Some(Some(restrictions)) = &self.restrictions {
            restrictions.validate()?;
        }
        Ok(())
    }

    /// Overwrites the supplied fields, except the category which the
    /// registry moves itself.
    pub(crate) fn apply_to(self, marker: &mut Marker, now: Timestamp) {
        if let Some(coords) = self.coords {
            marker.coords = coords;
        }
        if let Some(sprite) = self.sprite {
            marker.sprite = sprite;
        }
        if let Some(color) = self.color {
            marker.color = color;
        }
        if let Some(scale) = self.scale {
            marker.scale = scale;
        }
        if let Some(label) = self.label {
            marker.label = label.trim().to_string();
        }
        if let Some(short_range) = self.short_range {
            marker.short_range = short_range;
        }
        if let Some(restrictions) = self.restrictions {
            marker.restrictions = restrictions;
        }
        if let Some(enabled) = self.enabled {
            marker.enabled = enabled;
        }
        if let Some(metadata) = self.metadata {
            marker.metadata = metadata;
        }
        if let Some(alpha) = self.alpha {
            marker.alpha = alpha;
        }
        if let Some(rotation) = self.rotation {
            marker.rotation = rotation;
        }
        if let Some(display) = self.display {
            marker.display = display;
        }
        marker.updated_at = Some(now);
    }
}

fn normalize_label(label: Option<&str>) -> RegistryResult<String> {
    match label.map(str::trim) {
        Some(label) if !label.is_empty() => Ok(label.to_string()),
        _ => Err(RegistryError::invalid("label must be a non-empty string")),
    }
}

fn check_scale(scale: f32) -> RegistryResult<()> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(RegistryError::invalid("scale must be a positive number"))
    }
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn data() -> MarkerData {
        MarkerData::new(Coords::new(1.0, 2.0, 3.0), 61, 1, "  Pillbox Hill  ")
    }

    #[test]
    fn build_marker_with_defaults() {
        let marker = data().into_marker(7, 100).unwrap();
        assert_eq!(marker.id, 7);
        assert_eq!(marker.label, "Pillbox Hill");
        assert_eq!(marker.scale, 1.0);
        assert!(!marker.short_range);
        assert!(marker.enabled);
        assert_eq!(marker.created_at, 100);
        assert!(marker.updated_at.is_none());
    }

    #[test]
    fn missing_required_fields() {
        let mut missing_label = data();
        missing_label.label = None;
        assert_eq!(
            missing_label.into_marker(1, 0).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );

        let mut blank_label = data();
        blank_label.label = Some("   ".into());
        assert!(blank_label.into_marker(1, 0).is_err());

        let mut no_sprite = data();
        no_sprite.sprite = None;
        assert!(no_sprite.into_marker(1, 0).is_err());

        let mut no_coords = data();
        no_coords.coords = None;
        assert!(no_coords.into_marker(1, 0).is_err());
    }

    #[test]
    fn parse_marker_json() {
        let data = MarkerData::from_json(json!({
            "coords": { "x": 10.0, "y": 20.0 },
            "sprite": 61,
            "color": 2,
            "label": "Hospital",
            "shortRange": true,
            "metadata": { "phone": "911" }
        }))
        .unwrap();
        let marker = data.into_marker(1, 0).unwrap();
        assert!(marker.short_range);
        assert_eq!(marker.metadata["phone"], json!("911"));
    }

    #[test]
    fn non_numeric_sprite_rejected() {
        let err = MarkerData::from_json(json!({ "sprite": "big" })).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn update_rejects_immutable_fields() {
        assert!(MarkerUpdate::from_json(json!({ "id": 4 })).is_err());
        assert!(MarkerUpdate::from_json(json!({ "createdAt": 4 })).is_err());
        assert!(MarkerUpdate::from_json(json!({ "label": "ok" })).is_ok());
    }

    #[test]
    fn update_null_clears_restrictions() {
        let update = MarkerUpdate::from_json(json!({ "restrictions": null })).unwrap();
        assert_eq!(update.restrictions, Some(None));

        let untouched = MarkerUpdate::from_json(json!({})).unwrap();
        assert_eq!(untouched.restrictions, None);
    }

    #[test]
    fn update_null_resets_styling() {
        let mut marker = MarkerData {
            alpha: Some(128),
            rotation: Some(90.0),
            display: Some(4),
            ..data()
        }
        .into_marker(1, 0)
        .unwrap();

        MarkerUpdate::from_json(json!({ "alpha": null, "display": null }))
            .unwrap()
            .apply_to(&mut marker, 10);
        assert_eq!(marker.alpha, None);
        assert_eq!(marker.display, None);
        assert_eq!(marker.rotation, Some(90.0));

        MarkerUpdate::from_json(json!({ "rotation": 45.0 }))
            .unwrap()
            .apply_to(&mut marker, 20);
        assert_eq!(marker.rotation, Some(45.0));
    }

    #[test]
    fn apply_update() {
        let mut marker = data().into_marker(1, 0).unwrap();
        MarkerUpdate::new()
            .label(" Mount Zonah ")
            .restrictions(Some(RestrictionSet::new().with_roles(["ambulance"])))
            .apply_to(&mut marker, 50);

        assert_eq!(marker.label, "Mount Zonah");
        assert!(marker.restrictions.is_some());
        assert_eq!(marker.updated_at, Some(50));
        assert_eq!(marker.created_at, 0);
    }

    #[test]
    fn update_validation() {
        assert!(MarkerUpdate::new().label("").validate().is_err());
        let bad_scale = MarkerUpdate {
            scale: Some(-1.0),
            ..MarkerUpdate::default()
        };
        assert!(bad_scale.validate().is_err());
    }
}
