//! Core identifier and value types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Marker identifier. Allocated from a strictly increasing counter and
/// never reused within the lifetime of a registry.
pub type MarkerId = u64;

/// Milliseconds since the unix epoch.
pub type Timestamp = u64;

/// Returns the current time as a [`Timestamp`].
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Identifies a connected client (the game server's player slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

impl From<u32> for ClientId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// World position of a marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate (height).
    #[serde(default)]
    pub z: f64,
}

impl Coords {
    /// Creates a new position.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Returns true if every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// A client's current role, as resolved by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSnapshot {
    /// Primary role (job) name.
    pub role: String,
    /// Optional sub-role (job grade name, division, ...).
    #[serde(default)]
    pub sub_role: Option<String>,
    /// Numeric rank within the role.
    #[serde(default)]
    pub rank: i64,
}

impl RoleSnapshot {
    /// Creates a snapshot with no sub-role.
    pub fn new(role: impl Into<String>, rank: i64) -> Self {
        Self {
            role: role.into(),
            sub_role: None,
            rank,
        }
    }

    /// Sets the sub-role.
    #[must_use]
    pub fn with_sub_role(mut self, sub_role: impl Into<String>) -> Self {
        self.sub_role = Some(sub_role.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coords_default_z() {
        let coords: Coords = serde_json::from_str(r#"{"x": 1.5, "y": -2.0}"#).unwrap();
        assert_eq!(coords, Coords::new(1.5, -2.0, 0.0));
    }

    #[test]
    fn coords_require_x_and_y() {
        assert!(serde_json::from_str::<Coords>(r#"{"x": 1.5}"#).is_err());
    }

    #[test]
    fn non_finite_coords() {
        assert!(!Coords::new(f64::NAN, 0.0, 0.0).is_finite());
        assert!(Coords::new(1.0, 2.0, 3.0).is_finite());
    }

    #[test]
    fn client_id_display() {
        assert_eq!(ClientId(7).to_string(), "client#7");
    }
}
