//! Events pushed to clients.

use blipsync_core::{Category, Marker, MarkerId};
use serde::Serialize;

/// A notification delivered to one client or broadcast to all.
///
/// Category lifecycle events are broadcast. Marker events and full syncs
/// are addressed to a single client and reflect that client's view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum SyncEvent {
    /// A category was created.
    CategoryCreated(Category),
    /// A category was removed (after its markers).
    CategoryRemoved(String),
    /// A marker became visible to the client.
    MarkerAdded(Marker),
    /// A marker the client already has changed.
    MarkerUpdated(Marker),
    /// A marker the client had is gone or no longer visible.
    MarkerRemoved(MarkerId),
    /// Complete replacement of the client's view.
    #[serde(rename_all = "camelCase")]
    FullSync {
        /// Visible categories, ordered by id.
        categories: Vec<Category>,
        /// Visible markers, ordered by id.
        markers: Vec<Marker>,
    },
}

impl SyncEvent {
    /// Returns the event name used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::CategoryCreated(_) => "categoryCreated",
            SyncEvent::CategoryRemoved(_) => "categoryRemoved",
            SyncEvent::MarkerAdded(_) => "markerAdded",
            SyncEvent::MarkerUpdated(_) => "markerUpdated",
            SyncEvent::MarkerRemoved(_) => "markerRemoved",
            SyncEvent::FullSync { .. } => "fullSync",
        }
    }

    /// Returns the marker this event is about, if it concerns a single marker.
    pub fn marker_id(&self) -> Option<MarkerId> {
        match self {
            SyncEvent::MarkerAdded(m) | SyncEvent::MarkerUpdated(m) => Some(m.id),
            SyncEvent::MarkerRemoved(id) => Some(*id),
            _ => None,
        }
    }

    /// Encodes the event as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
