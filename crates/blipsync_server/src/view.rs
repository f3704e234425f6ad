//! Per-client record of transmitted markers.

use blipsync_core::{ClientId, MarkerId};
use std::collections::{BTreeMap, BTreeSet};

/// The marker ids each tracked client was last told exist.
///
/// Diffing trusts this record, so it must only change together with the
/// event that informs the client. A client is tracked from its first sync
/// until it disconnects.
#[derive(Debug, Default)]
pub struct ClientViews {
    views: BTreeMap<ClientId, BTreeSet<MarkerId>>,
}

impl ClientViews {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the client is tracked.
    pub fn is_tracked(&self, client: ClientId) -> bool {
        self.views.contains_key(&client)
    }

    /// Returns the tracked clients in id order.
    pub fn clients(&self) -> Vec<ClientId> {
        self.views.keys().copied().collect()
    }

    /// Returns the number of tracked clients.
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Returns true if no client is tracked.
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Returns a client's view.
    pub fn view(&self, client: ClientId) -> Option<&BTreeSet<MarkerId>> {
        self.views.get(&client)
    }

    /// Returns true if the client has the marker.
    pub fn has(&self, client: ClientId, marker: MarkerId) -> bool {
        self.views
            .get(&client)
            .is_some_and(|view| view.contains(&marker))
    }

    /// Records that the client has the marker.
    pub fn insert(&mut self, client: ClientId, marker: MarkerId) -> bool {
        self.views.entry(client).or_default().insert(marker)
    }

    /// Records that the client no longer has the marker.
    pub fn remove(&mut self, client: ClientId, marker: MarkerId) -> bool {
        self.views
            .get_mut(&client)
            .is_some_and(|view| view.remove(&marker))
    }

    /// Replaces a client's whole view, tracking it if needed.
    pub fn replace(&mut self, client: ClientId, markers: BTreeSet<MarkerId>) {
        self.views.insert(client, markers);
    }

    /// Stops tracking a client.
    pub fn forget(&mut self, client: ClientId) -> Option<BTreeSet<MarkerId>> {
        self.views.remove(&client)
    }

    /// Removes a marker from every view. Returns the clients that had it.
    pub fn remove_everywhere(&mut self, marker: MarkerId) -> Vec<ClientId> {
        self.views
            .iter_mut()
            .filter_map(|(client, view)| view.remove(&marker).then_some(*client))
            .collect()
    }

    /// Empties every view while keeping the clients tracked.
    pub fn clear_views(&mut self) {
        for view in self.views.values_mut() {
            view.clear();
        }
    }
}
