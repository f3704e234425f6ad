//! Per-client visibility diffing.
//!
//! For a marker, each tracked client falls into one of four cases:
//!
//! | should see | had it | action                  |
//! |------------|--------|-------------------------|
//! | yes        | no     | `MarkerAdded`, record   |
//! | yes        | yes    | `MarkerUpdated`         |
//! | no         | yes    | `MarkerRemoved`, erase  |
//! | no         | no     | nothing                 |
//!
//! A client therefore never receives a removal for an id it does not have,
//! nor two additions of the same id without a removal in between. A full
//! sync replaces the view wholesale and always wins over earlier diffs.

use crate::events::SyncEvent;
use crate::identity::IdentityProvider;
use crate::transport::EventTransport;
use crate::view::ClientViews;
use blipsync_core::{can_see, Category, ClientId, Marker, MarkerId, Registry, RoleSnapshot};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Counts of the events emitted by one marker sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// `MarkerAdded` events sent.
    pub added: usize,
    /// `MarkerUpdated` events sent.
    pub updated: usize,
    /// `MarkerRemoved` events sent.
    pub removed: usize,
}

/// Computes and emits per-client diffs.
///
/// The synchronizer holds no state of its own; the caller passes the
/// registry and the views, and must hold them exclusively for the duration
/// of each call.
pub struct VisibilitySynchronizer<T, I> {
    transport: Arc<T>,
    identity: Arc<I>,
    debug_logging: bool,
}

impl<T: EventTransport, I: IdentityProvider> VisibilitySynchronizer<T, I> {
    /// Creates a synchronizer.
    pub fn new(transport: Arc<T>, identity: Arc<I>, debug_logging: bool) -> Self {
        Self {
            transport,
            identity,
            debug_logging,
        }
    }

    /// Brings every tracked client's view of one marker up to date.
    ///
    /// A marker missing from the registry is treated as visible to nobody.
    pub fn sync_marker(
        &self,
        registry: &Registry,
        views: &mut ClientViews,
        marker_id: MarkerId,
    ) -> DiffSummary {
        let mut summary = DiffSummary::default();
        let marker = registry.marker(marker_id);
        let effective = marker.is_some_and(|m| registry.is_effectively_enabled(m));

        for client in views.clients() {
            let should_see = match marker {
                Some(marker) if effective => {
                    let snapshot = self.identity.resolve(client);
                    can_see(snapshot.as_ref(), marker.restrictions.as_ref())
                }
                _ => false,
            };
            let had_it = views.has(client, marker_id);

            match (should_see, marker) {
                (true, Some(marker)) if !had_it => {
                    views.insert(client, marker_id);
                    self.transport
                        .send(client, SyncEvent::MarkerAdded(marker.clone()));
                    summary.added += 1;
                }
                (true, Some(marker)) => {
                    self.transport
                        .send(client, SyncEvent::MarkerUpdated(marker.clone()));
                    summary.updated += 1;
                }
                _ if had_it => {
                    views.remove(client, marker_id);
                    self.transport
                        .send(client, SyncEvent::MarkerRemoved(marker_id));
                    summary.removed += 1;
                }
                _ => {}
            }
        }

        if self.debug_logging {
            debug!(
                marker = marker_id,
                added = summary.added,
                updated = summary.updated,
                removed = summary.removed,
                "marker synced"
            );
        }
        summary
    }

    /// Recomputes a client's complete view and sends it as one `FullSync`.
    ///
    /// Starts tracking the client if it was not tracked. Returns the number
    /// of visible markers.
    pub fn sync_client_full(
        &self,
        registry: &Registry,
        views: &mut ClientViews,
        client: ClientId,
    ) -> usize {
        let snapshot = self.identity.resolve(client);
        let (categories, markers) = visible_to(registry, snapshot.as_ref());
        let ids: BTreeSet<MarkerId> = markers.iter().map(|m| m.id).collect();
        let count = ids.len();

        views.replace(client, ids);
        if self.debug_logging {
            debug!(
                %client,
                categories = categories.len(),
                markers = count,
                resolved = snapshot.is_some(),
                "full sync"
            );
        }
        self.transport
            .send(client, SyncEvent::FullSync { categories, markers });
        count
    }

    /// Drops a removed marker from every view, notifying only its holders.
    ///
    /// Returns the number of clients notified.
    pub fn forget_marker(&self, views: &mut ClientViews, marker_id: MarkerId) -> usize {
        let holders = views.remove_everywhere(marker_id);
        for client in &holders {
            self.transport
                .send(*client, SyncEvent::MarkerRemoved(marker_id));
        }
        holders.len()
    }

    /// Empties every tracked view and tells each client.
    pub fn reset_all(&self, views: &mut ClientViews) {
        views.clear_views();
        for client in views.clients() {
            self.transport.send(
                client,
                SyncEvent::FullSync {
                    categories: Vec::new(),
                    markers: Vec::new(),
                },
            );
        }
    }
}

/// Returns the categories and markers a client with `snapshot` may see,
/// both ordered by id.
pub fn visible_to(
    registry: &Registry,
    snapshot: Option<&RoleSnapshot>,
) -> (Vec<Category>, Vec<Marker>) {
    let categories = registry
        .categories()
        .filter(|c| c.enabled && can_see(snapshot, c.restrictions.as_ref()))
        .cloned()
        .collect();
    let markers = registry
        .markers()
        .filter(|m| registry.is_effectively_enabled(m) && can_see(snapshot, m.restrictions.as_ref()))
        .cloned()
        .collect();
    (categories, markers)
}
