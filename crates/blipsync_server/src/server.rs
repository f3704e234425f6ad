//! Main sync server.

use crate::error::ServerResult;
use crate::events::SyncEvent;
use crate::identity::IdentityProvider;
use crate::synchronizer::VisibilitySynchronizer;
use crate::transport::EventTransport;
use crate::view::ClientViews;
use blipsync_core::{
    Category, CategoryData, ClientId, Config, Marker, MarkerData, MarkerId, MarkerUpdate,
    Registry, RegistryStats,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Registry and views, always locked together.
pub(crate) struct SyncState {
    pub(crate) registry: Registry,
    pub(crate) views: ClientViews,
}

/// The marker sync server.
///
/// Every public operation runs inside one critical section covering the
/// registry and all client views, so no caller observes a half-applied
/// mutation and events for a client are enqueued in mutation order.
///
/// # Example
///
/// ```
/// use blipsync_core::{CategoryData, ClientId, Config, Coords, MarkerData, RoleSnapshot};
/// use blipsync_server::{BlipServer, RecordingTransport, StaticIdentityProvider};
///
/// let identity = StaticIdentityProvider::new()
///     .with(ClientId(1), RoleSnapshot::new("ambulance", 0));
/// let server = BlipServer::new(Config::default(), RecordingTransport::new(), identity);
///
/// server.client_connected(ClientId(1));
/// server.create_category("ems", CategoryData::new("EMS")).unwrap();
/// server
///     .add_marker(MarkerData::new(Coords::new(1.0, 2.0, 3.0), 61, 1, "Hospital").in_category("ems"))
///     .unwrap();
///
/// assert_eq!(server.client_view(ClientId(1)).map(|v| v.len()), Some(1));
/// ```
pub struct BlipServer<T, I> {
    config: Config,
    state: Mutex<SyncState>,
    synchronizer: VisibilitySynchronizer<T, I>,
    transport: Arc<T>,
    identity: Arc<I>,
}

impl<T: EventTransport, I: IdentityProvider> BlipServer<T, I> {
    /// Creates a server that owns its transport and identity provider.
    pub fn new(config: Config, transport: T, identity: I) -> Self {
        Self::with_shared(config, Arc::new(transport), Arc::new(identity))
    }

    /// Creates a server over shared collaborators.
    pub fn with_shared(config: Config, transport: Arc<T>, identity: Arc<I>) -> Self {
        let synchronizer = VisibilitySynchronizer::new(
            Arc::clone(&transport),
            Arc::clone(&identity),
            config.debug_logging,
        );
        Self {
            state: Mutex::new(SyncState {
                registry: Registry::new(config.clone()),
                views: ClientViews::new(),
            }),
            config,
            synchronizer,
            transport,
            identity,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Returns the identity provider.
    pub fn identity(&self) -> &Arc<I> {
        &self.identity
    }

    // === Mutations ===

    /// Creates a category and broadcasts it.
    pub fn create_category(&self, id: &str, data: CategoryData) -> ServerResult<Category> {
        let mut state = self.state.lock();
        self.create_category_locked(&mut state, id, data)
    }

    /// Removes a category and all of its markers.
    ///
    /// Holders of each member marker are told about its removal before the
    /// category removal is broadcast. Returns the number of markers removed.
    pub fn remove_category(&self, id: &str) -> ServerResult<usize> {
        let mut state = self.state.lock();
        let removed = state.registry.remove_category(id)?;
        for marker in &removed.markers {
            self.synchronizer.forget_marker(&mut state.views, marker.id);
        }
        self.transport
            .broadcast(SyncEvent::CategoryRemoved(removed.category.id.clone()));
        info!(category = %id, markers = removed.markers.len(), "category removed");
        Ok(removed.markers.len())
    }

    /// Adds a marker and sends it to every client that may see it.
    pub fn add_marker(&self, data: MarkerData) -> ServerResult<MarkerId> {
        let mut state = self.state.lock();
        self.add_marker_locked(&mut state, data)
    }

    /// Removes a marker, notifying the clients that had it.
    pub fn remove_marker(&self, id: MarkerId) -> ServerResult<()> {
        let mut state = self.state.lock();
        self.remove_marker_locked(&mut state, id)
    }

    /// Updates a marker and re-evaluates its visibility for every client.
    pub fn update_marker(&self, id: MarkerId, update: MarkerUpdate) -> ServerResult<()> {
        let mut state = self.state.lock();
        let SyncState { registry, views } = &mut *state;
        registry.update_marker(id, update)?;
        self.synchronizer.sync_marker(registry, views, id);
        Ok(())
    }

    /// Enables or disables a category, re-evaluating each member marker.
    pub fn set_category_enabled(&self, id: &str, enabled: bool) -> ServerResult<()> {
        let mut state = self.state.lock();
        let SyncState { registry, views } = &mut *state;
        registry.set_category_enabled(id, enabled)?;
        let members: Vec<MarkerId> = registry.markers_by_category(id).iter().map(|m| m.id).collect();
        for marker_id in &members {
            self.synchronizer.sync_marker(registry, views, *marker_id);
        }
        info!(category = %id, enabled, members = members.len(), "category toggled");
        Ok(())
    }

    /// Enables or disables a marker.
    pub fn set_marker_enabled(&self, id: MarkerId, enabled: bool) -> ServerResult<()> {
        let mut state = self.state.lock();
        let SyncState { registry, views } = &mut *state;
        registry.set_marker_enabled(id, enabled)?;
        self.synchronizer.sync_marker(registry, views, id);
        Ok(())
    }

    /// Removes everything and sends each tracked client an empty view.
    pub fn clear_all(&self) {
        let mut state = self.state.lock();
        state.registry.clear_all();
        self.synchronizer.reset_all(&mut state.views);
        info!("registry cleared");
    }

    // === Queries ===

    /// Returns every category, ordered by id.
    pub fn categories(&self) -> Vec<Category> {
        self.state.lock().registry.categories().cloned().collect()
    }

    /// Returns a category.
    pub fn category(&self, id: &str) -> Option<Category> {
        self.state.lock().registry.category(id).cloned()
    }

    /// Returns every marker, ordered by id.
    pub fn markers(&self) -> Vec<Marker> {
        self.state.lock().registry.markers().cloned().collect()
    }

    /// Returns a marker.
    pub fn marker(&self, id: MarkerId) -> Option<Marker> {
        self.state.lock().registry.marker(id).cloned()
    }

    /// Returns the markers of a category. Empty for an unknown category.
    pub fn markers_by_category(&self, id: &str) -> Vec<Marker> {
        self.state
            .lock()
            .registry
            .markers_by_category(id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Returns registry statistics.
    pub fn stats(&self) -> RegistryStats {
        self.state.lock().registry.stats()
    }

    /// Returns the tracked clients.
    pub fn tracked_clients(&self) -> Vec<ClientId> {
        self.state.lock().views.clients()
    }

    /// Returns the marker ids a client was last told about.
    pub fn client_view(&self, client: ClientId) -> Option<Vec<MarkerId>> {
        self.state
            .lock()
            .views
            .view(client)
            .map(|view| view.iter().copied().collect())
    }

    // === Client lifecycle ===

    /// Handles a newly connected client with a full sync.
    pub fn client_connected(&self, client: ClientId) {
        debug!(%client, "client connected");
        let mut state = self.state.lock();
        let SyncState { registry, views } = &mut *state;
        self.synchronizer.sync_client_full(registry, views, client);
    }

    /// Handles a client's explicit resync request.
    ///
    /// Only [`client_connected`](Self::client_connected) starts tracking a
    /// client; a request from an untracked client is ignored. Returns true
    /// if a full sync was sent.
    pub fn resync_requested(&self, client: ClientId) -> bool {
        let mut state = self.state.lock();
        let SyncState { registry, views } = &mut *state;
        if !views.is_tracked(client) {
            debug!(%client, "ignoring resync from untracked client");
            return false;
        }
        self.synchronizer.sync_client_full(registry, views, client);
        true
    }

    /// Handles a change of a client's role, sub-role or rank.
    ///
    /// The view is dropped before resyncing so nothing granted by the old
    /// role survives, even if an earlier diff was missed. A change reported
    /// after the client disconnected is ignored. Returns true if the view
    /// was rebuilt.
    pub fn role_changed(&self, client: ClientId) -> bool {
        let mut state = self.state.lock();
        let SyncState { registry, views } = &mut *state;
        if views.forget(client).is_none() {
            debug!(%client, "ignoring role change for untracked client");
            return false;
        }
        self.synchronizer.sync_client_full(registry, views, client);
        debug!(%client, "role changed, view rebuilt");
        true
    }

    /// Stops tracking a disconnected client. Returns true if it was tracked.
    pub fn client_disconnected(&self, client: ClientId) -> bool {
        let tracked = self.state.lock().views.forget(client).is_some();
        debug!(%client, tracked, "client disconnected");
        tracked
    }

    /// Full-syncs every tracked client. Returns the number synced.
    ///
    /// The lock is taken per client so mutations can interleave with a long
    /// sweep. Clients that disconnect during the sweep are skipped.
    pub fn reconcile_all(&self) -> usize {
        self.reconcile_clients(self.tracked_clients())
    }

    /// Full-syncs each client of a snapshot that is still tracked.
    pub(crate) fn reconcile_clients(&self, clients: Vec<ClientId>) -> usize {
        let mut synced = 0;
        for client in clients {
            let mut state = self.state.lock();
            let SyncState { registry, views } = &mut *state;
            if !views.is_tracked(client) {
                trace!(%client, "skipping client that left during sweep");
                continue;
            }
            self.synchronizer.sync_client_full(registry, views, client);
            synced += 1;
        }
        synced
    }

    // === Shared with the role helpers ===

    /// Runs `f` inside the server's critical section.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut SyncState) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut *state)
    }

    pub(crate) fn create_category_locked(
        &self,
        state: &mut SyncState,
        id: &str,
        data: CategoryData,
    ) -> ServerResult<Category> {
        let category = state.registry.create_category(id, data)?;
        self.transport
            .broadcast(SyncEvent::CategoryCreated(category.clone()));
        info!(category = %category.id, "category created");
        Ok(category)
    }

    pub(crate) fn add_marker_locked(
        &self,
        state: &mut SyncState,
        data: MarkerData,
    ) -> ServerResult<MarkerId> {
        let id = state.registry.add_marker(data)?;
        self.synchronizer
            .sync_marker(&state.registry, &mut state.views, id);
        Ok(id)
    }

    pub(crate) fn remove_marker_locked(
        &self,
        state: &mut SyncState,
        id: MarkerId,
    ) -> ServerResult<()> {
        state.registry.remove_marker(id)?;
        self.synchronizer.forget_marker(&mut state.views, id);
        Ok(())
    }
}
