//! Identity provider seam.

use blipsync_core::{ClientId, RoleSnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Resolves a connected client's current role.
///
/// Returning `None` (provider unavailable, unknown client) is not an error:
/// the client simply fails every restricted visibility check.
pub trait IdentityProvider: Send + Sync {
    /// Returns the client's role snapshot, if it can be resolved.
    fn resolve(&self, client: ClientId) -> Option<RoleSnapshot>;
}

impl<F> IdentityProvider for F
where
    F: Fn(ClientId) -> Option<RoleSnapshot> + Send + Sync,
{
    fn resolve(&self, client: ClientId) -> Option<RoleSnapshot> {
        self(client)
    }
}

/// A provider backed by an in-memory table.
///
/// Useful for tests and for deployments where the game framework pushes
/// role updates instead of being queried.
#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    roles: RwLock<HashMap<ClientId, RoleSnapshot>>,
}

impl StaticIdentityProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, builder style.
    #[must_use]
    pub fn with(self, client: ClientId, snapshot: RoleSnapshot) -> Self {
        self.set(client, snapshot);
        self
    }

    /// Sets a client's snapshot, returning the previous one.
    pub fn set(&self, client: ClientId, snapshot: RoleSnapshot) -> Option<RoleSnapshot> {
        self.roles.write().insert(client, snapshot)
    }

    /// Removes a client's snapshot.
    pub fn remove(&self, client: ClientId) -> Option<RoleSnapshot> {
        self.roles.write().remove(&client)
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn resolve(&self, client: ClientId) -> Option<RoleSnapshot> {
        self.roles.read().get(&client).cloned()
    }
}
