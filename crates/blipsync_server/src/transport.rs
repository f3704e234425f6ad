//! Transport layer abstraction for event delivery.

use crate::events::SyncEvent;
use blipsync_core::ClientId;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{trace, warn};

/// Delivers events to connected clients.
///
/// Implementations must not block: an event is enqueued and the call
/// returns. Events sent to the same client must arrive in call order.
pub trait EventTransport: Send + Sync {
    /// Sends an event to one client.
    fn send(&self, client: ClientId, event: SyncEvent);

    /// Sends an event to every connected client.
    fn broadcast(&self, event: SyncEvent);
}

/// Transport backed by one unbounded tokio channel per client.
///
/// The network layer owns the receiving half and forwards events to the
/// actual connection.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    senders: RwLock<HashMap<ClientId, UnboundedSender<SyncEvent>>>,
}

impl ChannelTransport {
    /// Creates a transport with no clients.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a channel for a client, replacing any previous one.
    pub fn connect(&self, client: ClientId) -> UnboundedReceiver<SyncEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.write().insert(client, tx);
        rx
    }

    /// Closes a client's channel. Returns true if it was open.
    pub fn disconnect(&self, client: ClientId) -> bool {
        self.senders.write().remove(&client).is_some()
    }

    /// Returns true if the client has an open channel.
    pub fn is_connected(&self, client: ClientId) -> bool {
        self.senders.read().contains_key(&client)
    }

    /// Returns the number of open channels.
    pub fn client_count(&self) -> usize {
        self.senders.read().len()
    }
}

impl EventTransport for ChannelTransport {
    fn send(&self, client: ClientId, event: SyncEvent) {
        let senders = self.senders.read();
        match senders.get(&client) {
            Some(tx) => {
                let name = event.name();
                if tx.send(event).is_err() {
                    warn!(%client, event = name, "dropping event for closed channel");
                } else {
                    trace!(%client, event = name, "event enqueued");
                }
            }
            None => trace!(%client, event = event.name(), "no channel for client"),
        }
    }

    fn broadcast(&self, event: SyncEvent) {
        for (client, tx) in self.senders.read().iter() {
            if tx.send(event.clone()).is_err() {
                warn!(%client, event = event.name(), "dropping broadcast for closed channel");
            }
        }
    }
}

/// Recipient of a recorded delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Addressed to one client.
    Client(ClientId),
    /// Broadcast to everyone.
    Broadcast,
}

/// An event captured by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Who the event was for.
    pub target: Target,
    /// The event.
    pub event: SyncEvent,
}

/// An in-memory transport that records every delivery, for testing.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingTransport {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every delivery in order.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// Returns the events addressed directly to `client`, in order.
    pub fn events_for(&self, client: ClientId) -> Vec<SyncEvent> {
        self.deliveries
            .lock()
            .iter()
            .filter(|d| d.target == Target::Client(client))
            .map(|d| d.event.clone())
            .collect()
    }

    /// Returns the broadcast events, in order.
    pub fn broadcasts(&self) -> Vec<SyncEvent> {
        self.deliveries
            .lock()
            .iter()
            .filter(|d| d.target == Target::Broadcast)
            .map(|d| d.event.clone())
            .collect()
    }

    /// Removes and returns every recorded delivery.
    pub fn take(&self) -> Vec<Delivery> {
        std::mem::take(&mut *self.deliveries.lock())
    }

    /// Forgets every recorded delivery.
    pub fn clear(&self) {
        self.deliveries.lock().clear();
    }

    /// Returns the number of recorded deliveries.
    pub fn len(&self) -> usize {
        self.deliveries.lock().len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.deliveries.lock().is_empty()
    }
}

impl EventTransport for RecordingTransport {
    fn send(&self, client: ClientId, event: SyncEvent) {
        self.deliveries.lock().push(Delivery {
            target: Target::Client(client),
            event,
        });
    }

    fn broadcast(&self, event: SyncEvent) {
        self.deliveries.lock().push(Delivery {
            target: Target::Broadcast,
            event,
        });
    }
}
