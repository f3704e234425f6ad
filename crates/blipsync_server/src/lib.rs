//! # blipsync server
//!
//! Per-client replication of the marker registry.
//!
//! This crate provides:
//! - [`BlipServer`], the public create/update/remove/query API
//! - The visibility synchronizer that diffs each client's view
//! - Periodic reconciliation ([`ReconciliationScheduler`])
//! - Role helpers that file markers under per-role categories
//! - Transport and identity seams with in-memory implementations
//!
//! # Architecture
//!
//! ```text
//! caller -> BlipServer -> Registry (authoritative state)
//!                      -> VisibilitySynchronizer -> EventTransport -> client
//! ReconciliationScheduler -> BlipServer::reconcile_all (safety net)
//! ```
//!
//! The server records, per client, which marker ids it has sent. Marker
//! mutations are diffed against that record so clients only receive the
//! additions, updates and removals that concern them. A full sync replaces
//! the record and is sent on connect, on role change and on every sweep.
//!
//! # Collaborators
//!
//! The game framework supplies an [`IdentityProvider`] that resolves a
//! client's role, and an [`EventTransport`] that pushes events over the
//! network. [`ChannelTransport`] adapts the latter to tokio channels.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod error;
mod events;
mod identity;
mod roles;
mod scheduler;
mod server;
mod synchronizer;
mod transport;
mod view;

pub use error::{ServerError, ServerResult};
pub use events::SyncEvent;
pub use identity::{IdentityProvider, StaticIdentityProvider};
pub use roles::{role_profile, role_profiles, RoleMarkerResult, RoleProfile};
pub use scheduler::ReconciliationScheduler;
pub use server::BlipServer;
pub use synchronizer::{visible_to, DiffSummary, VisibilitySynchronizer};
pub use transport::{ChannelTransport, Delivery, EventTransport, RecordingTransport, Target};
pub use view::ClientViews;
