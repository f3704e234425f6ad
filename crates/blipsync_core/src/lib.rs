//! # blipsync core
//!
//! Data model and authoritative registry for access-controlled map markers.
//!
//! This crate provides:
//! - Categories and markers with their input and update shapes
//! - Restriction sets and the [`can_see`] visibility predicate
//! - The [`Registry`], which owns every category and marker and enforces
//!   membership counts, capacity limits and id allocation
//! - Configuration and statistics
//!
//! The registry has no notion of clients. The `blipsync_server` crate layers
//! per-client views and event delivery on top of it.
//!
//! ```rust
//! use blipsync_core::{CategoryData, Coords, MarkerData, Registry, RestrictionSet};
//!
//! let mut registry = Registry::default();
//! registry.create_category("ems", CategoryData::new("EMS"))?;
//! let id = registry.add_marker(
//!     MarkerData::new(Coords::new(295.0, -1446.0, 29.0), 61, 1, "Central Medical")
//!         .in_category("ems")
//!         .with_restrictions(RestrictionSet::new().with_roles(["ambulance"])),
//! )?;
//! assert_eq!(registry.category("ems").map(|c| c.member_count), Some(1));
//! # let _ = id;
//! # Ok::<(), blipsync_core::RegistryError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod access;
mod category;
mod config;
mod error;
mod marker;
mod registry;
mod restriction;
mod stats;
mod types;

pub use access::can_see;
pub use category::{Category, CategoryData};
pub use config::Config;
pub use error::{ErrorKind, RegistryError, RegistryResult};
pub use marker::{Marker, MarkerData, MarkerUpdate, Metadata};
pub use registry::{Registry, RemovedCategory};
pub use restriction::RestrictionSet;
pub use stats::RegistryStats;
pub use types::{now_millis, ClientId, Coords, MarkerId, RoleSnapshot, Timestamp};
