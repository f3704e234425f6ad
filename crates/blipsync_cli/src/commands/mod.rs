//! CLI command implementations and the seed file format.

pub mod inspect;
pub mod simulate;

use blipsync_core::{CategoryData, ClientId, Config, MarkerData, RoleSnapshot};
use blipsync_server::{BlipServer, EventTransport, IdentityProvider, StaticIdentityProvider};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors reported by the CLI.
#[derive(Error, Debug)]
pub enum CliError {
    /// The seed file could not be read.
    #[error("cannot read seed file {path}: {source}")]
    Io {
        /// Path of the seed file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The seed file is not valid seed JSON.
    #[error("invalid seed file {path}: {source}")]
    Parse {
        /// Path of the seed file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Output could not be encoded.
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    /// Unsupported `--format` value.
    #[error("unknown output format: {0}")]
    UnknownFormat(String),
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// A category entry of a seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedCategory {
    /// Category id.
    pub id: String,
    /// Remaining category fields.
    #[serde(flatten)]
    pub data: CategoryData,
}

/// A simulated client of a seed file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedClient {
    /// Connection slot id.
    pub id: ClientId,
    /// Role name.
    pub role: String,
    /// Optional sub-role.
    #[serde(default)]
    pub sub_role: Option<String>,
    /// Rank within the role.
    #[serde(default)]
    pub rank: i64,
}

impl SeedClient {
    /// Returns the identity this client resolves to.
    pub fn snapshot(&self) -> RoleSnapshot {
        let snapshot = RoleSnapshot::new(self.role.clone(), self.rank);
        match &self.sub_role {
            Some(sub_role) => snapshot.with_sub_role(sub_role.clone()),
            None => snapshot,
        }
    }
}

/// Contents of a seed file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Seed {
    /// Server configuration. Defaults apply when absent.
    pub config: Option<Config>,
    /// Categories, created first.
    pub categories: Vec<SeedCategory>,
    /// Plain markers.
    pub markers: Vec<MarkerData>,
    /// Restricted role markers keyed by role name.
    pub role_markers: BTreeMap<String, Vec<MarkerData>>,
    /// Clients used by `inspect` and `simulate`.
    pub clients: Vec<SeedClient>,
}

impl Seed {
    /// Returns the seed's configuration, or the defaults.
    pub fn config(&self) -> Config {
        self.config.clone().unwrap_or_default()
    }

    /// Builds an identity provider resolving every seed client.
    pub fn identity(&self) -> StaticIdentityProvider {
        self.clients
            .iter()
            .fold(StaticIdentityProvider::new(), |identity, client| {
                identity.with(client.id, client.snapshot())
            })
    }
}

/// Reads and parses a seed file.
pub fn load_seed(path: &Path) -> CliResult<Seed> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// A seed item the server rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedFailure {
    /// Which item failed, e.g. `markers[3]`.
    pub item: String,
    /// Why it failed.
    pub error: String,
}

/// Outcome of loading a seed into a server.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    /// Categories created.
    pub categories_created: usize,
    /// Plain markers added.
    pub markers_added: usize,
    /// Role markers added.
    pub role_markers_added: usize,
    /// Items that were rejected.
    pub failures: Vec<SeedFailure>,
}

impl SeedReport {
    fn fail(&mut self, item: String, error: impl ToString) {
        let error = error.to_string();
        warn!(%item, %error, "seed item rejected");
        self.failures.push(SeedFailure { item, error });
    }
}

/// Loads every category and marker of `seed` into `server`.
///
/// Rejected items are recorded in the report; loading continues.
pub fn populate<T, I>(server: &BlipServer<T, I>, seed: &Seed) -> SeedReport
where
    T: EventTransport,
    I: IdentityProvider,
{
    let mut report = SeedReport::default();

    for category in &seed.categories {
        match server.create_category(&category.id, category.data.clone()) {
            Ok(_) => report.categories_created += 1,
            Err(err) => report.fail(format!("categories[{}]", category.id), err),
        }
    }

    for (index, data) in seed.markers.iter().enumerate() {
        match server.add_marker(data.clone()) {
            Ok(id) => {
                debug!(index, id, "seed marker added");
                report.markers_added += 1;
            }
            Err(err) => report.fail(format!("markers[{index}]"), err),
        }
    }

    for result in server.add_role_markers(seed.role_markers.clone()) {
        match result.outcome {
            Ok(_) => report.role_markers_added += 1,
            Err(err) => report.fail(
                format!("roleMarkers.{}[{}]", result.role, result.index),
                err,
            ),
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use blipsync_server::RecordingTransport;
    use std::io::Write;

    pub(crate) const SEED: &str = r#"{
        "config": { "syncIntervalMs": 1000, "maxCategories": 2 },
        "categories": [
            { "id": "ems", "label": "EMS" },
            { "id": "hidden", "label": "Hidden", "enabled": false },
            { "id": "third", "label": "One too many" }
        ],
        "markers": [
            { "coords": { "x": 1.0, "y": 2.0, "z": 3.0 }, "sprite": 61, "color": 1,
              "label": "Pillbox", "categoryId": "ems" },
            { "coords": { "x": 1.0, "y": 2.0 }, "sprite": 1, "color": 1 }
        ],
        "roleMarkers": {
            "police": [ { "coords": { "x": 441.0, "y": -982.0 }, "label": "Armory" } ]
        },
        "clients": [
            { "id": 1, "role": "police", "rank": 2 },
            { "id": 2, "role": "ambulance", "subRole": "doctor" }
        ]
    }"#;

    fn write_seed(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_seed_from_file() {
        let file = write_seed(SEED);
        let seed = load_seed(file.path()).unwrap();

        assert_eq!(seed.categories.len(), 3);
        assert_eq!(seed.categories[1].data.enabled, Some(false));
        assert_eq!(seed.markers.len(), 2);
        assert_eq!(seed.role_markers["police"].len(), 1);
        assert_eq!(seed.clients[1].snapshot().sub_role.as_deref(), Some("doctor"));

        let config = seed.config();
        assert_eq!(config.sync_interval_ms, 1000);
        assert_eq!(config.max_categories, 2);
        assert_eq!(config.max_markers_per_category, 500);
    }

    #[test]
    fn empty_seed_is_valid() {
        let file = write_seed("{}");
        let seed = load_seed(file.path()).unwrap();
        assert!(seed.categories.is_empty());
        assert_eq!(seed.config(), Config::default());
    }

    #[test]
    fn load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(load_seed(&missing), Err(CliError::Io { .. })));

        let file = write_seed("{ not json");
        assert!(matches!(load_seed(file.path()), Err(CliError::Parse { .. })));
    }

    #[test]
    fn populate_reports_failures() {
        let file = write_seed(SEED);
        let seed = load_seed(file.path()).unwrap();
        let server = BlipServer::new(seed.config(), RecordingTransport::new(), seed.identity());

        let report = populate(&server, &seed);
        assert_eq!(report.categories_created, 2);
        assert_eq!(report.markers_added, 1);
        assert_eq!(report.role_markers_added, 0);

        let items: Vec<_> = report.failures.iter().map(|f| f.item.as_str()).collect();
        assert_eq!(items, vec!["categories[third]", "markers[1]", "roleMarkers.police[0]"]);
    }
}
