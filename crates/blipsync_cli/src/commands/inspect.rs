//! Inspect command implementation.

use super::{populate, CliError, CliResult, Seed, SeedReport};
use blipsync_core::{ClientId, RegistryStats};
use blipsync_server::{BlipServer, RecordingTransport};
use serde::Serialize;

/// Seed inspection result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectResult {
    /// What was loaded and what was rejected.
    pub seed: SeedReport,
    /// Registry contents after loading.
    pub stats: RegistryStats,
    /// What each seed client would see.
    pub clients: Vec<ClientVisibility>,
}

/// Visibility summary for one seed client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientVisibility {
    /// Client id.
    pub id: ClientId,
    /// Client role.
    pub role: String,
    /// Number of markers in its initial view.
    pub visible_markers: usize,
}

/// Loads `seed` into an in-memory server and summarizes the result.
pub fn inspect(seed: &Seed) -> InspectResult {
    let server = BlipServer::new(seed.config(), RecordingTransport::new(), seed.identity());
    let report = populate(&server, seed);

    let clients = seed
        .clients
        .iter()
        .map(|client| {
            server.client_connected(client.id);
            ClientVisibility {
                id: client.id,
                role: client.role.clone(),
                visible_markers: server.client_view(client.id).map_or(0, |v| v.len()),
            }
        })
        .collect();

    InspectResult {
        seed: report,
        stats: server.stats(),
        clients,
    }
}

/// Runs the inspect command.
pub fn run(seed: &Seed, format: &str) -> CliResult<()> {
    let result = inspect(seed);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "text" => print_text_output(&result),
        other => return Err(CliError::UnknownFormat(other.to_string())),
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    let stats = &result.stats;
    println!("Registry");
    println!(
        "  Categories:    {} ({} enabled)",
        stats.total_categories, stats.enabled_categories
    );
    println!(
        "  Markers:       {} ({} enabled, {} uncategorized)",
        stats.total_markers, stats.enabled_markers, stats.uncategorized_markers
    );
    println!("  Next id:       {}", stats.next_marker_id);

    if !stats.markers_per_category.is_empty() {
        println!();
        println!("Categories");
        for (id, count) in &stats.markers_per_category {
            println!("  {:<20} {}", id, count);
        }
    }

    if !result.clients.is_empty() {
        println!();
        println!("Clients");
        for client in &result.clients {
            println!(
                "  {:<12} {:<12} {} visible",
                client.id.to_string(),
                client.role,
                client.visible_markers
            );
        }
    }

    if !result.seed.failures.is_empty() {
        println!();
        println!("Rejected ({})", result.seed.failures.len());
        for failure in &result.seed.failures {
            println!("  {}: {}", failure.item, failure.error);
        }
    }
}
