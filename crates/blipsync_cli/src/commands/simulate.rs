//! Simulate command implementation.
//!
//! Runs the server against in-process clients: each seed client gets a
//! channel, the seed is loaded while they are connected, and the
//! reconciliation loop runs until the time is up.

use super::{populate, CliResult, Seed, SeedReport};
use blipsync_core::ClientId;
use blipsync_server::{BlipServer, ChannelTransport, ReconciliationScheduler, SyncEvent};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Simulation options.
#[derive(Debug, Clone, Copy)]
pub struct SimulateOptions {
    /// How long to run.
    pub duration: Duration,
    /// Overrides the seed's sync interval in milliseconds.
    pub interval_ms: Option<i64>,
}

/// Events one client received during a simulation.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTraffic {
    /// Total events received.
    pub events: usize,
    /// Count per event name.
    pub by_type: BTreeMap<&'static str, usize>,
}

/// Simulation result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    /// What was loaded and what was rejected.
    pub seed: SeedReport,
    /// Received events per client.
    pub clients: BTreeMap<ClientId, ClientTraffic>,
}

fn spawn_receiver(
    client: ClientId,
    mut events: UnboundedReceiver<SyncEvent>,
) -> JoinHandle<ClientTraffic> {
    tokio::spawn(async move {
        let mut traffic = ClientTraffic::default();
        while let Some(event) = events.recv().await {
            debug!(%client, event = event.name(), marker = ?event.marker_id(), "event received");
            traffic.events += 1;
            *traffic.by_type.entry(event.name()).or_default() += 1;
        }
        traffic
    })
}

/// Runs a simulation and returns what each client received.
pub async fn simulate(seed: &Seed, options: SimulateOptions) -> SimulationReport {
    let mut config = seed.config();
    if let Some(ms) = options.interval_ms {
        config = config.with_sync_interval_ms(ms);
    }

    let transport = Arc::new(ChannelTransport::new());
    let server = Arc::new(BlipServer::with_shared(
        config,
        Arc::clone(&transport),
        Arc::new(seed.identity()),
    ));

    let mut receivers = Vec::with_capacity(seed.clients.len());
    for client in &seed.clients {
        let events = transport.connect(client.id);
        receivers.push((client.id, spawn_receiver(client.id, events)));
        server.client_connected(client.id);
    }

    let report = populate(&server, seed);
    info!(
        categories = report.categories_created,
        markers = report.markers_added + report.role_markers_added,
        rejected = report.failures.len(),
        "seed loaded"
    );

    let scheduler = ReconciliationScheduler::start(Arc::clone(&server));
    tokio::time::sleep(options.duration).await;
    scheduler.stop().await;

    // Dropping the senders ends each receiver task.
    for client in &seed.clients {
        transport.disconnect(client.id);
        server.client_disconnected(client.id);
    }

    let mut clients = BTreeMap::new();
    for (client, handle) in receivers {
        match handle.await {
            Ok(traffic) => {
                clients.insert(client, traffic);
            }
            Err(err) => warn!(%client, error = %err, "receiver task failed"),
        }
    }

    SimulationReport {
        seed: report,
        clients,
    }
}

/// Runs the simulate command.
pub async fn run(seed: &Seed, options: SimulateOptions) -> CliResult<()> {
    let report = simulate(seed, options).await;

    println!("Simulated {:?}", options.duration);
    for (client, traffic) in &report.clients {
        println!("  {:<12} {} events", client.to_string(), traffic.events);
        for (name, count) in &traffic.by_type {
            println!("    {:<16} {}", name, count);
        }
    }
    for failure in &report.seed.failures {
        println!("  rejected {}: {}", failure.item, failure.error);
    }

    Ok(())
}
