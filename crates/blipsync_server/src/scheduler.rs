//! Periodic reconciliation.
//!
//! Every interval the scheduler full-syncs each tracked client, so any
//! missed or reordered diff is corrected within one interval. Event-driven
//! reactions (connect, role change, disconnect) live on [`BlipServer`] and
//! may run concurrently with a sweep; a full sync is idempotent, so the
//! interleaving does not matter.

use crate::identity::IdentityProvider;
use crate::server::BlipServer;
use crate::transport::EventTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, trace, warn};

/// Handle to the periodic full-resync task.
///
/// Stopping prevents future sweeps but never interrupts one in progress.
/// Dropping the handle without calling [`stop`](Self::stop) also ends the
/// loop after the current sweep.
pub struct ReconciliationScheduler {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    interval: Option<Duration>,
}

impl ReconciliationScheduler {
    /// Starts the sweep loop using the server's configured interval.
    ///
    /// When the interval is disabled no task is spawned. Must be called
    /// from within a tokio runtime.
    pub fn start<T, I>(server: Arc<BlipServer<T, I>>) -> Self
    where
        T: EventTransport + 'static,
        I: IdentityProvider + 'static,
    {
        let interval = server.config().sync_interval();
        Self::start_with_interval(server, interval)
    }

    /// Starts the sweep loop with an explicit interval.
    ///
    /// `None` or a zero interval disables the loop.
    pub fn start_with_interval<T, I>(
        server: Arc<BlipServer<T, I>>,
        interval: Option<Duration>,
    ) -> Self
    where
        T: EventTransport + 'static,
        I: IdentityProvider + 'static,
    {
        let interval = interval.filter(|period| !period.is_zero());
        let (shutdown, mut stopped) = watch::channel(false);

        let task = match interval {
            Some(period) => {
                info!(interval = ?period, "starting reconciliation loop");
                Some(tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    // Connecting clients are synced immediately; the first
                    // sweep is due one period from now.
                    ticker.tick().await;

                    loop {
                        tokio::select! {
                            _ = ticker.tick() => {
                                let synced = server.reconcile_all();
                                trace!(synced, "reconciliation sweep finished");
                            }
                            changed = stopped.changed() => {
                                if changed.is_err() || *stopped.borrow() {
                                    break;
                                }
                            }
                        }
                    }
                    info!("reconciliation loop stopped");
                }))
            }
            None => {
                info!("periodic reconciliation disabled");
                None
            }
        };

        Self {
            shutdown,
            task,
            interval,
        }
    }

    /// Returns the sweep interval, or `None` if disabled.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Returns true while the sweep task is alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops the loop and waits for it to exit.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "reconciliation task ended abnormally");
            }
        }
    }
}

impl Drop for ReconciliationScheduler {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SyncEvent;
    use crate::identity::StaticIdentityProvider;
    use crate::transport::RecordingTransport;
    use blipsync_core::{ClientId, Config, RoleSnapshot};

    type TestServer = BlipServer<RecordingTransport, StaticIdentityProvider>;

    fn server(interval_ms: i64) -> Arc<TestServer> {
        let identity =
            StaticIdentityProvider::new().with(ClientId(1), RoleSnapshot::new("police", 0));
        Arc::new(BlipServer::new(
            Config::new().with_sync_interval_ms(interval_ms),
            RecordingTransport::new(),
            identity,
        ))
    }

    fn full_syncs(server: &TestServer, client: ClientId) -> usize {
        server
            .transport()
            .events_for(client)
            .iter()
            .filter(|e| matches!(e, SyncEvent::FullSync { .. }))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_every_interval() {
        let server = server(1_000);
        server.client_connected(ClientId(1));
        assert_eq!(full_syncs(&server, ClientId(1)), 1);

        let scheduler = ReconciliationScheduler::start(Arc::clone(&server));
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(full_syncs(&server, ClientId(1)) >= 3);

        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_future_sweeps() {
        let server = server(1_000);
        server.client_connected(ClientId(1));

        let scheduler = ReconciliationScheduler::start(Arc::clone(&server));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        scheduler.stop().await;

        let after_stop = full_syncs(&server, ClientId(1));
        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert_eq!(full_syncs(&server, ClientId(1)), after_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_interval_spawns_nothing() {
        let server = server(0);
        server.client_connected(ClientId(1));

        let scheduler = ReconciliationScheduler::start(Arc::clone(&server));
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.interval(), None);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(full_syncs(&server, ClientId(1)), 1);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_disabled() {
        let server = server(1_000);
        server.client_connected(ClientId(1));

        let scheduler =
            ReconciliationScheduler::start_with_interval(Arc::clone(&server), Some(Duration::ZERO));
        assert_eq!(scheduler.interval(), None);
        assert!(!scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(full_syncs(&server, ClientId(1)), 1);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_clients_are_not_swept() {
        let server = server(1_000);
        server.client_connected(ClientId(1));
        server.client_connected(ClientId(2));
        server.client_disconnected(ClientId(2));

        let scheduler = ReconciliationScheduler::start(Arc::clone(&server));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        scheduler.stop().await;

        assert_eq!(full_syncs(&server, ClientId(2)), 1);
        assert!(full_syncs(&server, ClientId(1)) >= 2);
    }
}
