//! Peer Heartbeat Monitoring
//!
//! Periodically classifies every configured peer as alive or down by
//! probing its `/health` endpoint. Statuses are observational: nothing
//! else in the node consults them yet.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{Error, Result};

/// Periodic liveness prober over a static peer set.
///
/// Each cycle rebuilds the whole status map, so a peer removed from the
/// probe results can never linger with a stale entry.
pub struct HeartbeatMonitor {
    /// Peer base URLs
    peers: Vec<String>,
    /// Time between heartbeat cycles
    interval: Duration,
    /// HTTP client with the probe timeout applied
    client: reqwest::Client,
    /// Latest per-peer liveness; same lock discipline as the leader state
    statuses: Mutex<HashMap<String, bool>>,
    /// Cancellation signal for the background loop
    shutdown_tx: watch::Sender<bool>,
}

impl HeartbeatMonitor {
    /// Create a new heartbeat monitor
    pub fn new(peers: Vec<String>, interval: Duration, probe_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(probe_timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            peers,
            interval,
            client,
            statuses: Mutex::new(HashMap::new()),
            shutdown_tx,
        })
    }

    /// Launch the perpetual heartbeat loop.
    ///
    /// The first cycle runs immediately; later cycles follow the interval.
    pub fn start(self: &Arc<Self>) {
        let monitor = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            tracing::info!(
                "Heartbeat loop started ({} peers, interval {:?})",
                monitor.peers.len(),
                monitor.interval
            );
            loop {
                monitor.run_cycle().await;
                tokio::select! {
                    _ = tokio::time::sleep(monitor.interval) => {}
                    _ = shutdown_rx.changed() => {
                        tracing::info!("Heartbeat loop stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Stop the heartbeat loop, unblocking its sleep.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Probe every configured peer once and swap in the fresh status map.
    pub async fn run_cycle(&self) {
        let mut fresh = HashMap::with_capacity(self.peers.len());

        for peer in &self.peers {
            let alive = self.probe(peer).await;
            if alive {
                tracing::info!("Heartbeat: {} ALIVE", peer);
            } else {
                tracing::warn!("Heartbeat: {} DOWN", peer);
            }
            fresh.insert(peer.clone(), alive);
        }

        // Whole-map swap: entries are overwritten, never merged
        *self.statuses.lock().unwrap() = fresh;
    }

    /// One bounded-timeout probe. Success is exactly HTTP 200; any
    /// transport error or other status classifies the peer as down.
    async fn probe(&self, peer: &str) -> bool {
        let url = format!("{}/health", peer);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(_) => false,
        }
    }

    /// Latest liveness for one peer; false when never probed.
    pub fn is_alive(&self, peer: &str) -> bool {
        self.statuses
            .lock()
            .unwrap()
            .get(peer)
            .copied()
            .unwrap_or(false)
    }

    /// Snapshot of the whole status map.
    pub fn statuses(&self) -> HashMap<String, bool> {
        self.statuses.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use tokio::task::JoinHandle;

    async fn spawn_health_stub(status: StatusCode) -> (String, JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/health", get(move || async move { status }));
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), handle)
    }

    /// A base URL nothing is listening on.
    async fn dead_peer() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_cycle_classifies_alive_and_down() {
        let (alive_a, handle_a) = spawn_health_stub(StatusCode::OK).await;
        let down_b = dead_peer().await;
        let (alive_c, handle_c) = spawn_health_stub(StatusCode::OK).await;

        let monitor = HeartbeatMonitor::new(
            vec![alive_a.clone(), down_b.clone(), alive_c.clone()],
            Duration::from_secs(5),
            Duration::from_millis(500),
        )
        .unwrap();

        monitor.run_cycle().await;

        let statuses = monitor.statuses();
        assert_eq!(statuses.len(), 3);
        assert_eq!(statuses[&alive_a], true);
        assert_eq!(statuses[&down_b], false);
        assert_eq!(statuses[&alive_c], true);

        handle_a.abort();
        handle_c.abort();
    }

    #[tokio::test]
    async fn test_non_200_counts_as_down() {
        let (peer, handle) = spawn_health_stub(StatusCode::INTERNAL_SERVER_ERROR).await;

        let monitor = HeartbeatMonitor::new(
            vec![peer.clone()],
            Duration::from_secs(5),
            Duration::from_millis(500),
        )
        .unwrap();

        monitor.run_cycle().await;
        assert!(!monitor.is_alive(&peer));

        handle.abort();
    }

    #[tokio::test]
    async fn test_cycle_overwrites_previous_statuses() {
        let (peer, handle) = spawn_health_stub(StatusCode::OK).await;

        let monitor = HeartbeatMonitor::new(
            vec![peer.clone()],
            Duration::from_secs(5),
            Duration::from_millis(500),
        )
        .unwrap();

        monitor.run_cycle().await;
        assert!(monitor.is_alive(&peer));

        // Kill the stub; the next cycle must flip the entry, not merge
        handle.abort();
        tokio::time::sleep(Duration::from_millis(50)).await;

        monitor.run_cycle().await;
        assert!(!monitor.is_alive(&peer));
        assert_eq!(monitor.statuses().len(), 1);
    }

    #[tokio::test]
    async fn test_unprobed_peer_reads_as_down() {
        let monitor = HeartbeatMonitor::new(
            vec!["http://localhost:1".to_string()],
            Duration::from_secs(5),
            Duration::from_millis(100),
        )
        .unwrap();

        assert!(!monitor.is_alive("http://localhost:1"));
        assert!(monitor.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_background_loop_runs_and_stops() {
        let (peer, handle) = spawn_health_stub(StatusCode::OK).await;

        let monitor = Arc::new(
            HeartbeatMonitor::new(
                vec![peer.clone()],
                Duration::from_millis(50),
                Duration::from_millis(500),
            )
            .unwrap(),
        );

        monitor.start();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(monitor.is_alive(&peer));

        monitor.stop();
        handle.abort();
    }
}
