//! Replication Fan-Out
//!
//! After a file is durably written locally, copies it to every configured
//! peer. Dispatch is at-most-once per filename for the process lifetime
//! and strictly fire-and-forget: per-peer transfers run as independent
//! tasks and their outcome never reaches the caller.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};

/// Fans out stored files to peers, once per filename.
pub struct ReplicationDispatcher {
    /// Peer base URLs
    peers: Vec<String>,
    /// Fixed delay before each transfer (load smoothing)
    dispatch_delay: Duration,
    /// HTTP client with the transfer timeout applied
    client: reqwest::Client,
    /// Filenames for which a fan-out has ever been dispatched.
    /// Append-only; a failed transfer is never removed.
    ledger: Mutex<HashSet<String>>,
}

impl ReplicationDispatcher {
    /// Create a new replication dispatcher
    pub fn new(
        peers: Vec<String>,
        dispatch_delay: Duration,
        transfer_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(transfer_timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            peers,
            dispatch_delay,
            client,
            ledger: Mutex::new(HashSet::new()),
        })
    }

    /// Fan `filename` out to every peer, unless it was already dispatched.
    ///
    /// The ledger insert happens before any network call, so a second
    /// trigger for the same filename (sequential or concurrent) dispatches
    /// nothing, even when the underlying content has changed since. One
    /// transfer task is spawned per peer; the call returns without waiting
    /// on any of them.
    pub fn trigger(self: &Arc<Self>, filename: &str, local_path: &Path) {
        {
            let mut ledger = self.ledger.lock().unwrap();
            if !ledger.insert(filename.to_string()) {
                tracing::debug!("Replication of '{}' already dispatched, skipping", filename);
                return;
            }
        }

        tracing::info!(
            "Dispatching replication of '{}' to {} peer(s)",
            filename,
            self.peers.len()
        );

        for peer in &self.peers {
            let dispatcher = Arc::clone(self);
            let peer = peer.clone();
            let filename = filename.to_string();
            let path = local_path.to_path_buf();

            tokio::spawn(async move {
                tokio::time::sleep(dispatcher.dispatch_delay).await;
                match dispatcher.transfer(&peer, &filename, &path).await {
                    Ok(status) => {
                        tracing::info!("Replicated '{}' to {} [{}]", filename, peer, status);
                    }
                    Err(e) if e.is_transport() => {
                        tracing::warn!("Replication of '{}' to {} failed: {}", filename, peer, e);
                    }
                    Err(e) => {
                        tracing::error!("Replication of '{}' to {} aborted: {}", filename, peer, e);
                    }
                }
            });
        }
    }

    /// True iff a fan-out has ever been dispatched for `filename`.
    ///
    /// Dispatched does not mean delivered: a peer may have rejected or
    /// never received the transfer.
    pub fn is_dispatched(&self, filename: &str) -> bool {
        self.ledger.lock().unwrap().contains(filename)
    }

    /// Number of filenames ever dispatched.
    pub fn dispatched_count(&self) -> usize {
        self.ledger.lock().unwrap().len()
    }

    /// One transfer to one peer: read the file, build the multipart body,
    /// POST it. Any 2xx response is success.
    async fn transfer(&self, peer: &str, filename: &str, path: &Path) -> Result<reqwest::StatusCode> {
        let bytes = tokio::fs::read(path).await.map_err(|e| Error::LocalIo {
            path: path.to_path_buf(),
            source: e,
        })?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| Error::Protocol(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = format!("{}/upload", peer);
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Transport {
                peer: peer.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Transport {
                peer: peer.to_string(),
                reason: format!("upload endpoint returned {}", status),
            });
        }

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use tokio::task::JoinHandle;

    /// Upload stub that counts hits and answers with a fixed status.
    async fn spawn_upload_stub(
        status: StatusCode,
    ) -> (String, Arc<AtomicUsize>, JoinHandle<()>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route(
            "/upload",
            post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    status
                }
            }),
        );
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), hits, handle)
    }

    fn dispatcher(peers: Vec<String>) -> Arc<ReplicationDispatcher> {
        Arc::new(
            ReplicationDispatcher::new(
                peers,
                Duration::from_millis(10),
                Duration::from_secs(5),
            )
            .unwrap(),
        )
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(400)).await;
    }

    #[tokio::test]
    async fn test_trigger_reaches_every_peer_without_blocking() {
        let (peer_a, hits_a, handle_a) = spawn_upload_stub(StatusCode::OK).await;
        let (peer_b, hits_b, handle_b) = spawn_upload_stub(StatusCode::OK).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, b"a,b,c\n1,2,3\n").unwrap();

        let dispatcher = dispatcher(vec![peer_a, peer_b]);

        let started = Instant::now();
        dispatcher.trigger("report.csv", &path);
        assert!(started.elapsed() < Duration::from_millis(100));

        settle().await;
        assert_eq!(hits_a.load(Ordering::SeqCst), 1);
        assert_eq!(hits_b.load(Ordering::SeqCst), 1);
        assert!(dispatcher.is_dispatched("report.csv"));

        handle_a.abort();
        handle_b.abort();
    }

    #[tokio::test]
    async fn test_sequential_retrigger_dispatches_nothing() {
        let (peer, hits, handle) = spawn_upload_stub(StatusCode::OK).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"v1").unwrap();

        let dispatcher = dispatcher(vec![peer]);
        dispatcher.trigger("notes.txt", &path);
        dispatcher.trigger("notes.txt", &path);

        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.dispatched_count(), 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_concurrent_triggers_dispatch_once() {
        let (peer_a, hits_a, handle_a) = spawn_upload_stub(StatusCode::OK).await;
        let (peer_b, hits_b, handle_b) = spawn_upload_stub(StatusCode::OK).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();

        let dispatcher = dispatcher(vec![peer_a, peer_b]);

        let d1 = Arc::clone(&dispatcher);
        let p1 = path.clone();
        let t1 = tokio::spawn(async move { d1.trigger("big.bin", &p1) });
        let d2 = Arc::clone(&dispatcher);
        let p2 = path.clone();
        let t2 = tokio::spawn(async move { d2.trigger("big.bin", &p2) });
        let (r1, r2) = tokio::join!(t1, t2);
        r1.unwrap();
        r2.unwrap();

        settle().await;
        assert_eq!(hits_a.load(Ordering::SeqCst), 1);
        assert_eq!(hits_b.load(Ordering::SeqCst), 1);

        handle_a.abort();
        handle_b.abort();
    }

    #[tokio::test]
    async fn test_one_peer_failing_never_affects_another() {
        let (peer_b, hits_b, handle_b) = spawn_upload_stub(StatusCode::INTERNAL_SERVER_ERROR).await;
        let (peer_c, hits_c, handle_c) = spawn_upload_stub(StatusCode::OK).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, b"rows").unwrap();

        let dispatcher = dispatcher(vec![peer_b, peer_c]);
        dispatcher.trigger("report.csv", &path);

        settle().await;
        // Both peers were attempted exactly once; B's failure stayed local
        assert_eq!(hits_b.load(Ordering::SeqCst), 1);
        assert_eq!(hits_c.load(Ordering::SeqCst), 1);
        assert!(dispatcher.is_dispatched("report.csv"));

        handle_b.abort();
        handle_c.abort();
    }

    #[tokio::test]
    async fn test_retrigger_after_content_change_dispatches_nothing() {
        let (peer, hits, handle) = spawn_upload_stub(StatusCode::OK).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, b"original").unwrap();

        let dispatcher = dispatcher(vec![peer]);
        dispatcher.trigger("report.csv", &path);
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Same name, new content: dedup is by filename, permanently
        std::fs::write(&path, b"completely different bytes").unwrap();
        dispatcher.trigger("report.csv", &path);
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_missing_local_file_fails_silently_and_permanently() {
        let (peer, hits, handle) = spawn_upload_stub(StatusCode::OK).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ghost.dat");

        let dispatcher = dispatcher(vec![peer]);
        dispatcher.trigger("ghost.dat", &path);

        settle().await;
        // Read failed before any request; the ledger entry still stands
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(dispatcher.is_dispatched("ghost.dat"));

        handle.abort();
    }

    #[tokio::test]
    async fn test_unreachable_peer_fails_silently() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"payload").unwrap();

        let dispatcher = dispatcher(vec![format!("http://{}", addr)]);
        dispatcher.trigger("data.bin", &path);

        settle().await;
        assert!(dispatcher.is_dispatched("data.bin"));
    }
}
