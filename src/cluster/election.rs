//! Leader Election
//!
//! Simulated leader rotation: every cycle one cluster member is chosen
//! uniformly at random and designated leader. No votes are exchanged and
//! nothing is agreed between nodes; each node runs its own independent
//! cycle, so two nodes can disagree on the leader for up to one interval.
//!
//! The service sits behind the [`LeaderElection`] trait so a quorum-based
//! implementation can replace the random strategy without touching callers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tokio::sync::watch;

/// Interface a genuine consensus implementation would expose.
///
/// `elect_once` is async because a real implementation exchanges votes
/// over the network; the simulated strategy completes immediately.
#[async_trait]
pub trait LeaderElection: Send + Sync {
    /// Run exactly one election cycle.
    async fn elect_once(&self);

    /// True iff `node_id` is the current leader.
    fn is_leader(&self, node_id: &str) -> bool;

    /// Current leader snapshot, `None` before the first completed cycle.
    fn current_leader(&self) -> Option<String>;
}

/// Periodic random leader rotation over a static membership.
pub struct ElectionService {
    /// This node's ID
    self_id: String,
    /// All cluster member identifiers, including self
    membership: Vec<String>,
    /// Time between election cycles
    interval: Duration,
    /// Current leader; lock held only for the snapshot swap
    leader: Mutex<Option<String>>,
    /// Cancellation signal for the background loop
    shutdown_tx: watch::Sender<bool>,
}

impl ElectionService {
    /// Create a new election service
    pub fn new(self_id: String, membership: Vec<String>, interval: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            self_id,
            membership,
            interval,
            leader: Mutex::new(None),
            shutdown_tx,
        }
    }

    /// Launch the perpetual election loop.
    ///
    /// The first cycle runs only after a full interval has elapsed, so
    /// [`LeaderElection::current_leader`] stays `None` until then.
    pub fn start(self: &Arc<Self>) {
        let service = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            tracing::info!(
                "Election loop started ({} members, interval {:?})",
                service.membership.len(),
                service.interval
            );
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(service.interval) => {
                        service.elect_once().await;
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!("Election loop stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Stop the election loop, unblocking its sleep.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[async_trait]
impl LeaderElection for ElectionService {
    async fn elect_once(&self) {
        let elected = {
            let mut rng = rand::thread_rng();
            match self.membership.choose(&mut rng) {
                Some(member) => member.clone(),
                None => return,
            }
        };

        *self.leader.lock().unwrap() = Some(elected.clone());

        if elected == self.self_id {
            tracing::info!("Elected self ({}) as cluster leader", self.self_id);
        } else {
            tracing::info!("Node {} following leader {}", self.self_id, elected);
        }
    }

    fn is_leader(&self, node_id: &str) -> bool {
        self.leader
            .lock()
            .unwrap()
            .as_deref()
            .map(|leader| leader == node_id)
            .unwrap_or(false)
    }

    fn current_leader(&self) -> Option<String> {
        self.leader.lock().unwrap().clone()
    }
}
