// Peer registry - Known peers and best-effort message delivery
//
// Transport is out of scope for the node core: consensus only needs a
// registry of peers and a way to hand them messages. Delivery here is a
// logged simulation; callers treat unreachable peers as non-fatal.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

/// Stable identifier of a peer node.
pub type PeerId = u64;

/// What we know about one peer.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub id: PeerId,
    pub address: String,
    pub first_seen: Instant,
    pub last_seen: Instant,
    pub messages_sent: u64,
}

/// Registry of known peers. Interior-mutable so consensus can announce
/// through a shared handle.
#[derive(Default)]
pub struct PeerRegistry {
    peers: Mutex<HashMap<PeerId, PeerInfo>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer, or refresh its address if already known.
    pub fn register_peer(&self, id: PeerId, address: impl Into<String>) {
        let address = address.into();
        let mut peers = self.peers.lock();
        let now = Instant::now();
        peers
            .entry(id)
            .and_modify(|info| {
                info.address = address.clone();
                info.last_seen = now;
            })
            .or_insert_with(|| {
                debug!(peer = id, %address, "peer registered");
                PeerInfo {
                    id,
                    address,
                    first_seen: now,
                    last_seen: now,
                    messages_sent: 0,
                }
            });
    }

    /// Deliver a message to one peer.
    pub fn send(&self, peer: PeerId, message: &str) -> Result<(), NetworkError> {
        let mut peers = self.peers.lock();
        let info = peers.get_mut(&peer).ok_or(NetworkError::UnknownPeer(peer))?;
        info.last_seen = Instant::now();
        info.messages_sent += 1;
        debug!(peer, address = %info.address, message, "message delivered");
        Ok(())
    }

    /// Deliver a message to every registered peer; failures are logged and
    /// skipped. Returns how many peers the message reached.
    pub fn broadcast(&self, message: &str) -> usize {
        let ids = self.peer_ids();
        let mut delivered = 0;
        for id in ids {
            match self.send(id, message) {
                Ok(()) => delivered += 1,
                Err(err) => warn!(peer = id, %err, "broadcast delivery failed"),
            }
        }
        delivered
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.peers.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn peer(&self, id: PeerId) -> Option<PeerInfo> {
        self.peers.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_and_lookup() {
        let registry = PeerRegistry::new();
        assert!(registry.is_empty());

        registry.register_peer(7, "10.0.0.7:30333");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.peer(7).unwrap().address, "10.0.0.7:30333");

        registry.register_peer(7, "10.0.0.8:30333");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.peer(7).unwrap().address, "10.0.0.8:30333");
    }

    #[test]
    fn sending_to_an_unknown_peer_fails() {
        let registry = PeerRegistry::new();
        assert!(matches!(registry.send(1, "hello"), Err(NetworkError::UnknownPeer(1))));
    }

    #[test]
    fn broadcast_counts_deliveries_and_bumps_counters() {
        let registry = PeerRegistry::new();
        registry.register_peer(1, "a");
        registry.register_peer(2, "b");

        assert_eq!(registry.broadcast("finalized block"), 2);
        assert_eq!(registry.peer(1).unwrap().messages_sent, 1);
        assert_eq!(registry.peer(2).unwrap().messages_sent, 1);
    }

    #[test]
    fn peer_ids_are_sorted() {
        let registry = PeerRegistry::new();
        registry.register_peer(9, "a");
        registry.register_peer(3, "b");
        assert_eq!(registry.peer_ids(), vec![3, 9]);
    }
}
