//! External collaborators (§6).
//!
//! The pipeline never reaches for a process-wide singleton or a back-pointer
//! into a connection/node/service cycle (§9's redesign flags) — every
//! external capability it needs is one of these traits, handed in
//! explicitly at construction. Concrete transport/overlay adapters implement
//! them; this crate ships no networked implementation, only the seam.

use async_trait::async_trait;

use crate::hash::BlockHash;

/// Opaque handle to a peer connection, as returned by [`Broadcaster::broadcast`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerHandle(pub String);

/// Best-effort fanout to overlay peers.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Sends `message` to every connected peer except `exclude`, returning
    /// the peers it was actually sent to.
    async fn broadcast(&self, message: &[u8], exclude: Option<&PeerHandle>) -> Vec<PeerHandle>;
}

/// Outbound channel back to the local blockchain node.
#[async_trait]
pub trait LocalNodeSink: Send + Sync {
    /// Sends `bytes` to the local node, queueing internally if disconnected.
    /// Returns [`crate::error::GatewayError::SendQueueFull`] if the internal
    /// queue itself is at capacity — the caller should retry, not treat it
    /// as fatal (§7).
    async fn send_to_local_node(&self, bytes: &[u8]) -> crate::error::Result<()>;
}

/// Handles block encryption for overlay propagation and later key release.
#[async_trait]
pub trait NeutralityService: Send + Sync {
    /// Encrypts and propagates `block_bytes` to the overlay on behalf of `source`.
    async fn propagate(&self, block_bytes: &[u8], source: Option<&PeerHandle>, hash: BlockHash);

    /// Returns the encryption key previously generated for `hash`, if any.
    async fn get_encryption_key(&self, hash: BlockHash) -> Option<Vec<u8>>;
}

/// Out-of-band transaction recovery for partial reconstructions.
#[async_trait]
pub trait RecoveryService: Send + Sync {
    /// Requests the transactions at `missing_indices` for `hash` from peers
    /// that may hold them.
    async fn request(&self, hash: BlockHash, missing_indices: &[usize]);

    /// Cancels any outstanding recovery request for `hash` (e.g. a duplicate
    /// full block arrived first).
    async fn cancel(&self, hash: BlockHash);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBroadcaster {
        sent: Mutex<Vec<(Vec<u8>, Option<PeerHandle>)>>,
    }

    #[async_trait]
    impl Broadcaster for RecordingBroadcaster {
        async fn broadcast(&self, message: &[u8], exclude: Option<&PeerHandle>) -> Vec<PeerHandle> {
            self.sent
                .lock()
                .unwrap()
                .push((message.to_vec(), exclude.cloned()));
            vec![PeerHandle("peer-a".into())]
        }
    }

    #[tokio::test]
    async fn broadcaster_trait_is_object_safe_and_callable() {
        let broadcaster: Box<dyn Broadcaster> = Box::new(RecordingBroadcaster::default());
        let peers = broadcaster.broadcast(b"hello", None).await;
        assert_eq!(peers, vec![PeerHandle("peer-a".into())]);
    }
}
