// Network - Peer registry and message delivery capability
pub mod peer;

pub use peer::{NetworkError, PeerId, PeerInfo, PeerRegistry};
