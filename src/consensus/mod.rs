// Consensus - Proof of Synergy scoring engine and round coordination
pub mod coordinator;
pub mod engine;
pub mod participant;
pub mod synergy;

pub use coordinator::{ConsensusCoordinator, ConsensusError, RoundOutcome, RoundState};
pub use engine::{BehaviorPolicy, CycleSummary, EngineError, FixedBehavior, NetworkStats, PoSygEngine, SeededBehavior};
pub use participant::{Behavior, Participant};
