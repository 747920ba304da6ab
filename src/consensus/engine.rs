// PoSyg engine - Owns all participants' economic state and runs the
// periodic scoring cycles
//
// Per-participant phases fan out over rayon with strict per-slot isolation;
// every aggregate (ratios, totals, statistics) is a local-partial reduction
// merged in a single step. External mutation goes through `&mut self`, so
// the arena follows single-writer discipline by construction.

use super::participant::{Behavior, Participant, VIOLATION_THRESHOLD};
use super::synergy;
use crate::types::ParticipantId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// Baseline conversion rate before the dishonest-ratio adjustment.
pub const BASE_CONVERSION_RATE: f64 = 0.1;

/// Share of cycles a default-policy participant acts dishonestly, in tenths.
pub const DEFAULT_DISHONEST_TENTHS: u32 = 3;

/// Source of per-cycle behavior assignments.
///
/// Implementations must be pure in `(cycle, participant)` so the scoring
/// fan-out stays deterministic under any parallel schedule. Inject a fixed
/// or seeded policy to make whole runs reproducible.
pub trait BehaviorPolicy: Send + Sync {
    fn behavior_for(&self, cycle: u64, participant: ParticipantId) -> Behavior;
}

/// Deterministic pseudo-random policy: a seeded draw per `(cycle,
/// participant)` pair, dishonest with the configured probability.
pub struct SeededBehavior {
    seed: u64,
    dishonest_tenths: u32,
}

impl SeededBehavior {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            dishonest_tenths: DEFAULT_DISHONEST_TENTHS,
        }
    }

    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    /// splitmix64 finalizer over the seed and coordinates, so each pair gets
    /// an independent, schedule-free draw.
    fn mix(&self, cycle: u64, participant: ParticipantId) -> u64 {
        let mut x = self.seed
            ^ cycle.wrapping_mul(0x9e37_79b9_7f4a_7c15)
            ^ participant.wrapping_mul(0xbf58_476d_1ce4_e5b9);
        x ^= x >> 30;
        x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
        x ^= x >> 27;
        x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
        x ^= x >> 31;
        x
    }
}

impl BehaviorPolicy for SeededBehavior {
    fn behavior_for(&self, cycle: u64, participant: ParticipantId) -> Behavior {
        let mut rng = StdRng::seed_from_u64(self.mix(cycle, participant));
        if rng.gen_range(0..10) < self.dishonest_tenths {
            Behavior::Dishonest
        } else {
            Behavior::Honest
        }
    }
}

/// Policy that assigns the same behavior to everyone. Used by tests and
/// demo scenarios.
pub struct FixedBehavior(pub Behavior);

impl BehaviorPolicy for FixedBehavior {
    fn behavior_for(&self, _cycle: u64, _participant: ParticipantId) -> Behavior {
        self.0
    }
}

/// Read-projection over the whole population. Recomputed on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkStats {
    pub honest: usize,
    pub dishonest: usize,
    pub total_rewards: f64,
    pub total_penalties: f64,
    pub slashed: usize,
    pub total_contribution: f64,
}

impl NetworkStats {
    fn absorb(&mut self, p: &Participant) {
        match p.behavior {
            Behavior::Honest => self.honest += 1,
            Behavior::Dishonest => self.dishonest += 1,
        }
        self.total_rewards += p.reward;
        self.total_penalties += p.penalty;
        if p.slashed {
            self.slashed += 1;
        }
        self.total_contribution += p.economic_contribution;
    }

    fn merge(mut self, other: Self) -> Self {
        self.honest += other.honest;
        self.dishonest += other.dishonest;
        self.total_rewards += other.total_rewards;
        self.total_penalties += other.total_penalties;
        self.slashed += other.slashed;
        self.total_contribution += other.total_contribution;
        self
    }
}

/// Outcome of one scoring cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleSummary {
    pub cycle: u64,
    pub dishonest_ratio: f64,
    pub newly_slashed: usize,
}

/// The participant registry. Ids are dense 0..N-1, assigned at construction.
pub struct PoSygEngine {
    participants: Vec<Participant>,
    policy: Box<dyn BehaviorPolicy>,
    synergy_gain: f64,
    penalty_increment: f64,
    conversion_rate: f64,
    slash_penalty: f64,
    total_economic_activity: f64,
    cycle: u64,
}

impl PoSygEngine {
    pub fn new(population: usize) -> Self {
        Self::with_policy(population, Box::new(SeededBehavior::from_entropy()))
    }

    pub fn with_policy(population: usize, policy: Box<dyn BehaviorPolicy>) -> Self {
        let participants = (0..population as ParticipantId).map(Participant::new).collect();
        Self {
            participants,
            policy,
            synergy_gain: super::participant::SYNERGY_PER_ACTIVITY,
            penalty_increment: super::participant::PENALTY_INCREMENT,
            conversion_rate: BASE_CONVERSION_RATE,
            slash_penalty: super::participant::SLASH_PENALTY,
            total_economic_activity: 0.0,
            cycle: 0,
        }
    }

    pub fn population(&self) -> usize {
        self.participants.len()
    }

    pub fn conversion_rate(&self) -> f64 {
        self.conversion_rate
    }

    pub fn synergy_gain(&self) -> f64 {
        self.synergy_gain
    }

    pub fn penalty_increment(&self) -> f64 {
        self.penalty_increment
    }

    /// One full scoring cycle: adapt tunables from the previous cycle's
    /// honesty ratio, assign this cycle's behaviors through the policy,
    /// score every participant, slash over-threshold violators, then
    /// distribute proportional rewards.
    pub fn run_cycle(&mut self) -> CycleSummary {
        self.cycle += 1;
        let dishonest_ratio = self.adjust_network_parameters();

        let cycle = self.cycle;
        let policy = &self.policy;
        self.participants.par_iter_mut().for_each(|p| {
            p.behavior = policy.behavior_for(cycle, p.id);
            p.update_synergy();
        });

        let newly_slashed = self.process_slashing();
        self.distribute_rewards();

        let summary = CycleSummary {
            cycle,
            dishonest_ratio,
            newly_slashed,
        };
        debug!(
            cycle = summary.cycle,
            dishonest_ratio = summary.dishonest_ratio,
            newly_slashed = summary.newly_slashed,
            "scoring cycle complete"
        );
        summary
    }

    /// Adapt the dynamic tunables to the dishonest ratio observed across
    /// the population. Returns the ratio.
    fn adjust_network_parameters(&mut self) -> f64 {
        if self.participants.is_empty() {
            return 0.0;
        }

        let dishonest = self
            .participants
            .par_iter()
            .filter(|p| p.behavior == Behavior::Dishonest)
            .count();
        let dishonest_ratio = dishonest as f64 / self.participants.len() as f64;

        if dishonest_ratio > 0.5 {
            self.penalty_increment *= 1.1;
            self.synergy_gain *= 0.9;
        } else {
            self.penalty_increment *= 0.95;
            self.synergy_gain *= 1.05;
        }
        self.conversion_rate = BASE_CONVERSION_RATE + 0.05 * dishonest_ratio;

        dishonest_ratio
    }

    /// Slash everyone whose recorded violations exceed the threshold.
    /// Returns how many were newly slashed.
    fn process_slashing(&mut self) -> usize {
        let slash_penalty = self.slash_penalty;
        self.participants
            .par_iter_mut()
            .map(|p| {
                if p.violations > VIOLATION_THRESHOLD && !p.slashed {
                    p.apply_slash(slash_penalty);
                    1
                } else {
                    0
                }
            })
            .sum()
    }

    /// Credit each unslashed participant with a reward share proportional
    /// to its synergy weight over the total economic activity.
    fn distribute_rewards(&mut self) {
        let total_synergy: f64 = self
            .participants
            .par_iter()
            .filter(|p| !p.slashed)
            .map(|p| p.synergy)
            .sum();

        // A fully-slashed (or zero-synergy) population earns nothing.
        if total_synergy <= 0.0 {
            return;
        }

        let total_activity = self.total_economic_activity;
        self.participants.par_iter_mut().for_each(|p| {
            if !p.slashed {
                p.reward += (p.synergy / total_synergy) * total_activity;
            }
        });
    }

    /// Full read-only scan; safe to run concurrently with other reads.
    pub fn statistics(&self) -> NetworkStats {
        self.participants
            .par_iter()
            .fold(NetworkStats::default, |mut acc, p| {
                acc.absorb(p);
                acc
            })
            .reduce(NetworkStats::default, NetworkStats::merge)
    }

    /// Consume every unslashed participant's synergy, converting it to
    /// tokens at the given rate. Synergy is destroyed, not copied.
    pub fn drain_synergy_to_tokens(&mut self, rate: f64) -> f64 {
        let total: f64 = self
            .participants
            .par_iter_mut()
            .map(|p| {
                if p.slashed {
                    0.0
                } else {
                    let tokens = synergy::convert_to_tokens(p.synergy, rate);
                    p.synergy = 0.0;
                    tokens
                }
            })
            .sum();
        info!(rate, total, "drained synergy to tokens");
        total
    }

    pub fn participant(&self, id: ParticipantId) -> Result<&Participant, EngineError> {
        let population = self.participants.len();
        self.participants
            .get(id as usize)
            .ok_or(EngineError::OutOfRange { id, population })
    }

    pub fn participant_mut(&mut self, id: ParticipantId) -> Result<&mut Participant, EngineError> {
        let population = self.participants.len();
        self.participants
            .get_mut(id as usize)
            .ok_or(EngineError::OutOfRange { id, population })
    }

    /// Slash a participant by id. Idempotent through the participant's own
    /// slash rules.
    pub fn apply_slash(&mut self, id: ParticipantId) -> Result<(), EngineError> {
        let slash_penalty = self.slash_penalty;
        self.participant_mut(id)?.apply_slash(slash_penalty);
        Ok(())
    }

    /// Slash the participant only if its activity profile is suspicious.
    /// Returns whether a slash was applied.
    pub fn slash_if_suspicious(&mut self, id: ParticipantId) -> Result<bool, EngineError> {
        let slash_penalty = self.slash_penalty;
        let p = self.participant_mut(id)?;
        if p.is_suspicious() && !p.slashed {
            p.apply_slash(slash_penalty);
            return Ok(true);
        }
        Ok(false)
    }

    pub fn restore_after_slash(&mut self, id: ParticipantId) -> Result<(), EngineError> {
        self.participant_mut(id)?.restore_after_slash();
        Ok(())
    }

    /// Account an economic contribution against a participant and the
    /// network-wide activity total that reward distribution draws from.
    pub fn record_contribution(&mut self, id: ParticipantId, amount: f64) -> Result<(), EngineError> {
        self.participant_mut(id)?.record_contribution(amount);
        self.total_economic_activity += amount;
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("participant {id} out of range for population {population}")]
    OutOfRange { id: ParticipantId, population: usize },
}
