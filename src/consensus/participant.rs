// Participant - Per-validator economic and behavioral state
//
// Records live in a dense arena owned by the engine; every mutation touches
// a single record, which is what makes the per-cycle scoring safely
// data-parallel.

use super::synergy;
use crate::types::ParticipantId;
use serde::{Deserialize, Serialize};

/// Synergy granted to every participant at construction.
pub const INITIAL_SYNERGY: f64 = 100.0;

/// Synergy gained (honest) or lost (dishonest) per unit of economic
/// activity in one cycle.
pub const SYNERGY_PER_ACTIVITY: f64 = 10.0;

/// Penalty accrued per unit of economic activity in a dishonest cycle.
pub const PENALTY_INCREMENT: f64 = 5.0;

/// Reward accrued per unit of economic activity in an honest cycle.
pub const REWARD_INCREMENT: f64 = 5.0;

/// Flat penalty charged once when a participant is slashed.
pub const SLASH_PENALTY: f64 = 100.0;

/// Extra penalty charged when suspicious behavior is detected mid-cycle.
pub const SUSPICIOUS_PENALTY: f64 = 10.0;

/// Synergy a participant restarts with after a slash is lifted.
pub const RESTORE_SYNERGY: f64 = 50.0;

/// Upper bound on per-cycle economic activity.
pub const MAX_ECONOMIC_ACTIVITY: u32 = 10;

/// Recorded violations beyond this threshold trigger a slash at cycle end.
pub const VIOLATION_THRESHOLD: u32 = 3;

/// Behavior assigned to a participant for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Behavior {
    Honest,
    Dishonest,
}

/// One participant's economic state. Never destroyed, only reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    /// Cumulative honest-contribution score. Invariant: always >= 0, and
    /// pinned to 0 while `slashed` is set.
    pub synergy: f64,
    pub reward: f64,
    pub penalty: f64,
    pub violations: u32,
    pub behavior: Behavior,
    pub economic_activity: u32,
    pub governance_activity: u32,
    pub slashed: bool,
    pub economic_contribution: f64,
}

impl Participant {
    pub fn new(id: ParticipantId) -> Self {
        Self {
            id,
            synergy: INITIAL_SYNERGY,
            reward: 0.0,
            penalty: 0.0,
            violations: 0,
            behavior: Behavior::Honest,
            economic_activity: 1,
            governance_activity: 1,
            slashed: false,
            economic_contribution: 0.0,
        }
    }

    /// Score one cycle under the currently assigned behavior. Slashed
    /// participants neither gain nor lose until restored.
    pub fn update_synergy(&mut self) {
        if self.slashed {
            return;
        }

        let activity = f64::from(self.economic_activity);
        match self.behavior {
            Behavior::Honest => {
                self.synergy += SYNERGY_PER_ACTIVITY * activity;
                self.reward += REWARD_INCREMENT * activity;
            }
            Behavior::Dishonest => {
                self.synergy = synergy::apply_penalty(self.synergy, SYNERGY_PER_ACTIVITY * activity);
                self.penalty += PENALTY_INCREMENT * activity;
                self.violations += 1;
                if self.is_suspicious() {
                    self.penalty += SUSPICIOUS_PENALTY;
                    self.apply_slash(SLASH_PENALTY);
                }
            }
        }

        if self.synergy < 0.0 {
            self.synergy = 0.0;
        }
    }

    /// Heuristic for behavior that warrants an immediate slash: high
    /// economic activity paired with high governance activity.
    pub fn is_suspicious(&self) -> bool {
        self.economic_activity > 4 && self.governance_activity > 2
    }

    /// Slash this participant: zero synergy plus one flat penalty charge.
    /// Idempotent - a second slash changes nothing.
    pub fn apply_slash(&mut self, slash_penalty: f64) {
        if !self.slashed {
            self.slashed = true;
            self.penalty += slash_penalty;
            self.synergy = 0.0;
        }
    }

    /// Lift a slash, restarting from the restore synergy. No-op unless
    /// currently slashed.
    pub fn restore_after_slash(&mut self) {
        if self.slashed {
            self.slashed = false;
            self.synergy = RESTORE_SYNERGY;
        }
    }

    /// Account an economic contribution, deriving the bounded per-cycle
    /// activity level from it.
    pub fn record_contribution(&mut self, contribution: f64) {
        self.economic_contribution += contribution;
        self.economic_activity = ((contribution / 10.0) as u32).min(MAX_ECONOMIC_ACTIVITY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn honest_cycle_gains_synergy_and_reward() {
        let mut p = Participant::new(0);
        p.economic_activity = 3;
        p.update_synergy();

        assert_eq!(p.synergy, INITIAL_SYNERGY + 30.0);
        assert_eq!(p.reward, 15.0);
        assert_eq!(p.violations, 0);
    }

    #[test]
    fn dishonest_cycle_loses_synergy_and_records_a_violation() {
        let mut p = Participant::new(0);
        p.behavior = Behavior::Dishonest;
        p.economic_activity = 3;
        p.update_synergy();

        assert_eq!(p.synergy, INITIAL_SYNERGY - 30.0);
        assert_eq!(p.penalty, 15.0);
        assert_eq!(p.violations, 1);
        assert!(!p.slashed);
    }

    #[test]
    fn suspicious_dishonest_cycle_slashes_immediately() {
        let mut p = Participant::new(0);
        p.behavior = Behavior::Dishonest;
        p.economic_activity = 5;
        p.governance_activity = 3;
        p.update_synergy();

        assert!(p.slashed);
        assert_eq!(p.synergy, 0.0);
        // activity penalty + suspicious surcharge + slash charge
        assert_eq!(p.penalty, 25.0 + SUSPICIOUS_PENALTY + SLASH_PENALTY);
    }

    #[test]
    fn slash_is_idempotent_and_never_double_charges() {
        let mut p = Participant::new(0);
        p.apply_slash(SLASH_PENALTY);
        let after_first = p.clone();

        p.apply_slash(SLASH_PENALTY);
        assert_eq!(p.penalty, after_first.penalty);
        assert_eq!(p.synergy, 0.0);
        assert!(p.slashed);
    }

    #[test]
    fn slashed_participant_is_frozen_until_restored() {
        let mut p = Participant::new(0);
        p.apply_slash(SLASH_PENALTY);

        p.behavior = Behavior::Honest;
        p.update_synergy();
        assert_eq!(p.synergy, 0.0);

        p.restore_after_slash();
        assert!(!p.slashed);
        assert_eq!(p.synergy, RESTORE_SYNERGY);

        // restoring twice is a no-op
        p.synergy = 70.0;
        p.restore_after_slash();
        assert_eq!(p.synergy, 70.0);
    }

    #[test]
    fn contribution_bounds_activity() {
        let mut p = Participant::new(0);
        p.record_contribution(35.0);
        assert_eq!(p.economic_activity, 3);
        assert_eq!(p.economic_contribution, 35.0);

        p.record_contribution(500.0);
        assert_eq!(p.economic_activity, MAX_ECONOMIC_ACTIVITY);
    }

    proptest! {
        // Synergy stays non-negative under any sequence of cycles, slashes
        // and restores.
        #[test]
        fn synergy_never_negative(
            steps in proptest::collection::vec((0u8..4, 0u32..=MAX_ECONOMIC_ACTIVITY, 0u32..6), 0..64)
        ) {
            let mut p = Participant::new(0);
            for (op, econ, gov) in steps {
                p.economic_activity = econ;
                p.governance_activity = gov;
                match op {
                    0 => { p.behavior = Behavior::Honest; p.update_synergy(); }
                    1 => { p.behavior = Behavior::Dishonest; p.update_synergy(); }
                    2 => p.apply_slash(SLASH_PENALTY),
                    _ => p.restore_after_slash(),
                }
                prop_assert!(p.synergy >= 0.0);
                if p.slashed {
                    prop_assert_eq!(p.synergy, 0.0);
                }
            }
        }
    }
}
