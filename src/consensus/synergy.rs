// Synergy model - Pure scoring and conversion math
//
// Total functions over real inputs; results that must stay non-negative are
// clamped at zero. No state, no error conditions.

/// Weight of economic activity in the synergy gain.
pub const ECONOMIC_WEIGHT: f64 = 0.6;

/// Weight of governance activity in the synergy gain.
pub const GOVERNANCE_WEIGHT: f64 = 0.4;

/// Sensitivity of the conversion rate to network conditions.
pub const RATE_SENSITIVITY: f64 = 0.05;

/// Synergy after one contribution step, clamped at zero.
pub fn calculate_synergy(initial: f64, economic_activity: f64, governance_activity: f64) -> f64 {
    let gain = ECONOMIC_WEIGHT * economic_activity + GOVERNANCE_WEIGHT * governance_activity;
    (initial + gain).max(0.0)
}

/// Synergy after a penalty charge, clamped at zero.
pub fn apply_penalty(synergy: f64, penalty: f64) -> f64 {
    (synergy - penalty).max(0.0)
}

/// Token value of a synergy balance at the given conversion rate.
pub fn convert_to_tokens(synergy: f64, rate: f64) -> f64 {
    synergy * rate
}

/// Conversion rate adjusted for current network conditions.
pub fn adjust_conversion_rate(rate: f64, network_conditions: f64) -> f64 {
    rate * (1.0 + RATE_SENSITIVITY * network_conditions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synergy_weights_activity() {
        assert_eq!(calculate_synergy(100.0, 10.0, 5.0), 108.0);
    }

    #[test]
    fn synergy_never_goes_negative() {
        assert_eq!(calculate_synergy(-200.0, 1.0, 1.0), 0.0);
        assert_eq!(apply_penalty(10.0, 25.0), 0.0);
    }

    #[test]
    fn penalty_subtracts() {
        assert_eq!(apply_penalty(50.0, 20.0), 30.0);
    }

    #[test]
    fn conversion_scales_linearly() {
        assert_eq!(convert_to_tokens(80.0, 0.1), 8.0);
        assert_eq!(convert_to_tokens(0.0, 0.1), 0.0);
    }

    #[test]
    fn rate_tracks_network_conditions() {
        assert_eq!(adjust_conversion_rate(0.1, 2.0), 0.1 * 1.1);
        assert_eq!(adjust_conversion_rate(0.1, 0.0), 0.1);
    }
}
