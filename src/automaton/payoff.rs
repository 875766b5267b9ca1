//! Prisoner's dilemma reward table.

use super::grid::Action;

/// `PAYOFF[own][other]`, indexed by action bit.
///
/// Cooperate/cooperate = 3, cooperate/defect = 0, defect/cooperate = 5,
/// defect/defect = 1.
pub const PAYOFF: [[u32; 2]; 2] = [[3, 0], [5, 1]];

/// Reward earned by `own` when playing against `other`.
#[inline]
pub fn payoff(own: Action, other: Action) -> u32 {
    PAYOFF[own.bit() as usize][other.bit() as usize]
}

/// Same as [`payoff`] for raw action bits.
#[inline]
pub fn payoff_bits(own: u8, other: u8) -> u32 {
    PAYOFF[own as usize][other as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payoff_table() {
        assert_eq!(payoff(Action::Cooperate, Action::Cooperate), 3);
        assert_eq!(payoff(Action::Cooperate, Action::Defect), 0);
        assert_eq!(payoff(Action::Defect, Action::Cooperate), 5);
        assert_eq!(payoff(Action::Defect, Action::Defect), 1);
    }

    #[test]
    fn test_bits_match_actions() {
        for own in [Action::Cooperate, Action::Defect] {
            for other in [Action::Cooperate, Action::Defect] {
                assert_eq!(payoff(own, other), payoff_bits(own.bit(), other.bit()));
            }
        }
    }
}
