//! Round outcome evaluator: did a bet target hit?

use rust_decimal::Decimal;

use super::{BetTarget, Parity, Strategy};
use crate::types::RoundOutcome;

/// Whether `target` was satisfied by `outcome`. Zero never wins an outside bet.
pub fn target_hit(target: BetTarget, outcome: &RoundOutcome) -> bool {
    match target {
        BetTarget::Color(color) => outcome.color == color,
        BetTarget::Parity(parity) => {
            !outcome.is_zero()
                && match parity {
                    Parity::Even => outcome.is_even,
                    Parity::Odd => !outcome.is_even,
                }
        }
        BetTarget::Dozen(dozen) => dozen.range().contains(&outcome.number),
    }
}

/// Whether the strategy's bet won this round.
pub fn is_win(strategy: &Strategy, outcome: &RoundOutcome) -> bool {
    target_hit(strategy.bet_target, outcome)
}

/// Net payout per unit staked on a win: 1:1 for even-money bets, 2:1 for dozens.
pub fn payout_multiplier(target: BetTarget) -> Decimal {
    match target {
        BetTarget::Color(_) | BetTarget::Parity(_) => Decimal::ONE,
        BetTarget::Dozen(_) => Decimal::TWO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{Dozen, ProgressionKind};
    use crate::types::Color;
    use rust_decimal_macros::dec;

    fn on(target: BetTarget) -> Strategy {
        Strategy::new(ProgressionKind::Martingala, target, dec!(1))
    }

    fn spin(n: u8) -> RoundOutcome {
        RoundOutcome::from_number(n).unwrap()
    }

    #[test]
    fn test_dozen_first_iff_one_to_twelve() {
        let s = on(BetTarget::Dozen(Dozen::First));
        for n in 0..=36u8 {
            assert_eq!(is_win(&s, &spin(n)), (1..=12).contains(&n), "pocket {n}");
        }
    }

    #[test]
    fn test_second_and_third_dozen_bounds() {
        let second = on(BetTarget::Dozen(Dozen::Second));
        assert!(!is_win(&second, &spin(12)));
        assert!(is_win(&second, &spin(13)));
        assert!(is_win(&second, &spin(24)));
        assert!(!is_win(&second, &spin(25)));

        let third = on(BetTarget::Dozen(Dozen::Third));
        assert!(is_win(&third, &spin(36)));
        assert!(!is_win(&third, &spin(0)));
    }

    #[test]
    fn test_colour_bets() {
        let red = on(BetTarget::Color(Color::Red));
        let black = on(BetTarget::Color(Color::Black));
        assert!(is_win(&red, &spin(1)));
        assert!(!is_win(&black, &spin(1)));
        assert!(is_win(&black, &spin(2)));
        assert!(!is_win(&red, &spin(0)));
        assert!(!is_win(&black, &spin(0)));
    }

    #[test]
    fn test_parity_bets_lose_on_zero() {
        let even = on(BetTarget::Parity(Parity::Even));
        let odd = on(BetTarget::Parity(Parity::Odd));
        assert!(!is_win(&even, &spin(0)));
        assert!(!is_win(&odd, &spin(0)));
        assert!(is_win(&even, &spin(18)));
        assert!(is_win(&odd, &spin(17)));
        assert!(!is_win(&odd, &spin(18)));
    }

    #[test]
    fn test_payout_multipliers() {
        assert_eq!(payout_multiplier(BetTarget::Color(Color::Red)), dec!(1));
        assert_eq!(payout_multiplier(BetTarget::Parity(Parity::Even)), dec!(1));
        assert_eq!(payout_multiplier(BetTarget::Dozen(Dozen::Second)), dec!(2));
    }
}
