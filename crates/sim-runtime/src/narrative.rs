//! Dialogue variant selection, kept apart from the session's economics.

use serde::Serialize;
use sim_core::DayResult;

/// How a day ended, for picking reaction lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Profit,
    Loss,
}

impl Outcome {
    /// Break-even days count as profitable.
    pub fn of(result: &DayResult) -> Self {
        if result.profit < 0.0 {
            Outcome::Loss
        } else {
            Outcome::Profit
        }
    }
}

/// Round-robin cursors over profit and loss dialogue variants.
#[derive(Clone, Debug, Default)]
pub struct DialogueCycle {
    profit: usize,
    loss: usize,
}

impl DialogueCycle {
    /// Index of the next variant for `outcome` among `variants` choices.
    pub fn next(&mut self, outcome: Outcome, variants: usize) -> Option<usize> {
        if variants == 0 {
            return None;
        }
        let cursor = match outcome {
            Outcome::Profit => &mut self.profit,
            Outcome::Loss => &mut self.loss,
        };
        let index = *cursor % variants;
        *cursor = cursor.wrapping_add(1);
        Some(index)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(profit: f64) -> DayResult {
        DayResult {
            round: 1,
            quality: 5.0,
            advertising: 20.0,
            output: 8.0,
            price: 9.1,
            mr: 0.0,
            mc: 10.0,
            atc: 11.25,
            profit,
            brand_after: 4.02,
        }
    }

    #[test]
    fn outcome_classifies_break_even_as_profit() {
        assert_eq!(Outcome::of(&result(0.0)), Outcome::Profit);
        assert_eq!(Outcome::of(&result(-0.01)), Outcome::Loss);
    }

    #[test]
    fn cursors_cycle_independently() {
        let mut c = DialogueCycle::default();
        assert_eq!(c.next(Outcome::Profit, 3), Some(0));
        assert_eq!(c.next(Outcome::Profit, 3), Some(1));
        assert_eq!(c.next(Outcome::Loss, 2), Some(0));
        assert_eq!(c.next(Outcome::Profit, 3), Some(2));
        assert_eq!(c.next(Outcome::Profit, 3), Some(0));
        assert_eq!(c.next(Outcome::Loss, 2), Some(1));
        assert_eq!(c.next(Outcome::Loss, 0), None);
        c.reset();
        assert_eq!(c.next(Outcome::Loss, 2), Some(0));
    }
}
