#![deny(warnings)]

//! Output advisor used by autopilot players.
//!
//! Two targets are offered because the model's ATC uses marginal cost as a
//! proxy for average variable cost: the MR=MC root is what the game teaches,
//! while the grid optimum is what actually maximizes the reported profit.

use serde::{Deserialize, Serialize};
use sim_core::{CurveParameters, StateSnapshot};
use sim_econ::{compute_overlay_point, demand_at, economic_profit, effective_parameters};
use std::str::FromStr;

/// Grid resolution of the profit search, in cups.
pub const SEARCH_STEP: f64 = 0.1;

/// Recommended output levels for a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Advice {
    /// MR=MC root, when it lies on the chart.
    pub marginal_match: Option<f64>,
    /// Quantity with the highest economic profit on the search grid.
    pub profit_max: f64,
    /// Profit at `profit_max`.
    pub expected_profit: f64,
}

/// How an autopilot picks tomorrow's output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Keep the current output.
    Hold,
    /// Pour until MR meets MC.
    #[default]
    MatchMarginals,
    /// Chase the highest reported profit.
    MaxProfit,
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hold" => Ok(Policy::Hold),
            "match" | "match_marginals" => Ok(Policy::MatchMarginals),
            "profit" | "max_profit" => Ok(Policy::MaxProfit),
            other => Err(format!("unknown policy: {other}")),
        }
    }
}

/// Evaluate both output targets for `snapshot`.
pub fn advise(params: &CurveParameters, snapshot: &StateSnapshot) -> Advice {
    let eff = effective_parameters(params, snapshot);
    let overlay = compute_overlay_point(params, &eff, params.chart_q_max);

    let steps = (params.chart_q_max.max(0.0) / SEARCH_STEP).floor() as u32;
    let mut best = (0.0, 0.0);
    for i in 1..=steps {
        let q = f64::from(i) * SEARCH_STEP;
        let profit = economic_profit(params, &eff, q, Some(demand_at(params, &eff, q)));
        if profit > best.1 {
            best = (q, profit);
        }
    }
    Advice {
        marginal_match: overlay.plotted().map(|(q, _)| q),
        profit_max: best.0,
        expected_profit: best.1,
    }
}

/// Output the policy would play next, given the current snapshot.
pub fn choose_output(policy: Policy, params: &CurveParameters, snapshot: &StateSnapshot) -> f64 {
    match policy {
        Policy::Hold => snapshot.output,
        Policy::MatchMarginals => advise(params, snapshot)
            .marginal_match
            .unwrap_or(snapshot.output),
        Policy::MaxProfit => advise(params, snapshot).profit_max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn opening() -> StateSnapshot {
        StateSnapshot {
            quality: 5.0,
            advertising: 20.0,
            output: 8.0,
            rivals_count: 2,
            ..StateSnapshot::default()
        }
    }

    #[test]
    fn marginal_match_is_overlay_root() {
        let params = CurveParameters::default();
        let advice = advise(&params, &opening());
        let q = advice.marginal_match.unwrap();
        assert!((q - 26.7 / 6.05).abs() < 1e-9);
    }

    #[test]
    fn profit_max_sits_left_of_marginal_match() {
        // With ATC = MC + F/q the profit optimum is (a-c)/(2b+2d).
        let params = CurveParameters::default();
        let advice = advise(&params, &opening());
        let analytic = 26.7 / (5.2 + 1.7);
        assert!((advice.profit_max - analytic).abs() <= SEARCH_STEP / 2.0 + 1e-9);
        assert!(advice.profit_max < advice.marginal_match.unwrap());
        assert!(advice.expected_profit > 0.0);
    }

    #[test]
    fn hopeless_market_recommends_nothing() {
        let params = CurveParameters::default();
        let snap = StateSnapshot {
            rivals_count: 40,
            ..opening()
        };
        let advice = advise(&params, &snap);
        assert_eq!(advice.marginal_match, None);
        assert_eq!(advice.profit_max, 0.0);
        assert_eq!(choose_output(Policy::MatchMarginals, &params, &snap), 8.0);
    }

    #[test]
    fn policies_parse() {
        assert_eq!("hold".parse::<Policy>(), Ok(Policy::Hold));
        assert_eq!("match".parse::<Policy>(), Ok(Policy::MatchMarginals));
        assert_eq!("profit".parse::<Policy>(), Ok(Policy::MaxProfit));
        assert!("yolo".parse::<Policy>().is_err());
    }

    proptest! {
        #[test]
        fn profit_max_beats_holding(output in 0.0f64..24.0, quality in 0.0f64..10.0) {
            let params = CurveParameters::default();
            let snap = StateSnapshot { output, quality, ..opening() };
            let eff = effective_parameters(&params, &snap);
            let advice = advise(&params, &snap);
            let held = economic_profit(&params, &eff, output, None);
            // grid search is within one step of the optimum
            prop_assert!(advice.expected_profit + 0.5 >= held);
        }
    }
}
