#![deny(warnings)]

//! Economic model: linear demand and marginal-cost curves for the coffee stand.
//!
//! Every function here is a deterministic function of its arguments:
//! - Effective curve coefficients from a state snapshot
//! - Price, marginal revenue, marginal cost, ATC and profit at a quantity
//! - Sampled chart series and the MR=MC overlay point
//! - Brand gain from advertising

use sim_core::{
    CurveParameters, CurvePoint, CurveSeries, EffectiveParameters, Metrics, OverlayPoint,
    StateSnapshot,
};

/// Apply quality, advertising, brand, rivals and modifiers to the base curves.
///
/// No bounds checking: `a_eff` may go negative and is floored by the curve
/// evaluators instead.
pub fn effective_parameters(params: &CurveParameters, s: &StateSnapshot) -> EffectiveParameters {
    let a_eff = params.a + params.k_q * s.quality + params.k_ad * (s.advertising / 100.0)
        + params.lambda * s.brand
        - params.eta * f64::from(s.rivals_count)
        + s.demand_modifier;
    EffectiveParameters {
        a_eff,
        c_eff: params.c + s.cost_modifier,
        d_eff: params.d + params.m_q * s.quality,
    }
}

/// Price the market bears at quantity `q`, never negative.
pub fn demand_at(params: &CurveParameters, eff: &EffectiveParameters, q: f64) -> f64 {
    (eff.a_eff - params.b * q).max(0.0)
}

/// Marginal revenue at `q`: the demand slope doubled, floored at zero.
pub fn marginal_revenue_at(params: &CurveParameters, eff: &EffectiveParameters, q: f64) -> f64 {
    (eff.a_eff - 2.0 * params.b * q).max(0.0)
}

/// Marginal cost at `q`. Deliberately unfloored: a negative `c_eff` yields a
/// negative marginal cost near zero output.
pub fn marginal_cost_at(eff: &EffectiveParameters, q: f64) -> f64 {
    eff.c_eff + eff.d_eff * q
}

/// Average total cost at `q`, approximated as `MC(q) + F/q`.
///
/// Marginal cost stands in for average variable cost; profit figures depend on
/// this exact form. Returns positive infinity for `q <= 0`.
pub fn average_total_cost(params: &CurveParameters, eff: &EffectiveParameters, q: f64) -> f64 {
    if q <= 0.0 {
        return f64::INFINITY;
    }
    marginal_cost_at(eff, q) + params.fixed_cost / q
}

/// Economic profit `(price - ATC) * q`, zero when nothing is produced.
///
/// Pass `price` when it is already known to skip re-evaluating demand.
pub fn economic_profit(
    params: &CurveParameters,
    eff: &EffectiveParameters,
    q: f64,
    price: Option<f64>,
) -> f64 {
    if q <= 0.0 {
        return 0.0;
    }
    let price = price.unwrap_or_else(|| demand_at(params, eff, q));
    (price - average_total_cost(params, eff, q)) * q
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Chart quantity grid: `i * step` for `i = 0..=floor(q_max / step)`, rounded
/// to 4 decimals, then `q_max` itself if the grid stops short of it.
///
/// A non-positive or non-finite step samples only the origin before the
/// endpoint.
pub fn sample_quantities(q_max: f64, step: f64) -> impl Iterator<Item = f64> + Clone {
    let (steps, step) = if step > 0.0 && step.is_finite() && q_max.is_finite() {
        ((q_max / step).floor() as i64, step)
    } else {
        (0, 0.0)
    };
    let last = (steps >= 0).then(|| round4(steps as f64 * step));
    let tail = if last == Some(q_max) { None } else { Some(q_max) };
    (0..=steps)
        .map(move |i| round4(i as f64 * step))
        .chain(tail)
}

/// Sample demand, MR and MC over the chart range. Restartable and
/// deterministic for identical inputs.
pub fn generate_curve_series(
    params: &CurveParameters,
    eff: &EffectiveParameters,
    q_max: f64,
    step: f64,
) -> CurveSeries {
    let grid = sample_quantities(q_max, step);
    let (lo, _) = grid.size_hint();
    let mut series = CurveSeries {
        demand: Vec::with_capacity(lo),
        mr: Vec::with_capacity(lo),
        mc: Vec::with_capacity(lo),
    };
    for x in grid {
        series.demand.push(CurvePoint {
            x,
            y: demand_at(params, eff, x),
        });
        series.mr.push(CurvePoint {
            x,
            y: marginal_revenue_at(params, eff, x),
        });
        series.mc.push(CurvePoint {
            x,
            y: marginal_cost_at(eff, x),
        });
    }
    series
}

/// Locate the MR=MC intersection for the overlay.
///
/// Visibility is judged on the unclamped root, so a solution outside
/// `[0, q_max]` is reported hidden even though a clamped point is returned.
pub fn compute_overlay_point(
    params: &CurveParameters,
    eff: &EffectiveParameters,
    q_max: f64,
) -> OverlayPoint {
    let den = 2.0 * params.b + eff.d_eff;
    if den <= 0.0 {
        return OverlayPoint::hidden(den);
    }
    let q_star = (eff.a_eff - eff.c_eff) / den;
    let q = q_star.max(0.0).min(q_max);
    OverlayPoint {
        visible: q_star >= 0.0 && q_star <= q_max,
        q,
        p: demand_at(params, eff, q),
        raw_q: Some(q_star),
        den,
    }
}

/// Brand gained from a day's advertising: `kappa * sqrt(ad) * multiplier`.
pub fn brand_gain(params: &CurveParameters, advertising: f64, multiplier: f64) -> f64 {
    params.kappa * advertising.max(0.0).sqrt() * multiplier
}

/// Evaluate every published metric at the snapshot's output level.
pub fn compute_metrics(params: &CurveParameters, snapshot: &StateSnapshot) -> Metrics {
    let eff = effective_parameters(params, snapshot);
    let q = snapshot.output;
    let price = demand_at(params, &eff, q);
    Metrics {
        price,
        mr: marginal_revenue_at(params, &eff, q),
        mc: marginal_cost_at(&eff, q),
        atc: average_total_cost(params, &eff, q),
        profit: economic_profit(params, &eff, q, Some(price)),
        overlay: compute_overlay_point(params, &eff, params.chart_q_max),
        base_numerator: eff.a_eff,
    }
}
