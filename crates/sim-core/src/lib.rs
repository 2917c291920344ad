#![deny(warnings)]

//! Core domain models and invariants for the coffee-stand market game.
//!
//! This crate defines the serializable types shared by the economic model and
//! the session runtime, with validation helpers for configuration loaded at
//! the edge of the system.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Structural economics of the market. Configured once, never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveParameters {
    /// Base demand intercept.
    pub a: f64,
    /// Demand slope (> 0).
    pub b: f64,
    /// Base marginal cost intercept.
    pub c: f64,
    /// Base marginal cost slope.
    pub d: f64,
    /// Demand shift per quality point.
    pub k_q: f64,
    /// Marginal cost slope added per quality point.
    pub m_q: f64,
    /// Demand shift per 100 units of advertising.
    pub k_ad: f64,
    /// Demand shift per brand point.
    pub lambda: f64,
    /// Demand lost per rival.
    pub eta: f64,
    /// Fixed cost per day (>= 0).
    #[serde(rename = "F")]
    pub fixed_cost: f64,
    /// Brand gained per sqrt(advertising).
    pub kappa: f64,
    /// Extra brand-gain fraction while the Perfect Pour buff is active.
    pub perfect_pour_buff: f64,
    /// Right edge of the plotted quantity range.
    pub chart_q_max: f64,
    /// Sampling step of the plotted curves.
    pub chart_step: f64,
}

impl Default for CurveParameters {
    fn default() -> Self {
        Self {
            a: 26.0,
            b: 2.6,
            c: 3.2,
            d: 0.45,
            k_q: 1.1,
            m_q: 0.08,
            k_ad: 6.0,
            lambda: 0.9,
            eta: 1.4,
            fixed_cost: 10.0,
            kappa: 0.9,
            perfect_pour_buff: 0.15,
            chart_q_max: 24.0,
            chart_step: 0.5,
        }
    }
}

/// Instantaneous view of the session used for one evaluation. Never stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub brand: f64,
    pub quality: f64,
    pub advertising: f64,
    pub output: f64,
    pub rivals_count: u32,
    pub demand_modifier: f64,
    pub cost_modifier: f64,
}

/// Curve coefficients after quality/advertising/brand/rival adjustments.
///
/// `a_eff` may be negative; demand and marginal revenue are floored downstream.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectiveParameters {
    pub a_eff: f64,
    pub c_eff: f64,
    pub d_eff: f64,
}

/// The MR=MC intersection as plotted on the chart.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayPoint {
    /// Whether the unclamped root lies within `[0, q_max]`.
    pub visible: bool,
    /// Root clamped to `[0, q_max]`.
    pub q: f64,
    /// Demand price at the clamped root.
    pub p: f64,
    /// Unclamped root; `None` when the slopes do not converge.
    pub raw_q: Option<f64>,
    /// Combined slope `2b + d_eff`.
    pub den: f64,
}

impl OverlayPoint {
    /// Overlay for curves that never cross in the positive direction.
    pub fn hidden(den: f64) -> Self {
        Self {
            visible: false,
            q: 0.0,
            p: 0.0,
            raw_q: None,
            den,
        }
    }

    /// The point to draw, if any.
    pub fn plotted(&self) -> Option<(f64, f64)> {
        self.visible.then_some((self.q, self.p))
    }
}

/// Metrics derived for the current output level.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub price: f64,
    pub mr: f64,
    pub mc: f64,
    /// Positive infinity at zero output.
    #[serde(with = "unbounded_cost")]
    pub atc: f64,
    pub profit: f64,
    pub overlay: OverlayPoint,
    /// Effective demand intercept behind these numbers.
    pub base_numerator: f64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            price: 0.0,
            mr: 0.0,
            mc: 0.0,
            atc: 0.0,
            profit: 0.0,
            overlay: OverlayPoint::hidden(0.0),
            base_numerator: 0.0,
        }
    }
}

/// One sampled chart point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f64,
    pub y: f64,
}

/// Demand, marginal revenue and marginal cost sampled over the same grid.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CurveSeries {
    pub demand: Vec<CurvePoint>,
    pub mr: Vec<CurvePoint>,
    pub mc: Vec<CurvePoint>,
}

/// Record of a closed day. Appended to the session history, never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DayResult {
    pub round: u32,
    pub quality: f64,
    pub advertising: f64,
    pub output: f64,
    pub price: f64,
    pub mr: f64,
    pub mc: f64,
    /// Positive infinity when the day was closed at zero output.
    #[serde(with = "unbounded_cost")]
    pub atc: f64,
    pub profit: f64,
    pub brand_after: f64,
}

/// Serde adapter for costs that are unbounded at zero output. JSON has no
/// infinity, so a non-finite cost is written as `null` and read back as
/// positive infinity.
mod unbounded_cost {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

/// Narrative progression units, ordered by appearance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Episode {
    #[serde(rename = "prologue")]
    Prologue,
    #[serde(rename = "episode1")]
    GrandOpening,
    #[serde(rename = "episode2")]
    CrowdControl,
    #[serde(rename = "episode3")]
    MarketMastery,
}

/// Episodes played after the prologue, in order.
pub const EPISODE_SEQUENCE: [Episode; 3] = [
    Episode::GrandOpening,
    Episode::CrowdControl,
    Episode::MarketMastery,
];

impl Episode {
    /// Stable key used by narrative collaborators.
    pub fn key(self) -> &'static str {
        match self {
            Episode::Prologue => "prologue",
            Episode::GrandOpening => "episode1",
            Episode::CrowdControl => "episode2",
            Episode::MarketMastery => "episode3",
        }
    }
}

impl fmt::Display for Episode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Episode reached at `round` when each episode lasts `rounds_per_episode`.
///
/// Round 0 is the prologue; past the last episode the schedule saturates.
pub fn episode_for_round(round: u32, rounds_per_episode: u32) -> Episode {
    if round == 0 {
        return Episode::Prologue;
    }
    let index = ((round - 1) / rounds_per_episode.max(1)) as usize;
    EPISODE_SEQUENCE[index.min(EPISODE_SEQUENCE.len() - 1)]
}

/// Validation errors for curve configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Numeric field must be finite.
    #[error("parameter `{0}` is not finite")]
    NonFinite(&'static str),
    /// Demand must slope downward.
    #[error("demand slope b must be > 0, got {0}")]
    NonPositiveSlope(f64),
    /// Cost or gain coefficient must be non-negative.
    #[error("parameter `{0}` must be >= 0")]
    Negative(&'static str),
    /// Chart bounds must be strictly positive.
    #[error("chart range must be > 0 (q_max {q_max}, step {step})")]
    InvalidChartRange { q_max: f64, step: f64 },
}

/// Validate curve parameters loaded from configuration.
pub fn validate_params(p: &CurveParameters) -> Result<(), ValidationError> {
    let fields = [
        ("a", p.a),
        ("b", p.b),
        ("c", p.c),
        ("d", p.d),
        ("k_q", p.k_q),
        ("m_q", p.m_q),
        ("k_ad", p.k_ad),
        ("lambda", p.lambda),
        ("eta", p.eta),
        ("F", p.fixed_cost),
        ("kappa", p.kappa),
        ("perfect_pour_buff", p.perfect_pour_buff),
        ("chart_q_max", p.chart_q_max),
        ("chart_step", p.chart_step),
    ];
    for (name, value) in fields {
        if !value.is_finite() {
            return Err(ValidationError::NonFinite(name));
        }
    }
    if p.b <= 0.0 {
        return Err(ValidationError::NonPositiveSlope(p.b));
    }
    for (name, value) in [
        ("F", p.fixed_cost),
        ("kappa", p.kappa),
        ("perfect_pour_buff", p.perfect_pour_buff),
    ] {
        if value < 0.0 {
            return Err(ValidationError::Negative(name));
        }
    }
    if p.chart_q_max <= 0.0 || p.chart_step <= 0.0 {
        return Err(ValidationError::InvalidChartRange {
            q_max: p.chart_q_max,
            step: p.chart_step,
        });
    }
    Ok(())
}
