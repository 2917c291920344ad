//! Day/round/episode state machine for a single coffee stand.
//!
//! A [`Session`] owns all mutable game state. Player sliders republish
//! [`Metrics`] on every change; closing a day is a two-phase protocol
//! ([`Session::begin_day_close`] then [`Session::commit_day_close`]) so the
//! orchestrator can run timed presentation in between without the session
//! ever scheduling delays itself.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sim_core::{
    episode_for_round, CurveParameters, CurveSeries, DayResult, Episode, Metrics, StateSnapshot,
};
use sim_econ::{brand_gain, compute_metrics, effective_parameters, generate_curve_series};
use tracing::{debug, info, warn};

/// Rules and opening position of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Rounds spent in each episode after the prologue.
    pub rounds_per_episode: u32,
    /// Rounds in a full season.
    pub total_rounds: u32,
    pub initial_quality: f64,
    pub initial_advertising: f64,
    pub initial_output: f64,
    /// Rival stands competing for demand.
    pub rivals: u32,
    pub demand_modifier: f64,
    pub cost_modifier: f64,
    /// Largest |MR - MC| that still counts as a Perfect Pour.
    pub perfect_pour_tolerance: f64,
    /// Consecutive losing days that provoke a rival taunt.
    pub losses_before_taunt: u32,
    /// Price move from a single adjustment that rivals notice.
    pub price_shift_threshold: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rounds_per_episode: 3,
            total_rounds: 9,
            initial_quality: 5.0,
            initial_advertising: 20.0,
            initial_output: 8.0,
            rivals: 2,
            demand_modifier: 0.0,
            cost_modifier: 0.0,
            perfect_pour_tolerance: 1.0,
            losses_before_taunt: 2,
            price_shift_threshold: 1.0,
        }
    }
}

/// Episode bookkeeping produced by [`Session::advance_round`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RoundAdvance {
    pub round: u32,
    pub previous_episode: Episode,
    pub current_episode: Episode,
    pub episode_changed: bool,
}

/// Threshold crossings reported to narrative collaborators.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    /// MR and MC were within tolerance at close; buff armed for tomorrow.
    PerfectPour { streak: u32 },
    /// Too many losing days in a row; the loss counter was consumed.
    RivalTaunt { losses: u32 },
    /// The round advance entered a new episode.
    EpisodeStarted { episode: Episode },
    /// A single adjustment moved the price past the shift threshold.
    PriceShift { previous: f64, current: f64 },
}

/// Result of a slider adjustment.
#[derive(Clone, Debug, PartialEq)]
pub struct Adjustment {
    pub metrics: Metrics,
    pub event: Option<SessionEvent>,
}

/// Handle for a day close in flight. Consumed by commit or abort.
#[derive(Debug)]
pub struct DayClose {
    token: u64,
    metrics: Metrics,
}

impl DayClose {
    /// Metrics captured when the day was closed.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Everything produced by resolving one day.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DayOutcome {
    pub result: DayResult,
    pub round: RoundAdvance,
    pub events: Vec<SessionEvent>,
}

#[derive(Clone, Copy, Debug)]
enum Slider {
    Quality,
    Advertising,
    Output,
}

/// Mutable state of one game.
#[derive(Clone, Debug)]
pub struct Session {
    params: CurveParameters,
    config: SessionConfig,
    round: u32,
    episode: Episode,
    brand: f64,
    quality: f64,
    advertising: f64,
    output: f64,
    rivals: u32,
    demand_modifier: f64,
    cost_modifier: f64,
    overlay_enabled: bool,
    cumulative_profit: f64,
    consecutive_losses: u32,
    perfect_pour_buff_active: bool,
    perfect_pour_streak: u32,
    history: Vec<DayResult>,
    running: bool,
    price_shift_noticed: bool,
    close_token: u64,
    metrics: Metrics,
}

/// Round to cents from the exact binary value, so 2.675 (stored as
/// 2.67499...) rounds down.
fn round_cents(x: f64) -> f64 {
    Decimal::from_f64_retain(x)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(x)
}

impl Session {
    /// Start a session at round 0 with the configured opening sliders.
    pub fn new(params: CurveParameters, config: SessionConfig) -> Self {
        let mut s = Self {
            params,
            config,
            round: 0,
            episode: Episode::Prologue,
            brand: 0.0,
            quality: 0.0,
            advertising: 0.0,
            output: 0.0,
            rivals: 0,
            demand_modifier: 0.0,
            cost_modifier: 0.0,
            overlay_enabled: false,
            cumulative_profit: 0.0,
            consecutive_losses: 0,
            perfect_pour_buff_active: false,
            perfect_pour_streak: 0,
            history: Vec::new(),
            running: false,
            price_shift_noticed: false,
            close_token: 0,
            metrics: Metrics::default(),
        };
        s.reset_for_new_game();
        s
    }

    /// Restore every field to its opening value. Outstanding day-close
    /// handles become stale.
    pub fn reset_for_new_game(&mut self) {
        self.round = 0;
        self.episode = Episode::Prologue;
        self.brand = 0.0;
        self.quality = self.config.initial_quality;
        self.advertising = self.config.initial_advertising;
        self.output = self.config.initial_output;
        self.rivals = self.config.rivals;
        self.demand_modifier = self.config.demand_modifier;
        self.cost_modifier = self.config.cost_modifier;
        self.overlay_enabled = false;
        self.cumulative_profit = 0.0;
        self.consecutive_losses = 0;
        self.perfect_pour_buff_active = false;
        self.perfect_pour_streak = 0;
        self.history.clear();
        self.running = false;
        self.price_shift_noticed = false;
        self.close_token = self.close_token.wrapping_add(1);
        self.recompute();
    }

    /// Move to the next round and recompute the episode from it.
    pub fn advance_round(&mut self) -> RoundAdvance {
        let previous_episode = self.episode;
        self.round += 1;
        self.episode = episode_for_round(self.round, self.config.rounds_per_episode);
        let episode_changed = previous_episode != self.episode;
        if episode_changed {
            info!(round = self.round, episode = %self.episode, "episode started");
        }
        RoundAdvance {
            round: self.round,
            previous_episode,
            current_episode: self.episode,
            episode_changed,
        }
    }

    /// Inputs for the economic model, taken fresh from the current state.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            brand: self.brand,
            quality: self.quality,
            advertising: self.advertising,
            output: self.output,
            rivals_count: self.rivals,
            demand_modifier: self.demand_modifier,
            cost_modifier: self.cost_modifier,
        }
    }

    /// Chart series for the current state.
    pub fn curve_series(&self) -> CurveSeries {
        let eff = effective_parameters(&self.params, &self.snapshot());
        generate_curve_series(
            &self.params,
            &eff,
            self.params.chart_q_max,
            self.params.chart_step,
        )
    }

    fn recompute(&mut self) -> Metrics {
        self.metrics = compute_metrics(&self.params, &self.snapshot());
        debug!(
            round = self.round,
            price = self.metrics.price,
            mr = self.metrics.mr,
            mc = self.metrics.mc,
            profit = self.metrics.profit,
            "metrics republished"
        );
        self.metrics
    }

    /// Set quality (clamped to >= 0) and republish metrics. Returns `None`
    /// while a day close is in flight.
    pub fn set_quality(&mut self, value: f64) -> Option<Adjustment> {
        self.adjust(Slider::Quality, value)
    }

    /// Set advertising spend (clamped to >= 0) and republish metrics. Returns `None`
    /// while a day close is in flight.
    pub fn set_advertising(&mut self, value: f64) -> Option<Adjustment> {
        self.adjust(Slider::Advertising, value)
    }

    /// Set output (clamped to >= 0) and republish metrics. Returns `None`
    /// while a day close is in flight.
    pub fn set_output(&mut self, value: f64) -> Option<Adjustment> {
        self.adjust(Slider::Output, value)
    }

    /// Toggle the MR=MC overlay and republish metrics.
    pub fn set_overlay_enabled(&mut self, enabled: bool) -> Metrics {
        self.overlay_enabled = enabled;
        self.recompute()
    }

    /// Sliders are frozen while a day close is in flight.
    fn adjust(&mut self, slider: Slider, value: f64) -> Option<Adjustment> {
        if self.running {
            debug!(?slider, "adjustment ignored during day close");
            return None;
        }
        let value = value.max(0.0);
        match slider {
            Slider::Quality => self.quality = value,
            Slider::Advertising => self.advertising = value,
            Slider::Output => self.output = value,
        }
        let previous = self.metrics.price;
        let metrics = self.recompute();
        let mut event = None;
        if !self.price_shift_noticed
            && (metrics.price - previous).abs() >= self.config.price_shift_threshold
        {
            self.price_shift_noticed = true;
            event = Some(SessionEvent::PriceShift {
                previous,
                current: metrics.price,
            });
        }
        Some(Adjustment { metrics, event })
    }

    /// Close the day on the currently published metrics.
    pub fn begin_day_close(&mut self) -> Option<DayClose> {
        self.begin_day_close_with(self.metrics)
    }

    /// Close the day on an explicit metrics snapshot. Returns `None` while
    /// another close is in flight.
    pub fn begin_day_close_with(&mut self, metrics: Metrics) -> Option<DayClose> {
        if self.running {
            debug!(round = self.round, "day close already in flight");
            return None;
        }
        self.running = true;
        self.price_shift_noticed = false;
        self.close_token = self.close_token.wrapping_add(1);
        Some(DayClose {
            token: self.close_token,
            metrics,
        })
    }

    /// Resolve the day captured by `close`. Stale handles are ignored.
    pub fn commit_day_close(&mut self, close: DayClose) -> Option<DayOutcome> {
        if !self.owns(&close) {
            warn!(token = close.token, "stale day close ignored");
            return None;
        }
        Some(self.settle(&close.metrics))
    }

    /// Cancel a day close without touching economic state.
    pub fn abort_day_close(&mut self, close: DayClose) -> bool {
        if !self.owns(&close) {
            return false;
        }
        self.running = false;
        true
    }

    /// One-shot day resolution on `metrics`. Ignored while a day close is
    /// in flight.
    pub fn resolve_day(&mut self, metrics: Metrics) -> Option<DayOutcome> {
        let close = self.begin_day_close_with(metrics)?;
        self.commit_day_close(close)
    }

    fn owns(&self, close: &DayClose) -> bool {
        self.running && close.token == self.close_token
    }

    fn settle(&mut self, metrics: &Metrics) -> DayOutcome {
        let mut events = Vec::new();
        let round = self.round;
        let profit = metrics.profit;
        let mr_diff = (metrics.mr - metrics.mc).abs();

        let multiplier = if self.perfect_pour_buff_active {
            1.0 + self.params.perfect_pour_buff
        } else {
            1.0
        };
        let gain = brand_gain(&self.params, self.advertising, multiplier);
        self.brand = round_cents(self.brand + gain);

        if mr_diff <= self.config.perfect_pour_tolerance {
            self.perfect_pour_streak += 1;
            self.perfect_pour_buff_active = true;
            events.push(SessionEvent::PerfectPour {
                streak: self.perfect_pour_streak,
            });
        } else {
            self.perfect_pour_streak = 0;
            self.perfect_pour_buff_active = false;
        }

        self.cumulative_profit += profit;
        if profit < 0.0 {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }

        let result = DayResult {
            round,
            quality: self.quality,
            advertising: self.advertising,
            output: self.output,
            price: metrics.price,
            mr: metrics.mr,
            mc: metrics.mc,
            atc: metrics.atc,
            profit,
            brand_after: self.brand,
        };
        self.history.push(result.clone());

        if self.consecutive_losses >= self.config.losses_before_taunt {
            events.push(SessionEvent::RivalTaunt {
                losses: self.consecutive_losses,
            });
            self.consecutive_losses = 0;
        }

        info!(
            round,
            profit,
            mr_diff,
            brand = self.brand,
            cumulative = self.cumulative_profit,
            "day resolved"
        );

        self.running = false;
        let advance = self.advance_round();
        if advance.episode_changed {
            events.push(SessionEvent::EpisodeStarted {
                episode: advance.current_episode,
            });
        }
        self.recompute();
        DayOutcome {
            result,
            round: advance,
            events,
        }
    }

    pub fn params(&self) -> &CurveParameters {
        &self.params
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Metrics published after the latest mutation.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn episode(&self) -> Episode {
        self.episode
    }

    pub fn brand(&self) -> f64 {
        self.brand
    }

    pub fn quality(&self) -> f64 {
        self.quality
    }

    pub fn advertising(&self) -> f64 {
        self.advertising
    }

    pub fn output(&self) -> f64 {
        self.output
    }

    pub fn rivals(&self) -> u32 {
        self.rivals
    }

    pub fn overlay_enabled(&self) -> bool {
        self.overlay_enabled
    }

    pub fn cumulative_profit(&self) -> f64 {
        self.cumulative_profit
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    pub fn perfect_pour_buff_active(&self) -> bool {
        self.perfect_pour_buff_active
    }

    pub fn perfect_pour_streak(&self) -> u32 {
        self.perfect_pour_streak
    }

    pub fn history(&self) -> &[DayResult] {
        &self.history
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_season_over(&self) -> bool {
        self.round > self.config.total_rounds
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(CurveParameters::default(), SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day(profit: f64, mr: f64, mc: f64) -> Metrics {
        Metrics {
            profit,
            mr,
            mc,
            ..Metrics::default()
        }
    }

    #[test]
    fn new_session_publishes_opening_metrics() {
        let s = Session::default();
        assert_eq!(s.round(), 0);
        assert_eq!(s.episode(), Episode::Prologue);
        assert_eq!(s.brand(), 0.0);
        assert_eq!(s.output(), 8.0);
        assert_eq!(s.rivals(), 2);
        assert!((s.metrics().price - 9.1).abs() < 1e-9);
        assert_eq!(s.metrics().mr, 0.0);
        assert_eq!(*s.metrics(), compute_metrics(s.params(), &s.snapshot()));
        assert_eq!(s.curve_series().demand.len(), 49);
    }

    #[test]
    fn advance_round_walks_episode_schedule() {
        let mut s = Session::default();
        let first = s.advance_round();
        assert_eq!(first.round, 1);
        assert_eq!(first.previous_episode, Episode::Prologue);
        assert_eq!(first.current_episode, Episode::GrandOpening);
        assert!(first.episode_changed);

        assert!(!s.advance_round().episode_changed);
        assert!(!s.advance_round().episode_changed);
        let fourth = s.advance_round();
        assert_eq!(fourth.current_episode, Episode::CrowdControl);
        assert!(fourth.episode_changed);

        for _ in 0..20 {
            s.advance_round();
        }
        assert_eq!(s.round(), 24);
        assert_eq!(s.episode(), Episode::MarketMastery);
    }

    #[test]
    fn two_losses_taunt_once_and_consume_counter() {
        let mut s = Session::default();
        let first = s.resolve_day(day(-5.0, 0.0, 10.0)).unwrap();
        assert!(first.events.iter().all(|e| !matches!(e, SessionEvent::RivalTaunt { .. })));
        assert_eq!(s.consecutive_losses(), 1);

        let second = s.resolve_day(day(-3.0, 0.0, 10.0)).unwrap();
        assert!(second
            .events
            .contains(&SessionEvent::RivalTaunt { losses: 2 }));
        assert_eq!(s.consecutive_losses(), 0);

        let third = s.resolve_day(day(-1.0, 0.0, 10.0)).unwrap();
        assert!(third.events.iter().all(|e| !matches!(e, SessionEvent::RivalTaunt { .. })));
        assert_eq!(s.consecutive_losses(), 1);
        assert!((s.cumulative_profit() + 9.0).abs() < 1e-9);
    }

    #[test]
    fn break_even_day_resets_losses() {
        let mut s = Session::default();
        s.resolve_day(day(-5.0, 0.0, 10.0));
        s.resolve_day(day(0.0, 0.0, 10.0));
        assert_eq!(s.consecutive_losses(), 0);
    }

    #[test]
    fn perfect_pour_buffs_next_days_brand_gain() {
        let mut s = Session::default();
        let out = s.resolve_day(day(2.0, 5.0, 5.5)).unwrap();
        assert!(s.perfect_pour_buff_active());
        assert_eq!(s.perfect_pour_streak(), 1);
        assert!(out.events.contains(&SessionEvent::PerfectPour { streak: 1 }));
        let unbuffed = round_cents(brand_gain(s.params(), 20.0, 1.0));
        assert_eq!(s.brand(), unbuffed);

        s.resolve_day(day(2.0, 0.0, 9.0));
        let buffed = 1.0 + s.params().perfect_pour_buff;
        assert_eq!(buffed, 1.15);
        let expected = round_cents(unbuffed + brand_gain(s.params(), 20.0, buffed));
        assert_eq!(s.brand(), expected);
        assert!(!s.perfect_pour_buff_active());
        assert_eq!(s.perfect_pour_streak(), 0);
    }

    #[test]
    fn perfect_pour_tolerance_is_inclusive() {
        let mut s = Session::default();
        s.resolve_day(day(1.0, 6.0, 5.0));
        s.resolve_day(day(1.0, 4.0, 5.0));
        assert_eq!(s.perfect_pour_streak(), 2);
    }

    #[test]
    fn brand_is_stored_at_two_decimals() {
        let mut s = Session::default();
        s.resolve_day(day(1.0, 0.0, 9.0));
        // 0.9 * sqrt(20) = 4.0249...
        assert_eq!(s.brand(), 4.02);
        assert_eq!(s.history()[0].brand_after, 4.02);
    }

    #[test]
    fn cents_round_from_exact_binary_value() {
        assert_eq!(round_cents(2.675), 2.67);
        assert_eq!(round_cents(1.015), 1.01);
        assert_eq!(round_cents(1.005), 1.0);
        assert_eq!(round_cents(0.125), 0.13);
        assert_eq!(round_cents(4.024922359499621), 4.02);
    }

    #[test]
    fn history_records_closed_day() {
        let mut s = Session::default();
        let m = *s.metrics();
        let out = s.resolve_day(m).unwrap();
        assert_eq!(out.result.round, 0);
        assert_eq!(out.result.output, 8.0);
        assert_eq!(out.result.price, m.price);
        assert_eq!(out.result.atc, m.atc);
        assert_eq!(out.round.round, 1);
        assert!(out
            .events
            .contains(&SessionEvent::EpisodeStarted { episode: Episode::GrandOpening }));
        assert_eq!(s.history(), &[out.result]);
        // brand grew, so the republished price moved
        assert!(s.metrics().price > m.price);
    }

    #[test]
    fn overlapping_closes_are_rejected() {
        let mut s = Session::default();
        let close = s.begin_day_close().unwrap();
        assert!(s.is_running());
        assert!(s.begin_day_close().is_none());
        assert!(s.resolve_day(day(1.0, 0.0, 0.0)).is_none());
        assert!(s.set_output(3.0).is_none());
        assert_eq!(s.output(), 8.0);

        let out = s.commit_day_close(close).unwrap();
        assert_eq!(out.result.output, 8.0);
        assert!(!s.is_running());
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn commit_uses_metrics_captured_at_close() {
        let mut s = Session::default();
        let close = s.begin_day_close().unwrap();
        let captured = *close.metrics();
        let out = s.commit_day_close(close).unwrap();
        assert_eq!(out.result.profit, captured.profit);
    }

    #[test]
    fn abort_leaves_economics_untouched() {
        let mut s = Session::default();
        let close = s.begin_day_close().unwrap();
        assert!(s.abort_day_close(close));
        assert!(!s.is_running());
        assert_eq!(s.round(), 0);
        assert_eq!(s.brand(), 0.0);
        assert!(s.history().is_empty());
    }

    #[test]
    fn reset_invalidates_outstanding_close() {
        let mut s = Session::default();
        s.resolve_day(day(-1.0, 0.0, 3.0));
        let close = s.begin_day_close().unwrap();
        s.reset_for_new_game();
        assert!(s.commit_day_close(close).is_none());
        assert_eq!(s.round(), 0);
        assert!(s.history().is_empty());
        assert_eq!(s.consecutive_losses(), 0);
        assert_eq!(s.cumulative_profit(), 0.0);
        assert!(!s.is_running());
    }

    #[test]
    fn price_shift_reported_once_per_day() {
        let mut s = Session::default();
        let first = s.set_output(6.0).unwrap();
        // 2.6 per cup
        assert!(matches!(first.event, Some(SessionEvent::PriceShift { .. })));
        let second = s.set_output(4.0).unwrap();
        assert!(second.event.is_none());

        s.resolve_day(*s.metrics());
        let next_day = s.set_output(8.0).unwrap();
        assert!(next_day.event.is_some());
    }

    #[test]
    fn small_adjustments_do_not_shift_price() {
        let mut s = Session::default();
        let adj = s.set_output(7.9).unwrap();
        assert!(adj.event.is_none());
        let adj = s.set_quality(5.5).unwrap();
        assert!(adj.event.is_none());
        assert_eq!(adj.metrics, *s.metrics());
    }

    #[test]
    fn negative_inputs_clamp_to_zero() {
        let mut s = Session::default();
        let adj = s.set_output(-4.0).unwrap();
        assert_eq!(s.output(), 0.0);
        assert_eq!(adj.metrics.atc, f64::INFINITY);
        assert_eq!(adj.metrics.profit, 0.0);
        s.set_advertising(f64::NAN);
        assert_eq!(s.advertising(), 0.0);
    }

    #[test]
    fn overlay_toggle_republishes() {
        let mut s = Session::default();
        let m = s.set_overlay_enabled(true);
        assert!(s.overlay_enabled());
        assert!(m.overlay.visible);
    }

    #[test]
    fn season_ends_after_total_rounds() {
        let mut s = Session::default();
        for _ in 0..9 {
            s.advance_round();
        }
        assert!(!s.is_season_over());
        s.advance_round();
        assert!(s.is_season_over());
    }

    proptest! {
        #[test]
        fn invariants_hold_over_random_days(
            days in proptest::collection::vec((-20.0f64..20.0, 0.0f64..15.0, -2.0f64..15.0, 0.0f64..100.0), 1..30)
        ) {
            let mut s = Session::default();
            let mut brand = s.brand();
            for (i, (profit, mr, mc, ad)) in days.iter().enumerate() {
                s.set_advertising(*ad);
                let before = s.round();
                let out = s.resolve_day(day(*profit, *mr, *mc)).unwrap();
                prop_assert_eq!(s.round(), before + 1);
                prop_assert_eq!(out.result.round, before);
                prop_assert!(s.brand() >= brand);
                brand = s.brand();
                prop_assert_eq!(s.history().len(), i + 1);
                prop_assert!(s.consecutive_losses() < s.config().losses_before_taunt);
                prop_assert!(out.round.current_episode >= out.round.previous_episode);
            }
        }
    }
}
