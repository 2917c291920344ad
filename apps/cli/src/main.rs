#![deny(warnings)]

//! Headless orchestrator: plays a season of the coffee stand with an
//! autopilot policy and reports KPIs.

use anyhow::{Context, Result};
use sim_ai::{choose_output, Policy};
use sim_runtime::{DialogueCycle, GameConfig, Outcome, RushPlan, SessionEvent};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    days: Option<u32>,
    policy: Policy,
    config: Option<String>,
    seed: u64,
    json: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--days" => args.days = it.next().and_then(|s| s.parse().ok()),
            "--policy" => {
                let value = it.next().context("--policy needs a value")?;
                args.policy = value.parse().map_err(anyhow::Error::msg)?;
            }
            "--config" => args.config = it.next(),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()).unwrap_or(0),
            "--json" => args.json = true,
            _ => {}
        }
    }
    Ok(args)
}

fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::PerfectPour { streak } => format!("perfect pour (streak {streak})"),
        SessionEvent::RivalTaunt { losses } => format!("rival taunt after {losses} losses"),
        SessionEvent::EpisodeStarted { episode } => format!("episode {episode} begins"),
        SessionEvent::PriceShift { previous, current } => {
            format!("price shift {previous:.2} -> {current:.2}")
        }
    }
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args()?;
    info!(
        ?args,
        git_sha = env!("GIT_SHA"),
        build_date = env!("BUILD_DATE"),
        "starting CLI"
    );

    // `load` validates; only the built-in defaults still need checking.
    let config = match &args.config {
        Some(path) => {
            GameConfig::load(path).with_context(|| format!("loading config from {path}"))?
        }
        None => {
            let config = GameConfig::default();
            config.validate().context("built-in defaults are invalid")?;
            config
        }
    };

    let mut session = sim_runtime::init_session(&config);
    let mut cycle = DialogueCycle::default();
    let days = args.days.unwrap_or(config.session.total_rounds);

    // Doors open: leave the prologue.
    session.advance_round();

    for day in 0..days {
        if session.is_season_over() {
            break;
        }
        let target = choose_output(args.policy, session.params(), &session.snapshot());
        if let Some(adj) = session.set_output(target) {
            if let Some(event) = adj.event {
                info!(round = session.round(), "{}", describe(&event));
            }
        }

        let close = session
            .begin_day_close()
            .context("day close already in flight")?;
        let seed = args.seed.wrapping_add(u64::from(day));
        for tick in RushPlan::new(close.metrics().profit, &config.rush, seed) {
            debug!(
                tick = tick.tick,
                progress = tick.progress_pct,
                customers = tick.customers,
                earned = tick.earned,
                "rush"
            );
        }
        let outcome = session
            .commit_day_close(close)
            .context("day close was invalidated")?;

        let outcome_kind = Outcome::of(&outcome.result);
        let line = cycle.next(outcome_kind, 2).unwrap_or(0);
        info!(
            round = outcome.result.round,
            output = outcome.result.output,
            price = outcome.result.price,
            profit = outcome.result.profit,
            brand = outcome.result.brand_after,
            ?outcome_kind,
            line,
            "day closed"
        );
        for event in &outcome.events {
            info!(round = outcome.round.round, "{}", describe(event));
        }
    }

    println!(
        "KPI | days: {} | cumulative profit: {:.2} | brand: {:.2} | episode: {} | perfect streak: {}",
        session.history().len(),
        session.cumulative_profit(),
        session.brand(),
        session.episode(),
        session.perfect_pour_streak()
    );
    if args.json {
        println!("{}", serde_json::to_string_pretty(session.history())?);
    }

    Ok(())
}
