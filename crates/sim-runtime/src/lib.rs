#![deny(warnings)]

//! Session runtime for the coffee-stand game: the day/round/episode state
//! machine plus the collaborators an orchestrator needs around it.

pub mod config;
pub mod narrative;
pub mod rush;
pub mod session;

pub use config::{ConfigError, GameConfig};
pub use narrative::{DialogueCycle, Outcome};
pub use rush::{RushConfig, RushPlan, RushTick};
pub use session::{
    Adjustment, DayClose, DayOutcome, RoundAdvance, Session, SessionConfig, SessionEvent,
};

/// Build a session from a loaded configuration.
pub fn init_session(config: &GameConfig) -> Session {
    Session::new(config.params.clone(), config.session.clone())
}
