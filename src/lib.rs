//! Embeddable arithmetic mini-game core: session state machine, adaptive
//! difficulty and a structured event log, driven entirely by host commands
//! and a fixed tick.

pub mod bank;
pub mod config;
pub mod difficulty;
pub mod error;
pub mod events;
pub mod game;
pub mod journal;
pub mod logger;
pub mod round;
pub mod scene;
pub mod session;
pub mod spawn;
pub mod stage;

// The embedding surface most hosts need, re-exported for convenience.
pub use config::GameConfig;
pub use game::{Command, Game};

/// Cadence the host is expected to drive `Game::on_tick` at.
pub const TICK_RATE_MS: u64 = 100;
