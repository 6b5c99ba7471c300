use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use strum_macros::Display;
use tracing::debug;

use crate::bank::QuestionBank;
use crate::config::{ControlScheme, GameConfig, HintMode};
use crate::difficulty::DifficultyController;
use crate::error::GameError;
use crate::events::{EventKind, GameOverCause};
use crate::logger::{EmitFn, EventLogger, EventSink};
use crate::round::{self, Round};
use crate::scene::{self, ScenePhase, StartTrigger};
use crate::session::SessionState;
use crate::stage::{SpriteKind, Stage};

/// Keys the core understands from the host's input layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GameKey {
    Left,
    Right,
    Up,
    Down,
    Space,
}

/// Serial intake for everything the host can tell the core. Listener
/// callbacks and physics-overlap reports all arrive through here.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Pointer-down outside any specific candidate.
    PointerDown,
    /// Pointer-down on the candidate carrying this value.
    TapOption { value: i32 },
    KeyDown { key: GameKey },
    KeyUp { key: GameKey },
    /// The host's projectile overlapped the candidate carrying this value.
    ShotHit { value: i32 },
    /// Every candidate drifted out of the lane without a pick.
    OptionsExited,
    HintPressed,
    PowerToolPressed,
    DismissFeedback,
    ViewSolution,
    CloseSandbox,
    EndGamePressed,
    Restart,
}

/// Outbound notifications at phase boundaries, drained by the host after
/// each command or tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum GameSignal {
    QuestionShown {
        question_id: String,
        number: u32,
        prompt: String,
        options: Vec<i32>,
    },
    ResponseRecorded {
        question_id: String,
        value: i32,
        correct: bool,
        lives: u32,
    },
    HintUsed {
        question_id: String,
        tool: HintMode,
        uses: u32,
        max: u32,
    },
    SessionEnded {
        session_id: String,
        cause: GameOverCause,
        correct_count: u32,
        incorrect_count: u32,
        questions_shown: u32,
    },
}

/// One embeddable game instance: configuration, question bank, session
/// state, difficulty cursor, event pipeline and the host's stage, driven
/// entirely by [`Command`]s and fixed-rate ticks.
pub struct Game<S: Stage> {
    pub config: GameConfig,
    pub bank: QuestionBank,
    pub controller: DifficultyController,
    pub session: SessionState,
    pub logger: EventLogger,
    pub round: Round,
    pub scene: ScenePhase,
    pub stage: S,
    pub rng: StdRng,
    pub signals: VecDeque<GameSignal>,
    // Milliseconds accumulated toward the next one-second clock tick.
    pub tick_ms: u64,
}

impl<S: Stage> Game<S> {
    pub fn new(config: GameConfig, stage: S) -> Result<Self, GameError> {
        Self::with_channels(config, stage, None, None)
    }

    pub fn with_channels(
        config: GameConfig,
        stage: S,
        emit: Option<EmitFn>,
        sink: Option<Box<dyn EventSink>>,
    ) -> Result<Self, GameError> {
        Self::build(config, stage, StdRng::from_entropy(), emit, sink)
    }

    /// Deterministic variant for replay and tests.
    pub fn with_seed(
        config: GameConfig,
        stage: S,
        seed: u64,
        emit: Option<EmitFn>,
        sink: Option<Box<dyn EventSink>>,
    ) -> Result<Self, GameError> {
        Self::build(config, stage, StdRng::seed_from_u64(seed), emit, sink)
    }

    fn build(
        config: GameConfig,
        stage: S,
        rng: StdRng,
        emit: Option<EmitFn>,
        sink: Option<Box<dyn EventSink>>,
    ) -> Result<Self, GameError> {
        config.validate()?;
        let bank = QuestionBank::load()?;
        let logger = Self::fresh_logger(&config, emit, sink);
        Ok(Self {
            controller: DifficultyController::new(config.start_difficulty, config.sequence),
            session: SessionState::new(&config),
            round: Round::new(),
            scene: ScenePhase::Welcome,
            signals: VecDeque::new(),
            tick_ms: 0,
            config,
            bank,
            logger,
            stage,
            rng,
        })
    }

    fn fresh_logger(
        config: &GameConfig,
        emit: Option<EmitFn>,
        sink: Option<Box<dyn EventSink>>,
    ) -> EventLogger {
        let mut logger = EventLogger::new(config.snapshot_interval_ms, emit, sink);
        if !config.logging_enabled {
            logger.disable();
        }
        logger
    }

    pub fn session_id(&self) -> &str {
        self.logger.session_id()
    }

    pub fn welcome_text(&self) -> &'static str {
        scene::welcome_text(self.config.controls)
    }

    pub fn is_over(&self) -> bool {
        matches!(self.scene, ScenePhase::GameOver)
    }

    /// Take everything signalled since the last drain, oldest first.
    pub fn drain_signals(&mut self) -> Vec<GameSignal> {
        self.signals.drain(..).collect()
    }

    /// Serial command intake. Commands that make no sense in the current
    /// phase are dropped with a debug trace.
    pub fn handle(&mut self, command: Command) {
        match self.scene {
            ScenePhase::Welcome => self.handle_welcome(command),
            ScenePhase::Playing => self.handle_playing(command),
            ScenePhase::GameOver => self.handle_game_over(command),
        }
    }

    fn handle_welcome(&mut self, command: Command) {
        let starts = match (&command, scene::start_trigger(self.config.controls)) {
            (Command::PointerDown, StartTrigger::PointerDown) => true,
            (
                Command::KeyDown {
                    key: GameKey::Space,
                },
                StartTrigger::SpaceKey,
            ) => true,
            _ => false,
        };
        if starts {
            self.start_playing();
        } else {
            debug!("ignoring {command:?} on the welcome screen");
        }
    }

    fn handle_playing(&mut self, command: Command) {
        match command {
            Command::TapOption { value } => round::tap_option(self, value),
            Command::KeyDown { key } => round::key_down(self, key),
            Command::KeyUp { key } => round::key_up(self, key),
            Command::ShotHit { value } => round::shot_hit(self, value),
            Command::OptionsExited => round::options_exited(self),
            Command::HintPressed => round::request_hint(self),
            Command::PowerToolPressed => round::open_power_tool(self),
            Command::DismissFeedback => round::dismiss_feedback(self),
            Command::ViewSolution => round::view_solution(self),
            Command::CloseSandbox => round::close_sandbox(self),
            Command::EndGamePressed => round::end_game(self),
            Command::PointerDown | Command::Restart => {
                debug!("ignoring {command:?} mid-session");
            }
        }
    }

    fn handle_game_over(&mut self, command: Command) {
        match command {
            Command::Restart => self.restart(),
            other => debug!("ignoring {other:?} after game over"),
        }
    }

    /// Leave the welcome screen: record the session start against the fresh
    /// state, put the ship up when the scheme needs one, then show the
    /// first question.
    fn start_playing(&mut self) {
        self.scene = ScenePhase::Playing;
        if self.config.controls == ControlScheme::ArrowKeys {
            let area = self.stage.area();
            let ship =
                self.stage
                    .create_sprite(SpriteKind::Ship, area.width / 2.0, area.height - 60.0);
            self.round.ship = Some(ship);
        }
        let payload = json!({
            "config": self.config,
            "bank": self.bank.name(),
        });
        self.log(EventKind::SessionStarted, payload);
        round::next_question(self);
    }

    /// Fresh session over the same emission channels: new session id, new
    /// state, new difficulty cursor, all sprites torn down. Only valid
    /// after game over.
    pub fn restart(&mut self) {
        if !matches!(self.scene, ScenePhase::GameOver) {
            debug!("restart ignored while {}", self.scene);
            return;
        }
        let old = std::mem::replace(&mut self.logger, EventLogger::new(0, None, None));
        let (emit, sink) = old.into_channels();
        self.logger = Self::fresh_logger(&self.config, emit, sink);
        self.session = SessionState::new(&self.config);
        self.controller =
            DifficultyController::new(self.config.start_difficulty, self.config.sequence);
        round::teardown(self);
        self.round = Round::new();
        self.tick_ms = 0;
        self.start_playing();
    }

    /// Fixed-cadence driver, called every [`crate::TICK_RATE_MS`] by the
    /// host loop. Advances play time and the snapshot cadence, ticks the
    /// one-second session clock and fires the time-up transition when it
    /// runs out. Inert outside active play, so modal popups freeze the
    /// clock for free.
    pub fn on_tick(&mut self) {
        if self.scene != ScenePhase::Playing || self.session.over || self.session.paused {
            return;
        }
        self.session.elapsed_ms += crate::TICK_RATE_MS;
        self.refresh_log_state();
        self.logger.tick(crate::TICK_RATE_MS);
        self.tick_ms += crate::TICK_RATE_MS;
        if self.tick_ms >= 1000 {
            self.tick_ms -= 1000;
            self.session.tick_timer();
            if self.session.remaining_secs == 0 {
                round::time_up(self);
            }
        }
    }

    /// Stamp the logger with the current state so the next record carries
    /// the post-transition view.
    pub fn refresh_log_state(&mut self) {
        let snapshot = self
            .session
            .snapshot()
            .with_question(self.round.question_context());
        self.logger.set_state(snapshot);
    }

    pub fn log(&mut self, kind: EventKind, payload: Value) {
        self.refresh_log_state();
        self.logger.record(kind, payload);
    }

    pub fn push_signal(&mut self, signal: GameSignal) {
        self.signals.push_back(signal);
    }
}
