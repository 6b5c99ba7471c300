use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::{error::Error, fs::File, io::Write, path::PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mathdrop::{
    bank::Question,
    config::{ControlScheme, CoverStory, FeedbackMode, GameConfig, HintMode},
    difficulty::{Difficulty, DifficultyPolicy},
    events::Emission,
    game::{Command, Game, GameKey, GameSignal},
    journal::{self, SessionSummary, SqliteJournal},
    logger::{EmitFn, EventSink},
    round::RoundPhase,
    scene::{self, StartTrigger},
    stage::RecordingStage,
    TICK_RATE_MS,
};

/// headless bot runner for the mathdrop game core
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Plays full sessions against the game core with a scripted bot, streaming the structured event log as JSON lines or into a sqlite journal. Useful for tuning difficulty sequences and inspecting log output without a host frontend."
)]
pub struct Cli {
    /// probability that the bot picks the right answer
    #[clap(short = 'a', long, default_value_t = 0.85)]
    accuracy: f64,

    /// quit after this many answers; 0 plays until the clock or lives run out
    #[clap(short = 'n', long, default_value_t = 10)]
    questions: u32,

    /// seed for the game and the bot; omit for a random run
    #[clap(short = 's', long)]
    seed: Option<u64>,

    /// cover story skin
    #[clap(long, value_enum, default_value_t = Story::MoonMission)]
    story: Story,

    /// control scheme the bot plays under
    #[clap(short = 'c', long, value_enum, default_value_t = Controls::Tap)]
    controls: Controls,

    /// hint surface offered to the bot
    #[clap(long, value_enum, default_value_t = Hints::Off)]
    hints: Hints,

    /// feedback shown after every answer
    #[clap(long, value_enum, default_value_t = Feedback::Off)]
    feedback: Feedback,

    /// difficulty sequencing policy
    #[clap(long, value_enum, default_value_t = Sequence::Staircase)]
    sequence: Sequence,

    /// starting difficulty level, 1 to 5
    #[clap(short = 'd', long, default_value_t = 3)]
    difficulty: u8,

    /// session time limit in seconds
    #[clap(short = 't', long, default_value_t = 120)]
    time_limit: u32,

    /// spend a hint or power tool on every question that allows one
    #[clap(long)]
    use_hints: bool,

    /// write the emitted event stream to this file as JSON lines
    #[clap(long)]
    events: Option<PathBuf>,

    /// record every event into a sqlite journal at this path
    #[clap(long)]
    journal: Option<PathBuf>,

    /// append the finished-session rollup to this csv file
    #[clap(long)]
    summary: Option<PathBuf>,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Story {
    MoonMission,
    HomeworkHelper,
}

impl Story {
    fn as_config(self) -> CoverStory {
        match self {
            Story::MoonMission => CoverStory::MoonMission,
            Story::HomeworkHelper => CoverStory::HomeworkHelper,
        }
    }
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Controls {
    Tap,
    Arrows,
}

impl Controls {
    fn as_config(self) -> ControlScheme {
        match self {
            Controls::Tap => ControlScheme::TapToSelect,
            Controls::Arrows => ControlScheme::ArrowKeys,
        }
    }
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Hints {
    Off,
    Reveal,
    Sandbox,
}

impl Hints {
    fn as_config(self) -> HintMode {
        match self {
            Hints::Off => HintMode::None,
            Hints::Reveal => HintMode::RevealPowerup,
            Hints::Sandbox => HintMode::GuidedSandbox,
        }
    }
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Feedback {
    Off,
    Destruction,
    Explanation,
}

impl Feedback {
    fn as_config(self) -> FeedbackMode {
        match self {
            Feedback::Off => FeedbackMode::None,
            Feedback::Destruction => FeedbackMode::Destruction,
            Feedback::Explanation => FeedbackMode::Explanation,
        }
    }
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Sequence {
    Staircase,
    Random,
}

impl Sequence {
    fn as_config(self) -> DifficultyPolicy {
        match self {
            Sequence::Staircase => DifficultyPolicy::Staircase,
            Sequence::Random => DifficultyPolicy::Random,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mathdrop=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let Some(start_difficulty) = Difficulty::from_level(cli.difficulty) else {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::InvalidValue, "difficulty must be between 1 and 5")
            .exit();
    };
    if !(0.0..=1.0).contains(&cli.accuracy) {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::InvalidValue, "accuracy must be between 0.0 and 1.0")
            .exit();
    }

    let config = GameConfig {
        cover_story: cli.story.as_config(),
        controls: cli.controls.as_config(),
        hint_mode: cli.hints.as_config(),
        feedback_mode: cli.feedback.as_config(),
        sequence: cli.sequence.as_config(),
        start_difficulty,
        time_limit_secs: cli.time_limit,
        ..GameConfig::default()
    };

    let emit: Option<EmitFn> = match &cli.events {
        Some(path) => {
            let mut out = File::create(path)?;
            Some(Box::new(move |emission: &Emission| {
                match serde_json::to_string(emission) {
                    Ok(line) => {
                        if let Err(err) = writeln!(out, "{line}") {
                            warn!("event stream write failed: {err}");
                        }
                    }
                    Err(err) => warn!("could not serialize emission: {err}"),
                }
            }))
        }
        None => None,
    };
    let sink: Option<Box<dyn EventSink>> = match &cli.journal {
        Some(path) => Some(Box::new(SqliteJournal::with_path(path)?)),
        None => None,
    };

    let stage = RecordingStage::new();
    let mut game = match cli.seed {
        Some(seed) => Game::with_seed(config, stage, seed, emit, sink)?,
        None => Game::with_channels(config, stage, emit, sink)?,
    };
    let mut bot_rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ 0x5eed),
        None => StdRng::from_entropy(),
    };

    match scene::start_trigger(game.config.controls) {
        StartTrigger::PointerDown => game.handle(Command::PointerDown),
        StartTrigger::SpaceKey => {
            game.handle(Command::KeyDown { key: GameKey::Space });
            game.handle(Command::KeyUp { key: GameKey::Space });
        }
    }

    // Attempted-tick bound so a mis-tuned bot can never spin forever. Ticks
    // swallowed by a paused modal still count against it.
    let max_ticks = u64::from(cli.time_limit) * 1000 / TICK_RATE_MS + 20_000;
    let mut ticks = 0u64;
    let mut answered = 0u32;
    let mut ended: Option<(String, mathdrop::events::GameOverCause)> = None;

    while !game.is_over() && ticks < max_ticks {
        for _ in 0..bot_rng.gen_range(3..=15) {
            game.on_tick();
            ticks += 1;
        }
        drain(&mut game, &mut ended);
        if game.is_over() {
            break;
        }

        match game.round.phase {
            RoundPhase::AwaitingInput => {
                if cli.questions > 0 && answered >= cli.questions {
                    game.handle(Command::EndGamePressed);
                    continue;
                }
                if cli.use_hints {
                    game.handle(Command::HintPressed);
                    game.handle(Command::PowerToolPressed);
                    if game.round.phase != RoundPhase::AwaitingInput {
                        // Sandbox opened; close it on the next pass.
                        continue;
                    }
                }
                let Some(question) = game.round.question.clone() else {
                    continue;
                };
                let value = pick_answer(&question, cli.accuracy, &mut bot_rng);
                answered += 1;
                match game.config.controls {
                    ControlScheme::TapToSelect => game.handle(Command::TapOption { value }),
                    ControlScheme::ArrowKeys => game.handle(Command::ShotHit { value }),
                }
            }
            RoundPhase::FeedbackActive => game.handle(Command::DismissFeedback),
            RoundPhase::SandboxActive { .. } => game.handle(Command::CloseSandbox),
            RoundPhase::Resolving | RoundPhase::GameOver { .. } => {}
        }
    }
    drain(&mut game, &mut ended);

    match ended {
        Some((session_id, cause)) => {
            println!(
                "session {session_id} ended ({cause}) after {}s",
                game.session.elapsed_ms / 1000
            );
            println!(
                "  questions: {} shown, {} answered ({} right / {} wrong), longest streak {}",
                game.session.questions_shown,
                game.session.questions_answered,
                game.session.correct_count,
                game.session.incorrect_count,
                game.session.longest_streak,
            );
            println!(
                "  final difficulty level {}, hints used {}, power tools used {}",
                game.session.difficulty.level(),
                game.session.hint_uses,
                game.session.power_tool_uses,
            );
            if let Some(path) = &cli.summary {
                let summary = SessionSummary::from_session(&session_id, cause, &game.session);
                journal::append_summary(path, &summary)?;
                println!("  summary appended to {}", path.display());
            }
        }
        None => println!("tick budget exhausted before the session ended"),
    }

    Ok(())
}

/// Surface the host-facing signals the way a frontend would consume them.
fn drain(game: &mut Game<RecordingStage>, ended: &mut Option<(String, mathdrop::events::GameOverCause)>) {
    for signal in game.drain_signals() {
        match signal {
            GameSignal::QuestionShown { number, prompt, .. } => {
                debug!(number, %prompt, "question shown");
            }
            GameSignal::ResponseRecorded {
                value,
                correct,
                lives,
                ..
            } => {
                debug!(value, correct, lives, "answer recorded");
            }
            GameSignal::HintUsed { tool, uses, max, .. } => {
                debug!(%tool, uses, max, "hint spent");
            }
            GameSignal::SessionEnded {
                session_id, cause, ..
            } => {
                *ended = Some((session_id, cause));
            }
        }
    }
}

fn pick_answer(question: &Question, accuracy: f64, rng: &mut StdRng) -> i32 {
    if rng.gen_bool(accuracy) {
        return question.answer;
    }
    let wrong: Vec<i32> = question
        .options
        .iter()
        .copied()
        .filter(|v| *v != question.answer)
        .collect();
    wrong.choose(rng).copied().unwrap_or(question.answer)
}
