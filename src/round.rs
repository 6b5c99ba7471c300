use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::bank::Question;
use crate::config::{ControlScheme, FeedbackMode, HintMode};
use crate::events::{EventKind, GameOverCause};
use crate::game::{Game, GameKey, GameSignal};
use crate::scene::ScenePhase;
use crate::session::QuestionContext;
use crate::spawn::{self, SpawnProfile};
use crate::stage::{SoundId, SpriteId, SpriteKind, Stage};

const SHOT_COOLDOWN_MS: u64 = 1000;
const SHIP_SPEED: f32 = 320.0;
const SPAWN_EDGE_OFFSET: f32 = 85.0;
const DESTRUCTION_TWEEN_MS: u32 = 500;

/// Question lifecycle. Modal phases gate which commands do anything, so a
/// stale dismissal or a tap under a popup is simply dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundPhase {
    AwaitingInput,
    Resolving,
    FeedbackActive,
    SandboxActive { from_feedback: bool },
    GameOver { cause: GameOverCause },
}

/// Per-round working set: the live question, the sprite handles the stage
/// gave us and the input bookkeeping that outlives single questions.
#[derive(Debug)]
pub struct Round {
    pub phase: RoundPhase,
    pub question: Option<Question>,
    pub question_number: u32,
    pub option_sprites: Vec<(SpriteId, i32)>,
    pub ship: Option<SpriteId>,
    pub popup: Option<SpriteId>,
    pub last_shot_ms: Option<u64>,
    pub keys_down: HashMap<GameKey, u64>,
}

impl Round {
    pub fn new() -> Self {
        Self {
            phase: RoundPhase::AwaitingInput,
            question: None,
            question_number: 0,
            option_sprites: Vec::new(),
            ship: None,
            popup: None,
            last_shot_ms: None,
            keys_down: HashMap::new(),
        }
    }

    /// Identity block for the state snapshot attached to log events.
    pub fn question_context(&self) -> Option<QuestionContext> {
        self.question.as_ref().map(|q| QuestionContext {
            id: q.id(),
            number: self.question_number,
            prompt: q.prompt.clone(),
            answer: q.answer,
            options: q.options.clone(),
        })
    }
}

impl Default for Round {
    fn default() -> Self {
        Self::new()
    }
}

/// Clear the previous candidates, draw the next item at the current
/// difficulty and hand its layout to the stage.
pub fn next_question<S: Stage>(game: &mut Game<S>) {
    clear_options(game);
    let level = game.controller.level();
    let question = match game.bank.pick(level, &mut game.rng) {
        Ok(q) => q.clone(),
        Err(err) => {
            warn!("cannot draw a question: {err}");
            return;
        }
    };

    game.session.begin_question();
    game.round.question = Some(question.clone());
    game.round.question_number = game.session.questions_shown;
    game.round.phase = RoundPhase::AwaitingInput;

    let profile = SpawnProfile::for_story(game.config.cover_story);
    let area = game.stage.area();
    let specs = spawn::layout(&question.options, area, &profile, &mut game.rng);
    let spawn_y = if profile.upward {
        area.height - SPAWN_EDGE_OFFSET
    } else {
        SPAWN_EDGE_OFFSET
    };
    for spec in &specs {
        let id = game
            .stage
            .create_sprite(SpriteKind::AnswerObject, spec.x as f32, spawn_y);
        game.stage.set_scale(id, spec.scale);
        game.stage.set_velocity(id, 0.0, spec.vy);
        game.round.option_sprites.push((id, spec.value));
    }

    let payload = json!({
        "question_id": question.id(),
        "prompt": question.prompt,
        "correct_answer": question.answer,
        "options": question.options,
        "difficulty": level,
        "spawns": specs,
    });
    game.log(EventKind::QuestionShown, payload);
    game.push_signal(GameSignal::QuestionShown {
        question_id: question.id(),
        number: game.round.question_number,
        prompt: question.prompt.clone(),
        options: question.options.clone(),
    });
}

pub fn clear_options<S: Stage>(game: &mut Game<S>) {
    for (id, _) in game.round.option_sprites.drain(..) {
        game.stage.destroy(id);
    }
}

/// Pointer-down on a candidate under the tap scheme.
pub fn tap_option<S: Stage>(game: &mut Game<S>, value: i32) {
    if game.config.controls != ControlScheme::TapToSelect {
        return;
    }
    if game.round.phase != RoundPhase::AwaitingInput {
        debug!("tap ignored outside AwaitingInput");
        return;
    }
    let correct = game
        .round
        .question
        .as_ref()
        .is_some_and(|q| q.is_correct(value));
    game.log(EventKind::OptionTapped, json!({ "value": value, "correct": correct }));
    submit(game, value);
}

pub fn key_down<S: Stage>(game: &mut Game<S>, key: GameKey) {
    // Key repeats keep the original press time and are not re-logged.
    if !game.round.keys_down.contains_key(&key) {
        game.round.keys_down.insert(key, game.session.elapsed_ms);
        game.log(EventKind::KeyDown, json!({ "key": key }));
    }
    if game.config.controls == ControlScheme::ArrowKeys {
        match key {
            GameKey::Left | GameKey::Right => steer(game),
            GameKey::Space => shoot(game),
            _ => {}
        }
    }
}

pub fn key_up<S: Stage>(game: &mut Game<S>, key: GameKey) {
    if let Some(pressed_at) = game.round.keys_down.remove(&key) {
        let held_ms = game.session.elapsed_ms.saturating_sub(pressed_at);
        game.log(EventKind::KeyUp, json!({ "key": key, "held_ms": held_ms }));
    }
    if game.config.controls == ControlScheme::ArrowKeys
        && matches!(key, GameKey::Left | GameKey::Right)
    {
        steer(game);
    }
}

/// Ship velocity from the set of currently held arrows. Opposing arrows
/// cancel out.
fn steer<S: Stage>(game: &mut Game<S>) {
    let ship = match game.round.ship {
        Some(s) => s,
        None => return,
    };
    let left = game.round.keys_down.contains_key(&GameKey::Left);
    let right = game.round.keys_down.contains_key(&GameKey::Right);
    let vx = match (left, right) {
        (true, false) => -SHIP_SPEED,
        (false, true) => SHIP_SPEED,
        _ => 0.0,
    };
    game.stage.set_velocity(ship, vx, 0.0);
}

/// Space under the arrow scheme. Rate-limited; the host owns the projectile
/// and reports any overlap back as a shot-hit command.
pub fn shoot<S: Stage>(game: &mut Game<S>) {
    if game.round.phase != RoundPhase::AwaitingInput {
        return;
    }
    let now = game.session.elapsed_ms;
    if let Some(last) = game.round.last_shot_ms {
        if now.saturating_sub(last) < SHOT_COOLDOWN_MS {
            debug!("shot suppressed by cooldown");
            return;
        }
    }
    game.round.last_shot_ms = Some(now);
    game.stage.play_sound(SoundId::Shoot);
    game.log(EventKind::ShotFired, json!({}));
}

pub fn shot_hit<S: Stage>(game: &mut Game<S>, value: i32) {
    if game.config.controls != ControlScheme::ArrowKeys {
        return;
    }
    if game.round.phase != RoundPhase::AwaitingInput {
        return;
    }
    game.log(EventKind::ShotHit, json!({ "value": value }));
    submit(game, value);
}

/// Every candidate left the lane without a pick: costs a life but never
/// records an answer, so accuracy counters are untouched.
pub fn options_exited<S: Stage>(game: &mut Game<S>) {
    if game.round.phase != RoundPhase::AwaitingInput {
        return;
    }
    game.session.lose_life();
    game.stage.play_sound(SoundId::Failure);
    let question_id = game.round.question.as_ref().map(Question::id);
    game.log(
        EventKind::LifeLost,
        json!({
            "reason": "options_missed",
            "question_id": question_id,
            "lives_remaining": game.session.lives,
        }),
    );
    if game.session.lives == 0 {
        game_over(game, GameOverCause::LivesLost);
    } else {
        next_question(game);
    }
}

/// Resolve a submitted value against the current question: scoring, the
/// difficulty advance, the critical log records, then feedback routing.
pub fn submit<S: Stage>(game: &mut Game<S>, value: i32) {
    if game.round.phase != RoundPhase::AwaitingInput {
        debug!("submission ignored outside AwaitingInput");
        return;
    }
    let question = match game.round.question.clone() {
        Some(q) => q,
        None => return,
    };
    game.round.phase = RoundPhase::Resolving;

    let correct = question.is_correct(value);
    if correct {
        game.session.record_correct();
        game.stage.play_sound(SoundId::Success);
    } else {
        game.session.record_incorrect();
        game.session.lose_life();
        game.stage.play_sound(SoundId::Failure);
    }
    let next_level = game.controller.advance(correct, &mut game.rng);
    game.session.difficulty = next_level;

    game.log(
        EventKind::ResponseSubmitted,
        json!({
            "question_id": question.id(),
            "submitted": value,
            "correct_answer": question.answer,
            "correct": correct,
            "next_difficulty": next_level,
        }),
    );
    if !correct {
        game.log(
            EventKind::LifeLost,
            json!({
                "reason": "wrong_answer",
                "question_id": question.id(),
                "lives_remaining": game.session.lives,
            }),
        );
    }
    game.push_signal(GameSignal::ResponseRecorded {
        question_id: question.id(),
        value,
        correct,
        lives: game.session.lives,
    });

    match game.config.feedback_mode {
        FeedbackMode::None => conclude_question(game),
        FeedbackMode::Destruction => show_destruction(game, value),
        FeedbackMode::Explanation => show_explanation(game, &question, value),
    }
}

/// Animated destruction of the picked candidate. Modal until the host
/// reports the animation finished via the dismiss command.
fn show_destruction<S: Stage>(game: &mut Game<S>, value: i32) {
    game.round.phase = RoundPhase::FeedbackActive;
    game.session.pause();
    game.stage.play_sound(SoundId::Explosion);
    if let Some(&(id, _)) = game.round.option_sprites.iter().find(|(_, v)| *v == value) {
        game.stage.tween_scale(id, 0.0, DESTRUCTION_TWEEN_MS);
    }
    game.log(EventKind::FeedbackShown, json!({ "mode": "destruction" }));
}

/// Worked-explanation popup; dismissal is user-paced.
fn show_explanation<S: Stage>(game: &mut Game<S>, question: &Question, value: i32) {
    game.round.phase = RoundPhase::FeedbackActive;
    game.session.pause();
    let area = game.stage.area();
    let popup = game
        .stage
        .create_sprite(SpriteKind::FeedbackPopup, area.width / 2.0, area.height / 2.0);
    game.round.popup = Some(popup);
    let offers_solution = game.config.hint_mode == HintMode::GuidedSandbox
        && game.session.power_tool_uses < game.session.max_power_tools;
    let payload = json!({
        "mode": "explanation",
        "text": explanation_text(question, value),
        "offers_solution": offers_solution,
    });
    game.log(EventKind::FeedbackShown, payload);
}

/// Close the feedback (user tap under the explanation mode, host
/// animation-complete under destruction). Stale completions arriving after
/// the phase moved on are dropped by the phase guard.
pub fn dismiss_feedback<S: Stage>(game: &mut Game<S>) {
    if game.round.phase != RoundPhase::FeedbackActive {
        debug!("feedback dismissal ignored outside FeedbackActive");
        return;
    }
    if let Some(popup) = game.round.popup.take() {
        game.stage.destroy(popup);
    }
    game.session.resume();
    conclude_question(game);
}

/// Lives are checked only here, after any feedback closed, so the player
/// always sees the feedback for their final answer before the end screen.
fn conclude_question<S: Stage>(game: &mut Game<S>) {
    if game.session.lives == 0 {
        game_over(game, GameOverCause::LivesLost);
    } else {
        next_question(game);
    }
}

/// From the explanation popup into the guided sandbox for the same
/// question. Available only under the sandbox hint mode while power-tool
/// budget remains, though it does not draw on that budget itself.
pub fn view_solution<S: Stage>(game: &mut Game<S>) {
    if game.round.phase != RoundPhase::FeedbackActive {
        return;
    }
    if game.config.hint_mode != HintMode::GuidedSandbox {
        debug!("view-solution ignored without the guided sandbox");
        return;
    }
    if game.session.power_tool_uses >= game.session.max_power_tools {
        debug!("view-solution ignored with the power-tool budget spent");
        return;
    }
    if let Some(popup) = game.round.popup.take() {
        game.stage.destroy(popup);
    }
    open_sandbox(game, true);
}

/// The in-round sandbox button. Bounded by the power-tool budget and one
/// use per question; pauses the clock while the walkthrough is open.
pub fn open_power_tool<S: Stage>(game: &mut Game<S>) {
    if game.round.phase != RoundPhase::AwaitingInput {
        return;
    }
    if game.config.hint_mode != HintMode::GuidedSandbox {
        debug!("power tool unavailable under {} hints", game.config.hint_mode);
        return;
    }
    let question_id = match game.round.question.as_ref() {
        Some(q) => q.id(),
        None => return,
    };
    if !game.session.use_power_tool(&question_id) {
        debug!("power tool rejected for {question_id}");
        return;
    }
    game.log(
        EventKind::HintRequested,
        json!({
            "tool": "guided_sandbox",
            "question_id": question_id,
            "uses": game.session.power_tool_uses,
            "max": game.session.max_power_tools,
        }),
    );
    game.push_signal(GameSignal::HintUsed {
        question_id,
        tool: HintMode::GuidedSandbox,
        uses: game.session.power_tool_uses,
        max: game.session.max_power_tools,
    });
    open_sandbox(game, false);
}

fn open_sandbox<S: Stage>(game: &mut Game<S>, from_feedback: bool) {
    game.round.phase = RoundPhase::SandboxActive { from_feedback };
    game.session.pause();
    let area = game.stage.area();
    let popup = game
        .stage
        .create_sprite(SpriteKind::SandboxPopup, area.width / 2.0, area.height / 2.0);
    game.round.popup = Some(popup);
    let plan = game.round.question.as_ref().and_then(sandbox_plan);
    let payload = json!({
        "source": if from_feedback { "feedback" } else { "round" },
        "plan": plan,
    });
    game.log(EventKind::SandboxOpened, payload);
}

/// Close the walkthrough. A sandbox entered from the feedback popup resumes
/// the interrupted question conclusion; one entered mid-round returns to
/// the same question.
pub fn close_sandbox<S: Stage>(game: &mut Game<S>) {
    let from_feedback = match game.round.phase {
        RoundPhase::SandboxActive { from_feedback } => from_feedback,
        _ => {
            debug!("sandbox close ignored outside SandboxActive");
            return;
        }
    };
    if let Some(popup) = game.round.popup.take() {
        game.stage.destroy(popup);
    }
    game.session.power_tool_active = false;
    game.log(EventKind::SandboxClosed, json!({}));
    game.session.resume();
    if from_feedback {
        conclude_question(game);
    } else {
        game.round.phase = RoundPhase::AwaitingInput;
    }
}

/// The reveal powerup: dims every distractor for the current question.
pub fn request_hint<S: Stage>(game: &mut Game<S>) {
    if game.round.phase != RoundPhase::AwaitingInput {
        return;
    }
    if game.config.hint_mode != HintMode::RevealPowerup {
        debug!("hints unavailable under {} hints", game.config.hint_mode);
        return;
    }
    let (question_id, answer) = match game.round.question.as_ref() {
        Some(q) => (q.id(), q.answer),
        None => return,
    };
    if !game.session.use_hint(&question_id) {
        debug!("hint rejected for {question_id}");
        return;
    }
    for &(id, value) in &game.round.option_sprites {
        if value != answer {
            game.stage.set_dimmed(id, true);
        }
    }
    game.stage.play_sound(SoundId::Pop);
    game.log(
        EventKind::HintRequested,
        json!({
            "tool": "reveal_powerup",
            "question_id": question_id,
            "uses": game.session.hint_uses,
            "max": game.session.max_hints,
        }),
    );
    game.push_signal(GameSignal::HintUsed {
        question_id,
        tool: HintMode::RevealPowerup,
        uses: game.session.hint_uses,
        max: game.session.max_hints,
    });
}

/// Clock exhausted. The session closes before any further tick can arrive,
/// so this fires at most once.
pub fn time_up<S: Stage>(game: &mut Game<S>) {
    if matches!(game.round.phase, RoundPhase::GameOver { .. }) {
        return;
    }
    game_over(game, GameOverCause::TimeUp);
}

/// The on-screen quit control. Ignored while a modal popup is up, so a
/// mis-tap underneath one cannot end the session.
pub fn end_game<S: Stage>(game: &mut Game<S>) {
    match game.round.phase {
        RoundPhase::FeedbackActive
        | RoundPhase::SandboxActive { .. }
        | RoundPhase::GameOver { .. } => {
            debug!("quit ignored during a modal phase");
            return;
        }
        RoundPhase::AwaitingInput | RoundPhase::Resolving => {}
    }
    game.log(EventKind::EndGamePressed, json!({}));
    game_over(game, GameOverCause::UserQuit);
}

/// Terminal transition: tear the stage down, close the session, record the
/// summary event last and hand the finished batch to the emitter.
pub fn game_over<S: Stage>(game: &mut Game<S>, cause: GameOverCause) {
    if matches!(game.round.phase, RoundPhase::GameOver { .. }) {
        return;
    }
    teardown(game);
    game.session.mark_over();
    game.round.phase = RoundPhase::GameOver { cause };
    game.scene = ScenePhase::GameOver;

    let total_secs = game.session.elapsed_ms / 1000;
    let answered = game.session.questions_answered;
    let avg_secs = if answered > 0 {
        total_secs as f64 / answered as f64
    } else {
        0.0
    };
    game.log(
        EventKind::SessionEnded,
        json!({
            "cause": cause,
            "questions_shown": game.session.questions_shown,
            "questions_answered": answered,
            "correct_count": game.session.correct_count,
            "incorrect_count": game.session.incorrect_count,
            "longest_streak": game.session.longest_streak,
            "hints_used": game.session.hint_uses,
            "power_tools_used": game.session.power_tool_uses,
            "total_secs": total_secs,
            "avg_secs_per_answer": avg_secs,
        }),
    );
    game.push_signal(GameSignal::SessionEnded {
        session_id: game.logger.session_id().to_string(),
        cause,
        correct_count: game.session.correct_count,
        incorrect_count: game.session.incorrect_count,
        questions_shown: game.session.questions_shown,
    });
    game.logger.finalize(cause);
}

/// Destroy every sprite the round handed to the stage.
pub fn teardown<S: Stage>(game: &mut Game<S>) {
    clear_options(game);
    if let Some(ship) = game.round.ship.take() {
        game.stage.destroy(ship);
    }
    if let Some(popup) = game.round.popup.take() {
        game.stage.destroy(popup);
    }
}

/// Number-line walkthrough for one question: start at the first operand and
/// reach the answer in tens-then-ones jumps, inside a window rounded out to
/// whole tens (never below zero).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SandboxPlan {
    pub start: i32,
    pub target: i32,
    pub window_min: i32,
    pub window_max: i32,
    pub jumps: Vec<i32>,
}

/// `None` when the prompt is not a plain binary expression agreeing with
/// the stored answer.
pub fn sandbox_plan(question: &Question) -> Option<SandboxPlan> {
    let mut tokens = question.prompt.split_whitespace();
    let start: i32 = tokens.next()?.parse().ok()?;
    let op = tokens.next()?;
    let operand: i32 = tokens.next()?.parse().ok()?;
    let target = match op {
        "+" => start + operand,
        "-" => start - operand,
        _ => return None,
    };
    if target != question.answer {
        return None;
    }

    let low = start.min(target);
    let high = start.max(target);
    let window_min = ((low / 10) * 10).max(0);
    let window_max = ((high + 9) / 10) * 10;

    let delta = target - start;
    let step = if delta < 0 { -1 } else { 1 };
    let mut jumps = Vec::new();
    for _ in 0..(delta.abs() / 10) {
        jumps.push(10 * step);
    }
    for _ in 0..(delta.abs() % 10) {
        jumps.push(step);
    }
    Some(SandboxPlan {
        start,
        target,
        window_min,
        window_max,
        jumps,
    })
}

/// One-line worked answer for the explanation popup.
pub fn explanation_text(question: &Question, submitted: i32) -> String {
    let solved = question.prompt.replace('?', &question.answer.to_string());
    if question.is_correct(submitted) {
        format!("Correct! {solved}")
    } else {
        format!(
            "You picked {submitted}. The answer is {}: {solved}",
            question.answer
        )
    }
}
