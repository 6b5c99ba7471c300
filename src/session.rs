use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::GameConfig;
use crate::difficulty::Difficulty;

pub const STARTING_LIVES: u32 = 3;

/// Mutable aggregate for one play-through: lives, clock, counters, streaks
/// and help budgets. Single source of truth for every other component;
/// created at session start and replaced wholesale on restart.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub lives: u32,
    pub time_limit_secs: u32,
    pub remaining_secs: u32,
    pub elapsed_ms: u64,
    pub questions_shown: u32,
    pub questions_answered: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub difficulty: Difficulty,
    pub hint_uses: u32,
    pub max_hints: u32,
    pub hint_active: bool,
    pub hint_used_this_question: bool,
    pub hinted_questions: BTreeSet<String>,
    pub power_tool_uses: u32,
    pub max_power_tools: u32,
    pub power_tool_active: bool,
    pub power_tool_used_this_question: bool,
    pub paused: bool,
    pub over: bool,
}

impl SessionState {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            lives: STARTING_LIVES,
            time_limit_secs: config.time_limit_secs,
            remaining_secs: config.time_limit_secs,
            elapsed_ms: 0,
            questions_shown: 0,
            questions_answered: 0,
            correct_count: 0,
            incorrect_count: 0,
            current_streak: 0,
            longest_streak: 0,
            difficulty: config.start_difficulty,
            hint_uses: 0,
            max_hints: config.max_hints,
            hint_active: false,
            hint_used_this_question: false,
            hinted_questions: BTreeSet::new(),
            power_tool_uses: 0,
            max_power_tools: config.max_power_tools,
            power_tool_active: false,
            power_tool_used_this_question: false,
            paused: false,
            over: false,
        }
    }

    /// Saturating: already-dead sessions stay at zero.
    pub fn lose_life(&mut self) {
        self.lives = self.lives.saturating_sub(1);
    }

    pub fn record_correct(&mut self) {
        self.questions_answered += 1;
        self.correct_count += 1;
        self.current_streak += 1;
        if self.current_streak > self.longest_streak {
            self.longest_streak = self.current_streak;
        }
    }

    pub fn record_incorrect(&mut self) {
        self.questions_answered += 1;
        self.incorrect_count += 1;
        self.current_streak = 0;
    }

    /// Reset the per-question help flags when a new question appears.
    pub fn begin_question(&mut self) {
        self.questions_shown += 1;
        self.hint_active = false;
        self.hint_used_this_question = false;
        self.power_tool_active = false;
        self.power_tool_used_this_question = false;
    }

    /// Returns false (and changes nothing) when the budget is spent or the
    /// hint was already used for this question.
    pub fn use_hint(&mut self, question_id: &str) -> bool {
        if self.hint_uses >= self.max_hints || self.hint_used_this_question {
            return false;
        }
        self.hint_uses += 1;
        self.hint_active = true;
        self.hint_used_this_question = true;
        self.hinted_questions.insert(question_id.to_string());
        true
    }

    /// Same bounding rules as hints, tracked on its own budget.
    pub fn use_power_tool(&mut self, question_id: &str) -> bool {
        if self.power_tool_uses >= self.max_power_tools || self.power_tool_used_this_question {
            return false;
        }
        self.power_tool_uses += 1;
        self.power_tool_active = true;
        self.power_tool_used_this_question = true;
        self.hinted_questions.insert(question_id.to_string());
        true
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// One-second decrement, saturating at zero. The external clock drives
    /// this only while the session is not paused.
    pub fn tick_timer(&mut self) {
        if self.paused || self.over {
            return;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
    }

    pub fn mark_over(&mut self) {
        self.over = true;
    }

    /// Owned copy for the logger. Mutating the session afterwards never
    /// changes a snapshot already taken.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            question: None,
            progress: ProgressSnapshot {
                questions_shown: self.questions_shown,
                questions_answered: self.questions_answered,
                correct_count: self.correct_count,
                incorrect_count: self.incorrect_count,
                current_streak: self.current_streak,
                longest_streak: self.longest_streak,
            },
            status: StatusSnapshot {
                lives: self.lives,
                remaining_secs: self.remaining_secs,
                elapsed_ms: self.elapsed_ms,
                difficulty: self.difficulty,
                paused: self.paused,
                over: self.over,
            },
            hints: HintSnapshot {
                total_used: self.hint_uses,
                max: self.max_hints,
                used_this_question: self.hint_used_this_question,
                active: self.hint_active,
                questions_with_hints: self.hinted_questions.iter().cloned().collect(),
            },
            power_tool: PowerToolSnapshot {
                total_uses: self.power_tool_uses,
                max: self.max_power_tools,
                used_this_question: self.power_tool_used_this_question,
                active: self.power_tool_active,
            },
        }
    }
}

/// Identity of the question on screen when an event was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionContext {
    pub id: String,
    pub number: u32,
    pub prompt: String,
    pub answer: i32,
    pub options: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub questions_shown: u32,
    pub questions_answered: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub lives: u32,
    pub remaining_secs: u32,
    pub elapsed_ms: u64,
    pub difficulty: Difficulty,
    pub paused: bool,
    pub over: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HintSnapshot {
    pub total_used: u32,
    pub max: u32,
    pub used_this_question: bool,
    pub active: bool,
    pub questions_with_hints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerToolSnapshot {
    pub total_uses: u32,
    pub max: u32,
    pub used_this_question: bool,
    pub active: bool,
}

/// Frozen view of the session attached to every log event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub question: Option<QuestionContext>,
    pub progress: ProgressSnapshot,
    pub status: StatusSnapshot,
    pub hints: HintSnapshot,
    pub power_tool: PowerToolSnapshot,
}

impl StateSnapshot {
    pub fn with_question(mut self, question: Option<QuestionContext>) -> Self {
        self.question = question;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> SessionState {
        SessionState::new(&GameConfig::default())
    }

    #[test]
    fn test_new_session_baseline() {
        let s = fresh();
        assert_eq!(s.lives, 3);
        assert_eq!(s.remaining_secs, 120);
        assert_eq!(s.correct_count, 0);
        assert!(!s.paused);
        assert!(!s.over);
    }

    #[test]
    fn test_lose_life_saturates_at_zero() {
        let mut s = fresh();
        for _ in 0..5 {
            s.lose_life();
        }
        assert_eq!(s.lives, 0);
    }

    #[test]
    fn test_lives_never_exceed_starting_value() {
        let s = fresh();
        assert!(s.lives <= STARTING_LIVES);
    }

    #[test]
    fn test_streak_grows_and_resets() {
        let mut s = fresh();
        s.record_correct();
        s.record_correct();
        s.record_correct();
        assert_eq!(s.current_streak, 3);
        assert_eq!(s.longest_streak, 3);
        s.record_incorrect();
        assert_eq!(s.current_streak, 0);
        assert_eq!(s.longest_streak, 3);
        s.record_correct();
        assert_eq!(s.current_streak, 1);
        assert_eq!(s.longest_streak, 3);
    }

    #[test]
    fn test_counters_track_answers() {
        let mut s = fresh();
        s.record_correct();
        s.record_incorrect();
        s.record_incorrect();
        assert_eq!(s.questions_answered, 3);
        assert_eq!(s.correct_count, 1);
        assert_eq!(s.incorrect_count, 2);
    }

    #[test]
    fn test_hint_budget_is_bounded() {
        let mut s = fresh();
        assert!(s.use_hint("q1"));
        s.begin_question();
        assert!(s.use_hint("q2"));
        s.begin_question();
        assert!(s.use_hint("q3"));
        s.begin_question();
        // Fourth attempt after three successful uses: no observable effect.
        assert!(!s.use_hint("q4"));
        assert_eq!(s.hint_uses, 3);
        assert!(!s.hint_active);
        assert!(!s.hinted_questions.contains("q4"));
    }

    #[test]
    fn test_hint_rejected_twice_in_same_question() {
        let mut s = fresh();
        assert!(s.use_hint("q1"));
        assert!(!s.use_hint("q1"));
        assert_eq!(s.hint_uses, 1);
    }

    #[test]
    fn test_power_tool_budget_independent_of_hints() {
        let mut s = fresh();
        assert!(s.use_hint("q1"));
        assert!(s.use_power_tool("q1"));
        assert_eq!(s.hint_uses, 1);
        assert_eq!(s.power_tool_uses, 1);
        s.begin_question();
        assert!(s.use_power_tool("q2"));
        s.begin_question();
        assert!(s.use_power_tool("q3"));
        s.begin_question();
        assert!(!s.use_power_tool("q4"));
        assert_eq!(s.power_tool_uses, 3);
    }

    #[test]
    fn test_begin_question_clears_per_question_flags() {
        let mut s = fresh();
        s.use_hint("q1");
        s.use_power_tool("q1");
        s.begin_question();
        assert!(!s.hint_active);
        assert!(!s.hint_used_this_question);
        assert!(!s.power_tool_active);
        assert!(!s.power_tool_used_this_question);
        assert_eq!(s.questions_shown, 1);
    }

    #[test]
    fn test_timer_saturates_and_respects_pause() {
        let mut s = fresh();
        s.remaining_secs = 2;
        s.tick_timer();
        assert_eq!(s.remaining_secs, 1);
        s.pause();
        s.tick_timer();
        assert_eq!(s.remaining_secs, 1);
        s.resume();
        s.tick_timer();
        s.tick_timer();
        assert_eq!(s.remaining_secs, 0);
    }

    #[test]
    fn test_timer_stops_once_over() {
        let mut s = fresh();
        s.remaining_secs = 5;
        s.mark_over();
        s.tick_timer();
        assert_eq!(s.remaining_secs, 5);
    }

    #[test]
    fn test_snapshot_is_a_deep_copy() {
        let mut s = fresh();
        s.use_hint("q1");
        let snap = s.snapshot();
        s.lose_life();
        s.record_correct();
        s.use_hint("q2");
        s.hinted_questions.insert("q9".into());
        assert_eq!(snap.status.lives, 3);
        assert_eq!(snap.progress.correct_count, 0);
        assert_eq!(snap.hints.total_used, 1);
        assert_eq!(snap.hints.questions_with_hints, vec!["q1".to_string()]);
    }

    #[test]
    fn test_snapshot_serializes_with_nested_groups() {
        let s = fresh();
        let snap = s.snapshot().with_question(Some(QuestionContext {
            id: "2 + 5 = ?_7".into(),
            number: 1,
            prompt: "2 + 5 = ?".into(),
            answer: 7,
            options: vec![27, 7, 6, 17, 8, 6],
        }));
        let value = serde_json::to_value(&snap).unwrap();
        assert_eq!(value["status"]["lives"], 3);
        assert_eq!(value["question"]["answer"], 7);
        assert_eq!(value["progress"]["questions_shown"], 0);
        assert_eq!(value["power_tool"]["max"], 3);
    }
}
