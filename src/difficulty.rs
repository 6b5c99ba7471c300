use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Ordered difficulty ladder. Level numbers run 1..=5 and are what the
/// analytics side sees; the names are what the catalog uses.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Difficulty {
    VeryEasy,
    Easy,
    Medium,
    Hard,
    VeryHard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 5] = [
        Difficulty::VeryEasy,
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::VeryHard,
    ];

    pub fn level(self) -> u8 {
        match self {
            Difficulty::VeryEasy => 1,
            Difficulty::Easy => 2,
            Difficulty::Medium => 3,
            Difficulty::Hard => 4,
            Difficulty::VeryHard => 5,
        }
    }

    pub fn from_level(level: u8) -> Option<Difficulty> {
        match level {
            1 => Some(Difficulty::VeryEasy),
            2 => Some(Difficulty::Easy),
            3 => Some(Difficulty::Medium),
            4 => Some(Difficulty::Hard),
            5 => Some(Difficulty::VeryHard),
            _ => None,
        }
    }

    /// One step easier, clamped at the bottom of the ladder.
    pub fn step_down(self) -> Difficulty {
        match self {
            Difficulty::VeryEasy => Difficulty::VeryEasy,
            Difficulty::Easy => Difficulty::VeryEasy,
            Difficulty::Medium => Difficulty::Easy,
            Difficulty::Hard => Difficulty::Medium,
            Difficulty::VeryHard => Difficulty::Hard,
        }
    }

    /// One step harder, clamped at the top of the ladder.
    pub fn step_up(self) -> Difficulty {
        match self {
            Difficulty::VeryEasy => Difficulty::Easy,
            Difficulty::Easy => Difficulty::Medium,
            Difficulty::Medium => Difficulty::Hard,
            Difficulty::Hard => Difficulty::VeryHard,
            Difficulty::VeryHard => Difficulty::VeryHard,
        }
    }
}

/// How the level reacts to answer outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DifficultyPolicy {
    /// Random walk nudged by correctness: each outcome gets its own 50%
    /// coin flip, so a correct answer can leave the level unchanged and an
    /// incorrect one likewise. Not a strict up-on-correct staircase.
    Staircase,
    /// Uniform level on every advance, ignoring correctness.
    Random,
}

/// Sole mutator of the session's difficulty level.
#[derive(Clone, Debug)]
pub struct DifficultyController {
    level: Difficulty,
    policy: DifficultyPolicy,
}

impl DifficultyController {
    pub fn new(start: Difficulty, policy: DifficultyPolicy) -> Self {
        Self {
            level: start,
            policy,
        }
    }

    pub fn level(&self) -> Difficulty {
        self.level
    }

    /// Advance after a submitted answer. A clamped-in-place outcome at the
    /// boundary levels still counts as a completed transition.
    pub fn advance(&mut self, was_correct: bool, rng: &mut impl Rng) -> Difficulty {
        match self.policy {
            DifficultyPolicy::Staircase => {
                if !was_correct && rng.gen_bool(0.5) {
                    self.level = self.level.step_down();
                }
                if was_correct && rng.gen_bool(0.5) {
                    self.level = self.level.step_up();
                }
            }
            DifficultyPolicy::Random => {
                if let Some(level) = Difficulty::ALL.choose(rng) {
                    self.level = *level;
                }
            }
        }
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    // StepRng yielding the minimum value makes every gen_bool(0.5) land
    // true; yielding the maximum makes it land false.
    fn always_flip() -> StepRng {
        StepRng::new(0, 0)
    }

    fn never_flip() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    #[test]
    fn test_level_numbers_are_one_through_five() {
        let levels: Vec<u8> = Difficulty::ALL.iter().map(|d| d.level()).collect();
        assert_eq!(levels, vec![1, 2, 3, 4, 5]);
        for d in Difficulty::ALL {
            assert_eq!(Difficulty::from_level(d.level()), Some(d));
        }
        assert_eq!(Difficulty::from_level(0), None);
        assert_eq!(Difficulty::from_level(6), None);
    }

    #[test]
    fn test_step_down_clamps_at_very_easy() {
        assert_eq!(Difficulty::VeryEasy.step_down(), Difficulty::VeryEasy);
        assert_eq!(Difficulty::Medium.step_down(), Difficulty::Easy);
    }

    #[test]
    fn test_step_up_clamps_at_very_hard() {
        assert_eq!(Difficulty::VeryHard.step_up(), Difficulty::VeryHard);
        assert_eq!(Difficulty::Medium.step_up(), Difficulty::Hard);
    }

    #[test]
    fn test_incorrect_with_flip_steps_down() {
        let mut ctrl = DifficultyController::new(Difficulty::Medium, DifficultyPolicy::Staircase);
        let next = ctrl.advance(false, &mut always_flip());
        assert_eq!(next, Difficulty::Easy);
    }

    #[test]
    fn test_incorrect_without_flip_stays_put() {
        let mut ctrl = DifficultyController::new(Difficulty::Medium, DifficultyPolicy::Staircase);
        let next = ctrl.advance(false, &mut never_flip());
        assert_eq!(next, Difficulty::Medium);
    }

    #[test]
    fn test_correct_with_flip_steps_up() {
        let mut ctrl = DifficultyController::new(Difficulty::Medium, DifficultyPolicy::Staircase);
        let next = ctrl.advance(true, &mut always_flip());
        assert_eq!(next, Difficulty::Hard);
    }

    #[test]
    fn test_correct_without_flip_stays_put() {
        let mut ctrl = DifficultyController::new(Difficulty::Medium, DifficultyPolicy::Staircase);
        let next = ctrl.advance(true, &mut never_flip());
        assert_eq!(next, Difficulty::Medium);
    }

    #[test]
    fn test_incorrect_at_floor_never_goes_below() {
        let mut ctrl = DifficultyController::new(Difficulty::VeryEasy, DifficultyPolicy::Staircase);
        for _ in 0..10 {
            let next = ctrl.advance(false, &mut always_flip());
            assert_eq!(next, Difficulty::VeryEasy);
        }
    }

    #[test]
    fn test_correct_at_ceiling_never_goes_above() {
        let mut ctrl = DifficultyController::new(Difficulty::VeryHard, DifficultyPolicy::Staircase);
        for _ in 0..10 {
            let next = ctrl.advance(true, &mut always_flip());
            assert_eq!(next, Difficulty::VeryHard);
        }
    }

    #[test]
    fn test_advance_stays_in_range_under_random_outcomes() {
        let mut rng = rand::thread_rng();
        let mut ctrl = DifficultyController::new(Difficulty::Medium, DifficultyPolicy::Staircase);
        for i in 0..1000 {
            let level = ctrl.advance(i % 3 == 0, &mut rng);
            assert!((1..=5).contains(&level.level()));
        }
    }

    #[test]
    fn test_random_policy_ignores_correctness() {
        let mut ctrl = DifficultyController::new(Difficulty::Medium, DifficultyPolicy::Random);
        // StepRng at zero always selects the first element.
        let next = ctrl.advance(false, &mut always_flip());
        assert_eq!(next, Difficulty::VeryEasy);
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let level = ctrl.advance(true, &mut rng);
            assert!((1..=5).contains(&level.level()));
        }
    }

    #[test]
    fn test_display_names_match_catalog_tags() {
        assert_eq!(Difficulty::VeryEasy.to_string(), "very_easy");
        assert_eq!(Difficulty::VeryHard.to_string(), "very_hard");
        assert_eq!(DifficultyPolicy::Staircase.to_string(), "staircase");
    }
}
