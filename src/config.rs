use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strum_macros::Display;

use crate::difficulty::{Difficulty, DifficultyPolicy};
use crate::error::GameError;

/// Narrative skin. Changes spawn direction, speeds and sprite scales, never
/// the game logic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CoverStory {
    MoonMission,
    HomeworkHelper,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ControlScheme {
    /// Move a ship with the arrow keys and shoot answers with space.
    ArrowKeys,
    /// Tap (pointer-down) an answer object directly.
    TapToSelect,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HintMode {
    None,
    /// One-shot reveal that dims the distractors for the current question.
    RevealPowerup,
    /// Modal number-line walkthrough; pauses the clock while open.
    GuidedSandbox,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeedbackMode {
    None,
    /// Animated destruction of the chosen object; dismissal is host-timed.
    Destruction,
    /// Modal worked-explanation popup; dismissal is user-paced.
    Explanation,
}

/// Immutable per-session configuration. Set once at construction, never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameConfig {
    pub cover_story: CoverStory,
    pub controls: ControlScheme,
    pub hint_mode: HintMode,
    pub feedback_mode: FeedbackMode,
    pub sequence: DifficultyPolicy,
    pub start_difficulty: Difficulty,
    pub time_limit_secs: u32,
    pub max_hints: u32,
    pub max_power_tools: u32,
    pub show_timer: bool,
    /// Cadence for ambient state snapshots in the log; 0 disables them.
    pub snapshot_interval_ms: u64,
    pub logging_enabled: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            cover_story: CoverStory::MoonMission,
            controls: ControlScheme::TapToSelect,
            hint_mode: HintMode::None,
            feedback_mode: FeedbackMode::None,
            sequence: DifficultyPolicy::Staircase,
            start_difficulty: Difficulty::Medium,
            time_limit_secs: 120,
            max_hints: 3,
            max_power_tools: 3,
            show_timer: true,
            snapshot_interval_ms: 500,
            logging_enabled: true,
        }
    }
}

impl GameConfig {
    /// Reject configurations no session could run under. The question bank
    /// is checked separately at construction.
    pub fn validate(&self) -> Result<(), GameError> {
        if self.time_limit_secs == 0 {
            return Err(GameError::InvalidConfig(
                "time limit must be positive".into(),
            ));
        }
        Ok(())
    }
}

pub trait ConfigStore {
    fn load(&self) -> GameConfig;
    fn save(&self, cfg: &GameConfig) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "mathdrop") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("mathdrop_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> GameConfig {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<GameConfig>(&bytes) {
                return cfg;
            }
        }
        GameConfig::default()
    }

    fn save(&self, cfg: &GameConfig) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = GameConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.time_limit_secs, 120);
        assert_eq!(cfg.max_hints, 3);
        assert_eq!(cfg.start_difficulty, Difficulty::Medium);
    }

    #[test]
    fn test_zero_time_limit_is_rejected() {
        let cfg = GameConfig {
            time_limit_secs: 0,
            ..GameConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = GameConfig::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = GameConfig {
            cover_story: CoverStory::HomeworkHelper,
            controls: ControlScheme::ArrowKeys,
            hint_mode: HintMode::GuidedSandbox,
            feedback_mode: FeedbackMode::Explanation,
            sequence: DifficultyPolicy::Random,
            start_difficulty: Difficulty::VeryHard,
            time_limit_secs: 45,
            max_hints: 1,
            max_power_tools: 2,
            show_timer: false,
            snapshot_interval_ms: 0,
            logging_enabled: false,
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn load_missing_file_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), GameConfig::default());
    }

    #[test]
    fn test_enum_tags_serialize_snake_case() {
        let json = serde_json::to_string(&CoverStory::HomeworkHelper).unwrap();
        assert_eq!(json, "\"homework_helper\"");
        let json = serde_json::to_string(&HintMode::RevealPowerup).unwrap();
        assert_eq!(json, "\"reveal_powerup\"");
    }
}
