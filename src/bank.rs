use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::from_str;

use crate::difficulty::Difficulty;
use crate::error::GameError;

static BANK_DIR: Dir = include_dir!("src/bank");

/// A single pre-authored arithmetic item. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub answer: i32,
    pub options: Vec<i32>,
    pub level: Difficulty,
}

impl Question {
    /// Stable identifier used to key per-question bookkeeping in the log.
    pub fn id(&self) -> String {
        format!("{}_{}", self.prompt, self.answer)
    }

    pub fn is_correct(&self, value: i32) -> bool {
        value == self.answer
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Catalog {
    name: String,
    size: usize,
    questions: Vec<Question>,
}

/// Fixed in-memory catalog of pre-authored questions, six per level. No
/// generation, no mutation; selection is uniform within a level's slice.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    name: String,
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Load the embedded catalog, checking that every level has at least
    /// one item and every option set contains its answer.
    pub fn load() -> Result<Self, GameError> {
        Self::from_embedded("questions.json")
    }

    fn from_embedded(file_name: &str) -> Result<Self, GameError> {
        let file = BANK_DIR.get_file(file_name).ok_or_else(|| {
            GameError::CorruptCatalog(format!("missing catalog file {file_name}"))
        })?;
        let raw = file
            .contents_utf8()
            .ok_or_else(|| GameError::CorruptCatalog("catalog is not valid utf-8".into()))?;
        let catalog: Catalog =
            from_str(raw).map_err(|e| GameError::CorruptCatalog(e.to_string()))?;
        if catalog.size != catalog.questions.len() {
            return Err(GameError::CorruptCatalog(format!(
                "catalog {} declares {} questions but contains {}",
                catalog.name,
                catalog.size,
                catalog.questions.len()
            )));
        }
        Self::from_questions(catalog.name, catalog.questions)
    }

    /// Build a bank from an explicit list. Hosts supplying their own
    /// catalog go through the same completeness checks as the embedded one.
    pub fn from_questions(name: String, questions: Vec<Question>) -> Result<Self, GameError> {
        let bank = Self { name, questions };
        bank.verify_complete()?;
        Ok(bank)
    }

    fn verify_complete(&self) -> Result<(), GameError> {
        for level in Difficulty::ALL {
            if self.slice(level).is_empty() {
                return Err(GameError::EmptyBankSlice { level });
            }
        }
        for q in &self.questions {
            if !q.options.contains(&q.answer) {
                return Err(GameError::CorruptCatalog(format!(
                    "options for '{}' do not contain the answer {}",
                    q.prompt, q.answer
                )));
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    fn slice(&self, level: Difficulty) -> Vec<&Question> {
        self.questions.iter().filter(|q| q.level == level).collect()
    }

    /// Uniform pick among the items tagged with `level`. Pure apart from
    /// the rng draw; the bank itself keeps no cursor.
    pub fn pick(&self, level: Difficulty, rng: &mut impl Rng) -> Result<&Question, GameError> {
        let slice = self.slice(level);
        slice
            .choose(rng)
            .copied()
            .ok_or(GameError::EmptyBankSlice { level })
    }
}
