use thiserror::Error;

use crate::difficulty::Difficulty;

/// Failures surfaced by the core. Configuration problems abort session
/// construction; everything else degrades to a no-op inside the game loop.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("no questions available at difficulty {level}")]
    EmptyBankSlice { level: Difficulty },
    #[error("question catalog is unusable: {0}")]
    CorruptCatalog(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("journal error: {0}")]
    Journal(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("summary export failed: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_level() {
        let err = GameError::EmptyBankSlice {
            level: Difficulty::Hard,
        };
        assert_eq!(err.to_string(), "no questions available at difficulty hard");
    }

    #[test]
    fn test_invalid_config_message() {
        let err = GameError::InvalidConfig("time limit must be positive".into());
        assert!(err.to_string().contains("time limit"));
    }
}
