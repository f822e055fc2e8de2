//! Fuzzy matcher configuration

use serde::{Deserialize, Serialize};

use crate::{FuzzyError, Result};

/// Fuzzy matcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    /// Maximum Levenshtein distance for matches and suggestions
    pub max_edit_distance: usize,
    /// Reserved; validated but not used in scoring
    pub phonetic_threshold: f64,
    /// Suggestions kept per word and per query
    pub suggestion_count: usize,
    /// Shorter words are never corrected or suggested for
    pub min_word_length: usize,
    /// Master switch for phonetic matching
    pub enable_phonetic: bool,
    pub enable_soundex: bool,
    pub enable_metaphone: bool,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            max_edit_distance: 2,
            phonetic_threshold: 0.8,
            suggestion_count: 5,
            min_word_length: 3,
            enable_phonetic: true,
            enable_soundex: true,
            enable_metaphone: true,
        }
    }
}

impl FuzzyConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.phonetic_threshold) {
            return Err(FuzzyError::InvalidConfig(format!(
                "phonetic_threshold must be within [0, 1], got {}",
                self.phonetic_threshold
            )));
        }
        if self.suggestion_count == 0 {
            return Err(FuzzyError::InvalidConfig(
                "suggestion_count must be greater than 0".to_string(),
            ));
        }
        if self.min_word_length == 0 {
            return Err(FuzzyError::InvalidConfig(
                "min_word_length must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
